//! Cookie-consent preference.
//!
//! The decision is persisted under [`keys::CONSENT`] as
//! `{"consentGiven", "analyticsConsent", "timestamp"}`. Analytics may only be
//! loaded once consent was given and analytics were accepted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::storage::{KeyValueStore, StorageError, keys, read_json_or_discard, write_json};

/// Stored consent decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub consent_given: bool,
    pub analytics_consent: bool,
    pub timestamp: DateTime<Utc>,
}

/// What the consent banner and analytics loader observe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsentView {
    pub consent_given: bool,
    pub analytics_consent: bool,
    pub show_banner: bool,
}

impl ConsentView {
    #[must_use]
    pub const fn can_load_analytics(&self) -> bool {
        self.consent_given && self.analytics_consent
    }
}

/// Consent service.
pub struct ConsentState {
    store: Arc<dyn KeyValueStore>,
    view: watch::Sender<ConsentView>,
}

impl ConsentState {
    /// Restore the stored decision, if any. An unreadable record is
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let view = read_json_or_discard::<ConsentRecord>(store.as_ref(), keys::CONSENT)?
            .map(|record| ConsentView {
                consent_given: record.consent_given,
                analytics_consent: record.analytics_consent,
                show_banner: false,
            })
            .unwrap_or_default();

        Ok(Self {
            store,
            view: watch::Sender::new(view),
        })
    }

    /// Accept essential and analytics cookies.
    ///
    /// # Errors
    ///
    /// Returns an error if the decision cannot be persisted.
    pub fn accept_all(&self) -> Result<(), StorageError> {
        self.decide(true)
    }

    /// Accept essential cookies only.
    ///
    /// # Errors
    ///
    /// Returns an error if the decision cannot be persisted.
    pub fn accept_essential_only(&self) -> Result<(), StorageError> {
        self.decide(false)
    }

    /// Withdraw consent and ask again.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored decision cannot be removed.
    pub fn revoke_consent(&self) -> Result<(), StorageError> {
        self.view.send_replace(ConsentView {
            consent_given: false,
            analytics_consent: false,
            show_banner: true,
        });
        self.store.remove(keys::CONSENT)
    }

    /// Show the banner when no decision is stored.
    ///
    /// Returns whether analytics may be loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn check_consent_status(&self) -> Result<bool, StorageError> {
        let stored = read_json_or_discard::<ConsentRecord>(self.store.as_ref(), keys::CONSENT)?;
        if stored.is_none() {
            self.view.send_modify(|view| view.show_banner = true);
            return Ok(false);
        }
        Ok(self.can_load_analytics())
    }

    fn decide(&self, analytics: bool) -> Result<(), StorageError> {
        let view = ConsentView {
            consent_given: true,
            analytics_consent: analytics,
            show_banner: false,
        };
        self.view.send_replace(view);
        debug!(analytics, "Consent recorded");

        write_json(
            self.store.as_ref(),
            keys::CONSENT,
            &ConsentRecord {
                consent_given: view.consent_given,
                analytics_consent: view.analytics_consent,
                timestamp: Utc::now(),
            },
        )
    }

    #[must_use]
    pub fn view(&self) -> ConsentView {
        *self.view.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConsentView> {
        self.view.subscribe()
    }

    #[must_use]
    pub fn can_load_analytics(&self) -> bool {
        self.view.borrow().can_load_analytics()
    }

    #[must_use]
    pub fn show_banner(&self) -> bool {
        self.view.borrow().show_banner
    }
}
