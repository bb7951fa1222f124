//! Catalog filtering.

use serde::{Deserialize, Serialize};

use super::product::Product;

/// Criteria for narrowing the catalog.
///
/// Each dimension that is `None` (or blank) matches every product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Case-insensitive substring of the title or the description.
    pub text_search: Option<String>,
    /// Category label, compared case-insensitively.
    pub category: Option<String>,
    /// Minimum average rating (inclusive).
    pub min_rating: Option<f64>,
}

impl ProductFilter {
    /// Whether no dimension restricts anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        non_blank(self.text_search.as_deref()).is_none()
            && non_blank(self.category.as_deref()).is_none()
            && self.min_rating.is_none()
    }

    /// Conjunction of the text, category and rating predicates.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        self.matches_text(product) && self.matches_category(product) && self.matches_rating(product)
    }

    fn matches_text(&self, product: &Product) -> bool {
        let Some(needle) = non_blank(self.text_search.as_deref()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        product.title.to_lowercase().contains(&needle)
            || product.description.to_lowercase().contains(&needle)
    }

    fn matches_category(&self, product: &Product) -> bool {
        non_blank(self.category.as_deref())
            .is_none_or(|category| product.category.eq_ignore_ascii_case(category))
    }

    fn matches_rating(&self, product: &Product) -> bool {
        self.min_rating
            .is_none_or(|threshold| product.rating.rate >= threshold)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Products from `products` matching `filter`, in their original order.
#[must_use]
pub fn apply_filters(products: &[Product], filter: &ProductFilter) -> Vec<Product> {
    if filter.is_empty() {
        return products.to_vec();
    }
    products
        .iter()
        .filter(|p| filter.matches(p))
        .cloned()
        .collect()
}
