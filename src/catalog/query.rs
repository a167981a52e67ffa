//! Listing query parameters
//!
//! Raw query string values arrive as optional strings and are turned into a
//! validated [`ProductQuery`]:
//! - `page`: 1-based page number, values below 1 become 1
//! - `pageSize`: clamped into `1..=max_page_size`
//! - `category`: equality filter when non-empty
//! - `search`: fuzzy title filter over the fetched page when non-empty
//! - `sort`: exactly `desc` orders by price descending, any other non-empty
//!   value ascending

use super::CatalogError;
use crate::config::CatalogSettings;
use serde::{Deserialize, Serialize};

/// Raw `/products` query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Document `id` field ascending
    Id,
    PriceAsc,
    PriceDesc,
}

impl SortOrder {
    /// Exactly `desc` means descending price; any other non-empty value,
    /// including `DESC` or whitespace, means ascending price
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") => SortOrder::Id,
            Some("desc") => SortOrder::PriceDesc,
            Some(_) => SortOrder::PriceAsc,
        }
    }
}

/// Validated listing request
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub page: u32,
    pub page_size: u32,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: SortOrder,
}

impl ProductQuery {
    /// Validate raw parameters against catalog limits
    pub fn from_params(params: &ListParams, settings: &CatalogSettings) -> Result<Self, CatalogError> {
        let page = parse_number("page", params.page.as_deref())?.unwrap_or(1).max(1);
        if page > settings.max_page as i64 {
            return Err(CatalogError::Validation(format!(
                "page must not exceed {}",
                settings.max_page
            )));
        }

        let max_page_size = settings.max_page_size.max(1);
        let page_size = parse_number("pageSize", params.page_size.as_deref())?
            .unwrap_or(settings.default_page_size as i64)
            .clamp(1, max_page_size as i64);

        let page = page as u32;
        let page_size = page_size as u32;
        if (page - 1).checked_mul(page_size).is_none() {
            return Err(CatalogError::Validation(
                "page is out of range for this page size".to_string(),
            ));
        }

        Ok(Self {
            page,
            page_size,
            category: non_empty(params.category.as_deref()),
            search: non_empty(params.search.as_deref()),
            sort: SortOrder::parse(params.sort.as_deref()),
        })
    }

    /// Documents that precede the requested page
    pub fn skip(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            category: None,
            search: None,
            sort: SortOrder::Id,
        }
    }
}

fn parse_number(name: &str, raw: Option<&str>) -> Result<Option<i64>, CatalogError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| CatalogError::Validation(format!("{} must be an integer", name))),
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
