//! Pagination, sorting and filtering for list views
//!
//! A `ListQuery` is the full query shape of a derived view; its tokens feed
//! directly into the view's cache key, so two distinct shapes can never
//! collide on one key.

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

const MAX_LIMIT: u32 = 100;

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

/// Query parameters shared by every paginated listing
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub sort: Option<String>,
    pub status: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            sort: None,
            status: None,
        }
    }
}

impl ListQuery {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.page == 0 || self.limit == 0 {
            return Err(DomainError::validation("Invalid pagination parameters"));
        }
        if self.limit > MAX_LIMIT {
            return Err(DomainError::validation(format!(
                "Limit must not exceed {MAX_LIMIT}"
            )));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    /// Resolves the sort field against a whitelist, falling back to the
    /// first (default) entry for anything unrecognized
    pub fn sort_field<'a>(&'a self, allowed: &[&'a str]) -> &'a str {
        match &self.sort {
            Some(sort) if allowed.contains(&sort.as_str()) => sort,
            _ => allowed[0],
        }
    }

    /// Status discriminator token for key construction
    pub fn status_token(&self) -> &str {
        self.status.as_deref().unwrap_or("all")
    }
}

/// One page of a derived view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, query: &ListQuery) -> Self {
        Self {
            total,
            page: query.page,
            limit: query.limit,
            total_pages: total.div_ceil(u64::from(query.limit.max(1))),
            items,
        }
    }
}
