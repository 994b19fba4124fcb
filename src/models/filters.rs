//! Pagination and sorting for list endpoints

use std::collections::HashMap;

use serde::Serialize;

use crate::utils::validation::{permitted_value, Validator};

/// Sort keys accepted by the movie listing
pub const MOVIE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    pub fn validate(&self, v: &mut Validator) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= 10_000_000, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(self.page_size <= 100, "page_size", "must be a maximum of 100");
        v.check(
            permitted_value(&self.sort, self.sort_safelist),
            "sort",
            "invalid sort value",
        );
    }

    /// Column to order by. Only call after [`Filters::validate`] passed.
    pub fn sort_column(&self) -> &str {
        self.sort_safelist
            .iter()
            .find(|safe| **safe == self.sort)
            .map(|safe| safe.trim_start_matches('-'))
            .unwrap_or("id")
    }

    pub fn sort_descending(&self) -> bool {
        self.sort.starts_with('-')
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Pagination metadata; serializes as `{}` when there are no records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

/// Typed readers over a raw query string map
pub struct QueryParams<'a> {
    params: &'a HashMap<String, String>,
}

impl<'a> QueryParams<'a> {
    pub fn new(params: &'a HashMap<String, String>) -> Self {
        Self { params }
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        match self.params.get(key) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => default.to_string(),
        }
    }

    pub fn csv(&self, key: &str) -> Vec<String> {
        match self.params.get(key) {
            Some(value) if !value.is_empty() => value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn int(&self, key: &str, default: i64, v: &mut Validator) -> i64 {
        match self.params.get(key) {
            Some(value) if !value.is_empty() => match value.parse() {
                Ok(parsed) => parsed,
                Err(_) => {
                    v.add_error(key, "must be an integer value");
                    default
                }
            },
            _ => default,
        }
    }
}
