//! Movie model

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::validation::{unique, Validator};

/// Runtime in minutes, carried over JSON as `"<n> mins"`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Runtime(pub i32);

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl std::str::FromStr for Runtime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || "invalid runtime format".to_string();
        let (minutes, unit) = s.split_once(' ').ok_or_else(invalid)?;
        if unit != "mins" {
            return Err(invalid());
        }
        minutes.parse::<i32>().map(Runtime).map_err(|_| invalid())
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Movie entity
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Movie {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub year: i32,
    #[serde(skip_serializing_if = "is_zero_runtime")]
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: i32,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

fn is_zero_runtime(value: &Runtime) -> bool {
    value.0 == 0
}

impl Movie {
    pub fn validate(&self, v: &mut Validator) {
        v.check(!self.title.is_empty(), "title", "must be provided");
        v.check(self.title.len() <= 500, "title", "must not be more than 500 bytes long");

        v.check(self.year != 0, "year", "must be provided");
        v.check(self.year >= 1888, "year", "must be greater than 1888");
        v.check(self.year <= Utc::now().year(), "year", "must not be in the future");

        v.check(self.runtime.0 != 0, "runtime", "must be provided");
        v.check(self.runtime.0 > 0, "runtime", "must be a positive integer");

        v.check(!self.genres.is_empty(), "genres", "must contain at least 1 genre");
        v.check(self.genres.len() <= 5, "genres", "must not contain more than 5 genres");
        v.check(unique(&self.genres), "genres", "must not contain duplicate values");
    }
}

/// Create-movie request body
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMovieRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl From<CreateMovieRequest> for Movie {
    fn from(req: CreateMovieRequest) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            title: req.title,
            year: req.year,
            runtime: req.runtime,
            genres: req.genres,
            version: 1,
        }
    }
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

impl UpdateMovieRequest {
    pub fn apply(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(runtime) = self.runtime {
            movie.runtime = runtime;
        }
        if let Some(genres) = self.genres {
            movie.genres = genres;
        }
    }
}
