//! Permission codes granted to a user

use std::collections::HashSet;

use serde::Serialize;

/// Read access to the movie catalog
pub const MOVIES_READ: &str = "movies:read";

/// Write access to the movie catalog
pub const MOVIES_WRITE: &str = "movies:write";

/// Immutable set of capability codes for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Permissions(HashSet<String>);

impl Permissions {
    /// Exact-match membership test
    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
