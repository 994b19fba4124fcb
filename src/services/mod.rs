//! Business logic services

pub mod auth;
pub mod identity;
pub mod mailer;
pub mod tokens;

pub use identity::{IdentityStore, SqlIdentityStore};
pub use mailer::{Email, Mailer};
