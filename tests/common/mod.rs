//! Shared test infrastructure
//!
//! - Test application with a throwaway database
//! - Seeded users and tokens
//! - Identity store fakes

pub mod fixtures;
pub mod mocks;
pub mod test_app;

pub use factories::*;
pub use fixtures::*;
pub use mocks::*;
pub use test_app::*;
