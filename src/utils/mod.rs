//! Shared helpers: error envelope, validation, request body decoding

pub mod error;
pub mod json;
pub mod validation;

pub use error::{AppError, AppResult};
pub use json::JsonBody;
pub use validation::Validator;
