//! Data models

mod filters;
mod movie;
mod permission;
mod token;
mod user;

pub use filters::*;
pub use movie::*;
pub use permission::*;
pub use token::*;
pub use user::*;
