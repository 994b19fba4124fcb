//! Panic recovery
//!
//! Outermost layer. A panic anywhere below it becomes a single 500 response
//! and the connection is closed, since the state that panicked is not
//! trusted to keep serving that connection.

use std::any::Any;

use axum::{
    http::{header::CONNECTION, HeaderValue},
    response::{IntoResponse, Response},
};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use crate::utils::AppError;

pub type RecoverLayer = CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response>;

pub fn recover_layer() -> RecoverLayer {
    CatchPanicLayer::custom(handle_panic as fn(Box<dyn Any + Send + 'static>) -> Response)
}

fn panic_message(err: &(dyn Any + Send)) -> &str {
    if let Some(s) = err.downcast_ref::<String>() {
        s
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic_message(err.as_ref());
    error!(panic = %message, "Recovered from handler panic");

    let mut response = AppError::Internal(format!("panic: {}", message)).into_response();
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));
    response
}
