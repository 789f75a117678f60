//! HTTP handlers, grouped by area.
//!
//! Handlers on protected routes take [`AuthUser`](crate::auth::AuthUser)
//! and check their permission first, before touching the body.

pub mod management;
pub mod packages;
pub mod public;
pub mod qrcodes;
pub mod session;
pub mod ws;

use serde::Serialize;

/// `{ "data": ... }` envelope used by every list endpoint.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        DataResponse { data }
    }
}

/// `{ "message": ... }` body for mutations with nothing else to return.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        MessageResponse {
            message: message.into(),
        }
    }
}
