//! Caller identity.
//!
//! Authentication happens upstream; the gateway forwards the verified user id
//! in a header (`IDENTITY_HEADER`, default `x-user-id`).

use std::future::{ready, Ready};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, FromRequest, HttpRequest};

const DEFAULT_IDENTITY_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
}

impl User {
    pub fn from_headers(req: &HttpRequest) -> Result<Self, AppError> {
        let header = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.config.app.identity_header.as_str())
            .unwrap_or(DEFAULT_IDENTITY_HEADER);

        let id = req
            .headers()
            .get(header)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or(AppError::Unauthorized)?;

        Ok(User { id })
    }
}

impl FromRequest for User {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(User::from_headers(req))
    }
}
