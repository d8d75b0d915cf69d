//! Intake for domain transitions raised by the scheduling, connection and
//! approval subsystems. Not exposed through the public gateway.

use actix_web::{web, HttpResponse};

use super::ApiResponse;
use crate::error::AppResult;
use crate::models::DomainEvent;
use crate::state::AppState;

/// POST /api/v1/events
pub async fn ingest_event(
    state: web::Data<AppState>,
    body: web::Json<DomainEvent>,
) -> AppResult<HttpResponse> {
    let notification = state.notifications.dispatch(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(notification)))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/v1/events").route("", web::post().to(ingest_event)));
}
