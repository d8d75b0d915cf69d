use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use super::{ApiResponse, UnreadCount};
use crate::error::AppResult;
use crate::middleware::User;
use crate::services::NotificationQuery;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// GET /api/v1/notifications?type=&read=&limit=
pub async fn list_notifications(
    state: web::Data<AppState>,
    user: User,
    query: web::Query<NotificationQuery>,
) -> AppResult<HttpResponse> {
    let notifications = state
        .notifications
        .list(user.id, query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(notifications)))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(state: web::Data<AppState>, user: User) -> AppResult<HttpResponse> {
    let unread_count = state.notifications.unread_count(user.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(UnreadCount { unread_count })))
}

/// PUT /api/v1/notifications/{id}/read
pub async fn mark_as_read(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .notifications
        .mark_read(path.into_inner(), user.id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /api/v1/notifications/read-all
pub async fn mark_all_read(state: web::Data<AppState>, user: User) -> AppResult<HttpResponse> {
    let updated = state.notifications.mark_all_read(user.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(MarkAllReadResponse { updated })))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/notifications")
            .route("", web::get().to(list_notifications))
            .route("/unread-count", web::get().to(unread_count))
            .route("/read-all", web::put().to(mark_all_read))
            .route("/{id}/read", web::put().to(mark_as_read)),
    );
}
