use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResponse, UnreadCount};
use crate::error::AppResult;
use crate::middleware::User;
use crate::services::SendMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenThreadRequest {
    pub counterpart_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub content: String,
    #[serde(default)]
    pub client_message_id: Option<String>,
}

/// GET /api/v1/threads
pub async fn list_threads(state: web::Data<AppState>, user: User) -> AppResult<HttpResponse> {
    let summaries = state.messaging.list_threads(user.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(summaries)))
}

/// POST /api/v1/threads
///
/// Returns the existing thread with the counterpart, or creates it.
pub async fn open_thread(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<OpenThreadRequest>,
) -> AppResult<HttpResponse> {
    let thread = state.threads.resolve(user.id, body.counterpart_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(thread)))
}

/// GET /api/v1/threads/{id}/messages
pub async fn get_messages(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let messages = state.ledger.fetch(path.into_inner(), user.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(messages)))
}

/// POST /api/v1/threads/{id}/messages
pub async fn post_message(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
    body: web::Json<PostMessageRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let sent = state
        .messaging
        .send(
            user.id,
            SendMessage {
                thread_id: Some(path.into_inner()),
                receiver_id: None,
                content: body.content,
                client_message_id: body.client_message_id,
            },
        )
        .await?;

    Ok(match sent {
        Some(message) => HttpResponse::Created().json(ApiResponse::ok(message)),
        None => HttpResponse::NoContent().finish(),
    })
}

/// POST /api/v1/threads/{id}/read
pub async fn mark_read(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state.read_state.mark_read(path.into_inner(), user.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/v1/threads/{id}/unread
pub async fn unread_count(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let unread_count = state
        .read_state
        .unread_count(path.into_inner(), user.id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(UnreadCount { unread_count })))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/threads")
            .route("", web::get().to(list_threads))
            .route("", web::post().to(open_thread))
            .route("/{id}/messages", web::get().to(get_messages))
            .route("/{id}/messages", web::post().to(post_message))
            .route("/{id}/read", web::post().to(mark_read))
            .route("/{id}/unread", web::get().to(unread_count)),
    );
}
