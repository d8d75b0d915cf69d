pub mod events;
pub mod notifications;
pub mod threads;
pub mod wsroute;

use actix_web::web;
use serde::Serialize;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: i64,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(wsroute::ws_handler);
    threads::register_routes(cfg);
    notifications::register_routes(cfg);
    events::register_routes(cfg);
}
