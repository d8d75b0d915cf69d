//! Real-time messaging and notification core for the mentorship platform.
//!
//! One thread per pair of users, an append-only message ledger with per
//! viewer read state, best-effort fan-out to every live connection of a
//! user, and persisted notifications raised from messages and other domain
//! transitions.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod websocket;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;

use actix_web::web;

/// Every route the service exposes, including `/health` and `/metrics`.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(|| async { "OK" }))
        .route("/metrics", web::get().to(metrics::serve_metrics))
        .configure(routes::configure_routes);
}
