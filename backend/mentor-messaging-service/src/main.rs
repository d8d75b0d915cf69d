use actix_web::{middleware, web, App, HttpServer};
use mentor_messaging_service::{
    config::StoreBackend,
    configure_app, db, logging, metrics,
    store::{DynStore, MemoryStore, PgStore},
    AppState, Config,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = Config::from_env()?;
    tracing::info!(
        env = %config.app.env,
        store = ?config.store,
        "starting mentor-messaging-service"
    );

    let store: DynStore = match config.store {
        StoreBackend::Postgres => {
            let pool = db::init_pool(&config.database).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; nothing survives a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = config.bind_addr();
    let state = web::Data::new(AppState::new(config, store));

    tracing::info!("Starting HTTP server on {}", addr);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .configure(configure_app)
    })
    .bind(&addr)?
    .run()
    .await?;

    tracing::info!("mentor-messaging-service stopped");
    Ok(())
}
