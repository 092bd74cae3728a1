//! Solace server entry point: load settings, build the in-memory store and
//! WebSocket broadcaster, and bind the actix-web HTTP surface.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing::info;

use solace::config::Settings;
use solace::events::EventSink;
#[cfg(not(feature = "postgres"))]
use solace::store::memory::MemoryStore;
use solace::store::Store;
use solace::web::ws::WsBroadcaster;
use solace::web::{configure, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let settings = Settings::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(settings.log_level.clone()))
        .init();

    if let Err(err) = settings.validate() {
        eprintln!("invalid configuration: {err}");
        std::process::exit(1);
    }

    info!(app = %settings.app_name, env = %settings.app_env, "starting solace");

    let store: Arc<dyn Store> = build_store(&settings).await;
    let broadcaster = Arc::new(WsBroadcaster::new());
    let events: Arc<dyn EventSink> = broadcaster.clone();
    let settings = Arc::new(settings);

    let app_state = AppState {
        store,
        events,
        settings: settings.clone(),
    };

    let bind_addr = (settings.host.clone(), settings.port);
    info!(host = %bind_addr.0, port = bind_addr.1, "listening");

    HttpServer::new(move || {
        let prefix = app_state.settings.api_prefix.clone();
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(app_state.settings.as_ref().clone()))
            .app_data(web::Data::new(broadcaster.clone()))
            .wrap(actix_web::middleware::Logger::default())
            .configure(move |cfg| configure(cfg, &prefix))
    })
    .bind(bind_addr)?
    .run()
    .await
}

#[cfg(feature = "postgres")]
async fn build_store(settings: &Settings) -> Arc<dyn Store> {
    use solace::store::postgres::PostgresStore;

    match PostgresStore::connect(&settings.database_url, settings.database_pool_size).await {
        Ok(store) => {
            if let Err(err) = store.migrate().await {
                eprintln!("postgres migration failed: {err}");
                std::process::exit(1);
            }
            Arc::new(store)
        }
        Err(err) => {
            eprintln!("failed to connect to postgres: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn build_store(_settings: &Settings) -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}
