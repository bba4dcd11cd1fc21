//! Santa Back binary entrypoint wiring the webhook, storage, and notifier layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use santa_back::{
    config::AppConfig,
    notifier::Notifier,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let notifier = build_notifier()?;

    let app_state = AppState::new(config.admin_roster(), notifier);
    init_storage(app_state.clone()).await;

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the notifier implementation from the environment: Telegram when a bot
/// token is configured, log-only otherwise.
#[cfg(feature = "telegram-notifier")]
fn build_notifier() -> anyhow::Result<Arc<dyn Notifier>> {
    use santa_back::notifier::telegram::{TelegramConfig, TelegramNotifier};
    use tracing::warn;

    match TelegramConfig::from_env() {
        Ok(telegram) => Ok(Arc::new(TelegramNotifier::new(telegram)?)),
        Err(err) => {
            warn!(error = %err, "Telegram notifier unavailable; notifications will only be logged");
            Ok(Arc::new(santa_back::notifier::log::LogNotifier))
        }
    }
}

#[cfg(not(feature = "telegram-notifier"))]
fn build_notifier() -> anyhow::Result<Arc<dyn Notifier>> {
    Ok(Arc::new(santa_back::notifier::log::LogNotifier))
}

/// Supervise a MongoDB connection in the background, entering degraded mode
/// whenever the database is unreachable.
#[cfg(feature = "mongo-store")]
async fn init_storage(state: SharedState) {
    use santa_back::dao::santa_store::SantaStore;
    use santa_back::dao::santa_store::mongodb::{MongoConfig, MongoSantaStore};
    use santa_back::dao::storage::StorageError;
    use santa_back::services::storage_supervisor;

    let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = env::var("MONGO_DB").ok();

    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoSantaStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn SantaStore>)
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
async fn init_storage(state: SharedState) {
    use santa_back::dao::santa_store::memory::MemoryStore;

    info!("mongo-store feature disabled; keeping games in process memory");
    state.install_store(Arc::new(MemoryStore::new())).await;
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
