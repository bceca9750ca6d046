mod config;
mod drafts;
mod error;
mod negotiate;
mod pages;
mod preview;
mod routes;

use std::sync::Arc;

use config::AppConfig;
use jotter_core::render::RenderWorker;
use jotter_core::services::NoteService;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jotter=info".parse().expect("valid directive"))
                .add_directive("jotter_core=info".parse().expect("valid directive")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting jotter with config: {:?}", config);

    let notes = NoteService::open_path(&config.data_dir).await?;
    let renderer = RenderWorker::spawn()?;
    let state = AppState::new(config, notes, renderer);
    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("jotter listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
