//! Pool Hall entry point
//!
//! Loads settings, wires the store, engine and renderer together, and serves
//! the game over HTTP.

use std::process::ExitCode;
use std::sync::Arc;

use pool_hall::http::{AppState, router};
use pool_hall::persistence::{FileStore, MemoryStore, TableStore};
use pool_hall::physics::{EngineConfig, PoolEngine};
use pool_hall::renderer::SvgRenderer;
use pool_hall::table::RackLayout;
use pool_hall::{SessionManager, Settings, StoreBackend};

fn open_store(settings: &Settings) -> Result<Arc<dyn TableStore>, String> {
    match settings.store {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::File => {
            let store = FileStore::open(&settings.store_path).map_err(|e| e.to_string())?;
            log::info!(
                "Opened table log {} ({} tables)",
                store.path().display(),
                store.len()
            );
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Pool Hall starting...");

    let settings = Settings::load();

    let store = match open_store(&settings) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Cannot open table store: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let engine = PoolEngine::new(EngineConfig {
        frame_interval: settings.frame_interval,
        ..EngineConfig::default()
    });
    let sessions = SessionManager::new(store, Arc::new(engine), Arc::new(SvgRenderer::default()))
        .with_rack(RackLayout::new(settings.rack_rows, settings.rack_jitter))
        .with_game_name(settings.game_name.clone());

    let seed = settings.seed.unwrap_or_else(rand::random);
    log::info!("Rack seed: {}", seed);

    let state = AppState::new(sessions, seed, settings.static_dir.clone());
    let listener = match tokio::net::TcpListener::bind(&settings.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Cannot bind {}: {}", settings.bind, e);
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "Listening on http://{} ({} store)",
        settings.bind,
        settings.store.as_str()
    );

    if let Err(e) = axum::serve(listener, router(state)).await {
        log::error!("Server stopped: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
