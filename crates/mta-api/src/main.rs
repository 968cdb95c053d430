//! Process entry point (`§6.7`). Grounded on the teacher's `everruns-api::main`: load `.env`,
//! install a `tracing-subscriber` with `EnvFilter`, build the storage backend and the runner,
//! assemble the router, serve. The teacher picks its backend by URL scheme at startup; this
//! binary does the same between the in-memory store and Postgres.

mod error;
mod routes;
mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use mta_core::config::EngineConfig;
use mta_core::traits::{GameClient, VoiceCoordinator};
use mta_runner::{RunnerDeps, TestRunner};
use mta_storage::{InMemoryRepository, PostgresRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::ApiState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("mta_api=info".parse()?))
        .init();

    let config = EngineConfig::from_env();

    let repository: Arc<dyn mta_core::traits::Repository> = match &config.database_url {
        Some(url) => {
            tracing::info!("connecting to postgres");
            let repo = PostgresRepository::connect(url).await?;
            repo.migrate().await?;
            Arc::new(repo)
        }
        None => {
            tracing::info!("no DATABASE_URL set, using the in-memory repository");
            Arc::new(InMemoryRepository::new())
        }
    };

    let llm_provider = Arc::new(mta_llm::OpenRouterProvider::from_env()?);
    let game_client = no_game_client();
    let voice: Option<Arc<dyn VoiceCoordinator>> = None;

    let runner = Arc::new(TestRunner::new(
        RunnerDeps { repository, game_client, llm_provider, voice },
        config.clone(),
    ));

    let state = ApiState { runner: runner.clone() };
    let ws_router = Router::new().route("/ws/tests", get(ws::test_stream)).with_state(state.clone());

    let app = Router::new()
        .route("/health", get(health))
        .merge(routes::routes(state))
        .merge(ws_router)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "test orchestration engine listening");

    let serve_result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;
    runner.shutdown().await;
    serve_result?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// No Minecraft/Discord adapter ships with this engine (`§6.3`, `§9` Non-goals): production
/// wiring plugs a real [`GameClient`] in here; until then every bot operation fails cleanly.
fn no_game_client() -> Arc<dyn GameClient> {
    Arc::new(mta_core::traits::UnconfiguredGameClient)
}
