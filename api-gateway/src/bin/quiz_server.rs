//! Quiz server - serves the quiz API on the configured port.
//!
//! Questions are generated by the configured text-generation backend and
//! stored in Postgres.

use std::net::SocketAddr;
use std::sync::Arc;

use api_gateway::{router, AppState};
use shared::{create_pool, Config, GenerationClient, PgQuestionStore, QuestionStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    let store = PgQuestionStore::new(create_pool(&config)?);
    if let Err(e) = store.ensure_schema().await {
        warn!(error = %e, "Database not ready at startup, questions will not be saved until it is");
    }

    let state = Arc::new(AppState {
        generator: GenerationClient::from_config(&config)?,
        store: Arc::new(store),
        max_questions: config.max_questions,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        backend = %config.backend_url,
        model = %config.backend_model,
        "Quiz server listening"
    );

    axum::serve(listener, router(state)).await?;
    Ok(())
}
