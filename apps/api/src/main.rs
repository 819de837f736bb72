use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use interview_api::backend::BackendContext;
use interview_api::config::Config;
use interview_api::generation::generator::LlmQuestionGenerator;
use interview_api::llm_client::{self, LlmClient};
use interview_api::routes::build_router;
use interview_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("interview_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Connect the document and blob stores (signs in for Firebase)
    let backend = BackendContext::initialize(&config.backend).await?;
    info!("Backend initialized (session: {})", backend.session.uid);

    // Initialize LLM client
    let llm = LlmClient::new(
        config.gemini_api_key.clone(),
        config.llm_base_url.clone(),
        config.llm_max_attempts,
    );
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let generator = Arc::new(LlmQuestionGenerator(llm));

    let state = AppState::new(config.clone(), backend, generator);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
