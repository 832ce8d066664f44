//! Chat handoff - web chat session controller
//!
//! Paces bot replies into a chat window, tracks the response wait, and hands
//! the conversation off from the bot to a human agent on request.

mod api;
mod backend;
mod commands;
mod config;
mod handoff;
mod message;
mod runtime;
mod state_machine;
mod translator;

use api::{create_router, AppState};
use config::SessionConfig;
use runtime::spawn_production_session;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_handoff=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = SessionConfig::from_env();
    let port: u16 = std::env::var("CHAT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    tracing::info!(
        user_id = %config.user_id,
        host = %config.host,
        live_chat = %config.live_chat.api_base,
        "Session configured"
    );

    let (session, session_task) = spawn_production_session(&config)?;
    let state = AppState::new(session.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Tear the session down: stop timers, close any live-agent connection
    if let Err(e) = session.shutdown().await {
        tracing::debug!(error = %e, "Session already stopped");
    }
    session_task.await?;
    tracing::info!("Chat server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
