use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};

use dailyleft_backend::domain::parser::FallbackParser;
use dailyleft_backend::io::rest::{self, AppState};
use dailyleft_backend::storage::DbConnection;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Setting up database");
    let db = DbConnection::init().await?;

    // Wire up the engine and its reactive listeners. The fallback parser
    // stands in until an AI collaborator is configured.
    let state = AppState::new(&db, Arc::new(FallbackParser::new()));
    state.engine.start();

    // CORS setup to allow a frontend to make requests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", rest::router(state))
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
