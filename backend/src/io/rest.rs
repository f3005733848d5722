//! REST surface for the budget engine.
//!
//! Thin axum adapters over the engine and services; no business rules
//! here. Mutating endpoints rely on the store's change notifications to
//! bring the engine up to date.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use shared::{
    CreateTransactionRequest, ParseTextRequest, SessionRequest, StatsResponse,
    UpdateSettingsRequest,
};
use tracing::info;

use crate::domain::engine::BudgetEngine;
use crate::domain::parser::TextParser;
use crate::domain::settings_service::SettingsService;
use crate::domain::stats;
use crate::domain::transaction_service::TransactionService;
use crate::storage::DbConnection;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: BudgetEngine<DbConnection>,
    pub transaction_service: TransactionService<DbConnection>,
    pub settings_service: SettingsService<DbConnection>,
    pub parser: Arc<dyn TextParser>,
}

impl AppState {
    /// Create new application state over one storage connection
    pub fn new(connection: &DbConnection, parser: Arc<dyn TextParser>) -> Self {
        Self {
            engine: BudgetEngine::new(connection.clone()),
            transaction_service: TransactionService::new(connection),
            settings_service: SettingsService::new(connection),
            parser,
        }
    }
}

/// Build the API router. Mounted under `/api` by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/refresh", post(refresh))
        .route("/session", post(open_session).delete(close_session))
        .route("/transactions", post(create_transaction))
        .route("/transactions/:id", delete(delete_transaction))
        .route("/settings", put(update_settings))
        .route("/stats", get(get_stats))
        .route("/parse", post(parse_text))
        .with_state(state)
}

/// GET /api/state
async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.state())
}

/// POST /api/refresh
async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    info!("POST /api/refresh");
    state.engine.refresh().await;
    Json(state.engine.state())
}

/// POST /api/session
async fn open_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> impl IntoResponse {
    info!("POST /api/session - user: {}", request.user_id);
    state.engine.sign_in(&request.user_id).await;
    Json(state.engine.state())
}

/// DELETE /api/session
async fn close_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("DELETE /api/session");
    state.engine.sign_out().await;
    StatusCode::NO_CONTENT
}

/// POST /api/transactions
async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> impl IntoResponse {
    let Some(user_id) = state.engine.current_user() else {
        return (StatusCode::CONFLICT, "No active session").into_response();
    };
    info!("POST /api/transactions - user: {}", user_id);

    match state.transaction_service.create_transaction(&user_id, request).await {
        Ok(transaction) => (StatusCode::CREATED, Json(transaction)).into_response(),
        Err(e) => {
            tracing::error!("Error creating transaction: {:?}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// DELETE /api/transactions/:id
async fn delete_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> impl IntoResponse {
    let Some(user_id) = state.engine.current_user() else {
        return (StatusCode::CONFLICT, "No active session").into_response();
    };
    info!("DELETE /api/transactions/{}", transaction_id);

    match state.transaction_service.delete_transaction(&user_id, &transaction_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Transaction not found").into_response(),
        Err(e) => {
            tracing::error!("Error deleting transaction: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error deleting transaction").into_response()
        }
    }
}

/// PUT /api/settings
async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> impl IntoResponse {
    let engine_state = state.engine.state();
    let (Some(user_id), Some(cycle)) = (engine_state.user_id, engine_state.cycle) else {
        return (StatusCode::CONFLICT, "No active cycle").into_response();
    };
    info!("PUT /api/settings - user: {} cycle: {}", user_id, cycle.key);

    match state.settings_service.update(&user_id, &cycle.key, request).await {
        Ok(settings) => (StatusCode::OK, Json(settings)).into_response(),
        Err(e) => {
            tracing::error!("Error updating settings: {:?}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// GET /api/stats
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let engine_state = state.engine.state();
    Json(StatsResponse {
        categories: stats::category_breakdown(&engine_state.transactions),
        daily: stats::daily_totals(&engine_state.recent_transactions),
    })
}

/// POST /api/parse
async fn parse_text(
    State(state): State<AppState>,
    Json(request): Json<ParseTextRequest>,
) -> impl IntoResponse {
    info!("POST /api/parse");
    match state.parser.parse(&request.text).await {
        Ok(parsed) => (StatusCode::OK, Json(parsed)).into_response(),
        Err(e) => {
            tracing::error!("Error parsing text: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error parsing text").into_response()
        }
    }
}
