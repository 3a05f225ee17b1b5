//! Checkout Handlers
//! レスポンスは `{sessionId}` か `{error}` のどちらか一方

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tracing::warn;

use crate::checkout::CheckoutError;
use crate::models::{CheckoutItem, CheckoutOutcome};
use crate::AppState;

type CheckoutReply = (StatusCode, Json<CheckoutOutcome>);

/// POST /checkout - 投影を直接受け取ってセッション作成
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Json(item): Json<CheckoutItem>,
) -> CheckoutReply {
    run_checkout(&state, &item).await
}

/// POST /cars/:id/checkout - ストアの Listing からセッション作成
pub async fn checkout_car(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> CheckoutReply {
    match state.store.find_by_id(&id) {
        Some(listing) => run_checkout(&state, &listing.checkout_item()).await,
        None => {
            warn!("Checkout requested for unknown car: {}", id);
            (
                StatusCode::NOT_FOUND,
                Json(CheckoutOutcome::Failed {
                    error: "Car not found".to_string(),
                }),
            )
        }
    }
}

async fn run_checkout(state: &AppState, item: &CheckoutItem) -> CheckoutReply {
    match state.checkout.create_session(item).await {
        Ok(session_id) => (StatusCode::OK, Json(CheckoutOutcome::Session { session_id })),
        Err(e) => {
            let status = match e {
                CheckoutError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                CheckoutError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CheckoutError::Provider(_) => StatusCode::BAD_GATEWAY,
            };
            warn!("Checkout failed: {} ({})", e, status);
            (status, Json(CheckoutOutcome::Failed { error: e.to_string() }))
        }
    }
}
