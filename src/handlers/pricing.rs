//! Price Suggestion Handler

use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{PriceSuggestion, PriceSuggestionRequest};
use crate::AppState;

/// POST /cars/price-suggestion - AI 価格提案（参考値、出品はしない）
pub async fn suggest_price(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PriceSuggestionRequest>,
) -> Result<Json<PriceSuggestion>, ApiError> {
    let suggestion = state.pricing.suggest(&req).await?;
    Ok(Json(suggestion))
}
