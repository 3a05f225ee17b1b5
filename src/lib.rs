//! Car marketplace API
//! 出品一覧・フィルタ・出品フォーム・価格提案・決済

pub mod checkout;
pub mod config;
pub mod error;
pub mod filter;
pub mod fixtures;
pub mod handlers;
pub mod models;
pub mod pricing;
pub mod store;
pub mod submission;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::checkout::CheckoutClient;
use crate::config::AppConfig;
use crate::pricing::PriceSuggester;
use crate::store::ListingStore;
use crate::submission::{PhotoStorage, SubmissionPipeline, UPLOAD_PUBLIC_PREFIX};

// ========================================
// アプリケーション状態
// ========================================

#[derive(Debug)]
pub struct AppState {
    pub store: Arc<ListingStore>,
    pub submissions: SubmissionPipeline,
    pub pricing: PriceSuggester,
    pub checkout: CheckoutClient,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<ListingStore>) -> Result<Self, reqwest::Error> {
        let photos = PhotoStorage::new(config.upload_dir.clone());
        Ok(Self {
            submissions: SubmissionPipeline::new(store.clone(), photos),
            pricing: PriceSuggester::from_config(config)?,
            checkout: CheckoutClient::from_config(config)?,
            store,
        })
    }
}

// ========================================
// ルーター
// ========================================

pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    let uploads = ServeDir::new(state.submissions.photo_dir());

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/cars", get(handlers::cars::list_cars).post(handlers::cars::create_car))
        .route("/cars/featured", get(handlers::cars::featured_cars))
        .route("/cars/catalog", get(handlers::cars::car_catalog))
        .route("/cars/price-suggestion", post(handlers::pricing::suggest_price))
        .route("/cars/:id", get(handlers::cars::get_car))
        .route("/cars/:id/checkout", post(handlers::checkout::checkout_car))
        .route("/checkout", post(handlers::checkout::create_checkout))
        .route("/payment/success", get(handlers::payment::payment_success))
        .route("/payment/cancel", get(handlers::payment::payment_cancel))
        .nest_service(UPLOAD_PUBLIC_PREFIX, uploads)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
