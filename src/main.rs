use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use car_market::config::AppConfig;
use car_market::store::ListingStore;
use car_market::{router, AppState};

// ========================================
// メイン
// ========================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ログ初期化
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let store = Arc::new(ListingStore::initialize());
    let state = AppState::new(&config, store).context("Failed to build HTTP clients")?;

    if !state.checkout.is_configured() {
        warn!("STRIPE_SECRET_KEY or APP_URL is not set; checkout is disabled");
    }
    if !state.pricing.is_configured() {
        warn!("GEMINI_API_KEY is not set; price suggestions are disabled");
    }

    let app = router(Arc::new(state), config.max_body_bytes);

    info!("🚗 Car Market API Server listening on {}", config.bind_addr);
    info!("📦 Max body size: {} bytes", config.max_body_bytes);
    info!("🖼  Photo uploads stored in {:?}", config.upload_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
