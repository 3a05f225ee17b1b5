//! Checkout Adapter
//! 決済プロバイダ（Stripe Checkout 互換）でセッションを作成する

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use url::form_urlencoded;

use crate::config::AppConfig;
use crate::models::CheckoutItem;

const SESSIONS_PATH: &str = "/v1/checkout/sessions";
const CURRENCY: &str = "usd";
const FALLBACK_IMAGE_PATH: &str = "/images/general/default-checkout.png";

/// 呼び出し側にはどれも `{error}` として返る。区別はメッセージのみ。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("{0}")]
    NotConfigured(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Provider(String),
}

#[derive(Deserialize)]
struct SessionResponse {
    id: Option<String>,
}

#[derive(Debug)]
pub struct CheckoutClient {
    http: reqwest::Client,
    secret_key: Option<SecretString>,
    api_base: String,
    app_url: Option<String>,
}

impl CheckoutClient {
    pub fn new(
        secret_key: Option<SecretString>,
        api_base: impl Into<String>,
        app_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            secret_key,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            app_url: app_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let secret_key = config
            .stripe_secret_key
            .as_ref()
            .map(|key| SecretString::from(key.expose_secret().to_string()));
        Self::new(
            secret_key,
            config.stripe_api_base.as_str(),
            config.app_url.clone(),
            config.external_timeout,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some() && self.app_url.is_some()
    }

    /// 前提条件を確認してからプロバイダを呼ぶ
    pub async fn create_session(&self, item: &CheckoutItem) -> Result<String, CheckoutError> {
        let secret_key = self.secret_key.as_ref().ok_or_else(|| {
            CheckoutError::NotConfigured(
                "STRIPE_SECRET_KEY is not set in environment variables. Payment functionality will be disabled."
                    .to_string(),
            )
        })?;
        let app_url = self.app_url.as_deref().ok_or_else(|| {
            CheckoutError::NotConfigured(
                "Payment processing is temporarily unavailable. Application URL is missing.".to_string(),
            )
        })?;
        if item.id.trim().is_empty() {
            return Err(CheckoutError::InvalidInput(
                "Car details are missing for checkout.".to_string(),
            ));
        }
        let price = match item.price {
            Some(p) if p.is_finite() && p > 0.0 => p,
            other => {
                warn!("Invalid car price for checkout: {:?} (car_id={})", other, item.id);
                return Err(CheckoutError::InvalidInput(
                    "Invalid car price for checkout.".to_string(),
                ));
            }
        };

        let params = session_params(item, price, app_url);
        let url = format!("{}{}", self.api_base, SESSIONS_PATH);

        let response = self
            .http
            .post(&url)
            .bearer_auth(secret_key.expose_secret())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!("Checkout session request failed: {}", e);
                CheckoutError::Provider(format!("Failed to create payment session: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Checkout provider returned {}: {}", status, body);
            return Err(CheckoutError::Provider(format!(
                "Failed to create payment session: provider returned {}",
                status
            )));
        }

        let session: SessionResponse = response.json().await.map_err(|e| {
            CheckoutError::Provider(format!("Failed to create payment session: {}", e))
        })?;
        let session_id = session
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CheckoutError::Provider("Failed to initialize payment session.".to_string()))?;

        info!("Checkout session created: car_id={}, session_id={}", item.id, session_id);
        Ok(session_id)
    }
}

/// 画像URLは決済ページ側から取得されるため絶対URLにする
pub fn absolute_image_url(image_url: Option<&str>, app_url: &str) -> String {
    match image_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => url.to_string(),
        Some(path) if path.starts_with('/') => format!("{}{}", app_url, path),
        Some(path) => format!("{}/{}", app_url, path),
        None => format!("{}{}", app_url, FALLBACK_IMAGE_PATH),
    }
}

fn encode_query_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// セント単位（整数）へ丸める
pub fn unit_amount_cents(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

fn session_params(item: &CheckoutItem, price: f64, app_url: &str) -> Vec<(&'static str, String)> {
    let description = item
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("No description available.");

    vec![
        ("payment_method_types[0]", "card".to_string()),
        ("mode", "payment".to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", CURRENCY.to_string()),
        ("line_items[0][price_data][unit_amount]", unit_amount_cents(price).to_string()),
        (
            "line_items[0][price_data][product_data][name]",
            format!("{} {}", item.make, item.model),
        ),
        ("line_items[0][price_data][product_data][description]", description.to_string()),
        (
            "line_items[0][price_data][product_data][images][0]",
            absolute_image_url(item.image_url.as_deref(), app_url),
        ),
        (
            "success_url",
            format!("{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}", app_url),
        ),
        (
            "cancel_url",
            format!("{}/payment/cancel?car_id={}", app_url, encode_query_value(&item.id)),
        ),
        ("metadata[carId]", item.id.clone()),
    ]
}
