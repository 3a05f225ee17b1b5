//! Configuration
//! 環境変数（.env 含む）からサーバー設定を読み込む

use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    /// 写真の保存先（ServeDir で /images/uploads として公開）
    pub upload_dir: PathBuf,
    pub max_body_bytes: usize,
    /// 外部API呼び出しのタイムアウト
    pub external_timeout: Duration,
    /// 決済の success/cancel URL と画像の絶対URL生成に使う
    pub app_url: Option<String>,
    pub stripe_secret_key: Option<SecretString>,
    pub stripe_api_base: String,
    pub gemini_api_key: Option<SecretString>,
    pub gemini_api_base: String,
    pub gemini_model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            upload_dir: PathBuf::from("./public/images/uploads"),
            max_body_bytes: 10 * 1024 * 1024,
            external_timeout: Duration::from_secs(30),
            app_url: None,
            stripe_secret_key: None,
            stripe_api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            gemini_api_key: None,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

impl AppConfig {
    /// `.env` を読み込んだ上で環境変数からデフォルトを上書きする
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment from {:?}", path),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Failed to read .env file: {}", e),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から設定を構築する（テスト用に分離）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("CAR_MARKET_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(dir) = get("CAR_MARKET_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("CAR_MARKET_MAX_BODY_BYTES") {
            config.max_body_bytes = parse_number("CAR_MARKET_MAX_BODY_BYTES", raw)?;
        }
        if let Some(raw) = get("CAR_MARKET_EXTERNAL_TIMEOUT_SECS") {
            config.external_timeout =
                Duration::from_secs(parse_number("CAR_MARKET_EXTERNAL_TIMEOUT_SECS", raw)?);
        }

        config.app_url = get("APP_URL").map(|url| url.trim_end_matches('/').to_string());
        config.stripe_secret_key = get("STRIPE_SECRET_KEY").map(SecretString::from);
        if let Some(base) = get("STRIPE_API_BASE") {
            config.stripe_api_base = base;
        }
        config.gemini_api_key = get("GEMINI_API_KEY").map(SecretString::from);
        if let Some(base) = get("GEMINI_API_BASE") {
            config.gemini_api_base = base;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            config.gemini_model = model;
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { key, value })
}
