//! Price Suggestion Adapter
//! 車両情報をテキスト生成API（Gemini generateContent 互換）に渡して価格提案を得る

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::models::{Condition, PriceSuggestion, PriceSuggestionRequest};

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("Price suggestion is unavailable: GEMINI_API_KEY is not configured.")]
    NotConfigured,

    #[error("Please fill in Make, Model, Year, Mileage, and Condition to get a price suggestion.")]
    MissingDetails,

    #[error("Price suggestion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Price suggestion service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Price suggestion response was malformed: {0}")]
    Malformed(String),
}

/// 正規化済みの入力
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleDescription {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub mileage: i64,
    pub condition: Condition,
    pub additional_details: Option<String>,
}

impl TryFrom<&PriceSuggestionRequest> for VehicleDescription {
    type Error = PricingError;

    fn try_from(req: &PriceSuggestionRequest) -> Result<Self, Self::Error> {
        let make = req.make.trim();
        let model = req.model.trim();
        let condition = req.condition.trim();
        match (req.year, req.mileage) {
            (Some(year), Some(mileage))
                if !make.is_empty() && !model.is_empty() && !condition.is_empty() =>
            {
                Ok(Self {
                    make: make.to_string(),
                    model: model.to_string(),
                    year,
                    mileage,
                    condition: Condition::normalize(condition),
                    additional_details: req
                        .additional_details
                        .as_deref()
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_string),
                })
            }
            _ => Err(PricingError::MissingDetails),
        }
    }
}

impl VehicleDescription {
    pub fn prompt(&self) -> String {
        format!(
            "You are an expert car appraiser. Given the details of a car, you will suggest a competitive listing price.\n\
             \n\
             Make: {}\n\
             Model: {}\n\
             Year: {}\n\
             Mileage: {}\n\
             Condition: {}\n\
             Additional Details: {}\n\
             \n\
             Suggest a listing price and explain your reasoning. The suggested price should be in US dollars.\n\
             Respond with JSON of the form {{\"suggestedPrice\": number, \"reasoning\": string}}.",
            self.make,
            self.model,
            self.year,
            self.mileage,
            self.condition,
            self.additional_details.as_deref().unwrap_or(""),
        )
    }
}

// ========================================
// Wire types
// ========================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// ========================================
// Client
// ========================================

#[derive(Debug)]
pub struct PriceSuggester {
    http: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
}

impl PriceSuggester {
    pub fn new(
        api_key: Option<SecretString>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let api_key = config
            .gemini_api_key
            .as_ref()
            .map(|key| SecretString::from(key.expose_secret().to_string()));
        Self::new(
            api_key,
            config.gemini_api_base.as_str(),
            config.gemini_model.as_str(),
            config.external_timeout,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// 入力を正規化して提案を取得する。結果は参考値。
    pub async fn suggest(&self, req: &PriceSuggestionRequest) -> Result<PriceSuggestion, PricingError> {
        let vehicle = VehicleDescription::try_from(req)?;
        let api_key = self.api_key.as_ref().ok_or(PricingError::NotConfigured)?;

        let prompt = vehicle.prompt();
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        info!(
            "Requesting price suggestion: {} {} {} ({} mi, {})",
            vehicle.year, vehicle.make, vehicle.model, vehicle.mileage, vehicle.condition
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("Price suggestion service error: status={}", status);
            return Err(PricingError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let generated: GenerateResponse = response.json().await?;
        let text = generated
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| PricingError::Malformed("no candidate text".to_string()))?;

        let suggestion = parse_suggestion(&text)?;
        info!("Price suggested: ${:.0}", suggestion.suggested_price);
        Ok(suggestion)
    }
}

/// モデル出力（```json フェンス付きも可）から提案を取り出す
pub fn parse_suggestion(text: &str) -> Result<PriceSuggestion, PricingError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    let suggestion: PriceSuggestion =
        serde_json::from_str(unfenced.trim()).map_err(|e| PricingError::Malformed(e.to_string()))?;

    if !suggestion.suggested_price.is_finite() || suggestion.suggested_price < 0.0 {
        return Err(PricingError::Malformed(format!(
            "invalid suggested price {}",
            suggestion.suggested_price
        )));
    }
    Ok(suggestion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1beta/models/gemini-test:generateContent";

    fn request() -> PriceSuggestionRequest {
        PriceSuggestionRequest {
            make: "Honda".into(),
            model: "Civic".into(),
            year: Some(2018),
            mileage: Some(60000),
            condition: "Like new, garage kept".into(),
            additional_details: Some("".into()),
        }
    }

    fn suggester(base: &str, key: Option<&str>) -> PriceSuggester {
        PriceSuggester::new(
            key.map(|k| SecretString::from(k.to_string())),
            base,
            "gemini-test",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn candidate(text: &str) -> serde_json::Value {
        json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }] })
    }

    #[test]
    fn request_is_normalized() {
        let vehicle = VehicleDescription::try_from(&request()).unwrap();
        assert_eq!(vehicle.condition, Condition::UsedLikeNew);
        assert_eq!(vehicle.additional_details, None);
        let prompt = vehicle.prompt();
        assert!(prompt.contains("Make: Honda"));
        assert!(prompt.contains("Condition: used - like new"));
    }

    #[test]
    fn kebab_condition_reaches_prompt_unchanged() {
        let mut req = request();
        req.condition = "used-like-new".into();
        let prompt = VehicleDescription::try_from(&req).unwrap().prompt();
        assert!(prompt.contains("Condition: used - like new"));
        assert!(!prompt.contains("Condition: new"));
    }

    #[test]
    fn missing_details_are_rejected() {
        let mut req = request();
        req.mileage = None;
        assert!(matches!(VehicleDescription::try_from(&req), Err(PricingError::MissingDetails)));
        let mut req = request();
        req.model = "  ".into();
        assert!(matches!(VehicleDescription::try_from(&req), Err(PricingError::MissingDetails)));
    }

    #[test]
    fn parse_accepts_fenced_json() {
        let s = parse_suggestion("```json\n{\"suggestedPrice\": 15500, \"reasoning\": \"Low miles\"}\n```").unwrap();
        assert_eq!(s.suggested_price, 15500.0);
        assert_eq!(s.reasoning, "Low miles");
        assert!(matches!(parse_suggestion("fifteen grand"), Err(PricingError::Malformed(_))));
        assert!(matches!(
            parse_suggestion("{\"suggestedPrice\": -1, \"reasoning\": \"x\"}"),
            Err(PricingError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn suggest_calls_generate_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(
                "{\"suggestedPrice\": 17250.5, \"reasoning\": \"Clean history\"}",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let result = suggester(&server.uri(), Some("test-key")).suggest(&request()).await.unwrap();
        assert_eq!(
            result,
            PriceSuggestion {
                suggested_price: 17250.5,
                reasoning: "Clean history".into()
            }
        );

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("Mileage: 60000"));
    }

    #[tokio::test]
    async fn upstream_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = suggester(&server.uri(), Some("k")).suggest(&request()).await.unwrap_err();
        assert!(matches!(err, PricingError::Upstream { status: 429, ref message } if message == "quota exceeded"));
    }

    #[tokio::test]
    async fn unconfigured_never_calls_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = suggester(&server.uri(), None).suggest(&request()).await.unwrap_err();
        assert!(matches!(err, PricingError::NotConfigured));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(candidate("{\"suggestedPrice\": 1, \"reasoning\": \"x\"}"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = PriceSuggester::new(
            Some(SecretString::from("k".to_string())),
            server.uri(),
            "gemini-test",
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client.suggest(&request()).await.unwrap_err();
        assert!(matches!(err, PricingError::Http(ref e) if e.is_timeout()));
    }
}
