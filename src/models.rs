//! Data Models
//! Listing（車両出品）と状態区分などのデータ構造定義

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ========================================
// Condition
// ========================================

/// 車両の状態（5区分のみ有効）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "used - like new", alias = "used-like-new")]
    UsedLikeNew,
    #[serde(rename = "used - good", alias = "used-good")]
    UsedGood,
    #[serde(rename = "used - fair", alias = "used-fair")]
    UsedFair,
    #[serde(rename = "used - poor", alias = "used-poor")]
    UsedPoor,
}

impl Condition {
    pub const ALL: [Condition; 5] = [
        Condition::New,
        Condition::UsedLikeNew,
        Condition::UsedGood,
        Condition::UsedFair,
        Condition::UsedPoor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::UsedLikeNew => "used - like new",
            Condition::UsedGood => "used - good",
            Condition::UsedFair => "used - fair",
            Condition::UsedPoor => "used - poor",
        }
    }

    fn kebab(self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::UsedLikeNew => "used-like-new",
            Condition::UsedGood => "used-good",
            Condition::UsedFair => "used-fair",
            Condition::UsedPoor => "used-poor",
        }
    }

    /// 自由記述の状態文字列をキーワードで5区分に寄せる
    ///
    /// 表示形式・kebab 形式ならそのまま採用。それ以外は "like new" を "new" より先に判定し、
    /// どれにも当たらなければ used - good。
    pub fn normalize(text: &str) -> Condition {
        if let Ok(condition) = text.parse() {
            return condition;
        }
        let lower = text.to_lowercase().replace(['-', '_'], " ");
        if lower.contains("like new") {
            Condition::UsedLikeNew
        } else if lower.contains("good") {
            Condition::UsedGood
        } else if lower.contains("fair") {
            Condition::UsedFair
        } else if lower.contains("poor") {
            Condition::UsedPoor
        } else if lower.contains("new") {
            Condition::New
        } else {
            Condition::UsedGood
        }
    }
}

/// make / model の一致判定（大文字小文字を無視、非 ASCII も含む）
pub fn same_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown condition: {0:?}")]
pub struct UnknownCondition(pub String);

impl FromStr for Condition {
    type Err = UnknownCondition;

    /// 厳密なパース（表示形式・kebab 形式、大文字小文字は無視）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Condition::ALL
            .into_iter()
            .find(|c| c.as_str() == needle || c.kebab() == needle)
            .ok_or_else(|| UnknownCondition(s.to_string()))
    }
}

// ========================================
// Listing
// ========================================

/// Listing (in-memory record)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub mileage: u32,
    pub image_url: String,
    #[serde(default)]
    pub featured: bool,
    pub condition: Condition,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_details: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    // スペック項目（任意）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exterior_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interior_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
}

impl Listing {
    /// 表示用の写真一覧。photos が空ならメイン画像のみ。
    pub fn display_photos(&self) -> Vec<&str> {
        if self.photos.is_empty() {
            vec![self.image_url.as_str()]
        } else {
            self.photos.iter().map(String::as_str).collect()
        }
    }

    /// 決済に渡す投影
    pub fn checkout_item(&self) -> CheckoutItem {
        CheckoutItem {
            id: self.id.clone(),
            make: self.make.clone(),
            model: self.model.clone(),
            price: Some(self.price),
            image_url: Some(self.image_url.clone()),
            description: Some(self.description.clone()),
        }
    }
}

/// Listing 詳細レスポンス（display_photos を付加）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub display_photos: Vec<String>,
}

impl From<Listing> for ListingDetail {
    fn from(listing: Listing) -> Self {
        let display_photos = listing.display_photos().into_iter().map(str::to_string).collect();
        Self {
            listing,
            display_photos,
        }
    }
}

// ========================================
// Checkout
// ========================================

/// Checkout に渡す Listing の投影
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub id: String,
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// `{sessionId}` か `{error}` のどちらか一方
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CheckoutOutcome {
    Session {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Failed {
        error: String,
    },
}

// ========================================
// Price suggestion
// ========================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSuggestionRequest {
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    pub year: Option<i32>,
    pub mileage: Option<i64>,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub additional_details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSuggestion {
    pub suggested_price: f64,
    pub reasoning: String,
}
