//! Filter Engine
//! 疎なフィルタ条件で Listing を絞り込む（全条件 AND、入力順を保持）

use serde::{Deserialize, Serialize};

use crate::models::{same_name, Listing};
use crate::store::Catalog;

/// 各フィールドは None で「制約なし」
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilter {
    pub make: Option<String>,
    pub model: Option<String>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// GET /cars のクエリ（文字列のまま受けて寛容にパースする）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    pub make: Option<String>,
    pub model: Option<String>,
    pub min_year: Option<String>,
    pub max_year: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl From<ListingQuery> for ListingFilter {
    fn from(q: ListingQuery) -> Self {
        Self {
            make: non_empty(q.make),
            model: non_empty(q.model),
            min_year: parse_bound(q.min_year.as_deref()),
            max_year: parse_bound(q.max_year.as_deref()),
            min_price: parse_bound(q.min_price.as_deref()).filter(|p: &f64| p.is_finite()),
            max_price: parse_bound(q.max_price.as_deref()).filter(|p: &f64| p.is_finite()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// 空文字・パース失敗はどちらも制約なし
fn parse_bound<T: std::str::FromStr>(raw: Option<&str>) -> Option<T> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

impl ListingFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(make) = &self.make {
            if !same_name(&listing.make, make) {
                return false;
            }
        }
        if let Some(model) = &self.model {
            if !same_name(&listing.model, model) {
                return false;
            }
        }
        if self.min_year.is_some_and(|y| listing.year < y) {
            return false;
        }
        if self.max_year.is_some_and(|y| listing.year > y) {
            return false;
        }
        if self.min_price.is_some_and(|p| listing.price < p) {
            return false;
        }
        if self.max_price.is_some_and(|p| listing.price > p) {
            return false;
        }
        true
    }

    /// 一致する Listing を入力順のまま返す
    pub fn apply(&self, listings: &[Listing]) -> Vec<Listing> {
        listings.iter().filter(|l| self.matches(l)).cloned().collect()
    }

    /// make に対応しない model の選択を外す（フォーム側の整合ルール）
    ///
    /// 未知の make が選ばれている場合、または make 未選択の場合も model は外す。
    /// make 自体の一致判定はエンジンと同じく大文字小文字を無視する。
    pub fn reconciled(mut self, catalog: &Catalog) -> Self {
        let known_models = self.make.as_deref().and_then(|make| catalog.models_for(make));

        let keep_model = match (&self.model, known_models) {
            (Some(model), Some(models)) => models.iter().any(|m| same_name(m, model)),
            (Some(_), None) => false,
            (None, _) => true,
        };
        if !keep_model {
            self.model = None;
        }
        self
    }
}
