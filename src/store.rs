//! Listing Store
//! プロセス内メモリで Listing を保持する（再起動で初期化される）

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::info;

use crate::fixtures::seed_listings;
use crate::models::{same_name, Listing};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Listing id already exists: {0}")]
    DuplicateId(String),
}

/// 新しい順（先頭が最新）の Listing 列
#[derive(Debug, Default)]
pub struct ListingStore {
    listings: RwLock<Vec<Listing>>,
}

/// make / model / year の選択肢（フィルタ・出品フォーム用）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    pub makes: Vec<String>,
    pub models: BTreeMap<String, Vec<String>>,
    pub years: Vec<i32>,
}

impl Catalog {
    /// make の一致は Filter Engine と同じ規則（大文字小文字を無視）
    pub fn models_for(&self, make: &str) -> Option<&[String]> {
        self.models
            .iter()
            .find(|(known, _)| same_name(known, make))
            .map(|(_, models)| models.as_slice())
    }
}

impl ListingStore {
    /// 空のストア
    pub fn new() -> Self {
        Self::default()
    }

    /// 与えられた順序のままストアを作る
    pub fn with_listings(listings: Vec<Listing>) -> Self {
        Self {
            listings: RwLock::new(listings),
        }
    }

    /// シードデータで初期化（プロセス起動時に一度だけ呼ぶ）
    pub fn initialize() -> Self {
        let store = Self::with_listings(seed_listings());
        info!("Listing store seeded: {} listings", store.len());
        store
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn list_all(&self) -> Vec<Listing> {
        self.read().clone()
    }

    pub fn find_by_id(&self, id: &str) -> Option<Listing> {
        self.read().iter().find(|l| l.id == id).cloned()
    }

    /// 先頭に追加する。同じ id が既にあれば衝突として拒否。
    pub fn insert(&self, listing: Listing) -> Result<(), StoreError> {
        let mut listings = self.write();
        if listings.iter().any(|l| l.id == listing.id) {
            return Err(StoreError::DuplicateId(listing.id));
        }
        info!(
            "Listing inserted: id={}, {} {} ({})",
            listing.id, listing.make, listing.model, listing.year
        );
        listings.insert(0, listing);
        Ok(())
    }

    pub fn featured(&self) -> Vec<Listing> {
        self.read().iter().filter(|l| l.featured).cloned().collect()
    }

    pub fn catalog(&self) -> Catalog {
        let listings = self.read();
        let mut makes: Vec<String> = Vec::new();
        let mut models: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut years: Vec<i32> = Vec::new();

        for l in listings.iter() {
            if !makes.contains(&l.make) {
                makes.push(l.make.clone());
            }
            let known = models.entry(l.make.clone()).or_default();
            if !known.contains(&l.model) {
                known.push(l.model.clone());
            }
            if !years.contains(&l.year) {
                years.push(l.year);
            }
        }
        years.sort_unstable_by(|a, b| b.cmp(a));

        Catalog { makes, models, years }
    }

    // 書き込み中の panic で poison されてもデータ自体は整合している（insert は単一操作）
    fn read(&self) -> RwLockReadGuard<'_, Vec<Listing>> {
        self.listings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Listing>> {
        self.listings.write().unwrap_or_else(PoisonError::into_inner)
    }
}
