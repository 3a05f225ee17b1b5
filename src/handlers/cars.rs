//! Cars API Handlers
//! /cars エンドポイント

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::filter::{ListingFilter, ListingQuery};
use crate::models::{Listing, ListingDetail};
use crate::store::Catalog;
use crate::submission::{Field, ListingDraft, PhotoUpload, ValidationErrors};
use crate::AppState;

// ========================================
// Response Types
// ========================================

#[derive(Serialize)]
pub struct CarCreateResponse {
    pub message: String,
    pub car: Listing,
}

#[derive(Serialize)]
pub struct CatalogResponse {
    #[serde(flatten)]
    pub catalog: Catalog,
    /// 整合ルール適用後の make / model 選択
    pub selection: ListingFilter,
}

// ========================================
// Query Parameters
// ========================================

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub make: Option<String>,
    pub model: Option<String>,
}

// ========================================
// Handlers
// ========================================

/// GET /cars - 車両一覧（フィルタ付き、新しい順）
pub async fn list_cars(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingQuery>,
) -> Json<Vec<Listing>> {
    let filter = ListingFilter::from(query);
    let all = state.store.list_all();
    let matched = if filter.is_empty() { all } else { filter.apply(&all) };
    debug!("GET /cars: filter={:?}, {} results", filter, matched.len());
    Json(matched)
}

/// GET /cars/featured - おすすめ車両
pub async fn featured_cars(State(state): State<Arc<AppState>>) -> Json<Vec<Listing>> {
    Json(state.store.featured())
}

/// GET /cars/catalog - make / model / year の選択肢
pub async fn car_catalog(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Json<CatalogResponse> {
    let catalog = state.store.catalog();
    let selection = ListingFilter::from(ListingQuery {
        make: query.make,
        model: query.model,
        ..Default::default()
    })
    .reconciled(&catalog);
    Json(CatalogResponse { catalog, selection })
}

/// GET /cars/:id - 車両詳細
pub async fn get_car(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ListingDetail>, ApiError> {
    match state.store.find_by_id(&id) {
        Some(listing) => Ok(Json(listing.into())),
        None => {
            warn!("Car with ID {} not found", id);
            Err(ApiError::NotFound("Car not found".to_string()))
        }
    }
}

/// POST /cars - 出品（Multipart）
///
/// Parameters (multipart/form-data):
///   - make, model, year, price, mileage, condition, description（必須）
///   - additionalDetails, engine, transmission, fuelType,
///     exteriorColor, interiorColor, vin, featured（任意）
///   - photoFile: 画像ファイル（任意、1枚まで、JPG/PNG/WEBP、5MB以下）
pub async fn create_car(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CarCreateResponse>), ApiError> {
    let mut draft = ListingDraft::default();
    let mut photo: Option<PhotoUpload> = None;
    let mut photo_parts = 0usize;

    // multipart フィールドを解析
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Multipart error: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "photoFile" | "photo" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("File read error: {}", e)))?
                    .to_vec();

                let upload = PhotoUpload {
                    file_name,
                    content_type,
                    bytes,
                };
                if upload.is_blank() {
                    continue;
                }
                info!("Photo field received: {:?} ({} bytes)", upload.file_name, upload.bytes.len());
                photo_parts += 1;
                photo = Some(upload);
            }
            _ => {
                let text = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("{} read error: {}", name, e))
                })?;
                if !draft.set_field(&name, text) {
                    warn!("Unknown field: {}", name);
                }
            }
        }
    }

    if photo_parts > 1 {
        let mut errors = ValidationErrors::default();
        errors.add(Field::Photo, "Only one photo can be uploaded per listing");
        return Err(ApiError::Validation(errors));
    }

    let car = state.submissions.submit(&draft, photo.as_ref()).await?;

    Ok((
        StatusCode::CREATED,
        Json(CarCreateResponse {
            message: "Car listed successfully".to_string(),
            car,
        }),
    ))
}
