//! Listing Submission Pipeline
//! 出品フォームの検証・写真保存・Listing 生成とストアへの登録

use chrono::{Datelike, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::models::{Condition, Listing, PriceSuggestion};
use crate::store::{ListingStore, StoreError};

pub const PLACEHOLDER_IMAGE: &str = "/images/cars/default-new-listing.png";
pub const UPLOAD_PUBLIC_PREFIX: &str = "/images/uploads";
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;
pub const ACCEPTED_PHOTO_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

const MIN_YEAR: i32 = 1900;
const MIN_DESCRIPTION_CHARS: usize = 10;
const MAX_STEM_CHARS: usize = 50;

// ========================================
// Draft / Photo
// ========================================

/// フォームの生入力（すべて文字列のまま保持する）
#[derive(Debug, Clone, Default)]
pub struct ListingDraft {
    pub make: String,
    pub model: String,
    pub year: String,
    pub price: String,
    pub mileage: String,
    pub condition: String,
    pub description: String,
    pub additional_details: String,
    pub engine: String,
    pub transmission: String,
    pub fuel_type: String,
    pub exterior_color: String,
    pub interior_color: String,
    pub vin: String,
    pub featured: bool,
}

impl ListingDraft {
    /// multipart のフィールド名で値を設定する。未知の名前なら false。
    pub fn set_field(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "make" => &mut self.make,
            "model" => &mut self.model,
            "year" => &mut self.year,
            "price" => &mut self.price,
            "mileage" => &mut self.mileage,
            "condition" => &mut self.condition,
            "description" => &mut self.description,
            "additionalDetails" => &mut self.additional_details,
            "engine" => &mut self.engine,
            "transmission" => &mut self.transmission,
            "fuelType" => &mut self.fuel_type,
            "exteriorColor" => &mut self.exterior_color,
            "interiorColor" => &mut self.interior_color,
            "vin" => &mut self.vin,
            "featured" => {
                self.featured = value.trim() == "true";
                return true;
            }
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// アップロードされた写真（1枚）
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    /// ファイル未選択のブラウザ送信（空の file パート）かどうか
    pub fn is_blank(&self) -> bool {
        self.bytes.is_empty() && self.file_name.is_empty()
    }
}

// ========================================
// Per-step schema
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Make,
    Model,
    Year,
    Mileage,
    Condition,
    Price,
    Description,
    Photo,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Make => "make",
            Field::Model => "model",
            Field::Year => "year",
            Field::Mileage => "mileage",
            Field::Condition => "condition",
            Field::Price => "price",
            Field::Description => "description",
            Field::Photo => "photoFile",
        }
    }
}

/// Details → Photo → Review → Submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStep {
    Details,
    Photo,
    Review,
    Submitted,
}

impl FormStep {
    /// 前進時に検証するフィールド集合
    pub fn fields(self) -> &'static [Field] {
        match self {
            FormStep::Details => &[
                Field::Make,
                Field::Model,
                Field::Year,
                Field::Mileage,
                Field::Condition,
                Field::Price,
                Field::Description,
            ],
            FormStep::Photo => &[Field::Photo],
            FormStep::Review | FormStep::Submitted => &[],
        }
    }

    fn following(self) -> Option<FormStep> {
        match self {
            FormStep::Details => Some(FormStep::Photo),
            FormStep::Photo => Some(FormStep::Review),
            FormStep::Review | FormStep::Submitted => None,
        }
    }

    fn preceding(self) -> Option<FormStep> {
        match self {
            FormStep::Photo => Some(FormStep::Details),
            FormStep::Review => Some(FormStep::Photo),
            FormStep::Details | FormStep::Submitted => None,
        }
    }
}

// ========================================
// Validation
// ========================================

/// フィールド名 → エラーメッセージ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.0.entry(field.name()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(field.name()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        f.write_str(&parts.join("; "))
    }
}

/// 年式の上限は現在年 + 1
pub fn max_model_year() -> i32 {
    Utc::now().year() + 1
}

/// 写真の型・サイズ・中身を検証する
pub fn validate_photo(photo: &PhotoUpload) -> Result<(), String> {
    if photo.bytes.len() > MAX_PHOTO_BYTES {
        return Err("Each file must be 5MB or less".to_string());
    }
    let declared_ok = photo
        .content_type
        .as_deref()
        .is_some_and(|t| ACCEPTED_PHOTO_TYPES.contains(&t.to_ascii_lowercase().as_str()));
    let sniffed_ok = matches!(
        image::guess_format(&photo.bytes),
        Ok(image::ImageFormat::Jpeg | image::ImageFormat::Png | image::ImageFormat::WebP)
    );
    if declared_ok && sniffed_ok {
        Ok(())
    } else {
        Err("Only JPG, PNG, WEBP allowed".to_string())
    }
}

/// 単一フィールドの検証。`final_check` は確定時（価格 > 0 必須）。
fn check_field(
    draft: &ListingDraft,
    photo: Option<&PhotoUpload>,
    field: Field,
    final_check: bool,
) -> Option<String> {
    match field {
        Field::Make => draft.make.trim().is_empty().then(|| "Make is required".to_string()),
        Field::Model => draft.model.trim().is_empty().then(|| "Model is required".to_string()),
        Field::Year => match draft.year.trim().parse::<i32>() {
            Ok(year) if (MIN_YEAR..=max_model_year()).contains(&year) => None,
            _ => Some("Invalid year".to_string()),
        },
        Field::Mileage => {
            let raw = draft.mileage.trim();
            if raw.is_empty() {
                return Some("Mileage is required".to_string());
            }
            match raw.parse::<i64>() {
                Ok(m) if m < 0 => Some("Mileage cannot be negative".to_string()),
                Ok(m) if u32::try_from(m).is_ok() => None,
                _ => Some("Mileage must be a whole number".to_string()),
            }
        }
        Field::Condition => {
            if draft.condition.trim().is_empty() {
                Some("Condition is required".to_string())
            } else if draft.condition.parse::<Condition>().is_err() {
                Some("Condition must be one of: new, used - like new, used - good, used - fair, used - poor".to_string())
            } else {
                None
            }
        }
        Field::Price => {
            let raw = draft.price.trim();
            if raw.is_empty() {
                return final_check.then(|| "Price is required".to_string());
            }
            match raw.parse::<f64>() {
                Ok(p) if !p.is_finite() => Some("Price must be a number".to_string()),
                Ok(p) if p < 0.0 => Some("Price cannot be negative".to_string()),
                Ok(p) if final_check && p <= 0.0 => Some("Price must be greater than 0".to_string()),
                Ok(_) => None,
                Err(_) => Some("Price must be a number".to_string()),
            }
        }
        Field::Description => (draft.description.trim().chars().count() < MIN_DESCRIPTION_CHARS)
            .then(|| "Description must be at least 10 characters".to_string()),
        Field::Photo => match photo {
            Some(p) => validate_photo(p).err(),
            None => Some("At least one photo is required".to_string()),
        },
    }
}

/// ステップ単位の検証（前進ゲート）
pub fn validate_step(
    step: FormStep,
    draft: &ListingDraft,
    photo: Option<&PhotoUpload>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    for &field in step.fields() {
        if let Some(message) = check_field(draft, photo, field, false) {
            errors.add(field, message);
        }
    }
    errors.into_result()
}

/// 確定時の全体検証。写真は任意だが、あれば検証する。
pub fn validate_submission(
    draft: &ListingDraft,
    photo: Option<&PhotoUpload>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    for &field in FormStep::Details.fields() {
        if let Some(message) = check_field(draft, photo, field, true) {
            errors.add(field, message);
        }
    }
    if let Some(p) = photo {
        if let Err(message) = validate_photo(p) {
            errors.add(Field::Photo, message);
        }
    }
    errors.into_result()
}

// ========================================
// Photo storage
// ========================================

/// 公開ディレクトリへの写真保存
#[derive(Debug, Clone)]
pub struct PhotoStorage {
    dir: PathBuf,
}

impl PhotoStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 保存して公開パス（/images/uploads/...）を返す
    pub async fn save(&self, photo: &PhotoUpload) -> std::io::Result<String> {
        fs::create_dir_all(&self.dir).await?;

        let filename = unique_filename(&photo.file_name);
        let target_path = self.dir.join(&filename);
        write_new_file(&target_path, &photo.bytes).await?;

        info!("Photo saved: {:?} ({} bytes)", target_path, photo.bytes.len());
        Ok(format!("{}/{}", UPLOAD_PUBLIC_PREFIX, filename))
    }

    /// save() が返した公開パスのファイルを削除する
    pub async fn remove(&self, public_path: &str) {
        let Some(filename) = public_path
            .strip_prefix(UPLOAD_PUBLIC_PREFIX)
            .map(|rest| rest.trim_start_matches('/'))
            .filter(|name| !name.is_empty() && !name.contains('/'))
        else {
            return;
        };
        match fs::remove_file(self.dir.join(filename)).await {
            Ok(()) => info!("Orphaned photo removed: {}", filename),
            Err(e) => warn!("Failed to remove orphaned photo {}: {}", filename, e),
        }
    }
}

// 書き込み途中で失敗したら書きかけのファイルを残さない
async fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;
    drop(file);
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(path).await {
            warn!("Failed to remove partial photo {:?}: {}", path, cleanup);
        }
        return Err(e);
    }
    Ok(())
}

/// `[A-Za-z0-9._-]` 以外を落とす
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// `{millis}-{random}-{stem}{ext}`
fn unique_filename(original: &str) -> String {
    let sanitized = sanitize_filename(original);
    let path = Path::new(&sanitized);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_else(|| ".png".to_string());
    let stem: String = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .trim_start_matches('.')
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = if stem.is_empty() { "photo".to_string() } else { stem };

    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}-{}{}", Utc::now().timestamp_millis(), suffix, stem, extension)
}

/// `{millis}-{8 chars Crockford base32}`
pub fn generate_listing_id() -> String {
    let random_bytes: [u8; 5] = rand::thread_rng().gen();
    let encoded = base32::encode(base32::Alphabet::Crockford, &random_bytes);
    format!("{}-{}", Utc::now().timestamp_millis(), encoded.to_lowercase())
}

// ========================================
// Pipeline
// ========================================

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Failed to save listing: {0}")]
    Commit(#[from] StoreError),

    #[error("Cannot submit from the {0:?} step")]
    WrongStep(FormStep),
}

#[derive(Debug, Clone)]
pub struct SubmissionPipeline {
    store: Arc<ListingStore>,
    photos: PhotoStorage,
    next_id: fn() -> String,
}

impl SubmissionPipeline {
    pub fn new(store: Arc<ListingStore>, photos: PhotoStorage) -> Self {
        Self {
            store,
            photos,
            next_id: generate_listing_id,
        }
    }

    /// id 生成関数を差し替える（既定は generate_listing_id）
    pub fn with_id_generator(mut self, next_id: fn() -> String) -> Self {
        self.next_id = next_id;
        self
    }

    pub fn photo_dir(&self) -> &Path {
        self.photos.dir()
    }

    /// 検証 → 写真保存 → Listing 生成 → 先頭に登録
    pub async fn submit(
        &self,
        draft: &ListingDraft,
        photo: Option<&PhotoUpload>,
    ) -> Result<Listing, SubmissionError> {
        let photo = photo.filter(|p| !p.is_blank());
        validate_submission(draft, photo).map_err(SubmissionError::Validation)?;

        // 写真保存に失敗してもプレースホルダーで出品は続行
        let (image_url, saved) = match photo {
            Some(p) => match self.photos.save(p).await {
                Ok(path) => (path, true),
                Err(e) => {
                    warn!("Photo upload failed, using placeholder: {}", e);
                    (PLACEHOLDER_IMAGE.to_string(), false)
                }
            },
            None => {
                info!("No photo uploaded, using placeholder");
                (PLACEHOLDER_IMAGE.to_string(), false)
            }
        };

        let listing = build_listing((self.next_id)(), draft, image_url.clone());

        if let Err(e) = self.store.insert(listing.clone()) {
            if saved {
                self.photos.remove(&image_url).await;
            }
            return Err(e.into());
        }

        Ok(listing)
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// validate_submission 済みの draft からのみ呼ぶ
fn build_listing(id: String, draft: &ListingDraft, image_url: String) -> Listing {
    Listing {
        id,
        make: draft.make.trim().to_string(),
        model: draft.model.trim().to_string(),
        year: draft.year.trim().parse().unwrap_or(MIN_YEAR),
        price: draft.price.trim().parse().unwrap_or(0.0),
        mileage: draft.mileage.trim().parse().unwrap_or(0),
        photos: vec![image_url.clone()],
        image_url,
        featured: draft.featured,
        condition: draft.condition.parse().unwrap_or(Condition::UsedGood),
        description: draft.description.trim().to_string(),
        additional_details: optional(&draft.additional_details),
        engine: optional(&draft.engine),
        transmission: optional(&draft.transmission),
        fuel_type: optional(&draft.fuel_type),
        exterior_color: optional(&draft.exterior_color),
        interior_color: optional(&draft.interior_color),
        vin: optional(&draft.vin),
    }
}

// ========================================
// Multi-step form
// ========================================

/// 出品フォームの状態（1インスタンス = 1回の出品）
#[derive(Debug, Clone)]
pub struct SubmissionForm {
    step: FormStep,
    pub draft: ListingDraft,
    photo: Option<PhotoUpload>,
    submitted: Option<Listing>,
}

impl Default for SubmissionForm {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionForm {
    pub fn new() -> Self {
        Self {
            step: FormStep::Details,
            draft: ListingDraft::default(),
            photo: None,
            submitted: None,
        }
    }

    pub fn step(&self) -> FormStep {
        self.step
    }

    pub fn submitted(&self) -> Option<&Listing> {
        self.submitted.as_ref()
    }

    pub fn set_photo(&mut self, photo: PhotoUpload) {
        self.photo = Some(photo);
    }

    /// 現在ステップのフィールドを検証して次へ進む
    pub fn next(&mut self) -> Result<FormStep, ValidationErrors> {
        let Some(following) = self.step.following() else {
            return Ok(self.step);
        };
        validate_step(self.step, &self.draft, self.photo.as_ref())?;
        self.step = following;
        Ok(self.step)
    }

    /// 検証なしで一つ戻る（Submitted からは戻れない）
    pub fn back(&mut self) -> FormStep {
        if let Some(preceding) = self.step.preceding() {
            self.step = preceding;
        }
        self.step
    }

    /// 提案価格を price に反映する（送信はしない）
    pub fn accept_price_suggestion(&mut self, suggestion: &PriceSuggestion) {
        self.draft.price = suggestion.suggested_price.to_string();
    }

    /// Review から確定。失敗時は Review に留まる。
    pub async fn submit(&mut self, pipeline: &SubmissionPipeline) -> Result<&Listing, SubmissionError> {
        if self.step != FormStep::Review {
            return Err(SubmissionError::WrongStep(self.step));
        }
        let listing = pipeline.submit(&self.draft, self.photo.as_ref()).await?;
        self.step = FormStep::Submitted;
        Ok(self.submitted.insert(listing))
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // 最小の PNG シグネチャ + IHDR 風のバイト列（guess_format はマジックバイトのみ見る）
    const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn valid_draft() -> ListingDraft {
        ListingDraft {
            make: "Mazda".into(),
            model: "CX-5".into(),
            year: "2020".into(),
            price: "21500".into(),
            mileage: "41000".into(),
            condition: "used - good".into(),
            description: "Well maintained compact SUV.".into(),
            additional_details: "  ".into(),
            engine: "2.5L I4".into(),
            ..Default::default()
        }
    }

    fn png(name: &str) -> PhotoUpload {
        PhotoUpload {
            file_name: name.into(),
            content_type: Some("image/png".into()),
            bytes: PNG_BYTES.to_vec(),
        }
    }

    fn pipeline(dir: &TempDir) -> (Arc<ListingStore>, SubmissionPipeline) {
        let store = Arc::new(ListingStore::initialize());
        let pipeline = SubmissionPipeline::new(Arc::clone(&store), PhotoStorage::new(dir.path()));
        (store, pipeline)
    }

    #[test]
    fn details_step_reports_each_bad_field() {
        let draft = ListingDraft {
            year: "1850".into(),
            mileage: "-5".into(),
            condition: "mint".into(),
            description: "short".into(),
            ..Default::default()
        };
        let errors = validate_step(FormStep::Details, &draft, None).unwrap_err();
        assert_eq!(errors.get(Field::Make), Some("Make is required"));
        assert_eq!(errors.get(Field::Model), Some("Model is required"));
        assert_eq!(errors.get(Field::Year), Some("Invalid year"));
        assert_eq!(errors.get(Field::Mileage), Some("Mileage cannot be negative"));
        assert!(errors.get(Field::Condition).is_some());
        assert!(errors.get(Field::Description).is_some());
        // 価格は Details では任意
        assert_eq!(errors.get(Field::Price), None);
    }

    #[test]
    fn year_may_be_next_model_year() {
        let mut draft = valid_draft();
        draft.year = max_model_year().to_string();
        assert!(validate_step(FormStep::Details, &draft, None).is_ok());
        draft.year = (max_model_year() + 1).to_string();
        assert!(validate_step(FormStep::Details, &draft, None).is_err());
    }

    #[test]
    fn final_validation_requires_positive_price() {
        let mut draft = valid_draft();
        draft.price = "0".into();
        assert!(validate_step(FormStep::Details, &draft, None).is_ok());
        let errors = validate_submission(&draft, None).unwrap_err();
        assert_eq!(errors.get(Field::Price), Some("Price must be greater than 0"));

        draft.price = String::new();
        let errors = validate_submission(&draft, None).unwrap_err();
        assert_eq!(errors.get(Field::Price), Some("Price is required"));
    }

    #[test]
    fn photo_checks_type_size_and_content() {
        assert!(validate_photo(&png("car.png")).is_ok());

        let mut gif = png("car.gif");
        gif.content_type = Some("image/gif".into());
        assert_eq!(validate_photo(&gif).unwrap_err(), "Only JPG, PNG, WEBP allowed");

        let mut lying = png("car.png");
        lying.bytes = b"not an image at all".to_vec();
        assert!(validate_photo(&lying).is_err());

        let mut huge = png("car.png");
        huge.bytes.resize(MAX_PHOTO_BYTES + 1, 0);
        assert_eq!(validate_photo(&huge).unwrap_err(), "Each file must be 5MB or less");
    }

    #[test]
    fn sanitize_keeps_safe_characters_only() {
        assert_eq!(sanitize_filename("my car (1)!.JPG"), "mycar1.JPG");
        assert_eq!(sanitize_filename("../../etc/passwd"), "....etcpasswd");
    }

    #[test]
    fn unique_filename_truncates_stem_and_defaults_extension() {
        let long = format!("{}.webp", "a".repeat(80));
        let name = unique_filename(&long);
        assert!(name.ends_with(&format!("-{}.webp", "a".repeat(50))));

        let no_ext = unique_filename("snapshot");
        assert!(no_ext.ends_with("-snapshot.png"));
    }

    #[test]
    fn listing_ids_are_distinct() {
        let a = generate_listing_id();
        let b = generate_listing_id();
        assert_ne!(a, b);
        let (millis, suffix) = a.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 8);
    }

    #[tokio::test]
    async fn submit_without_photo_uses_placeholder() {
        let dir = TempDir::new().unwrap();
        let (store, pipeline) = pipeline(&dir);

        let listing = pipeline.submit(&valid_draft(), None).await.unwrap();
        assert_eq!(listing.image_url, PLACEHOLDER_IMAGE);
        assert_eq!(listing.photos, vec![PLACEHOLDER_IMAGE.to_string()]);
        assert_eq!(listing.additional_details, None);
        assert_eq!(listing.engine.as_deref(), Some("2.5L I4"));
        assert_eq!(listing.condition, Condition::UsedGood);
        assert_eq!(store.list_all()[0], listing);
    }

    #[tokio::test]
    async fn submit_with_photo_writes_file() {
        let dir = TempDir::new().unwrap();
        let (store, pipeline) = pipeline(&dir);

        let listing = pipeline.submit(&valid_draft(), Some(&png("front view.png"))).await.unwrap();
        assert!(listing.image_url.starts_with("/images/uploads/"));
        assert!(listing.image_url.ends_with("-frontview.png"));
        assert_eq!(listing.photos, vec![listing.image_url.clone()]);

        let filename = listing.image_url.rsplit('/').next().unwrap();
        let written = std::fs::read(dir.path().join(filename)).unwrap();
        assert_eq!(written, PNG_BYTES);
        assert_eq!(store.find_by_id(&listing.id), Some(listing));
    }

    #[tokio::test]
    async fn blank_file_part_counts_as_no_photo() {
        let dir = TempDir::new().unwrap();
        let (_store, pipeline) = pipeline(&dir);
        let blank = PhotoUpload {
            file_name: String::new(),
            content_type: Some("application/octet-stream".into()),
            bytes: vec![],
        };
        let listing = pipeline.submit(&valid_draft(), Some(&blank)).await.unwrap();
        assert_eq!(listing.image_url, PLACEHOLDER_IMAGE);
    }

    #[tokio::test]
    async fn invalid_submission_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let (store, pipeline) = pipeline(&dir);
        let mut draft = valid_draft();
        draft.description = "tiny".into();

        let err = pipeline.submit(&draft, Some(&png("car.png"))).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Validation(ref e) if e.get(Field::Description).is_some()));
        assert_eq!(store.len(), 6);
        assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
    }

    #[tokio::test]
    async fn unwritable_upload_dir_falls_back_to_placeholder() {
        let dir = TempDir::new().unwrap();
        // ディレクトリの代わりにファイルを置いて書き込みを失敗させる
        let blocker = dir.path().join("uploads");
        std::fs::write(&blocker, b"occupied").unwrap();
        let store = Arc::new(ListingStore::new());
        let pipeline = SubmissionPipeline::new(Arc::clone(&store), PhotoStorage::new(&blocker));

        let listing = pipeline.submit(&valid_draft(), Some(&png("car.png"))).await.unwrap();
        assert_eq!(listing.image_url, PLACEHOLDER_IMAGE);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn remove_deletes_saved_photo() {
        let dir = TempDir::new().unwrap();
        let storage = PhotoStorage::new(dir.path());
        let path = storage.save(&png("car.png")).await.unwrap();
        storage.remove(&path).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn form_walks_through_steps() {
        let dir = TempDir::new().unwrap();
        let (store, pipeline) = pipeline(&dir);
        let mut form = SubmissionForm::new();
        assert_eq!(form.step(), FormStep::Details);

        // Details が不完全なら進めない
        assert!(form.next().is_err());
        assert_eq!(form.step(), FormStep::Details);

        form.draft = valid_draft();
        form.draft.price = String::new();
        assert_eq!(form.next().unwrap(), FormStep::Photo);

        // Photo ステップは写真必須
        let errors = form.next().unwrap_err();
        assert_eq!(errors.get(Field::Photo), Some("At least one photo is required"));
        form.set_photo(png("car.png"));
        assert_eq!(form.next().unwrap(), FormStep::Review);

        // 価格未入力のままでは確定できず Review に留まる
        assert!(matches!(form.submit(&pipeline).await, Err(SubmissionError::Validation(_))));
        assert_eq!(form.step(), FormStep::Review);

        form.accept_price_suggestion(&PriceSuggestion {
            suggested_price: 19750.0,
            reasoning: "Comparable listings".into(),
        });
        assert_eq!(form.step(), FormStep::Review);

        let id = form.submit(&pipeline).await.unwrap().id.clone();
        assert_eq!(form.step(), FormStep::Submitted);
        assert_eq!(store.find_by_id(&id).map(|l| l.price), Some(19750.0));

        // Submitted は終端
        assert_eq!(form.back(), FormStep::Submitted);
        assert!(matches!(form.submit(&pipeline).await, Err(SubmissionError::WrongStep(FormStep::Submitted))));

        form.reset();
        assert_eq!(form.step(), FormStep::Details);
        assert!(form.submitted().is_none());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failed_write_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("partial.png");
        std::os::unix::fs::symlink("/dev/full", &target).unwrap();

        assert!(write_new_file(&target, PNG_BYTES).await.is_err());
        assert!(std::fs::symlink_metadata(&target).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    fn colliding_id() -> String {
        "1".to_string()
    }

    #[tokio::test]
    async fn id_collision_removes_photo_and_keeps_review() {
        let dir = TempDir::new().unwrap();
        let (store, pipeline) = pipeline(&dir);
        let pipeline = pipeline.with_id_generator(colliding_id);

        let mut form = SubmissionForm::new();
        form.draft = valid_draft();
        form.set_photo(png("car.png"));
        form.next().unwrap();
        form.next().unwrap();
        assert_eq!(form.step(), FormStep::Review);

        let result = form.submit(&pipeline).await;
        assert!(matches!(
            result,
            Err(SubmissionError::Commit(StoreError::DuplicateId(ref id))) if id == "1"
        ));
        assert_eq!(form.step(), FormStep::Review);
        assert!(form.submitted().is_none());
        assert_eq!(store.len(), 6);
        assert_eq!(store.find_by_id("1").map(|l| l.make), Some("Toyota".to_string()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn back_never_validates() {
        let mut form = SubmissionForm::new();
        form.draft = valid_draft();
        form.next().unwrap();
        form.draft.make.clear();
        assert_eq!(form.back(), FormStep::Details);
        assert_eq!(form.back(), FormStep::Details);
    }
}
