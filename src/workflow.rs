//! Clone one product into the same shop with a replacement cover image.
//!
//! The run is strictly sequential: fetch the source item, derive the new
//! cover URL from the parent SKU, upload it, build the new item, create it,
//! publish it. The first failure ends the run; nothing is retried or rolled
//! back, so an item created before a failed publish stays in the shop.
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::profile::{normalize_hosting_url, ShopProfile};
use crate::shopee::model::{ClonedItemPayload, ImageSet, SourceProduct};
use crate::shopee::{platform_for, Platform, ShopeeError};

/// Present in the final log line of every successful run.
pub const COMPLETION_MARKER: &str = "Product cloning process completed";

static SHOP_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid shop code regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid product ID '{0}': it must be a number")]
    NonNumericItemId(String),
    #[error("product ID must be positive, got {0}")]
    NonPositiveItemId(i64),
    #[error("shop code '{0}' may only contain letters, digits, '-' and '_'")]
    InvalidShopCode(String),
}

/// Validated inputs of one clone run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    pub source_item_id: i64,
    pub shop_code: String,
}

impl CloneRequest {
    pub fn new(source_item_id: i64, shop_code: &str) -> Result<Self, InputError> {
        if source_item_id <= 0 {
            return Err(InputError::NonPositiveItemId(source_item_id));
        }
        let shop_code = shop_code.trim();
        if shop_code.is_empty() {
            return Err(InputError::Missing("shop code"));
        }
        if !SHOP_CODE.is_match(shop_code) {
            return Err(InputError::InvalidShopCode(shop_code.to_string()));
        }
        Ok(Self {
            source_item_id,
            shop_code: shop_code.to_string(),
        })
    }

    /// Parse raw text inputs as typed by a user.
    pub fn parse(source_item_id: &str, shop_code: &str) -> Result<Self, InputError> {
        Self::new(parse_item_id(source_item_id)?, shop_code)
    }
}

/// Digits only; signs and separators are rejected.
pub fn parse_item_id(raw: &str) -> Result<i64, InputError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(InputError::Missing("source product ID"));
    }
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(InputError::NonNumericItemId(raw.to_string()));
    }
    let id = raw
        .parse::<i64>()
        .map_err(|_| InputError::NonNumericItemId(raw.to_string()))?;
    if id <= 0 {
        return Err(InputError::NonPositiveItemId(id));
    }
    Ok(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneStep {
    FetchSource,
    DeriveImageUrl,
    UploadImage,
    BuildPayload,
    CreateItem,
    PublishItem,
}

impl CloneStep {
    pub fn number(&self) -> u8 {
        match self {
            CloneStep::FetchSource => 1,
            CloneStep::DeriveImageUrl => 2,
            CloneStep::UploadImage => 3,
            CloneStep::BuildPayload => 4,
            CloneStep::CreateItem => 5,
            CloneStep::PublishItem => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CloneStep::FetchSource => "fetch source product",
            CloneStep::DeriveImageUrl => "derive image URL",
            CloneStep::UploadImage => "upload image",
            CloneStep::BuildPayload => "build payload",
            CloneStep::CreateItem => "create item",
            CloneStep::PublishItem => "publish item",
        }
    }
}

impl fmt::Display for CloneStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloneOutcome {
    Completed {
        new_item_id: i64,
        published_item_id: i64,
    },
    Aborted {
        step: CloneStep,
        reason: String,
        /// Set when the run failed after the new item was created.
        created_item_id: Option<i64>,
    },
}

/// Result of one run: the outcome plus the ordered, human-readable log.
#[derive(Debug, Clone)]
pub struct CloneReport {
    pub run_id: Uuid,
    pub source_item_id: i64,
    pub started_at: DateTime<Utc>,
    pub outcome: CloneOutcome,
    pub log: Vec<String>,
}

impl CloneReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CloneOutcome::Completed { .. })
    }

    pub fn failed_step(&self) -> Option<CloneStep> {
        match &self.outcome {
            CloneOutcome::Aborted { step, .. } => Some(*step),
            CloneOutcome::Completed { .. } => None,
        }
    }

    pub fn log_text(&self) -> String {
        self.log.join("\n")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("source product has no price_info")]
    MissingPrice,
}

/// `{hosting_url}/{sku}_C_{shop_code}.jpg`, with any trailing slash on the
/// hosting URL dropped.
pub fn derive_image_url(hosting_url: &str, parent_sku: &str, shop_code: &str) -> String {
    format!(
        "{}/{}_C_{}.jpg",
        normalize_hosting_url(hosting_url),
        parent_sku,
        shop_code
    )
}

/// The new cover first, then every original image after the old cover.
pub fn clone_image_ids(original: &[String], new_image_id: &str) -> Vec<String> {
    std::iter::once(new_image_id.to_string())
        .chain(original.iter().skip(1).cloned())
        .collect()
}

pub fn build_payload(
    source: &SourceProduct,
    new_image_id: &str,
) -> Result<ClonedItemPayload, PayloadError> {
    let price = source
        .price_info
        .as_ref()
        .and_then(|p| p.first())
        .ok_or(PayloadError::MissingPrice)?;

    Ok(ClonedItemPayload {
        original_price: price.original_price,
        description: source.description.clone(),
        item_name: source.item_name.clone(),
        item_sku: source.item_sku.clone(),
        category_id: source.category_id,
        image: ImageSet {
            image_id_list: clone_image_ids(source.image_ids(), new_image_id),
        },
        stock_info_v2: source.stock_info_v2.clone(),
        logistic_info: source.logistic_info.clone(),
        attribute_list: source.attribute_list.clone(),
        weight: source.weight.clone(),
        dimension: source.dimension.clone(),
    })
}

struct Abort {
    step: CloneStep,
    reason: &'static str,
    created_item_id: Option<i64>,
}

impl Abort {
    fn at(step: CloneStep, reason: &'static str) -> Self {
        Self {
            step,
            reason,
            created_item_id: None,
        }
    }
}

#[derive(Default)]
struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    fn info(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("{}", line);
        self.lines.push(line);
    }

    fn error(&mut self, line: impl Into<String>) {
        let line = line.into();
        error!("{}", line);
        self.lines.push(line);
    }

    fn step(&mut self, step: CloneStep, detail: impl fmt::Display) {
        self.info(format!("Step {}: {}", step.number(), detail));
    }
}

/// Run the whole clone for `request` against `platform`, using the hosting
/// URL of `profile`. Never panics on remote data; every failure becomes an
/// `Aborted` outcome with the reason in the log.
pub async fn clone_product(
    platform: &dyn Platform,
    profile: &ShopProfile,
    request: &CloneRequest,
) -> CloneReport {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let span = info_span!("clone", %run_id, item_id = request.source_item_id);

    let mut log = RunLog::default();
    let outcome = async {
        match run_steps(platform, profile, request, &mut log).await {
            Ok((new_item_id, published_item_id)) => CloneOutcome::Completed {
                new_item_id,
                published_item_id,
            },
            Err(abort) => {
                log.error(format!("Aborted at {}: {}.", abort.step, abort.reason));
                if let Some(id) = abort.created_item_id {
                    log.error(format!(
                        "Item {} was created but not published; it has been left as-is.",
                        id
                    ));
                }
                CloneOutcome::Aborted {
                    step: abort.step,
                    reason: abort.reason.to_string(),
                    created_item_id: abort.created_item_id,
                }
            }
        }
    }
    .instrument(span)
    .await;

    CloneReport {
        run_id,
        source_item_id: request.source_item_id,
        started_at,
        outcome,
        log: log.lines,
    }
}

/// Build the configured platform client for `profile` and run one clone.
/// Only client construction can fail here; run failures are in the report.
pub async fn run_for_profile(
    cfg: &Config,
    profile: &ShopProfile,
    request: &CloneRequest,
) -> Result<CloneReport, ShopeeError> {
    let platform = platform_for(cfg.app.platform, &cfg.shopee, profile)?;
    Ok(clone_product(platform.as_ref(), profile, request).await)
}

async fn run_steps(
    platform: &dyn Platform,
    profile: &ShopProfile,
    request: &CloneRequest,
    log: &mut RunLog,
) -> Result<(i64, i64), Abort> {
    log.step(
        CloneStep::FetchSource,
        format_args!("Fetching details for source product ID: {}...", request.source_item_id),
    );
    let source = match platform.get_product_details(request.source_item_id).await {
        Ok(env) => env
            .response
            .and_then(|r| r.item_list.into_iter().next()),
        Err(err) => {
            log.error(format!("  Error: {}", err));
            None
        }
    }
    .ok_or_else(|| Abort::at(CloneStep::FetchSource, "product not found or fetch failed"))?;
    log.info("  Fetched product details successfully.");

    log.step(CloneStep::DeriveImageUrl, "Constructing new image URL...");
    let parent_sku = source
        .item_sku
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Abort::at(CloneStep::DeriveImageUrl, "missing parent SKU"))?;
    let cover_url = derive_image_url(&profile.image_hosting_url, parent_sku, &request.shop_code);
    log.info(format!("  Constructed new cover image URL: {}", cover_url));

    log.step(CloneStep::UploadImage, "Uploading new cover image...");
    let new_image_id = match platform.upload_image(&cover_url).await {
        Ok(env) => env
            .response
            .and_then(|r| r.image_info)
            .and_then(|i| i.image_id)
            .filter(|id| !id.is_empty()),
        Err(err) => {
            log.error(format!("  Error: {}", err));
            None
        }
    }
    .ok_or_else(|| {
        log.error("  Check that the image exists at the URL and is publicly accessible.");
        Abort::at(CloneStep::UploadImage, "image upload failed")
    })?;
    log.info(format!("  Image uploaded successfully. New image ID: {}", new_image_id));

    log.step(CloneStep::BuildPayload, "Preparing the new product...");
    let payload = build_payload(&source, &new_image_id).map_err(|err| {
        log.error(format!("  Error: {}", err));
        Abort::at(CloneStep::BuildPayload, "malformed source data")
    })?;
    log.info(format!(
        "  Payload ready with {} image(s).",
        payload.image.image_id_list.len()
    ));

    log.step(CloneStep::CreateItem, "Creating new product...");
    let new_item_id = match platform.create_item(&payload).await {
        Ok(env) => env.response.and_then(|r| r.item_id),
        Err(err) => {
            log.error(format!("  Error: {}", err));
            None
        }
    }
    .ok_or_else(|| Abort::at(CloneStep::CreateItem, "item creation failed"))?;
    log.info(format!("  New product created successfully. New item ID: {}", new_item_id));

    log.step(CloneStep::PublishItem, "Publishing new product...");
    let published_item_id = match platform.publish_item(new_item_id).await {
        Ok(env) => env.response.and_then(|r| r.item_id),
        Err(err) => {
            log.error(format!("  Error: {}", err));
            None
        }
    }
    .ok_or(Abort {
        step: CloneStep::PublishItem,
        reason: "publish failed",
        created_item_id: Some(new_item_id),
    })?;
    log.info(format!("  Product {} published successfully!", published_item_id));
    log.info(format!("{}!", COMPLETION_MARKER));

    Ok((new_item_id, published_item_id))
}
