use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard v2 response wrapper. `response` is absent on most failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    pub response: Option<T>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ItemList {
    #[serde(default)]
    pub item_list: Vec<SourceProduct>,
}

/// An existing item as returned by `product/get_item_base_info`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SourceProduct {
    pub item_id: Option<i64>,
    pub item_name: Option<String>,
    pub description: Option<String>,
    pub item_sku: Option<String>,
    pub category_id: Option<i64>,
    pub price_info: Option<Vec<PriceInfo>>,
    pub image: Option<ImageSet>,
    pub stock_info_v2: Option<Value>,
    pub logistic_info: Option<Value>,
    pub attribute_list: Option<Value>,
    pub weight: Option<Value>,
    pub dimension: Option<Value>,
}

impl SourceProduct {
    pub fn image_ids(&self) -> &[String] {
        self.image
            .as_ref()
            .map(|i| i.image_id_list.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PriceInfo {
    pub original_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ImageSet {
    #[serde(default)]
    pub image_id_list: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ImageUpload {
    pub image_info: Option<ImageInfo>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ImageInfo {
    pub image_id: Option<String>,
}

/// Response of `product/add_item` and `product/update_item`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ItemIdResponse {
    pub item_id: Option<i64>,
}

/// `auth/token/get` answers at the top level, not inside `response`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expire_in: Option<i64>,
}

/// `shop/get_shop_info` also answers at the top level.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ShopInfo {
    pub shop_name: Option<String>,
    pub region: Option<String>,
    pub status: Option<String>,
}

/// Body sent to `product/add_item`. Absent source fields are left out of the
/// JSON entirely; the platform rejects explicit nulls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClonedItemPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    pub image: ImageSet,
    #[serde(skip_serializing_if = "is_absent")]
    pub stock_info_v2: Option<Value>,
    #[serde(skip_serializing_if = "is_absent")]
    pub logistic_info: Option<Value>,
    #[serde(skip_serializing_if = "is_absent")]
    pub attribute_list: Option<Value>,
    #[serde(skip_serializing_if = "is_absent")]
    pub weight: Option<Value>,
    #[serde(skip_serializing_if = "is_absent")]
    pub dimension: Option<Value>,
}

// `Some(Value::Null)` can only come from hand-built payloads, but is treated
// as absent all the same.
fn is_absent(v: &Option<Value>) -> bool {
    matches!(v, None | Some(Value::Null))
}

/// Body sent to `product/update_item` to make a created item live.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublishRequest {
    pub item_id: i64,
    pub item_status: &'static str,
}

impl PublishRequest {
    pub fn normal(item_id: i64) -> Self {
        Self {
            item_id,
            item_status: "NORMAL",
        }
    }
}
