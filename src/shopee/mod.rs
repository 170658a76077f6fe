use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::ShopeeConfig;
use crate::profile::ShopProfile;

pub mod model;
pub mod sign;

use model::{
    ClonedItemPayload, Envelope, ImageUpload, ItemIdResponse, ItemList, PublishRequest, ShopInfo,
    TokenResponse,
};
pub use sign::{Auth, PartnerCredentials, SignError, SignedQuery};

const SHOPEE_API_BASE: &str = "https://partner.shopeemobile.com/";

#[derive(Debug, Error)]
pub enum ShopeeError {
    #[error(transparent)]
    Sign(#[from] SignError),
    #[error("failed to reach Shopee: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Shopee API error: {error} - {message}")]
    Api { error: String, message: String },
    #[error("invalid Shopee response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Which marketplace implementation a profile talks to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    #[default]
    Shopee,
}

/// Marketplace operations the clone workflow and the authorization flow need.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn get_product_details(&self, item_id: i64) -> Result<Envelope<ItemList>, ShopeeError>;

    async fn upload_image(&self, image_url: &str) -> Result<Envelope<ImageUpload>, ShopeeError>;

    async fn create_item(
        &self,
        payload: &ClonedItemPayload,
    ) -> Result<Envelope<ItemIdResponse>, ShopeeError>;

    async fn publish_item(&self, item_id: i64) -> Result<Envelope<ItemIdResponse>, ShopeeError>;

    async fn exchange_auth_code(
        &self,
        code: &str,
        shop_id: i64,
    ) -> Result<TokenResponse, ShopeeError>;
}

/// Build the platform client a profile should use.
pub fn platform_for(
    kind: PlatformKind,
    cfg: &ShopeeConfig,
    profile: &ShopProfile,
) -> Result<Box<dyn Platform>, ShopeeError> {
    match kind {
        PlatformKind::Shopee => Ok(Box::new(ShopeeClient::from_profile(cfg, profile)?)),
    }
}

#[derive(Clone)]
pub struct ShopeeClient {
    http: Client,
    base_url: Url,
    partner: PartnerCredentials,
    access_token: Option<String>,
    shop_id: Option<i64>,
}

impl fmt::Debug for ShopeeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShopeeClient")
            .field("base_url", &self.base_url)
            .field("partner_id", &self.partner.partner_id())
            .field("shop_id", &self.shop_id)
            .finish_non_exhaustive()
    }
}

impl ShopeeClient {
    /// Partner-level client; shop-level calls fail until a token and shop id
    /// are attached.
    pub fn new(cfg: &ShopeeConfig, partner: PartnerCredentials) -> Result<Self, ShopeeError> {
        let base_url = Url::parse(&cfg.base_url)?;
        Ok(Self::with_base_url(
            partner,
            base_url,
            Duration::from_secs(cfg.request_timeout_secs),
        ))
    }

    pub fn with_base_url(partner: PartnerCredentials, base_url: Url, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("shopee-cloner/0.1")
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            partner,
            access_token: None,
            shop_id: None,
        }
    }

    pub fn default_base_url() -> Url {
        Url::parse(SHOPEE_API_BASE).expect("valid default Shopee URL")
    }

    pub fn from_profile(cfg: &ShopeeConfig, profile: &ShopProfile) -> Result<Self, ShopeeError> {
        Ok(Self::new(cfg, profile.partner())?
            .with_access_token(profile.access_token.clone())
            .with_shop_id(profile.shop_id))
    }

    pub fn with_access_token(mut self, access_token: String) -> Self {
        self.access_token = Some(access_token);
        self
    }

    pub fn with_shop_id(mut self, shop_id: i64) -> Self {
        self.shop_id = Some(shop_id);
        self
    }

    /// Build a signed request without sending it. `query` is appended after
    /// the signature parameters.
    pub fn build_request(
        &self,
        method: Method,
        api_path: &str,
        needs_token: bool,
        timestamp: i64,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Request, ShopeeError> {
        let auth = if needs_token {
            Auth::shop(self.access_token.as_deref(), self.shop_id)?
        } else {
            Auth::Partner
        };

        let signed = query.iter().fold(
            SignedQuery::new(&self.partner, api_path, timestamp, &auth),
            |signed, (k, v)| signed.with_param(k, v.clone()),
        );
        let url = signed.to_url(&self.base_url)?;

        let mut builder = self
            .http
            .request(method, url)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }

    async fn execute(
        &self,
        method: Method,
        api_path: &str,
        needs_token: bool,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, ShopeeError> {
        let request = self.build_request(
            method,
            api_path,
            needs_token,
            now_timestamp(),
            query,
            body.as_ref(),
        )?;
        // The query string carries the access token, so only the path is logged.
        debug!(method=%request.method(), path=%request.url().path(), "sending shopee request");

        let res = self.http.execute(request).await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, %body, path = api_path, "shopee HTTP error");
            return Err(ShopeeError::Status { status, body });
        }

        let text = res.text().await?;
        let payload: Value = serde_json::from_str(&text)?;
        check_api_error(&payload)?;
        Ok(payload)
    }

    #[instrument(skip(self, code))]
    pub async fn exchange_auth_code(
        &self,
        code: &str,
        shop_id: i64,
    ) -> Result<TokenResponse, ShopeeError> {
        let body = serde_json::json!({
            "code": code,
            "shop_id": shop_id,
            "partner_id": self.partner.partner_id(),
        });
        let value = self
            .execute(Method::POST, "/auth/token/get", false, &[], Some(body))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    #[instrument(skip(self))]
    pub async fn get_shop_info(&self) -> Result<ShopInfo, ShopeeError> {
        let value = self
            .execute(Method::GET, "/shop/get_shop_info", true, &[], None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    #[instrument(skip(self))]
    pub async fn get_product_details(
        &self,
        item_id: i64,
    ) -> Result<Envelope<ItemList>, ShopeeError> {
        let query = [("item_id_list", item_id.to_string())];
        let value = self
            .execute(Method::GET, "/product/get_item_base_info", true, &query, None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    #[instrument(skip(self))]
    pub async fn upload_image(&self, image_url: &str) -> Result<Envelope<ImageUpload>, ShopeeError> {
        let body = serde_json::json!({ "image_url": image_url });
        let value = self
            .execute(Method::POST, "/media_space/upload_image", true, &[], Some(body))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    #[instrument(skip_all)]
    pub async fn create_item(
        &self,
        payload: &ClonedItemPayload,
    ) -> Result<Envelope<ItemIdResponse>, ShopeeError> {
        let body = serde_json::to_value(payload)?;
        let value = self
            .execute(Method::POST, "/product/add_item", true, &[], Some(body))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    #[instrument(skip(self))]
    pub async fn publish_item(&self, item_id: i64) -> Result<Envelope<ItemIdResponse>, ShopeeError> {
        let body = serde_json::to_value(PublishRequest::normal(item_id))?;
        let value = self
            .execute(Method::POST, "/product/update_item", true, &[], Some(body))
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl Platform for ShopeeClient {
    async fn get_product_details(&self, item_id: i64) -> Result<Envelope<ItemList>, ShopeeError> {
        ShopeeClient::get_product_details(self, item_id).await
    }

    async fn upload_image(&self, image_url: &str) -> Result<Envelope<ImageUpload>, ShopeeError> {
        ShopeeClient::upload_image(self, image_url).await
    }

    async fn create_item(
        &self,
        payload: &ClonedItemPayload,
    ) -> Result<Envelope<ItemIdResponse>, ShopeeError> {
        ShopeeClient::create_item(self, payload).await
    }

    async fn publish_item(&self, item_id: i64) -> Result<Envelope<ItemIdResponse>, ShopeeError> {
        ShopeeClient::publish_item(self, item_id).await
    }

    async fn exchange_auth_code(
        &self,
        code: &str,
        shop_id: i64,
    ) -> Result<TokenResponse, ShopeeError> {
        ShopeeClient::exchange_auth_code(self, code, shop_id).await
    }
}

/// A 2xx body with a non-empty `error` and `message` is an application error.
pub fn check_api_error(payload: &Value) -> Result<(), ShopeeError> {
    let field = |name: &str| {
        payload
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    match (field("error"), field("message")) {
        (Some(error), Some(message)) => {
            warn!(%error, %message, "shopee API error");
            Err(ShopeeError::Api { error, message })
        }
        _ => Ok(()),
    }
}

pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
