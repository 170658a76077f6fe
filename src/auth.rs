//! Shop authorization: build the partner authorization URL, trade the
//! returned code for tokens and turn the result into a [`ShopProfile`].
use reqwest::Url;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::ShopeeConfig;
use crate::profile::{normalize_hosting_url, ShopProfile};
use crate::shopee::{Auth, PartnerCredentials, ShopeeClient, ShopeeError, SignedQuery};

const AUTH_PARTNER_PATH: &str = "/shop/auth_partner";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to acquire access token: {0}")]
    Token(#[source] ShopeeError),
    #[error("token response did not contain {0}")]
    MissingField(&'static str),
    #[error("failed to fetch shop information: {0}")]
    ShopInfo(#[source] ShopeeError),
    #[error(transparent)]
    Client(#[from] ShopeeError),
}

/// The URL a shop owner opens to grant this partner access. Signed at the
/// partner level; the redirect target is percent-encoded.
pub fn auth_partner_url(
    cfg: &ShopeeConfig,
    partner: &PartnerCredentials,
    timestamp: i64,
) -> Result<Url, ShopeeError> {
    let base = Url::parse(&cfg.base_url)?;
    Ok(SignedQuery::new(partner, AUTH_PARTNER_PATH, timestamp, &Auth::Partner)
        .with_param("redirect", cfg.redirect_url.clone())
        .to_url(&base)?)
}

/// Values the shop owner supplies after authorizing.
#[derive(Debug, Clone)]
pub struct Registration {
    pub partner: PartnerCredentials,
    pub code: String,
    pub shop_id: i64,
    pub image_hosting_url: String,
}

/// Exchange the authorization code, confirm the token by fetching the shop
/// name, and return the profile to store.
#[instrument(skip_all, fields(shop_id = registration.shop_id))]
pub async fn register_shop(
    cfg: &ShopeeConfig,
    registration: Registration,
) -> Result<ShopProfile, AuthError> {
    let client = ShopeeClient::new(cfg, registration.partner.clone())?;
    let tokens = client
        .exchange_auth_code(&registration.code, registration.shop_id)
        .await
        .map_err(AuthError::Token)?;
    let access_token = tokens
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingField("access_token"))?;
    let refresh_token = tokens.refresh_token.unwrap_or_default();
    info!("acquired access token");

    let authed = client
        .with_access_token(access_token.clone())
        .with_shop_id(registration.shop_id);
    let shop_name = authed
        .get_shop_info()
        .await
        .map_err(AuthError::ShopInfo)?
        .shop_name
        .filter(|n| !n.is_empty())
        .ok_or(AuthError::MissingField("shop_name"))?;
    info!(%shop_name, "fetched shop information");

    Ok(ShopProfile {
        shop_id: registration.shop_id,
        partner_id: registration.partner.partner_id(),
        partner_key: registration.partner.partner_key().to_string(),
        access_token,
        refresh_token,
        shop_name,
        image_hosting_url: normalize_hosting_url(&registration.image_hosting_url),
    })
}
