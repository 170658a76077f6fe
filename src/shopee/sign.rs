//! Request signing for the Shopee Open Platform v2 API.
//!
//! Every call carries `partner_id`, `timestamp` and `sign` query parameters.
//! Shop-level calls additionally carry `access_token` and `shop_id`, and fold
//! both into the signed base string.
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Path prefix prepended to every API path, whatever the caller passes in.
pub const API_PREFIX: &str = "/api/v2";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignError {
    #[error("access token and shop_id are required for this API call")]
    MissingShopCredentials,
}

/// The API consumer's id/secret pair.
#[derive(Clone, PartialEq, Eq)]
pub struct PartnerCredentials {
    partner_id: i64,
    partner_key: String,
}

impl fmt::Debug for PartnerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartnerCredentials")
            .field("partner_id", &self.partner_id)
            .field("partner_key", &"[REDACTED]")
            .finish()
    }
}

impl PartnerCredentials {
    pub fn new(partner_id: i64, partner_key: String) -> Self {
        Self {
            partner_id,
            partner_key,
        }
    }

    pub fn partner_id(&self) -> i64 {
        self.partner_id
    }

    pub fn partner_key(&self) -> &str {
        &self.partner_key
    }

    /// Hex-encoded HMAC-SHA256 of `base` keyed by the partner key.
    pub fn sign(&self, base: &str) -> String {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(self.partner_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(base.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Which authorization level a call is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth<'a> {
    /// Partner-level calls (token exchange, authorization URL).
    Partner,
    /// Shop-level calls.
    Shop { access_token: &'a str, shop_id: i64 },
}

impl<'a> Auth<'a> {
    /// Shop-level auth from possibly-missing parts. Both must be present and
    /// the token non-blank; this is checked before anything is signed.
    pub fn shop(access_token: Option<&'a str>, shop_id: Option<i64>) -> Result<Self, SignError> {
        match (access_token.filter(|t| !t.trim().is_empty()), shop_id) {
            (Some(access_token), Some(shop_id)) => Ok(Auth::Shop {
                access_token,
                shop_id,
            }),
            _ => Err(SignError::MissingShopCredentials),
        }
    }
}

/// Canonical path: `/api/v2` followed by the caller's path.
pub fn full_path(api_path: &str) -> String {
    let trimmed = api_path.strip_prefix(API_PREFIX).unwrap_or(api_path);
    if trimmed.starts_with('/') {
        format!("{API_PREFIX}{trimmed}")
    } else {
        format!("{API_PREFIX}/{trimmed}")
    }
}

pub fn base_string(partner_id: i64, full_path: &str, timestamp: i64, auth: &Auth<'_>) -> String {
    match auth {
        Auth::Partner => format!("{partner_id}{full_path}{timestamp}"),
        Auth::Shop {
            access_token,
            shop_id,
        } => format!("{partner_id}{full_path}{timestamp}{access_token}{shop_id}"),
    }
}

/// A signed path plus its ordered query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedQuery {
    pub full_path: String,
    pub sign: String,
    pub params: Vec<(String, String)>,
}

impl SignedQuery {
    pub fn new(
        partner: &PartnerCredentials,
        api_path: &str,
        timestamp: i64,
        auth: &Auth<'_>,
    ) -> Self {
        let full_path = full_path(api_path);
        let base = base_string(partner.partner_id, &full_path, timestamp, auth);
        let sign = partner.sign(&base);

        let mut params = vec![
            ("partner_id".to_string(), partner.partner_id.to_string()),
            ("timestamp".to_string(), timestamp.to_string()),
        ];
        if let Auth::Shop {
            access_token,
            shop_id,
        } = auth
        {
            params.push(("access_token".to_string(), access_token.to_string()));
            params.push(("shop_id".to_string(), shop_id.to_string()));
        }
        params.push(("sign".to_string(), sign.clone()));

        Self {
            full_path,
            sign,
            params,
        }
    }

    /// Append a call-specific parameter after the signature parameters.
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Resolve against `base` into a complete URL. Any path on `base` is
    /// kept as a prefix. Parameter values are percent-encoded.
    pub fn to_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        let prefix = base.path().trim_end_matches('/');
        let mut url = base.join(&format!("{}{}", prefix, self.full_path))?;
        url.query_pairs_mut()
            .extend_pairs(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner() -> PartnerCredentials {
        PartnerCredentials::new(1, "secret-key".into())
    }

    fn expected_hmac(key: &str, msg: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
        mac.update(msg.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn full_path_always_prefixed() {
        assert_eq!(full_path("/product/add_item"), "/api/v2/product/add_item");
        assert_eq!(full_path("product/add_item"), "/api/v2/product/add_item");
        assert_eq!(full_path("/api/v2/shop/auth_partner"), "/api/v2/shop/auth_partner");
    }

    #[test]
    fn shop_signature_matches_reference_base_string() {
        let auth = Auth::shop(Some("tok"), Some(55)).unwrap();
        let signed = SignedQuery::new(&partner(), "/product/get_item_base_info", 1000, &auth);
        assert_eq!(
            base_string(1, &signed.full_path, 1000, &auth),
            "1/api/v2/product/get_item_base_info1000tok55"
        );
        assert_eq!(
            signed.sign,
            expected_hmac("secret-key", "1/api/v2/product/get_item_base_info1000tok55")
        );
        assert_eq!(signed.sign.len(), 64);
        assert!(signed.sign.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn partner_signature_omits_token() {
        let signed = SignedQuery::new(&partner(), "/auth/token/get", 1000, &Auth::Partner);
        assert_eq!(signed.sign, expected_hmac("secret-key", "1/api/v2/auth/token/get1000"));
        let keys: Vec<&str> = signed.params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["partner_id", "timestamp", "sign"]);
    }

    #[test]
    fn shop_auth_requires_both_parts() {
        assert_eq!(Auth::shop(None, Some(55)), Err(SignError::MissingShopCredentials));
        assert_eq!(Auth::shop(Some("tok"), None), Err(SignError::MissingShopCredentials));
        assert_eq!(Auth::shop(Some("  "), Some(55)), Err(SignError::MissingShopCredentials));
    }

    #[test]
    fn url_carries_params_in_order() {
        let auth = Auth::shop(Some("tok"), Some(55)).unwrap();
        let signed = SignedQuery::new(&partner(), "/product/get_item_base_info", 1000, &auth)
            .with_param("item_id_list", "42");
        let base = Url::parse("https://partner.shopeemobile.com").unwrap();
        let url = signed.to_url(&base).unwrap();
        assert_eq!(url.path(), "/api/v2/product/get_item_base_info");
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(
            keys,
            vec!["partner_id", "timestamp", "access_token", "shop_id", "sign", "item_id_list"]
        );
    }

    #[test]
    fn url_keeps_base_path_prefix() {
        let signed = SignedQuery::new(&partner(), "/shop/get_shop_info", 1000, &Auth::Partner);
        for base in ["https://proxy.example.com/shopee/", "https://proxy.example.com/shopee"] {
            let url = signed.to_url(&Url::parse(base).unwrap()).unwrap();
            assert_eq!(url.path(), "/shopee/api/v2/shop/get_shop_info", "base {base}");
        }
        let url = signed
            .to_url(&Url::parse("https://partner.shopeemobile.com/").unwrap())
            .unwrap();
        assert_eq!(url.path(), "/api/v2/shop/get_shop_info");
        // The signature covers the API path only.
        assert_eq!(signed.sign, expected_hmac("secret-key", "1/api/v2/shop/get_shop_info1000"));
    }

    #[test]
    fn debug_redacts_partner_key() {
        let rendered = format!("{:?}", partner());
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("REDACTED"));
    }
}
