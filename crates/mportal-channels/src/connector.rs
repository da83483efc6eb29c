//! One entry point over every channel the sync engine can pull from.

use std::collections::BTreeMap;

use mportal_core::{AppConfig, ChannelKind, ChannelOrderRecord, ChannelProductRecord};
use serde::Serialize;
use serde_json::Value;

use crate::bestbuy::{self, BestBuyClient};
use crate::error::ChannelError;
use crate::http::HttpPolicy;
use crate::shopify::{self, ShopifyClient};

/// A record the channel returned but that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejected {
    /// Channel-side id of the offending product, variant or order.
    pub key: String,
    pub reason: String,
}

/// One fetched page after normalization.
#[derive(Debug, Clone, Serialize)]
pub struct Batch<T> {
    pub records: Vec<T>,
    pub rejected: Vec<Rejected>,
}

impl<T> Batch<T> {
    fn collect(results: impl IntoIterator<Item = Result<T, ChannelError>>) -> Self {
        let mut records = Vec::new();
        let mut rejected = Vec::new();
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(ChannelError::Normalization { external_id, reason }) => {
                    tracing::warn!(key = %external_id, %reason, "rejected channel record");
                    rejected.push(Rejected {
                        key: external_id,
                        reason,
                    });
                }
                Err(other) => rejected.push(Rejected {
                    key: String::new(),
                    reason: other.to_string(),
                }),
            }
        }
        Self { records, rejected }
    }

    /// Records plus rejects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len() + self.rejected.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a connectivity probe. A failed probe is still a report.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub platform: &'static str,
    pub message: String,
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    pub masked_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub troubleshooting: Option<BTreeMap<String, String>>,
}

impl ConnectionReport {
    #[must_use]
    pub fn not_configured(platform: &'static str) -> Self {
        let mut hints = BTreeMap::new();
        hints.insert(
            "configuration".to_string(),
            match platform {
                shopify::PLATFORM => {
                    "Set SHOPIFY_SHOP_URL and SHOPIFY_ACCESS_TOKEN, then restart the server"
                }
                bestbuy::PLATFORM => "Set BESTBUY_API_KEY (and BESTBUY_API_URL if not the default)",
                _ => "This channel has no API integration",
            }
            .to_string(),
        );
        Self {
            success: false,
            platform,
            message: format!("{platform} is not configured"),
            masked_key: None,
            data: None,
            troubleshooting: Some(hints),
        }
    }

    /// A failed probe, or a connector that could not be built.
    #[must_use]
    pub fn from_error(
        platform: &'static str,
        masked_key: Option<String>,
        err: &ChannelError,
    ) -> Self {
        Self {
            success: false,
            platform,
            message: format!("{platform} connection failed: {err}"),
            masked_key,
            data: None,
            troubleshooting: Some(troubleshooting_for(platform, err)),
        }
    }
}

fn troubleshooting_for(platform: &'static str, err: &ChannelError) -> BTreeMap<String, String> {
    let mut hints = BTreeMap::new();
    hints.insert("error_kind".to_string(), err.kind().to_string());
    let (key, hint) = match err {
        ChannelError::Unauthorized { .. } => (
            "credentials",
            if platform == bestbuy::PLATFORM {
                "The marketplace rejected the API key. Generate a new key in the seller portal"
            } else {
                "The access token was rejected. Check the app's Admin API scopes and token"
            },
        ),
        ChannelError::NotFound { .. } | ChannelError::InvalidBaseUrl { .. } => (
            "base_url",
            "Check the configured API URL and API version",
        ),
        ChannelError::RateLimited { .. } => {
            ("rate_limit", "The API is throttling requests. Wait and try again")
        }
        ChannelError::Http(_) => (
            "network",
            "The API could not be reached. Check DNS, firewall rules and the URL scheme",
        ),
        ChannelError::Deserialize { .. } => (
            "response",
            "The API answered with an unexpected payload. Confirm the URL points at the API root",
        ),
        ChannelError::UnexpectedStatus { .. }
        | ChannelError::Normalization { .. }
        | ChannelError::NotConfigured(_) => (
            "support",
            "Retry later. If it persists, check the platform status page",
        ),
    };
    hints.insert(key.to_string(), hint.to_string());
    hints
}

#[derive(Debug)]
pub enum ChannelConnector {
    Shopify(ShopifyClient),
    BestBuy(BestBuyClient),
}

impl ChannelConnector {
    /// Builds the connector for `kind` from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConfigured`] when the kind has no API
    /// integration or its credentials are missing.
    pub fn for_kind(kind: ChannelKind, config: &AppConfig) -> Result<Self, ChannelError> {
        Self::for_channel(kind, None, config)
    }

    /// Builds the connector for a registered channel. A non-blank `base_url`
    /// from the channel row replaces the configured API URL; credentials and
    /// the API version always come from `config`.
    ///
    /// # Errors
    ///
    /// Same as [`ChannelConnector::for_kind`], plus
    /// [`ChannelError::InvalidBaseUrl`] for an unusable override.
    pub fn for_channel(
        kind: ChannelKind,
        base_url: Option<&str>,
        config: &AppConfig,
    ) -> Result<Self, ChannelError> {
        let policy = HttpPolicy::from_app_config(config);
        let base_url = base_url.map(str::trim).filter(|url| !url.is_empty());
        match kind {
            ChannelKind::Shopify => {
                let settings = config
                    .shopify
                    .as_ref()
                    .ok_or(ChannelError::NotConfigured(shopify::PLATFORM))?;
                let client = match base_url {
                    Some(url) => ShopifyClient::with_base_url(
                        url,
                        &settings.access_token,
                        &settings.api_version,
                        policy,
                    )?,
                    None => ShopifyClient::new(settings, policy)?,
                };
                Ok(Self::Shopify(client))
            }
            ChannelKind::BestBuy => {
                let settings = config
                    .bestbuy
                    .as_ref()
                    .ok_or(ChannelError::NotConfigured(bestbuy::PLATFORM))?;
                let client = match base_url {
                    Some(url) => BestBuyClient::with_base_url(url, &settings.api_key, policy)?,
                    None => BestBuyClient::new(settings, policy)?,
                };
                Ok(Self::BestBuy(client))
            }
            ChannelKind::Amazon | ChannelKind::Manual => {
                Err(ChannelError::NotConfigured(kind.as_str()))
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Shopify(_) => ChannelKind::Shopify,
            Self::BestBuy(_) => ChannelKind::BestBuy,
        }
    }

    #[must_use]
    pub fn platform(&self) -> &'static str {
        match self {
            Self::Shopify(_) => shopify::PLATFORM,
            Self::BestBuy(_) => bestbuy::PLATFORM,
        }
    }

    /// Fetches and normalizes one page of listings. `currency` applies to
    /// every listing whose payload names none, normally the channel's own
    /// currency code.
    ///
    /// # Errors
    ///
    /// Returns the fetch error. Per-record normalization failures land in
    /// [`Batch::rejected`] instead.
    pub async fn fetch_product_records(
        &self,
        limit: u32,
        currency: &str,
    ) -> Result<Batch<ChannelProductRecord>, ChannelError> {
        match self {
            Self::Shopify(client) => {
                let products = client.fetch_products(limit).await?;
                Ok(Batch::collect(
                    products
                        .iter()
                        .flat_map(|p| shopify::normalize_product(p, currency)),
                ))
            }
            Self::BestBuy(client) => {
                let offers = client.fetch_offers(limit).await?;
                Ok(Batch::collect(
                    offers.iter().map(|o| bestbuy::normalize_offer(o, currency)),
                ))
            }
        }
    }

    /// `currency` fills in orders whose payload names none.
    ///
    /// # Errors
    ///
    /// Returns the fetch error. Per-order normalization failures land in
    /// [`Batch::rejected`].
    pub async fn fetch_order_records(
        &self,
        limit: u32,
        currency: &str,
    ) -> Result<Batch<ChannelOrderRecord>, ChannelError> {
        match self {
            Self::Shopify(client) => {
                let orders = client.fetch_orders(limit).await?;
                Ok(Batch::collect(orders.iter().map(shopify::normalize_order)))
            }
            Self::BestBuy(client) => {
                let orders = client.fetch_orders(limit).await?;
                Ok(Batch::collect(
                    orders.iter().map(|o| bestbuy::normalize_order(o, currency)),
                ))
            }
        }
    }

    /// Calls the cheapest authenticated endpoint and describes the outcome.
    pub async fn test_connection(&self) -> ConnectionReport {
        match self {
            Self::Shopify(client) => {
                let masked = client.masked_token();
                match client.shop_info().await {
                    Ok(shop) => ConnectionReport {
                        success: true,
                        platform: shopify::PLATFORM,
                        message: format!("Connected to Shopify store {}", shop.name),
                        masked_key: Some(masked),
                        data: serde_json::to_value(&shop).ok(),
                        troubleshooting: None,
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "shopify connection test failed");
                        ConnectionReport::from_error(shopify::PLATFORM, Some(masked), &e)
                    }
                }
            }
            Self::BestBuy(client) => {
                let masked = client.masked_key();
                match client.account().await {
                    Ok(account) => ConnectionReport {
                        success: true,
                        platform: bestbuy::PLATFORM,
                        message: format!(
                            "Connected to Best Buy marketplace as {}",
                            account.shop_name.as_deref().unwrap_or("unknown shop")
                        ),
                        masked_key: Some(masked),
                        data: serde_json::to_value(&account).ok(),
                        troubleshooting: None,
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "bestbuy connection test failed");
                        ConnectionReport::from_error(bestbuy::PLATFORM, Some(masked), &e)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::path::PathBuf;

    use mportal_core::{BestBuySettings, Environment, ShopifySettings};

    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            database_url: "postgres://example".to_string(),
            env: Environment::Test,
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
            log_level: "info".to_string(),
            jwt_secret: "secret".to_string(),
            jwt_ttl_hours: 1,
            channels_path: PathBuf::from("./config/channels.yaml"),
            db_max_connections: 5,
            db_min_connections: 1,
            db_acquire_timeout_secs: 5,
            http_timeout_secs: 5,
            http_max_retries: 0,
            http_retry_backoff_base_secs: 0,
            sync_default_limit: 50,
            rate_limit_per_minute: 60,
            cors_origins: vec![],
            shopify: Some(ShopifySettings {
                shop_url: "https://demo.myshopify.com".to_string(),
                access_token: "shpat_test".to_string(),
                api_version: "2024-01".to_string(),
            }),
            bestbuy: Some(BestBuySettings {
                api_url: "https://marketplace.bestbuy.ca/api".to_string(),
                api_key: "key-123456789".to_string(),
            }),
        }
    }

    #[test]
    fn channel_base_url_overrides_configured_url() {
        let connector = ChannelConnector::for_channel(
            ChannelKind::BestBuy,
            Some(" https://sandbox.mirakl.test/api "),
            &config(),
        )
        .unwrap();
        let ChannelConnector::BestBuy(client) = connector else {
            panic!("expected a Best Buy connector");
        };
        assert_eq!(client.base_url().as_str(), "https://sandbox.mirakl.test/api/");

        let connector =
            ChannelConnector::for_channel(ChannelKind::Shopify, Some("other.myshopify.com"), &config())
                .unwrap();
        let ChannelConnector::Shopify(client) = connector else {
            panic!("expected a Shopify connector");
        };
        assert_eq!(
            client.api_base().as_str(),
            "https://other.myshopify.com/admin/api/2024-01/"
        );
    }

    #[test]
    fn blank_channel_base_url_keeps_configured_url() {
        let connector =
            ChannelConnector::for_channel(ChannelKind::BestBuy, Some("  "), &config()).unwrap();
        let ChannelConnector::BestBuy(client) = connector else {
            panic!("expected a Best Buy connector");
        };
        assert_eq!(client.base_url().as_str(), "https://marketplace.bestbuy.ca/api/");

        let err = ChannelConnector::for_channel(ChannelKind::Manual, None, &config()).unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured("manual")));
    }

    #[test]
    fn not_configured_report_has_hint_and_no_key() {
        let report = ConnectionReport::not_configured(bestbuy::PLATFORM);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["platform"], "bestbuy");
        assert!(json.get("apiKey").is_none());
        assert!(json["troubleshooting"]["configuration"]
            .as_str()
            .unwrap()
            .contains("BESTBUY_API_KEY"));
    }

    #[test]
    fn failed_report_serializes_masked_key_as_api_key() {
        let err = ChannelError::Unauthorized {
            platform: "bestbuy",
            status: 401,
        };
        let report =
            ConnectionReport::from_error(bestbuy::PLATFORM, Some("abcd****wxyz".into()), &err);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["apiKey"], "abcd****wxyz");
        assert_eq!(json["troubleshooting"]["error_kind"], "unauthorized");
        assert!(json["troubleshooting"]["credentials"].is_string());
    }

    #[test]
    fn batch_splits_records_and_rejects() {
        let batch = Batch::collect(vec![
            Ok(1),
            Err(ChannelError::Normalization {
                external_id: "9".into(),
                reason: "bad price".into(),
            }),
            Ok(2),
        ]);
        assert_eq!(batch.records, vec![1, 2]);
        assert_eq!(
            batch.rejected,
            vec![Rejected {
                key: "9".into(),
                reason: "bad price".into()
            }]
        );
        assert_eq!(batch.len(), 3);
    }
}
