//! Best Buy Canada marketplace client (Mirakl seller API).

mod normalize;
pub mod types;

use mportal_core::BestBuySettings;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Url};

use crate::error::ChannelError;
use crate::http::{build_client, join, parse_base_url, HttpPolicy, JsonGet};

pub use normalize::{normalize_offer, normalize_order, order_status};
pub use types::{MiraklAccount, MiraklOffer, MiraklOrder};

use types::{OffersResponse, OrdersResponse};

pub const PLATFORM: &str = "bestbuy";

/// Mirakl's ceiling for the `max` query parameter.
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct BestBuyClient {
    client: Client,
    policy: HttpPolicy,
    base_url: Url,
    api_key: String,
    auth: HeaderValue,
}

impl std::fmt::Debug for BestBuyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BestBuyClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &mask_api_key(&self.api_key))
            .finish_non_exhaustive()
    }
}

impl BestBuyClient {
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidBaseUrl`] for an unusable URL or key and
    /// [`ChannelError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &BestBuySettings, policy: HttpPolicy) -> Result<Self, ChannelError> {
        Self::with_base_url(&settings.api_url, &settings.api_key, policy)
    }

    /// # Errors
    ///
    /// Same as [`BestBuyClient::new`].
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        policy: HttpPolicy,
    ) -> Result<Self, ChannelError> {
        let api_key = api_key.trim().to_owned();
        let auth = HeaderValue::from_str(&api_key).map_err(|e| ChannelError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: format!("api key is not a valid header value: {e}"),
        })?;
        Ok(Self {
            client: build_client(policy)?,
            policy,
            base_url: parse_base_url(base_url)?,
            api_key,
            auth,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The configured key with everything but its edges masked.
    #[must_use]
    pub fn masked_key(&self) -> String {
        mask_api_key(&self.api_key)
    }

    /// # Errors
    ///
    /// Propagates transport, status and decode failures as [`ChannelError`].
    pub async fn account(&self) -> Result<MiraklAccount, ChannelError> {
        let url = join(&self.base_url, "account")?;
        self.request("account").send(url).await
    }

    /// One page of offers. `limit` is clamped to `1..=100`.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode failures as [`ChannelError`].
    pub async fn fetch_offers(&self, limit: u32) -> Result<Vec<MiraklOffer>, ChannelError> {
        let url = self.paged("offers", limit)?;
        let response: OffersResponse = self.request("offers").send(url).await?;
        tracing::debug!(
            count = response.offers.len(),
            total = response.total_count,
            "fetched bestbuy offers"
        );
        Ok(response.offers)
    }

    /// One page of orders. `limit` is clamped to `1..=100`.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode failures as [`ChannelError`].
    pub async fn fetch_orders(&self, limit: u32) -> Result<Vec<MiraklOrder>, ChannelError> {
        let url = self.paged("orders", limit)?;
        let response: OrdersResponse = self.request("orders").send(url).await?;
        tracing::debug!(
            count = response.orders.len(),
            total = response.total_count,
            "fetched bestbuy orders"
        );
        Ok(response.orders)
    }

    fn paged(&self, path: &str, limit: u32) -> Result<Url, ChannelError> {
        let mut url = join(&self.base_url, path)?;
        url.query_pairs_mut()
            .append_pair("max", &limit.clamp(1, MAX_PAGE_SIZE).to_string());
        Ok(url)
    }

    fn request<'a>(&'a self, context: &'a str) -> JsonGet<'a> {
        JsonGet {
            client: &self.client,
            policy: self.policy,
            platform: PLATFORM,
            auth_header: (AUTHORIZATION, &self.auth),
            context,
        }
    }
}

/// Keeps the first and last four characters of keys longer than eight
/// characters. Shorter keys are masked entirely.
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}
