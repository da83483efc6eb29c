//! Shopify Admin REST API client.

mod normalize;
pub mod types;

use mportal_core::ShopifySettings;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Url};

use crate::bestbuy::mask_api_key;
use crate::error::ChannelError;
use crate::http::{build_client, join, parse_base_url, HttpPolicy, JsonGet};

pub use normalize::{normalize_order, normalize_product};
pub use types::{ShopInfo, ShopifyOrder, ShopifyProduct};

use types::{OrdersResponse, ProductsResponse, ShopResponse};

pub const PLATFORM: &str = "shopify";

/// Shopify refuses `limit` values above this.
pub const MAX_PAGE_SIZE: u32 = 250;

const TOKEN_HEADER: &str = "x-shopify-access-token";

pub struct ShopifyClient {
    client: Client,
    policy: HttpPolicy,
    /// `{shop}/admin/api/{version}/`
    api_base: Url,
    access_token: String,
    token: HeaderValue,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("api_base", &self.api_base.as_str())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ShopifyClient {
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidBaseUrl`] if the shop URL does not parse
    /// or the token is not a valid header value, and [`ChannelError::Http`] if
    /// the HTTP client cannot be built.
    pub fn new(settings: &ShopifySettings, policy: HttpPolicy) -> Result<Self, ChannelError> {
        Self::with_base_url(
            &settings.shop_url,
            &settings.access_token,
            &settings.api_version,
            policy,
        )
    }

    /// Points the client at an arbitrary shop origin, e.g. a mock server.
    ///
    /// # Errors
    ///
    /// Same as [`ShopifyClient::new`].
    pub fn with_base_url(
        shop_url: &str,
        access_token: &str,
        api_version: &str,
        policy: HttpPolicy,
    ) -> Result<Self, ChannelError> {
        let shop = parse_base_url(shop_url)?;
        let api_base = join(&shop, &format!("admin/api/{}/", api_version.trim()))?;
        let access_token = access_token.trim().to_owned();
        let token =
            HeaderValue::from_str(&access_token).map_err(|e| ChannelError::InvalidBaseUrl {
                base_url: shop_url.to_owned(),
                reason: format!("access token is not a valid header value: {e}"),
            })?;
        Ok(Self {
            client: build_client(policy)?,
            policy,
            api_base,
            access_token,
            token,
        })
    }

    /// Versioned Admin API root all requests are joined onto.
    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    #[must_use]
    pub fn masked_token(&self) -> String {
        mask_api_key(&self.access_token)
    }

    /// # Errors
    ///
    /// Propagates transport, status and decode failures as [`ChannelError`].
    pub async fn shop_info(&self) -> Result<ShopInfo, ChannelError> {
        let url = join(&self.api_base, "shop.json")?;
        let response: ShopResponse = self.request("shop.json").send(url).await?;
        Ok(response.shop)
    }

    /// One page of products. `limit` is clamped to `1..=250`.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode failures as [`ChannelError`].
    pub async fn fetch_products(&self, limit: u32) -> Result<Vec<ShopifyProduct>, ChannelError> {
        let mut url = join(&self.api_base, "products.json")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.clamp(1, MAX_PAGE_SIZE).to_string());
        let response: ProductsResponse = self.request("products.json").send(url).await?;
        tracing::debug!(count = response.products.len(), "fetched shopify products");
        Ok(response.products)
    }

    /// One page of orders in any status. `limit` is clamped to `1..=250`.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode failures as [`ChannelError`].
    pub async fn fetch_orders(&self, limit: u32) -> Result<Vec<ShopifyOrder>, ChannelError> {
        let mut url = join(&self.api_base, "orders.json")?;
        url.query_pairs_mut()
            .append_pair("status", "any")
            .append_pair("limit", &limit.clamp(1, MAX_PAGE_SIZE).to_string());
        let response: OrdersResponse = self.request("orders.json").send(url).await?;
        tracing::debug!(count = response.orders.len(), "fetched shopify orders");
        Ok(response.orders)
    }

    fn request<'a>(&'a self, context: &'a str) -> JsonGet<'a> {
        JsonGet {
            client: &self.client,
            policy: self.policy,
            platform: PLATFORM,
            auth_header: (HeaderName::from_static(TOKEN_HEADER), &self.token),
            context,
        }
    }
}
