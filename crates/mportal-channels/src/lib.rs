//! HTTP clients for the external sales channels, plus normalization of their
//! payloads into channel-neutral records.

pub mod bestbuy;
pub mod connector;
pub mod error;
mod http;
mod retry;
pub mod shopify;

pub use bestbuy::{mask_api_key, BestBuyClient};
pub use connector::{Batch, ChannelConnector, ConnectionReport, Rejected};
pub use error::ChannelError;
pub use http::HttpPolicy;
pub use shopify::ShopifyClient;
