//! Shared request plumbing for the channel clients.

use std::time::Duration;

use mportal_core::AppConfig;
use reqwest::header::{HeaderName, HeaderValue, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::ChannelError;
use crate::retry::retry_with_backoff;

const USER_AGENT: &str = concat!("mportal/", env!("CARGO_PKG_VERSION"));

/// Timeout and retry knobs shared by every channel client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpPolicy {
    pub timeout_secs: u64,
    /// Extra attempts after the first failure. `0` disables retries.
    pub max_retries: u32,
    pub backoff_base_secs: u64,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            backoff_base_secs: 1,
        }
    }
}

impl HttpPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.http_timeout_secs,
            max_retries: config.http_max_retries,
            backoff_base_secs: config.http_retry_backoff_base_secs,
        }
    }
}

pub(crate) fn build_client(policy: HttpPolicy) -> Result<Client, ChannelError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(policy.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Parses `raw` as an absolute http(s) URL and guarantees a trailing slash so
/// relative joins keep the full path.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ChannelError> {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };
    let normalized = if with_scheme.ends_with('/') {
        with_scheme
    } else {
        format!("{with_scheme}/")
    };
    let url = Url::parse(&normalized).map_err(|e| ChannelError::InvalidBaseUrl {
        base_url: raw.to_owned(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(ChannelError::InvalidBaseUrl {
            base_url: raw.to_owned(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

pub(crate) fn join(base: &Url, path: &str) -> Result<Url, ChannelError> {
    base.join(path).map_err(|e| ChannelError::InvalidBaseUrl {
        base_url: base.to_string(),
        reason: e.to_string(),
    })
}

/// One authenticated GET with retries, decoded as `T`.
pub(crate) struct JsonGet<'a> {
    pub client: &'a Client,
    pub policy: HttpPolicy,
    pub platform: &'static str,
    pub auth_header: (HeaderName, &'a HeaderValue),
    pub context: &'a str,
}

impl JsonGet<'_> {
    pub(crate) async fn send<T: DeserializeOwned>(&self, url: Url) -> Result<T, ChannelError> {
        let body = retry_with_backoff(self.policy.max_retries, self.policy.backoff_base_secs, || {
            let url = url.clone();
            async move { self.get_once(url).await }
        })
        .await?;

        serde_json::from_str(&body).map_err(|source| ChannelError::Deserialize {
            context: self.context.to_owned(),
            source,
        })
    }

    async fn get_once(&self, url: Url) -> Result<String, ChannelError> {
        let (name, value) = &self.auth_header;
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(name.clone(), (*value).clone())
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            return Err(ChannelError::RateLimited {
                platform: self.platform,
                retry_after_secs,
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ChannelError::Unauthorized {
                platform: self.platform,
                status: status.as_u16(),
            });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ChannelError::NotFound {
                url: redact_query(&url),
            });
        }
        if !status.is_success() {
            return Err(ChannelError::UnexpectedStatus {
                status: status.as_u16(),
                url: redact_query(&url),
            });
        }

        Ok(response.text().await?)
    }
}

fn redact_query(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}
