use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {platform}{}", retry_hint(.retry_after_secs))]
    RateLimited {
        platform: &'static str,
        /// `Retry-After` in seconds, when the response carried one.
        retry_after_secs: Option<u64>,
    },

    #[error("{platform} rejected the credentials (HTTP {status})")]
    Unauthorized { platform: &'static str, status: u16 },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("normalization error for {external_id}: {reason}")]
    Normalization { external_id: String, reason: String },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs.map_or_else(String::new, |secs| format!(" (retry after {secs}s)"))
}

impl ChannelError {
    /// Short machine-readable category, used for troubleshooting hints and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(_) => "network",
            Self::Deserialize { .. } => "unexpected_response",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::UnexpectedStatus { .. } => "unexpected_status",
            Self::Normalization { .. } => "normalization",
            Self::InvalidBaseUrl { .. } => "invalid_base_url",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}
