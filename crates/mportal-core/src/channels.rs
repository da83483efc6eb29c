use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::ChannelKind;
use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    /// Stable identifier used by routes and the CLI. Derived from `name` when absent.
    pub code: Option<String>,
    pub kind: ChannelKind,
    pub base_url: Option<String>,
    pub currency_code: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl ChannelConfig {
    /// The explicit code, or a URL-safe slug of the name.
    #[must_use]
    pub fn code(&self) -> String {
        match self.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_lowercase(),
            _ => slugify(&self.name),
        }
    }

    #[must_use]
    pub fn currency(&self) -> String {
        self.currency_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map_or_else(
                || self.kind.default_currency().to_string(),
                str::to_uppercase,
            )
    }
}

/// Lowercase, ASCII alphanumerics and single dashes only.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug, Deserialize)]
pub struct ChannelsFile {
    pub channels: Vec<ChannelConfig>,
}

/// Load and validate the channel seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_channels(path: &Path) -> Result<ChannelsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ChannelsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_channels(&content)
}

/// Parse and validate channel seed YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_channels(content: &str) -> Result<ChannelsFile, ConfigError> {
    let file: ChannelsFile = serde_yaml::from_str(content)?;
    validate_channels(&file)?;
    Ok(file)
}

fn validate_channels(file: &ChannelsFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();
    let mut seen_codes = HashSet::new();

    for channel in &file.channels {
        if channel.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "channel name must be non-empty".to_string(),
            ));
        }

        if !seen_names.insert(channel.name.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate channel name: '{}'",
                channel.name
            )));
        }

        let code = channel.code();
        if code.is_empty() {
            return Err(ConfigError::Validation(format!(
                "channel '{}' produces an empty code",
                channel.name
            )));
        }
        if !seen_codes.insert(code.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate channel code: '{code}' (from channel '{}')",
                channel.name
            )));
        }
    }

    Ok(())
}
