use mportal_db::SyncCounts;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    Products,
    Orders,
}

impl SyncType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Orders => "orders",
        }
    }
}

/// Who started the run; stored as `sync_logs.trigger_source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Api,
    Cli,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Cli => "cli",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Succeeded,
    Partial,
    Failed,
}

impl SyncStatus {
    /// Every record failing fails the run; any failure makes it partial.
    #[must_use]
    pub fn from_counts(counts: &SyncCounts) -> Self {
        if counts.failed > 0 && counts.failed >= counts.processed {
            Self::Failed
        } else if counts.failed > 0 {
            Self::Partial
        } else {
            Self::Succeeded
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    /// SKU for products, external order id for orders.
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub sync_id: Uuid,
    pub channel_code: String,
    pub sync_type: SyncType,
    pub processed: i32,
    pub created: i32,
    pub updated: i32,
    pub failed: i32,
    pub errors: Vec<ItemError>,
    pub status: SyncStatus,
}

/// Running totals for one pass.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub counts: SyncCounts,
    pub errors: Vec<ItemError>,
}

impl Tally {
    pub fn created(&mut self) {
        self.counts.processed = self.counts.processed.saturating_add(1);
        self.counts.created = self.counts.created.saturating_add(1);
    }

    pub fn updated(&mut self) {
        self.counts.processed = self.counts.processed.saturating_add(1);
        self.counts.updated = self.counts.updated.saturating_add(1);
    }

    pub fn failed(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        self.counts.processed = self.counts.processed.saturating_add(1);
        self.counts.failed = self.counts.failed.saturating_add(1);
        self.errors.push(ItemError {
            key: key.into(),
            reason: reason.into(),
        });
    }

    pub fn details(&self) -> serde_json::Value {
        serde_json::json!({ "errors": self.errors })
    }
}
