//! On-demand channel sync: pull one page from a channel and reconcile it
//! into the canonical catalog, inventory and order tables.

mod engine;
mod reconcile;
mod report;

use mportal_channels::ChannelError;
use mportal_db::DbError;
use thiserror::Error;

pub use engine::{SyncEngine, SyncOptions};
pub use report::{ItemError, SyncReport, SyncStatus, SyncType, TriggerSource};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("channel request failed: {0}")]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("channel '{0}' is inactive")]
    ChannelInactive(String),

    #[error("channel '{channel_code}' is a {actual} channel, not {expected}")]
    KindMismatch {
        channel_code: String,
        expected: &'static str,
        actual: String,
    },
}
