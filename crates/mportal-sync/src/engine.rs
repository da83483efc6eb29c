use std::collections::HashSet;

use mportal_channels::{Batch, ChannelConnector};
use mportal_core::{normalize_sku, ChannelKind};
use mportal_db::{
    complete_sync_log, create_sync_log, fail_sync_log, mark_channel_synced, ChannelRow,
    SyncCounts, SyncLogRow,
};
use sqlx::PgPool;
use tracing::Instrument;

use crate::reconcile::{reconcile_order, reconcile_product, ProductContext};
use crate::report::{SyncReport, SyncStatus, SyncType, Tally, TriggerSource};
use crate::SyncError;

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Page size requested from the channel.
    pub limit: u32,
    pub trigger: TriggerSource,
    pub user_id: Option<i64>,
}

/// Runs one pass per call. Nothing is resumed or checkpointed.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    pool: PgPool,
}

impl SyncEngine {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pulls one page of listings and reconciles each by SKU.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Channel`] when the fetch fails (the log is marked
    /// `failed` first) and [`SyncError::Db`] when the log itself cannot be
    /// written. Per-record failures are reported, not returned.
    pub async fn sync_products(
        &self,
        channel: &ChannelRow,
        connector: &ChannelConnector,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        check_channel(channel, connector)?;
        let log = self.start(channel, SyncType::Products, options).await?;
        let span = tracing::info_span!(
            "sync",
            channel = %channel.code,
            sync_id = %log.public_id,
            sync_type = "products"
        );

        async {
            let batch = match connector
                .fetch_product_records(options.limit, &channel.currency_code)
                .await {
                Ok(batch) => batch,
                Err(e) => {
                    self.fail_best_effort(&log, &e.to_string(), None).await;
                    return Err(SyncError::from(e));
                }
            };
            tracing::info!(records = batch.len(), "fetched product page");

            let mut tally = tally_rejects(&batch);
            let reference = format!("sync:{}", log.public_id);
            let ctx = ProductContext {
                channel_id: channel.id,
                reference: &reference,
                user_id: options.user_id,
            };
            let mut seen = HashSet::new();

            for record in &batch.records {
                let sku = match normalize_sku(&record.sku) {
                    Ok(sku) => sku,
                    Err(e) => {
                        tally.failed(record.sku.clone(), e.to_string());
                        continue;
                    }
                };
                if !seen.insert(sku.clone()) {
                    tally.failed(sku, "duplicate sku in batch");
                    continue;
                }
                match reconcile_product(&self.pool, &ctx, &sku, record).await {
                    Ok(outcome) if outcome.is_new() => tally.created(),
                    Ok(_) => tally.updated(),
                    Err(e) => {
                        tracing::warn!(sku = %sku, error = %e, "product reconcile failed");
                        tally.failed(sku, e.to_string());
                    }
                }
            }

            self.finish(channel, &log, SyncType::Products, tally).await
        }
        .instrument(span)
        .await
    }

    /// Pulls one page of orders and upserts each by external order id.
    ///
    /// Inventory is left untouched; stock is imported by product sync.
    ///
    /// # Errors
    ///
    /// Same as [`SyncEngine::sync_products`].
    pub async fn sync_orders(
        &self,
        channel: &ChannelRow,
        connector: &ChannelConnector,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        check_channel(channel, connector)?;
        let log = self.start(channel, SyncType::Orders, options).await?;
        let span = tracing::info_span!(
            "sync",
            channel = %channel.code,
            sync_id = %log.public_id,
            sync_type = "orders"
        );

        async {
            let batch = match connector
                .fetch_order_records(options.limit, &channel.currency_code)
                .await {
                Ok(batch) => batch,
                Err(e) => {
                    self.fail_best_effort(&log, &e.to_string(), None).await;
                    return Err(SyncError::from(e));
                }
            };
            tracing::info!(records = batch.len(), "fetched order page");

            let mut tally = tally_rejects(&batch);
            for record in &batch.records {
                match reconcile_order(&self.pool, channel.id, record).await {
                    Ok(true) => tally.created(),
                    Ok(false) => tally.updated(),
                    Err(e) => {
                        tracing::warn!(
                            external_order_id = %record.external_order_id,
                            error = %e,
                            "order reconcile failed"
                        );
                        tally.failed(record.external_order_id.clone(), e.to_string());
                    }
                }
            }

            self.finish(channel, &log, SyncType::Orders, tally).await
        }
        .instrument(span)
        .await
    }

    async fn start(
        &self,
        channel: &ChannelRow,
        sync_type: SyncType,
        options: &SyncOptions,
    ) -> Result<SyncLogRow, SyncError> {
        let log = create_sync_log(
            &self.pool,
            channel.id,
            sync_type.as_str(),
            options.trigger.as_str(),
            options.user_id,
        )
        .await?;
        tracing::info!(
            channel = %channel.code,
            sync_id = %log.public_id,
            sync_type = sync_type.as_str(),
            trigger = options.trigger.as_str(),
            limit = options.limit,
            "sync started"
        );
        Ok(log)
    }

    async fn finish(
        &self,
        channel: &ChannelRow,
        log: &SyncLogRow,
        sync_type: SyncType,
        tally: Tally,
    ) -> Result<SyncReport, SyncError> {
        let status = SyncStatus::from_counts(&tally.counts);
        let details = tally.details();

        let written = if status == SyncStatus::Failed {
            let message = format!("all {} records failed", tally.counts.failed);
            fail_sync_log(
                &self.pool,
                log.id,
                &message,
                Some(&tally.counts),
                Some(&details),
            )
            .await
        } else {
            complete_sync_log(&self.pool, log.id, &tally.counts, &details).await
        };
        if let Err(e) = written {
            self.fail_best_effort(log, &e.to_string(), Some(&tally.counts))
                .await;
            return Err(e.into());
        }

        mark_channel_synced(&self.pool, channel.id).await?;

        let counts = tally.counts;
        tracing::info!(
            processed = counts.processed,
            created = counts.created,
            updated = counts.updated,
            failed = counts.failed,
            status = ?status,
            "sync finished"
        );
        Ok(SyncReport {
            sync_id: log.public_id,
            channel_code: channel.code.clone(),
            sync_type,
            processed: counts.processed,
            created: counts.created,
            updated: counts.updated,
            failed: counts.failed,
            errors: tally.errors,
            status,
        })
    }

    /// Marks the log failed, logging rather than propagating a second error.
    async fn fail_best_effort(&self, log: &SyncLogRow, message: &str, counts: Option<&SyncCounts>) {
        if let Err(e) = fail_sync_log(&self.pool, log.id, message, counts, None).await {
            tracing::error!(
                sync_id = %log.public_id,
                error = %e,
                "failed to mark sync log as failed"
            );
        }
    }
}

fn check_channel(channel: &ChannelRow, connector: &ChannelConnector) -> Result<(), SyncError> {
    if !channel.is_active {
        return Err(SyncError::ChannelInactive(channel.code.clone()));
    }
    let expected = connector.kind();
    if channel.kind.parse::<ChannelKind>().ok() != Some(expected) {
        return Err(SyncError::KindMismatch {
            channel_code: channel.code.clone(),
            expected: expected.as_str(),
            actual: channel.kind.clone(),
        });
    }
    Ok(())
}

fn tally_rejects<T>(batch: &Batch<T>) -> Tally {
    let mut tally = Tally::default();
    for rejected in &batch.rejected {
        tally.failed(rejected.key.clone(), rejected.reason.clone());
    }
    tally
}
