//! Background job scheduler.
//!
//! The only recurring job keeps `daily_sales_summary` current. Channel syncs
//! are always triggered by a user.

use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Every hour at minute 5.
const ROLLUP_SCHEDULE: &str = "0 5 * * * *";

/// Builds and starts the background job scheduler.
///
/// The returned handle must be kept alive for the lifetime of the process;
/// dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(pool: PgPool) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_rollup_job(&scheduler, pool).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_rollup_job(
    scheduler: &JobScheduler,
    pool: PgPool,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(ROLLUP_SCHEDULE, move |_uuid, _lock| {
        let pool = pool.clone();
        Box::pin(async move {
            let (from, to) = rollup_window(Utc::now().date_naive());
            run_rollup(&pool, from, to).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Yesterday and today. Late-arriving orders from just before midnight
/// land in yesterday's row.
fn rollup_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(1), today)
}

async fn run_rollup(pool: &PgPool, from: NaiveDate, to: NaiveDate) {
    match mportal_db::refresh_daily_summary(pool, from, to).await {
        Ok(rows) => tracing::info!(%from, %to, rows, "scheduler: daily sales summary refreshed"),
        Err(e) => tracing::error!(%from, %to, error = %e, "scheduler: daily summary refresh failed"),
    }
}
