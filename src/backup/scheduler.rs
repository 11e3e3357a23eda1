use crate::backup::engine::{BackupEngine, BackupResult};
use crate::config::Schedule;
use chrono::{Duration, Local};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::select;
use tokio::time::sleep;
use tracing::{error, info};

/// Runs the engine now and then once per `schedule` interval until
/// `shutdown` is raised. Runs never overlap.
pub async fn run_scheduler(engine: Arc<BackupEngine>, schedule: Schedule, shutdown: Arc<AtomicUsize>) {
    run_scheduler_with(engine, schedule, shutdown, |_| {}).await
}

/// Like [`run_scheduler`], handing every finished run to `on_result`.
pub async fn run_scheduler_with<F>(
    engine: Arc<BackupEngine>,
    schedule: Schedule,
    shutdown: Arc<AtomicUsize>,
    mut on_result: F,
) where
    F: FnMut(&BackupResult) + Send,
{
    let interval_secs = schedule.as_seconds().max(1);
    info!("Starting backup scheduler: {}", schedule);

    loop {
        if shutdown.load(Ordering::Relaxed) > 0 {
            info!("Scheduler shutdown requested");
            break;
        }

        let result = engine.run().await;
        if result.success {
            info!(
                "Scheduled backup {} uploaded: {:.2} MB in {} sec",
                result.archive_name,
                result.file_size.unwrap_or(0) as f64 / 1024.0 / 1024.0,
                result.duration_secs
            );
        } else {
            error!(
                "Scheduled backup {} failed: {}",
                result.archive_name,
                result.error.as_deref().unwrap_or_default()
            );
        }
        on_result(&result);

        let next_run = Local::now() + Duration::seconds(interval_secs as i64);
        info!("Next backup at {}", next_run.format("%Y-%m-%d %H:%M:%S"));

        select! {
            _ = sleep(std::time::Duration::from_secs(interval_secs)) => {}
            _ = async {
                while shutdown.load(Ordering::Relaxed) == 0 {
                    sleep(std::time::Duration::from_millis(100)).await;
                }
            } => {
                info!("Scheduler shutdown requested during wait");
                break;
            }
        }
    }

    info!("Scheduler stopped");
}
