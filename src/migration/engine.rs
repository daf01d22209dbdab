//! Entry point tying the resolver, queue, pool and results together

use crate::config::{ConfigError, MAX_NUM_OF_WORKERS, MIN_NUM_OF_WORKERS};
use crate::error::Result;
use crate::logging::Logger;
use crate::migration::{
    ImageSetResolver, MigrationReport, ResultAggregator, WorkQueue, WorkSource, WorkerPool,
};
use crate::registry::access::{DestinationRepository, ImageTransfer};
use std::sync::Arc;

/// Validated knobs of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationSettings {
    workers: usize,
    overwrite: bool,
}

impl MigrationSettings {
    pub fn new(workers: usize, overwrite: bool) -> std::result::Result<Self, ConfigError> {
        if !(MIN_NUM_OF_WORKERS..=MAX_NUM_OF_WORKERS).contains(&workers) {
            return Err(ConfigError::WorkerCount {
                value: workers,
                min: MIN_NUM_OF_WORKERS,
                max: MAX_NUM_OF_WORKERS,
            });
        }
        Ok(Self { workers, overwrite })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }
}

/// Migrate every image `work` resolves to and report what happened.
///
/// Workers start before the resolver so that discovery and transfers overlap.
/// The report is only built after every worker has been joined.
pub async fn run_migration(
    work: WorkSource,
    settings: MigrationSettings,
    resolver: &ImageSetResolver,
    destination: Arc<dyn DestinationRepository>,
    transfer: Arc<dyn ImageTransfer>,
    logger: &Logger,
) -> Result<MigrationReport> {
    let queue = Arc::new(WorkQueue::new());
    let results = Arc::new(ResultAggregator::new());

    logger.verbose(&format!(
        "Starting {} workers (overwrite: {})",
        settings.workers, settings.overwrite
    ));
    let pool = WorkerPool::spawn(
        settings.workers,
        settings.overwrite,
        Arc::clone(&queue),
        Arc::clone(&results),
        destination,
        transfer,
        logger.clone(),
    );

    let total = resolver.resolve(work, &queue).await;
    queue.close();

    if total == 0 {
        logger.info("Nothing to migrate.");
    } else {
        logger.info(&format!("Performing migration for {} image/tags.", total));
    }

    let processed = pool.join().await?;
    if processed != total {
        logger.warning(&format!(
            "Workers processed {} items but {} were queued",
            processed, total
        ));
    }
    if total > 0 {
        logger.info("Migration finished.");
    }

    ResultAggregator::into_report(results, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_bounds() {
        assert!(MigrationSettings::new(0, false).is_err());
        assert!(MigrationSettings::new(17, false).is_err());

        let low = MigrationSettings::new(1, false).unwrap();
        let high = MigrationSettings::new(16, true).unwrap();
        assert_eq!(low.workers(), 1);
        assert_eq!(high.workers(), 16);
        assert!(high.overwrite());
    }

    #[test]
    fn test_worker_bound_error_message() {
        let err = MigrationSettings::new(17, false).unwrap_err();
        assert_eq!(err.to_string(), "--num-of-workers must be between 1 and 16, got 17");
    }
}
