//! Fixed-size pool of workers draining the work queue

use crate::error::Result;
use crate::logging::Logger;
use crate::migration::{ImageReference, MigrationOutcome, ResultAggregator, WorkQueue};
use crate::registry::access::{DestinationRepository, ImageTransfer};
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Running set of migration workers
pub struct WorkerPool {
    handles: Vec<JoinHandle<usize>>,
    logger: Logger,
}

impl WorkerPool {
    /// Spawn `workers` tasks that pop from `queue` until it is closed and empty.
    ///
    /// `workers` is expected to be validated already; the engine rejects values
    /// outside the supported range before anything is spawned.
    pub fn spawn(
        workers: usize,
        overwrite: bool,
        queue: Arc<WorkQueue>,
        results: Arc<ResultAggregator>,
        destination: Arc<dyn DestinationRepository>,
        transfer: Arc<dyn ImageTransfer>,
        logger: Logger,
    ) -> Self {
        let handles = (1..=workers)
            .map(|id| {
                let worker = Worker {
                    overwrite,
                    queue: Arc::clone(&queue),
                    results: Arc::clone(&results),
                    destination: Arc::clone(&destination),
                    transfer: Arc::clone(&transfer),
                    logger: logger.scoped(format!("worker-{}", id)),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        Self { handles, logger }
    }

    /// Wait for every worker to exit. Returns the number of items processed.
    pub async fn join(self) -> Result<usize> {
        let mut processed = 0;
        for outcome in join_all(self.handles).await {
            processed += outcome?;
        }
        self.logger
            .verbose(&format!("All workers finished after {} items", processed));
        Ok(processed)
    }
}

struct Worker {
    overwrite: bool,
    queue: Arc<WorkQueue>,
    results: Arc<ResultAggregator>,
    destination: Arc<dyn DestinationRepository>,
    transfer: Arc<dyn ImageTransfer>,
    logger: Logger,
}

impl Worker {
    async fn run(self) -> usize {
        let mut processed = 0;
        while let Some(image) = self.queue.pop().await {
            // A panicking adapter fails this image only; the worker keeps draining
            let outcome = match AssertUnwindSafe(self.migrate(&image)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    self.logger
                        .error(&format!("Migration of {} panicked: {}", image, message));
                    MigrationOutcome::Failed(format!("panicked: {}", message))
                }
            };
            self.results.record(image, &outcome);
            processed += 1;
        }
        self.logger.verbose("Queue drained, worker exiting");
        processed
    }

    async fn migrate(&self, image: &ImageReference) -> MigrationOutcome {
        if !self.overwrite && self.exists_at_destination(image).await {
            self.logger
                .info(&format!("Skipping {}, it already exists at the destination", image));
            return MigrationOutcome::Skipped("already exists".to_string());
        }

        self.logger.info(&format!("Migrating {}", image));
        match self.transfer.transfer_image(image).await {
            Ok(()) => {
                self.logger.success(&format!("Migrated {}", image));
                MigrationOutcome::Migrated
            }
            Err(e) => {
                self.logger
                    .error(&format!("Failed to migrate {}: {}", image, e));
                MigrationOutcome::Failed(e.to_string())
            }
        }
    }

    async fn exists_at_destination(&self, image: &ImageReference) -> bool {
        match self.destination.has_image(&image.name, &image.tag).await {
            Ok(exists) => exists,
            Err(e) => {
                self.logger.warning(&format!(
                    "Could not check whether {} exists at the destination, migrating anyway: {}",
                    image, e
                ));
                false
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
