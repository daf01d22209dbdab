//! Thread-safe accumulation of migration outcomes and the final report

use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::migration::{ImageReference, MigrationOutcome};
use std::sync::{Arc, Mutex};

/// Append-only record of what every worker did
#[derive(Debug, Default)]
pub struct ResultAggregator {
    skipped: Mutex<Vec<ImageReference>>,
    failed: Mutex<Vec<ImageReference>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, image: ImageReference, outcome: &MigrationOutcome) {
        match outcome {
            // Derived from the total when the report is built
            MigrationOutcome::Migrated => {}
            MigrationOutcome::Skipped(_) => append(&self.skipped, image),
            MigrationOutcome::Failed(_) => append(&self.failed, image),
        }
    }

    /// Consume the aggregator once no worker holds a reference to it anymore.
    ///
    /// Fails if any clone of the `Arc` is still alive, i.e. a worker has not been
    /// joined yet.
    pub fn into_report(shared: Arc<Self>, total: usize) -> Result<MigrationReport> {
        let aggregator = Arc::try_unwrap(shared).map_err(|_| {
            RegistryError::Pool("results read while workers are still running".to_string())
        })?;

        let skipped = into_inner(aggregator.skipped);
        let failed = into_inner(aggregator.failed);

        Ok(MigrationReport {
            total,
            migrated: total.saturating_sub(skipped.len() + failed.len()),
            skipped,
            failed,
        })
    }
}

fn append(list: &Mutex<Vec<ImageReference>>, image: ImageReference) {
    list.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(image);
}

fn into_inner(list: Mutex<Vec<ImageReference>>) -> Vec<ImageReference> {
    list.into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Outcome of a whole migration run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub total: usize,
    pub migrated: usize,
    pub skipped: Vec<ImageReference>,
    pub failed: Vec<ImageReference>,
}

impl MigrationReport {
    /// Failed images in image-file format, one `name:tag` per line
    pub fn failed_image_list(&self) -> String {
        self.failed
            .iter()
            .map(|image| format!("{}\n", image))
            .collect()
    }

    pub fn print_summary(&self, logger: &Logger) {
        logger.summary_kv(
            "Migration summary",
            &[
                ("Total", self.total.to_string()),
                ("Migrated", self.migrated.to_string()),
                ("Skipped", self.skipped.len().to_string()),
                ("Failed", self.failed.len().to_string()),
            ],
        );

        if !self.skipped.is_empty() {
            logger.info(&format!(
                "Skipped {} images because they already exist in Artifactory.",
                self.skipped.len()
            ));
        }

        if !self.failed.is_empty() {
            let failures: Vec<String> = self
                .failed
                .iter()
                .map(|image| format!("{}/{}", image.name, image.tag))
                .collect();
            logger.list(
                &format!("Failed to migrate the following {} images", failures.len()),
                &failures,
            );
        }
    }
}
