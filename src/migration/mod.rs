//! Migration orchestration engine
//!
//! Resolves the set of images to copy, distributes them over a bounded pool of
//! workers through a shared [`WorkQueue`], and classifies each attempt as
//! migrated, skipped or failed. Everything registry-specific is reached through
//! the capability traits in [`crate::registry::access`].

pub mod engine;
pub mod image_file;
pub mod pagination;
pub mod pool;
pub mod queue;
pub mod resolver;
pub mod results;

pub use engine::{run_migration, MigrationSettings};
pub use image_file::{parse_image_file, parse_image_list, ImageList};
pub use pagination::{traverse, Page};
pub use pool::WorkerPool;
pub use queue::WorkQueue;
pub use resolver::{ImageSetResolver, WorkSource};
pub use results::{MigrationReport, ResultAggregator};

use std::fmt;

/// One migratable unit: a repository name and a tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageReference {
    pub name: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Result of one migration attempt for one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated,
    Skipped(String),
    Failed(String),
}
