//! Docker Registry Migrator Library
//!
//! Copies Docker images from a V2 registry, Quay or Quay Enterprise into an
//! Artifactory Docker repository using a bounded pool of workers.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod migration;
pub mod registry;

pub use config::{ConfigError, MigrationConfig};
pub use error::{RegistryError, Result};
pub use logging::Logger;
pub use migration::{run_migration, ImageReference, MigrationReport, MigrationSettings};
