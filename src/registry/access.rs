//! Capability interfaces the migration engine consumes
//!
//! The engine never talks HTTP itself. Sources, the destination and the
//! transfer mechanism are reached through these traits so that any registry
//! flavour, or an in-memory fake in tests, can be plugged in.

use crate::error::Result;
use crate::migration::ImageReference;
use async_trait::async_trait;

/// Lists repositories available on a source
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn get_catalog(&self) -> Result<Vec<String>>;
}

/// Read access to a source registry
#[async_trait]
pub trait SourceRegistry: CatalogSource {
    /// Whether the source speaks the Docker Registry HTTP API v2
    async fn verify_is_v2(&self) -> bool;

    async fn get_tags(&self, repository: &str) -> Result<Vec<String>>;
}

/// The repository images are migrated into
#[async_trait]
pub trait DestinationRepository: Send + Sync {
    /// Reachable with the given credentials
    async fn is_valid(&self) -> bool;

    async fn is_valid_version(&self) -> bool;

    async fn get_version(&self) -> Option<String>;

    /// The target repository exists and is a V2 Docker repository
    async fn is_valid_docker_repo(&self) -> bool;

    async fn has_image(&self, name: &str, tag: &str) -> Result<bool>;
}

/// Copies one image from the source to the destination
#[async_trait]
pub trait ImageTransfer: Send + Sync {
    async fn transfer_image(&self, image: &ImageReference) -> Result<()>;
}
