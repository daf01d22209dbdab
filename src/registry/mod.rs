//! Registry module for Docker registry interactions
//!
//! [`access`] holds the capability traits the migration engine consumes. The
//! remaining modules implement them over HTTP: a generic paginated client in
//! [`http`] composed into adapters for V2 registries, Quay, UCP and
//! Artifactory, plus the registry-to-registry transfer.

pub mod access;
pub mod artifactory;
pub mod auth;
pub mod docker;
pub mod http;
pub mod quay;
pub mod transfer;
pub mod ucp;

pub use access::{CatalogSource, DestinationRepository, ImageTransfer, SourceRegistry};
pub use artifactory::ArtifactoryAccess;
pub use docker::DockerRegistryAccess;
pub use http::{AuthMode, HttpAccess, PaginationStyle};
pub use quay::QuayAccess;
pub use transfer::RegistryTransfer;
pub use ucp::UcpAccess;
