//! Runner wiring the configured registries into a migration run

use crate::config::{MigrationConfig, SourceConfig};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::migration::{
    parse_image_file, run_migration, ImageSetResolver, MigrationReport, WorkSource,
};
use crate::registry::{
    ArtifactoryAccess, AuthMode, CatalogSource, DestinationRepository, DockerRegistryAccess,
    QuayAccess, RegistryTransfer, SourceRegistry,
};
use std::sync::Arc;

pub struct Runner {
    config: MigrationConfig,
    logger: Logger,
}

impl Runner {
    pub fn new(config: MigrationConfig) -> Self {
        let logger = Logger::new(config.verbose);
        Self { config, logger }
    }

    pub async fn run(&self) -> Result<MigrationReport> {
        self.logger.section("Docker Registry Migrator");

        let source = self.connect_source().await?;
        let destination = self.connect_destination().await?;
        let work = self.work_source().await;

        let catalog = self.catalog_override(&work)?;
        let source_registry: Arc<dyn SourceRegistry> = Arc::clone(&source) as _;
        let resolver =
            ImageSetResolver::new(source_registry, self.logger.clone()).with_catalog(catalog);
        let transfer = RegistryTransfer::new(
            source,
            destination.docker_registry(),
            self.logger.clone(),
        );

        self.logger.subsection("Migrating images");
        let report = run_migration(
            work,
            self.config.settings,
            &resolver,
            destination,
            Arc::new(transfer),
            &self.logger,
        )
        .await?;

        report.print_summary(&self.logger);
        self.write_failed_output(&report).await?;

        self.logger.success(&format!(
            "Completed in {}",
            self.logger.format_duration(self.logger.elapsed())
        ));
        Ok(report)
    }

    async fn connect_source(&self) -> Result<Arc<DockerRegistryAccess>> {
        self.logger.subsection("Connecting to source registry");
        let source = &self.config.source;
        self.logger
            .info(&format!("Source registry: {}", source.registry_url()));

        let access = DockerRegistryAccess::new(
            source.registry_url(),
            AuthMode::Challenge(source.registry_credentials()),
            self.config.ignore_cert,
            self.logger.clone(),
        )?;

        // Quay SaaS skips the V2 check
        if !matches!(source, SourceConfig::Quay { .. }) && !access.verify_is_v2().await {
            return Err(RegistryError::Validation(
                "The provided URL does not appear to be a valid V2 repository.".to_string(),
            ));
        }

        Ok(Arc::new(access))
    }

    async fn connect_destination(&self) -> Result<Arc<ArtifactoryAccess>> {
        self.logger.subsection("Connecting to Artifactory");
        let destination = &self.config.destination;
        self.logger.info(&format!(
            "Artifactory: {} (repository {})",
            destination.url, destination.repo
        ));

        let access = ArtifactoryAccess::new(
            &destination.url,
            destination.credentials.clone(),
            &destination.repo,
            self.config.ignore_cert,
            self.logger.clone(),
        )?;

        if !access.is_valid().await {
            return Err(RegistryError::Validation(
                "The provided Artifactory URL or credentials do not appear valid.".to_string(),
            ));
        }
        if !access.is_valid_version().await {
            let version = access
                .get_version()
                .await
                .unwrap_or_else(|| "unknown".to_string());
            return Err(RegistryError::Validation(format!(
                "The provided Artifactory instance is version {} but only 4.4.3+ is supported.",
                version
            )));
        }
        if !access.is_valid_docker_repo().await {
            return Err(RegistryError::Validation(format!(
                "The repo {} does not appear to be a valid V2 Docker repository.",
                destination.repo
            )));
        }

        self.logger.verbose("Artifactory checks passed");
        Ok(Arc::new(access))
    }

    async fn work_source(&self) -> WorkSource {
        match &self.config.image_file {
            Some(path) => {
                self.logger
                    .info(&format!("Reading images from {}", path.display()));
                WorkSource::Explicit(parse_image_file(path, &self.logger).await)
            }
            None => WorkSource::Discovery,
        }
    }

    /// Quay SaaS lists repositories through its own API
    fn catalog_override(&self, work: &WorkSource) -> Result<Option<Arc<dyn CatalogSource>>> {
        match (&self.config.source, work) {
            (SourceConfig::Quay { namespace, token }, WorkSource::Discovery) => {
                let quay = QuayAccess::new(
                    namespace,
                    token,
                    self.config.ignore_cert,
                    self.logger.clone(),
                )?;
                Ok(Some(Arc::new(quay)))
            }
            _ => Ok(None),
        }
    }

    async fn write_failed_output(&self, report: &MigrationReport) -> Result<()> {
        let Some(path) = &self.config.failed_output else {
            return Ok(());
        };

        tokio::fs::write(path, report.failed_image_list())
            .await
            .map_err(|e| {
                RegistryError::Io(format!("Failed to write {}: {}", path.display(), e))
            })?;
        self.logger.info(&format!(
            "Wrote {} failed images to {}",
            report.failed.len(),
            path.display()
        ));
        Ok(())
    }
}
