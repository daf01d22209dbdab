//! Resolution of the set of images to migrate

use crate::logging::Logger;
use crate::migration::{ImageList, ImageReference, WorkQueue};
use crate::registry::access::{CatalogSource, SourceRegistry};
use std::sync::Arc;

/// Where the work items of a run come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkSource {
    /// A user supplied list; bare names still get their tags discovered
    Explicit(ImageList),
    /// Every tag of every repository in the source catalog
    Discovery,
}

/// Turns a [`WorkSource`] into items on the work queue
pub struct ImageSetResolver {
    source: Arc<dyn SourceRegistry>,
    catalog: Option<Arc<dyn CatalogSource>>,
    logger: Logger,
}

impl ImageSetResolver {
    pub fn new(source: Arc<dyn SourceRegistry>, logger: Logger) -> Self {
        Self {
            source,
            catalog: None,
            logger,
        }
    }

    /// Take the repository list from a different service than the tags
    pub fn with_catalog(mut self, catalog: Option<Arc<dyn CatalogSource>>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Push every resolved image onto `queue` and return how many were pushed.
    ///
    /// Discovery failures are logged and shrink the result; they never abort
    /// the run. The queue is left open for the caller to close.
    pub async fn resolve(&self, work: WorkSource, queue: &WorkQueue) -> usize {
        let mut pushed = 0;

        let names = match work {
            WorkSource::Explicit(list) => {
                pushed += list.images.len();
                queue.extend(list.images);
                list.names
            }
            WorkSource::Discovery => {
                let names = self.fetch_catalog().await;
                if names.is_empty() {
                    self.logger.info("Found no repositories.");
                }
                names
            }
        };

        if !names.is_empty() {
            self.logger
                .info(&format!("Found {} repositories.", names.len()));
            pushed += self.populate_tags(&names, queue).await;
        }

        pushed
    }

    async fn fetch_catalog(&self) -> Vec<String> {
        self.logger.verbose("Requesting catalog from source registry.");
        let catalog = match &self.catalog {
            Some(catalog) => catalog.get_catalog().await,
            None => self.source.get_catalog().await,
        };

        catalog.unwrap_or_else(|e| {
            self.logger
                .error(&format!("Failed to retrieve catalog: {}", e));
            Vec::new()
        })
    }

    async fn populate_tags(&self, names: &[String], queue: &WorkQueue) -> usize {
        self.logger.info("Populating set of image/tags...");
        let mut pushed = 0;

        for name in names {
            let tags = match self.source.get_tags(name).await {
                Ok(tags) => tags,
                Err(e) => {
                    self.logger
                        .error(&format!("Failed to list tags for repository {}: {}", name, e));
                    continue;
                }
            };

            if tags.is_empty() {
                self.logger
                    .verbose(&format!("Repository {} has no tags", name));
                continue;
            }

            self.logger
                .info(&format!("Found {} tags for repository {}.", tags.len(), name));
            pushed += tags.len();
            queue.extend(tags.into_iter().map(|tag| ImageReference::new(name.as_str(), tag)));
        }

        pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RegistryError, Result};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct FakeSource {
        catalog: Result<Vec<String>>,
        tags: BTreeMap<String, Result<Vec<String>>>,
    }

    impl FakeSource {
        fn new(repos: Vec<(&str, Vec<&str>)>) -> Self {
            Self {
                catalog: Ok(repos.iter().map(|(name, _)| name.to_string()).collect()),
                tags: repos
                    .iter()
                    .map(|(name, tags)| {
                        (
                            name.to_string(),
                            Ok(tags.iter().map(|t| t.to_string()).collect()),
                        )
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl CatalogSource for FakeSource {
        async fn get_catalog(&self) -> Result<Vec<String>> {
            self.catalog.clone()
        }
    }

    #[async_trait]
    impl SourceRegistry for FakeSource {
        async fn verify_is_v2(&self) -> bool {
            true
        }

        async fn get_tags(&self, repository: &str) -> Result<Vec<String>> {
            self.tags
                .get(repository)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct FixedCatalog(Vec<String>);

    #[async_trait]
    impl CatalogSource for FixedCatalog {
        async fn get_catalog(&self) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn drain(queue: &WorkQueue) -> Vec<ImageReference> {
        std::iter::from_fn(|| queue.try_pop()).collect()
    }

    #[tokio::test]
    async fn test_discovery_enqueues_every_tag() {
        let source = FakeSource::new(vec![
            ("a", vec!["1", "2", "3"]),
            ("b", vec![]),
            ("c", vec!["x"]),
        ]);
        let resolver = ImageSetResolver::new(Arc::new(source), Logger::new_quiet());
        let queue = WorkQueue::new();

        let pushed = resolver.resolve(WorkSource::Discovery, &queue).await;

        assert_eq!(pushed, 4);
        assert_eq!(
            drain(&queue),
            vec![
                ImageReference::new("a", "1"),
                ImageReference::new("a", "2"),
                ImageReference::new("a", "3"),
                ImageReference::new("c", "x"),
            ]
        );
    }

    #[tokio::test]
    async fn test_explicit_list_resolves_bare_names() {
        let source = FakeSource::new(vec![("bar", vec!["v1", "v2"]), ("unused", vec!["z"])]);
        let resolver = ImageSetResolver::new(Arc::new(source), Logger::new_quiet());
        let queue = WorkQueue::new();
        let list = crate::migration::parse_image_list("foo:latest\nbar\n");

        let pushed = resolver.resolve(WorkSource::Explicit(list), &queue).await;

        assert_eq!(pushed, 3);
        assert_eq!(
            drain(&queue),
            vec![
                ImageReference::new("foo", "latest"),
                ImageReference::new("bar", "v1"),
                ImageReference::new("bar", "v2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_catalog_failure_degrades_to_nothing() {
        let mut source = FakeSource::new(vec![("a", vec!["1"])]);
        source.catalog = Err(RegistryError::Network("unreachable".into()));
        let resolver = ImageSetResolver::new(Arc::new(source), Logger::new_quiet());
        let queue = WorkQueue::new();

        assert_eq!(resolver.resolve(WorkSource::Discovery, &queue).await, 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_tag_failure_skips_only_that_repository() {
        let mut source = FakeSource::new(vec![("a", vec!["1"]), ("b", vec!["2"])]);
        source
            .tags
            .insert("a".into(), Err(RegistryError::Auth("denied".into())));
        let resolver = ImageSetResolver::new(Arc::new(source), Logger::new_quiet());
        let queue = WorkQueue::new();

        assert_eq!(resolver.resolve(WorkSource::Discovery, &queue).await, 1);
        assert_eq!(drain(&queue), vec![ImageReference::new("b", "2")]);
    }

    #[tokio::test]
    async fn test_separate_catalog_service() {
        let source = FakeSource::new(vec![("from-source", vec!["1"]), ("from-api", vec!["2"])]);
        let resolver = ImageSetResolver::new(Arc::new(source), Logger::new_quiet())
            .with_catalog(Some(Arc::new(FixedCatalog(vec!["from-api".into()]))));
        let queue = WorkQueue::new();

        resolver.resolve(WorkSource::Discovery, &queue).await;
        assert_eq!(drain(&queue), vec![ImageReference::new("from-api", "2")]);
    }
}
