//! Quay.io repository listing
//!
//! Quay SaaS does not serve `/v2/_catalog`; repositories of a namespace are
//! listed through its REST API instead. Tags and blobs still come from the V2
//! endpoint at `https://quay.io`.

use crate::config::QUAY_URL;
use crate::error::Result;
use crate::logging::Logger;
use crate::registry::access::CatalogSource;
use crate::registry::http::{extract_string, AuthMode, HttpAccess, PaginationStyle};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug)]
pub struct QuayAccess {
    http: HttpAccess,
    namespace: String,
}

impl QuayAccess {
    pub fn new(namespace: &str, token: &str, ignore_cert: bool, logger: Logger) -> Result<Self> {
        Self::with_url(QUAY_URL, namespace, token, ignore_cert, logger)
    }

    pub fn with_url(
        url: &str,
        namespace: &str,
        token: &str,
        ignore_cert: bool,
        logger: Logger,
    ) -> Result<Self> {
        Ok(Self {
            http: HttpAccess::new(url, AuthMode::Bearer(token.to_string()), ignore_cert, logger)?,
            namespace: namespace.to_string(),
        })
    }

    fn repository_path(&self) -> String {
        let namespace: String =
            url::form_urlencoded::byte_serialize(self.namespace.as_bytes()).collect();
        format!("api/v1/repository?namespace={}", namespace)
    }
}

#[async_trait]
impl CatalogSource for QuayAccess {
    /// Repositories of the namespace as `namespace/name`
    async fn get_catalog(&self) -> Result<Vec<String>> {
        let repositories = self
            .http
            .get_with_pagination(
                &self.repository_path(),
                "repositories",
                PaginationStyle::NextPageField { field: "next_page" },
                None,
                collect_repository_names,
            )
            .await?;

        if repositories.is_empty() {
            self.http.logger().error("Failed to retrieve catalog.");
        }
        Ok(repositories)
    }
}

fn collect_repository_names(acc: &mut Vec<String>, page: Vec<Value>) {
    acc.extend(page.iter().filter_map(|repository| {
        let namespace = extract_string(repository, "namespace")?;
        let name = extract_string(repository, "name")?;
        Some(format!("{}/{}", namespace, name))
    }));
}
