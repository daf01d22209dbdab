//! Artifactory as a migration destination
//!
//! Instance checks go through the REST API; image existence and uploads go
//! through the repository's Docker V2 endpoint at `api/docker/<repo>`.

use crate::config::Credentials;
use crate::error::Result;
use crate::logging::Logger;
use crate::registry::access::DestinationRepository;
use crate::registry::docker::DockerRegistryAccess;
use crate::registry::http::{extract_string, AuthMode, HttpAccess};
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;

/// Oldest Artifactory release with the Docker V2 API used here
pub const MIN_ARTIFACTORY_VERSION: [u64; 3] = [4, 4, 3];

#[derive(Debug)]
pub struct ArtifactoryAccess {
    http: HttpAccess,
    docker: Arc<DockerRegistryAccess>,
    repo: String,
}

impl ArtifactoryAccess {
    pub fn new(
        url: &str,
        credentials: Credentials,
        repo: &str,
        ignore_cert: bool,
        logger: Logger,
    ) -> Result<Self> {
        let http = HttpAccess::new(
            url,
            AuthMode::Basic(credentials.clone()),
            ignore_cert,
            logger.clone(),
        )?;
        let docker_url = http.url_for_segments(&["api", "docker", repo])?;
        let docker = DockerRegistryAccess::new(
            &docker_url,
            AuthMode::Challenge(Some(credentials)),
            ignore_cert,
            logger,
        )?;

        Ok(Self {
            http,
            docker: Arc::new(docker),
            repo: repo.to_string(),
        })
    }

    /// V2 registry view of the target repository
    pub fn docker_registry(&self) -> Arc<DockerRegistryAccess> {
        Arc::clone(&self.docker)
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }
}

#[async_trait]
impl DestinationRepository for ArtifactoryAccess {
    async fn is_valid(&self) -> bool {
        let url = match self.http.url("api/system/ping") {
            Ok(url) => url,
            Err(_) => return false,
        };
        let response = match self.http.send(self.http.request(Method::GET, &url), None).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                self.http
                    .logger()
                    .verbose(&format!("Ping answered {}", response.status()));
                return false;
            }
            Err(e) => {
                self.http.logger().error(&format!("Unable to reach Artifactory: {}", e));
                return false;
            }
        };
        matches!(response.text().await, Ok(body) if body.trim() == "OK")
    }

    async fn is_valid_version(&self) -> bool {
        self.get_version()
            .await
            .is_some_and(|version| version_at_least(&version, &MIN_ARTIFACTORY_VERSION))
    }

    async fn get_version(&self) -> Option<String> {
        match self.http.get_json("api/system/version", None, "version check").await {
            Ok(body) => extract_string(&body, "version"),
            Err(e) => {
                self.http
                    .logger()
                    .error(&format!("Unable to read the Artifactory version: {}", e));
                None
            }
        }
    }

    async fn is_valid_docker_repo(&self) -> bool {
        let path = match self.http.url_for_segments(&["api", "repositories", self.repo.as_str()]) {
            Ok(path) => path,
            Err(_) => return false,
        };
        match self.http.get_json(&path, None, "repository lookup").await {
            Ok(repository) => {
                let package_type = extract_string(&repository, "packageType");
                let api_version = extract_string(&repository, "dockerApiVersion");
                package_type.is_some_and(|t| t.eq_ignore_ascii_case("docker"))
                    && api_version.is_some_and(|v| v.eq_ignore_ascii_case("V2"))
            }
            Err(e) => {
                self.http
                    .logger()
                    .verbose(&format!("Repository {} lookup failed: {}", self.repo, e));
                false
            }
        }
    }

    async fn has_image(&self, name: &str, tag: &str) -> Result<bool> {
        self.docker.manifest_exists(name, tag).await
    }
}

/// Dotted numeric version comparison; suffixes such as `-rc1` are ignored
pub fn version_at_least(version: &str, minimum: &[u64]) -> bool {
    let Some(parsed) = parse_version(version) else {
        return false;
    };
    let padded = |v: &[u64], i: usize| v.get(i).copied().unwrap_or(0);
    let len = parsed.len().max(minimum.len());
    (0..len)
        .map(|i| padded(&parsed, i).cmp(&padded(minimum, i)))
        .find(|ordering| ordering.is_ne())
        .is_none_or(|ordering| ordering.is_gt())
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    let core = version
        .trim()
        .split(|c: char| c == '-' || c == '+' || c.is_whitespace())
        .next()?;
    core.split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .collect()
}
