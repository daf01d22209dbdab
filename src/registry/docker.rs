//! Docker Registry HTTP API v2 access
//!
//! Used both for source registries and, rooted at Artifactory's Docker API
//! path, for the destination side of a transfer.

use crate::error::handlers::HttpErrorHandler;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::access::{CatalogSource, SourceRegistry};
use crate::registry::http::{check_status, AuthMode, HttpAccess, PaginationStyle};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Method, StatusCode};
use serde_json::Value;

pub const MEDIA_TYPE_DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const MEDIA_TYPE_DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const MEDIA_TYPE_DOCKER_MANIFEST_V1: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";
pub const MEDIA_TYPE_OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

const API_VERSION_HEADER: &str = "Docker-Distribution-API-Version";

/// A manifest exactly as the registry served it
#[derive(Debug, Clone)]
pub struct Manifest {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Manifest {
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.bytes)?)
    }
}

#[derive(Debug)]
pub struct DockerRegistryAccess {
    http: HttpAccess,
}

impl DockerRegistryAccess {
    pub fn new(url: &str, auth: AuthMode, ignore_cert: bool, logger: Logger) -> Result<Self> {
        Ok(Self {
            http: HttpAccess::new(url, auth, ignore_cert, logger)?,
        })
    }

    pub fn http(&self) -> &HttpAccess {
        &self.http
    }

    fn pull_scope(repository: &str) -> String {
        format!("repository:{}:pull", repository)
    }

    fn push_scope(repository: &str) -> String {
        format!("repository:{}:pull,push", repository)
    }

    async fn head(&self, path: &str, scope: &str, accept: Option<&str>) -> Result<bool> {
        let url = self.http.url(path)?;
        let mut request = self.http.request(Method::HEAD, &url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let response = self.http.send(request, Some(scope)).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(HttpErrorHandler::handle_registry_error(
                status,
                "",
                &format!("HEAD {}", path),
            )),
        }
    }

    /// Whether `name:reference` resolves to a manifest
    pub async fn manifest_exists(&self, name: &str, reference: &str) -> Result<bool> {
        self.head(
            &format!("v2/{}/manifests/{}", name, reference),
            &Self::pull_scope(name),
            Some(&manifest_accept()),
        )
        .await
    }

    pub async fn blob_exists(&self, name: &str, digest: &str) -> Result<bool> {
        self.head(
            &format!("v2/{}/blobs/{}", name, digest),
            &Self::push_scope(name),
            None,
        )
        .await
    }

    pub async fn get_manifest(&self, name: &str, reference: &str) -> Result<Manifest> {
        let url = self.http.url(&format!("v2/{}/manifests/{}", name, reference))?;
        let request = self
            .http
            .request(Method::GET, &url)
            .header(ACCEPT, manifest_accept());

        let response = self.http.send(request, Some(&Self::pull_scope(name))).await?;
        let response =
            check_status(response, &format!("manifest fetch for {}:{}", name, reference)).await?;

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let bytes = response.bytes().await?.to_vec();

        // Some registries omit the content type; fall back to the body's own
        let media_type = match media_type.filter(|t| t != "application/json" && !t.is_empty()) {
            Some(media_type) => media_type,
            None => media_type_from_body(&bytes)?,
        };

        Ok(Manifest { media_type, bytes })
    }

    pub async fn get_blob(&self, name: &str, digest: &str) -> Result<Vec<u8>> {
        let url = self.http.url(&format!("v2/{}/blobs/{}", name, digest))?;
        let response = self
            .http
            .send(self.http.request(Method::GET, &url), Some(&Self::pull_scope(name)))
            .await?;
        let response = check_status(response, &format!("blob fetch for {}", digest)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Monolithic upload: open a session, then PUT the whole blob with its digest
    pub async fn upload_blob(&self, name: &str, digest: &str, data: Vec<u8>) -> Result<()> {
        let scope = Self::push_scope(name);
        let url = self.http.url(&format!("v2/{}/blobs/uploads/", name))?;
        let response = self
            .http
            .send(
                self.http.request(Method::POST, &url).header(CONTENT_LENGTH, 0),
                Some(&scope),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text,
                &format!("start upload of {}", digest),
            ));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                RegistryError::Transfer("No Location header in upload response".to_string())
            })?;
        let upload_url = self.http.resolve_reference(location)?;
        let separator = if upload_url.contains('?') { '&' } else { '?' };
        let put_url = format!("{}{}digest={}", upload_url, separator, digest);

        let size = data.len();
        let request = self
            .http
            .request(Method::PUT, &put_url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(data);
        let response = self.http.send(request, Some(&scope)).await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text,
                &format!("upload of {}", digest),
            ));
        }

        self.http
            .logger()
            .detail(&format!("Uploaded blob {} ({} bytes)", digest, size));
        Ok(())
    }

    pub async fn put_manifest(
        &self,
        name: &str,
        reference: &str,
        manifest: &Manifest,
    ) -> Result<()> {
        let url = self.http.url(&format!("v2/{}/manifests/{}", name, reference))?;
        let request = self
            .http
            .request(Method::PUT, &url)
            .header(CONTENT_TYPE, manifest.media_type.as_str())
            .body(manifest.bytes.clone());

        let response = self.http.send(request, Some(&Self::push_scope(name))).await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text,
                &format!("manifest upload for {}:{}", name, reference),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for DockerRegistryAccess {
    async fn get_catalog(&self) -> Result<Vec<String>> {
        self.http
            .get_with_pagination(
                "v2/_catalog",
                "repositories",
                PaginationStyle::LinkHeader,
                Some("registry:catalog:*"),
                collect_strings,
            )
            .await
    }
}

#[async_trait]
impl SourceRegistry for DockerRegistryAccess {
    async fn verify_is_v2(&self) -> bool {
        let url = match self.http.url("v2/") {
            Ok(url) => url,
            Err(_) => return false,
        };

        let response = match self.http.send(self.http.request(Method::GET, &url), None).await {
            Ok(response) => response,
            Err(e) => {
                self.http.logger().error(&format!("Unable to reach {}: {}", url, e));
                return false;
            }
        };

        let advertises_v2 = response
            .headers()
            .get(API_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("registry/2"));

        match response.status() {
            StatusCode::OK => true,
            StatusCode::UNAUTHORIZED => advertises_v2,
            status => {
                self.http
                    .logger()
                    .verbose(&format!("GET {} answered {}", url, status));
                false
            }
        }
    }

    async fn get_tags(&self, repository: &str) -> Result<Vec<String>> {
        let scope = Self::pull_scope(repository);
        self.http
            .get_with_pagination(
                &format!("v2/{}/tags/list", repository),
                "tags",
                PaginationStyle::LinkHeader,
                Some(&scope),
                collect_strings,
            )
            .await
    }
}

/// Keep the string entries of a page
pub fn collect_strings(acc: &mut Vec<String>, page: Vec<Value>) {
    acc.extend(
        page.into_iter()
            .filter_map(|v| v.as_str().map(str::to_string)),
    );
}

fn manifest_accept() -> String {
    [
        MEDIA_TYPE_DOCKER_MANIFEST,
        MEDIA_TYPE_DOCKER_MANIFEST_LIST,
        MEDIA_TYPE_OCI_MANIFEST,
        MEDIA_TYPE_OCI_INDEX,
        MEDIA_TYPE_DOCKER_MANIFEST_V1,
    ]
    .join(", ")
}

fn media_type_from_body(bytes: &[u8]) -> Result<String> {
    let body: Value = serde_json::from_slice(bytes)?;
    if let Some(media_type) = body.get("mediaType").and_then(Value::as_str) {
        return Ok(media_type.to_string());
    }
    match body.get("schemaVersion").and_then(Value::as_u64) {
        Some(1) => Ok(MEDIA_TYPE_DOCKER_MANIFEST_V1.to_string()),
        _ if body.get("manifests").is_some() => Ok(MEDIA_TYPE_OCI_INDEX.to_string()),
        _ => Ok(MEDIA_TYPE_OCI_MANIFEST.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collect_strings_skips_non_strings() {
        let mut acc = vec!["a".to_string()];
        collect_strings(&mut acc, vec![json!("b"), json!(null), json!(3), json!("c")]);
        assert_eq!(acc, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_media_type_from_body() {
        let v1 = serde_json::to_vec(&json!({"schemaVersion": 1, "fsLayers": []})).unwrap();
        assert_eq!(media_type_from_body(&v1).unwrap(), MEDIA_TYPE_DOCKER_MANIFEST_V1);

        let index = serde_json::to_vec(&json!({"schemaVersion": 2, "manifests": []})).unwrap();
        assert_eq!(media_type_from_body(&index).unwrap(), MEDIA_TYPE_OCI_INDEX);

        let docker = serde_json::to_vec(&json!({
            "schemaVersion": 2,
            "mediaType": MEDIA_TYPE_DOCKER_MANIFEST
        }))
        .unwrap();
        assert_eq!(media_type_from_body(&docker).unwrap(), MEDIA_TYPE_DOCKER_MANIFEST);
    }

    #[test]
    fn test_accept_header_lists_every_manifest_type() {
        let accept = manifest_accept();
        assert!(accept.contains(MEDIA_TYPE_DOCKER_MANIFEST_LIST));
        assert!(accept.contains(MEDIA_TYPE_OCI_INDEX));
        assert!(accept.starts_with(MEDIA_TYPE_DOCKER_MANIFEST));
    }

    #[test]
    fn test_scopes() {
        assert_eq!(
            DockerRegistryAccess::pull_scope("library/nginx"),
            "repository:library/nginx:pull"
        );
        assert_eq!(
            DockerRegistryAccess::push_scope("app"),
            "repository:app:pull,push"
        );
    }
}
