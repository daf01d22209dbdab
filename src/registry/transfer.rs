//! Registry-to-registry image copy
//!
//! Copies one `name:tag` by fetching the manifest from the source, copying
//! every blob it references that the destination lacks, and finally putting
//! the manifest bytes unchanged so the digest is preserved. Manifest lists and
//! OCI indexes are copied child manifest first.

use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::migration::ImageReference;
use crate::registry::access::ImageTransfer;
use crate::registry::docker::{
    DockerRegistryAccess, Manifest, MEDIA_TYPE_DOCKER_MANIFEST_LIST, MEDIA_TYPE_OCI_INDEX,
};
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Transfers images between two V2 registries
#[derive(Debug)]
pub struct RegistryTransfer {
    source: Arc<DockerRegistryAccess>,
    destination: Arc<DockerRegistryAccess>,
    logger: Logger,
}

impl RegistryTransfer {
    pub fn new(
        source: Arc<DockerRegistryAccess>,
        destination: Arc<DockerRegistryAccess>,
        logger: Logger,
    ) -> Self {
        Self {
            source,
            destination,
            logger,
        }
    }

    async fn copy_manifest(&self, name: &str, reference: &str, manifest: &Manifest) -> Result<()> {
        let body = manifest.json()?;

        if is_index(&manifest.media_type, &body) {
            let children = child_manifests(&body);
            self.logger.detail(&format!(
                "{}:{} is a list of {} manifests",
                name,
                reference,
                children.len()
            ));
            for digest in children {
                let child = self.source.get_manifest(name, &digest).await?;
                self.copy_blobs(name, &child.json()?).await?;
                self.destination.put_manifest(name, &digest, &child).await?;
            }
        } else {
            self.copy_blobs(name, &body).await?;
        }

        self.destination.put_manifest(name, reference, manifest).await
    }

    async fn copy_blobs(&self, name: &str, manifest: &Value) -> Result<()> {
        for digest in referenced_blobs(manifest) {
            if self.destination.blob_exists(name, &digest).await.unwrap_or(false) {
                self.logger
                    .detail(&format!("Blob {} already present, skipping", digest));
                continue;
            }

            let data = self.source.get_blob(name, &digest).await?;
            verify_digest(&digest, &data)?;
            self.destination.upload_blob(name, &digest, data).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ImageTransfer for RegistryTransfer {
    async fn transfer_image(&self, image: &ImageReference) -> Result<()> {
        let started = std::time::Instant::now();
        self.logger.verbose(&format!("Transferring {}", image));

        let manifest = self.source.get_manifest(&image.name, &image.tag).await?;
        self.copy_manifest(&image.name, &image.tag, &manifest)
            .await
            .map_err(|e| match e {
                RegistryError::Transfer(_) => e,
                other => RegistryError::Transfer(format!("{}: {}", image, other)),
            })?;

        self.logger.verbose(&format!(
            "Transferred {} in {}",
            image,
            self.logger.format_duration(started.elapsed())
        ));
        Ok(())
    }
}

fn is_index(media_type: &str, body: &Value) -> bool {
    media_type == MEDIA_TYPE_DOCKER_MANIFEST_LIST
        || media_type == MEDIA_TYPE_OCI_INDEX
        || body.get("manifests").is_some_and(Value::is_array)
}

fn child_manifests(index: &Value) -> Vec<String> {
    index
        .get("manifests")
        .and_then(Value::as_array)
        .map(|manifests| {
            manifests
                .iter()
                .filter_map(|m| m.get("digest").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Digests of every blob an image manifest references, config first,
/// without duplicates
pub fn referenced_blobs(manifest: &Value) -> Vec<String> {
    let config = manifest
        .get("config")
        .and_then(|c| c.get("digest"))
        .and_then(Value::as_str);
    let layers = manifest
        .get("layers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|l| l.get("digest").and_then(Value::as_str));
    // Schema 1
    let fs_layers = manifest
        .get("fsLayers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|l| l.get("blobSum").and_then(Value::as_str));

    let mut blobs: Vec<String> = Vec::new();
    for digest in config.into_iter().chain(layers).chain(fs_layers) {
        if !blobs.iter().any(|b| b == digest) {
            blobs.push(digest.to_string());
        }
    }
    blobs
}

/// Check `data` against a `sha256:<hex>` digest. Other algorithms pass unchecked.
pub fn verify_digest(digest: &str, data: &[u8]) -> Result<()> {
    let Some(expected) = digest.strip_prefix("sha256:") else {
        return Ok(());
    };

    let actual = hex::encode(Sha256::digest(data));
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(RegistryError::Transfer(format!(
            "Digest mismatch for {}: got sha256:{}",
            digest, actual
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_referenced_blobs_schema2() {
        let manifest = json!({
            "schemaVersion": 2,
            "config": {"digest": "sha256:c"},
            "layers": [
                {"digest": "sha256:l1"},
                {"digest": "sha256:l2"},
                {"digest": "sha256:l1"}
            ]
        });
        assert_eq!(
            referenced_blobs(&manifest),
            vec!["sha256:c", "sha256:l1", "sha256:l2"]
        );
    }

    #[test]
    fn test_referenced_blobs_schema1() {
        let manifest = json!({
            "schemaVersion": 1,
            "fsLayers": [{"blobSum": "sha256:a"}, {"blobSum": "sha256:a"}, {"blobSum": "sha256:b"}]
        });
        assert_eq!(referenced_blobs(&manifest), vec!["sha256:a", "sha256:b"]);
    }

    #[test]
    fn test_child_manifests_of_index() {
        let index = json!({
            "mediaType": MEDIA_TYPE_OCI_INDEX,
            "manifests": [{"digest": "sha256:amd64"}, {"digest": "sha256:arm64"}]
        });
        assert!(is_index(MEDIA_TYPE_OCI_INDEX, &index));
        assert!(is_index("application/json", &index));
        assert_eq!(child_manifests(&index), vec!["sha256:amd64", "sha256:arm64"]);
        assert!(!is_index("application/vnd.oci.image.manifest.v1+json", &json!({"layers": []})));
    }

    #[test]
    fn test_verify_digest() {
        // sha256 of "hello"
        let digest = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert!(verify_digest(digest, b"hello").is_ok());

        let err = verify_digest(digest, b"hullo").unwrap_err();
        assert!(matches!(err, RegistryError::Transfer(_)));

        assert!(verify_digest("sha512:abc", b"anything").is_ok());
    }
}
