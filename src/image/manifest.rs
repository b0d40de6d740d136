//! Image manifest and manifest list model
//!
//! The garbage collector only ever needs the digests a manifest references, so
//! the model keeps descriptors and drops everything else (annotations,
//! history, platform features).

use crate::digest::Digest;
use crate::error::{GcError, Result};
use serde::{Deserialize, Serialize};

pub const MEDIA_TYPE_DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const MEDIA_TYPE_DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const MEDIA_TYPE_OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const MEDIA_TYPE_DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
pub const MEDIA_TYPE_DOCKER_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

/// Manifest flavour derived from the `mediaType` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestType {
    DockerV2,
    DockerList,
    OciManifest,
    OciIndex,
    Unknown,
}

impl ManifestType {
    pub fn from_media_type(media_type: &str) -> Self {
        match media_type {
            MEDIA_TYPE_DOCKER_MANIFEST => ManifestType::DockerV2,
            MEDIA_TYPE_DOCKER_MANIFEST_LIST => ManifestType::DockerList,
            MEDIA_TYPE_OCI_MANIFEST => ManifestType::OciManifest,
            MEDIA_TYPE_OCI_INDEX => ManifestType::OciIndex,
            _ => ManifestType::Unknown,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ManifestType::DockerList | ManifestType::OciIndex)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: Digest,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, digest: Digest, size: u64) -> Self {
        Self {
            media_type: media_type.into(),
            digest,
            size,
            platform: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: String,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestList {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: String,
    pub manifests: Vec<Descriptor>,
}

/// Decoded manifest: either a single image or a list of child manifests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
    Image(ImageManifest),
    List(ManifestList),
}

impl Manifest {
    pub fn image(config: Descriptor, layers: Vec<Descriptor>) -> Self {
        Manifest::Image(ImageManifest {
            schema_version: 2,
            media_type: MEDIA_TYPE_DOCKER_MANIFEST.to_string(),
            config,
            layers,
        })
    }

    pub fn list(manifests: Vec<Descriptor>) -> Self {
        Manifest::List(ManifestList {
            schema_version: 2,
            media_type: MEDIA_TYPE_DOCKER_MANIFEST_LIST.to_string(),
            manifests,
        })
    }

    /// Referenced descriptors in manifest order: config then layers for an
    /// image, child manifests for a list.
    pub fn references(&self) -> Vec<&Descriptor> {
        match self {
            Manifest::Image(image) => std::iter::once(&image.config)
                .chain(image.layers.iter())
                .collect(),
            Manifest::List(list) => list.manifests.iter().collect(),
        }
    }

    pub fn as_list(&self) -> Option<&ManifestList> {
        match self {
            Manifest::List(list) => Some(list),
            Manifest::Image(_) => None,
        }
    }

    pub fn media_type(&self) -> &str {
        match self {
            Manifest::Image(image) => &image.media_type,
            Manifest::List(list) => &list.media_type,
        }
    }

    /// Decode a stored manifest payload
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| GcError::ManifestParsing(format!("Invalid manifest JSON: {}", e)))?;

        let media_type = value
            .get("mediaType")
            .and_then(|m| m.as_str())
            .unwrap_or_default();
        let manifest_type = ManifestType::from_media_type(media_type);

        let is_list = manifest_type.is_list()
            || (manifest_type == ManifestType::Unknown && value.get("manifests").is_some());

        if is_list {
            serde_json::from_value(value)
                .map(Manifest::List)
                .map_err(|e| GcError::ManifestParsing(format!("Invalid manifest list: {}", e)))
        } else if value.get("config").is_some() {
            serde_json::from_value(value)
                .map(Manifest::Image)
                .map_err(|e| GcError::ManifestParsing(format!("Invalid image manifest: {}", e)))
        } else {
            Err(GcError::ManifestParsing(format!(
                "Unsupported manifest schema (mediaType {:?})",
                media_type
            )))
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let data = match self {
            Manifest::Image(image) => serde_json::to_vec_pretty(image)?,
            Manifest::List(list) => serde_json::to_vec_pretty(list)?,
        };
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(seed: &str) -> Digest {
        Digest::from_bytes(seed.as_bytes())
    }

    #[test]
    fn test_image_references_config_first() {
        let manifest = Manifest::image(
            Descriptor::new(MEDIA_TYPE_DOCKER_CONFIG, digest("config"), 10),
            vec![
                Descriptor::new(MEDIA_TYPE_DOCKER_LAYER, digest("layer-1"), 20),
                Descriptor::new(MEDIA_TYPE_DOCKER_LAYER, digest("layer-2"), 30),
            ],
        );

        let refs: Vec<_> = manifest.references().iter().map(|d| d.digest.clone()).collect();
        assert_eq!(refs, vec![digest("config"), digest("layer-1"), digest("layer-2")]);
        assert!(manifest.as_list().is_none());
    }

    #[test]
    fn test_decode_docker_manifest_list() {
        let data = format!(
            r#"{{
                "schemaVersion": 2,
                "mediaType": "{}",
                "manifests": [
                    {{"mediaType": "{}", "digest": "{}", "size": 528,
                      "platform": {{"architecture": "amd64", "os": "linux"}}}}
                ]
            }}"#,
            MEDIA_TYPE_DOCKER_MANIFEST_LIST,
            MEDIA_TYPE_DOCKER_MANIFEST,
            digest("child")
        );

        let manifest = Manifest::from_slice(data.as_bytes()).unwrap();
        let list = manifest.as_list().expect("should decode as a list");
        assert_eq!(list.manifests.len(), 1);
        assert_eq!(list.manifests[0].digest, digest("child"));
        assert_eq!(
            list.manifests[0].platform.as_ref().map(|p| p.os.as_str()),
            Some("linux")
        );
    }

    #[test]
    fn test_decode_oci_index_without_media_type() {
        let data = format!(
            r#"{{"schemaVersion": 2, "manifests": [{{"digest": "{}", "size": 1}}]}}"#,
            digest("child")
        );
        let manifest = Manifest::from_slice(data.as_bytes()).unwrap();
        assert!(manifest.as_list().is_some());
    }

    #[test]
    fn test_decode_oci_manifest() {
        let data = format!(
            r#"{{
                "schemaVersion": 2,
                "mediaType": "{}",
                "config": {{"mediaType": "application/vnd.oci.image.config.v1+json", "digest": "{}", "size": 7}},
                "layers": [{{"mediaType": "application/vnd.oci.image.layer.v1.tar+gzip", "digest": "{}", "size": 9}}],
                "annotations": {{"org.opencontainers.image.created": "2024-01-01"}}
            }}"#,
            MEDIA_TYPE_OCI_MANIFEST,
            digest("config"),
            digest("layer")
        );
        let manifest = Manifest::from_slice(data.as_bytes()).unwrap();
        assert_eq!(manifest.references().len(), 2);
        assert_eq!(manifest.media_type(), MEDIA_TYPE_OCI_MANIFEST);
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        assert!(Manifest::from_slice(b"not json").is_err());
        assert!(Manifest::from_slice(br#"{"schemaVersion": 1, "fsLayers": []}"#).is_err());
        let bad_digest = format!(
            r#"{{"mediaType": "{}", "manifests": [{{"digest": "sha256:zz", "size": 1}}]}}"#,
            MEDIA_TYPE_OCI_INDEX
        );
        assert!(matches!(
            Manifest::from_slice(bad_digest.as_bytes()),
            Err(GcError::ManifestParsing(_))
        ));
    }

    #[test]
    fn test_encoding_decodes_back() {
        let manifest = Manifest::list(vec![Descriptor::new(
            MEDIA_TYPE_DOCKER_MANIFEST,
            digest("child"),
            42,
        )]);
        let decoded = Manifest::from_slice(&manifest.to_vec().unwrap()).unwrap();
        assert_eq!(decoded, manifest);
    }
}
