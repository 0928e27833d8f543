//! src/services/object_store.rs
//!
//! Object store gateway: the capability the orchestrator uses to put and
//! delete blobs, plus `LocalObjectStore`, a disk-backed implementation laid
//! out as `base_path/{bucket}/{key}`. Content type and attributes of each
//! object are kept in a JSON sidecar under `base_path/.attrs/{bucket}/{key}.json`
//! so objects can be served back with the right headers.

use crate::{
    models::{object::ObjectLocation, upload::Attributes},
    services::{bucket_registry::BucketRegistry, repository::AccessLevel},
};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const ATTRS_DIR: &str = ".attrs";
const TMP_PREFIX: &str = ".tmp-";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("object store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{0}` has no public base URL configured")]
    UnconfiguredBucket(String),
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
}

impl From<io::Error> for GatewayError {
    fn from(err: io::Error) -> Self {
        GatewayError::StoreUnavailable(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Blob storage as seen by the ingestion pipeline.
///
/// Implementations validate the bucket against their static registry before
/// doing any I/O and never invent a public URL for an unknown bucket.
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    /// Store `bytes` under `bucket/key`, replacing any previous object.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        attributes: &Attributes,
    ) -> GatewayResult<ObjectLocation>;

    /// Remove an object. `Ok(false)` when there was nothing to remove.
    async fn delete(&self, bucket: &str, key: &str) -> GatewayResult<bool>;

    /// Keys currently stored in `bucket`, in lexicographic order.
    async fn list(&self, bucket: &str) -> GatewayResult<Vec<String>>;

    /// Public URL for `bucket/key`. Pure: no I/O.
    fn public_url(&self, bucket: &str, key: &str) -> GatewayResult<String>;

    /// Reverse of [`public_url`](Self::public_url): `None` for URLs outside every managed bucket.
    fn locate(&self, url: &str) -> Option<(String, String)>;

    /// Identifiers of every managed bucket.
    fn buckets(&self) -> Vec<String>;
}

/// Build a public URL from the registry, shared by every gateway implementation.
pub fn registry_public_url(
    registry: &BucketRegistry,
    bucket: &str,
    key: &str,
) -> GatewayResult<String> {
    match registry.base_url(bucket) {
        None => Err(GatewayError::BucketNotFound(bucket.to_string())),
        Some(None) => Err(GatewayError::UnconfiguredBucket(bucket.to_string())),
        Some(Some(base)) => Ok(format!("{}/{}", base, key)),
    }
}

/// Content type and attributes stored next to each object.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ObjectAttributes {
    pub content_type: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Disk-backed gateway.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    registry: BucketRegistry,
    access: AccessLevel,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, registry: BucketRegistry, access: AccessLevel) -> Self {
        Self {
            base_path: base_path.into(),
            registry,
            access,
        }
    }

    /// Writes and deletes need the service access level; reads never do.
    fn ensure_writable(&self, action: &str) -> GatewayResult<()> {
        self.access
            .ensure_writable(action)
            .map_err(|err| GatewayError::StoreUnavailable(err.to_string()))
    }

    /// Reject keys that could escape the bucket directory or collide with
    /// internal files.
    fn ensure_key_safe(key: &str) -> GatewayResult<()> {
        let invalid = || GatewayError::InvalidObjectKey(key.to_string());
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(invalid());
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(invalid());
        }
        if key
            .split('/')
            .any(|segment| matches!(segment, "" | "." | "..") || segment.starts_with(TMP_PREFIX))
        {
            return Err(invalid());
        }
        Ok(())
    }

    fn ensure_bucket_known(&self, bucket: &str) -> GatewayResult<()> {
        if self.registry.contains(bucket) {
            Ok(())
        } else {
            Err(GatewayError::BucketNotFound(bucket.to_string()))
        }
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.bucket_root(bucket);
        path.extend(key.split('/'));
        path
    }

    fn attrs_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(ATTRS_DIR).join(bucket)
    }

    fn attrs_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.attrs_root(bucket);
        path.extend(key.split('/'));
        path.set_file_name(format!(
            "{}.json",
            key.rsplit('/').next().unwrap_or(key)
        ));
        path
    }

    /// Open a stored object for reading along with its sidecar attributes.
    ///
    /// `Ok(None)` when the object does not exist.
    pub async fn open(
        &self,
        bucket: &str,
        key: &str,
    ) -> GatewayResult<Option<(ObjectAttributes, File)>> {
        self.ensure_bucket_known(bucket)?;
        Self::ensure_key_safe(key)?;

        let file = match File::open(self.object_path(bucket, key)).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let attrs = match fs::read(self.attrs_path(bucket, key)).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_default(),
            Err(err) if err.kind() == ErrorKind::NotFound => ObjectAttributes::default(),
            Err(err) => return Err(err.into()),
        };
        let size_bytes = file.metadata().await?.len();

        Ok(Some((
            ObjectAttributes {
                size_bytes,
                ..attrs
            },
            file,
        )))
    }

    /// Write `bytes` to a temp file next to `target`, fsync, then rename over it.
    async fn write_atomically(target: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!("{}{}", TMP_PREFIX, Uuid::new_v4()));

        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, target).await
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        result
    }

    /// Remove empty directories from `start` up to (not including) `stop`.
    async fn prune_empty_dirs(start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStoreGateway for LocalObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        attributes: &Attributes,
    ) -> GatewayResult<ObjectLocation> {
        self.ensure_writable("object upload")?;
        self.ensure_bucket_known(bucket)?;
        Self::ensure_key_safe(key)?;
        let url = self.public_url(bucket, key)?;

        let file_path = self.object_path(bucket, key);
        Self::write_atomically(&file_path, &bytes).await?;

        let sidecar = ObjectAttributes {
            content_type: content_type.to_string(),
            size_bytes: bytes.len() as u64,
            attributes: attributes.clone(),
        };
        let encoded = serde_json::to_vec(&sidecar)
            .map_err(|err| GatewayError::StoreUnavailable(err.to_string()))?;
        if let Err(err) = Self::write_atomically(&self.attrs_path(bucket, key), &encoded).await {
            let _ = fs::remove_file(&file_path).await;
            return Err(err.into());
        }

        debug!(bucket, key, size = bytes.len(), "stored object {}", file_path.display());
        Ok(ObjectLocation {
            bucket: bucket.to_string(),
            key: key.to_string(),
            url,
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> GatewayResult<bool> {
        self.ensure_writable("object deletion")?;
        self.ensure_bucket_known(bucket)?;
        Self::ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let existed = match fs::remove_file(&file_path).await {
            Ok(_) => {
                debug!("removed physical file {}", file_path.display());
                true
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
                false
            }
            Err(err) => return Err(err.into()),
        };

        let attrs_path = self.attrs_path(bucket, key);
        match fs::remove_file(&attrs_path).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => debug!("failed to remove sidecar {}: {}", attrs_path.display(), err),
        }

        if let Some(parent) = file_path.parent() {
            Self::prune_empty_dirs(parent, &self.bucket_root(bucket)).await;
        }
        if let Some(parent) = attrs_path.parent() {
            Self::prune_empty_dirs(parent, &self.attrs_root(bucket)).await;
        }

        Ok(existed)
    }

    async fn list(&self, bucket: &str) -> GatewayResult<Vec<String>> {
        self.ensure_bucket_known(bucket)?;
        let root = self.bucket_root(bucket);
        let mut keys = Vec::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if entry.file_name().to_string_lossy().starts_with(TMP_PREFIX) {
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(&root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn public_url(&self, bucket: &str, key: &str) -> GatewayResult<String> {
        registry_public_url(&self.registry, bucket, key)
    }

    fn locate(&self, url: &str) -> Option<(String, String)> {
        self.registry.locate(url)
    }

    fn buckets(&self) -> Vec<String> {
        self.registry.ids().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::bucket_registry::BucketConfig;
    use tokio::io::AsyncReadExt;

    fn store_with(dir: &Path, access: AccessLevel) -> LocalObjectStore {
        let registry = BucketRegistry::new([
            BucketConfig::parse("carousel=http://localhost:3000/public/carousel"),
            BucketConfig::parse("drafts"),
        ])
        .unwrap();
        LocalObjectStore::new(dir, registry, access)
    }

    fn store(dir: &Path) -> LocalObjectStore {
        store_with(dir, AccessLevel::Service)
    }

    #[tokio::test]
    async fn put_then_open_then_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let attrs = Attributes::from([("width".to_string(), "1200".to_string())]);

        let location = store
            .put(
                "carousel",
                "covers/1_abcdef_a.png",
                Bytes::from_static(b"png-bytes"),
                "image/png",
                &attrs,
            )
            .await
            .unwrap();
        assert_eq!(
            location.url,
            "http://localhost:3000/public/carousel/covers/1_abcdef_a.png"
        );

        let (meta, mut file) = store
            .open("carousel", "covers/1_abcdef_a.png")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.size_bytes, 9);
        assert_eq!(meta.attributes, attrs);
        let mut body = Vec::new();
        file.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"png-bytes");

        assert_eq!(
            store.list("carousel").await.unwrap(),
            vec!["covers/1_abcdef_a.png".to_string()]
        );

        assert!(store.delete("carousel", "covers/1_abcdef_a.png").await.unwrap());
        assert!(!store.delete("carousel", "covers/1_abcdef_a.png").await.unwrap());
        assert!(store.list("carousel").await.unwrap().is_empty());
        assert!(!tmp.path().join("carousel").join("covers").exists());
    }

    #[tokio::test]
    async fn public_access_cannot_write_or_delete() {
        let tmp = tempfile::tempdir().unwrap();
        store(tmp.path())
            .put(
                "carousel",
                "covers/kept.png",
                Bytes::from_static(b"png"),
                "image/png",
                &Attributes::new(),
            )
            .await
            .unwrap();

        let public = store_with(tmp.path(), AccessLevel::Public);
        let err = public
            .put(
                "carousel",
                "covers/new.png",
                Bytes::from_static(b"png"),
                "image/png",
                &Attributes::new(),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(&err, GatewayError::StoreUnavailable(msg) if msg.contains("service access level"))
        );
        assert!(!tmp.path().join("carousel/covers/new.png").exists());

        let err = public.delete("carousel", "covers/kept.png").await.unwrap_err();
        assert!(matches!(err, GatewayError::StoreUnavailable(_)));
        assert!(tmp.path().join("carousel/covers/kept.png").exists());

        assert_eq!(
            public.list("carousel").await.unwrap(),
            vec!["covers/kept.png".to_string()]
        );
        assert!(public.open("carousel", "covers/kept.png").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_bucket_is_rejected_before_io() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());

        let err = store
            .put("ghost", "a.png", Bytes::new(), "image/png", &Attributes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::BucketNotFound(b) if b == "ghost"));
        assert!(!tmp.path().join("ghost").exists());
    }

    #[tokio::test]
    async fn bucket_without_base_url_cannot_produce_urls() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());

        assert!(matches!(
            store.public_url("drafts", "a.png"),
            Err(GatewayError::UnconfiguredBucket(_))
        ));
        let err = store
            .put("drafts", "a.png", Bytes::from_static(b"x"), "image/png", &Attributes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnconfiguredBucket(_)));
        assert!(store.list("drafts").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        for key in ["../escape.png", "/abs.png", "a//b.png", "a/./b.png", ".tmp-x", "dir/"] {
            assert!(
                matches!(
                    store.delete("carousel", key).await,
                    Err(GatewayError::InvalidObjectKey(_))
                ),
                "key {key} should be rejected"
            );
        }
    }

    #[test]
    fn locate_inverts_public_url() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let url = store.public_url("carousel", "covers/k.png").unwrap();
        assert_eq!(
            store.locate(&url),
            Some(("carousel".into(), "covers/k.png".into()))
        );
        assert_eq!(store.locate("https://elsewhere.test/k.png"), None);
    }
}
