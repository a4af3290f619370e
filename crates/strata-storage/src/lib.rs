//! # strata-storage
//!
//! Durable home for uploaded import files.
//!
//! Wraps an [`ObjectStore`] (in-memory, local filesystem, or any S3-compatible
//! service) behind the three calls the import saga needs: upload, delete, and a
//! time-limited download URL. Every object lives under the configured key
//! prefix; names are generated per upload so concurrent imports never share a key.

pub mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use strata_config::{StorageBackend, StorageConfig};

pub use error::StorageError;

/// How download URLs are produced for a backend.
#[derive(Clone)]
enum UrlSource {
    /// Presigned S3 `GET`.
    Signed(Arc<dyn Signer>),
    /// `file://` URL under a canonical local root. Not time-limited.
    LocalFile(PathBuf),
    None,
}

/// Object store client for import files.
#[derive(Clone)]
pub struct ImportFileStorage {
    store: Arc<dyn ObjectStore>,
    urls: UrlSource,
    prefix: Path,
    backend: &'static str,
    /// `LocalFileSystem` rejects puts carrying attributes.
    stores_content_type: bool,
}

impl ImportFileStorage {
    /// Build the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotConfigured` for an S3 backend without a bucket,
    /// or the underlying error if the store cannot be constructed.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::in_memory(&config.prefix)),
            StorageBackend::Local => Self::local(&config.local_root, &config.prefix).await,
            StorageBackend::S3 => Self::s3(config),
        }
    }

    /// Process-local store. Download URLs are unsupported.
    #[must_use]
    pub fn in_memory(prefix: &str) -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            urls: UrlSource::None,
            prefix: Path::from(prefix),
            backend: "memory",
            stores_content_type: true,
        }
    }

    /// Store rooted at a local directory, created if missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the directory cannot be created or resolved.
    pub async fn local(root: &str, prefix: &str) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(root).await?;
        let root = tokio::fs::canonicalize(root).await?;
        let store = LocalFileSystem::new_with_prefix(&root)?;
        Ok(Self {
            store: Arc::new(store),
            urls: UrlSource::LocalFile(root),
            prefix: Path::from(prefix),
            backend: "local",
            stores_content_type: false,
        })
    }

    /// S3-compatible store. Credentials fall back to the AWS environment
    /// when not set in config.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotConfigured` without a bucket, or the builder's
    /// error for an invalid endpoint.
    pub fn s3(config: &StorageConfig) -> Result<Self, StorageError> {
        if !config.is_s3_configured() {
            return Err(StorageError::NotConfigured(
                "storage.bucket is required for the s3 backend".into(),
            ));
        }
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(config.region_or_default())
            .with_allow_http(config.allow_http);
        if !config.endpoint.is_empty() {
            builder = builder.with_endpoint(&config.endpoint);
        }
        if !config.access_key_id.is_empty() {
            builder = builder
                .with_access_key_id(&config.access_key_id)
                .with_secret_access_key(&config.secret_access_key);
        }
        let s3 = Arc::new(builder.build()?);
        tracing::debug!(bucket = %config.bucket, "s3 import storage ready");
        Ok(Self {
            store: Arc::clone(&s3) as Arc<dyn ObjectStore>,
            urls: UrlSource::Signed(s3),
            prefix: Path::from(config.prefix.as_str()),
            backend: "s3",
            stores_content_type: true,
        })
    }

    /// Wrap an arbitrary store. Download URLs are unsupported.
    #[must_use]
    pub fn with_store(store: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            store,
            urls: UrlSource::None,
            prefix: Path::from(prefix),
            backend: "custom",
            stores_content_type: false,
        }
    }

    /// Backend name, for logs and errors.
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        self.backend
    }

    fn location(&self, name: &str) -> Result<Path, StorageError> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.prefix.child(name))
    }

    /// Upload `bytes` as `name`, tagged with `content_type` where the backend
    /// keeps object attributes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the name is invalid or the store rejects the write.
    pub async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let location = self.location(name)?;
        let size = bytes.len();
        let opts = if self.stores_content_type {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            PutOptions {
                attributes,
                ..PutOptions::default()
            }
        } else {
            PutOptions::default()
        };
        self.store
            .put_opts(&location, PutPayload::from(bytes), opts)
            .await?;
        tracing::debug!(%location, size, backend = self.backend, "import file uploaded");
        Ok(())
    }

    /// Delete `name`. Deleting an absent object succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for anything other than not-found.
    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let location = self.location(name)?;
        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                tracing::debug!(%location, "import file deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `name` is present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    pub async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let location = self.location(name)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(test)]
    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let location = self.location(name)?;
        let bytes = self.store.get(&location).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// URL from which `name` can be downloaded for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::SigningUnsupported` on the memory backend, or the
    /// signer's error.
    pub async fn download_url(&self, name: &str, ttl: Duration) -> Result<String, StorageError> {
        let location = self.location(name)?;
        match &self.urls {
            UrlSource::Signed(signer) => {
                let url = signer
                    .signed_url(http::Method::GET, &location, ttl)
                    .await?;
                Ok(url.to_string())
            }
            UrlSource::LocalFile(root) => {
                let mut file = root.clone();
                file.extend(location.parts().map(|p| p.as_ref().to_string()));
                Ok(format!("file://{}", file.display()))
            }
            UrlSource::None => Err(StorageError::SigningUnsupported {
                backend: self.backend,
            }),
        }
    }
}

/// Collision-resistant object name keeping the upload's extension.
#[must_use]
pub fn generate_object_name(extension: &str) -> String {
    format!("{}.{}", uuid::Uuid::new_v4(), extension.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[tokio::test]
    async fn memory_upload_read_delete() {
        let storage = ImportFileStorage::in_memory("imports");
        storage
            .upload("a.json", b"[]".to_vec(), "application/json")
            .await
            .unwrap();
        assert!(storage.exists("a.json").await.unwrap());
        assert_eq!(storage.read("a.json").await.unwrap(), b"[]".to_vec());

        storage.delete("a.json").await.unwrap();
        assert!(!storage.exists("a.json").await.unwrap());
        // second delete is a no-op
        storage.delete("a.json").await.unwrap();
    }

    #[tokio::test]
    async fn memory_upload_keeps_content_type() {
        let storage = ImportFileStorage::in_memory("imports");
        storage
            .upload("a.yaml", b"[]".to_vec(), "application/yaml")
            .await
            .unwrap();
        let location = storage.location("a.yaml").unwrap();
        let got = storage.store.get(&location).await.unwrap();
        let content_type = got
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| AsRef::<str>::as_ref(v).to_string());
        assert_eq!(content_type.as_deref(), Some("application/yaml"));
    }

    #[tokio::test]
    async fn local_upload_skips_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("objects");
        let storage = ImportFileStorage::local(root.to_str().unwrap(), "imports")
            .await
            .unwrap();
        storage
            .upload("a.json", b"[1]".to_vec(), "application/json")
            .await
            .unwrap();
        assert_eq!(storage.read("a.json").await.unwrap(), b"[1]".to_vec());
    }

    #[tokio::test]
    async fn memory_backend_has_no_download_urls() {
        let storage = ImportFileStorage::in_memory("imports");
        let err = storage
            .download_url("a.json", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SigningUnsupported { backend: "memory" }));
    }

    #[rstest]
    #[case::empty("")]
    #[case::nested("a/b.json")]
    #[case::parent("..")]
    #[tokio::test]
    async fn rejects_non_segment_names(#[case] name: &str) {
        let storage = ImportFileStorage::in_memory("imports");
        let err = storage.upload(name, vec![], "text/plain").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
    }

    #[test]
    fn generated_names_are_unique_and_keep_extension() {
        let a = generate_object_name("YAML");
        let b = generate_object_name("yaml");
        assert!(a.ends_with(".yaml"));
        assert_ne!(a, b);
        assert_eq!(a.len(), 36 + ".yaml".len());
    }

    #[test]
    fn s3_without_bucket_is_not_configured() {
        let config = StorageConfig {
            backend: StorageBackend::S3,
            ..StorageConfig::default()
        };
        assert!(matches!(
            ImportFileStorage::s3(&config),
            Err(StorageError::NotConfigured(_))
        ));
    }
}
