use std::{path::Path, sync::Arc};

use chrono::NaiveDate;
use futures::TryStreamExt;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path as ObjectPath,
    ObjectStore, PutPayload,
};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    daily_key, parse_project_key, project_key, DailyEntry, GlobalIndex, RepoId, RepoRecord,
    INDEX_KEY, PROJECTS_PREFIX,
};
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object store: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value blob store; absence is a regular result of `get`.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket: String,
    pub region: String,
}

pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
}

impl ObjectBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn s3(settings: &S3Settings) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(key) = &settings.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &settings.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        Ok(Self::new(Arc::new(builder.build()?)))
    }

    pub fn local(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(Self::new(Arc::new(LocalFileSystem::new_with_prefix(root)?)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }
}

#[async_trait::async_trait]
impl BlobStore for ObjectBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.store.get(&ObjectPath::from(key)).await {
            Ok(result) => Ok(Some(result.bytes().await?.to_vec())),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.store
            .put(&ObjectPath::from(key), PutPayload::from(bytes))
            .await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let prefix = ObjectPath::from(prefix);
        let keys: Vec<String> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await?;
        Ok(keys)
    }
}

/// Typed access to the crawler's documents.
#[derive(Clone)]
pub struct Storage {
    blobs: Arc<dyn BlobStore>,
}

impl Storage {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        match self.blobs.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes pretty-printed UTF-8 JSON; non-ASCII text is kept as is.
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        debug!("Writing {} bytes to {key}", bytes.len());
        self.blobs.put(key, bytes).await
    }

    pub async fn project(&self, id: &RepoId) -> Result<Option<RepoRecord>, StorageError> {
        self.get_json(&project_key(id)).await
    }

    #[instrument(skip_all, fields(repo = %record.full_name))]
    pub async fn save_project(&self, record: &RepoRecord) -> Result<(), StorageError> {
        self.put_json(&project_key(&record.id()), record).await
    }

    pub async fn save_daily(
        &self,
        date: NaiveDate,
        entries: &[DailyEntry],
    ) -> Result<(), StorageError> {
        self.put_json(&daily_key(date), entries).await
    }

    pub async fn daily(&self, date: NaiveDate) -> Result<Option<Vec<DailyEntry>>, StorageError> {
        self.get_json(&daily_key(date)).await
    }

    pub async fn index(&self) -> Result<Option<GlobalIndex>, StorageError> {
        self.get_json(INDEX_KEY).await
    }

    pub async fn save_index(&self, index: &GlobalIndex) -> Result<(), StorageError> {
        self.put_json(INDEX_KEY, index).await
    }

    /// Repositories that have a stored record.
    pub async fn project_ids(&self) -> Result<Vec<RepoId>, StorageError> {
        Ok(self
            .blobs
            .list(PROJECTS_PREFIX)
            .await?
            .iter()
            .filter_map(|key| parse_project_key(key))
            .collect())
    }
}
