use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::storage::{ObjectBackend, ResponseMetadata, StoredObject};

/// In-process object store, used in development mode and by tests.
#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<(String, String), Bytes>>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with a backend error (fault injection).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .read()
            .await
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    /// Raw stored bytes, bypassing the gateway.
    pub async fn raw(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn check_available(&self, operation: &'static str) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::backend(
                operation,
                io::Error::new(io::ErrorKind::ConnectionRefused, "memory backend unavailable"),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
    ) -> Result<ResponseMetadata, StorageError> {
        self.check_available("put_object")?;
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(ResponseMetadata::new(200))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        self.check_available("get_object")?;
        let objects = self.objects.read().await;
        match objects.get(&(bucket.to_string(), key.to_string())) {
            Some(data) => Ok(StoredObject {
                data: data.clone(),
                metadata: ResponseMetadata::new(200),
            }),
            None => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
        }
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ResponseMetadata, StorageError> {
        self.check_available("delete_object")?;
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(ResponseMetadata::new(204))
    }
}
