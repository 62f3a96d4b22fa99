use std::sync::Arc;

use bytes::Bytes;

use crate::error::StorageError;
use crate::trace::TraceContext;

pub mod driver;
pub mod paths;

pub use paths::{DEFAULT_PREFIX, KeyLayout};

/// What the collaborator reported about a call, besides the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseMetadata {
    pub status: u16,
    pub request_id: Option<String>,
}

impl ResponseMetadata {
    pub fn new(status: u16) -> Self {
        ResponseMetadata {
            status,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<&str>) -> Self {
        self.request_id = request_id.map(str::to_string);
        self
    }
}

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub data: Bytes,
    pub metadata: ResponseMetadata,
}

/// The object-storage collaborator.
///
/// `get_object` must return [`StorageError::NotFound`] for the collaborator's
/// missing-object signal and nothing else; `delete_object` succeeds whether or
/// not the object exists.
#[async_trait::async_trait]
pub trait ObjectBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
    ) -> Result<ResponseMetadata, StorageError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError>;

    async fn delete_object(&self, bucket: &str, key: &str)
    -> Result<ResponseMetadata, StorageError>;
}

/// Scopes cache keys into one bucket and wraps every backend call in a trace
/// segment annotated with the collaborator's status code.
#[derive(Clone)]
pub struct StorageGateway {
    backend: Arc<dyn ObjectBackend>,
    bucket: String,
    layout: KeyLayout,
}

impl StorageGateway {
    pub fn new(backend: Arc<dyn ObjectBackend>, bucket: impl Into<String>, layout: KeyLayout) -> Self {
        StorageGateway {
            backend,
            bucket: bucket.into(),
            layout,
        }
    }

    pub async fn put(
        &self,
        trace: &TraceContext,
        key: &str,
        data: Bytes,
    ) -> Result<ResponseMetadata, StorageError> {
        let object_key = self.layout.object_key(key)?;
        trace
            .capture("put_object", async {
                let size = data.len();
                let metadata = self.backend.put_object(&self.bucket, &object_key, data).await?;
                trace.annotate("put_response", metadata.status);
                tracing::debug!(bucket = %self.bucket, key = %object_key, size, "stored object");
                Ok(metadata)
            })
            .await
    }

    pub async fn get(&self, trace: &TraceContext, key: &str) -> Result<StoredObject, StorageError> {
        let object_key = self.layout.object_key(key)?;
        trace
            .capture("get_object", async {
                match self.backend.get_object(&self.bucket, &object_key).await {
                    Ok(object) => {
                        trace.annotate("get_response", object.metadata.status);
                        tracing::debug!(bucket = %self.bucket, key = %object_key, size = object.data.len(), "fetched object");
                        Ok(object)
                    }
                    Err(e @ StorageError::NotFound { .. }) => {
                        trace.annotate("get_response", 404u16);
                        Err(e)
                    }
                    Err(e) => Err(e),
                }
            })
            .await
    }

    pub async fn delete(
        &self,
        trace: &TraceContext,
        key: &str,
    ) -> Result<ResponseMetadata, StorageError> {
        let object_key = self.layout.object_key(key)?;
        trace
            .capture("delete_object", async {
                let metadata = self.backend.delete_object(&self.bucket, &object_key).await?;
                trace.annotate("delete_response", metadata.status);
                tracing::debug!(bucket = %self.bucket, key = %object_key, "deleted object");
                Ok(metadata)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::driver::memory::MemoryBackend;
    use crate::trace::{AnnotationValue, MemorySink, Recorder};

    fn gateway() -> (StorageGateway, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (
            StorageGateway::new(backend.clone(), "bucket", KeyLayout::default()),
            backend,
        )
    }

    #[tokio::test]
    async fn put_get_delete_under_prefix() {
        let (gateway, backend) = gateway();
        let sink = Arc::new(MemorySink::new());
        let trace = Recorder::new(sink.clone()).start("test");

        gateway.put(&trace, "foo", Bytes::from_static(b"bar")).await.unwrap();
        assert!(backend.contains("bucket", "cache/foo").await);

        let object = gateway.get(&trace, "foo").await.unwrap();
        assert_eq!(&object.data[..], b"bar");

        gateway.delete(&trace, "foo").await.unwrap();
        assert!(gateway.get(&trace, "foo").await.unwrap_err().is_not_found());
        trace.finish();

        let put = &sink.named("put_object")[0];
        assert_eq!(put.annotation("put_response"), Some(&AnnotationValue::Int(200)));
        let gets = sink.named("get_object");
        assert_eq!(gets.len(), 2);
        assert!(!gets[0].error);
        assert!(gets[1].error);
        assert_eq!(gets[1].annotation("get_response"), Some(&AnnotationValue::Int(404)));
        assert_eq!(sink.named("delete_object").len(), 1);
    }

    #[tokio::test]
    async fn empty_key_never_reaches_backend() {
        let (gateway, _backend) = gateway();
        let sink = Arc::new(MemorySink::new());
        let trace = Recorder::new(sink.clone()).start("test");

        let err = gateway.put(&trace, "", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        trace.finish();
        assert!(sink.named("put_object").is_empty());
    }
}
