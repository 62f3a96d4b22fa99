use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;

use crate::error::HandlerError;
use crate::storage::{KeyLayout, ObjectBackend, StorageGateway};
use crate::trace::{Recorder, TraceHeader};

/// Invocation event: store `body` at `bucket_name/bucket_key`, then read it back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PutGetEvent {
    pub bucket_name: String,
    pub bucket_key: String,
    pub body: String,
}

impl PutGetEvent {
    pub fn from_json(raw: &[u8]) -> Result<Self, HandlerError> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Function handler. The backend and recorder are built once and reused for
/// every invocation; each invocation gets its own trace.
#[derive(Clone)]
pub struct Handler {
    backend: Arc<dyn ObjectBackend>,
    recorder: Recorder,
    name: String,
}

impl Handler {
    pub const DEFAULT_NAME: &'static str = "put-get-handler";

    pub fn new(backend: Arc<dyn ObjectBackend>, recorder: Recorder) -> Self {
        Handler {
            backend,
            recorder,
            name: Self::DEFAULT_NAME.to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Stores the event body and reads it back. Nothing is returned to the
    /// caller; the stored object and the trace are the only effects.
    pub async fn handle(&self, event: PutGetEvent, parent: Option<&TraceHeader>) -> Result<(), HandlerError> {
        let trace = match parent {
            Some(header) => self.recorder.resume(&self.name, header),
            None => self.recorder.start(&self.name),
        };
        trace.annotate_root("bucket", event.bucket_name.as_str());

        // The event names the object directly, no cache prefix.
        let gateway = StorageGateway::new(self.backend.clone(), &event.bucket_name, KeyLayout::new(""));
        let result = async {
            gateway
                .put(&trace, &event.bucket_key, Bytes::from(event.body.into_bytes()))
                .await?;
            let object = gateway.get(&trace, &event.bucket_key).await?;
            tracing::info!(
                bucket = %event.bucket_name,
                key = %event.bucket_key,
                size = object.data.len(),
                "object stored and read back"
            );
            Ok::<_, HandlerError>(())
        }
        .await;

        if let Err(e) = &result {
            tracing::error!(trace_id = trace.trace_id(), "invocation failed: {e}");
        }
        trace.finish();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::driver::memory::MemoryBackend;
    use crate::trace::{AnnotationValue, MemorySink};

    fn handler() -> (Handler, Arc<MemoryBackend>, Arc<MemorySink>) {
        let backend = Arc::new(MemoryBackend::new());
        let sink = Arc::new(MemorySink::new());
        (
            Handler::new(backend.clone(), Recorder::new(sink.clone())),
            backend,
            sink,
        )
    }

    #[test]
    fn parses_event() {
        let event = PutGetEvent::from_json(
            br#"{"bucket_name": "my-bucket", "bucket_key": "a/b.txt", "body": "hello"}"#,
        )
        .unwrap();
        assert_eq!(event.bucket_name, "my-bucket");
        assert_eq!(event.bucket_key, "a/b.txt");
        assert_eq!(event.body, "hello");

        let err = PutGetEvent::from_json(br#"{"bucket_name": "my-bucket"}"#).unwrap_err();
        assert!(matches!(err, HandlerError::InvalidEvent(_)));
    }

    #[tokio::test]
    async fn stores_then_reads_back_with_segments() {
        let (handler, backend, sink) = handler();
        let event = PutGetEvent {
            bucket_name: "my-bucket".into(),
            bucket_key: "hello.txt".into(),
            body: "hello world".into(),
        };
        handler.handle(event, None).await.unwrap();

        assert_eq!(
            backend.raw("my-bucket", "hello.txt").await.unwrap(),
            Bytes::from_static(b"hello world")
        );

        let names: Vec<String> = sink.segments().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["put_object", "get_object", Handler::DEFAULT_NAME]);

        let put = &sink.named("put_object")[0];
        assert_eq!(put.annotation("put_response"), Some(&AnnotationValue::Int(200)));
        let get = &sink.named("get_object")[0];
        assert_eq!(get.annotation("get_response"), Some(&AnnotationValue::Int(200)));
        let root = &sink.named(Handler::DEFAULT_NAME)[0];
        assert_eq!(put.parent_id.as_deref(), Some(root.id.as_str()));
    }

    #[tokio::test]
    async fn storage_failure_still_closes_every_segment() {
        let (handler, backend, sink) = handler();
        backend.set_unavailable(true);
        let event = PutGetEvent {
            bucket_name: "my-bucket".into(),
            bucket_key: "hello.txt".into(),
            body: "hello".into(),
        };

        let err = handler.handle(event, None).await.unwrap_err();
        assert!(matches!(err, HandlerError::Storage(StorageError::Backend { .. })));

        let segments = sink.segments();
        assert_eq!(segments.len(), 2);
        assert!(segments[0].error);
        assert_eq!(segments[0].name, "put_object");
        assert!(sink.named("get_object").is_empty());
    }

    #[tokio::test]
    async fn continues_caller_trace() {
        let (handler, _backend, sink) = handler();
        let header = TraceHeader::parse("Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8").unwrap();
        let event = PutGetEvent {
            bucket_name: "b".into(),
            bucket_key: "k".into(),
            body: "v".into(),
        };
        handler.handle(event, Some(&header)).await.unwrap();

        assert!(sink
            .segments()
            .iter()
            .all(|s| s.trace_id == "1-5759e988-bd862e3fe1be46a994272793"));
    }
}
