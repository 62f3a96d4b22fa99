//! Maps a cache request onto the storage gateway and formats the reply.
//!
//! | verb     | action                        | reply                                  |
//! |----------|-------------------------------|----------------------------------------|
//! | `PUT`    | encode, store                 | `201 {"status":"OK"}`                  |
//! | `GET`    | fetch, decode                 | `200 <payload>`, `204` when missing    |
//! | `DELETE` | remove, no existence check    | `204`                                  |
//! | other    |                               | `406 {"status":"Method Not Supported"}`|
//!
//! A missing key on `GET` answers `204 No Content` rather than `404` to stay
//! wire compatible with existing clients. Storage failures other than a
//! missing key are returned as errors.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::error::{DispatchError, StorageError};
use crate::storage::StorageGateway;
use crate::trace::TraceContext;
use crate::transform::Transform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Get,
    Put,
    Delete,
    Other(String),
}

impl From<&str> for Verb {
    fn from(method: &str) -> Self {
        match method {
            "GET" => Verb::Get,
            "PUT" => Verb::Put,
            "DELETE" => Verb::Delete,
            other => Verb::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Get => f.write_str("GET"),
            Verb::Put => f.write_str("PUT"),
            Verb::Delete => f.write_str("DELETE"),
            Verb::Other(method) => f.write_str(method),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBody {
    pub status: String,
}

impl StatusBody {
    pub fn new(status: impl Into<String>) -> Self {
        StatusBody {
            status: status.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Empty,
    Status(StatusBody),
    Payload(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: ReplyBody,
}

impl Reply {
    pub fn created() -> Self {
        Reply {
            status: 201,
            body: ReplyBody::Status(StatusBody::new("OK")),
        }
    }

    pub fn no_content() -> Self {
        Reply {
            status: 204,
            body: ReplyBody::Empty,
        }
    }

    pub fn payload(data: Bytes) -> Self {
        Reply {
            status: 200,
            body: ReplyBody::Payload(data),
        }
    }

    pub fn not_acceptable() -> Self {
        Reply {
            status: 406,
            body: ReplyBody::Status(StatusBody::new("Method Not Supported")),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    gateway: StorageGateway,
    transform: Arc<dyn Transform>,
}

impl Dispatcher {
    pub fn new(gateway: StorageGateway, transform: Arc<dyn Transform>) -> Self {
        Dispatcher { gateway, transform }
    }

    pub async fn dispatch(
        &self,
        trace: &TraceContext,
        verb: &Verb,
        key: &str,
        payload: Bytes,
    ) -> Result<Reply, DispatchError> {
        trace.annotate_root("method", verb.to_string());
        trace.annotate_root("key", key);

        let reply = match verb {
            Verb::Put => self.store(trace, key, payload).await,
            Verb::Get => self.retrieve(trace, key).await,
            Verb::Delete => self.remove(trace, key).await,
            Verb::Other(method) => {
                tracing::debug!(%method, key, "unsupported method");
                Ok(Reply::not_acceptable())
            }
        }?;

        trace.annotate_root("status_code", reply.status);
        Ok(reply)
    }

    async fn store(&self, trace: &TraceContext, key: &str, payload: Bytes) -> Result<Reply, DispatchError> {
        let encoded = trace
            .capture(self.transform.encode_segment(), async {
                Ok::<_, StorageError>(self.transform.encode(&payload))
            })
            .await?;
        self.gateway.put(trace, key, encoded).await?;
        Ok(Reply::created())
    }

    async fn retrieve(&self, trace: &TraceContext, key: &str) -> Result<Reply, DispatchError> {
        let object = match self.gateway.get(trace, key).await {
            Ok(object) => object,
            Err(StorageError::NotFound { .. }) => {
                tracing::debug!(key, "cache miss");
                return Ok(Reply::no_content());
            }
            Err(e) => return Err(e.into()),
        };
        let decoded = trace
            .capture(self.transform.decode_segment(), async {
                Ok::<_, StorageError>(self.transform.decode(&object.data))
            })
            .await?;
        Ok(Reply::payload(decoded))
    }

    async fn remove(&self, trace: &TraceContext, key: &str) -> Result<Reply, DispatchError> {
        self.gateway.delete(trace, key).await?;
        Ok(Reply::no_content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KeyLayout;
    use crate::storage::driver::memory::MemoryBackend;
    use crate::trace::{MemorySink, Recorder};
    use crate::transform::Rot13;

    struct Fixture {
        dispatcher: Dispatcher,
        backend: Arc<MemoryBackend>,
        sink: Arc<MemorySink>,
        recorder: Recorder,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let gateway = StorageGateway::new(backend.clone(), "objcache", KeyLayout::default());
        let sink = Arc::new(MemorySink::new());
        Fixture {
            dispatcher: Dispatcher::new(gateway, Arc::new(Rot13)),
            backend,
            recorder: Recorder::new(sink.clone()),
            sink,
        }
    }

    impl Fixture {
        async fn call(&self, verb: &str, key: &str, payload: &'static [u8]) -> Result<Reply, DispatchError> {
            let trace = self.recorder.start("objcache");
            let reply = self
                .dispatcher
                .dispatch(&trace, &Verb::from(verb), key, Bytes::from_static(payload))
                .await;
            trace.finish();
            reply
        }
    }

    #[tokio::test]
    async fn put_then_get_returns_original_payload() {
        let f = fixture();
        assert_eq!(f.call("PUT", "foo", b"bar").await.unwrap(), Reply::created());
        assert_eq!(
            f.backend.raw("objcache", "cache/foo").await.unwrap(),
            Bytes::from_static(b"one")
        );
        assert_eq!(
            f.call("GET", "foo", b"").await.unwrap(),
            Reply::payload(Bytes::from_static(b"bar"))
        );
    }

    #[tokio::test]
    async fn second_put_overwrites() {
        let f = fixture();
        f.call("PUT", "foo", b"first").await.unwrap();
        f.call("PUT", "foo", b"second").await.unwrap();
        assert_eq!(
            f.call("GET", "foo", b"").await.unwrap(),
            Reply::payload(Bytes::from_static(b"second"))
        );
    }

    #[tokio::test]
    async fn missing_key_is_no_content() {
        let f = fixture();
        assert_eq!(f.call("GET", "missing-key", b"").await.unwrap(), Reply::no_content());

        f.call("PUT", "foo", b"bar").await.unwrap();
        assert_eq!(f.call("DELETE", "foo", b"").await.unwrap(), Reply::no_content());
        assert_eq!(f.call("GET", "foo", b"").await.unwrap(), Reply::no_content());
    }

    #[tokio::test]
    async fn delete_of_missing_key_is_no_content() {
        let f = fixture();
        assert_eq!(f.call("DELETE", "nope", b"").await.unwrap(), Reply::no_content());
    }

    #[tokio::test]
    async fn unsupported_verb_is_not_acceptable() {
        let f = fixture();
        for verb in ["PATCH", "POST", "HEAD", "get"] {
            assert_eq!(f.call(verb, "foo", b"bar").await.unwrap(), Reply::not_acceptable());
        }
        assert!(f.backend.is_empty().await);
    }

    #[tokio::test]
    async fn storage_failure_propagates_and_closes_segments() {
        let f = fixture();
        f.backend.set_unavailable(true);

        for verb in ["GET", "PUT", "DELETE"] {
            let err = f.call(verb, "foo", b"bar").await.unwrap_err();
            assert!(matches!(err, DispatchError::Storage(StorageError::Backend { .. })));
        }

        let segments = f.sink.segments();
        assert_eq!(f.sink.named("objcache").len(), 3);
        for name in ["get_object", "put_object", "delete_object"] {
            let closed = f.sink.named(name);
            assert_eq!(closed.len(), 1, "{name}");
            assert!(closed[0].error);
            assert!(closed[0].end_time.is_some());
        }
        let mut ids: Vec<&str> = segments.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), segments.len());
    }

    #[tokio::test]
    async fn records_transform_segments_and_status() {
        let f = fixture();
        f.call("PUT", "foo", b"bar").await.unwrap();
        f.call("GET", "foo", b"").await.unwrap();

        assert_eq!(f.sink.named("encrypt").len(), 1);
        assert_eq!(f.sink.named("decrypt").len(), 1);
        let roots = f.sink.named("objcache");
        let statuses: Vec<String> = roots
            .iter()
            .map(|root| root.annotation("status_code").unwrap().to_string())
            .collect();
        assert_eq!(statuses, ["201", "200"]);
    }
}
