//! Building blocks for a small cache in front of an object store.
//!
//! * [`transform`]: reversible payload substitution applied on write/read.
//! * [`storage`]: the [`storage::ObjectBackend`] seam, its S3, filesystem and
//!   in-memory implementations, and the prefix-scoping [`storage::StorageGateway`].
//! * [`trace`]: request-scoped trace segments with guaranteed closure.
//! * [`dispatcher`]: verb → storage operation → status/body mapping.
//! * [`handler`]: the store-then-read-back function handler.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod storage;
pub mod trace;
pub mod transform;

pub use dispatcher::{Dispatcher, Reply, ReplyBody, StatusBody, Verb};
pub use error::{DispatchError, HandlerError, StorageError, TraceError};
pub use storage::{KeyLayout, ObjectBackend, ResponseMetadata, StorageGateway, StoredObject};
pub use trace::{Recorder, TraceContext, TraceHeader};
