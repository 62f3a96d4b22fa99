//! Request-scoped trace segments.
//!
//! A [`TraceContext`] owns one root segment plus a stack of nested
//! subsegments. Subsegments are opened with [`TraceContext::begin`] and closed
//! when the returned [`SegmentGuard`] goes out of scope, so a segment is closed
//! on every exit path, including `?` and cancellation. [`TraceContext::capture`]
//! wraps a whole future in a segment and is what the rest of the crate uses.
//!
//! Closed segments are handed to the [`Recorder`]'s [`SegmentSink`]. Sink
//! failures are logged and never change the outcome of the traced operation.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{Instrument, Span};

pub mod segment;
pub mod sink;

pub use segment::{AnnotationValue, Segment, SegmentKind, TraceHeader};
pub use sink::{DaemonSink, LogSink, MemorySink, NullSink, SegmentSink};

use segment::new_trace_id;

/// Process-wide entry point for creating trace contexts. Built once at
/// startup and cloned into whatever needs it.
#[derive(Clone)]
pub struct Recorder {
    sink: Arc<dyn SegmentSink>,
}

impl Recorder {
    pub fn new(sink: Arc<dyn SegmentSink>) -> Self {
        Recorder { sink }
    }

    /// Opens a new trace whose root segment is `name`.
    pub fn start(&self, name: &str) -> TraceContext {
        TraceContext::new(self.clone(), name, new_trace_id(), None)
    }

    /// Continues a trace propagated by the caller.
    pub fn resume(&self, name: &str, header: &TraceHeader) -> TraceContext {
        TraceContext::new(self.clone(), name, header.root.clone(), header.parent.clone())
    }

    fn emit(&self, segment: &Segment) {
        if let Err(e) = self.sink.emit(segment) {
            tracing::warn!(segment = %segment.name, "failed to record trace segment: {e}");
        }
    }
}

struct OpenSegment {
    segment: Segment,
    span: Span,
}

struct Inner {
    recorder: Recorder,
    trace_id: String,
    stack: Mutex<Vec<OpenSegment>>,
}

impl Inner {
    fn stack(&self) -> MutexGuard<'_, Vec<OpenSegment>> {
        self.stack.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Closes `id` and anything still open above it. A segment that is no
    /// longer on the stack has already been closed and is left alone.
    fn close(&self, id: &str) {
        let closed = {
            let mut stack = self.stack();
            let Some(pos) = stack.iter().position(|open| open.segment.id == id) else {
                return;
            };
            if pos + 1 != stack.len() {
                tracing::warn!(
                    trace_id = %self.trace_id,
                    "closing {} segment(s) left open above `{}`",
                    stack.len() - pos - 1,
                    stack[pos].segment.name
                );
            }
            stack.split_off(pos)
        };
        self.emit_closed(closed);
    }

    fn close_all(&self) {
        let closed = std::mem::take(&mut *self.stack());
        self.emit_closed(closed);
    }

    // Innermost first.
    fn emit_closed(&self, closed: Vec<OpenSegment>) {
        for mut open in closed.into_iter().rev() {
            open.segment.close();
            drop(open.span);
            self.recorder.emit(&open.segment);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// The trace of a single request or invocation. Cheap to clone; clones share
/// the same segment stack. Must not be shared between requests.
#[derive(Clone)]
pub struct TraceContext {
    inner: Arc<Inner>,
}

impl TraceContext {
    fn new(recorder: Recorder, name: &str, trace_id: String, parent_id: Option<String>) -> Self {
        let segment = Segment::open(name, &trace_id, parent_id, SegmentKind::Segment);
        let span = tracing::info_span!("segment", name = %name, trace_id = %trace_id);
        TraceContext {
            inner: Arc::new(Inner {
                recorder,
                trace_id,
                stack: Mutex::new(vec![OpenSegment { segment, span }]),
            }),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.inner.trace_id
    }

    /// Id of the innermost open segment.
    pub fn current_segment_id(&self) -> Option<String> {
        self.inner.stack().last().map(|open| open.segment.id.clone())
    }

    /// Header value for propagating this trace downstream.
    pub fn header(&self) -> TraceHeader {
        TraceHeader {
            root: self.inner.trace_id.clone(),
            parent: self.current_segment_id(),
        }
    }

    /// Number of segments currently open, root included.
    pub fn depth(&self) -> usize {
        self.inner.stack().len()
    }

    /// Opens a subsegment under the innermost open segment. It is closed when
    /// the guard is dropped, or earlier by [`TraceContext::end`].
    pub fn begin(&self, name: &str) -> SegmentGuard {
        let mut stack = self.inner.stack();
        let parent = stack.last();
        let parent_id = parent.map(|open| open.segment.id.clone());
        let span = match parent {
            Some(open) => tracing::info_span!(parent: &open.span, "segment", name = %name),
            None => tracing::info_span!("segment", name = %name, trace_id = %self.inner.trace_id),
        };
        let segment = Segment::open(name, &self.inner.trace_id, parent_id, SegmentKind::Subsegment);
        let id = segment.id.clone();
        stack.push(OpenSegment {
            segment,
            span: span.clone(),
        });
        SegmentGuard {
            ctx: self.clone(),
            id,
            span,
        }
    }

    /// Closes the most recently opened subsegment. Returns `false` when only
    /// the root segment is open; the root is closed by [`TraceContext::finish`].
    pub fn end(&self) -> bool {
        let id = {
            let stack = self.inner.stack();
            if stack.len() <= 1 {
                return false;
            }
            stack.last().map(|open| open.segment.id.clone())
        };
        match id {
            Some(id) => {
                self.inner.close(&id);
                true
            }
            None => false,
        }
    }

    /// Attaches an annotation to the innermost open segment.
    pub fn annotate(&self, key: &str, value: impl Into<AnnotationValue>) {
        let mut stack = self.inner.stack();
        match stack.last_mut() {
            Some(open) => {
                open.segment.annotations.insert(key.to_string(), value.into());
            }
            None => tracing::debug!(key, "annotation dropped, no open segment"),
        }
    }

    /// Attaches an annotation to the root segment.
    pub fn annotate_root(&self, key: &str, value: impl Into<AnnotationValue>) {
        if let Some(root) = self.inner.stack().first_mut() {
            root.segment.annotations.insert(key.to_string(), value.into());
        }
    }

    /// Runs `op` inside a subsegment called `name`. An `Err` marks the
    /// segment as failed; the result is returned unchanged either way.
    pub async fn capture<T, E, F>(&self, name: &str, op: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let guard = self.begin(name);
        let result = op.instrument(guard.span.clone()).await;
        if let Err(e) = &result {
            guard.fail(e);
        }
        result
    }

    /// Closes every open segment, root last.
    pub fn finish(self) {
        self.inner.close_all();
    }

    fn record_error(&self, id: &str, message: String) {
        let mut stack = self.inner.stack();
        if let Some(open) = stack.iter_mut().find(|open| open.segment.id == id) {
            open.segment.record_error(message);
        }
    }
}

/// Closes its segment when dropped.
#[must_use = "the segment is closed as soon as the guard is dropped"]
pub struct SegmentGuard {
    ctx: TraceContext,
    id: String,
    span: Span,
}

impl SegmentGuard {
    /// Marks the segment as failed with `cause`.
    pub fn fail(&self, cause: &dyn fmt::Display) {
        self.ctx.record_error(&self.id, cause.to_string());
    }
}

impl Drop for SegmentGuard {
    fn drop(&mut self) {
        self.ctx.inner.close(&self.id);
    }
}
