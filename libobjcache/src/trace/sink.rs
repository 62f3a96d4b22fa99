use std::net::{SocketAddr, UdpSocket};
use std::sync::Mutex;

use crate::error::TraceError;
use crate::trace::segment::Segment;

/// Receives every segment once it has been closed.
pub trait SegmentSink: Send + Sync {
    fn emit(&self, segment: &Segment) -> Result<(), TraceError>;
}

/// Writes one structured log event per closed segment.
#[derive(Debug, Default)]
pub struct LogSink;

impl SegmentSink for LogSink {
    fn emit(&self, segment: &Segment) -> Result<(), TraceError> {
        let annotations = serde_json::to_string(&segment.annotations)?;
        tracing::info!(
            target: "objcache::trace",
            trace_id = %segment.trace_id,
            segment = %segment.name,
            id = %segment.id,
            parent_id = segment.parent_id.as_deref().unwrap_or("-"),
            duration_ms = segment.duration_ms().unwrap_or_default(),
            error = segment.error,
            %annotations,
            "segment closed"
        );
        Ok(())
    }
}

/// Sends segment documents to a local trace daemon over UDP.
pub struct DaemonSink {
    socket: UdpSocket,
    daemon: SocketAddr,
}

impl DaemonSink {
    pub const DEFAULT_ADDRESS: &'static str = "127.0.0.1:2000";
    const HEADER: &'static str = r#"{"format": "json", "version": 1}"#;

    pub fn new(daemon: SocketAddr) -> Result<Self, TraceError> {
        let bind = if daemon.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        Ok(DaemonSink { socket, daemon })
    }

    fn datagram(segment: &Segment) -> Result<Vec<u8>, TraceError> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(Self::HEADER.as_bytes());
        buf.push(b'\n');
        serde_json::to_writer(&mut buf, segment)?;
        Ok(buf)
    }
}

impl SegmentSink for DaemonSink {
    fn emit(&self, segment: &Segment) -> Result<(), TraceError> {
        let datagram = Self::datagram(segment)?;
        self.socket.send_to(&datagram, self.daemon)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NullSink;

impl SegmentSink for NullSink {
    fn emit(&self, _segment: &Segment) -> Result<(), TraceError> {
        Ok(())
    }
}

/// Keeps closed segments in memory, in closing order.
#[derive(Debug, Default)]
pub struct MemorySink {
    segments: Mutex<Vec<Segment>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.segments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn named(&self, name: &str) -> Vec<Segment> {
        self.segments()
            .into_iter()
            .filter(|segment| segment.name == name)
            .collect()
    }
}

impl SegmentSink for MemorySink {
    fn emit(&self, segment: &Segment) -> Result<(), TraceError> {
        self.segments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(segment.clone());
        Ok(())
    }
}
