use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::Serialize;

/// A searchable value attached to a segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::String(v) => f.write_str(v),
            AnnotationValue::Int(v) => write!(f, "{v}"),
            AnnotationValue::Float(v) => write!(f, "{v}"),
            AnnotationValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        AnnotationValue::String(value.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(value: String) -> Self {
        AnnotationValue::String(value)
    }
}

impl From<i64> for AnnotationValue {
    fn from(value: i64) -> Self {
        AnnotationValue::Int(value)
    }
}

impl From<u16> for AnnotationValue {
    fn from(value: u16) -> Self {
        AnnotationValue::Int(value.into())
    }
}

impl From<usize> for AnnotationValue {
    fn from(value: usize) -> Self {
        AnnotationValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for AnnotationValue {
    fn from(value: f64) -> Self {
        AnnotationValue::Float(value)
    }
}

impl From<bool> for AnnotationValue {
    fn from(value: bool) -> Self {
        AnnotationValue::Bool(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Segment,
    Subsegment,
}

impl SegmentKind {
    fn is_segment(&self) -> bool {
        *self == SegmentKind::Segment
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionRecord {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cause {
    pub exceptions: Vec<ExceptionRecord>,
}

/// One named interval of a trace, serialized in the trace daemon's document
/// format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub name: String,
    pub id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "SegmentKind::is_segment")]
    pub kind: SegmentKind,
    pub start_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, AnnotationValue>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Cause>,
}

impl Segment {
    pub(crate) fn open(
        name: impl Into<String>,
        trace_id: &str,
        parent_id: Option<String>,
        kind: SegmentKind,
    ) -> Self {
        Segment {
            name: name.into(),
            id: new_segment_id(),
            trace_id: trace_id.to_string(),
            parent_id,
            kind,
            start_time: epoch_seconds(),
            end_time: None,
            annotations: BTreeMap::new(),
            error: false,
            cause: None,
        }
    }

    pub(crate) fn close(&mut self) {
        self.end_time = Some(epoch_seconds());
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.error = true;
        self.cause
            .get_or_insert_with(|| Cause { exceptions: Vec::new() })
            .exceptions
            .push(ExceptionRecord {
                id: new_segment_id(),
                message,
            });
    }

    pub fn annotation(&self, key: &str) -> Option<&AnnotationValue> {
        self.annotations.get(key)
    }

    pub fn duration_ms(&self) -> Option<f64> {
        self.end_time.map(|end| (end - self.start_time) * 1000.0)
    }
}

pub(crate) fn epoch_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// `1-<8 hex digits of epoch seconds>-<24 random hex digits>`
pub fn new_trace_id() -> String {
    let random: [u8; 12] = rand::random();
    format!("1-{:08x}-{}", Utc::now().timestamp(), hex::encode(random))
}

pub fn new_segment_id() -> String {
    let random: [u8; 8] = rand::random();
    hex::encode(random)
}

/// Propagated trace context, e.g. `Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
    pub root: String,
    pub parent: Option<String>,
}

impl TraceHeader {
    pub const NAME: &'static str = "x-amzn-trace-id";

    pub fn parse(value: &str) -> Option<Self> {
        let mut root = None;
        let mut parent = None;
        for part in value.split(';') {
            match part.trim().split_once('=') {
                Some(("Root", v)) if !v.is_empty() => root = Some(v.to_string()),
                Some(("Parent", v)) if !v.is_empty() => parent = Some(v.to_string()),
                _ => {}
            }
        }
        root.map(|root| TraceHeader { root, parent })
    }
}

impl fmt::Display for TraceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Root={}", self.root)?;
        if let Some(parent) = &self.parent {
            write!(f, ";Parent={parent}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_have_the_expected_shape() {
        let trace_id = new_trace_id();
        let parts: Vec<&str> = trace_id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "1");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 24);

        let id = new_segment_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parses_trace_header() {
        let header =
            TraceHeader::parse("Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1")
                .unwrap();
        assert_eq!(header.root, "1-5759e988-bd862e3fe1be46a994272793");
        assert_eq!(header.parent.as_deref(), Some("53995c3f42cd8ad8"));
        assert_eq!(
            header.to_string(),
            "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8"
        );

        assert!(TraceHeader::parse("Parent=53995c3f42cd8ad8").is_none());
        assert!(TraceHeader::parse("").is_none());
    }

    #[test]
    fn serializes_subsegment_document() {
        let mut segment = Segment::open("put_object", "1-00000000-000000000000000000000000", Some("abc".into()), SegmentKind::Subsegment);
        segment.annotations.insert("put_response".into(), 200u16.into());
        segment.record_error("boom".into());
        segment.close();

        let doc = serde_json::to_value(&segment).unwrap();
        assert_eq!(doc["type"], "subsegment");
        assert_eq!(doc["parent_id"], "abc");
        assert_eq!(doc["annotations"]["put_response"], 200);
        assert_eq!(doc["error"], true);
        assert_eq!(doc["cause"]["exceptions"][0]["message"], "boom");
        assert!(doc["end_time"].as_f64().unwrap() >= doc["start_time"].as_f64().unwrap());
    }

    #[test]
    fn root_segment_omits_type_and_error() {
        let segment = Segment::open("objcache", "1-00000000-000000000000000000000000", None, SegmentKind::Segment);
        let doc = serde_json::to_value(&segment).unwrap();
        assert!(doc.get("type").is_none());
        assert!(doc.get("error").is_none());
        assert!(doc.get("parent_id").is_none());
    }
}
