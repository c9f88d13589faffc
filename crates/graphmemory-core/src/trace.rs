//! Lightweight operation tracing (§4.8).
//!
//! Parallel to whatever `tracing` subscriber the host process installs (or
//! doesn't): a [`Trace`] accumulates [`Span`]s so `CognifyResult`/`MemoryResult`/
//! `SearchResponse` can carry a structured, programmatically inspectable
//! trace regardless of the ambient logging configuration. Timers are
//! started at the beginning of the work they measure and finished
//! immediately afterwards, so spans never overlap within one trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorClass;

/// One of the named operation stages of §4.8.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpanKind {
    Chunk,
    Embed,
    Extract,
    WriteGraph,
    WriteVector,
    SearchVector,
    SearchExpand,
    Gc,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Chunk => "chunk",
            SpanKind::Embed => "embed",
            SpanKind::Extract => "extract",
            SpanKind::WriteGraph => "write-graph",
            SpanKind::WriteVector => "write-vector",
            SpanKind::SearchVector => "search-vector",
            SpanKind::SearchExpand => "search-expand",
            SpanKind::Gc => "gc",
        }
    }
}

/// A single completed span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub kind: SpanKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ok: bool,
    pub error: Option<String>,
    pub error_class: Option<ErrorClass>,
    /// Free-form counters (e.g. "chunks": 3, "nodes": 5).
    pub counters: std::collections::BTreeMap<String, u64>,
}

impl Span {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// An in-flight span handle returned by [`Trace::start`].
pub struct SpanGuard {
    kind: SpanKind,
    started_at: DateTime<Utc>,
    counters: std::collections::BTreeMap<String, u64>,
}

impl SpanGuard {
    pub fn counter(&mut self, key: &str, value: u64) {
        self.counters.insert(key.to_string(), value);
    }

    /// Finish the span successfully.
    pub fn finish_ok(self, now: DateTime<Utc>) -> Span {
        Span {
            kind: self.kind,
            started_at: self.started_at,
            finished_at: now,
            ok: true,
            error: None,
            error_class: None,
            counters: self.counters,
        }
    }

    /// Finish the span with an error. `now` must be the real completion
    /// time measured by the caller.
    pub fn finish_err(self, now: DateTime<Utc>, err: &(dyn std::error::Error + 'static)) -> Span {
        Span {
            kind: self.kind,
            started_at: self.started_at,
            finished_at: now,
            ok: false,
            error: Some(err.to_string()),
            error_class: Some(crate::error::classify_error(err)),
            counters: self.counters,
        }
    }
}

/// Accumulates spans for one logical operation (one `Cognify`/`AddMemory`/
/// `Search` call).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    pub spans: Vec<Span>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a span for `kind`, beginning at `now` (the start of the work
    /// it measures, per §4.8's non-overlapping requirement).
    pub fn start(&self, kind: SpanKind, now: DateTime<Utc>) -> SpanGuard {
        SpanGuard {
            kind,
            started_at: now,
            counters: std::collections::BTreeMap::new(),
        }
    }

    pub fn record(&mut self, span: Span) {
        self.spans.push(span);
    }

    pub fn total_duration_ms(&self) -> i64 {
        self.spans.iter().map(Span::duration_ms).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.spans.iter().any(|s| !s.ok)
    }
}

/// An exporter for completed traces. Export failures must never affect the
/// operation's result (§4.8) — callers should log-and-ignore errors
/// returned here, never propagate them.
pub trait TraceExporter: Send + Sync {
    fn export(&self, trace: &Trace);
}
