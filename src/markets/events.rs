//! Structured pipeline events.
//!
//! The pipeline never formats or writes log lines itself. It hands named
//! events to an [`EventSink`] and the caller decides where they go.

use crate::markets::util::now_epoch_secs;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub name: &'static str,
    pub fields: Map<String, Value>,
}

impl Event {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

pub trait EventSink {
    fn record(&self, event: &Event);
}

pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &Event) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name == name).count()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &Event) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

fn render_field(value: &Value) -> String {
    match value {
        Value::String(s) => sanitize_value(s),
        Value::Null => "na".to_string(),
        other => sanitize_value(&other.to_string()),
    }
}

pub fn render_line(event: &Event) -> String {
    let mut line = format!("CHAT_MARKETS_EVENT name={}", event.name);
    for (key, value) in &event.fields {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(&render_field(value));
    }
    line
}

/// One `key=value` line per event on stderr.
pub struct StderrSink;

impl EventSink for StderrSink {
    fn record(&self, event: &Event) {
        eprintln!("{}", render_line(event));
    }
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    at_epoch_secs: u64,
    name: &'a str,
    fields: &'a Map<String, Value>,
}

/// Appends events as JSON lines. Write failures are dropped: an unwritable
/// audit file must not fail a generation call.
pub struct AuditLogSink {
    path: PathBuf,
}

impl AuditLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, event: &Event) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let record = AuditRecord {
            at_epoch_secs: now_epoch_secs(),
            name: event.name,
            fields: &event.fields,
        };
        let line = format!("{}\n", serde_json::to_string(&record)?);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

impl EventSink for AuditLogSink {
    fn record(&self, event: &Event) {
        let _ = self.append(event);
    }
}

#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn record(&self, event: &Event) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
