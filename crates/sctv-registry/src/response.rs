//! Registry response unwrapping.
//!
//! The streaming API has shipped several envelope shapes over time. The
//! active-camera list may arrive as:
//! - a bare array
//! - `{"result": [...]}` or `{"result": {"items": [...]}}`
//! - `{"items": [...]}`
//! - `{"data": [...]}`
//!
//! Anything else is read as "no active streams".

use sctv_models::{SourceLocator, StreamDescriptor, StreamId};
use serde_json::Value;
use tracing::warn;

const LOCATOR_KEYS: [&str; 4] = ["streamUrl", "streamSource", "stream_url", "url"];

/// Extract the list of stream records from a registry response body.
pub fn unwrap_stream_list(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(result) = map.remove("result") {
                match result {
                    Value::Array(items) => items,
                    Value::Object(mut inner) => match inner.remove("items") {
                        Some(Value::Array(items)) => items,
                        _ => Vec::new(),
                    },
                    _ => Vec::new(),
                }
            } else if let Some(items) = map.remove("items") {
                match items {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                }
            } else if let Some(data) = map.remove("data") {
                match data {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                }
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

/// Parse stream records, skipping any that lack an id or a locator.
pub fn parse_descriptors(records: Vec<Value>) -> Vec<StreamDescriptor> {
    records
        .into_iter()
        .filter_map(|record| {
            let descriptor = parse_descriptor(&record);
            if descriptor.is_none() {
                warn!("Skipping malformed stream record: {}", record);
            }
            descriptor
        })
        .collect()
}

fn parse_descriptor(record: &Value) -> Option<StreamDescriptor> {
    let id = match record.get("id")? {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let locator = LOCATOR_KEYS.iter().find_map(|key| match record.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })?;

    let name = record
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());

    Some(StreamDescriptor {
        id: StreamId::new(id),
        name,
        locator: SourceLocator::new(locator),
    })
}
