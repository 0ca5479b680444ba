use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single history message as returned by Slack.
///
/// The object is kept as-is so that fields this crate knows nothing about
/// are archived unchanged and in their original order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    /// Wrap a JSON value, returning `None` when it is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Raw Slack timestamp, e.g. `"1767636991.559059"`.
    pub fn ts(&self) -> Option<&str> {
        self.0.get("ts").and_then(|v| v.as_str())
    }

    /// Timestamp as fractional epoch seconds.
    pub fn ts_secs(&self) -> Option<f64> {
        self.ts().and_then(parse_ts)
    }

    /// File objects attached to the message, from the `files` array and the
    /// legacy single `file` field.
    pub fn files(&self) -> Vec<&Map<String, Value>> {
        let mut files: Vec<&Map<String, Value>> = self
            .0
            .get("files")
            .and_then(|f| f.as_array())
            .map(|arr| arr.iter().filter_map(|f| f.as_object()).collect())
            .unwrap_or_default();

        if let Some(file) = self.0.get("file").and_then(|f| f.as_object()) {
            files.push(file);
        }

        files
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Parse a Slack timestamp (`"seconds.micros"`) or plain epoch seconds.
pub fn parse_ts(ts: &str) -> Option<f64> {
    ts.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Format epoch seconds the way Slack expects history bounds.
pub fn format_ts(secs: f64) -> String {
    format!("{:.6}", secs)
}

/// Read a timestamp that may be a string, a number or a message object
/// carrying a `ts` field.
pub fn ts_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => parse_ts(s),
        Value::Number(n) => n.as_f64(),
        Value::Object(obj) => obj.get("ts").and_then(ts_from_value),
        _ => None,
    }
}
