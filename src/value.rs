// raw records arrive as JSON objects
use serde_json::Value as Json;
// used to read value kinds from configuration and to emit values over http
use serde::{Deserialize, Deserializer, Serialize};

// used to print out readable forms of a value
use std::fmt;

/// A raw, untyped property bag as emitted by a dataset loader.
pub type RawRecord = serde_json::Map<String, Json>;

/// The scalar kinds a `Value` property definition can assert or coerce to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    String,
    Boolean,
    Number,
}

impl ValueKind {
    pub const fn data_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Number => "number",
        }
    }
    /// True when the raw value already has this kind, without coercion.
    pub fn matches(&self, raw: &Json) -> bool {
        matches!(
            (self, raw),
            (Self::String, Json::String(_))
                | (Self::Boolean, Json::Bool(_))
                | (Self::Number, Json::Number(_))
        )
    }
    /// Lenient conversion. Null passes through as `Absent`.
    pub fn coerce(&self, raw: &Json) -> PropValue {
        if raw.is_null() {
            return PropValue::Absent;
        }
        match self {
            Self::String => match raw {
                Json::String(s) => PropValue::Text(s.clone()),
                Json::Object(_) => PropValue::Text(raw.to_string()),
                other => PropValue::Text(PropValue::from(other).to_key()),
            },
            Self::Number => match raw {
                Json::Number(n) => n.as_f64().map_or(PropValue::Absent, PropValue::Number),
                Json::Bool(b) => PropValue::Number(if *b { 1.0 } else { 0.0 }),
                Json::String(s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        PropValue::Number(0.0)
                    } else {
                        trimmed
                            .parse::<f64>()
                            .ok()
                            .filter(|n| n.is_finite())
                            .map_or(PropValue::Absent, PropValue::Number)
                    }
                }
                _ => PropValue::Absent,
            },
            Self::Boolean => PropValue::Bool(PropValue::from(raw).is_truthy()),
        }
    }
}

pub fn json_type_name(raw: &Json) -> &'static str {
    match raw {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// A built property value on an initiative.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    #[default]
    Absent,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<PropValue>),
}

impl PropValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
    pub fn as_list(&self) -> Option<&[PropValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Absent => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(s) => !s.is_empty(),
            Self::List(_) => true,
        }
    }
    /// The string form used as an index key. Absent values stringify to the
    /// empty string and integral numbers print without a fraction.
    pub fn to_key(&self) -> String {
        match self {
            Self::Absent => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Self::Text(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(PropValue::to_key)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
    /// Equality for filters: a list matches if any element equals `required`.
    pub fn has(&self, required: &PropValue) -> bool {
        match self {
            Self::List(items) => items.iter().any(|item| item == required),
            other => other == required,
        }
    }
    /// Yields the scalar elements of this value; a list is flattened one level.
    pub fn elements(&self) -> Vec<&PropValue> {
        match self {
            Self::List(items) => items.iter().collect(),
            Self::Absent => Vec::new(),
            other => vec![other],
        }
    }
}

impl From<&Json> for PropValue {
    fn from(raw: &Json) -> Self {
        match raw {
            Json::Null => Self::Absent,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => n.as_f64().map_or(Self::Absent, Self::Number),
            Json::String(s) => Self::Text(s.clone()),
            Json::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            Json::Object(_) => Self::Text(raw.to_string()),
        }
    }
}
impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}
impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}
impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<'de> Deserialize<'de> for PropValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Json::deserialize(deserializer).map(|raw| PropValue::from(&raw))
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_key())
    }
}
