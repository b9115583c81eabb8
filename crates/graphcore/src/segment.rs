//! Typed, immutable values flowing between nodes.
//!
//! A [`Segment`] pairs a JSON payload with the [`SegmentType`] it was built
//! as. The type is fixed at construction and never re-derived from the
//! payload afterwards.

use crate::SegmentError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Key/value pair marking a JSON object as a file reference.
pub const FILE_IDENTITY_KEY: &str = "dify_model_identity";
pub const FILE_IDENTITY: &str = "__dify__file__";

/// Closed set of value types known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentType {
    None,
    String,
    Integer,
    Float,
    Number,
    Boolean,
    Object,
    Secret,
    File,
    ArrayAny,
    ArrayString,
    ArrayNumber,
    ArrayObject,
    ArrayBoolean,
    ArrayFile,
}

impl SegmentType {
    pub const ALL: [SegmentType; 15] = [
        SegmentType::None,
        SegmentType::String,
        SegmentType::Integer,
        SegmentType::Float,
        SegmentType::Number,
        SegmentType::Boolean,
        SegmentType::Object,
        SegmentType::Secret,
        SegmentType::File,
        SegmentType::ArrayAny,
        SegmentType::ArrayString,
        SegmentType::ArrayNumber,
        SegmentType::ArrayObject,
        SegmentType::ArrayBoolean,
        SegmentType::ArrayFile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentType::None => "none",
            SegmentType::String => "string",
            SegmentType::Integer => "integer",
            SegmentType::Float => "float",
            SegmentType::Number => "number",
            SegmentType::Boolean => "boolean",
            SegmentType::Object => "object",
            SegmentType::Secret => "secret",
            SegmentType::File => "file",
            SegmentType::ArrayAny => "array[any]",
            SegmentType::ArrayString => "array[string]",
            SegmentType::ArrayNumber => "array[number]",
            SegmentType::ArrayObject => "array[object]",
            SegmentType::ArrayBoolean => "array[boolean]",
            SegmentType::ArrayFile => "array[file]",
        }
    }

    /// The tag used at system boundaries. Depends on `self` only.
    pub fn exposed_type(self) -> SegmentType {
        match self {
            SegmentType::Integer | SegmentType::Float => SegmentType::Number,
            SegmentType::Secret => SegmentType::String,
            other => other,
        }
    }

    pub fn is_array_type(self) -> bool {
        self.element_type().is_some()
    }

    /// Element type of an array type; `None` for scalars.
    pub fn element_type(self) -> Option<SegmentType> {
        match self {
            SegmentType::ArrayAny => Some(SegmentType::None),
            SegmentType::ArrayString => Some(SegmentType::String),
            SegmentType::ArrayNumber => Some(SegmentType::Number),
            SegmentType::ArrayObject => Some(SegmentType::Object),
            SegmentType::ArrayBoolean => Some(SegmentType::Boolean),
            SegmentType::ArrayFile => Some(SegmentType::File),
            _ => None,
        }
    }

    /// Whether `value` has the shape this type requires.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            SegmentType::None => value.is_null(),
            SegmentType::String | SegmentType::Secret => value.is_string(),
            SegmentType::Integer => value.is_i64() || value.is_u64(),
            SegmentType::Float | SegmentType::Number => value.is_number(),
            SegmentType::Boolean => value.is_boolean(),
            SegmentType::Object => value.is_object(),
            SegmentType::File => is_file_object(value),
            SegmentType::ArrayAny => value.is_array(),
            SegmentType::ArrayString
            | SegmentType::ArrayNumber
            | SegmentType::ArrayObject
            | SegmentType::ArrayBoolean
            | SegmentType::ArrayFile => match (value.as_array(), self.element_type()) {
                (Some(items), Some(element)) => items.iter().all(|item| element.accepts(item)),
                _ => false,
            },
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentType {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        SegmentType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| SegmentError::UnknownType(s.to_string()))
    }
}

impl Serialize for SegmentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SegmentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn is_file_object(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|obj| obj.get(FILE_IDENTITY_KEY))
        .and_then(Value::as_str)
        == Some(FILE_IDENTITY)
}

/// An immutable typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSegment")]
pub struct Segment {
    value_type: SegmentType,
    value: Value,
}

#[derive(Deserialize)]
struct RawSegment {
    value_type: SegmentType,
    #[serde(default)]
    value: Value,
}

impl TryFrom<RawSegment> for Segment {
    type Error = SegmentError;

    fn try_from(raw: RawSegment) -> Result<Self, Self::Error> {
        Segment::new(raw.value_type, raw.value)
    }
}

impl Segment {
    /// Build a segment of an explicit type, rejecting payloads of the wrong shape.
    pub fn new(value_type: SegmentType, value: Value) -> Result<Self, SegmentError> {
        if !value_type.accepts(&value) {
            return Err(SegmentError::TypeMismatch {
                expected: value_type.to_string(),
                actual: Segment::infer(value).value_type.to_string(),
            });
        }
        Ok(Self { value_type, value })
    }

    /// Wrap a raw value, choosing its type from the value's native shape.
    pub fn infer(value: Value) -> Self {
        let value_type = infer_type(&value);
        Self { value_type, value }
    }

    pub fn none() -> Self {
        Self {
            value_type: SegmentType::None,
            value: Value::Null,
        }
    }

    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            value_type: SegmentType::Secret,
            value: Value::String(value.into()),
        }
    }

    pub fn value_type(&self) -> SegmentType {
        self.value_type
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Canonical string form. Every place that stringifies a segment goes
    /// through here.
    pub fn text(&self) -> String {
        match &self.value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(_) | Value::Number(_) => self.value.to_string(),
            Value::Array(_) | Value::Object(_) => {
                serde_json::to_string(&self.value).unwrap_or_default()
            }
        }
    }

    /// Masked form for logs; secrets never leave the pool in clear text.
    pub fn log_text(&self) -> String {
        if self.value_type == SegmentType::Secret {
            let text = self.text();
            let visible: String = text.chars().take(2).collect();
            return format!("{}******", visible);
        }
        self.text()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.value.as_bool()
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        self.value.as_array()
    }

    pub fn is_none(&self) -> bool {
        self.value_type == SegmentType::None
    }

    /// Empty string, array or object. `none` counts as empty too.
    pub fn is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Elements of an array segment, each wrapped with the array's element type.
    pub fn elements(&self) -> Option<Vec<Segment>> {
        let element_type = self.value_type.element_type()?;
        let items = self.value.as_array()?;
        Some(
            items
                .iter()
                .map(|item| match element_type {
                    SegmentType::None | SegmentType::Number => Segment::infer(item.clone()),
                    concrete => Segment {
                        value_type: concrete,
                        value: item.clone(),
                    },
                })
                .collect(),
        )
    }
}

fn infer_type(value: &Value) -> SegmentType {
    match value {
        Value::Null => SegmentType::None,
        Value::Bool(_) => SegmentType::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => SegmentType::Integer,
        Value::Number(_) => SegmentType::Float,
        Value::String(_) => SegmentType::String,
        Value::Object(_) if is_file_object(value) => SegmentType::File,
        Value::Object(_) => SegmentType::Object,
        Value::Array(items) => infer_array_type(items),
    }
}

fn infer_array_type(items: &[Value]) -> SegmentType {
    let mut element: Option<SegmentType> = None;
    for item in items {
        let item_type = match infer_type(item) {
            SegmentType::Integer | SegmentType::Float => SegmentType::Number,
            other => other,
        };
        match element {
            None => element = Some(item_type),
            Some(seen) if seen == item_type => {}
            Some(_) => return SegmentType::ArrayAny,
        }
    }
    match element {
        Some(SegmentType::String) => SegmentType::ArrayString,
        Some(SegmentType::Number) => SegmentType::ArrayNumber,
        Some(SegmentType::Object) => SegmentType::ArrayObject,
        Some(SegmentType::Boolean) => SegmentType::ArrayBoolean,
        Some(SegmentType::File) => SegmentType::ArrayFile,
        _ => SegmentType::ArrayAny,
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl From<Value> for Segment {
    fn from(value: Value) -> Self {
        Segment::infer(value)
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Segment::infer(Value::String(s))
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::infer(Value::String(s.to_string()))
    }
}

impl From<i64> for Segment {
    fn from(n: i64) -> Self {
        Segment::infer(Value::from(n))
    }
}

impl From<f64> for Segment {
    fn from(n: f64) -> Self {
        Segment::infer(Value::from(n))
    }
}

impl From<bool> for Segment {
    fn from(b: bool) -> Self {
        Segment::infer(Value::Bool(b))
    }
}
