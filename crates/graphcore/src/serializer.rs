//! Exposed value-type tags for boundary-facing serializers.

use crate::{MissingValueTypeError, Segment, SegmentType};
use serde_json::{Map, Value};

/// Anything that may carry a `value_type`.
pub trait ValueTypeSource {
    fn resolve_value_type(&self) -> Option<SegmentType>;
}

impl ValueTypeSource for Segment {
    fn resolve_value_type(&self) -> Option<SegmentType> {
        Some(self.value_type())
    }
}

impl ValueTypeSource for Map<String, Value> {
    fn resolve_value_type(&self) -> Option<SegmentType> {
        self.get("value_type")?.as_str()?.parse().ok()
    }
}

impl ValueTypeSource for Value {
    fn resolve_value_type(&self) -> Option<SegmentType> {
        self.as_object()?.resolve_value_type()
    }
}

/// Exposed type tag of a segment or a raw mapping with a `value_type` key.
///
/// There is no fallback: a mapping without a parsable `value_type` is an error.
pub fn serialize_value_type<T>(source: &T) -> Result<&'static str, MissingValueTypeError>
where
    T: ValueTypeSource + ?Sized,
{
    source
        .resolve_value_type()
        .map(|value_type| value_type.exposed_type().as_str())
        .ok_or(MissingValueTypeError)
}
