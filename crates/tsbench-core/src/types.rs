//! Core data types for the tsbench data model

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanosecond-precision Unix epoch timestamp
pub type Timestamp = i64;

/// Nanoseconds per millisecond, used when rendering wire timestamps
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// A tag is a key-value pair identifying the series a point belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    /// Create a new tag
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Validate the tag
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(CoreError::EmptyTagKey);
        }
        Ok(())
    }
}

/// Numeric field value. The variant is fixed when the point is built,
/// so serializers never need to inspect the value at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// 64-bit floating point
    Float(f64),
    /// 32-bit floating point, rendered at 32-bit precision
    Float32(f32),
    /// 64-bit signed integer
    Integer(i64),
}

impl FieldValue {
    /// Get the type name of this field value
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Float(_) => "float",
            FieldValue::Float32(_) => "float32",
            FieldValue::Integer(_) => "integer",
        }
    }

    /// Widen to the f64 carried by a remote-write sample
    pub fn as_f64(&self) -> f64 {
        match self {
            FieldValue::Float(v) => *v,
            FieldValue::Float32(v) => *v as f64,
            FieldValue::Integer(v) => *v as f64,
        }
    }
}

/// Shortest round-trip decimal, never in exponent form.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Float32(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float32(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Integer(v as i64)
    }
}

/// A field is a named measured value of a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    /// Create a new field
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Validate the field
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(CoreError::EmptyFieldKey);
        }
        Ok(())
    }
}

/// A data point represents a single measurement at a specific time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// The measurement name (prefix of every emitted metric name)
    pub measurement: String,
    /// Timestamp in nanoseconds since Unix epoch
    pub timestamp: Timestamp,
    /// Tags in insertion order
    pub tags: Vec<Tag>,
    /// Field values in insertion order
    pub fields: Vec<Field>,
}

impl Point {
    /// Create a new point builder
    pub fn builder(measurement: impl Into<String>) -> PointBuilder {
        PointBuilder::new(measurement)
    }

    /// Validate the point
    pub fn validate(&self) -> Result<()> {
        if self.measurement.is_empty() {
            return Err(CoreError::EmptyMeasurement);
        }
        if self.fields.is_empty() {
            return Err(CoreError::NoFields);
        }
        for tag in &self.tags {
            tag.validate()?;
        }
        for field in &self.fields {
            field.validate()?;
        }
        Ok(())
    }

    /// Timestamp truncated to milliseconds, as carried on the wire
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp / NANOS_PER_MILLI
    }

    /// Metric name emitted for one of this point's fields
    pub fn metric_name(&self, field: &Field) -> String {
        let mut name = String::with_capacity(self.measurement.len() + 1 + field.key.len());
        name.push_str(&self.measurement);
        name.push('_');
        name.push_str(&field.key);
        name
    }

    /// Get a tag value by key
    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// Get a field value by key
    pub fn get_field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }
}

/// Builder for constructing Points
pub struct PointBuilder {
    measurement: String,
    timestamp: Option<Timestamp>,
    tags: Vec<Tag>,
    fields: Vec<Field>,
}

impl PointBuilder {
    /// Create a new point builder
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            timestamp: None,
            tags: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Set the timestamp (nanoseconds)
    pub fn timestamp(mut self, ts: Timestamp) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Add a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    /// Add a field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push(Field::new(key, value));
        self
    }

    /// Build the point. A point without fields is a construction error.
    pub fn build(self) -> Result<Point> {
        let point = Point {
            measurement: self.measurement,
            timestamp: self.timestamp.unwrap_or_else(|| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos() as i64)
                    .unwrap_or_default()
            }),
            tags: self.tags,
            fields: self.fields,
        };

        point.validate()?;
        Ok(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_creation_and_validation() {
        let tag = Tag::new("hostname", "host_0");
        assert_eq!(tag.key, "hostname");
        assert_eq!(tag.value, "host_0");
        assert!(tag.validate().is_ok());

        let empty_key = Tag::new("", "value");
        assert!(empty_key.validate().is_err());
    }

    #[test]
    fn test_field_value_variants() {
        let fv: FieldValue = 38.24311829_f64.into();
        assert_eq!(fv.type_name(), "float");
        assert_eq!(fv.to_string(), "38.24311829");

        let fv: FieldValue = 38_i64.into();
        assert_eq!(fv.type_name(), "integer");
        assert_eq!(fv.to_string(), "38");
        assert_eq!(fv.as_f64(), 38.0);

        let fv: FieldValue = 0.1_f32.into();
        assert_eq!(fv.type_name(), "float32");
        assert_eq!(fv.to_string(), "0.1");

        let fv: FieldValue = 7_u32.into();
        assert!(matches!(fv, FieldValue::Integer(7)));
    }

    #[test]
    fn test_large_values_render_without_exponent() {
        assert_eq!(FieldValue::Integer(5_000_000_000).to_string(), "5000000000");
        assert_eq!(FieldValue::Float(1e21).to_string(), "1000000000000000000000");
        assert_eq!(FieldValue::Float(38.0).to_string(), "38");
    }

    #[test]
    fn test_point_builder_preserves_tag_order() {
        let point = Point::builder("cpu")
            .timestamp(1_451_606_400_000_000_000)
            .tag("hostname", "host_0")
            .tag("region", "eu-west-1")
            .tag("datacenter", "eu-west-1b")
            .field("usage_user", 58_i64)
            .build()
            .unwrap();

        assert_eq!(point.measurement, "cpu");
        let keys: Vec<&str> = point.tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["hostname", "region", "datacenter"]);
        assert_eq!(point.timestamp_millis(), 1_451_606_400_000);
    }

    #[test]
    fn test_point_validation() {
        assert!(Point::builder("cpu").field("value", 42_i64).build().is_ok());

        let err = Point::builder("").field("value", 42_i64).build().unwrap_err();
        assert!(matches!(err, CoreError::EmptyMeasurement));

        // No fields is a construction error rather than a panic downstream
        let err = Point::builder("cpu").build().unwrap_err();
        assert!(matches!(err, CoreError::NoFields));

        let err = Point::builder("cpu").tag("", "x").field("v", 1_i64).build().unwrap_err();
        assert!(matches!(err, CoreError::EmptyTagKey));
    }

    #[test]
    fn test_point_accessors() {
        let point = Point::builder("cpu")
            .timestamp(1000)
            .tag("hostname", "host_0")
            .field("usage_guest", 64.5_f64)
            .build()
            .unwrap();

        assert_eq!(point.get_tag("hostname"), Some("host_0"));
        assert_eq!(point.get_tag("nonexistent"), None);
        assert_eq!(point.get_field("usage_guest"), Some(&FieldValue::Float(64.5)));
        assert_eq!(point.metric_name(&point.fields[0]), "cpu_usage_guest");
    }

    #[test]
    fn test_json_roundtrip() {
        let point = Point::builder("mem")
            .timestamp(1609459200000000000)
            .tag("hostname", "host_1")
            .field("used_percent", 64.5_f64)
            .field("total", 8192_i64)
            .build()
            .unwrap();

        let json = serde_json::to_string(&point).unwrap();
        let decoded: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(point, decoded);
    }
}
