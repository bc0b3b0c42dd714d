//! Attribute values held by host records

use std::fmt;

use crate::upload::PendingUpload;

/// Value of a single record field.
///
/// Attachment attributes hold `Upload` between validation and save, and the
/// stored file name (`Text`) afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttributeValue {
    #[default]
    Null,
    Text(String),
    Upload(PendingUpload),
}

impl AttributeValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttributeValue::Text(value.into())
    }

    /// Textual form of the value. An upload renders as its original name.
    pub fn as_text(&self) -> &str {
        match self {
            AttributeValue::Null => "",
            AttributeValue::Text(s) => s.as_str(),
            AttributeValue::Upload(upload) => upload.name(),
        }
    }

    /// Null, empty text, or an upload with an empty name
    pub fn is_empty(&self) -> bool {
        self.as_text().is_empty()
    }

    /// Convert a JSON scalar. Non-string scalars keep their JSON rendering.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::String(s) => AttributeValue::Text(s.clone()),
            other => AttributeValue::Text(other.to_string()),
        }
    }

    pub fn as_upload(&self) -> Option<&PendingUpload> {
        match self {
            AttributeValue::Upload(upload) => Some(upload),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<PendingUpload> for AttributeValue {
    fn from(value: PendingUpload) -> Self {
        AttributeValue::Upload(value)
    }
}
