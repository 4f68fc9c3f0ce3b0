//! Custom field kinds and typed values.

use super::MediaRef;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Shape of a custom field, deciding how its value maps to a CSV cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Plain scalar text.
    #[default]
    Text,
    /// Numeric value.
    Number,
    /// Flat list of scalars (pipe-separated in CSV).
    List,
    /// Related record identities (comma-separated in CSV).
    Relationship,
    /// Nested value such as a repeater or group (JSON in CSV).
    Structured,
    /// Media reference (identity or URL in CSV).
    Media,
    /// Boolean flag (`1`/`0` in CSV).
    Boolean,
    /// Calendar date.
    Date,
    /// Date with time of day.
    DateTime,
}

impl FieldKind {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::List => "list",
            Self::Relationship => "relationship",
            Self::Structured => "structured",
            Self::Media => "media",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
        }
    }

    /// Parses a kind name, accepting the common custom-field plugin type names.
    ///
    /// Returns `None` if the name is not recognized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "textarea" | "wysiwyg" | "email" | "url" | "select" | "radio" | "scalar" => {
                Some(Self::Text)
            },
            "number" | "range" => Some(Self::Number),
            "list" | "checkbox" | "gallery" => Some(Self::List),
            "relationship" | "post_object" => Some(Self::Relationship),
            "structured" | "repeater" | "group" | "flexible_content" | "json" => {
                Some(Self::Structured)
            },
            "media" | "image" | "file" => Some(Self::Media),
            "boolean" | "bool" | "true_false" => Some(Self::Boolean),
            "date" | "date_picker" => Some(Self::Date),
            "datetime" | "date_time_picker" => Some(Self::DateTime),
            _ => None,
        }
    }
}

/// A typed custom field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// No value.
    Null,
    /// Text.
    Text(String),
    /// Number.
    Number(f64),
    /// Boolean.
    Bool(bool),
    /// Flat list of scalars.
    List(Vec<String>),
    /// Related record identities.
    Ids(Vec<u64>),
    /// Nested structured value.
    Structured(serde_json::Value),
    /// Media reference.
    Media(MediaRef),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time.
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// Returns true for `Null`, empty text and empty collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Ids(ids) => ids.is_empty(),
            Self::Structured(v) => v.is_null(),
            _ => false,
        }
    }

    /// Creates a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Creates a list value.
    #[must_use]
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_kind_parse_aliases() {
        assert_eq!(FieldKind::parse("repeater"), Some(FieldKind::Structured));
        assert_eq!(FieldKind::parse("group"), Some(FieldKind::Structured));
        assert_eq!(FieldKind::parse("true_false"), Some(FieldKind::Boolean));
        assert_eq!(FieldKind::parse("image"), Some(FieldKind::Media));
        assert_eq!(FieldKind::parse("date_time_picker"), Some(FieldKind::DateTime));
        assert_eq!(FieldKind::parse("DATE"), Some(FieldKind::Date));
        assert_eq!(FieldKind::parse("unknown"), None);
    }

    #[test]
    fn test_field_kind_as_str_roundtrips() {
        for kind in [
            FieldKind::Text,
            FieldKind::Number,
            FieldKind::List,
            FieldKind::Relationship,
            FieldKind::Structured,
            FieldKind::Media,
            FieldKind::Boolean,
            FieldKind::Date,
            FieldKind::DateTime,
        ] {
            assert_eq!(FieldKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_field_value_is_empty() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::text("").is_empty());
        assert!(FieldValue::List(vec![]).is_empty());
        assert!(!FieldValue::Bool(false).is_empty());
        assert!(!FieldValue::list(["a"]).is_empty());
    }

    #[test]
    fn test_field_value_serde_tagged() {
        let value = FieldValue::list(["x", "y"]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"kind":"list","value":["x","y"]}"#);
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
