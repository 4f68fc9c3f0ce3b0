//! Field-level change sets.

use serde::Serialize;
use std::fmt;

/// Placeholder shown for an empty side of a diff.
pub const EMPTY_PLACEHOLDER: &str = "(empty)";

/// A single field difference between a CSV row and the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    /// Column identifier (`post_title`, `tax_category`, ...).
    pub field: String,
    /// Human label.
    pub label: String,
    /// Current value, display form.
    pub old: String,
    /// Incoming value, display form.
    pub new: String,
}

impl FieldChange {
    /// Creates a field change.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        label: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            label: label.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: \"{}\" -> \"{}\"", self.label, self.old, self.new)
    }
}

/// Ordered set of field changes for one row.
///
/// An empty change set means the row matches the stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet(Vec<FieldChange>);

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a change.
    pub fn push(&mut self, change: FieldChange) {
        self.0.push(change);
    }

    /// Returns true when no field differs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the changes in detection order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldChange> {
        self.0.iter()
    }

    /// Returns the change for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.iter().find(|c| c.field == field)
    }

    /// Returns the changed field identifiers.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.field.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a FieldChange;
    type IntoIter = std::slice::Iter<'a, FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no changes");
        }
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Renders a display value, substituting the placeholder for empty strings.
#[must_use]
pub fn display_or_placeholder(value: &str) -> String {
    if value.is_empty() {
        EMPTY_PLACEHOLDER.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_set_basics() {
        let mut changes = ChangeSet::new();
        assert!(changes.is_empty());
        assert_eq!(changes.to_string(), "no changes");

        changes.push(FieldChange::new("post_title", "Title", "Old", "New"));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.fields(), vec!["post_title"]);
        assert_eq!(changes.get("post_title").map(|c| c.new.as_str()), Some("New"));
        assert_eq!(changes.to_string(), "Title: \"Old\" -> \"New\"");
    }

    #[test]
    fn test_display_or_placeholder() {
        assert_eq!(display_or_placeholder(""), EMPTY_PLACEHOLDER);
        assert_eq!(display_or_placeholder("News"), "News");
    }
}
