//! Header validation.
//!
//! Checks the resolved columns of a CSV before any row is imported.

use super::columns::{Column, ColumnSchema};
use crate::models::CoreField;
use std::collections::BTreeSet;
use std::fmt;

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Warning: issue noted but import can proceed.
    Warning,
    /// Error: the file cannot be imported.
    Error,
}

/// A validation issue found in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The column the issue is about.
    pub field: String,
    /// Description of the issue.
    pub message: String,
    /// Severity of the issue.
    pub severity: ValidationSeverity,
}

impl ValidationIssue {
    /// Creates a warning issue.
    #[must_use]
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }

    /// Creates an error issue.
    #[must_use]
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            ValidationSeverity::Warning => "warning",
            ValidationSeverity::Error => "error",
        };
        write!(f, "{level}: {}: {}", self.field, self.message)
    }
}

/// Result of validating a header.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Issues found during validation.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns true when no issue is an error.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|i| i.severity == ValidationSeverity::Error)
    }

    /// Returns the error issues.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Error)
    }

    /// Returns the warning issues.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Warning)
    }
}

/// Validates the header of an import file.
#[derive(Debug, Clone, Default)]
pub struct HeaderValidator {
    has_default_type: bool,
}

impl HeaderValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares whether a default record type is configured.
    #[must_use]
    pub const fn with_default_type(mut self, has_default_type: bool) -> Self {
        self.has_default_type = has_default_type;
        self
    }

    /// Validates the raw headers and their resolved columns.
    #[must_use]
    pub fn validate(&self, headers: &[String], schema: &ColumnSchema) -> ValidationResult {
        let mut issues = Vec::new();

        if !schema.has_identity() && !schema.has_core(CoreField::Title) {
            issues.push(ValidationIssue::error(
                "header",
                "CSV must contain a post_title or ID column",
            ));
        }

        if !schema.has_core(CoreField::Type) && !self.has_default_type {
            issues.push(ValidationIssue::warning(
                "post_type",
                "No post_type column and no default type; rows without an ID will fail",
            ));
        }

        let mut seen = BTreeSet::new();
        for header in headers {
            if header.is_empty() {
                issues.push(ValidationIssue::warning("header", "Empty column name"));
            } else if !seen.insert(header.as_str()) {
                issues.push(ValidationIssue::warning(
                    header.clone(),
                    "Duplicate column; only the first is used",
                ));
            }
        }

        for (header, column) in schema.iter() {
            if matches!(column, Column::Ignored(_)) && !header.is_empty() {
                issues.push(ValidationIssue::warning(
                    header,
                    "Unrecognized column; it will be ignored",
                ));
            }
        }

        ValidationResult { issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::columns::ColumnPrefixes;

    fn validate(names: &[&str], has_default_type: bool) -> ValidationResult {
        let headers: Vec<String> = names.iter().map(ToString::to_string).collect();
        let schema = ColumnSchema::resolve(&headers, &ColumnPrefixes::default(), |_| None);
        HeaderValidator::new()
            .with_default_type(has_default_type)
            .validate(&headers, &schema)
    }

    #[test]
    fn test_requires_title_or_identity() {
        let result = validate(&["post_content", "post_type"], false);
        assert!(!result.is_valid());
        assert_eq!(result.errors().count(), 1);

        assert!(validate(&["ID"], true).is_valid());
        assert!(validate(&["post_title", "post_type"], false).is_valid());
    }

    #[test]
    fn test_missing_type_is_warning() {
        let result = validate(&["ID", "post_title"], false);
        assert!(result.is_valid());
        assert!(result.warnings().any(|w| w.field == "post_type"));

        let with_default = validate(&["ID", "post_title"], true);
        assert!(!with_default.warnings().any(|w| w.field == "post_type"));
    }

    #[test]
    fn test_warns_on_duplicate_and_unknown_columns() {
        let result = validate(&["post_title", "post_title", "Notes", "post_type"], false);
        assert!(result.is_valid());
        let fields: Vec<&str> = result.warnings().map(|w| w.field.as_str()).collect();
        assert!(fields.contains(&"post_title"));
        assert!(fields.contains(&"Notes"));
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::error("header", "bad");
        assert_eq!(issue.to_string(), "error: header: bad");
    }
}
