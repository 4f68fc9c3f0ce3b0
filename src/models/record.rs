//! Content records and their core fields.

use super::FieldValue;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable numeric identity of a content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Creates a record ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identity.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Parses an identity from a CSV cell.
    ///
    /// Returns `None` for empty, non-numeric or zero values.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse::<u64>().ok().filter(|id| *id > 0).map(Self)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Reference to a media item (attachment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Media identity.
    pub id: u64,
    /// Public URL, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MediaRef {
    /// Creates a media reference.
    #[must_use]
    pub fn new(id: u64, url: Option<String>) -> Self {
        Self { id, url }
    }

    /// Returns the CSV locator: the URL when known, otherwise the bare identity.
    #[must_use]
    pub fn locator(&self) -> String {
        self.url.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// Fixed core columns of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreField {
    /// Record title.
    Title,
    /// Body content.
    Content,
    /// Short excerpt.
    Excerpt,
    /// Publication status.
    Status,
    /// Record type tag.
    Type,
    /// Publication date.
    Date,
    /// Last modification date (read-only on import).
    Modified,
    /// Author reference.
    Author,
    /// URL slug.
    Slug,
    /// Parent record reference.
    Parent,
    /// Ordering key.
    MenuOrder,
}

impl CoreField {
    /// Returns all core fields in export column order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Title,
            Self::Content,
            Self::Excerpt,
            Self::Status,
            Self::Type,
            Self::Date,
            Self::Modified,
            Self::Author,
            Self::Slug,
            Self::Parent,
            Self::MenuOrder,
        ]
    }

    /// Fields compared by the change detector unless configured otherwise.
    #[must_use]
    pub const fn default_checked() -> &'static [Self] {
        &[
            Self::Title,
            Self::Content,
            Self::Excerpt,
            Self::Status,
            Self::Slug,
            Self::Parent,
            Self::MenuOrder,
        ]
    }

    /// Returns the CSV column name.
    #[must_use]
    pub const fn column_name(self) -> &'static str {
        match self {
            Self::Title => "post_title",
            Self::Content => "post_content",
            Self::Excerpt => "post_excerpt",
            Self::Status => "post_status",
            Self::Type => "post_type",
            Self::Date => "post_date",
            Self::Modified => "post_modified",
            Self::Author => "post_author",
            Self::Slug => "post_name",
            Self::Parent => "post_parent",
            Self::MenuOrder => "menu_order",
        }
    }

    /// Returns the human label used in change previews.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Content => "Content",
            Self::Excerpt => "Excerpt",
            Self::Status => "Status",
            Self::Type => "Type",
            Self::Date => "Date",
            Self::Modified => "Modified",
            Self::Author => "Author",
            Self::Slug => "Slug",
            Self::Parent => "Parent",
            Self::MenuOrder => "Menu order",
        }
    }

    /// Parses a CSV column name.
    #[must_use]
    pub fn from_column(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|field| field.column_name() == name)
    }

    /// Parses a field name as written in configuration (`title`, `post_title`, ...).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        Self::from_column(&lower).or_else(|| match lower.as_str() {
            "title" => Some(Self::Title),
            "content" | "body" => Some(Self::Content),
            "excerpt" => Some(Self::Excerpt),
            "status" => Some(Self::Status),
            "type" => Some(Self::Type),
            "date" => Some(Self::Date),
            "modified" => Some(Self::Modified),
            "author" => Some(Self::Author),
            "slug" | "name" => Some(Self::Slug),
            "parent" => Some(Self::Parent),
            "order" | "ordering" => Some(Self::MenuOrder),
            _ => None,
        })
    }
}

/// Date format used for core timestamps in CSV cells.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Core scalar fields of a record.
///
/// Used both for persisted state and for the candidate built from a CSV row;
/// in the latter, `None` means "not supplied by this row".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreFields {
    /// Record type tag.
    pub record_type: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Body content.
    pub content: Option<String>,
    /// Excerpt.
    pub excerpt: Option<String>,
    /// Publication status.
    pub status: Option<String>,
    /// URL slug.
    pub slug: Option<String>,
    /// Parent record (0 when detached).
    pub parent: Option<u64>,
    /// Ordering key.
    pub menu_order: Option<i64>,
    /// Author identity.
    pub author: Option<u64>,
    /// Publication date.
    pub date: Option<NaiveDateTime>,
}

impl CoreFields {
    /// Returns the string form of a field if it is set.
    #[must_use]
    pub fn value_string(&self, field: CoreField) -> Option<String> {
        match field {
            CoreField::Title => self.title.clone(),
            CoreField::Content => self.content.clone(),
            CoreField::Excerpt => self.excerpt.clone(),
            CoreField::Status => self.status.clone(),
            CoreField::Type => self.record_type.clone(),
            CoreField::Slug => self.slug.clone(),
            CoreField::Parent => self.parent.map(|p| p.to_string()),
            CoreField::MenuOrder => self.menu_order.map(|o| o.to_string()),
            CoreField::Author => self.author.map(|a| a.to_string()),
            CoreField::Date => self.date.map(|d| d.format(DATETIME_FORMAT).to_string()),
            CoreField::Modified => None,
        }
    }

    /// Returns the string form of a persisted field.
    ///
    /// Unset text fields read as empty, unset numeric references as `0`.
    #[must_use]
    pub fn field_string(&self, field: CoreField) -> String {
        self.value_string(field).unwrap_or_else(|| match field {
            CoreField::Parent | CoreField::MenuOrder | CoreField::Author => "0".to_string(),
            _ => String::new(),
        })
    }

    /// Overlays every field set in `other` onto `self`.
    pub fn merge(&mut self, other: &Self) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field.clone_from(&other.$field);
                })*
            };
        }
        overlay!(record_type, title, content, excerpt, status, slug, parent, menu_order, author, date);
    }

    /// Returns true when title, content and excerpt are all empty.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        [&self.title, &self.content, &self.excerpt]
            .iter()
            .all(|v| v.as_deref().is_none_or(|s| s.trim().is_empty()))
    }
}

/// A content record as held by a record store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Identity.
    pub id: Option<RecordId>,
    /// Core fields.
    pub core: CoreFields,
    /// Last modification timestamp.
    pub modified: Option<NaiveDateTime>,
    /// Taxonomy name to ordered term names.
    pub taxonomies: BTreeMap<String, Vec<String>>,
    /// Custom field values by name.
    pub custom_fields: BTreeMap<String, FieldValue>,
    /// Freeform meta values by key.
    pub meta: BTreeMap<String, String>,
    /// Featured media.
    pub featured_media: Option<MediaRef>,
}

impl ContentRecord {
    /// Creates a record of the given type with a title.
    #[must_use]
    pub fn new(record_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            core: CoreFields {
                record_type: Some(record_type.into()),
                title: Some(title.into()),
                ..CoreFields::default()
            },
            ..Self::default()
        }
    }

    /// Sets the identity.
    #[must_use]
    pub const fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.core.status = Some(status.into());
        self
    }

    /// Sets the body content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.core.content = Some(content.into());
        self
    }

    /// Sets the terms of one taxonomy.
    #[must_use]
    pub fn with_terms<I, S>(mut self, taxonomy: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.taxonomies
            .insert(taxonomy.into(), terms.into_iter().map(Into::into).collect());
        self
    }

    /// Sets a custom field value.
    #[must_use]
    pub fn with_custom_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.custom_fields.insert(name.into(), value);
        self
    }

    /// Sets a meta value.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Sets the featured media.
    #[must_use]
    pub fn with_featured_media(mut self, media: MediaRef) -> Self {
        self.featured_media = Some(media);
        self
    }

    /// Returns the record type, or an empty string when unset.
    #[must_use]
    pub fn record_type(&self) -> &str {
        self.core.record_type.as_deref().unwrap_or("")
    }
}

/// Converts a title or name into a URL slug.
///
/// Lowercases, maps every run of non-alphanumeric characters to a single
/// hyphen and strips leading/trailing hyphens.
#[must_use]
pub fn sanitize_slug(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_parse() {
        assert_eq!(RecordId::parse("42"), Some(RecordId::new(42)));
        assert_eq!(RecordId::parse(" 7 "), Some(RecordId::new(7)));
        assert_eq!(RecordId::parse(""), None);
        assert_eq!(RecordId::parse("0"), None);
        assert_eq!(RecordId::parse("new"), None);
    }

    #[test]
    fn test_core_field_columns_roundtrip() {
        for field in CoreField::all() {
            assert_eq!(CoreField::from_column(field.column_name()), Some(*field));
        }
        assert_eq!(CoreField::parse("title"), Some(CoreField::Title));
        assert_eq!(CoreField::parse("slug"), Some(CoreField::Slug));
        assert_eq!(CoreField::parse("nonsense"), None);
    }

    #[test]
    fn test_field_string_defaults() {
        let core = CoreFields::default();
        assert_eq!(core.field_string(CoreField::Title), "");
        assert_eq!(core.field_string(CoreField::Parent), "0");
        assert_eq!(core.field_string(CoreField::MenuOrder), "0");
    }

    #[test]
    fn test_merge_only_overlays_set_fields() {
        let mut stored = CoreFields {
            title: Some("Old".to_string()),
            status: Some("publish".to_string()),
            ..CoreFields::default()
        };
        let incoming = CoreFields {
            title: Some("New".to_string()),
            ..CoreFields::default()
        };
        stored.merge(&incoming);
        assert_eq!(stored.title.as_deref(), Some("New"));
        assert_eq!(stored.status.as_deref(), Some("publish"));
    }

    #[test]
    fn test_is_blank() {
        assert!(CoreFields::default().is_blank());
        let titled = CoreFields {
            title: Some("x".to_string()),
            ..CoreFields::default()
        };
        assert!(!titled.is_blank());
    }

    #[test]
    fn test_sanitize_slug() {
        assert_eq!(sanitize_slug("Hello World"), "hello-world");
        assert_eq!(sanitize_slug("  Rust & Go!! "), "rust-go");
        assert_eq!(sanitize_slug("already-a-slug"), "already-a-slug");
        assert_eq!(sanitize_slug("---"), "");
    }
}
