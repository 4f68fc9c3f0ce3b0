//! Column classification.
//!
//! Header names are resolved once per run into a [`Column`] so rows never
//! re-inspect prefixes.

use crate::models::{CoreField, FieldKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column holding the record identity.
pub const ID_COLUMN: &str = "ID";

/// Column holding the featured media locator.
pub const FEATURED_MEDIA_COLUMN: &str = "featured_image";

/// Column name prefixes for dynamic fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnPrefixes {
    /// Prefix of taxonomy columns.
    pub taxonomy: String,
    /// Prefix of custom field columns.
    pub custom: String,
    /// Prefix of meta columns.
    pub meta: String,
}

impl Default for ColumnPrefixes {
    fn default() -> Self {
        Self {
            taxonomy: "tax_".to_string(),
            custom: "acf_".to_string(),
            meta: "meta_".to_string(),
        }
    }
}

impl ColumnPrefixes {
    /// Returns the column name for a taxonomy.
    #[must_use]
    pub fn taxonomy_column(&self, taxonomy: &str) -> String {
        format!("{}{taxonomy}", self.taxonomy)
    }

    /// Returns the column name for a custom field.
    #[must_use]
    pub fn custom_column(&self, name: &str) -> String {
        format!("{}{name}", self.custom)
    }

    /// Returns the column name for a meta key.
    #[must_use]
    pub fn meta_column(&self, key: &str) -> String {
        format!("{}{key}", self.meta)
    }
}

/// What a CSV column carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// Record identity.
    Id,
    /// A fixed core field.
    Core(CoreField),
    /// Featured media locator.
    FeaturedMedia,
    /// Terms of a taxonomy.
    Taxonomy(String),
    /// A custom field and its kind.
    Custom {
        /// Field name.
        name: String,
        /// Field kind.
        kind: FieldKind,
    },
    /// A freeform meta key.
    Meta(String),
    /// Not recognized; ignored on import.
    Ignored(String),
}

impl Column {
    /// Classifies a header name.
    ///
    /// `kind_of` supplies the kind of custom fields; unknown fields are text.
    pub fn classify(
        header: &str,
        prefixes: &ColumnPrefixes,
        kind_of: impl Fn(&str) -> Option<FieldKind>,
    ) -> Self {
        if header == ID_COLUMN {
            return Self::Id;
        }
        if header == FEATURED_MEDIA_COLUMN {
            return Self::FeaturedMedia;
        }
        if let Some(field) = CoreField::from_column(header) {
            return Self::Core(field);
        }
        let prefixed = |prefix: &str| {
            header
                .strip_prefix(prefix)
                .filter(|rest| !prefix.is_empty() && !rest.is_empty())
                .map(ToString::to_string)
        };
        if let Some(taxonomy) = prefixed(&prefixes.taxonomy) {
            return Self::Taxonomy(taxonomy);
        }
        if let Some(name) = prefixed(&prefixes.custom) {
            let kind = kind_of(&name).unwrap_or_default();
            return Self::Custom { name, kind };
        }
        if let Some(key) = prefixed(&prefixes.meta) {
            return Self::Meta(key);
        }
        Self::Ignored(header.to_string())
    }

    /// Returns a human label for change previews.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Id => "ID".to_string(),
            Self::Core(field) => field.label().to_string(),
            Self::FeaturedMedia => "Featured image".to_string(),
            Self::Taxonomy(name) => format!("Taxonomy: {name}"),
            Self::Custom { name, .. } => format!("Field: {name}"),
            Self::Meta(key) => format!("Meta: {key}"),
            Self::Ignored(name) => name.clone(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => write!(f, "identity"),
            Self::Core(field) => write!(f, "core field {}", field.column_name()),
            Self::FeaturedMedia => write!(f, "featured media"),
            Self::Taxonomy(name) => write!(f, "taxonomy {name}"),
            Self::Custom { name, kind } => write!(f, "custom field {name} ({})", kind.as_str()),
            Self::Meta(key) => write!(f, "meta {key}"),
            Self::Ignored(_) => write!(f, "ignored"),
        }
    }
}

/// The resolved columns of one import run, in header order.
#[derive(Debug, Clone, Default)]
pub struct ColumnSchema {
    columns: Vec<(String, Column)>,
}

impl ColumnSchema {
    /// Resolves every header.
    pub fn resolve(
        headers: &[String],
        prefixes: &ColumnPrefixes,
        kind_of: impl Fn(&str) -> Option<FieldKind>,
    ) -> Self {
        Self {
            columns: headers
                .iter()
                .map(|h| (h.clone(), Column::classify(h, prefixes, &kind_of)))
                .collect(),
        }
    }

    /// Iterates `(header, column)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(h, c)| (h.as_str(), c))
    }

    /// Returns true when any column matches the predicate.
    pub fn any(&self, predicate: impl Fn(&Column) -> bool) -> bool {
        self.columns.iter().any(|(_, c)| predicate(c))
    }

    /// Returns true when the header carries the identity column.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.any(|c| matches!(c, Column::Id))
    }

    /// Returns true when the header carries a core field.
    #[must_use]
    pub fn has_core(&self, field: CoreField) -> bool {
        self.any(|c| *c == Column::Core(field))
    }

    /// Returns the header of a core field column, if present.
    #[must_use]
    pub fn core_header(&self, field: CoreField) -> Option<&str> {
        self.iter()
            .find(|(_, c)| **c == Column::Core(field))
            .map(|(h, _)| h)
    }

    /// Returns the ignored header names.
    #[must_use]
    pub fn ignored(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, c)| matches!(c, Column::Ignored(_)))
            .map(|(h, _)| h)
            .collect()
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true when there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Common spreadsheet header aliases and the column they stand for.
const MAPPING_ALIASES: &[(&[&str], &str)] = &[
    (&["title", "name", "heading", "headline"], "post_title"),
    (&["content", "body", "description", "text"], "post_content"),
    (&["excerpt", "summary", "teaser"], "post_excerpt"),
    (&["status", "state"], "post_status"),
    (&["type", "content_type", "post type"], "post_type"),
    (&["date", "published", "publish_date", "published_at"], "post_date"),
    (&["id", "post_id", "identifier"], ID_COLUMN),
    (&["slug", "permalink", "url_slug"], "post_name"),
    (&["author", "author_email", "author_login"], "post_author"),
    (&["parent", "parent_id"], "post_parent"),
    (&["order", "menu order", "sort_order"], "menu_order"),
    (&["image", "featured image", "thumbnail"], FEATURED_MEDIA_COLUMN),
];

/// Suggests renames from common header aliases to import columns.
///
/// Headers that already name a known column, and targets already present in
/// the header, are left alone.
#[must_use]
pub fn suggest_field_mapping(headers: &[String]) -> BTreeMap<String, String> {
    let mut suggestions = BTreeMap::new();
    for header in headers {
        let normalized = header.trim().to_lowercase();
        for (aliases, target) in MAPPING_ALIASES {
            if aliases.contains(&normalized.as_str())
                && header != target
                && !headers.iter().any(|h| h == target)
                && !suggestions.values().any(|t: &String| t == target)
            {
                suggestions.insert(header.clone(), (*target).to_string());
                break;
            }
        }
    }
    suggestions
}

/// Parses a `from=to` mapping argument.
///
/// Returns `None` if either side is empty.
#[must_use]
pub fn parse_mapping_pair(s: &str) -> Option<(String, String)> {
    let (from, to) = s.split_once('=')?;
    let (from, to) = (from.trim(), to.trim());
    (!from.is_empty() && !to.is_empty()).then(|| (from.to_string(), to.to_string()))
}
