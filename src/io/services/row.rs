//! Single-row import.
//!
//! Turns one CSV row into exactly one outcome: created, updated, skipped or
//! a [`RowFailure`]. Updates are diffed before anything is written, and only
//! the changed fields are written back.

use super::changes::{ChangeDetector, CustomCell, IncomingRow, MetaCell, TaxonomyCell};
use super::import::ImportOptions;
use crate::Error;
use crate::io::codec::{FieldCodec, parse_datetime, split_terms};
use crate::io::columns::{Column, ColumnSchema};
use crate::io::csv::CsvRow;
use crate::models::{ChangeSet, ContentRecord, CoreField, CoreFields, RecordId, sanitize_slug};
use crate::storage::RecordStore;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Title given to created records whose row has none.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Outcome of a successfully processed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// A new record was created.
    Created,
    /// An existing record was changed.
    Updated,
    /// The row matched the stored record; nothing was written.
    Skipped,
}

impl RowOutcome {
    /// Returns the outcome name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Report of a successfully processed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReport {
    /// Identity of the record; `None` for a dry-run create.
    pub id: Option<RecordId>,
    /// Outcome.
    pub outcome: RowOutcome,
    /// Field changes of an update.
    pub changes: ChangeSet,
}

/// Why a row failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowFailure {
    /// Neither a title nor an identity.
    #[error("missing required data: row needs a post_title or an ID")]
    MissingData,

    /// No type from the options, the row or the existing record.
    #[error("missing post type: set a post_type column or a default type")]
    MissingType,

    /// The type is not registered.
    #[error("invalid post type \"{0}\"")]
    UnknownType(String),

    /// The store rejected a write; the store's message verbatim.
    #[error("{0}")]
    Rejected(String),

    /// Any other failure.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl From<Error> for RowFailure {
    fn from(err: Error) -> Self {
        match err {
            Error::Rejected(message) => Self::Rejected(message),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

/// Imports rows of one run against a record store.
pub struct RowImporter<'a> {
    store: &'a dyn RecordStore,
    schema: &'a ColumnSchema,
    options: &'a ImportOptions,
    detector: ChangeDetector,
    known_taxonomies: BTreeSet<String>,
}

impl<'a> RowImporter<'a> {
    /// Creates an importer for a resolved header.
    ///
    /// Taxonomy columns whose taxonomy is not registered are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub fn new(
        store: &'a dyn RecordStore,
        schema: &'a ColumnSchema,
        options: &'a ImportOptions,
    ) -> crate::Result<Self> {
        let mut known_taxonomies = BTreeSet::new();
        for (_, column) in schema.iter() {
            if let Column::Taxonomy(taxonomy) = column
                && store.taxonomy_exists(taxonomy)?
            {
                known_taxonomies.insert(taxonomy.clone());
            }
        }
        Ok(Self {
            store,
            schema,
            options,
            detector: ChangeDetector::new(options.checked_fields.clone()),
            known_taxonomies,
        })
    }

    /// Returns the taxonomy columns that name unregistered taxonomies.
    #[must_use]
    pub fn unknown_taxonomies(&self) -> Vec<&str> {
        self.schema
            .iter()
            .filter_map(|(_, column)| match column {
                Column::Taxonomy(t) if !self.known_taxonomies.contains(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns the identity a row asks for, if any.
    #[must_use]
    pub fn row_identity(&self, row: &CsvRow) -> Option<RecordId> {
        self.header_of(|c| matches!(c, Column::Id))
            .and_then(|h| row.get(h))
            .and_then(RecordId::parse)
    }

    /// Returns the title a row supplies, if any.
    #[must_use]
    pub fn row_title<'r>(&self, row: &'r CsvRow) -> Option<&'r str> {
        self.schema
            .core_header(CoreField::Title)
            .and_then(|h| row.non_empty(h))
    }

    fn header_of(&self, predicate: impl Fn(&Column) -> bool) -> Option<&'a str> {
        self.schema
            .iter()
            .find(|(_, c)| predicate(c))
            .map(|(h, _)| h)
    }

    /// Imports one row.
    ///
    /// # Errors
    ///
    /// Returns a [`RowFailure`] describing why the row was not applied.
    pub fn import(&self, row: &CsvRow) -> Result<RowReport, RowFailure> {
        let id = self.row_identity(row);
        if id.is_none() && self.row_title(row).is_none() {
            return Err(RowFailure::MissingData);
        }

        let existing = match id {
            Some(id) if self.options.update_existing => self.store.resolve(id)?,
            _ => None,
        };

        let mut incoming = self.prepare(row)?;
        let record_type = self.resolve_type(&incoming.core, existing.as_ref())?;

        match existing {
            Some(current) => self.update(&current, &incoming),
            None => {
                incoming.core.record_type = Some(record_type);
                self.create(incoming)
            },
        }
    }

    fn resolve_type(
        &self,
        core: &CoreFields,
        existing: Option<&ContentRecord>,
    ) -> Result<String, RowFailure> {
        let record_type = self
            .options
            .default_type
            .clone()
            .or_else(|| core.record_type.clone())
            .or_else(|| {
                existing
                    .map(|r| r.record_type().to_string())
                    .filter(|t| !t.is_empty())
            })
            .ok_or(RowFailure::MissingType)?;
        if self.store.type_exists(&record_type)? {
            Ok(record_type)
        } else {
            Err(RowFailure::UnknownType(record_type))
        }
    }

    /// Builds the comparable and writable form of a row.
    fn prepare(&self, row: &CsvRow) -> Result<IncomingRow, RowFailure> {
        let mut incoming = IncomingRow::default();
        let mut seen = BTreeSet::new();

        for (header, column) in self.schema.iter() {
            if !seen.insert(header) {
                continue;
            }
            let Some(cell) = row.get(header) else {
                continue;
            };
            let trimmed = cell.trim();
            match column {
                Column::Core(field) => {
                    if !trimmed.is_empty() {
                        self.prepare_core(&mut incoming.core, *field, cell)?;
                    }
                },
                Column::Taxonomy(taxonomy) if self.known_taxonomies.contains(taxonomy) => {
                    incoming.taxonomies.push(TaxonomyCell {
                        header: header.to_string(),
                        taxonomy: taxonomy.clone(),
                        cell: cell.to_string(),
                    });
                },
                Column::Custom { name, kind } if !trimmed.is_empty() => {
                    incoming.custom.push(CustomCell {
                        header: header.to_string(),
                        name: name.clone(),
                        kind: *kind,
                        cell: trimmed.to_string(),
                    });
                },
                Column::Meta(key) if !trimmed.is_empty() => {
                    incoming.meta.push(MetaCell {
                        header: header.to_string(),
                        key: key.clone(),
                        cell: trimmed.to_string(),
                    });
                },
                Column::FeaturedMedia if !trimmed.is_empty() => {
                    incoming.featured_media = Some(trimmed.to_string());
                },
                _ => {},
            }
        }
        Ok(incoming)
    }

    fn prepare_core(
        &self,
        core: &mut CoreFields,
        field: CoreField,
        cell: &str,
    ) -> Result<(), RowFailure> {
        let trimmed = cell.trim();
        match field {
            CoreField::Title => core.title = Some(cell.to_string()),
            CoreField::Content => core.content = Some(cell.to_string()),
            CoreField::Excerpt => core.excerpt = Some(cell.to_string()),
            CoreField::Status => core.status = Some(trimmed.to_lowercase()),
            CoreField::Type => core.record_type = Some(trimmed.to_string()),
            CoreField::Slug => core.slug = Some(sanitize_slug(trimmed)).filter(|s| !s.is_empty()),
            CoreField::Parent => core.parent = parse_lenient(trimmed, "post_parent"),
            CoreField::MenuOrder => core.menu_order = parse_lenient(trimmed, "menu_order"),
            CoreField::Date => {
                core.date = parse_datetime(trimmed);
                if core.date.is_none() {
                    debug!(value = trimmed, "Ignoring unparseable post_date");
                }
            },
            CoreField::Author => core.author = self.resolve_author(trimmed)?,
            CoreField::Modified => {},
        }
        Ok(())
    }

    fn resolve_author(&self, cell: &str) -> Result<Option<u64>, RowFailure> {
        if let Ok(id) = cell.parse::<u64>() {
            return Ok(Some(id));
        }
        let author = self.store.find_author(cell)?;
        if author.is_none() {
            debug!(author = cell, "Unknown author; leaving post_author unset");
        }
        Ok(author)
    }

    fn create(&self, mut incoming: IncomingRow) -> Result<RowReport, RowFailure> {
        let core = &mut incoming.core;
        if core.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
            core.title = Some(DEFAULT_TITLE.to_string());
        }
        if core.status.is_none() {
            core.status = Some(self.options.default_status.clone());
        }
        if core.author.is_none() {
            core.author = self.options.default_author;
        }

        if self.options.dry_run {
            return Ok(RowReport {
                id: None,
                outcome: RowOutcome::Created,
                changes: ChangeSet::new(),
            });
        }

        let id = self.store.create(&incoming.core)?;
        self.write_associations(id, &incoming, None)?;
        Ok(RowReport {
            id: Some(id),
            outcome: RowOutcome::Created,
            changes: ChangeSet::new(),
        })
    }

    fn update(
        &self,
        current: &ContentRecord,
        incoming: &IncomingRow,
    ) -> Result<RowReport, RowFailure> {
        let id = current
            .id
            .ok_or_else(|| RowFailure::Unexpected("stored record has no identity".to_string()))?;
        let changes = self.detector.detect(self.store, current, incoming)?;
        if changes.is_empty() {
            return Ok(RowReport {
                id: Some(id),
                outcome: RowOutcome::Skipped,
                changes,
            });
        }

        if !self.options.dry_run {
            let core = changed_core(&incoming.core, &changes);
            if core != CoreFields::default() {
                self.store.update(id, &core)?;
            }
            self.write_associations(id, incoming, Some(&changes))?;
        }

        Ok(RowReport {
            id: Some(id),
            outcome: RowOutcome::Updated,
            changes,
        })
    }

    /// Writes media, taxonomies, custom fields and meta, in that order.
    ///
    /// With `changes`, only fields listed there are written.
    fn write_associations(
        &self,
        id: RecordId,
        incoming: &IncomingRow,
        changes: Option<&ChangeSet>,
    ) -> Result<(), RowFailure> {
        let wanted = |field: &str| changes.is_none_or(|c| c.get(field).is_some());
        let codec = FieldCodec::new(self.store);

        if let Some(locator) = &incoming.featured_media
            && wanted(crate::io::columns::FEATURED_MEDIA_COLUMN)
        {
            match codec.resolve_media(locator) {
                Some(media) => self.store.set_featured_media(id, &media)?,
                None => debug!(record_id = %id, locator, "Featured media not resolved"),
            }
        }

        for cell in &incoming.taxonomies {
            let names = split_terms(&cell.cell);
            // Clearing a new record is a no-op
            if !wanted(&cell.header) || (changes.is_none() && names.is_empty()) {
                continue;
            }
            let assigned = self.store.set_taxonomy_terms(
                id,
                &cell.taxonomy,
                &names,
                self.options.create_taxonomies,
            )?;
            if assigned.len() < names.len() {
                debug!(
                    record_id = %id,
                    taxonomy = %cell.taxonomy,
                    requested = names.len(),
                    assigned = assigned.len(),
                    "Some terms were not assigned"
                );
            }
        }

        for cell in &incoming.custom {
            if !wanted(&cell.header) {
                continue;
            }
            let decoded = codec.decode(cell.kind, &cell.cell);
            if decoded.is_passthrough() {
                debug!(field = %cell.name, kind = cell.kind.as_str(), "Storing unparseable value verbatim");
            }
            if let Some(value) = decoded.into_value() {
                self.store.set_custom_field(id, &cell.name, &value)?;
            }
        }

        for cell in &incoming.meta {
            if wanted(&cell.header) {
                self.store.set_meta(id, &cell.key, &cell.cell)?;
            }
        }
        Ok(())
    }
}

/// Keeps only the core fields listed in `changes`.
fn changed_core(incoming: &CoreFields, changes: &ChangeSet) -> CoreFields {
    let changed = |field: CoreField| changes.get(field.column_name()).is_some();
    let pick = |field: CoreField, value: &Option<String>| value.clone().filter(|_| changed(field));
    CoreFields {
        record_type: None,
        title: pick(CoreField::Title, &incoming.title),
        content: pick(CoreField::Content, &incoming.content),
        excerpt: pick(CoreField::Excerpt, &incoming.excerpt),
        status: pick(CoreField::Status, &incoming.status),
        slug: pick(CoreField::Slug, &incoming.slug),
        parent: incoming.parent.filter(|_| changed(CoreField::Parent)),
        menu_order: incoming.menu_order.filter(|_| changed(CoreField::MenuOrder)),
        author: incoming.author.filter(|_| changed(CoreField::Author)),
        date: incoming.date.filter(|_| changed(CoreField::Date)),
    }
}

fn parse_lenient<T: std::str::FromStr>(cell: &str, column: &str) -> Option<T> {
    let parsed = cell
        .parse::<T>()
        .ok()
        .or_else(|| cell.split('.').next().and_then(|int| int.parse::<T>().ok()));
    if parsed.is_none() {
        debug!(column, value = cell, "Ignoring non-numeric value");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::columns::ColumnPrefixes;
    use crate::models::FieldKind;
    use crate::storage::InMemoryRecordStore;

    fn schema(headers: &[&str], store: &InMemoryRecordStore) -> ColumnSchema {
        let headers: Vec<String> = headers.iter().map(ToString::to_string).collect();
        ColumnSchema::resolve(&headers, &ColumnPrefixes::default(), |name| {
            store.custom_field_kind(name)
        })
    }

    fn row(pairs: &[(&str, &str)]) -> CsvRow {
        CsvRow::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_missing_title_and_identity_fails() {
        let store = InMemoryRecordStore::with_defaults();
        let schema = schema(&["post_title", "post_content"], &store);
        let options = ImportOptions::default();
        let importer = RowImporter::new(&store, &schema, &options).unwrap();

        let failure = importer
            .import(&row(&[("post_title", " "), ("post_content", "body")]))
            .unwrap_err();
        assert_eq!(failure, RowFailure::MissingData);
        assert!(failure.to_string().contains("missing required data"));
        assert_eq!(store.mutation_count(), 0);
    }

    #[test]
    fn test_create_applies_defaults() {
        let store = InMemoryRecordStore::with_defaults();
        let schema = schema(&["post_title", "post_type"], &store);
        let options = ImportOptions::default();
        let importer = RowImporter::new(&store, &schema, &options).unwrap();

        let report = importer
            .import(&row(&[("post_title", "Hello"), ("post_type", "post")]))
            .unwrap();
        assert_eq!(report.outcome, RowOutcome::Created);
        let record = store.resolve(report.id.unwrap()).unwrap().unwrap();
        assert_eq!(record.core.status.as_deref(), Some("draft"));
        assert_eq!(record.record_type(), "post");
    }

    #[test]
    fn test_unknown_type_fails() {
        let store = InMemoryRecordStore::with_defaults();
        let schema = schema(&["post_title", "post_type"], &store);
        let options = ImportOptions::default();
        let importer = RowImporter::new(&store, &schema, &options).unwrap();

        let failure = importer
            .import(&row(&[("post_title", "Hello"), ("post_type", "nonexistent")]))
            .unwrap_err();
        assert!(failure.to_string().contains("type"));
        assert!(matches!(failure, RowFailure::UnknownType(_)));
    }

    #[test]
    fn test_missing_type_on_create_fails() {
        let store = InMemoryRecordStore::with_defaults();
        let schema = schema(&["post_title"], &store);
        let options = ImportOptions::default();
        let importer = RowImporter::new(&store, &schema, &options).unwrap();

        let failure = importer.import(&row(&[("post_title", "Hello")])).unwrap_err();
        assert_eq!(failure, RowFailure::MissingType);
    }

    #[test]
    fn test_default_type_overrides_row() {
        let store = InMemoryRecordStore::with_defaults();
        let schema = schema(&["post_title", "post_type"], &store);
        let options = ImportOptions {
            default_type: Some("page".to_string()),
            ..ImportOptions::default()
        };
        let importer = RowImporter::new(&store, &schema, &options).unwrap();

        let report = importer
            .import(&row(&[("post_title", "About"), ("post_type", "post")]))
            .unwrap();
        let record = store.resolve(report.id.unwrap()).unwrap().unwrap();
        assert_eq!(record.record_type(), "page");
    }

    #[test]
    fn test_update_writes_only_changed_fields() {
        let store = InMemoryRecordStore::with_defaults();
        let id = store
            .insert(
                ContentRecord::new("post", "Hello")
                    .with_id(RecordId::new(42))
                    .with_terms("category", ["News"]),
            )
            .unwrap();
        let schema = schema(&["ID", "post_title", "tax_category"], &store);
        let options = ImportOptions::default();
        let importer = RowImporter::new(&store, &schema, &options).unwrap();

        let report = importer
            .import(&row(&[
                ("ID", "42"),
                ("post_title", "Hello"),
                ("tax_category", "News, Updates"),
            ]))
            .unwrap();
        assert_eq!(report.outcome, RowOutcome::Updated);
        assert_eq!(report.changes.fields(), vec!["tax_category"]);
        assert_eq!(store.mutation_count(), 1);

        let record = store.resolve(id).unwrap().unwrap();
        assert_eq!(record.core.title.as_deref(), Some("Hello"));
        assert_eq!(record.taxonomies["category"], vec!["News", "Updates"]);
    }

    #[test]
    fn test_unchanged_row_is_skipped() {
        let store = InMemoryRecordStore::with_defaults();
        store.register_field("rating", FieldKind::Number);
        let id = store
            .insert(
                ContentRecord::new("post", "Hello")
                    .with_custom_field("rating", crate::models::FieldValue::Number(4.0)),
            )
            .unwrap();
        let schema = schema(&["ID", "post_title", "acf_rating"], &store);
        let options = ImportOptions::default();
        let importer = RowImporter::new(&store, &schema, &options).unwrap();

        let report = importer
            .import(&row(&[
                ("ID", &id.to_string()),
                ("post_title", "Hello"),
                ("acf_rating", "4"),
            ]))
            .unwrap();
        assert_eq!(report.outcome, RowOutcome::Skipped);
        assert_eq!(store.mutation_count(), 0);
    }

    #[test]
    fn test_identity_without_update_creates() {
        let store = InMemoryRecordStore::with_defaults();
        let id = store.insert(ContentRecord::new("post", "Hello")).unwrap();
        let schema = schema(&["ID", "post_title", "post_type"], &store);
        let options = ImportOptions {
            update_existing: false,
            ..ImportOptions::default()
        };
        let importer = RowImporter::new(&store, &schema, &options).unwrap();

        let report = importer
            .import(&row(&[
                ("ID", &id.to_string()),
                ("post_title", "Hello"),
                ("post_type", "post"),
            ]))
            .unwrap();
        assert_eq!(report.outcome, RowOutcome::Created);
        assert_ne!(report.id, Some(id));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let store = InMemoryRecordStore::with_defaults();
        let id = store.insert(ContentRecord::new("post", "Hello")).unwrap();
        let schema = schema(&["ID", "post_title", "post_type", "featured_image"], &store);
        let options = ImportOptions {
            dry_run: true,
            ..ImportOptions::default()
        };
        let importer = RowImporter::new(&store, &schema, &options).unwrap();

        let updated = importer
            .import(&row(&[
                ("ID", &id.to_string()),
                ("post_title", "Changed"),
                ("post_type", ""),
                ("featured_image", "https://cdn.example.com/a.png"),
            ]))
            .unwrap();
        assert_eq!(updated.outcome, RowOutcome::Updated);
        assert_eq!(updated.changes.len(), 2);

        let created = importer
            .import(&row(&[
                ("ID", ""),
                ("post_title", "New"),
                ("post_type", "post"),
                ("featured_image", ""),
            ]))
            .unwrap();
        assert_eq!(created.outcome, RowOutcome::Created);
        assert_eq!(created.id, None);
        assert_eq!(store.mutation_count(), 0);
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn test_store_rejection_passes_through() {
        let failure = RowFailure::from(Error::Rejected("Content, title, and excerpt are empty.".to_string()));
        assert_eq!(failure.to_string(), "Content, title, and excerpt are empty.");

        let unexpected = RowFailure::from(Error::OperationFailed {
            operation: "update".to_string(),
            cause: "disk full".to_string(),
        });
        assert!(unexpected.to_string().starts_with("unexpected failure:"));
    }

    #[test]
    fn test_unregistered_taxonomy_is_ignored() {
        let store = InMemoryRecordStore::with_defaults();
        let schema = schema(&["post_title", "post_type", "tax_genre"], &store);
        let options = ImportOptions::default();
        let importer = RowImporter::new(&store, &schema, &options).unwrap();
        assert_eq!(importer.unknown_taxonomies(), vec!["genre"]);

        let report = importer
            .import(&row(&[
                ("post_title", "Hello"),
                ("post_type", "post"),
                ("tax_genre", "Jazz"),
            ]))
            .unwrap();
        let record = store.resolve(report.id.unwrap()).unwrap().unwrap();
        assert!(record.taxonomies.is_empty());
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(parse_lenient::<u64>("12", "post_parent"), Some(12));
        assert_eq!(parse_lenient::<i64>("3.0", "menu_order"), Some(3));
        assert_eq!(parse_lenient::<u64>("abc", "post_parent"), None);
    }
}
