//! Change detection.
//!
//! Compares the fields a CSV row supplies against the stored record and
//! reports every difference. Comparison is on string forms: a stored number
//! `5` and an incoming `5.0` differ.

use crate::io::codec::{display_terms, display_value, encode_value, split_terms};
use crate::io::columns::{Column, FEATURED_MEDIA_COLUMN};
use crate::models::{
    ChangeSet, ContentRecord, CoreField, CoreFields, FieldChange, FieldKind, RecordId,
    display_or_placeholder,
};
use crate::storage::RecordStore;
use crate::{Error, Result};

/// A taxonomy cell of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyCell {
    /// Column header.
    pub header: String,
    /// Taxonomy name.
    pub taxonomy: String,
    /// Raw cell; empty clears the taxonomy.
    pub cell: String,
}

/// A non-empty custom field cell of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCell {
    /// Column header.
    pub header: String,
    /// Field name.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
    /// Trimmed cell.
    pub cell: String,
}

/// A non-empty meta cell of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaCell {
    /// Column header.
    pub header: String,
    /// Meta key.
    pub key: String,
    /// Trimmed cell.
    pub cell: String,
}

/// The fields one row supplies, prepared for comparison and writing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingRow {
    /// Core fields; `None` where the row supplies nothing.
    pub core: CoreFields,
    /// Taxonomy cells for registered taxonomies.
    pub taxonomies: Vec<TaxonomyCell>,
    /// Custom field cells.
    pub custom: Vec<CustomCell>,
    /// Meta cells.
    pub meta: Vec<MetaCell>,
    /// Featured media locator.
    pub featured_media: Option<String>,
}

/// Computes the [`ChangeSet`] of a row against a stored record.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    checked_fields: Vec<CoreField>,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(CoreField::default_checked().to_vec())
    }
}

impl ChangeDetector {
    /// Creates a detector comparing the given core fields.
    #[must_use]
    pub fn new(checked_fields: Vec<CoreField>) -> Self {
        Self { checked_fields }
    }

    /// Returns the compared core fields.
    #[must_use]
    pub fn checked_fields(&self) -> &[CoreField] {
        &self.checked_fields
    }

    /// Diffs `incoming` against the stored `current` record.
    ///
    /// Order of the result: core fields, taxonomies, custom fields, meta,
    /// featured media.
    ///
    /// # Errors
    ///
    /// Returns an error if the current record has no identity or a store
    /// read fails.
    pub fn detect(
        &self,
        store: &dyn RecordStore,
        current: &ContentRecord,
        incoming: &IncomingRow,
    ) -> Result<ChangeSet> {
        let id = current
            .id
            .ok_or_else(|| Error::InvalidInput("stored record has no identity".to_string()))?;
        let mut changes = ChangeSet::new();

        self.detect_core(&current.core, &incoming.core, &mut changes);
        detect_taxonomies(store, id, &incoming.taxonomies, &mut changes)?;
        detect_custom(store, id, &incoming.custom, &mut changes)?;
        detect_meta(store, id, &incoming.meta, &mut changes)?;
        if let Some(locator) = &incoming.featured_media {
            detect_media(store, id, locator, &mut changes)?;
        }

        Ok(changes)
    }

    fn detect_core(&self, current: &CoreFields, incoming: &CoreFields, changes: &mut ChangeSet) {
        for field in &self.checked_fields {
            let Some(new) = incoming.value_string(*field) else {
                continue;
            };
            let old = current.field_string(*field);
            if old != new {
                changes.push(FieldChange::new(
                    field.column_name(),
                    field.label(),
                    display_or_placeholder(&old),
                    display_or_placeholder(&new),
                ));
            }
        }
    }
}

fn detect_taxonomies(
    store: &dyn RecordStore,
    id: RecordId,
    cells: &[TaxonomyCell],
    changes: &mut ChangeSet,
) -> Result<()> {
    for cell in cells {
        let old = display_terms(&store.taxonomy_terms(id, &cell.taxonomy)?);
        let new = display_terms(&split_terms(&cell.cell));
        if old != new {
            changes.push(FieldChange::new(
                &cell.header,
                Column::Taxonomy(cell.taxonomy.clone()).label(),
                display_or_placeholder(&old),
                display_or_placeholder(&new),
            ));
        }
    }
    Ok(())
}

fn detect_custom(
    store: &dyn RecordStore,
    id: RecordId,
    cells: &[CustomCell],
    changes: &mut ChangeSet,
) -> Result<()> {
    for cell in cells {
        let current = store.custom_field(id, &cell.name)?;
        let old = current
            .as_ref()
            .map(|v| encode_value(v).trim().to_string())
            .unwrap_or_default();
        if old != cell.cell {
            let old_display = current.as_ref().map(display_value).unwrap_or_default();
            changes.push(FieldChange::new(
                &cell.header,
                Column::Custom {
                    name: cell.name.clone(),
                    kind: cell.kind,
                }
                .label(),
                display_or_placeholder(&old_display),
                &cell.cell,
            ));
        }
    }
    Ok(())
}

fn detect_meta(
    store: &dyn RecordStore,
    id: RecordId,
    cells: &[MetaCell],
    changes: &mut ChangeSet,
) -> Result<()> {
    for cell in cells {
        let old = store.meta(id, &cell.key)?.unwrap_or_default();
        if old.trim() != cell.cell {
            changes.push(FieldChange::new(
                &cell.header,
                Column::Meta(cell.key.clone()).label(),
                display_or_placeholder(&old),
                &cell.cell,
            ));
        }
    }
    Ok(())
}

fn detect_media(
    store: &dyn RecordStore,
    id: RecordId,
    locator: &str,
    changes: &mut ChangeSet,
) -> Result<()> {
    let current = store.featured_media(id)?;
    let differs = match locator.parse::<u64>() {
        Ok(media_id) => current.as_ref().map(|m| m.id) != Some(media_id),
        Err(_) => current.as_ref().and_then(|m| m.url.as_deref()) != Some(locator),
    };
    if differs {
        let old = current.map(|m| m.locator()).unwrap_or_default();
        changes.push(FieldChange::new(
            FEATURED_MEDIA_COLUMN,
            Column::FeaturedMedia.label(),
            display_or_placeholder(&old),
            locator,
        ));
    }
    Ok(())
}
