//! Row conversion utilities for `SQLite` record storage.
//!
//! Provides the `RecordRow` struct and the functions that load a full
//! [`ContentRecord`] (core columns plus associations) from the database.

use crate::models::{
    ContentRecord, CoreFields, DATETIME_FORMAT, FieldValue, MediaRef, RecordId,
};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Column list matching [`RecordRow::from_row`].
pub const RECORD_COLUMNS: &str = "r.id, r.record_type, r.title, r.content, r.excerpt, r.status, \
     r.slug, r.parent, r.menu_order, r.author, r.date, r.modified, r.featured_media, m.url";

/// Internal representation of a `records` row.
#[derive(Debug)]
pub struct RecordRow {
    /// Record identity.
    pub id: i64,
    /// Record type tag.
    pub record_type: String,
    /// Title.
    pub title: String,
    /// Body content.
    pub content: String,
    /// Excerpt.
    pub excerpt: String,
    /// Status.
    pub status: String,
    /// Slug.
    pub slug: String,
    /// Parent record (0 when detached).
    pub parent: i64,
    /// Ordering key.
    pub menu_order: i64,
    /// Author identity.
    pub author: i64,
    /// Publication date (`YYYY-MM-DD HH:MM:SS`).
    pub date: Option<String>,
    /// Last modification (`YYYY-MM-DD HH:MM:SS`).
    pub modified: Option<String>,
    /// Featured media identity.
    pub featured_media: Option<i64>,
    /// Featured media URL.
    pub featured_media_url: Option<String>,
}

impl RecordRow {
    /// Reads a row selected with [`RECORD_COLUMNS`].
    ///
    /// # Errors
    ///
    /// Returns the underlying `rusqlite` error when a column has the wrong type.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            record_type: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            excerpt: row.get(4)?,
            status: row.get(5)?,
            slug: row.get(6)?,
            parent: row.get(7)?,
            menu_order: row.get(8)?,
            author: row.get(9)?,
            date: row.get(10)?,
            modified: row.get(11)?,
            featured_media: row.get(12)?,
            featured_media_url: row.get(13)?,
        })
    }
}

/// Converts a `u64` identity for binding.
#[allow(clippy::cast_possible_wrap)]
pub const fn to_sql_id(id: u64) -> i64 {
    id as i64
}

/// Converts a stored identity back to `u64`.
#[allow(clippy::cast_sign_loss)]
pub const fn from_sql_id(id: i64) -> u64 {
    if id < 0 { 0 } else { id as u64 }
}

fn parse_timestamp(value: Option<&str>) -> Option<NaiveDateTime> {
    value.and_then(|s| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok())
}

/// Formats a timestamp for storage.
#[must_use]
pub fn format_timestamp(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(|d| d.format(DATETIME_FORMAT).to_string())
}

/// Builds the core fields of a record row.
#[must_use]
pub fn build_core_from_row(row: &RecordRow) -> CoreFields {
    CoreFields {
        record_type: Some(row.record_type.clone()),
        title: Some(row.title.clone()),
        content: Some(row.content.clone()),
        excerpt: Some(row.excerpt.clone()),
        status: Some(row.status.clone()),
        slug: Some(row.slug.clone()),
        parent: Some(from_sql_id(row.parent)),
        menu_order: Some(row.menu_order),
        author: Some(from_sql_id(row.author)),
        date: parse_timestamp(row.date.as_deref()),
    }
}

fn query_failed(operation: &str) -> impl Fn(rusqlite::Error) -> Error + '_ {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

/// Fetches a record row by identity.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the query fails.
pub fn fetch_record_row(conn: &Connection, id: RecordId) -> Result<Option<RecordRow>> {
    conn.query_row(
        &format!(
            "SELECT {RECORD_COLUMNS} FROM records r LEFT JOIN media m ON m.id = r.featured_media \
             WHERE r.id = ?1"
        ),
        params![to_sql_id(id.get())],
        RecordRow::from_row,
    )
    .optional()
    .map_err(query_failed("fetch_record_row"))
}

/// Loads a complete record: core columns, terms, custom fields, meta and media.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if any query fails.
pub fn load_record(conn: &Connection, id: RecordId) -> Result<Option<ContentRecord>> {
    let Some(row) = fetch_record_row(conn, id)? else {
        return Ok(None);
    };

    let mut record = ContentRecord {
        id: Some(id),
        core: build_core_from_row(&row),
        modified: parse_timestamp(row.modified.as_deref()),
        featured_media: row
            .featured_media
            .map(|m| MediaRef::new(from_sql_id(m), row.featured_media_url.clone())),
        ..ContentRecord::default()
    };

    let mut stmt = conn
        .prepare_cached(
            "SELECT t.taxonomy, t.name FROM record_terms rt JOIN terms t ON t.id = rt.term_id \
             WHERE rt.record_id = ?1 ORDER BY t.taxonomy, rt.position",
        )
        .map_err(query_failed("prepare_record_terms"))?;
    let terms = stmt
        .query_map(params![row.id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })
        .map_err(query_failed("record_terms"))?;
    for term in terms {
        let (taxonomy, name) = term.map_err(query_failed("record_terms"))?;
        record.taxonomies.entry(taxonomy).or_default().push(name);
    }

    let mut stmt = conn
        .prepare_cached("SELECT name, value FROM custom_fields WHERE record_id = ?1")
        .map_err(query_failed("prepare_custom_fields"))?;
    let fields = stmt
        .query_map(params![row.id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })
        .map_err(query_failed("custom_fields"))?;
    for field in fields {
        let (name, json) = field.map_err(query_failed("custom_fields"))?;
        record.custom_fields.insert(name, decode_field_value(&json));
    }

    let mut stmt = conn
        .prepare_cached("SELECT key, value FROM record_meta WHERE record_id = ?1")
        .map_err(query_failed("prepare_record_meta"))?;
    let meta = stmt
        .query_map(params![row.id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })
        .map_err(query_failed("record_meta"))?;
    for entry in meta {
        let (key, value) = entry.map_err(query_failed("record_meta"))?;
        record.meta.insert(key, value);
    }

    Ok(Some(record))
}

/// Decodes a stored custom field value.
///
/// Values written by other tools may be bare text rather than tagged JSON;
/// those load as [`FieldValue::Text`].
#[must_use]
pub fn decode_field_value(json: &str) -> FieldValue {
    serde_json::from_str(json).unwrap_or_else(|_| FieldValue::Text(json.to_string()))
}
