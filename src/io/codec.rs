//! Field codec: typed values to and from single CSV cells.
//!
//! | Kind | Cell form |
//! |------|-----------|
//! | text | as-is |
//! | number | integral values without a fraction |
//! | list | `a|b|c` |
//! | relationship | `12,40` |
//! | structured | compact JSON |
//! | media | identity or URL |
//! | boolean | `1` / `0` |
//! | date / datetime | `YYYY-MM-DD` / `YYYY-MM-DD HH:MM:SS` |
//!
//! Taxonomy cells are comma-separated term names. An empty taxonomy cell
//! clears the taxonomy; an empty cell of any other kind means the row does
//! not supply the field.
//!
//! Decoding never fails. Values that cannot be parsed come back as
//! [`DecodeResult::RawPassthrough`] and unresolvable media as
//! [`DecodeResult::Unset`].

use crate::models::{DATETIME_FORMAT, FieldKind, FieldValue, MediaRef};
use crate::storage::RecordStore;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

/// Separator of list values.
pub const LIST_SEPARATOR: char = '|';

/// Separator of taxonomy terms and relationship identities.
pub const TERM_SEPARATOR: char = ',';

/// Date format of date cells.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%m/%d/%Y", "%d.%m.%Y", "%B %d, %Y", "%b %d, %Y",
    "%d %B %Y",
];

const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Outcome of decoding one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeResult {
    /// The cell decoded into a typed value.
    Value(FieldValue),
    /// The cell could not be parsed for its kind and is kept verbatim.
    RawPassthrough(String),
    /// Nothing to set.
    Unset,
}

impl DecodeResult {
    /// Returns the value to store, if any.
    ///
    /// Passthrough strings are stored as text.
    #[must_use]
    pub fn into_value(self) -> Option<FieldValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::RawPassthrough(raw) => Some(FieldValue::Text(raw)),
            Self::Unset => None,
        }
    }

    /// Returns true for [`DecodeResult::RawPassthrough`].
    #[must_use]
    pub const fn is_passthrough(&self) -> bool {
        matches!(self, Self::RawPassthrough(_))
    }
}

/// Encodes a value into its canonical cell form.
#[must_use]
pub fn encode_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Number(n) => encode_number(*n),
        FieldValue::Bool(b) => String::from(if *b { "1" } else { "0" }),
        FieldValue::List(items) => items.join(&LIST_SEPARATOR.to_string()),
        FieldValue::Ids(ids) => join_ids(ids, ","),
        FieldValue::Structured(serde_json::Value::String(s)) => s.clone(),
        FieldValue::Structured(v) => v.to_string(),
        FieldValue::Media(media) => media.locator(),
        FieldValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        FieldValue::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
    }
}

/// Renders a value for change previews; lists read as `a, b`.
#[must_use]
pub fn display_value(value: &FieldValue) -> String {
    match value {
        FieldValue::List(items) => items.join(", "),
        FieldValue::Ids(ids) => join_ids(ids, ", "),
        other => encode_value(other),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn encode_number(n: f64) -> String {
    // i64 range check keeps the cast exact
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn join_ids(ids: &[u64], separator: &str) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Splits a taxonomy cell into trimmed, non-empty term names.
#[must_use]
pub fn split_terms(cell: &str) -> Vec<String> {
    cell.split(TERM_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Encodes term names into a taxonomy cell.
#[must_use]
pub fn encode_terms(names: &[String]) -> String {
    names.join(&TERM_SEPARATOR.to_string())
}

/// Renders term names for comparison and previews (`A, B`).
#[must_use]
pub fn display_terms(names: &[String]) -> String {
    names.join(", ")
}

/// Parses a boolean cell; `1`, `true`, `yes`, `on` and `y` are true.
#[must_use]
pub fn parse_bool(cell: &str) -> bool {
    matches!(
        cell.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "y"
    )
}

/// Parses a date in any of the accepted layouts.
#[must_use]
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(cell, layout).ok())
        .or_else(|| parse_datetime_only(cell).map(|dt| dt.date()))
}

/// Parses a date and time; a bare date reads as midnight.
#[must_use]
pub fn parse_datetime(cell: &str) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    parse_datetime_only(cell).or_else(|| {
        DATE_LAYOUTS
            .iter()
            .find_map(|layout| NaiveDate::parse_from_str(cell, layout).ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

fn parse_datetime_only(cell: &str) -> Option<NaiveDateTime> {
    DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(cell, layout).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(cell)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Returns true when a cell looks like an HTTP(S) URL.
#[must_use]
pub fn is_url(cell: &str) -> bool {
    let lower = cell.trim().to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Decodes cells against a record store.
///
/// The store is consulted only for media references.
pub struct FieldCodec<'a> {
    store: &'a dyn RecordStore,
    fetch_remote: bool,
}

impl<'a> FieldCodec<'a> {
    /// Creates a codec that may sideload remote media.
    #[must_use]
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self {
            store,
            fetch_remote: true,
        }
    }

    /// Enables or disables sideloading of unknown media URLs.
    #[must_use]
    pub const fn with_fetch_remote(mut self, fetch_remote: bool) -> Self {
        self.fetch_remote = fetch_remote;
        self
    }

    /// Decodes a cell of the given kind.
    #[must_use]
    pub fn decode(&self, kind: FieldKind, cell: &str) -> DecodeResult {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return DecodeResult::Unset;
        }
        let raw = || DecodeResult::RawPassthrough(trimmed.to_string());
        match kind {
            FieldKind::Text => DecodeResult::Value(FieldValue::text(trimmed)),
            FieldKind::Number => trimmed
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map_or_else(raw, |n| DecodeResult::Value(FieldValue::Number(n))),
            FieldKind::List => DecodeResult::Value(FieldValue::list(trimmed.split(LIST_SEPARATOR))),
            FieldKind::Relationship => trimmed
                .split(TERM_SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<u64>)
                .collect::<Result<Vec<_>, _>>()
                .map_or_else(|_| raw(), |ids| DecodeResult::Value(FieldValue::Ids(ids))),
            FieldKind::Structured => serde_json::from_str::<serde_json::Value>(trimmed)
                .map_or_else(|_| raw(), |v| DecodeResult::Value(FieldValue::Structured(v))),
            FieldKind::Media => self
                .resolve_media(trimmed)
                .map_or(DecodeResult::Unset, |m| DecodeResult::Value(FieldValue::Media(m))),
            FieldKind::Boolean => DecodeResult::Value(FieldValue::Bool(parse_bool(trimmed))),
            FieldKind::Date => {
                parse_date(trimmed).map_or_else(raw, |d| DecodeResult::Value(FieldValue::Date(d)))
            },
            FieldKind::DateTime => parse_datetime(trimmed)
                .map_or_else(raw, |dt| DecodeResult::Value(FieldValue::DateTime(dt))),
        }
    }

    /// Resolves a media locator.
    ///
    /// Tries, in order: an existing media identity, a previously imported
    /// URL, then a sideload of the URL. Returns `None` when nothing resolves.
    #[must_use]
    pub fn resolve_media(&self, locator: &str) -> Option<MediaRef> {
        let locator = locator.trim();
        if let Ok(id) = locator.parse::<u64>() {
            return self.store.media_by_id(id).unwrap_or_else(|e| {
                debug!(media_id = id, error = %e, "Media lookup failed");
                None
            });
        }
        if !is_url(locator) {
            debug!(locator, "Media locator is neither an identity nor a URL");
            return None;
        }
        match self.store.media_by_url(locator) {
            Ok(Some(media)) => return Some(media),
            Ok(None) => {},
            Err(e) => debug!(url = locator, error = %e, "Media URL lookup failed"),
        }
        if !self.fetch_remote {
            return None;
        }
        match self.store.sideload_media(locator) {
            Ok(media) => {
                metrics::counter!("media_sideloads_total", "status" => "success").increment(1);
                Some(media)
            },
            Err(e) => {
                metrics::counter!("media_sideloads_total", "status" => "error").increment(1);
                tracing::warn!(url = locator, error = %e, "Media sideload failed; leaving media unset");
                None
            },
        }
    }
}
