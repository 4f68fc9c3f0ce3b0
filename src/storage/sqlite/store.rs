//! `SQLite`-based record store.
//!
//! Durable storage for content records, taxonomy terms, custom fields, meta
//! values and media. Writes run inside `BEGIN IMMEDIATE` transactions so a
//! row's core write either lands completely or not at all.

use super::media::{FetchedMedia, MediaFetcher};
use super::record_row::{
    build_core_from_row, fetch_record_row, format_timestamp, from_sql_id, load_record, to_sql_id,
};
use super::{acquire_lock, configure_connection, observe, with_transaction};
use crate::models::{
    ContentRecord, CoreFields, FieldKind, FieldValue, MediaRef, RecordId, sanitize_slug,
};
use crate::storage::traits::{EMPTY_RECORD_MESSAGE, RecordStore};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS record_types (
        name TEXT PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS media (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT,
        sha256 TEXT,
        file_path TEXT,
        mime_type TEXT,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        record_type TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        excerpt TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'draft',
        slug TEXT NOT NULL DEFAULT '',
        parent INTEGER NOT NULL DEFAULT 0,
        menu_order INTEGER NOT NULL DEFAULT 0,
        author INTEGER NOT NULL DEFAULT 0,
        date TEXT,
        modified TEXT,
        featured_media INTEGER REFERENCES media(id) ON DELETE SET NULL
    );
    CREATE TABLE IF NOT EXISTS taxonomies (
        name TEXT PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS taxonomy_types (
        taxonomy TEXT NOT NULL REFERENCES taxonomies(name) ON DELETE CASCADE,
        record_type TEXT NOT NULL,
        PRIMARY KEY (taxonomy, record_type)
    );
    CREATE TABLE IF NOT EXISTS terms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        taxonomy TEXT NOT NULL REFERENCES taxonomies(name) ON DELETE CASCADE,
        name TEXT NOT NULL,
        slug TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS record_terms (
        record_id INTEGER NOT NULL REFERENCES records(id) ON DELETE CASCADE,
        term_id INTEGER NOT NULL REFERENCES terms(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (record_id, term_id)
    );
    CREATE TABLE IF NOT EXISTS field_kinds (
        name TEXT PRIMARY KEY,
        kind TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS custom_fields (
        record_id INTEGER NOT NULL REFERENCES records(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (record_id, name)
    );
    CREATE TABLE IF NOT EXISTS record_meta (
        record_id INTEGER NOT NULL REFERENCES records(id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (record_id, key)
    );
    CREATE TABLE IF NOT EXISTS authors (
        id INTEGER PRIMARY KEY,
        login TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL
    );
";

fn sql_failed(operation: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

/// `SQLite`-based record store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. Two import runs against
/// the same database serialize on `SQLite`'s write lock (`busy_timeout` 5s)
/// and resolve overlapping identities as last-write-wins.
///
/// # Schema
///
/// - `records`: core columns, one row per record
/// - `taxonomies`, `taxonomy_types`, `terms`, `record_terms`: term associations
/// - `custom_fields`: tagged JSON [`FieldValue`]s, `field_kinds`: declared kinds
/// - `record_meta`, `media`, `authors`, `record_types`
pub struct SqliteRecordStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
    /// HTTP fetcher for sideloaded media.
    fetcher: MediaFetcher,
}

impl SqliteRecordStore {
    /// Opens or creates a store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_store_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        let conn = Connection::open(&db_path).map_err(sql_failed("open_sqlite"))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
            fetcher: MediaFetcher::default(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_failed("open_sqlite_in_memory"))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
            fetcher: MediaFetcher::default(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Replaces the media fetcher.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: MediaFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;
        conn.execute_batch(SCHEMA)
            .map_err(sql_failed("create_schema"))?;
        Self::create_indexes(&conn);
        Ok(())
    }

    fn create_indexes(conn: &Connection) {
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_type_status ON records(record_type, status)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_terms_taxonomy_name ON terms(taxonomy, name COLLATE NOCASE)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_terms_taxonomy_slug ON terms(taxonomy, slug)",
            [],
        );
        let _ = conn.execute("CREATE INDEX IF NOT EXISTS idx_media_url ON media(url)", []);
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_media_sha256 ON media(sha256)",
            [],
        );
    }

    fn run<T>(&self, operation: &'static str, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            f(&conn)
        };
        observe(BACKEND, operation, start, &result);
        result
    }

    /// Registers a record type.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn register_type(&self, record_type: &str) -> Result<()> {
        self.run("register_type", |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO record_types (name) VALUES (?1)",
                params![record_type],
            )
            .map_err(sql_failed("register_type"))?;
            Ok(())
        })
    }

    /// Registers a taxonomy for the given record types.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn register_taxonomy(&self, taxonomy: &str, record_types: &[&str]) -> Result<()> {
        self.run("register_taxonomy", |conn| {
            with_transaction(conn, || {
                conn.execute(
                    "INSERT OR IGNORE INTO taxonomies (name) VALUES (?1)",
                    params![taxonomy],
                )
                .map_err(sql_failed("register_taxonomy"))?;
                for record_type in record_types {
                    conn.execute(
                        "INSERT OR IGNORE INTO taxonomy_types (taxonomy, record_type) VALUES (?1, ?2)",
                        params![taxonomy, record_type],
                    )
                    .map_err(sql_failed("register_taxonomy_type"))?;
                }
                Ok(())
            })
        })
    }

    /// Declares the kind of a custom field.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn register_field(&self, name: &str, kind: FieldKind) -> Result<()> {
        self.run("register_field", |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO field_kinds (name, kind) VALUES (?1, ?2)",
                params![name, kind.as_str()],
            )
            .map_err(sql_failed("register_field"))?;
            Ok(())
        })
    }

    /// Registers an author.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn register_author(&self, id: u64, login: &str, email: &str) -> Result<()> {
        self.run("register_author", |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO authors (id, login, email) VALUES (?1, ?2, ?3)",
                params![to_sql_id(id), login, email],
            )
            .map_err(sql_failed("register_author"))?;
            Ok(())
        })
    }

    fn type_registered(conn: &Connection, record_type: &str) -> Result<bool> {
        conn.query_row(
            "SELECT 1 FROM record_types WHERE name = ?1",
            params![record_type],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(sql_failed("type_exists"))
    }

    fn find_term(conn: &Connection, taxonomy: &str, name: &str) -> Result<Option<(i64, String)>> {
        let by_name = conn
            .query_row(
                "SELECT id, name FROM terms WHERE taxonomy = ?1 AND name = ?2 COLLATE NOCASE \
                 ORDER BY id LIMIT 1",
                params![taxonomy, name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(sql_failed("find_term_by_name"))?;
        if by_name.is_some() {
            return Ok(by_name);
        }

        let slug = sanitize_slug(name);
        if slug.is_empty() {
            return Ok(None);
        }
        conn.query_row(
            "SELECT id, name FROM terms WHERE taxonomy = ?1 AND slug = ?2 ORDER BY id LIMIT 1",
            params![taxonomy, slug],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(sql_failed("find_term_by_slug"))
    }

    fn write_core(conn: &Connection, id: RecordId, core: &CoreFields) -> Result<()> {
        conn.execute(
            "UPDATE records SET record_type = ?2, title = ?3, content = ?4, excerpt = ?5, \
             status = ?6, slug = ?7, parent = ?8, menu_order = ?9, author = ?10, date = ?11, \
             modified = ?12 WHERE id = ?1",
            params![
                to_sql_id(id.get()),
                core.record_type.as_deref().unwrap_or_default(),
                core.title.as_deref().unwrap_or_default(),
                core.content.as_deref().unwrap_or_default(),
                core.excerpt.as_deref().unwrap_or_default(),
                core.status.as_deref().unwrap_or("draft"),
                core.slug.as_deref().unwrap_or_default(),
                to_sql_id(core.parent.unwrap_or(0)),
                core.menu_order.unwrap_or(0),
                to_sql_id(core.author.unwrap_or(0)),
                format_timestamp(core.date),
                format_timestamp(Some(chrono::Local::now().naive_local())),
            ],
        )
        .map_err(sql_failed("write_core"))?;
        Ok(())
    }

    fn require_record(conn: &Connection, id: RecordId) -> Result<()> {
        let found = conn
            .query_row(
                "SELECT 1 FROM records WHERE id = ?1",
                params![to_sql_id(id.get())],
                |_| Ok(()),
            )
            .optional()
            .map_err(sql_failed("require_record"))?;
        found.ok_or_else(|| Error::NotFound(format!("record {id}")))
    }

    fn media_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaRef> {
        let id: i64 = row.get(0)?;
        Ok(MediaRef::new(from_sql_id(id), row.get(1)?))
    }

    /// Records downloaded media under `url`.
    ///
    /// Content already stored under another URL gets an alias row sharing its
    /// hash and file, so `media_by_url(url)` resolves on the next import.
    fn record_media(
        &self,
        url: &str,
        fetched: &FetchedMedia,
        file_path: Option<&Path>,
    ) -> Result<MediaRef> {
        self.run("sideload_media", |conn| {
            let same_url = conn
                .query_row(
                    "SELECT id, url FROM media WHERE url = ?1 ORDER BY id LIMIT 1",
                    params![url],
                    Self::media_row,
                )
                .optional()
                .map_err(sql_failed("media_by_url"))?;
            if let Some(media) = same_url {
                return Ok(media);
            }

            let shared_file = conn
                .query_row(
                    "SELECT id, file_path FROM media WHERE sha256 = ?1 ORDER BY id LIMIT 1",
                    params![fetched.sha256],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
                )
                .optional()
                .map_err(sql_failed("media_by_hash"))?;
            let file_path = match shared_file {
                Some((original, stored_path)) => {
                    tracing::debug!(
                        media.original = from_sql_id(original),
                        "Aliasing media with identical content"
                    );
                    stored_path.or_else(|| file_path.map(|p| p.to_string_lossy().into_owned()))
                },
                None => file_path.map(|p| p.to_string_lossy().into_owned()),
            };

            conn.execute(
                "INSERT INTO media (url, sha256, file_path, mime_type, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    url,
                    fetched.sha256,
                    file_path,
                    fetched.mime_type,
                    format_timestamp(Some(chrono::Local::now().naive_local())),
                ],
            )
            .map_err(sql_failed("insert_media"))?;
            Ok(MediaRef::new(
                from_sql_id(conn.last_insert_rowid()),
                Some(url.to_string()),
            ))
        })
    }
}

impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self), fields(operation = "resolve", backend = BACKEND, record.id = %id))]
    fn resolve(&self, id: RecordId) -> Result<Option<ContentRecord>> {
        self.run("resolve", |conn| load_record(conn, id))
    }

    #[instrument(skip(self, core), fields(operation = "create", backend = BACKEND))]
    fn create(&self, core: &CoreFields) -> Result<RecordId> {
        self.run("create", |conn| {
            let record_type = core.record_type.as_deref().unwrap_or_default();
            if !Self::type_registered(conn, record_type)? {
                return Err(Error::Rejected("Invalid post type.".to_string()));
            }
            if core.is_blank() {
                return Err(Error::Rejected(EMPTY_RECORD_MESSAGE.to_string()));
            }

            with_transaction(conn, || {
                let now = chrono::Local::now().naive_local();
                let mut stored = core.clone();
                if stored.slug.as_deref().is_none_or(str::is_empty) {
                    stored.slug = stored.title.as_deref().map(sanitize_slug);
                }
                stored.date = stored.date.or(Some(now));

                conn.execute(
                    "INSERT INTO records (record_type, title) VALUES (?1, '')",
                    params![record_type],
                )
                .map_err(sql_failed("insert_record"))?;
                let id = RecordId::new(from_sql_id(conn.last_insert_rowid()));
                Self::write_core(conn, id, &stored)?;
                Ok(id)
            })
        })
    }

    #[instrument(skip(self, core), fields(operation = "update", backend = BACKEND, record.id = %id))]
    fn update(&self, id: RecordId, core: &CoreFields) -> Result<()> {
        self.run("update", |conn| {
            let row = fetch_record_row(conn, id)?
                .ok_or_else(|| Error::NotFound(format!("record {id}")))?;
            let mut merged = build_core_from_row(&row);
            merged.merge(core);
            if merged.is_blank() {
                return Err(Error::Rejected(EMPTY_RECORD_MESSAGE.to_string()));
            }
            with_transaction(conn, || Self::write_core(conn, id, &merged))
        })
    }

    fn type_exists(&self, record_type: &str) -> Result<bool> {
        self.run("type_exists", |conn| Self::type_registered(conn, record_type))
    }

    fn taxonomy_exists(&self, taxonomy: &str) -> Result<bool> {
        self.run("taxonomy_exists", |conn| {
            conn.query_row(
                "SELECT 1 FROM taxonomies WHERE name = ?1",
                params![taxonomy],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(sql_failed("taxonomy_exists"))
        })
    }

    fn taxonomy_terms(&self, id: RecordId, taxonomy: &str) -> Result<Vec<String>> {
        self.run("taxonomy_terms", |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT t.name FROM record_terms rt JOIN terms t ON t.id = rt.term_id \
                     WHERE rt.record_id = ?1 AND t.taxonomy = ?2 ORDER BY rt.position",
                )
                .map_err(sql_failed("prepare_taxonomy_terms"))?;
            let names = stmt
                .query_map(params![to_sql_id(id.get()), taxonomy], |row| row.get(0))
                .map_err(sql_failed("taxonomy_terms"))?
                .collect::<rusqlite::Result<Vec<String>>>()
                .map_err(sql_failed("taxonomy_terms"))?;
            Ok(names)
        })
    }

    #[instrument(skip(self, names), fields(operation = "set_taxonomy_terms", backend = BACKEND, record.id = %id))]
    fn set_taxonomy_terms(
        &self,
        id: RecordId,
        taxonomy: &str,
        names: &[String],
        create_missing: bool,
    ) -> Result<Vec<String>> {
        let current = self.taxonomy_terms(id, taxonomy)?;
        self.run("set_taxonomy_terms", |conn| {
            Self::require_record(conn, id)?;
            with_transaction(conn, || {
                let mut resolved: Vec<(i64, String)> = Vec::with_capacity(names.len());
                for name in names {
                    let term = match Self::find_term(conn, taxonomy, name)? {
                        Some(term) => Some(term),
                        None if create_missing => {
                            conn.execute(
                                "INSERT INTO terms (taxonomy, name, slug) VALUES (?1, ?2, ?3)",
                                params![taxonomy, name, sanitize_slug(name)],
                            )
                            .map_err(sql_failed("insert_term"))?;
                            Some((conn.last_insert_rowid(), name.clone()))
                        },
                        None => None,
                    };
                    if let Some(term) = term
                        && !resolved.iter().any(|(term_id, _)| *term_id == term.0)
                    {
                        resolved.push(term);
                    }
                }

                if !names.is_empty() && resolved.is_empty() {
                    return Ok(current.clone());
                }

                conn.execute(
                    "DELETE FROM record_terms WHERE record_id = ?1 AND term_id IN \
                     (SELECT id FROM terms WHERE taxonomy = ?2)",
                    params![to_sql_id(id.get()), taxonomy],
                )
                .map_err(sql_failed("clear_record_terms"))?;
                for (position, (term_id, _)) in resolved.iter().enumerate() {
                    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
                    let position = position as i64;
                    conn.execute(
                        "INSERT INTO record_terms (record_id, term_id, position) VALUES (?1, ?2, ?3)",
                        params![to_sql_id(id.get()), term_id, position],
                    )
                    .map_err(sql_failed("insert_record_term"))?;
                }
                Ok(resolved.into_iter().map(|(_, name)| name).collect())
            })
        })
    }

    fn custom_field(&self, id: RecordId, name: &str) -> Result<Option<FieldValue>> {
        self.run("custom_field", |conn| {
            let json: Option<String> = conn
                .query_row(
                    "SELECT value FROM custom_fields WHERE record_id = ?1 AND name = ?2",
                    params![to_sql_id(id.get()), name],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_failed("custom_field"))?;
            Ok(json.as_deref().map(super::record_row::decode_field_value))
        })
    }

    fn set_custom_field(&self, id: RecordId, name: &str, value: &FieldValue) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|e| Error::OperationFailed {
            operation: "serialize_custom_field".to_string(),
            cause: e.to_string(),
        })?;
        self.run("set_custom_field", |conn| {
            Self::require_record(conn, id)?;
            conn.execute(
                "INSERT OR REPLACE INTO custom_fields (record_id, name, value) VALUES (?1, ?2, ?3)",
                params![to_sql_id(id.get()), name, json],
            )
            .map_err(sql_failed("set_custom_field"))?;
            Ok(())
        })
    }

    fn custom_field_kind(&self, name: &str) -> Option<FieldKind> {
        self.run("custom_field_kind", |conn| {
            conn.query_row(
                "SELECT kind FROM field_kinds WHERE name = ?1",
                params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(sql_failed("custom_field_kind"))
        })
        .ok()
        .flatten()
        .and_then(|kind| FieldKind::parse(&kind))
    }

    fn meta(&self, id: RecordId, key: &str) -> Result<Option<String>> {
        self.run("meta", |conn| {
            conn.query_row(
                "SELECT value FROM record_meta WHERE record_id = ?1 AND key = ?2",
                params![to_sql_id(id.get()), key],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_failed("meta"))
        })
    }

    fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<()> {
        self.run("set_meta", |conn| {
            Self::require_record(conn, id)?;
            conn.execute(
                "INSERT OR REPLACE INTO record_meta (record_id, key, value) VALUES (?1, ?2, ?3)",
                params![to_sql_id(id.get()), key, value],
            )
            .map_err(sql_failed("set_meta"))?;
            Ok(())
        })
    }

    fn featured_media(&self, id: RecordId) -> Result<Option<MediaRef>> {
        self.run("featured_media", |conn| {
            conn.query_row(
                "SELECT m.id, m.url FROM records r JOIN media m ON m.id = r.featured_media \
                 WHERE r.id = ?1",
                params![to_sql_id(id.get())],
                Self::media_row,
            )
            .optional()
            .map_err(sql_failed("featured_media"))
        })
    }

    fn set_featured_media(&self, id: RecordId, media: &MediaRef) -> Result<()> {
        self.run("set_featured_media", |conn| {
            let updated = conn
                .execute(
                    "UPDATE records SET featured_media = ?2 WHERE id = ?1",
                    params![to_sql_id(id.get()), to_sql_id(media.id)],
                )
                .map_err(sql_failed("set_featured_media"))?;
            if updated == 0 {
                return Err(Error::NotFound(format!("record {id}")));
            }
            Ok(())
        })
    }

    fn media_by_id(&self, media_id: u64) -> Result<Option<MediaRef>> {
        self.run("media_by_id", |conn| {
            conn.query_row(
                "SELECT id, url FROM media WHERE id = ?1",
                params![to_sql_id(media_id)],
                Self::media_row,
            )
            .optional()
            .map_err(sql_failed("media_by_id"))
        })
    }

    fn media_by_url(&self, url: &str) -> Result<Option<MediaRef>> {
        self.run("media_by_url", |conn| {
            conn.query_row(
                "SELECT id, url FROM media WHERE url = ?1 ORDER BY id LIMIT 1",
                params![url],
                Self::media_row,
            )
            .optional()
            .map_err(sql_failed("media_by_url"))
        })
    }

    #[instrument(skip(self), fields(operation = "sideload_media", backend = BACKEND))]
    fn sideload_media(&self, url: &str) -> Result<MediaRef> {
        // Download outside the connection lock.
        let fetched = self.fetcher.fetch(url)?;
        let file_path = self.fetcher.persist(&fetched)?;
        self.record_media(url, &fetched, file_path.as_deref())
    }

    fn find_author(&self, login_or_email: &str) -> Result<Option<u64>> {
        let needle = login_or_email.trim();
        self.run("find_author", |conn| {
            conn.query_row(
                "SELECT id FROM authors WHERE login = ?1 OR email = ?1 COLLATE NOCASE LIMIT 1",
                params![needle],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|id| id.map(from_sql_id))
            .map_err(sql_failed("find_author"))
        })
    }

    #[instrument(skip(self, statuses), fields(operation = "list_records", backend = BACKEND))]
    fn list_records(&self, record_type: &str, statuses: &[String]) -> Result<Vec<ContentRecord>> {
        self.run("list_records", |conn| {
            let mut stmt = conn
                .prepare("SELECT id, status FROM records WHERE record_type = ?1 ORDER BY id")
                .map_err(sql_failed("prepare_list_records"))?;
            let rows = stmt
                .query_map(params![record_type], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(sql_failed("list_records"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(sql_failed("list_records"))?;

            let mut records = Vec::with_capacity(rows.len());
            for (id, status) in rows {
                if !statuses.is_empty() && !statuses.contains(&status) {
                    continue;
                }
                if let Some(record) = load_record(conn, RecordId::new(from_sql_id(id)))? {
                    records.push(record);
                }
            }
            Ok(records)
        })
    }

    fn taxonomies_for_type(&self, record_type: &str) -> Result<Vec<String>> {
        self.run("taxonomies_for_type", |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT taxonomy FROM taxonomy_types WHERE record_type = ?1 ORDER BY taxonomy",
                )
                .map_err(sql_failed("prepare_taxonomies_for_type"))?;
            let names = stmt
                .query_map(params![record_type], |row| row.get(0))
                .map_err(sql_failed("taxonomies_for_type"))?
                .collect::<rusqlite::Result<Vec<String>>>()
                .map_err(sql_failed("taxonomies_for_type"))?;
            Ok(names)
        })
    }

    fn custom_field_names(&self, record_type: &str) -> Result<Vec<String>> {
        self.run("custom_field_names", |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT DISTINCT cf.name FROM custom_fields cf JOIN records r ON r.id = cf.record_id \
                     WHERE r.record_type = ?1 ORDER BY cf.name",
                )
                .map_err(sql_failed("prepare_custom_field_names"))?;
            let names = stmt
                .query_map(params![record_type], |row| row.get(0))
                .map_err(sql_failed("custom_field_names"))?
                .collect::<rusqlite::Result<Vec<String>>>()
                .map_err(sql_failed("custom_field_names"))?;
            Ok(names)
        })
    }
}
