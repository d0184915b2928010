// Event store: JSONL source of truth with a SQLite query cache

use crate::filter::Filter;
use crate::jsonl;
use crate::models::{Event, now_ms};
use crate::record::{IndexValue, Record};
use eyre::{Context, Result, eyre};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CURRENT_VERSION: u32 = 1;
const STORE_DIR: &str = ".famcal";
const DB_FILE: &str = "famcal.db";

/// Operations the application needs from wherever events live.
///
/// `Err` means the operation failed outright; `Ok(false)` means it ran but
/// did not succeed, and callers must not change local state.
pub trait EventStore {
    fn fetch_events(&self) -> Result<Vec<Event>>;

    fn save_event(&mut self, event: Event) -> Result<bool>;

    /// All-or-nothing: either every event is stored or none is
    fn save_bulk_events(&mut self, events: Vec<Event>) -> Result<bool>;

    /// `Ok(true)` only when a stored event was actually removed
    fn delete_event(&mut self, id: &str) -> Result<bool>;
}

/// Persistent store with SQLite cache and JSONL source of truth
pub struct Store {
    base_path: PathBuf,
    db: Connection,
}

impl Store {
    /// Open or create a store at the given path
    ///
    /// The store will be created in a `.famcal` subdirectory of the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(STORE_DIR);

        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let db_path = base_path.join(DB_FILE);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let mut store = Self {
            base_path: base_path.clone(),
            db,
        };

        store.create_schema()?;
        store.create_gitignore()?;
        store.write_version()?;

        if store.is_stale()? {
            info!("Database is stale, syncing from JSONL files");
            store.sync()?;
            store.rebuild_indexes::<Event>()?;
        }

        Ok(store)
    }

    /// Get the base path of this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);

            CREATE TABLE IF NOT EXISTS record_indexes (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                field_name TEXT NOT NULL,
                field_value_str TEXT,
                field_value_int INTEGER,
                field_value_bool INTEGER,
                PRIMARY KEY (collection, id, field_name),
                FOREIGN KEY (collection, id) REFERENCES records(collection, id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_str ON record_indexes(collection, field_name, field_value_str);
            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_int ON record_indexes(collection, field_name, field_value_int);
            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_bool ON record_indexes(collection, field_name, field_value_bool);

            CREATE TABLE IF NOT EXISTS sync_metadata (
                collection TEXT PRIMARY KEY,
                last_sync_time INTEGER NOT NULL,
                file_mtime INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    fn create_gitignore(&self) -> Result<()> {
        let gitignore_path = self.base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, format!("{0}\n{0}-shm\n{0}-wal\n", DB_FILE))?;
        }
        Ok(())
    }

    fn write_version(&self) -> Result<()> {
        let version_path = self.base_path.join(".version");
        if !version_path.exists() {
            fs::write(version_path, CURRENT_VERSION.to_string())?;
        }
        Ok(())
    }

    /// Check if database needs syncing from JSONL
    ///
    /// Returns true if any JSONL file has been modified since the last sync,
    /// or if there are JSONL files that have never been synced.
    pub fn is_stale(&self) -> Result<bool> {
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();

            let Some(collection) = jsonl_collection(&path) else {
                continue;
            };

            let file_mtime = file_mtime(&path)?;
            let stored_mtime: Option<i64> = self
                .db
                .query_row(
                    "SELECT file_mtime FROM sync_metadata WHERE collection = ?1",
                    [collection],
                    |row| row.get(0),
                )
                .optional()?;

            match stored_mtime {
                None => return Ok(true),                              // Never synced
                Some(mtime) if file_mtime > mtime => return Ok(true), // File modified
                _ => continue,
            }
        }

        Ok(false)
    }

    // ========================================================================
    // Generic record API
    // ========================================================================

    /// Create or replace a record
    pub fn create<T: Record>(&mut self, record: T) -> Result<String> {
        let mut ids = self.create_many(vec![record])?;
        ids.pop().ok_or_else(|| eyre!("No record id returned"))
    }

    /// Create or replace several records as one unit
    ///
    /// Every record is validated before anything is written; the JSONL lines
    /// go out under a single lock and the SQLite rows in one transaction.
    pub fn create_many<T: Record>(&mut self, records: Vec<T>) -> Result<Vec<String>> {
        let collection = T::collection_name();
        Self::validate_collection_name(collection)?;
        for record in &records {
            Self::validate_id(record.id())?;
            for field_name in record.indexed_fields().keys() {
                Self::validate_field_name(field_name)?;
            }
        }

        if records.is_empty() {
            return Ok(Vec::new());
        }

        // 1. Append to JSONL
        jsonl::append_jsonl(&self.jsonl_path(collection), &records)?;

        // 2. Mirror into SQLite
        let tx = self.db.transaction()?;
        let mut ids = Vec::with_capacity(records.len());
        for record in &records {
            let id = record.id().to_string();
            let data_json = serde_json::to_string(record).context("Failed to serialize record")?;

            tx.execute(
                "INSERT OR REPLACE INTO records (collection, id, data_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![collection, &id, data_json, record.updated_at()],
            )?;
            Self::update_indexes_tx(&tx, collection, &id, &record.indexed_fields())?;
            ids.push(id);
        }
        tx.commit()?;

        debug!(collection, count = ids.len(), "Stored records");
        Ok(ids)
    }

    /// Delete a record, returning whether it existed
    pub fn delete<T: Record>(&mut self, id: &str) -> Result<bool> {
        let collection = T::collection_name();

        let exists: Option<i64> = self
            .db
            .query_row(
                "SELECT 1 FROM records WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(false);
        }

        // 1. Append tombstone to JSONL
        let tombstone = serde_json::json!({
            "id": id,
            "deleted": true,
            "updatedAt": now_ms(),
        });
        jsonl::append_jsonl(&self.jsonl_path(collection), &[tombstone])?;

        // 2. Delete from SQLite
        let tx = self.db.transaction()?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection, id],
        )?;
        tx.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection, id],
        )?;
        tx.commit()?;

        Ok(true)
    }

    /// List records matching every filter
    ///
    /// Rows that don't deserialize to `T` are skipped with a warning, the same
    /// way `rebuild_indexes` treats them.
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>> {
        let collection = T::collection_name();

        let mut query = String::from("SELECT r.id, r.data_json FROM records r WHERE r.collection = ?1");

        // Bind parameters: collection, then a field name and value per filter
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        params.push(Box::new(collection.to_string()));

        for (i, filter) in filters.iter().enumerate() {
            Self::validate_field_name(&filter.field)?;

            let alias = format!("idx{}", i);
            let field_param = params.len() + 1;
            let value_param = params.len() + 2;
            query.push_str(&format!(
                " AND EXISTS (
                    SELECT 1 FROM record_indexes {alias}
                    WHERE {alias}.collection = r.collection
                      AND {alias}.id = r.id
                      AND {alias}.field_name = ?{field_param}
                      AND {alias}.{column} = ?{value_param})",
                column = filter.value.column(),
            ));

            params.push(Box::new(filter.field.clone()));
            match &filter.value {
                IndexValue::String(s) => params.push(Box::new(s.clone())),
                IndexValue::Int(i) => params.push(Box::new(*i)),
                IndexValue::Bool(b) => params.push(Box::new(*b as i64)),
            }
        }

        query.push_str(" ORDER BY r.updated_at DESC");

        let mut stmt = self.db.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut results = Vec::new();
        for row_result in rows {
            let (id, data_json) = row_result?;
            match serde_json::from_str::<T>(&data_json) {
                Ok(record) => results.push(record),
                Err(e) => warn!(
                    collection = collection,
                    id = &id,
                    error = ?e,
                    "Skipping record that doesn't match type"
                ),
            }
        }

        Ok(results)
    }

    // ========================================================================
    // Event queries
    // ========================================================================

    /// Events dated exactly `date` (ISO `YYYY-MM-DD`), via the date index
    pub fn events_on_date(&self, date: &str) -> Result<Vec<Event>> {
        self.list(&[Filter::eq("date", date)])
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn jsonl_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    fn update_indexes_tx(
        tx: &rusqlite::Transaction,
        collection: &str,
        id: &str,
        fields: &HashMap<String, IndexValue>,
    ) -> Result<()> {
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection, id],
        )?;

        for (field_name, value) in fields {
            let sql = format!(
                "INSERT INTO record_indexes (collection, id, field_name, {}) VALUES (?1, ?2, ?3, ?4)",
                value.column()
            );
            match value {
                IndexValue::String(s) => tx.execute(&sql, rusqlite::params![collection, id, field_name, s])?,
                IndexValue::Int(i) => tx.execute(&sql, rusqlite::params![collection, id, field_name, i])?,
                IndexValue::Bool(b) => tx.execute(&sql, rusqlite::params![collection, id, field_name, *b as i64])?,
            };
        }

        Ok(())
    }

    fn validate_collection_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(eyre!("Collection name cannot be empty"));
        }
        if name.len() > 64 {
            return Err(eyre!("Collection name too long: {} (max 64 chars)", name));
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(eyre!(
                "Invalid collection name: {} (must be alphanumeric with _/-)",
                name
            ));
        }
        Ok(())
    }

    fn validate_field_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(eyre!("Field name cannot be empty"));
        }
        if name.len() > 64 {
            return Err(eyre!("Field name too long: {} (max 64 chars)", name));
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(eyre!("Invalid field name: {} (must be alphanumeric with _)", name));
        }
        Ok(())
    }

    fn validate_id(id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(eyre!("Record ID cannot be empty or whitespace-only"));
        }
        if id.len() > 256 {
            return Err(eyre!("Record ID too long: {} chars (max 256)", id.len()));
        }
        Ok(())
    }

    // ========================================================================
    // Sync operations
    // ========================================================================

    /// Rebuild the SQLite cache from JSONL files
    ///
    /// Indexes are not restored here; call `rebuild_indexes::<T>()` afterwards.
    pub fn sync(&mut self) -> Result<()> {
        info!("Syncing database from JSONL files");

        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM record_indexes", [])?;
        tx.execute("DELETE FROM records", [])?;
        tx.execute("DELETE FROM sync_metadata", [])?;

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();

            let Some(collection) = jsonl_collection(&path) else {
                continue;
            };

            debug!(collection, "Syncing collection");

            let file_mtime = file_mtime(&path)?;
            let records = jsonl::read_jsonl_latest(&path)?;

            for (id, record) in records {
                if jsonl::is_tombstone(&record) {
                    continue;
                }

                let data_json = serde_json::to_string(&record)?;
                tx.execute(
                    "INSERT OR REPLACE INTO records (collection, id, data_json, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![collection, &id, data_json, jsonl::updated_at(&record)],
                )?;
            }

            tx.execute(
                "INSERT OR REPLACE INTO sync_metadata (collection, last_sync_time, file_mtime)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![collection, now_ms(), file_mtime],
            )?;
        }

        tx.commit()?;
        info!("Sync complete");
        Ok(())
    }

    /// Rebuild indexes for a specific record type after sync
    ///
    /// Rows that don't deserialize to `T` are skipped with a warning.
    /// Returns the number of records indexed.
    pub fn rebuild_indexes<T: Record>(&mut self) -> Result<usize> {
        let collection = T::collection_name();

        let records_data: Vec<(String, String)> = {
            let mut stmt = self
                .db
                .prepare("SELECT id, data_json FROM records WHERE collection = ?1")?;

            let rows = stmt.query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let tx = self.db.transaction()?;
        let mut count = 0;

        for (id, data_json) in records_data {
            let record: T = match serde_json::from_str(&data_json) {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        collection = collection,
                        id = &id,
                        error = ?e,
                        "Skipping record that doesn't match type"
                    );
                    continue;
                }
            };

            Self::update_indexes_tx(&tx, collection, &id, &record.indexed_fields())?;
            count += 1;
        }

        tx.commit()?;
        debug!(collection = collection, count = count, "Rebuilt indexes for collection");
        Ok(count)
    }

    /// Give the event an id and timestamp if it lacks them, then check it
    fn prepare_event(mut event: Event) -> Result<Event> {
        if event.id.trim().is_empty() {
            event.id = uuid::Uuid::now_v7().to_string();
        }
        event.updated_at = now_ms();
        event.validate()?;
        Ok(event)
    }
}

impl EventStore for Store {
    fn fetch_events(&self) -> Result<Vec<Event>> {
        self.list(&[])
    }

    fn save_event(&mut self, event: Event) -> Result<bool> {
        let event = match Self::prepare_event(event) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Rejecting invalid event");
                return Ok(false);
            }
        };
        let id = self.create(event)?;
        info!(id = %id, "Saved event");
        Ok(true)
    }

    fn save_bulk_events(&mut self, events: Vec<Event>) -> Result<bool> {
        let mut prepared = Vec::with_capacity(events.len());
        for (index, event) in events.into_iter().enumerate() {
            match Self::prepare_event(event) {
                Ok(e) => prepared.push(e),
                Err(e) => {
                    warn!(index, error = %e, "Rejecting bulk save, invalid event");
                    return Ok(false);
                }
            }
        }
        let ids = self.create_many(prepared)?;
        info!(count = ids.len(), "Saved events in bulk");
        Ok(true)
    }

    fn delete_event(&mut self, id: &str) -> Result<bool> {
        let deleted = self.delete::<Event>(id)?;
        if deleted {
            info!(id, "Deleted event");
        } else {
            debug!(id, "Delete requested for unknown event");
        }
        Ok(deleted)
    }
}

fn jsonl_collection(path: &Path) -> Option<&str> {
    if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
        return None;
    }
    path.file_stem().and_then(|s| s.to_str())
}

fn file_mtime(path: &Path) -> Result<i64> {
    Ok(fs::metadata(path)?
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0))
}
