pub mod models;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub const DB_FILE: &str = "paper-chat.db";

/// Record keys. These match the web client's localStorage keys.
pub const DOCUMENTS_KEY: &str = "documents";
pub const CONVERSATIONS_KEY: &str = "conversations";

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialize error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Record '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Durable key-value storage for the serialized records and client settings.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join(DB_FILE))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-written row, so
        // the connection is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Records ──

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        let conn = self.conn();
        upsert_record(&conn, key, &text)?;
        Ok(())
    }

    /// Writes every record or none of them.
    pub fn save_many(&self, records: &[(&str, &dyn ErasedRecord)]) -> Result<()> {
        let encoded = records
            .iter()
            .map(|&(key, value)| Ok((key, ErasedRecord::to_json(value)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (key, text) in &encoded {
            upsert_record(&tx, key, text)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// `Ok(None)` when the key was never written; `Err(Corrupt)` when the
    /// stored text does not parse as `T`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let text = match self.load_raw(key)? {
            Some(text) => text,
            None => return Ok(None),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| DbError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    pub fn load_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let text = conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(text)
    }

    pub fn save_raw(&self, key: &str, text: &str) -> Result<()> {
        let conn = self.conn();
        upsert_record(&conn, key, text)?;
        Ok(())
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn upsert_record(conn: &Connection, key: &str, text: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO records (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![key, text],
    )?;
    Ok(())
}

/// Object-safe serialization so records of different types can share one
/// transaction in [`Database::save_many`].
pub trait ErasedRecord {
    fn to_json(&self) -> Result<String>;
}

impl<T: Serialize> ErasedRecord for T {
    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_missing_key_is_none() {
        let db = Database::in_memory().unwrap();
        let value: Option<Vec<String>> = db.load(DOCUMENTS_KEY).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let db = Database::in_memory().unwrap();
        db.save(DOCUMENTS_KEY, &vec!["a".to_string(), "b".to_string()])
            .unwrap();
        db.save(DOCUMENTS_KEY, &vec!["c".to_string()]).unwrap();
        let value: Vec<String> = db.load(DOCUMENTS_KEY).unwrap().unwrap();
        assert_eq!(value, vec!["c"]);
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let db = Database::in_memory().unwrap();
        db.save_raw(CONVERSATIONS_KEY, "{not json").unwrap();
        let err = db
            .load::<HashMap<String, Vec<String>>>(CONVERSATIONS_KEY)
            .unwrap_err();
        assert!(matches!(err, DbError::Corrupt { ref key, .. } if key == CONVERSATIONS_KEY));
    }

    #[test]
    fn test_save_many_writes_all_records() {
        let db = Database::in_memory().unwrap();
        let docs = vec![1u32, 2, 3];
        let mut convos: HashMap<String, Vec<u32>> = HashMap::new();
        convos.insert("x".into(), vec![7]);
        let docs_record: &dyn ErasedRecord = &docs;
        let convos_record: &dyn ErasedRecord = &convos;
        db.save_many(&[
            (DOCUMENTS_KEY, docs_record),
            (CONVERSATIONS_KEY, convos_record),
        ])
        .unwrap();
        assert_eq!(db.load::<Vec<u32>>(DOCUMENTS_KEY).unwrap(), Some(docs));
        assert_eq!(
            db.load::<HashMap<String, Vec<u32>>>(CONVERSATIONS_KEY).unwrap(),
            Some(convos)
        );
    }

    #[test]
    fn test_settings_roundtrip() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_setting("base_url").unwrap(), None);
        db.set_setting("base_url", "http://example.test/api").unwrap();
        assert_eq!(
            db.get_setting("base_url").unwrap().as_deref(),
            Some("http://example.test/api")
        );
        db.delete_setting("base_url").unwrap();
        assert_eq!(db.get_setting("base_url").unwrap(), None);
    }

    #[test]
    fn test_new_creates_file_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        {
            let db = Database::new(&nested).unwrap();
            db.save(DOCUMENTS_KEY, &vec![1u8]).unwrap();
        }
        assert!(nested.join(DB_FILE).exists());
        let db = Database::new(&nested).unwrap();
        assert_eq!(db.load::<Vec<u8>>(DOCUMENTS_KEY).unwrap(), Some(vec![1]));
    }
}
