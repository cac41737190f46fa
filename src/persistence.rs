//! Key-value persistence layer shared by the source and target stores

use crate::error::{MigrationError, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Storage backends selectable by name in the node configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum BackendType {
    #[default]
    #[serde(rename = "sqlite")]
    Sqlite,
    #[serde(rename = "memdb")]
    MemDb,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Sqlite => "sqlite",
            BackendType::MemDb => "memdb",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sqlite" => Ok(BackendType::Sqlite),
            "memdb" => Ok(BackendType::MemDb),
            other => Err(MigrationError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// A group of writes applied atomically.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Abstraction for key-value backends. Writes overwrite by key.
pub trait KvStore: Send {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;
    fn write_batch(&self, batch: WriteBatch) -> Result<()>;
    /// All entries whose key starts with `prefix`, in key order.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// Encodes a record for storage.
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(record)?)
}

/// Decodes a stored record.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Path of the file backing the store `name` inside `dir`.
pub fn db_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.db", name))
}

/// Opens the store `name` under `dir` with the selected backend.
pub fn open_store(
    backend: BackendType,
    dir: &Path,
    name: &str,
    mode: OpenMode,
) -> Result<Box<dyn KvStore>> {
    match backend {
        BackendType::Sqlite => Ok(Box::new(SqliteStore::open(&db_file(dir, name), mode)?)),
        BackendType::MemDb => Ok(Box::new(MemoryStore::new())),
    }
}

/// SQLite-backed store: a single `kv` table of blob keys and values.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let conn = match mode {
            OpenMode::ReadOnly => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            ),
            OpenMode::ReadWrite => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                Connection::open(path)
            }
        }
        .map_err(|e| {
            MigrationError::StoreOpen(format!("Failed to open {}: {}", path.display(), e))
        })?;

        if mode == OpenMode::ReadWrite {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS kv (
                    key BLOB PRIMARY KEY,
                    value BLOB NOT NULL
                )",
                [],
            )
            .map_err(|e| MigrationError::StoreOpen(format!("Failed to create kv table: {}", e)))?;
        } else {
            // An empty or foreign database file opens fine but has no kv table.
            let has_table = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'kv'",
                    [],
                    |_| Ok(()),
                )
                .optional()
                .map_err(|e| {
                    MigrationError::StoreOpen(format!("Failed to read {}: {}", path.display(), e))
                })?
                .is_some();
            if !has_table {
                return Err(MigrationError::StoreOpen(format!(
                    "{} holds no kv table",
                    path.display()
                )));
            }
        }

        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| {
            MigrationError::Write(format!("Failed to write {}: {}", hex::encode(key), e))
        })?;
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let conn = self.conn.lock();
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| MigrationError::Write(format!("Failed to start transaction: {}", e)))?;

        for (key, value) in &batch.ops {
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| {
                MigrationError::Write(format!("Failed to write {}: {}", hex::encode(key), e))
            })?;
        }

        tx.commit()
            .map_err(|e| MigrationError::Write(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key ASC")?;
        let rows = stmt.query_map(params![prefix], |row| {
            let key: Vec<u8> = row.get(0)?;
            let value: Vec<u8> = row.get(1)?;
            Ok((key, value))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, value) = row?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, value));
        }
        Ok(entries)
    }
}

/// Simple in-memory store useful for tests and ephemeral runs. Clones share
/// the same entries.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut entries = self.entries.lock();
        for (key, value) in batch.ops {
            entries.insert(key, value);
        }
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .entries
            .lock()
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
