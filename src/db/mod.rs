//! Database façade (§6): the out-of-scope collaborator that maps table
//! names to on-disk directories and persists table-level metadata. Every
//! other module in this crate is specified in full; `Database` is
//! specified only through the interface transactions and queries actually
//! use — `create_table` / `drop_table` / `get_table`, plus `open`/`close`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::common::error::{Error, Result};
use crate::storage::disk::TableDisk;
use crate::table::Table;

const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableMeta {
    num_columns: usize,
    key_index: usize,
    num_base_records: i64,
    num_tail_records: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Metadata {
    tables: HashMap<String, TableMeta>,
}

/// Owns every open table under one root directory. Persistence is
/// checkpoint-style: table pages are flushed and `metadata.json` is
/// rewritten on `close`, not after every mutation (spec.md §1 Non-goals —
/// no crash-safe WAL).
pub struct Database {
    root: PathBuf,
    tables: Mutex<HashMap<String, Arc<Table>>>,
}

impl Database {
    /// Open (or create) the database directory at `path`, reopening every
    /// table recorded in its metadata file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let root = path.into();
        fs::create_dir_all(&root)?;

        let metadata = Self::load_metadata(&root)?;
        let mut tables = HashMap::with_capacity(metadata.tables.len());
        for (name, meta) in metadata.tables {
            let table = Table::open(
                name.clone(),
                root.join(&name),
                meta.num_columns,
                meta.key_index,
                meta.num_base_records,
                meta.num_tail_records,
            )?;
            tables.insert(name, Arc::new(table));
        }

        log::debug!("opened database at {} with {} table(s)", root.display(), tables.len());
        Ok(Self {
            root,
            tables: Mutex::new(tables),
        })
    }

    fn load_metadata(root: &Path) -> Result<Metadata> {
        let path = root.join(METADATA_FILE);
        if !path.exists() {
            return Ok(Metadata::default());
        }
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Create a new table, rejecting a name collision.
    pub fn create_table(&self, name: &str, num_columns: usize, key_index: usize) -> Result<Arc<Table>> {
        let mut tables = self.tables.lock();
        if tables.contains_key(name) {
            return Err(Error::TableExists(name.to_string()));
        }
        let table = Arc::new(Table::new(name, self.root.join(name), num_columns, key_index));
        tables.insert(name.to_string(), Arc::clone(&table));
        log::info!("created table '{name}' ({num_columns} columns, key column {key_index})");
        Ok(table)
    }

    /// Stop the table's merge thread, flush it, then delete its directory
    /// tree and forget it.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let table = {
            let mut tables = self.tables.lock();
            tables.remove(name).ok_or_else(|| Error::NoSuchTable(name.to_string()))?
        };
        table.close()?;
        TableDisk::new(self.root.join(name)).remove_all()?;
        log::info!("dropped table '{name}'");
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Result<Arc<Table>> {
        self.tables
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.lock().keys().cloned().collect()
    }

    /// Flush every table and persist `metadata.json`. Tables remain open
    /// in memory afterward (`close` is a checkpoint, not a teardown) — a
    /// fresh `Database::open` on the same root picks up where this left
    /// off.
    pub fn close(&self) -> Result<()> {
        let tables = self.tables.lock();
        let mut metadata = Metadata::default();
        for (name, table) in tables.iter() {
            table.close()?;
            metadata.tables.insert(
                name.clone(),
                TableMeta {
                    num_columns: table.num_columns(),
                    key_index: table.key_column(),
                    num_base_records: table.num_base_records(),
                    num_tail_records: table.num_tail_records(),
                },
            );
        }
        let bytes = serde_json::to_vec_pretty(&metadata)?;
        fs::write(self.root.join(METADATA_FILE), bytes)?;
        log::debug!("closed database at {}", self.root.display());
        Ok(())
    }
}
