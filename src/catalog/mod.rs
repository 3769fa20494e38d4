use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::{DbError, DbResult};
use crate::file::TableId;
use crate::record::HeapFile;

#[derive(Default)]
struct Tables {
    files: AHashMap<TableId, Arc<HeapFile>>,
    names: AHashMap<String, TableId>,
}

/// Registry resolving table ids to their heap files
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<Tables>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a heap file under `name`, replacing any table with the same
    /// name or id. Returns the table id.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) -> TableId {
        let table_id = file.id();
        let mut tables = self.tables.write();
        if let Some(old_id) = tables.names.insert(name.to_string(), table_id) {
            if old_id != table_id {
                tables.files.remove(&old_id);
            }
        }
        tables.names.retain(|n, id| *id != table_id || n == name);
        tables.files.insert(table_id, file);
        table_id
    }

    /// The heap file backing `table_id`
    pub fn database_file(&self, table_id: TableId) -> DbResult<Arc<HeapFile>> {
        self.tables
            .read()
            .files
            .get(&table_id)
            .cloned()
            .ok_or(DbError::TableNotFound(table_id))
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.tables.read().names.get(name).copied()
    }

    pub fn table_name(&self, table_id: TableId) -> Option<String> {
        self.tables
            .read()
            .names
            .iter()
            .find(|(_, id)| **id == table_id)
            .map(|(name, _)| name.clone())
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.read().files.keys().copied().collect()
    }
}
