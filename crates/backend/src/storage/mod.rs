use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;
use tacmap_shared::records::{Feature, Marker};

type BlobTable = TableDefinition<'static, &'static str, &'static [u8]>;

const MARKERS_TABLE: BlobTable = TableDefinition::new("markers");
const FEATURES_TABLE: BlobTable = TableDefinition::new("features");

/// A record kept as a JSON blob keyed by its id.
pub trait Record: Serialize + DeserializeOwned {
    fn key(&self) -> String;
    fn created_at(&self) -> &str;
    fn migrate(&mut self);
}

impl Record for Marker {
    fn key(&self) -> String {
        self.id.to_string()
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn migrate(&mut self) {
        Marker::migrate(self)
    }
}

impl Record for Feature {
    fn key(&self) -> String {
        self.id.to_string()
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn migrate(&mut self) {
        Feature::migrate(self)
    }
}

pub struct Storage {
    db: Database,
}

impl Storage {
    pub fn open(path: &Path) -> Result<Arc<Self>, String> {
        let db = Database::create(path)
            .map_err(|e| format!("Failed to open database at {}: {}", path.display(), e))?;

        // Ensure tables exist
        let write_txn = db.begin_write().map_err(|e| e.to_string())?;
        {
            write_txn
                .open_table(MARKERS_TABLE)
                .map_err(|e| e.to_string())?;
            write_txn
                .open_table(FEATURES_TABLE)
                .map_err(|e| e.to_string())?;
        }
        write_txn.commit().map_err(|e| e.to_string())?;

        Ok(Arc::new(Storage { db }))
    }

    fn save<T: Record>(&self, table: BlobTable, record: &T) -> Result<(), String> {
        let json = serde_json::to_vec(record).map_err(|e| e.to_string())?;
        let key = record.key();

        let write_txn = self.db.begin_write().map_err(|e| e.to_string())?;
        {
            let mut table = write_txn.open_table(table).map_err(|e| e.to_string())?;
            table
                .insert(key.as_str(), json.as_slice())
                .map_err(|e| e.to_string())?;
        }
        write_txn.commit().map_err(|e| e.to_string())?;
        Ok(())
    }

    fn get<T: Record>(&self, table: BlobTable, id: &str) -> Result<Option<T>, String> {
        let read_txn = self.db.begin_read().map_err(|e| e.to_string())?;
        let table = read_txn.open_table(table).map_err(|e| e.to_string())?;

        match table.get(id).map_err(|e| e.to_string())? {
            Some(value) => {
                let mut record: T =
                    serde_json::from_slice(value.value()).map_err(|e| e.to_string())?;
                record.migrate();
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// All records, newest first.
    fn list<T: Record>(&self, table: BlobTable) -> Result<Vec<T>, String> {
        let read_txn = self.db.begin_read().map_err(|e| e.to_string())?;
        let table = read_txn.open_table(table).map_err(|e| e.to_string())?;

        let mut records = Vec::new();
        for entry in table.iter().map_err(|e| e.to_string())? {
            let (_, value) = entry.map_err(|e| e.to_string())?;
            let mut record: T =
                serde_json::from_slice(value.value()).map_err(|e| e.to_string())?;
            record.migrate();
            records.push(record);
        }
        records.sort_by(|a, b| b.created_at().cmp(a.created_at()));
        Ok(records)
    }

    fn delete(&self, table: BlobTable, id: &str) -> Result<bool, String> {
        let write_txn = self.db.begin_write().map_err(|e| e.to_string())?;
        let removed = {
            let mut table = write_txn.open_table(table).map_err(|e| e.to_string())?;
            let result = table.remove(id).map_err(|e| e.to_string())?;
            result.is_some()
        };
        write_txn.commit().map_err(|e| e.to_string())?;
        Ok(removed)
    }

    pub fn save_marker(&self, marker: &Marker) -> Result<(), String> {
        self.save(MARKERS_TABLE, marker)
    }

    pub fn get_marker(&self, id: &str) -> Result<Option<Marker>, String> {
        self.get(MARKERS_TABLE, id)
    }

    pub fn list_markers(&self) -> Result<Vec<Marker>, String> {
        self.list(MARKERS_TABLE)
    }

    pub fn delete_marker(&self, id: &str) -> Result<bool, String> {
        self.delete(MARKERS_TABLE, id)
    }

    pub fn save_feature(&self, feature: &Feature) -> Result<(), String> {
        self.save(FEATURES_TABLE, feature)
    }

    pub fn get_feature(&self, id: &str) -> Result<Option<Feature>, String> {
        self.get(FEATURES_TABLE, id)
    }

    pub fn list_features(&self) -> Result<Vec<Feature>, String> {
        self.list(FEATURES_TABLE)
    }

    pub fn delete_feature(&self, id: &str) -> Result<bool, String> {
        self.delete(FEATURES_TABLE, id)
    }
}
