use ahash::AHashMap;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::file::{
    BUFFER_POOL_SIZE, BufferManager, FileError, PAGE_SIZE, PageId, StorageManager,
};
use crate::record::{Page, Record, RecordError, Schema, TableMeta, TableStore, lock_pool};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Record error: {0}")]
    RecordError(#[from] RecordError),

    #[error("File error: {0}")]
    FileError(#[from] FileError),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Settings for opening a [`Database`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Page size for a new file; an existing file keeps its own
    pub page_size: usize,
    /// Maximum number of pages held in the buffer pool
    pub buffer_capacity: usize,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            page_size: PAGE_SIZE,
            buffer_capacity: BUFFER_POOL_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }
}

/// Outcome of [`Database::insert_batch`]
#[derive(Debug)]
pub struct InsertSummary {
    /// Rows stored before the first failure (or all of them)
    pub inserted: usize,
    /// The error that stopped the batch, if any
    pub failure: Option<RecordError>,
}

impl InsertSummary {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// An open database file and the tables stored in it.
///
/// Table names are case-insensitive. The table list itself is not persisted
/// here: callers keep [`Database::table_metas`] in their catalog and hand it
/// back to [`Database::open_with_tables`].
pub struct Database {
    path: PathBuf,
    buffer: Arc<Mutex<BufferManager>>,
    /// Tables keyed by lowercased name
    tables: AHashMap<String, TableStore>,
}

impl Database {
    /// Open or create a database file with no tables registered
    pub fn open(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let storage = StorageManager::open(&config.path, config.page_size)?;
        let page_size = storage.page_size();
        let buffer = BufferManager::with_capacity(storage, config.buffer_capacity)?;

        info!(
            "Database {} ready (page size {}, buffer capacity {})",
            config.path.display(),
            page_size,
            config.buffer_capacity
        );

        Ok(Self {
            path: config.path.clone(),
            buffer: Arc::new(Mutex::new(buffer)),
            tables: AHashMap::new(),
        })
    }

    /// Open a database and re-attach tables loaded from the catalog
    pub fn open_with_tables(
        config: &DatabaseConfig,
        metas: impl IntoIterator<Item = TableMeta>,
    ) -> DatabaseResult<Self> {
        let mut db = Self::open(config)?;

        for meta in metas {
            let key = meta.name.to_lowercase();
            if db.tables.contains_key(&key) {
                return Err(DatabaseError::TableExists(meta.name));
            }

            let mut table = TableStore::from_meta(meta);
            table.bind(db.buffer.clone())?;
            debug!(
                "Bound table '{}' ({} pages)",
                table.name(),
                table.page_ids().len()
            );
            db.tables.insert(key, table);
        }

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Page size adopted for the open file
    pub fn page_size(&self) -> DatabaseResult<usize> {
        Ok(lock_pool(&self.buffer)?.page_size())
    }

    /// Number of pages in the file, header included
    pub fn page_count(&self) -> DatabaseResult<usize> {
        Ok(lock_pool(&self.buffer)?.storage().page_count()?)
    }

    /// Reclaimed page ids waiting for reuse
    pub fn free_pages(&self) -> DatabaseResult<Vec<PageId>> {
        Ok(lock_pool(&self.buffer)?.storage().free_list().to_vec())
    }

    /// Decode one data page through the buffer pool
    pub fn page(&self, page_id: PageId) -> DatabaseResult<Page> {
        let mut pool = lock_pool(&self.buffer)?;
        Ok(pool.get_page(page_id)?.clone())
    }

    pub fn create_table(&mut self, name: &str, schema: Schema) -> DatabaseResult<()> {
        let key = name.to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(DatabaseError::TableExists(name.to_string()));
        }

        let table = TableStore::create(name, schema, self.buffer.clone());
        self.tables.insert(key, table);
        info!("Created table '{}'", name);
        Ok(())
    }

    /// Remove a table and return its pages to the free list.
    ///
    /// The table stays registered unless every page was freed, so a failed
    /// drop can be retried.
    pub fn drop_table(&mut self, name: &str) -> DatabaseResult<()> {
        let key = name.to_lowercase();
        let table = self
            .tables
            .get(&key)
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))?;

        {
            let mut pool = lock_pool(&self.buffer)?;
            pool.storage_mut().free_pages(table.page_ids())?;
            for &page_id in table.page_ids() {
                pool.discard_page(page_id);
            }
        }

        if let Some(table) = self.tables.remove(&key) {
            info!(
                "Dropped table '{}', reclaimed {} pages",
                table.name(),
                table.page_ids().len()
            );
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> DatabaseResult<&TableStore> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> DatabaseResult<&mut TableStore> {
        self.tables
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))
    }

    /// Table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .values()
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Metadata of every table, sorted by name, for the catalog to persist
    pub fn table_metas(&self) -> Vec<TableMeta> {
        let mut metas: Vec<TableMeta> = self.tables.values().map(|t| t.meta().clone()).collect();
        metas.sort_by(|a, b| a.name.cmp(&b.name));
        metas
    }

    pub fn insert(&mut self, table: &str, record: Record) -> DatabaseResult<()> {
        self.table_mut(table)?.insert(record)?;
        Ok(())
    }

    /// Insert rows in order, stopping at the first failure. Rows inserted
    /// before the failure stay in the table.
    pub fn insert_batch(
        &mut self,
        table: &str,
        records: impl IntoIterator<Item = Record>,
    ) -> DatabaseResult<InsertSummary> {
        let store = self.table_mut(table)?;

        let mut inserted = 0;
        for record in records {
            if let Err(e) = store.insert(record) {
                debug!(
                    "Batch insert into '{}' stopped after {} rows: {}",
                    store.name(),
                    inserted,
                    e
                );
                return Ok(InsertSummary {
                    inserted,
                    failure: Some(e),
                });
            }
            inserted += 1;
        }

        Ok(InsertSummary {
            inserted,
            failure: None,
        })
    }

    /// Every row of a table in storage order
    pub fn scan(&self, table: &str) -> DatabaseResult<Vec<Record>> {
        Ok(self.table(table)?.scan()?)
    }

    /// Every row of a table ordered by primary key, NULL keys first. Rows
    /// with equal keys keep their storage order.
    pub fn select(&self, table: &str) -> DatabaseResult<Vec<Record>> {
        let store = self.table(table)?;
        let pk = store.schema().primary_key_index();

        let mut rows = store.scan()?;
        rows.sort_by(|a, b| match (a.get(pk), b.get(pk)) {
            (Some(x), Some(y)) => x.key_cmp(y),
            (x, y) => x.is_some().cmp(&y.is_some()),
        });
        Ok(rows)
    }

    /// Write dirty pages and the header to disk, keeping the database open
    pub fn flush(&mut self) -> DatabaseResult<()> {
        let mut pool = lock_pool(&self.buffer)?;
        pool.flush_all()?;
        pool.storage_mut().flush()?;
        Ok(())
    }

    /// Flush everything and release the file
    pub fn close(self) -> DatabaseResult<()> {
        let Database {
            path,
            buffer,
            tables,
        } = self;
        drop(tables);

        match Arc::try_unwrap(buffer) {
            Ok(mutex) => {
                let pool = mutex.into_inner().map_err(|_| RecordError::PoolPoisoned)?;
                pool.close()?;
            }
            Err(shared) => {
                let mut pool = lock_pool(&shared)?;
                pool.flush_all()?;
                pool.storage_mut().flush()?;
            }
        }

        info!("Closed database {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests;
