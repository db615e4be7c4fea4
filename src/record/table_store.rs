use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{RecordError, RecordResult};
use super::page::Page;
use super::record::Record;
use super::schema::Schema;
use crate::file::{BufferManager, FileError, HEADER_PAGE_ID, PageId};

/// Everything the external catalog needs to persist for one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub schema: Schema,
    /// Owned pages in insertion order
    pub page_ids: Vec<PageId>,
}

/// A table's chain of pages in the shared buffer pool.
///
/// Rows are appended to the last owned page until it is full, then a new page
/// is allocated. Primary key uniqueness is checked by scanning every owned page
/// while the pool lock is held.
pub struct TableStore {
    meta: TableMeta,
    buffer: Option<Arc<Mutex<BufferManager>>>,
}

impl TableStore {
    /// Create a new, empty table attached to `buffer`
    pub fn create(
        name: impl Into<String>,
        schema: Schema,
        buffer: Arc<Mutex<BufferManager>>,
    ) -> Self {
        Self {
            meta: TableMeta {
                name: name.into(),
                schema,
                page_ids: Vec::new(),
            },
            buffer: Some(buffer),
        }
    }

    /// Rebuild a table from catalog metadata. It must be bound before use.
    pub fn from_meta(meta: TableMeta) -> Self {
        Self { meta, buffer: None }
    }

    /// Attach the shared buffer pool. Existing rows are not re-validated, but
    /// every owned page id must name an allocated data page.
    pub fn bind(&mut self, buffer: Arc<Mutex<BufferManager>>) -> RecordResult<()> {
        {
            let pool = lock_pool(&buffer)?;
            let page_count = pool.storage().page_count()?;
            if let Some(&page_id) = self
                .meta
                .page_ids
                .iter()
                .find(|&&id| id == HEADER_PAGE_ID || id >= page_count)
            {
                return Err(FileError::OutOfBounds {
                    page_id,
                    page_count,
                }
                .into());
            }
        }

        self.buffer = Some(buffer);
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    pub fn into_meta(self) -> TableMeta {
        self.meta
    }

    /// Get table name
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Get schema
    pub fn schema(&self) -> &Schema {
        &self.meta.schema
    }

    /// Owned page ids in order
    pub fn page_ids(&self) -> &[PageId] {
        &self.meta.page_ids
    }

    /// Insert a record after validating it against the schema and the
    /// primary key. Nothing is modified when an error is returned.
    pub fn insert(&mut self, record: Record) -> RecordResult<()> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| RecordError::TableNotBound(self.meta.name.clone()))?;

        self.meta.schema.validate_record(record.values())?;

        let mut pool = lock_pool(buffer)?;

        let size = record.encoded_len();
        let max = Page::max_record_len(pool.page_size());
        if size > max {
            return Err(RecordError::RecordTooLarge { size, max });
        }

        check_unique(&self.meta, &mut pool, &record)?;

        if let Some(&last) = self.meta.page_ids.last() {
            let page = pool.get_page_mut(last)?;
            if page.can_fit(size) {
                page.insert(record)?;
                pool.mark_dirty(last);
                return Ok(());
            }
        }

        let page_id = pool.allocate_page()?;
        pool.get_page_mut(page_id)?.insert(record)?;
        pool.mark_dirty(page_id);
        self.meta.page_ids.push(page_id);
        debug!(
            "Table '{}' grew to {} pages (new page {})",
            self.meta.name,
            self.meta.page_ids.len(),
            page_id
        );

        Ok(())
    }

    /// Every record, in owned-page order then slot order
    pub fn scan(&self) -> RecordResult<Vec<Record>> {
        let buffer = self.bound_buffer()?;
        let mut pool = lock_pool(buffer)?;

        let mut records = Vec::new();
        for &page_id in &self.meta.page_ids {
            let page = pool.get_page(page_id)?;
            records.extend_from_slice(page.records());
        }
        Ok(records)
    }

    /// Number of stored records
    pub fn row_count(&self) -> RecordResult<usize> {
        let buffer = self.bound_buffer()?;
        let mut pool = lock_pool(buffer)?;

        let mut count = 0;
        for &page_id in &self.meta.page_ids {
            count += pool.get_page(page_id)?.len();
        }
        Ok(count)
    }

    fn bound_buffer(&self) -> RecordResult<&Arc<Mutex<BufferManager>>> {
        self.buffer
            .as_ref()
            .ok_or_else(|| RecordError::TableNotBound(self.meta.name.clone()))
    }
}

/// Reject `record` if a stored row has the same non-null primary key
fn check_unique(meta: &TableMeta, pool: &mut BufferManager, record: &Record) -> RecordResult<()> {
    let pk = meta.schema.primary_key_index();
    let Some(key) = record.get(pk).filter(|v| !v.is_null()) else {
        return Ok(());
    };

    for &page_id in &meta.page_ids {
        let page = pool.get_page(page_id)?;
        let duplicate = page
            .records()
            .iter()
            .any(|stored| stored.get(pk).is_some_and(|v| v.key_eq(key)));
        if duplicate {
            return Err(RecordError::DuplicateKey {
                attribute: meta.schema.primary_key().name.clone(),
                value: key.to_string(),
            });
        }
    }
    Ok(())
}

pub(crate) fn lock_pool(
    buffer: &Arc<Mutex<BufferManager>>,
) -> RecordResult<MutexGuard<'_, BufferManager>> {
    buffer.lock().map_err(|_| RecordError::PoolPoisoned)
}
