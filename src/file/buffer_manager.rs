use ahash::RandomState;
use log::{debug, warn};
use lru::LruCache;
use std::num::NonZeroUsize;

use super::error::{FileError, FileResult};
use super::storage_manager::StorageManager;
use super::{BUFFER_POOL_SIZE, HEADER_PAGE_ID, PageId};
use crate::record::Page;

/// Entry in the buffer pool
struct BufferEntry {
    /// Decoded page
    page: Page,
    /// Whether this page has been modified since it was read
    dirty: bool,
}

/// Capacity-bounded cache of decoded pages with LRU eviction.
///
/// The cache owns the [`StorageManager`] it reads from and writes back to.
/// Dirty pages are encoded and written only when they leave the pool, either
/// through eviction or [`BufferManager::flush_all`].
pub struct BufferManager {
    storage: StorageManager,
    /// Resident pages and their recency order in one structure
    buffer_pool: LruCache<PageId, BufferEntry, RandomState>,
    /// Maximum number of resident pages
    capacity: usize,
}

impl BufferManager {
    /// Create a new buffer manager with the default capacity
    pub fn new(storage: StorageManager) -> Self {
        let capacity = NonZeroUsize::new(BUFFER_POOL_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self::build(storage, capacity)
    }

    /// Create a new buffer manager with specified capacity
    pub fn with_capacity(storage: StorageManager, capacity: usize) -> FileResult<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or(FileError::InvalidCapacity)?;
        Ok(Self::build(storage, capacity))
    }

    fn build(storage: StorageManager, capacity: NonZeroUsize) -> Self {
        Self {
            storage,
            buffer_pool: LruCache::with_hasher(capacity, RandomState::new()),
            capacity: capacity.get(),
        }
    }

    /// Get a reference to the storage manager
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Get a mutable reference to the storage manager
    pub fn storage_mut(&mut self) -> &mut StorageManager {
        &mut self.storage
    }

    /// Page size of the underlying file
    pub fn page_size(&self) -> usize {
        self.storage.page_size()
    }

    /// Get a page, loading it from disk if necessary. Promotes it to most recently used.
    pub fn get_page(&mut self, page_id: PageId) -> FileResult<&Page> {
        self.ensure_resident(page_id)?;
        self.buffer_pool
            .get(&page_id)
            .map(|entry| &entry.page)
            .ok_or(FileError::PageNotResident(page_id))
    }

    /// Get a mutable reference to a page, loading it if necessary.
    ///
    /// The page is not marked dirty; call [`BufferManager::mark_dirty`] after
    /// changing it.
    pub fn get_page_mut(&mut self, page_id: PageId) -> FileResult<&mut Page> {
        self.ensure_resident(page_id)?;
        self.buffer_pool
            .get_mut(&page_id)
            .map(|entry| &mut entry.page)
            .ok_or(FileError::PageNotResident(page_id))
    }

    /// Allocate a new page in the file and cache it as an empty page
    pub fn allocate_page(&mut self) -> FileResult<PageId> {
        // Evict before the file changes
        self.evict_if_needed()?;
        let page_id = self.storage.allocate_page()?;

        // The id may come off the free list; never serve a stale copy
        self.buffer_pool.pop(&page_id);

        let page = Page::new(page_id, self.storage.page_size());
        self.buffer_pool
            .put(page_id, BufferEntry { page, dirty: false });
        Ok(page_id)
    }

    /// Mark a page as dirty (modified). No-op if the page is not resident.
    pub fn mark_dirty(&mut self, page_id: PageId) {
        if let Some(entry) = self.buffer_pool.peek_mut(&page_id) {
            entry.dirty = true;
        }
    }

    /// Evict the least recently used page while the pool is at capacity,
    /// writing it first if dirty
    pub fn evict_if_needed(&mut self) -> FileResult<()> {
        while self.buffer_pool.len() >= self.capacity {
            let Some((&page_id, entry)) = self.buffer_pool.peek_lru() else {
                break;
            };

            if entry.dirty {
                let data = entry
                    .page
                    .encode()
                    .map_err(|source| FileError::Codec { page_id, source })?;
                self.storage.write_page_bytes(page_id, &data)?;
                debug!("Evicted dirty page {}", page_id);
            } else {
                debug!("Evicted clean page {}", page_id);
            }

            self.buffer_pool.pop_lru();
        }

        Ok(())
    }

    /// Write every dirty page to disk, then empty the pool
    pub fn flush_all(&mut self) -> FileResult<()> {
        let mut written = 0;
        for (&page_id, entry) in self.buffer_pool.iter() {
            if entry.dirty {
                let data = entry
                    .page
                    .encode()
                    .map_err(|source| FileError::Codec { page_id, source })?;
                self.storage.write_page_bytes(page_id, &data)?;
                written += 1;
            }
        }

        debug!(
            "Flushed {} dirty pages, released {} resident pages",
            written,
            self.buffer_pool.len()
        );
        self.buffer_pool.clear();
        Ok(())
    }

    /// Drop a resident page without writing it back. Returns whether it was resident.
    pub fn discard_page(&mut self, page_id: PageId) -> bool {
        self.buffer_pool.pop(&page_id).is_some()
    }

    /// Flush all pages and the file header, then release the file
    pub fn close(mut self) -> FileResult<()> {
        self.flush_all()?;
        self.storage.flush()
    }

    fn ensure_resident(&mut self, page_id: PageId) -> FileResult<()> {
        if page_id == HEADER_PAGE_ID {
            return Err(FileError::ReservedPage(page_id));
        }

        if !self.buffer_pool.contains(&page_id) {
            self.load_page(page_id)?;
        }
        Ok(())
    }

    /// Load a page from disk into the buffer pool
    fn load_page(&mut self, page_id: PageId) -> FileResult<()> {
        let data = self.storage.read_page_bytes(page_id)?;
        let page =
            Page::decode(page_id, &data).map_err(|source| FileError::Codec { page_id, source })?;

        self.evict_if_needed()?;
        self.buffer_pool
            .put(page_id, BufferEntry { page, dirty: false });
        Ok(())
    }

    /// Maximum number of resident pages
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of pages currently in the buffer pool
    pub fn buffer_pool_size(&self) -> usize {
        self.buffer_pool.len()
    }

    /// Check if a page is in the buffer pool
    pub fn is_page_cached(&self, page_id: PageId) -> bool {
        self.buffer_pool.contains(&page_id)
    }

    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.buffer_pool
            .peek(&page_id)
            .is_some_and(|entry| entry.dirty)
    }

    /// Get the number of dirty pages in the buffer pool
    pub fn dirty_page_count(&self) -> usize {
        self.buffer_pool.iter().filter(|(_, e)| e.dirty).count()
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all() {
            warn!("Failed to flush buffer pool on drop: {}", e);
        }
    }
}
