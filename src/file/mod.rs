mod buffer_manager;
mod error;
mod header;
mod storage_manager;

pub use buffer_manager::BufferManager;
pub use error::{FileError, FileResult};
pub use header::{FORMAT_VERSION, FileHeader, MAGIC};
pub use storage_manager::StorageManager;

/// Default page size in bytes (4KB), used when creating a new database file
pub const PAGE_SIZE: usize = 4096;

/// Smallest page size accepted for a new database file
pub const MIN_PAGE_SIZE: usize = 64;

/// Default number of pages in the buffer pool
pub const BUFFER_POOL_SIZE: usize = 256;

/// Page ID type
pub type PageId = usize;

/// Page 0 always holds the file header
pub const HEADER_PAGE_ID: PageId = 0;
