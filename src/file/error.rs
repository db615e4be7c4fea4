use std::io;
use thiserror::Error;

use super::PageId;
use crate::record::CodecError;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt database: {0}")]
    CorruptDatabase(String),

    #[error("Page out of bounds: page_id={page_id}, page_count={page_count}")]
    OutOfBounds { page_id: PageId, page_count: usize },

    #[error("Page {0} is reserved for the file header")]
    ReservedPage(PageId),

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Unsupported page size {0} for a new database")]
    UnsupportedPageSize(usize),

    #[error("Buffer pool capacity must be at least 1")]
    InvalidCapacity,

    #[error("Corrupt page data in page {page_id}: {source}")]
    Codec {
        page_id: PageId,
        #[source]
        source: CodecError,
    },

    #[error("Page not resident in buffer pool: page_id={0}")]
    PageNotResident(PageId),
}

pub type FileResult<T> = Result<T, FileError>;
