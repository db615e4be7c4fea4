use crate::file::{FileError, PageId};
use std::string::FromUtf8Error;
use thiserror::Error;

/// Failures while encoding or decoding records and pages
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unexpected end of data: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unknown value type tag: {0}")]
    UnknownTypeTag(u8),

    #[error("Invalid boolean byte: {0}")]
    InvalidBool(u8),

    #[error("Invalid UTF-8 in string value: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("Slot directory of {count} entries does not fit a {page_size}-byte page")]
    SlotDirectoryOverflow { count: usize, page_size: usize },

    #[error("Slot {slot} points at offset {offset}, outside the record area")]
    InvalidSlot { slot: usize, offset: usize },

    #[error("Page full: page_id={page_id}, needed {needed} bytes, {available} free")]
    PageFull {
        page_id: PageId,
        needed: usize,
        available: usize,
    },

    #[error("Value too long to encode: {0} bytes")]
    ValueTooLong(usize),
}

/// One way a record can disagree with its schema
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("Expected {expected} values, got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("Attribute '{attribute}' cannot be NULL")]
    NotNull { attribute: String },

    #[error("Type mismatch for '{attribute}': expected {expected}, got {actual}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        actual: String,
    },

    #[error("Value for '{attribute}' is {actual} characters long, limit is {max}")]
    TooLong {
        attribute: String,
        max: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Schema violation: {0}")]
    SchemaViolation(#[from] SchemaViolation),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Duplicate primary key value: ( {value} ) for attribute '{attribute}'")]
    DuplicateKey { attribute: String, value: String },

    #[error("Record of {size} bytes cannot fit in a page (max {max})")]
    RecordTooLarge { size: usize, max: usize },

    #[error("Table not bound to a buffer pool: {0}")]
    TableNotBound(String),

    #[error("Buffer pool lock poisoned")]
    PoolPoisoned,
}

pub type RecordResult<T> = Result<T, RecordError>;
