pub mod database;
pub mod file;
pub mod record;

pub use database::{Database, DatabaseConfig, DatabaseError, DatabaseResult, InsertSummary};
pub use file::{BUFFER_POOL_SIZE, BufferManager, FileError, PAGE_SIZE, PageId, StorageManager};
pub use record::{
    Attribute, DataType, Page, Record, RecordError, RecordResult, Schema, TableMeta, TableStore,
    Value,
};
