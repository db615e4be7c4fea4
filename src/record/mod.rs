mod error;
mod page;
mod record;
mod schema;
mod table_store;
mod value;

pub use error::{CodecError, RecordError, RecordResult, SchemaViolation};
pub use page::Page;
pub use record::{Record, SlotId};
pub use schema::{Attribute, Schema};
pub use table_store::{TableMeta, TableStore};
pub use value::{DataType, Value};

pub(crate) use table_store::lock_pool;
