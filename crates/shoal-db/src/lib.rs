mod bucket;
mod catalog;
mod cursor;
mod database;
mod encoding;
mod error;
mod planner;
mod record;
mod reindex;
mod resolver;
mod table;

pub use bson::{Bson, Document, doc};
pub use bucket::{Bucket, BucketConfig, BucketOptions, IndexConfig, IndexState, IndexedField};
pub use cursor::Cursor;
pub use database::{Database, DatabaseConfig, FindOptions, PutOptions};
pub use error::DbError;
pub use planner::{Access, Plan};
pub use record::ObjectRecord;
pub use reindex::ReindexResult;
pub use resolver::{FieldClass, ResolvedClause, ResolvedFilter, classify, resolve};
