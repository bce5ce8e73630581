pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{is_valid_visitor_id, Storage, StorageError, StorageResult, MAX_VISITOR_ID_LEN};
