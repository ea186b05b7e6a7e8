mod schema;
mod sqlite;

pub use sqlite::SqliteStore;
