#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    FORMAT_VERSION, InMemorySessionStore, SessionRecord, SessionStore, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteSessionStore};
