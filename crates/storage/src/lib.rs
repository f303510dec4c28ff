pub mod cache;
pub mod fixtures;
pub mod repository;
pub mod sqlite;

pub use repository::{Storage, StorageError};
