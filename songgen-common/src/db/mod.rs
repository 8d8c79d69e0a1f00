//! SQLite database setup

pub mod init;

pub use init::{create_schema, init_database, SCHEMA_VERSION};
