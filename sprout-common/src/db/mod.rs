//! Database access layer shared by Sprout services

pub mod init;

pub use init::{init_database, init_memory_database};
