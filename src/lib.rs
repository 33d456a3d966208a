//! Etymos: authoring of etymology word records.
//!
//! Documents are YAML. They can be saved straight to the SQLite word store,
//! or parked in a bounded offline store and synced later. Every write that
//! would replace differing content is reported as a conflict first.

pub mod config;
pub mod conflict;
pub mod db;
pub mod models;
pub mod offline;
pub mod server;
pub mod sync;
