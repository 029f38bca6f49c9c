//! Building blocks shared by the CatScan crates.
//!
//! `catscan-api` takes its error type, TOML loading, SQLite pool setup
//! and id/timestamp helpers from here. The `sqlx` feature (on by default)
//! gates everything that touches the database.

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
