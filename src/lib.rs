//! Folder-processing job queue
//!
//! An HTTP endpoint queues folders in a SQLite table; a single background
//! worker claims the oldest queued row, runs the configured processor on it
//! and records the outcome, retrying reported failures a bounded number of
//! times.

pub mod api;
pub mod config;
pub mod db;
pub mod logging;
pub mod processor;
pub mod shutdown;
pub mod worker;
