//! Durable result storage for anamnesis.
//!
//! [`LibsqlResultStore`] keeps one row per subject in a libSQL (SQLite)
//! database, either an embedded file or in memory:
//!
//! ```text
//! results(identifier TEXT PRIMARY KEY, total INTEGER, classification TEXT,
//!         item1 INTEGER, ..., itemN INTEGER)
//! ```
//!
//! Writes are upserts keyed by identifier, so re-running a subject replaces
//! its row instead of duplicating it.

mod error;
mod libsql_store;

pub use error::{Error, Result};
pub use libsql_store::LibsqlResultStore;
