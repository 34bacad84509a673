//! Database layer for Affinity
//!
//! Simple SQLite wrapper shared by the item store and the reaction log.
//!
//! # Example
//! ```no_run
//! use affinity::db::Database;
//!
//! let db = Database::open("affinity.db")?;
//! # Ok::<(), affinity::RecError>(())
//! ```

pub mod sqlite;

pub use sqlite::Database;
