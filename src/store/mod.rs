//! Local persistence for series, chapters, and image payloads.
//!
//! The [`SeriesStore`] trait is the seam between the sync engine and
//! storage; [`SqliteStore`] is the production implementation over the
//! shared [`crate::db::Database`] pool.

mod models;
mod repository;
mod sqlite;

pub use models::{ImageRecord, LocalChapter, LocalSeries};
pub use repository::SeriesStore;
pub use sqlite::SqliteStore;

use thiserror::Error;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database query failed.
    #[error("store query failed during {context}: {source}")]
    Query {
        /// What the store was doing.
        context: String,
        /// The underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// A JSON column could not be encoded or decoded.
    #[error("failed to {context}: {source}")]
    Serialization {
        /// What the store was encoding or decoding.
        context: String,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A stored timestamp was not valid RFC 3339.
    #[error("invalid timestamp in column {column}: {value}")]
    InvalidTimestamp {
        /// The column holding the bad value.
        column: String,
        /// The raw stored value.
        value: String,
    },
}

impl StoreError {
    /// Creates a query error with context.
    pub fn query(context: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Query {
            context: context.into(),
            source,
        }
    }

    /// Creates a serialization error with context.
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Creates an invalid timestamp error.
    pub fn invalid_timestamp(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            column: column.into(),
            value: value.into(),
        }
    }
}
