//! Binary asset downloading.
//!
//! [`AssetTransport`] handles individual asset fetches with retries,
//! failure accounting, and connection resets; [`BatchOrchestrator`]
//! drains whole chapter manifests through it with batching, bounded
//! concurrency, and pacing.

mod batch;
pub mod constants;
mod error;
mod transport;

pub use batch::{BatchOrchestrator, BatchReport};
pub use error::{AssetDownload, AssetFailure, TransportError};
pub use transport::AssetTransport;
