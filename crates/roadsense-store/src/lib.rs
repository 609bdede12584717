//! # roadsense-store
//!
//! The external storage collaborator, accessed as generic rows over a
//! PostgREST-style HTTP API. Two concerns only:
//!
//! - flip a road's `status` between `idle` and `recording`
//! - append one aggregate measurement row per completed session
//!
//! Writes are invoked fire-and-forget by the session core: failures are
//! logged by the caller and never block or roll back in-memory state.

#![deny(unsafe_code)]

pub mod rest;

pub use rest::RestStore;

use async_trait::async_trait;

use roadsense_core::AggregateRecord;

/// A road's recording status, as persisted in the `roads` collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoadStatus {
    /// No session is recording against this road.
    Idle,
    /// A session is actively recording against this road.
    Recording,
}

impl RoadStatus {
    /// Stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
        }
    }
}

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transport-level failure (connection refused, timeout, TLS).
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("storage returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for the log line.
        body: String,
    },
}

/// The row-store seam the session core writes through.
///
/// A trait so tests can substitute a recording stub for the HTTP client.
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Set the `status` field of one road row.
    async fn set_road_status(&self, road_id: &str, status: RoadStatus) -> Result<(), StoreError>;

    /// Append one aggregate measurement row.
    async fn insert_measurement(&self, record: &AggregateRecord) -> Result<(), StoreError>;
}
