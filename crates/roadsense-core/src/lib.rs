//! # roadsense-core
//!
//! Foundation types for the Roadsense telemetry relay:
//!
//! - **Telemetry register**: [`telemetry::TelemetryReading`], the single live
//!   sensor snapshot, mutated in place by [`telemetry::TelemetryUpdate`]
//! - **Session tracking**: [`session::SessionTracker`] with its append-only
//!   [`session::Sample`] buffer, bounded by start/stop control commands
//! - **Aggregation**: [`aggregate::reduce`], the pure buffer-to-record
//!   reduction run once per completed recording session
//! - **Wire messages**: [`messages::InboundMessage`] /
//!   [`messages::OutboundMessage`], the JSON protocol spoken over the
//!   duplex viewer/worker channel
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other roadsense crates.

#![deny(unsafe_code)]

pub mod aggregate;
pub mod messages;
pub mod session;
pub mod telemetry;

pub use aggregate::{AggregateRecord, reduce};
pub use session::{Sample, SessionTracker};
pub use telemetry::{TelemetryReading, TelemetryUpdate};
