//! WebSocket connection management and broadcasting.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | WebSocket upgrade, per-connection read/write loops |
//! | `broadcast` | Fan-out hub: register/unregister viewers, best-effort delivery |
//!
//! Data flow: inbound frames feed the session core; the core's broadcasts
//! fan out through the hub to every connected viewer.

pub mod broadcast;
pub mod connection;

pub use broadcast::BroadcastHub;
pub use connection::ViewerChannel;
