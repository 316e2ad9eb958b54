//! waypilot - Mission import, upload, and autonomous launch
//!
//! Fetches a QGC WPL 110 mission from a file or URL, uploads it to a
//! MAVLink vehicle, arms, takes off, and hands the vehicle over to its own
//! autopilot for mission execution.
//!
//! Pure logic (codec, data model, flight-phase machine) lives in
//! [`waypilot_core`]; this crate owns the I/O sides:
//!
//! - [`link`]: the `Vehicle` handle trait, a MAVLink implementation, and a
//!   simulated vehicle for tests and dry runs
//! - [`source`]: where raw mission text comes from (local file or HTTP)
//! - [`sync`]: reconcile a decoded mission with the vehicle's onboard store
//! - [`flight`]: drive the flight-phase controller against a live vehicle
//! - [`clock`]: wall-clock implementation of the core timing trait

pub mod clock;
pub mod error;
pub mod flight;
pub mod link;
pub mod source;
pub mod sync;

pub use error::PilotError;
