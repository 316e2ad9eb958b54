//! waypilot_core - Pure mission interchange and flight-phase logic
//!
//! This crate contains the deterministic parts of waypilot that can be
//! tested on host without a vehicle link or any network access.
//!
//! # Design Principles
//!
//! - **No I/O**: file, network, and MAVLink access live in the host crate
//! - **Trait abstractions**: timing is injected via [`timing::Clock`]
//! - **Deterministic**: every state transition is drivable from tests
//!
//! # Modules
//!
//! - [`mission`]: Mission item data model and ordered mission container
//! - [`wpl`]: QGC WPL 110 waypoint file codec (decode/encode)
//! - [`flight`]: Flight-phase state machine (init -> arm -> takeoff -> handoff)
//! - [`timing`]: Clock abstraction with a mock for deterministic tests

pub mod flight;
pub mod mission;
pub mod timing;
pub mod wpl;
