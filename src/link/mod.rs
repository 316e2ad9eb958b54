//! Vehicle Link
//!
//! The [`Vehicle`] trait is the contract between the mission/flight layers
//! and whatever owns the wire: the mission sync layer drives the onboard
//! mission store through it, and the flight runner polls telemetry and
//! issues mode/arm/takeoff commands through it.
//!
//! Implementations:
//! - [`mav::MavlinkVehicle`]: a real vehicle over a MAVLink connection
//! - [`sim::SimVehicle`]: an in-process simulated vehicle for tests

pub mod mav;
pub mod sim;

use waypilot_core::flight::Telemetry;
use waypilot_core::mission::{HomeLocation, Mission, MissionItem};

/// Errors from vehicle link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("vehicle link protocol error: {0}")]
    Proto(String),

    #[error("timeout waiting for {0}")]
    Timeout(&'static str),

    #[error("vehicle rejected {what}: {detail}")]
    Rejected { what: &'static str, detail: String },

    #[error("vehicle link is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Vehicle flight modes this tool sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightMode {
    /// Pre-flight guided mode, required for arming and takeoff
    Guided,
    /// Autonomous mission-execution mode
    Auto,
}

impl FlightMode {
    /// ArduCopter custom mode number.
    pub fn custom_mode(self) -> u32 {
        match self {
            FlightMode::Guided => 4,
            FlightMode::Auto => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FlightMode::Guided => "GUIDED",
            FlightMode::Auto => "AUTO",
        }
    }
}

/// Handle to a connected vehicle.
///
/// Mission-store semantics follow the MAVLink mission microservice:
/// `clear_mission` discards the onboard mission immediately, `stage_item`
/// accumulates items locally in sequence order, and `commit_mission`
/// transfers the staged items to the vehicle in one exchange. The three
/// steps are not transactional; a failed commit after a clear leaves the
/// vehicle with an empty mission.
pub trait Vehicle {
    /// One consistent telemetry snapshot; all fields read together.
    fn telemetry(&mut self) -> Result<Telemetry, LinkError>;

    fn set_mode(&mut self, mode: FlightMode) -> Result<(), LinkError>;

    /// Request motor arming. Completion is observed via `telemetry().armed`.
    fn arm(&mut self) -> Result<(), LinkError>;

    /// Command a takeoff to `altitude_m` meters relative to home.
    fn takeoff(&mut self, altitude_m: f32) -> Result<(), LinkError>;

    fn clear_mission(&mut self) -> Result<(), LinkError>;

    fn stage_item(&mut self, item: &MissionItem) -> Result<(), LinkError>;

    fn commit_mission(&mut self) -> Result<(), LinkError>;

    /// Download the onboard mission, items in vehicle-reported order.
    fn download_mission(&mut self) -> Result<Mission, LinkError>;

    /// Home location as reported by the vehicle.
    fn home_location(&mut self) -> Result<HomeLocation, LinkError>;

    /// Release the link. Idempotent; later calls on the handle fail with
    /// [`LinkError::Closed`].
    fn close(&mut self);
}
