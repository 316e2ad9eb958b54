//! Simulated Vehicle
//!
//! In-process [`Vehicle`] implementation with scripted readiness and climb
//! behavior. Used by the test suites and for dry-running the pipeline
//! without a link; no wire protocol involved.

use waypilot_core::flight::Telemetry;
use waypilot_core::mission::{HomeLocation, Mission, MissionItem};

use super::{FlightMode, LinkError, Vehicle};

/// Mission-store operation record, for call-order assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Clear,
    Stage(u16),
    Commit,
    Download,
}

/// Scripted vehicle.
///
/// Readiness gates are expressed in telemetry polls: the vehicle becomes
/// armable after `armable_after_polls` snapshots and arms
/// `arm_delay_polls` snapshots after [`Vehicle::arm`] is called. After
/// takeoff the altitude either follows the configured profile one sample
/// per poll (sticky on the last sample) or climbs a fixed step toward the
/// takeoff target.
pub struct SimVehicle {
    home: HomeLocation,
    armable_after_polls: u32,
    arm_delay_polls: u32,
    polls: u32,
    arm_requested_at: Option<u32>,
    takeoff_target: Option<f32>,
    relative_alt: f32,
    altitude_profile: Vec<f32>,
    profile_pos: usize,
    staged: Vec<MissionItem>,
    stored: Vec<MissionItem>,
    ops: Vec<StoreOp>,
    modes: Vec<FlightMode>,
    closed: bool,
}

/// Default climb rate when no altitude profile is scripted, m per poll.
const DEFAULT_CLIMB_STEP: f32 = 5.0;

impl Default for SimVehicle {
    fn default() -> Self {
        Self::new()
    }
}

impl SimVehicle {
    pub fn new() -> Self {
        Self {
            home: HomeLocation {
                lat: 35.6840715,
                lon: 139.7552347,
                alt: 17.0,
            },
            armable_after_polls: 0,
            arm_delay_polls: 0,
            polls: 0,
            arm_requested_at: None,
            takeoff_target: None,
            relative_alt: 0.0,
            altitude_profile: Vec::new(),
            profile_pos: 0,
            staged: Vec::new(),
            stored: Vec::new(),
            ops: Vec::new(),
            modes: Vec::new(),
            closed: false,
        }
    }

    pub fn with_home(mut self, home: HomeLocation) -> Self {
        self.home = home;
        self
    }

    /// Become armable only after this many telemetry polls.
    pub fn with_armable_after(mut self, polls: u32) -> Self {
        self.armable_after_polls = polls;
        self
    }

    /// Report armed only this many polls after `arm()` is requested.
    pub fn with_arm_delay(mut self, polls: u32) -> Self {
        self.arm_delay_polls = polls;
        self
    }

    /// Script the post-takeoff altitude, one sample per telemetry poll.
    pub fn with_altitude_profile(mut self, profile: Vec<f32>) -> Self {
        self.altitude_profile = profile;
        self
    }

    /// Mission-store operations observed so far, in call order.
    pub fn store_ops(&self) -> &[StoreOp] {
        &self.ops
    }

    /// Modes set so far, in call order.
    pub fn mode_history(&self) -> &[FlightMode] {
        &self.modes
    }

    /// Items currently held by the onboard store.
    pub fn stored_items(&self) -> &[MissionItem] {
        &self.stored
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), LinkError> {
        if self.closed {
            Err(LinkError::Closed)
        } else {
            Ok(())
        }
    }

    fn is_armed(&self) -> bool {
        match self.arm_requested_at {
            Some(at) => self.polls.saturating_sub(at) >= self.arm_delay_polls,
            None => false,
        }
    }

    fn step_altitude(&mut self) {
        let Some(target) = self.takeoff_target else {
            return;
        };
        if !self.altitude_profile.is_empty() {
            self.relative_alt = self.altitude_profile[self.profile_pos];
            if self.profile_pos + 1 < self.altitude_profile.len() {
                self.profile_pos += 1;
            }
        } else {
            self.relative_alt = (self.relative_alt + DEFAULT_CLIMB_STEP).min(target);
        }
    }
}

impl Vehicle for SimVehicle {
    fn telemetry(&mut self) -> Result<Telemetry, LinkError> {
        self.ensure_open()?;
        self.polls += 1;
        if self.is_armed() {
            self.step_altitude();
        }
        Ok(Telemetry {
            armable: self.polls > self.armable_after_polls,
            armed: self.is_armed(),
            relative_alt: self.relative_alt,
        })
    }

    fn set_mode(&mut self, mode: FlightMode) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.modes.push(mode);
        Ok(())
    }

    fn arm(&mut self) -> Result<(), LinkError> {
        self.ensure_open()?;
        if self.arm_requested_at.is_none() {
            self.arm_requested_at = Some(self.polls);
        }
        Ok(())
    }

    fn takeoff(&mut self, altitude_m: f32) -> Result<(), LinkError> {
        self.ensure_open()?;
        if !self.is_armed() {
            return Err(LinkError::Rejected {
                what: "takeoff",
                detail: "not armed".into(),
            });
        }
        self.takeoff_target = Some(altitude_m);
        Ok(())
    }

    fn clear_mission(&mut self) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.ops.push(StoreOp::Clear);
        self.stored.clear();
        self.staged.clear();
        Ok(())
    }

    fn stage_item(&mut self, item: &MissionItem) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.ops.push(StoreOp::Stage(item.seq));
        self.staged.push(*item);
        Ok(())
    }

    fn commit_mission(&mut self) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.ops.push(StoreOp::Commit);
        self.stored = std::mem::take(&mut self.staged);
        Ok(())
    }

    fn download_mission(&mut self) -> Result<Mission, LinkError> {
        self.ensure_open()?;
        self.ops.push(StoreOp::Download);
        Ok(self.stored.iter().copied().collect())
    }

    fn home_location(&mut self) -> Result<HomeLocation, LinkError> {
        self.ensure_open()?;
        Ok(self.home)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
