//! Flight Phase State Machine
//!
//! Drives a vehicle from cold telemetry to autonomous mission execution:
//! wait for armability, arm in a guided mode, take off, confirm cruise
//! altitude, then hand the vehicle over to its own autopilot.
//!
//! The controller is pure: each poll tick it consumes one [`Telemetry`]
//! snapshot (armable/armed/altitude read together, never torn across
//! snapshots) plus the current time, and returns the [`PhaseCommand`] the
//! host layer must execute. The host owns the vehicle link and the sleeps.
//!
//! Every non-terminal phase carries a deadline; a poll condition that never
//! satisfies becomes an explicit [`FlightError::PhaseStall`] instead of an
//! unbounded hang.

use std::fmt;

/// Cruise confirmation threshold: Ascending completes once relative
/// altitude reaches this fraction of the target. Slightly below 1.0 to
/// tolerate sensor noise and control overshoot timing.
pub const CRUISE_ALT_FRACTION: f32 = 0.95;

/// One consistent telemetry snapshot per poll tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telemetry {
    /// Vehicle reports it is ready to be armed
    pub armable: bool,
    /// Motors are armed
    pub armed: bool,
    /// Altitude relative to home, meters
    pub relative_alt: f32,
}

/// Discrete flight phases, in launch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPhase {
    /// Waiting for the vehicle to report armable
    AwaitingInitialisation,
    /// Arm requested, waiting for the armed flag
    Arming,
    /// Takeoff issued, climbing toward target altitude
    Ascending,
    /// Within the cruise tolerance band of the target altitude
    CruiseAltitudeReached,
    /// Vehicle handed over to autonomous mission execution (terminal)
    ModeHandoff,
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightPhase::AwaitingInitialisation => "awaiting-initialisation",
            FlightPhase::Arming => "arming",
            FlightPhase::Ascending => "ascending",
            FlightPhase::CruiseAltitudeReached => "cruise-altitude-reached",
            FlightPhase::ModeHandoff => "mode-handoff",
        };
        f.write_str(name)
    }
}

/// Side effect the host must perform after a poll tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseCommand {
    /// Condition not met yet: sleep one poll interval, poll again
    Wait,
    /// Set the pre-flight guided mode and request arming
    ArmInGuided,
    /// Issue a takeoff to the given altitude (meters)
    Takeoff { altitude: f32 },
    /// Switch the vehicle to its autonomous mission-execution mode
    EngageAuto,
    /// Handoff done; the controller's responsibility ends here
    Complete,
}

/// Flight phase configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightConfig {
    /// Takeoff target altitude, meters relative to home
    pub target_alt: f32,
    /// Poll interval for telemetry-gated phases, milliseconds
    pub poll_interval_ms: u64,
    /// Per-phase deadline, milliseconds; exceeding it is a stall
    pub phase_deadline_ms: u64,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            target_alt: 20.0,
            poll_interval_ms: 1_000,
            phase_deadline_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlightError {
    /// A poll condition did not satisfy within the phase deadline.
    #[error("flight phase `{phase}` stalled after {waited_ms} ms")]
    PhaseStall { phase: FlightPhase, waited_ms: u64 },
}

/// Pre-arm wait, arm, takeoff, cruise confirmation, and mode handoff as an
/// explicit state machine.
#[derive(Debug)]
pub struct FlightPhaseController {
    phase: FlightPhase,
    config: FlightConfig,
    phase_entered_ms: Option<u64>,
}

impl FlightPhaseController {
    pub fn new(config: FlightConfig) -> Self {
        Self {
            phase: FlightPhase::AwaitingInitialisation,
            config,
            phase_entered_ms: None,
        }
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    fn enter(&mut self, phase: FlightPhase, now_ms: u64) {
        self.phase = phase;
        self.phase_entered_ms = Some(now_ms);
    }

    /// Advance one poll tick.
    ///
    /// Returns the command the host must execute before the next tick.
    /// Phase transitions happen here and only here; the same snapshot is
    /// used for every condition evaluated in a tick.
    pub fn advance(
        &mut self,
        telemetry: &Telemetry,
        now_ms: u64,
    ) -> Result<PhaseCommand, FlightError> {
        let entered = *self.phase_entered_ms.get_or_insert(now_ms);
        let waited_ms = now_ms.saturating_sub(entered);
        let stalled = waited_ms > self.config.phase_deadline_ms
            && self.phase != FlightPhase::ModeHandoff;
        if stalled {
            return Err(FlightError::PhaseStall {
                phase: self.phase,
                waited_ms,
            });
        }

        match self.phase {
            FlightPhase::AwaitingInitialisation => {
                if telemetry.armable {
                    self.enter(FlightPhase::Arming, now_ms);
                    Ok(PhaseCommand::ArmInGuided)
                } else {
                    Ok(PhaseCommand::Wait)
                }
            }
            FlightPhase::Arming => {
                if telemetry.armed {
                    self.enter(FlightPhase::Ascending, now_ms);
                    Ok(PhaseCommand::Takeoff {
                        altitude: self.config.target_alt,
                    })
                } else {
                    Ok(PhaseCommand::Wait)
                }
            }
            FlightPhase::Ascending => {
                if telemetry.relative_alt >= CRUISE_ALT_FRACTION * self.config.target_alt {
                    self.enter(FlightPhase::CruiseAltitudeReached, now_ms);
                    Ok(PhaseCommand::Wait)
                } else {
                    Ok(PhaseCommand::Wait)
                }
            }
            FlightPhase::CruiseAltitudeReached => {
                self.enter(FlightPhase::ModeHandoff, now_ms);
                Ok(PhaseCommand::EngageAuto)
            }
            FlightPhase::ModeHandoff => Ok(PhaseCommand::Complete),
        }
    }
}
