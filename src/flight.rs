//! Flight Runner
//!
//! Drives the pure flight-phase controller against a live vehicle: polls
//! one telemetry snapshot per tick, executes the controller's commands,
//! sleeps the poll interval via the injected clock.
//!
//! Failure policy follows the phase: before takeoff every error aborts the
//! run; once the vehicle is climbing, errors leave it in its current
//! autonomous-capable state and no recovery commands are attempted.

use waypilot_core::flight::{
    FlightConfig, FlightError, FlightPhase, FlightPhaseController, PhaseCommand,
};
use waypilot_core::timing::Clock;

use crate::link::{FlightMode, LinkError, Vehicle};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Phase(#[from] FlightError),
}

/// Polls telemetry and executes phase commands until handoff.
pub struct FlightRunner<'c, C: Clock> {
    clock: &'c C,
    config: FlightConfig,
}

impl<'c, C: Clock> FlightRunner<'c, C> {
    pub fn new(clock: &'c C, config: FlightConfig) -> Self {
        Self { clock, config }
    }

    /// Run the launch sequence to completion: wait armable, arm in guided,
    /// take off, confirm cruise altitude, engage the autonomous mode.
    pub fn run<V: Vehicle + ?Sized>(&self, vehicle: &mut V) -> Result<(), RunError> {
        let mut controller = FlightPhaseController::new(self.config);

        loop {
            let telemetry = vehicle.telemetry().map_err(|e| self.note_abort(&controller, e))?;
            let command = controller.advance(&telemetry, self.clock.now_ms())?;

            match command {
                PhaseCommand::Wait => {
                    tracing::debug!(
                        phase = %controller.phase(),
                        altitude = telemetry.relative_alt,
                        "waiting"
                    );
                    self.clock.sleep_ms(self.config.poll_interval_ms);
                }
                PhaseCommand::ArmInGuided => {
                    vehicle
                        .set_mode(FlightMode::Guided)
                        .map_err(|e| self.note_abort(&controller, e))?;
                    vehicle.arm().map_err(|e| self.note_abort(&controller, e))?;
                }
                PhaseCommand::Takeoff { altitude } => {
                    vehicle
                        .takeoff(altitude)
                        .map_err(|e| self.note_abort(&controller, e))?;
                }
                PhaseCommand::EngageAuto => {
                    vehicle
                        .set_mode(FlightMode::Auto)
                        .map_err(|e| self.note_abort(&controller, e))?;
                }
                PhaseCommand::Complete => {
                    tracing::info!("mode handoff complete; autopilot owns the mission");
                    return Ok(());
                }
            }
        }
    }

    fn note_abort(&self, controller: &FlightPhaseController, error: LinkError) -> LinkError {
        if airborne(controller.phase()) {
            tracing::warn!(
                phase = %controller.phase(),
                "link failure while airborne; leaving vehicle in its current state"
            );
        }
        error
    }
}

/// Past the takeoff command the vehicle may be off the ground.
fn airborne(phase: FlightPhase) -> bool {
    matches!(
        phase,
        FlightPhase::Ascending | FlightPhase::CruiseAltitudeReached | FlightPhase::ModeHandoff
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::sim::SimVehicle;
    use waypilot_core::timing::MockClock;

    fn runner_config() -> FlightConfig {
        FlightConfig {
            target_alt: 20.0,
            poll_interval_ms: 1_000,
            phase_deadline_ms: 30_000,
        }
    }

    #[test]
    fn test_full_launch_sequence() {
        let clock = MockClock::new();
        let mut sim = SimVehicle::new()
            .with_armable_after(2)
            .with_arm_delay(1)
            .with_altitude_profile(vec![0.0, 5.0, 12.0, 19.0, 19.1, 20.0]);

        let runner = FlightRunner::new(&clock, runner_config());
        runner.run(&mut sim).unwrap();

        assert_eq!(
            sim.mode_history(),
            &[FlightMode::Guided, FlightMode::Auto]
        );
        // Runner slept at least once per gated wait
        assert!(!clock.sleeps().is_empty());
    }

    #[test]
    fn test_stall_when_never_armable() {
        let clock = MockClock::new();
        let mut sim = SimVehicle::new().with_armable_after(u32::MAX);

        let config = FlightConfig {
            phase_deadline_ms: 5_000,
            ..runner_config()
        };
        let runner = FlightRunner::new(&clock, config);
        let err = runner.run(&mut sim).unwrap_err();
        assert!(matches!(
            err,
            RunError::Phase(FlightError::PhaseStall {
                phase: FlightPhase::AwaitingInitialisation,
                ..
            })
        ));
    }

    #[test]
    fn test_closed_link_aborts_run() {
        let clock = MockClock::new();
        let mut sim = SimVehicle::new();
        sim.close();

        let runner = FlightRunner::new(&clock, runner_config());
        assert!(matches!(
            runner.run(&mut sim),
            Err(RunError::Link(LinkError::Closed))
        ));
    }
}
