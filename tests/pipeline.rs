//! End-to-end pipeline tests against the simulated vehicle: decode text,
//! upload, launch, hand off, and export. No network, no real time.

use waypilot::flight::FlightRunner;
use waypilot::link::sim::{SimVehicle, StoreOp};
use waypilot::link::{FlightMode, Vehicle};
use waypilot::sync;
use waypilot_core::flight::FlightConfig;
use waypilot_core::mission::{Command, Frame};
use waypilot_core::timing::MockClock;
use waypilot_core::wpl;

const SINGLE_ITEM: &str = "QGC WPL 110\n0\t1\t0\t16\t0\t0\t0\t0\t35.68\t139.75\t20\t1\n";

const THREE_ITEM: &str = "QGC WPL 110\n\
    0\t1\t3\t22\t0\t0\t0\t0\t0\t0\t20\t1\n\
    1\t0\t3\t16\t0\t0\t0\t0\t35.6845\t139.7552\t25\t1\n\
    2\t0\t3\t20\t0\t0\t0\t0\t0\t0\t0\t1\n";

#[test]
fn decode_matches_spec_example() {
    let mission = wpl::decode(SINGLE_ITEM).unwrap();
    assert_eq!(mission.len(), 1);

    let item = &mission.items()[0];
    assert_eq!(item.seq, 0);
    assert!(item.current);
    assert_eq!(item.frame, Frame::Global);
    assert_eq!(item.command, Command::NavWaypoint);
    assert_eq!(item.params, [0.0, 0.0, 0.0, 0.0, 35.68, 139.75, 20.0]);
    assert!(item.autocontinue);
}

#[test]
fn upload_then_launch_hands_off_to_auto() {
    let mission = wpl::decode(THREE_ITEM).unwrap();

    let mut sim = SimVehicle::new()
        .with_armable_after(3)
        .with_arm_delay(2)
        .with_altitude_profile(vec![0.0, 5.0, 12.0, 19.0, 19.1, 20.0]);

    sync::upload(&mut sim, &mission).unwrap();
    assert_eq!(
        sim.store_ops(),
        &[
            StoreOp::Clear,
            StoreOp::Stage(0),
            StoreOp::Stage(1),
            StoreOp::Stage(2),
            StoreOp::Commit,
        ]
    );

    let clock = MockClock::new();
    let config = FlightConfig::default();
    FlightRunner::new(&clock, config).run(&mut sim).unwrap();

    // Guided for arming, then the autonomous handoff, in that order
    assert_eq!(sim.mode_history(), &[FlightMode::Guided, FlightMode::Auto]);
    // The onboard mission survived the flight phase untouched
    assert_eq!(sim.stored_items().len(), 3);
    assert_eq!(sim.stored_items()[1].latitude(), 35.6845);

    sim.close();
    assert!(sim.is_closed());
}

#[test]
fn exported_mission_round_trips() {
    let mission = wpl::decode(THREE_ITEM).unwrap();
    let mut sim = SimVehicle::new();
    sync::upload(&mut sim, &mission).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.waypoints");
    sync::save(&mut sim, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let reparsed = wpl::decode(&text).unwrap();
    assert_eq!(reparsed.len(), mission.len() + 1); // + synthesized home line

    for (orig, back) in mission.items().iter().zip(&reparsed.items()[1..]) {
        assert_eq!(orig.current, back.current);
        assert_eq!(orig.frame, back.frame);
        assert_eq!(orig.command, back.command);
        assert_eq!(orig.params, back.params);
        assert_eq!(orig.autocontinue, back.autocontinue);
    }
}

#[test]
fn bad_mission_text_never_reaches_the_vehicle() {
    let sim = SimVehicle::new();

    let err = wpl::decode("QGC WPL 109\n0\t1\t0\t16\t0\t0\t0\t0\t1\t2\t3\t1\n").unwrap_err();
    assert_eq!(err, wpl::WplError::UnsupportedVersion);

    // Decode failed, so nothing was uploaded and no store op was recorded
    assert!(sim.store_ops().is_empty());
}
