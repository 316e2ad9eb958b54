//! Mission Sync
//!
//! Reconciles a decoded mission with the vehicle's onboard mission store.
//! Upload is strictly ordered (clear, append in sequence order, commit) and
//! deliberately not transactional: a commit failure after the clear leaves
//! the vehicle with an empty mission, which is surfaced, never masked.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use waypilot_core::mission::Mission;
use waypilot_core::wpl;

use crate::link::{LinkError, Vehicle};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("mission marks more than one item as current")]
    DuplicateCurrent,

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("failed to write mission file {path}: {source}")]
    Write {
        path: PathBuf,
        source: io::Error,
    },
}

/// Upload a mission to the vehicle's onboard store.
///
/// Protocol order: one clear, one stage per item in sequence order, one
/// commit. No reordering, no retry.
pub fn upload<V: Vehicle + ?Sized>(vehicle: &mut V, mission: &Mission) -> Result<(), SyncError> {
    if mission.validate_current().is_err() {
        return Err(SyncError::DuplicateCurrent);
    }

    tracing::info!(items = mission.len(), "clearing onboard mission");
    vehicle.clear_mission()?;

    for item in mission.items() {
        vehicle.stage_item(item)?;
    }

    tracing::info!("committing mission upload");
    vehicle.commit_mission()?;
    Ok(())
}

/// Download the onboard mission, re-sequenced by arrival order.
pub fn download<V: Vehicle + ?Sized>(vehicle: &mut V) -> Result<Mission, SyncError> {
    tracing::info!("downloading onboard mission");
    let mission = vehicle.download_mission()?;
    // Arrival order is authoritative; rebuild so seq matches position even
    // if the vehicle reported odd sequence values.
    Ok(mission.items().iter().copied().collect())
}

/// Save the onboard mission to a waypoint file.
///
/// Pure composition: download, encode with the vehicle-reported home
/// location, write.
pub fn save<V: Vehicle + ?Sized>(vehicle: &mut V, path: &Path) -> Result<(), SyncError> {
    let mission = download(vehicle)?;
    let home = vehicle.home_location()?;
    let text = wpl::encode(&mission, &home);
    fs::write(path, text).map_err(|source| SyncError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), items = mission.len(), "mission saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::sim::{SimVehicle, StoreOp};
    use waypilot_core::mission::MissionItem;

    fn three_item_mission() -> Mission {
        let mut mission = Mission::new();
        mission.push(MissionItem {
            current: true,
            ..MissionItem::nav_waypoint(35.68, 139.75, 20.0)
        });
        mission.push(MissionItem::nav_waypoint(35.6845, 139.7552, 25.0));
        mission.push(MissionItem::nav_waypoint(35.6850, 139.7560, 20.0));
        mission
    }

    #[test]
    fn test_upload_order_clear_stage_commit() {
        let mut sim = SimVehicle::new();
        let mission = three_item_mission();
        upload(&mut sim, &mission).unwrap();

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
        assert_eq!(sim.stored_items().len(), 3);
    }

    #[test]
    fn test_upload_rejects_duplicate_current() {
        let mut sim = SimVehicle::new();
        let mut mission = three_item_mission();
        mission.push(MissionItem {
            current: true,
            ..MissionItem::nav_waypoint(35.7, 139.8, 20.0)
        });

        assert!(matches!(
            upload(&mut sim, &mission),
            Err(SyncError::DuplicateCurrent)
        ));
        // Nothing touched the store
        assert!(sim.store_ops().is_empty());
    }

    #[test]
    fn test_upload_replaces_previous_mission() {
        let mut sim = SimVehicle::new();
        upload(&mut sim, &three_item_mission()).unwrap();

        let mut second = Mission::new();
        second.push(MissionItem::nav_waypoint(10.0, 20.0, 30.0));
        upload(&mut sim, &second).unwrap();

        assert_eq!(sim.stored_items().len(), 1);
        assert_eq!(sim.stored_items()[0].latitude(), 10.0);
    }

    #[test]
    fn test_download_resequences() {
        let mut sim = SimVehicle::new();
        upload(&mut sim, &three_item_mission()).unwrap();

        let mission = download(&mut sim).unwrap();
        let seqs: Vec<u16> = mission.items().iter().map(|i| i.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_save_writes_waypoint_file() {
        let mut sim = SimVehicle::new();
        upload(&mut sim, &three_item_mission()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exported.waypoints");
        save(&mut sim, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let reparsed = wpl::decode(&text).unwrap();
        // 3 mission items + synthesized home line
        assert_eq!(reparsed.len(), 4);
        assert!(text.starts_with("QGC WPL 110\n"));
    }

    #[test]
    fn test_closed_link_surfaces_as_link_error() {
        let mut sim = SimVehicle::new();
        sim.close();
        assert!(matches!(
            upload(&mut sim, &three_item_mission()),
            Err(SyncError::Link(LinkError::Closed))
        ));
    }
}
