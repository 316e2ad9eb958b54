//! MAVLink Vehicle Handle
//!
//! [`Vehicle`] implementation over a `mavlink::connect` transport
//! (`udpin:`/`udpout:`/`tcpout:`/serial target strings). Framing belongs to
//! the `mavlink` crate; this module only speaks the message level:
//!
//! - telemetry digestion: HEARTBEAT / GLOBAL_POSITION_INT / HOME_POSITION
//! - commands: COMMAND_LONG with COMMAND_ACK wait
//! - mission microservice, GCS side: clear, count/request/item handshake
//!   for upload, request-list/count/item handshake for download
//!
//! Every exchange carries a deadline. Incoming frames are drained by a
//! background reader thread and taken through a channel, so the deadline
//! bounds the wait even when the link goes completely silent.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mavlink::common::{
    MavCmd, MavFrame, MavMessage, MavMissionResult, MavModeFlag, MavResult, MavState,
    COMMAND_LONG_DATA, MISSION_ACK_DATA, MISSION_CLEAR_ALL_DATA, MISSION_COUNT_DATA,
    MISSION_ITEM_INT_DATA, MISSION_REQUEST_INT_DATA, MISSION_REQUEST_LIST_DATA,
};
use mavlink::error::MessageReadError;
use mavlink::{MavConnection, MavHeader};
use num_traits::FromPrimitive;

use waypilot_core::flight::Telemetry;
use waypilot_core::mission::{Command, Frame, HomeLocation, Mission, MissionItem};

use super::{FlightMode, LinkError, Vehicle};

/// Our end of the link: standard GCS system / Mission Planner component IDs.
const GCS_SYSTEM_ID: u8 = 255;
const GCS_COMPONENT_ID: u8 = 190;

/// MAV_COMP_ID_AUTOPILOT1: the flight controller component we talk to.
const AUTOPILOT_COMPONENT_ID: u8 = 1;

/// Default per-exchange deadline.
const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Scaling between decimal degrees and MISSION_ITEM_INT fixed-point.
const DEG_TO_E7: f64 = 1e7;

/// Telemetry fields digested from the vehicle's stream.
#[derive(Debug, Clone, Copy, Default)]
struct VehicleState {
    armable: bool,
    armed: bool,
    relative_alt: f32,
    home: Option<HomeLocation>,
}

/// Live vehicle over a MAVLink connection.
///
/// Sends go straight to the transport; receives come from a reader thread
/// through `inbox`, so every receive wait can carry a hard timeout.
pub struct MavlinkVehicle {
    conn: Arc<dyn MavConnection<MavMessage> + Sync + Send>,
    inbox: mpsc::Receiver<(MavHeader, MavMessage)>,
    sequence: u8,
    target_system: u8,
    target_component: u8,
    state: VehicleState,
    staged: Vec<MissionItem>,
    exchange_timeout: Duration,
    closed: bool,
}

impl std::fmt::Debug for MavlinkVehicle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MavlinkVehicle")
            .field("sequence", &self.sequence)
            .field("target_system", &self.target_system)
            .field("target_component", &self.target_component)
            .field("state", &self.state)
            .field("staged", &self.staged)
            .field("exchange_timeout", &self.exchange_timeout)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl MavlinkVehicle {
    /// Connect to `target` and wait for the first autopilot heartbeat.
    ///
    /// The heartbeat identifies the vehicle's system ID and proves the link
    /// is alive before any command is attempted.
    pub fn connect(target: &str) -> Result<Self, LinkError> {
        Self::connect_with_timeout(target, DEFAULT_EXCHANGE_TIMEOUT)
    }

    /// [`connect`](Self::connect) with an explicit per-exchange timeout.
    pub fn connect_with_timeout(
        target: &str,
        exchange_timeout: Duration,
    ) -> Result<Self, LinkError> {
        let conn: Arc<dyn MavConnection<MavMessage> + Sync + Send> = Arc::from(
            mavlink::connect::<MavMessage>(target).map_err(|e| LinkError::Connect(e.to_string()))?,
        );
        let inbox = spawn_reader(Arc::clone(&conn));

        let mut vehicle = Self {
            conn,
            inbox,
            sequence: 0,
            target_system: 0,
            target_component: AUTOPILOT_COMPONENT_ID,
            state: VehicleState::default(),
            staged: Vec::new(),
            exchange_timeout,
            closed: false,
        };

        let deadline = Instant::now() + vehicle.exchange_timeout;
        loop {
            let (header, msg) = vehicle.recv_raw(deadline, "first heartbeat")?;
            if let MavMessage::HEARTBEAT(_) = &msg {
                if header.component_id == AUTOPILOT_COMPONENT_ID {
                    vehicle.target_system = header.system_id;
                    vehicle.digest(&msg);
                    tracing::info!(
                        system = header.system_id,
                        "connected to vehicle on {target}"
                    );
                    return Ok(vehicle);
                }
            }
        }
    }

    fn ensure_open(&self) -> Result<(), LinkError> {
        if self.closed {
            Err(LinkError::Closed)
        } else {
            Ok(())
        }
    }

    fn next_header(&mut self) -> MavHeader {
        let header = MavHeader {
            system_id: GCS_SYSTEM_ID,
            component_id: GCS_COMPONENT_ID,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    fn send(&mut self, msg: MavMessage) -> Result<(), LinkError> {
        let header = self.next_header();
        self.conn
            .send(&header, &msg)
            .map_err(|e| LinkError::Proto(format!("send failed: {e:?}")))?;
        Ok(())
    }

    /// Take the next received frame from the reader thread, or time out at
    /// `deadline`. The timeout fires even when the wire carries nothing.
    fn recv_raw(
        &mut self,
        deadline: Instant,
        what: &'static str,
    ) -> Result<(MavHeader, MavMessage), LinkError> {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or(LinkError::Timeout(what))?;
        match self.inbox.recv_timeout(remaining) {
            Ok(pair) => Ok(pair),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(LinkError::Timeout(what)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(LinkError::Proto("receive stream ended".into()))
            }
        }
    }

    /// Receive the next message from our vehicle, digesting telemetry as a
    /// side effect.
    fn recv_within(
        &mut self,
        deadline: Instant,
        what: &'static str,
    ) -> Result<MavMessage, LinkError> {
        loop {
            let (header, msg) = self.recv_raw(deadline, what)?;
            if header.system_id != self.target_system {
                continue;
            }
            self.digest(&msg);
            return Ok(msg);
        }
    }

    fn digest(&mut self, msg: &MavMessage) {
        match msg {
            MavMessage::HEARTBEAT(hb) => {
                self.state.armed = hb
                    .base_mode
                    .contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
                // STANDBY means pre-arm checks passed and the vehicle is
                // ready to arm; ACTIVE means it already flies.
                self.state.armable = matches!(
                    hb.system_status,
                    MavState::MAV_STATE_STANDBY | MavState::MAV_STATE_ACTIVE
                );
            }
            MavMessage::GLOBAL_POSITION_INT(pos) => {
                self.state.relative_alt = pos.relative_alt as f32 / 1000.0;
            }
            MavMessage::HOME_POSITION(home) => {
                self.state.home = Some(HomeLocation {
                    lat: home.latitude as f64 / DEG_TO_E7,
                    lon: home.longitude as f64 / DEG_TO_E7,
                    alt: home.altitude as f64 / 1000.0,
                });
            }
            _ => {}
        }
    }

    /// Send a COMMAND_LONG and wait for its COMMAND_ACK.
    fn command_long(
        &mut self,
        command: MavCmd,
        params: [f32; 7],
        what: &'static str,
    ) -> Result<(), LinkError> {
        self.send(MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
            command,
            target_system: self.target_system,
            target_component: self.target_component,
            confirmation: 0,
            ..Default::default()
        }))?;

        let deadline = Instant::now() + self.exchange_timeout;
        loop {
            if let MavMessage::COMMAND_ACK(ack) = self.recv_within(deadline, what)? {
                if ack.command != command {
                    continue;
                }
                match ack.result {
                    MavResult::MAV_RESULT_ACCEPTED => return Ok(()),
                    MavResult::MAV_RESULT_IN_PROGRESS => continue,
                    other => {
                        return Err(LinkError::Rejected {
                            what,
                            detail: format!("{other:?}"),
                        })
                    }
                }
            }
        }
    }

    /// Answer one upload-side item request from the staged mission.
    fn send_staged_item(&mut self, seq: u16) -> Result<(), LinkError> {
        let item = self
            .staged
            .get(seq as usize)
            .copied()
            .ok_or_else(|| LinkError::Proto(format!("vehicle requested unknown seq {seq}")))?;
        let wire = item_to_wire(&item, self.target_system, self.target_component)?;
        self.send(MavMessage::MISSION_ITEM_INT(wire))
    }

    fn wait_mission_ack(&mut self, what: &'static str) -> Result<(), LinkError> {
        let deadline = Instant::now() + self.exchange_timeout;
        loop {
            if let MavMessage::MISSION_ACK(ack) = self.recv_within(deadline, what)? {
                return match ack.mavtype {
                    MavMissionResult::MAV_MISSION_ACCEPTED => Ok(()),
                    other => Err(LinkError::Rejected {
                        what,
                        detail: format!("{other:?}"),
                    }),
                };
            }
        }
    }
}

/// Drain the connection on a dedicated thread into a channel.
///
/// The thread exits when the transport fails or when the receiving handle
/// is dropped; transient IO conditions are retried in place.
fn spawn_reader(
    conn: Arc<dyn MavConnection<MavMessage> + Sync + Send>,
) -> mpsc::Receiver<(MavHeader, MavMessage)> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || loop {
        match conn.recv() {
            Ok(pair) => {
                if tx.send(pair).is_err() {
                    return;
                }
            }
            Err(MessageReadError::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(_) => return,
        }
    });
    rx
}

/// Convert a mission item to its MISSION_ITEM_INT wire form.
fn item_to_wire(
    item: &MissionItem,
    target_system: u8,
    target_component: u8,
) -> Result<MISSION_ITEM_INT_DATA, LinkError> {
    let frame = MavFrame::from_u8(item.frame.as_raw()).ok_or_else(|| {
        LinkError::Proto(format!("frame {} has no wire mapping", item.frame.as_raw()))
    })?;
    let command = MavCmd::from_u16(item.command.as_raw()).ok_or_else(|| {
        LinkError::Proto(format!(
            "command {} has no wire mapping",
            item.command.as_raw()
        ))
    })?;

    Ok(MISSION_ITEM_INT_DATA {
        param1: item.params[0] as f32,
        param2: item.params[1] as f32,
        param3: item.params[2] as f32,
        param4: item.params[3] as f32,
        x: (item.params[4] * DEG_TO_E7).round() as i32,
        y: (item.params[5] * DEG_TO_E7).round() as i32,
        z: item.params[6] as f32,
        seq: item.seq,
        command,
        target_system,
        target_component,
        frame,
        current: item.current as u8,
        autocontinue: item.autocontinue as u8,
        ..Default::default()
    })
}

/// Convert a received MISSION_ITEM_INT back to a mission item.
fn wire_to_item(data: &MISSION_ITEM_INT_DATA) -> MissionItem {
    MissionItem {
        seq: data.seq,
        current: data.current != 0,
        frame: Frame::from_raw(data.frame as u8),
        command: Command::from_raw(data.command as u16),
        params: [
            data.param1 as f64,
            data.param2 as f64,
            data.param3 as f64,
            data.param4 as f64,
            data.x as f64 / DEG_TO_E7,
            data.y as f64 / DEG_TO_E7,
            data.z as f64,
        ],
        autocontinue: data.autocontinue != 0,
    }
}

impl Vehicle for MavlinkVehicle {
    fn telemetry(&mut self) -> Result<Telemetry, LinkError> {
        self.ensure_open()?;
        // Pump the stream up to the next heartbeat so armable/armed/altitude
        // come from one coherent slice of the stream.
        let deadline = Instant::now() + self.exchange_timeout;
        loop {
            if let MavMessage::HEARTBEAT(_) = self.recv_within(deadline, "telemetry heartbeat")? {
                return Ok(Telemetry {
                    armable: self.state.armable,
                    armed: self.state.armed,
                    relative_alt: self.state.relative_alt,
                });
            }
        }
    }

    fn set_mode(&mut self, mode: FlightMode) -> Result<(), LinkError> {
        self.ensure_open()?;
        tracing::info!(mode = mode.name(), "setting flight mode");
        // param1: MAV_MODE_FLAG_CUSTOM_MODE_ENABLED, param2: custom mode
        self.command_long(
            MavCmd::MAV_CMD_DO_SET_MODE,
            [1.0, mode.custom_mode() as f32, 0.0, 0.0, 0.0, 0.0, 0.0],
            "set mode",
        )
    }

    fn arm(&mut self) -> Result<(), LinkError> {
        self.ensure_open()?;
        tracing::info!("requesting arm");
        self.command_long(
            MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            "arm",
        )
    }

    fn takeoff(&mut self, altitude_m: f32) -> Result<(), LinkError> {
        self.ensure_open()?;
        tracing::info!(altitude_m, "commanding takeoff");
        self.command_long(
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, altitude_m],
            "takeoff",
        )
    }

    fn clear_mission(&mut self) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.send(MavMessage::MISSION_CLEAR_ALL(MISSION_CLEAR_ALL_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            ..Default::default()
        }))?;
        self.wait_mission_ack("mission clear ack")
    }

    fn stage_item(&mut self, item: &MissionItem) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.staged.push(*item);
        Ok(())
    }

    fn commit_mission(&mut self) -> Result<(), LinkError> {
        self.ensure_open()?;
        let count = self.staged.len() as u16;
        self.send(MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
            count,
            target_system: self.target_system,
            target_component: self.target_component,
            ..Default::default()
        }))?;

        // The vehicle pulls items by sequence, in any order it likes, and
        // closes the exchange with MISSION_ACK.
        let deadline = Instant::now() + self.exchange_timeout;
        loop {
            match self.recv_within(deadline, "mission upload")? {
                MavMessage::MISSION_REQUEST_INT(req) => self.send_staged_item(req.seq)?,
                // Old-style float request; answer with the INT item, which
                // current autopilots accept.
                MavMessage::MISSION_REQUEST(req) => self.send_staged_item(req.seq)?,
                MavMessage::MISSION_ACK(ack) => {
                    self.staged.clear();
                    return match ack.mavtype {
                        MavMissionResult::MAV_MISSION_ACCEPTED => Ok(()),
                        other => Err(LinkError::Rejected {
                            what: "mission upload",
                            detail: format!("{other:?}"),
                        }),
                    };
                }
                _ => {}
            }
        }
    }

    fn download_mission(&mut self) -> Result<Mission, LinkError> {
        self.ensure_open()?;
        self.send(MavMessage::MISSION_REQUEST_LIST(MISSION_REQUEST_LIST_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            ..Default::default()
        }))?;

        let deadline = Instant::now() + self.exchange_timeout;
        let count = loop {
            if let MavMessage::MISSION_COUNT(c) = self.recv_within(deadline, "mission count")? {
                break c.count;
            }
        };

        let mut mission = Mission::new();
        for seq in 0..count {
            self.send(MavMessage::MISSION_REQUEST_INT(MISSION_REQUEST_INT_DATA {
                seq,
                target_system: self.target_system,
                target_component: self.target_component,
                ..Default::default()
            }))?;
            let deadline = Instant::now() + self.exchange_timeout;
            loop {
                if let MavMessage::MISSION_ITEM_INT(data) =
                    self.recv_within(deadline, "mission item")?
                {
                    if data.seq == seq {
                        mission.push(wire_to_item(&data));
                        break;
                    }
                }
            }
        }

        self.send(MavMessage::MISSION_ACK(MISSION_ACK_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            mavtype: MavMissionResult::MAV_MISSION_ACCEPTED,
            ..Default::default()
        }))?;
        Ok(mission)
    }

    fn home_location(&mut self) -> Result<HomeLocation, LinkError> {
        self.ensure_open()?;
        if let Some(home) = self.state.home {
            return Ok(home);
        }
        self.command_long(
            MavCmd::MAV_CMD_GET_HOME_POSITION,
            [0.0; 7],
            "home position request",
        )?;
        let deadline = Instant::now() + self.exchange_timeout;
        loop {
            // digest() captures HOME_POSITION as a side effect
            self.recv_within(deadline, "home position")?;
            if let Some(home) = self.state.home {
                return Ok(home);
            }
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            tracing::info!("vehicle link released");
        }
    }
}

impl Drop for MavlinkVehicle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_to_wire_scales_coordinates() {
        let item = MissionItem {
            current: true,
            ..MissionItem::nav_waypoint(35.68, 139.75, 20.0)
        };
        let wire = item_to_wire(&item, 1, 1).unwrap();
        assert_eq!(wire.x, 356_800_000);
        assert_eq!(wire.y, 1_397_500_000);
        assert_eq!(wire.z, 20.0);
        assert_eq!(wire.current, 1);
        assert_eq!(wire.autocontinue, 1);
        assert_eq!(wire.command, MavCmd::MAV_CMD_NAV_WAYPOINT);
        assert_eq!(wire.frame, MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT);
    }

    #[test]
    fn test_wire_round_trip() {
        let item = MissionItem {
            seq: 3,
            current: false,
            frame: Frame::GlobalRelativeAlt,
            command: Command::NavTakeoff,
            params: [0.0, 0.0, 0.0, 0.0, 35.6840715, 139.7552347, 20.0],
            autocontinue: true,
        };
        let wire = item_to_wire(&item, 1, 1).unwrap();
        let back = wire_to_item(&wire);
        assert_eq!(back.seq, 3);
        assert_eq!(back.command, Command::NavTakeoff);
        assert!((back.latitude() - item.latitude()).abs() < 1e-7);
        assert!((back.longitude() - item.longitude()).abs() < 1e-7);
        assert_eq!(back.altitude(), 20.0);
    }

    #[test]
    fn test_item_to_wire_rejects_unmappable_command() {
        let item = MissionItem {
            command: Command::Other(65_000),
            ..MissionItem::default()
        };
        assert!(matches!(
            item_to_wire(&item, 1, 1),
            Err(LinkError::Proto(_))
        ));
    }

    #[test]
    fn test_connect_times_out_on_silent_link() {
        // A bound port that never transmits: the heartbeat wait must come
        // back as a timeout instead of blocking forever.
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = socket.local_addr().unwrap().port();
        let target = format!("udpout:127.0.0.1:{port}");

        let start = Instant::now();
        let err = MavlinkVehicle::connect_with_timeout(&target, Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, LinkError::Timeout("first heartbeat")));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_flight_mode_numbers() {
        assert_eq!(FlightMode::Guided.custom_mode(), 4);
        assert_eq!(FlightMode::Auto.custom_mode(), 3);
        assert_eq!(FlightMode::Auto.name(), "AUTO");
    }
}
