//! Mission Data Model
//!
//! Ordered mission item storage shared by the waypoint file codec, the
//! upload/download sync layer, and the flight-phase controller.
//!
//! # Ordering
//!
//! A mission is an ordered sequence: item order defines flight path order.
//! Sequence numbers are assigned by position when an item is pushed; any
//! sequence value carried by a serialized form is never trusted.

/// Reference frame for a mission item (MAV_FRAME numeric space).
///
/// Unrecognized frame codes are preserved verbatim via [`Frame::Other`] so a
/// decode/encode round trip never loses information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// MAV_FRAME_GLOBAL (0): WGS84 coordinates, altitude above MSL
    Global,
    /// MAV_FRAME_LOCAL_NED (1)
    LocalNed,
    /// MAV_FRAME_MISSION (2): command with no coordinate meaning
    Mission,
    /// MAV_FRAME_GLOBAL_RELATIVE_ALT (3): altitude relative to home
    GlobalRelativeAlt,
    /// Any other frame code
    Other(u8),
}

impl Frame {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Frame::Global,
            1 => Frame::LocalNed,
            2 => Frame::Mission,
            3 => Frame::GlobalRelativeAlt,
            other => Frame::Other(other),
        }
    }

    pub fn as_raw(self) -> u8 {
        match self {
            Frame::Global => 0,
            Frame::LocalNed => 1,
            Frame::Mission => 2,
            Frame::GlobalRelativeAlt => 3,
            Frame::Other(raw) => raw,
        }
    }
}

/// MAV_CMD_NAV_LAST: command IDs at or below this value are NAV commands
/// and carry a geographic location in params 5..7.
pub const MAV_CMD_NAV_LAST: u16 = 95;

/// Mission command identifier (MAV_CMD numeric space).
///
/// Only the commands this tool actually reasons about get named variants;
/// everything else rides along as [`Command::Other`] with its raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// MAV_CMD_NAV_WAYPOINT (16)
    NavWaypoint,
    /// MAV_CMD_NAV_RETURN_TO_LAUNCH (20)
    NavReturnToLaunch,
    /// MAV_CMD_NAV_LAND (21)
    NavLand,
    /// MAV_CMD_NAV_TAKEOFF (22)
    NavTakeoff,
    /// MAV_CMD_DO_SET_HOME (179)
    DoSetHome,
    /// Any other command code
    Other(u16),
}

impl Command {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            16 => Command::NavWaypoint,
            20 => Command::NavReturnToLaunch,
            21 => Command::NavLand,
            22 => Command::NavTakeoff,
            179 => Command::DoSetHome,
            other => Command::Other(other),
        }
    }

    pub fn as_raw(self) -> u16 {
        match self {
            Command::NavWaypoint => 16,
            Command::NavReturnToLaunch => 20,
            Command::NavLand => 21,
            Command::NavTakeoff => 22,
            Command::DoSetHome => 179,
            Command::Other(raw) => raw,
        }
    }

    /// NAV commands (0..=95) drive vehicle navigation; higher codes are
    /// DO/condition commands.
    pub fn is_nav(self) -> bool {
        self.as_raw() <= MAV_CMD_NAV_LAST
    }
}

/// One waypoint/command entry in a mission sequence.
///
/// All seven parameters are always present; semantics depend on the command
/// (for NAV commands params\[4..7\] are latitude/longitude/altitude). Unused
/// parameters are zero-filled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionItem {
    /// 0-based position in the mission sequence
    pub seq: u16,
    /// Item executed first when the mission starts (at most one per mission)
    pub current: bool,
    pub frame: Frame,
    pub command: Command,
    /// param1..param7, command-specific
    pub params: [f64; 7],
    /// Proceed to the next item automatically on completion
    pub autocontinue: bool,
}

impl Default for MissionItem {
    fn default() -> Self {
        Self {
            seq: 0,
            current: false,
            frame: Frame::Global,
            command: Command::NavWaypoint,
            params: [0.0; 7],
            autocontinue: true,
        }
    }
}

impl MissionItem {
    /// Create a relative-altitude NAV waypoint at the given coordinates.
    pub fn nav_waypoint(lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            frame: Frame::GlobalRelativeAlt,
            command: Command::NavWaypoint,
            params: [0.0, 0.0, 0.0, 0.0, lat, lon, alt],
            ..Self::default()
        }
    }

    /// Latitude in degrees (param5). Meaningful for NAV commands only.
    pub fn latitude(&self) -> f64 {
        self.params[4]
    }

    /// Longitude in degrees (param6). Meaningful for NAV commands only.
    pub fn longitude(&self) -> f64 {
        self.params[5]
    }

    /// Altitude in meters (param7), interpreted per `frame`.
    pub fn altitude(&self) -> f64 {
        self.params[6]
    }
}

/// Home/launch location, as reported by the vehicle.
///
/// Only used when serializing a mission back to file form; decoding never
/// reconstructs a home location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeLocation {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// Ordered mission item sequence.
///
/// [`Mission::push`] reassigns each item's `seq` to its 0-based position, so
/// insertion order is the single source of truth for execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mission {
    items: Vec<MissionItem>,
}

impl Mission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item, overwriting its sequence number with its position.
    pub fn push(&mut self, mut item: MissionItem) {
        item.seq = self.items.len() as u16;
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[MissionItem] {
        &self.items
    }

    /// Number of items flagged as current (a well-formed mission has 0 or 1).
    pub fn current_count(&self) -> usize {
        self.items.iter().filter(|item| item.current).count()
    }

    /// Check the at-most-one-current invariant.
    pub fn validate_current(&self) -> Result<(), &'static str> {
        if self.current_count() > 1 {
            Err("more than one mission item marked current")
        } else {
            Ok(())
        }
    }
}

impl FromIterator<MissionItem> for Mission {
    fn from_iter<I: IntoIterator<Item = MissionItem>>(iter: I) -> Self {
        let mut mission = Mission::new();
        for item in iter {
            mission.push(item);
        }
        mission
    }
}
