//! QGC WPL 110 Waypoint File Codec
//!
//! Parses and serializes the tab-separated waypoint interchange format
//! (<https://mavlink.io/en/file_formats/#mission_plain_text_file>):
//!
//! ```text
//! QGC WPL 110
//! <index>\t<current>\t<frame>\t<command>\t<p1>..<p7>\t<autocontinue>
//! ```
//!
//! # Ordering policy
//!
//! The file index column is parsed for validity but never trusted: decoded
//! items are sequenced 0..N-1 by line order. A file whose lines all carry
//! index 5 still decodes to sequence 0, 1, 2.

use crate::mission::{Command, Frame, HomeLocation, Mission, MissionItem};

/// Header line of the supported waypoint file version. Literal-exact match.
pub const WPL_HEADER: &str = "QGC WPL 110";

/// Data lines carry exactly this many tab-separated fields.
const FIELD_COUNT: usize = 12;

/// Waypoint file format errors. Line numbers are 1-based file lines
/// (the header is line 1).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WplError {
    #[error("unsupported waypoint file version (expected `{WPL_HEADER}` header)")]
    UnsupportedVersion,

    #[error("malformed line {line}: expected {FIELD_COUNT} tab-separated fields")]
    MalformedLine { line: usize },

    #[error("invalid {field} field on line {line}")]
    InvalidField { line: usize, field: &'static str },

    #[error("line {line} marks a second item as current")]
    DuplicateCurrent { line: usize },
}

fn parse_int(raw: &str, line: usize, field: &'static str) -> Result<i64, WplError> {
    raw.trim()
        .parse()
        .map_err(|_| WplError::InvalidField { line, field })
}

fn parse_float(raw: &str, line: usize, field: &'static str) -> Result<f64, WplError> {
    raw.trim()
        .parse()
        .map_err(|_| WplError::InvalidField { line, field })
}

/// Decode waypoint file text into an ordered [`Mission`].
///
/// The first line must equal [`WPL_HEADER`] exactly. Blank lines are
/// skipped. The decoded mission carries no home location: home is supplied
/// by the vehicle at save time, never reconstructed from text.
pub fn decode(text: &str) -> Result<Mission, WplError> {
    let mut lines = text.lines();
    match lines.next() {
        Some(header) if header.trim_end() == WPL_HEADER => {}
        _ => return Err(WplError::UnsupportedVersion),
    }

    let mut mission = Mission::new();
    let mut current_line: Option<usize> = None;
    for (offset, raw_line) in lines.enumerate() {
        let line = offset + 2;
        if raw_line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = raw_line.split('\t').collect();
        if fields.len() < FIELD_COUNT {
            return Err(WplError::MalformedLine { line });
        }

        // Field 0 is the file's own index: validated, then discarded in
        // favor of position-based sequencing.
        parse_int(fields[0], line, "index")?;
        let current = parse_int(fields[1], line, "current")? != 0;
        // Frame and command codes must fit their wire-size integer types.
        let frame = Frame::from_raw(
            u8::try_from(parse_int(fields[2], line, "frame")?)
                .map_err(|_| WplError::InvalidField { line, field: "frame" })?,
        );
        let command = Command::from_raw(
            u16::try_from(parse_int(fields[3], line, "command")?)
                .map_err(|_| WplError::InvalidField { line, field: "command" })?,
        );

        let mut params = [0.0; 7];
        const PARAM_NAMES: [&str; 7] = [
            "param1", "param2", "param3", "param4", "param5", "param6", "param7",
        ];
        for (i, slot) in params.iter_mut().enumerate() {
            *slot = parse_float(fields[4 + i], line, PARAM_NAMES[i])?;
        }
        let autocontinue = parse_int(fields[11], line, "autocontinue")? != 0;

        if current {
            if current_line.is_some() {
                return Err(WplError::DuplicateCurrent { line });
            }
            current_line = Some(line);
        }

        mission.push(MissionItem {
            seq: 0, // assigned by push
            current,
            frame,
            command,
            params,
            autocontinue,
        });
    }

    Ok(mission)
}

fn push_line(out: &mut String, seq: u16, current: bool, frame: u8, command: u16, params: &[f64; 7], autocontinue: bool) {
    out.push_str(&format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        seq,
        current as u8,
        frame,
        command,
        params[0],
        params[1],
        params[2],
        params[3],
        params[4],
        params[5],
        params[6],
        autocontinue as u8,
    ));
}

/// Encode a mission to waypoint file text.
///
/// Emits the header, then a synthesized home line (sequence 0, set-home
/// command, global frame, coordinates from `home`), then one line per item
/// in sequence order. Exact inverse of [`decode`] for decoded items, modulo
/// the home line which decode treats as an ordinary item.
pub fn encode(mission: &Mission, home: &HomeLocation) -> String {
    let mut out = String::new();
    out.push_str(WPL_HEADER);
    out.push('\n');

    push_line(
        &mut out,
        0,
        false,
        Frame::Global.as_raw(),
        Command::DoSetHome.as_raw(),
        &[0.0, 0.0, 0.0, 0.0, home.lat, home.lon, home.alt],
        true,
    );

    for item in mission.items() {
        push_line(
            &mut out,
            item.seq,
            item.current,
            item.frame.as_raw(),
            item.command.as_raw(),
            &item.params,
            item.autocontinue,
        );
    }

    out
}
