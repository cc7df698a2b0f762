//! Geometry command stream layout checks.
//!
//! Feature geometry is a sequence of `u32` values. Each command integer packs
//! a command id in the low 3 bits and a repeat count in the rest, followed by
//! `2 * count` zig-zag encoded parameters holding cursor deltas:
//!
//! | Id | Command   | Parameters |
//! |----|-----------|------------|
//! | 1  | MoveTo    | dx, dy     |
//! | 2  | LineTo    | dx, dy     |
//! | 7  | ClosePath | none       |
//!
//! Decoding itself goes through geozero's reader, which indexes the stream
//! without bounds checks. [`check_layout`] must accept a stream before it is
//! handed over.

use serde::{Deserialize, Serialize};

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// Largest cursor position accepted on either axis. The reader keeps the
/// cursor and ring areas in `i32`.
const MAX_COORDINATE: i64 = 1 << 14;

/// Geometry type declared by a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    /// One or more points.
    Point,
    /// One or more line strings.
    LineString,
    /// One or more polygons.
    Polygon,
}

fn command_name(id: u32) -> &'static str {
    match id {
        CMD_MOVE_TO => "MoveTo",
        CMD_LINE_TO => "LineTo",
        CMD_CLOSE_PATH => "ClosePath",
        _ => "unknown command",
    }
}

struct Stream<'a> {
    commands: &'a [u32],
    position: usize,
    cursor: (i64, i64),
}

impl<'a> Stream<'a> {
    fn new(commands: &'a [u32]) -> Self {
        Self {
            commands,
            position: 0,
            cursor: (0, 0),
        }
    }

    fn at_end(&self) -> bool {
        self.position >= self.commands.len()
    }

    /// Consume a command integer with the given id and return its count.
    fn command(&mut self, expected: u32) -> Result<usize, String> {
        let position = self.position;
        let header = *self.commands.get(position).ok_or_else(|| {
            format!("stream ends at position {} where {} was expected", position, command_name(expected))
        })?;
        let (id, count) = (header & 0x7, (header >> 3) as usize);

        if id != expected {
            return Err(format!(
                "{} (id {}) at position {} where {} was expected",
                command_name(id),
                id,
                position,
                command_name(expected)
            ));
        }
        if count == 0 {
            return Err(format!("{} with zero count at position {}", command_name(id), position));
        }
        self.position += 1;
        Ok(count)
    }

    /// Consume `pairs` coordinate deltas, tracking the cursor.
    fn parameters(&mut self, pairs: usize) -> Result<(), String> {
        let available = (self.commands.len() - self.position) / 2;
        if available < pairs {
            return Err(format!(
                "{} coordinate pairs needed at position {}, only {} present",
                pairs, self.position, available
            ));
        }
        let commands = self.commands;
        for pair in commands[self.position..self.position + 2 * pairs].chunks_exact(2) {
            self.cursor.0 += zigzag_decode(pair[0]);
            self.cursor.1 += zigzag_decode(pair[1]);
            if self.cursor.0.abs() > MAX_COORDINATE || self.cursor.1.abs() > MAX_COORDINATE {
                return Err(format!(
                    "coordinate ({}, {}) out of range at position {}",
                    self.cursor.0, self.cursor.1, self.position
                ));
            }
            self.position += 2;
        }
        Ok(())
    }

    /// One `MoveTo(1) LineTo(n)` run, optionally closed.
    fn path(&mut self, closed: bool) -> Result<(), String> {
        let start = self.position;
        if self.command(CMD_MOVE_TO)? != 1 {
            return Err(format!("path at position {} must start with a single MoveTo", start));
        }
        self.parameters(1)?;
        let count = self.command(CMD_LINE_TO)?;
        self.parameters(count)?;
        if closed && self.command(CMD_CLOSE_PATH)? != 1 {
            return Err(format!("ClosePath with count other than 1 in ring at position {}", start));
        }
        Ok(())
    }
}

/// Check that a non-empty command stream has the layout its geometry kind
/// requires.
///
/// Points are a single `MoveTo(n)` with exactly `n` pairs. Lines are runs of
/// `MoveTo(1) LineTo(n)` and polygon rings the same followed by
/// `ClosePath(1)`. Nothing may trail the last command.
pub(crate) fn check_layout(kind: GeometryKind, commands: &[u32]) -> Result<(), String> {
    let mut stream = Stream::new(commands);
    match kind {
        GeometryKind::Point => {
            let count = stream.command(CMD_MOVE_TO)?;
            stream.parameters(count)?;
        }
        GeometryKind::LineString | GeometryKind::Polygon => {
            let closed = kind == GeometryKind::Polygon;
            while !stream.at_end() {
                stream.path(closed)?;
            }
        }
    }
    if !stream.at_end() {
        return Err(format!(
            "{} trailing values after position {}",
            commands.len() - stream.position,
            stream.position
        ));
    }
    Ok(())
}

fn zigzag_decode(value: u32) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    // (10,10) -> (30,10) -> (30,30) -> (10,30), closed
    const SQUARE: [u32; 11] = [9, 20, 20, 26, 40, 0, 0, 40, 39, 0, 15];

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_decode(0), 0);
        assert_eq!(zigzag_decode(1), -1);
        assert_eq!(zigzag_decode(2), 1);
        assert_eq!(zigzag_decode(39), -20);
    }

    #[test]
    fn test_accepts_well_formed_streams() {
        assert!(check_layout(GeometryKind::Polygon, &SQUARE).is_ok());
        // Two rings back to back
        let two: Vec<u32> = SQUARE.iter().chain(SQUARE.iter()).copied().collect();
        assert!(check_layout(GeometryKind::Polygon, &two).is_ok());
        // Open line, same vertices
        assert!(check_layout(GeometryKind::LineString, &SQUARE[..10]).is_ok());
        // MoveTo count 2: (5,7), (8,9)
        assert!(check_layout(GeometryKind::Point, &[17, 10, 14, 6, 4]).is_ok());
    }

    #[test]
    fn test_malformed_streams_fail() {
        // Truncated parameters
        assert!(check_layout(GeometryKind::Polygon, &[9, 20]).is_err());
        assert!(check_layout(GeometryKind::Point, &[9, 20]).is_err());
        // LineTo first
        assert!(check_layout(GeometryKind::LineString, &[10, 2, 2]).is_err());
        // Unknown command id 3
        assert!(check_layout(GeometryKind::Point, &[11, 0, 0]).is_err());
        // ClosePath without MoveTo
        assert!(check_layout(GeometryKind::Polygon, &[15]).is_err());
        // Zero-count MoveTo
        assert!(check_layout(GeometryKind::Point, &[1]).is_err());
        // Ring without ClosePath
        assert!(check_layout(GeometryKind::Polygon, &SQUARE[..10]).is_err());
        // ClosePath inside a line
        assert!(check_layout(GeometryKind::LineString, &SQUARE).is_err());
        // Trailing values after a point
        assert!(check_layout(GeometryKind::Point, &[9, 2, 2, 2]).is_err());
    }

    #[test]
    fn test_rejects_far_coordinates() {
        // MoveTo (40000, 0)
        let err = check_layout(GeometryKind::Point, &[9, 80_000, 0]).unwrap_err();
        assert!(err.contains("out of range"), "{}", err);
    }
}
