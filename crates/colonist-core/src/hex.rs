//! Hex coordinate system using axial coordinates (q, r).
//!
//! This module provides the coordinate types the board graph is built from:
//! - `HexCoord`: Identifies individual hex tiles
//! - `CornerDirection`: The six corners of a hex in rotational order
//! - `CornerCoord`: An integer lattice point shared by every hex touching that corner
//!
//! Corners live on a doubled lattice: a hex at axial `(q, r)` has its centre at
//! `(2q + r, 3r)` and its corners at fixed offsets from there. Two hexes that share
//! a corner compute the same `CornerCoord`, which is what lets the board
//! deduplicate intersections while it is being built.

use serde::{Deserialize, Serialize};

/// Corner of a hex, pointy-top orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CornerDirection {
    North,
    NorthEast,
    SouthEast,
    South,
    SouthWest,
    NorthWest,
}

impl CornerDirection {
    /// All corners in clockwise order starting from North
    pub const ALL: [CornerDirection; 6] = [
        CornerDirection::North,
        CornerDirection::NorthEast,
        CornerDirection::SouthEast,
        CornerDirection::South,
        CornerDirection::SouthWest,
        CornerDirection::NorthWest,
    ];

    /// Offset from the hex centre on the corner lattice
    pub const fn offset(&self) -> (i32, i32) {
        match self {
            CornerDirection::North => (0, -2),
            CornerDirection::NorthEast => (1, -1),
            CornerDirection::SouthEast => (1, 1),
            CornerDirection::South => (0, 2),
            CornerDirection::SouthWest => (-1, 1),
            CornerDirection::NorthWest => (-1, -1),
        }
    }

    /// The next corner going clockwise
    pub fn next(&self) -> CornerDirection {
        let index = Self::ALL.iter().position(|c| c == self).unwrap_or(0);
        Self::ALL[(index + 1) % 6]
    }
}

/// Axial coordinate for hex grid.
///
/// In axial coordinates:
/// - `q` increases going east (right)
/// - `r` increases going southeast
/// - The third coordinate `s` (not stored) satisfies: q + r + s = 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct HexCoord {
    /// Column (increases going east)
    pub q: i32,
    /// Row (increases going southeast)
    pub r: i32,
}

impl HexCoord {
    /// Create a new hex coordinate
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The implicit third coordinate (s = -q - r)
    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// The six neighboring hexes in clockwise order starting from East
    pub fn neighbors(&self) -> [HexCoord; 6] {
        [
            HexCoord::new(self.q + 1, self.r),     // East
            HexCoord::new(self.q, self.r + 1),     // SouthEast
            HexCoord::new(self.q - 1, self.r + 1), // SouthWest
            HexCoord::new(self.q - 1, self.r),     // West
            HexCoord::new(self.q, self.r - 1),     // NorthWest
            HexCoord::new(self.q + 1, self.r - 1), // NorthEast
        ]
    }

    /// Distance to another hex (in hex steps)
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Centre of this hex on the corner lattice
    pub const fn lattice_center(&self) -> (i32, i32) {
        (2 * self.q + self.r, 3 * self.r)
    }

    /// Lattice coordinate of one corner
    pub fn corner(&self, direction: CornerDirection) -> CornerCoord {
        let (cx, cy) = self.lattice_center();
        let (dx, dy) = direction.offset();
        CornerCoord::new(cx + dx, cy + dy)
    }

    /// All six corners in clockwise order starting from North
    pub fn corners(&self) -> [CornerCoord; 6] {
        CornerDirection::ALL.map(|dir| self.corner(dir))
    }

    /// Hexes within `radius` of the origin, row by row from the top
    ///
    /// This is the order board layouts are written in: rows go from `r = -radius`
    /// down to `r = radius`, and each row runs west to east.
    pub fn hexagon(radius: i32) -> Vec<HexCoord> {
        let mut coords = Vec::new();
        for r in -radius..=radius {
            let q_min = (-radius).max(-radius - r);
            let q_max = radius.min(radius - r);
            for q in q_min..=q_max {
                coords.push(HexCoord::new(q, r));
            }
        }
        coords
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

/// A corner position on the doubled lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CornerCoord {
    pub x: i32,
    pub y: i32,
}

impl CornerCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hex_distance() {
        let origin = HexCoord::new(0, 0);
        assert_eq!(origin.distance_to(&origin), 0);
        assert_eq!(origin.distance_to(&HexCoord::new(1, 0)), 1);
        assert_eq!(origin.distance_to(&HexCoord::new(2, -1)), 2);
        assert_eq!(origin.distance_to(&HexCoord::new(-2, 2)), 2);
    }

    #[test]
    fn test_neighbors_are_adjacent() {
        let hex = HexCoord::new(1, -1);
        for neighbor in hex.neighbors() {
            assert_eq!(hex.distance_to(&neighbor), 1);
        }
    }

    #[test]
    fn test_hexagon_radius_two_has_19_tiles() {
        let coords = HexCoord::hexagon(2);
        assert_eq!(coords.len(), 19);
        assert_eq!(coords[0], HexCoord::new(0, -2));
        assert_eq!(coords[18], HexCoord::new(0, 2));
        assert!(coords.iter().all(|c| c.distance_to(&HexCoord::default()) <= 2));
    }

    #[test]
    fn test_hexagon_rows_run_top_to_bottom() {
        let coords = HexCoord::hexagon(2);
        let rows: Vec<i32> = coords.iter().map(|c| c.r).collect();
        let mut sorted = rows.clone();
        sorted.sort();
        assert_eq!(rows, sorted);
    }

    #[test]
    fn test_neighbor_hexes_share_two_corners() {
        let hex = HexCoord::new(0, 0);
        let own: HashSet<CornerCoord> = hex.corners().into_iter().collect();
        for neighbor in hex.neighbors() {
            let shared = neighbor
                .corners()
                .iter()
                .filter(|c| own.contains(c))
                .count();
            assert_eq!(shared, 2, "hex {} should share an edge with {}", hex, neighbor);
        }
    }

    #[test]
    fn test_standard_layout_has_54_distinct_corners() {
        let corners: HashSet<CornerCoord> = HexCoord::hexagon(2)
            .iter()
            .flat_map(|h| h.corners())
            .collect();
        assert_eq!(corners.len(), 54);
    }

    #[test]
    fn test_corner_direction_next_wraps() {
        assert_eq!(CornerDirection::North.next(), CornerDirection::NorthEast);
        assert_eq!(CornerDirection::NorthWest.next(), CornerDirection::North);
    }
}
