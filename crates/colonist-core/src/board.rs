//! Game board representation: the tile/intersection/path graph.
//!
//! This module contains:
//! - Resource and tile types
//! - The board graph (tiles, intersections, paths) addressed by index handles
//! - Constructions (colonies and towns) and roads
//! - Ports for cheaper bank trades
//! - Layout input, the standard layout, and layout validation
//! - Occupancy queries, production on a roll, and longest road search
//!
//! The topology is built once from a [`BoardLayout`] and never resized. Only the
//! occupancy fields (constructions, road owners, thief position) change afterwards.

use crate::hex::{CornerCoord, CornerDirection, HexCoord};
use crate::player::DevCard;
use crate::production::{roll_probability, Production};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Player identifier (seat index, 0-3)
pub type PlayerId = u8;

/// Radius of the standard hexagonal layout
pub const LAYOUT_RADIUS: i32 = 2;

/// Number of tiles in a layout
pub const TILE_COUNT: usize = 19;

/// Number of intersections the standard topology produces
pub const INTERSECTION_COUNT: usize = 54;

/// Number of paths the standard topology produces
pub const PATH_COUNT: usize = 72;

/// Resource types, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resource {
    Wood,
    Clay,
    Wool,
    Hay,
    Rock,
}

impl Resource {
    /// All resource types
    pub const ALL: [Resource; 5] = [
        Resource::Wood,
        Resource::Clay,
        Resource::Wool,
        Resource::Hay,
        Resource::Rock,
    ];

    /// Position in [`Resource::ALL`]
    pub const fn index(&self) -> usize {
        match self {
            Resource::Wood => 0,
            Resource::Clay => 1,
            Resource::Wool => 2,
            Resource::Hay => 3,
            Resource::Rock => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Wood => "wood",
            Resource::Clay => "clay",
            Resource::Wool => "wool",
            Resource::Hay => "hay",
            Resource::Rock => "rock",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a tile produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    /// Produces a resource when its number is rolled
    Resource(Resource),
    /// No production, starting position of the thief
    Desert,
}

impl TileKind {
    pub fn resource(&self) -> Option<Resource> {
        match self {
            TileKind::Resource(r) => Some(*r),
            TileKind::Desert => None,
        }
    }
}

/// Port types for bank trading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortKind {
    /// 3:1 trade any resource
    Generic,
    /// 2:1 trade for a specific resource
    Specific(Resource),
}

impl PortKind {
    /// The exchange rate for this port
    pub fn rate(&self) -> u32 {
        match self {
            PortKind::Generic => 3,
            PortKind::Specific(_) => 2,
        }
    }
}

/// A port attached to a coastal path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub kind: PortKind,
    /// Facing in degrees, only used for drawing
    pub orientation: i16,
}

/// Index of a tile in [`Board::tiles`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub usize);

/// Index of an intersection in [`Board::intersections`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntersectionId(pub usize);

/// Index of a path in [`Board::paths`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathId(pub usize);

/// A single hex tile on the board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    /// Position on the hex grid
    pub coord: HexCoord,
    pub kind: TileKind,
    /// Dice number that triggers production (None for the desert)
    pub dice: Option<u8>,
    /// Corners in clockwise order starting from North
    intersections: [IntersectionId; 6],
}

impl Tile {
    pub fn intersections(&self) -> &[IntersectionId; 6] {
        &self.intersections
    }

    pub fn resource(&self) -> Option<Resource> {
        self.kind.resource()
    }

    /// Probability per turn that this tile produces
    pub fn probability(&self) -> f64 {
        match (self.kind, self.dice) {
            (TileKind::Resource(_), Some(n)) => roll_probability(n),
            _ => 0.0,
        }
    }
}

/// Kind of construction on an intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructionKind {
    /// 1 VP, 1 resource per adjacent tile
    Colony,
    /// 2 VP, 2 resources per adjacent tile
    Town,
}

/// A colony or town owned by a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Construction {
    pub kind: ConstructionKind,
    pub owner: PlayerId,
}

impl Construction {
    pub fn colony(owner: PlayerId) -> Self {
        Self {
            kind: ConstructionKind::Colony,
            owner,
        }
    }

    /// Victory points provided by this construction
    pub fn victory_points(&self) -> u32 {
        match self.kind {
            ConstructionKind::Colony => 1,
            ConstructionKind::Town => 2,
        }
    }

    /// Resources received each time an adjacent tile produces
    pub fn multiplier(&self) -> u32 {
        match self.kind {
            ConstructionKind::Colony => 1,
            ConstructionKind::Town => 2,
        }
    }
}

/// A graph node where up to three tiles meet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intersection {
    pub coord: CornerCoord,
    pub construction: Option<Construction>,
    paths: Vec<PathId>,
    tiles: Vec<TileId>,
}

impl Intersection {
    /// Neighbour paths (2 on the coast, 3 inland)
    pub fn paths(&self) -> &[PathId] {
        &self.paths
    }

    /// Neighbour tiles (1 to 3)
    pub fn tiles(&self) -> &[TileId] {
        &self.tiles
    }

    pub fn owner(&self) -> Option<PlayerId> {
        self.construction.map(|c| c.owner)
    }
}

/// An edge between two intersections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    ends: [IntersectionId; 2],
    /// Player whose road sits on this path
    pub road: Option<PlayerId>,
    port: Option<Port>,
}

impl Path {
    pub fn ends(&self) -> [IntersectionId; 2] {
        self.ends
    }

    pub fn port(&self) -> Option<Port> {
        self.port
    }

    /// The endpoint that is not `from`
    pub fn other_end(&self, from: IntersectionId) -> IntersectionId {
        if self.ends[0] == from {
            self.ends[1]
        } else {
            self.ends[0]
        }
    }
}

/// Current holder of a title (longest road, largest army) and the count that won it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleHolder {
    pub player: PlayerId,
    pub count: u32,
}

// ==================== Layout Input ====================

/// One tile entry of a layout, in row order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSpec {
    pub kind: TileKind,
    /// 2-12 except 7 for productive tiles, 0 for the desert
    pub dice: u8,
}

/// One port entry of a layout, applied after the graph is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Index into the path construction order
    pub path: usize,
    pub kind: PortKind,
    pub orientation: i16,
}

/// Everything needed to build a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLayout {
    pub tiles: Vec<TileSpec>,
    pub ports: Vec<PortSpec>,
}

const STANDARD_TILES: [(TileKind, u8); TILE_COUNT] = [
    (TileKind::Resource(Resource::Wood), 6),
    (TileKind::Resource(Resource::Wool), 3),
    (TileKind::Resource(Resource::Wool), 8),
    (TileKind::Resource(Resource::Hay), 2),
    (TileKind::Resource(Resource::Rock), 4),
    (TileKind::Resource(Resource::Hay), 5),
    (TileKind::Resource(Resource::Wood), 10),
    (TileKind::Resource(Resource::Wood), 5),
    (TileKind::Resource(Resource::Clay), 9),
    (TileKind::Desert, 0),
    (TileKind::Resource(Resource::Rock), 6),
    (TileKind::Resource(Resource::Hay), 9),
    (TileKind::Resource(Resource::Hay), 10),
    (TileKind::Resource(Resource::Rock), 11),
    (TileKind::Resource(Resource::Wood), 3),
    (TileKind::Resource(Resource::Wool), 12),
    (TileKind::Resource(Resource::Clay), 8),
    (TileKind::Resource(Resource::Wool), 4),
    (TileKind::Resource(Resource::Clay), 11),
];

const STANDARD_PORTS: [(usize, PortKind, i16); 9] = [
    (5, PortKind::Generic, 120),
    (6, PortKind::Specific(Resource::Wool), 60),
    (19, PortKind::Specific(Resource::Rock), -180),
    (27, PortKind::Generic, 60),
    (46, PortKind::Generic, 0),
    (52, PortKind::Specific(Resource::Hay), -180),
    (60, PortKind::Specific(Resource::Clay), -60),
    (64, PortKind::Generic, -120),
    (67, PortKind::Specific(Resource::Wood), -60),
];

impl BoardLayout {
    /// The fixed beginner layout
    pub fn standard() -> Self {
        Self {
            tiles: STANDARD_TILES
                .iter()
                .map(|&(kind, dice)| TileSpec { kind, dice })
                .collect(),
            ports: STANDARD_PORTS
                .iter()
                .map(|&(path, kind, orientation)| PortSpec {
                    path,
                    kind,
                    orientation,
                })
                .collect(),
        }
    }

    /// The standard tile set and dice numbers, shuffled; ports stay in place
    pub fn shuffled<R: Rng>(rng: &mut R) -> Self {
        let mut layout = Self::standard();

        let mut kinds: Vec<TileKind> = layout.tiles.iter().map(|t| t.kind).collect();
        kinds.shuffle(rng);

        let mut numbers: Vec<u8> = layout
            .tiles
            .iter()
            .map(|t| t.dice)
            .filter(|&d| d != 0)
            .collect();
        numbers.shuffle(rng);
        let mut numbers = numbers.into_iter();

        layout.tiles = kinds
            .into_iter()
            .map(|kind| match kind {
                TileKind::Desert => TileSpec { kind, dice: 0 },
                TileKind::Resource(_) => TileSpec {
                    kind,
                    dice: numbers.next().unwrap_or(0),
                },
            })
            .collect();
        layout
    }
}

/// Errors raised while building a board from a layout
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BoardError {
    #[error("Layout has {found} tiles, expected {expected}")]
    TileCount { expected: usize, found: usize },

    #[error("Tile {tile} has invalid dice number {number}")]
    InvalidDiceNumber { tile: usize, number: u8 },

    #[error("Desert tile {tile} must not carry a dice number")]
    DesertNumber { tile: usize },

    #[error("Layout has no desert to start the thief on")]
    NoDesert,

    #[error("Port path index {path} out of range")]
    PortOutOfRange { path: usize },

    #[error("Path {path} is inland and cannot host a port")]
    PortNotCoastal { path: usize },

    #[error("Path {path} already has a port")]
    DuplicatePort { path: usize },
}

// ==================== Board ====================

/// The complete game board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    tiles: Vec<Tile>,
    intersections: Vec<Intersection>,
    paths: Vec<Path>,
    /// Tile the thief currently blocks
    thief: TileId,
    /// Undrawn development cards, drawn from the back
    dev_cards: Vec<DevCard>,
    longest_road: Option<TitleHolder>,
    largest_army: Option<TitleHolder>,
}

impl Board {
    /// Build the board graph from a layout and a (shuffled) development pile
    pub fn new(layout: &BoardLayout, dev_cards: Vec<DevCard>) -> Result<Self, BoardError> {
        let coords = HexCoord::hexagon(LAYOUT_RADIUS);
        if layout.tiles.len() != coords.len() {
            return Err(BoardError::TileCount {
                expected: coords.len(),
                found: layout.tiles.len(),
            });
        }

        let mut tiles = Vec::with_capacity(coords.len());
        let mut intersections: Vec<Intersection> = Vec::with_capacity(INTERSECTION_COUNT);
        let mut paths: Vec<Path> = Vec::with_capacity(PATH_COUNT);
        let mut by_corner: HashMap<CornerCoord, IntersectionId> = HashMap::new();

        for (index, (coord, spec)) in coords.iter().zip(&layout.tiles).enumerate() {
            let dice = validate_dice(index, spec)?;
            let tile_id = TileId(index);

            let mut corners = [IntersectionId(0); 6];
            let mut fresh = [false; 6];
            for (k, direction) in CornerDirection::ALL.iter().enumerate() {
                let corner = coord.corner(*direction);
                let id = match by_corner.get(&corner) {
                    Some(&id) => id,
                    None => {
                        let id = IntersectionId(intersections.len());
                        intersections.push(Intersection {
                            coord: corner,
                            construction: None,
                            paths: Vec::with_capacity(3),
                            tiles: Vec::with_capacity(3),
                        });
                        by_corner.insert(corner, id);
                        fresh[k] = true;
                        id
                    }
                };
                intersections[id.0].tiles.push(tile_id);
                corners[k] = id;
            }

            // An edge between two old corners was already created by an earlier tile
            for k in 0..6 {
                let next = (k + 1) % 6;
                if !(fresh[k] || fresh[next]) {
                    continue;
                }
                let path_id = PathId(paths.len());
                paths.push(Path {
                    ends: [corners[k], corners[next]],
                    road: None,
                    port: None,
                });
                intersections[corners[k].0].paths.push(path_id);
                intersections[corners[next].0].paths.push(path_id);
            }

            tiles.push(Tile {
                coord: *coord,
                kind: spec.kind,
                dice,
                intersections: corners,
            });
        }

        let thief = tiles
            .iter()
            .position(|t| t.kind == TileKind::Desert)
            .map(TileId)
            .ok_or(BoardError::NoDesert)?;

        let mut board = Self {
            tiles,
            intersections,
            paths,
            thief,
            dev_cards,
            longest_road: None,
            largest_army: None,
        };

        for spec in &layout.ports {
            if spec.path >= board.paths.len() {
                return Err(BoardError::PortOutOfRange { path: spec.path });
            }
            if !board.is_coastal(PathId(spec.path)) {
                return Err(BoardError::PortNotCoastal { path: spec.path });
            }
            let path = &mut board.paths[spec.path];
            if path.port.is_some() {
                return Err(BoardError::DuplicatePort { path: spec.path });
            }
            path.port = Some(Port {
                kind: spec.kind,
                orientation: spec.orientation,
            });
        }

        Ok(board)
    }

    // ==================== Query Methods ====================

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, id: TileId) -> &Tile {
        &self.tiles[id.0]
    }

    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }

    pub fn intersection(&self, id: IntersectionId) -> &Intersection {
        &self.intersections[id.0]
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn path(&self, id: PathId) -> &Path {
        &self.paths[id.0]
    }

    pub fn tile_ids(&self) -> impl Iterator<Item = TileId> {
        (0..self.tiles.len()).map(TileId)
    }

    pub fn intersection_ids(&self) -> impl Iterator<Item = IntersectionId> {
        (0..self.intersections.len()).map(IntersectionId)
    }

    pub fn path_ids(&self) -> impl Iterator<Item = PathId> {
        (0..self.paths.len()).map(PathId)
    }

    /// Find the intersection sitting on a lattice corner
    pub fn intersection_at(&self, coord: CornerCoord) -> Option<IntersectionId> {
        self.intersections
            .iter()
            .position(|i| i.coord == coord)
            .map(IntersectionId)
    }

    /// Find the tile at a hex coordinate
    pub fn tile_at(&self, coord: HexCoord) -> Option<TileId> {
        self.tiles.iter().position(|t| t.coord == coord).map(TileId)
    }

    /// The path joining two intersections, if they are adjacent
    pub fn path_between(&self, a: IntersectionId, b: IntersectionId) -> Option<PathId> {
        self.intersections[a.0]
            .paths
            .iter()
            .copied()
            .find(|&p| self.paths[p.0].other_end(a) == b)
    }

    /// Neighbouring intersections together with the path leading to them
    pub fn neighbours(
        &self,
        id: IntersectionId,
    ) -> impl Iterator<Item = (PathId, IntersectionId)> + '_ {
        self.intersections[id.0]
            .paths
            .iter()
            .map(move |&p| (p, self.paths[p.0].other_end(id)))
    }

    pub fn thief(&self) -> TileId {
        self.thief
    }

    pub fn dev_cards_left(&self) -> usize {
        self.dev_cards.len()
    }

    pub fn longest_road(&self) -> Option<TitleHolder> {
        self.longest_road
    }

    pub fn largest_army(&self) -> Option<TitleHolder> {
        self.largest_army
    }

    /// A path is on the coast when only one tile borders it
    pub fn is_coastal(&self, id: PathId) -> bool {
        let [a, b] = self.paths[id.0].ends;
        let shared = self.intersections[a.0]
            .tiles
            .iter()
            .filter(|t| self.intersections[b.0].tiles.contains(t))
            .count();
        shared == 1
    }

    /// Paths carrying a road of this player
    pub fn roads_of(&self, player: PlayerId) -> impl Iterator<Item = PathId> + '_ {
        self.path_ids()
            .filter(move |&p| self.paths[p.0].road == Some(player))
    }

    /// Intersections holding a construction of this player
    pub fn constructions_of(
        &self,
        player: PlayerId,
    ) -> impl Iterator<Item = (IntersectionId, Construction)> + '_ {
        self.intersections
            .iter()
            .enumerate()
            .filter_map(move |(i, inter)| match inter.construction {
                Some(c) if c.owner == player => Some((IntersectionId(i), c)),
                _ => None,
            })
    }

    /// Ports reachable from this player's constructions
    pub fn ports_of(&self, player: PlayerId) -> Vec<PortKind> {
        self.paths
            .iter()
            .filter_map(|path| {
                let port = path.port?;
                path.ends
                    .iter()
                    .any(|e| self.intersections[e.0].owner() == Some(player))
                    .then_some(port.kind)
            })
            .collect()
    }

    /// Players owning a construction around a tile, in seating order
    pub fn players_on_tile(&self, tile: TileId) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self.tiles[tile.0]
            .intersections
            .iter()
            .filter_map(|i| self.intersections[i.0].owner())
            .collect();
        players.sort_unstable();
        players.dedup();
        players
    }

    /// Expected production of one construction unit at this intersection
    pub fn intersection_production(&self, id: IntersectionId) -> Production {
        let mut production = Production::default();
        for tile in &self.intersections[id.0].tiles {
            let tile = &self.tiles[tile.0];
            if let Some(resource) = tile.resource() {
                production.add(resource, tile.probability());
            }
        }
        production
    }

    // ==================== Validation Methods ====================

    /// The intersection and all its neighbours are free of constructions
    pub fn satisfies_distance_rule(&self, id: IntersectionId) -> bool {
        self.intersections[id.0].construction.is_none()
            && self
                .neighbours(id)
                .all(|(_, n)| self.intersections[n.0].construction.is_none())
    }

    /// Some path touching the intersection carries this player's road
    pub fn has_adjacent_road(&self, id: IntersectionId, player: PlayerId) -> bool {
        self.intersections[id.0]
            .paths
            .iter()
            .any(|p| self.paths[p.0].road == Some(player))
    }

    /// The path touches the player's construction or road network
    pub fn connects_to_network(&self, id: PathId, player: PlayerId) -> bool {
        self.paths[id.0].ends.iter().any(|&end| {
            let inter = &self.intersections[end.0];
            inter.owner() == Some(player)
                || inter
                    .paths
                    .iter()
                    .any(|&p| p != id && self.paths[p.0].road == Some(player))
        })
    }

    /// The player's colony that has no road of theirs next to it yet
    pub fn colony_without_road(&self, player: PlayerId) -> Option<IntersectionId> {
        self.constructions_of(player)
            .map(|(id, _)| id)
            .find(|&id| !self.has_adjacent_road(id, player))
    }

    // ==================== Mutation Methods ====================

    pub(crate) fn place_colony(&mut self, id: IntersectionId, player: PlayerId) {
        let inter = &mut self.intersections[id.0];
        debug_assert!(inter.construction.is_none());
        inter.construction = Some(Construction::colony(player));
    }

    pub(crate) fn upgrade_to_town(&mut self, id: IntersectionId) {
        if let Some(c) = self.intersections[id.0].construction.as_mut() {
            c.kind = ConstructionKind::Town;
        }
    }

    pub(crate) fn place_road(&mut self, id: PathId, player: PlayerId) {
        debug_assert!(self.paths[id.0].road.is_none());
        self.paths[id.0].road = Some(player);
    }

    pub(crate) fn set_construction(&mut self, id: IntersectionId, value: Option<Construction>) {
        self.intersections[id.0].construction = value;
    }

    pub(crate) fn set_road(&mut self, id: PathId, value: Option<PlayerId>) {
        self.paths[id.0].road = value;
    }

    pub(crate) fn move_thief(&mut self, tile: TileId) {
        self.thief = tile;
    }

    pub(crate) fn draw_dev_card(&mut self) -> Option<DevCard> {
        self.dev_cards.pop()
    }

    pub(crate) fn return_dev_card(&mut self, card: DevCard) {
        self.dev_cards.push(card);
    }

    pub(crate) fn set_longest_road(&mut self, holder: Option<TitleHolder>) {
        self.longest_road = holder;
    }

    pub(crate) fn set_largest_army(&mut self, holder: Option<TitleHolder>) {
        self.largest_army = holder;
    }

    // ==================== Resource Distribution ====================

    /// Resources produced by a dice roll, per player and resource
    ///
    /// The thief's tile produces nothing. Entries come out sorted by player, then
    /// by resource order.
    pub fn production_for_roll(&self, roll: u8) -> Vec<(PlayerId, Resource, u32)> {
        let mut produced: BTreeMap<(PlayerId, Resource), u32> = BTreeMap::new();

        for (index, tile) in self.tiles.iter().enumerate() {
            if tile.dice != Some(roll) || TileId(index) == self.thief {
                continue;
            }
            let resource = match tile.resource() {
                Some(r) => r,
                None => continue,
            };
            for corner in &tile.intersections {
                if let Some(c) = self.intersections[corner.0].construction {
                    *produced.entry((c.owner, resource)).or_insert(0) += c.multiplier();
                }
            }
        }

        produced
            .into_iter()
            .map(|((player, resource), amount)| (player, resource, amount))
            .collect()
    }

    // ==================== Longest Road Calculation ====================

    /// Length of the longest simple road of a player
    pub fn longest_road_of(&self, player: PlayerId) -> u32 {
        let mut used = vec![false; self.paths.len()];
        let mut best = 0;
        for road in self.roads_of(player).collect::<Vec<_>>() {
            for end in self.paths[road.0].ends {
                best = best.max(self.extend_road(player, end, &mut used));
            }
        }
        best
    }

    /// DFS over unused roads leaving `at`; never continues through an opponent's construction
    fn extend_road(&self, player: PlayerId, at: IntersectionId, used: &mut [bool]) -> u32 {
        let mut best = 0;
        for &path in &self.intersections[at.0].paths {
            if used[path.0] || self.paths[path.0].road != Some(player) {
                continue;
            }
            used[path.0] = true;
            let next = self.paths[path.0].other_end(at);
            let blocked = self.intersections[next.0]
                .owner()
                .is_some_and(|owner| owner != player);
            let length = if blocked {
                1
            } else {
                1 + self.extend_road(player, next, used)
            };
            used[path.0] = false;
            best = best.max(length);
        }
        best
    }
}

fn validate_dice(index: usize, spec: &TileSpec) -> Result<Option<u8>, BoardError> {
    match spec.kind {
        TileKind::Desert if spec.dice != 0 => Err(BoardError::DesertNumber { tile: index }),
        TileKind::Desert => Ok(None),
        TileKind::Resource(_) if (2..=12).contains(&spec.dice) && spec.dice != 7 => {
            Ok(Some(spec.dice))
        }
        TileKind::Resource(_) => Err(BoardError::InvalidDiceNumber {
            tile: index,
            number: spec.dice,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn standard_board() -> Board {
        Board::new(&BoardLayout::standard(), DevCard::standard_deck()).unwrap()
    }

    /// A chain of paths starting at `start`, always taking the first unused neighbour
    fn walk(board: &Board, start: IntersectionId, steps: usize) -> Vec<PathId> {
        let mut at = start;
        let mut seen = vec![start];
        let mut chain = Vec::new();
        for _ in 0..steps {
            let (path, next) = board
                .neighbours(at)
                .find(|(_, n)| !seen.contains(n))
                .unwrap();
            chain.push(path);
            seen.push(next);
            at = next;
        }
        chain
    }

    #[test]
    fn test_standard_topology_counts() {
        let board = standard_board();
        assert_eq!(board.tiles().len(), TILE_COUNT);
        assert_eq!(board.intersections().len(), INTERSECTION_COUNT);
        assert_eq!(board.paths().len(), PATH_COUNT);
    }

    #[test]
    fn test_every_tile_has_six_distinct_corners() {
        let board = standard_board();
        for tile in board.tiles() {
            let distinct: HashSet<_> = tile.intersections().iter().collect();
            assert_eq!(distinct.len(), 6);
        }
    }

    #[test]
    fn test_corners_are_consecutive_on_paths() {
        let board = standard_board();
        for tile in board.tiles() {
            let corners = tile.intersections();
            for k in 0..6 {
                assert!(board.path_between(corners[k], corners[(k + 1) % 6]).is_some());
            }
        }
    }

    #[test]
    fn test_no_duplicate_paths() {
        let board = standard_board();
        let mut seen = HashSet::new();
        for path in board.paths() {
            let [a, b] = path.ends();
            assert_ne!(a, b);
            assert!(seen.insert((a.min(b), a.max(b))), "duplicate edge {:?}", path.ends());
        }
    }

    #[test]
    fn test_intersection_degree() {
        let board = standard_board();
        for inter in board.intersections() {
            assert!(matches!(inter.paths().len(), 2 | 3));
            assert!((1..=3).contains(&inter.tiles().len()));
        }
        let coastal = board.path_ids().filter(|&p| board.is_coastal(p)).count();
        assert_eq!(coastal, 30);
    }

    #[test]
    fn test_standard_ports_attached() {
        let board = standard_board();
        let ports: Vec<_> = board.paths().iter().filter_map(|p| p.port()).collect();
        assert_eq!(ports.len(), 9);
        assert_eq!(
            ports.iter().filter(|p| p.kind == PortKind::Generic).count(),
            4
        );
        assert_eq!(
            board.path(PathId(19)).port().map(|p| p.kind),
            Some(PortKind::Specific(Resource::Rock))
        );
    }

    #[test]
    fn test_thief_starts_on_desert() {
        let board = standard_board();
        assert_eq!(board.thief(), TileId(9));
        assert_eq!(board.tile(board.thief()).kind, TileKind::Desert);
        assert_eq!(board.tile(board.thief()).dice, None);
    }

    #[test]
    fn test_shuffled_layout_keeps_tile_set() {
        let mut rng = StdRng::seed_from_u64(7);
        let layout = BoardLayout::shuffled(&mut rng);
        let board = Board::new(&layout, Vec::new()).unwrap();
        let deserts = board
            .tiles()
            .iter()
            .filter(|t| t.kind == TileKind::Desert)
            .count();
        assert_eq!(deserts, 1);
        assert_eq!(board.tile(board.thief()).dice, None);

        let mut numbers: Vec<u8> = board.tiles().iter().filter_map(|t| t.dice).collect();
        numbers.sort();
        assert_eq!(
            numbers,
            vec![2, 3, 3, 4, 4, 5, 5, 6, 6, 8, 8, 9, 9, 10, 10, 11, 11, 12]
        );
    }

    #[test]
    fn test_layout_with_wrong_tile_count_is_rejected() {
        let mut layout = BoardLayout::standard();
        layout.tiles.pop();
        let err = Board::new(&layout, Vec::new()).unwrap_err();
        assert_eq!(
            err,
            BoardError::TileCount {
                expected: 19,
                found: 18
            }
        );
    }

    #[test]
    fn test_layout_with_seven_is_rejected() {
        let mut layout = BoardLayout::standard();
        layout.tiles[0].dice = 7;
        assert_eq!(
            Board::new(&layout, Vec::new()).unwrap_err(),
            BoardError::InvalidDiceNumber { tile: 0, number: 7 }
        );
    }

    #[test]
    fn test_layout_port_errors() {
        let mut layout = BoardLayout::standard();
        layout.ports[0].path = 500;
        assert_eq!(
            Board::new(&layout, Vec::new()).unwrap_err(),
            BoardError::PortOutOfRange { path: 500 }
        );

        let mut layout = BoardLayout::standard();
        layout.ports[1].path = layout.ports[0].path;
        assert_eq!(
            Board::new(&layout, Vec::new()).unwrap_err(),
            BoardError::DuplicatePort { path: 5 }
        );
    }

    #[test]
    fn test_layout_without_desert_is_rejected() {
        let mut layout = BoardLayout::standard();
        layout.tiles[9] = TileSpec {
            kind: TileKind::Resource(Resource::Hay),
            dice: 6,
        };
        assert_eq!(
            Board::new(&layout, Vec::new()).unwrap_err(),
            BoardError::NoDesert
        );
    }

    #[test]
    fn test_distance_rule() {
        let mut board = standard_board();
        let center = board.tile(TileId(9)).intersections()[0];
        assert!(board.satisfies_distance_rule(center));

        board.place_colony(center, 0);
        assert!(!board.satisfies_distance_rule(center));
        for (_, neighbour) in board.neighbours(center).collect::<Vec<_>>() {
            assert!(!board.satisfies_distance_rule(neighbour));
        }
    }

    #[test]
    fn test_road_connectivity() {
        let mut board = standard_board();
        let start = board.tile(TileId(9)).intersections()[0];
        board.place_colony(start, 0);

        let touching: Vec<PathId> = board.intersection(start).paths().to_vec();
        for &path in &touching {
            assert!(board.connects_to_network(path, 0));
            assert!(!board.connects_to_network(path, 1));
        }

        board.place_road(touching[0], 0);
        let far_end = board.path(touching[0]).other_end(start);
        for &path in board.intersection(far_end).paths() {
            assert!(board.connects_to_network(path, 0));
        }
    }

    #[test]
    fn test_production_for_roll() {
        let mut board = standard_board();
        // Tile 2 is wool on an 8
        let corner = board.tile(TileId(2)).intersections()[3];
        board.place_colony(corner, 1);
        assert_eq!(board.production_for_roll(8), vec![(1, Resource::Wool, 1)]);

        board.upgrade_to_town(corner);
        assert_eq!(board.production_for_roll(8), vec![(1, Resource::Wool, 2)]);
    }

    #[test]
    fn test_thief_blocks_production() {
        let mut board = standard_board();
        let corner = board.tile(TileId(2)).intersections()[3];
        board.place_colony(corner, 1);
        board.move_thief(TileId(2));
        assert!(board.production_for_roll(8).is_empty());
    }

    #[test]
    fn test_intersection_production_skips_desert() {
        let board = standard_board();
        let desert = board.tile(TileId(9));
        for corner in desert.intersections() {
            let production = board.intersection_production(*corner);
            let expected: f64 = board
                .intersection(*corner)
                .tiles()
                .iter()
                .map(|t| board.tile(*t).probability())
                .sum();
            assert!((production.total() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_longest_road_chain() {
        let mut board = standard_board();
        let start = board.tile(TileId(0)).intersections()[0];
        let chain = walk(&board, start, 5);
        for (i, path) in chain.iter().enumerate() {
            board.place_road(*path, 0);
            assert_eq!(board.longest_road_of(0), i as u32 + 1);
        }
        assert_eq!(board.longest_road_of(1), 0);
    }

    #[test]
    fn test_longest_road_is_cut_by_opponent_colony() {
        let mut board = standard_board();
        let start = board.tile(TileId(0)).intersections()[0];
        let chain = walk(&board, start, 5);
        for path in &chain {
            board.place_road(*path, 0);
        }
        // The end of the second road splits the chain into 2 + 3
        let [a, b] = board.path(chain[1]).ends();
        let cut = if board.path(chain[2]).ends().contains(&a) { a } else { b };
        board.place_colony(cut, 1);
        assert_eq!(board.longest_road_of(0), 3);
    }

    #[test]
    fn test_ports_of_player() {
        let mut board = standard_board();
        let [end, _] = board.path(PathId(19)).ends();
        assert!(board.ports_of(0).is_empty());
        board.place_colony(end, 0);
        assert_eq!(board.ports_of(0), vec![PortKind::Specific(Resource::Rock)]);
    }
}
