//! Scoring functions used by the planner.
//!
//! A mark is a unitless desirability score; only comparisons between marks
//! computed for the same player matter. Everything here is a pure function of
//! the board and one player.

use crate::board::{Board, IntersectionId, PortKind, Resource, TileId};
use crate::exchange::bank_rate;
use crate::player::{Player, ResourceHand};
use crate::production::{roll_probability, Production};

/// Turns assumed for a card nothing produces
pub const MAX_TURNS_PER_CARD: f64 = 100.0;

/// Weight of an objective's own value against the hand it leaves behind
const GAIN_WEIGHT: f64 = 150.0;

/// Floor added to every objective gain
const GAIN_BASE: f64 = 100.0;

/// Intersection marks are scaled to sit next to objective gains
const INTERSECTION_SCALE: f64 = 6.0;

/// What one player can expect from the board right now
#[derive(Debug, Clone)]
pub struct Outlook {
    ports: Vec<PortKind>,
    /// Expected cards per turn, thief ignored
    production: Production,
    /// Expected cards per turn with the thief's tile blocked
    blocked: Production,
    /// Turns to get one card of each resource, trading systematically
    turns_per_card: [f64; 5],
    hand: ResourceHand,
}

impl Outlook {
    pub fn new(board: &Board, player: &Player) -> Self {
        let ports = board.ports_of(player.id);
        let production = *player.production();
        let blocked = production_with_thief(board, player);

        let mut turns_per_card = [MAX_TURNS_PER_CARD; 5];
        for resource in Resource::ALL {
            // Every other resource can be turned into this one at its bank rate
            let traded: f64 = Resource::ALL
                .iter()
                .filter(|&&other| other != resource)
                .map(|&other| blocked.get(other) / bank_rate(&ports, other) as f64)
                .sum();
            let rate = blocked.get(resource).max(traded);
            if rate > 0.0 {
                turns_per_card[resource.index()] = (1.0 / rate).min(MAX_TURNS_PER_CARD);
            }
        }

        Self {
            ports,
            production,
            blocked,
            turns_per_card,
            hand: player.hand,
        }
    }

    pub fn turns_per_card(&self, resource: Resource) -> f64 {
        self.turns_per_card[resource.index()]
    }

    pub fn production(&self) -> &Production {
        &self.production
    }

    fn has_port(&self, kind: PortKind) -> bool {
        self.ports.contains(&kind)
    }

    /// Turns until `cost` can be paid from the hand plus production
    pub fn turns_to_afford(&self, cost: &ResourceHand) -> f64 {
        let missing = cost.saturating_sub(&self.hand);
        missing
            .iter()
            .map(|(resource, count)| count as f64 * self.turns_per_card(resource))
            .fold(0.0, f64::max)
    }

    /// Value of one more expected card of `resource` per turn
    ///
    /// Falls as the player already produces more of it, and falls faster
    /// when a port makes it easy to trade.
    pub fn mark_resource(&self, resource: Resource) -> f64 {
        let generic = self.has_port(PortKind::Generic);
        let scale = if self.has_port(PortKind::Specific(resource)) {
            40.0
        } else if generic {
            60.0
        } else {
            80.0
        };
        let base = if generic { 1.0 } else { 0.95 };
        base / (1.0 + scale * self.production.get(resource)).powf(0.6)
    }

    /// Value of a port given the production it would convert
    ///
    /// `expectation` defaults to the player's current production.
    pub fn mark_port(&self, kind: PortKind, expectation: Option<f64>) -> f64 {
        match kind {
            PortKind::Generic => {
                let expectation = expectation.unwrap_or_else(|| {
                    self.production.iter().map(|(_, e)| e).fold(0.0, f64::max)
                });
                0.6 * expectation / 3.0
            }
            PortKind::Specific(resource) => {
                let expectation = expectation.unwrap_or_else(|| self.production.get(resource));
                0.7 * expectation / 2.0
            }
        }
    }

    fn mark_expectation(&self, resource: Resource, expectation: f64) -> f64 {
        let mut mark = expectation * self.mark_resource(resource);
        if self.has_port(PortKind::Specific(resource)) {
            mark += self.mark_port(PortKind::Specific(resource), Some(expectation));
        }
        mark
    }

    /// Desirability of building at an intersection
    ///
    /// Probability-weighted yield of the productive neighbours, plus any port
    /// on a neighbouring path the player does not have yet.
    pub fn mark_intersection(&self, board: &Board, at: IntersectionId) -> f64 {
        let intersection = board.intersection(at);
        let mut mark = 0.0;
        for &tile in intersection.tiles() {
            let tile = board.tile(tile);
            if let Some(resource) = tile.resource() {
                mark += self.mark_expectation(resource, tile.probability());
            }
        }

        for &path in intersection.paths() {
            let Some(port) = board.path(path).port() else {
                continue;
            };
            if self.has_port(port.kind) {
                continue;
            }
            mark += match port.kind {
                PortKind::Generic => self.mark_port(port.kind, None),
                PortKind::Specific(resource) => {
                    let extra: f64 = intersection
                        .tiles()
                        .iter()
                        .map(|&t| board.tile(t))
                        .filter(|t| t.resource() == Some(resource))
                        .map(|t| t.probability())
                        .sum();
                    self.mark_port(port.kind, Some(self.production.get(resource) + extra))
                }
            };
        }
        INTERSECTION_SCALE * mark
    }

    /// Value of reaching an objective costing `cost` that is worth `gain`
    ///
    /// The gain is the objective's own value plus what the hand is expected to
    /// hold once it is paid; it is squared and divided by the turns needed.
    pub fn mark_objective(&self, cost: &ResourceHand, gain: f64) -> f64 {
        let turns = self.turns_to_afford(cost);

        let mut total = GAIN_WEIGHT * gain + GAIN_BASE;
        for resource in Resource::ALL {
            let left = self.hand.get(resource) as f64 + self.blocked.get(resource) * turns
                - cost.get(resource) as f64;
            total += left * self.turns_per_card(resource) * self.mark_resource(resource);
        }
        let total = total.max(0.0);
        total * total / (turns + 1.0)
    }
}

/// Expected production with the thief's tile producing nothing
pub fn production_with_thief(board: &Board, player: &Player) -> Production {
    let mut production = *player.production();
    let thief = board.tile(board.thief());
    if let Some(resource) = thief.resource() {
        for &corner in thief.intersections() {
            if let Some(c) = board.intersection(corner).construction {
                if c.owner == player.id {
                    production.add(resource, -thief.probability() * c.multiplier() as f64);
                }
            }
        }
    }
    production
}

/// How much putting the thief on `tile` helps `me`
///
/// Blocking opponents scores, blocking ourselves costs five times as much,
/// and having someone to steal from adds one.
pub fn mark_thief_tile(board: &Board, players: &[Player], me: &Player, tile: TileId) -> f64 {
    let tile_ref = board.tile(tile);
    let Some(resource) = tile_ref.resource() else {
        return 0.0;
    };

    let mut mark = 0.0;
    let mut victim = false;
    for &corner in tile_ref.intersections() {
        let Some(c) = board.intersection(corner).construction else {
            continue;
        };
        let owner = &players[c.owner as usize];
        let weight = if owner.id == me.id {
            -5.0
        } else {
            victim |= !owner.hand.is_empty();
            1.0
        };
        let outlook = Outlook::new(board, owner);
        mark += c.multiplier() as f64 * weight * outlook.mark_resource(resource);
    }

    mark *= tile_ref.dice.map_or(0.0, roll_probability);
    if victim {
        mark += 1.0;
    }
    mark
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardLayout;
    use crate::player::DevCard;

    fn board() -> Board {
        Board::new(&BoardLayout::standard(), DevCard::standard_deck()).unwrap()
    }

    fn seated(board: &mut Board, id: u8, at: IntersectionId) -> Player {
        let mut player = Player::new(id, format!("P{}", id));
        board.place_colony(at, id);
        player.register_colony(&board.intersection_production(at));
        player
    }

    #[test]
    fn test_no_production_caps_turns() {
        let board = board();
        let player = Player::new(0, "Idle".to_string());
        let outlook = Outlook::new(&board, &player);
        for resource in Resource::ALL {
            assert_eq!(outlook.turns_per_card(resource), MAX_TURNS_PER_CARD);
        }
    }

    #[test]
    fn test_trading_bounds_turns() {
        let mut board = board();
        let at = board.tile(TileId(2)).intersections()[3];
        let player = seated(&mut board, 0, at);
        let outlook = Outlook::new(&board, &player);

        // Wool comes straight from the 8; everything else through 4:1 trades
        let wool = outlook.turns_per_card(Resource::Wool);
        assert!(wool < 10.0);
        for resource in Resource::ALL {
            if resource != Resource::Wool {
                assert!(outlook.turns_per_card(resource) >= wool);
                assert!(outlook.turns_per_card(resource) < MAX_TURNS_PER_CARD);
            }
        }
    }

    #[test]
    fn test_hand_shortens_horizon() {
        let mut board = board();
        let at = board.tile(TileId(2)).intersections()[3];
        let mut player = seated(&mut board, 0, at);
        let cost = crate::player::costs::road();

        let poor = Outlook::new(&board, &player);
        player.hand = cost;
        let rich = Outlook::new(&board, &player);

        assert!(poor.turns_to_afford(&cost) > 0.0);
        assert_eq!(rich.turns_to_afford(&cost), 0.0);
        assert!(rich.mark_objective(&cost, 1.0) > poor.mark_objective(&cost, 1.0));
    }

    #[test]
    fn test_interior_intersection_mark() {
        let board = board();
        let player = Player::new(0, "Scout".to_string());
        let outlook = Outlook::new(&board, &player);

        // Below a top-row tile: three tiles, no coastal path, so no port
        let at = board.tile(TileId(2)).intersections()[3];
        assert_eq!(board.intersection(at).tiles().len(), 3);
        let expected: f64 = board
            .intersection(at)
            .tiles()
            .iter()
            .map(|&t| board.tile(t))
            .filter_map(|t| Some(t.probability() * outlook.mark_resource(t.resource()?)))
            .sum();
        let mark = outlook.mark_intersection(&board, at);
        assert!(mark > 0.0);
        assert!((mark - 6.0 * expected).abs() < 1e-9);
    }

    #[test]
    fn test_resource_mark_falls_with_production() {
        let mut board = board();
        let idle = Player::new(1, "Idle".to_string());
        let at = board.tile(TileId(2)).intersections()[3];
        let producer = seated(&mut board, 0, at);

        let before = Outlook::new(&board, &idle).mark_resource(Resource::Wool);
        let after = Outlook::new(&board, &producer).mark_resource(Resource::Wool);
        assert!(after < before);
    }

    #[test]
    fn test_thief_avoids_own_tiles() {
        let mut board = board();
        let at = board.tile(TileId(2)).intersections()[3];
        let me = seated(&mut board, 0, at);
        let other_at = board.tile(TileId(16)).intersections()[0];
        let mut rival = seated(&mut board, 1, other_at);
        rival.hand = ResourceHand::single(Resource::Hay, 1);
        let players = vec![me.clone(), rival];

        let own = mark_thief_tile(&board, &players, &me, TileId(2));
        let theirs = mark_thief_tile(&board, &players, &me, TileId(16));
        assert!(own < 0.0);
        assert!(theirs > 1.0);
        assert_eq!(mark_thief_tile(&board, &players, &me, board.thief()), 0.0);
    }

    #[test]
    fn test_thief_blocks_production() {
        let mut board = board();
        let at = board.tile(TileId(2)).intersections()[3];
        let player = seated(&mut board, 0, at);
        let before = production_with_thief(&board, &player).get(Resource::Wool);
        board.move_thief(TileId(2));
        let after = production_with_thief(&board, &player).get(Resource::Wool);
        assert!(before > 0.0);
        assert!(after.abs() < 1e-12);
    }
}
