//! Players and what they hold.
//!
//! - [`Player`]: hand, development cards, construction counters, cached
//!   production and the negotiation state of the current turn
//! - [`ResourceHand`]: non-negative card counts per resource
//! - Development card types, deck, and multi-step card effects
//! - Building costs

use crate::board::{Board, PlayerId, Resource};
use crate::exchange::Exchange;
use crate::production::Production;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Road pieces per player
pub const MAX_ROADS: u32 = 15;

/// Colonies standing on the board at once, per player
pub const MAX_COLONIES: u32 = 5;

/// Town pieces per player
pub const MAX_TOWNS: u32 = 4;

/// Player color for UI rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerColor {
    Blue,
    Orange,
    White,
    Red,
}

impl PlayerColor {
    /// Get color for a seat
    pub fn for_player(id: PlayerId) -> Self {
        match id % 4 {
            0 => PlayerColor::Blue,
            1 => PlayerColor::Orange,
            2 => PlayerColor::White,
            _ => PlayerColor::Red,
        }
    }
}

/// Development card types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DevCard {
    /// Move the thief and steal, counts toward the largest army
    Knight,
    /// Take every card of one resource from all opponents
    Monopoly,
    /// Build two roads for free
    FreeRoads,
    /// Take two resources from the bank
    FreeCards,
    /// Worth 1 VP once revealed
    VictoryPoint,
}

impl DevCard {
    pub const ALL: [DevCard; 5] = [
        DevCard::Knight,
        DevCard::Monopoly,
        DevCard::FreeRoads,
        DevCard::FreeCards,
        DevCard::VictoryPoint,
    ];

    /// Create the standard development card deck (25 cards)
    pub fn standard_deck() -> Vec<DevCard> {
        let mut deck = Vec::with_capacity(25);
        deck.extend(std::iter::repeat(DevCard::Knight).take(14));
        deck.extend(std::iter::repeat(DevCard::Monopoly).take(2));
        deck.extend(std::iter::repeat(DevCard::FreeRoads).take(2));
        deck.extend(std::iter::repeat(DevCard::FreeCards).take(2));
        deck.extend(std::iter::repeat(DevCard::VictoryPoint).take(5));
        deck
    }

    /// Standard deck in random order
    pub fn shuffled_deck<R: Rng>(rng: &mut R) -> Vec<DevCard> {
        let mut deck = Self::standard_deck();
        deck.shuffle(rng);
        deck
    }

    pub fn index(&self) -> usize {
        match self {
            DevCard::Knight => 0,
            DevCard::Monopoly => 1,
            DevCard::FreeRoads => 2,
            DevCard::FreeCards => 3,
            DevCard::VictoryPoint => 4,
        }
    }
}

/// A revealed card whose effect takes more than one decision to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardEffect {
    /// Thief must be moved
    Knight,
    /// Thief moved, a victim must be picked
    KnightSteal,
    /// A resource must be named
    Monopoly,
    /// Two free roads to place
    FreeRoads,
    FreeRoadsOneLeft,
    /// Two free cards to take
    FreeCards,
    FreeCardsOneLeft,
}

impl CardEffect {
    /// Effect started by revealing a card; victory points have none
    pub fn started_by(card: DevCard) -> Option<CardEffect> {
        match card {
            DevCard::Knight => Some(CardEffect::Knight),
            DevCard::Monopoly => Some(CardEffect::Monopoly),
            DevCard::FreeRoads => Some(CardEffect::FreeRoads),
            DevCard::FreeCards => Some(CardEffect::FreeCards),
            DevCard::VictoryPoint => None,
        }
    }
}

/// A hand of resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHand {
    pub wood: u32,
    pub clay: u32,
    pub wool: u32,
    pub hay: u32,
    pub rock: u32,
}

impl ResourceHand {
    /// Create an empty hand
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hand with specific amounts, in resource order
    pub fn with_amounts(wood: u32, clay: u32, wool: u32, hay: u32, rock: u32) -> Self {
        Self {
            wood,
            clay,
            wool,
            hay,
            rock,
        }
    }

    /// Create a hand with a single resource
    pub fn single(resource: Resource, amount: u32) -> Self {
        let mut hand = Self::new();
        hand.add(resource, amount);
        hand
    }

    /// Total number of resource cards
    pub fn total(&self) -> u32 {
        self.wood + self.clay + self.wool + self.hay + self.rock
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Get count of a specific resource
    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Wood => self.wood,
            Resource::Clay => self.clay,
            Resource::Wool => self.wool,
            Resource::Hay => self.hay,
            Resource::Rock => self.rock,
        }
    }

    /// Set count of a specific resource
    pub fn set(&mut self, resource: Resource, count: u32) {
        match resource {
            Resource::Wood => self.wood = count,
            Resource::Clay => self.clay = count,
            Resource::Wool => self.wool = count,
            Resource::Hay => self.hay = count,
            Resource::Rock => self.rock = count,
        }
    }

    pub fn add(&mut self, resource: Resource, amount: u32) {
        self.set(resource, self.get(resource) + amount);
    }

    pub fn add_one(&mut self, resource: Resource) {
        self.add(resource, 1);
    }

    /// Add another hand to this one
    pub fn add_hand(&mut self, other: &ResourceHand) {
        for resource in Resource::ALL {
            self.add(resource, other.get(resource));
        }
    }

    /// Check if can afford a cost
    pub fn can_afford(&self, cost: &ResourceHand) -> bool {
        Resource::ALL
            .iter()
            .all(|&r| self.get(r) >= cost.get(r))
    }

    /// Subtract a cost (panics if insufficient)
    pub fn subtract(&mut self, cost: &ResourceHand) {
        assert!(self.can_afford(cost), "Cannot afford this cost");
        for resource in Resource::ALL {
            self.set(resource, self.get(resource) - cost.get(resource));
        }
    }

    /// Remove one card if held
    pub fn try_take_one(&mut self, resource: Resource) -> bool {
        let count = self.get(resource);
        if count == 0 {
            return false;
        }
        self.set(resource, count - 1);
        true
    }

    /// Per-resource difference, floored at zero
    pub fn saturating_sub(&self, other: &ResourceHand) -> ResourceHand {
        let mut out = ResourceHand::new();
        for resource in Resource::ALL {
            out.set(resource, self.get(resource).saturating_sub(other.get(resource)));
        }
        out
    }

    /// Non-zero entries in resource order
    pub fn iter(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        Resource::ALL
            .iter()
            .map(move |&r| (r, self.get(r)))
            .filter(|&(_, n)| n > 0)
    }

    /// Every card as its own entry, in resource order
    pub fn cards(&self) -> Vec<Resource> {
        self.iter()
            .flat_map(|(r, n)| std::iter::repeat(r).take(n as usize))
            .collect()
    }

    /// Draw one card uniformly by card count (for thief stealing)
    pub fn take_random<R: Rng>(&mut self, rng: &mut R) -> Option<Resource> {
        let resource = *self.cards().choose(rng)?;
        self.subtract(&ResourceHand::single(resource, 1));
        Some(resource)
    }

    /// Every sub-hand, the empty one and this hand included
    pub fn subsets(&self) -> Vec<ResourceHand> {
        let mut out = vec![ResourceHand::new()];
        for resource in Resource::ALL {
            let held = self.get(resource);
            let mut next = Vec::with_capacity(out.len() * (held as usize + 1));
            for base in &out {
                for n in 0..=held {
                    let mut hand = *base;
                    hand.set(resource, n);
                    next.push(hand);
                }
            }
            out = next;
        }
        out
    }

    /// Every sub-hand holding exactly `size` cards
    pub fn subsets_of_size(&self, size: u32) -> Vec<ResourceHand> {
        self.subsets()
            .into_iter()
            .filter(|h| h.total() == size)
            .collect()
    }
}

impl std::fmt::Display for ResourceHand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.iter().map(|(r, n)| format!("{} {}", n, r)).collect();
        if parts.is_empty() {
            f.write_str("nothing")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Building costs
pub mod costs {
    use super::ResourceHand;

    /// Cost to build a road: 1 wood, 1 clay
    pub fn road() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 0, 0, 0)
    }

    /// Cost to build a colony: 1 wood, 1 clay, 1 wool, 1 hay
    pub fn colony() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 1, 1, 0)
    }

    /// Cost to upgrade to a town: 2 hay, 3 rock
    pub fn town() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 0, 2, 3)
    }

    /// Cost to buy a development card: 1 wool, 1 hay, 1 rock
    pub fn dev_card() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 1, 1, 1)
    }
}

/// A single player's state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Seat index (0-3)
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    /// Current resources
    pub hand: ResourceHand,
    /// Development cards that may be revealed
    pub dev_cards: Vec<DevCard>,
    /// Development cards bought this turn (can't be revealed same turn)
    pub dev_cards_bought_this_turn: Vec<DevCard>,
    /// Development cards already revealed
    pub revealed: Vec<DevCard>,
    /// Roads on the board
    pub roads: u32,
    /// Colonies on the board (upgraded ones excluded)
    pub colonies: u32,
    /// Towns on the board
    pub towns: u32,
    /// Cached longest road length
    pub longest_road: u32,
    /// Cached expected production, thief ignored
    production: Production,
    /// Revealed card still being resolved
    pub effect: Option<CardEffect>,
    /// Exchange offered to this player by the current player, from this player's side
    pub exchange_request: Option<Exchange>,
    /// Exchanges this player wants to try this turn; `Some(empty)` once all were tried
    pub proposals: Option<VecDeque<Exchange>>,
    /// Negotiations opened this turn
    pub negotiations: u32,
    /// Cards still owed after a 7
    pub cards_to_discard: u32,
}

impl Player {
    /// Create a new player
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            color: PlayerColor::for_player(id),
            hand: ResourceHand::new(),
            dev_cards: Vec::new(),
            dev_cards_bought_this_turn: Vec::new(),
            revealed: Vec::new(),
            roads: 0,
            colonies: 0,
            towns: 0,
            longest_road: 0,
            production: Production::default(),
            effect: None,
            exchange_request: None,
            proposals: None,
            negotiations: 0,
            cards_to_discard: 0,
        }
    }

    pub fn production(&self) -> &Production {
        &self.production
    }

    pub(crate) fn set_production(&mut self, production: Production) {
        self.production = production;
    }

    /// Record a new colony and its expected yield
    pub(crate) fn register_colony(&mut self, yield_per_turn: &Production) {
        self.colonies += 1;
        self.production.add_scaled(yield_per_turn, 1.0);
    }

    /// Record a colony upgrade; the intersection's yield counts twice from now on
    pub(crate) fn register_town(&mut self, yield_per_turn: &Production) {
        self.colonies -= 1;
        self.towns += 1;
        self.production.add_scaled(yield_per_turn, 1.0);
    }

    /// Number of Knights revealed so far
    pub fn knights(&self) -> u32 {
        self.revealed
            .iter()
            .filter(|c| **c == DevCard::Knight)
            .count() as u32
    }

    /// Victory points visible on the table
    ///
    /// Colonies count 1, towns 2, revealed victory cards 1, each title 2.
    pub fn victory_points(&self, board: &Board) -> u32 {
        let mut vp = self.colonies + 2 * self.towns;

        vp += self
            .revealed
            .iter()
            .filter(|c| **c == DevCard::VictoryPoint)
            .count() as u32;

        if board.longest_road().is_some_and(|h| h.player == self.id) {
            vp += 2;
        }
        if board.largest_army().is_some_and(|h| h.player == self.id) {
            vp += 2;
        }

        vp
    }

    /// Check if player has a revealable development card of given type
    pub fn has_playable_dev_card(&self, card: DevCard) -> bool {
        self.dev_cards.contains(&card)
    }

    /// Count of a card type in hand, both bought this turn and earlier
    pub fn dev_card_count(&self, card: DevCard) -> usize {
        self.dev_cards
            .iter()
            .chain(&self.dev_cards_bought_this_turn)
            .filter(|c| **c == card)
            .count()
    }

    /// Called at end of turn
    pub fn end_turn(&mut self) {
        self.dev_cards.append(&mut self.dev_cards_bought_this_turn);
        self.proposals = None;
        self.negotiations = 0;
    }
}
