//! Runtime configuration for games and planners.

use serde::{Deserialize, Serialize};

/// Victory points needed to win
pub const VICTORY_POINTS_TO_WIN: u32 = 10;

/// Which board to play on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutChoice {
    /// The fixed beginner layout
    #[default]
    Standard,
    /// Standard tiles and numbers shuffled with the game seed
    Shuffled,
}

/// Settings for one game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seed for dice, steals, the development pile and layout shuffling
    pub seed: u64,
    pub layout: LayoutChoice,
    /// Points that end the game at the end of the scorer's turn
    pub victory_points: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            layout: LayoutChoice::Standard,
            victory_points: VICTORY_POINTS_TO_WIN,
        }
    }
}

impl GameConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

/// Settings for the heuristic planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Offer exchanges to other players, not only to the bank
    pub trade_with_players: bool,
    /// Exchanges queued per negotiation
    pub max_proposals: usize,
    /// Negotiations opened per turn
    pub max_negotiations: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            trade_with_players: true,
            max_proposals: 5,
            max_negotiations: 2,
        }
    }
}
