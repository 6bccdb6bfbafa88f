//! Colonist - a rules engine for a hex-tile settlement game
//!
//! This crate provides the core game logic:
//! - Hex coordinate system and the tile/intersection/path board graph
//! - Player state, resource hands and development cards
//! - Exchanges with the bank and between players
//! - One-shot actions with exact undo
//! - A tick-driven turn state machine fed by pluggable controllers
//! - A heuristic planner and a hook for learned evaluators
//!
//! # Architecture
//!
//! The engine owns no threads and does no I/O. A driver calls [`Game::tick`]
//! with one [`Controller`] per seat; each tick asks the controller whose
//! decision is pending and applies at most one transition. Controllers that
//! have not decided yet return `None` and are asked again on the next tick.
//!
//! # Modules
//!
//! - [`hex`]: Axial coordinates for tiles and the corner lattice
//! - [`board`]: Board graph, layouts, occupancy and longest road
//! - [`production`]: Dice probabilities and expected production
//! - [`player`]: Player state, hands and development cards
//! - [`exchange`]: Bank and peer exchanges
//! - [`actions`]: Builds, purchases, reveals and game events
//! - [`config`]: Game and planner settings
//! - [`controller`]: Decision surface and counterfactual sandbox
//! - [`game`]: Turn state machine
//! - [`marks`]: Planner scoring functions
//! - [`planner`]: Objective search and the planner controller
//! - [`features`]: State vectors and evaluator-driven play

pub mod actions;
pub mod board;
pub mod config;
pub mod controller;
pub mod exchange;
pub mod features;
pub mod game;
pub mod hex;
pub mod marks;
pub mod planner;
pub mod player;
pub mod production;

// Re-export commonly used types
pub use actions::{Action, Applied, GameEvent};
pub use board::{
    Board, BoardError, BoardLayout, IntersectionId, PathId, PlayerId, PortKind, Resource, TileId,
};
pub use config::{GameConfig, LayoutChoice, PlannerConfig};
pub use controller::{
    Command, Controller, Decision, DiceChoice, Sandbox, ScriptedController, TurnCommand,
};
pub use exchange::Exchange;
pub use features::{state_vector, Evaluator, EvaluatorController, LinearEvaluator, FEATURE_LEN};
pub use game::{Game, GameError, Phase, PlacingStep, PlayingStep, Tick};
pub use hex::{CornerCoord, HexCoord};
pub use planner::{Objective, Planner};
pub use player::{CardEffect, DevCard, Player, PlayerColor, ResourceHand};
