//! Fixed-length state vectors for learned evaluators.
//!
//! [`state_vector`] is a read-only view of the game from one player's seat:
//!
//! | block | length | value |
//! |-------|--------|-------|
//! | own constructions | intersections | 1 town, 0.5 colony |
//! | other constructions | intersections | 1 town, 0.5 colony |
//! | own roads | paths | 1 if ours |
//! | free paths | paths | 1 if no road |
//! | thief | tiles | one-hot |
//! | hand | 5 | `tanh(count)` |
//! | development cards | 5 | `tanh(count)` |
//! | can steal | 1 | 1 if a victim is on the thief's tile |
//!
//! On the standard topology that is [`FEATURE_LEN`] values.

use crate::actions::Action;
use crate::board::{
    ConstructionKind, IntersectionId, PathId, PlayerId, Resource, TileId, INTERSECTION_COUNT,
    PATH_COUNT, TILE_COUNT,
};
use crate::controller::{Controller, Decision, DiceChoice, Sandbox, TurnCommand};
use crate::exchange::{bank_exchanges, Exchange};
use crate::game::Game;
use crate::planner::Planner;
use crate::player::{DevCard, ResourceHand};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Length of [`state_vector`] on the standard topology
pub const FEATURE_LEN: usize = 2 * INTERSECTION_COUNT + 2 * PATH_COUNT + TILE_COUNT + 5 + 5 + 1;

fn flag(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

fn construction_value(kind: ConstructionKind) -> f64 {
    match kind {
        ConstructionKind::Town => 1.0,
        ConstructionKind::Colony => 0.5,
    }
}

/// Encode the game as seen by `me`
pub fn state_vector(game: &Game, me: PlayerId) -> Vec<f64> {
    let board = game.board();
    let player = game.player(me);
    let inters = board.intersections();
    let paths = board.paths();
    let mut out = Vec::with_capacity(2 * inters.len() + 2 * paths.len() + board.tiles().len() + 11);

    for owned in [true, false] {
        out.extend(inters.iter().map(|i| match i.construction {
            Some(c) if (c.owner == me) == owned => construction_value(c.kind),
            _ => 0.0,
        }));
    }
    out.extend(paths.iter().map(|p| flag(p.road == Some(me))));
    out.extend(paths.iter().map(|p| flag(p.road.is_none())));
    out.extend(board.tile_ids().map(|t| flag(t == board.thief())));
    out.extend(Resource::ALL.iter().map(|&r| (player.hand.get(r) as f64).tanh()));
    out.extend(
        DevCard::ALL
            .iter()
            .map(|&card| (player.dev_card_count(card) as f64).tanh()),
    );
    out.push(flag(game.can_steal(me)));
    out
}

/// Scores a state vector; higher is better for the seat it was built for
pub trait Evaluator {
    fn evaluate(&self, features: &[f64]) -> f64;
}

/// `bias + weights · features`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearEvaluator {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
}

impl LinearEvaluator {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    /// All-zero weights for the standard topology
    pub fn zeros() -> Self {
        Self::new(vec![0.0; FEATURE_LEN], 0.0)
    }
}

impl Evaluator for LinearEvaluator {
    fn evaluate(&self, features: &[f64]) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

fn evaluate_seat<E: Evaluator>(evaluator: &E, sandbox: &Sandbox<'_>) -> f64 {
    evaluator.evaluate(&state_vector(sandbox.game(), sandbox.me()))
}

/// A greedy controller over an [`Evaluator`]
///
/// On its turn it takes the build or bank trade whose resulting state scores
/// best, as long as that beats the current state. Every other decision goes
/// to a [`Planner`].
#[derive(Debug, Clone)]
pub struct EvaluatorController<E> {
    evaluator: E,
    fallback: Planner,
}

impl<E: Evaluator> EvaluatorController<E> {
    pub fn new(evaluator: E, fallback: Planner) -> Self {
        Self {
            evaluator,
            fallback,
        }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Builds the player can take and pay for right now
    fn candidate_actions(sandbox: &Sandbox<'_>) -> Vec<Action> {
        let board = sandbox.board();
        let player = sandbox.player();
        let roads = board.path_ids().map(Action::BuildRoad);
        let colonies = board.intersection_ids().map(Action::BuildColony);
        let towns = board.intersection_ids().map(Action::BuildTown);
        roads
            .chain(colonies)
            .chain(towns)
            .filter(|a| player.hand.can_afford(&a.cost()) && a.available(board, player, true))
            .collect()
    }
}

impl<E: Evaluator> Controller for EvaluatorController<E> {
    fn play(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<TurnCommand> {
        let mut best_mark = evaluate_seat(&self.evaluator, sandbox);
        let mut best = TurnCommand::EndTurn;

        for action in Self::candidate_actions(sandbox) {
            let mark = sandbox.with_action(action, |s| evaluate_seat(&self.evaluator, s));
            if mark > best_mark {
                best_mark = mark;
                best = TurnCommand::Perform(action);
            }
        }

        let ports = sandbox.board().ports_of(sandbox.me());
        let hand = sandbox.player().hand;
        for exchange in bank_exchanges(&hand, &ports) {
            let mark = sandbox.with_exchange(&exchange, |s| evaluate_seat(&self.evaluator, s));
            if mark > best_mark {
                best_mark = mark;
                best = TurnCommand::TradeWithBank(exchange);
            }
        }

        trace!(player = sandbox.me(), ?best, mark = best_mark, "evaluator choice");
        Some(best)
    }

    fn place_initial_colony(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<IntersectionId> {
        self.fallback.place_initial_colony(sandbox)
    }

    fn place_initial_road(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PathId> {
        self.fallback.place_initial_road(sandbox)
    }

    fn remove_cards_for_thief(
        &mut self,
        sandbox: &mut Sandbox<'_>,
        count: u32,
    ) -> Decision<ResourceHand> {
        self.fallback.remove_cards_for_thief(sandbox, count)
    }

    fn move_thief(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<TileId> {
        let candidates: Vec<TileId> = sandbox
            .board()
            .tile_ids()
            .filter(|&t| t != sandbox.board().thief())
            .collect();
        let mut best: Option<(TileId, f64)> = None;
        for tile in candidates {
            let mark = sandbox.with_thief(tile, |s| evaluate_seat(&self.evaluator, s));
            if best.map_or(true, |(_, m)| mark > m) {
                best = Some((tile, mark));
            }
        }
        best.map(|(tile, _)| tile)
    }

    fn steal_card(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PlayerId> {
        self.fallback.steal_card(sandbox)
    }

    fn accept_exchange(
        &mut self,
        sandbox: &mut Sandbox<'_>,
        exchange: &Exchange,
    ) -> Decision<bool> {
        self.fallback.accept_exchange(sandbox, exchange)
    }

    fn throw_dice(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<DiceChoice> {
        self.fallback.throw_dice(sandbox)
    }

    fn get_resources(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<()> {
        self.fallback.get_resources(sandbox)
    }

    fn place_free_road(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PathId> {
        self.fallback.place_free_road(sandbox)
    }

    fn free_card(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<Resource> {
        self.fallback.free_card(sandbox)
    }

    fn monopoly(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<Resource> {
        self.fallback.monopoly(sandbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use pretty_assertions::assert_eq;

    fn game() -> Game {
        Game::new(vec!["A".to_string(), "B".to_string()], GameConfig::with_seed(3)).unwrap()
    }

    #[test]
    fn test_vector_length() {
        let game = game();
        assert_eq!(FEATURE_LEN, 282);
        assert_eq!(state_vector(&game, 0).len(), FEATURE_LEN);
    }

    #[test]
    fn test_empty_board_encoding() {
        let game = game();
        let v = state_vector(&game, 0);
        let free_paths =
            &v[2 * INTERSECTION_COUNT + PATH_COUNT..2 * INTERSECTION_COUNT + 2 * PATH_COUNT];
        assert!(free_paths.iter().all(|&x| x == 1.0));

        let thief = &v[2 * INTERSECTION_COUNT + 2 * PATH_COUNT..][..TILE_COUNT];
        assert_eq!(thief.iter().sum::<f64>(), 1.0);
        assert_eq!(thief[game.board().thief().0], 1.0);
        assert_eq!(v[FEATURE_LEN - 1], 0.0);
    }

    #[test]
    fn test_linear_evaluator() {
        let mut evaluator = LinearEvaluator::zeros();
        evaluator.bias = 0.5;
        evaluator.weights[0] = 2.0;
        let mut features = vec![0.0; FEATURE_LEN];
        features[0] = 0.5;
        assert_eq!(evaluator.evaluate(&features), 1.5);
    }

    #[test]
    fn test_evaluator_weights_from_json() {
        let evaluator: LinearEvaluator =
            serde_json::from_str(r#"{"weights": [1.0, -1.0]}"#).unwrap();
        assert_eq!(evaluator.bias, 0.0);
        assert_eq!(evaluator.evaluate(&[3.0, 1.0]), 2.0);
    }
}
