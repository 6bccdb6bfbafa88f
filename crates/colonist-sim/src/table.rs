//! One automated game: seats, controllers and the tick loop.

use colonist_core::{
    Controller, EvaluatorController, Game, GameConfig, GameEvent, Planner, PlayerId, Tick,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{SimConfig, SimError};

/// Who sits in a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeatKind {
    Planner,
    Evaluator,
}

/// Outcome of a finished or abandoned game
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub seed: u64,
    pub winner: Option<PlayerId>,
    pub seats: Vec<SeatKind>,
    pub victory_points: Vec<u32>,
    pub ticks: usize,
    pub events: usize,
}

/// A game with its controllers seated
pub struct Table {
    game: Game,
    seats: Vec<SeatKind>,
    controllers: Vec<Box<dyn Controller>>,
}

impl Table {
    pub fn new(config: &SimConfig, seed: u64) -> Result<Self, SimError> {
        let names = (0..config.players)
            .map(|i| format!("Seat {}", i + 1))
            .collect();
        let game_config = GameConfig {
            seed,
            ..config.game.clone()
        };
        let game = Game::new(names, game_config)?;

        let mut seats = Vec::with_capacity(config.players);
        let mut controllers: Vec<Box<dyn Controller>> = Vec::with_capacity(config.players);
        for seat in 0..config.players as PlayerId {
            let planner = Planner::new(config.planner.clone());
            if config.evaluator_seats.contains(&seat) {
                let evaluator = config
                    .evaluator
                    .clone()
                    .ok_or(SimError::MissingEvaluator(seat))?;
                seats.push(SeatKind::Evaluator);
                controllers.push(Box::new(EvaluatorController::new(evaluator, planner)));
            } else {
                seats.push(SeatKind::Planner);
                controllers.push(Box::new(planner));
            }
        }

        Ok(Self {
            game,
            seats,
            controllers,
        })
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Tick until someone wins or `max_ticks` run out
    pub fn play(&mut self, max_ticks: usize) -> Result<GameSummary, SimError> {
        let mut ticks = 0;
        let mut events = 0;
        let mut winner = None;

        while ticks < max_ticks {
            ticks += 1;
            match self.game.tick(&mut self.controllers)? {
                Tick::Advanced(happened) => {
                    events += happened.len();
                    for event in &happened {
                        log_event(event);
                    }
                }
                Tick::Waiting => {}
                Tick::Over { winner: w } => {
                    winner = Some(w);
                    break;
                }
            }
        }

        let winner = winner.or(self.game.winner());
        if winner.is_none() {
            warn!(max_ticks, turn = self.game.turn(), "Tick budget ran out");
        }

        Ok(GameSummary {
            seed: self.game.config().seed,
            winner,
            seats: self.seats.clone(),
            victory_points: (0..self.game.player_count() as PlayerId)
                .map(|p| self.game.victory_points(p))
                .collect(),
            ticks,
            events,
        })
    }
}

fn log_event(event: &GameEvent) {
    match event {
        GameEvent::GameWon {
            player,
            victory_points,
        } => info!(player, victory_points, "Game won"),
        GameEvent::TurnEnded { player, .. } => debug!(player, "Turn ended"),
        other => debug!(event = ?other, "Game event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colonist_core::LinearEvaluator;

    #[test]
    fn test_planner_table() {
        let config = SimConfig {
            players: 2,
            ..SimConfig::default()
        };
        let mut table = Table::new(&config, 4).unwrap();
        let summary = table.play(300).unwrap();

        assert_eq!(summary.seed, 4);
        assert_eq!(summary.seats, vec![SeatKind::Planner; 2]);
        assert!(summary.ticks <= 300);
        assert!(summary.events > 0);
        // Both opening colonies are on the board by now
        assert!(summary.victory_points.iter().all(|&vp| vp >= 2));
    }

    #[test]
    fn test_evaluator_seat() {
        let config = SimConfig {
            players: 3,
            evaluator: Some(LinearEvaluator::zeros()),
            evaluator_seats: vec![2],
            ..SimConfig::default()
        };
        let mut table = Table::new(&config, 1).unwrap();
        assert_eq!(
            table.play(200).unwrap().seats,
            vec![SeatKind::Planner, SeatKind::Planner, SeatKind::Evaluator]
        );
        assert_eq!(table.game().player(2).roads, 2);
    }

    #[test]
    fn test_summary_serializes() {
        let config = SimConfig {
            players: 2,
            ..SimConfig::default()
        };
        let summary = Table::new(&config, 0).unwrap().play(10).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["ticks"], 10);
        assert_eq!(json["winner"], serde_json::Value::Null);
    }
}
