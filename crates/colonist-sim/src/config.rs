//! Simulation settings.
//!
//! Settings come from an optional JSON file named by `COLONIST_CONFIG`, then
//! individual environment variables override single fields.

use colonist_core::{GameConfig, GameError, LinearEvaluator, PlannerConfig, PlayerId, FEATURE_LEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the JSON settings file
pub const CONFIG_VAR: &str = "COLONIST_CONFIG";

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("A game needs 2 to 4 players, got {0}")]
    PlayerCount(usize),

    #[error("Seat {0} uses the evaluator but no evaluator weights are set")]
    MissingEvaluator(PlayerId),

    #[error("Evaluator has {found} weights, expected {expected}")]
    EvaluatorLength { expected: usize, found: usize },

    #[error(transparent)]
    Game(#[from] GameError),
}

/// Everything one simulation run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub players: usize,
    /// Games to play; game `i` uses seed `game.seed + i`
    pub games: u32,
    /// Tick budget per game
    pub max_ticks: usize,
    pub game: GameConfig,
    pub planner: PlannerConfig,
    /// Weights for seats listed in `evaluator_seats`
    pub evaluator: Option<LinearEvaluator>,
    pub evaluator_seats: Vec<PlayerId>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            players: 4,
            games: 1,
            max_ticks: 50_000,
            game: GameConfig::default(),
            planner: PlannerConfig::default(),
            evaluator: None,
            evaluator_seats: Vec::new(),
        }
    }
}

impl SimConfig {
    /// Load from `COLONIST_CONFIG` (if set) and the process environment
    pub fn load() -> Result<Self, SimError> {
        let mut config = match std::env::var_os(CONFIG_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Override single fields from variables found by `lookup`
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SimError> {
        if let Some(seed) = parse_var(&lookup, "COLONIST_SEED")? {
            self.game.seed = seed;
        }
        if let Some(players) = parse_var(&lookup, "COLONIST_PLAYERS")? {
            self.players = players;
        }
        if let Some(games) = parse_var(&lookup, "COLONIST_GAMES")? {
            self.games = games;
        }
        if let Some(max_ticks) = parse_var(&lookup, "COLONIST_MAX_TICKS")? {
            self.max_ticks = max_ticks;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !(2..=4).contains(&self.players) {
            return Err(SimError::PlayerCount(self.players));
        }
        if let Some(&seat) = self.evaluator_seats.first() {
            let evaluator = self
                .evaluator
                .as_ref()
                .ok_or(SimError::MissingEvaluator(seat))?;
            if evaluator.weights.len() != FEATURE_LEN {
                return Err(SimError::EvaluatorLength {
                    expected: FEATURE_LEN,
                    found: evaluator.weights.len(),
                });
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, SimError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SimError::InvalidEnv { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colonist_core::LayoutChoice;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert_eq!(config.players, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: SimConfig = serde_json::from_str(
            r#"{"players": 3, "game": {"seed": 9, "layout": "Shuffled"}, "planner": {"trade_with_players": false}}"#,
        )
        .unwrap();
        assert_eq!(config.players, 3);
        assert_eq!(config.game.seed, 9);
        assert_eq!(config.game.layout, LayoutChoice::Shuffled);
        assert_eq!(config.game.victory_points, 10);
        assert!(!config.planner.trade_with_players);
        assert_eq!(config.planner.max_proposals, 5);
        assert_eq!(config.max_ticks, 50_000);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SimConfig::default();
        config
            .apply_overrides(env(&[("COLONIST_SEED", "77"), ("COLONIST_PLAYERS", " 2 ")]))
            .unwrap();
        assert_eq!(config.game.seed, 77);
        assert_eq!(config.players, 2);
        assert_eq!(config.games, 1);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = SimConfig::default();
        let err = config
            .apply_overrides(env(&[("COLONIST_MAX_TICKS", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::InvalidEnv {
                name: "COLONIST_MAX_TICKS",
                ..
            }
        ));
    }

    #[test]
    fn test_validation() {
        let config = SimConfig {
            players: 5,
            ..SimConfig::default()
        };
        assert!(matches!(config.validate(), Err(SimError::PlayerCount(5))));

        let config = SimConfig {
            evaluator_seats: vec![1],
            ..SimConfig::default()
        };
        assert!(matches!(config.validate(), Err(SimError::MissingEvaluator(1))));

        let config = SimConfig {
            evaluator_seats: vec![1],
            evaluator: Some(LinearEvaluator::new(vec![0.0; 3], 0.0)),
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimError::EvaluatorLength { found: 3, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = SimConfig::from_file(Path::new("/nonexistent/colonist.json")).unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
    }
}
