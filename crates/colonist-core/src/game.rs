//! Core game state machine.
//!
//! This module contains the [`Game`] struct and the tick-driven turn protocol:
//! - Placing: two snake-ordered rounds of colony + road, the second one paying out
//! - Playing: dice, production or the 7 sequence (discard, thief, steal), then the
//!   re-entrant NextTurn step that interleaves negotiation, card effects and the
//!   player's free actions
//! - End: a player reached the victory target at the end of their turn
//!
//! Every call to [`Game::tick`] asks one controller for one decision and applies
//! at most one transition. A controller that has not decided yet makes the tick
//! return [`Tick::Waiting`]; the driver just ticks again later.

use crate::actions::{self, Action, GameEvent, MIN_LONGEST_ROAD};
use crate::board::{
    Board, BoardError, BoardLayout, IntersectionId, PathId, PlayerId, TileId, TitleHolder,
};
use crate::config::{GameConfig, LayoutChoice};
use crate::controller::{Controller, DiceChoice, Sandbox, TurnCommand};
use crate::exchange::Exchange;
use crate::player::{CardEffect, DevCard, Player, ResourceHand, MAX_ROADS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Players whose hand is above this must discard on a 7
pub const HAND_LIMIT_ON_SEVEN: u32 = 7;

/// Sub-phase while placing the opening colonies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacingStep {
    Colony,
    Road,
}

/// Sub-phase of a regular turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayingStep {
    ThrowDice,
    GetResources,
    /// Rolled a 7, players above the hand limit give up half their cards
    DiscardForThief,
    MoveThief,
    StealCard,
    /// Negotiation, card effects and free actions until the player ends the turn
    NextTurn,
}

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Placing(PlacingStep),
    Playing(PlayingStep),
    End { winner: PlayerId },
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// A transition happened
    Advanced(Vec<GameEvent>),
    /// The pending decision has not been made yet
    Waiting,
    /// The game is over, nothing left to do
    Over { winner: PlayerId },
}

/// Errors that abort a tick
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Must have 2-4 players, got {0}")]
    PlayerCount(usize),

    #[error("Expected {expected} controllers, got {found}")]
    ControllerCount { expected: usize, found: usize },

    #[error("Invalid board layout: {0}")]
    Board(#[from] BoardError),

    #[error("Invalid action for current phase")]
    InvalidPhase,

    #[error("Invalid placement location")]
    InvalidLocation,

    #[error("Action {0:?} is not available")]
    ActionUnavailable(Action),

    #[error("Cannot afford this")]
    CannotAfford,

    #[error("Invalid discard")]
    InvalidDiscard,

    #[error("Invalid exchange")]
    InvalidExchange,

    #[error("Thief cannot move to tile {0:?}")]
    InvalidThiefTile(TileId),

    #[error("Cannot steal from player {0}")]
    InvalidVictim(PlayerId),
}

/// The complete game state
#[derive(Debug, Clone, Serialize)]
pub struct Game {
    board: Board,
    players: Vec<Player>,
    /// Placements made while placing, completed turns (offset by 2N) while playing
    turn: u32,
    phase: Phase,
    /// Last dice roll of the current turn
    dice: Option<(u8, u8)>,
    config: GameConfig,
    /// Recorded rolls replayed before the RNG is used
    replay: VecDeque<(u8, u8)>,
    #[serde(skip)]
    rng: StdRng,
}

impl Game {
    /// Create a new game with the configured layout
    pub fn new(player_names: Vec<String>, config: GameConfig) -> Result<Self, GameError> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let layout = match config.layout {
            LayoutChoice::Standard => BoardLayout::standard(),
            LayoutChoice::Shuffled => BoardLayout::shuffled(&mut rng),
        };
        Self::build(player_names, config, &layout, rng)
    }

    /// Create a new game on a custom layout
    pub fn with_layout(
        player_names: Vec<String>,
        config: GameConfig,
        layout: &BoardLayout,
    ) -> Result<Self, GameError> {
        let rng = StdRng::seed_from_u64(config.seed);
        Self::build(player_names, config, layout, rng)
    }

    fn build(
        player_names: Vec<String>,
        config: GameConfig,
        layout: &BoardLayout,
        mut rng: StdRng,
    ) -> Result<Self, GameError> {
        if !(2..=4).contains(&player_names.len()) {
            return Err(GameError::PlayerCount(player_names.len()));
        }
        let deck = DevCard::shuffled_deck(&mut rng);
        let board = Board::new(layout, deck)?;

        let players = player_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Player::new(i as PlayerId, name))
            .collect();

        Ok(Self {
            board,
            players,
            turn: 0,
            phase: Phase::Placing(PlacingStep::Colony),
            dice: None,
            config,
            replay: VecDeque::new(),
            rng,
        })
    }

    // ==================== Query Methods ====================

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[id as usize]
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn dice(&self) -> Option<(u8, u8)> {
        self.dice
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Whose decision drives the game right now
    ///
    /// Opening placements run 0..N-1 then back N-1..0.
    pub fn current_player(&self) -> PlayerId {
        let n = self.players.len() as u32;
        let seat = match self.phase {
            Phase::Placing(_) if self.turn >= n => 2 * n - self.turn - 1,
            _ => self.turn % n,
        };
        seat as PlayerId
    }

    pub fn victory_points(&self, id: PlayerId) -> u32 {
        self.player(id).victory_points(&self.board)
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match self.phase {
            Phase::End { winner } => Some(winner),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.winner().is_some()
    }

    /// Opponents on the thief's tile that hold at least one card
    pub fn steal_targets(&self, thief: PlayerId) -> Vec<PlayerId> {
        self.board
            .players_on_tile(self.board.thief())
            .into_iter()
            .filter(|&p| p != thief && !self.player(p).hand.is_empty())
            .collect()
    }

    pub fn can_steal(&self, thief: PlayerId) -> bool {
        !self.steal_targets(thief).is_empty()
    }

    /// Intersections where an opening colony may go
    pub fn initial_colony_spots(&self) -> Vec<IntersectionId> {
        self.board
            .intersection_ids()
            .filter(|&i| self.board.satisfies_distance_rule(i))
            .collect()
    }

    /// Roads the player could place for free right now
    pub fn free_road_spots(&self, id: PlayerId) -> Vec<PathId> {
        let player = self.player(id);
        self.board
            .path_ids()
            .filter(|&p| Action::BuildRoad(p).available(&self.board, player, true))
            .collect()
    }

    // ==================== Driver Hooks ====================

    /// Replay recorded dice rolls before drawing from the RNG
    pub fn queue_rolls(&mut self, rolls: impl IntoIterator<Item = (u8, u8)>) {
        self.replay.extend(rolls);
    }

    /// Tick until the game ends or `max_ticks` run out
    ///
    /// Returns the winner, or `None` when the budget ran out first.
    pub fn run<C: Controller>(
        &mut self,
        controllers: &mut [C],
        max_ticks: usize,
    ) -> Result<Option<PlayerId>, GameError> {
        for _ in 0..max_ticks {
            if let Tick::Over { winner } = self.tick(controllers)? {
                return Ok(Some(winner));
            }
        }
        Ok(self.winner())
    }

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> &mut Player {
        &mut self.players[id as usize]
    }

    pub(crate) fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub(crate) fn board_and_player_mut(&mut self, id: PlayerId) -> (&mut Board, &mut Player) {
        (&mut self.board, &mut self.players[id as usize])
    }

    fn two_players_mut(&mut self, a: PlayerId, b: PlayerId) -> (&mut Player, &mut Player) {
        let (a, b) = (a as usize, b as usize);
        assert_ne!(a, b);
        if a < b {
            let (left, right) = self.players.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.players.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    // ==================== Tick ====================

    /// Advance the game by at most one decision
    ///
    /// `controllers` is indexed by seat.
    pub fn tick<C: Controller>(&mut self, controllers: &mut [C]) -> Result<Tick, GameError> {
        if controllers.len() != self.players.len() {
            return Err(GameError::ControllerCount {
                expected: self.players.len(),
                found: controllers.len(),
            });
        }
        match self.phase {
            Phase::End { winner } => Ok(Tick::Over { winner }),
            Phase::Placing(PlacingStep::Colony) => self.tick_initial_colony(controllers),
            Phase::Placing(PlacingStep::Road) => self.tick_initial_road(controllers),
            Phase::Playing(PlayingStep::ThrowDice) => self.tick_throw_dice(controllers),
            Phase::Playing(PlayingStep::GetResources) => self.tick_get_resources(controllers),
            Phase::Playing(PlayingStep::DiscardForThief) => self.tick_discard(controllers),
            Phase::Playing(PlayingStep::MoveThief) => self.tick_move_thief(controllers),
            Phase::Playing(PlayingStep::StealCard) => self.tick_steal(controllers),
            Phase::Playing(PlayingStep::NextTurn) => self.tick_next_turn(controllers),
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, turn = self.turn, "phase change");
        self.phase = phase;
    }

    // ==================== Placing ====================

    fn tick_initial_colony<C: Controller>(
        &mut self,
        controllers: &mut [C],
    ) -> Result<Tick, GameError> {
        let me = self.current_player();
        let Some(at) = controllers[me as usize].place_initial_colony(&mut Sandbox::new(self, me))
        else {
            return Ok(Tick::Waiting);
        };
        if at.0 >= self.board.intersections().len() || !self.board.satisfies_distance_rule(at) {
            return Err(GameError::InvalidLocation);
        }

        let mut events = vec![GameEvent::InitialColonyPlaced {
            player: me,
            intersection: at,
        }];
        let titles = self.titles();
        self.board.place_colony(at, me);
        let yield_per_turn = self.board.intersection_production(at);
        self.players[me as usize].register_colony(&yield_per_turn);

        if self.turn >= self.players.len() as u32 {
            let mut granted = ResourceHand::new();
            for tile in self.board.intersection(at).tiles() {
                if let Some(resource) = self.board.tile(*tile).resource() {
                    granted.add_one(resource);
                }
            }
            self.players[me as usize].hand.add_hand(&granted);
            events.push(GameEvent::StartingResources {
                player: me,
                resources: granted,
            });
        }

        self.refresh_longest_road();
        self.title_events(titles, &mut events);
        debug!(player = me, intersection = at.0, "initial colony placed");
        self.set_phase(Phase::Placing(PlacingStep::Road));
        Ok(Tick::Advanced(events))
    }

    fn tick_initial_road<C: Controller>(
        &mut self,
        controllers: &mut [C],
    ) -> Result<Tick, GameError> {
        let me = self.current_player();
        let Some(path) = controllers[me as usize].place_initial_road(&mut Sandbox::new(self, me))
        else {
            return Ok(Tick::Waiting);
        };
        let home = self
            .board
            .colony_without_road(me)
            .ok_or(GameError::InvalidPhase)?;
        if path.0 >= self.board.paths().len()
            || self.board.path(path).road.is_some()
            || !self.board.path(path).ends().contains(&home)
        {
            return Err(GameError::InvalidLocation);
        }

        let (board, player) = self.board_and_player_mut(me);
        actions::place_road(board, player, path);
        debug!(player = me, path = path.0, "initial road placed");

        self.turn += 1;
        if self.turn == 2 * self.players.len() as u32 {
            info!("opening placements done");
            self.set_phase(Phase::Playing(PlayingStep::ThrowDice));
        } else {
            self.set_phase(Phase::Placing(PlacingStep::Colony));
        }
        Ok(Tick::Advanced(vec![GameEvent::InitialRoadPlaced {
            player: me,
            path,
        }]))
    }

    // ==================== Dice and Production ====================

    fn tick_throw_dice<C: Controller>(&mut self, controllers: &mut [C]) -> Result<Tick, GameError> {
        let me = self.current_player();
        if self.players[me as usize].effect.is_some() {
            return self.advance_effect(me, controllers);
        }

        let Some(choice) = controllers[me as usize].throw_dice(&mut Sandbox::new(self, me)) else {
            return Ok(Tick::Waiting);
        };
        let mut events = Vec::new();
        match choice {
            DiceChoice::RevealKnight => {
                self.perform(me, Action::RevealDevCard(DevCard::Knight), &mut events)?;
            }
            DiceChoice::Throw => {
                let roll = self.roll_dice();
                let total = roll.0 + roll.1;
                self.dice = Some(roll);
                info!(player = me, total, "dice rolled");
                events.push(GameEvent::DiceRolled {
                    player: me,
                    roll,
                    total,
                });

                if total == 7 {
                    let mut anyone = false;
                    for player in &mut self.players {
                        let held = player.hand.total();
                        if held > HAND_LIMIT_ON_SEVEN {
                            player.cards_to_discard = held / 2;
                            anyone = true;
                        }
                    }
                    self.set_phase(Phase::Playing(if anyone {
                        PlayingStep::DiscardForThief
                    } else {
                        PlayingStep::MoveThief
                    }));
                } else {
                    self.set_phase(Phase::Playing(PlayingStep::GetResources));
                }
            }
        }
        Ok(Tick::Advanced(events))
    }

    fn roll_dice(&mut self) -> (u8, u8) {
        if let Some(roll) = self.replay.pop_front() {
            return roll;
        }
        (self.rng.gen_range(1..=6), self.rng.gen_range(1..=6))
    }

    fn tick_get_resources<C: Controller>(
        &mut self,
        controllers: &mut [C],
    ) -> Result<Tick, GameError> {
        let me = self.current_player();
        if controllers[me as usize]
            .get_resources(&mut Sandbox::new(self, me))
            .is_none()
        {
            return Ok(Tick::Waiting);
        }
        let (a, b) = self.dice.ok_or(GameError::InvalidPhase)?;
        let distributions = self.board.production_for_roll(a + b);
        for &(player, resource, amount) in &distributions {
            self.players[player as usize].hand.add(resource, amount);
        }
        self.set_phase(Phase::Playing(PlayingStep::NextTurn));

        let events = if distributions.is_empty() {
            Vec::new()
        } else {
            vec![GameEvent::ResourcesProduced { distributions }]
        };
        Ok(Tick::Advanced(events))
    }

    // ==================== Thief ====================

    fn tick_discard<C: Controller>(&mut self, controllers: &mut [C]) -> Result<Tick, GameError> {
        let mut answers = Vec::new();
        for seat in 0..self.players.len() {
            let count = self.players[seat].cards_to_discard;
            if count == 0 {
                continue;
            }
            let id = seat as PlayerId;
            if let Some(cards) =
                controllers[seat].remove_cards_for_thief(&mut Sandbox::new(self, id), count)
            {
                answers.push((seat, cards));
            }
        }

        // One bad answer rejects the whole tick, so nobody discards
        let valid = answers.iter().all(|(seat, cards)| {
            let player = &self.players[*seat];
            cards.total() == player.cards_to_discard && player.hand.can_afford(cards)
        });
        if !valid {
            return Err(GameError::InvalidDiscard);
        }

        let mut events = Vec::with_capacity(answers.len());
        for (seat, cards) in answers {
            let player = &mut self.players[seat];
            let count = player.cards_to_discard;
            player.hand.subtract(&cards);
            player.cards_to_discard = 0;
            debug!(player = player.id, count, "discarded for thief");
            events.push(GameEvent::CardsDiscarded {
                player: player.id,
                cards,
            });
        }

        if self.players.iter().all(|p| p.cards_to_discard == 0) {
            self.set_phase(Phase::Playing(PlayingStep::MoveThief));
        }
        if events.is_empty() {
            Ok(Tick::Waiting)
        } else {
            Ok(Tick::Advanced(events))
        }
    }

    fn tick_move_thief<C: Controller>(&mut self, controllers: &mut [C]) -> Result<Tick, GameError> {
        let me = self.current_player();
        let Some(tile) = controllers[me as usize].move_thief(&mut Sandbox::new(self, me)) else {
            return Ok(Tick::Waiting);
        };
        let event = self.relocate_thief(me, tile)?;
        let next = if self.can_steal(me) {
            PlayingStep::StealCard
        } else {
            PlayingStep::NextTurn
        };
        self.set_phase(Phase::Playing(next));
        Ok(Tick::Advanced(vec![event]))
    }

    fn tick_steal<C: Controller>(&mut self, controllers: &mut [C]) -> Result<Tick, GameError> {
        let me = self.current_player();
        let Some(victim) = controllers[me as usize].steal_card(&mut Sandbox::new(self, me)) else {
            return Ok(Tick::Waiting);
        };
        let event = self.steal(me, victim)?;
        self.set_phase(Phase::Playing(PlayingStep::NextTurn));
        Ok(Tick::Advanced(vec![event]))
    }

    fn relocate_thief(&mut self, me: PlayerId, tile: TileId) -> Result<GameEvent, GameError> {
        let from = self.board.thief();
        if tile.0 >= self.board.tiles().len() || tile == from {
            return Err(GameError::InvalidThiefTile(tile));
        }
        self.board.move_thief(tile);
        debug!(player = me, tile = tile.0, "thief moved");
        Ok(GameEvent::ThiefMoved {
            player: me,
            from,
            to: tile,
        })
    }

    fn steal(&mut self, me: PlayerId, victim: PlayerId) -> Result<GameEvent, GameError> {
        if !self.steal_targets(me).contains(&victim) {
            return Err(GameError::InvalidVictim(victim));
        }
        let resource = self.players[victim as usize]
            .hand
            .take_random(&mut self.rng)
            .ok_or(GameError::InvalidVictim(victim))?;
        self.players[me as usize].hand.add_one(resource);
        debug!(thief = me, victim, %resource, "card stolen");
        Ok(GameEvent::CardStolen {
            thief: me,
            victim,
            resource,
        })
    }

    // ==================== NextTurn ====================

    fn tick_next_turn<C: Controller>(&mut self, controllers: &mut [C]) -> Result<Tick, GameError> {
        let me = self.current_player();

        let responders: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| p.exchange_request.is_some())
            .map(|p| p.id)
            .collect();
        if !responders.is_empty() {
            return self.poll_responders(me, responders, controllers);
        }

        if let Some(exchange) = self.players[me as usize]
            .proposals
            .as_mut()
            .and_then(|queue| queue.pop_front())
        {
            return Ok(Tick::Advanced(self.offer_exchange(me, exchange)));
        }

        if self.players[me as usize].effect.is_some() {
            return self.advance_effect(me, controllers);
        }

        let Some(command) = controllers[me as usize].play(&mut Sandbox::new(self, me)) else {
            return Ok(Tick::Waiting);
        };
        let mut events = Vec::new();
        match command {
            TurnCommand::Perform(action) => self.perform(me, action, &mut events)?,
            TurnCommand::TradeWithBank(exchange) => {
                let ports = self.board.ports_of(me);
                let player = &mut self.players[me as usize];
                if !exchange.is_bank_exact(&ports) || !exchange.possible(&player.hand) {
                    return Err(GameError::InvalidExchange);
                }
                exchange.apply_one(&mut player.hand);
                debug!(player = me, %exchange, "bank exchange");
                events.push(GameEvent::BankExchange {
                    player: me,
                    exchange,
                });
            }
            TurnCommand::ProposeExchanges(proposals) => {
                let player = &mut self.players[me as usize];
                let malformed = proposals.iter().any(|e| {
                    e.gain.is_empty() || e.lost.is_empty() || !e.possible(&player.hand)
                });
                if proposals.is_empty() || malformed {
                    return Err(GameError::InvalidExchange);
                }
                debug!(player = me, count = proposals.len(), "exchanges queued");
                player.proposals = Some(proposals.into());
                player.negotiations += 1;
            }
            TurnCommand::EndTurn => return Ok(Tick::Advanced(self.end_turn(me))),
        }
        Ok(Tick::Advanced(events))
    }

    /// Ask every player holding an offer, in seating order
    fn poll_responders<C: Controller>(
        &mut self,
        me: PlayerId,
        responders: Vec<PlayerId>,
        controllers: &mut [C],
    ) -> Result<Tick, GameError> {
        let mut events = Vec::new();
        for responder in responders {
            let Some(exchange) = self.players[responder as usize].exchange_request else {
                continue;
            };
            let Some(accept) = controllers[responder as usize]
                .accept_exchange(&mut Sandbox::new(self, responder), &exchange)
            else {
                continue;
            };

            let initiator_side = exchange.inverse();
            let feasible = exchange.possible(&self.players[responder as usize].hand)
                && initiator_side.possible(&self.players[me as usize].hand);
            if accept && feasible {
                let (initiator, other) = self.two_players_mut(me, responder);
                initiator_side.apply_between(&mut initiator.hand, &mut other.hand);
                for player in &mut self.players {
                    player.exchange_request = None;
                }
                self.players[me as usize].proposals = None;
                info!(initiator = me, responder, exchange = %initiator_side, "exchange accepted");
                events.push(GameEvent::ExchangeAccepted {
                    initiator: me,
                    responder,
                    exchange: initiator_side,
                });
                return Ok(Tick::Advanced(events));
            }

            self.players[responder as usize].exchange_request = None;
            events.push(GameEvent::ExchangeRejected {
                initiator: me,
                responder,
            });
        }

        if events.is_empty() {
            Ok(Tick::Waiting)
        } else {
            Ok(Tick::Advanced(events))
        }
    }

    /// Settle a queued exchange with the bank if exact, otherwise offer it around
    fn offer_exchange(&mut self, me: PlayerId, exchange: Exchange) -> Vec<GameEvent> {
        let ports = self.board.ports_of(me);
        if exchange.is_bank_exact(&ports) {
            let player = &mut self.players[me as usize];
            player.proposals = None;
            if !exchange.possible(&player.hand) {
                return Vec::new();
            }
            exchange.apply_one(&mut player.hand);
            debug!(player = me, %exchange, "queued exchange settled with the bank");
            return vec![GameEvent::BankExchange {
                player: me,
                exchange,
            }];
        }

        for player in &mut self.players {
            if player.id != me {
                player.exchange_request = Some(exchange.inverse());
            }
        }
        debug!(player = me, %exchange, "exchange offered");
        vec![GameEvent::ExchangeProposed {
            player: me,
            exchange,
        }]
    }

    // ==================== Card Effects ====================

    fn advance_effect<C: Controller>(
        &mut self,
        me: PlayerId,
        controllers: &mut [C],
    ) -> Result<Tick, GameError> {
        let Some(effect) = self.players[me as usize].effect else {
            return Err(GameError::InvalidPhase);
        };
        let controller = &mut controllers[me as usize];
        let mut events = Vec::new();

        let next = match effect {
            CardEffect::Knight => {
                let Some(tile) = controller.move_thief(&mut Sandbox::new(self, me)) else {
                    return Ok(Tick::Waiting);
                };
                events.push(self.relocate_thief(me, tile)?);
                self.can_steal(me).then_some(CardEffect::KnightSteal)
            }
            CardEffect::KnightSteal => {
                let Some(victim) = controller.steal_card(&mut Sandbox::new(self, me)) else {
                    return Ok(Tick::Waiting);
                };
                events.push(self.steal(me, victim)?);
                None
            }
            CardEffect::Monopoly => {
                let Some(resource) = controller.monopoly(&mut Sandbox::new(self, me)) else {
                    return Ok(Tick::Waiting);
                };
                let mut total_taken = 0;
                for player in &mut self.players {
                    if player.id != me {
                        let count = player.hand.get(resource);
                        player.hand.set(resource, 0);
                        total_taken += count;
                    }
                }
                self.players[me as usize].hand.add(resource, total_taken);
                events.push(GameEvent::MonopolyPlayed {
                    player: me,
                    resource,
                    total_taken,
                });
                None
            }
            CardEffect::FreeRoads | CardEffect::FreeRoadsOneLeft => {
                if self.players[me as usize].roads >= MAX_ROADS
                    || self.free_road_spots(me).is_empty()
                {
                    warn!(player = me, ?effect, "no legal road left, effect skipped");
                    events.push(GameEvent::EffectSkipped { player: me, effect });
                    None
                } else {
                    let Some(path) = controller.place_free_road(&mut Sandbox::new(self, me))
                    else {
                        return Ok(Tick::Waiting);
                    };
                    if path.0 >= self.board.paths().len()
                        || !Action::BuildRoad(path).available(&self.board, self.player(me), true)
                    {
                        return Err(GameError::InvalidLocation);
                    }
                    let titles = self.titles();
                    let (board, player) = self.board_and_player_mut(me);
                    actions::place_road(board, player, path);
                    events.push(GameEvent::RoadBuilt {
                        player: me,
                        path,
                        free: true,
                    });
                    self.title_events(titles, &mut events);
                    (effect == CardEffect::FreeRoads).then_some(CardEffect::FreeRoadsOneLeft)
                }
            }
            CardEffect::FreeCards | CardEffect::FreeCardsOneLeft => {
                let Some(resource) = controller.free_card(&mut Sandbox::new(self, me)) else {
                    return Ok(Tick::Waiting);
                };
                self.players[me as usize].hand.add_one(resource);
                events.push(GameEvent::FreeCardTaken {
                    player: me,
                    resource,
                });
                (effect == CardEffect::FreeCards).then_some(CardEffect::FreeCardsOneLeft)
            }
        };

        self.players[me as usize].effect = next;
        Ok(Tick::Advanced(events))
    }

    // ==================== Actions ====================

    /// Check and apply a one-shot action for `me`
    fn perform(
        &mut self,
        me: PlayerId,
        action: Action,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        let in_range = match action {
            Action::BuildRoad(path) => path.0 < self.board.paths().len(),
            Action::BuildColony(i) | Action::BuildTown(i) => i.0 < self.board.intersections().len(),
            Action::BuyDevCard | Action::RevealDevCard(_) => true,
        };
        if !in_range {
            return Err(GameError::InvalidLocation);
        }

        let player = &self.players[me as usize];
        if !action.available(&self.board, player, self.dice.is_some()) {
            return Err(GameError::ActionUnavailable(action));
        }
        if !player.hand.can_afford(&action.cost()) {
            return Err(GameError::CannotAfford);
        }

        let titles = self.titles();
        let (board, player) = self.board_and_player_mut(me);
        action.apply(board, player);
        debug!(player = me, ?action, "action performed");

        events.push(match action {
            Action::BuildRoad(path) => GameEvent::RoadBuilt {
                player: me,
                path,
                free: false,
            },
            Action::BuildColony(intersection) => GameEvent::ColonyBuilt {
                player: me,
                intersection,
            },
            Action::BuildTown(intersection) => GameEvent::TownBuilt {
                player: me,
                intersection,
            },
            Action::BuyDevCard => GameEvent::DevCardBought { player: me },
            Action::RevealDevCard(card) => GameEvent::DevCardRevealed { player: me, card },
        });
        if matches!(action, Action::BuildColony(_)) {
            self.refresh_longest_road();
        }
        self.title_events(titles, events);
        Ok(())
    }

    fn titles(&self) -> (Option<TitleHolder>, Option<TitleHolder>) {
        (self.board.longest_road(), self.board.largest_army())
    }

    fn title_events(
        &self,
        (road, army): (Option<TitleHolder>, Option<TitleHolder>),
        events: &mut Vec<GameEvent>,
    ) {
        let previous = road.map(|h| h.player);
        let current = self.board.longest_road();
        if current.map(|h| h.player) != previous {
            info!(?previous, current = ?current.map(|h| h.player), "longest road changed");
            events.push(GameEvent::LongestRoadChanged {
                previous,
                current: current.map(|h| h.player),
                length: current.map_or(0, |h| h.count),
            });
        }

        let previous = army.map(|h| h.player);
        let current = self.board.largest_army();
        if current.map(|h| h.player) != previous {
            info!(?previous, current = ?current.map(|h| h.player), "largest army changed");
            events.push(GameEvent::LargestArmyChanged {
                previous,
                current: current.map(|h| h.player),
                knights: current.map_or(0, |h| h.count),
            });
        }
    }

    /// Recompute every road length after a colony may have split one
    ///
    /// The holder keeps the title while tied for the lead; otherwise it passes to
    /// a unique leader at or above the minimum, or to nobody.
    fn refresh_longest_road(&mut self) {
        for player in &mut self.players {
            player.longest_road = self.board.longest_road_of(player.id);
        }
        let best = self
            .players
            .iter()
            .map(|p| p.longest_road)
            .max()
            .unwrap_or(0);

        let holder = self.board.longest_road().map(|h| h.player);
        let next = match holder {
            Some(h) if best >= MIN_LONGEST_ROAD && self.player(h).longest_road == best => Some(h),
            _ => {
                let leaders: Vec<PlayerId> = self
                    .players
                    .iter()
                    .filter(|p| p.longest_road == best)
                    .map(|p| p.id)
                    .collect();
                (best >= MIN_LONGEST_ROAD && leaders.len() == 1).then(|| leaders[0])
            }
        };
        self.board.set_longest_road(next.map(|player| TitleHolder {
            player,
            count: best,
        }));
    }

    // ==================== Turn Management ====================

    fn end_turn(&mut self, me: PlayerId) -> Vec<GameEvent> {
        self.players[me as usize].end_turn();
        for player in &mut self.players {
            player.exchange_request = None;
        }

        let victory_points = self.victory_points(me);
        if victory_points >= self.config.victory_points {
            info!(player = me, victory_points, "game won");
            self.set_phase(Phase::End { winner: me });
            return vec![GameEvent::GameWon {
                player: me,
                victory_points,
            }];
        }

        self.turn += 1;
        self.dice = None;
        self.set_phase(Phase::Playing(PlayingStep::ThrowDice));
        let next_player = self.current_player();
        info!(player = me, next_player, victory_points, "turn ended");
        vec![GameEvent::TurnEnded {
            player: me,
            next_player,
        }]
    }
}
