//! The decision surface through which players drive a game.
//!
//! The game asks the current decision-maker one question per tick through the
//! [`Controller`] trait. Every answer is a [`Decision`]: `None` means the
//! decision is not made yet (a human has not clicked, a network peer has not
//! answered) and the game simply asks again on a later tick.
//!
//! Controllers see the game through a [`Sandbox`]. It gives read access to
//! everything plus checkpointed probes (`with_hand`, `with_exchange`,
//! `with_thief`, `with_action`) that mutate the acting player's state, run a
//! read-only closure, and restore the exact previous state before returning.

use crate::actions::Action;
use crate::board::{Board, IntersectionId, PathId, PlayerId, Resource, TileId};
use crate::exchange::Exchange;
use crate::game::Game;
use crate::player::{Player, ResourceHand};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Answer to a pending decision; `None` means "ask again later"
pub type Decision<T> = Option<T>;

/// What the current player does at the start of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiceChoice {
    Throw,
    /// Reveal a Knight before rolling
    RevealKnight,
}

/// A general decision during the free part of a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnCommand {
    Perform(Action),
    TradeWithBank(Exchange),
    /// Queue exchanges to offer, best first
    ProposeExchanges(Vec<Exchange>),
    EndTurn,
}

/// Something that answers a player's decisions
pub trait Controller {
    /// Free part of the turn: build, buy, reveal, trade or end
    fn play(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<TurnCommand>;

    fn place_initial_colony(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<IntersectionId>;

    fn place_initial_road(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PathId>;

    /// Cards to give up after a 7; must total exactly `count`
    fn remove_cards_for_thief(
        &mut self,
        sandbox: &mut Sandbox<'_>,
        count: u32,
    ) -> Decision<ResourceHand>;

    fn move_thief(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<TileId>;

    fn steal_card(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PlayerId>;

    /// Answer an exchange offered by the current player, seen from this side
    fn accept_exchange(&mut self, sandbox: &mut Sandbox<'_>, exchange: &Exchange)
        -> Decision<bool>;

    fn throw_dice(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<DiceChoice>;

    /// Acknowledge production after a roll
    fn get_resources(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<()>;

    fn place_free_road(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PathId>;

    fn free_card(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<Resource>;

    fn monopoly(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<Resource>;
}

impl<C: Controller + ?Sized> Controller for Box<C> {
    fn play(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<TurnCommand> {
        (**self).play(sandbox)
    }

    fn place_initial_colony(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<IntersectionId> {
        (**self).place_initial_colony(sandbox)
    }

    fn place_initial_road(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PathId> {
        (**self).place_initial_road(sandbox)
    }

    fn remove_cards_for_thief(
        &mut self,
        sandbox: &mut Sandbox<'_>,
        count: u32,
    ) -> Decision<ResourceHand> {
        (**self).remove_cards_for_thief(sandbox, count)
    }

    fn move_thief(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<TileId> {
        (**self).move_thief(sandbox)
    }

    fn steal_card(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PlayerId> {
        (**self).steal_card(sandbox)
    }

    fn accept_exchange(
        &mut self,
        sandbox: &mut Sandbox<'_>,
        exchange: &Exchange,
    ) -> Decision<bool> {
        (**self).accept_exchange(sandbox, exchange)
    }

    fn throw_dice(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<DiceChoice> {
        (**self).throw_dice(sandbox)
    }

    fn get_resources(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<()> {
        (**self).get_resources(sandbox)
    }

    fn place_free_road(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PathId> {
        (**self).place_free_road(sandbox)
    }

    fn free_card(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<Resource> {
        (**self).free_card(sandbox)
    }

    fn monopoly(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<Resource> {
        (**self).monopoly(sandbox)
    }
}

/// A controller's view of the game, with checkpointed what-if probes
pub struct Sandbox<'a> {
    game: &'a mut Game,
    me: PlayerId,
}

impl<'a> Sandbox<'a> {
    pub(crate) fn new(game: &'a mut Game, me: PlayerId) -> Self {
        Self { game, me }
    }

    /// The player this decision belongs to
    pub fn me(&self) -> PlayerId {
        self.me
    }

    pub fn game(&self) -> &Game {
        self.game
    }

    pub fn board(&self) -> &Board {
        self.game.board()
    }

    pub fn player(&self) -> &Player {
        self.game.player(self.me)
    }

    /// Evaluate `f` as if the acting player held `hand`
    pub fn with_hand<R>(&mut self, hand: ResourceHand, f: impl FnOnce(&Self) -> R) -> R {
        let saved = std::mem::replace(&mut self.game.player_mut(self.me).hand, hand);
        let result = f(self);
        self.game.player_mut(self.me).hand = saved;
        result
    }

    /// Evaluate `f` as if the acting player had made a bank-side exchange
    pub fn with_exchange<R>(&mut self, exchange: &Exchange, f: impl FnOnce(&Self) -> R) -> R {
        exchange.apply_one(&mut self.game.player_mut(self.me).hand);
        let result = f(self);
        exchange.undo(&mut self.game.player_mut(self.me).hand);
        result
    }

    /// Evaluate `f` with the thief standing on `tile`
    pub fn with_thief<R>(&mut self, tile: TileId, f: impl FnOnce(&Self) -> R) -> R {
        let saved = self.game.board().thief();
        self.game.board_mut().move_thief(tile);
        let result = f(self);
        self.game.board_mut().move_thief(saved);
        result
    }

    /// Evaluate `f` after the acting player takes `action`
    ///
    /// The action must be available and affordable.
    pub fn with_action<R>(&mut self, action: Action, f: impl FnOnce(&Self) -> R) -> R {
        let (board, player) = self.game.board_and_player_mut(self.me);
        let applied = action.apply(board, player);
        let result = f(self);
        let (board, player) = self.game.board_and_player_mut(self.me);
        applied.undo(board, player);
        result
    }
}

/// One queued input for a [`ScriptedController`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Colony(IntersectionId),
    Road(PathId),
    Discard(ResourceHand),
    Thief(TileId),
    Steal(PlayerId),
    Answer(bool),
    Dice(DiceChoice),
    Collect,
    FreeRoad(PathId),
    FreeCard(Resource),
    Monopoly(Resource),
    Turn(TurnCommand),
}

/// A controller fed by an input layer, one command per decision
///
/// A decision is answered only when the command at the front of the queue
/// matches it; otherwise the game is told to wait.
#[derive(Debug, Clone, Default)]
pub struct ScriptedController {
    queue: VecDeque<Command>,
}

impl ScriptedController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands(commands: impl IntoIterator<Item = Command>) -> Self {
        Self {
            queue: commands.into_iter().collect(),
        }
    }

    pub fn push(&mut self, command: Command) {
        self.queue.push_back(command);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn next<T>(&mut self, pick: impl FnOnce(&Command) -> Option<T>) -> Decision<T> {
        let value = pick(self.queue.front()?)?;
        self.queue.pop_front();
        Some(value)
    }
}

impl Controller for ScriptedController {
    fn play(&mut self, _: &mut Sandbox<'_>) -> Decision<TurnCommand> {
        self.next(|c| match c {
            Command::Turn(command) => Some(command.clone()),
            _ => None,
        })
    }

    fn place_initial_colony(&mut self, _: &mut Sandbox<'_>) -> Decision<IntersectionId> {
        self.next(|c| match c {
            Command::Colony(at) => Some(*at),
            _ => None,
        })
    }

    fn place_initial_road(&mut self, _: &mut Sandbox<'_>) -> Decision<PathId> {
        self.next(|c| match c {
            Command::Road(path) => Some(*path),
            _ => None,
        })
    }

    fn remove_cards_for_thief(&mut self, _: &mut Sandbox<'_>, _: u32) -> Decision<ResourceHand> {
        self.next(|c| match c {
            Command::Discard(cards) => Some(*cards),
            _ => None,
        })
    }

    fn move_thief(&mut self, _: &mut Sandbox<'_>) -> Decision<TileId> {
        self.next(|c| match c {
            Command::Thief(tile) => Some(*tile),
            _ => None,
        })
    }

    fn steal_card(&mut self, _: &mut Sandbox<'_>) -> Decision<PlayerId> {
        self.next(|c| match c {
            Command::Steal(victim) => Some(*victim),
            _ => None,
        })
    }

    fn accept_exchange(&mut self, _: &mut Sandbox<'_>, _: &Exchange) -> Decision<bool> {
        self.next(|c| match c {
            Command::Answer(accept) => Some(*accept),
            _ => None,
        })
    }

    fn throw_dice(&mut self, _: &mut Sandbox<'_>) -> Decision<DiceChoice> {
        self.next(|c| match c {
            Command::Dice(choice) => Some(*choice),
            _ => None,
        })
    }

    fn get_resources(&mut self, _: &mut Sandbox<'_>) -> Decision<()> {
        self.next(|c| match c {
            Command::Collect => Some(()),
            _ => None,
        })
    }

    fn place_free_road(&mut self, _: &mut Sandbox<'_>) -> Decision<PathId> {
        self.next(|c| match c {
            Command::FreeRoad(path) => Some(*path),
            _ => None,
        })
    }

    fn free_card(&mut self, _: &mut Sandbox<'_>) -> Decision<Resource> {
        self.next(|c| match c {
            Command::FreeCard(resource) => Some(*resource),
            _ => None,
        })
    }

    fn monopoly(&mut self, _: &mut Sandbox<'_>) -> Decision<Resource> {
        self.next(|c| match c {
            Command::Monopoly(resource) => Some(*resource),
            _ => None,
        })
    }
}
