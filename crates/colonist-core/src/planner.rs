//! Heuristic planner.
//!
//! The planner keeps no plan between calls. Every decision recomputes the best
//! [`Objective`] from the current state, so card effects and thief interrupts
//! between two calls never leave it acting on a stale plan.
//!
//! - Colony objective: BFS over free paths from the player's network to every
//!   buildable intersection, scored by desirability against turns-to-afford,
//!   then the parent chain is walked back into road, road, ..., colony
//! - Town objective: each own colony scored the same way, no search
//! - Trades, discards and card choices are scored by probing the objective
//!   mark in a [`Sandbox`] and keeping what improves it

use crate::actions::Action;
use crate::board::{Board, ConstructionKind, IntersectionId, PathId, PlayerId, Resource, TileId};
use crate::config::PlannerConfig;
use crate::controller::{Controller, Decision, DiceChoice, Sandbox, TurnCommand};
use crate::exchange::{bank_exchanges, Exchange};
use crate::marks::{mark_thief_tile, Outlook};
use crate::player::{costs, DevCard, Player, ResourceHand, MAX_COLONIES, MAX_ROADS, MAX_TOWNS};
use std::collections::VecDeque;
use tracing::trace;

/// Cards offered or asked for in a single exchange proposal, per side
pub const MAX_OFFER_CARDS: u32 = 4;

/// A scored sequence of one-shot actions
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Actions in the order they must be taken
    pub actions: Vec<Action>,
    pub mark: f64,
}

impl Objective {
    /// Total resources the remaining actions consume
    pub fn cost(&self) -> ResourceHand {
        let mut cost = ResourceHand::new();
        for action in &self.actions {
            cost.add_hand(&action.cost());
        }
        cost
    }

    pub fn first(&self) -> Option<Action> {
        self.actions.first().copied()
    }
}

/// Result of the breadth-first search behind the colony objective
#[derive(Debug, Clone)]
pub struct RoadSearch {
    /// Roads needed to reach each intersection, `None` if out of reach
    pub distance: Vec<Option<u32>>,
    /// Path and intersection each reached intersection was reached from
    parent: Vec<Option<(PathId, IntersectionId)>>,
}

impl RoadSearch {
    /// Search from `starts` over paths without a road
    ///
    /// Intersections holding a construction are never entered, and the search
    /// stops once it would need more roads than `roads_left`.
    pub fn run(board: &Board, starts: &[IntersectionId], roads_left: u32) -> Self {
        let count = board.intersections().len();
        let mut distance = vec![None; count];
        let mut parent = vec![None; count];
        let mut queue = VecDeque::new();

        for &start in starts {
            if distance[start.0].is_none() {
                distance[start.0] = Some(0);
                queue.push_back(start);
            }
        }

        while let Some(at) = queue.pop_front() {
            let next = distance[at.0].unwrap_or(0) + 1;
            if next > roads_left {
                break;
            }
            for (path, neighbour) in board.neighbours(at) {
                if board.path(path).road.is_some()
                    || board.intersection(neighbour).construction.is_some()
                    || distance[neighbour.0].is_some()
                {
                    continue;
                }
                distance[neighbour.0] = Some(next);
                parent[neighbour.0] = Some((path, at));
                queue.push_back(neighbour);
            }
        }

        Self { distance, parent }
    }

    /// Roads from the network to `target`, nearest first
    pub fn roads_to(&self, target: IntersectionId) -> Vec<PathId> {
        let mut roads = Vec::new();
        let mut at = target;
        while let Some((path, from)) = self.parent[at.0] {
            roads.push(path);
            at = from;
        }
        roads.reverse();
        roads
    }
}

/// Intersections a player's next road or colony can grow from
pub fn network_starts(board: &Board, player: PlayerId) -> Vec<IntersectionId> {
    let mut starts: Vec<IntersectionId> = board.constructions_of(player).map(|(i, _)| i).collect();
    for road in board.roads_of(player) {
        for end in board.path(road).ends() {
            if board.intersection(end).construction.is_none() && !starts.contains(&end) {
                starts.push(end);
            }
        }
    }
    starts
}

/// Best colony to reach, with the roads leading there
///
/// `starts` overrides the search origins (the player's whole network by default).
pub fn colony_objective(
    board: &Board,
    player: &Player,
    starts: Option<&[IntersectionId]>,
) -> Option<Objective> {
    if player.colonies >= MAX_COLONIES {
        return None;
    }
    let network;
    let starts = match starts {
        Some(starts) => starts,
        None => {
            network = network_starts(board, player.id);
            &network[..]
        }
    };

    let search = RoadSearch::run(board, starts, MAX_ROADS.saturating_sub(player.roads));
    let outlook = Outlook::new(board, player);

    let mut best: Option<(IntersectionId, f64)> = None;
    for target in board.intersection_ids() {
        let Some(roads) = search.distance[target.0] else {
            continue;
        };
        if !board.satisfies_distance_rule(target) {
            continue;
        }
        let mut cost = costs::colony();
        for _ in 0..roads {
            cost.add_hand(&costs::road());
        }
        let mark = outlook.mark_objective(&cost, outlook.mark_intersection(board, target));
        trace!(player = player.id, target = target.0, roads, mark, "colony candidate");
        if best.map_or(true, |(_, m)| mark > m) {
            best = Some((target, mark));
        }
    }

    let (target, mark) = best?;
    let mut actions: Vec<Action> = search
        .roads_to(target)
        .into_iter()
        .map(Action::BuildRoad)
        .collect();
    actions.push(Action::BuildColony(target));
    Some(Objective { actions, mark })
}

/// Best colony to upgrade
pub fn town_objective(board: &Board, player: &Player) -> Option<Objective> {
    if player.towns >= MAX_TOWNS {
        return None;
    }
    let outlook = Outlook::new(board, player);
    let cost = costs::town();

    let mut best: Option<(IntersectionId, f64)> = None;
    for (at, construction) in board.constructions_of(player.id) {
        if construction.kind != ConstructionKind::Colony {
            continue;
        }
        let mark = outlook.mark_objective(&cost, outlook.mark_intersection(board, at));
        if best.map_or(true, |(_, m)| mark > m) {
            best = Some((at, mark));
        }
    }

    best.map(|(at, mark)| Objective {
        actions: vec![Action::BuildTown(at)],
        mark,
    })
}

/// The higher-marked of the colony and town objectives
pub fn best_objective(board: &Board, player: &Player) -> Option<Objective> {
    let colony = colony_objective(board, player, None);
    let town = town_objective(board, player);
    match (colony, town) {
        (Some(c), Some(t)) => Some(if t.mark > c.mark { t } else { c }),
        (c, t) => c.or(t),
    }
}

fn best_mark(sandbox: &Sandbox<'_>) -> Option<f64> {
    best_objective(sandbox.board(), sandbox.player()).map(|o| o.mark)
}

/// How much an exchange improves the best objective, as a ratio
///
/// Above 1 the exchange helps. Exchanges the hand cannot pay for, and boards
/// where no objective is left, score 0.
pub fn mark_exchange(sandbox: &mut Sandbox<'_>, exchange: &Exchange) -> f64 {
    if !exchange.possible(&sandbox.player().hand) {
        return 0.0;
    }
    let Some(before) = best_mark(sandbox) else {
        return 0.0;
    };
    let Some(after) = sandbox.with_exchange(exchange, best_mark) else {
        return 0.0;
    };
    if before <= 0.0 {
        return 0.0;
    }
    after / before
}

/// The bank exchange that helps the most, if any helps
pub fn best_bank_exchange(sandbox: &mut Sandbox<'_>) -> Option<Exchange> {
    let ports = sandbox.board().ports_of(sandbox.me());
    let mut best: Option<(Exchange, f64)> = None;
    for exchange in bank_exchanges(&sandbox.player().hand, &ports) {
        let mark = mark_exchange(sandbox, &exchange);
        if mark > best.map_or(1.0, |(_, m)| m) {
            best = Some((exchange, mark));
        }
    }
    best.map(|(exchange, _)| exchange)
}

/// Exchanges worth offering to other players, best first
///
/// Offers swap cards the objective does not use for cards it still lacks.
pub fn suggest_exchanges(sandbox: &mut Sandbox<'_>, limit: usize) -> Vec<Exchange> {
    let Some(objective) = best_objective(sandbox.board(), sandbox.player()) else {
        return Vec::new();
    };
    let hand = sandbox.player().hand;
    let needed = objective.cost().saturating_sub(&hand);
    let spare = hand.saturating_sub(&objective.cost());

    let mut marked = Vec::new();
    let sized = |h: &ResourceHand| !h.is_empty() && h.total() <= MAX_OFFER_CARDS;
    let gains: Vec<ResourceHand> = needed.subsets().into_iter().filter(sized).collect();
    for lost in spare.subsets().into_iter().filter(sized) {
        for &gain in &gains {
            let exchange = Exchange::new(gain, lost);
            let mark = mark_exchange(sandbox, &exchange);
            if mark > 1.0 {
                marked.push((exchange, mark));
            }
        }
    }
    marked.sort_by(|a, b| b.1.total_cmp(&a.1));
    marked.truncate(limit);
    marked.into_iter().map(|(exchange, _)| exchange).collect()
}

/// A controller driven by objective marks
#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Card to reveal before trading toward the objective's next step
    fn card_to_reveal(player: &Player, next: Action) -> Option<DevCard> {
        [DevCard::FreeCards, DevCard::Monopoly]
            .into_iter()
            .chain(matches!(next, Action::BuildRoad(_)).then_some(DevCard::FreeRoads))
            .find(|&card| player.has_playable_dev_card(card))
    }

    /// Resource whose extra `count` cards mark the best objective highest
    fn best_extra_card(sandbox: &mut Sandbox<'_>, count: impl Fn(Resource) -> u32) -> Resource {
        let mut best = (Resource::ALL[0], f64::MIN);
        for resource in Resource::ALL {
            let mut hand = sandbox.player().hand;
            hand.add(resource, count(resource));
            let mark = sandbox.with_hand(hand, best_mark).unwrap_or(0.0);
            if mark > best.1 {
                best = (resource, mark);
            }
        }
        best.0
    }
}

impl Controller for Planner {
    fn play(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<TurnCommand> {
        let player = sandbox.player();

        if player.has_playable_dev_card(DevCard::VictoryPoint) {
            return Some(TurnCommand::Perform(Action::RevealDevCard(
                DevCard::VictoryPoint,
            )));
        }

        let Some(objective) = best_objective(sandbox.board(), player) else {
            // Nothing left to build toward
            let buy = Action::BuyDevCard;
            if buy.available(sandbox.board(), player, true) && player.hand.can_afford(&buy.cost()) {
                return Some(TurnCommand::Perform(buy));
            }
            return Some(TurnCommand::EndTurn);
        };
        let Some(next) = objective.first() else {
            return Some(TurnCommand::EndTurn);
        };
        trace!(player = player.id, ?next, mark = objective.mark, "objective");

        if player.hand.can_afford(&next.cost()) {
            if next.available(sandbox.board(), player, true) {
                return Some(TurnCommand::Perform(next));
            }
            return Some(TurnCommand::EndTurn);
        }

        if let Some(card) = Self::card_to_reveal(player, next) {
            return Some(TurnCommand::Perform(Action::RevealDevCard(card)));
        }

        if let Some(exchange) = best_bank_exchange(sandbox) {
            return Some(TurnCommand::TradeWithBank(exchange));
        }

        let player = sandbox.player();
        if self.config.trade_with_players
            && player.proposals.is_none()
            && player.negotiations < self.config.max_negotiations
        {
            let offers = suggest_exchanges(sandbox, self.config.max_proposals);
            if !offers.is_empty() {
                return Some(TurnCommand::ProposeExchanges(offers));
            }
        }
        Some(TurnCommand::EndTurn)
    }

    fn place_initial_colony(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<IntersectionId> {
        let board = sandbox.board();
        let outlook = Outlook::new(board, sandbox.player());
        board
            .intersection_ids()
            .filter(|&i| board.satisfies_distance_rule(i))
            .map(|i| (i, outlook.mark_intersection(board, i)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn place_initial_road(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PathId> {
        let board = sandbox.board();
        let home = board.colony_without_road(sandbox.me())?;
        let toward = colony_objective(board, sandbox.player(), Some(&[home]))
            .and_then(|o| o.first())
            .and_then(|action| match action {
                Action::BuildRoad(path) => Some(path),
                _ => None,
            });
        toward.or_else(|| {
            board
                .intersection(home)
                .paths()
                .iter()
                .copied()
                .find(|&p| board.path(p).road.is_none())
        })
    }

    fn remove_cards_for_thief(
        &mut self,
        sandbox: &mut Sandbox<'_>,
        count: u32,
    ) -> Decision<ResourceHand> {
        let hand = sandbox.player().hand;
        let keep = hand.total().saturating_sub(count);

        let mut best: Option<(ResourceHand, f64)> = None;
        for kept in hand.subsets_of_size(keep) {
            let mark = sandbox.with_hand(kept, best_mark).unwrap_or(0.0);
            if best.map_or(true, |(_, m)| mark > m) {
                best = Some((kept, mark));
            }
        }
        let (kept, _) = best?;
        Some(hand.saturating_sub(&kept))
    }

    fn move_thief(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<TileId> {
        let game = sandbox.game();
        let board = game.board();
        let me = sandbox.player();
        board
            .tile_ids()
            .filter(|&t| t != board.thief())
            .map(|t| (t, mark_thief_tile(board, game.players(), me, t)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(t, _)| t)
    }

    fn steal_card(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PlayerId> {
        let game = sandbox.game();
        // Closest to winning first
        game.steal_targets(sandbox.me())
            .into_iter()
            .max_by_key(|&p| (game.victory_points(p), std::cmp::Reverse(p)))
    }

    fn accept_exchange(
        &mut self,
        sandbox: &mut Sandbox<'_>,
        exchange: &Exchange,
    ) -> Decision<bool> {
        Some(mark_exchange(sandbox, exchange) > 1.0)
    }

    fn throw_dice(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<DiceChoice> {
        let board = sandbox.board();
        let me = sandbox.me();
        let blocked = board.players_on_tile(board.thief()).contains(&me);
        let knight = Action::RevealDevCard(DevCard::Knight);
        if blocked && knight.available(board, sandbox.player(), false) {
            return Some(DiceChoice::RevealKnight);
        }
        Some(DiceChoice::Throw)
    }

    fn get_resources(&mut self, _: &mut Sandbox<'_>) -> Decision<()> {
        Some(())
    }

    fn place_free_road(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<PathId> {
        let spots = sandbox.game().free_road_spots(sandbox.me());
        let toward = best_objective(sandbox.board(), sandbox.player())
            .and_then(|o| o.first())
            .and_then(|action| match action {
                Action::BuildRoad(path) if spots.contains(&path) => Some(path),
                _ => None,
            });
        toward.or_else(|| spots.first().copied())
    }

    fn free_card(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<Resource> {
        Some(Self::best_extra_card(sandbox, |_| 1))
    }

    fn monopoly(&mut self, sandbox: &mut Sandbox<'_>) -> Decision<Resource> {
        let me = sandbox.me();
        let held: Vec<ResourceHand> = sandbox
            .game()
            .players()
            .iter()
            .filter(|p| p.id != me)
            .map(|p| p.hand)
            .collect();
        Some(Self::best_extra_card(sandbox, |resource| {
            held.iter().map(|h| h.get(resource)).sum()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardLayout;
    use crate::config::GameConfig;
    use crate::game::Game;

    fn board() -> Board {
        Board::new(&BoardLayout::standard(), DevCard::standard_deck()).unwrap()
    }

    fn seated(board: &mut Board, id: PlayerId, at: IntersectionId) -> Player {
        let mut player = Player::new(id, format!("P{}", id));
        board.place_colony(at, id);
        player.register_colony(&board.intersection_production(at));
        player
    }

    #[test]
    fn test_search_distances() {
        let board = board();
        let home = IntersectionId(0);
        let search = RoadSearch::run(&board, &[home], MAX_ROADS);
        assert_eq!(search.distance[home.0], Some(0));
        for (_, neighbour) in board.neighbours(home) {
            assert_eq!(search.distance[neighbour.0], Some(1));
        }
        assert!(search.distance.iter().all(|d| d.is_some()));
    }

    #[test]
    fn test_search_respects_road_budget() {
        let board = board();
        let home = IntersectionId(0);
        let search = RoadSearch::run(&board, &[home], 2);
        assert!(search.distance.iter().flatten().all(|&d| d <= 2));
        assert!(search.distance.iter().any(|d| d.is_none()));
    }

    #[test]
    fn test_search_stops_at_constructions_and_roads() {
        let mut board = board();
        let home = IntersectionId(0);
        let (blocked_path, blocked) = board.neighbours(home).next().unwrap();
        board.set_road(blocked_path, Some(1));
        let (_, other) = board.neighbours(home).nth(1).unwrap();
        board.place_colony(other, 1);

        let search = RoadSearch::run(&board, &[home], MAX_ROADS);
        assert_ne!(search.distance[blocked.0], Some(1));
        assert_eq!(search.distance[other.0], None);
    }

    #[test]
    fn test_backtracked_roads_match_distance() {
        let mut board = board();
        let home = board.tile(TileId(2)).intersections()[3];
        let player = seated(&mut board, 0, home);

        let objective = colony_objective(&board, &player, None).unwrap();
        let Some(Action::BuildColony(target)) = objective.actions.last().copied() else {
            panic!("colony objective must end with the colony");
        };
        let search = RoadSearch::run(&board, &[home], MAX_ROADS);
        let roads = objective.actions.len() as u32 - 1;
        assert_eq!(Some(roads), search.distance[target.0]);
        assert!(roads >= 2);

        // Roads chain from the home colony to the target
        let mut at = home;
        for action in &objective.actions[..roads as usize] {
            let Action::BuildRoad(path) = *action else {
                panic!("expected roads before the colony");
            };
            assert!(board.path(path).ends().contains(&at));
            at = board.path(path).other_end(at);
        }
        assert_eq!(at, target);
    }

    #[test]
    fn test_objective_cost() {
        let objective = Objective {
            actions: vec![
                Action::BuildRoad(PathId(0)),
                Action::BuildRoad(PathId(1)),
                Action::BuildColony(IntersectionId(2)),
            ],
            mark: 1.0,
        };
        assert_eq!(objective.cost(), ResourceHand::with_amounts(3, 3, 1, 1, 0));
    }

    #[test]
    fn test_no_colony_objective_at_limit() {
        let mut board = board();
        let mut player = seated(&mut board, 0, IntersectionId(0));
        player.colonies = MAX_COLONIES;
        assert!(colony_objective(&board, &player, None).is_none());
    }

    #[test]
    fn test_town_objective_picks_own_colony() {
        let mut board = board();
        let home = board.tile(TileId(2)).intersections()[3];
        let player = seated(&mut board, 0, home);
        let objective = town_objective(&board, &player).unwrap();
        assert_eq!(objective.actions, vec![Action::BuildTown(home)]);
        assert!(objective.mark > 0.0);

        let nobody = Player::new(1, "Nobody".to_string());
        assert!(town_objective(&board, &nobody).is_none());
    }

    #[test]
    fn test_best_objective_exists_on_open_board() {
        let mut board = board();
        let player = seated(&mut board, 0, IntersectionId(0));
        let objective = best_objective(&board, &player).unwrap();
        assert!(!objective.actions.is_empty());
        assert!(objective.mark > 0.0);
    }

    #[test]
    fn test_bank_exchange_tried_before_offers() {
        let names = vec!["A".to_string(), "B".to_string()];
        let mut game = Game::new(names, GameConfig::with_seed(5)).unwrap();
        let home = game.board().tile(TileId(2)).intersections()[3];
        {
            let (board, player) = game.board_and_player_mut(0);
            board.place_colony(home, 0);
            player.register_colony(&board.intersection_production(home));
        }
        {
            let (_, other) = game.board_and_player_mut(1);
            other.hand = ResourceHand::with_amounts(4, 4, 4, 4, 4);
        }

        let mut planner = Planner::new(PlannerConfig::default());
        let mut bank_trades = 0;
        for resource in Resource::ALL {
            for count in [4, 8, 12] {
                game.board_and_player_mut(0).1.hand = ResourceHand::single(resource, count);
                let mut sandbox = Sandbox::new(&mut game, 0);
                let Some(exchange) = best_bank_exchange(&mut sandbox) else {
                    continue;
                };
                bank_trades += 1;
                assert_eq!(
                    planner.play(&mut sandbox),
                    Some(TurnCommand::TradeWithBank(exchange))
                );
            }
        }
        assert!(bank_trades > 0);
    }
}
