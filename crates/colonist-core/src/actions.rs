//! Game actions that players can take during their turn.
//!
//! This module defines the one-shot turn actions, their legality rules and
//! effects, and the events that result from playing a game.
//!
//! [`Action::apply`] asserts [`Action::available`]; callers check first. It
//! returns an [`Applied`] trace holding exactly the cached state the action
//! touched, so a hypothetical action can be taken back with
//! [`Applied::undo`] without cloning the board.

use crate::board::{
    Board, Construction, IntersectionId, PathId, PlayerId, Resource, TileId, TitleHolder,
};
use crate::exchange::Exchange;
use crate::player::{
    costs, CardEffect, DevCard, Player, ResourceHand, MAX_COLONIES, MAX_ROADS, MAX_TOWNS,
};
use crate::production::Production;
use serde::{Deserialize, Serialize};

/// Minimum road length for the longest road title
pub const MIN_LONGEST_ROAD: u32 = 5;

/// Minimum knights for the largest army title
pub const MIN_LARGEST_ARMY: u32 = 3;

/// One-shot actions a player can take on their turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Build a road on a path
    BuildRoad(PathId),
    /// Build a colony on an intersection
    BuildColony(IntersectionId),
    /// Upgrade one of the player's colonies
    BuildTown(IntersectionId),
    /// Draw from the development pile
    BuyDevCard,
    /// Reveal a held development card and start its effect
    RevealDevCard(DevCard),
}

impl Action {
    /// Resources the action consumes
    pub fn cost(&self) -> ResourceHand {
        match self {
            Action::BuildRoad(_) => costs::road(),
            Action::BuildColony(_) => costs::colony(),
            Action::BuildTown(_) => costs::town(),
            Action::BuyDevCard => costs::dev_card(),
            Action::RevealDevCard(_) => ResourceHand::new(),
        }
    }

    /// Whether the rules allow the action, cost aside
    ///
    /// Before the dice are rolled only a Knight may be revealed.
    pub fn available(&self, board: &Board, player: &Player, dice_rolled: bool) -> bool {
        match *self {
            Action::BuildRoad(path) => {
                board.path(path).road.is_none()
                    && player.roads < MAX_ROADS
                    && board.connects_to_network(path, player.id)
            }
            Action::BuildColony(at) => {
                board.satisfies_distance_rule(at)
                    && player.colonies < MAX_COLONIES
                    && board.has_adjacent_road(at, player.id)
            }
            Action::BuildTown(at) => {
                board.intersection(at).construction == Some(Construction::colony(player.id))
                    && player.towns < MAX_TOWNS
            }
            Action::BuyDevCard => board.dev_cards_left() > 0,
            Action::RevealDevCard(card) => {
                player.has_playable_dev_card(card) && (dice_rolled || card == DevCard::Knight)
            }
        }
    }

    /// Apply the action for `player`, paying its cost
    pub fn apply(&self, board: &mut Board, player: &mut Player) -> Applied {
        assert!(
            self.available(board, player, true),
            "{:?} is not available to player {}",
            self,
            player.id
        );
        let trace = Applied {
            action: *self,
            longest_road: player.longest_road,
            road_title: board.longest_road(),
            army_title: board.largest_army(),
            production: *player.production(),
            effect: player.effect,
            card_slot: 0,
        };
        player.hand.subtract(&self.cost());

        match *self {
            Action::BuildRoad(path) => {
                place_road(board, player, path);
                trace
            }
            Action::BuildColony(at) => {
                board.place_colony(at, player.id);
                player.register_colony(&board.intersection_production(at));
                trace
            }
            Action::BuildTown(at) => {
                board.upgrade_to_town(at);
                player.register_town(&board.intersection_production(at));
                trace
            }
            Action::BuyDevCard => {
                if let Some(card) = board.draw_dev_card() {
                    player.dev_cards_bought_this_turn.push(card);
                }
                trace
            }
            Action::RevealDevCard(card) => {
                let slot = player
                    .dev_cards
                    .iter()
                    .position(|c| *c == card)
                    .unwrap_or_default();
                player.dev_cards.remove(slot);
                player.revealed.push(card);
                player.effect = CardEffect::started_by(card);
                if card == DevCard::Knight {
                    award_largest_army(board, player);
                }
                Applied {
                    card_slot: slot,
                    ..trace
                }
            }
        }
    }
}

/// Put a road down for free and refresh the owner's road length and title
pub(crate) fn place_road(board: &mut Board, player: &mut Player, path: PathId) {
    board.place_road(path, player.id);
    player.roads += 1;
    player.longest_road = board.longest_road_of(player.id);
    award_longest_road(board, player);
}

/// Give the road title to the player if their road now beats the holder's
fn award_longest_road(board: &mut Board, player: &Player) {
    let length = player.longest_road;
    if length < MIN_LONGEST_ROAD {
        return;
    }
    match board.longest_road() {
        Some(holder) if holder.player == player.id => {
            board.set_longest_road(Some(TitleHolder {
                player: player.id,
                count: length,
            }));
        }
        Some(holder) if length <= holder.count => {}
        _ => board.set_longest_road(Some(TitleHolder {
            player: player.id,
            count: length,
        })),
    }
}

/// Give the army title to the player if their knights now beat the holder's
fn award_largest_army(board: &mut Board, player: &Player) {
    let knights = player.knights();
    if knights < MIN_LARGEST_ARMY {
        return;
    }
    match board.largest_army() {
        Some(holder) if holder.player != player.id && knights <= holder.count => {}
        _ => board.set_largest_army(Some(TitleHolder {
            player: player.id,
            count: knights,
        })),
    }
}

/// What an applied action changed, enough to take it back exactly
#[derive(Debug, Clone)]
pub struct Applied {
    action: Action,
    longest_road: u32,
    road_title: Option<TitleHolder>,
    army_title: Option<TitleHolder>,
    production: Production,
    effect: Option<CardEffect>,
    card_slot: usize,
}

impl Applied {
    pub fn action(&self) -> Action {
        self.action
    }

    /// Revert the action on the same board and player it was applied to
    pub fn undo(self, board: &mut Board, player: &mut Player) {
        match self.action {
            Action::BuildRoad(path) => {
                board.set_road(path, None);
                player.roads -= 1;
                player.longest_road = self.longest_road;
                board.set_longest_road(self.road_title);
            }
            Action::BuildColony(at) => {
                board.set_construction(at, None);
                player.colonies -= 1;
            }
            Action::BuildTown(at) => {
                board.set_construction(at, Some(Construction::colony(player.id)));
                player.towns -= 1;
                player.colonies += 1;
            }
            Action::BuyDevCard => {
                if let Some(card) = player.dev_cards_bought_this_turn.pop() {
                    board.return_dev_card(card);
                }
            }
            Action::RevealDevCard(card) => {
                player.revealed.pop();
                player.dev_cards.insert(self.card_slot, card);
                board.set_largest_army(self.army_title);
            }
        }
        player.set_production(self.production);
        player.effect = self.effect;
        player.hand.add_hand(&self.action.cost());
    }
}

/// Events that occur as the game advances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A colony was placed during the opening rounds
    InitialColonyPlaced {
        player: PlayerId,
        intersection: IntersectionId,
    },

    /// A road was placed during the opening rounds
    InitialRoadPlaced { player: PlayerId, path: PathId },

    /// Resources granted by the second opening colony
    StartingResources {
        player: PlayerId,
        resources: ResourceHand,
    },

    /// Dice were rolled
    DiceRolled {
        player: PlayerId,
        roll: (u8, u8),
        total: u8,
    },

    /// Resources were distributed after a dice roll
    ResourcesProduced {
        distributions: Vec<(PlayerId, Resource, u32)>,
    },

    /// Player had to discard cards
    CardsDiscarded {
        player: PlayerId,
        cards: ResourceHand,
    },

    /// The thief was moved
    ThiefMoved {
        player: PlayerId,
        from: TileId,
        to: TileId,
    },

    /// A resource was stolen
    CardStolen {
        thief: PlayerId,
        victim: PlayerId,
        resource: Resource,
    },

    /// A road was built
    RoadBuilt {
        player: PlayerId,
        path: PathId,
        free: bool,
    },

    /// A colony was built
    ColonyBuilt {
        player: PlayerId,
        intersection: IntersectionId,
    },

    /// A colony was upgraded to a town
    TownBuilt {
        player: PlayerId,
        intersection: IntersectionId,
    },

    /// A development card was purchased
    DevCardBought { player: PlayerId },

    /// A development card was revealed
    DevCardRevealed { player: PlayerId, card: DevCard },

    /// A free card was taken from the bank
    FreeCardTaken { player: PlayerId, resource: Resource },

    /// Monopoly resolved
    MonopolyPlayed {
        player: PlayerId,
        resource: Resource,
        total_taken: u32,
    },

    /// A card effect ended early because nothing legal was left to do
    EffectSkipped { player: PlayerId, effect: CardEffect },

    /// A trade with the bank
    BankExchange { player: PlayerId, exchange: Exchange },

    /// An exchange was offered to every other player
    ExchangeProposed { player: PlayerId, exchange: Exchange },

    /// An exchange between two players went through
    ExchangeAccepted {
        initiator: PlayerId,
        responder: PlayerId,
        exchange: Exchange,
    },

    /// A responder turned an exchange down
    ExchangeRejected {
        initiator: PlayerId,
        responder: PlayerId,
    },

    /// Longest road changed hands
    LongestRoadChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        length: u32,
    },

    /// Largest army changed hands
    LargestArmyChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        knights: u32,
    },

    /// Turn ended
    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },

    /// A player won the game
    GameWon {
        player: PlayerId,
        victory_points: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardLayout;
    use pretty_assertions::assert_eq;

    fn setup() -> (Board, Player) {
        let board = Board::new(&BoardLayout::standard(), DevCard::standard_deck()).unwrap();
        let mut player = Player::new(0, "Test".to_string());
        player.hand = ResourceHand::with_amounts(10, 10, 10, 10, 10);
        (board, player)
    }

    #[test]
    fn test_road_needs_network() {
        let (mut board, mut player) = setup();
        let path = board.intersection(IntersectionId(10)).paths()[0];
        assert!(!Action::BuildRoad(path).available(&board, &player, true));

        board.place_colony(IntersectionId(10), 0);
        player.register_colony(&board.intersection_production(IntersectionId(10)));
        assert!(Action::BuildRoad(path).available(&board, &player, true));
    }

    #[test]
    fn test_road_unavailable_after_apply() {
        let (mut board, mut player) = setup();
        board.place_colony(IntersectionId(10), 0);
        let path = board.intersection(IntersectionId(10)).paths()[0];
        let action = Action::BuildRoad(path);

        action.apply(&mut board, &mut player);
        assert!(!action.available(&board, &player, true));
        assert_eq!(board.path(path).road, Some(0));
        assert_eq!(player.roads, 1);
        assert_eq!(player.longest_road, 1);
        assert_eq!(player.hand, ResourceHand::with_amounts(9, 9, 10, 10, 10));
    }

    #[test]
    #[should_panic(expected = "is not available")]
    fn test_apply_unavailable_panics() {
        let (mut board, mut player) = setup();
        Action::BuildTown(IntersectionId(0)).apply(&mut board, &mut player);
    }

    #[test]
    fn test_colony_needs_road_and_distance() {
        let (mut board, mut player) = setup();
        let home = IntersectionId(10);
        board.place_colony(home, 0);
        let path = board.intersection(home).paths()[0];
        Action::BuildRoad(path).apply(&mut board, &mut player);
        let next = board.path(path).other_end(home);

        // Too close to the home colony
        assert!(!Action::BuildColony(next).available(&board, &player, true));

        let (further_path, further) = board
            .neighbours(next)
            .find(|&(_, n)| n != home)
            .unwrap();
        assert!(!Action::BuildColony(further).available(&board, &player, true));
        Action::BuildRoad(further_path).apply(&mut board, &mut player);
        assert!(Action::BuildColony(further).available(&board, &player, true));
    }

    #[test]
    fn test_town_upgrade_and_undo() {
        let (mut board, mut player) = setup();
        let at = IntersectionId(10);
        board.place_colony(at, 0);
        player.register_colony(&board.intersection_production(at));
        let before_production = *player.production();
        let before_hand = player.hand;

        let applied = Action::BuildTown(at).apply(&mut board, &mut player);
        assert_eq!(player.towns, 1);
        assert_eq!(player.colonies, 0);
        assert!(!Action::BuildTown(at).available(&board, &player, true));

        applied.undo(&mut board, &mut player);
        assert_eq!(board.intersection(at).construction, Some(Construction::colony(0)));
        assert_eq!(player.towns, 0);
        assert_eq!(player.colonies, 1);
        assert_eq!(*player.production(), before_production);
        assert_eq!(player.hand, before_hand);
    }

    #[test]
    fn test_town_limit() {
        let (mut board, mut player) = setup();
        board.place_colony(IntersectionId(10), 0);
        player.towns = MAX_TOWNS;
        assert!(!Action::BuildTown(IntersectionId(10)).available(&board, &player, true));
    }

    #[test]
    fn test_buy_and_reveal_lock() {
        let (mut board, mut player) = setup();
        let left = board.dev_cards_left();
        let applied = Action::BuyDevCard.apply(&mut board, &mut player);
        assert_eq!(board.dev_cards_left(), left - 1);
        let bought = player.dev_cards_bought_this_turn[0];
        assert!(!Action::RevealDevCard(bought).available(&board, &player, true));

        applied.undo(&mut board, &mut player);
        assert_eq!(board.dev_cards_left(), left);
        assert!(player.dev_cards_bought_this_turn.is_empty());
    }

    #[test]
    fn test_only_knight_before_roll() {
        let (board, mut player) = setup();
        player.dev_cards = vec![DevCard::Monopoly, DevCard::Knight];
        assert!(!Action::RevealDevCard(DevCard::Monopoly).available(&board, &player, false));
        assert!(Action::RevealDevCard(DevCard::Monopoly).available(&board, &player, true));
        assert!(Action::RevealDevCard(DevCard::Knight).available(&board, &player, false));
    }

    #[test]
    fn test_largest_army_strictly_greater() {
        let (mut board, mut player) = setup();
        let mut rival = Player::new(1, "Rival".to_string());
        rival.dev_cards = vec![DevCard::Knight; 4];
        player.dev_cards = vec![DevCard::Knight; 4];

        for _ in 0..3 {
            Action::RevealDevCard(DevCard::Knight).apply(&mut board, &mut rival);
        }
        assert_eq!(board.largest_army(), Some(TitleHolder { player: 1, count: 3 }));

        for _ in 0..3 {
            Action::RevealDevCard(DevCard::Knight).apply(&mut board, &mut player);
        }
        // A tie leaves the title with the holder
        assert_eq!(board.largest_army().map(|h| h.player), Some(1));

        let applied = Action::RevealDevCard(DevCard::Knight).apply(&mut board, &mut player);
        assert_eq!(board.largest_army(), Some(TitleHolder { player: 0, count: 4 }));
        assert_eq!(player.effect, Some(CardEffect::Knight));

        applied.undo(&mut board, &mut player);
        assert_eq!(board.largest_army().map(|h| h.player), Some(1));
        assert_eq!(player.knights(), 3);
        assert_eq!(player.dev_cards, vec![DevCard::Knight]);
    }

    #[test]
    fn test_longest_road_title_and_undo() {
        let (mut board, mut player) = setup();
        let start = board.tile(TileId(0)).intersections()[0];
        board.place_colony(start, 0);

        let mut at = start;
        let mut last = None;
        for _ in 0..5 {
            let (path, next) = board
                .neighbours(at)
                .find(|&(p, n)| board.path(p).road.is_none() && n != start)
                .unwrap();
            last = Some(Action::BuildRoad(path).apply(&mut board, &mut player));
            at = next;
        }
        assert_eq!(player.longest_road, 5);
        assert_eq!(board.longest_road(), Some(TitleHolder { player: 0, count: 5 }));

        last.unwrap().undo(&mut board, &mut player);
        assert_eq!(player.longest_road, 4);
        assert_eq!(board.longest_road(), None);
    }
}
