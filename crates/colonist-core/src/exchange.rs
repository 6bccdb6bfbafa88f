//! Resource exchanges between a player and the bank or another player.
//!
//! An [`Exchange`] is always written from the initiator's side: `lost` leaves the
//! initiator's hand and `gain` enters it. The counterpart sees the
//! [`inverse`](Exchange::inverse).
//!
//! Bank trades must be ratio-exact: each resource given away comes in bundles of
//! its bank rate (2 with a matching port, 3 with a generic port, else 4), and the
//! number of bundles equals the number of cards received.

use crate::board::{PortKind, Resource};
use crate::player::ResourceHand;
use serde::{Deserialize, Serialize};

/// Default bank rate without any port
pub const BANK_RATE: u32 = 4;

/// A trade seen from the initiator's side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exchange {
    /// Cards received
    pub gain: ResourceHand,
    /// Cards given away
    pub lost: ResourceHand,
}

impl Exchange {
    pub fn new(gain: ResourceHand, lost: ResourceHand) -> Self {
        Self { gain, lost }
    }

    /// Trade `count` of one resource for one card of another
    pub fn one_for(gain: Resource, lost: Resource, count: u32) -> Self {
        Self::new(ResourceHand::single(gain, 1), ResourceHand::single(lost, count))
    }

    /// The same trade seen from the counterpart
    pub fn inverse(&self) -> Exchange {
        Exchange {
            gain: self.lost,
            lost: self.gain,
        }
    }

    /// The hand holds everything this trade gives away
    pub fn possible(&self, hand: &ResourceHand) -> bool {
        hand.can_afford(&self.lost)
    }

    /// Apply to the initiator's hand only (bank side is unlimited)
    pub fn apply_one(&self, hand: &mut ResourceHand) {
        hand.subtract(&self.lost);
        hand.add_hand(&self.gain);
    }

    /// Reverse [`apply_one`](Exchange::apply_one)
    pub fn undo(&self, hand: &mut ResourceHand) {
        hand.subtract(&self.gain);
        hand.add_hand(&self.lost);
    }

    /// Apply between the initiator and a counterpart
    pub fn apply_between(&self, initiator: &mut ResourceHand, counterpart: &mut ResourceHand) {
        self.apply_one(initiator);
        self.inverse().apply_one(counterpart);
    }

    /// Cards received per card given
    pub fn ratio(&self) -> f64 {
        let lost = self.lost.total();
        if lost == 0 {
            return 0.0;
        }
        self.gain.total() as f64 / lost as f64
    }

    /// Exact bank trade for a player with the given ports
    pub fn is_bank_exact(&self, ports: &[PortKind]) -> bool {
        if self.lost.is_empty() || self.gain.is_empty() {
            return false;
        }
        let mut bundles = 0;
        for (resource, count) in self.lost.iter() {
            if self.gain.get(resource) > 0 {
                return false;
            }
            let rate = bank_rate(ports, resource);
            if count % rate != 0 {
                return false;
            }
            bundles += count / rate;
        }
        bundles == self.gain.total()
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "give {} for {}", self.lost, self.gain)
    }
}

/// Cards of `resource` the bank wants for one card
pub fn bank_rate(ports: &[PortKind], resource: Resource) -> u32 {
    ports
        .iter()
        .filter(|p| match p {
            PortKind::Generic => true,
            PortKind::Specific(r) => *r == resource,
        })
        .map(|p| p.rate())
        .min()
        .unwrap_or(BANK_RATE)
}

/// Every single-bundle bank trade the hand can pay for
pub fn bank_exchanges(hand: &ResourceHand, ports: &[PortKind]) -> Vec<Exchange> {
    let mut out = Vec::new();
    for lost in Resource::ALL {
        let rate = bank_rate(ports, lost);
        if hand.get(lost) < rate {
            continue;
        }
        for gain in Resource::ALL {
            if gain != lost {
                out.push(Exchange::one_for(gain, lost, rate));
            }
        }
    }
    out
}
