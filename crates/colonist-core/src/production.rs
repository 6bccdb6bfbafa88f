//! Probability-weighted production estimates.
//!
//! Two dice give 36 equally likely outcomes; a tile numbered `n` produces on
//! `ways(n) / 36` of turns. A [`Production`] sums those probabilities per
//! resource, so it reads as "expected cards of each kind per turn".

use crate::board::Resource;
use serde::{Deserialize, Serialize};

/// Number of dice outcomes giving each total, indexed by total
const WAYS: [u32; 13] = [0, 0, 1, 2, 3, 4, 5, 6, 5, 4, 3, 2, 1];

/// Probability that two dice sum to `total`
pub fn roll_probability(total: u8) -> f64 {
    WAYS.get(total as usize).copied().unwrap_or(0) as f64 / 36.0
}

/// Expected cards per turn, per resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Production([f64; 5]);

impl Production {
    pub fn get(&self, resource: Resource) -> f64 {
        self.0[resource.index()]
    }

    pub fn add(&mut self, resource: Resource, amount: f64) {
        self.0[resource.index()] += amount;
    }

    /// Add another estimate, scaled
    pub fn add_scaled(&mut self, other: &Production, factor: f64) {
        for resource in Resource::ALL {
            self.0[resource.index()] += other.get(resource) * factor;
        }
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, f64)> + '_ {
        Resource::ALL.iter().map(move |&r| (r, self.get(r)))
    }
}
