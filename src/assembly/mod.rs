//! Bundle assembly: beam search over template slots.

mod assembler;
mod partial;

pub use assembler::{Assembler, AssemblyOutcome};
pub use partial::PartialBundle;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::items::SlotClass;

/// A finished outfit: slot-to-item mapping plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub slots: BTreeMap<SlotClass, String>,
    pub template_id: String,
    pub ruleset_version: u64,
    /// The deterministic tie-break token the search ranked this bundle by.
    pub tie_break: String,
}

impl Bundle {
    /// The item occupying a slot.
    pub fn item_in(&self, slot: SlotClass) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }

    /// All item ids in slot order.
    pub fn item_ids(&self) -> impl Iterator<Item = &str> {
        self.slots.values().map(String::as_str)
    }
}

/// Request deadline derived from the latency budget.
///
/// Checked between slot steps and at candidate-batch boundaries; never
/// inside the numeric kernels.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn within(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left, zero when expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}
