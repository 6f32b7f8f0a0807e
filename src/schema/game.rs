use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::meter::{MeterDelta, MeterVector};
use super::unlock::UnlockSet;

/// One selectable option of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub delta: MeterDelta,
    #[serde(default)]
    pub grants: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    /// Narrative shown after the choice is made.
    #[serde(default)]
    pub response: String,
}

impl Choice {
    /// A choice is selectable once every prerequisite tag is unlocked.
    pub fn is_available(&self, unlocks: &UnlockSet) -> bool {
        unlocks.has_all(&self.requires)
    }
}

/// A single question put to the player, with its ordered options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Optional dialogue shown before the options.
    #[serde(default)]
    pub lead_in: Option<String>,
    pub options: Vec<Choice>,
}

impl Decision {
    pub fn option(&self, id: &str) -> Option<&Choice> {
        self.options.iter().find(|o| o.id == id)
    }
}

/// An ordered run of decisions framed by opening and closing narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// 1-based position of the phase within the game.
    pub index: u32,
    pub title: String,
    pub opening: String,
    pub closing: String,
    pub decisions: Vec<Decision>,
}

/// A terminal outcome, selected by the first condition that holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ending {
    pub id: String,
    /// Broad category of the outcome, e.g. "thriving" or "burnout".
    pub trajectory: String,
    pub title: String,
    pub description: String,
    /// Closing narrative shown on the completion screen.
    pub snapshot: String,
    pub condition: Condition,
}

/// Fixed amounts reported to the reward dispatcher on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reward {
    pub xp: u32,
    pub currency: u32,
}

/// The declarative description of one game.
///
/// Definitions are immutable once loaded and validated; sessions share
/// them and keep all mutable state on their own side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDefinition {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub total_phases: u32,
    pub initial_meters: MeterVector,
    pub phases: Vec<Phase>,
    /// Ordered most specific first; the last entry must be unconditional.
    pub endings: Vec<Ending>,
    #[serde(default)]
    pub reward: Reward,
}

impl GameDefinition {
    /// Look up a phase by its 1-based index.
    pub fn phase(&self, index: u32) -> Option<&Phase> {
        let slot = usize::try_from(index).ok()?.checked_sub(1)?;
        self.phases.get(slot)
    }

    /// All decisions in play order.
    pub fn decisions(&self) -> impl Iterator<Item = &Decision> {
        self.phases.iter().flat_map(|p| p.decisions.iter())
    }

    pub fn decision_count(&self) -> usize {
        self.phases.iter().map(|p| p.decisions.len()).sum()
    }

    pub fn ending(&self, id: &str) -> Option<&Ending> {
        self.endings.iter().find(|e| e.id == id)
    }
}
