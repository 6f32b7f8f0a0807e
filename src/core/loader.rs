//! RON authoring format for game definitions.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::core::validate::{validate, DefinitionError};
use crate::schema::condition::Condition;
use crate::schema::game::{Choice, Decision, Ending, GameDefinition, Phase, Reward};
use crate::schema::meter::{MeterDelta, MeterVector};

// RON deserialization helpers. Authors write conditions as text and may
// omit most optional fields, so the file shape differs from the runtime types.

#[derive(Debug, Deserialize)]
#[serde(rename = "Game")]
struct RonGame {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    total_phases: Option<u32>,
    initial_meters: BTreeMap<String, i64>,
    phases: Vec<RonPhase>,
    endings: Vec<RonEnding>,
    #[serde(default)]
    reward: Reward,
}

#[derive(Debug, Deserialize)]
struct RonPhase {
    #[serde(default)]
    index: Option<u32>,
    title: String,
    #[serde(default)]
    opening: String,
    #[serde(default)]
    closing: String,
    decisions: Vec<RonDecision>,
}

#[derive(Debug, Deserialize)]
struct RonDecision {
    id: String,
    #[serde(default)]
    category: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    lead_in: String,
    options: Vec<RonChoice>,
}

#[derive(Debug, Deserialize)]
struct RonChoice {
    id: String,
    label: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    delta: BTreeMap<String, i64>,
    #[serde(default)]
    grants: Vec<String>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct RonEnding {
    id: String,
    #[serde(default)]
    trajectory: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    snapshot: String,
    #[serde(default = "default_when")]
    when: String,
}

fn default_when() -> String {
    "always".to_string()
}

/// Load and validate a game definition from a RON file.
pub fn load_from_ron(path: &Path) -> Result<GameDefinition, DefinitionError> {
    let contents = std::fs::read_to_string(path)?;
    let def = parse_ron(&contents)?;
    info!(game = %def.id, path = %path.display(), "loaded game definition");
    Ok(def)
}

/// Parse and validate a game definition from a RON string.
pub fn parse_ron(input: &str) -> Result<GameDefinition, DefinitionError> {
    let def = parse_ron_unchecked(input)?;
    validate(&def)?;
    debug!(
        game = %def.id,
        phases = def.phases.len(),
        decisions = def.decision_count(),
        endings = def.endings.len(),
        "game definition validated"
    );
    Ok(def)
}

/// Parse a game definition without validating it. Used by the linter,
/// which wants every problem rather than the first.
pub fn parse_ron_unchecked(input: &str) -> Result<GameDefinition, DefinitionError> {
    let raw: RonGame = ron::from_str(input)?;

    let initial_meters =
        MeterVector::new(raw.initial_meters).map_err(|source| DefinitionError::Meter {
            context: "initial meters".to_string(),
            source,
        })?;

    let phases: Vec<Phase> = raw
        .phases
        .into_iter()
        .enumerate()
        .map(|(position, phase)| Phase {
            index: phase.index.unwrap_or(position as u32 + 1),
            title: phase.title,
            opening: phase.opening,
            closing: phase.closing,
            decisions: phase.decisions.into_iter().map(convert_decision).collect(),
        })
        .collect();

    let mut endings = Vec::with_capacity(raw.endings.len());
    for ending in raw.endings {
        let condition =
            Condition::parse(&ending.when).map_err(|source| DefinitionError::ConditionParse {
                ending: ending.id.clone(),
                source,
            })?;
        endings.push(Ending {
            id: ending.id,
            trajectory: ending.trajectory,
            title: ending.title,
            description: ending.description,
            snapshot: ending.snapshot,
            condition,
        });
    }

    Ok(GameDefinition {
        id: raw.id,
        title: raw.title,
        total_phases: raw.total_phases.unwrap_or(phases.len() as u32),
        initial_meters,
        phases,
        endings,
        reward: raw.reward,
    })
}

fn convert_decision(decision: RonDecision) -> Decision {
    Decision {
        id: decision.id,
        category: decision.category,
        title: decision.title,
        description: decision.description,
        lead_in: Some(decision.lead_in).filter(|s| !s.is_empty()),
        options: decision
            .options
            .into_iter()
            .map(|option| Choice {
                id: option.id,
                label: option.label,
                description: option.description,
                delta: MeterDelta(option.delta),
                grants: option.grants,
                requires: option.requires,
                response: option.response,
            })
            .collect(),
    }
}
