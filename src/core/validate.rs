//! Load-time validation of game definitions.
//!
//! Authoring defects are caught here, before any session exists, so they
//! can never surface mid-play.

use rustc_hash::FxHashSet;
use std::fmt;
use thiserror::Error;

use crate::schema::condition::ConditionError;
use crate::schema::game::GameDefinition;
use crate::schema::meter::MeterError;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("condition error in ending '{ending}': {source}")]
    ConditionParse {
        ending: String,
        #[source]
        source: ConditionError,
    },
    #[error("{context}: {source}")]
    Meter {
        context: String,
        #[source]
        source: MeterError,
    },
    #[error("empty {0} id")]
    EmptyId(&'static str),
    #[error("game defines no meters")]
    NoMeters,
    #[error("game defines no phases")]
    NoPhases,
    #[error("game declares {declared} phases but defines {actual}")]
    PhaseCountMismatch { declared: u32, actual: usize },
    #[error("phase at position {expected} is numbered {found}")]
    PhaseIndex { expected: u32, found: u32 },
    #[error("phase {0} has no decisions")]
    EmptyPhase(u32),
    #[error("decision '{0}' has no options")]
    EmptyDecision(String),
    #[error("decision id '{0}' is used more than once")]
    DuplicateDecision(String),
    #[error("decision '{decision}' has option id '{option}' more than once")]
    DuplicateOption { decision: String, option: String },
    #[error("ending id '{0}' is used more than once")]
    DuplicateEnding(String),
    #[error("decision '{0}' has no option without prerequisites")]
    NoSelectableOption(String),
    #[error("option '{option}' of decision '{decision}' requires '{tag}', which no earlier decision grants")]
    UnreachableRequirement {
        decision: String,
        option: String,
        tag: String,
    },
    #[error("the last ending must be an unconditional fallback")]
    MissingEndingFallback,
}

/// Non-fatal authoring issues reported by [`lint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintWarning {
    /// An unconditional ending that is not last hides every ending after it.
    ShadowedEndings { ending: String },
    /// A tag granted by some option but never required or tested.
    UnusedUnlock(String),
    /// An ending tests a tag that nothing grants.
    UngrantedTag { ending: String, tag: String },
    /// Random sampling never reached this ending.
    UnreachedEnding(String),
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShadowedEndings { ending } => write!(
                f,
                "ending '{ending}' is unconditional but not last; later endings can never be chosen"
            ),
            Self::UnusedUnlock(tag) => {
                write!(f, "unlock '{tag}' is granted but never required or tested")
            }
            Self::UngrantedTag { ending, tag } => {
                write!(f, "ending '{ending}' tests '{tag}', which no option grants")
            }
            Self::UnreachedEnding(id) => write!(f, "ending '{id}' was never reached in simulation"),
        }
    }
}

/// All problems found in a definition.
#[derive(Debug, Default)]
pub struct LintReport {
    pub errors: Vec<DefinitionError>,
    pub warnings: Vec<LintWarning>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Validate a definition, returning the first error found.
pub fn validate(def: &GameDefinition) -> Result<(), DefinitionError> {
    match collect_errors(def).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Collect every error and warning for a definition.
pub fn lint(def: &GameDefinition) -> LintReport {
    LintReport {
        errors: collect_errors(def),
        warnings: collect_warnings(def),
    }
}

fn collect_errors(def: &GameDefinition) -> Vec<DefinitionError> {
    let mut errors = Vec::new();

    if def.id.is_empty() {
        errors.push(DefinitionError::EmptyId("game"));
    }
    if def.initial_meters.is_empty() {
        errors.push(DefinitionError::NoMeters);
    }
    if def.phases.is_empty() {
        errors.push(DefinitionError::NoPhases);
    }
    if def.total_phases as usize != def.phases.len() {
        errors.push(DefinitionError::PhaseCountMismatch {
            declared: def.total_phases,
            actual: def.phases.len(),
        });
    }

    let mut decision_ids = FxHashSet::default();
    let mut granted_before: FxHashSet<&str> = FxHashSet::default();

    for (position, phase) in def.phases.iter().enumerate() {
        let expected = position as u32 + 1;
        if phase.index != expected {
            errors.push(DefinitionError::PhaseIndex {
                expected,
                found: phase.index,
            });
        }
        if phase.decisions.is_empty() {
            errors.push(DefinitionError::EmptyPhase(phase.index));
        }

        for decision in &phase.decisions {
            if decision.id.is_empty() {
                errors.push(DefinitionError::EmptyId("decision"));
            }
            if !decision_ids.insert(decision.id.as_str()) {
                errors.push(DefinitionError::DuplicateDecision(decision.id.clone()));
            }
            if decision.options.is_empty() {
                errors.push(DefinitionError::EmptyDecision(decision.id.clone()));
            } else if decision.options.iter().all(|o| !o.requires.is_empty()) {
                errors.push(DefinitionError::NoSelectableOption(decision.id.clone()));
            }

            let mut option_ids = FxHashSet::default();
            for option in &decision.options {
                if option.id.is_empty() {
                    errors.push(DefinitionError::EmptyId("option"));
                }
                if !option_ids.insert(option.id.as_str()) {
                    errors.push(DefinitionError::DuplicateOption {
                        decision: decision.id.clone(),
                        option: option.id.clone(),
                    });
                }
                if let Err(source) = def.initial_meters.check_delta(&option.delta) {
                    errors.push(DefinitionError::Meter {
                        context: format!("option '{}' of decision '{}'", option.id, decision.id),
                        source,
                    });
                }
                for tag in &option.requires {
                    if !granted_before.contains(tag.as_str()) {
                        errors.push(DefinitionError::UnreachableRequirement {
                            decision: decision.id.clone(),
                            option: option.id.clone(),
                            tag: tag.clone(),
                        });
                    }
                }
            }

            // Grants only become usable from the next decision on.
            for option in &decision.options {
                granted_before.extend(option.grants.iter().map(String::as_str));
            }
        }
    }

    let mut ending_ids = FxHashSet::default();
    for ending in &def.endings {
        if ending.id.is_empty() {
            errors.push(DefinitionError::EmptyId("ending"));
        }
        if !ending_ids.insert(ending.id.as_str()) {
            errors.push(DefinitionError::DuplicateEnding(ending.id.clone()));
        }
        for channel in ending.condition.channels() {
            if !def.initial_meters.contains(channel) {
                errors.push(DefinitionError::Meter {
                    context: format!("ending '{}'", ending.id),
                    source: MeterError::UnknownChannel(channel.to_string()),
                });
            }
        }
    }

    match def.endings.last() {
        Some(last) if last.condition.is_unconditional() => {}
        _ => errors.push(DefinitionError::MissingEndingFallback),
    }

    errors
}

fn collect_warnings(def: &GameDefinition) -> Vec<LintWarning> {
    let mut warnings = Vec::new();

    if let Some((_, earlier)) = def.endings.split_last() {
        for ending in earlier {
            if ending.condition.is_unconditional() {
                warnings.push(LintWarning::ShadowedEndings {
                    ending: ending.id.clone(),
                });
            }
        }
    }

    let mut granted: Vec<&str> = Vec::new();
    let mut used: FxHashSet<&str> = FxHashSet::default();
    for decision in def.decisions() {
        for option in &decision.options {
            for tag in &option.grants {
                if !granted.contains(&tag.as_str()) {
                    granted.push(tag.as_str());
                }
            }
            used.extend(option.requires.iter().map(String::as_str));
        }
    }
    for ending in &def.endings {
        for tag in ending.condition.tags() {
            used.insert(tag);
            if !granted.contains(&tag) {
                warnings.push(LintWarning::UngrantedTag {
                    ending: ending.id.clone(),
                    tag: tag.to_string(),
                });
            }
        }
    }
    for tag in granted {
        if !used.contains(tag) {
            warnings.push(LintWarning::UnusedUnlock(tag.to_string()));
        }
    }

    warnings
}
