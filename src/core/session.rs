//! The session state machine.
//!
//! A single interpreter drives every game: all behaviour comes from the
//! [`GameDefinition`] the session was created with. Each operation either
//! succeeds completely or fails leaving the session untouched.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::resolver::{resolve, ResolveError};
use crate::core::validate::{validate, DefinitionError};
use crate::schema::game::{Choice, Decision, Ending, GameDefinition, Phase, Reward};
use crate::schema::meter::{MeterError, MeterVector};
use crate::schema::unlock::UnlockSet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("option '{option}' of decision '{decision}' is not available yet")]
    InvalidChoice { decision: String, option: String },
    #[error("decision '{0}' has already been answered")]
    AlreadyAnswered(String),
    #[error("cannot {operation} during the {stage} stage")]
    InvalidTransition {
        operation: &'static str,
        stage: &'static str,
    },
    #[error("decision '{found}' is not the current decision '{expected}'")]
    NotCurrentDecision { expected: String, found: String },
    #[error("decision '{decision}' has no option '{option}'")]
    UnknownOption { decision: String, option: String },
    #[error("meter error: {0}")]
    Meter(#[from] MeterError),
    #[error("ending error: {0}")]
    Resolve(#[from] ResolveError),
}

/// Final state of a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub meters: MeterVector,
    pub unlocks: UnlockSet,
    pub ending: Ending,
}

/// Where a session currently is. Phases are numbered from 1, decisions
/// within a phase from 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Opening {
        phase: u32,
    },
    Decision {
        phase: u32,
        decision: usize,
    },
    Response {
        phase: u32,
        decision: usize,
        option: String,
        response: String,
    },
    Closing {
        phase: u32,
    },
    Complete(Box<Outcome>),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opening { .. } => "opening",
            Self::Decision { .. } => "decision",
            Self::Response { .. } => "response",
            Self::Closing { .. } => "closing",
            Self::Complete(_) => "complete",
        }
    }
}

/// One answered decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedChoice {
    pub decision: String,
    pub option: String,
}

/// Answered decisions in the order they were made. Each decision id
/// appears at most once and entries are never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ChoiceRecord {
    entries: Vec<RecordedChoice>,
}

impl ChoiceRecord {
    pub fn get(&self, decision: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.decision == decision)
            .map(|e| e.option.as_str())
    }

    pub fn contains(&self, decision: &str) -> bool {
        self.get(decision).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordedChoice> {
        self.entries.iter()
    }

    fn push(&mut self, decision: &str, option: &str) {
        self.entries.push(RecordedChoice {
            decision: decision.to_string(),
            option: option.to_string(),
        });
    }
}

/// Reported once when a session reaches its ending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub game_id: String,
    pub ending_id: String,
    pub reward: Reward,
}

/// An option of the current decision together with whether it may be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptionView<'a> {
    pub choice: &'a Choice,
    pub available: bool,
}

/// Everything a presentation layer needs to render a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView<'a> {
    pub game_id: &'a str,
    pub stage: &'a Stage,
    pub phase_title: Option<&'a str>,
    pub decision: Option<&'a Decision>,
    pub narration: Option<&'a str>,
    pub options: Vec<OptionView<'a>>,
    pub meters: &'a MeterVector,
    pub unlocks: Vec<&'a str>,
    pub answered: usize,
    pub total_decisions: usize,
}

/// One playthrough of a game definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    definition: Arc<GameDefinition>,
    stage: Stage,
    meters: MeterVector,
    unlocks: UnlockSet,
    record: ChoiceRecord,
}

impl GameSession {
    /// Start a session at the opening of phase 1. The definition is
    /// validated first so content defects cannot surface mid-play.
    pub fn new(definition: Arc<GameDefinition>) -> Result<GameSession, DefinitionError> {
        validate(&definition)?;
        Ok(Self::start(definition))
    }

    pub(crate) fn start(definition: Arc<GameDefinition>) -> GameSession {
        debug!(game = %definition.id, "session started");
        GameSession {
            meters: definition.initial_meters.clone(),
            definition,
            stage: Stage::Opening { phase: 1 },
            unlocks: UnlockSet::new(),
            record: ChoiceRecord::default(),
        }
    }

    /// Discard this session and start a fresh one on the same definition.
    pub fn replay(self) -> GameSession {
        debug!(game = %self.definition.id, "replaying session");
        Self::start(self.definition)
    }

    pub fn definition(&self) -> &GameDefinition {
        &self.definition
    }

    pub fn shared_definition(&self) -> Arc<GameDefinition> {
        Arc::clone(&self.definition)
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn meters(&self) -> &MeterVector {
        &self.meters
    }

    pub fn unlocks(&self) -> &UnlockSet {
        &self.unlocks
    }

    pub fn record(&self) -> &ChoiceRecord {
        &self.record
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.stage, Stage::Complete(_))
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.stage {
            Stage::Complete(outcome) => Some(outcome.as_ref()),
            _ => None,
        }
    }

    /// `(phase, decision)` position. Never decreases over a session's life.
    pub fn position(&self) -> (u32, usize) {
        match &self.stage {
            Stage::Opening { phase } => (*phase, 0),
            Stage::Decision { phase, decision } | Stage::Response { phase, decision, .. } => {
                (*phase, *decision)
            }
            Stage::Closing { phase } => (*phase, self.phase(*phase).decisions.len()),
            Stage::Complete(_) => {
                let last = self.definition.total_phases;
                (last, self.phase(last).decisions.len())
            }
        }
    }

    pub fn current_phase(&self) -> &Phase {
        self.phase(self.position().0)
    }

    /// The decision being asked or just answered.
    pub fn current_decision(&self) -> Option<&Decision> {
        match &self.stage {
            Stage::Decision { phase, decision } | Stage::Response { phase, decision, .. } => {
                self.phase(*phase).decisions.get(*decision)
            }
            _ => None,
        }
    }

    /// Narrative text belonging to the current stage.
    pub fn narration(&self) -> Option<&str> {
        match &self.stage {
            Stage::Opening { phase } => Some(self.phase(*phase).opening.as_str()),
            Stage::Decision { .. } => self.current_decision().and_then(|d| d.lead_in.as_deref()),
            Stage::Response { response, .. } => Some(response.as_str()),
            Stage::Closing { phase } => Some(self.phase(*phase).closing.as_str()),
            Stage::Complete(outcome) => Some(outcome.ending.snapshot.as_str()),
        }
    }

    /// Options of the current decision with their availability. Empty
    /// outside the decision stage.
    pub fn available_options(&self) -> Vec<OptionView<'_>> {
        match (&self.stage, self.current_decision()) {
            (Stage::Decision { .. }, Some(decision)) => decision
                .options
                .iter()
                .map(|choice| OptionView {
                    choice,
                    available: choice.is_available(&self.unlocks),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `(answered, total)` decisions.
    pub fn progress(&self) -> (usize, usize) {
        (self.record.len(), self.definition.decision_count())
    }

    pub fn view(&self) -> SessionView<'_> {
        let (answered, total_decisions) = self.progress();
        SessionView {
            game_id: &self.definition.id,
            stage: &self.stage,
            phase_title: Some(self.current_phase().title.as_str()),
            decision: self.current_decision(),
            narration: self.narration(),
            options: self.available_options(),
            meters: &self.meters,
            unlocks: self.unlocks.sorted(),
            answered,
            total_decisions,
        }
    }

    /// Opening → first decision of the phase.
    pub fn continue_from_opening(&mut self) -> Result<(), SessionError> {
        match self.stage {
            Stage::Opening { phase } => {
                self.enter(Stage::Decision { phase, decision: 0 });
                Ok(())
            }
            _ => Err(self.reject(self.wrong_stage("continue from opening"))),
        }
    }

    /// Answer the current decision.
    ///
    /// Every check runs before anything is written, so a failure leaves
    /// meters, unlocks, record and stage exactly as they were.
    pub fn choose_option(&mut self, decision_id: &str, option_id: &str) -> Result<(), SessionError> {
        if self.record.contains(decision_id) {
            return Err(self.reject(SessionError::AlreadyAnswered(decision_id.to_string())));
        }

        let (phase, index) = match self.stage {
            Stage::Decision { phase, decision } => (phase, decision),
            _ => return Err(self.reject(self.wrong_stage("choose an option"))),
        };

        let decision = &self.phase(phase).decisions[index];
        if decision.id != decision_id {
            return Err(self.reject(SessionError::NotCurrentDecision {
                expected: decision.id.clone(),
                found: decision_id.to_string(),
            }));
        }

        let Some(choice) = decision.option(option_id) else {
            return Err(self.reject(SessionError::UnknownOption {
                decision: decision_id.to_string(),
                option: option_id.to_string(),
            }));
        };

        if !choice.is_available(&self.unlocks) {
            return Err(self.reject(SessionError::InvalidChoice {
                decision: decision_id.to_string(),
                option: option_id.to_string(),
            }));
        }

        let meters = match self.meters.apply_delta(&choice.delta) {
            Ok(meters) => meters,
            Err(err) => return Err(self.reject(err.into())),
        };
        let unlocks = self.unlocks.grant(&choice.grants);
        let response = choice.response.clone();

        debug!(
            decision = decision_id,
            option = option_id,
            meters = %meters,
            "option chosen"
        );

        self.meters = meters;
        self.unlocks = unlocks;
        self.record.push(decision_id, option_id);
        self.enter(Stage::Response {
            phase,
            decision: index,
            option: option_id.to_string(),
            response,
        });
        Ok(())
    }

    /// Response → next decision, or the phase's closing once the phase's
    /// decisions are exhausted.
    pub fn continue_from_response(&mut self) -> Result<(), SessionError> {
        let (phase, decision) = match self.stage {
            Stage::Response {
                phase, decision, ..
            } => (phase, decision),
            _ => return Err(self.reject(self.wrong_stage("continue from response"))),
        };

        let next = if decision + 1 < self.phase(phase).decisions.len() {
            Stage::Decision {
                phase,
                decision: decision + 1,
            }
        } else {
            Stage::Closing { phase }
        };
        self.enter(next);
        Ok(())
    }

    /// Closing → next phase's opening, or on the final phase resolve the
    /// ending and complete. Returns the completion the one time it happens.
    pub fn continue_from_closing(&mut self) -> Result<Option<Completion>, SessionError> {
        let phase = match self.stage {
            Stage::Closing { phase } => phase,
            _ => return Err(self.reject(self.wrong_stage("continue from closing"))),
        };

        if phase < self.definition.total_phases {
            self.enter(Stage::Opening { phase: phase + 1 });
            return Ok(None);
        }

        let ending = match resolve(&self.meters, &self.unlocks, &self.definition.endings) {
            Ok(ending) => ending.clone(),
            Err(err) => return Err(self.reject(err.into())),
        };
        let completion = Completion {
            game_id: self.definition.id.clone(),
            ending_id: ending.id.clone(),
            reward: self.definition.reward,
        };

        info!(
            game = %completion.game_id,
            ending = %completion.ending_id,
            meters = %self.meters,
            "session complete"
        );

        self.stage = Stage::Complete(Box::new(Outcome {
            meters: self.meters.clone(),
            unlocks: self.unlocks.clone(),
            ending,
        }));
        Ok(Some(completion))
    }

    /// Continue from whichever narration stage the session is in.
    pub fn advance(&mut self) -> Result<Option<Completion>, SessionError> {
        match self.stage {
            Stage::Opening { .. } => self.continue_from_opening().map(|_| None),
            Stage::Response { .. } => self.continue_from_response().map(|_| None),
            Stage::Closing { .. } => self.continue_from_closing(),
            Stage::Decision { .. } | Stage::Complete(_) => Err(self.reject(self.wrong_stage("advance"))),
        }
    }

    // Phase numbers held by a session always come from a validated
    // definition, so indexing cannot go out of bounds.
    fn phase(&self, number: u32) -> &Phase {
        &self.definition.phases[number as usize - 1]
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = self.stage.name(), to = stage.name(), "stage transition");
        self.stage = stage;
    }

    fn wrong_stage(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            operation,
            stage: self.stage.name(),
        }
    }

    fn reject(&self, err: SessionError) -> SessionError {
        warn!(game = %self.definition.id, stage = self.stage.name(), error = %err, "operation rejected");
        err
    }
}
