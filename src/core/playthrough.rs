//! Recorded choice sequences and deterministic re-runs of them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::core::session::{Completion, GameSession, RecordedChoice, SessionError, Stage};
use crate::core::validate::DefinitionError;
use crate::schema::game::GameDefinition;

#[derive(Debug, Error)]
pub enum PlaythroughError {
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("playthrough is for game '{found}', not '{expected}'")]
    GameMismatch { expected: String, found: String },
    #[error("session completed with {0} choice(s) left over")]
    LeftoverChoices(usize),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// The ordered choices of one run through a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playthrough {
    pub game_id: String,
    pub choices: Vec<RecordedChoice>,
}

impl Playthrough {
    pub fn new(game_id: &str) -> Self {
        Playthrough {
            game_id: game_id.to_string(),
            choices: Vec::new(),
        }
    }

    /// Append a choice; builder style, for scripting runs in tests and demos.
    pub fn choose(mut self, decision: &str, option: &str) -> Self {
        self.choices.push(RecordedChoice {
            decision: decision.to_string(),
            option: option.to_string(),
        });
        self
    }

    pub fn parse_ron(input: &str) -> Result<Playthrough, PlaythroughError> {
        Ok(ron::from_str(input)?)
    }

    /// Re-run the choices on a fresh session.
    ///
    /// Narration stages are continued through automatically. The returned
    /// session is parked at the next unanswered decision, or complete if
    /// the choices reached the end of the game. The same choices on the
    /// same definition always produce the same meters, unlocks and ending.
    pub fn run(&self, definition: Arc<GameDefinition>) -> Result<GameSession, PlaythroughError> {
        if definition.id != self.game_id {
            return Err(PlaythroughError::GameMismatch {
                expected: definition.id.clone(),
                found: self.game_id.clone(),
            });
        }

        let mut session = GameSession::new(definition)?;
        for (i, choice) in self.choices.iter().enumerate() {
            advance_to_decision(&mut session)?;
            if session.is_complete() {
                return Err(PlaythroughError::LeftoverChoices(self.choices.len() - i));
            }
            session.choose_option(&choice.decision, &choice.option)?;
        }
        advance_to_decision(&mut session)?;

        debug!(
            game = %self.game_id,
            choices = self.choices.len(),
            complete = session.is_complete(),
            "playthrough replayed"
        );
        Ok(session)
    }
}

/// Continue through narration until the session waits on a decision or is
/// complete.
///
/// Returns the completion when this call is the one that finished the game.
/// Sessions owned by a `ScenarioEngine` should go through
/// `ScenarioEngine::advance_to_decision` so the reward is dispatched.
pub fn advance_to_decision(session: &mut GameSession) -> Result<Option<Completion>, SessionError> {
    let mut completion = None;
    while !matches!(session.stage(), Stage::Decision { .. } | Stage::Complete(_)) {
        completion = session.advance()?;
    }
    Ok(completion)
}

impl GameSession {
    /// The choices made so far, as a re-runnable playthrough.
    pub fn playthrough(&self) -> Playthrough {
        Playthrough {
            game_id: self.definition().id.clone(),
            choices: self.record().iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::parse_ron;

    const GAME: &str = r#"Game(
        id: "week",
        initial_meters: {"energy": 50, "trust": 40},
        phases: [
            (
                title: "Monday",
                decisions: [
                    (id: "standup", title: "Standup", options: [
                        (id: "skip", label: "Skip it", delta: {"trust": -15}),
                        (id: "listen", label: "Listen", delta: {"trust": 10, "energy": -5}, grants: ["heard"]),
                    ]),
                ],
            ),
            (
                title: "Friday",
                decisions: [
                    (id: "retro", title: "Retro", options: [
                        (id: "vent", label: "Vent", delta: {"energy": 20}),
                        (id: "thank", label: "Thank the team", delta: {"trust": 30}, requires: ["heard"]),
                    ]),
                ],
            ),
        ],
        endings: [
            (id: "trusted", title: "Trusted", when: "trust >= 70"),
            (id: "steady", title: "Steady"),
        ],
    )"#;

    fn definition() -> Arc<GameDefinition> {
        Arc::new(parse_ron(GAME).unwrap())
    }

    #[test]
    fn full_playthrough_completes() {
        let session = Playthrough::new("week")
            .choose("standup", "listen")
            .choose("retro", "thank")
            .run(definition())
            .unwrap();
        assert!(session.is_complete());
        assert_eq!(session.outcome().unwrap().ending.id, "trusted");
        assert_eq!(session.meters().get("trust"), Some(80));
    }

    #[test]
    fn partial_playthrough_parks_at_next_decision() {
        let session = Playthrough::new("week")
            .choose("standup", "skip")
            .run(definition())
            .unwrap();
        assert!(!session.is_complete());
        assert_eq!(session.current_decision().unwrap().id, "retro");
    }

    #[test]
    fn exported_record_reproduces_state() {
        let def = definition();
        let mut session = GameSession::new(Arc::clone(&def)).unwrap();
        advance_to_decision(&mut session).unwrap();
        session.choose_option("standup", "listen").unwrap();
        advance_to_decision(&mut session).unwrap();
        session.choose_option("retro", "vent").unwrap();
        advance_to_decision(&mut session).unwrap();

        let rerun = session.playthrough().run(def).unwrap();
        assert_eq!(rerun, session);
    }

    #[test]
    fn advance_to_decision_returns_completion_once() {
        let mut session = GameSession::new(definition()).unwrap();
        assert_eq!(advance_to_decision(&mut session).unwrap(), None);
        session.choose_option("standup", "listen").unwrap();
        assert_eq!(advance_to_decision(&mut session).unwrap(), None);
        session.choose_option("retro", "thank").unwrap();

        let completion = advance_to_decision(&mut session).unwrap().unwrap();
        assert_eq!(completion.game_id, "week");
        assert_eq!(completion.ending_id, "trusted");
        assert_eq!(advance_to_decision(&mut session).unwrap(), None);
    }

    #[test]
    fn gated_choice_fails_the_run() {
        let err = Playthrough::new("week")
            .choose("standup", "skip")
            .choose("retro", "thank")
            .run(definition())
            .unwrap_err();
        assert!(matches!(
            err,
            PlaythroughError::Session(SessionError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn wrong_game_rejected() {
        assert!(matches!(
            Playthrough::new("other").run(definition()),
            Err(PlaythroughError::GameMismatch { .. })
        ));
    }

    #[test]
    fn leftover_choices_rejected() {
        let err = Playthrough::new("week")
            .choose("standup", "skip")
            .choose("retro", "vent")
            .choose("retro", "vent")
            .run(definition())
            .unwrap_err();
        assert!(matches!(err, PlaythroughError::LeftoverChoices(1)));
    }

    #[test]
    fn parse_from_ron() {
        let input = r#"(
            game_id: "week",
            choices: [
                (decision: "standup", option: "listen"),
            ],
        )"#;
        let playthrough = Playthrough::parse_ron(input).unwrap();
        assert_eq!(playthrough, Playthrough::new("week").choose("standup", "listen"));
    }
}
