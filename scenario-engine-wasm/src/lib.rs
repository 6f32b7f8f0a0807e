//! WASM bindings for scenario-engine. Powers the browser demo.

use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

use scenario_engine::core::engine::ScenarioEngine;
use scenario_engine::core::loader::parse_ron;
use scenario_engine::core::session::{Completion, GameSession, SessionView};

// ---------------------------------------------------------------------------
// Bundled games, compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const QUARTERLY_REVIEW: &str = include_str!("../../game_data/quarterly_review.ron");
    pub const LAUNCH_WEEK: &str = include_str!("../../game_data/launch_week.ron");
}

// ---------------------------------------------------------------------------
// JSON shapes sent across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct DemoState<'a> {
    #[serde(flatten)]
    view: SessionView<'a>,
    complete: bool,
    reward: Option<&'a Completion>,
}

#[wasm_bindgen]
pub struct ScenarioDemo {
    engine: ScenarioEngine,
    session: GameSession,
    completion: Rc<RefCell<Option<Completion>>>,
}

#[wasm_bindgen]
impl ScenarioDemo {
    /// Start one of the bundled games by id.
    #[wasm_bindgen(constructor)]
    pub fn new(game: &str) -> Result<ScenarioDemo, JsError> {
        let source = match game {
            "quarterly_review" => data::QUARTERLY_REVIEW,
            "launch_week" => data::LAUNCH_WEEK,
            _ => return Err(JsError::new(&format!("Unknown game: {game}"))),
        };
        Self::from_ron(source)
    }

    /// Start a game from RON source text.
    pub fn from_ron(source: &str) -> Result<ScenarioDemo, JsError> {
        let def = parse_ron(source)
            .map_err(|e| JsError::new(&format!("Game definition error: {e}")))?;
        let game_id = def.id.clone();

        let completion = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&completion);
        let engine = ScenarioEngine::builder()
            .with_game(def)
            .reward_dispatcher(move |c: &Completion| *sink.borrow_mut() = Some(c.clone()))
            .build()
            .map_err(|e| JsError::new(&format!("Engine build error: {e}")))?;
        let session = engine
            .create_session(&game_id)
            .map_err(|e| JsError::new(&format!("Session error: {e}")))?;

        Ok(ScenarioDemo {
            engine,
            session,
            completion,
        })
    }

    /// Ids of the bundled games as a JSON array.
    pub fn available_games() -> String {
        serde_json::to_string(&["quarterly_review", "launch_week"])
            .unwrap_or_else(|_| "[]".to_string())
    }

    /// JSON snapshot of everything the page renders: stage, narration,
    /// options with availability, meters, unlocks and progress.
    pub fn state(&self) -> Result<String, JsError> {
        let completion = self.completion.borrow();
        let state = DemoState {
            view: self.session.view(),
            complete: self.session.is_complete(),
            reward: completion.as_ref(),
        };
        serde_json::to_string(&state)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Continue past the current narration. Returns the new state.
    pub fn continue_story(&mut self) -> Result<String, JsError> {
        self.engine
            .advance(&mut self.session)
            .map_err(|e| JsError::new(&e.to_string()))?;
        self.state()
    }

    /// Skip narration until the next decision or the ending.
    pub fn skip_to_decision(&mut self) -> Result<String, JsError> {
        self.engine
            .advance_to_decision(&mut self.session)
            .map_err(|e| JsError::new(&e.to_string()))?;
        self.state()
    }

    /// Choose an option of the current decision. Returns the new state.
    pub fn choose(&mut self, decision: &str, option: &str) -> Result<String, JsError> {
        self.session
            .choose_option(decision, option)
            .map_err(|e| JsError::new(&e.to_string()))?;
        self.state()
    }

    /// Throw the current run away and start over.
    pub fn replay(&mut self) -> Result<String, JsError> {
        let fresh = self.session.clone().replay();
        self.session = fresh;
        *self.completion.borrow_mut() = None;
        self.state()
    }

    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    /// The choices made so far as RON, re-runnable with `playthrough_sim --replay`.
    pub fn export_playthrough(&self) -> Result<String, JsError> {
        ron::ser::to_string_pretty(&self.session.playthrough(), ron::ser::PrettyConfig::default())
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }
}
