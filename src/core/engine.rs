//! The scenario engine: a registry of validated games that hands out
//! sessions and reports completions to the reward dispatcher.

use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::loader::load_from_ron;
use crate::core::playthrough::{Playthrough, PlaythroughError};
use crate::core::session::{Completion, GameSession, SessionError};
use crate::core::validate::{validate, DefinitionError};
use crate::schema::game::GameDefinition;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("playthrough error: {0}")]
    Playthrough(#[from] PlaythroughError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown game: {0}")]
    UnknownGame(String),
    #[error("duplicate game id: {0}")]
    DuplicateGame(String),
}

/// Receives the fixed reward of every completed session. The engine never
/// touches a persistent economy itself.
pub trait RewardDispatcher {
    fn dispatch(&self, completion: &Completion);
}

impl<F> RewardDispatcher for F
where
    F: Fn(&Completion),
{
    fn dispatch(&self, completion: &Completion) {
        self(completion)
    }
}

/// The top-level engine. Built via `ScenarioEngine::builder()`.
pub struct ScenarioEngine {
    games: FxHashMap<String, Arc<GameDefinition>>,
    dispatcher: Option<Box<dyn RewardDispatcher>>,
}

/// Builder for constructing a `ScenarioEngine`.
pub struct ScenarioEngineBuilder {
    games_dirs: Vec<String>,
    game_files: Vec<String>,
    /// Directly provided games (for testing without files).
    games: Vec<GameDefinition>,
    dispatcher: Option<Box<dyn RewardDispatcher>>,
}

impl ScenarioEngine {
    pub fn builder() -> ScenarioEngineBuilder {
        ScenarioEngineBuilder {
            games_dirs: Vec::new(),
            game_files: Vec::new(),
            games: Vec::new(),
            dispatcher: None,
        }
    }

    /// Registered game ids, sorted.
    pub fn games(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.games.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn game(&self, id: &str) -> Option<&Arc<GameDefinition>> {
        self.games.get(id)
    }

    /// Start a fresh session of a registered game.
    pub fn create_session(&self, game_id: &str) -> Result<GameSession, EngineError> {
        let def = self
            .games
            .get(game_id)
            .ok_or_else(|| EngineError::UnknownGame(game_id.to_string()))?;
        // Registered definitions were validated by the builder.
        Ok(GameSession::start(Arc::clone(def)))
    }

    /// `GameSession::continue_from_closing`, dispatching the reward when the
    /// session completes.
    pub fn continue_from_closing(
        &self,
        session: &mut GameSession,
    ) -> Result<Option<Completion>, EngineError> {
        let completion = session.continue_from_closing()?;
        self.report(completion.as_ref());
        Ok(completion)
    }

    /// `GameSession::advance`, dispatching the reward when the session
    /// completes.
    pub fn advance(&self, session: &mut GameSession) -> Result<Option<Completion>, EngineError> {
        let completion = session.advance()?;
        self.report(completion.as_ref());
        Ok(completion)
    }

    /// `playthrough::advance_to_decision`, dispatching the reward when the
    /// session completes on the way.
    pub fn advance_to_decision(
        &self,
        session: &mut GameSession,
    ) -> Result<Option<Completion>, EngineError> {
        let completion = crate::core::playthrough::advance_to_decision(session)?;
        self.report(completion.as_ref());
        Ok(completion)
    }

    /// Run a recorded playthrough of a registered game. When the
    /// playthrough finishes the game its reward is dispatched.
    pub fn play(&self, playthrough: &Playthrough) -> Result<GameSession, EngineError> {
        let def = self
            .games
            .get(&playthrough.game_id)
            .ok_or_else(|| EngineError::UnknownGame(playthrough.game_id.clone()))?;
        let session = playthrough.run(Arc::clone(def))?;

        if let Some(outcome) = session.outcome() {
            let completion = Completion {
                game_id: def.id.clone(),
                ending_id: outcome.ending.id.clone(),
                reward: def.reward,
            };
            self.report(Some(&completion));
        }
        Ok(session)
    }

    fn report(&self, completion: Option<&Completion>) {
        let Some(completion) = completion else {
            return;
        };
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.dispatch(completion),
            None => info!(
                game = %completion.game_id,
                ending = %completion.ending_id,
                xp = completion.reward.xp,
                currency = completion.reward.currency,
                "completion not dispatched, no reward dispatcher configured"
            ),
        }
    }
}

impl ScenarioEngineBuilder {
    /// Load every `.ron` file in a directory.
    pub fn games_dir(mut self, path: &str) -> Self {
        self.games_dirs.push(path.to_string());
        self
    }

    pub fn game_file(mut self, path: &str) -> Self {
        self.game_files.push(path.to_string());
        self
    }

    /// Provide a game directly (for testing without files).
    pub fn with_game(mut self, game: GameDefinition) -> Self {
        self.games.push(game);
        self
    }

    pub fn reward_dispatcher(mut self, dispatcher: impl RewardDispatcher + 'static) -> Self {
        self.dispatcher = Some(Box::new(dispatcher));
        self
    }

    pub fn build(self) -> Result<ScenarioEngine, EngineError> {
        let mut games = FxHashMap::default();

        for dir in &self.games_dirs {
            load_ron_files_from_dir(dir, |path| register(&mut games, load_from_ron(path)?))?;
        }

        for file in &self.game_files {
            register(&mut games, load_from_ron(Path::new(file))?)?;
        }

        for game in self.games {
            validate(&game)?;
            register(&mut games, game)?;
        }

        info!(games = games.len(), "scenario engine ready");
        Ok(ScenarioEngine {
            games,
            dispatcher: self.dispatcher,
        })
    }
}

fn register(
    games: &mut FxHashMap<String, Arc<GameDefinition>>,
    game: GameDefinition,
) -> Result<(), EngineError> {
    if games.contains_key(&game.id) {
        return Err(EngineError::DuplicateGame(game.id));
    }
    debug!(game = %game.id, "game registered");
    games.insert(game.id.clone(), Arc::new(game));
    Ok(())
}

/// Load all .ron files from a directory, in file name order, calling
/// `loader` for each.
fn load_ron_files_from_dir<F>(dir: &str, mut loader: F) -> Result<(), EngineError>
where
    F: FnMut(&Path) -> Result<(), EngineError>,
{
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            paths.push(path);
        }
    }
    paths.sort();
    for path in &paths {
        loader(path)?;
    }
    Ok(())
}
