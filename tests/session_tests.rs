//! Session integration tests: full runs against the RON fixtures.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use scenario_engine::core::engine::{EngineError, ScenarioEngine};
use scenario_engine::core::loader::load_from_ron;
use scenario_engine::core::playthrough::{advance_to_decision, Playthrough};
use scenario_engine::core::session::{Completion, GameSession, SessionError, Stage};
use scenario_engine::schema::unlock::UnlockSet;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

fn fixture_session(name: &str) -> GameSession {
    let path = format!("tests/fixtures/{name}.ron");
    let def = load_from_ron(Path::new(&path)).unwrap();
    GameSession::new(Arc::new(def)).unwrap()
}

fn finish(session: &mut GameSession) {
    while !session.is_complete() {
        session.advance().unwrap();
    }
}

#[test]
fn single_choice_b_raises_energy_and_grants_calm() {
    let mut session = fixture_session("single_choice");
    advance_to_decision(&mut session).unwrap();
    session.choose_option("morning", "b").unwrap();

    assert_eq!(session.meters().get("energy"), Some(60));
    assert_eq!(session.unlocks(), &UnlockSet::new().grant(["calm"]));

    finish(&mut session);
    assert_eq!(session.outcome().unwrap().ending.id, "balanced");
}

#[test]
fn single_choice_a_lowers_energy_without_unlocks() {
    let mut session = fixture_session("single_choice");
    advance_to_decision(&mut session).unwrap();
    session.choose_option("morning", "a").unwrap();

    assert_eq!(session.meters().get("energy"), Some(40));
    assert!(session.unlocks().is_empty());
}

#[test]
fn stage_sequence_for_one_phase() {
    let mut session = fixture_session("single_choice");
    assert_eq!(session.stage(), &Stage::Opening { phase: 1 });
    assert_eq!(session.narration(), Some("A quiet morning."));

    session.continue_from_opening().unwrap();
    assert_eq!(
        session.stage(),
        &Stage::Decision {
            phase: 1,
            decision: 0
        }
    );

    session.choose_option("morning", "b").unwrap();
    assert_eq!(session.narration(), Some("You feel centred."));

    session.continue_from_response().unwrap();
    assert_eq!(session.stage(), &Stage::Closing { phase: 1 });

    let completion = session.continue_from_closing().unwrap().unwrap();
    assert_eq!(completion.ending_id, "balanced");
    assert!(session.is_complete());
}

#[test]
fn gated_option_rejected_without_side_effects() {
    let mut session = fixture_session("burnout");
    advance_to_decision(&mut session).unwrap();
    session.choose_option("inbox", "triage").unwrap();
    advance_to_decision(&mut session).unwrap();
    session.choose_option("lunch", "decline").unwrap();
    advance_to_decision(&mut session).unwrap();

    let before = session.clone();
    let options = session.available_options();
    let gated = options.iter().find(|o| o.choice.id == "ask_mentor").unwrap();
    assert!(!gated.available);

    let err = session.choose_option("crunch", "ask_mentor").unwrap_err();
    assert_eq!(
        err,
        SessionError::InvalidChoice {
            decision: "crunch".to_string(),
            option: "ask_mentor".to_string(),
        }
    );
    assert_eq!(session, before);
    assert_eq!(session.position(), before.position());
}

#[test]
fn mentor_unlock_opens_gated_option() {
    let mut session = fixture_session("burnout");
    advance_to_decision(&mut session).unwrap();
    session.choose_option("inbox", "grind").unwrap();
    advance_to_decision(&mut session).unwrap();
    session.choose_option("lunch", "accept").unwrap();
    advance_to_decision(&mut session).unwrap();

    assert!(session.unlocks().has("mentor"));
    session.choose_option("crunch", "ask_mentor").unwrap();
    finish(&mut session);

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.ending.id, "mentored");
    assert_eq!(outcome.meters.get("focus"), Some(70));
}

#[test]
fn answering_twice_is_rejected() {
    let mut session = fixture_session("burnout");
    advance_to_decision(&mut session).unwrap();
    session.choose_option("inbox", "grind").unwrap();
    let before = session.clone();

    assert_eq!(
        session.choose_option("inbox", "triage"),
        Err(SessionError::AlreadyAnswered("inbox".to_string()))
    );
    assert_eq!(session, before);
}

#[test]
fn continue_in_wrong_stage_is_rejected() {
    let mut session = fixture_session("burnout");
    let before = session.clone();
    assert!(matches!(
        session.continue_from_response(),
        Err(SessionError::InvalidTransition { .. })
    ));
    assert!(matches!(
        session.continue_from_closing(),
        Err(SessionError::InvalidTransition { .. })
    ));
    assert_eq!(session, before);
}

#[test]
fn replay_restores_initial_state() {
    let mut session = fixture_session("burnout");
    let initial = session.meters().clone();
    advance_to_decision(&mut session).unwrap();
    session.choose_option("inbox", "triage").unwrap();
    advance_to_decision(&mut session).unwrap();
    session.choose_option("lunch", "accept").unwrap();
    advance_to_decision(&mut session).unwrap();
    session.choose_option("crunch", "rest").unwrap();
    finish(&mut session);

    let fresh = session.replay();
    assert_eq!(fresh.meters(), &initial);
    assert!(fresh.unlocks().is_empty());
    assert!(fresh.record().is_empty());
    assert_eq!(fresh.stage(), &Stage::Opening { phase: 1 });
}

#[test]
fn random_runs_keep_invariants() {
    let def = Arc::new(load_from_ron(Path::new("tests/fixtures/burnout.ron")).unwrap());
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..200 {
        let mut session = GameSession::new(Arc::clone(&def)).unwrap();
        let mut last_position = session.position();
        loop {
            advance_to_decision(&mut session).unwrap();
            if session.is_complete() {
                break;
            }
            let decision_id = session.current_decision().unwrap().id.clone();
            let options: Vec<(String, bool)> = session
                .available_options()
                .iter()
                .map(|o| (o.choice.id.clone(), o.available))
                .collect();
            let (pick, available) = options.choose(&mut rng).unwrap();

            let before = session.clone();
            match session.choose_option(&decision_id, pick) {
                Ok(()) => assert!(*available),
                Err(err) => {
                    assert!(!*available);
                    assert!(matches!(err, SessionError::InvalidChoice { .. }));
                    assert_eq!(session, before);
                }
            }

            assert!(session.position() >= last_position);
            last_position = session.position();
            for (_, value) in session.meters().iter() {
                assert!((0..=100).contains(&value));
            }
        }

        let record: Vec<&str> = session.record().iter().map(|c| c.decision.as_str()).collect();
        let mut unique = record.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), record.len());
        assert_eq!(record.len(), def.decision_count());
    }
}

#[test]
fn recorded_playthrough_fixture_reaches_mentored() {
    let contents =
        std::fs::read_to_string("tests/fixtures/playthroughs/burnout_mentored.ron").unwrap();
    let playthrough = Playthrough::parse_ron(&contents).unwrap();
    let def = Arc::new(load_from_ron(Path::new("tests/fixtures/burnout.ron")).unwrap());

    let first = playthrough.run(Arc::clone(&def)).unwrap();
    let second = playthrough.run(def).unwrap();
    assert_eq!(first.outcome().unwrap().ending.id, "mentored");
    assert_eq!(first, second);
    assert_eq!(first.playthrough(), playthrough);
}

#[test]
fn engine_dispatches_burnout_reward() {
    let seen: Rc<RefCell<Vec<Completion>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let engine = ScenarioEngine::builder()
        .game_file("tests/fixtures/burnout.ron")
        .game_file("tests/fixtures/single_choice.ron")
        .reward_dispatcher(move |c: &Completion| sink.borrow_mut().push(c.clone()))
        .build()
        .unwrap();
    assert_eq!(engine.games(), vec!["burnout", "single_choice"]);

    let mut session = engine.create_session("burnout").unwrap();
    for (decision, option) in [("inbox", "grind"), ("lunch", "decline"), ("crunch", "work_weekend")] {
        advance_to_decision(&mut session).unwrap();
        session.choose_option(decision, option).unwrap();
    }
    while !session.is_complete() {
        engine.advance(&mut session).unwrap();
    }

    // 50 - 10 - 5 - 30 = 5 energy.
    assert_eq!(session.outcome().unwrap().ending.id, "burnout");
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].reward.xp, 150);
    assert_eq!(seen[0].reward.currency, 40);
}

#[test]
fn engine_rejects_unknown_game() {
    let engine = ScenarioEngine::builder()
        .game_file("tests/fixtures/single_choice.ron")
        .build()
        .unwrap();
    assert!(matches!(
        engine.create_session("burnout"),
        Err(EngineError::UnknownGame(_))
    ));
}
