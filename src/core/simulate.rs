//! Seeded random playthroughs, used to check which endings content can reach.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::playthrough::{advance_to_decision, PlaythroughError};
use crate::core::session::{GameSession, Stage};
use crate::core::validate::LintWarning;
use crate::schema::game::GameDefinition;

/// Aggregated results of a batch of random playthroughs.
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub runs: usize,
    /// Ending id → number of runs that finished there, for every declared ending.
    pub ending_counts: BTreeMap<String, usize>,
    /// Lowest final value seen per meter.
    pub meter_min: BTreeMap<String, i64>,
    /// Highest final value seen per meter.
    pub meter_max: BTreeMap<String, i64>,
}

impl SimulationReport {
    /// Endings that no run reached, sorted by id.
    pub fn unreached_endings(&self) -> Vec<&str> {
        self.ending_counts
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn warnings(&self) -> Vec<LintWarning> {
        self.unreached_endings()
            .into_iter()
            .map(|id| LintWarning::UnreachedEnding(id.to_string()))
            .collect()
    }
}

/// Plays a definition many times, picking uniformly among the available
/// options at each decision.
pub struct Simulator {
    definition: Arc<GameDefinition>,
    seed: u64,
    runs: usize,
}

impl Simulator {
    pub fn new(definition: Arc<GameDefinition>) -> Self {
        Simulator {
            definition,
            seed: 0,
            runs: 1000,
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn run(&self) -> Result<SimulationReport, PlaythroughError> {
        let mut report = SimulationReport {
            runs: self.runs,
            ending_counts: self
                .definition
                .endings
                .iter()
                .map(|e| (e.id.clone(), 0))
                .collect(),
            ..SimulationReport::default()
        };

        let mut session = GameSession::new(Arc::clone(&self.definition))?;
        for run in 0..self.runs {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(run as u64));
            play_randomly(&mut session, &mut rng)?;

            if let Some(outcome) = session.outcome() {
                *report
                    .ending_counts
                    .entry(outcome.ending.id.clone())
                    .or_insert(0) += 1;
                for (channel, value) in outcome.meters.iter() {
                    let min = report.meter_min.entry(channel.to_string()).or_insert(value);
                    *min = (*min).min(value);
                    let max = report.meter_max.entry(channel.to_string()).or_insert(value);
                    *max = (*max).max(value);
                }
            }
            session = session.replay();
        }

        debug!(
            game = %self.definition.id,
            runs = self.runs,
            unreached = report.unreached_endings().len(),
            "simulation finished"
        );
        Ok(report)
    }
}

/// Drive a session to completion with random available choices.
pub fn play_randomly(session: &mut GameSession, rng: &mut StdRng) -> Result<(), PlaythroughError> {
    loop {
        advance_to_decision(session)?;
        if !matches!(session.stage(), Stage::Decision { .. }) {
            return Ok(());
        }

        let pick = {
            let decision_id = match session.current_decision() {
                Some(decision) => decision.id.clone(),
                None => return Ok(()),
            };
            let available: Vec<String> = session
                .available_options()
                .into_iter()
                .filter(|o| o.available)
                .map(|o| o.choice.id.clone())
                .collect();
            available
                .choose(rng)
                .cloned()
                .map(|option_id| (decision_id, option_id))
        };

        match pick {
            Some((decision_id, option_id)) => session.choose_option(&decision_id, &option_id)?,
            // Validation guarantees an unconditional option per decision.
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::parse_ron;

    const GAME: &str = r#"Game(
        id: "coin",
        initial_meters: {"luck": 50},
        phases: [
            (title: "Toss", decisions: [
                (id: "first", title: "First toss", options: [
                    (id: "heads", label: "Heads", delta: {"luck": 25}),
                    (id: "tails", label: "Tails", delta: {"luck": -25}),
                ]),
                (id: "second", title: "Second toss", options: [
                    (id: "heads", label: "Heads", delta: {"luck": 25}),
                    (id: "tails", label: "Tails", delta: {"luck": -25}),
                ]),
            ]),
        ],
        endings: [
            (id: "blessed", title: "Blessed", when: "luck >= 100"),
            (id: "cursed", title: "Cursed", when: "luck <= 0"),
            (id: "impossible", title: "Impossible", when: "luck > 100"),
            (id: "even", title: "Even"),
        ],
    )"#;

    fn simulator() -> Simulator {
        Simulator::new(Arc::new(parse_ron(GAME).unwrap()))
    }

    #[test]
    fn every_run_reaches_an_ending() {
        let report = simulator().seed(3).runs(200).run().unwrap();
        assert_eq!(report.runs, 200);
        assert_eq!(report.ending_counts.values().sum::<usize>(), 200);
    }

    #[test]
    fn reports_unreached_endings() {
        let report = simulator().seed(3).runs(200).run().unwrap();
        assert_eq!(report.unreached_endings(), vec!["impossible"]);
        assert_eq!(
            report.warnings(),
            vec![LintWarning::UnreachedEnding("impossible".to_string())]
        );
    }

    #[test]
    fn tracks_meter_ranges() {
        let report = simulator().seed(11).runs(200).run().unwrap();
        assert_eq!(report.meter_min.get("luck"), Some(&0));
        assert_eq!(report.meter_max.get("luck"), Some(&100));
    }

    #[test]
    fn same_seed_same_report() {
        let a = simulator().seed(42).runs(50).run().unwrap();
        let b = simulator().seed(42).runs(50).run().unwrap();
        assert_eq!(a.ending_counts, b.ending_counts);
    }
}
