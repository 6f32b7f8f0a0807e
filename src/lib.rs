//! Scenario Engine: branching narrative decisions for management sims.
//!
//! A game is a declarative definition of phases, decisions and endings.
//! Choices move bounded meters and grant unlock tags, option prerequisites
//! gate what a player may pick, and the final state resolves to exactly one
//! ending through an ordered list of predicates.

pub mod core;
pub mod schema;
