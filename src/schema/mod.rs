pub mod condition;
pub mod game;
pub mod meter;
pub mod unlock;
