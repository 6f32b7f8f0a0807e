pub mod engine;
pub mod loader;
pub mod playthrough;
pub mod resolver;
pub mod session;
pub mod simulate;
pub mod validate;
