//! Local judge engine
//!
//! Runs candidate programs against tests, optionally inside the sio2jail
//! sandbox, and either judges a fixed batch or searches generated tests for
//! a failing one.

pub mod checker;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod judger;
pub mod pool;
pub mod runner;
pub mod sandbox;

pub use config::{EngineConfig, EngineOverrides};
pub use engine::Engine;
pub use error::RunError;
pub use judger::{TestCase, Verdict};
