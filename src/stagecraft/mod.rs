// src/stagecraft/mod.rs

pub mod character;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod generation;
pub mod invocation;
pub mod narrator;
pub mod scenario;
pub mod scene;
pub mod transcript;
pub mod turn_policy;

// Explicitly export the engine so callers reach it as stagecraft::OrchestrationEngine
// instead of stagecraft::engine::OrchestrationEngine.
pub use engine::{CancelHandle, OrchestrationEngine, StepOutcome};
pub use scene::{Scene, SceneStatus};
