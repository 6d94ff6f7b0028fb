//! # Stagecraft
//!
//! Stagecraft is an orchestration engine for turn-based improvisational
//! scenes: several generative "character" agents and a "narrator" share one
//! visible transcript while each character keeps a private monologue and a
//! secret motive that no other participant — including the user — ever sees.
//!
//! The crate provides carefully layered abstractions for:
//!
//! * **Scenes**: the [`Scene`](scene::Scene) aggregate owning the shared
//!   transcript, the character roster, and per-character runtime state
//! * **Turn orchestration**: [`OrchestrationEngine`] driving the
//!   decide/invoke/merge loop, one turn in flight per scene, with
//!   cancellation and graceful degradation when generation misbehaves
//! * **Information hiding**: the [`context`] module builds every prompt
//!   centrally so a speaker's view can never contain another participant's
//!   secret motive or private monologue, backed by a leakage screen on the
//!   way out
//! * **Provider flexibility**: the [`generation::GenerationClient`] trait
//!   keeps the engine independent of any concrete text-generation backend
//! * **Observability**: the [`event`] module's callback-based
//!   [`EventHandler`](event::EventHandler) streams structured scene events
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stagecraft::{OrchestrationEngine, Scenario, SceneConfig, StepOutcome};
//! # use stagecraft::generation::GenerationClient;
//!
//! # async fn run(client: Arc<dyn GenerationClient>) -> Result<(), Box<dyn std::error::Error>> {
//! stagecraft::init_logger();
//!
//! let mut engine = OrchestrationEngine::new(
//!     Scenario::fallback(42),
//!     SceneConfig { seed: 42, ..SceneConfig::default() },
//!     client,
//! );
//!
//! loop {
//!     match engine.run_until_pause().await? {
//!         StepOutcome::AwaitingUser => engine.submit_user_line("Who goes there?")?,
//!         StepOutcome::Ended => break,
//!         _ => {}
//!     }
//! }
//!
//! for entry in engine.transcript().entries() {
//!     println!("[{}]: {}", entry.speaker_name, entry.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Continue exploring the modules re-exported from the crate root for the
//! individual pieces: the turn policy, the narrator trigger, the invocation
//! adapter, and the error taxonomy.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// The helper is intentionally lightweight so that applications embedding
/// Stagecraft can opt-in to simple `RUST_LOG` driven diagnostics without
/// having to choose a specific logging backend upfront.
///
/// ```rust
/// stagecraft::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `stagecraft` module.
pub mod stagecraft;

// Re-exporting key items for easier external access.
pub use stagecraft::character;
pub use stagecraft::character::{Character, CharacterState, PublicProfile};
pub use stagecraft::config;
pub use stagecraft::config::{RoleModels, SceneConfig};
pub use stagecraft::context;
pub use stagecraft::engine;
pub use stagecraft::engine::{CancelHandle, OrchestrationEngine, StepOutcome};
pub use stagecraft::error;
pub use stagecraft::error::{EngineError, TurnError};
pub use stagecraft::event;
pub use stagecraft::generation;
pub use stagecraft::generation::{
    GenerationClient, GenerationError, MessageRole, PromptMessage, PromptRole,
};
pub use stagecraft::invocation;
pub use stagecraft::invocation::{ActionSignal, AgentInvoker, AgentResult, FallbackReason};
pub use stagecraft::narrator;
pub use stagecraft::scenario;
pub use stagecraft::scenario::{Scenario, ScenarioProvider};
pub use stagecraft::scene;
pub use stagecraft::scene::{Scene, SceneStatus};
pub use stagecraft::transcript;
pub use stagecraft::transcript::{Speaker, Transcript, TranscriptEntry};
pub use stagecraft::turn_policy;
pub use stagecraft::turn_policy::TurnDecision;
