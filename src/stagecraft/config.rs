//! Configuration for a scene.
//!
//! Provides [`SceneConfig`] and [`RoleModels`]. Users construct these
//! manually — no file parsing dependencies are required.
//!
//! # Example
//!
//! ```rust
//! use stagecraft::SceneConfig;
//!
//! // Use the defaults
//! let config = SceneConfig::default();
//!
//! // Or pin the pieces tests care about
//! let config = SceneConfig {
//!     seed: 42,
//!     max_turns: 6,
//!     narration_cadence: 3,
//!     ..SceneConfig::default()
//! };
//! ```

use std::time::Duration;

/// Model identifiers per prompt role. Passed through verbatim to
/// [`GenerationClient::generate`](crate::generation::GenerationClient::generate);
/// the engine attaches no meaning to the strings.
#[derive(Clone, Debug)]
pub struct RoleModels {
    /// Model used when a character speaks.
    pub character: String,
    /// Model used when the narrator speaks (including filler beats).
    pub narrator: String,
    /// Model reserved for orchestration-side generation (e.g. a provider
    /// that drives speaker selection with a model of its own).
    pub orchestrator: String,
}

impl Default for RoleModels {
    fn default() -> Self {
        Self {
            character: "character-default".into(),
            narrator: "narrator-default".into(),
            orchestrator: "orchestrator-default".into(),
        }
    }
}

/// Per-scene tuning. A copy is owned by the [`Scene`](crate::scene::Scene)
/// and never changes after the scene starts, which keeps replays with the
/// same seed identical.
#[derive(Clone, Debug)]
pub struct SceneConfig {
    /// Seed for the engine's random source. Same seed + same generation
    /// responses = same transcript.
    pub seed: u64,
    /// Hard cap on agent turns (character + narrator, including skipped and
    /// degraded turns). User lines do not count. Reaching the cap ends the
    /// scene.
    pub max_turns: usize,
    /// Narrator interjects once this many agent lines have passed since the
    /// last narration. Zero disables cadence-based narration.
    pub narration_cadence: usize,
    /// Additional seeded chance (0.0..=1.0) of a narrator interjection on
    /// any turn, independent of cadence.
    pub narrator_chance: f64,
    /// Yield to the user after this many agent turns since the last user
    /// line. Zero means the scene never waits for the user on its own.
    pub user_turn_interval: usize,
    /// Retry budget for transient generation failures, per turn.
    pub max_retries: usize,
    /// Base backoff between retries; doubled on each attempt.
    pub retry_backoff: Duration,
    /// Mandatory per-call timeout on generation. Timeouts count as
    /// transient failures.
    pub invoke_timeout: Duration,
    /// Model identifiers per prompt role.
    pub models: RoleModels,
    /// Display name for the user's transcript lines.
    pub user_name: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_turns: 40,
            narration_cadence: 4,
            narrator_chance: 0.15,
            user_turn_interval: 4,
            max_retries: 3,
            retry_backoff: Duration::from_millis(250),
            invoke_timeout: Duration::from_secs(30),
            models: RoleModels::default(),
            user_name: "Anonymous Player".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SceneConfig::default();
        assert!(config.max_turns > 0);
        assert!(config.narrator_chance >= 0.0 && config.narrator_chance <= 1.0);
        assert!(config.invoke_timeout > config.retry_backoff);
    }
}
