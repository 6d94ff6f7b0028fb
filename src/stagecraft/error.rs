//! Error types for the orchestration engine.
//!
//! The taxonomy separates caller mistakes (`UnknownSpeaker`, `SceneEnded`,
//! `NotAwaitingUser` — propagated, never retried) from per-turn trouble the
//! scene absorbs on its own. Anything non-fatal that spoils a single turn is
//! recorded as a [`TurnError`] and the scene continues with that turn
//! skipped; the caller can read the backlog via
//! [`OrchestrationEngine::turn_errors`](crate::engine::OrchestrationEngine::turn_errors).

use std::error::Error;
use std::fmt;

use crate::stagecraft::generation::GenerationError;

/// Errors surfaced by the engine to its caller.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// The requested speaker is not an active participant of the scene.
    UnknownSpeaker(String),
    /// The scene has ended; further turn requests are invalid.
    SceneEnded,
    /// `submit_user_line` was called while the loop was not awaiting input.
    NotAwaitingUser,
    /// Generated text appeared to reveal another participant's hidden state.
    LeakageDetected { speaker: String },
    /// The scene was cancelled while a turn was in flight.
    Cancelled,
    /// A generation failure that was not absorbed by the fallback policy.
    Generation(GenerationError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownSpeaker(id) => write!(f, "unknown speaker: {}", id),
            EngineError::SceneEnded => write!(f, "scene has ended"),
            EngineError::NotAwaitingUser => {
                write!(f, "scene is not awaiting user input")
            }
            EngineError::LeakageDetected { speaker } => {
                write!(f, "hidden-state leakage detected in output of '{}'", speaker)
            }
            EngineError::Cancelled => write!(f, "scene was cancelled"),
            EngineError::Generation(e) => write!(f, "generation failed: {}", e),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineError::Generation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GenerationError> for EngineError {
    fn from(e: GenerationError) -> Self {
        EngineError::Generation(e)
    }
}

/// Record of a non-fatal per-turn failure. The turn is counted as skipped
/// and the scene continues.
#[derive(Debug, Clone)]
pub struct TurnError {
    /// The agent-turn index at which the failure occurred (0-based).
    pub turn: usize,
    /// The speaker the turn was attempted for, if one had been selected.
    pub speaker: Option<String>,
    /// What went wrong.
    pub error: EngineError,
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.speaker {
            Some(s) => write!(f, "turn {} ({}): {}", self.turn, s, self.error),
            None => write!(f, "turn {}: {}", self.turn, self.error),
        }
    }
}

impl Error for TurnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_speaker_when_known() {
        let err = TurnError {
            turn: 3,
            speaker: Some("scholar".into()),
            error: EngineError::LeakageDetected {
                speaker: "scholar".into(),
            },
        };
        let rendered = err.to_string();
        assert!(rendered.contains("turn 3"));
        assert!(rendered.contains("scholar"));
    }

    #[test]
    fn generation_error_wraps_with_source() {
        let err = EngineError::from(GenerationError::Timeout);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("timed out"));
    }
}
