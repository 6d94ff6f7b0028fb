//! Scene event system.
//!
//! Provides a callback-based observability layer for running scenes.
//! Implement [`EventHandler`] to receive real-time notifications about turn
//! decisions, appended lines, degraded turns, and scene lifecycle — the
//! structured successor to the original play log.
//!
//! # Example
//!
//! ```rust,no_run
//! use stagecraft::event::{EventHandler, SceneEvent};
//! use async_trait::async_trait;
//!
//! struct Logger;
//!
//! #[async_trait]
//! impl EventHandler for Logger {
//!     async fn on_scene_event(&self, event: &SceneEvent) {
//!         match event {
//!             SceneEvent::LineAppended { speaker_name, text, .. } => {
//!                 println!("[{}]: {}", speaker_name, text);
//!             }
//!             SceneEvent::SceneEnded { turns_taken, .. } => {
//!                 println!("scene over after {} turns", turns_taken);
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;

/// Events emitted by the engine while a scene runs.
///
/// Every variant carries the `scene_id` so one handler can observe several
/// concurrent scenes without external bookkeeping. Private state never
/// appears in an event: utterances are public by definition, and monologue
/// deltas are reported only by length.
#[derive(Debug, Clone)]
pub enum SceneEvent {
    /// A new agent turn is beginning.
    TurnStarted {
        scene_id: String,
        /// 0-based agent-turn index.
        turn: usize,
    },

    /// The turn policy selected a speaker.
    SpeakerSelected {
        scene_id: String,
        /// Display name of the selected speaker ("Narrator" for narration
        /// beats).
        speaker_name: String,
        /// Human-readable explanation (e.g. `"turn policy"`,
        /// `"narration beat"`).
        reason: String,
    },

    /// A line was merged into the transcript.
    LineAppended {
        scene_id: String,
        /// Display name of the speaker.
        speaker_name: String,
        /// The visible line exactly as appended.
        text: String,
        /// Transcript sequence number of the new entry.
        seq: u64,
        /// Whether a private monologue entry was recorded alongside.
        has_thought: bool,
    },

    /// A turn failed non-fatally and was skipped; the scene continues.
    TurnSkipped {
        scene_id: String,
        turn: usize,
        /// The speaker the turn was attempted for, if one had been selected.
        speaker_name: Option<String>,
        /// The error message (from the `TurnError` chain).
        error: String,
    },

    /// Generation was unavailable and a narrator-voiced filler line was
    /// merged instead. The scene is now marked degraded.
    DegradedFallback {
        scene_id: String,
        turn: usize,
        /// The speaker whose turn was replaced by the filler.
        speaker_name: String,
    },

    /// The loop suspended, waiting for one user line.
    AwaitingUser { scene_id: String },

    /// A user line was accepted and appended to the transcript.
    UserLineAccepted {
        scene_id: String,
        seq: u64,
    },

    /// The scene reached its terminal state.
    SceneEnded {
        scene_id: String,
        /// Agent turns taken in total, including skipped and degraded ones.
        turns_taken: usize,
        /// Whether any turn degraded to a fallback line.
        degraded: bool,
    },
}

/// Trait for receiving scene events.
///
/// The method has a **default no-op implementation**; handlers override it
/// and match on the variants they care about. The `Send + Sync` bound allows
/// the handler to be shared across scenes via `Arc<dyn EventHandler>`; any
/// internal state needs its own synchronization (e.g. `AtomicUsize`,
/// `Mutex`).
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for every [`SceneEvent`] the engine emits, in order.
    async fn on_scene_event(&self, _event: &SceneEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter {
        lines: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for Counter {
        async fn on_scene_event(&self, event: &SceneEvent) {
            if matches!(event, SceneEvent::LineAppended { .. }) {
                self.lines.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn handlers_observe_only_what_they_match() {
        let counter = Arc::new(Counter {
            lines: AtomicUsize::new(0),
        });
        let handler: Arc<dyn EventHandler> = counter.clone();

        handler
            .on_scene_event(&SceneEvent::TurnStarted {
                scene_id: "s".into(),
                turn: 0,
            })
            .await;
        handler
            .on_scene_event(&SceneEvent::LineAppended {
                scene_id: "s".into(),
                speaker_name: "Guide".into(),
                text: "This way.".into(),
                seq: 0,
                has_thought: true,
            })
            .await;

        assert_eq!(counter.lines.load(Ordering::SeqCst), 1);
    }
}
