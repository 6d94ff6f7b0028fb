//! The orchestration loop.
//!
//! [`OrchestrationEngine`] owns a [`Scene`] and drives it as a cooperative
//! state machine: decide the next turn, invoke the chosen agent, merge the
//! result, repeat. Exactly one turn is ever in flight per scene; the engine
//! suspends only while awaiting the generation future or a user line, so no
//! locking exists anywhere in the scene path. Independent engines share no
//! mutable state and may run concurrently on separate tasks.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stagecraft::{OrchestrationEngine, Scenario, SceneConfig, StepOutcome};
//! # use stagecraft::generation::GenerationClient;
//! # async fn demo(client: Arc<dyn GenerationClient>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = OrchestrationEngine::new(
//!     Scenario::fallback(42),
//!     SceneConfig { seed: 42, ..SceneConfig::default() },
//!     client,
//! );
//!
//! loop {
//!     match engine.run_until_pause().await? {
//!         StepOutcome::AwaitingUser => {
//!             engine.submit_user_line("I step out of the shadows.")?;
//!         }
//!         StepOutcome::Ended => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;

use crate::stagecraft::config::SceneConfig;
use crate::stagecraft::context;
use crate::stagecraft::error::{EngineError, TurnError};
use crate::stagecraft::event::{EventHandler, SceneEvent};
use crate::stagecraft::generation::{GenerationClient, GenerationError, PromptRole};
use crate::stagecraft::invocation::{ActionSignal, AgentInvoker, AgentResult, FallbackReason};
use crate::stagecraft::scenario::Scenario;
use crate::stagecraft::scene::{Scene, SceneStatus};
use crate::stagecraft::transcript::Speaker;
use crate::stagecraft::turn_policy::{self, TurnDecision};

/// Narrator-voiced stand-in merged when generation stays unavailable for a
/// whole retry budget. Being a narration line, it also resets the cadence
/// counter so the scene does not immediately queue a real narration beat.
const FILLER_LINE: &str = "*The scene holds its breath for a quiet moment.*";

/// What one [`OrchestrationEngine::step`] call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// An agent line (possibly a degraded filler) was merged.
    Spoke,
    /// The loop suspended; call
    /// [`submit_user_line`](OrchestrationEngine::submit_user_line) next.
    AwaitingUser,
    /// The scene reached its terminal state.
    Ended,
    /// The turn failed non-fatally and was skipped; see
    /// [`turn_errors`](OrchestrationEngine::turn_errors).
    Skipped,
}

/// Cancels a running scene from another task. Cheap to clone; cancelling is
/// idempotent. The in-flight invocation is abandoned without merging and the
/// scene transitions to `Ended`.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Drives one scene from creation to its terminal state.
pub struct OrchestrationEngine {
    scene: Scene,
    invoker: AgentInvoker,
    rng: StdRng,
    handler: Option<Arc<dyn EventHandler>>,
    turn_errors: Vec<TurnError>,
    degraded: bool,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl OrchestrationEngine {
    /// Create an engine over a fresh scene. The RNG is seeded from
    /// `config.seed`; with a deterministic client, the same seed replays the
    /// same transcript.
    pub fn new(
        scenario: Scenario,
        config: SceneConfig,
        client: Arc<dyn GenerationClient>,
    ) -> Self {
        let invoker = AgentInvoker::new(
            client,
            config.max_retries,
            config.retry_backoff,
            config.invoke_timeout,
        );
        let rng = StdRng::seed_from_u64(config.seed);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            scene: Scene::new(scenario, config),
            invoker,
            rng,
            handler: None,
            turn_errors: Vec::new(),
            degraded: false,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    /// Register an event handler that observes this scene.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Handle for cancelling this scene from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn status(&self) -> SceneStatus {
        self.scene.status()
    }

    pub fn transcript(&self) -> &crate::stagecraft::transcript::Transcript {
        self.scene.transcript()
    }

    /// Non-fatal per-turn failures accumulated so far, oldest first.
    pub fn turn_errors(&self) -> &[TurnError] {
        &self.turn_errors
    }

    /// True once any turn has degraded to a fallback line.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Execute one decision/invocation/merge cycle.
    ///
    /// Returns `Err(SceneEnded)` after termination. While awaiting user
    /// input this is a no-op that reports `AwaitingUser` again.
    pub async fn step(&mut self) -> Result<StepOutcome, EngineError> {
        match self.scene.status() {
            SceneStatus::Ended => return Err(EngineError::SceneEnded),
            SceneStatus::AwaitingUser => return Ok(StepOutcome::AwaitingUser),
            SceneStatus::Active => {}
        }
        if *self.cancel_rx.borrow() {
            return self.finish_cancelled().await;
        }

        match turn_policy::decide(&self.scene, &mut self.rng) {
            TurnDecision::EndScene => {
                self.scene.set_status(SceneStatus::Ended);
                log::info!(
                    "scene {} ended after {} turns",
                    self.scene.id,
                    self.scene.turns_taken()
                );
                self.emit(SceneEvent::SceneEnded {
                    scene_id: self.scene.id.to_string(),
                    turns_taken: self.scene.turns_taken(),
                    degraded: self.degraded,
                })
                .await;
                Ok(StepOutcome::Ended)
            }
            TurnDecision::AwaitUser => {
                self.scene.set_status(SceneStatus::AwaitingUser);
                self.scene.clear_user_request();
                self.emit(SceneEvent::AwaitingUser {
                    scene_id: self.scene.id.to_string(),
                })
                .await;
                Ok(StepOutcome::AwaitingUser)
            }
            TurnDecision::Narrator => self.take_agent_turn(Speaker::Narrator).await,
            TurnDecision::Character(id) => {
                self.take_agent_turn(Speaker::Character(id)).await
            }
        }
    }

    /// Loop [`step`](OrchestrationEngine::step) until the scene suspends for
    /// user input or ends.
    pub async fn run_until_pause(&mut self) -> Result<StepOutcome, EngineError> {
        loop {
            match self.step().await? {
                StepOutcome::Spoke | StepOutcome::Skipped => continue,
                outcome => return Ok(outcome),
            }
        }
    }

    /// Accept exactly one user line while the scene is awaiting input, then
    /// resume the loop on the next `step`.
    pub fn submit_user_line(&mut self, text: impl Into<String>) -> Result<(), EngineError> {
        match self.scene.status() {
            SceneStatus::Ended => return Err(EngineError::SceneEnded),
            SceneStatus::Active => return Err(EngineError::NotAwaitingUser),
            SceneStatus::AwaitingUser => {}
        }
        let name = self.scene.config().user_name.clone();
        let seq = self
            .scene
            .transcript_mut()
            .append(Speaker::User, name, text.into());
        self.scene.set_status(SceneStatus::Active);
        log::debug!("scene {} accepted user line at seq {}", self.scene.id, seq);
        let event = SceneEvent::UserLineAccepted {
            scene_id: self.scene.id.to_string(),
            seq,
        };
        // submit_user_line is sync; hand the event off without awaiting.
        if let Some(handler) = self.handler.clone() {
            if let Ok(rt) = tokio::runtime::Handle::try_current() {
                rt.spawn(async move { handler.on_scene_event(&event).await });
            }
        }
        Ok(())
    }

    async fn take_agent_turn(&mut self, speaker: Speaker) -> Result<StepOutcome, EngineError> {
        let turn = self.scene.turns_taken();
        let scene_id = self.scene.id.to_string();
        self.emit(SceneEvent::TurnStarted {
            scene_id: scene_id.clone(),
            turn,
        })
        .await;

        let ctx = match context::build(&self.scene, &speaker) {
            Ok(ctx) => ctx,
            Err(error) => return self.skip_turn(turn, &speaker, error).await,
        };
        let speaker_name = ctx.speaker_name().to_string();
        self.emit(SceneEvent::SpeakerSelected {
            scene_id: scene_id.clone(),
            speaker_name: speaker_name.clone(),
            reason: match speaker {
                Speaker::Narrator => "narration beat".to_string(),
                _ => "turn policy".to_string(),
            },
        })
        .await;

        let (role, model) = match &speaker {
            Speaker::Narrator => (
                PromptRole::Narrator,
                self.scene.config().models.narrator.clone(),
            ),
            _ => (
                PromptRole::Character,
                self.scene.config().models.character.clone(),
            ),
        };
        let forbidden = self.forbidden_fragments(&speaker);

        let invoked = {
            let mut cancel_rx = self.cancel_rx.clone();
            tokio::select! {
                result = self.invoker.invoke(role, &ctx, &model, &forbidden) => Some(result),
                _ = cancel_rx.wait_for(|c| *c) => None,
            }
        };
        let Some(result) = invoked else {
            return self.finish_cancelled().await;
        };

        match result {
            Ok(agent_result) => {
                match agent_result.fallback {
                    Some(FallbackReason::Leakage) => self.turn_errors.push(TurnError {
                        turn,
                        speaker: Some(speaker_name.clone()),
                        error: EngineError::LeakageDetected {
                            speaker: speaker_name.clone(),
                        },
                    }),
                    Some(FallbackReason::EmptyReply) => self.turn_errors.push(TurnError {
                        turn,
                        speaker: Some(speaker_name.clone()),
                        error: EngineError::Generation(GenerationError::EmptyUtterance),
                    }),
                    None => {}
                }
                let seq = self.merge(&speaker, &speaker_name, &agent_result);
                self.emit(SceneEvent::LineAppended {
                    scene_id,
                    speaker_name,
                    text: agent_result.utterance.clone(),
                    seq,
                    has_thought: agent_result.monologue.is_some(),
                })
                .await;
                Ok(StepOutcome::Spoke)
            }
            Err(error @ GenerationError::Unavailable { .. }) => {
                log::warn!(
                    "scene {} turn {}: generation unavailable for '{}', merging filler",
                    self.scene.id,
                    turn,
                    speaker_name
                );
                self.degraded = true;
                self.turn_errors.push(TurnError {
                    turn,
                    speaker: Some(speaker_name.clone()),
                    error: EngineError::Generation(error),
                });
                let filler = AgentResult {
                    utterance: FILLER_LINE.to_string(),
                    monologue: None,
                    signal: None,
                    fallback: None,
                };
                let seq = self.merge(&Speaker::Narrator, "Narrator", &filler);
                self.emit(SceneEvent::DegradedFallback {
                    scene_id: scene_id.clone(),
                    turn,
                    speaker_name,
                })
                .await;
                self.emit(SceneEvent::LineAppended {
                    scene_id,
                    speaker_name: "Narrator".to_string(),
                    text: FILLER_LINE.to_string(),
                    seq,
                    has_thought: false,
                })
                .await;
                Ok(StepOutcome::Spoke)
            }
            Err(error) => {
                self.skip_turn(turn, &speaker, EngineError::Generation(error))
                    .await
            }
        }
    }

    /// Merge one agent result: append the line, record the private thought,
    /// update silence counters, apply the action signal, count the turn.
    fn merge(&mut self, speaker: &Speaker, speaker_name: &str, result: &AgentResult) -> u64 {
        let seq = self.scene.transcript_mut().append(
            speaker.clone(),
            speaker_name,
            result.utterance.clone(),
        );

        let speaker_id = speaker.character_id().map(String::from);
        let active_ids: Vec<String> = self
            .scene
            .active_character_ids()
            .iter()
            .map(|s| s.to_string())
            .collect();
        for id in &active_ids {
            if let Some(state) = self.scene.state_mut(id) {
                if Some(id.as_str()) == speaker_id.as_deref() {
                    state.turns_since_last_spoke = 0;
                } else {
                    state.turns_since_last_spoke += 1;
                }
            }
        }

        if let Some(id) = &speaker_id {
            if let Some(state) = self.scene.state_mut(id) {
                if let Some(thought) = &result.monologue {
                    state.record_thought(thought);
                }
                state.last_signal = result.signal;
            }
            match result.signal {
                Some(ActionSignal::LeaveScene) => {
                    if let Some(state) = self.scene.state_mut(id) {
                        state.active = false;
                    }
                    log::info!("scene {}: '{}' left the scene", self.scene.id, speaker_name);
                }
                Some(ActionSignal::EndScene) => self.scene.request_end(),
                Some(ActionSignal::RequestUser) => self.scene.request_user(),
                Some(ActionSignal::DescribeScene) => self.scene.request_narration(),
                None => {}
            }
        }

        if matches!(speaker, Speaker::Narrator) {
            self.scene.clear_narration_request();
        }
        self.scene.count_turn();
        seq
    }

    /// Hidden fragments of every participant other than the speaker: secret
    /// motives plus private monologue entries. Computed here so the built
    /// context itself never holds other participants' secrets.
    fn forbidden_fragments(&self, speaker: &Speaker) -> Vec<String> {
        let own_id = speaker.character_id();
        let mut fragments = Vec::new();
        for character in self.scene.roster() {
            if Some(character.id.as_str()) == own_id {
                continue;
            }
            if !character.secret_motive.is_empty() {
                fragments.push(character.secret_motive.clone());
            }
            if let Some(state) = self.scene.state(&character.id) {
                fragments.extend(state.private_monologue().iter().cloned());
            }
        }
        fragments
    }

    async fn skip_turn(
        &mut self,
        turn: usize,
        speaker: &Speaker,
        error: EngineError,
    ) -> Result<StepOutcome, EngineError> {
        let speaker_name = self
            .scene
            .character(speaker.character_id().unwrap_or_default())
            .map(|c| c.name.clone())
            .or_else(|| matches!(speaker, Speaker::Narrator).then(|| "Narrator".to_string()));
        log::warn!(
            "scene {} turn {} skipped ({}): {}",
            self.scene.id,
            turn,
            speaker_name.as_deref().unwrap_or("unselected"),
            error
        );
        self.turn_errors.push(TurnError {
            turn,
            speaker: speaker_name.clone(),
            error: error.clone(),
        });
        self.scene.count_turn();
        self.emit(SceneEvent::TurnSkipped {
            scene_id: self.scene.id.to_string(),
            turn,
            speaker_name,
            error: error.to_string(),
        })
        .await;
        Ok(StepOutcome::Skipped)
    }

    async fn finish_cancelled(&mut self) -> Result<StepOutcome, EngineError> {
        self.scene.set_status(SceneStatus::Ended);
        log::info!("scene {} cancelled", self.scene.id);
        self.emit(SceneEvent::SceneEnded {
            scene_id: self.scene.id.to_string(),
            turns_taken: self.scene.turns_taken(),
            degraded: self.degraded,
        })
        .await;
        Err(EngineError::Cancelled)
    }

    async fn emit(&self, event: SceneEvent) {
        if let Some(handler) = &self.handler {
            handler.on_scene_event(&event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies in order from a shared script, cycling when exhausted.
    struct CyclingClient {
        script: Mutex<(usize, Vec<String>)>,
    }

    impl CyclingClient {
        fn new(lines: Vec<String>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new((0, lines)),
            })
        }
    }

    #[async_trait]
    impl GenerationClient for CyclingClient {
        async fn generate(
            &self,
            _role: PromptRole,
            _messages: &[crate::stagecraft::generation::PromptMessage],
            _model: &str,
        ) -> Result<String, GenerationError> {
            let mut guard = self.script.lock().unwrap();
            let (i, lines) = &mut *guard;
            let line = lines[*i % lines.len()].clone();
            *i += 1;
            Ok(line)
        }

        fn provider_name(&self) -> &str {
            "cycling"
        }
    }

    struct FailingClient;

    #[async_trait]
    impl GenerationClient for FailingClient {
        async fn generate(
            &self,
            _role: PromptRole,
            _messages: &[crate::stagecraft::generation::PromptMessage],
            _model: &str,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::Provider("backend offline".into()))
        }

        fn provider_name(&self) -> &str {
            "failing"
        }
    }

    fn quiet_config(max_turns: usize) -> SceneConfig {
        SceneConfig {
            seed: 42,
            max_turns,
            narration_cadence: 0,
            narrator_chance: 0.0,
            user_turn_interval: 0,
            max_retries: 1,
            retry_backoff: Duration::from_millis(1),
            ..SceneConfig::default()
        }
    }

    fn line(text: &str) -> String {
        format!(
            "{{\"line\": \"{}\", \"thought\": \"hm\", \"action\": null}}",
            text
        )
    }

    #[tokio::test]
    async fn scene_runs_to_the_turn_cap() {
        let client = CyclingClient::new(vec![line("Onward.")]);
        let mut engine =
            OrchestrationEngine::new(Scenario::fallback(1), quiet_config(4), client);
        let outcome = engine.run_until_pause().await.unwrap();
        assert_eq!(outcome, StepOutcome::Ended);
        assert_eq!(engine.status(), SceneStatus::Ended);
        assert_eq!(engine.transcript().len(), 4);
        assert!(!engine.is_degraded());
    }

    #[tokio::test]
    async fn stepping_an_ended_scene_fails() {
        let client = CyclingClient::new(vec![line("Onward.")]);
        let mut engine =
            OrchestrationEngine::new(Scenario::fallback(1), quiet_config(1), client);
        engine.run_until_pause().await.unwrap();
        assert!(matches!(
            engine.step().await,
            Err(EngineError::SceneEnded)
        ));
    }

    #[tokio::test]
    async fn request_user_signal_suspends_the_loop() {
        let script =
            "{\"line\": \"Tell us, stranger.\", \"thought\": null, \"action\": \"request_user\"}";
        let client = CyclingClient::new(vec![script.to_string()]);
        let mut engine =
            OrchestrationEngine::new(Scenario::fallback(1), quiet_config(10), client);

        let outcome = engine.run_until_pause().await.unwrap();
        assert_eq!(outcome, StepOutcome::AwaitingUser);
        assert_eq!(engine.status(), SceneStatus::AwaitingUser);

        // Exactly one user line is accepted, then the loop resumes.
        engine.submit_user_line("I mean no harm.").unwrap();
        assert!(matches!(
            engine.submit_user_line("Another line"),
            Err(EngineError::NotAwaitingUser)
        ));
        let last = engine.transcript().last().unwrap();
        assert_eq!(last.speaker, Speaker::User);
        assert_eq!(last.text, "I mean no harm.");
    }

    #[tokio::test]
    async fn user_line_precedes_next_agent_line() {
        let script = "{\"line\": \"Well?\", \"thought\": null, \"action\": \"request_user\"}";
        let client = CyclingClient::new(vec![script.to_string()]);
        let mut engine =
            OrchestrationEngine::new(Scenario::fallback(1), quiet_config(3), client);

        engine.run_until_pause().await.unwrap();
        engine.submit_user_line("Here I am.").unwrap();
        engine.step().await.unwrap();

        let entries = engine.transcript().entries();
        let user_pos = entries
            .iter()
            .position(|e| e.speaker == Speaker::User)
            .unwrap();
        assert_eq!(entries[user_pos].text, "Here I am.");
        assert!(entries[user_pos + 1].speaker != Speaker::User);
        assert!(entries[user_pos + 1].seq > entries[user_pos].seq);
    }

    #[tokio::test]
    async fn end_scene_signal_terminates() {
        let script = "{\"line\": \"Our tale ends here.\", \"thought\": null, \"action\": \"end_scene\"}";
        let client = CyclingClient::new(vec![script.to_string()]);
        let mut engine =
            OrchestrationEngine::new(Scenario::fallback(1), quiet_config(10), client);
        let outcome = engine.run_until_pause().await.unwrap();
        assert_eq!(outcome, StepOutcome::Ended);
        assert_eq!(engine.transcript().len(), 1);
    }

    #[tokio::test]
    async fn leave_scene_deactivates_the_speaker() {
        let script = "{\"line\": \"Farewell.\", \"thought\": null, \"action\": \"leave_scene\"}";
        let client = CyclingClient::new(vec![script.to_string()]);
        let mut engine =
            OrchestrationEngine::new(Scenario::fallback(1), quiet_config(3), client);

        engine.step().await.unwrap();
        // One character left; the roster shrinks by one.
        assert_eq!(engine.scene().active_character_ids().len(), 2);
    }

    #[tokio::test]
    async fn always_failing_client_degrades_but_finishes() {
        let mut engine = OrchestrationEngine::new(
            Scenario::fallback(1),
            quiet_config(3),
            Arc::new(FailingClient),
        );
        let outcome = engine.run_until_pause().await.unwrap();
        assert_eq!(outcome, StepOutcome::Ended);
        assert!(engine.is_degraded());
        assert_eq!(engine.turn_errors().len(), 3);
        // Every merged line is the narrator filler.
        for entry in engine.transcript().entries() {
            assert_eq!(entry.speaker, Speaker::Narrator);
            assert_eq!(entry.text, FILLER_LINE);
        }
    }

    #[tokio::test]
    async fn replay_with_same_seed_is_identical() {
        let lines = vec![
            line("The wind shifts."),
            line("Something moves in the dark."),
            line("Stay close."),
        ];
        let texts = |engine: &OrchestrationEngine| {
            engine
                .transcript()
                .entries()
                .iter()
                .map(|e| (e.speaker_name.clone(), e.text.clone()))
                .collect::<Vec<_>>()
        };

        let mut first = OrchestrationEngine::new(
            Scenario::fallback(5),
            quiet_config(6),
            CyclingClient::new(lines.clone()),
        );
        first.run_until_pause().await.unwrap();

        let mut second = OrchestrationEngine::new(
            Scenario::fallback(5),
            quiet_config(6),
            CyclingClient::new(lines.clone()),
        );
        second.run_until_pause().await.unwrap();

        assert_eq!(texts(&first), texts(&second));
    }

    #[tokio::test]
    async fn cancellation_ends_without_merging() {
        let client = CyclingClient::new(vec![line("Onward.")]);
        let mut engine =
            OrchestrationEngine::new(Scenario::fallback(1), quiet_config(10), client);
        let handle = engine.cancel_handle();

        engine.step().await.unwrap();
        let len_before = engine.transcript().len();
        handle.cancel();

        assert!(matches!(
            engine.step().await,
            Err(EngineError::Cancelled)
        ));
        assert_eq!(engine.status(), SceneStatus::Ended);
        assert_eq!(engine.transcript().len(), len_before);
    }
}
