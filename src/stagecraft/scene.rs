//! The scene aggregate.
//!
//! A [`Scene`] owns everything one improvisation session needs: the shared
//! transcript, the roster of characters with their runtime state, and the
//! config. All mutation goes through the
//! [`OrchestrationEngine`](crate::engine::OrchestrationEngine); nothing else
//! holds a mutable handle, so access is strictly serialized and no locking
//! is needed inside a scene. Independent scenes share no mutable state and
//! may run concurrently.

use std::collections::HashMap;
use uuid::Uuid;

use crate::stagecraft::character::{Character, CharacterState};
use crate::stagecraft::config::SceneConfig;
use crate::stagecraft::error::EngineError;
use crate::stagecraft::scenario::Scenario;
use crate::stagecraft::transcript::{Speaker, Transcript};

/// Lifecycle status of a scene, surfaced to the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneStatus {
    /// The loop can take turns.
    Active,
    /// The loop is suspended until exactly one user line is submitted.
    AwaitingUser,
    /// Terminal. Further turn requests fail with `SceneEnded`.
    Ended,
}

/// One bounded improvisation session.
pub struct Scene {
    /// Unique id for logs and multi-scene hosts.
    pub id: Uuid,
    config: SceneConfig,
    scenario_description: String,
    roster: Vec<Character>,
    states: HashMap<String, CharacterState>,
    transcript: Transcript,
    status: SceneStatus,
    /// Agent turns taken so far (including skipped and degraded turns).
    turns_taken: usize,
    /// Set when an agent signalled that the scene should end.
    end_requested: bool,
    /// Set when an agent asked for user input; cleared once honored.
    user_requested: bool,
    /// Set when an agent asked for a scene description beat; cleared once
    /// the narrator speaks.
    narration_requested: bool,
}

impl Scene {
    /// Create a scene from a scenario and config. Character sheets are
    /// immutable from here on; runtime state is created per character.
    pub fn new(scenario: Scenario, config: SceneConfig) -> Self {
        let states = scenario
            .characters
            .iter()
            .map(|c| (c.id.clone(), CharacterState::new()))
            .collect();
        Self {
            id: Uuid::new_v4(),
            config,
            scenario_description: scenario.description,
            roster: scenario.characters,
            states,
            transcript: Transcript::new(),
            status: SceneStatus::Active,
            turns_taken: 0,
            end_requested: false,
            user_requested: false,
            narration_requested: false,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn scenario_description(&self) -> &str {
        &self.scenario_description
    }

    pub fn status(&self) -> SceneStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: SceneStatus) {
        self.status = status;
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub(crate) fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    /// Characters in registration order, active or not.
    pub fn roster(&self) -> &[Character] {
        &self.roster
    }

    /// Ids of characters still active in the scene, registration order.
    pub fn active_character_ids(&self) -> Vec<&str> {
        self.roster
            .iter()
            .filter(|c| {
                self.states
                    .get(c.id.as_str())
                    .map(|s| s.active)
                    .unwrap_or(false)
            })
            .map(|c| c.id.as_str())
            .collect()
    }

    pub fn character(&self, id: &str) -> Option<&Character> {
        self.roster.iter().find(|c| c.id == id)
    }

    pub fn state(&self, id: &str) -> Option<&CharacterState> {
        self.states.get(id)
    }

    pub(crate) fn state_mut(&mut self, id: &str) -> Option<&mut CharacterState> {
        self.states.get_mut(id)
    }

    /// Look up a character that must be an active participant, the
    /// precondition shared by context building and turn merging.
    pub fn active_character(&self, id: &str) -> Result<&Character, EngineError> {
        let character = self
            .character(id)
            .ok_or_else(|| EngineError::UnknownSpeaker(id.to_string()))?;
        let active = self.states.get(id).map(|s| s.active).unwrap_or(false);
        if !active {
            return Err(EngineError::UnknownSpeaker(id.to_string()));
        }
        Ok(character)
    }

    pub fn turns_taken(&self) -> usize {
        self.turns_taken
    }

    pub(crate) fn count_turn(&mut self) {
        self.turns_taken += 1;
    }

    pub fn end_requested(&self) -> bool {
        self.end_requested
    }

    pub(crate) fn request_end(&mut self) {
        self.end_requested = true;
    }

    pub fn user_requested(&self) -> bool {
        self.user_requested
    }

    pub(crate) fn request_user(&mut self) {
        self.user_requested = true;
    }

    pub(crate) fn clear_user_request(&mut self) {
        self.user_requested = false;
    }

    pub fn narration_requested(&self) -> bool {
        self.narration_requested
    }

    pub(crate) fn request_narration(&mut self) {
        self.narration_requested = true;
    }

    pub(crate) fn clear_narration_request(&mut self) {
        self.narration_requested = false;
    }

    /// Agent turns since the last user line, for the user-yield interval.
    pub fn agent_turns_since_user(&self) -> usize {
        self.transcript
            .since_last_user_line()
            .iter()
            .filter(|e| e.speaker != Speaker::User)
            .count()
    }
}
