//! Character definitions and per-scene runtime state.
//!
//! A [`Character`] is the immutable sheet handed to the engine by the
//! scenario provider: identity, traits, backstory, and the secret motive
//! that must never reach another participant. [`CharacterState`] is the
//! mutable record the [`Scene`](crate::scene::Scene) keeps on the
//! character's behalf while the scene runs: the private monologue log, the
//! last action signal, and the silence counter the turn policy uses for
//! fairness.

use serde::{Deserialize, Serialize};

use crate::stagecraft::invocation::ActionSignal;

/// Immutable definition of one character in a scene.
///
/// Immutable once a scene starts: the engine never mutates the sheet, only
/// the associated [`CharacterState`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Character {
    /// Stable identifier referenced by transcript entries and turn decisions.
    pub id: String,
    /// Display name rendered in the transcript and in other speakers' views.
    pub name: String,
    /// Ordered short descriptors ("curious", "guarded"). Publicly visible.
    pub traits: Vec<String>,
    /// Backstory given to this character's own prompts only.
    pub backstory: String,
    /// The hidden goal. Never exposed outside this character's own context.
    pub secret_motive: String,
    /// Optional behavioral style hints ("speaks in short sentences").
    #[serde(default)]
    pub style: Option<String>,
}

impl Character {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            traits: Vec::new(),
            backstory: String::new(),
            secret_motive: String::new(),
            style: None,
        }
    }

    pub fn with_traits(mut self, traits: Vec<String>) -> Self {
        self.traits = traits;
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_secret_motive(mut self, motive: impl Into<String>) -> Self {
        self.secret_motive = motive.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// The publicly observable rendering of this character: name and traits
    /// only. This is the only form other speakers ever see.
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            name: self.name.clone(),
            traits: self.traits.clone(),
        }
    }
}

/// What other participants are allowed to know about a character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicProfile {
    pub name: String,
    pub traits: Vec<String>,
}

/// Mutable per-scene record owned by the scene on behalf of one character.
///
/// Created when the character joins a scene, dropped when the scene ends.
/// The private monologue is append-only and is never rendered to the
/// transcript or into another speaker's context.
#[derive(Debug)]
pub struct CharacterState {
    private_monologue: Vec<String>,
    /// Last structured hint emitted by this character, if any.
    pub last_signal: Option<ActionSignal>,
    /// Agent turns elapsed since this character last spoke.
    pub turns_since_last_spoke: usize,
    /// False once the character has left the scene; inactive characters are
    /// never selected and never receive context.
    pub active: bool,
}

impl CharacterState {
    pub fn new() -> Self {
        Self {
            private_monologue: Vec::new(),
            last_signal: None,
            turns_since_last_spoke: 0,
            active: true,
        }
    }

    /// Append one private reasoning entry. There is deliberately no removal
    /// or mutation API.
    pub fn record_thought(&mut self, thought: impl Into<String>) {
        self.private_monologue.push(thought.into());
    }

    /// Read-only view of the private monologue, oldest first.
    pub fn private_monologue(&self) -> &[String] {
        &self.private_monologue
    }

    /// The most recent `count` monologue entries, for prompt construction.
    pub fn recent_thoughts(&self, count: usize) -> &[String] {
        let start = self.private_monologue.len().saturating_sub(count);
        &self.private_monologue[start..]
    }
}

impl Default for CharacterState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_full_sheet() {
        let character = Character::new("scholar", "The Scholar")
            .with_traits(vec!["intelligent".into(), "cautious".into()])
            .with_backstory("A researcher of ancient ruins.")
            .with_secret_motive("Secretly working for a mysterious organization.")
            .with_style("Precise, clipped sentences.");

        assert_eq!(character.id, "scholar");
        assert_eq!(character.traits.len(), 2);
        assert!(character.style.is_some());
    }

    #[test]
    fn public_profile_excludes_private_fields() {
        let character = Character::new("guide", "The Guide")
            .with_traits(vec!["wise".into()])
            .with_backstory("A local expert.")
            .with_secret_motive("Protecting an ancient secret.");

        let profile = character.public_profile();
        assert_eq!(profile.name, "The Guide");
        assert_eq!(profile.traits, vec!["wise".to_string()]);
        // PublicProfile has no motive or backstory field at all; this test
        // pins the shape so one cannot be added without breaking it.
        let rendered = format!("{:?}", profile);
        assert!(!rendered.contains("ancient secret"));
        assert!(!rendered.contains("local expert"));
    }

    #[test]
    fn monologue_is_append_only_and_windowed() {
        let mut state = CharacterState::new();
        for i in 0..5 {
            state.record_thought(format!("thought {}", i));
        }
        assert_eq!(state.private_monologue().len(), 5);
        assert_eq!(state.recent_thoughts(2), &["thought 3", "thought 4"]);
        assert_eq!(state.recent_thoughts(10).len(), 5);
    }
}
