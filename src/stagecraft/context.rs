//! Permission-filtered context construction.
//!
//! This module is the single place where the information-hiding invariant is
//! enforced: everything a speaker is allowed to see is assembled here, and
//! nothing else ever reaches a prompt. A [`SpeakerContext`] carries the full
//! visible transcript, the scenario, the speaker's own sheet and private
//! monologue (characters only), and other participants reduced to
//! [`PublicProfile`]s — never their secret motives or monologues. Callers do
//! not filter; they cannot, because the filtered-out data is simply absent
//! from the type.

use crate::stagecraft::character::{Character, PublicProfile};
use crate::stagecraft::error::EngineError;
use crate::stagecraft::generation::PromptMessage;
use crate::stagecraft::scene::Scene;
use crate::stagecraft::transcript::{Speaker, TranscriptEntry};

/// How many recent private thoughts are surfaced into a character's prompt.
const RECENT_THOUGHT_WINDOW: usize = 3;

/// The speaker-specific half of a context.
#[derive(Clone, Debug)]
pub enum ContextSpeaker {
    /// A character: full own sheet plus the recent window of the private
    /// monologue.
    Character {
        character: Character,
        monologue: Vec<String>,
    },
    /// The narrator sees only public state.
    Narrator,
}

/// Everything one speaker is permitted to see for one turn.
#[derive(Clone, Debug)]
pub struct SpeakerContext {
    pub speaker: ContextSpeaker,
    /// Scenario description, visible to everyone.
    pub scenario: String,
    /// Snapshot of the full visible transcript at build time.
    pub transcript: Vec<TranscriptEntry>,
    /// Other participants, publicly observable attributes only.
    pub others: Vec<PublicProfile>,
}

/// Build the context for a chosen speaker.
///
/// Fails with [`EngineError::UnknownSpeaker`] when the id does not belong to
/// an active participant. The user never receives a built context (their
/// input arrives from outside), so `Speaker::User` is rejected the same way.
pub fn build(scene: &Scene, speaker: &Speaker) -> Result<SpeakerContext, EngineError> {
    let transcript = scene.transcript().entries().to_vec();
    match speaker {
        Speaker::Character(id) => {
            let character = scene.active_character(id)?.clone();
            let state = scene
                .state(id)
                .ok_or_else(|| EngineError::UnknownSpeaker(id.clone()))?;
            let others = public_profiles(scene, Some(id));
            Ok(SpeakerContext {
                speaker: ContextSpeaker::Character {
                    monologue: state.recent_thoughts(RECENT_THOUGHT_WINDOW).to_vec(),
                    character,
                },
                scenario: scene.scenario_description().to_string(),
                transcript,
                others,
            })
        }
        Speaker::Narrator => Ok(SpeakerContext {
            speaker: ContextSpeaker::Narrator,
            scenario: scene.scenario_description().to_string(),
            transcript,
            others: public_profiles(scene, None),
        }),
        Speaker::User => Err(EngineError::UnknownSpeaker("user".into())),
    }
}

fn public_profiles(scene: &Scene, exclude: Option<&str>) -> Vec<PublicProfile> {
    scene
        .roster()
        .iter()
        .filter(|c| {
            exclude != Some(c.id.as_str())
                && scene.state(&c.id).map(|s| s.active).unwrap_or(false)
        })
        .map(|c| c.public_profile())
        .collect()
}

impl SpeakerContext {
    /// Display name the resulting transcript entry will carry.
    pub fn speaker_name(&self) -> &str {
        match &self.speaker {
            ContextSpeaker::Character { character, .. } => &character.name,
            ContextSpeaker::Narrator => "Narrator",
        }
    }

    /// Render the prompt message list fed to the generation client.
    ///
    /// The information-hiding property is tested against this rendering:
    /// for speaker X it must never contain another participant's secret
    /// motive or private monologue.
    pub fn to_messages(&self) -> Vec<PromptMessage> {
        let mut messages = vec![PromptMessage::system(self.system_prompt())];
        if !self.transcript.is_empty() {
            messages.push(PromptMessage::user(self.render_transcript()));
        }
        messages.push(PromptMessage::user(self.turn_instruction()));
        messages
    }

    fn system_prompt(&self) -> String {
        let mut prompt = String::new();
        match &self.speaker {
            ContextSpeaker::Character {
                character,
                monologue,
            } => {
                prompt.push_str(&format!("You are {}.\n", character.name));
                if !character.traits.is_empty() {
                    prompt.push_str(&format!("Your traits: {}\n", character.traits.join(", ")));
                }
                if !character.backstory.is_empty() {
                    prompt.push_str(&format!("Your backstory: {}\n", character.backstory));
                }
                if !character.secret_motive.is_empty() {
                    prompt.push_str(&format!(
                        "Your secret motive, which you must pursue but never state openly: {}\n",
                        character.secret_motive
                    ));
                }
                if let Some(style) = &character.style {
                    prompt.push_str(&format!("Your manner: {}\n", style));
                }
                for thought in monologue {
                    prompt.push_str(&format!("A recent private thought of yours: {}\n", thought));
                }
            }
            ContextSpeaker::Narrator => {
                prompt.push_str(
                    "You are the narrator of an improvised scene. You describe atmosphere and \
                     action; you never speak for the characters and you know nothing about their \
                     inner lives beyond what the dialogue shows.\n",
                );
            }
        }
        prompt.push('\n');
        prompt.push_str(&format!("The scene: {}\n", self.scenario));
        if !self.others.is_empty() {
            prompt.push_str("Also present:\n");
            for profile in &self.others {
                if profile.traits.is_empty() {
                    prompt.push_str(&format!("- {}\n", profile.name));
                } else {
                    prompt.push_str(&format!(
                        "- {} ({})\n",
                        profile.name,
                        profile.traits.join(", ")
                    ));
                }
            }
        }
        prompt
    }

    fn render_transcript(&self) -> String {
        let mut rendered = String::from("The scene so far:\n");
        for entry in &self.transcript {
            rendered.push_str(&format!("[{}]: {}\n", entry.speaker_name, entry.text));
        }
        rendered
    }

    fn turn_instruction(&self) -> String {
        match &self.speaker {
            ContextSpeaker::Character { .. } => "It is your turn. Reply with a single JSON object: \
                 {\"line\": \"what you say or do, in character\", \
                 \"thought\": \"one private thought, never spoken\", \
                 \"action\": null or one of \"leave_scene\", \"end_scene\", \
                 \"request_user\", \"describe_scene\"}."
                .to_string(),
            ContextSpeaker::Narrator => {
                "Provide one short piece of narration for this moment. Reply with a single JSON \
                 object: {\"line\": \"the narration\", \"thought\": null, \"action\": null}."
                    .to_string()
            }
        }
    }
}
