//! The shared, append-only scene transcript.
//!
//! Every visible event — user lines, character lines, narrator lines — lands
//! here in causal order with a strictly increasing sequence number. Entries
//! are immutable once appended; the type exposes no edit or removal API, so
//! transcript monotonicity holds by construction.

use chrono::{DateTime, Utc};

/// Attribution for one transcript entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Speaker {
    /// The human participant.
    User,
    /// The narrator agent.
    Narrator,
    /// A character agent, by character id.
    Character(String),
}

impl Speaker {
    pub fn character(id: impl Into<String>) -> Self {
        Speaker::Character(id.into())
    }

    /// The character id, if this speaker is a character.
    pub fn character_id(&self) -> Option<&str> {
        match self {
            Speaker::Character(id) => Some(id),
            _ => None,
        }
    }
}

/// One visible line in the scene. Immutable once appended.
#[derive(Clone, Debug)]
pub struct TranscriptEntry {
    /// Who spoke.
    pub speaker: Speaker,
    /// Display name at the time of speaking ("Narrator", user name, or the
    /// character's name), so renderers need no roster lookup.
    pub speaker_name: String,
    /// The visible text.
    pub text: String,
    /// Strictly increasing sequence number; insertion order = causal order.
    pub seq: u64,
    /// Wall-clock time of the append.
    pub timestamp: DateTime<Utc>,
}

/// Ordered, append-only log of all visible scene events.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    next_seq: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Append a new entry, assigning the next sequence number. Returns the
    /// assigned number.
    pub fn append(
        &mut self,
        speaker: Speaker,
        speaker_name: impl Into<String>,
        text: impl Into<String>,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(TranscriptEntry {
            speaker,
            speaker_name: speaker_name.into(),
            text: text.into(),
            seq,
            timestamp: Utc::now(),
        });
        seq
    }

    /// Read-only view of all entries in causal order.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    /// Entries appended after the last user line (the whole transcript when
    /// the user has not spoken yet).
    pub fn since_last_user_line(&self) -> &[TranscriptEntry] {
        let start = self
            .entries
            .iter()
            .rposition(|e| e.speaker == Speaker::User)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.entries[start..]
    }

    /// Agent entries (non-user) since the last narrator line, used by the
    /// narration cadence trigger. Counts the whole transcript when the
    /// narrator has not spoken yet.
    pub fn agent_lines_since_narration(&self) -> usize {
        let start = self
            .entries
            .iter()
            .rposition(|e| e.speaker == Speaker::Narrator)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.entries[start..]
            .iter()
            .filter(|e| e.speaker != Speaker::User)
            .count()
    }
}
