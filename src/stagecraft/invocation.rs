//! Agent invocation adapter.
//!
//! Wraps the opaque [`GenerationClient`] with the per-turn reliability
//! policy: a mandatory timeout, bounded retries with exponential backoff for
//! transient failures, parsing of the structured reply into an
//! [`AgentResult`], and the leakage screen that discards output appearing to
//! reveal another participant's hidden state. The scene never crashes or
//! hangs on a bad provider; the worst case is a
//! [`GenerationError::Unavailable`] the loop converts into a filler beat.

use std::sync::Arc;
use std::time::Duration;

use crate::stagecraft::context::SpeakerContext;
use crate::stagecraft::generation::{
    GenerationClient, GenerationError, PromptMessage, PromptRole,
};

/// A structured hint from an agent's output indicating a desired
/// scene-state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionSignal {
    /// The speaker wants to exit the scene; it is deactivated immediately.
    LeaveScene,
    /// The speaker requests that the whole scene end.
    EndScene,
    /// The speaker wants the user to respond next.
    RequestUser,
    /// The speaker asks for a narrator beat describing the scene.
    DescribeScene,
}

impl ActionSignal {
    /// Map the wire keyword from agent replies. Unknown keywords are not an
    /// error; the caller ignores them.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "leave_scene" => Some(ActionSignal::LeaveScene),
            "end_scene" => Some(ActionSignal::EndScene),
            "request_user" => Some(ActionSignal::RequestUser),
            "describe_scene" => Some(ActionSignal::DescribeScene),
            _ => None,
        }
    }
}

/// Why an invocation fell back to the generic neutral line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    /// The output revealed another participant's hidden state twice.
    Leakage,
    /// The provider kept returning empty utterances.
    EmptyReply,
}

/// Structured result of one successful agent invocation.
#[derive(Clone, Debug)]
pub struct AgentResult {
    /// The visible line, normalized for display.
    pub utterance: String,
    /// One private reasoning entry to append to the speaker's monologue.
    pub monologue: Option<String>,
    /// Optional scene-state change request.
    pub signal: Option<ActionSignal>,
    /// Set when the utterance is the neutral stand-in used after the strict
    /// retry also produced invalid output.
    pub fallback: Option<FallbackReason>,
}

impl AgentResult {
    /// The generic neutral line used when invalid output had to be
    /// discarded twice.
    fn neutral(speaker_name: &str, reason: FallbackReason) -> Self {
        Self {
            utterance: format!("*{} hesitates, choosing their words carefully.*", speaker_name),
            monologue: None,
            signal: None,
            fallback: Some(reason),
        }
    }
}

/// Invocation policy around a [`GenerationClient`].
pub struct AgentInvoker {
    client: Arc<dyn GenerationClient>,
    max_retries: usize,
    retry_backoff: Duration,
    invoke_timeout: Duration,
}

impl AgentInvoker {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        max_retries: usize,
        retry_backoff: Duration,
        invoke_timeout: Duration,
    ) -> Self {
        Self {
            client,
            max_retries,
            retry_backoff,
            invoke_timeout,
        }
    }

    /// Invoke the generation capability for one speaker.
    ///
    /// `forbidden` carries the hidden fragments of *other* participants
    /// (secret motives, monologue entries); any of them surfacing in the
    /// utterance trips the leakage screen. Structurally invalid output
    /// (leakage, empty utterances) gets one retry with stricter
    /// instructions, then the result is replaced by a neutral line (see
    /// [`AgentResult::fallback`]). Transient failures are retried up to the
    /// configured budget with doubling backoff; on exhaustion
    /// [`GenerationError::Unavailable`] is returned.
    pub async fn invoke(
        &self,
        role: PromptRole,
        ctx: &SpeakerContext,
        model: &str,
        forbidden: &[String],
    ) -> Result<AgentResult, GenerationError> {
        let mut attempts = 0usize;
        let mut transient_failures = 0usize;
        let mut strict: Option<FallbackReason> = None;
        let mut strict_retry_done = false;

        loop {
            attempts += 1;
            let mut messages = ctx.to_messages();
            match strict {
                Some(FallbackReason::Leakage) => messages.push(PromptMessage::user(
                    "Your previous reply revealed information that must stay hidden. Reply \
                     again and speak only from what is publicly visible in the scene.",
                )),
                Some(FallbackReason::EmptyReply) => messages.push(PromptMessage::user(
                    "Your previous reply was empty. Reply again with a single JSON object \
                     whose \"line\" field is not empty.",
                )),
                None => {}
            }

            let outcome = tokio::time::timeout(
                self.invoke_timeout,
                self.client.generate(role, &messages, model),
            )
            .await;

            let error = match outcome {
                Err(_) => GenerationError::Timeout,
                Ok(Err(e)) => e,
                Ok(Ok(raw)) => match parse_agent_reply(&raw) {
                    Ok(result) => {
                        if detect_leakage(&result.utterance, forbidden) {
                            log::warn!(
                                "leakage detected in output of '{}' (attempt {})",
                                ctx.speaker_name(),
                                attempts
                            );
                            if !strict_retry_done {
                                strict_retry_done = true;
                                strict = Some(FallbackReason::Leakage);
                                continue;
                            }
                            log::error!(
                                "leakage persisted after strict retry for '{}'; using neutral line",
                                ctx.speaker_name()
                            );
                            return Ok(AgentResult::neutral(
                                ctx.speaker_name(),
                                FallbackReason::Leakage,
                            ));
                        }
                        return Ok(result);
                    }
                    Err(GenerationError::EmptyUtterance) => {
                        log::warn!(
                            "empty utterance from '{}' (attempt {})",
                            ctx.speaker_name(),
                            attempts
                        );
                        if !strict_retry_done {
                            strict_retry_done = true;
                            strict = Some(FallbackReason::EmptyReply);
                            continue;
                        }
                        return Ok(AgentResult::neutral(
                            ctx.speaker_name(),
                            FallbackReason::EmptyReply,
                        ));
                    }
                    Err(e) => e,
                },
            };

            if !error.is_transient() {
                return Err(error);
            }
            transient_failures += 1;
            if transient_failures > self.max_retries {
                log::warn!(
                    "generation for '{}' unavailable after {} attempts: {}",
                    ctx.speaker_name(),
                    attempts,
                    error
                );
                return Err(GenerationError::Unavailable { attempts });
            }
            log::debug!(
                "transient generation failure for '{}' (attempt {}): {}; retrying",
                ctx.speaker_name(),
                attempts,
                error
            );
            let backoff = self.retry_backoff * 2u32.saturating_pow(transient_failures as u32 - 1);
            tokio::time::sleep(backoff).await;
        }
    }
}

/// Minimum length of a hidden fragment worth screening for. Shorter strings
/// ("gold", "key") collide with ordinary dialogue too easily.
const MIN_LEAK_FRAGMENT_LEN: usize = 8;

/// Case-insensitive substring screen over the hidden fragments of other
/// participants. Trailing sentence punctuation on a fragment is ignored so
/// that "He stole the ledger." still matches "he stole the ledger!".
pub fn detect_leakage(text: &str, forbidden: &[String]) -> bool {
    let haystack = text.to_lowercase();
    forbidden.iter().any(|f| {
        let core = f.trim().trim_end_matches(['.', '!', '?', '…']).trim_end();
        core.len() >= MIN_LEAK_FRAGMENT_LEN && haystack.contains(&core.to_lowercase())
    })
}

/// Parse the raw reply into an [`AgentResult`].
///
/// Agents are instructed to reply with a JSON object, but providers wrap
/// such fragments in prose and markdown fences often enough that parsing is
/// deliberately forgiving: fences are stripped, the first brace-balanced
/// fragment is extracted, and a reply with no JSON at all is taken as a bare
/// utterance. A fragment that is present but unparseable is a transient
/// failure so the caller retries.
pub fn parse_agent_reply(raw: &str) -> Result<AgentResult, GenerationError> {
    let cleaned = strip_fences(raw);

    if let Some(json_str) = extract_json_object(cleaned) {
        let value: serde_json::Value = serde_json::from_str(json_str)
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let line = value
            .get("line")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or("");
        if line.is_empty() {
            return Err(GenerationError::EmptyUtterance);
        }
        let monologue = value
            .get("thought")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);
        let signal = value
            .get("action")
            .and_then(|v| v.as_str())
            .and_then(ActionSignal::from_keyword);
        return Ok(AgentResult {
            utterance: normalize_utterance(line),
            monologue,
            signal,
            fallback: None,
        });
    }

    let bare = cleaned.trim();
    if bare.is_empty() {
        return Err(GenerationError::EmptyUtterance);
    }
    Ok(AgentResult {
        utterance: normalize_utterance(bare),
        monologue: None,
        signal: None,
        fallback: None,
    })
}

/// Strip leading/trailing markdown code fences.
fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Extract the first brace-balanced `{...}` fragment, if any.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Collapse newlines and make sure the line ends with punctuation, the same
/// hygiene the transcript renderer expects.
fn normalize_utterance(line: &str) -> String {
    let mut text = line
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if !text.ends_with(['.', '!', '?', '"', '*', '…']) {
        text.push('.');
    }
    text
}
