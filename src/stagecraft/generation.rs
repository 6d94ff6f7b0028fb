//! A [`GenerationClient`] is a wrapper around an external text-generation
//! provider. It provides a common interface for the engine to request
//! utterances without knowing anything about transport, authentication, or
//! prompt wire formats. It does not keep track of the scene, for that we use
//! the [`Scene`](crate::scene::Scene) aggregate and the
//! [`OrchestrationEngine`](crate::engine::OrchestrationEngine), which build
//! the visible context and use a GenerationClient to obtain raw text.

use async_trait::async_trait;
use std::error::Error;
use std::fmt;

/// Represents the possible roles for a prompt message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageRole {
    /// Set by the engine to steer the model's behavior for the whole call.
    System,
    /// Content the speaker is reacting to (transcript lines, instructions).
    User,
}

/// Which kind of speaker the engine is generating for. Providers may route
/// each role to a different underlying model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptRole {
    Character,
    Narrator,
    Orchestrator,
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptRole::Character => write!(f, "character"),
            PromptRole::Narrator => write!(f, "narrator"),
            PromptRole::Orchestrator => write!(f, "orchestrator"),
        }
    }
}

/// Represents a generic message to be sent to the generation provider.
#[derive(Clone, Debug)]
pub struct PromptMessage {
    /// The role associated with the message.
    pub role: MessageRole,
    /// The actual content of the message.
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Error reported by a [`GenerationClient`] or by the invocation adapter
/// wrapping it. The adapter retries transient variants with backoff; the
/// rest surface immediately.
#[derive(Debug, Clone)]
pub enum GenerationError {
    /// The call did not complete within the configured timeout.
    Timeout,
    /// The provider rejected the call due to rate limiting.
    RateLimited,
    /// Any other provider-side failure (network, 5xx, refusal).
    Provider(String),
    /// The provider returned an empty or whitespace-only utterance.
    EmptyUtterance,
    /// The reply carried a structured fragment that could not be parsed.
    Malformed(String),
    /// All retries were exhausted without a usable result.
    Unavailable { attempts: usize },
}

impl GenerationError {
    /// Whether the invocation adapter should retry after this failure with
    /// backoff. Empty utterances are structural, not transient; they get the
    /// strict-retry treatment in the adapter instead.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::Timeout
                | GenerationError::RateLimited
                | GenerationError::Provider(_)
                | GenerationError::Malformed(_)
        )
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Timeout => write!(f, "generation call timed out"),
            GenerationError::RateLimited => write!(f, "generation provider rate-limited the call"),
            GenerationError::Provider(msg) => write!(f, "generation provider error: {}", msg),
            GenerationError::EmptyUtterance => write!(f, "generation returned an empty utterance"),
            GenerationError::Malformed(msg) => {
                write!(f, "generation returned malformed structured output: {}", msg)
            }
            GenerationError::Unavailable { attempts } => {
                write!(f, "generation unavailable after {} attempts", attempts)
            }
        }
    }
}

impl Error for GenerationError {}

/// Trait defining the interface to an external text-generation provider.
///
/// The engine treats implementations as unreliable and rate-limited; every
/// call goes through the retry/timeout policy of
/// [`AgentInvoker`](crate::invocation::AgentInvoker). Implementations decide
/// what to do with `model`: it is the identifier configured per prompt role
/// in [`RoleModels`](crate::config::RoleModels).
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Request raw text for the given role and visible context.
    /// - `role`: which kind of speaker is being generated for.
    /// - `messages`: the permission-filtered context built by the engine.
    /// - `model`: provider-specific model identifier for this role.
    async fn generate(
        &self,
        role: PromptRole,
        messages: &[PromptMessage],
        model: &str,
    ) -> Result<String, GenerationError>;

    /// Human-readable provider name, used in logs.
    fn provider_name(&self) -> &str;
}
