//! Assistant seam — text generation for bios, icebreakers, and persona
//! replies.
//!
//! Consumed as single request/response calls. The core degrades gracefully
//! when the assistant is unavailable: callers fall back to the original
//! input or a canned line, never an error surface.

use anyhow::Result;
use async_trait::async_trait;

use linkup_core::types::Message;

#[async_trait]
pub trait Assistant: Send + Sync {
    /// Rewrite a profile bio. Callers fall back to the input on failure.
    async fn rewrite_bio(&self, bio: &str) -> Result<String>;

    /// Suggest an opening message for a chat with `name`.
    async fn suggest_icebreaker(&self, name: &str) -> Result<String>;

    /// Generate a persona's reply given its bio and the chat so far.
    async fn chat_reply(&self, persona_bio: &str, history: &[Message], last: &str)
        -> Result<String>;
}

/// The no-backend assistant: returns the fallback strings directly.
/// Doubles as the degraded path when a real backend errors out.
#[derive(Default)]
pub struct StaticAssistant;

#[async_trait]
impl Assistant for StaticAssistant {
    async fn rewrite_bio(&self, bio: &str) -> Result<String> {
        Ok(bio.to_string())
    }

    async fn suggest_icebreaker(&self, name: &str) -> Result<String> {
        Ok(format!("Hey {name}! How's your night going?"))
    }

    async fn chat_reply(
        &self,
        _persona_bio: &str,
        _history: &[Message],
        _last: &str,
    ) -> Result<String> {
        Ok("Hey there!".to_string())
    }
}
