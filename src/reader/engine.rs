//! Speech engine seam.
//!
//! The controller only ever talks to a `dyn SpeechEngine`: one utterance at a
//! time, resolved when the engine reports end or error.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// A speech synthesis profile offered by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub name: String,
    /// BCP 47 language tag, e.g. `en-US`.
    pub lang: String,
    /// Synthesized on this machine rather than by a remote service.
    pub local_service: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>, local_service: bool) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            local_service,
        }
    }
}

/// One request to vocalize a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    /// Voice name; `None` lets the engine use its default.
    pub voice: Option<String>,
}

/// Engine-reported failure. Display is the short error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    #[error("interrupted")]
    Interrupted,
    #[error("audio-busy")]
    AudioBusy,
    #[error("voice-unavailable")]
    VoiceUnavailable,
    #[error("synthesis-failed")]
    SynthesisFailed(String),
    #[error("{0}")]
    Other(String),
}

impl SpeechError {
    /// Code plus detail, for logs and user messages.
    pub fn describe(&self) -> String {
        match self {
            Self::SynthesisFailed(detail) if !detail.is_empty() => format!("{self} ({detail})"),
            _ => self.to_string(),
        }
    }
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Voices currently available. May be empty while the engine warms up.
    fn voices(&self) -> Vec<Voice>;

    /// Speak one utterance; resolves when playback ends or fails.
    async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError>;

    /// Pause the in-flight utterance in place.
    fn pause(&self);

    /// Resume a paused utterance.
    fn resume(&self);

    /// Drop the in-flight utterance. Idempotent.
    fn cancel(&self);
}
