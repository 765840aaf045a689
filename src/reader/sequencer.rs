//! Read-aloud sequencer: the chunk queue and its playback state.
//!
//! Idle → Speaking → (Paused ⇄ Speaking) → Finished, with stop and error
//! returning to Idle from anywhere. The sequencer never touches the engine;
//! the controller drives it and issues speech for whatever it reports.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Speaking { index: usize },
    Paused { index: usize },
    Finished,
}

impl PlaybackState {
    pub fn is_reading(&self) -> bool {
        matches!(self, Self::Speaking { .. } | Self::Paused { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }

    /// Index of the chunk being (or about to be) spoken.
    pub fn current_index(&self) -> usize {
        match self {
            Self::Speaking { index } | Self::Paused { index } => *index,
            Self::Idle | Self::Finished => 0,
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Speaking { index } => write!(f, "SPEAKING[{index}]"),
            Self::Paused { index } => write!(f, "PAUSED[{index}]"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Outcome of a chunk completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Speak the chunk at this index now.
    Next(usize),
    /// Advanced while paused; the chunk at this index waits for resume.
    Held(usize),
    Finished,
    /// No session was running.
    Ignored,
}

#[derive(Debug, Default)]
pub struct Sequencer {
    chunks: Vec<String>,
    state: PlaybackState,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk(&self, index: usize) -> Option<&str> {
        self.chunks.get(index).map(String::as_str)
    }

    /// The chunk at the current index while a session is running.
    pub fn current(&self) -> Option<&str> {
        if self.state.is_reading() {
            self.chunk(self.state.current_index())
        } else {
            None
        }
    }

    /// Replace the queue and start at chunk 0. Returns false (and stays
    /// Idle) when there is nothing to speak.
    pub fn start(&mut self, chunks: Vec<String>) -> bool {
        self.chunks = chunks;
        self.state = if self.chunks.is_empty() {
            PlaybackState::Idle
        } else {
            PlaybackState::Speaking { index: 0 }
        };
        debug!("Sequencer start: {} chunks → {}", self.chunks.len(), self.state);
        self.state.is_reading()
    }

    /// Record completion of the in-flight chunk.
    pub fn complete(&mut self) -> Advance {
        let (index, paused) = match self.state {
            PlaybackState::Speaking { index } => (index, false),
            PlaybackState::Paused { index } => (index, true),
            PlaybackState::Idle | PlaybackState::Finished => return Advance::Ignored,
        };

        let next = index + 1;
        if next >= self.chunks.len() {
            self.state = PlaybackState::Finished;
            self.chunks.clear();
            return Advance::Finished;
        }

        if paused {
            self.state = PlaybackState::Paused { index: next };
            Advance::Held(next)
        } else {
            self.state = PlaybackState::Speaking { index: next };
            Advance::Next(next)
        }
    }

    pub fn pause(&mut self) -> bool {
        match self.state {
            PlaybackState::Speaking { index } => {
                self.state = PlaybackState::Paused { index };
                true
            }
            _ => false,
        }
    }

    pub fn resume(&mut self) -> bool {
        match self.state {
            PlaybackState::Paused { index } => {
                self.state = PlaybackState::Speaking { index };
                true
            }
            _ => false,
        }
    }

    /// Drop the queue and return to Idle. Idempotent.
    pub fn stop(&mut self) {
        self.chunks.clear();
        self.state = PlaybackState::Idle;
    }

    /// A chunk failed: same as stop, no retry.
    pub fn fail(&mut self) {
        self.stop();
    }
}
