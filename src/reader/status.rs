//! Derives the reader status line and control availability from playback state.

use super::sequencer::PlaybackState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderStatus {
    Reading,
    Paused,
    Ready,
    NoBook,
}

impl std::fmt::Display for ReaderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading..."),
            Self::Paused => write!(f, "Paused."),
            Self::Ready => write!(f, "Ready to read."),
            Self::NoBook => write!(f, "Load a book to enable reading controls."),
        }
    }
}

/// Which reader controls are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub read: bool,
    pub read_from_selection: bool,
    pub pause: bool,
    pub resume: bool,
    pub stop: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    pub status: ReaderStatus,
    pub controls: Controls,
}

pub fn reduce(state: &PlaybackState, book_loaded: bool, has_selection: bool) -> StatusView {
    let reading = state.is_reading();
    let paused = state.is_paused();

    let status = if paused {
        ReaderStatus::Paused
    } else if reading {
        ReaderStatus::Reading
    } else if book_loaded {
        ReaderStatus::Ready
    } else {
        ReaderStatus::NoBook
    };

    StatusView {
        status,
        controls: Controls {
            read: book_loaded && !reading,
            read_from_selection: has_selection && !reading,
            pause: reading && !paused,
            resume: paused,
            stop: reading,
        },
    }
}
