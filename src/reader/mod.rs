//! Read-aloud: chunking, sequencing, voice choice and the speech engines.
//!
//! - `chunker`: text → bounded chunks
//! - `sequencer`: chunk queue + playback state machine
//! - `controller`: async driver loop over a `SpeechEngine`
//! - `voice`: voice selection by language prefix
//! - `status`: status line and control availability
//! - `paced`: terminal engine
//! - `kokoro`: native Kokoro ONNX engine (feature `kokoro`)

pub mod chunker;
pub mod controller;
pub mod engine;
#[cfg(feature = "kokoro")]
pub mod kokoro;
pub mod paced;
pub mod sequencer;
pub mod status;
pub mod voice;

pub use controller::{ReadAloudController, ReaderCommand, ReaderEvent, ReaderHandle};
pub use engine::{SpeechEngine, SpeechError, Utterance, Voice};
pub use sequencer::PlaybackState;

/// Text to read when starting from `selection`: the book from the first
/// occurrence of the selection onwards, or `None` if it does not occur.
pub fn text_from_selection<'a>(book: &'a str, selection: &str) -> Option<&'a str> {
    let selection = selection.trim();
    if selection.is_empty() {
        return None;
    }
    book.find(selection).map(|start| &book[start..])
}
