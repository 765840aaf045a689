//! Follows one read-aloud session through the controller's events and turns
//! it into a history record when it ends.

use std::time::Instant;

use crate::history::{ReadingOutcome, ReadingRecord};
use crate::reader::ReaderEvent;

pub struct SessionTracker {
    started: Instant,
    timestamp: String,
    total: usize,
    spoken: usize,
    voice: Option<String>,
    outcome: Option<ReadingOutcome>,
    error: Option<String>,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            timestamp: ReadingRecord::now_timestamp(),
            total: 0,
            spoken: 0,
            voice: None,
            outcome: None,
            error: None,
        }
    }

    /// Feed one event. Returns the outcome once the session has ended.
    pub fn observe(&mut self, event: &ReaderEvent) -> Option<ReadingOutcome> {
        match event {
            ReaderEvent::Started { total, voice } => {
                self.total = *total;
                self.spoken = 0;
                self.voice = voice.clone();
            }
            ReaderEvent::ChunkStarted { index, .. } => self.spoken = *index,
            ReaderEvent::Finished { total } => {
                self.spoken = *total;
                self.outcome = Some(ReadingOutcome::Completed);
            }
            ReaderEvent::Stopped { index, .. } => {
                self.spoken = *index;
                self.outcome = Some(ReadingOutcome::Stopped);
            }
            ReaderEvent::Failed { index, message, .. } => {
                self.spoken = *index;
                self.error = Some(message.clone());
                self.outcome = Some(ReadingOutcome::Failed);
            }
            ReaderEvent::StateChanged(_) | ReaderEvent::Notice(_) => {}
        }
        self.outcome
    }

    pub fn outcome(&self) -> Option<ReadingOutcome> {
        self.outcome
    }

    /// Build the record. A session that never ended counts as stopped.
    pub fn record(
        &self,
        book_id: &str,
        title: Option<&str>,
        from_selection: bool,
        engine: &str,
    ) -> ReadingRecord {
        ReadingRecord {
            timestamp: self.timestamp.clone(),
            book_id: book_id.to_string(),
            title: title.map(str::to_string),
            outcome: self.outcome.unwrap_or(ReadingOutcome::Stopped),
            chunks_total: self.total,
            chunks_spoken: self.spoken,
            from_selection,
            engine: engine.to_string(),
            voice: self.voice.clone(),
            duration_ms: self.started.elapsed().as_millis() as i64,
            error: self.error.clone(),
        }
    }
}
