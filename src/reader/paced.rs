//! Terminal speech engine: prints each utterance and holds it for as long as
//! a reader would take to say it.
//!
//! Pausing freezes the clock of the in-flight utterance; cancel resolves it
//! with `interrupted`.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::engine::{SpeechEngine, SpeechError, Utterance, Voice};

const MIN_UTTERANCE: Duration = Duration::from_millis(300);

pub struct PacedTextEngine {
    words_per_minute: u32,
    out: Mutex<Box<dyn Write + Send>>,
    paused: watch::Sender<bool>,
    current: Mutex<CancellationToken>,
}

impl PacedTextEngine {
    pub fn new(words_per_minute: u32) -> Self {
        Self::with_writer(words_per_minute, Box::new(std::io::stdout()))
    }

    pub fn with_writer(words_per_minute: u32, out: Box<dyn Write + Send>) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            words_per_minute: words_per_minute.max(1),
            out: Mutex::new(out),
            paused,
            current: Mutex::new(CancellationToken::new()),
        }
    }

    /// How long `text` takes to say at the configured pace.
    pub fn duration_for(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        let millis = words * 60_000 / u64::from(self.words_per_minute);
        Duration::from_millis(millis).max(MIN_UTTERANCE)
    }

    fn write_line(&self, text: &str) -> Result<(), SpeechError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| SpeechError::Other("output lock poisoned".into()))?;
        writeln!(out, "{text}")
            .and_then(|()| out.flush())
            .map_err(|e| SpeechError::Other(format!("output failed: {e}")))
    }
}

#[async_trait]
impl SpeechEngine for PacedTextEngine {
    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("terminal", "en-US", true)]
    }

    async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError> {
        let token = CancellationToken::new();
        match self.current.lock() {
            Ok(mut current) => *current = token.clone(),
            Err(_) => return Err(SpeechError::AudioBusy),
        }

        let mut remaining = self.duration_for(&utterance.text);
        debug!("Terminal utterance: {} ms", remaining.as_millis());
        self.write_line(&utterance.text)?;

        let mut paused = self.paused.subscribe();
        loop {
            if *paused.borrow_and_update() {
                tokio::select! {
                    changed = paused.changed() => {
                        if changed.is_err() {
                            return Err(SpeechError::Interrupted);
                        }
                        continue;
                    }
                    _ = token.cancelled() => return Err(SpeechError::Interrupted),
                }
            }

            let started = Instant::now();
            tokio::select! {
                _ = tokio::time::sleep(remaining) => return Ok(()),
                _ = token.cancelled() => return Err(SpeechError::Interrupted),
                changed = paused.changed() => {
                    if changed.is_err() {
                        return Err(SpeechError::Interrupted);
                    }
                    remaining = remaining.saturating_sub(started.elapsed());
                }
            }
        }
    }

    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn cancel(&self) {
        match self.current.lock() {
            Ok(current) => current.cancel(),
            Err(_) => warn!("Terminal engine lock poisoned on cancel"),
        }
        self.paused.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn utterance(text: &str) -> Utterance {
        Utterance {
            text: text.into(),
            lang: "en-US".into(),
            voice: None,
        }
    }

    #[test]
    fn duration_follows_words_per_minute() {
        let engine = PacedTextEngine::with_writer(120, Box::new(SharedBuf::default()));
        assert_eq!(engine.duration_for("one two three four"), Duration::from_secs(2));
        assert_eq!(engine.duration_for(""), MIN_UTTERANCE);
    }

    #[tokio::test(start_paused = true)]
    async fn speaks_to_the_writer_and_completes() {
        let buf = SharedBuf::default();
        let engine = PacedTextEngine::with_writer(60, Box::new(buf.clone()));

        let started = Instant::now();
        engine.speak(utterance("Call me Ishmael.")).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(String::from_utf8(buf.0.lock().unwrap().clone()).unwrap(), "Call me Ishmael.\n");
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_the_clock() {
        let engine = Arc::new(PacedTextEngine::with_writer(60, Box::new(SharedBuf::default())));
        let speaking = tokio::spawn({
            let engine = engine.clone();
            async move { engine.speak(utterance("one two")).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        engine.pause();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!speaking.is_finished());
        engine.resume();

        let resumed = Instant::now();
        speaking.await.unwrap().unwrap();
        assert!(resumed.elapsed() <= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_in_flight_utterance() {
        let engine = Arc::new(PacedTextEngine::with_writer(60, Box::new(SharedBuf::default())));
        let speaking = tokio::spawn({
            let engine = engine.clone();
            async move { engine.speak(utterance("a fairly long sentence to say")).await }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        engine.cancel();

        assert_eq!(speaking.await.unwrap(), Err(SpeechError::Interrupted));
    }
}
