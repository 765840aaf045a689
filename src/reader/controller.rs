//! Read-aloud controller: the single driver loop behind the reader controls.
//!
//! Owns the sequencer and at most one in-flight utterance. Each loop turn
//! waits for either a user command or the in-flight utterance to resolve,
//! so stop and error paths are plain match arms.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::chunker::split_into_chunks;
use super::engine::{SpeechEngine, SpeechError, Utterance, Voice};
use super::sequencer::{Advance, PlaybackState, Sequencer};
use super::voice::select_voice;
use crate::config::ReaderConfig;

type InFlight = Pin<Box<dyn Future<Output = Result<(), SpeechError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderCommand {
    Start(String),
    Pause,
    Resume,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    StateChanged(PlaybackState),
    Started { total: usize, voice: Option<String> },
    ChunkStarted { index: usize, total: usize, text: String },
    Finished { total: usize },
    Stopped { index: usize, total: usize },
    Failed { index: usize, total: usize, message: String },
    /// Informational message for the user; no state change.
    Notice(String),
}

/// Cloneable sender side of the controller.
#[derive(Clone)]
pub struct ReaderHandle {
    commands: mpsc::Sender<ReaderCommand>,
}

impl ReaderHandle {
    /// Returns false once the controller has shut down.
    pub async fn send(&self, command: ReaderCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub async fn start(&self, text: impl Into<String>) -> bool {
        self.send(ReaderCommand::Start(text.into())).await
    }

    pub async fn pause(&self) -> bool {
        self.send(ReaderCommand::Pause).await
    }

    pub async fn resume(&self) -> bool {
        self.send(ReaderCommand::Resume).await
    }

    pub async fn stop(&self) -> bool {
        self.send(ReaderCommand::Stop).await
    }
}

pub struct ReadAloudController {
    engine: Arc<dyn SpeechEngine>,
    sequencer: Sequencer,
    max_chunk_len: usize,
    language: String,
    voice: Option<Voice>,
    in_flight: Option<InFlight>,
    events: mpsc::UnboundedSender<ReaderEvent>,
}

impl ReadAloudController {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        config: &ReaderConfig,
        events: mpsc::UnboundedSender<ReaderEvent>,
    ) -> Self {
        Self {
            engine,
            sequencer: Sequencer::new(),
            max_chunk_len: config.max_chunk_len,
            language: config.language.clone(),
            voice: None,
            in_flight: None,
            events,
        }
    }

    /// Spawn the driver loop; it exits when every handle is dropped.
    pub fn spawn(
        engine: Arc<dyn SpeechEngine>,
        config: &ReaderConfig,
    ) -> (ReaderHandle, mpsc::UnboundedReceiver<ReaderEvent>) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let controller = Self::new(engine, config, event_tx);
        tokio::spawn(controller.run(command_rx));
        (ReaderHandle { commands: command_tx }, event_rx)
    }

    pub fn state(&self) -> PlaybackState {
        self.sequencer.state()
    }

    pub fn queued(&self) -> usize {
        self.sequencer.len()
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<ReaderCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        self.stop();
                        break;
                    }
                },
                outcome = next_outcome(&mut self.in_flight) => self.on_outcome(outcome),
            }
        }
        debug!("Reader controller shut down");
    }

    pub fn handle(&mut self, command: ReaderCommand) {
        match command {
            ReaderCommand::Start(text) => self.start(&text),
            ReaderCommand::Pause => self.pause(),
            ReaderCommand::Resume => self.resume(),
            ReaderCommand::Stop => self.stop(),
        }
    }

    fn start(&mut self, text: &str) {
        if text.trim().is_empty() {
            warn!("Start requested with empty text");
            self.emit(ReaderEvent::Notice("Nothing to read.".into()));
            return;
        }

        self.stop();

        let chunks = split_into_chunks(text, self.max_chunk_len);
        if !self.sequencer.start(chunks) {
            self.emit(ReaderEvent::Notice(
                "No readable content after processing.".into(),
            ));
            return;
        }

        let voices = self.engine.voices();
        self.voice = select_voice(&voices, &self.language).cloned();
        match &self.voice {
            Some(voice) => debug!("Using voice {} ({})", voice.name, voice.lang),
            None => warn!("No voice matching '{}', using engine default", self.language),
        }

        let total = self.sequencer.len();
        info!("Reading {total} chunks ({} chars)", text.len());
        self.emit(ReaderEvent::Started {
            total,
            voice: self.voice.as_ref().map(|v| v.name.clone()),
        });
        self.emit_state();
        self.speak_current();
    }

    fn pause(&mut self) {
        if self.sequencer.pause() {
            self.engine.pause();
            info!("Reading paused");
            self.emit_state();
        }
    }

    fn resume(&mut self) {
        if !self.sequencer.resume() {
            return;
        }
        self.engine.resume();
        info!("Reading resumed");
        self.emit_state();
        // A chunk boundary passed while paused: nothing is in flight yet.
        if self.in_flight.is_none() {
            self.speak_current();
        }
    }

    /// Cancel speech and drop the queue. Safe to call in any state.
    fn stop(&mut self) {
        self.engine.cancel();
        self.in_flight = None;

        let state = self.sequencer.state();
        let total = self.sequencer.len();
        self.sequencer.stop();

        if state.is_reading() {
            info!("Reading stopped at chunk {}/{total}", state.current_index() + 1);
            self.emit(ReaderEvent::Stopped {
                index: state.current_index(),
                total,
            });
            self.emit_state();
        }
    }

    fn speak_current(&mut self) {
        let Some(text) = self.sequencer.current() else {
            return;
        };
        let index = self.sequencer.state().current_index();
        let total = self.sequencer.len();

        let preview: String = text.chars().take(50).collect();
        debug!("Speaking chunk {}/{total}: \"{preview}...\"", index + 1);

        let utterance = Utterance {
            text: text.to_string(),
            lang: self.utterance_lang(),
            voice: self.voice.as_ref().map(|v| v.name.clone()),
        };
        self.emit(ReaderEvent::ChunkStarted {
            index,
            total,
            text: utterance.text.clone(),
        });

        let engine = self.engine.clone();
        self.in_flight = Some(Box::pin(async move { engine.speak(utterance).await }));
    }

    /// Apply the result of the in-flight utterance.
    pub fn on_outcome(&mut self, outcome: Result<(), SpeechError>) {
        self.in_flight = None;
        let index = self.sequencer.state().current_index();
        let total = self.sequencer.len();

        match outcome {
            Ok(()) => match self.sequencer.complete() {
                Advance::Next(_) => {
                    self.emit_state();
                    self.speak_current();
                }
                Advance::Held(next) => {
                    debug!("Chunk boundary reached while paused, holding chunk {}", next + 1);
                    self.emit_state();
                }
                Advance::Finished => {
                    info!("All {total} chunks spoken");
                    self.emit(ReaderEvent::Finished { total });
                    self.emit_state();
                }
                Advance::Ignored => {}
            },
            Err(e) => {
                if !self.sequencer.state().is_reading() {
                    return;
                }
                warn!("Speech error on chunk {}/{total}: {}", index + 1, e.describe());
                self.engine.cancel();
                self.sequencer.fail();
                self.emit(ReaderEvent::Failed {
                    index,
                    total,
                    message: format!("Speech error on chunk: {}. Stopping reading.", e.describe()),
                });
                self.emit_state();
            }
        }
    }

    fn utterance_lang(&self) -> String {
        match &self.voice {
            Some(voice) => voice.lang.clone(),
            None => self.language.trim_end_matches('-').to_string(),
        }
    }

    fn emit_state(&self) {
        self.emit(ReaderEvent::StateChanged(self.sequencer.state()));
    }

    fn emit(&self, event: ReaderEvent) {
        // Nobody listening is fine; playback carries on.
        let _ = self.events.send(event);
    }
}

async fn next_outcome(in_flight: &mut Option<InFlight>) -> Result<(), SpeechError> {
    match in_flight {
        Some(utterance) => utterance.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    /// Engine whose utterances resolve only when the test says so.
    #[derive(Default)]
    struct ScriptedEngine {
        voices: Vec<Voice>,
        spoken: Mutex<Vec<Utterance>>,
        pending: Mutex<VecDeque<oneshot::Sender<Result<(), SpeechError>>>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedEngine {
        fn with_voices(voices: Vec<Voice>) -> Self {
            Self {
                voices,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().iter().map(|u| u.text.clone()).collect()
        }

        /// Resolve the oldest in-flight utterance once the controller has issued it.
        async fn finish(&self, outcome: Result<(), SpeechError>) {
            for _ in 0..500 {
                let sender = self.pending.lock().unwrap().pop_front();
                if let Some(sender) = sender {
                    let _ = sender.send(outcome);
                    return;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            panic!("no utterance in flight");
        }
    }

    #[async_trait]
    impl SpeechEngine for ScriptedEngine {
        fn voices(&self) -> Vec<Voice> {
            self.voices.clone()
        }

        async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError> {
            let (tx, rx) = oneshot::channel();
            self.spoken.lock().unwrap().push(utterance);
            self.pending.lock().unwrap().push_back(tx);
            rx.await.unwrap_or(Err(SpeechError::Interrupted))
        }

        fn pause(&self) {
            self.calls.lock().unwrap().push("pause");
        }

        fn resume(&self) {
            self.calls.lock().unwrap().push("resume");
        }

        fn cancel(&self) {
            self.calls.lock().unwrap().push("cancel");
            self.pending.lock().unwrap().clear();
        }
    }

    fn config(max_chunk_len: usize) -> ReaderConfig {
        ReaderConfig {
            max_chunk_len,
            ..ReaderConfig::default()
        }
    }

    fn controller(
        engine: Arc<ScriptedEngine>,
        max_chunk_len: usize,
    ) -> (ReadAloudController, mpsc::UnboundedReceiver<ReaderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ReadAloudController::new(engine, &config(max_chunk_len), tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ReaderEvent>) -> Vec<ReaderEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn wait_for<F>(rx: &mut mpsc::UnboundedReceiver<ReaderEvent>, mut pred: F) -> ReaderEvent
    where
        F: FnMut(&ReaderEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = rx.recv().await.expect("controller gone");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for reader event")
    }

    #[test]
    fn start_selects_voice_and_issues_first_chunk() {
        let engine = Arc::new(ScriptedEngine::with_voices(vec![
            Voice::new("Remote", "en-US", false),
            Voice::new("Local", "en-GB", true),
        ]));
        let (mut ctl, mut rx) = controller(engine, 5);

        ctl.handle(ReaderCommand::Start("Hello world. Bye.".into()));

        assert_eq!(ctl.state(), PlaybackState::Speaking { index: 0 });
        assert_eq!(ctl.queued(), 2);
        let events = drain(&mut rx);
        assert!(events.contains(&ReaderEvent::Started {
            total: 2,
            voice: Some("Local".into()),
        }));
        assert!(events.contains(&ReaderEvent::ChunkStarted {
            index: 0,
            total: 2,
            text: "Hello world.".into(),
        }));
    }

    #[test]
    fn blank_text_is_a_notice_not_a_session() {
        let engine = Arc::new(ScriptedEngine::default());
        let (mut ctl, mut rx) = controller(engine.clone(), 250);

        ctl.handle(ReaderCommand::Start("   \n\n  ".into()));

        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert_eq!(drain(&mut rx), vec![ReaderEvent::Notice("Nothing to read.".into())]);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn completions_walk_the_queue_to_finished() {
        let engine = Arc::new(ScriptedEngine::default());
        let (mut ctl, mut rx) = controller(engine, 4);

        ctl.handle(ReaderCommand::Start("A. B. C.".into()));
        assert_eq!(ctl.queued(), 3);
        ctl.on_outcome(Ok(()));
        ctl.on_outcome(Ok(()));
        assert_eq!(ctl.state(), PlaybackState::Speaking { index: 2 });
        ctl.on_outcome(Ok(()));

        assert_eq!(ctl.state(), PlaybackState::Finished);
        let events = drain(&mut rx);
        let started: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ReaderEvent::ChunkStarted { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![0, 1, 2]);
        assert!(events.contains(&ReaderEvent::Finished { total: 3 }));
    }

    #[test]
    fn pause_and_resume_delegate_to_engine() {
        let engine = Arc::new(ScriptedEngine::default());
        let (mut ctl, _rx) = controller(engine.clone(), 250);

        ctl.handle(ReaderCommand::Pause);
        assert!(engine.calls().iter().all(|c| *c == "cancel"));

        ctl.handle(ReaderCommand::Start("Something to say.".into()));
        ctl.handle(ReaderCommand::Pause);
        ctl.handle(ReaderCommand::Pause);
        assert_eq!(ctl.state(), PlaybackState::Paused { index: 0 });
        ctl.handle(ReaderCommand::Resume);
        assert_eq!(ctl.state(), PlaybackState::Speaking { index: 0 });

        let calls: Vec<_> = engine.calls().into_iter().filter(|c| *c != "cancel").collect();
        assert_eq!(calls, vec!["pause", "resume"]);
    }

    #[test]
    fn boundary_while_paused_waits_for_resume() {
        let engine = Arc::new(ScriptedEngine::default());
        let (mut ctl, mut rx) = controller(engine, 3);

        ctl.handle(ReaderCommand::Start("A. B.".into()));
        ctl.handle(ReaderCommand::Pause);
        drain(&mut rx);

        ctl.on_outcome(Ok(()));
        assert_eq!(ctl.state(), PlaybackState::Paused { index: 1 });
        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, ReaderEvent::ChunkStarted { .. })));

        ctl.handle(ReaderCommand::Resume);
        assert!(drain(&mut rx).contains(&ReaderEvent::ChunkStarted {
            index: 1,
            total: 2,
            text: "B.".into(),
        }));
    }

    #[test]
    fn stop_is_idempotent_and_clears_queue() {
        let engine = Arc::new(ScriptedEngine::default());
        let (mut ctl, mut rx) = controller(engine.clone(), 3);

        ctl.handle(ReaderCommand::Start("A. B.".into()));
        drain(&mut rx);
        ctl.handle(ReaderCommand::Stop);
        ctl.handle(ReaderCommand::Stop);

        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert_eq!(ctl.queued(), 0);
        assert_eq!(
            drain(&mut rx),
            vec![
                ReaderEvent::Stopped { index: 0, total: 2 },
                ReaderEvent::StateChanged(PlaybackState::Idle),
            ]
        );
        assert!(engine.calls().iter().filter(|c| **c == "cancel").count() >= 2);
    }

    #[test]
    fn speech_error_stops_without_retry() {
        let engine = Arc::new(ScriptedEngine::default());
        let (mut ctl, mut rx) = controller(engine, 3);

        ctl.handle(ReaderCommand::Start("A. B.".into()));
        ctl.on_outcome(Err(SpeechError::SynthesisFailed("model missing".into())));

        assert_eq!(ctl.state(), PlaybackState::Idle);
        let failed = drain(&mut rx).into_iter().find_map(|e| match e {
            ReaderEvent::Failed { message, .. } => Some(message),
            _ => None,
        });
        assert_eq!(
            failed.as_deref(),
            Some("Speech error on chunk: synthesis-failed (model missing). Stopping reading.")
        );
    }

    #[tokio::test]
    async fn driver_loop_reads_every_chunk() {
        let engine = Arc::new(ScriptedEngine::default());
        let (handle, mut rx) = ReadAloudController::spawn(engine.clone(), &config(3));

        assert!(handle.start("A. B. C.").await);
        for _ in 0..3 {
            engine.finish(Ok(())).await;
        }
        wait_for(&mut rx, |e| matches!(e, ReaderEvent::Finished { .. })).await;

        assert_eq!(engine.spoken(), vec!["A.", "B.", "C."]);
    }

    #[tokio::test]
    async fn driver_loop_stop_discards_in_flight_utterance() {
        let engine = Arc::new(ScriptedEngine::default());
        let (handle, mut rx) = ReadAloudController::spawn(engine.clone(), &config(3));

        handle.start("A. B. C.").await;
        engine.finish(Ok(())).await;
        wait_for(&mut rx, |e| matches!(e, ReaderEvent::ChunkStarted { index: 1, .. })).await;

        handle.stop().await;
        let stopped = wait_for(&mut rx, |e| matches!(e, ReaderEvent::Stopped { .. })).await;
        assert_eq!(stopped, ReaderEvent::Stopped { index: 1, total: 3 });
        assert_eq!(
            wait_for(&mut rx, |e| matches!(e, ReaderEvent::StateChanged(_))).await,
            ReaderEvent::StateChanged(PlaybackState::Idle)
        );
        assert_eq!(engine.spoken(), vec!["A.", "B."]);
    }

    #[tokio::test]
    async fn driver_loop_reports_engine_error() {
        let engine = Arc::new(ScriptedEngine::default());
        let (handle, mut rx) = ReadAloudController::spawn(engine.clone(), &config(250));

        handle.start("Only one chunk here.").await;
        engine.finish(Err(SpeechError::AudioBusy)).await;

        let failed = wait_for(&mut rx, |e| matches!(e, ReaderEvent::Failed { .. })).await;
        assert_eq!(
            failed,
            ReaderEvent::Failed {
                index: 0,
                total: 1,
                message: "Speech error on chunk: audio-busy. Stopping reading.".into(),
            }
        );
    }
}
