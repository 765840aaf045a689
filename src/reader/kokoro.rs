//! Kokoro speech engine: text → phonemes → ONNX inference → rodio playback.
//!
//! Pipeline per utterance:
//! 1. Text → phonemes (misaki-rs G2P)
//! 2. Phonemes → token IDs (tokenizer.json vocabulary)
//! 3. Token IDs + voice style + speed → ONNX inference → f32 audio (24kHz)
//! 4. Audio → rodio Sink; pause/resume map onto the sink

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ndarray::{Array2, Array3};
use ndarray_npy::NpzReader;
use ort::value::Tensor;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::engine::{SpeechEngine, SpeechError, Utterance, Voice};
use crate::config::KokoroConfig;

const SAMPLE_RATE: u32 = 24000;
const MAX_TOKENS: usize = 510; // Voice style array first dimension
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum KokoroLoadError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid tokenizer file: {0}")]
    Tokenizer(#[from] serde_json::Error),

    #[error("Invalid voices file: {0}")]
    Voices(String),

    #[error("Failed to load ONNX model: {0}")]
    Model(String),

    #[error("Failed to open audio output: {0}")]
    Audio(String),
}

/// The part of a HuggingFace `tokenizer.json` the model needs.
#[derive(Deserialize)]
struct TokenizerFile {
    model: TokenizerModel,
}

#[derive(Deserialize)]
struct TokenizerModel {
    vocab: HashMap<String, i64>,
}

/// Style vectors indexed by token count. shape: (510, 256)
struct VoiceData {
    styles: Array2<f32>,
}

/// Everything inference needs, shared with the blocking pool.
#[derive(Default)]
struct Synthesizer {
    // ort 2.0 Session::run needs &mut
    session: Mutex<Option<ort::session::Session>>,
    phonemizer: Option<misaki_rs::G2P>,
    vocab: HashMap<char, i64>,
    voices: HashMap<String, VoiceData>,
    speed: f32,
}

pub struct KokoroEngine {
    synth: Arc<Synthesizer>,
    default_voice: String,
    speed: f32,

    // Kept alive for the process lifetime
    output_stream: Option<OutputStream>,
    active_sink: Arc<Mutex<Option<Sink>>>,
    cancel_flag: Arc<AtomicBool>,
    // Pause can arrive before the sink exists
    paused: AtomicBool,

    model_path: PathBuf,
    voices_path: PathBuf,
    tokenizer_path: PathBuf,
}

fn path_or(configured: &str, base_dir: &Path, default_name: &str) -> PathBuf {
    if configured.is_empty() {
        base_dir.join(default_name)
    } else {
        PathBuf::from(configured)
    }
}

/// Kokoro voice names start with a language letter: `af_heart`, `bm_george`, ...
fn voice_lang(name: &str) -> &'static str {
    match name.chars().next() {
        Some('a') => "en-US",
        Some('b') => "en-GB",
        Some('e') => "es-ES",
        Some('f') => "fr-FR",
        Some('h') => "hi-IN",
        Some('i') => "it-IT",
        Some('j') => "ja-JP",
        Some('p') => "pt-BR",
        Some('z') => "zh-CN",
        _ => "und",
    }
}

impl Synthesizer {
    fn generate(&self, text: &str, voice_name: &str) -> Result<Vec<f32>, SpeechError> {
        let synthesis = |msg: String| SpeechError::SynthesisFailed(msg);

        let mut session_guard = self.session.lock().map_err(|_| SpeechError::AudioBusy)?;
        let session = session_guard
            .as_mut()
            .ok_or_else(|| synthesis("model not loaded".into()))?;
        let phonemizer = self
            .phonemizer
            .as_ref()
            .ok_or_else(|| synthesis("phonemizer not loaded".into()))?;

        let (phonemes, _tokens) = phonemizer
            .g2p(text)
            .map_err(|e| synthesis(format!("phonemization: {e}")))?;
        if phonemes.is_empty() {
            return Ok(Vec::new());
        }

        // Unknown phoneme characters are skipped
        let mut token_ids: Vec<i64> = Vec::with_capacity(phonemes.len() + 2);
        token_ids.push(0);
        token_ids.extend(phonemes.chars().filter_map(|ch| self.vocab.get(&ch).copied()));
        token_ids.push(0);
        let n_tokens = token_ids.len().min(MAX_TOKENS);
        token_ids.truncate(n_tokens);

        let voice_data = self
            .voices
            .get(voice_name)
            .ok_or(SpeechError::VoiceUnavailable)?;
        let style_idx = n_tokens.saturating_sub(2).min(voice_data.styles.nrows().saturating_sub(1));
        let style_vec: Vec<f32> = voice_data.styles.row(style_idx).to_vec();

        let tokens_tensor = Array2::from_shape_vec((1, n_tokens), token_ids)
            .map_err(|e| synthesis(format!("tokens tensor: {e}")))
            .and_then(|a| Tensor::from_array(a).map_err(|e| synthesis(format!("tokens tensor: {e}"))))?;
        let style_tensor = Array2::from_shape_vec((1, 256), style_vec)
            .map_err(|e| synthesis(format!("style tensor: {e}")))
            .and_then(|a| Tensor::from_array(a).map_err(|e| synthesis(format!("style tensor: {e}"))))?;
        let speed_tensor = Tensor::from_array(ndarray::Array1::from_vec(vec![self.speed]))
            .map_err(|e| synthesis(format!("speed tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![
                "tokens" => tokens_tensor,
                "style" => style_tensor,
                "speed" => speed_tensor
            ])
            .map_err(|e| synthesis(format!("inference: {e}")))?;

        let first_output = outputs
            .iter()
            .next()
            .ok_or_else(|| synthesis("no output tensor".into()))?;
        let (_shape, audio) = first_output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| synthesis(format!("audio tensor: {e}")))?;

        let samples: Vec<f32> = audio.to_vec();
        debug!(
            "Generated {} samples ({:.1}s)",
            samples.len(),
            samples.len() as f32 / SAMPLE_RATE as f32
        );
        Ok(samples)
    }
}

impl KokoroEngine {
    pub fn new(config: &KokoroConfig) -> Self {
        let base_dir = std::env::current_dir().unwrap_or_default();

        Self {
            synth: Arc::new(Synthesizer::default()),
            default_voice: config.voice.clone(),
            speed: config.speed,
            output_stream: None,
            active_sink: Arc::new(Mutex::new(None)),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            paused: AtomicBool::new(false),
            model_path: path_or(&config.model_path, &base_dir, "kokoro-v1.0.onnx"),
            voices_path: path_or(&config.voices_path, &base_dir, "voices-v1.0.bin"),
            tokenizer_path: path_or(&config.tokenizer_path, &base_dir, "tokenizer.json"),
        }
    }

    /// Load the ONNX model, tokenizer, voices, phonemizer and audio output.
    /// Blocking; call before handing the engine to the controller.
    pub fn load_model_sync(&mut self) -> Result<(), KokoroLoadError> {
        let started = Instant::now();

        let vocab = load_tokenizer(&self.tokenizer_path)?;
        let voices = load_voices(&self.voices_path)?;
        debug!("Kokoro vocabulary: {} symbols, {} voices", vocab.len(), voices.len());

        let session = ort::session::Session::builder()
            .map_err(model_err)?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(model_err)?
            .with_intra_threads(4)
            .map_err(model_err)?
            .commit_from_file(&self.model_path)
            .map_err(model_err)?;

        self.synth = Arc::new(Synthesizer {
            session: Mutex::new(Some(session)),
            phonemizer: Some(misaki_rs::G2P::new(misaki_rs::Language::EnglishUS)),
            vocab,
            voices,
            speed: self.speed,
        });
        self.output_stream = Some(
            OutputStreamBuilder::open_default_stream()
                .map_err(|e| KokoroLoadError::Audio(e.to_string()))?,
        );

        info!(
            "Kokoro engine ready in {}ms (model {})",
            started.elapsed().as_millis(),
            self.model_path.display()
        );
        Ok(())
    }

    /// Play through a fresh sink. Paused sinks stay non-empty, so a paused
    /// utterance simply keeps this future pending.
    async fn play_audio(&self, samples: Vec<f32>) -> Result<(), SpeechError> {
        let stream = self.output_stream.as_ref().ok_or(SpeechError::AudioBusy)?;

        let sink = Sink::connect_new(stream.mixer());
        sink.append(SamplesBuffer::new(1, SAMPLE_RATE, samples));
        if self.paused.load(Ordering::Relaxed) {
            sink.pause();
        }
        *self.active_sink.lock().map_err(|_| SpeechError::AudioBusy)? = Some(sink);

        let cancel_flag = self.cancel_flag.clone();
        let active_sink = self.active_sink.clone();
        let finished = tokio::task::spawn_blocking(move || loop {
            if cancel_flag.load(Ordering::Relaxed) {
                return false;
            }
            let done = match active_sink.lock() {
                Ok(guard) => guard.as_ref().map_or(true, |s| s.empty()),
                Err(_) => true,
            };
            if done {
                return true;
            }
            std::thread::sleep(POLL_INTERVAL);
        })
        .await
        .unwrap_or(false);

        if let Ok(mut guard) = self.active_sink.lock() {
            guard.take();
        }

        if finished {
            Ok(())
        } else {
            Err(SpeechError::Interrupted)
        }
    }

    fn with_sink(&self, f: impl FnOnce(&Sink)) {
        match self.active_sink.lock() {
            Ok(guard) => {
                if let Some(sink) = guard.as_ref() {
                    f(sink);
                }
            }
            Err(_) => warn!("Sink lock poisoned"),
        }
    }
}

#[async_trait]
impl SpeechEngine for KokoroEngine {
    fn voices(&self) -> Vec<Voice> {
        let mut voices: Vec<Voice> = self
            .synth
            .voices
            .keys()
            .map(|name| Voice::new(name.clone(), voice_lang(name), true))
            .collect();
        voices.sort_by(|a, b| a.name.cmp(&b.name));
        // Configured voice first so prefix selection lands on it when it matches
        if let Some(pos) = voices.iter().position(|v| v.name == self.default_voice) {
            let preferred = voices.remove(pos);
            voices.insert(0, preferred);
        }
        voices
    }

    async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError> {
        self.cancel_flag.store(false, Ordering::Relaxed);
        let voice = utterance.voice.unwrap_or_else(|| self.default_voice.clone());
        let synth = self.synth.clone();

        // G2P and ONNX inference block; keep them off the controller's task.
        let t_gen = Instant::now();
        let samples = tokio::task::spawn_blocking(move || synth.generate(&utterance.text, &voice))
            .await
            .map_err(|e| SpeechError::SynthesisFailed(format!("synthesis task: {e}")))??;
        debug!("Generated utterance in {}ms", t_gen.elapsed().as_millis());

        if self.cancel_flag.load(Ordering::Relaxed) {
            return Err(SpeechError::Interrupted);
        }
        if samples.is_empty() {
            return Ok(());
        }
        self.play_audio(samples).await
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
        self.with_sink(Sink::pause);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
        self.with_sink(Sink::play);
    }

    fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
        self.paused.store(false, Ordering::Relaxed);
        if let Ok(mut guard) = self.active_sink.lock() {
            if let Some(sink) = guard.take() {
                sink.stop();
            }
        }
    }
}

fn model_err(e: impl std::fmt::Display) -> KokoroLoadError {
    KokoroLoadError::Model(e.to_string())
}

fn read_file(path: &Path) -> Result<Vec<u8>, KokoroLoadError> {
    fs::read(path).map_err(|source| KokoroLoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Phoneme symbol → token id. Multi-char vocabulary entries are ignored.
fn parse_tokenizer(bytes: &[u8]) -> Result<HashMap<char, i64>, KokoroLoadError> {
    let file: TokenizerFile = serde_json::from_slice(bytes)?;
    Ok(file
        .model
        .vocab
        .into_iter()
        .filter_map(|(symbol, id)| {
            let mut chars = symbol.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Some((ch, id)),
                _ => None,
            }
        })
        .collect())
}

fn load_tokenizer(path: &Path) -> Result<HashMap<char, i64>, KokoroLoadError> {
    parse_tokenizer(&read_file(path)?)
}

fn load_voices(path: &Path) -> Result<HashMap<String, VoiceData>, KokoroLoadError> {
    let voices_err = |e: &dyn std::fmt::Display| KokoroLoadError::Voices(e.to_string());
    let file = fs::File::open(path).map_err(|source| KokoroLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut npz = NpzReader::new(file).map_err(|e| voices_err(&e))?;
    let entries = npz.names().map_err(|e| voices_err(&e))?;

    let mut voices = HashMap::with_capacity(entries.len());
    for entry in entries {
        let packed: Array3<f32> = npz.by_name(&entry).map_err(|e| voices_err(&e))?;

        // Stored as (510, 1, 256); the middle axis is always 1.
        let (rows, width) = (packed.shape()[0], packed.shape()[2]);
        let styles = packed
            .into_shape_with_order((rows, width))
            .map_err(|e| voices_err(&e))?;

        let name = entry.trim_end_matches(".npy").to_string();
        if rows == 0 {
            return Err(KokoroLoadError::Voices(format!("voice {name} has no style vectors")));
        }
        voices.insert(name, VoiceData { styles });
    }
    Ok(voices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_language_from_name_prefix() {
        assert_eq!(voice_lang("af_heart"), "en-US");
        assert_eq!(voice_lang("bm_george"), "en-GB");
        assert_eq!(voice_lang("zf_xiaobei"), "zh-CN");
        assert_eq!(voice_lang(""), "und");
    }

    #[test]
    fn tokenizer_keeps_single_symbol_entries() {
        let json = r#"{"model": {"vocab": {"$": 0, "a": 43, "ˈ": 156, "ab": 7}}}"#;
        let vocab = parse_tokenizer(json.as_bytes()).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab[&'a'], 43);
        assert_eq!(vocab[&'ˈ'], 156);
    }

    #[test]
    fn tokenizer_without_vocab_is_rejected() {
        assert!(matches!(
            parse_tokenizer(br#"{"model": {}}"#),
            Err(KokoroLoadError::Tokenizer(_))
        ));
    }

    #[test]
    fn missing_files_name_the_path() {
        let err = load_tokenizer(Path::new("/nonexistent/tokenizer.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tokenizer.json"));
    }

    fn write_voices(path: &Path, name: &str, styles: Array3<f32>) {
        let mut npz = ndarray_npy::NpzWriter::new(fs::File::create(path).unwrap());
        npz.add_array(name, &styles).unwrap();
        npz.finish().unwrap();
    }

    #[test]
    fn voices_load_as_style_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("voices.bin");
        write_voices(&path, "af_heart", Array3::zeros((4, 1, 256)));

        let voices = load_voices(&path).unwrap();
        assert_eq!(voices["af_heart"].styles.dim(), (4, 256));
    }

    #[test]
    fn voice_without_styles_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("voices.bin");
        write_voices(&path, "af_empty", Array3::zeros((0, 1, 256)));

        let err = load_voices(&path).err().unwrap();
        assert!(matches!(err, KokoroLoadError::Voices(_)));
        assert!(err.to_string().contains("af_empty"));
    }

    #[tokio::test]
    async fn unloaded_engine_fails_synthesis_off_the_task() {
        let engine = KokoroEngine::new(&KokoroConfig::default());
        assert!(engine.voices().is_empty());
        let utterance = Utterance {
            text: "Hello.".into(),
            lang: "en-US".into(),
            voice: Some("af_heart".into()),
        };
        let result = engine.speak(utterance).await;
        assert!(matches!(result, Err(SpeechError::SynthesisFailed(_))));
    }
}
