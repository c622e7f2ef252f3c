//! Shared test utilities

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use persona_voice::persona::{PersonaState, VoiceProfile};
use persona_voice::voice::{
    AudioCache, ChanceSource, EffectsEngine, Engines, MediaPlayer, PrunePolicy, SampleLibrary,
    SpeechEngine, VoicePipeline,
};
use persona_voice::{Error, Result};

/// Write a short mono 16-bit waveform
pub fn write_wav(path: &Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("failed to create wav");
    for i in 0..128_i16 {
        writer.write_sample(i * 64).expect("failed to write sample");
    }
    writer.finalize().expect("failed to finalize wav");
}

/// Speech engine that writes a fixture waveform and records its input
#[derive(Default)]
pub struct FakeSpeech {
    pub texts: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechEngine for FakeSpeech {
    async fn synthesize(&self, text: &str, _model: &Path, output: &Path) -> Result<()> {
        self.texts.lock().unwrap().push(text.to_string());
        write_wav(output);
        Ok(())
    }
}

/// Effects engine that copies input through and records filter graphs
#[derive(Default)]
pub struct FakeEffects {
    pub graphs: Mutex<Vec<String>>,
    pub concats: AtomicUsize,
    pub fail_apply: AtomicBool,
}

impl FakeEffects {
    pub fn applies(&self) -> usize {
        self.graphs.lock().unwrap().len()
    }
}

#[async_trait]
impl EffectsEngine for FakeEffects {
    async fn apply(&self, input: &Path, filter_graph: &str, output: &Path) -> Result<()> {
        self.graphs.lock().unwrap().push(filter_graph.to_string());
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(Error::Effect("ffmpeg exited with code 1: bad filter".to_string()));
        }
        std::fs::copy(input, output)?;
        Ok(())
    }

    async fn concat(&self, list_file: &Path, output: &Path) -> Result<()> {
        self.concats.fetch_add(1, Ordering::SeqCst);
        let list = std::fs::read_to_string(list_file)?;
        std::fs::write(output, list)?;
        Ok(())
    }
}

/// Player that records what it was asked to play
#[derive(Default)]
pub struct FakePlayer {
    pub played: Mutex<Vec<PathBuf>>,
    pub fail: AtomicBool,
}

impl FakePlayer {
    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaPlayer for FakePlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Playback("no audio device".to_string()));
        }
        Ok(())
    }
}

/// Randomness with a fixed outcome
pub struct ScriptedChance {
    pub outcome: AtomicBool,
    pub index: usize,
    pub rolls: AtomicUsize,
}

impl ScriptedChance {
    pub fn always(outcome: bool) -> Self {
        Self {
            outcome: AtomicBool::new(outcome),
            index: 0,
            rolls: AtomicUsize::new(0),
        }
    }

    pub fn picking(index: usize) -> Self {
        Self {
            index,
            ..Self::always(false)
        }
    }
}

impl ChanceSource for ScriptedChance {
    fn roll(&self, _p: f64) -> bool {
        self.rolls.fetch_add(1, Ordering::SeqCst);
        self.outcome.load(Ordering::SeqCst)
    }

    fn pick(&self, len: usize) -> usize {
        self.index.min(len.saturating_sub(1))
    }
}

/// A pipeline wired to fakes inside a temporary directory
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub speech: Arc<FakeSpeech>,
    pub effects: Arc<FakeEffects>,
    pub player: Arc<FakePlayer>,
    pub chance: Arc<ScriptedChance>,
    pub pipeline: VoicePipeline,
}

impl Harness {
    /// Droid defaults with samples switched off
    pub fn new(chance: ScriptedChance) -> Self {
        let mut profile = VoiceProfile::default();
        profile.samples = SampleLibrary::disabled();
        Self::with_profile(profile, chance)
    }

    pub fn with_profile(profile: VoiceProfile, chance: ScriptedChance) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let model = dir.path().join("voice.onnx");
        std::fs::write(&model, b"model").expect("failed to write model");
        Self::build(dir, Some(model), profile, chance)
    }

    pub fn without_model(chance: ScriptedChance) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut profile = VoiceProfile::default();
        profile.samples = SampleLibrary::disabled();
        Self::build(dir, None, profile, chance)
    }

    fn build(
        dir: tempfile::TempDir,
        model: Option<PathBuf>,
        profile: VoiceProfile,
        chance: ScriptedChance,
    ) -> Self {
        let cache = Arc::new(
            AudioCache::open(dir.path().join("cache"), PrunePolicy::default())
                .expect("failed to open cache"),
        );
        let speech = Arc::new(FakeSpeech::default());
        let effects = Arc::new(FakeEffects::default());
        let player = Arc::new(FakePlayer::default());
        let chance = Arc::new(chance);

        let engines = Engines {
            speech: speech.clone(),
            effects: effects.clone(),
            player: player.clone(),
        };

        let pipeline = VoicePipeline::with_chance(
            Arc::new(PersonaState::new(profile)),
            engines,
            model,
            cache,
            chance.clone(),
        );

        Self {
            dir,
            speech,
            effects,
            player,
            chance,
            pipeline,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Published cache entries
    pub fn cache_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.cache_dir())
            .expect("failed to read cache dir")
            .filter_map(std::result::Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        names
    }
}
