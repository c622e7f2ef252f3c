//! Configuration management

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::persona::{PersonaConfig, VoiceProfile};
use crate::voice::PrunePolicy;
use crate::Result;

/// Default per-invocation timeout for synthesis and effects
const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 30;

/// Extension tried when a model is given by name
const MODEL_EXTENSION: &str = "onnx";

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Speech synthesis binary
    pub piper_bin: PathBuf,

    /// Audio effects binary
    pub ffmpeg_bin: PathBuf,

    /// Media player binary
    pub ffplay_bin: PathBuf,

    /// Resolved voice model, if one is configured
    pub model: Option<PathBuf>,

    /// Directory model names are looked up in
    pub models_dir: PathBuf,

    /// Audio cache directory
    pub cache_dir: PathBuf,

    /// Cache pruning limits
    pub prune: PrunePolicy,

    /// Per-invocation timeout for synthesis and effects
    pub engine_timeout: Duration,

    /// Directory containing persona directories
    pub personas_dir: PathBuf,

    /// Active persona; `None` uses the built-in droid persona
    pub persona: Option<String>,

    /// Override for the persona's authentic-sample toggle
    pub use_authentic_samples: Option<bool>,
}

/// An external binary and where it resolved on `PATH`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Role of the binary
    pub name: &'static str,

    /// Configured binary
    pub binary: PathBuf,

    /// Resolved location, `None` if not found
    pub resolved: Option<PathBuf>,
}

impl Dependency {
    /// Whether the binary was found
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.resolved.is_some()
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    #[must_use]
    pub fn load() -> Self {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    #[must_use]
    pub fn from_sources(fc: file::ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let env_u64 = |key: &str| {
            env(key).and_then(|v| match v.trim().parse::<u64>() {
                Ok(n) => Some(n),
                Err(e) => {
                    tracing::warn!(key, value = %v, error = %e, "ignoring invalid number");
                    None
                }
            })
        };

        let piper_bin = env("PERSONA_VOICE_PIPER")
            .or(fc.engines.piper)
            .unwrap_or_else(|| "piper".to_string());
        let ffmpeg_bin = env("PERSONA_VOICE_FFMPEG")
            .or(fc.engines.ffmpeg)
            .unwrap_or_else(|| "ffmpeg".to_string());
        let ffplay_bin = env("PERSONA_VOICE_FFPLAY")
            .or(fc.engines.ffplay)
            .unwrap_or_else(|| "ffplay".to_string());

        let engine_timeout = Duration::from_secs(
            env_u64("PERSONA_VOICE_ENGINE_TIMEOUT_SECS")
                .or(fc.engines.timeout_secs)
                .unwrap_or(DEFAULT_ENGINE_TIMEOUT_SECS),
        );

        // Models dir (~/.local/share/persona-voice/models on Linux)
        let models_dir = env("PERSONA_VOICE_MODELS_DIR")
            .or(fc.voice.models_dir)
            .map_or_else(|| data_dir().join("models"), PathBuf::from);

        let model = env("PERSONA_VOICE_MODEL")
            .or(fc.voice.model)
            .filter(|m| !m.trim().is_empty())
            .map(|m| resolve_model(&m, &models_dir));

        // Cache dir (~/.cache/persona-voice/audio on Linux)
        let cache_dir = env("PERSONA_VOICE_CACHE_DIR")
            .or(fc.cache.dir)
            .map_or_else(default_cache_dir, PathBuf::from);

        let defaults = PrunePolicy::default();
        let prune = PrunePolicy {
            max_age: env_u64("PERSONA_VOICE_CACHE_MAX_AGE_SECS")
                .or(fc.cache.max_age_secs)
                .map_or(defaults.max_age, Duration::from_secs),
            max_total_bytes: env_u64("PERSONA_VOICE_CACHE_MAX_BYTES")
                .or(fc.cache.max_total_bytes)
                .unwrap_or(defaults.max_total_bytes),
            interval: env_u64("PERSONA_VOICE_PRUNE_INTERVAL_SECS")
                .or(fc.cache.prune_interval_secs)
                .map_or(defaults.interval, Duration::from_secs),
        };

        let personas_dir = env("PERSONA_VOICE_PERSONAS_DIR")
            .or(fc.personas.dir)
            .map_or_else(|| data_dir().join("personas"), PathBuf::from);

        let persona = env("PERSONA_VOICE_PERSONA")
            .or(fc.persona)
            .filter(|p| !p.trim().is_empty());

        let use_authentic_samples = env("PERSONA_VOICE_AUTHENTIC_SAMPLES")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .or(fc.voice.use_authentic_samples);

        Self {
            piper_bin: PathBuf::from(piper_bin),
            ffmpeg_bin: PathBuf::from(ffmpeg_bin),
            ffplay_bin: PathBuf::from(ffplay_bin),
            model,
            models_dir,
            cache_dir,
            prune,
            engine_timeout,
            personas_dir,
            persona,
            use_authentic_samples,
        }
    }

    /// Directory of the active persona, if one is selected
    #[must_use]
    pub fn persona_dir(&self) -> Option<PathBuf> {
        self.persona.as_ref().map(|p| self.personas_dir.join(p))
    }

    /// Resolve the active persona into a voice profile
    ///
    /// # Errors
    ///
    /// Returns error if the persona directory cannot be loaded
    pub fn load_profile(&self) -> Result<VoiceProfile> {
        let mut profile = match self.persona_dir() {
            Some(dir) => VoiceProfile::from_config(&PersonaConfig::load_dir(&dir)?)?,
            None => VoiceProfile::default(),
        };

        if let Some(enabled) = self.use_authentic_samples {
            profile.samples = std::mem::take(&mut profile.samples).with_enabled(enabled);
        }

        Ok(profile)
    }

    /// Report which external binaries resolve on `PATH`
    #[must_use]
    pub fn check_dependencies(&self) -> Vec<Dependency> {
        [
            ("piper", &self.piper_bin),
            ("ffmpeg", &self.ffmpeg_bin),
            ("ffplay", &self.ffplay_bin),
        ]
        .into_iter()
        .map(|(name, binary)| Dependency {
            name,
            binary: binary.clone(),
            resolved: which::which(binary).ok(),
        })
        .collect()
    }
}

/// Resolve a model setting to a file
///
/// An existing path is used as-is; otherwise `<models_dir>/<name>` and then
/// `<models_dir>/<name>.onnx` are tried. When nothing exists the value is
/// returned unchanged so synthesis reports the missing file.
#[must_use]
pub fn resolve_model(value: &str, models_dir: &Path) -> PathBuf {
    let direct = PathBuf::from(value);
    if direct.is_file() {
        return direct;
    }

    let named = models_dir.join(value);
    if named.is_file() {
        return named;
    }

    let with_ext = models_dir.join(format!("{value}.{MODEL_EXTENSION}"));
    if with_ext.is_file() {
        return with_ext;
    }

    tracing::debug!(model = value, models_dir = %models_dir.display(), "voice model not found");
    direct
}

fn data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/persona-voice"),
        |d| d.data_dir().join("persona-voice"),
    )
}

fn default_cache_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".cache/persona-voice/audio"),
        |d| d.cache_dir().join("persona-voice").join("audio"),
    )
}
