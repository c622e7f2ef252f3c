//! TOML configuration file loading
//!
//! Supports `~/.config/persona-voice/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.
//!
//! ```toml
//! persona = "droid"
//!
//! [engines]
//! piper = "/usr/local/bin/piper"
//! timeout_secs = 30
//!
//! [voice]
//! model = "en_US-ryan-high"
//!
//! [cache]
//! max_age_secs = 604800
//! max_total_bytes = 104857600
//! ```

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Active persona directory name
    #[serde(default)]
    pub persona: Option<String>,

    /// External engine binaries
    #[serde(default)]
    pub engines: EnginesFileConfig,

    /// Voice model and sample settings
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Audio cache location and limits
    #[serde(default)]
    pub cache: CacheFileConfig,

    /// Persona lookup
    #[serde(default)]
    pub personas: PersonasFileConfig,
}

/// External engine configuration
#[derive(Debug, Default, Deserialize)]
pub struct EnginesFileConfig {
    /// Speech synthesis binary (e.g. "piper")
    pub piper: Option<String>,

    /// Audio effects binary (e.g. "ffmpeg")
    pub ffmpeg: Option<String>,

    /// Media player binary (e.g. "ffplay")
    pub ffplay: Option<String>,

    /// Per-invocation timeout for synthesis and effects
    pub timeout_secs: Option<u64>,
}

/// Voice configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Model path, or a model name looked up in `models_dir`
    pub model: Option<String>,

    /// Directory holding voice models
    pub models_dir: Option<String>,

    /// Play authentic clips instead of synthesizing known phrases
    pub use_authentic_samples: Option<bool>,
}

/// Cache configuration
#[derive(Debug, Default, Deserialize)]
pub struct CacheFileConfig {
    pub dir: Option<String>,
    pub max_age_secs: Option<u64>,
    pub max_total_bytes: Option<u64>,
    pub prune_interval_secs: Option<u64>,
}

/// Persona directory configuration
#[derive(Debug, Default, Deserialize)]
pub struct PersonasFileConfig {
    /// Directory containing one subdirectory per persona
    pub dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/persona-voice/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("persona-voice").join("config.toml"))
}
