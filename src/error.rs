//! Error types for the voice pipeline

use thiserror::Error;

/// Result type alias for voice pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while producing or playing speech
#[derive(Debug, Error)]
pub enum Error {
    /// Nothing left to say after text normalization
    #[error("no speakable text after normalization")]
    EmptyInput,

    /// Synthesis model missing or not configured
    #[error("voice model not configured: {0}")]
    ModelNotConfigured(String),

    /// Text-to-speech engine failure
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio effects engine failure
    #[error("effect error: {0}")]
    Effect(String),

    /// Concatenation of segments failed
    #[error("composition error: {0}")]
    Composition(String),

    /// Composition requested with no segments
    #[error("no audio segments to compose")]
    NoAudio,

    /// Media player failure
    #[error("playback error: {0}")]
    Playback(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Persona document could not be loaded
    #[error("persona error: {0}")]
    Persona(String),

    /// Audio cache error
    #[error("cache error: {0}")]
    Cache(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Waveform parsing error
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
