//! Text-to-speech through an external synthesis engine

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::process;
use crate::{Error, Result};

/// Maximum text input size for synthesis (64 KiB)
const MAX_TEXT_BYTES: usize = 64 * 1024;

/// External speech synthesis engine
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Speak `text` with `model`, writing a mono PCM waveform to `output`
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` if the engine fails
    async fn synthesize(&self, text: &str, model: &Path, output: &Path) -> Result<()>;
}

/// Piper invoked as a child process, reading text on stdin
#[derive(Debug, Clone)]
pub struct PiperEngine {
    binary: PathBuf,
    timeout: Duration,
}

impl PiperEngine {
    /// Create an engine running `binary` with a per-invocation timeout
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SpeechEngine for PiperEngine {
    async fn synthesize(&self, text: &str, model: &Path, output: &Path) -> Result<()> {
        let args: [&OsStr; 4] = [
            "-m".as_ref(),
            model.as_os_str(),
            "-f".as_ref(),
            output.as_os_str(),
        ];

        let out = process::run(&self.binary, args, Some(text.as_bytes()), Some(self.timeout))
            .await
            .map_err(Error::Synthesis)?;

        if !out.status.success() {
            return Err(Error::Synthesis(format!(
                "piper {}",
                process::describe_failure(&out)
            )));
        }

        Ok(())
    }
}

/// Synthesis adapter bound to one voice model
#[derive(Clone)]
pub struct Synthesizer {
    engine: Arc<dyn SpeechEngine>,
    model: Option<PathBuf>,
}

impl Synthesizer {
    /// Create an adapter; `model` may be absent, in which case every call
    /// fails with `Error::ModelNotConfigured`
    #[must_use]
    pub fn new(engine: Arc<dyn SpeechEngine>, model: Option<PathBuf>) -> Self {
        Self { engine, model }
    }

    /// The configured voice model path
    #[must_use]
    pub fn model(&self) -> Option<&Path> {
        self.model.as_deref()
    }

    /// Synthesize `text` into `output`
    ///
    /// The engine must exit cleanly and leave a single-channel PCM waveform
    /// at `output`. Never retries and never substitutes another model.
    ///
    /// # Errors
    ///
    /// Returns `Error::ModelNotConfigured` if the model is missing, or
    /// `Error::Synthesis` if the engine fails or its output is malformed
    pub async fn synthesize(&self, text: &str, output: &Path) -> Result<()> {
        let model = self.require_model()?;

        if text.len() > MAX_TEXT_BYTES {
            return Err(Error::Synthesis(format!(
                "text exceeds maximum size: {} bytes (limit: {MAX_TEXT_BYTES} bytes)",
                text.len()
            )));
        }

        tracing::debug!(model = %model.display(), output = %output.display(), "synthesizing");
        self.engine.synthesize(text, model, output).await?;

        check_waveform(output)
    }

    fn require_model(&self) -> Result<&Path> {
        let model = self
            .model
            .as_deref()
            .filter(|m| !m.as_os_str().is_empty())
            .ok_or_else(|| Error::ModelNotConfigured("no voice model path configured".to_string()))?;

        if !model.is_file() {
            return Err(Error::ModelNotConfigured(format!(
                "model file not found: {}",
                model.display()
            )));
        }

        Ok(model)
    }
}

/// Verify that `path` holds a mono PCM waveform
fn check_waveform(path: &Path) -> Result<()> {
    let reader = hound::WavReader::open(path).map_err(|e| {
        Error::Synthesis(format!("malformed output {}: {e}", path.display()))
    })?;

    let spec = reader.spec();
    if spec.channels != 1 || spec.sample_format != hound::SampleFormat::Int {
        return Err(Error::Synthesis(format!(
            "malformed output {}: expected mono PCM, got {} channel(s) {:?}",
            path.display(),
            spec.channels,
            spec.sample_format
        )));
    }

    Ok(())
}
