//! Style rendering through an external audio-effects engine
//!
//! Every style owns one filter template. The three renderings of a style
//! (normal, sarcastic, signature) share that template and differ only in the
//! tempo and pitch they substitute.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::process;
use crate::{Error, Result};

/// Sample rate every rendering is resampled to
pub const BASE_SAMPLE_RATE: u32 = 44_100;

/// Style used whenever a requested style name is not recognized
pub const DEFAULT_STYLE: Style = Style::Droid;

/// Fixed tempo for sarcastic interjections
pub const SARCASTIC_SPEED: f32 = 0.85;

/// Fixed pitch for sarcastic interjections
pub const SARCASTIC_PITCH: f32 = 1.3;

/// Fixed tempo for the signature phrase (lowest `atempo` accepts)
pub const SIGNATURE_SPEED: f32 = 0.5;

/// Fixed pitch for the signature phrase
pub const SIGNATURE_PITCH: f32 = 0.5;

/// Named acoustic rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Style {
    /// Plain voice, only tempo/pitch/volume
    Clean,
    /// Battle-droid: band-limited, crushed, tremolo and metallic echo
    Droid,
    /// Radio transmission
    Radio,
    /// PA / intercom
    PaSystem,
}

impl Style {
    /// All known styles
    pub const ALL: [Self; 4] = [Self::Clean, Self::Droid, Self::Radio, Self::PaSystem];

    /// Canonical name, also used as the cache file prefix
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Droid => "droid",
            Self::Radio => "radio",
            Self::PaSystem => "pa_system",
        }
    }

    /// Resolve a style name, degrading to [`DEFAULT_STYLE`] when unknown
    #[must_use]
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(
                style = name,
                fallback = DEFAULT_STYLE.name(),
                "unknown voice style, using default"
            );
            DEFAULT_STYLE
        })
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Style {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|style| style.name() == normalized)
            .ok_or_else(|| Error::Config(format!("unknown voice style: {s}")))
    }
}

impl From<String> for Style {
    fn from(name: String) -> Self {
        Self::resolve(&name)
    }
}

impl From<Style> for String {
    fn from(style: Style) -> Self {
        style.name().to_string()
    }
}

/// Which rendering of a style to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Persona speed and pitch
    Normal,
    /// Exaggerated, mocking delivery
    Sarcastic,
    /// Slowed, deepened signature phrase
    Signature,
}

impl Variant {
    /// Stable name used in cache keys
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Sarcastic => "sarcastic",
            Self::Signature => "signature",
        }
    }

    /// Tempo and pitch this variant substitutes into the style template
    #[must_use]
    pub const fn tempo_pitch(self, params: &EffectParams) -> (f32, f32) {
        match self {
            Self::Normal => (params.speed, params.pitch),
            Self::Sarcastic => (SARCASTIC_SPEED, SARCASTIC_PITCH),
            Self::Signature => (SIGNATURE_SPEED, SIGNATURE_PITCH),
        }
    }
}

/// Tunable acoustic parameters of a persona
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    pub bit_depth: u32,
    pub bit_mix: f32,
    pub tremolo_freq: f32,
    pub tremolo_depth: f32,
    pub compression_ratio: f32,
    pub highpass_freq: f32,
    pub lowpass_freq: f32,
    pub echo_gain: f32,
    pub vibrato_freq: f32,
    pub vibrato_depth: f32,
    pub speed: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            bit_depth: 8,
            bit_mix: 0.5,
            tremolo_freq: 120.0,
            tremolo_depth: 0.18,
            compression_ratio: 8.0,
            highpass_freq: 200.0,
            lowpass_freq: 2500.0,
            echo_gain: 0.4,
            vibrato_freq: 5.0,
            vibrato_depth: 0.2,
            speed: 0.85,
            pitch: 0.80,
            volume: 1.0,
        }
    }
}

impl EffectParams {
    /// Canonical text form covering every parameter, used for cache keys
    ///
    /// Floats use their shortest round-trip form so any change is visible.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!(
            "bits={}:mix={}:trem_f={}:trem_d={}:ratio={}:hp={}:lp={}:echo={}:vib_f={}:vib_d={}:speed={}:pitch={}:vol={}",
            self.bit_depth,
            self.bit_mix,
            self.tremolo_freq,
            self.tremolo_depth,
            self.compression_ratio,
            self.highpass_freq,
            self.lowpass_freq,
            self.echo_gain,
            self.vibrato_freq,
            self.vibrato_depth,
            self.speed,
            self.pitch,
            self.volume,
        )
    }

    /// Check that every parameter is usable by the effects engine
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending parameter
    pub fn validate(&self) -> Result<()> {
        fn check(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
            if value.is_finite() && (min..=max).contains(&value) {
                Ok(())
            } else {
                Err(Error::Config(format!(
                    "{name} must be between {min} and {max}, got {value}"
                )))
            }
        }

        if !(1..=64).contains(&self.bit_depth) {
            return Err(Error::Config(format!(
                "bit_depth must be between 1 and 64, got {}",
                self.bit_depth
            )));
        }
        check("bit_mix", self.bit_mix, 0.0, 1.0)?;
        check("tremolo_freq", self.tremolo_freq, 0.1, 20_000.0)?;
        check("tremolo_depth", self.tremolo_depth, 0.0, 1.0)?;
        check("compression_ratio", self.compression_ratio, 1.0, 20.0)?;
        check("highpass_freq", self.highpass_freq, 1.0, 20_000.0)?;
        check("lowpass_freq", self.lowpass_freq, 1.0, 20_000.0)?;
        check("echo_gain", self.echo_gain, 0.0, 1.0)?;
        check("vibrato_freq", self.vibrato_freq, 0.1, 20_000.0)?;
        check("vibrato_depth", self.vibrato_depth, 0.0, 1.0)?;
        check("speed", self.speed, 0.5, 100.0)?;
        check("pitch", self.pitch, 0.1, 10.0)?;
        check("volume", self.volume, 0.0, 10.0)?;
        Ok(())
    }
}

/// A persona parameter a filter stage can read
#[derive(Debug, Clone, Copy)]
enum Param {
    BitDepth,
    BitMix,
    TremoloFreq,
    TremoloDepth,
    CompressionRatio,
    HighpassFreq,
    LowpassFreq,
    EchoGain,
    VibratoFreq,
    VibratoDepth,
}

/// Either a constant baked into the template or a persona parameter
#[derive(Debug, Clone, Copy)]
enum Value {
    Fixed(f32),
    Param(Param),
}

impl Value {
    #[allow(clippy::cast_precision_loss)]
    const fn get(self, params: &EffectParams) -> f32 {
        match self {
            Self::Fixed(v) => v,
            Self::Param(p) => match p {
                Param::BitDepth => params.bit_depth as f32,
                Param::BitMix => params.bit_mix,
                Param::TremoloFreq => params.tremolo_freq,
                Param::TremoloDepth => params.tremolo_depth,
                Param::CompressionRatio => params.compression_ratio,
                Param::HighpassFreq => params.highpass_freq,
                Param::LowpassFreq => params.lowpass_freq,
                Param::EchoGain => params.echo_gain,
                Param::VibratoFreq => params.vibrato_freq,
                Param::VibratoDepth => params.vibrato_depth,
            },
        }
    }
}

/// One filter in a style template
#[derive(Debug, Clone, Copy)]
enum Stage {
    /// Variant tempo
    Tempo,
    /// Variant pitch (rate shift then resample back)
    Pitch,
    Highpass(Value),
    Lowpass(Value),
    Compressor {
        threshold_db: i32,
        ratio: Value,
        attack_ms: u32,
        release_ms: u32,
    },
    Crusher {
        bits: Value,
        mix: Value,
    },
    Tremolo {
        freq: Value,
        depth: Value,
    },
    Echo {
        in_gain: f32,
        out_gain: f32,
        delay_ms: u32,
        decay: Value,
    },
    Vibrato {
        freq: Value,
        depth: Value,
    },
    /// Persona volume
    Volume,
    Limiter(f32),
}

const fn p(param: Param) -> Value {
    Value::Param(param)
}

const fn fixed(v: f32) -> Value {
    Value::Fixed(v)
}

const CLEAN_TEMPLATE: &[Stage] = &[Stage::Tempo, Stage::Pitch, Stage::Volume];

const DROID_TEMPLATE: &[Stage] = &[
    Stage::Tempo,
    Stage::Pitch,
    Stage::Highpass(p(Param::HighpassFreq)),
    Stage::Lowpass(p(Param::LowpassFreq)),
    Stage::Compressor {
        threshold_db: -20,
        ratio: p(Param::CompressionRatio),
        attack_ms: 1,
        release_ms: 30,
    },
    Stage::Crusher {
        bits: p(Param::BitDepth),
        mix: p(Param::BitMix),
    },
    Stage::Tremolo {
        freq: p(Param::TremoloFreq),
        depth: p(Param::TremoloDepth),
    },
    Stage::Echo {
        in_gain: 0.8,
        out_gain: 0.5,
        delay_ms: 20,
        decay: p(Param::EchoGain),
    },
    Stage::Vibrato {
        freq: p(Param::VibratoFreq),
        depth: p(Param::VibratoDepth),
    },
    Stage::Highpass(fixed(180.0)),
    Stage::Volume,
    Stage::Limiter(0.9),
];

const RADIO_TEMPLATE: &[Stage] = &[
    Stage::Tempo,
    Stage::Pitch,
    Stage::Highpass(fixed(300.0)),
    Stage::Lowpass(fixed(3000.0)),
    Stage::Compressor {
        threshold_db: -14,
        ratio: fixed(3.0),
        attack_ms: 5,
        release_ms: 80,
    },
    Stage::Crusher {
        bits: fixed(12.0),
        mix: fixed(0.2),
    },
    Stage::Echo {
        in_gain: 0.7,
        out_gain: 0.5,
        delay_ms: 15,
        decay: fixed(0.15),
    },
    Stage::Volume,
];

const PA_SYSTEM_TEMPLATE: &[Stage] = &[
    Stage::Tempo,
    Stage::Pitch,
    Stage::Highpass(fixed(250.0)),
    Stage::Lowpass(fixed(4000.0)),
    Stage::Compressor {
        threshold_db: -12,
        ratio: fixed(2.5),
        attack_ms: 10,
        release_ms: 100,
    },
    Stage::Echo {
        in_gain: 0.9,
        out_gain: 0.8,
        delay_ms: 40,
        decay: fixed(0.3),
    },
    Stage::Volume,
];

const fn template(style: Style) -> &'static [Stage] {
    match style {
        Style::Clean => CLEAN_TEMPLATE,
        Style::Droid => DROID_TEMPLATE,
        Style::Radio => RADIO_TEMPLATE,
        Style::PaSystem => PA_SYSTEM_TEMPLATE,
    }
}

#[allow(clippy::float_cmp)]
fn render_stage(stage: Stage, tempo: f32, pitch: f32, params: &EffectParams) -> Option<String> {
    let filter = match stage {
        Stage::Tempo if tempo == 1.0 => return None,
        Stage::Tempo => format!("atempo={tempo}"),
        Stage::Pitch if pitch == 1.0 => format!("aresample={BASE_SAMPLE_RATE}"),
        Stage::Pitch => format!(
            "asetrate={BASE_SAMPLE_RATE}*{pitch},aresample={BASE_SAMPLE_RATE}"
        ),
        Stage::Highpass(f) => format!("highpass=f={}", f.get(params)),
        Stage::Lowpass(f) => format!("lowpass=f={}", f.get(params)),
        Stage::Compressor {
            threshold_db,
            ratio,
            attack_ms,
            release_ms,
        } => format!(
            "acompressor=threshold={threshold_db}dB:ratio={}:attack={attack_ms}:release={release_ms}",
            ratio.get(params)
        ),
        Stage::Crusher { bits, mix } => {
            format!("acrusher=bits={}:mix={}", bits.get(params), mix.get(params))
        }
        Stage::Tremolo { freq, depth } => {
            format!("tremolo=f={}:d={}", freq.get(params), depth.get(params))
        }
        Stage::Echo {
            in_gain,
            out_gain,
            delay_ms,
            decay,
        } => format!("aecho={in_gain}:{out_gain}:{delay_ms}:{}", decay.get(params)),
        Stage::Vibrato { freq, depth } => {
            format!("vibrato=f={}:d={}", freq.get(params), depth.get(params))
        }
        Stage::Volume if params.volume == 1.0 => return None,
        Stage::Volume => format!("volume={}", params.volume),
        Stage::Limiter(limit) => format!("alimiter=limit={limit}"),
    };
    Some(filter)
}

/// Build the filter graph for a style rendering
///
/// Unit tempo and volume stages are omitted. Every graph resamples to
/// [`BASE_SAMPLE_RATE`] so segments can be joined without re-encoding; at
/// unit pitch only the resample remains.
#[must_use]
pub fn filter_graph(style: Style, variant: Variant, params: &EffectParams) -> String {
    let (tempo, pitch) = variant.tempo_pitch(params);
    template(style)
        .iter()
        .filter_map(|stage| render_stage(*stage, tempo, pitch, params))
        .collect::<Vec<_>>()
        .join(",")
}

fn resample_only() -> String {
    format!("aresample={BASE_SAMPLE_RATE}")
}

/// Sample rate from a waveform header, `None` if unreadable
fn sample_rate(path: &Path) -> Option<u32> {
    hound::WavReader::open(path)
        .ok()
        .map(|reader| reader.spec().sample_rate)
}

/// External audio-effects engine
#[async_trait]
pub trait EffectsEngine: Send + Sync {
    /// Apply a filter graph to `input`, writing `output`
    ///
    /// # Errors
    ///
    /// Returns `Error::Effect` if the engine fails
    async fn apply(&self, input: &Path, filter_graph: &str, output: &Path) -> Result<()>;

    /// Losslessly concatenate the files named in `list_file`, writing `output`
    ///
    /// # Errors
    ///
    /// Returns `Error::Composition` if the engine fails
    async fn concat(&self, list_file: &Path, output: &Path) -> Result<()>;
}

/// `ffmpeg` invoked as a child process
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegEngine {
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
impl EffectsEngine for FfmpegEngine {
    async fn apply(&self, input: &Path, filter_graph: &str, output: &Path) -> Result<()> {
        let args: [&OsStr; 6] = [
            "-y".as_ref(),
            "-i".as_ref(),
            input.as_os_str(),
            "-af".as_ref(),
            filter_graph.as_ref(),
            output.as_os_str(),
        ];

        let out = process::run(&self.binary, args, None, Some(self.timeout))
            .await
            .map_err(Error::Effect)?;

        if !out.status.success() {
            return Err(Error::Effect(format!(
                "ffmpeg {}",
                process::describe_failure(&out)
            )));
        }

        tracing::debug!(output = %output.display(), "applied effects");
        Ok(())
    }

    async fn concat(&self, list_file: &Path, output: &Path) -> Result<()> {
        let args: [&OsStr; 10] = [
            "-y".as_ref(),
            "-f".as_ref(),
            "concat".as_ref(),
            "-safe".as_ref(),
            "0".as_ref(),
            "-i".as_ref(),
            list_file.as_os_str(),
            "-c".as_ref(),
            "copy".as_ref(),
            output.as_os_str(),
        ];

        let out = process::run(&self.binary, args, None, Some(self.timeout))
            .await
            .map_err(Error::Composition)?;

        if !out.status.success() {
            return Err(Error::Composition(format!(
                "ffmpeg concat {}",
                process::describe_failure(&out)
            )));
        }

        Ok(())
    }
}

/// Turns raw synthesized speech into a styled waveform
#[derive(Clone)]
pub struct EffectRenderer {
    engine: Arc<dyn EffectsEngine>,
}

impl EffectRenderer {
    /// Create a renderer on top of an effects engine
    #[must_use]
    pub fn new(engine: Arc<dyn EffectsEngine>) -> Self {
        Self { engine }
    }

    /// Render `raw` in the given style and variant, writing `output`
    ///
    /// A graph that would only resample copies the waveform through when it
    /// is already at [`BASE_SAMPLE_RATE`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Effect` if the engine fails or the copy fails
    pub async fn render(
        &self,
        raw: &Path,
        style: Style,
        variant: Variant,
        params: &EffectParams,
        output: &Path,
    ) -> Result<()> {
        let graph = filter_graph(style, variant, params);

        if graph == resample_only() && sample_rate(raw) == Some(BASE_SAMPLE_RATE) {
            tokio::fs::copy(raw, output)
                .await
                .map_err(|e| Error::Effect(format!("failed to copy clean waveform: {e}")))?;
            return Ok(());
        }

        tracing::trace!(style = %style, variant = variant.name(), graph = %graph, "rendering");
        self.engine.apply(raw, &graph, output).await
    }
}
