//! Voice output
//!
//! Text is normalized, synthesized by an external speech engine, styled by
//! an external effects engine, cached on disk, composed with optional
//! persona segments and played by an external player.

mod cache;
mod chance;
mod compose;
mod effects;
mod pipeline;
mod playback;
mod process;
mod samples;
mod synth;
mod text;

pub use cache::{AudioCache, CacheKey, PrunePolicy, PruneReport};
pub use chance::{ChanceSource, ThreadRngChance};
pub use compose::Composer;
pub use effects::{
    BASE_SAMPLE_RATE, DEFAULT_STYLE, EffectParams, EffectRenderer, EffectsEngine, FfmpegEngine,
    SARCASTIC_PITCH, SARCASTIC_SPEED, SIGNATURE_PITCH, SIGNATURE_SPEED, Style, Variant,
    filter_graph,
};
pub use pipeline::{Engines, SegmentKind, SpeakRequest, Utterance, VoicePipeline};
pub use playback::{FfplayPlayer, MediaPlayer, PlaybackDispatcher};
pub use samples::{DROID_SAMPLE_PHRASES, DROID_SAMPLES_DIR, SampleLibrary};
pub use synth::{PiperEngine, SpeechEngine, Synthesizer};
pub use text::normalize;
