//! Persona Voice - persona-driven voice output
//!
//! This library turns text into styled, persona-flavoured speech:
//! - Text normalization (pictographs and markdown stripped)
//! - Synthesis and effects through external engines (piper, ffmpeg)
//! - A content-addressed, pruned waveform cache
//! - Signature, sarcastic intro and authentic-sample segments
//! - Blocking or detached playback (ffplay)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Callers                         │
//! │        CLI  │  announce  │  preload  │  ...         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 VoicePipeline                       │
//! │  Normalize │ Cache │ Synthesize │ Effects │ Compose │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               External engines                      │
//! │        piper  │  ffmpeg  │  ffplay                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod persona;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use persona::{PersonaConfig, PersonaState, VoiceProfile};
pub use voice::{SpeakRequest, Style, Utterance, VoicePipeline};
