//! Persona configuration and runtime voice state
//!
//! A persona lives in its own directory: `skin.yaml` carries identity and
//! voice settings, an optional `quotes.json` carries phrase collections.
//!
//! ```yaml
//! identity:
//!   name: droid
//!   wake_words: [rogr, roger]
//!   signature_phrase: roger, roger
//! voice:
//!   style: droid
//!   speed: 0.85
//!   pitch: 0.8
//!   effects:
//!     bit_depth: 8
//!     echo_gain: 0.4
//!   samples_dir: samples
//!   signature: { enabled: true, chance: 0.3 }
//!   sarcasm: { enabled: false, chance: 0.4 }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::voice::{DEFAULT_STYLE, DROID_SAMPLES_DIR, EffectParams, SampleLibrary, Style};
use crate::{Error, Result};

/// Persona settings file inside a persona directory
pub const SKIN_FILE: &str = "skin.yaml";

/// Optional phrase collections inside a persona directory
pub const QUOTES_FILE: &str = "quotes.json";

/// Signature used when a persona does not name one
pub const DEFAULT_SIGNATURE_PHRASE: &str = "Acknowledged.";

/// Interjections the droid persona opens with
pub const DEFAULT_SARCASTIC_INTROS: &[&str] = &[
    "Oh great, more work.",
    "Well, I guess I'm in charge now.",
    "This should be fun.",
    "As if I have a choice.",
    "Uh, roger roger.",
    "Copy that, I suppose.",
    "Yeah, yeah, roger roger.",
    "Oh joy, another task.",
];

const DEFAULT_SIGNATURE_CHANCE: f64 = 0.3;
const DEFAULT_SARCASM_CHANCE: f64 = 0.4;

/// Persona document as stored on disk
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Who the persona is
    pub identity: IdentityConfig,

    /// How the persona sounds
    pub voice: VoiceConfig,

    /// Phrase collections, usually from `quotes.json`
    pub quotes: QuotesConfig,
}

/// Identity section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Persona name; also the fallback wake word
    pub name: Option<String>,

    /// Words that address the persona
    pub wake_words: Option<Vec<String>>,

    /// Phrase prepended to responses
    pub signature_phrase: Option<String>,
}

/// Voice section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Style name; unknown names fall back to the default style
    pub style: Option<String>,

    /// Tempo multiplier for normal renderings
    pub speed: Option<f32>,

    /// Pitch multiplier for normal renderings
    pub pitch: Option<f32>,

    /// Full effect parameter set; missing fields take droid defaults
    pub effects: Option<EffectParams>,

    /// Directory holding authentic sample clips
    pub samples_dir: Option<PathBuf>,

    /// Phrase to clip file name
    pub sample_phrases: Option<HashMap<String, String>>,

    /// Whether sample clips replace synthesis when they match
    pub use_authentic_samples: Option<bool>,

    /// Signature segment behaviour
    pub signature: SegmentConfig,

    /// Sarcastic intro behaviour
    pub sarcasm: SegmentConfig,
}

/// Toggle and probability of an optional segment
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub enabled: Option<bool>,
    pub chance: Option<f64>,
}

/// Phrase collections
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct QuotesConfig {
    pub sarcastic_intros: Option<Vec<String>>,
}

impl PersonaConfig {
    /// Load a persona directory
    ///
    /// A relative `voice.samples_dir` is resolved against `dir`.
    ///
    /// # Errors
    ///
    /// Returns error if `skin.yaml` is missing or either file fails to parse
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let skin_path = dir.join(SKIN_FILE);
        if !skin_path.is_file() {
            return Err(Error::Persona(format!(
                "persona config not found: {}",
                skin_path.display()
            )));
        }

        let content = std::fs::read_to_string(&skin_path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;

        let quotes_path = dir.join(QUOTES_FILE);
        if quotes_path.is_file() {
            let content = std::fs::read_to_string(&quotes_path)?;
            let quotes: QuotesConfig = serde_json::from_str(&content)?;
            if quotes.sarcastic_intros.is_some() {
                config.quotes.sarcastic_intros = quotes.sarcastic_intros;
            }
        }

        if config.identity.name.is_none() {
            config.identity.name = dir.file_name().map(|n| n.to_string_lossy().into_owned());
        }

        if let Some(samples_dir) = &config.voice.samples_dir
            && samples_dir.is_relative()
        {
            config.voice.samples_dir = Some(dir.join(samples_dir));
        }

        tracing::debug!(path = %dir.display(), name = ?config.identity.name, "loaded persona");
        Ok(config)
    }
}

/// Resolved voice settings of the active persona
#[derive(Debug, Clone)]
pub struct VoiceProfile {
    pub name: String,
    pub wake_words: Vec<String>,
    pub signature_phrase: String,
    pub style: Style,
    pub params: EffectParams,
    pub samples: SampleLibrary,
    pub sarcastic_intros: Vec<String>,
    pub signature_enabled: bool,
    pub signature_chance: f64,
    pub sarcasm_enabled: bool,
    pub sarcasm_chance: f64,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            name: "droid".to_string(),
            wake_words: vec!["rogr".to_string(), "roger".to_string()],
            signature_phrase: "roger, roger".to_string(),
            style: DEFAULT_STYLE,
            params: EffectParams::default(),
            samples: SampleLibrary::droid(DROID_SAMPLES_DIR),
            sarcastic_intros: DEFAULT_SARCASTIC_INTROS
                .iter()
                .map(ToString::to_string)
                .collect(),
            signature_enabled: true,
            signature_chance: DEFAULT_SIGNATURE_CHANCE,
            sarcasm_enabled: false,
            sarcasm_chance: DEFAULT_SARCASM_CHANCE,
        }
    }
}

impl VoiceProfile {
    /// Resolve a persona document, filling gaps with droid defaults
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if an effect parameter or segment chance is
    /// out of range
    pub fn from_config(config: &PersonaConfig) -> Result<Self> {
        let defaults = Self::default();
        let voice = &config.voice;

        let name = config
            .identity
            .name
            .clone()
            .unwrap_or_else(|| defaults.name.clone());

        let wake_words = config
            .identity
            .wake_words
            .clone()
            .filter(|w| !w.is_empty())
            .unwrap_or_else(|| vec![name.clone()]);

        let signature_phrase = config
            .identity
            .signature_phrase
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SIGNATURE_PHRASE.to_string());

        let style = voice
            .style
            .as_deref()
            .map_or(DEFAULT_STYLE, Style::resolve);

        let mut params = voice.effects.unwrap_or_default();
        if let Some(speed) = voice.speed {
            params.speed = speed;
        }
        if let Some(pitch) = voice.pitch {
            params.pitch = pitch;
        }
        params.validate()?;

        let signature_chance = voice.signature.chance.unwrap_or(defaults.signature_chance);
        let sarcasm_chance = voice.sarcasm.chance.unwrap_or(defaults.sarcasm_chance);
        check_chance("signature.chance", signature_chance)?;
        check_chance("sarcasm.chance", sarcasm_chance)?;

        let samples_dir = voice
            .samples_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DROID_SAMPLES_DIR));
        let enabled = voice.use_authentic_samples.unwrap_or(true);
        let samples = match &voice.sample_phrases {
            Some(phrases) => SampleLibrary::new(samples_dir, phrases.clone(), enabled),
            None => SampleLibrary::droid(samples_dir).with_enabled(enabled),
        };

        let sarcastic_intros = config
            .quotes
            .sarcastic_intros
            .clone()
            .unwrap_or(defaults.sarcastic_intros);

        Ok(Self {
            name,
            wake_words,
            signature_phrase,
            style,
            params,
            samples,
            sarcastic_intros,
            signature_enabled: voice.signature.enabled.unwrap_or(defaults.signature_enabled),
            signature_chance,
            sarcasm_enabled: voice.sarcasm.enabled.unwrap_or(defaults.sarcasm_enabled),
            sarcasm_chance,
        })
    }
}

fn check_chance(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{name} must be between 0 and 1, got {value}")))
    }
}

/// Hot-swappable holder of the active [`VoiceProfile`]
///
/// Readers take a snapshot, so a swap never changes settings under a
/// request already in flight.
#[derive(Debug, Default)]
pub struct PersonaState {
    current: RwLock<Arc<VoiceProfile>>,
    samples_override: Option<bool>,
}

impl PersonaState {
    /// Create state holding `profile`
    #[must_use]
    pub fn new(profile: VoiceProfile) -> Self {
        Self {
            current: RwLock::new(Arc::new(profile)),
            samples_override: None,
        }
    }

    /// Force authentic samples on or off for this and every later profile
    #[must_use]
    pub fn with_samples_override(mut self, enabled: Option<bool>) -> Self {
        self.samples_override = enabled;
        if let Some(enabled) = enabled {
            let current = self
                .current
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            let profile = Arc::make_mut(current);
            profile.samples = std::mem::take(&mut profile.samples).with_enabled(enabled);
        }
        self
    }

    /// The active profile
    #[must_use]
    pub fn snapshot(&self) -> Arc<VoiceProfile> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the active profile wholesale
    pub fn replace(&self, mut profile: VoiceProfile) {
        profile.samples = self.override_samples(std::mem::take(&mut profile.samples));
        tracing::info!(persona = %profile.name, style = %profile.style, "persona loaded");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(profile);
    }

    /// Resolve `config` and make it the active profile
    ///
    /// # Errors
    ///
    /// Returns error if the document does not resolve; the active profile
    /// is left untouched
    pub fn load_persona(&self, config: &PersonaConfig) -> Result<()> {
        let profile = VoiceProfile::from_config(config)?;
        self.replace(profile);
        Ok(())
    }

    fn override_samples(&self, samples: SampleLibrary) -> SampleLibrary {
        match self.samples_override {
            Some(enabled) => samples.with_enabled(enabled),
            None => samples,
        }
    }

    /// Turn sarcastic intros on or off for the active profile
    pub fn set_sarcasm(&self, enabled: bool) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut guard).sarcasm_enabled = enabled;
        tracing::debug!(enabled, "sarcasm toggled");
    }

    /// Whether `text` contains one of the persona's wake words
    #[must_use]
    pub fn is_addressed(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.snapshot()
            .wake_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .any(|w| !w.is_empty() && text.contains(&w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_persona(dir: &Path, skin: &str, quotes: Option<&str>) {
        std::fs::write(dir.join(SKIN_FILE), skin).unwrap();
        if let Some(quotes) = quotes {
            std::fs::write(dir.join(QUOTES_FILE), quotes).unwrap();
        }
    }

    #[test]
    fn test_default_profile_is_droid() {
        let profile = VoiceProfile::default();
        assert_eq!(profile.style, Style::Droid);
        assert_eq!(profile.signature_phrase, "roger, roger");
        assert_eq!(profile.wake_words, vec!["rogr", "roger"]);
        assert!(profile.signature_enabled);
        assert!(!profile.sarcasm_enabled);
        assert_eq!(profile.sarcastic_intros.len(), 8);
    }

    #[test]
    fn test_load_dir_full() {
        let dir = tempfile::tempdir().unwrap();
        write_persona(
            dir.path(),
            r"
identity:
  name: operator
  wake_words: [operator, ops]
  signature_phrase: Standing by.
voice:
  style: radio
  speed: 0.9
  effects:
    echo_gain: 0.3
  samples_dir: clips
  sample_phrases:
    Standing By: standing-by.wav
  sarcasm:
    enabled: true
    chance: 1.0
",
            Some(r#"{"sarcastic_intros": ["Fine."], "random_quotes": ["ignored"]}"#),
        );

        let config = PersonaConfig::load_dir(dir.path()).unwrap();
        assert_eq!(config.voice.samples_dir, Some(dir.path().join("clips")));

        let profile = VoiceProfile::from_config(&config).unwrap();
        assert_eq!(profile.name, "operator");
        assert_eq!(profile.wake_words, vec!["operator", "ops"]);
        assert_eq!(profile.signature_phrase, "Standing by.");
        assert_eq!(profile.style, Style::Radio);
        assert!((profile.params.speed - 0.9).abs() < f32::EPSILON);
        assert!((profile.params.echo_gain - 0.3).abs() < f32::EPSILON);
        assert_eq!(profile.params.bit_depth, EffectParams::default().bit_depth);
        assert_eq!(profile.sarcastic_intros, vec!["Fine."]);
        assert!(profile.sarcasm_enabled);
        assert_eq!(profile.samples.dir(), dir.path().join("clips"));
    }

    #[test]
    fn test_load_dir_minimal_defaults() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("butler");
        std::fs::create_dir(&dir).unwrap();
        write_persona(&dir, "voice:\n  style: nonexistent\n", None);

        let profile = VoiceProfile::from_config(&PersonaConfig::load_dir(&dir).unwrap()).unwrap();
        assert_eq!(profile.name, "butler");
        assert_eq!(profile.wake_words, vec!["butler"]);
        assert_eq!(profile.signature_phrase, DEFAULT_SIGNATURE_PHRASE);
        assert_eq!(profile.style, DEFAULT_STYLE);
    }

    #[test]
    fn test_load_dir_missing_skin() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PersonaConfig::load_dir(dir.path()),
            Err(Error::Persona(_))
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = PersonaConfig {
            voice: VoiceConfig {
                speed: Some(0.0),
                ..VoiceConfig::default()
            },
            ..PersonaConfig::default()
        };
        assert!(matches!(
            VoiceProfile::from_config(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_invalid_chance_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_persona(dir.path(), "voice:\n  signature:\n    chance: .nan\n", None);
        let config = PersonaConfig::load_dir(dir.path()).unwrap();
        assert!(config.voice.signature.chance.is_some_and(f64::is_nan));
        assert!(matches!(
            VoiceProfile::from_config(&config),
            Err(Error::Config(_))
        ));

        let config = PersonaConfig {
            voice: VoiceConfig {
                sarcasm: SegmentConfig {
                    enabled: Some(true),
                    chance: Some(1.5),
                },
                ..VoiceConfig::default()
            },
            ..PersonaConfig::default()
        };
        assert!(matches!(
            VoiceProfile::from_config(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_failed_load_keeps_active_profile() {
        let state = PersonaState::default();
        let bad = PersonaConfig {
            voice: VoiceConfig {
                speed: Some(-1.0),
                ..VoiceConfig::default()
            },
            ..PersonaConfig::default()
        };
        assert!(state.load_persona(&bad).is_err());
        assert_eq!(state.snapshot().name, "droid");
    }

    #[test]
    fn test_samples_override_survives_swap() {
        let state = PersonaState::default().with_samples_override(Some(false));
        assert!(!state.snapshot().samples.is_enabled());

        let config = PersonaConfig {
            voice: VoiceConfig {
                use_authentic_samples: Some(true),
                ..VoiceConfig::default()
            },
            ..PersonaConfig::default()
        };
        state.load_persona(&config).unwrap();
        assert!(!state.snapshot().samples.is_enabled());

        state.replace(VoiceProfile::default());
        assert!(!state.snapshot().samples.is_enabled());
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let state = PersonaState::default();
        let before = state.snapshot();

        let mut next = VoiceProfile::default();
        next.name = "radio-op".to_string();
        next.style = Style::Radio;
        state.replace(next);

        assert_eq!(before.style, Style::Droid);
        assert_eq!(state.snapshot().style, Style::Radio);
    }

    #[test]
    fn test_set_sarcasm() {
        let state = PersonaState::default();
        state.set_sarcasm(true);
        assert!(state.snapshot().sarcasm_enabled);
    }

    #[test]
    fn test_is_addressed() {
        let state = PersonaState::default();
        assert!(state.is_addressed("Hey ROGER, status?"));
        assert!(state.is_addressed("rogr what's up"));
        assert!(!state.is_addressed("hello there"));
    }
}
