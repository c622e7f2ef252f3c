//! Pre-recorded authentic phrase clips

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Clips shipped with the droid persona, keyed by lowercase phrase
pub const DROID_SAMPLE_PHRASES: &[(&str, &str)] = &[
    ("roger roger", "roger-roger__1_.wav"),
    ("roger, roger", "roger-roger__1_.wav"),
    ("roger-roger", "roger-roger__1_.wav"),
    ("roger, roger.", "roger-roger__1_.wav"),
    ("roger roger.", "roger-roger__1_.wav"),
    ("oh no", "oh-no.wav"),
    ("hold it", "hold-it.wav"),
    ("you're welcome", "you-re-welcome.wav"),
    ("you are welcome", "you-re-welcome.wav"),
    ("surrender", "surrender-jedi.wav"),
    ("surrender jedi", "surrender-jedi.wav"),
    ("don't even think", "don-t-even-think.wav"),
    ("don't even think about it", "don-t-even-think.wav"),
    ("my programming", "my-programming.wav"),
    ("it's not in my programming", "my-programming.wav"),
    ("stupid astro droid", "stupid-astro-droid.wav"),
    ("stupid astro-droid", "stupid-astro-droid.wav"),
];

/// Default location of the droid clips
pub const DROID_SAMPLES_DIR: &str = "data/voice_models/battle_droid";

/// Phrase-to-clip table for one persona
#[derive(Debug, Clone, Default)]
pub struct SampleLibrary {
    dir: PathBuf,
    phrases: HashMap<String, String>,
    enabled: bool,
}

impl SampleLibrary {
    /// Create a library over `dir`; phrase keys are lowercased
    #[must_use]
    pub fn new(
        dir: impl Into<PathBuf>,
        phrases: impl IntoIterator<Item = (String, String)>,
        enabled: bool,
    ) -> Self {
        Self {
            dir: dir.into(),
            phrases: phrases
                .into_iter()
                .map(|(phrase, file)| (phrase.trim().to_lowercase(), file))
                .collect(),
            enabled,
        }
    }

    /// Library with no phrases
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// The built-in droid table rooted at `dir`
    #[must_use]
    pub fn droid(dir: impl Into<PathBuf>) -> Self {
        Self::new(
            dir,
            DROID_SAMPLE_PHRASES
                .iter()
                .map(|(p, f)| ((*p).to_string(), (*f).to_string())),
            true,
        )
    }

    /// Same table with lookups switched on or off
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether lookups are allowed to hit
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Directory clips are read from
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Clip for `text`, if one exists on disk
    ///
    /// Matching is case-insensitive: an exact phrase wins, otherwise the
    /// longest phrase the text ends with.
    #[must_use]
    pub fn find(&self, text: &str) -> Option<PathBuf> {
        if !self.enabled || self.phrases.is_empty() {
            return None;
        }

        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        let file = self.phrases.get(&text).or_else(|| {
            self.phrases
                .iter()
                .filter(|(phrase, _)| text.ends_with(phrase.as_str()))
                .max_by_key(|(phrase, _)| phrase.len())
                .map(|(_, file)| file)
        })?;

        let path = self.dir.join(file);
        if path.is_file() {
            Some(path)
        } else {
            tracing::debug!(path = %path.display(), "sample clip missing");
            None
        }
    }
}
