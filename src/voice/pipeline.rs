//! The speak pipeline
//!
//! normalize → cache lookup → (synthesize → render → store) → compose →
//! playback. Optional segments (authentic sample, signature, sarcastic
//! intro) are collected ahead of the main message.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::cache::{AudioCache, CacheKey};
use super::chance::{ChanceSource, ThreadRngChance};
use super::compose::Composer;
use super::effects::{EffectParams, EffectRenderer, EffectsEngine, FfmpegEngine, Style, Variant};
use super::playback::{FfplayPlayer, MediaPlayer, PlaybackDispatcher};
use super::synth::{PiperEngine, SpeechEngine, Synthesizer};
use super::text;
use crate::config::Config;
use crate::persona::{PersonaConfig, PersonaState, VoiceProfile};
use crate::{Error, Result};

/// One audio segment of an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Pre-recorded clip
    Sample,
    /// Signature phrase
    Signature,
    /// Sarcastic interjection
    SarcasticIntro,
    /// The requested message
    Main,
}

/// A request to speak
#[derive(Debug, Clone, Default)]
pub struct SpeakRequest {
    /// Text as given by the caller
    pub text: String,

    /// Style override; `None` uses the persona's style
    pub style: Option<Style>,

    /// Effect parameter override for this request
    pub overrides: Option<EffectParams>,

    /// Force the signature on or off; `None` defers to the persona
    pub signature: Option<bool>,

    /// Wait for playback to finish
    pub blocking: bool,
}

impl SpeakRequest {
    /// Request with persona defaults and detached playback
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// The audio produced by a speak call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Final waveform handed to the player
    pub path: PathBuf,

    /// Segments in playback order
    pub segments: Vec<SegmentKind>,
}

/// External engines the pipeline drives
#[derive(Clone)]
pub struct Engines {
    pub speech: Arc<dyn SpeechEngine>,
    pub effects: Arc<dyn EffectsEngine>,
    pub player: Arc<dyn MediaPlayer>,
}

impl Engines {
    /// Process-backed engines from configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            speech: Arc::new(PiperEngine::new(&config.piper_bin, config.engine_timeout)),
            effects: Arc::new(FfmpegEngine::new(&config.ffmpeg_bin, config.engine_timeout)),
            player: Arc::new(FfplayPlayer::new(&config.ffplay_bin)),
        }
    }
}

/// Persona-driven voice output
pub struct VoicePipeline {
    persona: Arc<PersonaState>,
    synthesizer: Synthesizer,
    renderer: EffectRenderer,
    cache: Arc<AudioCache>,
    composer: Composer,
    playback: PlaybackDispatcher,
    chance: Arc<dyn ChanceSource>,
    first_run: AtomicBool,
}

impl VoicePipeline {
    /// Assemble a pipeline using thread-local randomness
    #[must_use]
    pub fn new(
        persona: Arc<PersonaState>,
        engines: Engines,
        model: Option<PathBuf>,
        cache: Arc<AudioCache>,
    ) -> Self {
        Self::with_chance(persona, engines, model, cache, Arc::new(ThreadRngChance))
    }

    /// Assemble a pipeline with an explicit randomness source
    #[must_use]
    pub fn with_chance(
        persona: Arc<PersonaState>,
        engines: Engines,
        model: Option<PathBuf>,
        cache: Arc<AudioCache>,
        chance: Arc<dyn ChanceSource>,
    ) -> Self {
        Self {
            persona,
            synthesizer: Synthesizer::new(engines.speech, model),
            renderer: EffectRenderer::new(Arc::clone(&engines.effects)),
            composer: Composer::new(engines.effects, Arc::clone(&cache)),
            cache,
            playback: PlaybackDispatcher::new(engines.player),
            chance,
            first_run: AtomicBool::new(true),
        }
    }

    /// Build a process-backed pipeline from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the persona cannot be loaded or the cache directory
    /// cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let persona = Arc::new(
            PersonaState::new(config.load_profile()?)
                .with_samples_override(config.use_authentic_samples),
        );
        let cache = Arc::new(AudioCache::open(&config.cache_dir, config.prune)?);

        Ok(Self::new(
            persona,
            Engines::from_config(config),
            config.model.clone(),
            cache,
        ))
    }

    /// Shared persona state
    #[must_use]
    pub fn persona(&self) -> &Arc<PersonaState> {
        &self.persona
    }

    /// Shared audio cache
    #[must_use]
    pub fn cache(&self) -> &Arc<AudioCache> {
        &self.cache
    }

    /// Produce and play an utterance
    ///
    /// An authentic sample matching the raw text is played on its own and
    /// nothing is synthesized. Otherwise the signature and sarcastic intro
    /// are each included on the first call and by chance afterwards, then
    /// the main message follows. Playback failures are logged only.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyInput` if nothing speakable remains after
    /// normalization, or the first synthesis, effect or composition error
    pub async fn speak(&self, request: SpeakRequest) -> Result<Utterance> {
        let profile = self.persona.snapshot();

        if let Some(sample) = profile.samples.find(&request.text) {
            tracing::debug!(path = %sample.display(), "playing authentic sample");
            self.dispatch(&sample, request.blocking).await;
            return Ok(Utterance {
                path: sample,
                segments: vec![SegmentKind::Sample],
            });
        }

        let message = text::normalize(&request.text);
        if message.is_empty() {
            return Err(Error::EmptyInput);
        }

        self.prune_if_due().await;

        let style = request.style.unwrap_or(profile.style);
        let params = request.overrides.unwrap_or(profile.params);
        let first_run = self.first_run.swap(false, Ordering::SeqCst);

        let mut paths = Vec::with_capacity(3);
        let mut segments = Vec::with_capacity(3);

        let signature_enabled = request.signature.unwrap_or(profile.signature_enabled);
        if signature_enabled && (first_run || self.chance.roll(profile.signature_chance)) {
            let path = match profile.samples.find(&profile.signature_phrase) {
                Some(sample) => sample,
                None => {
                    let phrase = text::normalize(&profile.signature_phrase);
                    self.render_cached(&phrase, style, Variant::Signature, &params, false)
                        .await?
                }
            };
            paths.push(path);
            segments.push(SegmentKind::Signature);
        }

        if profile.sarcasm_enabled
            && !profile.sarcastic_intros.is_empty()
            && (first_run || self.chance.roll(profile.sarcasm_chance))
        {
            let intro = &profile.sarcastic_intros[self.chance.pick(profile.sarcastic_intros.len())];
            let intro = text::normalize(intro);
            if !intro.is_empty() {
                let path = self
                    .render_cached(&intro, style, Variant::Sarcastic, &params, false)
                    .await?;
                paths.push(path);
                segments.push(SegmentKind::SarcasticIntro);
            }
        }

        let main = self
            .render_cached(&message, style, Variant::Normal, &params, false)
            .await?;
        paths.push(main);
        segments.push(SegmentKind::Main);

        let path = self.composer.compose(&paths).await?;
        self.dispatch(&path, request.blocking).await;

        tracing::info!(
            style = %style,
            segments = segments.len(),
            path = %path.display(),
            "spoke"
        );

        Ok(Utterance { path, segments })
    }

    /// Speak with the signature requested
    ///
    /// # Errors
    ///
    /// Same as [`VoicePipeline::speak`]
    pub async fn announce(&self, text: &str) -> Result<Utterance> {
        self.speak(SpeakRequest {
            signature: Some(true),
            ..SpeakRequest::new(text)
        })
        .await
    }

    /// Render `text` into the cache without composing or playing
    ///
    /// With `force` an existing entry is rendered again.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyInput` for blank text, or the synthesis or
    /// effect error
    pub async fn generate(&self, text: &str, style: Option<Style>, force: bool) -> Result<PathBuf> {
        let message = text::normalize(text);
        if message.is_empty() {
            return Err(Error::EmptyInput);
        }

        let profile = self.persona.snapshot();
        let style = style.unwrap_or(profile.style);
        self.render_cached(&message, style, Variant::Normal, &profile.params, force)
            .await
    }

    /// Warm the cache with `phrases`, each alone and followed by the
    /// signature phrase
    ///
    /// Individual failures are logged. Returns how many renders succeeded.
    pub async fn preload(&self, phrases: &[String]) -> usize {
        let signature = self.persona.snapshot().signature_phrase.clone();
        let mut rendered = 0;

        for phrase in phrases {
            for text in [phrase.clone(), format!("{phrase}. {signature}")] {
                match self.generate(&text, None, false).await {
                    Ok(_) => rendered += 1,
                    Err(e) => tracing::warn!(text = %text, error = %e, "failed to preload phrase"),
                }
            }
        }

        tracing::info!(rendered, "preloaded phrases");
        rendered
    }

    /// Swap the active persona
    ///
    /// # Errors
    ///
    /// Returns error if the document does not resolve
    pub fn load_persona(&self, config: &PersonaConfig) -> Result<()> {
        self.persona.load_persona(config)
    }

    /// Swap the active persona and clear the cache
    ///
    /// # Errors
    ///
    /// Returns error if the document does not resolve; the cache is left
    /// alone in that case
    pub async fn apply_persona_update(&self, config: &PersonaConfig) -> Result<()> {
        self.load_persona(config)?;
        self.clear_cache().await;
        Ok(())
    }

    /// Swap in an already-resolved profile and clear the cache
    pub async fn apply_profile(&self, profile: VoiceProfile) {
        self.persona.replace(profile);
        self.clear_cache().await;
    }

    /// Delete every cache entry
    pub async fn clear_cache(&self) -> usize {
        let cache = Arc::clone(&self.cache);
        match tokio::task::spawn_blocking(move || cache.clear()).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(error = %e, "cache clear task failed");
                0
            }
        }
    }

    /// Fetch or produce the styled waveform for `text`
    async fn render_cached(
        &self,
        text: &str,
        style: Style,
        variant: Variant,
        params: &EffectParams,
        force: bool,
    ) -> Result<PathBuf> {
        let key = CacheKey::new(text, style, variant, params);

        if !force && let Some(path) = self.cache.lookup(&key) {
            tracing::debug!(path = %path.display(), "voice cache hit");
            return Ok(path);
        }

        let raw = self.cache.stage("raw")?;
        self.synthesizer.synthesize(text, &raw).await?;

        let styled = self.cache.stage(variant.name())?;
        self.renderer
            .render(&raw, style, variant, params, &styled)
            .await?;

        self.cache.store(&key, styled)
    }

    async fn prune_if_due(&self) {
        let cache = Arc::clone(&self.cache);
        if let Err(e) = tokio::task::spawn_blocking(move || cache.maybe_prune()).await {
            tracing::error!(error = %e, "cache prune task failed");
        }
    }

    async fn dispatch(&self, path: &std::path::Path, blocking: bool) {
        if let Err(e) = self.playback.play(path, blocking).await {
            tracing::warn!(path = %path.display(), error = %e, "playback failed");
        }
    }
}
