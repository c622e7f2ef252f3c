//! Joins rendered segments into one waveform

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::cache::{AudioCache, CacheKey};
use super::effects::EffectsEngine;
use crate::{Error, Result};

/// Concatenates segments through the effects engine, caching the result
#[derive(Clone)]
pub struct Composer {
    engine: Arc<dyn EffectsEngine>,
    cache: Arc<AudioCache>,
}

impl Composer {
    /// Create a composer writing into `cache`
    #[must_use]
    pub fn new(engine: Arc<dyn EffectsEngine>, cache: Arc<AudioCache>) -> Self {
        Self { engine, cache }
    }

    /// Compose `segments` in order
    ///
    /// A single segment is returned as-is. Several segments are joined
    /// losslessly into a cache entry keyed by the ordered segment paths.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoAudio` for an empty list, or `Error::Composition`
    /// if the join fails
    pub async fn compose(&self, segments: &[PathBuf]) -> Result<PathBuf> {
        match segments {
            [] => return Err(Error::NoAudio),
            [only] => return Ok(only.clone()),
            _ => {}
        }

        let key = CacheKey::combined(segments);
        if let Some(path) = self.cache.lookup(&key) {
            tracing::debug!(path = %path.display(), "combined audio cache hit");
            return Ok(path);
        }

        let list = self.write_list(segments).await?;
        let staged = self.cache.stage("combined")?;

        self.engine.concat(&list, &staged).await?;

        self.cache.store(&key, staged)
    }

    /// Write the concat list into a scratch file that is removed on drop
    async fn write_list(&self, segments: &[PathBuf]) -> Result<tempfile::TempPath> {
        let list = tempfile::Builder::new()
            .prefix(".concat-")
            .suffix(".txt")
            .tempfile_in(self.cache.dir())?
            .into_temp_path();

        let mut body = String::new();
        for segment in segments {
            let absolute = std::path::absolute(segment)?;
            body.push_str(&format!("file '{}'\n", escape_quoted(&absolute)));
        }

        tokio::fs::write(&list, body)
            .await
            .map_err(|e| Error::Composition(format!("failed to write concat list: {e}")))?;

        Ok(list)
    }
}

/// Quote a path for the concat demuxer's single-quoted syntax
fn escape_quoted(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}
