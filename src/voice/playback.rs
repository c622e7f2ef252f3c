//! Audio playback through an external player

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::process;
use crate::{Error, Result};

/// External media player
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Play `path` to completion
    ///
    /// # Errors
    ///
    /// Returns `Error::Playback` if the player fails
    async fn play(&self, path: &Path) -> Result<()>;
}

/// `ffplay` without a window, exiting at end of stream
#[derive(Debug, Clone)]
pub struct FfplayPlayer {
    binary: PathBuf,
}

impl FfplayPlayer {
    /// Create a player running `binary`
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl MediaPlayer for FfplayPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        let args: [&OsStr; 5] = [
            "-nodisp".as_ref(),
            "-autoexit".as_ref(),
            "-loglevel".as_ref(),
            "quiet".as_ref(),
            path.as_os_str(),
        ];

        // Playback length tracks the audio, so no timeout
        let out = process::run(&self.binary, args, None, None)
            .await
            .map_err(Error::Playback)?;

        if !out.status.success() {
            return Err(Error::Playback(format!(
                "ffplay {}",
                process::describe_failure(&out)
            )));
        }

        Ok(())
    }
}

/// Starts playback either in the foreground or detached
#[derive(Clone)]
pub struct PlaybackDispatcher {
    player: Arc<dyn MediaPlayer>,
}

impl PlaybackDispatcher {
    /// Create a dispatcher for `player`
    #[must_use]
    pub fn new(player: Arc<dyn MediaPlayer>) -> Self {
        Self { player }
    }

    /// Play `path`
    ///
    /// With `blocking` the call returns when the player exits. Otherwise the
    /// player runs on its own task and any failure is only logged.
    ///
    /// # Errors
    ///
    /// Returns `Error::Playback` if blocking playback fails
    pub async fn play(&self, path: &Path, blocking: bool) -> Result<()> {
        if blocking {
            return self.player.play(path).await;
        }

        let player = Arc::clone(&self.player);
        let path = path.to_path_buf();
        tokio::spawn(async move {
            if let Err(e) = player.play(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "detached playback failed");
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct GatedPlayer {
        gate: Notify,
        played: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl MediaPlayer for GatedPlayer {
        async fn play(&self, path: &Path) -> Result<()> {
            self.gate.notified().await;
            self.played.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    struct FailingPlayer;

    #[async_trait]
    impl MediaPlayer for FailingPlayer {
        async fn play(&self, _path: &Path) -> Result<()> {
            Err(Error::Playback("no output device".to_string()))
        }
    }

    #[tokio::test]
    async fn test_detached_returns_before_player_finishes() {
        let player = Arc::new(GatedPlayer::default());
        let dispatcher = PlaybackDispatcher::new(player.clone());

        dispatcher
            .play(Path::new("/cache/droid_a.wav"), false)
            .await
            .unwrap();
        assert!(player.played.lock().unwrap().is_empty());

        player.gate.notify_one();
        for _ in 0..100 {
            if !player.played.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(player.played.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blocking_surfaces_failure() {
        let dispatcher = PlaybackDispatcher::new(Arc::new(FailingPlayer));
        let result = dispatcher.play(Path::new("/cache/a.wav"), true).await;
        assert!(matches!(result, Err(Error::Playback(_))));
    }

    #[tokio::test]
    async fn test_detached_swallows_failure() {
        let dispatcher = PlaybackDispatcher::new(Arc::new(FailingPlayer));
        assert!(dispatcher.play(Path::new("/cache/a.wav"), false).await.is_ok());
    }
}
