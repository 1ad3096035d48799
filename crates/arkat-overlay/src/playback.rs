//! Playback handles and the registry used for bulk lifecycle operations

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Transport state of a playback resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Created but never started
    Prepared,
    Started,
    Paused,
    Stopped,
    /// Reset to an uninitialized state
    Idle,
    Released,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Prepared => "prepared",
            Self::Started => "started",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Idle => "idle",
            Self::Released => "released",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("cannot {op} while {state}")]
    InvalidState {
        op: &'static str,
        state: PlaybackState,
    },
    #[error("playback backend failure: {0}")]
    Backend(String),
}

/// A looping media stream owned by an overlay
pub trait PlaybackHandle {
    fn state(&self) -> PlaybackState;
    fn set_looping(&mut self, looping: bool);
    fn start(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self) -> Result<(), PlaybackError>;
    fn stop(&mut self) -> Result<(), PlaybackError>;
    fn reset(&mut self) -> Result<(), PlaybackError>;
    fn release(&mut self) -> Result<(), PlaybackError>;
}

/// Playback handle that enforces media-player transport rules without
/// decoding anything
#[derive(Debug, Clone)]
pub struct HeadlessPlayback {
    media: String,
    state: PlaybackState,
    looping: bool,
}

impl HeadlessPlayback {
    pub fn new(media: impl Into<String>) -> Self {
        Self {
            media: media.into(),
            state: PlaybackState::Prepared,
            looping: false,
        }
    }

    pub fn media(&self) -> &str {
        &self.media
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    fn transition(
        &mut self,
        op: &'static str,
        allowed: &[PlaybackState],
        next: PlaybackState,
    ) -> Result<(), PlaybackError> {
        if !allowed.contains(&self.state) {
            return Err(PlaybackError::InvalidState {
                op,
                state: self.state,
            });
        }
        debug!(media = %self.media, from = %self.state, to = %next, "Playback transition");
        self.state = next;
        Ok(())
    }
}

impl PlaybackHandle for HeadlessPlayback {
    fn state(&self) -> PlaybackState {
        self.state
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        use PlaybackState::*;
        self.transition("start", &[Prepared, Started, Paused], Started)
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        use PlaybackState::*;
        self.transition("pause", &[Started, Paused], Paused)
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        use PlaybackState::*;
        self.transition("stop", &[Prepared, Started, Paused, Stopped], Stopped)
    }

    fn reset(&mut self) -> Result<(), PlaybackError> {
        use PlaybackState::*;
        self.transition("reset", &[Prepared, Started, Paused, Stopped, Idle], Idle)
    }

    fn release(&mut self) -> Result<(), PlaybackError> {
        use PlaybackState::*;
        self.transition("release", &[Prepared, Started, Paused, Stopped, Idle], Released)
    }
}

/// Identifier of a registered playback resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(pub u64);

impl std::fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "playback-{}", self.0)
    }
}

/// Ordered collection of every live playback resource
#[derive(Debug)]
pub struct PlaybackRegistry<P> {
    entries: Vec<(PlaybackId, P)>,
    next_id: u64,
}

impl<P> Default for PlaybackRegistry<P> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<P: PlaybackHandle> PlaybackRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, playback: P) -> PlaybackId {
        let id = PlaybackId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, playback));
        id
    }

    pub fn get(&self, id: PlaybackId) -> Option<&P> {
        self.entries.iter().find(|(i, _)| *i == id).map(|(_, p)| p)
    }

    pub fn ids(&self) -> impl Iterator<Item = PlaybackId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pause every resource; returns how many paused cleanly
    pub fn pause_all(&mut self) -> usize {
        let mut paused = 0;
        for (id, playback) in &mut self.entries {
            match playback.pause() {
                Ok(()) => paused += 1,
                Err(e) => warn!(playback = %id, error = %e, "Error pausing playback"),
            }
        }
        paused
    }

    /// Stop, reset and release every resource, then empty the registry
    ///
    /// Each step of each resource is attempted independently, so a resource
    /// in a bad state cannot keep the others from being released.
    pub fn release_all(&mut self) -> usize {
        let count = self.entries.len();
        for (id, mut playback) in self.entries.drain(..) {
            if let Err(e) = playback.stop() {
                warn!(playback = %id, error = %e, "Error stopping playback");
            }
            if let Err(e) = playback.reset() {
                warn!(playback = %id, error = %e, "Error resetting playback");
            }
            if let Err(e) = playback.release() {
                warn!(playback = %id, error = %e, "Error releasing playback");
            }
        }
        if count > 0 {
            info!(count, "Released playback resources");
        }
        count
    }
}
