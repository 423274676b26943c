//! Media track management
//!
//! Local tracks are owned by the session that captured them; remote tracks
//! are references handed out by the transport engine on subscribe.

use std::fmt;
use std::ops::Deref;

use tracing::debug;

use crate::model::participants::ParticipantId;
use crate::session::engine::LocalMediaTrack;

/// The kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// Engine-assigned identity of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u64);

impl Deref for TrackId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A subscribed track published by another participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: TrackId,
    pub participant: ParticipantId,
    pub kind: MediaKind,
}

/// The session's captured tracks: at most one of each kind.
#[derive(Default)]
pub struct LocalTrackSet {
    audio: Option<Box<dyn LocalMediaTrack>>,
    video: Option<Box<dyn LocalMediaTrack>>,
}

impl LocalTrackSet {
    fn slot(&mut self, kind: MediaKind) -> &mut Option<Box<dyn LocalMediaTrack>> {
        match kind {
            MediaKind::Audio => &mut self.audio,
            MediaKind::Video => &mut self.video,
        }
    }

    /// Store a freshly captured track.
    ///
    /// A track already held for the same kind is released first so the
    /// hardware handle never leaks.
    pub fn insert(&mut self, track: Box<dyn LocalMediaTrack>) {
        let slot = self.slot(track.kind());
        if let Some(mut old) = slot.replace(track) {
            release(old.as_mut());
        }
    }

    pub fn contains(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.audio.is_some(),
            MediaKind::Video => self.video.is_some(),
        }
    }

    /// `false` when no track of that kind exists.
    pub fn is_enabled(&self, kind: MediaKind) -> bool {
        let track = match kind {
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
        };
        track.as_ref().map(|t| t.is_enabled()).unwrap_or(false)
    }

    /// Flip the enabled flag, returning the new value, or `None` if there is
    /// no track of that kind yet.
    pub fn toggle(&mut self, kind: MediaKind) -> Option<bool> {
        let track = self.slot(kind).as_mut()?;
        let enabled = !track.is_enabled();
        track.set_enabled(enabled);
        Some(enabled)
    }

    pub fn ids(&self) -> Vec<TrackId> {
        self.audio
            .iter()
            .chain(self.video.iter())
            .map(|t| t.id())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }

    /// Disable and close every held track. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for kind in [MediaKind::Audio, MediaKind::Video] {
            if let Some(mut track) = self.slot(kind).take() {
                release(track.as_mut());
                released += 1;
            }
        }
        released
    }
}

fn release(track: &mut dyn LocalMediaTrack) {
    debug!("Releasing local {} track {}", track.kind(), *track.id());
    track.set_enabled(false);
    track.close();
}

impl fmt::Debug for LocalTrackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrackSet")
            .field("audio", &self.audio.as_ref().map(|t| t.id()))
            .field("video", &self.video.as_ref().map(|t| t.id()))
            .finish()
    }
}

impl Drop for LocalTrackSet {
    fn drop(&mut self) {
        self.release_all();
    }
}
