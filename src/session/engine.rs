//! Transport engine seam
//!
//! The session manager drives an external real-time transport engine through
//! these traits. Audio/video capture, encoding and network transport all live
//! behind them.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::model::{
    participants::ParticipantId,
    propagated::RemoteEvent,
    tracks::{MediaKind, RemoteTrack, TrackId},
};
use crate::session::SessionConfig;

pub type EngineResult<T> = Result<T, EngineError>;

/// Factory for per-session transport clients.
pub trait TransportEngine: Send + Sync + 'static {
    type Client: TransportClient;

    fn create_client(&self, config: &SessionConfig) -> EngineResult<Self::Client>;
}

/// One session's connection to the media service.
#[async_trait]
pub trait TransportClient: Send + 'static {
    /// Join `channel`. Without a `uid` the engine assigns one.
    async fn join(
        &mut self,
        app_id: &str,
        channel: &str,
        token: Option<&str>,
        uid: Option<ParticipantId>,
    ) -> EngineResult<ParticipantId>;

    /// Open the microphone or the camera.
    async fn create_local_track(&mut self, kind: MediaKind) -> EngineResult<Box<dyn LocalMediaTrack>>;

    async fn publish(&mut self, tracks: &[TrackId]) -> EngineResult<()>;

    async fn subscribe(&mut self, participant: &ParticipantId, kind: MediaKind) -> EngineResult<RemoteTrack>;

    /// Start playback of a subscribed track.
    async fn play(&mut self, track: &RemoteTrack) -> EngineResult<()>;

    async fn leave(&mut self) -> EngineResult<()>;

    /// Hand over the remote event source. Returns `None` once taken.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<RemoteEvent>>;
}

/// A captured microphone or camera track.
///
/// `close` frees the underlying device; the track must not be used after.
pub trait LocalMediaTrack: Send + 'static {
    fn id(&self) -> TrackId;
    fn kind(&self) -> MediaKind;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);
    fn close(&mut self);
}
