//! Media session management
//!
//! A [`SessionManager`] drives one call's lifecycle against a
//! [`TransportEngine`]:
//!
//! ```text
//! Idle --join()--> Joining --ok--> Joined --leave()--> Leaving --> Idle
//!                  Joining --err--> Idle (error recorded)
//! ```
//!
//! Every action is queued to a single coordinator task together with the
//! engine's remote events, so lifecycle transitions, track ownership and the
//! remote participant registry are only ever touched by one task. Callers
//! read state through [`SessionSnapshot`]s.

pub mod actor;
pub mod engine;

use std::fmt;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::model::{participants::ParticipantId, participants::RemoteParticipant, tracks::MediaKind};
use actor::{SessionActor, SessionCommand};
pub use engine::{LocalMediaTrack, TransportClient, TransportEngine};

const COMMAND_QUEUE: usize = 32;

/// Identifies the channel a session joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub app_id: String,
    pub channel: String,
    /// Access token, when the media service requires one
    pub token: Option<String>,
    /// Fixed participant id; the engine assigns one when `None`
    pub uid: Option<ParticipantId>,
}

impl SessionConfig {
    pub fn new(app_id: impl Into<String>, channel: impl Into<String>) -> SessionConfig {
        SessionConfig {
            app_id: app_id.into(),
            channel: channel.into(),
            token: None,
            uid: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Joining,
    Joined,
    Leaving,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Joining => "joining",
            SessionState::Joined => "joined",
            SessionState::Leaving => "leaving",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a session, refreshed after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub channel: Option<String>,
    pub local_uid: Option<ParticipantId>,
    pub is_joined: bool,
    pub is_video_enabled: bool,
    pub is_audio_enabled: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub remote_participants: Vec<RemoteParticipant>,
}

/// Handle to a session's coordinator task.
///
/// Clones share the same session.
#[derive(Debug, Clone)]
pub struct SessionManager {
    tx: mpsc::Sender<SessionCommand>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionManager {
    /// Spawn the coordinator on the current tokio runtime.
    pub fn new<E: TransportEngine>(engine: E) -> SessionManager {
        let (snapshot_tx, snapshot) = watch::channel(SessionSnapshot::default());
        let (actor, tx) = SessionActor::new(engine, snapshot_tx, COMMAND_QUEUE);
        tokio::spawn(actor.run());

        SessionManager { tx, snapshot }
    }

    /// Build the transport client for `config`. Rejected unless the session
    /// is idle.
    pub async fn initialize(&self, config: SessionConfig) -> SessionResult<()> {
        self.send_command(|responder| SessionCommand::Initialize { config, responder })
            .await?
    }

    /// Join the channel and publish microphone and camera.
    ///
    /// Does nothing before [`initialize`](Self::initialize) or when already
    /// joined.
    pub async fn join(&self) -> SessionResult<()> {
        self.send_command(|responder| SessionCommand::Join { responder })
            .await?
    }

    /// Release local tracks and leave the channel. Safe in any state.
    pub async fn leave(&self) -> SessionResult<()> {
        self.send_command(|responder| SessionCommand::Leave { responder })
            .await?
    }

    /// Returns the new enabled flag, or `None` without a video track.
    pub async fn toggle_video(&self) -> SessionResult<Option<bool>> {
        self.toggle(MediaKind::Video).await
    }

    /// Returns the new enabled flag, or `None` without an audio track.
    pub async fn toggle_audio(&self) -> SessionResult<Option<bool>> {
        self.toggle(MediaKind::Audio).await
    }

    async fn toggle(&self, kind: MediaKind) -> SessionResult<Option<bool>> {
        self.send_command(|responder| SessionCommand::Toggle { kind, responder })
            .await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Leave if needed and stop the coordinator.
    pub async fn shutdown(self) -> SessionResult<()> {
        self.send_command(|responder| SessionCommand::Shutdown { responder })
            .await?
    }

    async fn send_command<T>(
        &self,
        f: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> SessionResult<T> {
        let (responder, rx) = oneshot::channel();
        self.tx.send(f(responder)).await.map_err(|_| {
            debug!("Session command sent after coordinator stopped");
            SessionError::Closed
        })?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}
