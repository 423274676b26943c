//! Session coordinator
//!
//! Owns the transport client, the local tracks and the remote participant
//! registry. Commands and remote events are applied one at a time, so a
//! `leave()` queued behind a `join()` only runs once the join has settled.

use std::future::pending;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::model::{
    participants::{ParticipantId, RemoteParticipants},
    propagated::RemoteEvent,
    tracks::{LocalTrackSet, MediaKind},
};
use crate::session::engine::{TransportClient, TransportEngine};
use crate::session::{SessionConfig, SessionSnapshot, SessionState};

#[derive(Debug)]
pub enum SessionCommand {
    Initialize {
        config: SessionConfig,
        responder: oneshot::Sender<SessionResult<()>>,
    },
    Join {
        responder: oneshot::Sender<SessionResult<()>>,
    },
    Leave {
        responder: oneshot::Sender<SessionResult<()>>,
    },
    Toggle {
        kind: MediaKind,
        responder: oneshot::Sender<Option<bool>>,
    },
    Shutdown {
        responder: oneshot::Sender<SessionResult<()>>,
    },
}

enum Next {
    Command(Option<SessionCommand>),
    Event(Option<RemoteEvent>),
}

pub struct SessionActor<E: TransportEngine> {
    engine: E,
    client: Option<E::Client>,
    config: Option<SessionConfig>,
    state: SessionState,
    error: Option<SessionError>,
    local_uid: Option<ParticipantId>,
    in_channel: bool,
    tracks: LocalTrackSet,
    remote: RemoteParticipants,
    events: Option<mpsc::UnboundedReceiver<RemoteEvent>>,
    rx: mpsc::Receiver<SessionCommand>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<E: TransportEngine> SessionActor<E> {
    pub fn new(
        engine: E,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        capacity: usize,
    ) -> (Self, mpsc::Sender<SessionCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        let actor = SessionActor {
            engine,
            client: None,
            config: None,
            state: SessionState::Idle,
            error: None,
            local_uid: None,
            in_channel: false,
            tracks: LocalTrackSet::default(),
            remote: RemoteParticipants::new(),
            events: None,
            rx,
            snapshot_tx,
        };
        (actor, tx)
    }

    /// Process commands and remote events until every handle is dropped or
    /// a shutdown is requested.
    pub async fn run(mut self) {
        loop {
            let next = tokio::select! {
                cmd = self.rx.recv() => Next::Command(cmd),
                event = recv_event(&mut self.events) => Next::Event(event),
            };

            match next {
                Next::Command(Some(cmd)) => {
                    if !self.process_command(cmd).await {
                        break;
                    }
                }
                Next::Command(None) => {
                    // Every handle is gone; nobody can observe the result.
                    let _ = self.handle_leave().await;
                    break;
                }
                Next::Event(Some(event)) => self.handle_remote_event(event).await,
                Next::Event(None) => {
                    debug!("Remote event source closed");
                    self.events = None;
                }
            }
        }

        info!("Session coordinator stopped");
    }

    /// Returns `false` once the coordinator should stop.
    async fn process_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Initialize { config, responder } => {
                let result = self.handle_initialize(config);
                let _ = responder.send(result);
            }
            SessionCommand::Join { responder } => {
                let result = self.handle_join().await;
                let _ = responder.send(result);
            }
            SessionCommand::Leave { responder } => {
                let result = self.handle_leave().await;
                let _ = responder.send(result);
            }
            SessionCommand::Toggle { kind, responder } => {
                let result = self.tracks.toggle(kind);
                if let Some(enabled) = result {
                    debug!("Local {} track enabled = {}", kind, enabled);
                    self.publish_snapshot();
                }
                let _ = responder.send(result);
            }
            SessionCommand::Shutdown { responder } => {
                let result = self.handle_leave().await;
                let _ = responder.send(result);
                return false;
            }
        }

        true
    }

    fn handle_initialize(&mut self, config: SessionConfig) -> SessionResult<()> {
        if self.state != SessionState::Idle || self.in_channel {
            return Err(SessionError::InvalidState(self.state.as_str()));
        }

        let mut client = match self.engine.create_client(&config) {
            Ok(client) => client,
            Err(e) => {
                warn!("Creating transport client failed: {}", e);
                let err = SessionError::from(e);
                self.error = Some(err.clone());
                self.publish_snapshot();
                return Err(err);
            }
        };

        info!(
            "Session initialized for channel '{}' (app {})",
            config.channel, config.app_id
        );
        self.events = client.take_events();
        self.client = Some(client);
        self.config = Some(config);
        self.remote.clear();
        self.error = None;
        self.publish_snapshot();

        Ok(())
    }

    async fn handle_join(&mut self) -> SessionResult<()> {
        let Some(config) = self.config.clone() else {
            debug!("join() before initialize(), ignoring");
            return Ok(());
        };
        if self.client.is_none() {
            return Ok(());
        }

        match self.state {
            SessionState::Joined => {
                debug!("join() while already joined, ignoring");
                return Ok(());
            }
            SessionState::Idle => {}
            state => return Err(SessionError::InvalidState(state.as_str())),
        }

        self.state = SessionState::Joining;
        self.error = None;
        self.publish_snapshot();

        match self.try_join(&config).await {
            Ok(()) => {
                info!(
                    "Joined channel '{}' as {:?}",
                    config.channel,
                    self.local_uid.as_ref().map(|u| u.as_str())
                );
                self.state = SessionState::Joined;
                self.publish_snapshot();
                Ok(())
            }
            Err(e) => {
                warn!("Joining channel '{}' failed: {}", config.channel, e);
                self.rollback_join().await;
                self.error = Some(e.clone());
                self.state = SessionState::Idle;
                self.publish_snapshot();
                Err(e)
            }
        }
    }

    async fn try_join(&mut self, config: &SessionConfig) -> SessionResult<()> {
        let Some(client) = self.client.as_mut() else {
            return Ok(());
        };

        let uid = client
            .join(
                &config.app_id,
                &config.channel,
                config.token.as_deref(),
                config.uid.clone(),
            )
            .await?;
        self.in_channel = true;
        self.local_uid = Some(uid);

        // Microphone first, then camera. Each track is stored as soon as it is
        // acquired so a later failure can release it.
        for kind in [MediaKind::Audio, MediaKind::Video] {
            let track = client.create_local_track(kind).await?;
            self.tracks.insert(track);
        }

        client.publish(&self.tracks.ids()).await?;

        Ok(())
    }

    async fn rollback_join(&mut self) {
        let released = self.tracks.release_all();
        if released > 0 {
            debug!("Released {} partially acquired track(s)", released);
        }

        if self.in_channel {
            if let Some(client) = self.client.as_mut() {
                if let Err(e) = client.leave().await {
                    warn!("Leaving channel after failed join failed: {}", e);
                }
            }
            self.in_channel = false;
        }

        self.local_uid = None;
    }

    async fn handle_leave(&mut self) -> SessionResult<()> {
        if !self.in_channel && self.tracks.is_empty() {
            self.remote.clear();
            self.state = SessionState::Idle;
            self.publish_snapshot();
            return Ok(());
        }

        self.state = SessionState::Leaving;
        self.publish_snapshot();

        // Tracks go before the channel.
        self.tracks.release_all();

        let result = match (self.in_channel, self.client.as_mut()) {
            (true, Some(client)) => client.leave().await,
            _ => Ok(()),
        };

        self.in_channel = false;
        self.local_uid = None;
        self.remote.clear();
        self.state = SessionState::Idle;

        let result = match result {
            Ok(()) => {
                info!("Left channel");
                self.error = None;
                Ok(())
            }
            Err(e) => {
                warn!("Leaving channel failed: {}", e);
                let err = SessionError::from(e);
                self.error = Some(err.clone());
                Err(err)
            }
        };
        self.publish_snapshot();

        result
    }

    async fn handle_remote_event(&mut self, event: RemoteEvent) {
        debug!("Remote event from {}: {:?}", event.participant(), event);

        match event {
            RemoteEvent::Published(participant, kind) => {
                if self.state != SessionState::Joined {
                    debug!("Ignoring publish from {} while {}", participant, self.state);
                    return;
                }
                let Some(client) = self.client.as_mut() else {
                    return;
                };

                let result = match client.subscribe(&participant, kind).await {
                    Ok(track) => match kind {
                        MediaKind::Video => {
                            self.remote.upsert_video(participant.clone(), track);
                            Ok(())
                        }
                        // Audio plays straight away and is not tracked.
                        MediaKind::Audio => client.play(&track).await,
                    },
                    Err(e) => Err(e),
                };

                if let Err(e) = result {
                    warn!("Subscribing to {} {} failed: {}", kind, participant, e);
                    self.error = Some(SessionError::from(e));
                }
            }
            RemoteEvent::Unpublished(participant, MediaKind::Video) => {
                self.remote.remove(&participant);
            }
            RemoteEvent::Unpublished(_, MediaKind::Audio) => {}
            RemoteEvent::Left(participant) => {
                if self.remote.remove(&participant) {
                    info!("Participant {} left", participant);
                }
            }
        }

        self.publish_snapshot();
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            channel: self.config.as_ref().map(|c| c.channel.clone()),
            local_uid: self.local_uid.clone(),
            is_joined: self.state == SessionState::Joined,
            is_video_enabled: self.tracks.is_enabled(MediaKind::Video),
            is_audio_enabled: self.tracks.is_enabled(MediaKind::Audio),
            is_loading: matches!(self.state, SessionState::Joining | SessionState::Leaving),
            error: self.error.as_ref().map(|e| e.to_string()),
            remote_participants: self.remote.to_vec(),
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

async fn recv_event(events: &mut Option<mpsc::UnboundedReceiver<RemoteEvent>>) -> Option<RemoteEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}
