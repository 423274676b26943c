//! Scripted in-memory transport engine for session tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use rtc_relay::error::EngineError;
use rtc_relay::model::{
    participants::ParticipantId,
    propagated::RemoteEvent,
    tracks::{MediaKind, RemoteTrack, TrackId},
};
use rtc_relay::session::{
    engine::EngineResult, LocalMediaTrack, SessionConfig, SessionManager, SessionSnapshot,
    TransportClient, TransportEngine,
};

pub const FIRST_REMOTE_TRACK: u64 = 1000;

/// Failures and delays the engine should produce.
#[derive(Debug, Default, Clone)]
pub struct Script {
    pub fail_join: Option<EngineError>,
    pub fail_track: Option<MediaKind>,
    pub fail_publish: bool,
    pub fail_subscribe: bool,
    pub fail_leave: bool,
    pub join_delay: Option<Duration>,
}

/// Everything the engine was asked to do.
#[derive(Debug, Default)]
pub struct Ledger {
    pub clients: usize,
    pub joins: usize,
    pub leaves: usize,
    pub acquired: Vec<MediaKind>,
    pub closed: Vec<TrackId>,
    pub published: Vec<TrackId>,
    pub subscribed: Vec<(ParticipantId, MediaKind)>,
    pub played: Vec<TrackId>,
}

impl Ledger {
    pub fn open_tracks(&self) -> usize {
        self.acquired.len() - self.closed.len()
    }
}

#[derive(Clone, Default)]
pub struct MockEngine {
    pub script: Arc<Mutex<Script>>,
    pub ledger: Arc<Mutex<Ledger>>,
    events: Arc<Mutex<Option<mpsc::UnboundedSender<RemoteEvent>>>>,
}

impl MockEngine {
    pub fn new() -> MockEngine {
        MockEngine::default()
    }

    pub fn with_script(script: Script) -> MockEngine {
        let engine = MockEngine::default();
        *engine.script.lock() = script;
        engine
    }

    /// Deliver a remote event to the most recently created client.
    pub fn emit(&self, event: RemoteEvent) {
        let events = self.events.lock();
        let tx = events.as_ref().expect("no client created yet");
        tx.send(event).expect("session dropped its event source");
    }
}

impl TransportEngine for MockEngine {
    type Client = MockClient;

    fn create_client(&self, _config: &SessionConfig) -> EngineResult<MockClient> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock() = Some(tx);
        self.ledger.lock().clients += 1;

        Ok(MockClient {
            script: self.script.clone(),
            ledger: self.ledger.clone(),
            events: Some(rx),
            next_local: 1,
            next_remote: FIRST_REMOTE_TRACK,
        })
    }
}

pub struct MockClient {
    script: Arc<Mutex<Script>>,
    ledger: Arc<Mutex<Ledger>>,
    events: Option<mpsc::UnboundedReceiver<RemoteEvent>>,
    next_local: u64,
    next_remote: u64,
}

#[async_trait]
impl TransportClient for MockClient {
    async fn join(
        &mut self,
        _app_id: &str,
        _channel: &str,
        _token: Option<&str>,
        uid: Option<ParticipantId>,
    ) -> EngineResult<ParticipantId> {
        let (delay, failure) = {
            let script = self.script.lock();
            (script.join_delay, script.fail_join.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = failure {
            return Err(e);
        }

        self.ledger.lock().joins += 1;
        Ok(uid.unwrap_or_else(|| ParticipantId::new("local-1")))
    }

    async fn create_local_track(&mut self, kind: MediaKind) -> EngineResult<Box<dyn LocalMediaTrack>> {
        if self.script.lock().fail_track == Some(kind) {
            return Err(EngineError::PermissionDenied(format!("{} device", kind)));
        }

        let id = TrackId(self.next_local);
        self.next_local += 1;
        self.ledger.lock().acquired.push(kind);

        Ok(Box::new(MockTrack {
            id,
            kind,
            enabled: true,
            closed: false,
            ledger: self.ledger.clone(),
        }))
    }

    async fn publish(&mut self, tracks: &[TrackId]) -> EngineResult<()> {
        if self.script.lock().fail_publish {
            return Err(EngineError::Rejected("publish".into()));
        }
        self.ledger.lock().published.extend_from_slice(tracks);
        Ok(())
    }

    async fn subscribe(&mut self, participant: &ParticipantId, kind: MediaKind) -> EngineResult<RemoteTrack> {
        if self.script.lock().fail_subscribe {
            return Err(EngineError::Network("subscribe".into()));
        }

        let id = TrackId(self.next_remote);
        self.next_remote += 1;
        self.ledger.lock().subscribed.push((participant.clone(), kind));

        Ok(RemoteTrack {
            id,
            participant: participant.clone(),
            kind,
        })
    }

    async fn play(&mut self, track: &RemoteTrack) -> EngineResult<()> {
        self.ledger.lock().played.push(track.id);
        Ok(())
    }

    async fn leave(&mut self) -> EngineResult<()> {
        self.ledger.lock().leaves += 1;
        if self.script.lock().fail_leave {
            return Err(EngineError::Network("leave".into()));
        }
        Ok(())
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<RemoteEvent>> {
        self.events.take()
    }
}

pub struct MockTrack {
    id: TrackId,
    kind: MediaKind,
    enabled: bool,
    closed: bool,
    ledger: Arc<Mutex<Ledger>>,
}

impl LocalMediaTrack for MockTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.ledger.lock().closed.push(self.id);
        }
    }
}

pub fn config() -> SessionConfig {
    SessionConfig::new("app-1", "room-1")
}

/// Wait until the session publishes a snapshot matching `f`.
pub async fn wait_for_snapshot(
    manager: &SessionManager,
    f: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut rx = manager.subscribe_snapshots();
    let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| f(s)))
        .await
        .expect("timed out waiting for snapshot")
        .expect("session coordinator stopped");
    snapshot.clone()
}

/// Poll the ledger until `f` holds.
pub async fn wait_for_ledger(engine: &MockEngine, f: impl Fn(&Ledger) -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !f(&engine.ledger.lock()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for engine");
}
