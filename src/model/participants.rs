use std::fmt;

use crate::model::tracks::RemoteTrack;

/// Identity of a channel member, assigned by the transport engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> ParticipantId {
        ParticipantId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        ParticipantId(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub id: ParticipantId,
    pub video: Option<RemoteTrack>,
}

/// Remote participants in the order they first published video.
///
/// Holds at most one entry per participant id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteParticipants {
    entries: Vec<RemoteParticipant>,
}

impl RemoteParticipants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subscribed video track, replacing any previous one for the
    /// same participant in place.
    pub fn upsert_video(&mut self, id: ParticipantId, track: RemoteTrack) {
        match self.entries.iter_mut().find(|p| p.id == id) {
            Some(existing) => existing.video = Some(track),
            None => self.entries.push(RemoteParticipant {
                id,
                video: Some(track),
            }),
        }
    }

    /// Drop the participant's entry. Returns whether one was present.
    pub fn remove(&mut self, id: &ParticipantId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|p| &p.id != id);
        self.entries.len() != before
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&RemoteParticipant> {
        self.entries.iter().find(|p| &p.id == id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteParticipant> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<RemoteParticipant> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tracks::{MediaKind, TrackId};

    fn video(id: u64, who: &str) -> RemoteTrack {
        RemoteTrack {
            id: TrackId(id),
            participant: who.into(),
            kind: MediaKind::Video,
        }
    }

    #[test]
    fn upsert_keeps_a_single_entry() {
        let mut reg = RemoteParticipants::new();
        reg.upsert_video("u".into(), video(1, "u"));
        reg.upsert_video("u".into(), video(2, "u"));

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(&"u".into()).unwrap().video, Some(video(2, "u")));
    }

    #[test]
    fn upsert_preserves_order() {
        let mut reg = RemoteParticipants::new();
        reg.upsert_video("a".into(), video(1, "a"));
        reg.upsert_video("b".into(), video(2, "b"));
        reg.upsert_video("a".into(), video(3, "a"));

        let ids: Vec<_> = reg.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn removing_unknown_participant_is_harmless() {
        let mut reg = RemoteParticipants::new();
        reg.upsert_video("a".into(), video(1, "a"));

        assert!(!reg.remove(&"ghost".into()));
        assert_eq!(reg.len(), 1);
        assert!(reg.remove(&"a".into()));
        assert!(reg.is_empty());
    }
}
