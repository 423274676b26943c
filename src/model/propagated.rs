//! Remote events
//!
//! Events the transport engine reports about other channel members. They are
//! queued to the session coordinator and applied in arrival order.

use crate::model::{participants::ParticipantId, tracks::MediaKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    /// A participant started publishing a track of the given kind.
    Published(ParticipantId, MediaKind),

    /// A participant stopped publishing a track of the given kind.
    Unpublished(ParticipantId, MediaKind),

    /// A participant left the channel.
    Left(ParticipantId),
}

impl RemoteEvent {
    pub fn participant(&self) -> &ParticipantId {
        match self {
            RemoteEvent::Published(p, _) | RemoteEvent::Unpublished(p, _) | RemoteEvent::Left(p) => p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_names_its_participant() {
        let u = ParticipantId::new("u");

        assert_eq!(RemoteEvent::Published(u.clone(), MediaKind::Video).participant(), &u);
        assert_eq!(RemoteEvent::Unpublished(u.clone(), MediaKind::Audio).participant(), &u);
        assert_eq!(RemoteEvent::Left(u.clone()).participant(), &u);
    }
}
