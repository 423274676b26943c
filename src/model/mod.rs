//! Data models for the relay hub and media sessions
//!
//! Connections and their registry belong to the hub; tracks, participants
//! and remote events belong to sessions. The envelope is the shared wire
//! framing.

pub mod connection;
pub mod participants;
pub mod payload;
pub mod propagated;
pub mod registry;
pub mod tracks;
