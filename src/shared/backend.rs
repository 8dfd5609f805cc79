//! API for messaging backends.
//!
//! The session doesn't own any sockets. Instead, backends are expected to:
//!
//! - Implement [`Transport`](transport::Transport) to deliver packets produced by the session.
//! - Implement [`PathCache`](path_cache::PathCache) to give remotely addressable objects short IDs.
//! - Call [`ReplicationSession::on_peer_connected`](crate::session::ReplicationSession::on_peer_connected)
//!   and [`ReplicationSession::on_peer_disconnected`](crate::session::ReplicationSession::on_peer_disconnected).
//! - Pass received packets that start with one of [`NetworkCommand`](super::command::NetworkCommand)
//!   bytes to [`ReplicationSession::receive`](crate::session::ReplicationSession::receive).
//!
//! You can also use [`test_scene`](crate::test_scene) as a reference.

pub mod path_cache;
pub mod transport;
