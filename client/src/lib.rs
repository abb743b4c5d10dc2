//! Maze shooter client.
//!
//! The client joins a server over the TCP control channel, then exchanges
//! position records over UDP while the match runs. It simulates its own
//! movement locally and smooths everyone else's, so the picture stays
//! responsive even when packets arrive unevenly.
//!
//! # Module Organization
//!
//! - [`network`]: the control handshake plus non-blocking channel draining
//! - [`game`]: the client's view of the match and its per-frame stepping

pub mod game;
pub mod network;
