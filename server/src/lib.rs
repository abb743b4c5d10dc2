//! Authoritative server for the maze shooter.
//!
//! The server owns the only writable copy of the world. Clients talk to it
//! over two channels: a reliable TCP control channel for roster and
//! lifecycle messages (`key:value` text) and a best-effort UDP state channel
//! for positions and bullets (fixed-size binary records).
//!
//! ## Module organization
//!
//! - [`session`]: the shared registries (players, UDP return addresses,
//!   control senders) behind one lock.
//! - [`network`]: the TCP listener, one handler task per connection, and
//!   the [`network::Server`] entry point tying everything together.
//! - [`game`]: the fixed-tick simulation loop and match lifecycle.
//!
//! ## Concurrency model
//!
//! One spawned task per accepted connection plus a single simulation task
//! that owns the UDP socket. Connection tasks block only on their own
//! socket reads; the simulation task never blocks except on its tick
//! pacing, draining UDP with non-blocking receives. Every access to the
//! shared session is a short critical section that is released before any
//! socket await.
//!
//! A dropped control connection is the only disconnect signal; there is no
//! heartbeat, so a silently hung client is never evicted.

pub mod game;
pub mod network;
pub mod session;
