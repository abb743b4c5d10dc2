//! Shared session state for one match.
//!
//! The `Session` owns every registry that connection handlers and the
//! simulation loop share: the player map, UDP return addresses and the
//! control-channel senders. It lives behind one `Arc<RwLock<_>>`; callers
//! keep critical sections to single registry operations and never hold the
//! lock across a socket await. Control messages are queued on per-player
//! `mpsc` senders and written to the TCP stream by that connection's writer
//! task, so queueing is lock-friendly and non-blocking.

use log::info;
use shared::protocol::key_value_message;
use shared::{Player, Vec2};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Byte queue feeding one connection's writer task.
pub type ControlSender = mpsc::UnboundedSender<Vec<u8>>;

#[derive(Default)]
pub struct Session {
    players: HashMap<i8, Player>,
    addresses: HashMap<i8, SocketAddr>,
    controls: HashMap<i8, ControlSender>,
    next_index: i8,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new player and returns their index. Indices increase
    /// monotonically for the lifetime of the session and are never reused,
    /// even after a disconnect.
    pub fn register_player(&mut self, name: &str, spawn: Vec2, control: ControlSender) -> i8 {
        let index = self.next_index;
        self.next_index += 1;

        info!("Player {} ({}) joined at ({}, {})", index, name, spawn.x, spawn.y);
        self.players
            .insert(index, Player::new(index, spawn, name.to_string()));
        self.controls.insert(index, control);

        index
    }

    /// Removes a player from every registry. Returns true if they were
    /// still registered.
    pub fn deregister_player(&mut self, index: i8) -> bool {
        self.addresses.remove(&index);
        self.controls.remove(&index);
        if let Some(player) = self.players.remove(&index) {
            info!("Player {} ({}) left", index, player.name);
            true
        } else {
            false
        }
    }

    /// Records the UDP return address reported by a client.
    pub fn set_address(&mut self, index: i8, addr: SocketAddr) {
        self.addresses.insert(index, addr);
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Number of players that have reported a UDP return address.
    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player(&self, index: i8) -> Option<&Player> {
        self.players.get(&index)
    }

    pub fn player_mut(&mut self, index: i8) -> Option<&mut Player> {
        self.players.get_mut(&index)
    }

    pub fn player_indices(&self) -> Vec<i8> {
        self.players.keys().copied().collect()
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Current roster names, for replay to a newly accepted connection.
    pub fn roster(&self) -> Vec<String> {
        self.players.values().map(|p| p.name.clone()).collect()
    }

    /// Every known UDP return address, for state-channel broadcasts.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.addresses.values().copied().collect()
    }

    /// Queues a control message for one player. A closed queue means the
    /// connection is already going away; the message is silently dropped.
    pub fn send_control(&self, index: i8, key: &str, value: &str) {
        if let Some(control) = self.controls.get(&index) {
            let _ = control.send(key_value_message(key, value));
        }
    }

    /// Queues a control message for every connected player.
    pub fn broadcast_control(&self, key: &str, value: &str) {
        let message = key_value_message(key, value);
        for control in self.controls.values() {
            let _ = control.send(message.clone());
        }
    }

    /// Queues raw bytes (the bootstrap maze grid) for every player.
    pub fn broadcast_raw(&self, bytes: &[u8]) {
        for control in self.controls.values() {
            let _ = control.send(bytes.to_vec());
        }
    }
}
