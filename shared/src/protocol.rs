//! Wire encodings for the two session channels.
//!
//! The control channel (TCP) carries `key ":" value "\n"` text messages:
//! roster and lifecycle traffic that must arrive reliably and in order.
//! The state channel (UDP) carries fixed-size binary records for positions
//! and bullets; it is best-effort and a bad datagram simply decodes to
//! `None`, the NO_PACKET sentinel of the wire format.

use crate::math::Vec2;
use std::collections::VecDeque;

pub const KEY_VALUE_SEPARATOR: u8 = b':';
pub const KEY_VALUE_END: u8 = b'\n';

/// Encodes one control-channel message. Keys and values must not contain
/// the separator or terminator bytes; this is not validated.
pub fn key_value_message(key: &str, value: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(key.len() + value.len() + 2);
    message.extend_from_slice(key.as_bytes());
    message.push(KEY_VALUE_SEPARATOR);
    message.extend_from_slice(value.as_bytes());
    message.push(KEY_VALUE_END);
    message
}

/// Incremental decoder for the control channel.
///
/// Callers feed whatever bytes the socket had available and pop complete
/// messages; an incomplete tail stays buffered. `None` means "no message
/// yet", never an error.
#[derive(Debug, Default)]
pub struct ControlCodec {
    buf: VecDeque<u8>,
}

impl ControlCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pops the next complete `(key, value)` message, if one is buffered.
    /// Fields are raw bytes up to the frame markers; UTF-8 conversion
    /// happens per field, so multi-byte names survive intact.
    pub fn next_message(&mut self) -> Option<(String, String)> {
        let end = self.buf.iter().position(|&b| b == KEY_VALUE_END)?;

        let mut key = Vec::new();
        let mut value = Vec::new();
        let mut to_key = true;
        for byte in self.buf.drain(..=end) {
            if byte == KEY_VALUE_SEPARATOR && to_key {
                to_key = false;
            } else if byte != KEY_VALUE_END {
                let target = if to_key { &mut key } else { &mut value };
                target.push(byte);
            }
        }

        Some((
            String::from_utf8_lossy(&key).into_owned(),
            String::from_utf8_lossy(&value).into_owned(),
        ))
    }

    /// Pops `n` raw bytes, if buffered. Used for the maze grid block that
    /// follows the `start` message in the match bootstrap sequence.
    pub fn next_raw(&mut self, n: usize) -> Option<Vec<u8>> {
        if self.buf.len() < n {
            return None;
        }
        Some(self.buf.drain(..n).collect())
    }
}

/// Size of one state-channel record:
/// `type: u8, index: i8, x: f32, y: f32, direction: f32`.
pub const STATE_PACKET_SIZE: usize = 14;

const TAG_INIT_PLAYER: u8 = 1;
const TAG_UPDATE_PLAYER: u8 = 2;
const TAG_UPDATE_BULLET: u8 = 3;
const TAG_CLEAR_BULLETS: u8 = 4;

/// One state-channel record. The wire format reserves tag 0 for the
/// NO_PACKET sentinel, which this API expresses as `Option::None` on the
/// receive path instead of a variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatePacket {
    /// Hard-set of a player's position, sent on spawn and respawn.
    InitPlayer { index: i8, pos: Vec2, direction: f32 },
    /// Position report; clients interpolate toward it for remote indices.
    UpdatePlayer { index: i8, pos: Vec2, direction: f32 },
    /// One live bullet for this tick's broadcast; `index` is only a
    /// transient ordering slot, not an identity across ticks.
    UpdateBullet { index: i8, pos: Vec2, direction: f32 },
    /// Start of a tick's bullet broadcast: drop the previous bullet set.
    ClearBullets,
}

impl StatePacket {
    fn fields(&self) -> (u8, i8, Vec2, f32) {
        match *self {
            StatePacket::InitPlayer {
                index,
                pos,
                direction,
            } => (TAG_INIT_PLAYER, index, pos, direction),
            StatePacket::UpdatePlayer {
                index,
                pos,
                direction,
            } => (TAG_UPDATE_PLAYER, index, pos, direction),
            StatePacket::UpdateBullet {
                index,
                pos,
                direction,
            } => (TAG_UPDATE_BULLET, index, pos, direction),
            StatePacket::ClearBullets => (TAG_CLEAR_BULLETS, 0, Vec2::ZERO, 0.0),
        }
    }

    pub fn encode(&self) -> [u8; STATE_PACKET_SIZE] {
        let (tag, index, pos, direction) = self.fields();

        let mut buf = [0u8; STATE_PACKET_SIZE];
        buf[0] = tag;
        buf[1] = index as u8;
        buf[2..6].copy_from_slice(&pos.x.to_ne_bytes());
        buf[6..10].copy_from_slice(&pos.y.to_ne_bytes());
        buf[10..14].copy_from_slice(&direction.to_ne_bytes());
        buf
    }

    /// Decodes one record. Truncated data or an unknown tag yields `None`;
    /// the state channel never treats bad input as an error.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < STATE_PACKET_SIZE {
            return None;
        }

        let index = bytes[1] as i8;
        let pos = Vec2::new(
            f32::from_ne_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
            f32::from_ne_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        );
        let direction = f32::from_ne_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);

        match bytes[0] {
            TAG_INIT_PLAYER => Some(StatePacket::InitPlayer {
                index,
                pos,
                direction,
            }),
            TAG_UPDATE_PLAYER => Some(StatePacket::UpdatePlayer {
                index,
                pos,
                direction,
            }),
            TAG_UPDATE_BULLET => Some(StatePacket::UpdateBullet {
                index,
                pos,
                direction,
            }),
            TAG_CLEAR_BULLETS => Some(StatePacket::ClearBullets),
            _ => None,
        }
    }
}
