//! Wire framing shared between the world-state core and any transport that
//! hosts it. This crate owns byte layout only - no networking, no game
//! logic. Mirrors the role `protocol` plays for `relay-server` in the
//! sibling workspace this one was grown from: ids and struct layouts that
//! both sides of a connection must agree on, nothing else.

use serde::{Deserialize, Serialize};

/// The legacy single-byte prefix every application message carries before
/// its payload. Kept as a named constant rather than a bare `0` because any
/// future framing revision needs a reserved low id to stay backwards
/// compatible with clients that only understand this one.
pub const MIN_PACKET_ID: u8 = 0;

/// The per-tick max straight-line displacement a client may report before
/// [`MovementValidator`](../world_core/movement/struct.MovementValidator.html)
/// rejects the update. Lives here, not in `world-core`, because both a
/// client and the server need to agree on it to avoid false teleport-backs.
pub const MAX_MOVEMENT_DISTANCE: f32 = 4096.0;

/// Message type discriminants carried in the `t` field of a [`Envelope`].
/// Distinct from the ad hoc `{"type": "..."}` messages ([`TeleportMessage`],
/// [`SetRaceMenuOpenMessage`]) that are sent as their own top-level JSON
/// object rather than wrapped in an envelope - that split mirrors the two
/// message shapes actually used by the system this was distilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MsgType {
    UpdateLook = 0,
    UpdateMovement = 1,
    CustomEvent = 2,
}

impl MsgType {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// A structured, polled-style update: `{t, idx, data}`. `idx` identifies
/// which form the update concerns (its dense index, where the form has
/// one); `data` is the type-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub t: u32,
    pub idx: u32,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(msg_type: MsgType, idx: u32, data: T) -> Self {
        Envelope {
            t: msg_type.as_u32(),
            idx,
            data,
        }
    }
}

/// Sent on movement-validation failure, see [`MAX_MOVEMENT_DISTANCE`].
/// Authoritative: the client must hard-set its local state to this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleportMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub pos: [f32; 3],
    pub rot: [f32; 3],
    #[serde(rename = "worldOrCell")]
    pub world_or_cell: u32,
}

impl TeleportMessage {
    pub fn new(pos: [f32; 3], rot: [f32; 3], world_or_cell: u32) -> Self {
        TeleportMessage {
            kind: "teleport".to_string(),
            pos,
            rot,
            world_or_cell,
        }
    }
}

/// Sent whenever an actor's race-menu-open flag actually changes (the
/// operation is idempotent - no message is sent for a redundant call).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRaceMenuOpenMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub open: bool,
}

impl SetRaceMenuOpenMessage {
    pub fn new(open: bool) -> Self {
        SetRaceMenuOpenMessage {
            kind: "setRaceMenuOpen".to_string(),
            open,
        }
    }
}

/// Outbound sink for framed application messages, reliable or not. This is
/// the `MessageOutput` contract from the spec: transports implement it,
/// `world-core` only ever calls it.
pub trait MessageOutput {
    fn send(&mut self, bytes: &[u8], reliable: bool);
}

/// Frames `value` as `MIN_PACKET_ID` followed by its JSON encoding and
/// hands it to `out`. Used for every world-state-originated notification
/// (teleport-back, race-menu state, look updates, custom Papyrus events).
pub fn send_json<T: Serialize>(out: &mut dyn MessageOutput, value: &T, reliable: bool) {
    let mut framed = Vec::with_capacity(1 + 64);
    framed.push(MIN_PACKET_ID);
    match serde_json::to_vec(value) {
        Ok(body) => {
            framed.extend_from_slice(&body);
            out.send(&framed, reliable);
        }
        Err(_) => {
            // A message that cannot serialize is a programmer error in a
            // type passed to this function, not a transport failure - we
            // drop it rather than panic the tick thread.
        }
    }
}

pub mod movement;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Dummy {
        value: i32,
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let env = Envelope::new(MsgType::UpdateLook, 7, Dummy { value: 42 });
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["t"], 0);
        assert_eq!(json["idx"], 7);
        assert_eq!(json["data"]["value"], 42);
    }

    #[test]
    fn teleport_message_shape() {
        let msg = TeleportMessage::new([1.0, 2.0, 3.0], [0.0, 0.0, 90.0], 0x3c);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "teleport");
        assert_eq!(json["worldOrCell"], 0x3c);
    }

    struct RecordingSink {
        sent: Vec<(Vec<u8>, bool)>,
    }

    impl MessageOutput for RecordingSink {
        fn send(&mut self, bytes: &[u8], reliable: bool) {
            self.sent.push((bytes.to_vec(), reliable));
        }
    }

    #[test]
    fn send_json_prefixes_min_packet_id() {
        let mut sink = RecordingSink { sent: Vec::new() };
        send_json(&mut sink, &SetRaceMenuOpenMessage::new(true), true);
        assert_eq!(sink.sent.len(), 1);
        let (bytes, reliable) = &sink.sent[0];
        assert_eq!(bytes[0], MIN_PACKET_ID);
        assert!(reliable);
        let parsed: serde_json::Value = serde_json::from_slice(&bytes[1..]).unwrap();
        assert_eq!(parsed["type"], "setRaceMenuOpen");
        assert_eq!(parsed["open"], true);
    }
}
