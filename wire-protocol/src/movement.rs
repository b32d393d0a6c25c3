//! The 30-byte packed binary movement packet. Hand-rolled little-endian
//! encode/decode using `bytes`, the same way the teacher workspace encodes
//! its own postcard-free framing bits in `web_socket_interface.rs`.

use bytes::{Buf, BufMut, BytesMut};

pub const MOVEMENT_PACKET_SIZE: usize = 30;

/// `Standing=0, Walking=1, Running=2, Sprinting=3`, packed into bits 0-1 of
/// `movement_flags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Standing = 0,
    Walking = 1,
    Running = 2,
    Sprinting = 3,
}

impl RunMode {
    fn from_bits(bits: i32) -> RunMode {
        match bits & 0b11 {
            0 => RunMode::Standing,
            1 => RunMode::Walking,
            2 => RunMode::Running,
            _ => RunMode::Sprinting,
        }
    }
}

/// Decoded form of `movement_flags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementFlags {
    pub run_mode: RunMode,
    pub is_in_jump_state: bool,
    pub is_sneaking: bool,
    pub is_blocking: bool,
    pub is_weap_drawn: bool,
}

const IS_IN_JUMP_STATE: i32 = 1 << 1;
const IS_SNEAKING: i32 = 1 << 2;
const IS_BLOCKING: i32 = 1 << 3;
const IS_WEAP_DRAWN: i32 = 1 << 4;

impl MovementFlags {
    pub fn from_bits(bits: i32) -> MovementFlags {
        MovementFlags {
            run_mode: RunMode::from_bits(bits),
            is_in_jump_state: bits & IS_IN_JUMP_STATE != 0,
            is_sneaking: bits & IS_SNEAKING != 0,
            is_blocking: bits & IS_BLOCKING != 0,
            is_weap_drawn: bits & IS_WEAP_DRAWN != 0,
        }
    }

    pub fn to_bits(self) -> i32 {
        let mut bits = self.run_mode as i32;
        if self.is_in_jump_state {
            bits |= IS_IN_JUMP_STATE;
        }
        if self.is_sneaking {
            bits |= IS_SNEAKING;
        }
        if self.is_blocking {
            bits |= IS_BLOCKING;
        }
        if self.is_weap_drawn {
            bits |= IS_WEAP_DRAWN;
        }
        bits
    }
}

/// Decoded movement packet. `angle_z_deg` is already converted out of the
/// packed `u16` representation (`round(deg / 360 * 65535)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementPacket {
    pub id: i32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub angle_z_deg: f32,
    pub direction: i32,
    pub movement_flags: MovementFlags,
    pub world_or_cell: i32,
}

pub fn pack_angle(angle_deg: f32) -> u16 {
    (angle_deg / 360.0 * 65535.0).round() as u16
}

pub fn unpack_angle(angle_packed: u16) -> f32 {
    angle_packed as f32 / 65535.0 * 360.0
}

impl MovementPacket {
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(MOVEMENT_PACKET_SIZE);
        buf.put_i32_le(self.id);
        buf.put_f32_le(self.x);
        buf.put_f32_le(self.y);
        buf.put_f32_le(self.z);
        buf.put_u16_le(pack_angle(self.angle_z_deg));
        buf.put_i32_le(self.direction);
        buf.put_i32_le(self.movement_flags.to_bits());
        buf.put_i32_le(self.world_or_cell);
        buf
    }

    pub fn decode(mut bytes: &[u8]) -> Result<MovementPacket, String> {
        if bytes.len() != MOVEMENT_PACKET_SIZE {
            return Err(format!(
                "movement packet must be {MOVEMENT_PACKET_SIZE} bytes, got {}",
                bytes.len()
            ));
        }
        let id = bytes.get_i32_le();
        let x = bytes.get_f32_le();
        let y = bytes.get_f32_le();
        let z = bytes.get_f32_le();
        let angle_z_deg = unpack_angle(bytes.get_u16_le());
        let direction = bytes.get_i32_le();
        let movement_flags = MovementFlags::from_bits(bytes.get_i32_le());
        let world_or_cell = bytes.get_i32_le();
        Ok(MovementPacket {
            id,
            x,
            y,
            z,
            angle_z_deg,
            direction,
            movement_flags,
            world_or_cell,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let packet = MovementPacket {
            id: 0xff000abc_u32 as i32,
            x: 1.5,
            y: -2.25,
            z: 100.0,
            angle_z_deg: 90.0,
            direction: 1,
            movement_flags: MovementFlags {
                run_mode: RunMode::Running,
                is_in_jump_state: true,
                is_sneaking: false,
                is_blocking: false,
                is_weap_drawn: true,
            },
            world_or_cell: 0x3c,
        };
        let encoded = packet.encode();
        assert_eq!(encoded.len(), MOVEMENT_PACKET_SIZE);
        let decoded = MovementPacket::decode(&encoded).unwrap();
        assert_eq!(decoded.id, packet.id);
        assert!((decoded.angle_z_deg - 90.0).abs() < 0.01);
        assert_eq!(decoded.movement_flags, packet.movement_flags);
        assert_eq!(decoded.world_or_cell, packet.world_or_cell);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(MovementPacket::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn flag_bits_match_spec() {
        let flags = MovementFlags {
            run_mode: RunMode::Sprinting,
            is_in_jump_state: true,
            is_sneaking: true,
            is_blocking: true,
            is_weap_drawn: true,
        };
        assert_eq!(flags.to_bits() & 0b11, 3);
        assert_ne!(flags.to_bits() & (1 << 1), 0);
    }
}
