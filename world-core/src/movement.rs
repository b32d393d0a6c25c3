//! C7: pure predicate over (old state, proposed state) producing accept or
//! teleport-back (§4.7).

use wire_protocol::{send_json, MessageOutput, TeleportMessage, MAX_MOVEMENT_DISTANCE};

use crate::form::{FormId, LocationalData};

fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// `validate(current, new_pos, new_cell, out)` (§4.7, P5). The threshold
/// comparison is `>=`, per the open question in §9 (c): the source uses
/// `>=` and we keep it.
pub fn validate(
    current: &LocationalData,
    new_pos: [f32; 3],
    new_cell: FormId,
    out: &mut dyn MessageOutput,
) -> bool {
    let cell_changed = new_cell != current.world_or_cell;
    let too_far = distance(current.pos, new_pos) >= MAX_MOVEMENT_DISTANCE;

    if cell_changed || too_far {
        let teleport = TeleportMessage::new(current.pos, current.rot, current.world_or_cell);
        send_json(out, &teleport, true);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        sent: Vec<(Vec<u8>, bool)>,
    }

    impl MessageOutput for RecordingSink {
        fn send(&mut self, bytes: &[u8], reliable: bool) {
            self.sent.push((bytes.to_vec(), reliable));
        }
    }

    fn current() -> LocationalData {
        LocationalData {
            pos: [0.0, 0.0, 0.0],
            rot: [0.0, 0.0, 0.0],
            world_or_cell: 0x3c,
        }
    }

    #[test]
    fn accepts_within_threshold() {
        let mut sink = RecordingSink { sent: vec![] };
        assert!(validate(&current(), [4095.0, 0.0, 0.0], 0x3c, &mut sink));
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn rejects_at_exact_threshold() {
        let mut sink = RecordingSink { sent: vec![] };
        assert!(!validate(&current(), [4096.0, 0.0, 0.0], 0x3c, &mut sink));
        assert_eq!(sink.sent.len(), 1);
        assert!(sink.sent[0].1);
    }

    #[test]
    fn rejects_on_cell_change_even_if_close() {
        let mut sink = RecordingSink { sent: vec![] };
        assert!(!validate(&current(), [0.0, 0.0, 0.0], 0x3d, &mut sink));
        assert_eq!(sink.sent.len(), 1);
    }
}
