//! C3: coalesces per-form mutations into a snapshot set and drains them to
//! save storage one batch at a time (§4.3).

use std::collections::HashMap;

use crate::error::{Result, WorldStateError};
use crate::form::{Actor, FormId, Look, ObjectReference};

/// Which concrete form type a [`ChangeForm`] snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecType {
    Refr,
    Achr,
}

impl RecType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecType::Refr => "REFR",
            RecType::Achr => "ACHR",
        }
    }

    pub fn parse(s: &str) -> Result<RecType> {
        match s {
            "REFR" => Ok(RecType::Refr),
            "ACHR" => Ok(RecType::Achr),
            other => Err(WorldStateError::UnknownChangeFormType(other.to_string())),
        }
    }
}

/// Serializable snapshot of one `ObjectReference`/`Actor`. The unit of
/// persistence - what gets upserted to save storage.
#[derive(Debug, Clone)]
pub struct ChangeForm {
    pub rec_type: RecType,
    pub form_id: FormId,
    pub base_id: FormId,
    pub pos: [f32; 3],
    pub rot: [f32; 3],
    pub world_or_cell: FormId,
    pub look: Option<Look>,
    pub equipment: Option<serde_json::Value>,
}

impl ChangeForm {
    pub fn object_reference(refr: &ObjectReference) -> ChangeForm {
        ChangeForm {
            rec_type: RecType::Refr,
            form_id: refr.form_id,
            base_id: refr.base_id,
            pos: refr.loc.pos,
            rot: refr.loc.rot,
            world_or_cell: refr.loc.world_or_cell,
            look: None,
            equipment: None,
        }
    }

    pub fn actor(actor: &Actor) -> ChangeForm {
        ChangeForm {
            rec_type: RecType::Achr,
            form_id: actor.base.form_id,
            base_id: actor.base.base_id,
            pos: actor.base.loc.pos,
            rot: actor.base.loc.rot,
            world_or_cell: actor.base.loc.world_or_cell,
            look: actor.look.clone(),
            equipment: actor.equipment.clone(),
        }
    }
}

/// State: `changes: map<FormId, ChangeForm>`, `busy: bool` (§4.3). Last
/// write wins per `FormId` - callers are responsible for I4 (never calling
/// `record` while a load is in progress for that form).
#[derive(Debug, Default)]
pub struct ChangeJournal {
    changes: HashMap<FormId, ChangeForm>,
    busy: bool,
}

impl ChangeJournal {
    pub fn new() -> Self {
        ChangeJournal::default()
    }

    /// Overwrites any prior entry for the same `FormId`.
    pub fn record(&mut self, change_form: ChangeForm) {
        self.changes.insert(change_form.form_id, change_form);
    }

    /// Removes any pending entry for `form_id` without recording it. Used
    /// by `load_change_form` to enforce I4 even if something slipped
    /// through during a partial load.
    pub fn discard(&mut self, form_id: FormId) {
        self.changes.remove(&form_id);
    }

    pub fn contains(&self, form_id: FormId) -> bool {
        self.changes.contains_key(&form_id)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Atomically moves all entries out, leaving the map empty. Callers
    /// must check `!is_busy()` first - draining while busy would violate
    /// I8 (at most one upsert in flight).
    pub fn drain(&mut self) -> Vec<ChangeForm> {
        self.changes.drain().map(|(_, cf)| cf).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::LocationalData;

    fn sample(form_id: FormId) -> ChangeForm {
        ChangeForm {
            rec_type: RecType::Refr,
            form_id,
            base_id: 1,
            pos: [0.0, 0.0, 0.0],
            rot: [0.0, 0.0, 0.0],
            world_or_cell: 0x3c,
            look: None,
            equipment: None,
        }
    }

    #[test]
    fn record_coalesces_last_write_wins() {
        let mut journal = ChangeJournal::new();
        for i in 0..5 {
            let mut cf = sample(42);
            cf.pos = [i as f32, 0.0, 0.0];
            journal.record(cf);
        }
        assert_eq!(journal.changes.len(), 1);
        let drained = journal.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].pos[0], 4.0);
    }

    #[test]
    fn drain_empties_and_busy_tracks_in_flight() {
        let mut journal = ChangeJournal::new();
        journal.record(sample(1));
        assert!(!journal.is_empty());
        journal.set_busy(true);
        let drained = journal.drain();
        assert_eq!(drained.len(), 1);
        assert!(journal.is_empty());
        // A mutation during the in-flight upsert coalesces into a fresh entry.
        journal.record(sample(1));
        assert!(!journal.is_empty());
        journal.set_busy(false);
        assert!(!journal.is_busy());
    }

    #[test]
    fn object_reference_round_trips_into_change_form() {
        let refr = ObjectReference::new(
            7,
            1,
            "STAT",
            LocationalData {
                pos: [1.0, 2.0, 3.0],
                rot: [0.0, 0.0, 0.0],
                world_or_cell: 0x3c,
            },
        );
        let cf = refr.to_change_form();
        assert_eq!(cf.form_id, 7);
        assert_eq!(cf.pos, [1.0, 2.0, 3.0]);
        assert_eq!(cf.rec_type, RecType::Refr);
    }
}
