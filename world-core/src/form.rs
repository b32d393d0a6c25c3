//! The form hierarchy (§3, §9). The original is a deep C++ inheritance
//! tree (`MpForm` <- `MpObjectReference` <- `MpActor`) with `dynamic_cast`
//! at every seam; per the REDESIGN FLAGS this becomes a tagged enum with a
//! small capability trait, no back pointer to the owning `WorldState`.

use std::collections::HashSet;

use crate::change_journal::ChangeForm;

/// 32-bit global identifier. `< DYNAMIC_FORM_ID_START` is persistent
/// (backed by ESPM); `>=` is runtime-allocated.
pub type FormId = u32;

/// IDs at or above this are dynamic (created at runtime, no ESPM backing).
pub const DYNAMIC_FORM_ID_START: FormId = 0xFF000000;

pub fn is_persistent(id: FormId) -> bool {
    id < DYNAMIC_FORM_ID_START
}

/// A local-id-within-file plus the file it belongs to. Converts to a
/// global [`FormId`] against the load order: the file's position in
/// `file_names` becomes the high byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormDesc {
    pub local_id: u32,
    pub file_name: String,
}

impl FormDesc {
    pub fn new(local_id: u32, file_name: impl Into<String>) -> Self {
        FormDesc {
            local_id,
            file_name: file_name.into(),
        }
    }

    /// Looks `file_name` up in the load order and combines it with
    /// `local_id`'s low 24 bits. Returns `None` if the file isn't loaded.
    pub fn to_form_id(&self, file_names: &[String]) -> Option<FormId> {
        let file_idx = file_names.iter().position(|f| f == &self.file_name)?;
        Some(((file_idx as u32) << 24) | (self.local_id & 0x00FF_FFFF))
    }

    pub fn from_form_id(id: FormId, file_names: &[String]) -> Option<FormDesc> {
        let file_idx = (id >> 24) as usize;
        let file_name = file_names.get(file_idx)?.clone();
        Some(FormDesc {
            local_id: id & 0x00FF_FFFF,
            file_name,
        })
    }
}

/// Position, rotation (degrees) and the cell/world this reference sits in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocationalData {
    pub pos: [f32; 3],
    pub rot: [f32; 3],
    pub world_or_cell: FormId,
}

/// Character-customization blob. JSON-serializable so it can be carried
/// verbatim in `UpdateLook` messages and change forms without `world-core`
/// needing to understand its internal shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Look(pub serde_json::Value);

impl Look {
    pub fn to_json(&self) -> String {
        self.0.to_string()
    }

    pub fn from_json(s: &str) -> Result<Look, serde_json::Error> {
        Ok(Look(serde_json::from_str(s)?))
    }
}

/// Opaque user identifier for the (out-of-scope) session layer. Forms only
/// need to remember which users are subscribed/bound; they never talk to
/// the session layer directly.
pub type UserId = u32;

/// An addressable, located world object: `STAT`, `DOOR`, `NPC_`, ...
#[derive(Debug, Clone)]
pub struct ObjectReference {
    pub form_id: FormId,
    pub base_id: FormId,
    pub base_type: String,
    pub loc: LocationalData,
    pub primitive_bounds_div2: Option<[f32; 3]>,
    /// Dense index for O(1) by-index lookup (C1), assigned at `add`.
    pub dense_index: Option<u32>,
    /// Neighbors currently observing this reference.
    pub subscribers: HashSet<FormId>,
}

impl ObjectReference {
    pub fn new(form_id: FormId, base_id: FormId, base_type: impl Into<String>, loc: LocationalData) -> Self {
        ObjectReference {
            form_id,
            base_id,
            base_type: base_type.into(),
            loc,
            primitive_bounds_div2: None,
            dense_index: None,
            subscribers: HashSet::new(),
        }
    }

    /// Overlay-semantics position update: no neighbor notification, used
    /// by the lazy ESPM loader when a record for an already-live form is
    /// attached from a later (overlay) file.
    pub fn set_pos_and_angle_silent(&mut self, pos: [f32; 3], rot: [f32; 3]) {
        self.loc.pos = pos;
        self.loc.rot = rot;
    }

    pub fn to_change_form(&self) -> ChangeForm {
        ChangeForm::object_reference(self)
    }

    pub fn apply_change_form(&mut self, cf: &ChangeForm) {
        self.loc.pos = cf.pos;
        self.loc.rot = cf.rot;
        self.loc.world_or_cell = cf.world_or_cell;
    }

    /// Fired by `WorldState::tick`'s reloot drain. The actual respawn
    /// rules (what resets, what drops) are inventory/loot-table logic, out
    /// of scope per §1; this is the hook the scheduler calls into.
    pub fn do_reloot(&mut self) {
        tracing::debug!(form_id = self.form_id, "reloot fired");
    }
}

/// An `ObjectReference` that additionally has a character: customization
/// (`look`), equipment, race-menu state and a profile binding.
#[derive(Debug, Clone)]
pub struct Actor {
    pub base: ObjectReference,
    pub look: Option<Look>,
    pub equipment: Option<serde_json::Value>,
    pub is_race_menu_open: bool,
    pub profile_id: Option<i32>,
}

impl Actor {
    pub fn new(form_id: FormId, base_id: FormId, loc: LocationalData) -> Self {
        Actor {
            base: ObjectReference::new(form_id, base_id, "NPC_", loc),
            look: None,
            equipment: None,
            is_race_menu_open: false,
            profile_id: None,
        }
    }

    pub fn to_change_form(&self) -> ChangeForm {
        ChangeForm::actor(self)
    }

    pub fn apply_change_form(&mut self, cf: &ChangeForm) {
        self.base.apply_change_form(cf);
        if let Some(look) = &cf.look {
            self.look = Some(look.clone());
        }
        if let Some(equipment) = &cf.equipment {
            self.equipment = Some(equipment.clone());
        }
    }
}

/// Capability surface over the top-level form handle. Variants that don't
/// support a capability return `None`/are skipped - the equivalent of a
/// failed `dynamic_cast` in the original, without ever downcasting.
#[derive(Debug, Clone)]
pub enum Form {
    Generic(GenericForm),
    ObjectReference(ObjectReference),
    Actor(Actor),
}

/// The base case: any addressable entity that is neither located nor
/// characterized - used in tests and for forms like world spaces that only
/// need a stable id.
#[derive(Debug, Clone)]
pub struct GenericForm {
    pub form_id: FormId,
}

impl Form {
    pub fn form_id(&self) -> FormId {
        match self {
            Form::Generic(f) => f.form_id,
            Form::ObjectReference(f) => f.form_id,
            Form::Actor(f) => f.base.form_id,
        }
    }

    pub fn dense_index(&self) -> Option<u32> {
        match self {
            Form::Generic(_) => None,
            Form::ObjectReference(f) => f.dense_index,
            Form::Actor(f) => f.base.dense_index,
        }
    }

    pub fn set_dense_index(&mut self, idx: u32) {
        match self {
            Form::Generic(_) => {}
            Form::ObjectReference(f) => f.dense_index = Some(idx),
            Form::Actor(f) => f.base.dense_index = Some(idx),
        }
    }

    pub fn as_object_reference(&self) -> Option<&ObjectReference> {
        match self {
            Form::ObjectReference(f) => Some(f),
            Form::Actor(f) => Some(&f.base),
            Form::Generic(_) => None,
        }
    }

    pub fn as_object_reference_mut(&mut self) -> Option<&mut ObjectReference> {
        match self {
            Form::ObjectReference(f) => Some(f),
            Form::Actor(f) => Some(&mut f.base),
            Form::Generic(_) => None,
        }
    }

    pub fn as_actor(&self) -> Option<&Actor> {
        match self {
            Form::Actor(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_actor_mut(&mut self) -> Option<&mut Actor> {
        match self {
            Form::Actor(f) => Some(f),
            _ => None,
        }
    }

    /// Invoked when a `register_for_single_update` timer resolves for this
    /// form (§4.8). Dispatching the actual Papyrus `OnUpdate` event is the
    /// VM interpreter's job (out of scope, §1); this is the hook point
    /// `ScriptVmHost` calls into.
    pub fn on_scheduled_update(&mut self) {
        tracing::debug!(form_id = self.form_id(), "scheduled update fired");
    }

    /// `if it exists and is an ObjectReference, call do_reloot()` (§4.10) -
    /// `Actor` is a subtype of `ObjectReference` (§3), so this goes through
    /// the capability accessor rather than matching the bare variant.
    pub fn do_reloot(&mut self) {
        if let Some(refr) = self.as_object_reference_mut() {
            refr.do_reloot();
        }
    }

    /// Snapshots this form into a [`ChangeForm`] for the journal.
    /// `Generic` forms carry no location/look state, so they have nothing
    /// to persist this way.
    pub fn to_change_form(&self) -> Option<ChangeForm> {
        match self {
            Form::ObjectReference(f) => Some(f.to_change_form()),
            Form::Actor(f) => Some(f.to_change_form()),
            Form::Generic(_) => None,
        }
    }

    pub fn apply_change_form(&mut self, cf: &ChangeForm) -> Result<(), crate::error::WorldStateError> {
        match self {
            Form::ObjectReference(f) => {
                f.apply_change_form(cf);
                Ok(())
            }
            Form::Actor(f) => {
                f.apply_change_form(cf);
                Ok(())
            }
            Form::Generic(_) => Err(crate::error::WorldStateError::CastFailed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_desc_round_trips() {
        let files = vec!["Skyrim.esm".to_string(), "Update.esm".to_string()];
        let desc = FormDesc::new(0x000ABC, "Update.esm");
        let id = desc.to_form_id(&files).unwrap();
        assert_eq!(id, 0x01000ABC);
        let back = FormDesc::from_form_id(id, &files).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn look_json_round_trip() {
        let original = Look(serde_json::json!({"hairColor": 3, "weight": 50.0}));
        let json = original.to_json();
        let parsed = Look::from_json(&json).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn dynamic_id_threshold() {
        assert!(is_persistent(0x00FFFFFF));
        assert!(!is_persistent(DYNAMIC_FORM_ID_START));
    }
}
