//! C5: on-demand materialization of persistent forms from the static
//! content database (§4.5). The ESPM parser itself is out of scope (§1);
//! only the read-only browser contract from §6 is modeled here.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::change_journal::ChangeForm;
use crate::form::{Actor, Form, FormId, LocationalData, ObjectReference};
use crate::registry::FormRegistry;

/// `CONT`/`DOOR`/etc. base-record categories that `attach_record` accepts
/// outright; `FLOR`/`TREE` additionally require a non-null `result_item`.
const LOOTABLE_BASE_TYPES: &[&str] = &["NPC_", "FURN", "ACTI", "WEAP", "ARMO", "ALCH", "DOOR", "CONT"];
const CONDITIONAL_HARVEST_TYPES: &[&str] = &["FLOR", "TREE"];

/// The crime-factions form list id (§4.5) - NPCs in any of these factions
/// never get spawned as lootable/attackable world population.
pub const CRIME_FACTIONS_LIST: FormId = 0x26953;

/// `INITIALLY_DISABLED` record flag.
pub const INITIALLY_DISABLED: u32 = 0x800;

/// Per-file local->global id remapping table, indexed by the file's
/// position in the load order.
#[derive(Debug, Clone, Default)]
pub struct FileMapping {
    pub file_idx: u32,
}

impl FileMapping {
    pub fn map(&self, local_id: u32) -> FormId {
        ((self.file_idx) << 24) | (local_id & 0x00FF_FFFF)
    }
}

/// Reference-record payload (the `REFR`/`ACHR` record body).
#[derive(Debug, Clone)]
pub struct RefData {
    pub base_id: u32,
    pub essential: bool,
    pub protected: bool,
    pub factions: Vec<u32>,
}

/// A single ESPM record as exposed by the (out-of-scope) parser.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: u32,
    pub flags: u32,
    pub base_type: String,
    pub ref_data: Option<RefData>,
    pub result_item: Option<u32>,
    pub world_or_cell: Option<FormId>,
    pub primitive_bounds_div2: Option<[f32; 3]>,
    pub pos: [f32; 3],
    pub rot_radians: [f32; 3],
}

/// One `lookup_all` hit: the record, which file it came from, and a
/// closure equivalent for globalizing ids local to that file.
pub struct LookupHit<'a> {
    pub record: &'a Record,
    pub file_idx: u32,
}

/// Read-only browser over the static database (§6). The parser and its
/// storage live entirely outside this workspace; tests supply a fake.
pub trait EspmBrowser {
    fn lookup_by_id(&self, id: FormId) -> Option<&Record>;
    fn lookup_by_id_all(&self, id: FormId) -> Vec<LookupHit<'_>>;
    fn get_mapping(&self, file_idx: u32) -> FileMapping;
    fn records_at_pos(&self, world: FormId, cx: i32, cy: i32) -> Vec<Vec<&Record>>;
    fn file_names(&self) -> &[String];
    /// Globalizes a base-game faction/form id against this record's own file.
    fn to_global_id(&self, file_idx: u32, local_id: u32) -> FormId {
        self.get_mapping(file_idx).map(local_id)
    }
}

fn radians_to_degrees(rot: [f32; 3]) -> [f32; 3] {
    rot.map(|r| r * 180.0 / std::f32::consts::PI)
}

/// Materializes persistent forms lazily, honoring `attach_record`'s
/// filters and the overlay/deferred-change-form interactions of §4.5.
pub struct EspmLazyLoader {
    deferred_change_forms: HashMap<FormId, ChangeForm>,
}

impl Default for EspmLazyLoader {
    fn default() -> Self {
        EspmLazyLoader {
            deferred_change_forms: HashMap::new(),
        }
    }
}

impl EspmLazyLoader {
    pub fn new() -> Self {
        EspmLazyLoader::default()
    }

    /// Parks a change form for a not-yet-materialized persistent form
    /// (I7). Consumed exactly once by `load_form` when that form first
    /// materializes.
    pub fn defer_change_form(&mut self, form_id: FormId, cf: ChangeForm) {
        self.deferred_change_forms.insert(form_id, cf);
    }

    pub fn has_deferred(&self, form_id: FormId) -> bool {
        self.deferred_change_forms.contains_key(&form_id)
    }

    /// `load_form(id)` (§4.5). Returns `true` if at least one record
    /// attached.
    pub fn load_form(&mut self, browser: &dyn EspmBrowser, registry: &mut FormRegistry, id: FormId) -> bool {
        let hits: Vec<(Record, u32)> = browser
            .lookup_by_id_all(id)
            .into_iter()
            .map(|hit| (hit.record.clone(), hit.file_idx))
            .collect();

        let mut attached_any = false;
        for (record, file_idx) in &hits {
            let mapping = browser.get_mapping(*file_idx);
            if self.attach_record(browser, registry, record, &mapping) {
                attached_any = true;
            }
        }

        if attached_any {
            if let Some(cf) = self.deferred_change_forms.remove(&id) {
                if let Some(form) = registry.lookup_by_id_mut(id) {
                    let _ = form.apply_change_form(&cf);
                }
            }
        }

        attached_any
    }

    /// `attach_record(record, mapping)` (§4.5). Returns `false` for a
    /// silent filtered-out miss, logs and returns `false` for a genuine
    /// anomaly (missing base record / missing locational data).
    pub fn attach_record(
        &mut self,
        browser: &dyn EspmBrowser,
        registry: &mut FormRegistry,
        record: &Record,
        mapping: &FileMapping,
    ) -> bool {
        let Some(ref_data) = &record.ref_data else {
            return false;
        };
        let base_id = mapping.map(ref_data.base_id);

        let is_lootable = LOOTABLE_BASE_TYPES.contains(&record.base_type.as_str());
        let is_conditional_harvest =
            CONDITIONAL_HARVEST_TYPES.contains(&record.base_type.as_str()) && record.result_item.is_some();
        if !is_lootable && !is_conditional_harvest {
            return false;
        }

        if record.flags & INITIALLY_DISABLED != 0 {
            return false;
        }

        if record.base_type == "NPC_" {
            if ref_data.essential || ref_data.protected {
                return false;
            }
            for &faction_local in &ref_data.factions {
                let faction_global = browser.to_global_id(mapping.file_idx, faction_local);
                if faction_global == CRIME_FACTIONS_LIST {
                    return false;
                }
            }
        }

        let form_id = mapping.map(record.id);
        let Some(world_or_cell) = record.world_or_cell else {
            info!(form_id, "espm record has no locational data, skipping");
            return false;
        };

        let loc = LocationalData {
            pos: record.pos,
            rot: radians_to_degrees(record.rot_radians),
            world_or_cell,
        };

        if let Some(existing) = registry.lookup_by_id_mut(form_id) {
            if let Some(refr) = existing.as_object_reference_mut() {
                refr.set_pos_and_angle_silent(loc.pos, loc.rot);
            }
            return true;
        }

        let form = if record.base_type == "NPC_" {
            Form::Actor(Actor::new(form_id, base_id, loc))
        } else {
            let mut refr = ObjectReference::new(form_id, base_id, record.base_type.clone(), loc);
            refr.primitive_bounds_div2 = record.primitive_bounds_div2;
            Form::ObjectReference(refr)
        };

        match registry.add(form, form_id, true, None) {
            Ok(()) => true,
            Err(e) => {
                warn!(form_id, error = %e, "failed to register espm-backed form");
                false
            }
        }
    }
}
