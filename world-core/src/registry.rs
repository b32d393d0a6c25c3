//! C4: keyed store of live forms (§4.4). Per §9's arena+index redesign,
//! this module only owns storage and lifecycle - it never reaches back
//! into `WorldState` or `EspmLazyLoader`. The "miss on a persistent id
//! delegates to C5" behavior in §4.4 lives one level up, in
//! `WorldState::lookup_form_by_id`, which is what owns both C4 and C5.

use crate::change_journal::ChangeForm;
use crate::error::{Result, WorldStateError};
use crate::form::{Form, FormId};
use crate::index_alloc::FormIndexAllocator;

#[derive(Debug)]
pub struct FormRegistry {
    forms: std::collections::HashMap<FormId, Form>,
    by_index: Vec<Option<FormId>>,
    index_alloc: FormIndexAllocator,
}

impl FormRegistry {
    pub fn new(max_dense_indices: u32) -> Self {
        FormRegistry {
            forms: std::collections::HashMap::new(),
            by_index: Vec::new(),
            index_alloc: FormIndexAllocator::new(max_dense_indices),
        }
    }

    /// (I1) `DuplicateForm` unless `skip_checks`. Assigns a dense index to
    /// located forms. If `optional_change_form` is carried, applies it
    /// before the form becomes observable; a failed apply rolls the
    /// insert back entirely.
    pub fn add(
        &mut self,
        mut form: Form,
        id: FormId,
        skip_checks: bool,
        optional_change_form: Option<&ChangeForm>,
    ) -> Result<()> {
        if !skip_checks && self.forms.contains_key(&id) {
            return Err(WorldStateError::DuplicateForm(id));
        }

        if form.as_object_reference().is_some() {
            let idx = self
                .index_alloc
                .create()
                .ok_or(WorldStateError::IndexAllocationFailed)?;
            form.set_dense_index(idx);
            if idx as usize >= self.by_index.len() {
                self.by_index.resize(idx as usize + 1, None);
            }
            self.by_index[idx as usize] = Some(id);
        }

        if let Some(cf) = optional_change_form {
            if let Err(e) = form.apply_change_form(cf) {
                if let Some(idx) = form.dense_index() {
                    self.by_index[idx as usize] = None;
                    self.index_alloc.release(idx);
                }
                return Err(e);
            }
        }

        self.forms.insert(id, form);
        Ok(())
    }

    pub fn lookup_by_id(&self, id: FormId) -> Option<&Form> {
        self.forms.get(&id)
    }

    pub fn lookup_by_id_mut(&mut self, id: FormId) -> Option<&mut Form> {
        self.forms.get_mut(&id)
    }

    pub fn contains(&self, id: FormId) -> bool {
        self.forms.contains_key(&id)
    }

    /// Bounds-checks, then re-verifies the stored form still reports this
    /// index - guards against a recycle race where the slot was reused by
    /// a different form between the two lookups.
    pub fn lookup_by_index(&self, idx: u32) -> Option<&Form> {
        let id = (*self.by_index.get(idx as usize)?)?;
        let form = self.forms.get(&id)?;
        if form.dense_index() == Some(idx) {
            Some(form)
        } else {
            None
        }
    }

    pub fn remove(&mut self, id: FormId) -> Option<Form> {
        let form = self.forms.remove(&id)?;
        if let Some(idx) = form.dense_index() {
            self.by_index[idx as usize] = None;
            self.index_alloc.release(idx);
        }
        Some(form)
    }

    pub fn clear(&mut self) {
        self.forms.clear();
        self.by_index.clear();
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Typed accessor: `get_at<T>` from §4.4, specialized per variant since
    /// `Form` is a closed enum rather than an open `T`. Errors rather than
    /// panicking on a missing id or a variant mismatch.
    pub fn get_object_reference(&self, id: FormId) -> Result<&crate::form::ObjectReference> {
        self.forms
            .get(&id)
            .ok_or(WorldStateError::FormDoesNotExist(id))?
            .as_object_reference()
            .ok_or(WorldStateError::CastFailed)
    }

    pub fn get_actor(&self, id: FormId) -> Result<&crate::form::Actor> {
        self.forms
            .get(&id)
            .ok_or(WorldStateError::FormDoesNotExist(id))?
            .as_actor()
            .ok_or(WorldStateError::NotAnActor(id))
    }

    pub fn get_actor_mut(&mut self, id: FormId) -> Result<&mut crate::form::Actor> {
        self.forms
            .get_mut(&id)
            .ok_or(WorldStateError::FormDoesNotExist(id))?
            .as_actor_mut()
            .ok_or(WorldStateError::NotAnActor(id))
    }
}
