//! C8: wraps the bytecode VM; mediates script-file storage, hot reload,
//! event dispatch, exception routing and native-class registration
//! (§4.8). The opcode interpreter and script-file decoder are out of
//! scope (§1) - `ParsedScript` is an opaque stand-in for whatever the real
//! VM would compile a `.pex` blob into.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::error::WorldStateError;
use crate::form::FormId;
use crate::script_storage::ScriptStorage;
use crate::timer::{Promise, TimerQueue, Void};

/// Stand-in for a compiled script. Real content doesn't matter here - only
/// identity (for hot-reload comparisons) and that it is reference-counted
/// so a stale version can be kept alive in a holder.
#[derive(Debug)]
pub struct ParsedScript {
    pub name: String,
    pub source_bytes: Vec<u8>,
}

struct LazyScript {
    raw_bytes: Vec<u8>,
    parsed: Rc<ParsedScript>,
    /// Previous parsed versions kept alive across a hot reload so any live
    /// interned value still referencing them stays valid.
    holder: Vec<Rc<ParsedScript>>,
}

fn parse(name: &str, bytes: &[u8]) -> Rc<ParsedScript> {
    Rc::new(ParsedScript {
        name: name.to_string(),
        source_bytes: bytes.to_vec(),
    })
}

/// The native classes installed into the VM at construction time (§4.8).
/// Their actual operations live in the interpreter, out of scope here;
/// this only records that installation happened exactly once.
const NATIVE_CLASSES: &[&str] = &[
    "ObjectReference",
    "Game",
    "Form",
    "Message",
    "FormList",
    "Debug",
    "Actor",
    "Skymp",
    "Utility",
];

pub struct ScriptVmHost {
    storage: Box<dyn ScriptStorage>,
    hot_reload_enabled: bool,
    cache: HashMap<String, LazyScript>,
    native_classes_installed: bool,
    pending_updates: Vec<(Promise<Void>, FormId)>,
    next_stack_id: u64,
}

impl ScriptVmHost {
    pub fn new(storage: Box<dyn ScriptStorage>, hot_reload_enabled: bool) -> Self {
        let mut host = ScriptVmHost {
            storage,
            hot_reload_enabled,
            cache: HashMap::new(),
            native_classes_installed: false,
            pending_updates: Vec::new(),
            next_stack_id: 0,
        };
        host.install_native_classes();
        host
    }

    fn install_native_classes(&mut self) {
        if self.native_classes_installed {
            return;
        }
        for class in NATIVE_CLASSES {
            tracing::trace!(class, "installing native class");
        }
        self.native_classes_installed = true;
    }

    /// Lazily parses a script by name on first invocation; on every
    /// subsequent invocation, if hot reload is enabled, compares the
    /// stored bytes against the backing storage and, on change, retains
    /// the previous parsed version in the holder before installing the
    /// new one.
    pub fn lazy_script(&mut self, name: &str) -> Option<Rc<ParsedScript>> {
        let key = name.to_lowercase();
        let current_bytes = self.storage.get_script_pex(name);
        if current_bytes.is_empty() && !self.cache.contains_key(&key) {
            return None;
        }

        match self.cache.get_mut(&key) {
            None => {
                let parsed = parse(name, &current_bytes);
                self.cache.insert(
                    key,
                    LazyScript {
                        raw_bytes: current_bytes,
                        parsed: parsed.clone(),
                        holder: Vec::new(),
                    },
                );
                Some(parsed)
            }
            Some(entry) => {
                if self.hot_reload_enabled && entry.raw_bytes != current_bytes {
                    let old = entry.parsed.clone();
                    entry.holder.push(old);
                    entry.parsed = parse(name, &current_bytes);
                    entry.raw_bytes = current_bytes;
                }
                Some(entry.parsed.clone())
            }
        }
    }

    /// Eagerly parses every non-hidden script `list_scripts(false)` names
    /// (§4.8). A name that's listed but whose bytes come back empty is a
    /// genuine anomaly (`ScriptLoadFailed`, §7) - logged and skipped so one
    /// bad script file doesn't block the rest from loading.
    pub fn load_listed_scripts(&mut self) -> Vec<WorldStateError> {
        let mut errors = Vec::new();
        for name in self.storage.list_scripts(false) {
            if self.storage.get_script_pex(&name).is_empty() {
                let err = WorldStateError::ScriptLoadFailed(name.clone());
                error!(name, %err, "failed to load listed script");
                errors.push(err);
                continue;
            }
            self.lazy_script(&name);
        }
        errors
    }

    /// When the VM resolves a class not in the eager list, checks
    /// `list_scripts(include_hidden=true)` case-insensitively and returns
    /// a lazy for it, or `None`.
    pub fn resolve_missing_class(&mut self, class_name: &str) -> Option<Rc<ParsedScript>> {
        let needle = class_name.to_lowercase();
        let hidden = self.storage.list_scripts(true);
        if !hidden.iter().any(|n| n.to_lowercase() == needle) {
            return None;
        }
        self.lazy_script(class_name)
    }

    /// Routes VM exception info to the log; `"Method not found"` degrades
    /// to warning, everything else is an error (§4.8).
    pub fn handle_exception(&self, source_pex: &str, what: &str) {
        if what.contains("Method not found") {
            warn!(source_pex, what, "papyrus vm exception");
        } else {
            error!(source_pex, what, "papyrus vm exception");
        }
    }

    /// `register_for_single_update(self, seconds)` (§4.8): obtains a
    /// promise from the timer queue and remembers which form to resolve
    /// against. `WorldState::tick` calls [`Self::take_due_updates`] after
    /// draining timers to find out which forms are due.
    pub fn register_for_single_update(
        &mut self,
        timers: &mut TimerQueue,
        now: Instant,
        form_id: FormId,
        seconds: f64,
    ) -> Promise<Void> {
        let promise = timers.set_timer(now, Duration::from_secs_f64(seconds.max(0.0)));
        self.pending_updates.push((promise.clone(), form_id));
        promise
    }

    /// Drains resolved entries from the pending-update list, returning
    /// their form ids so the caller can invoke `Form::on_scheduled_update`.
    pub fn take_due_updates(&mut self) -> Vec<FormId> {
        let (due, pending): (Vec<_>, Vec<_>) = self
            .pending_updates
            .drain(..)
            .partition(|(promise, _)| promise.is_resolved());
        self.pending_updates = pending;
        due.into_iter().map(|(_, form_id)| form_id).collect()
    }

    /// The script-visible `Utility.Wait(seconds) -> Promise<Void>`: same
    /// mechanism as `register_for_single_update` but with identity
    /// resolution - no form is looked up or updated when it fires.
    pub fn utility_wait(timers: &mut TimerQueue, now: Instant, seconds: f64) -> Promise<Void> {
        timers.set_timer(now, Duration::from_secs_f64(seconds.max(0.0)))
    }

    /// `send_papyrus_event(form, name, args)` (§4.8): assigns a per-event
    /// stack id, runs the compatibility hook, and forwards to the VM.
    /// The VM itself is out of scope, so "forwarding" here is the log line
    /// a real host would emit right before handing off to the interpreter.
    pub fn send_papyrus_event(&mut self, form_id: FormId, name: &str, args_len: usize) -> u64 {
        let stack_id = self.next_stack_id;
        self.next_stack_id += 1;
        tracing::trace!(form_id, name, args_len, stack_id, "dispatching papyrus event");
        stack_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script_storage::InMemoryScriptStorage;

    fn host_with(storage: InMemoryScriptStorage) -> ScriptVmHost {
        ScriptVmHost::new(Box::new(storage), true)
    }

    #[test]
    fn lazy_script_parses_on_first_call_only() {
        let mut storage = InMemoryScriptStorage::new();
        storage.add_visible("Quest", b"v1".to_vec());
        let mut host = host_with(storage);
        let first = host.lazy_script("Quest").unwrap();
        let second = host.lazy_script("Quest").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn hot_reload_keeps_old_version_in_holder() {
        let mut storage = InMemoryScriptStorage::new();
        storage.add_visible("Quest", b"v1".to_vec());
        let mut host = host_with(storage);
        let v1 = host.lazy_script("Quest").unwrap();

        host.storage = Box::new({
            let mut s = InMemoryScriptStorage::new();
            s.add_visible("Quest", b"v2".to_vec());
            s
        });
        let v2 = host.lazy_script("Quest").unwrap();
        assert!(!Rc::ptr_eq(&v1, &v2));
        assert_eq!(v2.source_bytes, b"v2".to_vec());
        assert_eq!(host.cache.get("quest").unwrap().holder.len(), 1);
    }

    #[test]
    fn load_listed_scripts_reports_empty_bytes_without_aborting() {
        let mut storage = InMemoryScriptStorage::new();
        storage.add_visible("Quest", b"v1".to_vec());
        storage.add_visible("Ghost", Vec::new());
        let mut host = host_with(storage);

        let errors = host.load_listed_scripts();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], crate::error::WorldStateError::ScriptLoadFailed(name) if name == "ghost"));
        assert!(host.lazy_script("Quest").is_some());
    }

    #[test]
    fn resolve_missing_class_checks_hidden_list() {
        let mut storage = InMemoryScriptStorage::new();
        storage.add_hidden("NativeWrapper", b"bytes".to_vec());
        let mut host = host_with(storage);
        assert!(host.resolve_missing_class("nativewrapper").is_some());
        assert!(host.resolve_missing_class("doesnotexist").is_none());
    }

    #[test]
    fn register_for_single_update_resolves_on_schedule() {
        let mut host = host_with(InMemoryScriptStorage::new());
        let mut timers = TimerQueue::new();
        let start = Instant::now();
        host.register_for_single_update(&mut timers, start, 77, 0.01);
        timers.tick(start);
        assert!(host.take_due_updates().is_empty());
        timers.tick(start + Duration::from_millis(20));
        assert_eq!(host.take_due_updates(), vec![77]);
    }
}
