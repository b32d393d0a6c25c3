//! `ScriptStorage` contract (§6): case-insensitive-keyed Papyrus script
//! byte storage. The decoder/parser is out of scope (§1); this is just the
//! listing/fetch surface `ScriptVmHost` is built against.

use std::collections::HashMap;

pub trait ScriptStorage {
    /// Names are case-insensitive; `include_hidden` additionally lists
    /// scripts the eager pass doesn't surface (native-class shadows,
    /// internal helpers) for the missing-class handler to probe.
    fn list_scripts(&self, include_hidden: bool) -> Vec<String>;

    /// Empty on miss, per §6 - never an error, since "listed but missing"
    /// is handled by the caller (`ScriptLoadFailed`).
    fn get_script_pex(&self, name: &str) -> Vec<u8>;
}

#[derive(Default)]
pub struct InMemoryScriptStorage {
    visible: HashMap<String, Vec<u8>>,
    hidden: HashMap<String, Vec<u8>>,
}

impl InMemoryScriptStorage {
    pub fn new() -> Self {
        InMemoryScriptStorage::default()
    }

    pub fn add_visible(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.visible.insert(name.into().to_lowercase(), bytes);
    }

    pub fn add_hidden(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.hidden.insert(name.into().to_lowercase(), bytes);
    }
}

impl ScriptStorage for InMemoryScriptStorage {
    fn list_scripts(&self, include_hidden: bool) -> Vec<String> {
        let mut names: Vec<String> = self.visible.keys().cloned().collect();
        if include_hidden {
            names.extend(self.hidden.keys().cloned());
        }
        names
    }

    fn get_script_pex(&self, name: &str) -> Vec<u8> {
        let key = name.to_lowercase();
        self.visible
            .get(&key)
            .or_else(|| self.hidden.get(&key))
            .cloned()
            .unwrap_or_default()
    }
}

/// Stand-in installed when the VM is requested before any real storage was
/// attached (§7 `ScriptStorageMissing`: logged as an error, not fatal -
/// the VM becomes a permanently-empty instance rather than failing to
/// construct).
#[derive(Default)]
pub struct EmptyScriptStorage;

impl ScriptStorage for EmptyScriptStorage {
    fn list_scripts(&self, _include_hidden: bool) -> Vec<String> {
        Vec::new()
    }

    fn get_script_pex(&self, _name: &str) -> Vec<u8> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut storage = InMemoryScriptStorage::new();
        storage.add_visible("MyQuestScript", b"pex-bytes".to_vec());
        assert_eq!(storage.get_script_pex("myquestscript"), b"pex-bytes");
        assert_eq!(storage.get_script_pex("MYQUESTSCRIPT"), b"pex-bytes");
    }

    #[test]
    fn hidden_scripts_excluded_unless_requested() {
        let mut storage = InMemoryScriptStorage::new();
        storage.add_hidden("nativewrapper", b"bytes".to_vec());
        assert!(storage.list_scripts(false).is_empty());
        assert_eq!(storage.list_scripts(true), vec!["nativewrapper".to_string()]);
    }

    #[test]
    fn missing_script_returns_empty_bytes() {
        let storage = InMemoryScriptStorage::new();
        assert!(storage.get_script_pex("nope").is_empty());
    }
}
