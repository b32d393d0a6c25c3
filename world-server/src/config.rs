//! Hot-reloadable server configuration. Mirrors the teacher's
//! `relay-server/src/lobby.rs::reload_config` - read a JSON file from
//! disk, replace the in-memory table wholesale, no partial merge.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;

/// One `set_reloot_time` entry as it appears in `WorldConfig.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RelootEntry {
    pub record_type: String,
    pub seconds: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RawWorldConfig {
    pub reloot: Vec<RelootEntry>,
    #[serde(default)]
    pub papyrus_hot_reload: bool,
}

/// The live, already-validated configuration `world_state::WorldState`
/// operations are driven from.
#[derive(Debug, Default)]
pub struct WorldConfig {
    pub reloot: Vec<(String, Duration)>,
    pub papyrus_hot_reload: bool,
}

impl From<RawWorldConfig> for WorldConfig {
    fn from(raw: RawWorldConfig) -> Self {
        WorldConfig {
            reloot: raw
                .reloot
                .into_iter()
                .map(|e| (e.record_type, Duration::from_secs_f64(e.seconds)))
                .collect(),
            papyrus_hot_reload: raw.papyrus_hot_reload,
        }
    }
}

/// Reads `path`, replacing the shared config wholesale on success. Matches
/// `reload_config`'s shape: a `Result<(), String>` the caller can surface
/// on a `/reload` route without taking the server down.
pub async fn reload_config(path: &str, shared: &Arc<RwLock<WorldConfig>>) -> Result<(), String> {
    let json_content = fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read {path}: {e}"))?;
    let raw: RawWorldConfig =
        serde_json::from_str(&json_content).map_err(|e| format!("Failed to parse {path}: {e}"))?;

    let mut config = shared.write().await;
    *config = raw.into();
    Ok(())
}
