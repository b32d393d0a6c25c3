mod config;
mod world_thread;

use std::sync::Arc;
use std::sync::mpsc::Sender;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::stream::StreamExt;
use tokio::sync::RwLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use wire_protocol::movement::MovementPacket;
use wire_protocol::{MIN_PACKET_ID, MsgType};
use world_core::form::FormId;

use crate::config::{WorldConfig, reload_config};
use crate::world_thread::WorldCommand;

#[derive(Clone)]
struct AppState {
    world: Sender<WorldCommand>,
    config: Arc<RwLock<WorldConfig>>,
}

#[tokio::main]
/// Installs the tracing subscriber, loads `WorldConfig.json`, starts the
/// dedicated world-state thread, then serves the websocket route. Mirrors
/// `relay-server/src/main.rs`'s startup shape.
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let (world_tx, world_rx) = std::sync::mpsc::channel();
    world_thread::spawn(world_rx);

    let shared_config = Arc::new(RwLock::new(WorldConfig::default()));
    if let Err(message) = reload_config("WorldConfig.json", &shared_config).await {
        tracing::error!(message, "initial config load failed, continuing with defaults");
    } else {
        apply_config(&world_tx, &shared_config).await;
    }

    let state = AppState {
        world: world_tx,
        config: shared_config,
    };

    let app = Router::new()
        .route("/reload", get(reload_handler))
        .route("/ws", get(websocket_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8081").await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn apply_config(world: &Sender<WorldCommand>, shared: &Arc<RwLock<WorldConfig>>) {
    let config = shared.read().await;
    for (record_type, duration) in &config.reloot {
        let _ = world.send(WorldCommand::ApplyRelootTime {
            record_type: record_type.clone(),
            duration: *duration,
        });
    }
}

async fn reload_handler(State(state): State<AppState>) -> String {
    match reload_config("WorldConfig.json", &state.config).await {
        Ok(()) => {
            apply_config(&state.world, &state.config).await;
            "reloaded".to_string()
        }
        Err(e) => format!("config reload failed: {e}"),
    }
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket(socket, state))
}

/// A connection is, for now, one actor: on connect we spawn it and bind it
/// to a per-connection user id; every inbound frame is either a raw 30-byte
/// movement packet or a `MIN_PACKET_ID`-prefixed JSON envelope. The
/// per-client session/auth layer that would assign real user/actor
/// identities is out of scope (§1) - this stands in the minimum needed to
/// exercise the core end to end.
async fn websocket(stream: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = stream.split();
    let user: FormId = rand_user_id();
    let actor_id: FormId = 0xFF000000 | (user & 0x00FF_FFFF);

    let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::unbounded_channel();
    let _ = state.world.send(WorldCommand::Connect {
        user,
        outbound: outbound_tx,
    });
    let _ = state.world.send(WorldCommand::SpawnActor { user, form_id: actor_id });

    // The websocket transport is TCP-backed, so there is no unreliable lane
    // to route into; `reliable` only matters to backends with an actual
    // unreliable channel (e.g. a raw UDP transport), so it's dropped here.
    let forward_task = tokio::spawn(async move {
        while let Some((bytes, _reliable)) = outbound_rx.recv().await {
            if sender.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Binary(bytes) = message else {
            continue;
        };
        handle_inbound(&state, user, actor_id, &bytes);
    }

    let _ = state.world.send(WorldCommand::Disconnect { user });
    forward_task.abort();
}

fn handle_inbound(state: &AppState, user: FormId, actor_id: FormId, bytes: &[u8]) {
    if bytes.len() == wire_protocol::movement::MOVEMENT_PACKET_SIZE {
        match MovementPacket::decode(bytes) {
            Ok(packet) => {
                let _ = state.world.send(WorldCommand::UpdateMovement {
                    form_id: actor_id,
                    pos: [packet.x, packet.y, packet.z],
                    rot: [0.0, 0.0, packet.angle_z_deg],
                    cell: packet.world_or_cell as FormId,
                    respond_to: actor_id,
                });
            }
            Err(e) => tracing::warn!(error = e, "malformed movement packet"),
        }
        return;
    }

    if bytes.is_empty() || bytes[0] != MIN_PACKET_ID {
        return;
    }
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes[1..]) else {
        return;
    };
    let Some(t) = value.get("t").and_then(|v| v.as_u64()) else {
        return;
    };
    if t == MsgType::UpdateLook.as_u32() as u64 {
        if let Some(idx) = value.get("idx").and_then(|v| v.as_u64()) {
            let look = world_core::Look(value.get("data").cloned().unwrap_or_default());
            let _ = state.world.send(WorldCommand::UpdateLook {
                actor_id,
                idx: idx as u32,
                look,
                from_user: user,
            });
        }
    }
}

fn rand_user_id() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().subsec_nanos()
}
