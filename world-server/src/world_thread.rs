//! Runs `WorldState` on its own dedicated OS thread. The core is
//! single-threaded cooperative by design (§5 of the core spec: "the only
//! engine" is `tick()`), so rather than fighting that with `Arc<Mutex<_>>`
//! around `Rc`-based internals, this follows the teacher's channel-actor
//! shape (`relay-server`'s `Room` is driven the same way, just over tokio
//! channels instead of a raw thread) and exposes the world only through a
//! command channel.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use wire_protocol::MessageOutput;
use world_core::form::{FormId, Look, UserId};
use world_core::{Actor, Form, LocationalData, WorldState};

const TICK_INTERVAL: Duration = Duration::from_millis(50);

pub enum WorldCommand {
    Connect {
        user: UserId,
        outbound: UnboundedSender<(Vec<u8>, bool)>,
    },
    Disconnect {
        user: UserId,
    },
    SpawnActor {
        user: UserId,
        form_id: FormId,
    },
    UpdateMovement {
        form_id: FormId,
        pos: [f32; 3],
        rot: [f32; 3],
        cell: FormId,
        respond_to: UserId,
    },
    UpdateLook {
        actor_id: FormId,
        idx: u32,
        look: Look,
        from_user: UserId,
    },
    SetRaceMenuOpen {
        actor_id: FormId,
        open: bool,
    },
    ApplyRelootTime {
        record_type: String,
        duration: Duration,
    },
}

/// Routes a `send()` call to exactly the one connected user it names;
/// used for personal notifications (teleport-back, race-menu ack).
struct UserSink<'a> {
    user: UserId,
    connections: &'a HashMap<UserId, UnboundedSender<(Vec<u8>, bool)>>,
}

impl MessageOutput for UserSink<'_> {
    fn send(&mut self, bytes: &[u8], reliable: bool) {
        if let Some(tx) = self.connections.get(&self.user) {
            let _ = tx.send((bytes.to_vec(), reliable));
        }
    }
}

/// Routes a `send()` call to every connection except `exclude`; used for
/// the look-update broadcast (scenario 3: "to every other user bound to
/// an actor").
struct BroadcastSink<'a> {
    exclude: Option<UserId>,
    connections: &'a HashMap<UserId, UnboundedSender<(Vec<u8>, bool)>>,
}

impl MessageOutput for BroadcastSink<'_> {
    fn send(&mut self, bytes: &[u8], reliable: bool) {
        for (&user, tx) in self.connections {
            if Some(user) == self.exclude {
                continue;
            }
            let _ = tx.send((bytes.to_vec(), reliable));
        }
    }
}

pub fn spawn(rx: Receiver<WorldCommand>) {
    std::thread::spawn(move || run(rx));
}

fn run(rx: Receiver<WorldCommand>) {
    let mut world = WorldState::new();
    let mut connections: HashMap<UserId, UnboundedSender<(Vec<u8>, bool)>> = HashMap::new();

    loop {
        match rx.recv_timeout(TICK_INTERVAL) {
            Ok(cmd) => handle(&mut world, &mut connections, cmd),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        world.tick();
    }
}

fn handle(world: &mut WorldState, connections: &mut HashMap<UserId, UnboundedSender<(Vec<u8>, bool)>>, cmd: WorldCommand) {
    match cmd {
        WorldCommand::Connect { user, outbound } => {
            info!(user, "connected");
            connections.insert(user, outbound);
        }
        WorldCommand::Disconnect { user } => {
            info!(user, "disconnected");
            connections.remove(&user);
        }
        WorldCommand::SpawnActor { user, form_id } => {
            let form = Form::Actor(Actor::new(form_id, 0, LocationalData::default()));
            if let Err(e) = world.add_form(form, form_id, true, None) {
                warn!(error = %e, form_id, "failed to spawn actor");
                return;
            }
            world.bind_user_to_actor(form_id, user);
        }
        WorldCommand::UpdateMovement {
            form_id,
            pos,
            rot,
            cell,
            respond_to,
        } => {
            let mut sink = UserSink {
                user: respond_to,
                connections,
            };
            if let Err(e) = world.update_movement(form_id, pos, rot, cell, &mut sink) {
                warn!(error = %e, form_id, "update_movement failed");
            }
        }
        WorldCommand::UpdateLook {
            actor_id,
            idx,
            look,
            from_user,
        } => {
            let mut own_sink = UserSink {
                user: from_user,
                connections,
            };
            let mut broadcast_sink = BroadcastSink {
                exclude: Some(from_user),
                connections,
            };
            if let Err(e) = world.update_look(actor_id, idx, look, &mut own_sink, &mut broadcast_sink) {
                warn!(error = %e, actor_id, "update_look failed");
            }
        }
        WorldCommand::SetRaceMenuOpen { actor_id, open } => {
            let user = match world.user_for_actor(actor_id) {
                Ok(user) => user,
                Err(e) => {
                    warn!(error = %e, actor_id, "set_race_menu_open failed");
                    return;
                }
            };
            let mut sink = UserSink { user, connections };
            if let Err(e) = world.set_race_menu_open(actor_id, open, &mut sink) {
                warn!(error = %e, actor_id, "set_race_menu_open failed");
            }
        }
        WorldCommand::ApplyRelootTime { record_type, duration } => {
            world.set_reloot_time(record_type, duration);
        }
    }
}
