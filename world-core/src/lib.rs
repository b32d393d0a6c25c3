//! World-state core: a live, authoritative simulation of forms (actors,
//! object references) for a multiplayer RPG server. No networking lives
//! here - see `world-server` for the transport that wires this up.

pub mod change_journal;
pub mod error;
pub mod espm;
pub mod form;
pub mod index_alloc;
pub mod movement;
pub mod registry;
pub mod save_storage;
pub mod script_storage;
pub mod script_vm;
pub mod spatial_grid;
pub mod timer;
pub mod world_state;

pub use change_journal::{ChangeForm, ChangeJournal, RecType};
pub use error::{Result, WorldStateError};
pub use form::{Actor, Form, FormDesc, FormId, GenericForm, LocationalData, Look, ObjectReference, UserId};
pub use world_state::WorldState;
