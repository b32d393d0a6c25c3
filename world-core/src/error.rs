//! Error kinds from spec §7. Construction/lookup errors are surfaced to
//! callers as `Result<_, WorldStateError>`; per-tick work that fails is
//! logged and the tick continues (see `world_state::tick`), it never
//! reaches here. `VmException` is deliberately absent - it is routed to
//! [`crate::script_vm::ScriptVmHost`]'s exception handler and never
//! propagated as a `Result::Err`.

use crate::form::FormId;

#[derive(Debug, thiserror::Error)]
pub enum WorldStateError {
    #[error("Form with id {0:x} already exists")]
    DuplicateForm(FormId),

    #[error("Unable to find base record {0:x}")]
    BaseRecordMissing(FormId),

    #[error("Unable to apply ChangeForm, cast to ObjectReference failed")]
    CastFailed,

    #[error("Unknown ChangeForm type: {0}")]
    UnknownChangeFormType(String),

    #[error("No espm attached")]
    MissingEspm,

    #[error("No espm cache found")]
    MissingEspmCache,

    #[error("Required scriptStorage to be non-null")]
    ScriptStorageMissing,

    #[error("'{0}' is listed but failed to load from the storage")]
    ScriptLoadFailed(String),

    #[error("Form with id {0:x} doesn't exist")]
    FormDoesNotExist(FormId),

    #[error("Form with id {0:x} is not Actor")]
    NotAnActor(FormId),

    #[error("Actor with id {0:x} is not attached to any of users")]
    ActorNotAttachedToUser(FormId),

    #[error("CreateID failed")]
    IndexAllocationFailed,
}

pub type Result<T> = std::result::Result<T, WorldStateError>;
