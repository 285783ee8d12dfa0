// Engine error taxonomy.

use thiserror::Error;

/// A rejected engine request.
///
/// Every variant is recoverable: the operation that produced it left the
/// session exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("participant `{identity}` is already in this draft")]
    DuplicateParticipant { identity: String },

    #[error("the draft has not started")]
    NotStarted,

    #[error("the draft has already started")]
    AlreadyStarted,

    #[error("`{item}` is not available")]
    ItemUnavailable { item: String },

    #[error("stale turn token {submitted} (current turn is {current})")]
    StaleTurn { submitted: u64, current: u64 },

    #[error("the draft is over, nobody is left to pick")]
    NoActiveTurn,

    #[error("it is not `{identity}`'s turn to pick")]
    NotYourTurn { identity: String },

    #[error("`{identity}` does not have permission to {action}")]
    PermissionDenied { identity: String, action: String },

    #[error("the draft is full")]
    RegistrationFull,

    #[error("a draft needs at least one participant to start")]
    EmptyRoster,

    #[error("alliance size must be at least 1, got {0}")]
    InvalidAllianceSize(usize),
}
