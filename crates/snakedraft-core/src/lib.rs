// Library root for the snake draft engine.
//
// Pure state and algorithms: no I/O, no clocks besides the creation
// timestamp, randomness injected by the caller.

pub mod draft;
pub mod error;

pub use draft::item::{Item, ItemRef};
pub use draft::pool::ItemPool;
pub use draft::roster::{AdmissionPolicy, Participant, Roster};
pub use draft::session::{DraftSession, ParticipantView, ProgressSnapshot, SessionId};
pub use error::DraftError;
