//! Error types for the table layer.

use pokeroll_dex::SpeciesId;
use pokeroll_protocol::{CharacterId, LearnError, ProgressError};

/// Errors from character-store operations.
///
/// The table actor decides per variant whether the requester hears about
/// it: validation and limit failures go back as a denial event, ownership
/// and lookup failures are dropped with a debug log. Nothing here is ever
/// fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested species id is not in the dex.
    #[error("species {0} not found")]
    SpeciesNotFound(SpeciesId),

    /// No character with this id exists.
    #[error("character {0} not found")]
    NotFound(CharacterId),

    /// The requester is neither the GM nor the owner.
    #[error("not allowed to modify this character")]
    Forbidden,

    /// A non-GM player already owns the maximum number of characters.
    #[error("character limit reached ({cap} per player)")]
    LimitExceeded { cap: usize },

    /// Move learning failed; the reason code travels to the requester.
    #[error(transparent)]
    Learn(#[from] LearnError),

    /// A skill or stat upgrade failed.
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

impl StoreError {
    /// The reason code for an `action-denied` reply, or `None` when the
    /// failure must be dropped silently.
    ///
    /// Ownership and lookup failures return `None`: answering them would
    /// let a requester probe which sheet ids exist and who owns them.
    pub fn denial_reason(&self) -> Option<&'static str> {
        match self {
            Self::SpeciesNotFound(_) => Some("unknown-species"),
            Self::LimitExceeded { .. } => Some("limit"),
            Self::Learn(error) => Some(error.reason()),
            Self::Progress(error) => Some(error.reason()),
            Self::NotFound(_) | Self::Forbidden => None,
        }
    }
}

/// Errors from talking to the table actor.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The actor's command channel is closed; the table has shut down.
    #[error("table is unavailable")]
    Unavailable,
}
