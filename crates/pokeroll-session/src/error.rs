//! Error types for the presence layer.

/// Errors that can occur while tracking presence.
///
/// None of these is fatal to the table. Each one maps to a rejection that
/// the layer above reports to exactly one connection, or swallows.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The supplied display name is empty after trimming.
    #[error("display name is empty")]
    InvalidName,

    /// Another live identity already uses this name (case-insensitively).
    #[error("name {0:?} is already in use")]
    NameTaken(String),

    /// The connection never joined, so there is no identity to act on.
    #[error("connection has not joined")]
    NotJoined,
}
