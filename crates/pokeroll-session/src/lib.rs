//! Player presence and identity tracking for Pokeroll.
//!
//! This crate answers two questions for the layers above:
//!
//! 1. **Who exists?** Durable [`Player`](pokeroll_protocol::Player)
//!    identities, minted on first join and kept for the life of the
//!    process so a dropped client can always reclaim its seat by token.
//! 2. **Who is here right now?** Ephemeral connection [`Binding`]s with
//!    liveness timestamps, refreshed by heartbeats and reaped by the
//!    periodic sweep.
//!
//! # How it fits in the stack
//!
//! ```text
//! Table Layer (above)  ← drives joins, heartbeats and sweeps, reads the roster
//!     ↕
//! Presence Layer (this crate)  ← owns the identity and binding maps
//!     ↕
//! Protocol Layer (below)  ← provides PlayerId, ConnectionId, Player
//! ```

mod binding;
mod error;
mod manager;

pub use binding::{Binding, PresenceConfig};
pub use error::PresenceError;
pub use manager::PresenceManager;
