//! The shared table for Pokeroll.
//!
//! One table per process. The table is a Tokio actor task that owns every
//! piece of session state — the presence maps, the character store and the
//! outbound senders — and serializes all mutation through its command
//! channel. Connection handlers only ever hold a [`TableHandle`].
//!
//! # Key types
//!
//! - [`spawn_table`] — starts the actor, returns its handle
//! - [`TableHandle`] — attach/detach connections, forward client events
//! - [`CharacterStore`] — the authoritative sheet registry (actor-owned)
//! - [`TableConfig`] — character cap and presence timings

mod config;
mod error;
mod store;
mod table;

pub use config::TableConfig;
pub use error::{StoreError, TableError};
pub use store::CharacterStore;
pub use table::{EventSender, TableHandle, TableInfo, spawn_table};
