//! # Pokeroll
//!
//! Real-time session server for Pokemon-themed tabletop campaigns.
//!
//! A Pokeroll server hosts a single shared table: players connect over
//! WebSocket, claim a name, roll dice, and manage character sheets. The
//! first player to join becomes the GM. All state lives in one table
//! actor; connections are just pipes that feed it events and drain its
//! broadcasts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pokeroll::PokerollServerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = PokerollServerBuilder::new()
//!         .bind("0.0.0.0:8080")
//!         .build()
//!         .await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

mod error;
mod handler;
mod server;

pub use error::PokerollError;
pub use server::{PokerollServer, PokerollServerBuilder};

// Re-exports so server embedders only need this crate.
pub use pokeroll_dex::{Pokedex, SpeciesId};
pub use pokeroll_dice::PoolRoll;
pub use pokeroll_protocol::{Character, ClientEvent, Player, ServerEvent};
pub use pokeroll_session::PresenceConfig;
pub use pokeroll_table::{TableConfig, TableHandle};
