//! Wire protocol for Pokeroll.
//!
//! Defines the language clients and the table speak:
//!
//! - **Identity types** ([`PlayerId`], [`CharacterId`], [`ConnectionId`]) and
//!   the roster entry ([`Player`]).
//! - **Events** ([`ClientEvent`], [`ServerEvent`]), the named messages that
//!   travel on the wire, tagged by a `"type"` field.
//! - **The character sheet** ([`Character`]) together with the mutations it
//!   accepts. Sheets are broadcast whole in `character-list` events, so the
//!   sheet itself is part of the wire language.
//! - **Codec** ([`Codec`], [`JsonCodec`]) and [`ProtocolError`].
//!
//! Rules that need surrounding state (who may mutate what, name uniqueness,
//! liveness) live in the session and table crates. Rules intrinsic to one
//! sheet (hp clamping, move slots, experience costs) live on [`Character`].

mod character;
mod codec;
mod error;
mod events;
mod types;

pub use character::{
    Character, CharacterUpdate, Derived, LearnError, MAX_ACTIVE_MOVES,
    MAX_SKILL_RANK, Moveset, ProgressError, Skill, Skills, UnknownSkill,
};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use types::{CharacterId, ConnectionId, Player, PlayerId, Recipient};
