//! Identity types and routing.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's durable identity token.
///
/// Minted by the session layer on first join and handed back to the client
/// in the approval, this token doubles as the reconnect credential: a later
/// `join-request` carrying it rebinds to the same identity no matter how
/// long the player was gone. It is opaque, compared byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Logs only ever see a prefix; the full token is a reconnect credential.
impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get(..8) {
            Some(prefix) if self.0.len() > 8 => write!(f, "P-{prefix}"),
            _ => write!(f, "P-{}", self.0),
        }
    }
}

/// A unique identifier for one character sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get(..8) {
            Some(prefix) if self.0.len() > 8 => write!(f, "C-{prefix}"),
            _ => write!(f, "C-{}", self.0),
        }
    }
}

/// Opaque identifier for a transport connection.
///
/// Connections are ephemeral: one per socket, never reused within a
/// process. The session layer maps them onto [`PlayerId`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Roster entry
// ---------------------------------------------------------------------------

/// One entry in the player roster.
///
/// This is both the presence record the session layer keeps and the wire
/// shape of `player-list` entries. `id` is included on purpose: the joiner
/// needs it as their reconnect token, and the table is a trusted group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_gm: bool,
}

// ---------------------------------------------------------------------------
// Recipient — who should receive an outbound event?
// ---------------------------------------------------------------------------

/// Routing target for one outbound event.
///
/// Event handling produces a list of `(Recipient, ServerEvent)` pairs; the
/// table actor resolves each recipient to live connections at dispatch
/// time. `Sender` exists because some replies (a join denial, say) must
/// reach a connection that has no identity yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// The connection the inbound event arrived on, joined or not.
    Sender,
    /// One identity's live connection, if it has one.
    Player(PlayerId),
    /// Every connection currently bound to an identity.
    All,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId::new("abc123")).unwrap();
        assert_eq!(json, "\"abc123\"");
    }

    #[test]
    fn test_player_id_deserializes_from_plain_string() {
        let id: PlayerId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(id, PlayerId::new("abc123"));
    }

    #[test]
    fn test_player_id_display_truncates_long_tokens() {
        let id = PlayerId::new("0123456789abcdef0123456789abcdef");
        assert_eq!(id.to_string(), "P-01234567");
    }

    #[test]
    fn test_player_id_display_keeps_short_tokens_whole() {
        assert_eq!(PlayerId::new("ash").to_string(), "P-ash");
    }

    #[test]
    fn test_character_id_display() {
        let id = CharacterId::new("fedcba9876543210fedcba9876543210");
        assert_eq!(id.to_string(), "C-fedcba98");
    }

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }

    #[test]
    fn test_player_json_shape() {
        let player = Player {
            id: PlayerId::new("tok"),
            name: "Ash".to_string(),
            is_gm: true,
        };
        let json = serde_json::to_value(&player).unwrap();
        assert_eq!(json["id"], "tok");
        assert_eq!(json["name"], "Ash");
        assert_eq!(json["is_gm"], true);
    }
}
