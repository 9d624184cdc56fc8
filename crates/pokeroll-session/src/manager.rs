//! The presence manager: who exists, and who is here right now.
//!
//! Identities and connections have different lifetimes, so the manager
//! keeps them in separate maps:
//!
//! - `players` holds every identity ever minted. Entries are never removed
//!   while the process runs; a player whose connection died can always
//!   reclaim their seat with their token.
//! - `bindings` holds the ephemeral connection-to-identity links together
//!   with a last-seen timestamp. `by_player` is the reverse index, so a
//!   reconnect can supersede a stale binding without scanning.
//!
//! # Concurrency note
//!
//! `PresenceManager` is plain single-threaded state. It is owned by the
//! table actor and mutated only from that one task; the periodic liveness
//! sweep goes through the same actor, so joins, heartbeats and evictions
//! never interleave.

use std::collections::HashMap;
use std::time::Instant;

use pokeroll_protocol::{ConnectionId, Player, PlayerId};
use rand::Rng;

use crate::{Binding, PresenceConfig, PresenceError};

/// Tracks every known identity and every live connection binding.
pub struct PresenceManager {
    /// Every identity ever minted, keyed by its token.
    players: HashMap<PlayerId, Player>,

    /// Live connection-to-identity links. Kept in sync with `by_player`.
    bindings: HashMap<ConnectionId, Binding>,

    /// Reverse index: which connection (if any) an identity is bound to.
    by_player: HashMap<PlayerId, ConnectionId>,

    config: PresenceConfig,
}

impl PresenceManager {
    /// Creates an empty presence manager with the given config.
    pub fn new(config: PresenceConfig) -> Self {
        Self {
            players: HashMap::new(),
            bindings: HashMap::new(),
            by_player: HashMap::new(),
            config,
        }
    }

    /// Handles a join request from `conn`.
    ///
    /// A token that matches a known identity always rebinds to it, however
    /// long ago it was last seen, and never mints a second identity. A
    /// token the server does not recognize (most likely minted by an
    /// earlier run) is treated as absent.
    ///
    /// A fresh join mints a new identity. The very first identity ever
    /// minted gets the GM role.
    ///
    /// # Errors
    /// Fresh joins fail with [`PresenceError::InvalidName`] when the name
    /// trims to nothing and [`PresenceError::NameTaken`] when another live
    /// identity holds the name. Rebinds never fail.
    pub fn join(
        &mut self,
        conn: ConnectionId,
        name: &str,
        existing: Option<&PlayerId>,
    ) -> Result<Player, PresenceError> {
        if let Some(id) = existing {
            if self.players.contains_key(id) {
                return Ok(self.rebind(conn, id.clone(), name));
            }
        }
        self.join_fresh(conn, name)
    }

    fn join_fresh(
        &mut self,
        conn: ConnectionId,
        name: &str,
    ) -> Result<Player, PresenceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PresenceError::InvalidName);
        }

        // If this connection is already bound, that identity is about to
        // be superseded and stops defending its name. On failure the old
        // binding stays untouched.
        let superseded = self.bindings.get(&conn).map(|b| b.player_id.clone());
        if self.name_in_use(name, superseded.as_ref()) {
            return Err(PresenceError::NameTaken(name.to_string()));
        }

        let id = PlayerId::new(generate_token());
        let player = Player {
            id: id.clone(),
            name: name.to_string(),
            // First identity ever minted runs the table. The flag is not
            // reassigned later, even once the holder goes silent.
            is_gm: self.players.is_empty(),
        };
        self.players.insert(id.clone(), player.clone());
        self.bind(conn, id.clone());

        tracing::info!(
            player_id = %id,
            name = %player.name,
            is_gm = player.is_gm,
            "identity created"
        );
        Ok(player)
    }

    /// Binds `conn` to a known identity, adopting the supplied name when
    /// it is usable. A rebind itself never fails over a name.
    fn rebind(&mut self, conn: ConnectionId, id: PlayerId, name: &str) -> Player {
        let name = name.trim();
        let adopt = !name.is_empty() && !self.name_in_use(name, Some(&id));
        self.bind(conn, id.clone());

        let player = self
            .players
            .get_mut(&id)
            .expect("caller checked the identity exists");
        if adopt {
            player.name = name.to_string();
        }
        let player = player.clone();

        tracing::info!(player_id = %id, name = %player.name, "identity rebound");
        player
    }

    /// Refreshes the liveness timestamp for `conn`.
    ///
    /// Returns `false` when the connection has no binding. Heartbeats from
    /// strangers are not an error, just noise.
    pub fn heartbeat(&mut self, conn: ConnectionId) -> bool {
        match self.bindings.get_mut(&conn) {
            Some(binding) => {
                binding.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Renames the identity bound to `conn`.
    ///
    /// Returns the previous name together with the updated player so the
    /// caller can announce the change.
    ///
    /// # Errors
    /// - [`PresenceError::NotJoined`] — the connection has no identity
    /// - [`PresenceError::InvalidName`] — the new name trims to nothing
    /// - [`PresenceError::NameTaken`] — another live identity holds it
    pub fn rename(
        &mut self,
        conn: ConnectionId,
        new_name: &str,
    ) -> Result<(String, Player), PresenceError> {
        let player_id = self
            .bindings
            .get(&conn)
            .map(|binding| binding.player_id.clone())
            .ok_or(PresenceError::NotJoined)?;

        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(PresenceError::InvalidName);
        }
        if self.name_in_use(new_name, Some(&player_id)) {
            return Err(PresenceError::NameTaken(new_name.to_string()));
        }

        let player = self
            .players
            .get_mut(&player_id)
            .expect("bindings only point at known identities");
        let old_name = std::mem::replace(&mut player.name, new_name.to_string());
        let player = player.clone();

        tracing::info!(
            player_id = %player_id,
            from = %old_name,
            to = %player.name,
            "player renamed"
        );
        Ok((old_name, player))
    }

    /// Unbinds every connection that has been silent past the idle timeout.
    ///
    /// Returns the players whose connections were dropped. The identities
    /// themselves survive and their tokens keep working.
    pub fn sweep(&mut self) -> Vec<Player> {
        let stale: Vec<ConnectionId> = self
            .bindings
            .iter()
            .filter(|(_, binding)| binding.is_stale(self.config.idle_timeout))
            .map(|(conn, _)| *conn)
            .collect();

        let mut evicted = Vec::with_capacity(stale.len());
        for conn in stale {
            if let Some(player) = self.disconnect(conn) {
                tracing::info!(
                    player_id = %player.id,
                    name = %player.name,
                    "presence timed out, connection unbound"
                );
                evicted.push(player);
            }
        }
        evicted
    }

    /// Drops the binding for `conn`, keeping the identity for later
    /// reconnection. Returns the player that was bound, if any.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Option<Player> {
        let binding = self.release(conn)?;
        self.players.get(&binding.player_id).cloned()
    }

    /// The identity bound to `conn`, if the connection has joined.
    pub fn player_for_conn(&self, conn: ConnectionId) -> Option<&Player> {
        let binding = self.bindings.get(&conn)?;
        self.players.get(&binding.player_id)
    }

    /// The live connection for an identity, if it has one.
    pub fn conn_for_player(&self, id: &PlayerId) -> Option<ConnectionId> {
        self.by_player.get(id).copied()
    }

    /// Every live player, sorted by name for stable roster output.
    pub fn roster(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self
            .bindings
            .values()
            .filter_map(|binding| self.players.get(&binding.player_id))
            .cloned()
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        players
    }

    /// Every live `(connection, player)` pair, for per-recipient sends.
    pub fn bound_players(&self) -> impl Iterator<Item = (ConnectionId, &Player)> {
        self.bindings.iter().filter_map(|(conn, binding)| {
            self.players
                .get(&binding.player_id)
                .map(|player| (*conn, player))
        })
    }

    /// Number of live connection bindings.
    pub fn live_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of identities ever minted, live or not.
    pub fn identity_count(&self) -> usize {
        self.players.len()
    }

    /// Removes the binding for `conn` from both maps.
    fn release(&mut self, conn: ConnectionId) -> Option<Binding> {
        let binding = self.bindings.remove(&conn)?;
        self.by_player.remove(&binding.player_id);
        Some(binding)
    }

    /// Binds `conn` to `player_id`, superseding any binding either side
    /// held before. The two maps change together, nowhere else.
    fn bind(&mut self, conn: ConnectionId, player_id: PlayerId) {
        self.release(conn);
        if let Some(old_conn) = self.by_player.remove(&player_id) {
            self.bindings.remove(&old_conn);
        }
        self.by_player.insert(player_id.clone(), conn);
        self.bindings.insert(conn, Binding::new(player_id));
    }

    /// Case-insensitive name check against live identities only.
    ///
    /// A timed-out identity keeps its name in `players` but no longer
    /// defends it: new joiners may take the name, while the original
    /// holder can still reclaim the identity itself by token.
    fn name_in_use(&self, name: &str, except: Option<&PlayerId>) -> bool {
        let wanted = name.to_lowercase();
        self.bindings.values().any(|binding| {
            if Some(&binding.player_id) == except {
                return false;
            }
            self.players
                .get(&binding.player_id)
                .is_some_and(|player| player.name.to_lowercase() == wanted)
        })
    }
}

/// Generates a random 32-character lowercase hex token (128 bits).
///
/// Identity tokens double as reconnect credentials, so they must be
/// unguessable.
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `PresenceManager`.
    //!
    //! # Testing time-dependent behavior
    //!
    //! Eviction depends on elapsed time. Instead of sleeping, the tests
    //! pick configs at the extremes:
    //!   - `idle_timeout: Duration::ZERO` → silence is immediate
    //!   - `idle_timeout: 3600s` → nothing goes silent during a test
    //!
    //! This keeps the suite fast and deterministic.

    use std::time::Duration;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    /// A manager whose bindings never go stale during a test.
    fn manager() -> PresenceManager {
        PresenceManager::new(PresenceConfig {
            idle_timeout: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(3600),
        })
    }

    /// A manager whose bindings are stale the moment they exist.
    fn manager_with_instant_timeout() -> PresenceManager {
        PresenceManager::new(PresenceConfig {
            idle_timeout: Duration::ZERO,
            sweep_interval: Duration::from_secs(3600),
        })
    }

    fn conn(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    // =====================================================================
    // join() — fresh identities
    // =====================================================================

    #[test]
    fn test_join_first_player_is_gm() {
        let mut mgr = manager();

        let player = mgr.join(conn(1), "Ash", None).expect("should join");

        assert!(player.is_gm);
        assert_eq!(player.name, "Ash");
        assert_eq!(mgr.live_count(), 1);
    }

    #[test]
    fn test_join_later_players_are_not_gm() {
        let mut mgr = manager();
        mgr.join(conn(1), "Ash", None).unwrap();

        let second = mgr.join(conn(2), "Misty", None).unwrap();
        let third = mgr.join(conn(3), "Brock", None).unwrap();

        assert!(!second.is_gm);
        assert!(!third.is_gm);
    }

    #[test]
    fn test_join_blank_name_rejected() {
        let mut mgr = manager();

        assert!(matches!(
            mgr.join(conn(1), "", None),
            Err(PresenceError::InvalidName)
        ));
        assert!(matches!(
            mgr.join(conn(1), "   ", None),
            Err(PresenceError::InvalidName)
        ));
        assert_eq!(mgr.live_count(), 0);
        assert_eq!(mgr.identity_count(), 0);
    }

    #[test]
    fn test_join_trims_surrounding_whitespace() {
        let mut mgr = manager();

        let player = mgr.join(conn(1), "  Ash  ", None).unwrap();

        assert_eq!(player.name, "Ash");
    }

    #[test]
    fn test_join_duplicate_live_name_rejected_case_insensitive() {
        let mut mgr = manager();
        mgr.join(conn(1), "Ash", None).unwrap();

        let lower = mgr.join(conn(2), "ash", None);
        let upper = mgr.join(conn(3), "ASH", None);

        assert!(matches!(lower, Err(PresenceError::NameTaken(n)) if n == "ash"));
        assert!(matches!(upper, Err(PresenceError::NameTaken(_))));
        assert_eq!(mgr.live_count(), 1, "failed joins must not bind");
    }

    #[test]
    fn test_join_mints_32_char_hex_token() {
        let mut mgr = manager();

        let player = mgr.join(conn(1), "Ash", None).unwrap();

        assert_eq!(player.id.0.len(), 32);
        assert!(player.id.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_join_tokens_are_unique() {
        let mut mgr = manager();

        let a = mgr.join(conn(1), "Ash", None).unwrap();
        let b = mgr.join(conn(2), "Misty", None).unwrap();

        assert_ne!(a.id, b.id);
    }

    // =====================================================================
    // join() — reconnection by token
    // =====================================================================

    #[test]
    fn test_join_token_rebinds_same_identity() {
        let mut mgr = manager();
        let original = mgr.join(conn(1), "Ash", None).unwrap();
        mgr.disconnect(conn(1));

        let rebound = mgr
            .join(conn(2), "Ash", Some(&original.id))
            .expect("rebind should succeed");

        assert_eq!(rebound.id, original.id);
        assert_eq!(mgr.conn_for_player(&original.id), Some(conn(2)));
        assert_eq!(mgr.identity_count(), 1, "no second identity minted");
    }

    #[test]
    fn test_join_token_supersedes_live_connection() {
        // The same token arriving on a new connection wins; the old
        // binding is dropped without an explicit disconnect.
        let mut mgr = manager();
        let player = mgr.join(conn(1), "Ash", None).unwrap();

        mgr.join(conn(2), "Ash", Some(&player.id)).unwrap();

        assert!(mgr.player_for_conn(conn(1)).is_none());
        assert_eq!(mgr.conn_for_player(&player.id), Some(conn(2)));
        assert_eq!(mgr.live_count(), 1);
    }

    #[test]
    fn test_join_token_adopts_new_name() {
        let mut mgr = manager();
        let player = mgr.join(conn(1), "Ash", None).unwrap();
        mgr.disconnect(conn(1));

        let rebound = mgr.join(conn(2), "Red", Some(&player.id)).unwrap();

        assert_eq!(rebound.name, "Red");
    }

    #[test]
    fn test_join_token_keeps_name_when_new_name_collides() {
        let mut mgr = manager();
        let ash = mgr.join(conn(1), "Ash", None).unwrap();
        mgr.join(conn(2), "Brock", None).unwrap();
        mgr.disconnect(conn(1));

        let rebound = mgr.join(conn(3), "brock", Some(&ash.id)).unwrap();

        assert_eq!(rebound.name, "Ash", "colliding name must not be adopted");
    }

    #[test]
    fn test_join_token_keeps_name_when_blank() {
        let mut mgr = manager();
        let player = mgr.join(conn(1), "Ash", None).unwrap();
        mgr.disconnect(conn(1));

        let rebound = mgr.join(conn(2), "", Some(&player.id)).unwrap();

        assert_eq!(rebound.name, "Ash");
    }

    #[test]
    fn test_join_unknown_token_mints_fresh_identity() {
        let mut mgr = manager();
        let stale = PlayerId::new("not-a-real-token");

        let player = mgr.join(conn(1), "Misty", Some(&stale)).unwrap();

        assert_ne!(player.id, stale);
        assert_eq!(player.id.0.len(), 32);
        assert!(player.is_gm, "fresh identity, and the first one");
    }

    #[test]
    fn test_join_gm_flag_not_reassigned_after_gm_goes_silent() {
        let mut mgr = manager_with_instant_timeout();
        let gm = mgr.join(conn(1), "Ash", None).unwrap();
        assert!(gm.is_gm);
        mgr.sweep();

        let late = mgr.join(conn(2), "Misty", None).unwrap();

        assert!(!late.is_gm, "the GM seat stays with the first identity");
    }

    #[test]
    fn test_join_timed_out_name_is_reusable() {
        let mut mgr = manager_with_instant_timeout();
        mgr.join(conn(1), "Ash", None).unwrap();
        mgr.sweep();

        let newcomer = mgr.join(conn(2), "ash", None);

        assert!(newcomer.is_ok(), "silent identities stop defending names");
    }

    #[test]
    fn test_join_token_reclaim_survives_name_reuse() {
        // Timing out does not cost an identity its token, even after a
        // newcomer has taken over the old name.
        let mut mgr = manager_with_instant_timeout();
        let ash = mgr.join(conn(1), "Ash", None).unwrap();
        mgr.sweep();
        mgr.join(conn(2), "ash", None).unwrap();

        let rebound = mgr.join(conn(3), "Ash", Some(&ash.id)).unwrap();

        assert_eq!(rebound.id, ash.id);
        assert_eq!(rebound.name, "Ash");
    }

    // =====================================================================
    // heartbeat()
    // =====================================================================

    #[test]
    fn test_heartbeat_known_connection_returns_true() {
        let mut mgr = manager();
        mgr.join(conn(1), "Ash", None).unwrap();

        assert!(mgr.heartbeat(conn(1)));
    }

    #[test]
    fn test_heartbeat_unknown_connection_returns_false() {
        let mut mgr = manager();

        assert!(!mgr.heartbeat(conn(99)));
    }

    // =====================================================================
    // sweep()
    // =====================================================================

    #[test]
    fn test_sweep_unbinds_silent_connections() {
        let mut mgr = manager_with_instant_timeout();
        mgr.join(conn(1), "Ash", None).unwrap();
        mgr.join(conn(2), "Misty", None).unwrap();

        let evicted = mgr.sweep();

        assert_eq!(evicted.len(), 2);
        assert!(evicted.iter().any(|p| p.name == "Ash"));
        assert!(evicted.iter().any(|p| p.name == "Misty"));
        assert_eq!(mgr.live_count(), 0);
        assert_eq!(mgr.identity_count(), 2, "identities survive the sweep");
    }

    #[test]
    fn test_sweep_within_timeout_unbinds_nobody() {
        let mut mgr = manager();
        mgr.join(conn(1), "Ash", None).unwrap();

        let evicted = mgr.sweep();

        assert!(evicted.is_empty());
        assert_eq!(mgr.live_count(), 1);
    }

    #[test]
    fn test_sweep_preserves_identity_for_reclaim() {
        let mut mgr = manager_with_instant_timeout();
        let player = mgr.join(conn(1), "Ash", None).unwrap();
        mgr.sweep();

        let rebound = mgr.join(conn(2), "Ash", Some(&player.id)).unwrap();

        assert_eq!(rebound.id, player.id);
    }

    #[test]
    fn test_sweep_empty_manager_is_noop() {
        let mut mgr = manager_with_instant_timeout();

        assert!(mgr.sweep().is_empty());
    }

    // =====================================================================
    // rename()
    // =====================================================================

    #[test]
    fn test_rename_updates_identity_and_reports_old_name() {
        let mut mgr = manager();
        mgr.join(conn(1), "Ash", None).unwrap();

        let (old, player) = mgr.rename(conn(1), "Red").expect("should rename");

        assert_eq!(old, "Ash");
        assert_eq!(player.name, "Red");
        assert_eq!(mgr.roster()[0].name, "Red");
    }

    #[test]
    fn test_rename_collision_with_live_player_rejected() {
        let mut mgr = manager();
        mgr.join(conn(1), "Ash", None).unwrap();
        mgr.join(conn(2), "Misty", None).unwrap();

        let result = mgr.rename(conn(2), "ASH");

        assert!(matches!(result, Err(PresenceError::NameTaken(_))));
        assert_eq!(
            mgr.player_for_conn(conn(2)).unwrap().name,
            "Misty",
            "failed rename must not change the name"
        );
    }

    #[test]
    fn test_rename_blank_rejected() {
        let mut mgr = manager();
        mgr.join(conn(1), "Ash", None).unwrap();

        assert!(matches!(
            mgr.rename(conn(1), "  "),
            Err(PresenceError::InvalidName)
        ));
    }

    #[test]
    fn test_rename_to_own_name_allowed() {
        // Re-casing your own name is not a collision with yourself.
        let mut mgr = manager();
        mgr.join(conn(1), "Ash", None).unwrap();

        let (_, player) = mgr.rename(conn(1), "ASH").unwrap();

        assert_eq!(player.name, "ASH");
    }

    #[test]
    fn test_rename_unjoined_connection_rejected() {
        let mut mgr = manager();

        assert!(matches!(
            mgr.rename(conn(1), "Ash"),
            Err(PresenceError::NotJoined)
        ));
    }

    #[test]
    fn test_rename_frees_previous_name() {
        let mut mgr = manager();
        mgr.join(conn(1), "Ash", None).unwrap();
        mgr.rename(conn(1), "Red").unwrap();

        let newcomer = mgr.join(conn(2), "Ash", None);

        assert!(newcomer.is_ok());
    }

    // =====================================================================
    // disconnect()
    // =====================================================================

    #[test]
    fn test_disconnect_returns_bound_player_and_unbinds() {
        let mut mgr = manager();
        let player = mgr.join(conn(1), "Ash", None).unwrap();

        let dropped = mgr.disconnect(conn(1));

        assert_eq!(dropped.map(|p| p.id), Some(player.id.clone()));
        assert!(mgr.player_for_conn(conn(1)).is_none());
        assert_eq!(mgr.conn_for_player(&player.id), None);
    }

    #[test]
    fn test_disconnect_unknown_connection_returns_none() {
        let mut mgr = manager();

        assert!(mgr.disconnect(conn(99)).is_none());
    }

    #[test]
    fn test_disconnect_keeps_identity_for_token() {
        let mut mgr = manager();
        let player = mgr.join(conn(1), "Ash", None).unwrap();
        mgr.disconnect(conn(1));

        let rebound = mgr.join(conn(2), "Ash", Some(&player.id)).unwrap();

        assert_eq!(rebound.id, player.id);
    }

    // =====================================================================
    // roster() and lookups
    // =====================================================================

    #[test]
    fn test_roster_sorted_by_name() {
        let mut mgr = manager();
        mgr.join(conn(1), "Misty", None).unwrap();
        mgr.join(conn(2), "Ash", None).unwrap();
        mgr.join(conn(3), "Brock", None).unwrap();

        let names: Vec<String> =
            mgr.roster().into_iter().map(|p| p.name).collect();

        assert_eq!(names, ["Ash", "Brock", "Misty"]);
    }

    #[test]
    fn test_roster_lists_live_players_only() {
        let mut mgr = manager();
        mgr.join(conn(1), "Ash", None).unwrap();
        mgr.join(conn(2), "Misty", None).unwrap();
        mgr.disconnect(conn(2));

        let roster = mgr.roster();

        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Ash");
        assert_eq!(mgr.identity_count(), 2);
    }

    #[test]
    fn test_player_for_conn_and_conn_for_player_roundtrip() {
        let mut mgr = manager();
        let player = mgr.join(conn(7), "Ash", None).unwrap();

        assert_eq!(mgr.player_for_conn(conn(7)).unwrap().id, player.id);
        assert_eq!(mgr.conn_for_player(&player.id), Some(conn(7)));
    }

    #[test]
    fn test_bound_players_pairs_connections_with_identities() {
        let mut mgr = manager();
        let ash = mgr.join(conn(1), "Ash", None).unwrap();
        let misty = mgr.join(conn(2), "Misty", None).unwrap();

        let mut pairs: Vec<(ConnectionId, PlayerId)> = mgr
            .bound_players()
            .map(|(c, p)| (c, p.id.clone()))
            .collect();
        pairs.sort_by_key(|(c, _)| c.into_inner());

        assert_eq!(pairs, [(conn(1), ash.id), (conn(2), misty.id)]);
    }
}
