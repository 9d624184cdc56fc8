//! Presence records: the data behind the live-player map.
//!
//! Two kinds of state live in the presence layer, and they age differently.
//! A [`Player`](pokeroll_protocol::Player) identity is durable: once minted
//! it survives for the whole process, whether or not anyone is connected
//! under it. A [`Binding`] is ephemeral: it ties one transport connection
//! to one identity and dies with the connection, or with its silence.

use std::time::{Duration, Instant};

use pokeroll_protocol::PlayerId;

// ---------------------------------------------------------------------------
// PresenceConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for liveness tracking.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// How long a bound connection may stay silent before a sweep unbinds
    /// it. The identity behind the binding survives for reconnection.
    ///
    /// Default: 15 seconds.
    pub idle_timeout: Duration,

    /// How often the table runs the liveness sweep.
    ///
    /// Default: 10 seconds. A connection that goes silent is therefore
    /// unbound at most `idle_timeout + sweep_interval` after its last
    /// heartbeat.
    pub sweep_interval: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(15),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// A live link between one transport connection and one identity.
///
/// Created on join approval, refreshed on every heartbeat, destroyed on
/// explicit disconnect or by the liveness sweep. Destroying a binding never
/// destroys the identity it points at.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The identity bound to this connection.
    pub player_id: PlayerId,

    /// When this connection last proved it was alive.
    pub last_seen: Instant,
}

impl Binding {
    pub(crate) fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            last_seen: Instant::now(),
        }
    }

    /// Whether this binding has outlived the idle timeout.
    pub fn is_stale(&self, idle_timeout: Duration) -> bool {
        self.last_seen.elapsed() > idle_timeout
    }
}
