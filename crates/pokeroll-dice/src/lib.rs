//! Dice-pool engine for Pokérole-style checks.
//!
//! A check rolls a pool of six-sided dice and counts every die at or above
//! a success threshold (4 unless the table says otherwise). The engine is
//! pure: randomness comes only from the generator the caller passes in, so
//! tests can seed a deterministic one and replay a roll exactly.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Threshold a die must meet to count as a success, absent a house rule.
pub const DEFAULT_SUCCESS_THRESHOLD: u8 = 4;

/// Number of faces on every die in a pool.
pub const DIE_FACES: u8 = 6;

// ---------------------------------------------------------------------------
// Roll outcome
// ---------------------------------------------------------------------------

/// Outcome of one resolved dice pool.
///
/// The struct is plain data and serializes as-is onto the wire, so clients
/// can show the individual dice and not just the success count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRoll {
    /// Individual die faces in roll order. Length equals `dice_count`.
    pub rolls: Vec<u8>,
    /// How many dice met or beat `success_threshold`.
    pub successes: u32,
    /// Effective pool size after clamping. Never negative.
    pub dice_count: u32,
    /// Threshold used to judge each die.
    pub success_threshold: u8,
    /// Milliseconds since the Unix epoch when the pool was resolved.
    pub timestamp_ms: u64,
}

/// Roll `dice_count` six-sided dice against `success_threshold`.
///
/// A negative `dice_count` clamps to zero and resolves as an empty pool,
/// indistinguishable from asking for zero dice. It is never an error:
/// stat debuffs can push a computed pool below zero mid-session and the
/// table should keep moving.
pub fn roll_pool<R: Rng + ?Sized>(
    rng: &mut R,
    dice_count: i32,
    success_threshold: u8,
) -> PoolRoll {
    let count = dice_count.max(0) as u32;
    let rolls: Vec<u8> = (0..count)
        .map(|_| rng.random_range(1..=DIE_FACES))
        .collect();
    let successes = rolls
        .iter()
        .filter(|die| **die >= success_threshold)
        .count() as u32;

    PoolRoll {
        rolls,
        successes,
        dice_count: count,
        success_threshold,
        timestamp_ms: unix_millis(),
    }
}

/// Roll a pool with the default success threshold.
pub fn roll_pool_default<R: Rng + ?Sized>(rng: &mut R, dice_count: i32) -> PoolRoll {
    roll_pool(rng, dice_count, DEFAULT_SUCCESS_THRESHOLD)
}

fn unix_millis() -> u64 {
    // A clock before the epoch is not worth failing a roll over.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ===========================================================================
// Tests
// ===========================================================================
