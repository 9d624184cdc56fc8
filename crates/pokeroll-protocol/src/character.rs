//! The character sheet and the rules intrinsic to it.
//!
//! A sheet is built from species data once, then mutated only through the
//! methods here. Every mutation path keeps the sheet invariants:
//!
//! - `hp` stays within `0..=derived.max_hp`
//! - active moves are a subset of learned moves, at most [`MAX_ACTIVE_MOVES`]
//! - skills stay within `0..=MAX_SKILL_RANK`
//! - `level >= 1`, `exp >= 0`
//!
//! Client-supplied updates go through [`CharacterUpdate`], a closed set of
//! mutable fields. Anything not listed there (the id, the owner, base
//! stats, the learned-move list) simply has no way in from the wire.

use std::fmt;
use std::str::FromStr;

use pokeroll_dex::{BaseStats, MoveId, MoveRank, Species, SpeciesId, Stat, UnknownRank};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CharacterId, PlayerId};

/// Most moves a sheet can have active at once.
pub const MAX_ACTIVE_MOVES: usize = 4;

/// Highest rank a skill can reach.
pub const MAX_SKILL_RANK: u8 = 5;

/// Bounds for the size factor (height/weight percent, 1.0 = 100%).
const SIZE_FACTOR_MIN: f32 = 0.1;
const SIZE_FACTOR_MAX: f32 = 10.0;

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

/// One of the twelve trained skills on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Brawl,
    Channel,
    Clash,
    Evasion,
    Alert,
    Athletic,
    Nature,
    Stealth,
    Allure,
    Etiquette,
    Intimidate,
    Perform,
}

impl Skill {
    pub const ALL: [Skill; 12] = [
        Skill::Brawl,
        Skill::Channel,
        Skill::Clash,
        Skill::Evasion,
        Skill::Alert,
        Skill::Athletic,
        Skill::Nature,
        Skill::Stealth,
        Skill::Allure,
        Skill::Etiquette,
        Skill::Intimidate,
        Skill::Perform,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Skill::Brawl => "brawl",
            Skill::Channel => "channel",
            Skill::Clash => "clash",
            Skill::Evasion => "evasion",
            Skill::Alert => "alert",
            Skill::Athletic => "athletic",
            Skill::Nature => "nature",
            Skill::Stealth => "stealth",
            Skill::Allure => "allure",
            Skill::Etiquette => "etiquette",
            Skill::Intimidate => "intimidate",
            Skill::Perform => "perform",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a skill name the sheet does not recognize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown skill: {0:?}")]
pub struct UnknownSkill(pub String);

impl FromStr for Skill {
    type Err = UnknownSkill;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Skill::ALL
            .into_iter()
            .find(|skill| skill.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSkill(s.to_string()))
    }
}

/// Skill ranks, each `0..=MAX_SKILL_RANK`. A fresh sheet starts untrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Skills {
    pub brawl: u8,
    pub channel: u8,
    pub clash: u8,
    pub evasion: u8,
    pub alert: u8,
    pub athletic: u8,
    pub nature: u8,
    pub stealth: u8,
    pub allure: u8,
    pub etiquette: u8,
    pub intimidate: u8,
    pub perform: u8,
}

impl Skills {
    pub fn get(&self, skill: Skill) -> u8 {
        match skill {
            Skill::Brawl => self.brawl,
            Skill::Channel => self.channel,
            Skill::Clash => self.clash,
            Skill::Evasion => self.evasion,
            Skill::Alert => self.alert,
            Skill::Athletic => self.athletic,
            Skill::Nature => self.nature,
            Skill::Stealth => self.stealth,
            Skill::Allure => self.allure,
            Skill::Etiquette => self.etiquette,
            Skill::Intimidate => self.intimidate,
            Skill::Perform => self.perform,
        }
    }

    pub fn set(&mut self, skill: Skill, rank: u8) {
        let rank = rank.min(MAX_SKILL_RANK);
        match skill {
            Skill::Brawl => self.brawl = rank,
            Skill::Channel => self.channel = rank,
            Skill::Clash => self.clash = rank,
            Skill::Evasion => self.evasion = rank,
            Skill::Alert => self.alert = rank,
            Skill::Athletic => self.athletic = rank,
            Skill::Nature => self.nature = rank,
            Skill::Stealth => self.stealth = rank,
            Skill::Allure => self.allure = rank,
            Skill::Etiquette => self.etiquette = rank,
            Skill::Intimidate => self.intimidate = rank,
            Skill::Perform => self.perform = rank,
        }
    }

    /// Copy of `self` with every rank clamped to the legal range.
    pub fn clamped(mut self) -> Self {
        for skill in Skill::ALL {
            self.set(skill, self.get(skill));
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Derived block
// ---------------------------------------------------------------------------

/// Values recomputed from stats and skills, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Derived {
    pub max_hp: u32,
    pub will: u32,
    pub initiative: u32,
    pub defense: u32,
    pub sp_defense: u32,
}

/// Moves on a sheet. `active` is what is usable in an encounter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moveset {
    pub learned: Vec<MoveId>,
    pub active: Vec<MoveId>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a `learn-move` request was refused.
///
/// [`LearnError::reason`] is the short code clients key their messages on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LearnError {
    #[error("move is already known")]
    AlreadyKnown,

    #[error("unrecognized move rank: {0:?}")]
    InvalidRank(String),

    #[error("not enough experience to learn the move")]
    InsufficientExp,
}

impl LearnError {
    pub fn reason(&self) -> &'static str {
        match self {
            LearnError::AlreadyKnown => "known",
            LearnError::InvalidRank(_) => "invalid-rank",
            LearnError::InsufficientExp => "exp",
        }
    }
}

/// Why a stat or skill upgrade was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("already at the maximum")]
    Maxed,

    #[error("not enough experience for the upgrade")]
    InsufficientExp,
}

impl ProgressError {
    pub fn reason(&self) -> &'static str {
        match self {
            ProgressError::Maxed => "maxed",
            ProgressError::InsufficientExp => "exp",
        }
    }
}

// ---------------------------------------------------------------------------
// Updates from the wire
// ---------------------------------------------------------------------------

/// The closed set of fields a client may change on a sheet it controls.
///
/// Every field is optional; absent fields leave the sheet alone. Values are
/// clamped or filtered rather than rejected, matching how the rest of the
/// table treats sloppy input. There is deliberately no way to express the
/// id, the owner, base stats, or the learned-move list here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterUpdate {
    /// Current hp, clamped to `0..=max_hp`.
    pub hp: Option<i64>,
    /// Display nickname; an empty string clears it.
    pub nickname: Option<String>,
    pub notes: Option<String>,
    /// Full replacement of the skill block, each rank clamped.
    pub skills: Option<Skills>,
    pub ability: Option<String>,
    /// Size factor (1.0 = 100%); recomputes height and weight.
    pub size: Option<f32>,
    /// Replacement active-move list, filtered to learned moves.
    pub active_moves: Option<Vec<MoveId>>,
    /// Experience total, floored at 0. The GM grants exp this way.
    pub exp: Option<i64>,
    /// Level, floored at 1.
    pub level: Option<i64>,
}

// ---------------------------------------------------------------------------
// The sheet
// ---------------------------------------------------------------------------

/// One character at the table: a player's Pokémon or a GM-run NPC.
///
/// `owner == None` marks an NPC/enemy sheet; only the GM sees those.
/// The sheet carries copies of the species fields it renders from
/// (name, image, base height/weight) so broadcasting it never needs a
/// dex lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub owner: Option<PlayerId>,
    pub owner_name: String,
    pub pokemon_id: SpeciesId,
    pub species_name: String,
    pub nickname: Option<String>,
    pub level: u32,
    pub exp: u32,
    pub stats: BaseStats,
    pub skills: Skills,
    pub derived: Derived,
    pub hp: u32,
    pub moves: Moveset,
    pub items: Vec<String>,
    pub conditions: Vec<String>,
    pub ability: String,
    /// Size factor applied to species height/weight. 1.0 = 100%.
    pub size: f32,
    pub height: f32,
    pub weight: f32,
    species_height: f32,
    species_weight: f32,
    pub species_image: String,
    pub image_override: Option<String>,
    pub notes: String,
}

impl Character {
    /// Build a fresh sheet from species data.
    ///
    /// The caller resolves the species first; construction itself cannot
    /// fail, so a half-built sheet never exists. `max_hp` overrides the
    /// derived maximum at creation time only; hp starts full either way.
    pub fn new(
        id: CharacterId,
        owner: Option<PlayerId>,
        owner_name: impl Into<String>,
        species: &Species,
        nickname: Option<String>,
        max_hp: Option<u32>,
    ) -> Self {
        let learned: Vec<MoveId> = species.moves.starter.clone();
        let active: Vec<MoveId> =
            learned.iter().take(MAX_ACTIVE_MOVES).cloned().collect();
        let nickname = nickname
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let mut sheet = Self {
            id,
            owner,
            owner_name: owner_name.into(),
            pokemon_id: species.id.clone(),
            species_name: species.name.clone(),
            nickname,
            level: 1,
            exp: 0,
            stats: species.base_stats,
            skills: Skills::default(),
            derived: Derived::default(),
            hp: 0,
            moves: Moveset { learned, active },
            items: Vec::new(),
            conditions: vec!["Healthy".to_string()],
            ability: species.abilities.first().cloned().unwrap_or_default(),
            size: 1.0,
            height: 0.0,
            weight: 0.0,
            species_height: species.height,
            species_weight: species.weight,
            species_image: species.image.clone(),
            image_override: None,
            notes: String::new(),
        };
        sheet.recompute_derived();
        sheet.recompute_size();
        if let Some(max_hp) = max_hp {
            sheet.derived.max_hp = max_hp;
        }
        sheet.hp = sheet.derived.max_hp;
        sheet
    }

    /// Name shown at the table: the nickname if set, else the species name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.species_name)
    }

    /// Image shown at the table: an override if set, else the species art.
    pub fn image(&self) -> &str {
        self.image_override.as_deref().unwrap_or(&self.species_image)
    }

    /// Recompute the derived block from stats and skills, re-clamping hp.
    pub fn recompute_derived(&mut self) {
        self.derived = Derived {
            max_hp: self.stats.hp * 3,
            will: self.stats.insight + 2,
            initiative: self.stats.dexterity + u32::from(self.skills.alert),
            defense: self.stats.vitality,
            sp_defense: self.stats.insight,
        };
        self.hp = self.hp.min(self.derived.max_hp);
    }

    fn recompute_size(&mut self) {
        self.height = round2(self.species_height * self.size);
        self.weight = round2(self.species_weight * self.size);
    }

    /// Apply a client update. Fields are clamped or filtered, never merged
    /// blindly, so no update can break a sheet invariant.
    pub fn apply_update(&mut self, update: CharacterUpdate) {
        if let Some(nickname) = update.nickname {
            let nickname = nickname.trim().to_string();
            self.nickname = (!nickname.is_empty()).then_some(nickname);
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
        if let Some(ability) = update.ability {
            self.ability = ability;
        }
        if let Some(skills) = update.skills {
            self.skills = skills.clamped();
            self.recompute_derived();
        }
        if let Some(size) = update.size {
            if size.is_finite() {
                self.size = size.clamp(SIZE_FACTOR_MIN, SIZE_FACTOR_MAX);
                self.recompute_size();
            }
        }
        if let Some(active) = update.active_moves {
            let mut replacement = Vec::new();
            for mv in active {
                if self.moves.learned.contains(&mv) && !replacement.contains(&mv) {
                    replacement.push(mv);
                }
                if replacement.len() == MAX_ACTIVE_MOVES {
                    break;
                }
            }
            self.moves.active = replacement;
        }
        if let Some(exp) = update.exp {
            self.exp = exp.max(0).min(i64::from(u32::MAX)) as u32;
        }
        if let Some(level) = update.level {
            self.level = level.max(1).min(i64::from(u32::MAX)) as u32;
        }
        // hp last: a skills recompute may have moved max_hp.
        if let Some(hp) = update.hp {
            self.hp = hp.clamp(0, i64::from(self.derived.max_hp)) as u32;
        }
    }

    /// Learn a move by id and rank string.
    ///
    /// On success the move is appended to `learned`, the rank's exp cost is
    /// deducted and the level raised (both skipped under a GM override),
    /// and the move auto-activates while a slot is free. On failure the
    /// sheet is untouched.
    pub fn learn_move(
        &mut self,
        move_id: MoveId,
        rank: &str,
        gm_override: bool,
    ) -> Result<(), LearnError> {
        if self.moves.learned.contains(&move_id) {
            return Err(LearnError::AlreadyKnown);
        }
        let rank: MoveRank = rank
            .parse()
            .map_err(|UnknownRank(raw)| LearnError::InvalidRank(raw))?;
        if !gm_override && !self.spend_exp(rank.exp_cost()) {
            return Err(LearnError::InsufficientExp);
        }
        self.moves.learned.push(move_id.clone());
        if self.moves.active.len() < MAX_ACTIVE_MOVES {
            self.moves.active.push(move_id);
        }
        Ok(())
    }

    /// Raise a skill one rank for exp: 6 from rank 0, else `current * 10`.
    pub fn upgrade_skill(&mut self, skill: Skill) -> Result<(), ProgressError> {
        let current = self.skills.get(skill);
        if current >= MAX_SKILL_RANK {
            return Err(ProgressError::Maxed);
        }
        let cost = if current == 0 { 6 } else { u32::from(current) * 10 };
        if !self.spend_exp(cost) {
            return Err(ProgressError::InsufficientExp);
        }
        self.skills.set(skill, current + 1);
        self.recompute_derived();
        Ok(())
    }

    /// Raise a stat one point for exp (`next * 10`), capped by the species
    /// maximum the caller looked up.
    pub fn upgrade_stat(
        &mut self,
        stat: Stat,
        species_max: &BaseStats,
    ) -> Result<(), ProgressError> {
        let next = self.stats.get(stat) + 1;
        if next > species_max.get(stat) {
            return Err(ProgressError::Maxed);
        }
        if !self.spend_exp(next * 10) {
            return Err(ProgressError::InsufficientExp);
        }
        self.stats.set(stat, next);
        self.recompute_derived();
        Ok(())
    }

    /// Dice pool for a check: the sum of the named stats and skills.
    /// Unknown keys contribute nothing, so a stale client cannot poison
    /// a roll.
    pub fn dice_pool(&self, keys: &[String]) -> i32 {
        let total: u32 = keys.iter().map(|key| self.pool_component(key)).sum();
        total.min(i32::MAX as u32) as i32
    }

    fn pool_component(&self, key: &str) -> u32 {
        let key = key.trim();
        if let Ok(stat) = key.parse::<Stat>() {
            return self.stats.get(stat);
        }
        if let Ok(skill) = key.parse::<Skill>() {
            return u32::from(self.skills.get(skill));
        }
        0
    }

    fn spend_exp(&mut self, cost: u32) -> bool {
        if self.exp < cost {
            return false;
        }
        self.exp -= cost;
        self.level += 1;
        true
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

// ===========================================================================
// Tests
// ===========================================================================
