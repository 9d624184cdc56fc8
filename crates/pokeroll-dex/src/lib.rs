//! Species reference data for Pokeroll: the dex.
//!
//! The dex is an immutable lookup table built once at startup and shared
//! behind an `Arc`. Character sheets copy what they need out of it at
//! creation time (base stats, starter moves, the default ability); nothing
//! in the server ever writes back into it.
//!
//! A small bundled dataset ships with the crate for tests and local play;
//! a table can also load its own dataset from a JSON file with
//! [`Pokedex::load`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of a species in the dex, e.g. `"bulbasaur"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(pub String);

impl SpeciesId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a move, e.g. `"vine-whip"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveId(pub String);

impl MoveId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for MoveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Ranks
// ---------------------------------------------------------------------------

/// Trainer rank a move belongs to. Ranks gate when a move can be learned
/// and what it costs in experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveRank {
    Starter,
    Beginner,
    Amateur,
    Ace,
    Pro,
    Master,
    Champion,
}

impl MoveRank {
    /// All ranks, lowest first.
    pub const ALL: [MoveRank; 7] = [
        MoveRank::Starter,
        MoveRank::Beginner,
        MoveRank::Amateur,
        MoveRank::Ace,
        MoveRank::Pro,
        MoveRank::Master,
        MoveRank::Champion,
    ];

    /// Experience cost of learning a move of this rank.
    pub fn exp_cost(self) -> u32 {
        match self {
            MoveRank::Starter => 0,
            MoveRank::Beginner => 5,
            MoveRank::Amateur => 10,
            MoveRank::Ace => 15,
            MoveRank::Pro => 20,
            MoveRank::Master => 25,
            MoveRank::Champion => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MoveRank::Starter => "starter",
            MoveRank::Beginner => "beginner",
            MoveRank::Amateur => "amateur",
            MoveRank::Ace => "ace",
            MoveRank::Pro => "pro",
            MoveRank::Master => "master",
            MoveRank::Champion => "champion",
        }
    }
}

impl fmt::Display for MoveRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a rank string the dex does not recognize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown move rank: {0:?}")]
pub struct UnknownRank(pub String);

impl FromStr for MoveRank {
    type Err = UnknownRank;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(MoveRank::Starter),
            "beginner" => Ok(MoveRank::Beginner),
            "amateur" => Ok(MoveRank::Amateur),
            "ace" => Ok(MoveRank::Ace),
            "pro" => Ok(MoveRank::Pro),
            "master" => Ok(MoveRank::Master),
            "champion" => Ok(MoveRank::Champion),
            other => Err(UnknownRank(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// One of the six core stats on a species or sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Hp,
    Strength,
    Dexterity,
    Vitality,
    Special,
    Insight,
}

impl Stat {
    pub const ALL: [Stat; 6] = [
        Stat::Hp,
        Stat::Strength,
        Stat::Dexterity,
        Stat::Vitality,
        Stat::Special,
        Stat::Insight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stat::Hp => "hp",
            Stat::Strength => "strength",
            Stat::Dexterity => "dexterity",
            Stat::Vitality => "vitality",
            Stat::Special => "special",
            Stat::Insight => "insight",
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a stat name outside the six core stats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stat: {0:?}")]
pub struct UnknownStat(pub String);

impl FromStr for Stat {
    type Err = UnknownStat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Stat::ALL
            .into_iter()
            .find(|stat| stat.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStat(s.to_string()))
    }
}

/// The six core stats. Used both for species base/max values and for the
/// live values on a character sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BaseStats {
    pub hp: u32,
    pub strength: u32,
    pub dexterity: u32,
    pub vitality: u32,
    pub special: u32,
    pub insight: u32,
}

impl BaseStats {
    pub fn get(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Hp => self.hp,
            Stat::Strength => self.strength,
            Stat::Dexterity => self.dexterity,
            Stat::Vitality => self.vitality,
            Stat::Special => self.special,
            Stat::Insight => self.insight,
        }
    }

    pub fn set(&mut self, stat: Stat, value: u32) {
        match stat {
            Stat::Hp => self.hp = value,
            Stat::Strength => self.strength = value,
            Stat::Dexterity => self.dexterity = value,
            Stat::Vitality => self.vitality = value,
            Stat::Special => self.special = value,
            Stat::Insight => self.insight = value,
        }
    }
}

// ---------------------------------------------------------------------------
// Species
// ---------------------------------------------------------------------------

/// Moves a species can learn, grouped by the rank that unlocks them.
/// Ranks absent from the dataset are simply empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learnset {
    #[serde(default)]
    pub starter: Vec<MoveId>,
    #[serde(default)]
    pub beginner: Vec<MoveId>,
    #[serde(default)]
    pub amateur: Vec<MoveId>,
    #[serde(default)]
    pub ace: Vec<MoveId>,
    #[serde(default)]
    pub pro: Vec<MoveId>,
    #[serde(default)]
    pub master: Vec<MoveId>,
    #[serde(default)]
    pub champion: Vec<MoveId>,
}

impl Learnset {
    pub fn rank(&self, rank: MoveRank) -> &[MoveId] {
        match rank {
            MoveRank::Starter => &self.starter,
            MoveRank::Beginner => &self.beginner,
            MoveRank::Amateur => &self.amateur,
            MoveRank::Ace => &self.ace,
            MoveRank::Pro => &self.pro,
            MoveRank::Master => &self.master,
            MoveRank::Champion => &self.champion,
        }
    }
}

/// One species entry in the dex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    pub name: String,
    pub base_stats: BaseStats,
    pub max_stats: BaseStats,
    pub abilities: Vec<String>,
    #[serde(default)]
    pub moves: Learnset,
    #[serde(default)]
    pub image: String,
    /// Height in meters at size factor 1.0.
    pub height: f32,
    /// Weight in kilograms at size factor 1.0.
    pub weight: f32,
}

// ---------------------------------------------------------------------------
// Dex
// ---------------------------------------------------------------------------

/// Errors raised while building a dex.
#[derive(Debug, Error)]
pub enum DexError {
    #[error("failed to read dex file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse dex data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("dex contains no species")]
    Empty,

    #[error("duplicate species id in dex: {0}")]
    Duplicate(SpeciesId),
}

/// The species lookup table. Immutable once built.
#[derive(Debug, Clone)]
pub struct Pokedex {
    species: HashMap<SpeciesId, Species>,
}

impl Pokedex {
    /// Build a dex from already-parsed species entries.
    pub fn from_species(
        entries: impl IntoIterator<Item = Species>,
    ) -> Result<Self, DexError> {
        let mut species = HashMap::new();
        for entry in entries {
            let id = entry.id.clone();
            if species.insert(id.clone(), entry).is_some() {
                return Err(DexError::Duplicate(id));
            }
        }
        if species.is_empty() {
            return Err(DexError::Empty);
        }
        Ok(Self { species })
    }

    /// Parse a dex from JSON bytes. The expected shape is a top-level
    /// array of species entries.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DexError> {
        let entries: Vec<Species> = serde_json::from_slice(bytes)?;
        Self::from_species(entries)
    }

    /// Load a dex from a JSON file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DexError> {
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }

    /// The dataset bundled with the crate.
    ///
    /// Parsing it cannot fail: the bundled file is validated by this
    /// crate's test suite.
    pub fn bundled() -> Self {
        Self::from_json_slice(BUNDLED_DEX.as_bytes())
            .expect("bundled dex is valid")
    }

    pub fn get(&self, id: &SpeciesId) -> Option<&Species> {
        self.species.get(id)
    }

    pub fn contains(&self, id: &SpeciesId) -> bool {
        self.species.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Iterate over every species in the dex, in no particular order.
    pub fn species(&self) -> impl Iterator<Item = &Species> {
        self.species.values()
    }
}

const BUNDLED_DEX: &str = include_str!("../data/pokedex.json");

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(hp: u32, str_: u32, dex: u32, vit: u32, spc: u32, ins: u32) -> BaseStats {
        BaseStats {
            hp,
            strength: str_,
            dexterity: dex,
            vitality: vit,
            special: spc,
            insight: ins,
        }
    }

    fn species(id: &str) -> Species {
        Species {
            id: SpeciesId::new(id),
            name: id.to_string(),
            base_stats: stats(4, 2, 2, 2, 2, 2),
            max_stats: stats(7, 4, 4, 4, 4, 4),
            abilities: vec!["Run Away".into()],
            moves: Learnset::default(),
            image: String::new(),
            height: 1.0,
            weight: 10.0,
        }
    }

    // ====== bundled dataset ======

    #[test]
    fn test_bundled_dex_parses_and_is_populated() {
        let dex = Pokedex::bundled();
        assert!(dex.len() >= 10, "bundled dex should cover a starter shelf");
        assert!(dex.contains(&SpeciesId::new("bulbasaur")));
        assert!(dex.contains(&SpeciesId::new("pikachu")));
    }

    #[test]
    fn test_bundled_dex_entries_are_coherent() {
        let dex = Pokedex::bundled();
        for sp in dex.species() {
            assert!(!sp.name.is_empty(), "{}: species needs a name", sp.id);
            assert!(!sp.abilities.is_empty(), "{}: species needs an ability", sp.id);
            assert!(
                !sp.moves.starter.is_empty(),
                "{}: a fresh sheet needs starter moves",
                sp.id
            );
            assert!(sp.height > 0.0 && sp.weight > 0.0, "{}: bad dimensions", sp.id);
            for stat in Stat::ALL {
                assert!(
                    sp.base_stats.get(stat) <= sp.max_stats.get(stat),
                    "{}: base {} exceeds max",
                    sp.id,
                    stat
                );
            }
        }
    }

    #[test]
    fn test_bundled_dex_unknown_species_is_none() {
        let dex = Pokedex::bundled();
        assert!(dex.get(&SpeciesId::new("missingno")).is_none());
    }

    // ====== construction ======

    #[test]
    fn test_from_species_rejects_duplicates() {
        let result = Pokedex::from_species([species("eevee"), species("eevee")]);
        assert!(matches!(result, Err(DexError::Duplicate(id)) if id.0 == "eevee"));
    }

    #[test]
    fn test_from_json_rejects_empty_dataset() {
        let result = Pokedex::from_json_slice(b"[]");
        assert!(matches!(result, Err(DexError::Empty)));
    }

    #[test]
    fn test_from_json_rejects_malformed_data() {
        let result = Pokedex::from_json_slice(b"{ not json");
        assert!(matches!(result, Err(DexError::Parse(_))));
    }

    #[test]
    fn test_species_parses_with_missing_optional_ranks() {
        let json = r#"[{
            "id": "dratini",
            "name": "Dratini",
            "base_stats": { "hp": 3, "strength": 2, "dexterity": 2, "vitality": 2, "special": 2, "insight": 2 },
            "max_stats": { "hp": 5, "strength": 4, "dexterity": 4, "vitality": 4, "special": 4, "insight": 4 },
            "abilities": ["Shed Skin"],
            "moves": { "starter": ["wrap"] },
            "height": 1.8,
            "weight": 3.3
        }]"#;

        let dex = Pokedex::from_json_slice(json.as_bytes()).unwrap();
        let dratini = dex.get(&SpeciesId::new("dratini")).unwrap();
        assert_eq!(dratini.moves.rank(MoveRank::Starter).len(), 1);
        assert!(dratini.moves.rank(MoveRank::Champion).is_empty());
        assert_eq!(dratini.image, "");
    }

    // ====== ranks ======

    #[test]
    fn test_move_rank_exp_costs() {
        let costs: Vec<u32> = MoveRank::ALL.iter().map(|r| r.exp_cost()).collect();
        assert_eq!(costs, vec![0, 5, 10, 15, 20, 25, 30]);
    }

    #[test]
    fn test_move_rank_parses_case_insensitively() {
        assert_eq!("Ace".parse::<MoveRank>().unwrap(), MoveRank::Ace);
        assert_eq!("  champion ".parse::<MoveRank>().unwrap(), MoveRank::Champion);
    }

    #[test]
    fn test_move_rank_rejects_unknown_strings() {
        let err = "legend".parse::<MoveRank>().unwrap_err();
        assert_eq!(err, UnknownRank("legend".to_string()));
    }

    #[test]
    fn test_move_rank_display_round_trips() {
        for rank in MoveRank::ALL {
            assert_eq!(rank.to_string().parse::<MoveRank>().unwrap(), rank);
        }
    }

    // ====== stats ======

    #[test]
    fn test_stat_parses_from_lowercase_names() {
        for stat in Stat::ALL {
            assert_eq!(stat.as_str().parse::<Stat>().unwrap(), stat);
        }
    }

    #[test]
    fn test_stat_rejects_unknown_names() {
        let err = "luck".parse::<Stat>().unwrap_err();
        assert_eq!(err, UnknownStat("luck".to_string()));
    }

    #[test]
    fn test_base_stats_get_set_round_trip() {
        let mut stats = BaseStats::default();
        stats.set(Stat::Special, 4);
        assert_eq!(stats.get(Stat::Special), 4);
        assert_eq!(stats.get(Stat::Strength), 0);
    }
}
