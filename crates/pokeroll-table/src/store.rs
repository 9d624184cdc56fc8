//! The character store: the authoritative registry of sheets.
//!
//! All mutation goes through the operations here, and every operation
//! checks authorization before touching a sheet: the GM may modify any
//! sheet, a player only their own. The store never broadcasts; it returns
//! results and lets the table actor decide who hears about them.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use pokeroll_dex::{MoveId, Pokedex, SpeciesId, Stat};
use pokeroll_protocol::{
    Character, CharacterId, CharacterUpdate, Player, PlayerId, Skill,
};
use rand::Rng;

use crate::StoreError;

/// In-memory registry of every character at the table.
pub struct CharacterStore {
    /// Read-only species data, injected once at construction.
    dex: Arc<Pokedex>,

    characters: HashMap<CharacterId, Character>,

    /// Ownership cap for non-GM players.
    max_per_player: usize,
}

impl CharacterStore {
    pub fn new(dex: Arc<Pokedex>, max_per_player: usize) -> Self {
        Self {
            dex,
            characters: HashMap::new(),
            max_per_player,
        }
    }

    /// Creates a sheet for `requester` from a species row.
    ///
    /// A GM-created sheet is an unowned NPC. Construction is all-or-nothing:
    /// the species lookup and the ownership cap are checked before any
    /// sheet exists.
    ///
    /// # Errors
    /// - [`StoreError::SpeciesNotFound`] — unknown species id
    /// - [`StoreError::LimitExceeded`] — non-GM requester at the cap
    pub fn create(
        &mut self,
        requester: &Player,
        species_id: &SpeciesId,
        nickname: Option<String>,
        max_hp: Option<u32>,
    ) -> Result<&Character, StoreError> {
        let species = self
            .dex
            .get(species_id)
            .ok_or_else(|| StoreError::SpeciesNotFound(species_id.clone()))?;

        if !requester.is_gm
            && self.owned_by(&requester.id).count() >= self.max_per_player
        {
            return Err(StoreError::LimitExceeded {
                cap: self.max_per_player,
            });
        }

        let owner = if requester.is_gm {
            None
        } else {
            Some(requester.id.clone())
        };
        let id = CharacterId::new(generate_id());
        let character = Character::new(
            id.clone(),
            owner,
            requester.name.clone(),
            species,
            nickname,
            max_hp,
        );

        tracing::info!(
            character_id = %id,
            species = %species_id,
            player_id = %requester.id,
            npc = requester.is_gm,
            "character created"
        );
        self.characters.insert(id.clone(), character);
        Ok(self.characters.get(&id).expect("just inserted"))
    }

    /// Applies a partial update to a sheet.
    ///
    /// Field semantics (clamping, filtering) live on the sheet itself;
    /// the store contributes the lookup and the authorization check.
    pub fn update(
        &mut self,
        requester: &Player,
        id: &CharacterId,
        update: CharacterUpdate,
    ) -> Result<&Character, StoreError> {
        let character = self
            .characters
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        authorize(requester, character)?;

        character.apply_update(update);
        tracing::debug!(character_id = %id, player_id = %requester.id, "character updated");
        Ok(character)
    }

    /// Removes a sheet and returns it, so the caller can announce the
    /// departure by name.
    pub fn delete(
        &mut self,
        requester: &Player,
        id: &CharacterId,
    ) -> Result<Character, StoreError> {
        match self.characters.entry(id.clone()) {
            Entry::Occupied(entry) => {
                authorize(requester, entry.get())?;
                let removed = entry.remove();
                tracing::info!(character_id = %id, player_id = %requester.id, "character deleted");
                Ok(removed)
            }
            Entry::Vacant(_) => Err(StoreError::NotFound(id.clone())),
        }
    }

    /// Teaches a sheet a move, spending exp unless a GM override waives it.
    ///
    /// The override flag is stripped unless the requester actually is the
    /// GM; a player cannot grant themselves free moves by setting it.
    pub fn learn_move(
        &mut self,
        requester: &Player,
        id: &CharacterId,
        move_id: MoveId,
        rank: &str,
        gm_override: bool,
    ) -> Result<&Character, StoreError> {
        let character = self
            .characters
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        authorize(requester, character)?;

        let gm_override = gm_override && requester.is_gm;
        character.learn_move(move_id, rank, gm_override)?;
        Ok(character)
    }

    /// Raises a skill one rank for exp.
    pub fn upgrade_skill(
        &mut self,
        requester: &Player,
        id: &CharacterId,
        skill: Skill,
    ) -> Result<&Character, StoreError> {
        let character = self
            .characters
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        authorize(requester, character)?;

        character.upgrade_skill(skill)?;
        Ok(character)
    }

    /// Raises a base stat one point for exp, capped by the species maximum.
    pub fn upgrade_stat(
        &mut self,
        requester: &Player,
        id: &CharacterId,
        stat: Stat,
    ) -> Result<&Character, StoreError> {
        let character = self
            .characters
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        authorize(requester, character)?;

        let species = self
            .dex
            .get(&character.pokemon_id)
            .ok_or_else(|| StoreError::SpeciesNotFound(character.pokemon_id.clone()))?;
        character.upgrade_stat(stat, &species.max_stats)?;
        Ok(character)
    }

    /// The sheets `player` may see: all of them for the GM (NPCs included),
    /// only their own for everyone else. Sorted by display name so every
    /// broadcast lists characters in a stable order.
    pub fn visible_to(&self, player: &Player) -> Vec<Character> {
        let mut visible: Vec<Character> = self
            .characters
            .values()
            .filter(|c| player.is_gm || c.owner.as_ref() == Some(&player.id))
            .cloned()
            .collect();
        visible.sort_by(|a, b| a.display_name().cmp(b.display_name()));
        visible
    }

    /// Sheets owned by one player. NPCs (owner `None`) never match.
    pub fn owned_by<'a>(
        &'a self,
        owner: &'a PlayerId,
    ) -> impl Iterator<Item = &'a Character> {
        self.characters
            .values()
            .filter(move |c| c.owner.as_ref() == Some(owner))
    }

    pub fn get(&self, id: &CharacterId) -> Option<&Character> {
        self.characters.get(id)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

/// GM passes; the owner passes; everyone else is refused.
///
/// Checked on every mutation, not just creation, so an identity that never
/// owned a sheet can not grow into it by guessing ids.
fn authorize(requester: &Player, character: &Character) -> Result<(), StoreError> {
    if requester.is_gm || character.owner.as_ref() == Some(&requester.id) {
        Ok(())
    } else {
        Err(StoreError::Forbidden)
    }
}

/// Random 32-character lowercase hex id for a new sheet.
fn generate_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
