//! The named events clients and the table exchange.
//!
//! Events are internally tagged: `{"type": "join-request", ...}`. Tag names
//! follow the original client vocabulary, which mixes kebab-case with a few
//! camelCase announcements; the odd ones are pinned with explicit renames
//! so existing clients keep parsing.

use pokeroll_dex::{MoveId, SpeciesId, Stat};
use pokeroll_dice::PoolRoll;
use serde::{Deserialize, Serialize};

use crate::character::{Character, CharacterUpdate, Skill};
use crate::types::{CharacterId, Player, PlayerId};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// Everything a client may send.
///
/// Malformed payloads fail decoding and are dropped by the handler; they
/// never reach the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Ask to join the table, optionally reclaiming an identity.
    JoinRequest {
        name: String,
        #[serde(default)]
        existing_id: Option<PlayerId>,
    },

    /// Keep-alive. Refreshes the sender's liveness, nothing else.
    Heartbeat,

    /// Change the sender's display name.
    ChangeName { new_name: String },

    /// Share a roll the client already made (a plain d6 on their end).
    #[serde(rename = "roll-shared")]
    SharedRoll { value: i64 },

    /// Roll a dice pool built from a character's stats and skills.
    RollPool {
        character_id: CharacterId,
        stat_keys: Vec<String>,
    },

    CreateCharacter {
        pokemon_id: SpeciesId,
        #[serde(default)]
        nickname: Option<String>,
        #[serde(default)]
        max_hp: Option<u32>,
    },

    UpdateCharacter {
        id: CharacterId,
        #[serde(flatten)]
        update: CharacterUpdate,
    },

    DeleteCharacter { id: CharacterId },

    /// GM-privileged variants: same validation, ownership bypassed.
    /// Ignored unless the sender is the GM.
    GmCreate {
        pokemon_id: SpeciesId,
        #[serde(default)]
        nickname: Option<String>,
        #[serde(default)]
        max_hp: Option<u32>,
    },

    GmUpdate {
        id: CharacterId,
        #[serde(flatten)]
        update: CharacterUpdate,
    },

    GmDelete { id: CharacterId },

    LearnMove {
        character_id: CharacterId,
        move_id: MoveId,
        rank: String,
        #[serde(default)]
        gm_override: bool,
    },

    UpgradeSkill {
        character_id: CharacterId,
        skill: Skill,
    },

    UpgradeStat {
        character_id: CharacterId,
        stat: Stat,
    },
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// Everything the table may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// The join went through; `player.id` is the reconnect token.
    JoinApproved { player: Player },

    JoinDenied { reason: String },

    /// Full roster replacement: every identity with a live connection.
    PlayerList { players: Vec<Player> },

    #[serde(rename = "playerJoinedAnnouncement")]
    PlayerJoined { name: String },

    /// A line for the table's shared event log.
    EventLog { message: String },

    NameChangeApproved { player: Player },

    NameChangeDenied { reason: String },

    /// Full character-list replacement, already filtered for the recipient.
    CharacterList { characters: Vec<Character> },

    #[serde(rename = "sharedRollResult")]
    SharedRollResult { name: String, value: i64 },

    #[serde(rename = "diceRolled")]
    DiceRolled {
        character_id: CharacterId,
        name: String,
        roll: PoolRoll,
    },

    /// Requester-only rejection of an action, with a short reason code.
    ActionDenied { action: String, reason: String },
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    //! The wire format is consumed by hand-written clients, so these tests
    //! pin the exact JSON tags and payload shapes.

    use super::*;

    fn decode(json: &str) -> ClientEvent {
        serde_json::from_str(json).unwrap()
    }

    // ====== inbound tags ======

    #[test]
    fn test_join_request_parses_without_existing_id() {
        let event = decode(r#"{"type":"join-request","name":"Ash"}"#);
        assert_eq!(
            event,
            ClientEvent::JoinRequest { name: "Ash".to_string(), existing_id: None }
        );
    }

    #[test]
    fn test_join_request_parses_with_existing_id() {
        let event = decode(r#"{"type":"join-request","name":"Ash","existing_id":"tok1"}"#);
        match event {
            ClientEvent::JoinRequest { existing_id: Some(id), .. } => {
                assert_eq!(id, PlayerId::new("tok1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_heartbeat_is_a_bare_tag() {
        assert_eq!(decode(r#"{"type":"heartbeat"}"#), ClientEvent::Heartbeat);
    }

    #[test]
    fn test_shared_roll_uses_the_original_tag() {
        let event = decode(r#"{"type":"roll-shared","value":5}"#);
        assert_eq!(event, ClientEvent::SharedRoll { value: 5 });
    }

    #[test]
    fn test_update_character_flattens_sheet_fields() {
        let event = decode(
            r#"{"type":"update-character","id":"c9","hp":3,"nickname":"Sparky"}"#,
        );
        match event {
            ClientEvent::UpdateCharacter { id, update } => {
                assert_eq!(id, CharacterId::new("c9"));
                assert_eq!(update.hp, Some(3));
                assert_eq!(update.nickname.as_deref(), Some("Sparky"));
                assert_eq!(update.skills, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_learn_move_gm_override_defaults_to_false() {
        let event = decode(
            r#"{"type":"learn-move","character_id":"c1","move_id":"surf","rank":"ace"}"#,
        );
        match event {
            ClientEvent::LearnMove { gm_override, .. } => assert!(!gm_override),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_gm_variants_use_short_tags() {
        let create = decode(r#"{"type":"gm-create","pokemon_id":"gastly"}"#);
        assert!(matches!(create, ClientEvent::GmCreate { .. }));

        let delete = decode(r#"{"type":"gm-delete","id":"c3"}"#);
        assert_eq!(delete, ClientEvent::GmDelete { id: CharacterId::new("c3") });
    }

    #[test]
    fn test_upgrade_events_carry_typed_targets() {
        let skill = decode(r#"{"type":"upgrade-skill","character_id":"c1","skill":"brawl"}"#);
        assert_eq!(
            skill,
            ClientEvent::UpgradeSkill {
                character_id: CharacterId::new("c1"),
                skill: Skill::Brawl,
            }
        );

        let stat = decode(r#"{"type":"upgrade-stat","character_id":"c1","stat":"insight"}"#);
        assert_eq!(
            stat,
            ClientEvent::UpgradeStat {
                character_id: CharacterId::new("c1"),
                stat: Stat::Insight,
            }
        );
    }

    #[test]
    fn test_unknown_event_type_fails_to_decode() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"type":"rm-rf","path":"/"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_required_field_fails_to_decode() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"type":"change-name"}"#);
        assert!(result.is_err());
    }

    // ====== outbound tags ======

    fn tag(event: &ServerEvent) -> String {
        let json = serde_json::to_value(event).unwrap();
        json["type"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_outbound_tags_match_the_client_vocabulary() {
        let player = Player {
            id: PlayerId::new("tok"),
            name: "Misty".to_string(),
            is_gm: false,
        };

        assert_eq!(
            tag(&ServerEvent::JoinApproved { player: player.clone() }),
            "join-approved"
        );
        assert_eq!(
            tag(&ServerEvent::PlayerList { players: vec![player.clone()] }),
            "player-list"
        );
        assert_eq!(
            tag(&ServerEvent::PlayerJoined { name: "Misty".to_string() }),
            "playerJoinedAnnouncement"
        );
        assert_eq!(
            tag(&ServerEvent::SharedRollResult { name: "Misty".to_string(), value: 4 }),
            "sharedRollResult"
        );
        assert_eq!(
            tag(&ServerEvent::NameChangeDenied { reason: "taken".to_string() }),
            "name-change-denied"
        );
        assert_eq!(
            tag(&ServerEvent::ActionDenied {
                action: "learn-move".to_string(),
                reason: "exp".to_string(),
            }),
            "action-denied"
        );
    }

    #[test]
    fn test_dice_rolled_embeds_the_pool_roll() {
        let roll = PoolRoll {
            rolls: vec![3, 5],
            successes: 1,
            dice_count: 2,
            success_threshold: 4,
            timestamp_ms: 0,
        };
        let event = ServerEvent::DiceRolled {
            character_id: CharacterId::new("c1"),
            name: "Onix".to_string(),
            roll,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "diceRolled");
        assert_eq!(json["roll"]["dice_count"], 2);
    }

    #[test]
    fn test_character_list_round_trips() {
        let dex = pokeroll_dex::Pokedex::bundled();
        let species = dex.get(&SpeciesId::new("pikachu")).unwrap();
        let sheet = Character::new(
            CharacterId::new("c1"),
            Some(PlayerId::new("p1")),
            "Ash",
            species,
            Some("Sparky".to_string()),
            None,
        );

        let event = ServerEvent::CharacterList { characters: vec![sheet] };
        let bytes = serde_json::to_vec(&event).unwrap();
        let back: ServerEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, back);
    }
}
