//! Table actor: one isolated Tokio task that owns the whole session.
//!
//! The actor holds the presence maps, the character store and the per-
//! connection outbound senders, and mutates them from exactly one task.
//! Everything else talks to it through an mpsc channel, so joins, renames,
//! sheet mutations and the liveness sweep are strictly serialized: each
//! inbound event runs to completion, broadcasts included, before the next
//! one starts.
//!
//! Event handling is split in two phases. A handler inspects and mutates
//! state, producing `(Recipient, ServerEvent)` pairs; dispatch then resolves
//! each recipient to a live connection and pushes the event onto that
//! connection's outbound channel. Sends are fire-and-forget: a dead
//! receiver is skipped, never an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pokeroll_dex::{MoveId, Pokedex, SpeciesId, Stat};
use pokeroll_protocol::{
    CharacterId, CharacterUpdate, ClientEvent, ConnectionId, Player,
    PlayerId, Recipient, ServerEvent, Skill,
};
use pokeroll_session::{PresenceError, PresenceManager};
use tokio::sync::{mpsc, oneshot};

use crate::{CharacterStore, StoreError, TableConfig, TableError};

/// Backpressure bound for the actor's command channel.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Join denial wording, shared by the invalid and taken cases so a caller
/// cannot probe which live names exist.
const JOIN_DENIED_REASON: &str = "Name already taken or invalid.";

/// Rename denial wording.
const NAME_DENIED_REASON: &str = "Name already taken.";

/// Channel sender for delivering outbound events to one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

// ---------------------------------------------------------------------------
// Commands and the handle
// ---------------------------------------------------------------------------

/// Commands sent to the table actor through its channel.
pub(crate) enum TableCommand {
    /// Register a connection's outbound channel. Happens at accept time,
    /// before the client has any identity.
    Attach {
        conn: ConnectionId,
        sender: EventSender,
    },

    /// The connection closed: drop its sender and unbind its identity.
    Detach { conn: ConnectionId },

    /// A decoded client event, attributed to the connection it came in on.
    Event {
        conn: ConnectionId,
        event: ClientEvent,
    },

    /// Request a metadata snapshot.
    GetInfo { reply: oneshot::Sender<TableInfo> },

    /// Shut down the table.
    Shutdown,
}

/// A snapshot of table metadata (not the session state itself).
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Connections currently bound to an identity.
    pub live_players: usize,
    /// Identities ever minted, live or not.
    pub known_identities: usize,
    /// Character sheets in the store.
    pub characters: usize,
}

/// Handle to the running table actor.
///
/// Cheap to clone — it is just an `mpsc::Sender` wrapper. The server keeps
/// one per process and clones it into every connection handler.
#[derive(Clone)]
pub struct TableHandle {
    sender: mpsc::Sender<TableCommand>,
}

impl TableHandle {
    /// Registers a connection's outbound channel with the table.
    pub async fn attach(
        &self,
        conn: ConnectionId,
        sender: EventSender,
    ) -> Result<(), TableError> {
        self.sender
            .send(TableCommand::Attach { conn, sender })
            .await
            .map_err(|_| TableError::Unavailable)
    }

    /// Reports a closed connection.
    pub async fn detach(&self, conn: ConnectionId) -> Result<(), TableError> {
        self.sender
            .send(TableCommand::Detach { conn })
            .await
            .map_err(|_| TableError::Unavailable)
    }

    /// Forwards a client event to the table (fire-and-forget).
    pub async fn event(
        &self,
        conn: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), TableError> {
        self.sender
            .send(TableCommand::Event { conn, event })
            .await
            .map_err(|_| TableError::Unavailable)
    }

    /// Requests the current table info.
    ///
    /// Because commands are processed in order, the reply also proves that
    /// every command sent before this call has been handled.
    pub async fn info(&self) -> Result<TableInfo, TableError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(TableCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| TableError::Unavailable)?;
        reply_rx.await.map_err(|_| TableError::Unavailable)
    }

    /// Tells the table to shut down.
    pub async fn shutdown(&self) -> Result<(), TableError> {
        self.sender
            .send(TableCommand::Shutdown)
            .await
            .map_err(|_| TableError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// The actor
// ---------------------------------------------------------------------------

/// The internal table state. Runs inside a Tokio task.
struct TableActor {
    presence: PresenceManager,
    store: CharacterStore,
    /// Outbound channels for every attached connection, joined or not.
    senders: HashMap<ConnectionId, EventSender>,
    receiver: mpsc::Receiver<TableCommand>,
    sweep_interval: Duration,
}

impl TableActor {
    /// Runs the actor loop until shutdown.
    ///
    /// The liveness sweep is a timer branch of the same `select!`, so it
    /// can never interleave with event handling.
    async fn run(mut self) {
        tracing::info!("table actor started");
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(TableCommand::Attach { conn, sender }) => {
                        self.handle_attach(conn, sender);
                    }
                    Some(TableCommand::Detach { conn }) => {
                        self.handle_detach(conn);
                    }
                    Some(TableCommand::Event { conn, event }) => {
                        let out = self.handle_event(conn, event);
                        self.dispatch(conn, out);
                    }
                    Some(TableCommand::GetInfo { reply }) => {
                        let _ = reply.send(self.info());
                    }
                    Some(TableCommand::Shutdown) => {
                        tracing::info!("table shutting down");
                        break;
                    }
                    None => break,
                },
                _ = sweep.tick() => self.handle_sweep(),
            }
        }

        tracing::info!("table actor stopped");
    }

    fn handle_attach(&mut self, conn: ConnectionId, sender: EventSender) {
        tracing::debug!(%conn, "connection attached");
        self.senders.insert(conn, sender);
    }

    /// A closed connection loses its binding at once instead of waiting
    /// out the idle timeout. The identity stays reclaimable.
    fn handle_detach(&mut self, conn: ConnectionId) {
        self.senders.remove(&conn);
        if let Some(player) = self.presence.disconnect(conn) {
            tracing::info!(
                %conn,
                player_id = %player.id,
                name = %player.name,
                "connection detached"
            );
            self.broadcast(ServerEvent::PlayerList {
                players: self.presence.roster(),
            });
        }
    }

    /// Unbinds every connection that has been silent too long and, when
    /// anyone was dropped, pushes the refreshed roster to the survivors.
    ///
    /// Only the binding is dropped. The socket may well still be open, so
    /// its outbound sender stays registered until the handler detaches.
    fn handle_sweep(&mut self) {
        let evicted = self.presence.sweep();
        if evicted.is_empty() {
            return;
        }
        self.broadcast(ServerEvent::PlayerList {
            players: self.presence.roster(),
        });
    }

    // -- Event handling -----------------------------------------------------

    fn handle_event(
        &mut self,
        conn: ConnectionId,
        event: ClientEvent,
    ) -> Vec<(Recipient, ServerEvent)> {
        match event {
            ClientEvent::JoinRequest { name, existing_id } => {
                self.handle_join(conn, &name, existing_id)
            }
            ClientEvent::Heartbeat => {
                if !self.presence.heartbeat(conn) {
                    tracing::debug!(%conn, "heartbeat from unjoined connection");
                }
                Vec::new()
            }
            ClientEvent::ChangeName { new_name } => {
                self.handle_rename(conn, &new_name)
            }
            ClientEvent::SharedRoll { value } => {
                self.handle_shared_roll(conn, value)
            }
            ClientEvent::RollPool {
                character_id,
                stat_keys,
            } => self.handle_roll_pool(conn, character_id, &stat_keys),
            ClientEvent::CreateCharacter {
                pokemon_id,
                nickname,
                max_hp,
            } => self.handle_create(
                conn,
                false,
                "create-character",
                pokemon_id,
                nickname,
                max_hp,
            ),
            ClientEvent::GmCreate {
                pokemon_id,
                nickname,
                max_hp,
            } => self.handle_create(
                conn,
                true,
                "gm-create",
                pokemon_id,
                nickname,
                max_hp,
            ),
            ClientEvent::UpdateCharacter { id, update } => {
                self.handle_update(conn, false, "update-character", id, update)
            }
            ClientEvent::GmUpdate { id, update } => {
                self.handle_update(conn, true, "gm-update", id, update)
            }
            ClientEvent::DeleteCharacter { id } => {
                self.handle_delete(conn, false, "delete-character", id)
            }
            ClientEvent::GmDelete { id } => {
                self.handle_delete(conn, true, "gm-delete", id)
            }
            ClientEvent::LearnMove {
                character_id,
                move_id,
                rank,
                gm_override,
            } => self.handle_learn_move(
                conn,
                character_id,
                move_id,
                &rank,
                gm_override,
            ),
            ClientEvent::UpgradeSkill {
                character_id,
                skill,
            } => self.handle_upgrade_skill(conn, character_id, skill),
            ClientEvent::UpgradeStat {
                character_id,
                stat,
            } => self.handle_upgrade_stat(conn, character_id, stat),
        }
    }

    fn handle_join(
        &mut self,
        conn: ConnectionId,
        name: &str,
        existing_id: Option<PlayerId>,
    ) -> Vec<(Recipient, ServerEvent)> {
        match self.presence.join(conn, name, existing_id.as_ref()) {
            Ok(player) => {
                vec![
                    (
                        Recipient::Sender,
                        ServerEvent::JoinApproved {
                            player: player.clone(),
                        },
                    ),
                    (
                        Recipient::All,
                        ServerEvent::PlayerJoined {
                            name: player.name.clone(),
                        },
                    ),
                    (
                        Recipient::All,
                        ServerEvent::PlayerList {
                            players: self.presence.roster(),
                        },
                    ),
                    // Late-join snapshot: the joiner's own filtered view.
                    (
                        Recipient::Sender,
                        ServerEvent::CharacterList {
                            characters: self.store.visible_to(&player),
                        },
                    ),
                ]
            }
            Err(error) => {
                tracing::debug!(%conn, %error, "join denied");
                vec![(
                    Recipient::Sender,
                    ServerEvent::JoinDenied {
                        reason: JOIN_DENIED_REASON.to_string(),
                    },
                )]
            }
        }
    }

    fn handle_rename(
        &mut self,
        conn: ConnectionId,
        new_name: &str,
    ) -> Vec<(Recipient, ServerEvent)> {
        match self.presence.rename(conn, new_name) {
            Ok((old_name, player)) => {
                let message =
                    format!("{old_name} changed name to {}", player.name);
                vec![
                    (
                        Recipient::Sender,
                        ServerEvent::NameChangeApproved { player },
                    ),
                    (Recipient::All, ServerEvent::EventLog { message }),
                    (
                        Recipient::All,
                        ServerEvent::PlayerList {
                            players: self.presence.roster(),
                        },
                    ),
                ]
            }
            Err(PresenceError::NotJoined) => {
                tracing::debug!(%conn, "rename from unjoined connection dropped");
                Vec::new()
            }
            Err(error) => {
                tracing::debug!(%conn, %error, "rename denied");
                vec![(
                    Recipient::Sender,
                    ServerEvent::NameChangeDenied {
                        reason: NAME_DENIED_REASON.to_string(),
                    },
                )]
            }
        }
    }

    /// A roll the client already made on their end; the table only tags
    /// it with a display name and relays it. Works even before a join so
    /// the table never eats a roll, it just loses the attribution.
    fn handle_shared_roll(
        &self,
        conn: ConnectionId,
        value: i64,
    ) -> Vec<(Recipient, ServerEvent)> {
        let name = self
            .presence
            .player_for_conn(conn)
            .map(|player| player.name.clone())
            .unwrap_or_else(|| "Unknown Player".to_string());
        vec![(
            Recipient::All,
            ServerEvent::SharedRollResult { name, value },
        )]
    }

    /// Rolls a pool sized by a character's stats and skills. GM-or-owner,
    /// like every other use of a sheet.
    fn handle_roll_pool(
        &self,
        conn: ConnectionId,
        character_id: CharacterId,
        stat_keys: &[String],
    ) -> Vec<(Recipient, ServerEvent)> {
        let Some(requester) = self.requester(conn, "roll-pool", false) else {
            return Vec::new();
        };
        let Some(sheet) = self.store.get(&character_id) else {
            tracing::debug!(
                character_id = %character_id,
                "roll-pool for unknown character dropped"
            );
            return Vec::new();
        };
        if !requester.is_gm && sheet.owner.as_ref() != Some(&requester.id) {
            tracing::debug!(
                character_id = %character_id,
                player_id = %requester.id,
                "roll-pool for someone else's character dropped"
            );
            return Vec::new();
        }

        let dice_count = sheet.dice_pool(stat_keys);
        let name = sheet.display_name().to_string();
        let roll =
            pokeroll_dice::roll_pool_default(&mut rand::rng(), dice_count);
        tracing::info!(
            character_id = %character_id,
            dice = roll.dice_count,
            successes = roll.successes,
            "dice pool rolled"
        );
        vec![(
            Recipient::All,
            ServerEvent::DiceRolled {
                character_id,
                name,
                roll,
            },
        )]
    }

    fn handle_create(
        &mut self,
        conn: ConnectionId,
        gm_only: bool,
        action: &'static str,
        species_id: SpeciesId,
        nickname: Option<String>,
        max_hp: Option<u32>,
    ) -> Vec<(Recipient, ServerEvent)> {
        let Some(requester) = self.requester(conn, action, gm_only) else {
            return Vec::new();
        };
        match self.store.create(&requester, &species_id, nickname, max_hp) {
            Ok(sheet) => {
                let message = format!("{} has entered.", sheet.display_name());
                let mut out =
                    vec![(Recipient::All, ServerEvent::EventLog { message })];
                out.extend(self.character_list_refresh());
                out
            }
            Err(error) => self.deny(action, error),
        }
    }

    fn handle_update(
        &mut self,
        conn: ConnectionId,
        gm_only: bool,
        action: &'static str,
        id: CharacterId,
        update: CharacterUpdate,
    ) -> Vec<(Recipient, ServerEvent)> {
        let Some(requester) = self.requester(conn, action, gm_only) else {
            return Vec::new();
        };
        let result = self.store.update(&requester, &id, update).map(|_| ());
        self.mutation_outcome(action, result)
    }

    fn handle_delete(
        &mut self,
        conn: ConnectionId,
        gm_only: bool,
        action: &'static str,
        id: CharacterId,
    ) -> Vec<(Recipient, ServerEvent)> {
        let Some(requester) = self.requester(conn, action, gm_only) else {
            return Vec::new();
        };
        match self.store.delete(&requester, &id) {
            Ok(removed) => {
                let message =
                    format!("{} has left.", removed.display_name());
                let mut out =
                    vec![(Recipient::All, ServerEvent::EventLog { message })];
                out.extend(self.character_list_refresh());
                out
            }
            Err(error) => self.deny(action, error),
        }
    }

    fn handle_learn_move(
        &mut self,
        conn: ConnectionId,
        character_id: CharacterId,
        move_id: MoveId,
        rank: &str,
        gm_override: bool,
    ) -> Vec<(Recipient, ServerEvent)> {
        let Some(requester) = self.requester(conn, "learn-move", false) else {
            return Vec::new();
        };
        let result = self
            .store
            .learn_move(&requester, &character_id, move_id, rank, gm_override)
            .map(|_| ());
        self.mutation_outcome("learn-move", result)
    }

    fn handle_upgrade_skill(
        &mut self,
        conn: ConnectionId,
        character_id: CharacterId,
        skill: Skill,
    ) -> Vec<(Recipient, ServerEvent)> {
        let Some(requester) = self.requester(conn, "upgrade-skill", false)
        else {
            return Vec::new();
        };
        let result = self
            .store
            .upgrade_skill(&requester, &character_id, skill)
            .map(|_| ());
        self.mutation_outcome("upgrade-skill", result)
    }

    fn handle_upgrade_stat(
        &mut self,
        conn: ConnectionId,
        character_id: CharacterId,
        stat: Stat,
    ) -> Vec<(Recipient, ServerEvent)> {
        let Some(requester) = self.requester(conn, "upgrade-stat", false)
        else {
            return Vec::new();
        };
        let result = self
            .store
            .upgrade_stat(&requester, &character_id, stat)
            .map(|_| ());
        self.mutation_outcome("upgrade-stat", result)
    }

    // -- Shared plumbing ----------------------------------------------------

    /// Resolves the identity behind `conn`, enforcing the GM gate for the
    /// `gm-*` event family. Events from unjoined connections, and `gm-*`
    /// events from mere players, are dropped without a reply.
    fn requester(
        &self,
        conn: ConnectionId,
        action: &str,
        gm_only: bool,
    ) -> Option<Player> {
        let Some(player) = self.presence.player_for_conn(conn) else {
            tracing::debug!(%conn, action, "event from unjoined connection dropped");
            return None;
        };
        if gm_only && !player.is_gm {
            tracing::debug!(
                %conn,
                action,
                player_id = %player.id,
                "gm event from non-gm dropped"
            );
            return None;
        }
        Some(player.clone())
    }

    /// Success refreshes everyone's character list; failure goes through
    /// the denial routing.
    fn mutation_outcome(
        &self,
        action: &'static str,
        result: Result<(), StoreError>,
    ) -> Vec<(Recipient, ServerEvent)> {
        match result {
            Ok(()) => self.character_list_refresh(),
            Err(error) => self.deny(action, error),
        }
    }

    /// Routes a store failure per its class: validation and limit failures
    /// go back to the requester as `action-denied`, the rest are dropped
    /// with a debug log.
    fn deny(
        &self,
        action: &'static str,
        error: StoreError,
    ) -> Vec<(Recipient, ServerEvent)> {
        match error.denial_reason() {
            Some(reason) => vec![(
                Recipient::Sender,
                ServerEvent::ActionDenied {
                    action: action.to_string(),
                    reason: reason.to_string(),
                },
            )],
            None => {
                tracing::debug!(action, %error, "request dropped");
                Vec::new()
            }
        }
    }

    /// One full, per-recipient filtered character list for every bound
    /// identity. Lists are full replacements; clients never merge diffs.
    fn character_list_refresh(&self) -> Vec<(Recipient, ServerEvent)> {
        self.presence
            .bound_players()
            .map(|(_, player)| {
                (
                    Recipient::Player(player.id.clone()),
                    ServerEvent::CharacterList {
                        characters: self.store.visible_to(player),
                    },
                )
            })
            .collect()
    }

    // -- Dispatch -----------------------------------------------------------

    /// Resolves recipients to live connections and delivers the events.
    /// `origin` is the connection the inbound event arrived on; it backs
    /// `Recipient::Sender`, which must work before any identity exists.
    fn dispatch(
        &self,
        origin: ConnectionId,
        out: Vec<(Recipient, ServerEvent)>,
    ) {
        for (recipient, event) in out {
            match recipient {
                Recipient::Sender => self.send_to(origin, event),
                Recipient::Player(id) => {
                    if let Some(conn) = self.presence.conn_for_player(&id) {
                        self.send_to(conn, event);
                    }
                }
                Recipient::All => self.broadcast(event),
            }
        }
    }

    /// Sends one event to every connection bound to an identity.
    fn broadcast(&self, event: ServerEvent) {
        for (conn, _) in self.presence.bound_players() {
            self.send_to(conn, event.clone());
        }
    }

    /// Sends an event to a single connection. Silently drops if the
    /// receiver is gone (handler already shut down).
    fn send_to(&self, conn: ConnectionId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&conn) {
            let _ = sender.send(event);
        }
    }

    fn info(&self) -> TableInfo {
        TableInfo {
            live_players: self.presence.live_count(),
            known_identities: self.presence.identity_count(),
            characters: self.store.len(),
        }
    }
}

/// Spawns the table actor task and returns a handle to communicate with it.
pub fn spawn_table(config: TableConfig, dex: Arc<Pokedex>) -> TableHandle {
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);

    let actor = TableActor {
        presence: PresenceManager::new(config.presence.clone()),
        store: CharacterStore::new(dex, config.max_characters_per_player),
        senders: HashMap::new(),
        receiver: rx,
        sweep_interval: config.presence.sweep_interval,
    };

    tokio::spawn(actor.run());

    TableHandle { sender: tx }
}
