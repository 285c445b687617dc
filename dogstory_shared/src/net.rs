//! Wire types for the game server's JSON API.
//!
//! Goals:
//! - Mirror the server payloads exactly (field names, optional fields).
//! - Keep the received payload immutable; derived client state lives elsewhere.
//! - Reject malformed payloads at the boundary so the tick loop never sees them.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::{error::FetchError, math::Vec2};

/// Prefix shared by every API endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// Identifies a player (a dog) on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

/// Identifies a loot item, both in the world and inside bags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LootId(pub u64);

/// Index into the map's loot archetypes.
pub type LootKind = u32;

/// Facing direction reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "U")]
    Up,
    #[serde(rename = "D")]
    Down,
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

impl Direction {
    /// Scene yaw for this direction, in radians. `Down` faces the camera.
    pub fn facing(self) -> f64 {
        match self {
            Direction::Down => 0.0,
            Direction::Right => PI / 2.0,
            Direction::Up => PI,
            Direction::Left => PI * 3.0 / 2.0,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Direction::Up => 'U',
            Direction::Down => 'D',
            Direction::Left => 'L',
            Direction::Right => 'R',
        }
    }
}

/// Movement command sent to the server. `Stop` is the empty string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MoveCommand {
    #[serde(rename = "U")]
    Up,
    #[serde(rename = "D")]
    Down,
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
    #[default]
    #[serde(rename = "")]
    Stop,
}

impl MoveCommand {
    /// Parses a single key symbol (`U`, `D`, `L`, `R`), case-insensitive.
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "U" => Some(MoveCommand::Up),
            "D" => Some(MoveCommand::Down),
            "L" => Some(MoveCommand::Left),
            "R" => Some(MoveCommand::Right),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            MoveCommand::Up => "U",
            MoveCommand::Down => "D",
            MoveCommand::Left => "L",
            MoveCommand::Right => "R",
            MoveCommand::Stop => "",
        }
    }
}

/// One carried item as listed in a player's bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagItem {
    pub id: LootId,
    #[serde(rename = "type")]
    pub kind: LootKind,
}

/// Authoritative per-player state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub pos: Vec2,
    /// Velocity in map units per second.
    pub speed: Vec2,
    pub dir: Direction,
    #[serde(default)]
    pub score: u64,
    #[serde(default)]
    pub bag: Vec<BagItem>,
}

/// Loot lying in the world, as sent on the wire (the id is the map key).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LostObject {
    #[serde(rename = "type")]
    pub kind: LootKind,
    pub pos: Vec2,
}

/// Body of `GET /api/v1/game/state`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateResponse {
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    /// Omitted by the server when no loot lies in the world.
    #[serde(rename = "lostObjects", default)]
    pub lost_objects: BTreeMap<LootId, LostObject>,
}

impl StateResponse {
    pub fn from_json_slice(body: &[u8]) -> Result<Self, FetchError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// World loot entry inside a [`Snapshot`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LootSnapshot {
    pub id: LootId,
    pub kind: LootKind,
    pub pos: Vec2,
}

/// Authoritative world state stamped with its receipt time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Client clock (ms) when the response arrived.
    pub update_time: f64,
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    pub loot: BTreeMap<LootId, LootSnapshot>,
}

impl Snapshot {
    pub fn received(update_time: f64, response: StateResponse) -> Self {
        let loot = response
            .lost_objects
            .into_iter()
            .map(|(id, obj)| {
                (
                    id,
                    LootSnapshot {
                        id,
                        kind: obj.kind,
                        pos: obj.pos,
                    },
                )
            })
            .collect();
        Self {
            update_time,
            players: response.players,
            loot,
        }
    }
}

/// One entry of `GET /api/v1/game/players`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
}

/// Connected players keyed by id.
pub type Roster = BTreeMap<PlayerId, RosterEntry>;

/// Body of `POST /api/v1/game/player/action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "move")]
    pub movement: MoveCommand,
}

/// Body of `POST /api/v1/game/join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub user_name: String,
    pub map_id: String,
}

/// Response of `POST /api/v1/game/join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub auth_token: String,
    pub player_id: PlayerId,
}

/// One row of the hall of fame (`GET /api/v1/game/records`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEntry {
    pub name: String,
    pub score: u64,
    /// Play time in seconds.
    pub play_time: f64,
}
