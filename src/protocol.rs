//! The bot wire protocol.
//!
//! Messages are newline-delimited JSON. The engine sends a one-time
//! `setup` message followed by one `turn` message per turn; bots answer
//! each with a `bot_orders` message carrying their orders and any debug
//! messages.

use serde::Serialize;
use serde_json::Value;

use crate::game::Location;

/// An engine-to-bot message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineMessage {
    /// One-time game parameters, sent on the setup turn.
    Setup(SetupData),
    /// Per-turn world state.
    Turn(TurnData),
}

/// Static game parameters disclosed to bots at setup.
#[derive(Debug, Clone, Serialize)]
pub struct SetupData {
    /// Current turn (the setup turn).
    pub turn: u32,
    /// Load-time budget in milliseconds, as disclosed to bots.
    pub load_time: u64,
    /// Per-turn budget in milliseconds, as disclosed to bots.
    pub turn_time: u64,
    /// Whether bot runtimes should recover from bot-code errors.
    pub recover_errors: bool,
    /// Map rows.
    pub rows: i32,
    /// Map columns.
    pub cols: i32,
    /// Maximum number of turns.
    pub max_turns: u32,
    /// Score that ends the game.
    pub max_points: i32,
    /// Squared attack radius.
    pub attack_radius2: i32,
    /// Turns a cloak lasts.
    pub cloak_duration: u32,
    /// Turns a bermuda zone stays active.
    pub bermuda_zone_active_turns: u32,
    /// Scripts required to summon a bermuda zone.
    pub required_scripts_num: u32,
    /// Seed bots may use for their own randomness.
    pub player_seed: i64,
    /// Whether the map wraps around.
    pub cyclic: bool,
    /// Number of players.
    pub num_players: usize,
    /// Turns a dead pirate waits before reviving.
    pub spawn_turns: u32,
    /// Turns a drunk pirate needs to sober up.
    pub turns_to_sober: u32,
    /// Movement steps available per turn.
    pub actions_per_turn: i32,
    /// Turns the weapon reloads after an attack.
    pub reload_turns: u32,
    /// Turns the defense reloads after expiring.
    pub defense_reload_turns: u32,
    /// Turns a raised defense lasts.
    pub max_defense_turns: u32,
    /// Turns a banked treasure waits before reappearing.
    pub treasure_spawn_turns: i32,
    /// Starting scores, one per player.
    pub initial_scores: Vec<i32>,
    /// Points scored last turn, one per player.
    pub last_turn_scores: Vec<i32>,
    /// Scripts held, one per player.
    pub num_of_scripts: Vec<u32>,
    /// Bot names, reordered to the receiver's perspective.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_names: Option<Vec<String>>,
}

/// Per-turn world state as one bot sees it.
///
/// Owner ids are passed through the receiving player's perspective key,
/// so every bot perceives itself as player 0.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnData {
    /// Unclaimed treasures.
    pub treasures: Vec<TreasureState>,
    /// Players, by perspective id.
    pub players: Vec<PlayerState>,
    /// Living pirates.
    pub pirates: Vec<PirateState>,
    /// Dead pirates waiting to revive.
    pub dead_pirates: Vec<DeadPirateState>,
    /// Power-ups currently on the map.
    pub powerups: Vec<PowerupState>,
    /// Scripts currently on the map.
    pub scripts: Vec<ScriptState>,
    /// Anti-scripts currently on the map.
    pub anti_scripts: Vec<ScriptState>,
    /// Active bermuda zones.
    pub bermuda_zones: Vec<BermudaZoneState>,
    /// Scores, reordered to the receiver's perspective.
    pub game_scores: Vec<i32>,
    /// Points scored last turn, reordered.
    pub last_turn_points: Vec<i32>,
    /// Scripts held, reordered.
    pub num_of_scripts: Vec<u32>,
}

/// An unclaimed treasure on the map.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TreasureState {
    /// Constant entity tag.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Treasure id.
    pub id: usize,
    /// Spawn square.
    pub initial_location: Location,
    /// Points for banking it.
    pub value: i32,
}

/// A player, as seen from the receiver's perspective.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlayerState {
    /// Constant entity tag.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Perspective player id.
    pub id: usize,
}

/// A living pirate.
#[derive(Debug, Clone, Serialize)]
pub struct PirateState {
    /// Constant entity tag.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Pirate id.
    pub id: usize,
    /// Current square.
    pub location: Location,
    /// Owning player, by perspective id.
    pub owner: usize,
    /// Spawn square.
    pub initial_location: Location,
    /// Turns until sober; drunk while positive.
    pub turns_to_sober: u32,
    /// Spawn square of the carried treasure, or `(-1, -1)`.
    pub treasure_initial_location: Location,
    /// Carried treasure id, or -1.
    pub treasure_id: i64,
    /// Carried treasure value, or 0.
    pub treasure_value: i32,
    /// Turns until the weapon is reloaded.
    pub reload_turns: u32,
    /// Turns until defense may be raised again.
    pub defense_reload_turns: u32,
    /// Turns the raised defense still lasts.
    pub defense_expiration_turns: u32,
    /// Step cap while carrying a treasure.
    pub carry_treasure_speed: i32,
    /// Squared attack radius.
    pub attack_radius: i32,
    /// Active power-up names.
    pub powerups: Vec<String>,
}

/// A dead pirate waiting to revive.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeadPirateState {
    /// Constant entity tag.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Pirate id.
    pub id: usize,
    /// Square it died on.
    pub location: Location,
    /// Owning player, by perspective id.
    pub owner: usize,
    /// Spawn square it will revive on.
    pub initial_location: Location,
    /// Turns until it revives.
    pub turns_to_revive: u32,
    /// Squared attack radius.
    pub attack_radius: i32,
}

/// A power-up on the map.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PowerupState {
    /// Constant entity tag.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Power-up id.
    pub id: usize,
    /// Variant name (`attack`, `rob` or `speed`).
    pub powerup_type: &'static str,
    /// Square it sits on.
    pub location: Location,
    /// Effect duration once picked up.
    pub active_turns: u32,
    /// First turn it is no longer on the map.
    pub end_turn: u32,
    /// Variant magnitude, if any.
    pub value: Option<i32>,
}

/// A script or anti-script on the map.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScriptState {
    /// Constant entity tag.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Script id.
    pub id: usize,
    /// Square it sits on.
    pub location: Location,
    /// First turn it is no longer on the map.
    pub end_turn: u32,
}

/// An active bermuda zone.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BermudaZoneState {
    /// Constant entity tag.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Center square.
    pub center: Location,
    /// Squared radius.
    pub radius: i32,
    /// Summoning player, by perspective id.
    pub owner: usize,
    /// Remaining active turns.
    pub active_turns: u32,
}

/// A debug message a bot attached to its orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugMessage {
    /// A plain debug print.
    Message(String),
    /// A stop message (rendered at its own level in the replay).
    Stop(String),
    /// An entry that did not match the debug-message shape.
    Invalid,
}

/// The payload of a bot's `bot_orders` answer.
#[derive(Debug, Clone, Default)]
pub struct BotOrders {
    /// Raw order entries, classified later by the rules engine.
    pub orders: Vec<Value>,
    /// Debug messages, recorded under the runner's quota.
    pub debug_messages: Vec<DebugMessage>,
}

/// Parse one line a bot wrote to stdout.
///
/// Any non-empty JSON object counts as the bot's answer for the turn;
/// unparseable lines are treated as "no message yet" so a bot writing
/// garbage simply runs out its clock.
#[must_use]
pub fn parse_bot_line(line: &str) -> Option<BotOrders> {
    let value: Value = serde_json::from_str(line).ok()?;
    let object = value.as_object()?;
    if object.is_empty() {
        return None;
    }

    let data = object.get("data").and_then(Value::as_object);
    let orders = data
        .and_then(|d| d.get("orders"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let debug_messages = data
        .and_then(|d| d.get("debug_messages"))
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(parse_debug_entry).collect())
        .unwrap_or_default();

    Some(BotOrders {
        orders,
        debug_messages,
    })
}

fn parse_debug_entry(entry: &Value) -> DebugMessage {
    let Some(object) = entry.as_object() else {
        return DebugMessage::Invalid;
    };
    let message = object.get("message").and_then(Value::as_str);
    match (object.get("type").and_then(Value::as_str), message) {
        (Some("message"), Some(text)) => DebugMessage::Message(text.to_string()),
        (Some("stop"), Some(text)) => DebugMessage::Stop(text.to_string()),
        _ => DebugMessage::Invalid,
    }
}
