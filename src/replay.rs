//! The persisted game record.
//!
//! A finished game serializes to a single JSON document: per-runner
//! outcomes plus the full replay (entity timelines, score history,
//! rejected-move diagnostics and the end-of-game reason). A scheduler
//! failure serializes to a bare error record instead.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::engine::DebugEntry;
use crate::game::{Game, Location, RejectedMove};

/// The result of one engine run.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GameOutcome {
    /// The game ran to completion.
    Completed(Box<GameRecord>),
    /// The scheduler failed; a best-effort error record.
    Errored {
        /// The failure description.
        error: String,
    },
}

impl GameOutcome {
    /// The completed-game record, when there is one.
    #[must_use]
    pub fn record(&self) -> Option<&GameRecord> {
        match self {
            Self::Completed(record) => Some(record),
            Self::Errored { .. } => None,
        }
    }

    /// Write the outcome as JSON.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when writing fails.
    pub fn write_json<W: Write>(&self, writer: W) -> io::Result<()> {
        serde_json::to_writer(writer, self).map_err(io::Error::other)
    }

    /// Save the outcome to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file cannot be written.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let file = BufWriter::new(File::create(path)?);
        self.write_json(file)
    }
}

/// Everything recorded about a completed game.
#[derive(Debug, Serialize)]
pub struct GameRecord {
    /// The game name.
    pub challenge: String,
    /// Host label.
    pub location: String,
    /// Game id.
    pub game_id: u64,
    /// Terminal status per runner.
    pub status: Vec<String>,
    /// Last turn each runner participated in.
    pub playerturns: Vec<u32>,
    /// Final scores.
    pub score: Vec<i32>,
    /// Names of the winning bot(s); empty on a wipeout.
    pub winner_names: Vec<String>,
    /// Competition rank per player, by descending score.
    pub rank: Vec<usize>,
    /// Replay encoding name.
    pub replayformat: String,
    /// The replay itself.
    pub replaydata: ReplayData,
    /// Turns played.
    pub game_length: u32,
    /// Recorded debug messages per runner.
    pub debug_messages: Vec<Vec<DebugEntry>>,
}

/// Replay format revision.
const REPLAY_REVISION: u32 = 3;

/// The replayable history of one game.
#[derive(Debug, Serialize)]
pub struct ReplayData {
    /// Format revision.
    pub revision: u32,
    /// Number of players.
    pub players: usize,
    /// Turn limit.
    pub turns: u32,
    /// Squared attack radius.
    pub attack_radius2: i32,
    /// The final map.
    pub map: ReplayMap,
    /// Per-pirate timelines, every instance ever fielded.
    pub pirates: Vec<PirateRecord>,
    /// Treasure placements and availability timelines.
    pub treasures: Vec<TreasureRecord>,
    /// Power-up placements and windows.
    pub powerups: Vec<PowerupRecord>,
    /// Script placements and windows.
    pub scripts: Vec<ScriptRecord>,
    /// Anti-script placements and windows.
    pub anti_scripts: Vec<ScriptRecord>,
    /// Bermuda zone summonings.
    pub bermuda_zones: Vec<BermudaZoneRecord>,
    /// Move steps rejected for leaving the map.
    pub rejected: Vec<RejectedMove>,
    /// Score history per player, one entry per resolved turn.
    pub scores: Vec<Vec<i32>>,
    /// Bonus points per player.
    pub bonus: Vec<i32>,
    /// Why the game ended.
    pub cutoff: String,
}

/// Map dimensions plus the rendered final grid.
#[derive(Debug, Serialize)]
pub struct ReplayMap {
    /// Rows.
    pub rows: i32,
    /// Columns.
    pub cols: i32,
    /// Glyph rows.
    pub data: Vec<String>,
}

/// One pirate instance's timeline.
#[derive(Debug, Serialize)]
pub struct PirateRecord {
    /// Owning player.
    pub owner: usize,
    /// Pirate id.
    pub id: usize,
    /// Spawn square.
    pub initial_location: Location,
    /// Turn the instance spawned on.
    pub spawn_turn: u32,
    /// Turn it died on; one past the final turn when it survived.
    pub die_turn: u32,
    /// Why it died, if it did.
    pub reason_of_death: Option<char>,
    /// Order letters, one entry per turn.
    pub orders: Vec<String>,
    /// Attack events: (turn, target id).
    pub attack_turns: Vec<(u32, usize)>,
    /// Turns defense was up on.
    pub defense_turns: Vec<u32>,
    /// Per-turn drunk flags.
    pub drink_history: Vec<bool>,
    /// Per-turn carried treasure value.
    pub treasure_history: Vec<i32>,
    /// Per-turn squared attack radius.
    pub attack_radius_history: Vec<i32>,
    /// Per-turn rob power-up flags.
    pub rob_powerup_history: Vec<bool>,
    /// Per-turn speed power-up flags.
    pub speed_powerup_history: Vec<bool>,
}

/// One treasure's placement and availability timeline.
#[derive(Debug, Serialize)]
pub struct TreasureRecord {
    /// Treasure id.
    pub id: usize,
    /// Spawn square.
    pub initial_location: Location,
    /// Points for banking it.
    pub value: i32,
    /// Per-turn availability.
    pub available_history: Vec<bool>,
}

/// One power-up's placement and window.
#[derive(Debug, Serialize)]
pub struct PowerupRecord {
    /// Power-up id.
    pub id: usize,
    /// Variant name.
    pub powerup_type: String,
    /// Square it sat on.
    pub location: Location,
    /// First turn on the map.
    pub start_turn: u32,
    /// First turn off the map (collapsed on pickup).
    pub end_turn: u32,
}

/// One script's placement and window.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScriptRecord {
    /// Script id.
    pub id: usize,
    /// Square it sat on.
    pub location: Location,
    /// First turn on the map.
    pub start_turn: u32,
    /// First turn off the map (collapsed on pickup).
    pub end_turn: u32,
}

/// One bermuda zone summoning.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BermudaZoneRecord {
    /// Summoning player.
    pub owner: usize,
    /// Center square.
    pub center: Location,
    /// Turn it was summoned on.
    pub start_turn: u32,
}

impl ReplayData {
    /// Assemble the replay from a finished game.
    #[must_use]
    pub fn from_game(game: &Game) -> Self {
        let pirates = game
            .players
            .iter()
            .flat_map(|player| player.all_pirates())
            .map(|pirate| PirateRecord {
                owner: pirate.owner,
                id: pirate.id,
                initial_location: pirate.initial_location,
                spawn_turn: pirate.spawn_turn,
                die_turn: pirate.die_turn.unwrap_or(game.turn + 1),
                reason_of_death: pirate.reason_of_death.map(|r| r.code()),
                orders: pirate.orders.clone(),
                attack_turns: pirate.attacks.clone(),
                defense_turns: pirate.defense_turns.clone(),
                drink_history: pirate.drink_history.clone(),
                treasure_history: pirate.treasure_history.clone(),
                attack_radius_history: pirate.attack_radius_history.clone(),
                rob_powerup_history: pirate.rob_powerup_history.clone(),
                speed_powerup_history: pirate.speed_powerup_history.clone(),
            })
            .collect();

        let treasures = game
            .treasures
            .iter()
            .map(|treasure| TreasureRecord {
                id: treasure.id,
                initial_location: treasure.location,
                value: treasure.value,
                available_history: treasure.available_history.clone(),
            })
            .collect();

        let powerups = game
            .powerups
            .iter()
            .map(|powerup| PowerupRecord {
                id: powerup.id,
                powerup_type: powerup.kind_name().to_string(),
                location: powerup.location,
                start_turn: powerup.start_turn,
                end_turn: powerup.end_turn,
            })
            .collect();

        let script_record = |script: &crate::game::Script| ScriptRecord {
            id: script.id,
            location: script.location,
            start_turn: script.start_turn,
            end_turn: script.end_turn,
        };

        Self {
            revision: REPLAY_REVISION,
            players: game.players.len(),
            turns: game.max_turns(),
            attack_radius2: game.config.attack_radius2,
            map: ReplayMap {
                rows: game.grid.rows,
                cols: game.grid.cols,
                data: game.render_map(),
            },
            pirates,
            treasures,
            powerups,
            scripts: game.scripts.iter().map(script_record).collect(),
            anti_scripts: game.anti_scripts.iter().map(script_record).collect(),
            bermuda_zones: game
                .bermuda_zones
                .iter()
                .map(|zone| BermudaZoneRecord {
                    owner: zone.owner,
                    center: zone.center,
                    start_turn: zone.start_turn,
                })
                .collect(),
            rejected: game.rejected_moves.clone(),
            scores: game.players.iter().map(|p| p.score_history.clone()).collect(),
            bonus: vec![0; game.players.len()],
            cutoff: game.end_of_game_reason.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameConfig, MapData, Order, OrderKind};

    fn finished_game() -> Game {
        let map = MapData::parse("rows 1\ncols 4\nplayers 2\nm a$.b\n").expect("map parses");
        let names = vec!["bot0".to_string(), "bot1".to_string()];
        let mut game = Game::new(&map, GameConfig::default(), &names).expect("game builds");
        game.start_turn();
        game.players[0].orders = vec![Order {
            pirate: 0,
            kind: OrderKind::Move {
                destination: crate::game::Location::new(0, 1),
            },
        }];
        game.finish_turn();
        game.finish_game();
        game
    }

    #[test]
    fn test_replay_from_game() {
        let game = finished_game();
        let replay = ReplayData::from_game(&game);
        assert_eq!(replay.revision, REPLAY_REVISION);
        assert_eq!(replay.players, 2);
        assert_eq!(replay.pirates.len(), 2);
        assert_eq!(replay.map.data.len(), 1);
        assert_eq!(replay.scores[0], vec![0]);
        assert!(replay.cutoff.starts_with("Turn limit reached"));
        // the carrier's history shows the picked-up treasure
        let carrier = replay
            .pirates
            .iter()
            .find(|p| p.owner == 0)
            .expect("player 0 pirate");
        assert_eq!(carrier.treasure_history, vec![1]);
        assert_eq!(carrier.orders, vec!["e".to_string()]);
    }

    #[test]
    fn test_replay_score_history_matches_live_ranking() {
        let game = finished_game();
        let replay = ReplayData::from_game(&game);
        let live = game.scores();
        let replayed: Vec<i32> = replay
            .scores
            .iter()
            .map(|history| history.last().copied().unwrap_or(0))
            .collect();
        assert_eq!(live, replayed);
    }

    #[test]
    fn test_outcome_save_roundtrip() {
        let game = finished_game();
        let outcome = GameOutcome::Completed(Box::new(GameRecord {
            challenge: "pirates".to_string(),
            location: "localhost".to_string(),
            game_id: 0,
            status: vec!["alive".to_string(), "alive".to_string()],
            playerturns: vec![1, 1],
            score: game.scores(),
            winner_names: Vec::new(),
            rank: vec![0, 0],
            replayformat: "json".to_string(),
            replaydata: ReplayData::from_game(&game),
            game_length: 1,
            debug_messages: vec![Vec::new(), Vec::new()],
        }));

        let file = tempfile::NamedTempFile::new().expect("temp file");
        outcome.save(file.path()).expect("saves");
        let text = std::fs::read_to_string(file.path()).expect("reads back");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["challenge"], "pirates");
        assert_eq!(value["replaydata"]["revision"], 3);
        assert_eq!(value["replaydata"]["map"]["cols"], 4);
    }

    #[test]
    fn test_error_outcome_shape() {
        let outcome = GameOutcome::Errored {
            error: "boom".to_string(),
        };
        let value = serde_json::to_value(&outcome).expect("serializes");
        assert_eq!(value, serde_json::json!({"error": "boom"}));
    }
}
