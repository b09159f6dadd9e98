//! Run command implementation.

use super::{CliError, OutputFormat};
use armada::{
    BotProcess, Engine, EngineConfig, Game, GameConfig, GameOutcome, MapData, OsProcess,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Derive a display name from a bot's launch command.
fn bot_name(command: &str) -> String {
    command
        .split_whitespace()
        .last()
        .and_then(|token| token.rsplit('/').next())
        .unwrap_or("bot")
        .to_string()
}

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the map cannot be loaded or the game cannot be
/// set up.
#[allow(clippy::too_many_arguments, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub(crate) fn execute(
    map_path: PathBuf,
    bots: Vec<String>,
    turns: Option<u32>,
    turn_time: u64,
    load_time: u64,
    seed: Option<i64>,
    strict: bool,
    serial: bool,
    replay: Option<PathBuf>,
    format: OutputFormat,
) -> Result<(), CliError> {
    let map_text = fs::read_to_string(&map_path)
        .map_err(|e| CliError::new(format!("Failed to read {}: {e}", map_path.display())))?;
    let map = MapData::parse(&map_text)?;

    // Generate a seed if not provided
    let seed = seed.unwrap_or_else(|| {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(42, |d| d.as_nanos() as i64)
    });

    let mut config = GameConfig {
        turn_time_ms: turn_time,
        load_time_ms: load_time,
        player_seed: seed,
        engine_seed: seed,
        ..GameConfig::default()
    };
    if let Some(turns) = turns {
        config.turns = turns;
    }

    let bot_names: Vec<String> = bots.iter().map(|b| bot_name(b)).collect();
    let game = Game::new(&map, config, &bot_names)?;

    let engine_config = EngineConfig {
        load_time: Duration::from_millis(load_time),
        turn_time: Duration::from_millis(turn_time),
        strict,
        serial,
        ..EngineConfig::default()
    };

    let mut engine = Engine::new(game, engine_config);
    for (command, name) in bots.iter().zip(&bot_names) {
        let process = OsProcess::spawn(command, None)
            .map(|p| Box::new(p) as Box<dyn BotProcess>);
        engine.add_runner(name.clone(), process);
    }

    let outcome = engine.run();

    if let Some(path) = replay {
        outcome
            .save(&path)
            .map_err(|e| CliError::new(format!("Failed to save replay: {e}")))?;
        println!("Replay saved to: {}", path.display());
    }

    match format {
        OutputFormat::Text => print!("{}", format_text(&outcome, &bot_names)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&outcome)
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
    }

    Ok(())
}

/// Format an outcome as human-readable text.
fn format_text(outcome: &GameOutcome, bot_names: &[String]) -> String {
    let mut output = String::new();
    let Some(record) = outcome.record() else {
        output.push_str("Game failed; see the error record.\n");
        return output;
    };

    output.push_str(&format!("Game over after {} turns\n", record.game_length));
    if let [winner] = &record.winner_names[..] {
        output.push_str(&format!("  Winner: {winner}\n"));
    } else {
        output.push_str("  Winner: Draw\n");
    }

    for (i, name) in bot_names.iter().enumerate() {
        let score = record.score.get(i).copied().unwrap_or(0);
        let status = record.status.get(i).map_or("unknown", String::as_str);
        let rank = record.rank.get(i).map_or(0, |r| r + 1);
        output.push_str(&format!(
            "  Player {} ({name}): {score} points, rank {rank} [{status}]\n",
            i + 1
        ));
    }
    output
}
