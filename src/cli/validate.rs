//! Validate command implementation.

use super::CliError;
use armada::MapData;
use std::fs;
use std::path::PathBuf;

/// Execute the validate command: parse a map and summarize it.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the map is malformed.
pub(crate) fn execute(map_path: PathBuf) -> Result<(), CliError> {
    let map_text = fs::read_to_string(&map_path)
        .map_err(|e| CliError::new(format!("Failed to read {}: {e}", map_path.display())))?;
    let map = MapData::parse(&map_text)?;

    println!("Map: {}", map_path.display());
    println!("  Size: {} rows x {} cols", map.rows, map.cols);
    println!("  Players: {}", map.num_players);
    for (player, locations) in map.pirate_locations.iter().enumerate() {
        println!("  Player {player}: {} pirates", locations.len());
    }
    println!("  Treasures: {}", map.treasures.len());
    println!("  Powerups: {}", map.powerups.len());
    println!(
        "  Scripts: {} (+{} anti-scripts)",
        map.scripts.len(),
        map.anti_scripts.len()
    );
    if !map.params.is_empty() {
        let mut params: Vec<_> = map.params.iter().collect();
        params.sort();
        println!("  Parameter overrides:");
        for (key, value) in params {
            println!("    {key} = {value}");
        }
    }
    println!("Map is valid.");
    Ok(())
}
