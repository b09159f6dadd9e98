//! Map-file parsing.
//!
//! Maps are plain text: `rows`/`cols`/`players` headers, object lines
//! (`treasure`, `powerup`, `script`, `anti_script`), terrain rows
//! (`m ....a..$..b....`) and free-form `key value` lines that override
//! matching game parameters.

use std::collections::HashMap;

use crate::game::location::Location;
use crate::game::objects::PowerupEffect;

/// Terrain glyph for open water.
pub const WATER_GLYPH: char = '.';
/// Terrain glyph for an unclaimed treasure.
pub const TREASURE_GLYPH: char = '$';
/// Pirate glyphs, one letter per player.
pub const PIRATE_GLYPHS: &str = "abcdefghij";

/// A treasure as placed by the map.
#[derive(Debug, Clone, Copy)]
pub struct TreasureSpec {
    /// Treasure identifier (terrain-row order).
    pub id: usize,
    /// Spawn square.
    pub location: Location,
    /// Points scored for banking it.
    pub value: i32,
}

/// A power-up as placed by the map.
#[derive(Debug, Clone, Copy)]
pub struct PowerupSpec {
    /// Square the power-up appears on.
    pub location: Location,
    /// First turn it is on the map.
    pub start_turn: u32,
    /// First turn it is no longer on the map.
    pub end_turn: u32,
    /// Duration of the effect once picked up.
    pub active_turns: u32,
    /// The effect variant.
    pub effect: PowerupEffect,
}

/// A script or anti-script as placed by the map.
#[derive(Debug, Clone, Copy)]
pub struct ScriptSpec {
    /// Square the script appears on.
    pub location: Location,
    /// First turn it is on the map.
    pub start_turn: u32,
    /// First turn it is no longer on the map.
    pub end_turn: u32,
}

/// Everything a map file describes.
#[derive(Debug, Clone)]
pub struct MapData {
    /// Number of rows.
    pub rows: i32,
    /// Number of columns.
    pub cols: i32,
    /// Number of players.
    pub num_players: usize,
    /// Treasures in terrain-row order.
    pub treasures: Vec<TreasureSpec>,
    /// Power-ups.
    pub powerups: Vec<PowerupSpec>,
    /// Scripts.
    pub scripts: Vec<ScriptSpec>,
    /// Anti-scripts.
    pub anti_scripts: Vec<ScriptSpec>,
    /// Starting pirate squares, indexed by player.
    pub pirate_locations: Vec<Vec<Location>>,
    /// Unrecognized `key value` lines, applied as parameter overrides.
    pub params: HashMap<String, String>,
}

/// Error raised while parsing a map file.
#[derive(Debug)]
pub enum MapError {
    /// A header or object line was malformed.
    BadLine {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
    /// Player count outside the supported 2..=10 range.
    BadPlayerCount(usize),
    /// A terrain row appeared before the `players` header.
    PlayersHeaderMissing,
    /// A terrain row had the wrong width.
    BadRowWidth {
        /// 0-based terrain row index.
        row: usize,
        /// Characters found.
        got: usize,
        /// Characters expected (`cols`).
        expected: usize,
    },
    /// An unknown character appeared in a terrain row.
    UnknownGlyph {
        /// 0-based terrain row index.
        row: usize,
        /// The offending character.
        glyph: char,
    },
    /// Terrain row count did not match the `rows` header.
    BadRowCount {
        /// Rows found.
        got: usize,
        /// Rows expected.
        expected: usize,
    },
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadLine { line, reason } => write!(f, "map line {line}: {reason}"),
            Self::BadPlayerCount(n) => {
                write!(f, "player count must be between 2 and 10, got {n}")
            }
            Self::PlayersHeaderMissing => {
                write!(f, "players count expected before map rows")
            }
            Self::BadRowWidth { row, got, expected } => {
                write!(f, "incorrect number of cols in row {row}: got {got}, expected {expected}")
            }
            Self::UnknownGlyph { row, glyph } => {
                write!(f, "invalid character in map row {row}: {glyph:?}")
            }
            Self::BadRowCount { got, expected } => {
                write!(f, "incorrect number of rows: got {got}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for MapError {}

fn parse_int(token: &str, line: usize, what: &str) -> Result<i64, MapError> {
    token.parse().map_err(|_| MapError::BadLine {
        line,
        reason: format!("{what}: expected an integer, got {token:?}"),
    })
}

impl MapData {
    /// Parse a map from its text form.
    ///
    /// # Errors
    ///
    /// Returns a [`MapError`] describing the first problem found.
    #[allow(clippy::too_many_lines, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn parse(text: &str) -> Result<Self, MapError> {
        let mut rows: Option<i32> = None;
        let mut cols: Option<i32> = None;
        let mut num_players: Option<usize> = None;
        let mut treasure_values: HashMap<usize, i32> = HashMap::new();
        let mut treasures = Vec::new();
        let mut powerups = Vec::new();
        let mut scripts = Vec::new();
        let mut anti_scripts = Vec::new();
        let mut pirate_locations: Vec<Vec<Location>> = Vec::new();
        let mut params = HashMap::new();

        let mut terrain_row = 0usize;
        let mut next_treasure_id = 0usize;

        for (line_idx, raw_line) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, rest)) = line.split_once(' ') else {
                return Err(MapError::BadLine {
                    line: line_no,
                    reason: "expected `key value`".to_string(),
                });
            };

            match key.to_ascii_lowercase().as_str() {
                "rows" => rows = Some(parse_int(rest.trim(), line_no, "rows")? as i32),
                "cols" => cols = Some(parse_int(rest.trim(), line_no, "cols")? as i32),
                "players" => {
                    let n = parse_int(rest.trim(), line_no, "players")? as usize;
                    if !(2..=10).contains(&n) {
                        return Err(MapError::BadPlayerCount(n));
                    }
                    num_players = Some(n);
                    pirate_locations = vec![Vec::new(); n];
                }
                "treasure" => {
                    let fields: Vec<&str> = rest.split_whitespace().collect();
                    if fields.len() != 2 {
                        return Err(MapError::BadLine {
                            line: line_no,
                            reason: "treasure expects `<id> <value>`".to_string(),
                        });
                    }
                    let id = parse_int(fields[0], line_no, "treasure id")? as usize;
                    let value = parse_int(fields[1], line_no, "treasure value")? as i32;
                    treasure_values.insert(id, value);
                }
                "powerup" => {
                    powerups.push(Self::parse_powerup(rest, line_no)?);
                }
                "script" => {
                    scripts.push(Self::parse_script(rest, line_no)?);
                }
                "anti_script" => {
                    anti_scripts.push(Self::parse_script(rest, line_no)?);
                }
                "m" => {
                    let Some(players) = num_players else {
                        return Err(MapError::PlayersHeaderMissing);
                    };
                    let width = cols.unwrap_or(0);
                    if rest.chars().count() != usize::try_from(width).unwrap_or(0) {
                        return Err(MapError::BadRowWidth {
                            row: terrain_row,
                            got: rest.chars().count(),
                            expected: usize::try_from(width).unwrap_or(0),
                        });
                    }
                    for (col, glyph) in rest.chars().enumerate() {
                        let location = Location::new(terrain_row as i32, col as i32);
                        if let Some(player) = PIRATE_GLYPHS[..players].find(glyph) {
                            pirate_locations[player].push(location);
                        } else if glyph == TREASURE_GLYPH {
                            let value = treasure_values.get(&next_treasure_id).copied().unwrap_or(1);
                            treasures.push(TreasureSpec {
                                id: next_treasure_id,
                                location,
                                value,
                            });
                            next_treasure_id += 1;
                        } else if glyph != WATER_GLYPH {
                            return Err(MapError::UnknownGlyph {
                                row: terrain_row,
                                glyph,
                            });
                        }
                    }
                    terrain_row += 1;
                }
                _ => {
                    params.insert(key.to_ascii_lowercase(), rest.trim().to_string());
                }
            }
        }

        let rows = rows.unwrap_or(0);
        let cols = cols.unwrap_or(0);
        let expected = usize::try_from(rows).unwrap_or(0);
        if terrain_row != expected {
            return Err(MapError::BadRowCount {
                got: terrain_row,
                expected,
            });
        }
        let num_players = num_players.ok_or(MapError::PlayersHeaderMissing)?;

        Ok(Self {
            rows,
            cols,
            num_players,
            treasures,
            powerups,
            scripts,
            anti_scripts,
            pirate_locations,
            params,
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn parse_powerup(rest: &str, line_no: usize) -> Result<PowerupSpec, MapError> {
        let fields: Vec<&str> = rest.split_whitespace().collect();
        let bad = |reason: &str| MapError::BadLine {
            line: line_no,
            reason: reason.to_string(),
        };
        if fields.len() < 6 {
            return Err(bad("powerup expects `<kind> <row> <col> <start> <end> <active> [magnitude]`"));
        }
        let row = parse_int(fields[1], line_no, "powerup row")? as i32;
        let col = parse_int(fields[2], line_no, "powerup col")? as i32;
        let start_turn = parse_int(fields[3], line_no, "powerup start")? as u32;
        let end_turn = parse_int(fields[4], line_no, "powerup end")? as u32;
        let active_turns = parse_int(fields[5], line_no, "powerup active turns")? as u32;

        let effect = match fields[0] {
            "a" => {
                let radius = fields
                    .get(6)
                    .ok_or_else(|| bad("attack powerup expects a radius"))?;
                PowerupEffect::Attack {
                    attack_radius: parse_int(radius, line_no, "attack radius")? as i32,
                }
            }
            "r" => PowerupEffect::Rob,
            "s" => {
                let speed = fields
                    .get(6)
                    .ok_or_else(|| bad("speed powerup expects a speed"))?;
                PowerupEffect::Speed {
                    carry_treasure_speed: parse_int(speed, line_no, "carry speed")? as i32,
                }
            }
            other => return Err(bad(&format!("unknown powerup kind {other:?}"))),
        };

        Ok(PowerupSpec {
            location: Location::new(row, col),
            start_turn,
            end_turn,
            active_turns,
            effect,
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn parse_script(rest: &str, line_no: usize) -> Result<ScriptSpec, MapError> {
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(MapError::BadLine {
                line: line_no,
                reason: "script expects `<row> <col> <start> <end>`".to_string(),
            });
        }
        Ok(ScriptSpec {
            location: Location::new(
                parse_int(fields[0], line_no, "script row")? as i32,
                parse_int(fields[1], line_no, "script col")? as i32,
            ),
            start_turn: parse_int(fields[2], line_no, "script start")? as u32,
            end_turn: parse_int(fields[3], line_no, "script end")? as u32,
        })
    }
}
