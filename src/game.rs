//! The rules engine.
//!
//! Implements the pirate world on top of the scheduler:
//! - Grid geometry and map-file parsing
//! - Players, pirates, treasures, power-ups, scripts and bermuda zones
//! - Order validation with cascading invalidation
//! - The fixed ten-phase per-turn resolution pipeline

mod location;
mod map;
mod objects;
mod orders;
mod pirate;
mod player;
mod state;

pub use location::{Direction, Grid, Location};
pub use map::{MapData, MapError, PowerupSpec, ScriptSpec, TreasureSpec, PIRATE_GLYPHS, TREASURE_GLYPH, WATER_GLYPH};
pub use objects::{BermudaZone, Powerup, PowerupEffect, Script, Treasure, TreasureId};
pub use orders::{BatchContext, Order, OrderKind, OrderReport, Verdict};
pub use pirate::{DeathReason, Pirate, PirateId};
pub use player::{Player, PlayerId};
pub use state::{Game, GameConfig, GameError, GameStats, RejectedMove};
