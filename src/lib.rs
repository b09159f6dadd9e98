// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Armada: a deterministic turn-based contest engine for external bot
//! processes.
//!
//! This crate provides:
//! - A turn scheduler that drives concurrent bot processes under per-turn
//!   time budgets without ever blocking on a hung process
//! - A rules engine that validates and resolves each turn's orders into a
//!   new consistent world state
//! - A replayable record of the whole game
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Engine (scheduler)           │
//! ├─────────────────────────────────────┤
//! │        Game (rules engine)          │
//! ├─────────────────────────────────────┤
//! │   Bot processes (line protocol)     │
//! └─────────────────────────────────────┘
//! ```

pub mod engine;
pub mod game;
pub mod process;
pub mod protocol;
pub mod replay;

// Re-export key types at crate root for convenience
pub use engine::{BotStatus, Engine, EngineConfig, Runner};
pub use game::{Game, GameConfig, GameError, Location, MapData, MapError};
pub use process::{BotProcess, OsProcess};
pub use replay::{GameOutcome, GameRecord, ReplayData};
