//! Player state management.

use crate::game::orders::Order;
use crate::game::pirate::{Pirate, PirateId};

/// Unique identifier for a player (its index in the game's player list).
pub type PlayerId = usize;

/// State for a single player.
///
/// Pirates live in one of three lists: `living`, `dead` (waiting to
/// revive) or `graveyard` (retired instances kept for the replay).
#[derive(Debug, Clone)]
pub struct Player {
    /// Player identifier.
    pub id: PlayerId,
    /// Name of the bot controlling this player.
    pub name: String,
    /// Set once the scheduler eliminates this player.
    pub is_killed: bool,
    /// Current score.
    pub score: i32,
    /// Score after each resolved turn.
    pub score_history: Vec<i32>,
    /// Scripts collected towards a bermuda zone.
    pub num_scripts: u32,
    /// The accepted order batch for the current turn.
    pub orders: Vec<Order>,
    /// Pirates currently alive.
    pub living: Vec<Pirate>,
    /// Pirates currently dead, waiting to revive.
    pub dead: Vec<Pirate>,
    /// Retired pirate instances, kept for the replay.
    pub graveyard: Vec<Pirate>,
}

impl Player {
    /// Create a new player.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_killed: false,
            score: 0,
            score_history: Vec::new(),
            num_scripts: 0,
            orders: Vec::new(),
            living: Vec::new(),
            dead: Vec::new(),
            graveyard: Vec::new(),
        }
    }

    /// Whether the player is still in the game.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.is_killed
            && (!self.living.is_empty() || !self.dead.is_empty() || !self.graveyard.is_empty())
    }

    /// Eliminate this player.
    pub fn kill(&mut self) {
        self.is_killed = true;
    }

    /// Find a living pirate by id.
    #[must_use]
    pub fn living_pirate(&self, id: PirateId) -> Option<&Pirate> {
        self.living.iter().find(|p| p.id == id)
    }

    /// Find a living pirate by id, mutably.
    #[must_use]
    pub fn living_pirate_mut(&mut self, id: PirateId) -> Option<&mut Pirate> {
        self.living.iter_mut().find(|p| p.id == id)
    }

    /// Remove and return a living pirate by id.
    pub fn remove_living(&mut self, id: PirateId) -> Option<Pirate> {
        let index = self.living.iter().position(|p| p.id == id)?;
        Some(self.living.remove(index))
    }

    /// Iterate this player's pirates that are currently drunk.
    pub fn drunk_pirates(&self) -> impl Iterator<Item = &Pirate> {
        self.living.iter().filter(|p| p.is_drunk())
    }

    /// Every instance this player has ever fielded, for the replay.
    pub fn all_pirates(&self) -> impl Iterator<Item = &Pirate> {
        self.graveyard.iter().chain(self.dead.iter()).chain(self.living.iter())
    }
}
