//! Pirate state: the player-controlled mobile unit.

use crate::game::location::Location;
use crate::game::objects::TreasureId;
use crate::game::PlayerId;

/// Unique identifier of a pirate within its player.
pub type PirateId = usize;

/// Why a pirate died, recorded for the replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathReason {
    /// Caught inside an enemy bermuda zone.
    Bermuda,
    /// Shared a square with another pirate after movement.
    Collision,
    /// Stood on a dead pirate's spawn square when it tried to revive.
    RespawnConflict,
}

impl DeathReason {
    /// Single-letter replay code.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            DeathReason::Bermuda => 'b',
            DeathReason::Collision => 'c',
            DeathReason::RespawnConflict => 'r',
        }
    }
}

/// One pirate instance.
///
/// A pirate that dies keeps its instance (in the owner's dead list) until
/// it revives; revival creates a fresh instance with the same id and the
/// old one is retired to the graveyard for the replay.
#[derive(Debug, Clone)]
pub struct Pirate {
    /// Identifier, stable across deaths and revivals.
    pub id: PirateId,
    /// Owning player.
    pub owner: PlayerId,
    /// Current square.
    pub location: Location,
    /// Spawn square; revivals and treasure banking happen here.
    pub initial_location: Location,
    /// Turn this instance spawned on.
    pub spawn_turn: u32,
    /// Turn this instance died on, if it has.
    pub die_turn: Option<u32>,
    /// Why this instance died, if it has.
    pub reason_of_death: Option<DeathReason>,
    /// Turns until this dead pirate revives.
    pub turns_to_revive: u32,
    /// Turns until the weapon is reloaded.
    pub reload_turns: u32,
    /// Turns until defense may be raised again.
    pub defense_reload_turns: u32,
    /// Turns the currently raised defense still lasts.
    pub defense_expiration_turns: u32,
    /// Turns a freshly raised defense lasts.
    pub max_defense_turns: u32,
    /// Turns until the pirate sobers up; drunk while positive.
    pub turns_to_sober: u32,
    /// Turns the cloak still lasts.
    pub cloak_turns: u32,
    /// The treasure this pirate carries, if any.
    pub treasure: Option<TreasureId>,
    /// Current squared attack radius.
    pub attack_radius: i32,
    /// Current step cap while carrying a treasure.
    pub carry_treasure_speed: i32,
    /// Turns the attack power-up still lasts.
    pub attack_powerup_active_turns: u32,
    /// Turns the rob power-up still lasts.
    pub rob_powerup_active_turns: u32,
    /// Turns the speed power-up still lasts.
    pub speed_powerup_active_turns: u32,
    /// Names of the active power-ups, as sent to bots.
    pub powerups: Vec<String>,
    /// Per-turn order letters ("-", "a", "d", "c", "f" or move steps).
    pub orders: Vec<String>,
    /// Attack events: (turn, target pirate id).
    pub attacks: Vec<(u32, PirateId)>,
    /// Turns defense was up on.
    pub defense_turns: Vec<u32>,
    /// Turns this pirate was made drunk on.
    pub drink_turns: Vec<u32>,
    /// Per-turn drunk flags, for the replay.
    pub drink_history: Vec<bool>,
    /// Per-turn carried treasure value (0 when empty-handed).
    pub treasure_history: Vec<i32>,
    /// Per-turn squared attack radius, for the replay.
    pub attack_radius_history: Vec<i32>,
    /// Per-turn rob power-up flags, for the replay.
    pub rob_powerup_history: Vec<bool>,
    /// Per-turn speed power-up flags, for the replay.
    pub speed_powerup_history: Vec<bool>,
}

impl Pirate {
    /// Create a fresh pirate at its spawn square.
    #[must_use]
    pub fn new(
        id: PirateId,
        owner: PlayerId,
        location: Location,
        attack_radius: i32,
        max_defense_turns: u32,
        spawn_turn: u32,
    ) -> Self {
        Self {
            id,
            owner,
            location,
            initial_location: location,
            spawn_turn,
            die_turn: None,
            reason_of_death: None,
            turns_to_revive: 0,
            reload_turns: 0,
            defense_reload_turns: 0,
            defense_expiration_turns: 0,
            max_defense_turns,
            turns_to_sober: 0,
            cloak_turns: 0,
            treasure: None,
            attack_radius,
            carry_treasure_speed: 1,
            attack_powerup_active_turns: 0,
            rob_powerup_active_turns: 0,
            speed_powerup_active_turns: 0,
            powerups: Vec::new(),
            orders: Vec::new(),
            attacks: Vec::new(),
            defense_turns: Vec::new(),
            drink_turns: Vec::new(),
            drink_history: Vec::new(),
            treasure_history: Vec::new(),
            attack_radius_history: Vec::new(),
            rob_powerup_history: Vec::new(),
            speed_powerup_history: Vec::new(),
        }
    }

    /// Whether the pirate is currently drunk (and may not act).
    #[must_use]
    pub const fn is_drunk(&self) -> bool {
        self.turns_to_sober > 0
    }

    /// Whether the pirate carries a treasure.
    #[must_use]
    pub const fn has_treasure(&self) -> bool {
        self.treasure.is_some()
    }

    /// The turn of the most recent attack order, if any.
    #[must_use]
    pub fn last_attack(&self) -> Option<(u32, PirateId)> {
        self.attacks.last().copied()
    }

    /// Whether this pirate attacked on `turn`.
    #[must_use]
    pub fn attacked_on(&self, turn: u32) -> bool {
        self.last_attack().is_some_and(|(t, _)| t == turn)
    }

    /// Whether this pirate's defense was up on `turn`.
    #[must_use]
    pub fn defended_on(&self, turn: u32) -> bool {
        self.defense_turns.last().is_some_and(|&t| t == turn)
    }

    /// Mark this instance dead, returning the treasure it was carrying so
    /// the caller can release it.
    pub fn die(&mut self, turn: u32, revive_after: u32, reason: Option<DeathReason>) -> Option<TreasureId> {
        self.die_turn = Some(turn);
        self.turns_to_revive = revive_after;
        self.reason_of_death = reason;
        self.treasure.take()
    }
}
