//! Game state and the per-turn resolution pipeline.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::game::location::{Grid, Location};
use crate::game::map::MapData;
use crate::game::objects::{BermudaZone, Powerup, Script, Treasure};
use crate::game::orders::{
    finalize_batch, parse_raw, BatchContext, Order, OrderKind, OrderReport, RawOrder, Verdict,
};
use crate::game::pirate::{DeathReason, Pirate, PirateId};
use crate::game::player::{Player, PlayerId};
use crate::game::map::{PIRATE_GLYPHS, TREASURE_GLYPH, WATER_GLYPH};
use crate::protocol::{
    BermudaZoneState, DeadPirateState, PirateState, PlayerState, PowerupState, ScriptState,
    SetupData, TreasureState, TurnData,
};

/// Rule parameters for one game.
///
/// Values are overridden by matching `key value` lines in the map file.
#[derive(Debug, Clone, Copy)]
pub struct GameConfig {
    /// Maximum number of turns.
    pub turns: u32,
    /// Score that ends the game immediately.
    pub max_points: i32,
    /// Load-time budget in milliseconds, as disclosed to bots.
    pub load_time_ms: u64,
    /// Per-turn budget in milliseconds, as disclosed to bots.
    pub turn_time_ms: u64,
    /// Whether bot runtimes should recover from bot-code errors.
    pub recover_errors: bool,
    /// Whether the map wraps around.
    pub cyclic: bool,
    /// The setup turn number the engine starts from.
    pub init_turn: u32,
    /// Squared attack radius.
    pub attack_radius2: i32,
    /// Turns the weapon reloads after an attack.
    pub reload_turns: u32,
    /// Turns the defense reloads after it was raised.
    pub defense_reload_turns: u32,
    /// Turns a raised defense lasts.
    pub max_defense_turns: u32,
    /// Turns a drunk pirate needs to sober up.
    pub turns_to_sober: u32,
    /// Squared bermuda zone radius.
    pub bermuda_zone_radius2: i32,
    /// Turns a bermuda zone stays active.
    pub bermuda_zone_active_turns: u32,
    /// Scripts required to summon a bermuda zone.
    pub required_scripts_num: u32,
    /// Movement steps available to a player per turn.
    pub actions_per_turn: i32,
    /// Turns a dead pirate waits before reviving.
    pub spawn_turns: u32,
    /// Turns a banked treasure waits before reappearing.
    pub treasure_spawn_turns: i32,
    /// Turns a cloak lasts.
    pub cloak_duration: u32,
    /// Seed disclosed to bots for their own randomness.
    pub player_seed: i64,
    /// Seed recorded for this game.
    pub engine_seed: i64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            turns: 300,
            max_points: 20,
            load_time_ms: 5000,
            turn_time_ms: 100,
            recover_errors: false,
            cyclic: false,
            init_turn: 0,
            attack_radius2: 16,
            reload_turns: 5,
            defense_reload_turns: 15,
            max_defense_turns: 3,
            turns_to_sober: 3,
            bermuda_zone_radius2: 49,
            bermuda_zone_active_turns: 20,
            required_scripts_num: 3,
            actions_per_turn: 6,
            spawn_turns: 15,
            treasure_spawn_turns: 10,
            cloak_duration: 20,
            player_seed: 0,
            engine_seed: 0,
        }
    }
}

impl GameConfig {
    /// Apply a `key value` override from a map file. Unknown keys and
    /// unparseable values are left alone.
    pub fn apply_param(&mut self, key: &str, value: &str) {
        fn set<T: std::str::FromStr>(slot: &mut T, value: &str) {
            if let Ok(parsed) = value.parse() {
                *slot = parsed;
            }
        }
        match key {
            "turns" => set(&mut self.turns, value),
            "max_points" => set(&mut self.max_points, value),
            "load_time" => set(&mut self.load_time_ms, value),
            "turn_time" => set(&mut self.turn_time_ms, value),
            "recover_errors" => self.recover_errors = value == "1" || value == "true",
            "cyclic" => self.cyclic = value == "1" || value == "true",
            "init_turn" => set(&mut self.init_turn, value),
            "attack_radius2" => set(&mut self.attack_radius2, value),
            "reload_turns" => set(&mut self.reload_turns, value),
            "defense_reload_turns" => set(&mut self.defense_reload_turns, value),
            "max_defense_turns" => set(&mut self.max_defense_turns, value),
            "turns_to_sober" => set(&mut self.turns_to_sober, value),
            "bermuda_zone_radius_2" => set(&mut self.bermuda_zone_radius2, value),
            "bermuda_zone_active_turns" => set(&mut self.bermuda_zone_active_turns, value),
            "required_scripts_num" => set(&mut self.required_scripts_num, value),
            "actions_per_turn" => set(&mut self.actions_per_turn, value),
            "spawn_turns" => set(&mut self.spawn_turns, value),
            "treasure_spawn_turns" => set(&mut self.treasure_spawn_turns, value),
            "cloak_duration" => set(&mut self.cloak_duration, value),
            "player_seed" => set(&mut self.player_seed, value),
            "engine_seed" => set(&mut self.engine_seed, value),
            _ => {}
        }
    }
}

/// A move step rejected for leaving the map, kept for the replay.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RejectedMove {
    /// Turn the step was rejected on.
    pub turn: u32,
    /// Row the pirate stood on.
    pub row: i32,
    /// Column the pirate stood on.
    pub col: i32,
    /// The rejected step letter.
    pub direction: char,
}

/// Per-player stats reported once per turn.
#[derive(Debug, Clone)]
pub struct GameStats {
    /// Living pirate counts, one per player.
    pub pirates: Vec<usize>,
    /// Scores, one per player.
    pub scores: Vec<i32>,
}

/// Error raised while constructing a game.
#[derive(Debug, Clone, Copy)]
pub enum GameError {
    /// Fewer than two players on the map.
    TooFewPlayers(usize),
    /// More than two players on the map (attack targeting is two-player).
    TooManyPlayers(usize),
    /// Bot name count does not match the map's player count.
    NameCountMismatch {
        /// Players on the map.
        expected: usize,
        /// Names supplied.
        got: usize,
    },
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPlayers(n) => write!(f, "too few players: {n} (minimum 2)"),
            Self::TooManyPlayers(n) => write!(f, "too many players: {n} (maximum 2)"),
            Self::NameCountMismatch { expected, got } => {
                write!(f, "expected {expected} bot names, got {got}")
            }
        }
    }
}

impl std::error::Error for GameError {}

/// The world: entities plus the rules that advance them one turn at a
/// time.
#[derive(Debug, Clone)]
pub struct Game {
    /// Rule parameters.
    pub config: GameConfig,
    /// The grid geometry.
    pub grid: Grid,
    /// All players.
    pub players: Vec<Player>,
    /// All treasures.
    pub treasures: Vec<Treasure>,
    /// All power-ups ever placed.
    pub powerups: Vec<Powerup>,
    /// All scripts ever placed.
    pub scripts: Vec<Script>,
    /// All anti-scripts ever placed.
    pub anti_scripts: Vec<Script>,
    /// All bermuda zones ever summoned.
    pub bermuda_zones: Vec<BermudaZone>,
    /// Current turn number.
    pub turn: u32,
    /// Move steps rejected for leaving the map.
    pub rejected_moves: Vec<RejectedMove>,
    /// Why the game ended, once it has.
    pub end_of_game_reason: Option<String>,
    occupancy: HashMap<Location, PlayerId>,
    winning_bot: Vec<PlayerId>,
    winning_turn: u32,
    ranking_bots: Option<Vec<usize>>,
    ranking_turn: u32,
    perspectives: Vec<Vec<usize>>,
}

impl Game {
    /// Build a game from a parsed map.
    ///
    /// Map parameter overrides are applied to `config` first.
    ///
    /// # Errors
    ///
    /// Returns a [`GameError`] when the player or name counts are off.
    #[allow(clippy::too_many_lines)]
    pub fn new(map: &MapData, mut config: GameConfig, bot_names: &[String]) -> Result<Self, GameError> {
        for (key, value) in &map.params {
            config.apply_param(key, value);
        }

        let num_players = map.num_players;
        if num_players < 2 {
            return Err(GameError::TooFewPlayers(num_players));
        }
        if num_players > 2 {
            return Err(GameError::TooManyPlayers(num_players));
        }
        if bot_names.len() != num_players {
            return Err(GameError::NameCountMismatch {
                expected: num_players,
                got: bot_names.len(),
            });
        }

        let mut players: Vec<Player> = bot_names
            .iter()
            .enumerate()
            .map(|(id, name)| Player::new(id, name.clone()))
            .collect();

        let mut occupancy = HashMap::new();
        for (player_id, locations) in map.pirate_locations.iter().enumerate() {
            for (pirate_id, &location) in locations.iter().enumerate() {
                players[player_id].living.push(Pirate::new(
                    pirate_id,
                    player_id,
                    location,
                    config.attack_radius2,
                    config.max_defense_turns,
                    0,
                ));
                occupancy.insert(location, player_id);
            }
        }

        let treasures = map
            .treasures
            .iter()
            .map(|spec| Treasure::new(spec.id, spec.location, spec.value))
            .collect();
        let powerups = map
            .powerups
            .iter()
            .enumerate()
            .map(|(id, spec)| Powerup {
                id,
                location: spec.location,
                start_turn: spec.start_turn,
                end_turn: spec.end_turn,
                active_turns: spec.active_turns,
                effect: spec.effect,
            })
            .collect();
        let scripts = map
            .scripts
            .iter()
            .enumerate()
            .map(|(id, spec)| Script {
                id,
                location: spec.location,
                start_turn: spec.start_turn,
                end_turn: spec.end_turn,
            })
            .collect();
        let anti_scripts = map
            .anti_scripts
            .iter()
            .enumerate()
            .map(|(id, spec)| Script {
                id,
                location: spec.location,
                start_turn: spec.start_turn,
                end_turn: spec.end_turn,
            })
            .collect();

        // each player sees itself as player 0
        let perspectives = (0..num_players)
            .map(|player| {
                (0..num_players)
                    .map(|owner| (owner + num_players - player) % num_players)
                    .collect()
            })
            .collect();

        Ok(Self {
            grid: Grid::new(map.rows, map.cols, config.cyclic),
            config,
            players,
            treasures,
            powerups,
            scripts,
            anti_scripts,
            bermuda_zones: Vec::new(),
            turn: 0,
            rejected_moves: Vec::new(),
            end_of_game_reason: None,
            occupancy,
            winning_bot: Vec::new(),
            winning_turn: 0,
            ranking_bots: None,
            ranking_turn: 0,
            perspectives,
        })
    }

    /// The setup turn number the engine starts from.
    #[must_use]
    pub const fn init_turn(&self) -> u32 {
        self.config.init_turn
    }

    /// The maximum number of turns.
    #[must_use]
    pub const fn max_turns(&self) -> u32 {
        self.config.turns
    }

    /// Whether a player is still in the game.
    #[must_use]
    pub fn is_alive(&self, player: PlayerId) -> bool {
        self.players.get(player).is_some_and(Player::is_alive)
    }

    /// Eliminate a player (used by the scheduler on crash/timeout).
    pub fn kill_player(&mut self, player: PlayerId) {
        if let Some(p) = self.players.get_mut(player) {
            p.kill();
        }
    }

    /// Ids of players still in the game.
    #[must_use]
    pub fn remaining_players(&self) -> Vec<PlayerId> {
        self.players.iter().filter(|p| p.is_alive()).map(|p| p.id).collect()
    }

    /// Current scores, one per player.
    #[must_use]
    pub fn scores(&self) -> Vec<i32> {
        self.players.iter().map(|p| p.score).collect()
    }

    /// Scripts held, one per player.
    #[must_use]
    pub fn num_scripts(&self) -> Vec<u32> {
        self.players.iter().map(|p| p.num_scripts).collect()
    }

    /// Points each player scored last turn.
    #[must_use]
    pub fn last_turn_points(&self) -> Vec<i32> {
        if self.players.first().is_none_or(|p| p.score_history.len() < 2) {
            return self.scores();
        }
        self.players
            .iter()
            .map(|p| p.score_history[p.score_history.len() - 1] - p.score_history[p.score_history.len() - 2])
            .collect()
    }

    /// Reorder a per-player list into `viewer`'s perspective.
    #[must_use]
    pub fn order_for_player<T: Clone + Default>(&self, viewer: PlayerId, data: &[T]) -> Vec<T> {
        let key = &self.perspectives[viewer];
        let mut out = vec![T::default(); data.len()];
        for (actual, value) in data.iter().enumerate() {
            out[key[actual]] = value.clone();
        }
        out
    }

    /// Find a living pirate of `player` by id.
    #[must_use]
    pub fn living_pirate(&self, player: PlayerId, pirate: PirateId) -> Option<&Pirate> {
        self.players.get(player)?.living_pirate(pirate)
    }

    /// Iterate every living pirate.
    pub fn living_pirates(&self) -> impl Iterator<Item = &Pirate> {
        self.players.iter().flat_map(|p| p.living.iter())
    }

    /// Advance the turn counter and clear pending orders.
    pub fn start_turn(&mut self) {
        self.turn += 1;
        for player in &mut self.players {
            player.orders.clear();
        }
    }

    /// Classify one player's raw orders and store the accepted batch.
    ///
    /// Runs the forward classification pass, then the retroactive
    /// downgrade pass for step-limit and double-acting violations.
    pub fn submit_orders(&mut self, player: PlayerId, raw_orders: &[Value]) -> OrderReport {
        let mut ctx = BatchContext::default();
        let mut entries = Vec::new();

        for value in raw_orders {
            match parse_raw(value) {
                Err(reason) => entries.push((value.to_string(), Verdict::Invalid(reason))),
                Ok(None) => {}
                Ok(Some(raw)) => {
                    let verdict = self.classify_order(player, &raw, &mut ctx);
                    entries.push((raw.display, verdict));
                }
            }
        }

        let report = finalize_batch(entries);
        self.players[player].orders = report.valid.clone();
        report
    }

    #[allow(clippy::too_many_lines)]
    fn classify_order(&mut self, player: PlayerId, raw: &RawOrder, ctx: &mut BatchContext) -> Verdict {
        let Some(pirate_id) = raw.acting_pirate else {
            return Verdict::Invalid("invalid pirate".to_string());
        };
        let Some(pirate) = self.players[player].living_pirate(pirate_id) else {
            return Verdict::Invalid("invalid pirate".to_string());
        };
        let location = pirate.location;
        let reloading = pirate.reload_turns > 0;
        let defense_reloading = pirate.defense_reload_turns > 0;
        let cloaked = pirate.cloak_turns > 0;
        let carrying = pirate.has_treasure();
        let carry_speed = pirate.carry_treasure_speed;

        if pirate.is_drunk() {
            return Verdict::Invalid("the pirate is drunk - can't do anything".to_string());
        }
        if ctx.acting_pirates.contains(&pirate_id) {
            return Verdict::AlreadyActed {
                pirate: pirate_id,
                reason: "pirate can't do more than 1 order each turn".to_string(),
            };
        }

        match raw.order_type.as_deref() {
            Some("attack") => {
                if reloading {
                    return Verdict::Ignored("attack ignored - pirate ship is reloading".to_string());
                }
                if carrying {
                    return Verdict::Ignored("pirate can't attack while carrying a treasure".to_string());
                }
                let Some(target_value) = raw.attack_target() else {
                    return Verdict::Invalid("invalid args".to_string());
                };
                let target = target_value
                    .as_u64()
                    .and_then(|id| usize::try_from(id).ok())
                    .and_then(|id| {
                        let enemy = 1 - player;
                        self.players[enemy].living_pirate(id).map(|p| p.id)
                    });
                let Some(target) = target else {
                    return Verdict::Invalid("target pirate doesn't exist".to_string());
                };
                ctx.acting_pirates.insert(pirate_id);
                Verdict::Accepted(Order {
                    pirate: pirate_id,
                    kind: OrderKind::Attack { target },
                })
            }
            Some("defense") => {
                if defense_reloading {
                    return Verdict::Ignored("defend ignored - pirate ship is reloading".to_string());
                }
                if !raw.args.is_empty() {
                    return Verdict::Invalid("invalid args".to_string());
                }
                ctx.acting_pirates.insert(pirate_id);
                Verdict::Accepted(Order {
                    pirate: pirate_id,
                    kind: OrderKind::Defense,
                })
            }
            Some("cloak") => {
                if cloaked {
                    return Verdict::Ignored("cloak ignored - pirate is already invisible".to_string());
                }
                if !raw.args.is_empty() {
                    return Verdict::Invalid("invalid args".to_string());
                }
                if ctx.cloaked {
                    return Verdict::Invalid("pirate already cloaked this turn".to_string());
                }
                ctx.cloaked = true;
                ctx.acting_pirates.insert(pirate_id);
                Verdict::Accepted(Order {
                    pirate: pirate_id,
                    kind: OrderKind::Cloak,
                })
            }
            Some("bermuda") => {
                if self.enemy_spawn_in_zone_range(location, player) {
                    return Verdict::Ignored(
                        "bermuda zone cannot overlap enemy initial locations".to_string(),
                    );
                }
                if self.players[player].num_scripts < self.config.required_scripts_num {
                    return Verdict::Invalid("not enough scripts to summon bermuda zone".to_string());
                }
                let zone_active = self
                    .bermuda_zones
                    .iter()
                    .any(|z| z.owner == player && z.active_turns > 0);
                if zone_active || ctx.bermuda_summoned {
                    return Verdict::Invalid("bermuda zone already activated".to_string());
                }
                if !raw.args.is_empty() {
                    return Verdict::Invalid("invalid args".to_string());
                }
                ctx.bermuda_summoned = true;
                ctx.acting_pirates.insert(pirate_id);
                Verdict::Accepted(Order {
                    pirate: pirate_id,
                    kind: OrderKind::Bermuda,
                })
            }
            Some("move") => {
                let Some(destination) = raw.move_destination() else {
                    return Verdict::Invalid("invalid args".to_string());
                };
                let distance = self.grid.manhattan_distance(location, destination);
                if carrying && distance > carry_speed {
                    return Verdict::Invalid(
                        "can't move that many steps while carrying a treasure".to_string(),
                    );
                }
                let path = self.grid.direction_letters(location, destination);
                if let Err((at, direction)) = self.grid.walk(location, &path) {
                    self.rejected_moves.push(RejectedMove {
                        turn: self.turn,
                        row: at.row,
                        col: at.col,
                        direction: direction.letter(),
                    });
                    return Verdict::Ignored("order ignored - can't move out of map".to_string());
                }
                if ctx.action_counter + distance > self.config.actions_per_turn {
                    return Verdict::StepLimitExceeded(format!(
                        "total actions per turn {} exceeded allowed maximum {}",
                        ctx.action_counter + distance,
                        self.config.actions_per_turn
                    ));
                }
                ctx.action_counter += distance;
                ctx.acting_pirates.insert(pirate_id);
                Verdict::Accepted(Order {
                    pirate: pirate_id,
                    kind: OrderKind::Move { destination },
                })
            }
            _ => Verdict::Invalid("invalid order type".to_string()),
        }
    }

    /// Whether a zone centered at `center` would reach any opposing
    /// pirate's spawn square.
    fn enemy_spawn_in_zone_range(&self, center: Location, summoner: PlayerId) -> bool {
        self.players
            .iter()
            .filter(|p| p.id != summoner)
            .flat_map(Player::all_pirates)
            .any(|pirate| Grid::in_circle(center, self.config.bermuda_zone_radius2, pirate.initial_location))
    }

    fn summon_bermuda_zone(&mut self, owner: PlayerId, center: Location) {
        self.bermuda_zones.push(BermudaZone {
            owner,
            active_turns: self.config.bermuda_zone_active_turns,
            start_turn: self.turn,
            center,
            radius: self.config.bermuda_zone_radius2,
        });
        self.players[owner].num_scripts = 0;
    }

    /// Resolve the turn: the fixed ten-phase pipeline, then scoring
    /// bookkeeping.
    pub fn finish_turn(&mut self) {
        self.do_orders();
        self.do_sober();
        self.do_attack();
        self.do_defense();
        self.do_cloak();
        self.do_bermuda_effect();
        self.do_treasures();
        self.do_powerups();
        self.do_scripts();
        self.do_spawn();

        for player in &mut self.players {
            player.score_history.push(player.score);
        }
        self.calculate_turn_significance();
    }

    /// Phase 1: movement and collision. Every living pirate moves to its
    /// ordered destination (or stays); any square holding two or more
    /// pirates afterwards kills them all, friend or foe alike.
    fn do_orders(&mut self) {
        let turn = self.turn;

        let mut assignments: HashMap<(PlayerId, PirateId), OrderKind> = HashMap::new();
        for player in &self.players {
            for order in &player.orders {
                assignments.insert((player.id, order.pirate), order.kind);
            }
        }

        let mut movers: Vec<Pirate> = Vec::new();
        for player in &mut self.players {
            movers.append(&mut player.living);
        }
        for pirate in &movers {
            self.occupancy.remove(&pirate.location);
        }

        let mut summons: Vec<(PlayerId, Location)> = Vec::new();
        for pirate in &mut movers {
            let letters = match assignments.remove(&(pirate.owner, pirate.id)) {
                None => "-".to_string(),
                Some(OrderKind::Attack { target }) => {
                    pirate.attacks.push((turn, target));
                    "a".to_string()
                }
                Some(OrderKind::Defense) => {
                    pirate.defense_expiration_turns = pirate.max_defense_turns;
                    "d".to_string()
                }
                Some(OrderKind::Cloak) => {
                    pirate.cloak_turns = self.config.cloak_duration;
                    "c".to_string()
                }
                Some(OrderKind::Bermuda) => {
                    summons.push((pirate.owner, pirate.location));
                    "f".to_string()
                }
                Some(OrderKind::Move { destination }) => {
                    let path = self.grid.direction_letters(pirate.location, destination);
                    pirate.location = destination;
                    if path.is_empty() {
                        "-".to_string()
                    } else {
                        path.iter().map(|d| d.letter()).collect()
                    }
                }
            };
            pirate.orders.push(letters);
            if pirate.defense_expiration_turns > 0 {
                pirate.defense_turns.push(turn);
            }
        }
        for (owner, center) in summons {
            self.summon_bermuda_zone(owner, center);
        }

        let mut groups: BTreeMap<Location, Vec<usize>> = BTreeMap::new();
        for (index, pirate) in movers.iter().enumerate() {
            groups.entry(pirate.location).or_default().push(index);
        }
        for indices in groups.values() {
            if indices.len() > 1 {
                for &index in indices {
                    if let Some(treasure) =
                        movers[index].die(turn, self.config.spawn_turns, Some(DeathReason::Collision))
                    {
                        self.treasures[treasure].is_available = true;
                    }
                }
            }
        }

        for pirate in movers {
            let owner = pirate.owner;
            if pirate.die_turn.is_some() {
                self.players[owner].dead.push(pirate);
            } else {
                self.occupancy.insert(pirate.location, owner);
                self.players[owner].living.push(pirate);
            }
        }
    }

    /// Phase 2: drunk pirates sober up one step.
    fn do_sober(&mut self) {
        for player in &mut self.players {
            for pirate in &mut player.living {
                if pirate.turns_to_sober > 0 {
                    pirate.drink_history.push(true);
                    pirate.turns_to_sober -= 1;
                } else {
                    pirate.drink_history.push(false);
                }
            }
        }
    }

    /// Phase 3: attack resolution. A hit intoxicates the target and
    /// drops (or steals) its treasure.
    fn do_attack(&mut self) {
        struct Strike {
            attacker: (PlayerId, PirateId),
            location: Location,
            radius: i32,
            rob: bool,
            target: (PlayerId, PirateId),
        }

        let turn = self.turn;
        let mut strikes: Vec<Strike> = Vec::new();
        for player in &mut self.players {
            let player_id = player.id;
            for pirate in &mut player.living {
                pirate.attack_radius_history.push(pirate.attack_radius);
                if !pirate.attacked_on(turn) {
                    if pirate.reload_turns > 0 {
                        pirate.reload_turns -= 1;
                    }
                    continue;
                }
                if pirate.attack_powerup_active_turns == 0 {
                    pirate.reload_turns = self.config.reload_turns;
                }
                if let Some((_, target)) = pirate.last_attack() {
                    // attack targeting is two-player (enforced at construction)
                    let enemy = 1 - player_id;
                    strikes.push(Strike {
                        attacker: (player_id, pirate.id),
                        location: pirate.location,
                        radius: pirate.attack_radius,
                        rob: pirate.rob_powerup_active_turns > 0,
                        target: (enemy, target),
                    });
                }
            }
        }

        let mut to_drunk: Vec<(PlayerId, PirateId)> = Vec::new();
        for strike in strikes {
            let (target_owner, target_id) = strike.target;
            let dropped = {
                let Some(target) = self.players[target_owner].living_pirate_mut(target_id) else {
                    continue;
                };
                if !Grid::in_circle(strike.location, strike.radius, target.location)
                    || target.is_drunk()
                    || target.defended_on(turn)
                {
                    continue;
                }
                if !to_drunk.contains(&strike.target) {
                    to_drunk.push(strike.target);
                }
                target.treasure.take()
            };
            if let Some(treasure) = dropped {
                if strike.rob {
                    let (attacker_owner, attacker_id) = strike.attacker;
                    if let Some(attacker) = self.players[attacker_owner].living_pirate_mut(attacker_id) {
                        attacker.treasure = Some(treasure);
                    } else {
                        self.treasures[treasure].is_available = true;
                    }
                } else {
                    self.treasures[treasure].is_available = true;
                }
            }
        }

        for (owner, pirate_id) in to_drunk {
            let turns_to_sober = self.config.turns_to_sober;
            if let Some(pirate) = self.players[owner].living_pirate_mut(pirate_id) {
                pirate.drink_turns.push(turn + 1);
                pirate.turns_to_sober = turns_to_sober;
            }
        }
    }

    /// Phase 4: defense reload and expiration countdowns.
    fn do_defense(&mut self) {
        let turn = self.turn;
        for player in &mut self.players {
            for pirate in &mut player.living {
                // a defense at full duration that was raised this turn starts its reload
                if pirate.defense_expiration_turns == pirate.max_defense_turns
                    && pirate.defended_on(turn)
                {
                    pirate.defense_reload_turns = self.config.defense_reload_turns;
                } else if pirate.defense_reload_turns > 0 {
                    pirate.defense_reload_turns -= 1;
                }
                if pirate.defense_expiration_turns > 0 {
                    pirate.defense_expiration_turns -= 1;
                }
            }
        }
    }

    /// Phase 5: cloak countdown.
    fn do_cloak(&mut self) {
        for player in &mut self.players {
            for pirate in &mut player.living {
                if pirate.cloak_turns > 0 {
                    pirate.cloak_turns -= 1;
                }
            }
        }
    }

    /// Phase 6: enemy bermuda zones kill, then all zone countdowns tick.
    fn do_bermuda_effect(&mut self) {
        let mut to_kill: Vec<(PlayerId, PirateId)> = Vec::new();
        for player in &self.players {
            for pirate in &player.living {
                let doomed = self.bermuda_zones.iter().any(|zone| {
                    zone.owner != player.id
                        && zone.active_turns > 0
                        && Grid::in_circle(zone.center, zone.radius, pirate.location)
                });
                if doomed {
                    to_kill.push((player.id, pirate.id));
                }
            }
        }
        for (owner, pirate_id) in to_kill {
            self.kill_living(owner, pirate_id, Some(DeathReason::Bermuda));
        }
        for zone in &mut self.bermuda_zones {
            if zone.active_turns > 0 {
                zone.active_turns -= 1;
            }
        }
    }

    /// Phase 7: treasure banking and pickup, plus treasure respawn ticks.
    fn do_treasures(&mut self) {
        let Self {
            players,
            treasures,
            config,
            ..
        } = self;

        for player in &mut *players {
            for pirate in &mut player.living {
                if let Some(id) = pirate.treasure {
                    if pirate.location == pirate.initial_location {
                        // banked: score it and start the treasure's respawn clock
                        pirate.treasure_history.push(0);
                        treasures[id].spawn_turns = config.treasure_spawn_turns;
                        player.score += treasures[id].value;
                        pirate.treasure = None;
                    } else {
                        pirate.treasure_history.push(treasures[id].value);
                    }
                } else {
                    let found = (!pirate.is_drunk())
                        .then(|| {
                            treasures
                                .iter_mut()
                                .find(|t| t.is_available && t.location == pirate.location)
                        })
                        .flatten();
                    if let Some(treasure) = found {
                        treasure.is_available = false;
                        pirate.treasure = Some(treasure.id);
                        pirate.treasure_history.push(treasure.value);
                    } else {
                        pirate.treasure_history.push(0);
                    }
                }
            }
        }

        for treasure in &mut *treasures {
            treasure.available_history.push(treasure.is_available);
            if treasure.spawn_turns > 0 {
                treasure.spawn_turns -= 1;
            }
            if treasure.spawn_turns == 0 {
                treasure.is_available = true;
                treasure.spawn_turns = -1;
            }
        }
    }

    /// Phase 8: power-up expiry and pickup.
    fn do_powerups(&mut self) {
        let turn = self.turn;
        let Self {
            players,
            powerups,
            config,
            ..
        } = self;

        for player in &mut *players {
            for pirate in &mut player.living {
                if pirate.attack_powerup_active_turns > 0 {
                    pirate.attack_powerup_active_turns -= 1;
                } else {
                    pirate.attack_radius = config.attack_radius2;
                    pirate.powerups.retain(|name| name != "attack");
                }
                if pirate.rob_powerup_active_turns > 0 {
                    pirate.rob_powerup_active_turns -= 1;
                    pirate.rob_powerup_history.push(true);
                } else {
                    pirate.powerups.retain(|name| name != "rob");
                    pirate.rob_powerup_history.push(false);
                }
                if pirate.speed_powerup_active_turns > 0 {
                    pirate.speed_powerup_active_turns -= 1;
                    pirate.speed_powerup_history.push(true);
                } else {
                    pirate.powerups.retain(|name| name != "speed");
                    pirate.carry_treasure_speed = 1;
                    pirate.speed_powerup_history.push(false);
                }

                if let Some(powerup) = powerups
                    .iter_mut()
                    .find(|p| p.is_on_map(turn) && p.location == pirate.location)
                {
                    powerup.end_turn = turn;
                    powerup.activate(pirate);
                }
            }
        }
    }

    /// Phase 9: script and anti-script pickup.
    fn do_scripts(&mut self) {
        let turn = self.turn;
        let Self {
            players,
            scripts,
            anti_scripts,
            ..
        } = self;

        for player in &mut *players {
            let locations: Vec<Location> = player.living.iter().map(|p| p.location).collect();
            for location in locations {
                if let Some(script) = scripts
                    .iter_mut()
                    .find(|s| s.is_on_map(turn) && s.location == location)
                {
                    script.end_turn = turn;
                    player.num_scripts += 1;
                }
                if let Some(anti_script) = anti_scripts
                    .iter_mut()
                    .find(|s| s.is_on_map(turn) && s.location == location)
                {
                    anti_script.end_turn = turn;
                    player.num_scripts = player.num_scripts.saturating_sub(1);
                }
            }
        }
    }

    /// Phase 10: respawn. A dead pirate whose countdown ran out revives
    /// at its spawn square as a fresh instance; a living occupant of that
    /// square is killed instead and the respawn waits another turn.
    fn do_spawn(&mut self) {
        let turn = self.turn;
        let snapshot: Vec<(PlayerId, PirateId)> = self
            .players
            .iter()
            .flat_map(|p| p.dead.iter().map(|pirate| (p.id, pirate.id)))
            .collect();

        let mut to_revive: Vec<(PlayerId, PirateId)> = Vec::new();
        for (owner, pirate_id) in snapshot {
            let Some(index) = self.players[owner].dead.iter().position(|p| p.id == pirate_id) else {
                continue;
            };
            let (ready, spawn_square) = {
                let pirate = &self.players[owner].dead[index];
                (pirate.turns_to_revive == 0, pirate.initial_location)
            };
            if ready {
                let occupier = self
                    .players
                    .iter()
                    .flat_map(|p| p.living.iter())
                    .find(|p| p.location == spawn_square)
                    .map(|p| (p.owner, p.id));
                if let Some((occupier_owner, occupier_id)) = occupier {
                    self.kill_living(occupier_owner, occupier_id, Some(DeathReason::RespawnConflict));
                } else {
                    to_revive.push((owner, pirate_id));
                }
            } else {
                self.players[owner].dead[index].turns_to_revive -= 1;
            }
        }

        for (owner, pirate_id) in to_revive {
            let Some(index) = self.players[owner].dead.iter().position(|p| p.id == pirate_id) else {
                continue;
            };
            let retired = self.players[owner].dead.remove(index);
            let spawn_square = retired.initial_location;
            self.players[owner].graveyard.push(retired);

            let fresh = Pirate::new(
                pirate_id,
                owner,
                spawn_square,
                self.config.attack_radius2,
                self.config.max_defense_turns,
                turn,
            );
            self.occupancy.insert(spawn_square, owner);
            self.players[owner].living.push(fresh);
        }
    }

    fn kill_living(&mut self, owner: PlayerId, pirate_id: PirateId, reason: Option<DeathReason>) {
        let turn = self.turn;
        let spawn_turns = self.config.spawn_turns;
        if let Some(mut pirate) = self.players[owner].remove_living(pirate_id) {
            self.occupancy.remove(&pirate.location);
            if let Some(treasure) = pirate.die(turn, spawn_turns, reason) {
                self.treasures[treasure].is_available = true;
            }
            self.players[owner].dead.push(pirate);
        }
    }

    fn calculate_turn_significance(&mut self) {
        let scores = self.scores();
        let mut sorted = scores.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let ranking: Vec<usize> = scores
            .iter()
            .map(|score| sorted.iter().position(|s| s == score).unwrap_or(0))
            .collect();
        if self.ranking_bots.as_ref() != Some(&ranking) {
            self.ranking_turn = self.turn;
        }
        self.ranking_bots = Some(ranking);

        let best = scores.iter().copied().max().unwrap_or(0);
        let winning: Vec<PlayerId> = (0..scores.len()).filter(|&i| scores[i] == best).collect();
        if self.winning_bot != winning {
            self.winning_turn = self.turn;
        }
        self.winning_bot = winning;
    }

    /// Whether the game has ended, recording the reason when it has.
    pub fn game_over(&mut self) -> bool {
        let remaining = self.remaining_players();
        if remaining.is_empty() {
            self.end_of_game_reason = Some("No bots left".to_string());
            self.winning_bot = Vec::new();
            return true;
        }
        if remaining.len() == 1 {
            // the loss is the crash, not a contest win
            self.winning_bot = remaining;
            self.end_of_game_reason = Some("Bot crashed".to_string());
            return true;
        }
        if self.scores().iter().copied().max().unwrap_or(0) >= self.config.max_points {
            self.end_of_game_reason = Some("Maximum points".to_string());
            return true;
        }
        false
    }

    /// The winning player(s): the score leaders, or the survivor.
    #[must_use]
    pub fn get_winner(&self) -> &[PlayerId] {
        &self.winning_bot
    }

    /// Record the turn-limit reason if the game ended without another.
    pub fn finish_game(&mut self) {
        if self.end_of_game_reason.is_none() {
            let mut reason = "Turn limit reached".to_string();
            if let [winner] = self.winning_bot[..] {
                reason.push_str(&format!(", Bot [{}] won", self.players[winner].name));
            } else {
                reason.push_str(", there is no winner");
            }
            self.end_of_game_reason = Some(reason);
            self.calculate_turn_significance();
        }
    }

    /// Per-turn stats for the scheduler's progress log.
    #[must_use]
    pub fn get_stats(&self) -> GameStats {
        GameStats {
            pirates: self.players.iter().map(|p| p.living.len()).collect(),
            scores: self.scores(),
        }
    }

    /// The setup payload, from `viewer`'s perspective when given.
    #[must_use]
    pub fn player_start(&self, viewer: Option<PlayerId>) -> SetupData {
        let num_players = self.players.len();
        SetupData {
            turn: self.turn,
            load_time: self.config.load_time_ms,
            turn_time: self.config.turn_time_ms,
            recover_errors: self.config.recover_errors,
            rows: self.grid.rows,
            cols: self.grid.cols,
            max_turns: self.config.turns,
            max_points: self.config.max_points,
            attack_radius2: self.config.attack_radius2,
            cloak_duration: self.config.cloak_duration,
            bermuda_zone_active_turns: self.config.bermuda_zone_active_turns,
            required_scripts_num: self.config.required_scripts_num,
            player_seed: self.config.player_seed,
            cyclic: self.config.cyclic,
            num_players,
            spawn_turns: self.config.spawn_turns,
            turns_to_sober: self.config.turns_to_sober,
            actions_per_turn: self.config.actions_per_turn,
            reload_turns: self.config.reload_turns,
            defense_reload_turns: self.config.defense_reload_turns,
            max_defense_turns: self.config.max_defense_turns,
            treasure_spawn_turns: self.config.treasure_spawn_turns,
            initial_scores: vec![0; num_players],
            last_turn_scores: vec![0; num_players],
            num_of_scripts: vec![0; num_players],
            bot_names: viewer.map(|v| {
                let names: Vec<String> = self.players.iter().map(|p| p.name.clone()).collect();
                self.order_for_player(v, &names)
            }),
        }
    }

    /// The per-turn payload from `viewer`'s perspective: every owner id
    /// is remapped so the viewer sees itself as player 0.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn player_state(&self, viewer: PlayerId) -> TurnData {
        let seen = |owner: PlayerId| self.perspectives[viewer][owner];

        let treasures = self
            .treasures
            .iter()
            .filter(|t| t.is_available)
            .map(|t| TreasureState {
                kind: "treasure",
                id: t.id,
                initial_location: t.location,
                value: t.value,
            })
            .collect();

        let players = self
            .players
            .iter()
            .map(|p| PlayerState {
                kind: "player",
                id: seen(p.id),
            })
            .collect();

        let pirates = self
            .players
            .iter()
            .flat_map(|p| p.living.iter())
            .map(|pirate| {
                let treasure = pirate.treasure.map(|id| &self.treasures[id]);
                PirateState {
                    kind: "pirate",
                    id: pirate.id,
                    location: pirate.location,
                    owner: seen(pirate.owner),
                    initial_location: pirate.initial_location,
                    turns_to_sober: pirate.turns_to_sober,
                    treasure_initial_location: treasure
                        .map_or(Location::new(-1, -1), |t| t.location),
                    treasure_id: treasure.map_or(-1, |t| i64::try_from(t.id).unwrap_or(-1)),
                    treasure_value: treasure.map_or(0, |t| t.value),
                    reload_turns: pirate.reload_turns,
                    defense_reload_turns: pirate.defense_reload_turns,
                    defense_expiration_turns: pirate.defense_expiration_turns,
                    carry_treasure_speed: pirate.carry_treasure_speed,
                    attack_radius: pirate.attack_radius,
                    powerups: pirate.powerups.clone(),
                }
            })
            .collect();

        let dead_pirates = self
            .players
            .iter()
            .flat_map(|p| p.dead.iter())
            .map(|pirate| DeadPirateState {
                kind: "dead_pirate",
                id: pirate.id,
                location: pirate.location,
                owner: seen(pirate.owner),
                initial_location: pirate.initial_location,
                turns_to_revive: pirate.turns_to_revive,
                attack_radius: pirate.attack_radius,
            })
            .collect();

        let powerups = self
            .powerups
            .iter()
            .filter(|p| p.is_on_map(self.turn))
            .map(|p| PowerupState {
                kind: "powerup",
                id: p.id,
                powerup_type: p.kind_name(),
                location: p.location,
                active_turns: p.active_turns,
                end_turn: p.end_turn,
                value: p.value(),
            })
            .collect();

        let script_state = |s: &Script| ScriptState {
            kind: "script",
            id: s.id,
            location: s.location,
            end_turn: s.end_turn,
        };
        let scripts = self
            .scripts
            .iter()
            .filter(|s| s.is_on_map(self.turn))
            .map(script_state)
            .collect();
        let anti_scripts = self
            .anti_scripts
            .iter()
            .filter(|s| s.is_on_map(self.turn))
            .map(|s| ScriptState {
                kind: "anti_script",
                ..script_state(s)
            })
            .collect();

        let bermuda_zones = self
            .bermuda_zones
            .iter()
            .filter(|z| z.active_turns > 0)
            .map(|z| BermudaZoneState {
                kind: "bermuda_zone",
                center: z.center,
                radius: z.radius,
                owner: seen(z.owner),
                active_turns: z.active_turns,
            })
            .collect();

        TurnData {
            treasures,
            players,
            pirates,
            dead_pirates,
            powerups,
            scripts,
            anti_scripts,
            bermuda_zones,
            game_scores: self.order_for_player(viewer, &self.scores()),
            last_turn_points: self.order_for_player(viewer, &self.last_turn_points()),
            num_of_scripts: self.order_for_player(viewer, &self.num_scripts()),
        }
    }

    /// Render the current map as glyph rows for the replay.
    #[must_use]
    pub fn render_map(&self) -> Vec<String> {
        let rows = usize::try_from(self.grid.rows).unwrap_or(0);
        let cols = usize::try_from(self.grid.cols).unwrap_or(0);
        let mut glyphs = vec![vec![WATER_GLYPH; cols]; rows];
        let mut put = |location: Location, glyph: char| {
            if let (Ok(row), Ok(col)) = (usize::try_from(location.row), usize::try_from(location.col)) {
                if row < rows && col < cols {
                    glyphs[row][col] = glyph;
                }
            }
        };
        for treasure in &self.treasures {
            if treasure.is_available {
                put(treasure.location, TREASURE_GLYPH);
            }
        }
        for pirate in self.players.iter().flat_map(|p| p.living.iter()) {
            let glyph = PIRATE_GLYPHS.as_bytes().get(pirate.owner).copied().unwrap_or(b'a');
            put(pirate.location, glyph as char);
        }
        glyphs.into_iter().map(|row| row.into_iter().collect()).collect()
    }

    /// The squares currently occupied by living pirates.
    #[must_use]
    pub fn occupied_squares(&self) -> &HashMap<Location, PlayerId> {
        &self.occupancy
    }
}
