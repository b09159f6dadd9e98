//! The turn scheduler.
//!
//! Owns all runners and the game, drives the turn loop, enforces time
//! budgets, classifies bot outcomes (defeated, crashed, timeout,
//! invalid) and assembles the final result.

mod runner;

pub use runner::{BotStatus, DebugEntry, Runner};

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crate::game::Game;
use crate::process::BotProcess;
use crate::protocol::{DebugMessage, EngineMessage};
use crate::replay::{GameOutcome, GameRecord, ReplayData};

/// Budgets are scaled up internally beyond what bots are told, so a bot
/// timing itself always under-reports relative to enforcement.
const TIME_SCALE: u32 = 3;

/// The first gameplay turn gets extra headroom for interpreter warm-up.
const FIRST_TURN_MULTIPLIER: u32 = 10;

/// Cadence of the non-blocking answer poll.
const POLL_INTERVAL: Duration = Duration::from_millis(3);

/// Stderr lines drained from a crashed or timed-out bot.
const CRASH_ERROR_LINES: usize = 100;

/// Scheduling parameters, distinct from the game rules.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Budget for the setup turn.
    pub load_time: Duration,
    /// Budget for a gameplay turn.
    pub turn_time: Duration,
    /// Whether invalid orders eliminate the offending player.
    pub strict: bool,
    /// Poll one bot at a time instead of the whole group.
    pub serial: bool,
    /// Grace period for bots to flush shutdown behavior.
    pub end_wait: Duration,
    /// Maximum number of recorded debug messages per bot.
    pub debug_max_count: usize,
    /// Maximum total bytes of recorded debug messages per bot.
    pub debug_max_length: usize,
    /// Host label recorded in the result.
    pub location: String,
    /// Game id recorded in the result.
    pub game_id: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_time: Duration::from_millis(5000),
            turn_time: Duration::from_millis(100),
            strict: false,
            serial: false,
            end_wait: Duration::from_millis(250),
            debug_max_count: 10_000,
            debug_max_length: 200_000,
            location: "localhost".to_string(),
            game_id: 0,
        }
    }
}

/// Error type for scheduler failures.
///
/// Bot-side failures (crash, timeout, bad orders) are classified per
/// runner and never surface here; this covers engine-side breakage.
#[derive(Debug)]
pub enum EngineError {
    /// An I/O failure talking to a bot that was not the bot's own death.
    Io(io::Error),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "engine i/o error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// The scheduler: the game plus one runner per successfully started bot.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    game: Game,
    runners: Vec<Runner>,
    next_player: usize,
    turn_num: u32,
}

impl Engine {
    /// Create a scheduler for `game`.
    #[must_use]
    pub fn new(game: Game, config: EngineConfig) -> Self {
        let turn_num = game.init_turn();
        Self {
            config,
            game,
            runners: Vec::new(),
            next_player: 0,
            turn_num,
        }
    }

    /// Attach the next player's bot. A failed spawn eliminates that
    /// player immediately, the way an unstartable bot forfeits.
    pub fn add_runner(&mut self, name: impl Into<String>, process: io::Result<Box<dyn BotProcess>>) {
        let player = self.next_player;
        self.next_player += 1;
        let name = name.into();
        match process {
            Ok(process) => {
                self.runners.push(Runner::new(
                    player,
                    name,
                    process,
                    self.config.debug_max_count,
                    self.config.debug_max_length,
                ));
            }
            Err(e) => {
                log::error!("bot {name} did not start: {e}");
                self.game.kill_player(player);
            }
        }
    }

    /// Run the game to completion and assemble the result.
    ///
    /// A scheduler failure is caught here and produces an error record
    /// instead of propagating; live processes are always resumed for the
    /// grace period and then killed and released.
    #[must_use]
    pub fn run(mut self) -> GameOutcome {
        let error = match self.handle_game_logic() {
            Ok(()) => None,
            Err(e) => {
                log::error!("engine failed: {e}");
                Some(e.to_string())
            }
        };

        if !self.config.end_wait.is_zero() {
            for runner in &mut self.runners {
                runner.resume();
            }
            log::debug!(
                "waiting {:?} for bots to process the game end",
                self.config.end_wait
            );
            thread::sleep(self.config.end_wait);
        }
        for runner in &mut self.runners {
            if runner.is_process_alive() {
                runner.kill();
            }
            runner.release();
        }

        match error {
            Some(error) => GameOutcome::Errored { error },
            None => GameOutcome::Completed(Box::new(self.build_record())),
        }
    }

    fn handle_game_logic(&mut self) -> Result<(), EngineError> {
        let init_turn = self.game.init_turn();
        log::info!("running for {} turns", self.game.max_turns());

        for turn_num in init_turn..=self.game.max_turns() {
            self.turn_num = turn_num;
            if turn_num > init_turn {
                self.game.start_turn();
            }

            self.broadcast_state()?;
            self.collect_actions();
            self.record_debug_messages();

            let alive_before: Vec<usize> = (0..self.runners.len())
                .filter(|&i| self.game.is_alive(self.runners[i].game_id))
                .collect();

            if turn_num > init_turn {
                if !self.game.game_over() {
                    self.process_orders();
                }
                self.game.finish_turn();
            }

            self.handle_eliminated_runners(&alive_before);
            self.log_stats();

            if self.game.game_over() {
                break;
            }
        }

        self.game.finish_game();
        let scores = self.game.scores();
        log::info!("score {}", scores.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "));
        if let [winner] = self.game.get_winner() {
            log::info!("player {} [{}] is the winner", winner + 1, self.runner_name(*winner));
        } else {
            log::info!("game finished at a tie - there is no winner");
        }
        Ok(())
    }

    fn runner_name(&self, player: usize) -> &str {
        self.runners
            .iter()
            .find(|r| r.game_id == player)
            .map_or("unknown", |r| r.name.as_str())
    }

    /// Send the setup or per-turn state to every live bot, consuming any
    /// previous answer so stale messages never carry into a new turn.
    fn broadcast_state(&mut self) -> Result<(), EngineError> {
        let setup_turn = self.turn_num == self.game.init_turn();
        for runner in &mut self.runners {
            runner.actions = None;
            if !self.game.is_alive(runner.game_id) {
                continue;
            }
            let message = if setup_turn {
                EngineMessage::Setup(self.game.player_start(Some(runner.game_id)))
            } else {
                runner.turn = self.turn_num;
                EngineMessage::Turn(self.game.player_state(runner.game_id))
            };
            if let Err(e) = runner.send(&message) {
                // a dead bot's pipe is its own problem, found during polling
                if e.kind() == io::ErrorKind::BrokenPipe {
                    log::debug!("bot {} pipe closed", runner.name);
                } else {
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Collect answers from all live bots, group by group, under the
    /// turn's scaled time budget.
    fn collect_actions(&mut self) {
        let init_turn = self.game.init_turn();
        let base = if self.turn_num == init_turn {
            self.config.load_time
        } else if self.turn_num == init_turn + 1 {
            self.config.turn_time * FIRST_TURN_MULTIPLIER
        } else {
            self.config.turn_time
        };
        let time_limit = base * TIME_SCALE;

        let alive: Vec<usize> = (0..self.runners.len())
            .filter(|&i| self.game.is_alive(self.runners[i].game_id))
            .collect();
        let group_size = if self.config.serial { 1 } else { alive.len().max(1) };

        for group in alive.chunks(group_size) {
            self.get_moves(group, time_limit);
        }
    }

    /// The core polling routine: resume the group, poll every few
    /// milliseconds for answers or crashes until everyone answered or
    /// the deadline passes, pausing each bot the moment it answers.
    fn get_moves(&mut self, group: &[usize], time_limit: Duration) {
        let turn_num = self.turn_num;
        let mut finished: Vec<bool> = group
            .iter()
            .map(|&i| !self.game.is_alive(self.runners[i].game_id))
            .collect();

        for &i in group {
            self.runners[i].resume();
        }
        let start = Instant::now();

        while finished.iter().any(|done| !done) && start.elapsed() < time_limit {
            thread::sleep(POLL_INTERVAL);
            for (slot, &i) in group.iter().enumerate() {
                if finished[slot] {
                    continue;
                }
                let runner = &mut self.runners[i];
                if !runner.is_process_alive() {
                    runner.add_error_msgs(
                        turn_num,
                        vec![format!("turn {turn_num:4} bot {} crashed", runner.game_id)],
                    );
                    runner.status = BotStatus::Crashed;
                    runner.turn = turn_num;
                    runner.drain_error_lines(turn_num, CRASH_ERROR_LINES);
                    finished[slot] = true;
                    self.game.kill_player(self.runners[i].game_id);
                    continue;
                }
                if let Some(answer) = runner.recv() {
                    runner.actions = Some(answer);
                    finished[slot] = true;
                    // stop its clock while the rest of the group is polled
                    runner.pause();
                }
                self.runners[i].drain_error_lines(turn_num, CRASH_ERROR_LINES);
            }
        }

        // no answer by the deadline: eliminate, without retry
        for (slot, &i) in group.iter().enumerate() {
            if finished[slot] {
                continue;
            }
            let runner = &mut self.runners[i];
            runner.add_error_msgs(
                turn_num,
                vec![format!("turn {turn_num:4} bot {} timed out", runner.game_id)],
            );
            runner.status = BotStatus::Timeout;
            runner.turn = turn_num;
            runner.drain_error_lines(turn_num, CRASH_ERROR_LINES);
            self.game.kill_player(self.runners[i].game_id);
            self.runners[i].kill();
        }
    }

    /// Record the debug messages bots attached to this turn's answers.
    fn record_debug_messages(&mut self) {
        let turn_num = self.turn_num;
        for runner in &mut self.runners {
            let Some(actions) = runner.actions.as_ref() else {
                continue;
            };
            let mut messages = Vec::new();
            let mut stop_messages = Vec::new();
            for entry in &actions.debug_messages {
                match entry {
                    DebugMessage::Message(text) => messages.push(text.clone()),
                    DebugMessage::Stop(text) => stop_messages.push(text.clone()),
                    DebugMessage::Invalid => messages.push("Invalid debug message.".to_string()),
                }
            }
            if !messages.is_empty() {
                log::debug!(
                    "turn {turn_num:4} bot {} debug: {}",
                    runner.name,
                    messages.join(" | ")
                );
                runner.add_debug_msgs(turn_num, 0, messages);
            }
            if !stop_messages.is_empty() {
                runner.add_debug_msgs(turn_num, 3, stop_messages);
            }
        }
    }

    /// Hand each live player's orders to the rules engine and apply the
    /// strict-mode policy to invalid ones.
    fn process_orders(&mut self) {
        let turn_num = self.turn_num;
        for i in 0..self.runners.len() {
            let game_id = self.runners[i].game_id;
            if !self.game.is_alive(game_id) {
                continue;
            }
            let orders = self.runners[i]
                .actions
                .as_ref()
                .map(|a| a.orders.clone())
                .unwrap_or_default();
            let report = self.game.submit_orders(game_id, &orders);

            for order in &report.valid {
                log::debug!("turn {turn_num:4} bot {} order: {order}", self.runners[i].name);
            }
            if !report.ignored.is_empty() {
                log::warn!(
                    "turn {turn_num:4} bot {} ignored actions: {}",
                    self.runners[i].name,
                    report.ignored.join("; ")
                );
                self.runners[i].add_debug_msgs(turn_num, 1, report.ignored);
            }
            if !report.invalid.is_empty() {
                if self.config.strict {
                    self.game.kill_player(game_id);
                    self.runners[i].status = BotStatus::Invalid;
                    self.runners[i].turn = turn_num;
                }
                log::warn!(
                    "turn {turn_num:4} bot {} invalid actions: {}",
                    self.runners[i].name,
                    report.invalid.join("; ")
                );
                self.runners[i].add_debug_msgs(turn_num, 1, report.invalid);
            }
        }
    }

    /// Mark and kill the runners of players who died this turn.
    fn handle_eliminated_runners(&mut self, alive_before: &[usize]) {
        let eliminated: Vec<usize> = alive_before
            .iter()
            .copied()
            .filter(|&i| !self.game.is_alive(self.runners[i].game_id))
            .collect();

        for &i in &eliminated {
            let runner = &mut self.runners[i];
            log::info!("turn {:4} bot {} defeated", self.turn_num, runner.name);
            if runner.status == BotStatus::Alive {
                runner.status = BotStatus::Defeated;
                runner.turn = self.turn_num;
            }
            if !self.config.end_wait.is_zero() {
                runner.resume();
            }
        }
        if !eliminated.is_empty() && !self.config.end_wait.is_zero() {
            log::debug!(
                "waiting {:?} for eliminated bots to process the end",
                self.config.end_wait
            );
            thread::sleep(self.config.end_wait);
        }
        for &i in &eliminated {
            self.runners[i].kill();
        }
    }

    fn log_stats(&self) {
        let stats = self.game.get_stats();
        log::debug!(
            "turn {:4} stats: pirates {:?} score {:?}",
            self.turn_num,
            stats.pirates,
            stats.scores
        );
        if self.turn_num % 100 == 0 {
            log::info!("turn #{} of max {}", self.turn_num, self.game.max_turns());
        }
    }

    /// Assemble the completed-game record.
    fn build_record(&self) -> GameRecord {
        let scores = self.game.scores();
        let mut sorted = scores.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let rank: Vec<usize> = scores
            .iter()
            .map(|score| sorted.iter().position(|s| s == score).unwrap_or(0))
            .collect();

        let winner_names = self
            .game
            .get_winner()
            .iter()
            .map(|&w| self.runner_name(w).to_string())
            .collect();

        GameRecord {
            challenge: "pirates".to_string(),
            location: self.config.location.clone(),
            game_id: self.config.game_id,
            status: self.runners.iter().map(|r| r.status.to_string()).collect(),
            playerturns: self.runners.iter().map(|r| r.turn).collect(),
            score: scores,
            winner_names,
            rank,
            replayformat: "json".to_string(),
            replaydata: ReplayData::from_game(&self.game),
            game_length: self.turn_num,
            debug_messages: self.runners.iter().map(|r| r.debug_msgs.clone()).collect(),
        }
    }
}
