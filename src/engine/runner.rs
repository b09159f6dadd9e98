//! The scheduler-side handle to one bot's external process.

use std::io;

use serde::Serialize;

use crate::game::PlayerId;
use crate::process::BotProcess;
use crate::protocol::{BotOrders, EngineMessage};

/// Terminal classification of a bot. `Alive` is the only non-terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotStatus {
    /// Still playing.
    Alive,
    /// Lost by the game rules.
    Defeated,
    /// Its process died.
    Crashed,
    /// Missed its turn deadline.
    Timeout,
    /// Sent a rule-illegal order under strict mode.
    Invalid,
}

impl BotStatus {
    /// The status name used in results and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            BotStatus::Alive => "alive",
            BotStatus::Defeated => "defeated",
            BotStatus::Crashed => "crashed",
            BotStatus::Timeout => "timeout",
            BotStatus::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded batch of debug or error messages.
#[derive(Debug, Clone, Serialize)]
pub struct DebugEntry {
    /// Turn the messages belong to.
    pub turn: u32,
    /// Message level (0 debug, 1 rejected orders, 2 errors, 3 stop).
    pub level: u8,
    /// The messages.
    pub messages: Vec<String>,
}

/// One bot: its process handle, status, last answer and recorded debug
/// messages under quota.
#[derive(Debug)]
pub struct Runner {
    /// The player this runner controls.
    pub game_id: PlayerId,
    /// Bot name, for logs and results.
    pub name: String,
    /// Last turn this bot participated in.
    pub turn: u32,
    /// Current classification.
    pub status: BotStatus,
    /// The bot's answer for the current turn, consumed each turn.
    pub(crate) actions: Option<BotOrders>,
    /// Messages recorded for the replay.
    pub debug_msgs: Vec<DebugEntry>,
    process: Box<dyn BotProcess>,
    debug_max_count: usize,
    debug_max_length: usize,
    debug_max_reached: bool,
    debug_count_counter: usize,
    debug_size_counter: usize,
}

impl Runner {
    /// Wrap a started bot process.
    #[must_use]
    pub fn new(
        game_id: PlayerId,
        name: impl Into<String>,
        process: Box<dyn BotProcess>,
        debug_max_count: usize,
        debug_max_length: usize,
    ) -> Self {
        Self {
            game_id,
            name: name.into(),
            turn: 0,
            status: BotStatus::Alive,
            actions: None,
            debug_msgs: Vec::new(),
            process,
            debug_max_count,
            debug_max_length,
            debug_max_reached: false,
            debug_count_counter: 0,
            debug_size_counter: 0,
        }
    }

    /// Send one structured message to the bot.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the bot's input pipe is gone.
    pub fn send(&mut self, message: &EngineMessage) -> io::Result<()> {
        let line = serde_json::to_string(message).map_err(io::Error::other)?;
        log::trace!("bot {} <- {line}", self.name);
        self.process.write_line(&line)
    }

    /// Non-blocking read of the bot's next answer, if one is ready.
    pub fn recv(&mut self) -> Option<BotOrders> {
        let line = self.process.read_line()?;
        log::trace!("bot {} -> {line}", self.name);
        crate::protocol::parse_bot_line(&line)
    }

    /// Whether the bot's process is still running.
    pub fn is_process_alive(&mut self) -> bool {
        self.process.is_alive()
    }

    /// Suspend the bot's process.
    pub fn pause(&mut self) {
        self.process.pause();
    }

    /// Continue the bot's process.
    pub fn resume(&mut self) {
        self.process.resume();
    }

    /// Terminate the bot's process.
    pub fn kill(&mut self) {
        self.process.kill();
    }

    /// Reclaim the bot's process resources.
    pub fn release(&mut self) {
        self.process.release();
    }

    /// Record debug messages under the quota. Once either the count or
    /// byte quota is exceeded a single marker entry is recorded and all
    /// further debug messages are dropped.
    pub fn add_debug_msgs(&mut self, turn: u32, level: u8, messages: Vec<String>) {
        if messages.is_empty() || self.debug_max_reached {
            return;
        }
        self.debug_size_counter += messages.iter().map(String::len).sum::<usize>();
        self.debug_count_counter += messages.len();

        if self.debug_count_counter > self.debug_max_count
            || self.debug_size_counter > self.debug_max_length
        {
            self.debug_max_reached = true;
            log::warn!("bot {} exceeded its debug message quota", self.name);
            self.debug_msgs.push(DebugEntry {
                turn: turn + 1,
                level: 2,
                messages: vec!["Exceeded debug messages limit.".to_string()],
            });
        } else {
            self.debug_msgs.push(DebugEntry {
                turn: turn + 1,
                level,
                messages,
            });
        }
    }

    /// Record error messages. Errors bypass the debug quota.
    pub fn add_error_msgs(&mut self, turn: u32, messages: Vec<String>) {
        for message in &messages {
            log::warn!("bot {}: {message}", self.name);
        }
        self.debug_msgs.push(DebugEntry {
            turn,
            level: 2,
            messages,
        });
    }

    /// Drain up to `max_lines` stderr lines into the error record.
    pub fn drain_error_lines(&mut self, turn: u32, max_lines: usize) {
        for _ in 0..max_lines {
            let Some(line) = self.process.read_error_line() else {
                break;
            };
            self.add_error_msgs(turn, vec![line]);
        }
    }
}
