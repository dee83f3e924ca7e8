//! Replay recording and playback.
//!
//! A replay is a save-game snapshot plus the player commands queued after
//! it, each stamped with the tick whose command phase ran it. AI players
//! are part of the snapshot and re-derive their own commands, so only
//! player input is stored.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::{GameError, Result};
use crate::game::Game;

/// A player command and the tick it was executed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayCommand {
    /// Tick whose command phase ran the command.
    pub tick: u32,
    /// The command as queued.
    pub command: Command,
}

/// Replay file format version.
pub const REPLAY_VERSION: u32 = 1;

/// A finished recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Format version.
    pub version: u32,
    /// Save stream of the state the recording started from.
    pub initial_state: Vec<u8>,
    /// Tick of the initial state.
    pub start_tick: u32,
    /// Player commands in execution order.
    pub commands: Vec<ReplayCommand>,
    /// Tick at which recording stopped.
    pub final_tick: u32,
    /// State hash at `final_tick`.
    pub final_hash: u64,
}

impl Replay {
    /// Encode with bincode.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {e}")))
    }

    /// Decode and check the format version.
    ///
    /// # Errors
    ///
    /// [`GameError::CorruptSave`] for undecodable bytes and
    /// [`GameError::VersionMismatch`] for another format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self =
            bincode::deserialize(bytes).map_err(|e| GameError::CorruptSave(format!("Failed to decode replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(GameError::VersionMismatch {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }
        Ok(replay)
    }

    /// Commands executed on `tick`.
    pub fn commands_at_tick(&self, tick: u32) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(move |c| c.tick == tick).map(|c| &c.command)
    }

    /// Length in ticks.
    #[must_use]
    pub const fn duration(&self) -> u32 {
        self.final_tick.saturating_sub(self.start_tick)
    }
}

// ===== Recording =====

/// Collects commands while a game runs.
#[derive(Debug, Clone)]
pub struct ReplayRecorder {
    initial_state: Vec<u8>,
    start_tick: u32,
    commands: Vec<ReplayCommand>,
}

impl ReplayRecorder {
    /// Start recording from a save stream taken at `start_tick`.
    #[must_use]
    pub const fn new(initial_state: Vec<u8>, start_tick: u32) -> Self {
        Self {
            initial_state,
            start_tick,
            commands: Vec::new(),
        }
    }

    /// Record the player commands executed on `tick`.
    pub fn record(&mut self, tick: u32, commands: &[Command]) {
        self.commands.extend(commands.iter().map(|command| ReplayCommand {
            tick,
            command: command.clone(),
        }));
    }

    /// Seal the recording.
    #[must_use]
    pub fn finish(self, final_tick: u32, final_hash: u64) -> Replay {
        debug!(commands = self.commands.len(), final_tick, "replay finished");
        Replay {
            version: REPLAY_VERSION,
            initial_state: self.initial_state,
            start_tick: self.start_tick,
            commands: self.commands,
            final_tick,
            final_hash,
        }
    }
}

// ===== Playback =====

/// Replays a recording against its initial state.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    game: Game,
    command_index: usize,
}

impl ReplayPlayer {
    /// Load the replay's initial state.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial state does not load.
    pub fn new(replay: Replay) -> Result<Self> {
        let game = Game::load(&replay.initial_state)?;
        Ok(Self {
            replay,
            game,
            command_index: 0,
        })
    }

    /// Play one tick. Returns `true` while ticks remain.
    pub fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        let tick = self.game.tick();
        while let Some(recorded) = self.replay.commands.get(self.command_index) {
            if recorded.tick > tick {
                break;
            }
            if recorded.tick == tick {
                self.game.queue_command(recorded.command.clone());
            }
            self.command_index += 1;
        }
        self.game.advance_tick();
        !self.is_finished()
    }

    /// Restart from the initial state and play up to `target_tick`.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial state does not load.
    pub fn seek(&mut self, target_tick: u32) -> Result<()> {
        self.game = Game::load(&self.replay.initial_state)?;
        self.command_index = 0;
        while self.game.tick() < target_tick && self.advance() {}
        Ok(())
    }

    /// Play to the end and compare the state hash with the recorded one.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial state does not load.
    pub fn verify(&mut self) -> Result<bool> {
        self.seek(self.replay.final_tick)?;
        let actual = self.game.state_hash();
        if actual != self.replay.final_hash {
            warn!(
                expected = self.replay.final_hash,
                actual,
                tick = self.game.tick(),
                "replay diverged"
            );
        }
        Ok(actual == self.replay.final_hash)
    }

    /// Current tick.
    #[must_use]
    pub const fn current_tick(&self) -> u32 {
        self.game.tick()
    }

    /// The game being played back.
    #[must_use]
    pub const fn game(&self) -> &Game {
        &self.game
    }

    /// The recording.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Whether playback reached the final tick.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.game.tick() >= self.replay.final_tick
    }

    /// Progress as a whole percentage (0-100).
    #[must_use]
    pub fn progress_percent(&self) -> u32 {
        let duration = u64::from(self.replay.duration());
        if duration == 0 {
            return 100;
        }
        let played = u64::from(self.game.tick().saturating_sub(self.replay.start_tick));
        u32::try_from((played * 100 / duration).min(100)).unwrap_or(100)
    }
}
