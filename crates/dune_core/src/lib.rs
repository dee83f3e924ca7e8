//! # Dune Core
//!
//! Deterministic simulation core for a Dune II style real-time strategy
//! game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO: saves and replays are plain byte buffers
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Two games built from the same map, rules and seed and fed the same
//! commands produce the same state hash on every tick. Saves, replays and
//! the AI all rest on that.
//!
//! ## Crate Structure
//!
//! - [`data`] - Item and house identifiers, the rules table
//! - [`map`] - Tiles, terrain, spice, fog, pathfinding
//! - [`objects`] - Structures and units, movement, combat, carryalls
//! - [`house`] - Per-house economy and statistics
//! - [`command`] - The command stream and its executor
//! - [`game`] - Game context and the tick loop
//! - [`ai`] - The QuantBot computer player
//! - [`save`] / [`replay`] - Persistence
//! - [`math`] / [`coord`] - Fixed-point math and coordinates

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod command;
pub mod coord;
pub mod data;
pub mod error;
pub mod game;
pub mod house;
pub mod map;
pub mod math;
pub mod objects;
pub mod replay;
pub mod save;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{Difficulty, QuantBot};
    pub use crate::command::{Command, CommandType};
    pub use crate::coord::Coord;
    pub use crate::data::{HouseId, ItemId, Rules};
    pub use crate::error::{GameError, Result};
    pub use crate::game::{Game, GameContext, GameEvent, GameMode, GameSettings};
    pub use crate::house::House;
    pub use crate::map::{Map, TerrainType};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::objects::{AttackMode, Attacker, Builder, GameObject, Movable, ObjectId, Targetable};
    pub use crate::replay::{Replay, ReplayPlayer};
}
