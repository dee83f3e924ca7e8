//! The game loop and the context every object update runs against.
//!
//! Each tick runs three phases in a fixed order:
//!
//! 1. every object updates, in registry order, then dead objects are removed;
//! 2. every AI player updates, observing the post-movement state and
//!    returning commands;
//! 3. queued commands (player input first, then AI output) execute.
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - All randomness comes from [`GameRng`], seeded from [`GameSettings`]
//! - Objects update in slot order, which does not depend on hashing
//! - Same inputs always produce same outputs

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ai::{Difficulty, QuantBot};
use crate::command::{execute_command, Command};
use crate::coord::Coord;
use crate::data::{HouseId, ItemId, Rules, NUM_HOUSES};
use crate::error::{GameError, Result};
use crate::house::House;
use crate::map::{Map, MoveClass, TerrainType, INFANTRY_SLOT_OFFSETS};
use crate::math::{Fixed, Vec2Fixed};
use crate::objects::{
    create_object, structure_center, Damager, GameObject, Movable, ObjectId, ObjectRegistry,
};
use crate::replay::{Replay, ReplayRecorder};

/// Ticks between sand-track expiry sweeps.
const SAND_TRACK_SWEEP_INTERVAL: u32 = 50;

// ===== Settings =====

/// Campaign missions and custom skirmishes use different AI tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameMode {
    /// Scripted campaign mission.
    Campaign,
    /// Custom skirmish.
    #[default]
    Custom,
}

/// Settings fixed for the whole game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameSettings {
    /// Campaign or custom game.
    pub mode: GameMode,
    /// Seed for all simulation randomness.
    pub seed: u64,
}

// ===== Randomness =====

/// Seeded random number generator whose position can be saved.
#[derive(Debug, Clone)]
pub struct GameRng {
    seed: u64,
    rng: ChaCha8Rng,
}

impl GameRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Recreate a generator at a saved position.
    #[must_use]
    pub fn restore(seed: u64, word_pos: u128) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_word_pos(word_pos);
        Self { seed, rng }
    }

    /// Seed the generator was created from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Current stream position.
    #[must_use]
    pub fn word_pos(&self) -> u128 {
        self.rng.get_word_pos()
    }

    /// Uniform integer in `lo..=hi`.
    pub fn rand_range(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    /// Fair coin flip.
    pub fn rand_bool(&mut self) -> bool {
        self.rng.gen()
    }
}

impl RngCore for GameRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

impl PartialEq for GameRng {
    fn eq(&self, other: &Self) -> bool {
        self.seed == other.seed && self.word_pos() == other.word_pos()
    }
}

impl Eq for GameRng {}

// ===== Events =====

/// Discrete happenings for the presentation and sound layers.
///
/// The core fires these and never waits on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// An object took damage.
    Damaged {
        /// Damaged object.
        id: ObjectId,
        /// Its owner.
        owner: HouseId,
        /// Its type.
        item: ItemId,
        /// Damage applied.
        amount: Fixed,
        /// Who fired, if anyone.
        damager: Option<Damager>,
    },
    /// An object fell below the badly damaged threshold.
    BadlyDamaged {
        /// The object.
        id: ObjectId,
        /// Its owner.
        owner: HouseId,
    },
    /// An object reached zero health.
    Destroyed {
        /// The object.
        id: ObjectId,
        /// Its type.
        item: ItemId,
        /// Its owner.
        owner: HouseId,
        /// House credited with the kill.
        killer: Option<HouseId>,
        /// Where it died.
        location: Coord,
    },
    /// Something exploded at a pixel position.
    Explosion {
        /// Pixel position.
        position: Vec2Fixed,
    },
    /// A unit appeared on the map from a factory, dock or carryall.
    UnitDeployed {
        /// The unit.
        id: ObjectId,
        /// Where.
        location: Coord,
    },
    /// A structure was placed.
    StructurePlaced {
        /// The structure.
        id: ObjectId,
        /// Its type.
        item: ItemId,
        /// Its owner.
        owner: HouseId,
    },
    /// A builder finished an item.
    ProductionComplete {
        /// The builder.
        builder: ObjectId,
        /// What was built.
        item: ItemId,
    },
    /// A structure changed hands through infantry capture.
    Captured {
        /// The structure.
        id: ObjectId,
        /// Previous owner.
        from: HouseId,
        /// New owner.
        to: HouseId,
    },
    /// A unit was converted by a deviator, or reverted.
    Deviated {
        /// The unit.
        id: ObjectId,
        /// Previous owner.
        from: HouseId,
        /// New owner.
        to: HouseId,
    },
    /// A carryall lifted a unit.
    CarryallPickup {
        /// The carryall.
        carrier: ObjectId,
        /// The unit.
        cargo: ObjectId,
    },
    /// A carryall set a unit down.
    CarryallDrop {
        /// The carryall.
        carrier: ObjectId,
        /// The unit.
        cargo: ObjectId,
    },
    /// A spice bloom erupted.
    SpiceBloom {
        /// Bloom tile.
        location: Coord,
        /// Whether it was a special bloom.
        special: bool,
    },
    /// A sync check found a different state hash.
    Desync {
        /// Hash carried by the command.
        expected: u32,
        /// Local hash.
        actual: u32,
    },
}

// ===== Context =====

/// Everything an object update or a command may read or change.
///
/// Passed explicitly to every call that needs it; there is no global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameContext {
    /// Current tick.
    pub tick: u32,
    /// The tile grid.
    pub map: Map,
    /// Owner of every object.
    pub objects: ObjectRegistry,
    /// One entry per house, indexed by [`HouseId::index`].
    pub houses: Vec<House>,
    /// Item data.
    pub rules: Rules,
    /// Simulation randomness.
    pub rng: GameRng,
    /// Events fired during the current tick.
    pub events: Vec<GameEvent>,
    /// Fixed settings.
    pub settings: GameSettings,
}

impl PartialEq for ObjectRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.allocator_state() == other.allocator_state()
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
            && self.len() == other.len()
    }
}

impl Eq for ObjectRegistry {}

impl GameContext {
    /// Create a context with every house inactive.
    #[must_use]
    pub fn new(map: Map, rules: Rules, settings: GameSettings) -> Self {
        Self {
            tick: 0,
            map,
            objects: ObjectRegistry::new(),
            houses: HouseId::ALL.iter().map(|&id| House::new(id)).collect(),
            rules,
            rng: GameRng::new(settings.seed),
            events: Vec::new(),
            settings,
        }
    }

    /// State of a house.
    #[must_use]
    pub fn house(&self, id: HouseId) -> &House {
        &self.houses[id.index()]
    }

    /// Mutable state of a house.
    pub fn house_mut(&mut self, id: HouseId) -> &mut House {
        &mut self.houses[id.index()]
    }

    /// Team of a house.
    #[must_use]
    pub fn team_of(&self, house: HouseId) -> usize {
        self.house(house).team()
    }

    /// Whether two houses are allies.
    #[must_use]
    pub fn same_team(&self, a: HouseId, b: HouseId) -> bool {
        self.team_of(a) == self.team_of(b)
    }

    /// Fire an event.
    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Run `f` with the object checked out of the registry, so that `f`
    /// can mutate the object and the rest of the context together.
    ///
    /// Returns `None` if `id` does not resolve, including when the object
    /// is already checked out further up the stack.
    pub fn with_object<R>(
        &mut self,
        id: ObjectId,
        f: impl FnOnce(&mut GameObject, &mut Self) -> R,
    ) -> Option<R> {
        let mut object = self.objects.check_out(id)?;
        let result = f(&mut object, self);
        self.objects.put_back(id, object);
        Some(result)
    }

    /// Damage an object by ID. A stale ID is a no-op.
    pub fn damage_object(&mut self, id: ObjectId, amount: Fixed, damager: Option<Damager>) {
        self.with_object(id, |object, ctx| object.handle_damage(ctx, amount, damager));
    }

    // ===== Placement =====

    /// Put a unit on the map at `pos`, claiming tile occupancy.
    ///
    /// The caller has checked that `pos` is free for the unit.
    pub fn place_unit(&mut self, unit: &mut GameObject, pos: Coord) {
        let id = unit.id();
        unit.base.location = pos;
        unit.base.destination = Coord::INVALID;
        match unit.move_class() {
            MoveClass::Air => {
                unit.base.real = pos.tile_center();
                self.map.add_air(pos, id);
            }
            MoveClass::Infantry => {
                let center = pos.tile_center();
                let slot = self.map.closest_free_slot(pos, center.x, center.y).unwrap_or(0);
                let (ox, oy) = INFANTRY_SLOT_OFFSETS[slot];
                let origin = pos.tile_origin();
                unit.base.real = Vec2Fixed::new(origin.x + Fixed::from_num(ox), origin.y + Fixed::from_num(oy));
                if let Some(infantry) = crate::objects::InfantryState::of_mut(unit) {
                    infantry.slot = slot as u8;
                }
                self.map.set_infantry(pos, slot, id);
            }
            MoveClass::Vehicle | MoveClass::Sandworm => {
                unit.base.real = pos.tile_center();
                self.map.set_ground(pos, id);
            }
        }
        if let Some(unit_state) = unit.as_unit_mut() {
            unit_state.motion.reset(pos);
        }
    }

    /// Release every tile an object occupies.
    pub fn remove_from_map(&mut self, object: &GameObject) {
        let id = object.id();
        let loc = object.base.location;
        if object.is_structure() {
            let (w, h) = object.size();
            for y in loc.y..loc.y + h {
                for x in loc.x..loc.x + w {
                    let pos = Coord::new(x, y);
                    if self.map.contains(pos) {
                        self.map.clear_ground(pos, id);
                    }
                }
            }
            return;
        }
        if object.is_off_map() || !self.map.contains(loc) {
            return;
        }
        match object.move_class() {
            MoveClass::Air => self.map.remove_air(loc, id),
            MoveClass::Infantry => self.map.clear_infantry(loc, id),
            MoveClass::Vehicle | MoveClass::Sandworm => self.map.clear_ground(loc, id),
        }
    }

    /// Create a unit at `pos`, or at the nearest free tile around it.
    ///
    /// Returns `None` when `item` is not a unit or no tile is free.
    pub fn spawn_unit(&mut self, item: ItemId, owner: HouseId, pos: Coord) -> Option<ObjectId> {
        if !item.is_unit() {
            return None;
        }
        let id = self.objects.allocate();
        let Some(mut unit) = create_object(&self.rules, item.as_u32(), id, owner, pos) else {
            self.objects.release(id);
            return None;
        };
        let class = unit.move_class();
        let spot = if self.map.is_free_for(pos, class) {
            pos
        } else {
            self.map
                .find_deploy_spot(class, pos, (1, 1), Coord::INVALID, Coord::INVALID)
        };
        if !spot.is_valid() {
            self.objects.release(id);
            return None;
        }
        self.place_unit(&mut unit, spot);
        unit.base.guard_point = spot;
        self.objects.put_back(id, unit);
        self.emit(GameEvent::UnitDeployed { id, location: spot });
        Some(id)
    }

    /// Create a structure with its top-left corner at `pos`.
    ///
    /// Slabs turn the footprint into slab terrain and return `None`.
    /// Returns `None` when the footprint leaves the map or is occupied.
    pub fn spawn_structure(&mut self, item: ItemId, owner: HouseId, pos: Coord) -> Option<ObjectId> {
        if !item.is_structure() {
            return None;
        }
        let (w, h) = self.rules.size(item);
        for y in pos.y..pos.y + h {
            for x in pos.x..pos.x + w {
                let tile = self.map.tile(Coord::new(x, y))?;
                if tile.has_any_ground() {
                    return None;
                }
            }
        }
        if item.is_slab() {
            let rules = self.rules.clone();
            self.map.fill_terrain(pos, Coord::new(pos.x + w - 1, pos.y + h - 1), TerrainType::Slab, &rules);
            return None;
        }

        let id = self.objects.allocate();
        let Some(mut structure) = create_object(&self.rules, item.as_u32(), id, owner, pos) else {
            self.objects.release(id);
            return None;
        };
        structure.base.real = structure_center(pos, (w, h));
        for y in pos.y..pos.y + h {
            for x in pos.x..pos.x + w {
                self.map.set_ground(Coord::new(x, y), id);
            }
        }
        self.objects.put_back(id, structure);
        self.emit(GameEvent::StructurePlaced { id, item, owner });
        info!(%id, %item, ?owner, %pos, "structure placed");
        Some(id)
    }

    // ===== Removal =====

    /// Remove every object that is dead or has departed.
    pub fn reap(&mut self) {
        for id in self.objects.ids() {
            let finished = self
                .objects
                .get(id)
                .is_some_and(|o| o.base.is_dead() || o.base.departed);
            if !finished {
                continue;
            }
            if let Some(object) = self.objects.remove(id) {
                self.finalize_removal(object);
            }
        }
    }

    /// Undo every back-reference to a removed object.
    fn finalize_removal(&mut self, object: GameObject) {
        let id = object.id();
        self.remove_from_map(&object);
        if !object.base.departed {
            self.emit(GameEvent::Explosion {
                position: object.base.real,
            });
        }

        if let Some(carryall) = object.carryall() {
            // Cargo dies with its carrier.
            for &cargo in &carryall.cargo {
                self.kill_object(cargo, None);
            }
            if let Some(target) = object.base.target {
                crate::objects::release_booking_of(self, target, id);
            }
        }

        if let Some(ground) = object.ground() {
            if let Some(carrier) = ground.booked_carrier {
                if let Some(carrier) = self.objects.get_mut(carrier) {
                    if carrier.base.target == Some(id) {
                        carrier.base.clear_target();
                        carrier.base.destination = Coord::INVALID;
                    }
                }
            }
            if let Some(dock) = ground.docked_at {
                if let Some(dock) = self.objects.get_mut(dock).and_then(GameObject::dock_mut) {
                    if dock.docked == Some(id) {
                        dock.docked = None;
                    }
                }
            }
        }

        if let Some(dock) = object.dock() {
            if let Some(unit) = dock.docked {
                self.kill_object(unit, None);
            }
            if let Some(carrier) = dock.booked_carrier {
                if let Some(carrier) = self.objects.get_mut(carrier) {
                    if carrier.base.target == Some(id) {
                        carrier.base.clear_target();
                    }
                }
            }
        }
        debug!(%id, item = %object.item(), "object removed");
    }

    /// Reduce an object to zero health.
    pub fn kill_object(&mut self, id: ObjectId, damager: Option<Damager>) {
        self.with_object(id, |object, ctx| {
            let health = object.base.health;
            object.handle_damage(ctx, health, damager);
        });
    }

    /// Rebuild all tile occupancy from object positions, after loading.
    pub fn rebuild_occupancy(&mut self) {
        for tile in self.map.tiles_mut() {
            for id in tile.all_objects().collect::<Vec<_>>() {
                tile.clear_ground(id);
                tile.clear_infantry(id);
                tile.remove_air(id);
            }
        }
        let placements: Vec<(ObjectId, Coord, (i32, i32), Option<MoveClass>, u8)> = self
            .objects
            .iter()
            .filter(|(_, o)| !o.is_off_map() && !o.base.departed)
            .map(|(id, o)| {
                let class = o.is_unit().then(|| o.move_class());
                let slot = crate::objects::InfantryState::of(o).map_or(0, |i| i.slot);
                (id, o.base.location, o.size(), class, slot)
            })
            .collect();
        for (id, loc, (w, h), class, slot) in placements {
            match class {
                None => {
                    for y in loc.y..loc.y + h {
                        for x in loc.x..loc.x + w {
                            let pos = Coord::new(x, y);
                            if self.map.contains(pos) {
                                self.map.set_ground(pos, id);
                            }
                        }
                    }
                }
                Some(_) if !self.map.contains(loc) => {}
                Some(MoveClass::Air) => self.map.add_air(loc, id),
                Some(MoveClass::Infantry) => self.map.set_infantry(loc, usize::from(slot), id),
                Some(_) => self.map.set_ground(loc, id),
            }
        }
    }

    /// Hash of the simulation state for desync detection.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.rng.word_pos().hash(&mut hasher);

        self.objects.len().hash(&mut hasher);
        for (id, object) in self.objects.iter() {
            id.hash(&mut hasher);
            object.item().hash(&mut hasher);
            object.owner().hash(&mut hasher);
            object.base.health.to_bits().hash(&mut hasher);
            object.base.location.hash(&mut hasher);
            object.base.real.x.to_bits().hash(&mut hasher);
            object.base.real.y.to_bits().hash(&mut hasher);
            object.base.target.hash(&mut hasher);
            object.base.attack_mode.hash(&mut hasher);
        }

        for house in &self.houses {
            house.credits.to_bits().hash(&mut hasher);
            house.kills.hash(&mut hasher);
            house.losses.hash(&mut hasher);
        }
        hasher.finish()
    }
}

// ===== Game =====

/// A running game: the context plus AI players and the command queue.
#[derive(Debug, Clone)]
pub struct Game {
    pub(crate) ctx: GameContext,
    pub(crate) ai_players: Vec<QuantBot>,
    pending: Vec<Command>,
    rejected: Vec<(Command, GameError)>,
    last_events: Vec<GameEvent>,
    recorder: Option<ReplayRecorder>,
}

impl Game {
    /// Start a game on `map` with the standard rules.
    pub fn new(map: Map, settings: GameSettings) -> Result<Self> {
        Ok(Self::with_rules(map, Rules::standard()?, settings))
    }

    /// Start a game with a custom rules table.
    #[must_use]
    pub fn with_rules(map: Map, rules: Rules, settings: GameSettings) -> Self {
        Self::from_parts(GameContext::new(map, rules, settings), Vec::new())
    }

    pub(crate) fn from_parts(ctx: GameContext, ai_players: Vec<QuantBot>) -> Self {
        Self {
            ctx,
            ai_players,
            pending: Vec::new(),
            rejected: Vec::new(),
            last_events: Vec::new(),
            recorder: None,
        }
    }

    /// Read access to the simulation state.
    #[must_use]
    pub const fn context(&self) -> &GameContext {
        &self.ctx
    }

    /// Direct access to the simulation state, for scenario setup.
    pub fn context_mut(&mut self) -> &mut GameContext {
        &mut self.ctx
    }

    /// Current tick.
    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.ctx.tick
    }

    /// Bring a house into the game on `team` with starting credits.
    pub fn add_house(&mut self, house: HouseId, team: u8, credits: u32) {
        let state = self.ctx.house_mut(house);
        state.active = true;
        state.team = team.min((NUM_HOUSES - 1) as u8);
        state.credits = Fixed::from_num(credits);
    }

    /// Hand a house to a QuantBot.
    pub fn add_ai_player(&mut self, house: HouseId, difficulty: Difficulty) {
        if !self.ctx.house(house).active {
            self.add_house(house, house.index() as u8, self.ctx.rules.constants.starting_credits);
        }
        let seed = self.ctx.settings.seed;
        self.ai_players.push(QuantBot::new(house, difficulty, self.ctx.settings.mode, seed));
    }

    /// AI players in the game.
    #[must_use]
    pub fn ai_players(&self) -> &[QuantBot] {
        &self.ai_players
    }

    /// Queue a player command for the next command phase.
    pub fn queue_command(&mut self, command: Command) {
        self.pending.push(command);
    }

    /// Events fired during the last completed tick.
    #[must_use]
    pub fn events(&self) -> &[GameEvent] {
        &self.last_events
    }

    /// Commands rejected as malformed since the last call.
    pub fn take_rejected(&mut self) -> Vec<(Command, GameError)> {
        std::mem::take(&mut self.rejected)
    }

    /// Hash of the simulation state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        self.ctx.state_hash()
    }

    /// Advance the simulation by one tick.
    pub fn advance_tick(&mut self) {
        self.ctx.events.clear();
        let rules = &self.ctx.rules;
        House::refresh_totals(&mut self.ctx.houses, &self.ctx.objects, rules);

        // 1. Objects
        for id in self.ctx.objects.ids() {
            self.ctx.with_object(id, |object, ctx| object.update(ctx));
        }
        self.ctx.reap();
        if self.ctx.tick % SAND_TRACK_SWEEP_INTERVAL == 0 {
            let lifetime = self.ctx.rules.constants.sand_track_ticks;
            self.ctx.map.expire_sand_tracks(self.ctx.tick, lifetime);
        }

        // 2. AI players observe post-movement state.
        let mut ai_commands = Vec::new();
        for ai in &mut self.ai_players {
            ai_commands.extend(ai.update(&self.ctx));
        }

        // 3. Commands
        let player_commands = std::mem::take(&mut self.pending);
        if let Some(recorder) = &mut self.recorder {
            recorder.record(self.ctx.tick, &player_commands);
        }
        for command in player_commands.into_iter().chain(ai_commands) {
            if let Err(err) = execute_command(&mut self.ctx, &command) {
                warn!(tick = self.ctx.tick, ?command, %err, "command rejected");
                self.rejected.push((command, err));
            }
        }
        self.ctx.reap();

        self.ctx.tick += 1;
        self.last_events = std::mem::take(&mut self.ctx.events);

        #[cfg(debug_assertions)]
        {
            let hash = self.ctx.state_hash();
            tracing::debug!(tick = self.ctx.tick, state_hash = hash, "Game state hash");
        }
    }

    /// Advance several ticks.
    pub fn run_ticks(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.advance_tick();
        }
    }

    /// Start recording player commands for a replay.
    ///
    /// The replay starts from a snapshot of the current state.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot cannot be written.
    pub fn start_recording(&mut self) -> Result<()> {
        self.recorder = Some(ReplayRecorder::new(self.save()?, self.ctx.tick));
        Ok(())
    }

    /// Stop recording and return the replay, sealed with the current hash.
    pub fn stop_recording(&mut self) -> Option<Replay> {
        let recorder = self.recorder.take()?;
        Some(recorder.finish(self.ctx.tick, self.state_hash()))
    }

    /// Create a house's reinforcements: a carryall that enters from the
    /// closest map edge, drops `items` at `drop_point` and leaves.
    pub fn deliver_reinforcements(&mut self, house: HouseId, items: &[ItemId], drop_point: Coord) -> Option<ObjectId> {
        crate::objects::spawn_reinforcements(&mut self.ctx, house, items, drop_point)
    }
}

/// Resolve the owning house of a command's player byte.
pub(crate) fn house_of_player(player_id: u8) -> Result<HouseId> {
    HouseId::from_index(usize::from(player_id))
        .ok_or_else(|| GameError::invalid_argument(format!("unknown player {player_id}")))
}

/// Pick a random tile within `radius` of `center` that a unit of `class`
/// could stand on, or [`Coord::INVALID`].
pub(crate) fn random_nearby_spot(ctx: &mut GameContext, class: MoveClass, center: Coord, min: i32, max: i32) -> Coord {
    let GameContext { map, rng, .. } = ctx;
    map.find_random_free_spot(class, center, min, max, rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> GameContext {
        GameContext::new(Map::new(32, 32), Rules::standard().expect("rules"), GameSettings::default())
    }

    #[test]
    fn test_rng_restore_continues_stream() {
        let mut a = GameRng::new(42);
        a.rand_range(0, 100);
        a.rand_range(0, 100);
        let mut b = GameRng::restore(42, a.word_pos());
        assert_eq!(a.rand_range(0, 1000), b.rand_range(0, 1000));
        assert_eq!(a, b);
    }

    #[test]
    fn test_spawn_unit_claims_tile() {
        let mut ctx = context();
        let id = ctx
            .spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(5, 5))
            .expect("free tile");
        assert_eq!(ctx.map.tile(Coord::new(5, 5)).and_then(|t| t.ground()), Some(id));

        // A second unit on the same tile is pushed aside.
        let other = ctx
            .spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(5, 5))
            .expect("nearby tile");
        let loc = ctx.objects.get(other).map(|o| o.base.location).expect("live");
        assert_eq!(loc.chebyshev_distance(Coord::new(5, 5)), 1);
    }

    #[test]
    fn test_spawn_infantry_shares_tile() {
        let mut ctx = context();
        let pos = Coord::new(3, 3);
        let a = ctx.spawn_unit(ItemId::Soldier, HouseId::Ordos, pos).expect("slot");
        let b = ctx.spawn_unit(ItemId::Soldier, HouseId::Ordos, pos).expect("slot");
        let tile = ctx.map.tile(pos).expect("on map");
        assert!(tile.infantry().contains(&Some(a)));
        assert!(tile.infantry().contains(&Some(b)));
    }

    #[test]
    fn test_reap_removes_dead_and_frees_tiles() {
        let mut ctx = context();
        let pos = Coord::new(5, 5);
        let id = ctx.spawn_unit(ItemId::Trike, HouseId::Atreides, pos).expect("free tile");
        ctx.kill_object(id, None);
        assert!(ctx.objects.get(id).is_some_and(|o| o.base.is_dead()));
        ctx.reap();
        assert!(ctx.objects.get(id).is_none());
        assert_eq!(ctx.map.tile(pos).and_then(|t| t.ground()), None);
        assert_eq!(ctx.house(HouseId::Atreides).losses, 1);
    }

    #[test]
    fn test_spawn_slab_changes_terrain() {
        let mut ctx = context();
        let rules = ctx.rules.clone();
        ctx.map.fill_terrain(Coord::new(0, 0), Coord::new(5, 5), TerrainType::Rock, &rules);
        assert!(ctx.spawn_structure(ItemId::Slab4, HouseId::Ordos, Coord::new(1, 1)).is_none());
        assert_eq!(ctx.map.terrain(Coord::new(2, 2)), Some(TerrainType::Slab));
        assert!(ctx.objects.is_empty());
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut ctx = context();
        let before = ctx.state_hash();
        ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(5, 5));
        assert_ne!(before, ctx.state_hash());
    }

    #[test]
    fn test_game_tick_advances() {
        let mut game = Game::new(Map::new(16, 16), GameSettings::default()).expect("rules");
        game.add_house(HouseId::Atreides, 0, 1000);
        game.run_ticks(3);
        assert_eq!(game.tick(), 3);
    }
}
