//! Binary save games.
//!
//! A save is a flat little-endian stream of primitive fields written in a
//! fixed order, with no schema of its own. The stream opens with a magic
//! number and a format version; anything else is refused before a single
//! object is read.
//!
//! ```text
//! magic u32 | version u32 | settings | tick | rng | rules (RON) | map
//! | houses | registry allocator | objects | AI players
//! ```
//!
//! Objects are rebuilt through the same factory as fresh ones and then
//! have their saved fields read over the defaults. Tile occupancy is not
//! stored; it is rebuilt from object positions after loading.

use tracing::{debug, info};

use crate::ai::QuantBot;
use crate::coord::Coord;
use crate::data::{HouseId, ItemId, Rules};
use crate::error::{GameError, Result};
use crate::game::{Game, GameContext, GameMode, GameRng, GameSettings};
use crate::house::House;
use crate::map::{Map, SandTrack, TerrainType, NUM_INFANTRY_SLOTS, NUM_TEAMS};
use crate::math::{Fixed, Vec2Fixed};
use crate::objects::{
    create_object, AirKind, AttackMode, GameObject, GroundKind, ObjectId, ObjectKind, ObjectRegistry,
    ProductionItem, Structure, StructureRole, Unit, UnitClass,
};

/// First word of every save stream: "DUNE".
pub const SAVE_MAGIC: u32 = 0x4455_4E45;

/// Current save format.
pub const SAVE_VERSION: u32 = 1;

/// Largest map edge accepted from a stream.
const MAX_MAP_EDGE: i32 = 1024;

// ===== Streams =====

/// Little-endian writer.
#[derive(Debug, Default)]
pub struct OutputStream {
    buf: Vec<u8>,
}

impl OutputStream {
    /// Empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Write a byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a bool as one byte.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Write a `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write an `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a `u128`.
    pub fn write_u128(&mut self, value: u128) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a fixed-point value as its raw bits.
    pub fn write_fixed(&mut self, value: Fixed) {
        self.buf.extend_from_slice(&value.to_bits().to_le_bytes());
    }

    /// Write a pixel vector.
    pub fn write_vec2(&mut self, value: Vec2Fixed) {
        self.write_fixed(value.x);
        self.write_fixed(value.y);
    }

    /// Write a tile coordinate.
    pub fn write_coord(&mut self, value: Coord) {
        self.write_i32(value.x);
        self.write_i32(value.y);
    }

    /// Write an optional object ID; zero means none.
    pub fn write_id(&mut self, value: Option<ObjectId>) {
        self.write_u32(ObjectId::raw_opt(value));
    }

    /// Write a length prefix.
    pub fn write_len(&mut self, len: usize) {
        self.write_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) {
        self.write_len(value.len());
        self.buf.extend_from_slice(value.as_bytes());
    }
}

/// Little-endian reader. Every read names the field it was after so a
/// truncated stream reports where it ended.
#[derive(Debug)]
pub struct InputStream<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> InputStream<'a> {
    /// Read from `buf`.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not read yet.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let end = self.pos.checked_add(N).ok_or(GameError::Truncated(field))?;
        let bytes = self.buf.get(self.pos..end).ok_or(GameError::Truncated(field))?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read a byte.
    pub fn read_u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.take::<1>(field)?[0])
    }

    /// Read a bool, rejecting anything but 0 or 1.
    pub fn read_bool(&mut self, field: &'static str) -> Result<bool> {
        match self.read_u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(GameError::CorruptSave(format!("{field}: {other} is not a bool"))),
        }
    }

    /// Read a `u32`.
    pub fn read_u32(&mut self, field: &'static str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(field)?))
    }

    /// Read an `i32`.
    pub fn read_i32(&mut self, field: &'static str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take(field)?))
    }

    /// Read a `u64`.
    pub fn read_u64(&mut self, field: &'static str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(field)?))
    }

    /// Read a `u128`.
    pub fn read_u128(&mut self, field: &'static str) -> Result<u128> {
        Ok(u128::from_le_bytes(self.take(field)?))
    }

    /// Read a fixed-point value.
    pub fn read_fixed(&mut self, field: &'static str) -> Result<Fixed> {
        Ok(Fixed::from_bits(i64::from_le_bytes(self.take(field)?)))
    }

    /// Read a pixel vector.
    pub fn read_vec2(&mut self, field: &'static str) -> Result<Vec2Fixed> {
        Ok(Vec2Fixed::new(self.read_fixed(field)?, self.read_fixed(field)?))
    }

    /// Read a tile coordinate.
    pub fn read_coord(&mut self, field: &'static str) -> Result<Coord> {
        Ok(Coord::new(self.read_i32(field)?, self.read_i32(field)?))
    }

    /// Read an optional object ID.
    pub fn read_id(&mut self, field: &'static str) -> Result<Option<ObjectId>> {
        Ok(ObjectId::from_raw_opt(self.read_u32(field)?))
    }

    /// Read a length prefix for elements of at least `min_size` bytes,
    /// refusing lengths the rest of the stream cannot hold.
    pub fn read_len(&mut self, field: &'static str, min_size: usize) -> Result<usize> {
        let len = self.read_u32(field)? as usize;
        if len.saturating_mul(min_size.max(1)) > self.remaining() {
            return Err(GameError::Truncated(field));
        }
        Ok(len)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_str(&mut self, field: &'static str) -> Result<String> {
        let len = self.read_len(field, 1)?;
        let end = self.pos + len;
        let bytes = self.buf.get(self.pos..end).ok_or(GameError::Truncated(field))?;
        self.pos = end;
        String::from_utf8(bytes.to_vec()).map_err(|_| GameError::CorruptSave(format!("{field}: not UTF-8")))
    }

    /// Read a house index.
    pub fn read_house(&mut self, field: &'static str) -> Result<HouseId> {
        let raw = self.read_u8(field)?;
        HouseId::from_index(usize::from(raw))
            .ok_or_else(|| GameError::CorruptSave(format!("{field}: unknown house {raw}")))
    }

    /// Read an item ID.
    pub fn read_item(&mut self, field: &'static str) -> Result<ItemId> {
        let raw = self.read_u32(field)?;
        ItemId::from_u32(raw).ok_or(GameError::UnknownItem(raw))
    }
}

// ===== Game =====

impl Game {
    /// Serialize the whole game.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] if the rules table cannot be written.
    pub fn save(&self) -> Result<Vec<u8>> {
        let mut out = OutputStream::new();
        out.write_u32(SAVE_MAGIC);
        out.write_u32(SAVE_VERSION);
        save_context(&self.ctx, &mut out)?;
        out.write_len(self.ai_players.len());
        for ai in &self.ai_players {
            ai.save(&mut out);
        }
        debug!(tick = self.ctx.tick, bytes = out.buf.len(), "game saved");
        Ok(out.into_bytes())
    }

    /// Restore a game written by [`Game::save`].
    ///
    /// # Errors
    ///
    /// [`GameError::BadMagic`] or [`GameError::VersionMismatch`] for a
    /// foreign stream, [`GameError::Truncated`] when it ends early, and
    /// [`GameError::CorruptSave`] or [`GameError::UnknownItem`] for values
    /// that cannot be valid. Nothing is partially recovered.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let mut input = InputStream::new(bytes);
        let magic = input.read_u32("magic")?;
        if magic != SAVE_MAGIC {
            return Err(GameError::BadMagic(magic));
        }
        let version = input.read_u32("version")?;
        if version != SAVE_VERSION {
            return Err(GameError::VersionMismatch {
                expected: SAVE_VERSION,
                found: version,
            });
        }
        let ctx = load_context(&mut input)?;
        let count = input.read_len("ai player count", 1)?;
        let ai_players = (0..count)
            .map(|_| QuantBot::load(&mut input))
            .collect::<Result<Vec<_>>>()?;
        if input.remaining() != 0 {
            return Err(GameError::CorruptSave(format!(
                "{} trailing bytes",
                input.remaining()
            )));
        }
        info!(tick = ctx.tick, objects = ctx.objects.len(), "game loaded");
        Ok(Self::from_parts(ctx, ai_players))
    }
}

fn save_context(ctx: &GameContext, out: &mut OutputStream) -> Result<()> {
    out.write_u8(match ctx.settings.mode {
        GameMode::Campaign => 0,
        GameMode::Custom => 1,
    });
    out.write_u64(ctx.settings.seed);
    out.write_u32(ctx.tick);
    out.write_u64(ctx.rng.seed());
    out.write_u128(ctx.rng.word_pos());

    let rules = ron::to_string(&ctx.rules).map_err(|e| GameError::InvalidState(format!("rules: {e}")))?;
    out.write_str(&rules);

    save_map(&ctx.map, out);

    out.write_len(ctx.houses.len());
    for house in &ctx.houses {
        save_house(house, out);
    }

    let (generations, free) = ctx.objects.allocator_state();
    out.write_len(generations.len());
    generations.iter().for_each(|&g| out.write_u32(g));
    out.write_len(free.len());
    free.iter().for_each(|&f| out.write_u32(f));

    out.write_len(ctx.objects.len());
    for (_, object) in ctx.objects.iter() {
        save_object(object, out);
    }
    Ok(())
}

fn load_context(input: &mut InputStream<'_>) -> Result<GameContext> {
    let mode = match input.read_u8("game mode")? {
        0 => GameMode::Campaign,
        1 => GameMode::Custom,
        other => return Err(GameError::CorruptSave(format!("unknown game mode {other}"))),
    };
    let seed = input.read_u64("seed")?;
    let tick = input.read_u32("tick")?;
    let rng_seed = input.read_u64("rng seed")?;
    let word_pos = input.read_u128("rng position")?;

    let rules_text = input.read_str("rules")?;
    let rules = Rules::from_ron(&rules_text)?;
    let map = load_map(input)?;

    let mut ctx = GameContext::new(map, rules, GameSettings { mode, seed });
    ctx.tick = tick;
    ctx.rng = GameRng::restore(rng_seed, word_pos);

    let houses = input.read_len("house count", 1)?;
    if houses != ctx.houses.len() {
        return Err(GameError::CorruptSave(format!("{houses} houses")));
    }
    for index in 0..houses {
        load_house(&mut ctx.houses[index], input)?;
    }

    let slots = input.read_len("slot count", 4)?;
    let generations = (0..slots)
        .map(|_| input.read_u32("slot generation"))
        .collect::<Result<Vec<_>>>()?;
    let free_len = input.read_len("free list", 4)?;
    let free = (0..free_len)
        .map(|_| input.read_u32("free slot"))
        .collect::<Result<Vec<_>>>()?;
    if free.iter().any(|&f| f as usize >= slots) {
        return Err(GameError::CorruptSave("free list names a missing slot".into()));
    }
    ctx.objects = ObjectRegistry::new();
    ctx.objects.restore_allocator(&generations, free);

    let count = input.read_len("object count", 8)?;
    for _ in 0..count {
        let object = load_object(&ctx.rules, input)?;
        let id = object.id();
        if !ctx.objects.insert_at(id, object) {
            return Err(GameError::CorruptSave(format!("object {id} does not fit its slot")));
        }
    }

    ctx.rebuild_occupancy();
    let GameContext { houses, objects, rules, .. } = &mut ctx;
    House::refresh_totals(houses, objects, rules);
    Ok(ctx)
}

// ===== Map =====

fn save_map(map: &Map, out: &mut OutputStream) {
    out.write_i32(map.width());
    out.write_i32(map.height());
    for tile in map.tiles() {
        out.write_u8(tile.terrain() as u8);
        out.write_fixed(tile.spice());
        out.write_u8(tile.explored_bits());
        for team in 0..NUM_TEAMS {
            out.write_u32(tile.last_seen(team));
        }
        match tile.sand_track() {
            Some(track) => {
                out.write_bool(true);
                out.write_u32(track.tick);
                out.write_u8(track.angle);
            }
            None => out.write_bool(false),
        }
    }
}

fn load_map(input: &mut InputStream<'_>) -> Result<Map> {
    let width = input.read_i32("map width")?;
    let height = input.read_i32("map height")?;
    if !(1..=MAX_MAP_EDGE).contains(&width) || !(1..=MAX_MAP_EDGE).contains(&height) {
        return Err(GameError::CorruptSave(format!("map size {width}x{height}")));
    }
    let mut map = Map::new(width, height);
    for tile in map.tiles_mut() {
        let raw = input.read_u8("terrain")?;
        let terrain =
            TerrainType::from_u8(raw).ok_or_else(|| GameError::CorruptSave(format!("unknown terrain {raw}")))?;
        tile.set_terrain(terrain);
        tile.set_spice(input.read_fixed("spice")?);
        let explored = input.read_u8("explored")?;
        let mut last_seen = [0u32; NUM_TEAMS];
        for seen in &mut last_seen {
            *seen = input.read_u32("last seen")?;
        }
        tile.restore_fog(explored, last_seen);
        if input.read_bool("sand track")? {
            let tick = input.read_u32("sand track tick")?;
            let angle = input.read_u8("sand track angle")?;
            tile.set_sand_track(Some(SandTrack { tick, angle }));
        }
    }
    Ok(map)
}

// ===== Houses =====

fn save_house(house: &House, out: &mut OutputStream) {
    out.write_u8(house.team);
    out.write_bool(house.active);
    out.write_fixed(house.credits);
    out.write_u32(house.kills);
    out.write_u32(house.losses);
    let (damage, lost) = house.statistics();
    out.write_len(damage.len());
    damage.iter().for_each(|&d| out.write_u64(d));
    out.write_len(lost.len());
    lost.iter().for_each(|&l| out.write_u64(l));
}

fn load_house(house: &mut House, input: &mut InputStream<'_>) -> Result<()> {
    house.team = input.read_u8("team")?;
    if usize::from(house.team) >= NUM_TEAMS {
        return Err(GameError::CorruptSave(format!("team {}", house.team)));
    }
    house.active = input.read_bool("house active")?;
    house.credits = input.read_fixed("credits")?;
    house.kills = input.read_u32("kills")?;
    house.losses = input.read_u32("losses")?;
    let len = input.read_len("damage table", 8)?;
    let damage = (0..len).map(|_| input.read_u64("damage dealt")).collect::<Result<Vec<_>>>()?;
    let len = input.read_len("loss table", 8)?;
    let lost = (0..len).map(|_| input.read_u64("value lost")).collect::<Result<Vec<_>>>()?;
    if damage.len() != ItemId::ALL.len() || lost.len() != ItemId::ALL.len() {
        return Err(GameError::CorruptSave("statistics tables have the wrong size".into()));
    }
    house.restore_statistics(damage, lost);
    Ok(())
}

// ===== Objects =====

fn save_object(object: &GameObject, out: &mut OutputStream) {
    let base = &object.base;
    out.write_u32(base.item.as_u32());
    out.write_u32(base.id.raw());
    out.write_u8(base.owner.index() as u8);
    out.write_u8(base.original_owner.index() as u8);
    out.write_coord(base.location);
    out.write_fixed(base.health);
    out.write_vec2(base.real);
    out.write_coord(base.destination);
    out.write_id(base.target);
    out.write_bool(base.target_friendly);
    out.write_coord(base.attack_pos);
    out.write_fixed(base.angle);
    out.write_u8(base.drawn_angle);
    out.write_u8(base.visible);
    out.write_u32(base.attack_mode.as_u32());
    out.write_bool(base.forced_move);
    out.write_bool(base.forced_target);
    out.write_bool(base.active);
    out.write_bool(base.respondable);
    out.write_bool(base.badly_damaged);
    out.write_coord(base.guard_point);
    out.write_id(base.last_attacker);
    out.write_bool(base.departed);

    match &object.kind {
        ObjectKind::Structure(structure) => save_structure(structure, out),
        ObjectKind::Unit(unit) => save_unit(unit, out),
    }
}

fn save_structure(structure: &Structure, out: &mut OutputStream) {
    out.write_coord(structure.deploy_point);
    out.write_bool(structure.repairing);
    out.write_u32(structure.weapon_timer);
    match &structure.role {
        StructureRole::Builder(builder) => {
            out.write_len(builder.queue.len());
            for entry in &builder.queue {
                out.write_u32(entry.item.as_u32());
                out.write_fixed(entry.spent);
            }
            out.write_bool(builder.on_hold);
            out.write_u8(builder.upgrade_level);
            out.write_bool(builder.upgrade_progress.is_some());
            out.write_fixed(builder.upgrade_progress.unwrap_or(Fixed::ZERO));
            out.write_u32(builder.ready_structure.map_or(0, ItemId::as_u32));
        }
        StructureRole::Refinery(dock) | StructureRole::RepairYard(dock) => {
            out.write_id(dock.docked);
            out.write_id(dock.booked_carrier);
            out.write_u32(dock.timer);
        }
        StructureRole::Plain | StructureRole::Turret => {}
    }
}

fn save_unit(unit: &Unit, out: &mut OutputStream) {
    let motion = &unit.motion;
    out.write_bool(motion.moving);
    out.write_bool(motion.just_stopped);
    out.write_vec2(motion.speed);
    out.write_fixed(motion.current_max_speed);
    out.write_vec2(motion.move_target);
    out.write_fixed(motion.step_length);
    out.write_coord(motion.old_location);
    out.write_len(motion.path.len());
    motion.path.iter().for_each(|&c| out.write_coord(c));
    out.write_u32(motion.blocked_ticks);
    out.write_u32(motion.no_path_retry);
    out.write_u32(motion.failed_paths);
    out.write_fixed(motion.target_angle);

    out.write_u32(unit.weapon_timer);
    out.write_u32(unit.deviation_timer);
    out.write_u32(unit.find_target_timer);
    match &unit.class {
        UnitClass::Ground(ground) => {
            out.write_bool(ground.awaiting_pickup);
            out.write_id(ground.booked_carrier);
            out.write_bool(ground.picked_up);
            out.write_id(ground.docked_at);
            match &ground.kind {
                GroundKind::Infantry(infantry) => out.write_u8(infantry.slot),
                GroundKind::Harvester(harvester) => {
                    out.write_fixed(harvester.spice);
                    out.write_bool(harvester.returning);
                    out.write_coord(harvester.harvest_spot);
                }
                GroundKind::Devastator(devastator) => {
                    out.write_bool(devastator.timer.is_some());
                    out.write_u32(devastator.timer.unwrap_or(0));
                }
                GroundKind::Sandworm(worm) => {
                    out.write_u32(worm.appetite);
                    out.write_u32(worm.sleep);
                }
                GroundKind::Tracked | GroundKind::Wheeled | GroundKind::Mcv => {}
            }
        }
        UnitClass::Air(air) => match &air.kind {
            AirKind::Carryall(carryall) => {
                out.write_len(carryall.cargo.len());
                carryall.cargo.iter().for_each(|&c| out.write_u32(c.raw()));
                out.write_bool(carryall.owned);
                out.write_id(carryall.delivery);
            }
            AirKind::Ornithopter | AirKind::Frigate => {}
        },
    }
}

fn read_mode(input: &mut InputStream<'_>) -> Result<AttackMode> {
    let raw = input.read_u32("attack mode")?;
    AttackMode::from_u32(raw).ok_or_else(|| GameError::CorruptSave(format!("unknown attack mode {raw}")))
}

fn read_cargo(input: &mut InputStream<'_>) -> Result<ObjectId> {
    input
        .read_id("cargo")?
        .ok_or_else(|| GameError::CorruptSave("empty cargo slot".into()))
}

/// Read one object: identity first, then the saved fields over the
/// factory defaults of its type.
fn load_object(rules: &Rules, input: &mut InputStream<'_>) -> Result<GameObject> {
    let item = input.read_item("item")?;
    let id = ObjectId::from_raw_opt(input.read_u32("object id")?)
        .ok_or_else(|| GameError::CorruptSave("object without an id".into()))?;
    let owner = input.read_house("owner")?;
    let original_owner = input.read_house("original owner")?;
    let location = input.read_coord("location")?;
    if item.is_slab() {
        return Err(GameError::CorruptSave(format!("{item} stored as an object")));
    }
    let mut object =
        create_object(rules, item.as_u32(), id, owner, location).ok_or(GameError::UnknownItem(item.as_u32()))?;

    let base = &mut object.base;
    base.original_owner = original_owner;
    base.health = input.read_fixed("health")?;
    base.real = input.read_vec2("real position")?;
    base.destination = input.read_coord("destination")?;
    base.target = input.read_id("target")?;
    base.target_friendly = input.read_bool("target friendly")?;
    base.attack_pos = input.read_coord("attack position")?;
    base.angle = input.read_fixed("angle")?;
    base.drawn_angle = input.read_u8("drawn angle")?;
    base.visible = input.read_u8("visibility")?;
    base.attack_mode = read_mode(input)?;
    base.forced_move = input.read_bool("forced move")?;
    base.forced_target = input.read_bool("forced target")?;
    base.active = input.read_bool("active")?;
    base.respondable = input.read_bool("respondable")?;
    base.badly_damaged = input.read_bool("badly damaged")?;
    base.guard_point = input.read_coord("guard point")?;
    base.last_attacker = input.read_id("last attacker")?;
    base.departed = input.read_bool("departed")?;

    match &mut object.kind {
        ObjectKind::Structure(structure) => load_structure(structure, input)?,
        ObjectKind::Unit(unit) => load_unit(unit, input)?,
    }
    Ok(object)
}

fn load_structure(structure: &mut Structure, input: &mut InputStream<'_>) -> Result<()> {
    structure.deploy_point = input.read_coord("deploy point")?;
    structure.repairing = input.read_bool("repairing")?;
    structure.weapon_timer = input.read_u32("weapon timer")?;
    match &mut structure.role {
        StructureRole::Builder(builder) => {
            let len = input.read_len("build queue", 12)?;
            builder.queue.clear();
            for _ in 0..len {
                let item = input.read_item("queued item")?;
                let mut entry = ProductionItem::new(item);
                entry.spent = input.read_fixed("spent")?;
                builder.queue.push_back(entry);
            }
            builder.on_hold = input.read_bool("on hold")?;
            builder.upgrade_level = input.read_u8("upgrade level")?;
            let upgrading = input.read_bool("upgrading")?;
            let progress = input.read_fixed("upgrade progress")?;
            builder.upgrade_progress = upgrading.then_some(progress);
            let ready = input.read_u32("ready structure")?;
            builder.ready_structure = if ready == 0 {
                None
            } else {
                Some(ItemId::from_u32(ready).ok_or(GameError::UnknownItem(ready))?)
            };
        }
        StructureRole::Refinery(dock) | StructureRole::RepairYard(dock) => {
            dock.docked = input.read_id("docked unit")?;
            dock.booked_carrier = input.read_id("booked carrier")?;
            dock.timer = input.read_u32("dock timer")?;
        }
        StructureRole::Plain | StructureRole::Turret => {}
    }
    Ok(())
}

fn load_unit(unit: &mut Unit, input: &mut InputStream<'_>) -> Result<()> {
    let motion = &mut unit.motion;
    motion.moving = input.read_bool("moving")?;
    motion.just_stopped = input.read_bool("just stopped")?;
    motion.speed = input.read_vec2("speed")?;
    motion.current_max_speed = input.read_fixed("max speed")?;
    motion.move_target = input.read_vec2("move target")?;
    motion.step_length = input.read_fixed("step length")?;
    motion.old_location = input.read_coord("old location")?;
    let len = input.read_len("path", 8)?;
    motion.path.clear();
    for _ in 0..len {
        motion.path.push_back(input.read_coord("path step")?);
    }
    motion.blocked_ticks = input.read_u32("blocked ticks")?;
    motion.no_path_retry = input.read_u32("path retry")?;
    motion.failed_paths = input.read_u32("failed paths")?;
    motion.target_angle = input.read_fixed("target angle")?;

    unit.weapon_timer = input.read_u32("weapon timer")?;
    unit.deviation_timer = input.read_u32("deviation timer")?;
    unit.find_target_timer = input.read_u32("target search timer")?;
    match &mut unit.class {
        UnitClass::Ground(ground) => {
            ground.awaiting_pickup = input.read_bool("awaiting pickup")?;
            ground.booked_carrier = input.read_id("booked carrier")?;
            ground.picked_up = input.read_bool("picked up")?;
            ground.docked_at = input.read_id("docked at")?;
            match &mut ground.kind {
                GroundKind::Infantry(infantry) => {
                    infantry.slot = input.read_u8("infantry slot")?;
                    if usize::from(infantry.slot) >= NUM_INFANTRY_SLOTS {
                        return Err(GameError::CorruptSave(format!("infantry slot {}", infantry.slot)));
                    }
                }
                GroundKind::Harvester(harvester) => {
                    harvester.spice = input.read_fixed("harvested spice")?;
                    harvester.returning = input.read_bool("returning")?;
                    harvester.harvest_spot = input.read_coord("harvest spot")?;
                }
                GroundKind::Devastator(devastator) => {
                    let armed = input.read_bool("devastate armed")?;
                    let timer = input.read_u32("devastate timer")?;
                    devastator.timer = armed.then_some(timer);
                }
                GroundKind::Sandworm(worm) => {
                    worm.appetite = input.read_u32("appetite")?;
                    worm.sleep = input.read_u32("sleep")?;
                }
                GroundKind::Tracked | GroundKind::Wheeled | GroundKind::Mcv => {}
            }
        }
        UnitClass::Air(air) => match &mut air.kind {
            AirKind::Carryall(carryall) => {
                let len = input.read_len("cargo", 4)?;
                carryall.cargo = (0..len).map(|_| read_cargo(input)).collect::<Result<Vec<_>>>()?;
                carryall.owned = input.read_bool("owned")?;
                carryall.delivery = input.read_id("delivery")?;
            }
            AirKind::Ornithopter | AirKind::Frigate => {}
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Difficulty;
    use crate::command::Command;

    fn game() -> Game {
        let rules = Rules::standard().expect("rules");
        let mut map = Map::new(32, 32);
        map.fill_terrain(Coord::new(0, 0), Coord::new(11, 11), TerrainType::Rock, &rules);
        map.fill_terrain(Coord::new(18, 18), Coord::new(22, 22), TerrainType::Spice, &rules);
        let settings = GameSettings {
            mode: GameMode::Custom,
            seed: 7,
        };
        let mut game = Game::with_rules(map, rules, settings);
        game.add_house(HouseId::Atreides, 0, 1500);
        game.add_house(HouseId::Harkonnen, 1, 1500);
        let ctx = game.context_mut();
        ctx.spawn_structure(ItemId::ConstructionYard, HouseId::Atreides, Coord::new(2, 2))
            .expect("yard");
        ctx.spawn_structure(ItemId::LightFactory, HouseId::Atreides, Coord::new(6, 2))
            .expect("factory");
        ctx.spawn_unit(ItemId::Harvester, HouseId::Atreides, Coord::new(14, 14))
            .expect("harvester");
        ctx.spawn_unit(ItemId::Trooper, HouseId::Harkonnen, Coord::new(25, 5))
            .expect("trooper");
        game.add_ai_player(HouseId::Harkonnen, Difficulty::Medium);
        game
    }

    #[test]
    fn test_output_stream_is_little_endian() {
        let mut out = OutputStream::new();
        out.write_u32(0x0102_0304);
        out.write_bool(true);
        assert_eq!(out.into_bytes(), vec![4, 3, 2, 1, 1]);
    }

    #[test]
    fn test_input_stream_names_truncated_field() {
        let mut input = InputStream::new(&[1, 2]);
        assert_eq!(input.read_u32("credits"), Err(GameError::Truncated("credits")));
    }

    #[test]
    fn test_input_stream_rejects_oversized_length() {
        let bytes = 1000u32.to_le_bytes();
        let mut input = InputStream::new(&bytes);
        assert!(matches!(input.read_len("path", 8), Err(GameError::Truncated("path"))));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = game().save().expect("save");
        bytes[0] ^= 0xFF;
        assert!(matches!(Game::load(&bytes), Err(GameError::BadMagic(_))));
    }

    #[test]
    fn test_version_mismatch() {
        let mut bytes = game().save().expect("save");
        bytes[4..8].copy_from_slice(&(SAVE_VERSION + 1).to_le_bytes());
        assert_eq!(
            Game::load(&bytes).err(),
            Some(GameError::VersionMismatch {
                expected: SAVE_VERSION,
                found: SAVE_VERSION + 1,
            })
        );
    }

    #[test]
    fn test_truncated_save_is_an_error() {
        let bytes = game().save().expect("save");
        for cut in [3, 8, 40, bytes.len() / 2, bytes.len() - 1] {
            assert!(Game::load(&bytes[..cut]).is_err(), "cut at {cut} loaded");
        }
    }

    #[test]
    fn test_trailing_bytes_are_corrupt() {
        let mut bytes = game().save().expect("save");
        bytes.push(0);
        assert!(matches!(Game::load(&bytes), Err(GameError::CorruptSave(_))));
    }

    #[test]
    fn test_round_trip_restores_state() {
        let mut game = game();
        game.queue_command(Command::produce(Command::player_of(HouseId::Atreides), game_factory(&game), ItemId::Trike, false));
        for _ in 0..120 {
            game.advance_tick();
        }
        let bytes = game.save().expect("save");
        let loaded = Game::load(&bytes).expect("load");
        assert_eq!(loaded.context(), game.context());
        assert_eq!(loaded.state_hash(), game.state_hash());
        assert_eq!(loaded.save().expect("save again"), bytes);
    }

    #[test]
    fn test_loaded_game_continues_identically() {
        let mut game = game();
        for _ in 0..60 {
            game.advance_tick();
        }
        let mut loaded = Game::load(&game.save().expect("save")).expect("load");
        for _ in 0..300 {
            game.advance_tick();
            loaded.advance_tick();
        }
        assert_eq!(loaded.state_hash(), game.state_hash());
    }

    fn game_factory(game: &Game) -> ObjectId {
        game.context()
            .objects
            .iter()
            .find(|(_, o)| o.item() == ItemId::LightFactory)
            .map(|(id, _)| id)
            .expect("factory")
    }
}
