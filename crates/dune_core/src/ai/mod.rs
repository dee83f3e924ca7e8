//! QuantBot, the rule-based computer player.
//!
//! A bot reads the game context and answers with ordinary [`Command`]s,
//! which the game executes in the command phase of the same tick like any
//! player input. It never mutates the simulation directly.
//!
//! Every [`AI_UPDATE_INTERVAL`] ticks (offset per house) the bot
//! recomputes its military value, tidies up its units, and runs its build
//! and attack timers. Damage to its base is answered on the tick it
//! happens.

mod build;
pub mod placement;
pub mod settings;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::{Command, CommandType};
use crate::coord::Coord;
use crate::data::{HouseId, ItemId};
use crate::error::{GameError, Result};
use crate::game::{GameContext, GameEvent, GameMode, GameRng};
use crate::objects::{AttackMode, Attacker, GameObject, ObjectId, Targetable};
use crate::save::{InputStream, OutputStream};

pub use placement::find_place_location;
pub use settings::AI_UPDATE_INTERVAL;

use settings::{
    attack_delay, build_delay, harvester_limit, military_value_limit, scramble_cap, update_offset,
    ATTACK_HEALTH_PERCENT, ATTACK_TIMER_KILL_BONUS, ATTACK_TIMER_LOSS_PENALTY, RALLY_LEASH_TILES,
    RALLY_REFRESH_UPDATES, REPAIR_HEALTH_PERCENT, RETREAT_DELAY,
};

/// How hard a bot plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    /// Builds and defends, never attacks.
    Defend,
    /// Slow and small.
    Easy,
    /// Default.
    #[default]
    Medium,
    /// Fast and large.
    Hard,
    /// No holds barred.
    Brutal,
}

impl Difficulty {
    /// Every tier, weakest first.
    pub const ALL: [Self; 5] = [Self::Defend, Self::Easy, Self::Medium, Self::Hard, Self::Brutal];

    const fn as_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(usize::from(raw)).copied()
    }
}

/// Units a bot never sends into battle or onto defence.
const fn stays_home(item: ItemId) -> bool {
    item.is_civilian()
}

/// Commands gathered during one update. Each unit receives at most one
/// order so that later housekeeping cannot undo an earlier decision.
struct Orders {
    player: u8,
    commands: Vec<Command>,
    ordered: Vec<ObjectId>,
}

impl Orders {
    fn new(house: HouseId) -> Self {
        Self {
            player: Command::player_of(house),
            commands: Vec::new(),
            ordered: Vec::new(),
        }
    }

    fn has(&self, id: ObjectId) -> bool {
        self.ordered.contains(&id)
    }

    fn push(&mut self, id: ObjectId, command: Command) {
        self.ordered.push(id);
        self.commands.push(command);
    }

    fn move_to(&mut self, id: ObjectId, pos: Coord) {
        let command = Command::move_to(self.player, id, pos, false);
        self.push(id, command);
    }

    fn set_mode(&mut self, id: ObjectId, mode: AttackMode) {
        let command = Command::set_mode(self.player, id, mode);
        self.push(id, command);
    }

    fn on_object(&mut self, kind: CommandType, id: ObjectId) {
        let command = Command::on_object(self.player, kind, id);
        self.push(id, command);
    }
}

/// One computer player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantBot {
    house: HouseId,
    difficulty: Difficulty,
    mode: GameMode,
    rng: GameRng,
    initialized: bool,
    updates: u32,
    build_timer: u32,
    attack_timer: Option<u32>,
    retreat_timer: Option<u32>,
    initial_counts: Vec<u32>,
    initial_military_value: u32,
    military_value: u32,
    military_value_limit: u32,
    harvester_limit: u32,
    wave_value: u32,
    last_kills: u32,
    last_losses: u32,
    squad_rally: Coord,
    squad_retreat: Coord,
}

impl QuantBot {
    /// A bot for `house`. Its randomness is derived from the game seed and
    /// the house, so two bots never share a stream.
    #[must_use]
    pub fn new(house: HouseId, difficulty: Difficulty, mode: GameMode, seed: u64) -> Self {
        let stream = (house.index() as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self {
            house,
            difficulty,
            mode,
            rng: GameRng::new(seed ^ stream),
            initialized: false,
            updates: 0,
            build_timer: 0,
            attack_timer: None,
            retreat_timer: None,
            initial_counts: vec![0; ItemId::ALL.len()],
            initial_military_value: 0,
            military_value: 0,
            military_value_limit: 0,
            harvester_limit: 0,
            wave_value: 0,
            last_kills: 0,
            last_losses: 0,
            squad_rally: Coord::INVALID,
            squad_retreat: Coord::INVALID,
        }
    }

    /// House played.
    #[must_use]
    pub const fn house(&self) -> HouseId {
        self.house
    }

    /// Difficulty tier.
    #[must_use]
    pub const fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Harvester ceiling, known after the first update.
    #[must_use]
    pub const fn harvester_limit(&self) -> u32 {
        self.harvester_limit
    }

    /// Military value ceiling, known after the first update.
    #[must_use]
    pub const fn military_value_limit(&self) -> u32 {
        self.military_value_limit
    }

    /// Summed price of the combat units owned at the last update.
    #[must_use]
    pub const fn military_value(&self) -> u32 {
        self.military_value
    }

    /// Where idle units gather.
    #[must_use]
    pub const fn squad_rally(&self) -> Coord {
        self.squad_rally
    }

    /// Where a beaten wave falls back to.
    #[must_use]
    pub const fn squad_retreat(&self) -> Coord {
        self.squad_retreat
    }

    /// Ticks until the next attack wave, `None` if the bot never attacks.
    #[must_use]
    pub const fn attack_timer(&self) -> Option<u32> {
        self.attack_timer
    }

    /// Observe the game and decide this tick's commands.
    pub fn update(&mut self, ctx: &GameContext) -> Vec<Command> {
        let mut orders = Orders::new(self.house);
        if !ctx.house(self.house).active {
            return orders.commands;
        }

        self.respond_to_damage(ctx, &mut orders);

        if ctx.tick % AI_UPDATE_INTERVAL != update_offset(self.house) {
            return orders.commands;
        }
        if !self.initialized {
            self.initialize(ctx);
        }
        if self.updates % RALLY_REFRESH_UPDATES == 0 {
            self.compute_rally_points(ctx);
        }
        self.updates = self.updates.wrapping_add(1);
        self.military_value = military_value(ctx, self.house);
        self.pace_attacks(ctx);

        self.check_all_units(ctx, &mut orders);

        self.build_timer = self.build_timer.saturating_sub(AI_UPDATE_INTERVAL);
        if self.build_timer == 0 {
            self.build(ctx, &mut orders);
            let (base, jitter) = build_delay(self.difficulty);
            self.build_timer = base + self.jitter(jitter);
        }

        if let Some(timer) = self.attack_timer {
            let timer = timer.saturating_sub(AI_UPDATE_INTERVAL);
            if timer == 0 {
                self.attack(ctx, &mut orders);
                self.attack_timer = self.rearm_attack();
            } else {
                self.attack_timer = Some(timer);
            }
        }

        if let Some(timer) = self.retreat_timer {
            let timer = timer.saturating_sub(AI_UPDATE_INTERVAL);
            if timer == 0 {
                self.retreat_timer = None;
                self.check_retreat(ctx, &mut orders);
            } else {
                self.retreat_timer = Some(timer);
            }
        }

        orders.commands
    }

    fn jitter(&mut self, span: u32) -> u32 {
        let span = i32::try_from(span).unwrap_or(i32::MAX);
        u32::try_from(self.rng.rand_range(0, span)).unwrap_or(0)
    }

    fn rearm_attack(&mut self) -> Option<u32> {
        let (base, jitter) = attack_delay(self.difficulty)?;
        Some(base + self.jitter(jitter))
    }

    /// Snapshot starting counts and derive the ceilings.
    fn initialize(&mut self, ctx: &GameContext) {
        let house = ctx.house(self.house);
        self.initial_counts = ItemId::ALL.iter().map(|&item| house.count(item)).collect();
        self.initial_military_value = military_value(ctx, self.house);
        let tiles = u64::try_from(ctx.map.tile_count()).unwrap_or(0);
        self.harvester_limit = harvester_limit(self.difficulty, self.mode, tiles);
        self.military_value_limit =
            military_value_limit(self.difficulty, self.mode, tiles, self.initial_military_value);
        self.attack_timer = self.rearm_attack();
        self.last_kills = house.kills;
        self.last_losses = house.losses;
        self.initialized = true;
        info!(
            house = ?self.house,
            difficulty = ?self.difficulty,
            harvesters = self.harvester_limit,
            military = self.military_value_limit,
            "AI initialised"
        );
    }

    /// Kills bring the next wave forward, losses push it back.
    fn pace_attacks(&mut self, ctx: &GameContext) {
        let house = ctx.house(self.house);
        let kills = house.kills.saturating_sub(self.last_kills);
        let losses = house.losses.saturating_sub(self.last_losses);
        self.last_kills = house.kills;
        self.last_losses = house.losses;
        if let Some(timer) = self.attack_timer.as_mut() {
            *timer = timer
                .saturating_sub(kills * ATTACK_TIMER_KILL_BONUS)
                .saturating_add(losses * ATTACK_TIMER_LOSS_PENALTY)
                .max(AI_UPDATE_INTERVAL);
        }
    }

    // ===== Rally points =====

    fn compute_rally_points(&mut self, ctx: &GameContext) {
        let own = |o: &&GameObject| o.owner() == self.house && !o.base.departed && !o.is_off_map();
        let structures: Vec<Coord> = ctx
            .objects
            .iter()
            .map(|(_, o)| o)
            .filter(own)
            .filter(|o| o.is_structure())
            .map(|o| o.base.location)
            .collect();
        let anchors = if structures.is_empty() {
            ctx.objects
                .iter()
                .map(|(_, o)| o)
                .filter(own)
                .map(|o| o.base.location)
                .collect()
        } else {
            structures
        };
        let Some(base) = centroid(&anchors) else {
            return;
        };

        let enemy = ctx
            .objects
            .iter()
            .map(|(_, o)| o)
            .filter(|o| o.is_structure() && !ctx.same_team(o.owner(), self.house))
            .min_by_key(|o| (o.base.location.distance_squared(base), o.id()))
            .map(|o| o.base.location);
        let toward = enemy.unwrap_or_else(|| Coord::new(ctx.map.width() / 2, ctx.map.height() / 2));

        self.squad_retreat = base;
        self.squad_rally = Coord::new(base.x + (toward.x - base.x) / 3, base.y + (toward.y - base.y) / 3);
        debug!(house = ?self.house, rally = %self.squad_rally, retreat = %self.squad_retreat, "rally points");
    }

    // ===== Housekeeping =====

    /// Per-unit housekeeping: deploy MCVs, keep harvesters working, send
    /// wrecks for repair, keep fragile units out of reach of their
    /// counters and gather strays at the rally point.
    fn check_all_units(&mut self, ctx: &GameContext, orders: &mut Orders) {
        let has_repair_yard = ctx.house(self.house).has(ItemId::RepairYard);
        for (id, obj) in ctx.objects.iter() {
            if obj.owner() != self.house || !obj.is_unit() || obj.base.departed || obj.is_off_map() {
                continue;
            }
            if orders.has(id) {
                continue;
            }
            match obj.item() {
                ItemId::Mcv => self.check_mcv(ctx, obj, orders),
                ItemId::Harvester => check_harvester(obj, has_repair_yard, ctx, orders),
                ItemId::Carryall | ItemId::Frigate | ItemId::Sandworm => {}
                _ => self.check_combat_unit(ctx, obj, has_repair_yard, orders),
            }
        }
    }

    fn check_mcv(&mut self, ctx: &GameContext, mcv: &GameObject, orders: &mut Orders) {
        if is_moving(mcv) {
            return;
        }
        let size = ctx.rules.size(ItemId::ConstructionYard);
        if ctx.map.footprint_is_clear(mcv.base.location, size, Some(mcv.id())) {
            debug!(house = ?self.house, mcv = %mcv.id(), "deploying MCV");
            orders.on_object(CommandType::McvDeploy, mcv.id());
            return;
        }
        let spot = ctx
            .map
            .tiles_in_radius(mcv.base.location, 8)
            .into_iter()
            .filter(|&pos| ctx.map.footprint_is_clear(pos, size, Some(mcv.id())))
            .min_by_key(|&pos| (pos.distance_squared(mcv.base.location), pos.y, pos.x));
        if let Some(spot) = spot {
            orders.move_to(mcv.id(), spot);
        }
    }

    fn check_combat_unit(&mut self, ctx: &GameContext, obj: &GameObject, has_repair_yard: bool, orders: &mut Orders) {
        let id = obj.id();
        let mode = obj.base.attack_mode;

        // Borrowed from the enemy by a deviator: spend it on them.
        if obj.base.original_owner != self.house {
            if mode != AttackMode::Hunt {
                orders.set_mode(id, AttackMode::Hunt);
            }
            return;
        }

        let ground = obj.ground();
        let busy_with_logistics = ground.is_some_and(|g| g.awaiting_pickup || g.docked_at.is_some())
            || mode == AttackMode::CarryallRequested;
        if busy_with_logistics {
            return;
        }

        let max = obj.max_health(&ctx.rules);
        let heading_to_yard = obj
            .base
            .target
            .and_then(|t| ctx.objects.get(t))
            .is_some_and(|t| t.item() == ItemId::RepairYard && t.owner() == self.house);
        if has_repair_yard && ground.is_some() && !heading_to_yard && obj.base.health_below(max, REPAIR_HEALTH_PERCENT) {
            orders.on_object(CommandType::UnitSendToRepair, id);
            return;
        }
        if heading_to_yard {
            return;
        }

        if let Some(threat) = obj.base.target.and_then(|t| ctx.objects.get(t)) {
            if keeps_distance(obj.item(), threat.item()) && !obj.base.forced_target {
                let gap = threat.closest_point(obj.base.location).chebyshev_distance(obj.base.location);
                if gap < stand_off(obj.item()) && self.squad_retreat.is_valid() {
                    debug!(unit = %id, threat = %threat.id(), "falling back from counter");
                    orders.move_to(id, self.squad_retreat);
                    return;
                }
            }
        }

        let idle = obj.base.target.is_none() && !is_moving(obj) && !obj.base.destination.is_valid();
        if mode == AttackMode::Retreat && idle {
            orders.set_mode(id, AttackMode::AreaGuard);
            return;
        }
        let guarding = matches!(mode, AttackMode::Guard | AttackMode::AreaGuard);
        if guarding && idle && self.squad_rally.is_valid() {
            if obj.base.location.chebyshev_distance(self.squad_rally) > RALLY_LEASH_TILES {
                let spread = 2;
                let spot = Coord::new(
                    self.squad_rally.x + self.rng.rand_range(-spread, spread),
                    self.squad_rally.y + self.rng.rand_range(-spread, spread),
                );
                let spot = if ctx.map.contains(spot) { spot } else { self.squad_rally };
                orders.move_to(id, spot);
            }
        }
    }

    // ===== Attacks =====

    /// Send every fit combat unit hunting.
    fn attack(&mut self, ctx: &GameContext, orders: &mut Orders) {
        let mut sent = 0;
        for (id, obj) in ctx.objects.iter() {
            if !eligible_for_attack(ctx, obj, self.house) || orders.has(id) {
                continue;
            }
            if obj.base.attack_mode != AttackMode::Hunt {
                orders.set_mode(id, AttackMode::Hunt);
                sent += 1;
            }
        }
        if sent > 0 {
            self.wave_value = self.military_value;
            self.retreat_timer = Some(RETREAT_DELAY);
            info!(house = ?self.house, units = sent, "attack wave launched");
        }
    }

    /// A wave that lost more than half its value falls back.
    fn check_retreat(&mut self, ctx: &GameContext, orders: &mut Orders) {
        if self.military_value * 2 >= self.wave_value || !self.squad_retreat.is_valid() {
            return;
        }
        info!(house = ?self.house, value = self.military_value, "attack wave retreating");
        for (id, obj) in ctx.objects.iter() {
            if obj.owner() != self.house || obj.base.attack_mode != AttackMode::Hunt || orders.has(id) {
                continue;
            }
            if obj.base.original_owner != self.house {
                continue;
            }
            orders.set_mode(id, AttackMode::Retreat);
            orders
                .commands
                .push(Command::move_to(orders.player, id, self.squad_retreat, false));
        }
    }

    // ===== Defence =====

    fn respond_to_damage(&mut self, ctx: &GameContext, orders: &mut Orders) {
        let mut answered: Vec<ObjectId> = Vec::new();
        for event in &ctx.events {
            let GameEvent::Damaged {
                owner,
                item,
                damager: Some(damager),
                ..
            } = event
            else {
                continue;
            };
            if *owner != self.house || ctx.same_team(damager.owner, self.house) {
                continue;
            }
            // Combat units hit back on their own.
            if !(item.is_structure() || stays_home(*item)) || answered.contains(&damager.id) {
                continue;
            }
            answered.push(damager.id);
            let cap = scramble_cap(self.difficulty);
            self.scramble(ctx, damager.id, cap, orders);
        }
    }

    /// Send up to `max_units` idle combat units after `intruder`. `None`
    /// sends every one. Returns the commands issued.
    pub fn scramble_units_and_defend(
        &mut self,
        ctx: &GameContext,
        intruder: ObjectId,
        max_units: Option<usize>,
    ) -> Vec<Command> {
        let mut orders = Orders::new(self.house);
        self.scramble(ctx, intruder, max_units, &mut orders);
        orders.commands
    }

    fn scramble(&mut self, ctx: &GameContext, intruder: ObjectId, max_units: Option<usize>, orders: &mut Orders) -> usize {
        let Some(target) = ctx.objects.get(intruder) else {
            return 0;
        };
        if !target.can_be_targeted() {
            return 0;
        }
        let flying = target.is_flying();
        let at = target.base.location;

        let mut defenders: Vec<(i64, ObjectId)> = ctx
            .objects
            .iter()
            .filter(|(id, obj)| {
                obj.owner() == self.house
                    && obj.is_unit()
                    && !stays_home(obj.item())
                    && !obj.base.departed
                    && !obj.is_off_map()
                    && !obj.base.forced_move
                    && obj.base.target.is_none()
                    && !orders.has(*id)
                    && matches!(
                        obj.base.attack_mode,
                        AttackMode::Guard | AttackMode::AreaGuard | AttackMode::Ambush
                    )
                    && obj.weapon(&ctx.rules).is_some_and(|w| !flying || w.anti_air)
            })
            .map(|(id, obj)| (obj.base.location.distance_squared(at), id))
            .collect();
        defenders.sort_unstable();
        let cap = max_units.unwrap_or(usize::MAX);
        defenders.truncate(cap);

        for &(_, id) in &defenders {
            let command = Command::attack_object(orders.player, id, intruder, false);
            orders.push(id, command);
        }
        if !defenders.is_empty() {
            debug!(house = ?self.house, %intruder, defenders = defenders.len(), "scrambled");
        }
        defenders.len()
    }

    // ===== Save games =====

    pub(crate) fn save(&self, out: &mut OutputStream) {
        out.write_u8(self.house.index() as u8);
        out.write_u8(self.difficulty.as_u8());
        out.write_u8(match self.mode {
            GameMode::Campaign => 0,
            GameMode::Custom => 1,
        });
        out.write_u64(self.rng.seed());
        out.write_u128(self.rng.word_pos());
        out.write_bool(self.initialized);
        out.write_u32(self.updates);
        out.write_u32(self.build_timer);
        write_timer(out, self.attack_timer);
        write_timer(out, self.retreat_timer);
        out.write_len(self.initial_counts.len());
        self.initial_counts.iter().for_each(|&c| out.write_u32(c));
        out.write_u32(self.initial_military_value);
        out.write_u32(self.military_value);
        out.write_u32(self.military_value_limit);
        out.write_u32(self.harvester_limit);
        out.write_u32(self.wave_value);
        out.write_u32(self.last_kills);
        out.write_u32(self.last_losses);
        out.write_coord(self.squad_rally);
        out.write_coord(self.squad_retreat);
    }

    pub(crate) fn load(input: &mut InputStream<'_>) -> Result<Self> {
        let house = input.read_house("AI house")?;
        let raw = input.read_u8("AI difficulty")?;
        let difficulty =
            Difficulty::from_u8(raw).ok_or_else(|| GameError::CorruptSave(format!("unknown difficulty {raw}")))?;
        let mode = match input.read_u8("AI game mode")? {
            0 => GameMode::Campaign,
            1 => GameMode::Custom,
            other => return Err(GameError::CorruptSave(format!("unknown game mode {other}"))),
        };
        let seed = input.read_u64("AI rng seed")?;
        let word_pos = input.read_u128("AI rng position")?;
        let mut bot = Self::new(house, difficulty, mode, 0);
        bot.rng = GameRng::restore(seed, word_pos);
        bot.initialized = input.read_bool("AI initialised")?;
        bot.updates = input.read_u32("AI updates")?;
        bot.build_timer = input.read_u32("build timer")?;
        bot.attack_timer = read_timer(input, "attack timer")?;
        bot.retreat_timer = read_timer(input, "retreat timer")?;
        let len = input.read_len("initial counts", 4)?;
        if len != ItemId::ALL.len() {
            return Err(GameError::CorruptSave(format!("{len} initial counts")));
        }
        bot.initial_counts = (0..len)
            .map(|_| input.read_u32("initial count"))
            .collect::<Result<Vec<_>>>()?;
        bot.initial_military_value = input.read_u32("initial military value")?;
        bot.military_value = input.read_u32("military value")?;
        bot.military_value_limit = input.read_u32("military limit")?;
        bot.harvester_limit = input.read_u32("harvester limit")?;
        bot.wave_value = input.read_u32("wave value")?;
        bot.last_kills = input.read_u32("kills seen")?;
        bot.last_losses = input.read_u32("losses seen")?;
        bot.squad_rally = input.read_coord("rally point")?;
        bot.squad_retreat = input.read_coord("retreat point")?;
        Ok(bot)
    }
}

fn write_timer(out: &mut OutputStream, timer: Option<u32>) {
    out.write_bool(timer.is_some());
    out.write_u32(timer.unwrap_or(0));
}

fn read_timer(input: &mut InputStream<'_>, field: &'static str) -> Result<Option<u32>> {
    let running = input.read_bool(field)?;
    let value = input.read_u32(field)?;
    Ok(running.then_some(value))
}

// ===== Queries =====

fn centroid(points: &[Coord]) -> Option<Coord> {
    let n = i64::try_from(points.len()).ok().filter(|&n| n > 0)?;
    let (sx, sy) = points
        .iter()
        .fold((0i64, 0i64), |(sx, sy), p| (sx + i64::from(p.x), sy + i64::from(p.y)));
    Some(Coord::new(
        i32::try_from(sx / n).unwrap_or(0),
        i32::try_from(sy / n).unwrap_or(0),
    ))
}

fn is_moving(obj: &GameObject) -> bool {
    obj.as_unit().is_some_and(|u| u.motion.moving)
}

/// Summed price of the combat units `house` owns.
#[must_use]
pub fn military_value(ctx: &GameContext, house: HouseId) -> u32 {
    ctx.objects
        .iter()
        .filter(|(_, o)| o.owner() == house && o.is_unit() && !stays_home(o.item()))
        .map(|(_, o)| o.data(&ctx.rules).price)
        .sum()
}

/// Whether `obj` joins an attack wave of `house`.
#[must_use]
pub fn eligible_for_attack(ctx: &GameContext, obj: &GameObject, house: HouseId) -> bool {
    obj.owner() == house
        && obj.is_unit()
        && !stays_home(obj.item())
        && !obj.base.departed
        && !obj.is_off_map()
        && !obj.base.health_below(obj.max_health(&ctx.rules), ATTACK_HEALTH_PERCENT)
}

/// Fragile or long-range units that back away from what counters them.
const fn keeps_distance(unit: ItemId, threat: ItemId) -> bool {
    match unit {
        ItemId::Launcher | ItemId::Deviator => true,
        ItemId::Trike | ItemId::RaiderTrike | ItemId::Quad => matches!(
            threat,
            ItemId::Tank | ItemId::SiegeTank | ItemId::SonicTank | ItemId::Devastator | ItemId::RocketTurret
        ),
        _ => false,
    }
}

/// Closest a unit lets its counter come, in tiles.
const fn stand_off(unit: ItemId) -> i32 {
    match unit {
        ItemId::Launcher | ItemId::Deviator => 3,
        _ => 2,
    }
}

fn check_harvester(obj: &GameObject, has_repair_yard: bool, ctx: &GameContext, orders: &mut Orders) {
    let Some(ground) = obj.ground() else {
        return;
    };
    if ground.awaiting_pickup || ground.docked_at.is_some() || ground.picked_up {
        return;
    }
    let returning = obj.harvester().is_some_and(|h| h.returning);
    let max = obj.max_health(&ctx.rules);
    if has_repair_yard && !returning && obj.base.health_below(max, REPAIR_HEALTH_PERCENT / 2) {
        orders.on_object(CommandType::UnitSendToRepair, obj.id());
        return;
    }
    let idle = !is_moving(obj) && !obj.base.destination.is_valid() && obj.base.target.is_none();
    if idle && !returning && obj.base.attack_mode != AttackMode::Harvest {
        orders.set_mode(obj.id(), AttackMode::Harvest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Rules;
    use crate::game::{Game, GameSettings};
    use crate::map::{Map, TerrainType};

    fn settings(mode: GameMode) -> GameSettings {
        GameSettings { mode, seed: 11 }
    }

    fn skirmish() -> Game {
        let rules = Rules::standard().expect("rules");
        let mut map = Map::new(64, 64);
        map.fill_terrain(Coord::new(2, 2), Coord::new(20, 20), TerrainType::Rock, &rules);
        map.fill_terrain(Coord::new(42, 42), Coord::new(60, 60), TerrainType::Rock, &rules);
        map.fill_terrain(Coord::new(24, 24), Coord::new(38, 38), TerrainType::Spice, &rules);
        let mut game = Game::with_rules(map, rules, settings(GameMode::Custom));
        game.add_house(HouseId::Atreides, 0, 3000);
        game.add_house(HouseId::Harkonnen, 1, 3000);
        let ctx = game.context_mut();
        ctx.spawn_structure(ItemId::ConstructionYard, HouseId::Harkonnen, Coord::new(50, 50))
            .expect("harkonnen yard");
        ctx.spawn_structure(ItemId::ConstructionYard, HouseId::Atreides, Coord::new(8, 8))
            .expect("atreides yard");
        game
    }

    fn first_update(bot: &mut QuantBot, ctx: &mut GameContext) -> Vec<Command> {
        let GameContext { houses, objects, rules, .. } = ctx;
        crate::house::House::refresh_totals(houses, objects, rules);
        ctx.tick = update_offset(bot.house());
        bot.update(ctx)
    }

    #[test]
    fn test_limits_follow_tables() {
        let mut game = skirmish();
        let mut bot = QuantBot::new(HouseId::Harkonnen, Difficulty::Brutal, GameMode::Custom, 1);
        first_update(&mut bot, game.context_mut());
        assert_eq!(bot.harvester_limit(), 25);
        assert_eq!(bot.military_value_limit(), 60000);
        assert!(bot.attack_timer().is_some());
    }

    #[test]
    fn test_defend_never_attacks() {
        let mut game = skirmish();
        let mut bot = QuantBot::new(HouseId::Harkonnen, Difficulty::Defend, GameMode::Custom, 1);
        first_update(&mut bot, game.context_mut());
        assert_eq!(bot.attack_timer(), None);
    }

    #[test]
    fn test_updates_only_on_house_slot() {
        let mut game = skirmish();
        let mut bot = QuantBot::new(HouseId::Harkonnen, Difficulty::Medium, GameMode::Custom, 1);
        let ctx = game.context_mut();
        ctx.tick = update_offset(HouseId::Harkonnen) + 1;
        assert!(bot.update(ctx).is_empty());
        assert_eq!(bot.harvester_limit(), 0);
    }

    #[test]
    fn test_first_build_is_a_wind_trap() {
        let mut game = skirmish();
        let mut bot = QuantBot::new(HouseId::Harkonnen, Difficulty::Medium, GameMode::Custom, 1);
        let commands = first_update(&mut bot, game.context_mut());
        let wind_trap = ItemId::WindTrap.as_u32();
        assert!(commands
            .iter()
            .any(|c| c.kind() == Some(CommandType::BuilderProduceItem) && c.params[1] == wind_trap));
    }

    #[test]
    fn test_rally_point_lies_toward_enemy() {
        let mut game = skirmish();
        let mut bot = QuantBot::new(HouseId::Harkonnen, Difficulty::Medium, GameMode::Custom, 1);
        first_update(&mut bot, game.context_mut());
        assert_eq!(bot.squad_retreat(), Coord::new(50, 50));
        assert_eq!(bot.squad_rally(), Coord::new(36, 36));
    }

    #[test]
    fn test_scramble_respects_cap_and_distance() {
        let mut game = skirmish();
        let ctx = game.context_mut();
        let intruder = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(46, 46)).expect("intruder");
        let mut defenders = Vec::new();
        for i in 0..6 {
            defenders.push(
                ctx.spawn_unit(ItemId::Tank, HouseId::Harkonnen, Coord::new(47 + i, 52))
                    .expect("defender"),
            );
        }
        ctx.spawn_unit(ItemId::Harvester, HouseId::Harkonnen, Coord::new(45, 45))
            .expect("harvester");

        let mut bot = QuantBot::new(HouseId::Harkonnen, Difficulty::Defend, GameMode::Custom, 1);
        let commands = bot.scramble_units_and_defend(ctx, intruder, Some(4));
        assert_eq!(commands.len(), 4);
        for (command, defender) in commands.iter().zip(&defenders) {
            assert_eq!(command.kind(), Some(CommandType::UnitAttackObject));
            assert_eq!(command.params[0], defender.raw());
            assert_eq!(command.params[1], intruder.raw());
        }

        let all = bot.scramble_units_and_defend(ctx, intruder, None);
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_scramble_ignores_missing_intruder() {
        let mut game = skirmish();
        let mut bot = QuantBot::new(HouseId::Harkonnen, Difficulty::Hard, GameMode::Custom, 1);
        let ghost = ObjectId::from_raw(0x00FF_0001);
        assert!(bot.scramble_units_and_defend(game.context(), ghost, None).is_empty());
    }

    #[test]
    fn test_attack_skips_wounded_and_civilians() {
        let mut game = skirmish();
        let ctx = game.context_mut();
        let fit = ctx.spawn_unit(ItemId::Tank, HouseId::Harkonnen, Coord::new(52, 45)).expect("tank");
        let hurt = ctx.spawn_unit(ItemId::Tank, HouseId::Harkonnen, Coord::new(54, 45)).expect("tank");
        let harvester = ctx.spawn_unit(ItemId::Harvester, HouseId::Harkonnen, Coord::new(56, 45)).expect("harvester");
        let max = ctx.rules.get(ItemId::Tank).max_health();
        if let Some(obj) = ctx.objects.get_mut(hurt) {
            obj.base.health = max / 2;
        }
        assert!(eligible_for_attack(ctx, ctx.objects.get(fit).expect("fit"), HouseId::Harkonnen));
        assert!(!eligible_for_attack(ctx, ctx.objects.get(hurt).expect("hurt"), HouseId::Harkonnen));
        assert!(!eligible_for_attack(ctx, ctx.objects.get(harvester).expect("harvester"), HouseId::Harkonnen));
    }

    #[test]
    fn test_damage_to_base_scrambles_defenders() {
        let mut game = skirmish();
        let ctx = game.context_mut();
        let yard = ctx
            .objects
            .iter()
            .find(|(_, o)| o.owner() == HouseId::Harkonnen && o.item() == ItemId::ConstructionYard)
            .map(|(id, _)| id)
            .expect("yard");
        let raider = ctx.spawn_unit(ItemId::Quad, HouseId::Atreides, Coord::new(48, 48)).expect("quad");
        let guard = ctx.spawn_unit(ItemId::Tank, HouseId::Harkonnen, Coord::new(53, 53)).expect("tank");
        ctx.events.push(GameEvent::Damaged {
            id: yard,
            owner: HouseId::Harkonnen,
            item: ItemId::ConstructionYard,
            amount: crate::math::Fixed::from_num(10),
            damager: Some(crate::objects::Damager {
                id: raider,
                owner: HouseId::Atreides,
                item: ItemId::Quad,
            }),
        });
        ctx.tick = update_offset(HouseId::Harkonnen) + 1;

        let mut bot = QuantBot::new(HouseId::Harkonnen, Difficulty::Easy, GameMode::Custom, 1);
        let commands = bot.update(ctx);
        assert_eq!(commands, vec![Command::attack_object(
            Command::player_of(HouseId::Harkonnen),
            guard,
            raider,
            false
        )]);
    }

    #[test]
    fn test_bot_is_deterministic() {
        let run = || {
            let mut game = skirmish();
            game.add_ai_player(HouseId::Harkonnen, Difficulty::Hard);
            game.add_ai_player(HouseId::Atreides, Difficulty::Medium);
            game.run_ticks(2000);
            game.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_ai_game_grows_a_base() {
        let mut game = skirmish();
        game.add_ai_player(HouseId::Harkonnen, Difficulty::Brutal);
        game.run_ticks(3000);
        let house = game.context().house(HouseId::Harkonnen);
        assert!(house.structure_count() > 1, "AI never placed a structure");
    }
}
