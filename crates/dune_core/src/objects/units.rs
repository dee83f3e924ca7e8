//! Unit state and the per-tick unit update.

use std::collections::VecDeque;

use tracing::{debug, info};

use super::carryall::{self, CarryallState};
use super::harvester::{self, HarvesterState};
use super::infantry::{self, InfantryState};
use super::{combat, movement, AttackMode, Damager, GameObject, Movable};
use crate::coord::Coord;
use crate::data::{ItemId, Rules};
use crate::game::{GameContext, GameEvent};
use crate::map::{MoveClass, TerrainType};
use crate::math::{Fixed, Vec2Fixed};

/// Movement state shared by every unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Motion {
    /// Between two tiles.
    pub moving: bool,
    /// Arrived on a tile during this tick.
    pub just_stopped: bool,
    /// Pixel velocity of the current step.
    pub speed: Vec2Fixed,
    /// Speed cap for this tick, in pixels.
    pub current_max_speed: Fixed,
    /// Pixel position the current step ends at.
    pub move_target: Vec2Fixed,
    /// Pixel length of the current step.
    pub step_length: Fixed,
    /// Tile the current step started from.
    pub old_location: Coord,
    /// Remaining tiles of the planned path.
    pub path: VecDeque<Coord>,
    /// Ticks the next tile has been occupied.
    pub blocked_ticks: u32,
    /// Ticks to wait before searching for a path again.
    pub no_path_retry: u32,
    /// Consecutive failed path searches.
    pub failed_paths: u32,
    /// Facing the unit is turning towards.
    pub target_angle: Fixed,
    /// Cosmetic jitter on rough terrain. Never saved, never used for
    /// occupancy.
    pub bumpy_offset: Vec2Fixed,
}

impl Motion {
    /// Motion state at rest with the given cruising speed.
    #[must_use]
    pub fn new(max_speed: Fixed) -> Self {
        Self {
            moving: false,
            just_stopped: false,
            speed: Vec2Fixed::ZERO,
            current_max_speed: max_speed,
            move_target: Vec2Fixed::ZERO,
            step_length: Fixed::ZERO,
            old_location: Coord::INVALID,
            path: VecDeque::new(),
            blocked_ticks: 0,
            no_path_retry: 0,
            failed_paths: 0,
            target_angle: Fixed::ZERO,
            bumpy_offset: Vec2Fixed::ZERO,
        }
    }

    /// Come to rest on `pos`, forgetting any plan.
    pub fn reset(&mut self, pos: Coord) {
        self.moving = false;
        self.just_stopped = false;
        self.speed = Vec2Fixed::ZERO;
        self.old_location = pos;
        self.path.clear();
        self.blocked_ticks = 0;
        self.no_path_retry = 0;
        self.failed_paths = 0;
        self.bumpy_offset = Vec2Fixed::ZERO;
    }
}

/// Devastator self-destruct countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DevastatorState {
    /// Ticks until detonation, once started.
    pub timer: Option<u32>,
}

/// Sandworm hunger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SandwormState {
    /// Units left to eat before the worm sinks.
    pub appetite: u32,
    /// Ticks of rest after a meal.
    pub sleep: u32,
}

/// Ground unit variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroundKind {
    /// Soldier, trooper or saboteur.
    Infantry(InfantryState),
    /// Tracked vehicle; crushes infantry.
    Tracked,
    /// Wheeled vehicle.
    Wheeled,
    /// Spice harvester.
    Harvester(HarvesterState),
    /// Mobile construction vehicle.
    Mcv,
    /// Devastator.
    Devastator(DevastatorState),
    /// Neutral sandworm.
    Sandworm(SandwormState),
}

/// Ground unit state, including the carryall booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundUnit {
    /// A carryall is on its way; movement is suspended.
    pub awaiting_pickup: bool,
    /// Carryall booked for, or carrying, this unit.
    pub booked_carrier: Option<super::ObjectId>,
    /// In a carryall's cargo, off the map.
    pub picked_up: bool,
    /// Inside a refinery or repair yard.
    pub docked_at: Option<super::ObjectId>,
    /// Variant.
    pub kind: GroundKind,
}

/// Air unit variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AirKind {
    /// Transport.
    Carryall(CarryallState),
    /// Attack aircraft.
    Ornithopter,
    /// Delivery frigate.
    Frigate,
}

/// Air unit state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirUnit {
    /// Variant.
    pub kind: AirKind,
}

/// Ground or air.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitClass {
    /// Occupies tiles.
    Ground(GroundUnit),
    /// Flies over tiles.
    Air(AirUnit),
}

/// Unit-specific state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Movement.
    pub motion: Motion,
    /// Ticks until the weapon can fire again.
    pub weapon_timer: u32,
    /// Ticks until a deviated unit reverts to its original owner.
    pub deviation_timer: u32,
    /// Ticks until the next automatic target search.
    pub find_target_timer: u32,
    /// Ground or air.
    pub class: UnitClass,
}

impl Unit {
    /// Fresh unit state for `item`.
    #[must_use]
    pub fn new(item: ItemId, rules: &Rules) -> Self {
        let data = rules.get(item);
        let class = match item {
            ItemId::Carryall => UnitClass::Air(AirUnit {
                kind: AirKind::Carryall(CarryallState::new(true)),
            }),
            ItemId::Ornithopter => UnitClass::Air(AirUnit {
                kind: AirKind::Ornithopter,
            }),
            ItemId::Frigate => UnitClass::Air(AirUnit {
                kind: AirKind::Frigate,
            }),
            _ => {
                let kind = match item {
                    _ if item.is_infantry() => GroundKind::Infantry(InfantryState::default()),
                    ItemId::Harvester => GroundKind::Harvester(HarvesterState::default()),
                    ItemId::Mcv => GroundKind::Mcv,
                    ItemId::Devastator => GroundKind::Devastator(DevastatorState::default()),
                    ItemId::Sandworm => GroundKind::Sandworm(SandwormState {
                        appetite: rules.constants.sandworm_appetite,
                        sleep: 0,
                    }),
                    _ if item.is_tracked() => GroundKind::Tracked,
                    _ => GroundKind::Wheeled,
                };
                UnitClass::Ground(GroundUnit {
                    awaiting_pickup: false,
                    booked_carrier: None,
                    picked_up: false,
                    docked_at: None,
                    kind,
                })
            }
        };
        Self {
            motion: Motion::new(data.max_speed()),
            weapon_timer: 0,
            deviation_timer: 0,
            find_target_timer: 0,
            class,
        }
    }

    /// Whether this unit flies.
    #[must_use]
    pub const fn is_air(&self) -> bool {
        matches!(self.class, UnitClass::Air(_))
    }
}

// ===== Update =====

pub(super) fn update(obj: &mut GameObject, ctx: &mut GameContext) {
    if obj.is_off_map() {
        return;
    }
    let view_range = obj.data(&ctx.rules).view_range as i32;
    let team = ctx.team_of(obj.owner());
    ctx.map.view_map(team, obj.base.location, view_range, ctx.tick);
    refresh_visibility(obj, ctx);

    tick_timers(obj, ctx);
    if obj.base.is_dead() {
        return;
    }

    match obj.item() {
        ItemId::Carryall => {
            carryall::update(obj, ctx);
            return;
        }
        ItemId::Frigate => {
            update_frigate(obj, ctx);
            return;
        }
        ItemId::Ornithopter => {
            combat::update_attack(obj, ctx);
            movement::fly(obj, ctx);
            combat::try_fire(obj, ctx);
            return;
        }
        ItemId::Devastator if devastator_countdown(obj, ctx) => return,
        ItemId::Sandworm if !sandworm_update(obj, ctx) => return,
        _ => {}
    }

    if obj.base.attack_mode == AttackMode::CarryallRequested {
        retry_carryall_request(obj, ctx);
    }

    match obj.item() {
        ItemId::Harvester => harvester::update(obj, ctx),
        item if item.is_infantry() => infantry::update(obj, ctx),
        _ => {}
    }
    if obj.base.is_dead() || obj.base.departed {
        return;
    }
    movement::approach_dock(obj, ctx);
    combat::update_attack(obj, ctx);
    movement::update(obj, ctx);
    combat::try_fire(obj, ctx);

    if obj.as_unit().is_some_and(|u| u.motion.just_stopped) {
        on_arrival(obj, ctx);
    }
}

/// Recompute which teams can see this object.
pub(super) fn refresh_visibility(obj: &mut GameObject, ctx: &GameContext) {
    let timeout = ctx.rules.constants.fog_timeout;
    let mut bits = 0u8;
    for team in 0..crate::map::NUM_TEAMS {
        if ctx.map.is_visible(obj.base.location, team, ctx.tick, timeout) {
            bits |= 1 << team;
        }
    }
    obj.base.visible = bits;
}

fn tick_timers(obj: &mut GameObject, ctx: &mut GameContext) {
    let Some(unit) = obj.as_unit_mut() else {
        return;
    };
    unit.weapon_timer = unit.weapon_timer.saturating_sub(1);
    unit.find_target_timer = unit.find_target_timer.saturating_sub(1);
    if unit.deviation_timer > 0 {
        unit.deviation_timer -= 1;
        if unit.deviation_timer == 0 && obj.base.owner != obj.base.original_owner {
            let from = obj.base.owner;
            obj.base.owner = obj.base.original_owner;
            obj.base.clear_target();
            obj.base.attack_mode = obj.default_attack_mode();
            ctx.emit(GameEvent::Deviated {
                id: obj.id(),
                from,
                to: obj.base.owner,
            });
            debug!(id = %obj.id(), "deviation wore off");
        }
    }
}

fn retry_carryall_request(obj: &mut GameObject, ctx: &mut GameContext) {
    let waiting = obj
        .ground()
        .is_some_and(|g| !g.awaiting_pickup && !g.picked_up);
    if waiting && carryall::request_carryall(ctx, obj) {
        obj.base.attack_mode = carryall::default_mode_after_drop(obj.item());
    }
}

/// Effects of arriving on a tile: blooms erupt under the unit.
fn on_arrival(obj: &mut GameObject, ctx: &mut GameContext) {
    let pos = obj.base.location;
    let Some(terrain) = ctx.map.terrain(pos) else {
        return;
    };
    if !terrain.is_bloom() || obj.move_class() == MoveClass::Air {
        return;
    }
    let special = terrain == TerrainType::SpecialBloom;
    let rules = ctx.rules.clone();
    ctx.map.set_terrain(pos, TerrainType::Sand, &rules);
    if special {
        let credits = Fixed::from_num(rules.constants.special_bloom_credits);
        ctx.house_mut(obj.owner()).add_credits(credits);
    } else {
        let GameContext { map, rng, .. } = ctx;
        map.spread_spice(pos, rules.constants.bloom_radius, &rules, rng);
        let damage = Fixed::from_num(rules.constants.bloom_damage);
        obj.handle_damage(ctx, damage, None);
    }
    ctx.emit(GameEvent::SpiceBloom {
        location: pos,
        special,
    });
    info!(%pos, special, "spice bloom");
}

/// Returns true once the devastator has detonated.
fn devastator_countdown(obj: &mut GameObject, ctx: &mut GameContext) -> bool {
    let Some(GroundKind::Devastator(state)) = obj.ground_mut().map(|g| &mut g.kind) else {
        return false;
    };
    let Some(timer) = state.timer.as_mut() else {
        return false;
    };
    if *timer > 0 {
        *timer -= 1;
        return false;
    }
    state.timer = None;

    let center = obj.base.location;
    let damage = Fixed::from_num(ctx.rules.constants.devastate_damage);
    let damager = Some(Damager {
        id: obj.id(),
        owner: obj.owner(),
        item: obj.item(),
    });
    info!(id = %obj.id(), %center, "devastator detonates");
    let mut victims = Vec::new();
    for y in center.y - 1..=center.y + 1 {
        for x in center.x - 1..=center.x + 1 {
            if let Some(tile) = ctx.map.tile(Coord::new(x, y)) {
                victims.extend(tile.all_objects().filter(|&id| id != obj.id()));
            }
        }
    }
    victims.sort();
    victims.dedup();
    for victim in victims {
        ctx.damage_object(victim, damage, damager);
    }
    ctx.emit(GameEvent::Explosion {
        position: obj.base.real,
    });
    let health = obj.base.health;
    obj.handle_damage(ctx, health, None);
    true
}

/// Start a devastator's self-destruct countdown. Returns false for other units.
pub(crate) fn start_devastate(obj: &mut GameObject, rules: &Rules) -> bool {
    match obj.ground_mut().map(|g| &mut g.kind) {
        Some(GroundKind::Devastator(state)) => {
            if state.timer.is_none() {
                state.timer = Some(rules.constants.devastate_ticks);
            }
            true
        }
        _ => false,
    }
}

/// Returns false when the worm should skip the rest of its update.
fn sandworm_update(obj: &mut GameObject, ctx: &mut GameContext) -> bool {
    let Some(GroundKind::Sandworm(state)) = obj.ground_mut().map(|g| &mut g.kind) else {
        return true;
    };
    if state.appetite == 0 {
        debug!(id = %obj.id(), "sandworm sinks");
        obj.base.departed = true;
        return false;
    }
    if state.sleep > 0 {
        state.sleep -= 1;
        return false;
    }
    // Wander when there is nothing to eat.
    let idle = obj.base.target.is_none()
        && !obj.as_unit().is_some_and(|u| u.motion.moving)
        && !obj.base.destination.is_valid();
    if idle && ctx.rng.rand_range(0, 99) < 5 {
        let spot = crate::game::random_nearby_spot(ctx, MoveClass::Sandworm, obj.base.location, 2, 8);
        if spot.is_valid() {
            obj.do_move_to_pos(ctx, spot, false);
        }
    }
    true
}

/// Called after a worm swallows a unit.
pub(super) fn sandworm_ate(obj: &mut GameObject, rest_ticks: u32) {
    if let Some(GroundKind::Sandworm(state)) = obj.ground_mut().map(|g| &mut g.kind) {
        state.appetite = state.appetite.saturating_sub(1);
        state.sleep = rest_ticks;
    }
}

/// Frigates fly to their destination and leave once it lies on the map edge.
fn update_frigate(obj: &mut GameObject, ctx: &mut GameContext) {
    let dest = obj.base.destination;
    movement::fly(obj, ctx);
    if dest.is_valid() && obj.base.location == dest && is_edge(ctx, dest) {
        obj.base.departed = true;
    }
}

/// Whether `pos` lies on the outer ring of the map.
pub(crate) fn is_edge(ctx: &GameContext, pos: Coord) -> bool {
    pos.x == 0 || pos.y == 0 || pos.x == ctx.map.width() - 1 || pos.y == ctx.map.height() - 1
}

/// Nearest map-edge tile to `pos`.
pub(crate) fn nearest_edge(ctx: &GameContext, pos: Coord) -> Coord {
    let w = ctx.map.width();
    let h = ctx.map.height();
    let candidates = [
        (pos.x, Coord::new(0, pos.y)),
        (w - 1 - pos.x, Coord::new(w - 1, pos.y)),
        (pos.y, Coord::new(pos.x, 0)),
        (h - 1 - pos.y, Coord::new(pos.x, h - 1)),
    ];
    candidates
        .into_iter()
        .min_by_key(|(d, _)| *d)
        .map_or(Coord::ZERO, |(_, c)| c)
}

/// Convert a unit to `new_owner` for the deviation period.
pub(crate) fn deviate(obj: &mut GameObject, ctx: &mut GameContext, new_owner: crate::data::HouseId) {
    if obj.owner() == new_owner || obj.is_structure() {
        return;
    }
    let ticks = ctx.rules.constants.deviation_ticks;
    let from = obj.owner();
    obj.base.owner = new_owner;
    obj.base.clear_target();
    obj.base.attack_mode = obj.default_attack_mode();
    if let Some(unit) = obj.as_unit_mut() {
        unit.deviation_timer = ticks;
    }
    ctx.emit(GameEvent::Deviated {
        id: obj.id(),
        from,
        to: new_owner,
    });
    info!(id = %obj.id(), ?from, to = ?new_owner, "unit deviated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HouseId;
    use crate::game::GameSettings;
    use crate::map::Map;

    fn context() -> GameContext {
        let mut ctx = GameContext::new(Map::new(24, 24), Rules::standard().expect("rules"), GameSettings::default());
        for house in HouseId::ALL {
            ctx.house_mut(house).active = true;
        }
        ctx
    }

    #[test]
    fn test_unit_classes() {
        let rules = Rules::standard().expect("rules");
        assert!(Unit::new(ItemId::Carryall, &rules).is_air());
        assert!(matches!(
            Unit::new(ItemId::Tank, &rules).class,
            UnitClass::Ground(GroundUnit {
                kind: GroundKind::Tracked,
                ..
            })
        ));
        assert!(matches!(
            Unit::new(ItemId::Trike, &rules).class,
            UnitClass::Ground(GroundUnit {
                kind: GroundKind::Wheeled,
                ..
            })
        ));
    }

    #[test]
    fn test_deviation_reverts() {
        let mut ctx = context();
        let id = ctx
            .spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(5, 5))
            .expect("spawn");
        ctx.with_object(id, |obj, ctx| deviate(obj, ctx, HouseId::Ordos));
        assert_eq!(ctx.objects.get(id).map(GameObject::owner), Some(HouseId::Ordos));
        for _ in 0..ctx.rules.constants.deviation_ticks {
            ctx.with_object(id, |obj, ctx| obj.update(ctx));
        }
        let obj = ctx.objects.get(id).expect("alive");
        assert_eq!(obj.owner(), HouseId::Atreides);
        assert_eq!(obj.base.original_owner, HouseId::Atreides);
    }

    #[test]
    fn test_devastator_detonates() {
        let mut ctx = context();
        let dev = ctx
            .spawn_unit(ItemId::Devastator, HouseId::Harkonnen, Coord::new(8, 8))
            .expect("spawn");
        let victim = ctx
            .spawn_unit(ItemId::Trike, HouseId::Atreides, Coord::new(9, 8))
            .expect("spawn");
        let rules = ctx.rules.clone();
        ctx.with_object(dev, |obj, _| assert!(start_devastate(obj, &rules)));
        for _ in 0..=rules.constants.devastate_ticks {
            ctx.with_object(dev, |obj, ctx| obj.update(ctx));
        }
        assert!(ctx.objects.get(dev).is_some_and(|o| o.base.is_dead()));
        assert!(ctx.objects.get(victim).is_some_and(|o| o.base.is_dead()));
    }

    #[test]
    fn test_bloom_erupts_on_arrival() {
        let mut ctx = context();
        let rules = ctx.rules.clone();
        ctx.map.set_terrain(Coord::new(6, 5), TerrainType::SpiceBloom, &rules);
        let id = ctx
            .spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(5, 5))
            .expect("spawn");
        ctx.with_object(id, |obj, ctx| obj.do_move_to_pos(ctx, Coord::new(6, 5), true));
        for _ in 0..80 {
            ctx.with_object(id, |obj, ctx| obj.update(ctx));
        }
        assert_eq!(ctx.map.terrain(Coord::new(6, 5)), Some(TerrainType::Spice));
        let obj = ctx.objects.get(id).expect("alive");
        assert!(obj.base.health < obj.max_health(&rules));
    }

    #[test]
    fn test_nearest_edge() {
        let ctx = context();
        assert_eq!(nearest_edge(&ctx, Coord::new(2, 10)), Coord::new(0, 10));
        assert_eq!(nearest_edge(&ctx, Coord::new(12, 22)), Coord::new(12, 23));
        assert!(is_edge(&ctx, Coord::new(23, 4)));
    }
}
