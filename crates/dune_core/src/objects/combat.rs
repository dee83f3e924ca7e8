//! Targeting and damage.
//!
//! Targets are searched tile by tile, nearest first, skipping tiles the
//! searcher's team cannot currently see. Walls and carryalls are only
//! chosen when nothing else in range qualifies.

use tracing::{debug, info};

use super::{
    carryall, units, AttackMode, Attacker, Damager, GameObject, Movable, ObjectId, ObjectKind,
    Targetable,
};
use crate::coord::Coord;
use crate::data::{ItemId, Rules, WeaponData};
use crate::game::{GameContext, GameEvent};
use crate::math::Fixed;

/// Ticks between automatic target searches of an idle unit.
pub const TARGET_SEARCH_INTERVAL: u32 = 10;

/// Targets only chosen when nothing better is in range.
const fn is_low_priority(item: ItemId) -> bool {
    matches!(item, ItemId::Wall | ItemId::Carryall)
}

// ===== Damage =====

pub(super) fn handle_damage(
    obj: &mut GameObject,
    ctx: &mut GameContext,
    amount: Fixed,
    damager: Option<Damager>,
) {
    if obj.base.is_dead() || amount <= Fixed::ZERO {
        return;
    }
    let applied = amount.min(obj.base.health);
    obj.base.health -= applied;

    if let Some(damager) = damager {
        ctx.house_mut(damager.owner).record_damage_dealt(damager.item, applied);
        if damager.id != obj.id() {
            obj.base.last_attacker = Some(damager.id);
        }
    }
    ctx.emit(GameEvent::Damaged {
        id: obj.id(),
        owner: obj.owner(),
        item: obj.item(),
        amount: applied,
        damager,
    });

    let max = obj.max_health(&ctx.rules);
    let badly_percent = ctx.rules.constants.badly_damaged_percent as i32;
    if !obj.base.badly_damaged && obj.base.health_below(max, badly_percent) {
        obj.base.badly_damaged = true;
        ctx.emit(GameEvent::BadlyDamaged {
            id: obj.id(),
            owner: obj.owner(),
        });
    }

    if obj.base.is_dead() {
        // Bookkeeping happens now; the object is removed at the end of the phase.
        let price = obj.data(&ctx.rules).price;
        ctx.house_mut(obj.owner()).record_loss(obj.item(), price);
        let killer = damager.map(|d| d.owner);
        if let Some(killer) = killer.filter(|&k| k != obj.owner()) {
            ctx.house_mut(killer).kills += 1;
        }
        ctx.emit(GameEvent::Destroyed {
            id: obj.id(),
            item: obj.item(),
            owner: obj.owner(),
            killer,
            location: obj.base.location,
        });
        info!(id = %obj.id(), item = %obj.item(), ?killer, "object destroyed");
    }
}

pub(super) fn set_target(obj: &mut GameObject, ctx: &mut GameContext, target: Option<ObjectId>) {
    if obj.base.target != target && obj.ground().is_some_and(|g| g.awaiting_pickup) {
        carryall::cancel_booking(obj, ctx);
    }
    obj.base.target = target;
    obj.base.target_friendly = target
        .and_then(|t| ctx.objects.get(t))
        .is_some_and(|t| ctx.same_team(t.owner(), obj.owner()));
    obj.base.forced_target = false;
    obj.base.attack_pos = Coord::INVALID;
}

// ===== Capabilities =====

impl Targetable for GameObject {
    fn closest_point(&self, from: Coord) -> Coord {
        let loc = self.base.location;
        let (w, h) = self.size();
        Coord::new(from.x.clamp(loc.x, loc.x + w - 1), from.y.clamp(loc.y, loc.y + h - 1))
    }

    fn center_pixel(&self) -> crate::math::Vec2Fixed {
        self.base.real
    }

    fn is_flying(&self) -> bool {
        self.item().is_air()
    }

    fn can_be_targeted(&self) -> bool {
        self.base.active && !self.base.is_dead() && !self.base.departed && !self.is_off_map()
    }
}

impl Attacker for GameObject {
    fn weapon<'r>(&self, rules: &'r Rules) -> Option<&'r WeaponData> {
        self.data(rules).weapon.as_ref()
    }

    fn can_attack(&self, ctx: &GameContext, target: &GameObject) -> bool {
        if target.id() == self.id() || !target.can_be_targeted() {
            return false;
        }
        let team = ctx.team_of(self.owner());
        let enemy = ctx.team_of(target.owner()) != team || target.item() == ItemId::Sandworm;
        let visible = ctx.map.is_visible(
            target.closest_point(self.base.location),
            team,
            ctx.tick,
            ctx.rules.constants.fog_timeout,
        );

        match self.item() {
            ItemId::Saboteur => return enemy && visible && target.is_structure(),
            ItemId::Sandworm => {
                return target.ground().is_some()
                    && target.item() != ItemId::Sandworm
                    && ctx
                        .map
                        .terrain(target.base.location)
                        .is_some_and(|t| t.is_sand());
            }
            _ => {}
        }

        let Some(weapon) = self.weapon(&ctx.rules) else {
            return false;
        };
        if !enemy || !visible {
            return false;
        }
        if target.is_flying() && !weapon.anti_air {
            return false;
        }
        match (self.item(), target.item()) {
            (ItemId::SonicTank, ItemId::SonicTank) => false,
            (ItemId::Deviator, item) => {
                target.is_unit()
                    && item != ItemId::Sandworm
                    && target.owner() == target.base.original_owner
            }
            _ => true,
        }
    }

    fn search_radius(&self, rules: &Rules) -> Option<i32> {
        let data = self.data(rules);
        let range = data.weapon_range();
        if self.is_structure() {
            return (range > 0).then_some(range);
        }
        match self.base.attack_mode {
            AttackMode::Guard => Some(range),
            AttackMode::AreaGuard => Some(range * 2),
            AttackMode::Ambush => Some(data.view_range as i32),
            AttackMode::Hunt => Some(i32::MAX),
            _ => None,
        }
    }
}

// ===== Target search =====

/// Closest target `searcher` may attack under its current mode, or `None`.
///
/// Hunt mode considers every object on the map. Other modes scan tiles
/// within the mode's radius nearest first and skip fogged tiles. Walls and
/// carryalls are returned only when no other target qualifies.
#[must_use]
pub fn find_target(ctx: &GameContext, searcher: &GameObject) -> Option<ObjectId> {
    let radius = searcher.search_radius(&ctx.rules)?;
    if radius == i32::MAX {
        return hunt_target(ctx, searcher);
    }

    let team = ctx.team_of(searcher.owner());
    let timeout = ctx.rules.constants.fog_timeout;
    let senses = searcher.item() == ItemId::Sandworm;
    let mut fallback = None;
    for pos in ctx.map.tiles_in_radius(searcher.base.location, radius) {
        if !senses && !ctx.map.is_visible(pos, team, ctx.tick, timeout) {
            continue;
        }
        let Some(tile) = ctx.map.tile(pos) else {
            continue;
        };
        for id in tile.all_objects() {
            let Some(candidate) = ctx.objects.get(id) else {
                continue;
            };
            if !searcher.can_attack(ctx, candidate) {
                continue;
            }
            if is_low_priority(candidate.item()) {
                fallback.get_or_insert(id);
            } else {
                return Some(id);
            }
        }
    }
    fallback
}

fn hunt_target(ctx: &GameContext, searcher: &GameObject) -> Option<ObjectId> {
    let from = searcher.base.location;
    ctx.objects
        .iter()
        .filter(|(_, candidate)| searcher.can_attack(ctx, candidate))
        .min_by_key(|(id, candidate)| {
            (
                is_low_priority(candidate.item()),
                candidate.closest_point(from).distance_squared(from),
                *id,
            )
        })
        .map(|(id, _)| id)
}

// ===== Engagement =====

fn in_range(obj: &GameObject, target: &GameObject, rules: &Rules) -> bool {
    let range = obj.data(rules).weapon_range().max(1);
    let point = target.closest_point(obj.base.location);
    point.distance_squared(obj.base.location) <= i64::from(range) * i64::from(range)
}

/// Keep the target valid, pick a new one when idle, and chase or hold.
pub(super) fn update_attack(obj: &mut GameObject, ctx: &mut GameContext) {
    if let Some(target) = obj.base.target {
        let valid = ctx.objects.get(target).is_some_and(GameObject::can_be_targeted);
        if !valid {
            obj.base.clear_target();
        }
    }
    if obj.base.target_friendly {
        return;
    }

    if obj.base.target.is_none()
        && !obj.base.attack_pos.is_valid()
        && !obj.base.forced_move
        && obj.base.attack_mode.searches_targets()
    {
        acquire_target(obj, ctx);
    }

    if let Some(target) = obj.base.target {
        engage(obj, ctx, target);
    } else if obj.base.attack_pos.is_valid() {
        let pos = obj.base.attack_pos;
        let range = obj.data(&ctx.rules).weapon_range();
        let close = pos.distance_squared(obj.base.location) <= i64::from(range) * i64::from(range);
        if close {
            obj.stop_moving();
        } else if obj.base.destination != pos {
            obj.base.destination = pos;
            clear_path(obj);
        }
    } else if obj.base.attack_mode == AttackMode::AreaGuard && !obj.base.destination.is_valid() {
        // Drift back after a chase.
        let leash = obj.data(&ctx.rules).weapon_range() * 2;
        let guard = obj.base.guard_point;
        if guard.is_valid() && guard.chebyshev_distance(obj.base.location) > leash {
            obj.base.destination = guard;
            clear_path(obj);
        }
    }
}

fn acquire_target(obj: &mut GameObject, ctx: &mut GameContext) {
    if let Some(attacker) = obj.base.last_attacker.take() {
        let retaliate = ctx
            .objects
            .get(attacker)
            .is_some_and(|a| obj.can_attack(ctx, a));
        if retaliate {
            debug!(id = %obj.id(), %attacker, "retaliating");
            obj.set_target(ctx, Some(attacker));
            return;
        }
    }
    let Some(unit) = obj.as_unit_mut() else {
        return;
    };
    if unit.find_target_timer > 0 {
        return;
    }
    unit.find_target_timer = TARGET_SEARCH_INTERVAL;
    if let Some(found) = find_target(ctx, obj) {
        obj.set_target(ctx, Some(found));
        if obj.base.attack_mode == AttackMode::Ambush {
            obj.base.attack_mode = AttackMode::Hunt;
        }
    }
}

fn engage(obj: &mut GameObject, ctx: &mut GameContext, target: ObjectId) {
    let Some(target_obj) = ctx.objects.get(target) else {
        return;
    };
    let close = in_range(obj, target_obj, &ctx.rules);
    let closest = target_obj.closest_point(obj.base.location);
    let moving = obj.as_unit().is_some_and(|u| u.motion.moving);

    // Capturing infantry and saboteurs close in instead of shooting.
    let closes_in = obj.base.attack_mode == AttackMode::Capture || obj.item() == ItemId::Saboteur;
    if close && !closes_in && obj.data(&ctx.rules).weapon.is_some() {
        if !moving && obj.base.destination.is_valid() {
            obj.stop_moving();
        }
        return;
    }

    let chases = obj.base.forced_target
        || matches!(
            obj.base.attack_mode,
            AttackMode::Hunt | AttackMode::AreaGuard | AttackMode::Capture
        );
    if !chases {
        obj.base.clear_target();
        return;
    }
    if obj.base.attack_mode == AttackMode::AreaGuard && !obj.base.forced_target {
        let leash = obj.data(&ctx.rules).weapon_range() * 2;
        let guard = obj.base.guard_point;
        if guard.is_valid() && guard.chebyshev_distance(closest) > leash.max(1) * 2 {
            obj.base.clear_target();
            return;
        }
    }
    let dest = obj.base.destination;
    if !dest.is_valid() || dest.chebyshev_distance(closest) > 1 {
        obj.base.destination = closest;
        clear_path(obj);
    }
}

fn clear_path(obj: &mut GameObject) {
    if let Some(unit) = obj.as_unit_mut() {
        unit.motion.path.clear();
        unit.motion.failed_paths = 0;
    }
}

fn weapon_timer_mut(obj: &mut GameObject) -> &mut u32 {
    match &mut obj.kind {
        ObjectKind::Unit(unit) => &mut unit.weapon_timer,
        ObjectKind::Structure(structure) => &mut structure.weapon_timer,
    }
}

/// Fire at the target or attack position once the weapon is ready.
pub(super) fn try_fire(obj: &mut GameObject, ctx: &mut GameContext) {
    if *weapon_timer_mut(obj) > 0
        || obj.base.target_friendly
        || obj.base.attack_mode == AttackMode::Capture
    {
        return;
    }
    let Some(weapon) = obj.weapon(&ctx.rules).cloned() else {
        return;
    };
    let damager = Some(Damager {
        id: obj.id(),
        owner: obj.owner(),
        item: obj.item(),
    });

    if let Some(target) = obj.base.target {
        let Some(target_obj) = ctx.objects.get(target) else {
            return;
        };
        if !in_range(obj, target_obj, &ctx.rules) {
            return;
        }
        let forced = obj.base.forced_target;
        if !forced && !obj.can_attack(ctx, target_obj) {
            return;
        }
        let position = target_obj.center_pixel();
        *weapon_timer_mut(obj) = weapon.reload;
        match obj.item() {
            ItemId::Deviator => {
                let owner = obj.owner();
                ctx.with_object(target, |victim, ctx| units::deviate(victim, ctx, owner));
                obj.base.clear_target();
            }
            ItemId::Sandworm => {
                debug!(worm = %obj.id(), %target, "sandworm strikes");
                ctx.kill_object(target, damager);
                units::sandworm_ate(obj, weapon.reload);
                obj.base.clear_target();
            }
            _ => {
                ctx.damage_object(target, Fixed::from_num(weapon.damage), damager);
            }
        }
        ctx.emit(GameEvent::Explosion { position });
        return;
    }

    let pos = obj.base.attack_pos;
    if !pos.is_valid() {
        return;
    }
    let range = i64::from(obj.data(&ctx.rules).weapon_range());
    if pos.distance_squared(obj.base.location) > range * range {
        return;
    }
    *weapon_timer_mut(obj) = weapon.reload;
    let victims: Vec<ObjectId> = ctx
        .map
        .tile(pos)
        .map(|t| t.ground_objects().filter(|&id| id != obj.id()).collect())
        .unwrap_or_default();
    for victim in victims {
        ctx.damage_object(victim, Fixed::from_num(weapon.damage), damager);
    }
    ctx.emit(GameEvent::Explosion {
        position: pos.tile_center(),
    });
}

/// Turret behaviour: hold a target in range, find a new one otherwise, fire.
pub(super) fn update_turret(obj: &mut GameObject, ctx: &mut GameContext) {
    {
        let timer = weapon_timer_mut(obj);
        *timer = timer.saturating_sub(1);
    }
    let keep = obj.base.target.and_then(|t| ctx.objects.get(t)).is_some_and(|t| {
        t.can_be_targeted() && (obj.base.forced_target || obj.can_attack(ctx, t)) && in_range(obj, t, &ctx.rules)
    });
    if !keep {
        obj.base.clear_target();
        if let Some(found) = find_target(ctx, obj) {
            obj.set_target(ctx, Some(found));
        }
    }
    try_fire(obj, ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HouseId;
    use crate::game::GameSettings;
    use crate::map::Map;

    fn context() -> GameContext {
        GameContext::new(Map::new(32, 32), Rules::standard().expect("rules"), GameSettings::default())
    }

    fn reveal(ctx: &mut GameContext, house: HouseId) {
        let team = ctx.team_of(house);
        ctx.map.view_map(team, Coord::new(16, 16), 40, ctx.tick);
    }

    #[test]
    fn test_health_floors_at_zero() {
        let mut ctx = context();
        let id = ctx.spawn_unit(ItemId::Trike, HouseId::Ordos, Coord::new(3, 3)).expect("spawn");
        ctx.damage_object(id, Fixed::from_num(60), None);
        ctx.damage_object(id, Fixed::from_num(60), None);
        ctx.damage_object(id, Fixed::from_num(60), None);
        let obj = ctx.objects.get(id).expect("not yet reaped");
        assert_eq!(obj.base.health, Fixed::ZERO);
        // Death recorded once.
        assert_eq!(ctx.house(HouseId::Ordos).losses, 1);
    }

    #[test]
    fn test_kill_attribution() {
        let mut ctx = context();
        let victim = ctx.spawn_unit(ItemId::Trike, HouseId::Ordos, Coord::new(3, 3)).expect("spawn");
        let shooter = ctx.spawn_unit(ItemId::Tank, HouseId::Harkonnen, Coord::new(5, 3)).expect("spawn");
        let damager = Damager {
            id: shooter,
            owner: HouseId::Harkonnen,
            item: ItemId::Tank,
        };
        ctx.damage_object(victim, Fixed::from_num(500), Some(damager));
        assert_eq!(ctx.house(HouseId::Harkonnen).kills, 1);
        assert_eq!(ctx.house(HouseId::Harkonnen).damage_dealt_by(ItemId::Tank), 100);
        assert_eq!(ctx.house(HouseId::Ordos).value_lost_of(ItemId::Trike), 150);
        assert!(ctx.events.iter().any(|e| matches!(
            e,
            GameEvent::Destroyed { killer: Some(HouseId::Harkonnen), .. }
        )));
    }

    #[test]
    fn test_badly_damaged_crossing_fires_once() {
        let mut ctx = context();
        let id = ctx.spawn_unit(ItemId::Tank, HouseId::Ordos, Coord::new(3, 3)).expect("spawn");
        ctx.damage_object(id, Fixed::from_num(200), None);
        ctx.damage_object(id, Fixed::from_num(10), None);
        let crossings = ctx
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::BadlyDamaged { .. }))
            .count();
        assert_eq!(crossings, 1);
        assert!(ctx.objects.get(id).is_some_and(|o| o.base.badly_damaged));
    }

    #[test]
    fn test_walls_are_last_resort() {
        let mut ctx = context();
        reveal(&mut ctx, HouseId::Atreides);
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(10, 10)).expect("spawn");
        let wall = ctx
            .spawn_structure(ItemId::Wall, HouseId::Harkonnen, Coord::new(11, 10))
            .expect("place");
        let trike = ctx.spawn_unit(ItemId::Trike, HouseId::Harkonnen, Coord::new(14, 10)).expect("spawn");

        let searcher = ctx.objects.get(tank).expect("alive");
        assert_eq!(find_target(&ctx, searcher), Some(trike));

        ctx.kill_object(trike, None);
        ctx.reap();
        let searcher = ctx.objects.get(tank).expect("alive");
        assert_eq!(find_target(&ctx, searcher), Some(wall));
    }

    #[test]
    fn test_fogged_targets_are_skipped() {
        let mut ctx = context();
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(10, 10)).expect("spawn");
        ctx.spawn_unit(ItemId::Trike, HouseId::Harkonnen, Coord::new(12, 10)).expect("spawn");
        let searcher = ctx.objects.get(tank).expect("alive");
        assert_eq!(find_target(&ctx, searcher), None);
    }

    #[test]
    fn test_attack_rules() {
        let mut ctx = context();
        reveal(&mut ctx, HouseId::Atreides);
        reveal(&mut ctx, HouseId::Ordos);
        let sonic = ctx.spawn_unit(ItemId::SonicTank, HouseId::Atreides, Coord::new(4, 4)).expect("spawn");
        let enemy_sonic = ctx.spawn_unit(ItemId::SonicTank, HouseId::Ordos, Coord::new(6, 4)).expect("spawn");
        let orni = ctx.spawn_unit(ItemId::Ornithopter, HouseId::Ordos, Coord::new(5, 6)).expect("spawn");
        let trooper = ctx.spawn_unit(ItemId::Trooper, HouseId::Atreides, Coord::new(4, 6)).expect("spawn");
        let ally = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(2, 2)).expect("spawn");

        let get = |id| ctx.objects.get(id).expect("alive");
        assert!(!get(sonic).can_attack(&ctx, get(enemy_sonic)));
        assert!(!get(sonic).can_attack(&ctx, get(orni)));
        assert!(get(trooper).can_attack(&ctx, get(orni)));
        assert!(!get(sonic).can_attack(&ctx, get(ally)));
        assert!(!get(orni).can_attack(&ctx, get(orni)));
    }

    #[test]
    fn test_search_radius_by_mode() {
        let rules = Rules::standard().expect("rules");
        let mut tank = crate::objects::create_object(
            &rules,
            ItemId::Tank.as_u32(),
            ObjectId::from_raw(0x0010_0000),
            HouseId::Atreides,
            Coord::new(1, 1),
        )
        .expect("tank");
        let range = rules.get(ItemId::Tank).weapon_range();
        tank.base.attack_mode = AttackMode::Guard;
        assert_eq!(tank.search_radius(&rules), Some(range));
        tank.base.attack_mode = AttackMode::AreaGuard;
        assert_eq!(tank.search_radius(&rules), Some(range * 2));
        tank.base.attack_mode = AttackMode::Stop;
        assert_eq!(tank.search_radius(&rules), None);
    }

    #[test]
    fn test_units_fight() {
        let mut ctx = context();
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(10, 10)).expect("spawn");
        let trike = ctx.spawn_unit(ItemId::Trike, HouseId::Harkonnen, Coord::new(13, 10)).expect("spawn");
        ctx.with_object(trike, |obj, _| obj.base.attack_mode = AttackMode::Stop);
        for _ in 0..400 {
            for id in ctx.objects.ids() {
                ctx.with_object(id, |obj, ctx| obj.update(ctx));
            }
            ctx.reap();
            ctx.tick += 1;
        }
        assert!(ctx.objects.get(trike).is_none());
        assert!(ctx.objects.get(tank).is_some());
    }
}
