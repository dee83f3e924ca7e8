//! Structures: docks, self-repair and MCV deployment.
//!
//! Refineries and repair yards hold at most one docked unit. A docked unit
//! is off the map; when the structure is done with it the unit is put back
//! beside the structure, or handed to a carryall when it has far to go.

use tracing::{debug, info};

use super::builder::{self, BuilderState};
use super::carryall;
use super::harvester::CARRYALL_TRIP_TILES;
use super::movement::dock_accepts;
use super::{combat, units, GameObject, Movable, ObjectId};
use crate::coord::Coord;
use crate::data::{hundredths, ItemId, ObjectData};
use crate::game::{GameContext, GameEvent};
use crate::map::MoveClass;
use crate::math::Fixed;

/// A one-unit dock.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DockState {
    /// Unit inside.
    pub docked: Option<ObjectId>,
    /// Carryall booked to collect the docked unit.
    pub booked_carrier: Option<ObjectId>,
    /// Ticks the current unit has been inside.
    pub timer: u32,
}

impl DockState {
    /// Whether nothing is docked and no carryall is on its way.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.docked.is_none() && self.booked_carrier.is_none()
    }
}

/// What a structure does beyond standing there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureRole {
    /// No behaviour of its own.
    Plain,
    /// Produces items.
    Builder(BuilderState),
    /// Unloads harvesters.
    Refinery(DockState),
    /// Repairs vehicles.
    RepairYard(DockState),
    /// Fires at enemies in range.
    Turret,
}

/// Structure-specific state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structure {
    /// Footprint in tiles.
    pub size: (i32, i32),
    /// Where produced and released units head, or [`Coord::INVALID`].
    pub deploy_point: Coord,
    /// Repairing itself at the owner's expense.
    pub repairing: bool,
    /// Ticks until a turret can fire again.
    pub weapon_timer: u32,
    /// Role-specific state.
    pub role: StructureRole,
}

impl Structure {
    /// Fresh state for a structure of type `item`.
    #[must_use]
    pub fn new(item: ItemId, data: &ObjectData) -> Self {
        let role = match item {
            ItemId::Refinery => StructureRole::Refinery(DockState::default()),
            ItemId::RepairYard => StructureRole::RepairYard(DockState::default()),
            _ if item.is_builder() => StructureRole::Builder(BuilderState::default()),
            _ if item.is_turret() => StructureRole::Turret,
            _ => StructureRole::Plain,
        };
        Self {
            size: data.size,
            deploy_point: Coord::INVALID,
            repairing: false,
            weapon_timer: 0,
            role,
        }
    }
}

pub(super) fn update(obj: &mut GameObject, ctx: &mut GameContext) {
    let view_range = obj.data(&ctx.rules).view_range as i32;
    let team = ctx.team_of(obj.owner());
    let (w, h) = obj.size();
    let center = Coord::new(obj.base.location.x + w / 2, obj.base.location.y + h / 2);
    ctx.map.view_map(team, center, view_range, ctx.tick);
    units::refresh_visibility(obj, ctx);

    if obj.as_structure().is_some_and(|s| s.repairing) {
        repair_self(obj, ctx);
    }

    match obj.as_structure().map(|s| &s.role) {
        Some(StructureRole::Refinery(_)) => update_refinery(obj, ctx),
        Some(StructureRole::RepairYard(_)) => update_repair_yard(obj, ctx),
        Some(StructureRole::Turret) => combat::update_turret(obj, ctx),
        Some(StructureRole::Builder(_)) => builder::update(obj, ctx),
        Some(StructureRole::Plain) | None => {}
    }
}

/// Credits needed to restore `heal` hit points of an object costing `price`.
fn repair_cost(heal: Fixed, price: u32, max: Fixed) -> Fixed {
    if max <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    heal * Fixed::from_num(price) / max / Fixed::from_num(2)
}

fn repair_self(obj: &mut GameObject, ctx: &mut GameContext) {
    let data = obj.data(&ctx.rules);
    let max = data.max_health();
    let price = data.price;
    let heal = hundredths(ctx.rules.constants.repair_rate).min(max - obj.base.health);
    let cost = repair_cost(heal, price, max);
    let owner = obj.owner();
    if heal <= Fixed::ZERO || !ctx.house(owner).can_afford(cost) {
        if let Some(structure) = obj.as_structure_mut() {
            structure.repairing = false;
        }
        debug!(id = %obj.id(), "structure repair stopped");
        return;
    }
    ctx.house_mut(owner).spend(cost);
    obj.base.health += heal;
    let threshold = crate::data::Rules::percent_of(max, ctx.rules.constants.badly_damaged_percent);
    if obj.base.health > threshold {
        obj.base.badly_damaged = false;
    }
    if obj.base.health >= max {
        if let Some(structure) = obj.as_structure_mut() {
            structure.repairing = false;
        }
    }
}

// ===== Docks =====

fn docked(obj: &GameObject) -> Option<ObjectId> {
    obj.dock().and_then(|d| d.docked)
}

fn update_refinery(obj: &mut GameObject, ctx: &mut GameContext) {
    let Some(unit) = docked(obj) else {
        return;
    };
    if obj.dock().is_some_and(|d| d.booked_carrier.is_some()) {
        // Empty already; waiting for the lift.
        return;
    }
    if let Some(dock) = obj.dock_mut() {
        dock.timer += 1;
    }
    let rate = hundredths(ctx.rules.constants.unload_rate);
    let Some(unloaded) = ctx.objects.get_mut(unit).and_then(GameObject::harvester_mut).map(|h| {
        let amount = rate.min(h.spice);
        h.spice -= amount;
        (amount, h.spice == Fixed::ZERO)
    }) else {
        // The docked unit is gone.
        if let Some(dock) = obj.dock_mut() {
            dock.docked = None;
        }
        return;
    };
    let (amount, empty) = unloaded;
    ctx.house_mut(obj.owner()).add_credits(amount);
    if empty {
        debug!(refinery = %obj.id(), harvester = %unit, "harvester unloaded");
        release_docked(obj, ctx);
    }
}

fn update_repair_yard(obj: &mut GameObject, ctx: &mut GameContext) {
    let Some(unit) = docked(obj) else {
        return;
    };
    if obj.dock().is_some_and(|d| d.booked_carrier.is_some()) {
        return;
    }
    if let Some(dock) = obj.dock_mut() {
        dock.timer += 1;
    }
    let Some((health, max, price)) = ctx.objects.get(unit).map(|u| {
        let data = u.data(&ctx.rules);
        (u.base.health, data.max_health(), data.price)
    }) else {
        if let Some(dock) = obj.dock_mut() {
            dock.docked = None;
        }
        return;
    };
    let heal = hundredths(ctx.rules.constants.repair_rate).min(max - health);
    if heal > Fixed::ZERO {
        let cost = repair_cost(heal, price, max);
        let owner = obj.owner();
        if !ctx.house(owner).can_afford(cost) {
            return;
        }
        ctx.house_mut(owner).spend(cost);
        let threshold = crate::data::Rules::percent_of(max, ctx.rules.constants.badly_damaged_percent);
        if let Some(unit) = ctx.objects.get_mut(unit) {
            unit.base.health += heal;
            if unit.base.health > threshold {
                unit.base.badly_damaged = false;
            }
        }
        if health + heal < max {
            return;
        }
    }
    debug!(yard = %obj.id(), %unit, "unit repaired");
    release_docked(obj, ctx);
}

/// Where a released unit goes next.
fn onward_destination(unit: &GameObject) -> Coord {
    unit.harvester()
        .map(|h| h.harvest_spot)
        .filter(|c| c.is_valid())
        .unwrap_or(unit.base.guard_point)
}

/// Send the docked unit back out, by carryall if it has far to go.
fn release_docked(obj: &mut GameObject, ctx: &mut GameContext) {
    let Some(unit_id) = docked(obj) else {
        return;
    };
    let Some(destination) = ctx.objects.get_mut(unit_id).map(|unit| {
        if let Some(state) = unit.harvester_mut() {
            state.returning = false;
        }
        onward_destination(unit)
    }) else {
        return;
    };

    let far = destination.is_valid()
        && destination.chebyshev_distance(obj.base.location) > CARRYALL_TRIP_TILES;
    if far && carryall::request_carryall(ctx, obj) {
        debug!(structure = %obj.id(), unit = %unit_id, "docked unit waits for carryall");
        return;
    }

    let prefer = obj
        .as_structure()
        .map(|s| s.deploy_point)
        .filter(|c| c.is_valid())
        .unwrap_or(destination);
    let spot = ctx
        .map
        .find_deploy_spot(MoveClass::Vehicle, obj.base.location, obj.size(), prefer, Coord::INVALID);
    if !spot.is_valid() {
        // Boxed in; try again next tick.
        return;
    }
    ctx.with_object(unit_id, |unit, ctx| {
        if let Some(ground) = unit.ground_mut() {
            ground.docked_at = None;
        }
        ctx.place_unit(unit, spot);
        unit.base.clear_target();
        unit.base.attack_mode = unit.default_attack_mode();
        if destination.is_valid() && destination != spot {
            unit.do_move_to_pos(ctx, destination, false);
        }
        ctx.emit(GameEvent::UnitDeployed {
            id: unit.id(),
            location: spot,
        });
    });
    if let Some(dock) = obj.dock_mut() {
        dock.docked = None;
        dock.timer = 0;
    }
}

/// Take `unit` into the dock of `structure_id`.
///
/// Fails when the structure does not accept the unit or is occupied.
pub(crate) fn dock_unit(ctx: &mut GameContext, structure_id: ObjectId, unit: &mut GameObject) -> bool {
    let Some(structure) = ctx.objects.get(structure_id) else {
        return false;
    };
    if !dock_accepts(structure, unit) || structure.dock().map_or(true, |d| d.docked.is_some()) {
        return false;
    }
    let location = structure.base.location;
    let center = structure.base.real;
    if let Some(dock) = ctx.objects.get_mut(structure_id).and_then(GameObject::dock_mut) {
        dock.docked = Some(unit.id());
        dock.timer = 0;
    }
    ctx.remove_from_map(unit);
    if let Some(ground) = unit.ground_mut() {
        ground.docked_at = Some(structure_id);
        ground.awaiting_pickup = false;
        ground.booked_carrier = None;
    }
    unit.base.location = location;
    unit.base.real = center;
    unit.base.destination = Coord::INVALID;
    unit.base.clear_target();
    if let Some(state) = unit.as_unit_mut() {
        state.motion.reset(location);
    }
    debug!(structure = %structure_id, unit = %unit.id(), "unit docked");
    true
}

/// Hand the unit docked in `structure_id` to the carryall that came for it.
pub(crate) fn deploy_to_carryall(ctx: &mut GameContext, structure_id: ObjectId, carrier: &mut GameObject) {
    let carrier_id = carrier.id();
    let Some(dock) = ctx.objects.get_mut(structure_id).and_then(GameObject::dock_mut) else {
        carrier.base.clear_target();
        return;
    };
    if dock.booked_carrier != Some(carrier_id) {
        carrier.base.clear_target();
        return;
    }
    dock.booked_carrier = None;
    let Some(unit_id) = dock.docked.take() else {
        carrier.base.clear_target();
        return;
    };
    dock.timer = 0;

    let destination = ctx.objects.get_mut(unit_id).map_or(Coord::INVALID, |unit| {
        if let Some(ground) = unit.ground_mut() {
            ground.docked_at = None;
            ground.picked_up = true;
            ground.booked_carrier = Some(carrier_id);
        }
        unit.base.clear_target();
        unit.base.attack_mode = unit.default_attack_mode();
        onward_destination(unit)
    });

    // Clearing the carrier's target must not release anything: the dock booking is already gone.
    carrier.base.clear_target();
    if let Some(state) = carrier.carryall_mut() {
        state.cargo.push(unit_id);
        state.delivery = None;
    }
    carrier.base.destination = if destination.is_valid() {
        destination
    } else {
        carrier.base.location
    };
    ctx.emit(GameEvent::CarryallPickup {
        carrier: carrier_id,
        cargo: unit_id,
    });
    debug!(carrier = %carrier_id, cargo = %unit_id, structure = %structure_id, "carryall collected docked unit");
}

/// Unfold an MCV into a construction yard on its own tile.
///
/// Returns the new yard, or `None` when the footprint is not clear rock.
pub(crate) fn deploy_mcv(ctx: &mut GameContext, mcv: &mut GameObject) -> Option<ObjectId> {
    if mcv.item() != ItemId::Mcv || mcv.is_off_map() {
        return None;
    }
    let pos = mcv.base.location;
    let size = ctx.rules.size(ItemId::ConstructionYard);
    if !ctx.map.footprint_is_clear(pos, size, Some(mcv.id())) {
        debug!(mcv = %mcv.id(), %pos, "mcv cannot deploy here");
        return None;
    }
    ctx.remove_from_map(mcv);
    let Some(yard) = ctx.spawn_structure(ItemId::ConstructionYard, mcv.owner(), pos) else {
        ctx.place_unit(mcv, pos);
        return None;
    };
    mcv.base.departed = true;
    info!(mcv = %mcv.id(), %yard, %pos, "mcv deployed");
    Some(yard)
}
