//! The object model: every structure and unit in the game.
//!
//! Objects form a closed sum type, [`ObjectKind`], over structures and
//! units; units split further into ground and air classes. Shared
//! behaviour is exposed through the capability traits [`Movable`],
//! [`Attacker`], [`Targetable`] and [`Builder`], all dispatching by
//! pattern match.
//!
//! Objects never hold references to each other. Targets, cargo and
//! bookings are [`ObjectId`]s resolved through the [`ObjectRegistry`] on
//! every use.

mod base;
mod builder;
mod carryall;
mod combat;
mod harvester;
mod infantry;
mod movement;
mod registry;
mod structures;
mod units;

pub use base::{AttackMode, Damager, ObjectBase};
pub use builder::{can_build, upgrade_unlocks, BuilderState, ProductionItem, MAX_MULTIPLE_ORDER};
pub use carryall::{
    default_mode_after_drop, request_carryall, CarryallState, MAX_INFANTRY_DROP, PICKUP_EPSILON,
};
pub use combat::find_target;
pub use harvester::{HarvesterState, CARRYALL_TRIP_TILES};
pub use infantry::InfantryState;
pub use registry::{ObjectId, ObjectRegistry};
pub use structures::{DockState, Structure, StructureRole};
pub use units::{
    AirKind, AirUnit, DevastatorState, GroundKind, GroundUnit, Motion, SandwormState, Unit,
    UnitClass,
};

pub(crate) use builder::place_structure;
pub(crate) use carryall::{release_booking_of, spawn_reinforcements};
pub(crate) use harvester::head_home;
pub(crate) use structures::deploy_mcv;
pub(crate) use units::start_devastate;

use tracing::{debug, error};

use crate::coord::Coord;
use crate::data::{HouseId, ItemId, ObjectData, Rules, WeaponData};
use crate::error::Result;
use crate::game::GameContext;
use crate::map::MoveClass;
use crate::math::{Fixed, Vec2Fixed};

/// Structure- or unit-specific state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    /// A building.
    Structure(Structure),
    /// A ground or air unit.
    Unit(Unit),
}

/// One simulation entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameObject {
    /// Common fields.
    pub base: ObjectBase,
    /// Type-specific fields.
    pub kind: ObjectKind,
}

/// Create a fresh object of type `item`.
///
/// Returns `None` and logs the bad ID when `item` names no structure or
/// unit. Slabs are not objects; placing one changes terrain instead.
#[must_use]
pub fn create_object(
    rules: &Rules,
    item: u32,
    id: ObjectId,
    owner: HouseId,
    location: Coord,
) -> Option<GameObject> {
    let Some(item) = ItemId::from_u32(item) else {
        error!(item, %id, "cannot create object of unknown item type");
        return None;
    };
    if item.is_slab() {
        debug!(%item, "slabs change terrain and have no object");
        return None;
    }

    let data = rules.get(item);
    let mut base = ObjectBase::new(id, item, owner, location, data);
    let kind = if item.is_structure() {
        let structure = Structure::new(item, data);
        base.real = structure_center(location, data.size);
        ObjectKind::Structure(structure)
    } else {
        ObjectKind::Unit(Unit::new(item, rules))
    };

    let mut object = GameObject { base, kind };
    object.base.attack_mode = object.default_attack_mode();
    Some(object)
}

/// Pixel centre of a structure footprint.
#[must_use]
pub fn structure_center(location: Coord, size: (i32, i32)) -> Vec2Fixed {
    let origin = location.tile_origin();
    let half_w = Fixed::from_num(size.0 * crate::coord::TILESIZE / 2);
    let half_h = Fixed::from_num(size.1 * crate::coord::TILESIZE / 2);
    Vec2Fixed::new(origin.x + half_w, origin.y + half_h)
}

impl GameObject {
    /// Registry identity.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.base.id
    }

    /// Type tag.
    #[must_use]
    pub const fn item(&self) -> ItemId {
        self.base.item
    }

    /// Current owner.
    #[must_use]
    pub const fn owner(&self) -> HouseId {
        self.base.owner
    }

    /// Static data for this object's type.
    #[must_use]
    pub fn data<'r>(&self, rules: &'r Rules) -> &'r ObjectData {
        rules.get(self.base.item)
    }

    /// Maximum health.
    #[must_use]
    pub fn max_health(&self, rules: &Rules) -> Fixed {
        self.data(rules).max_health()
    }

    /// Whether this is a structure.
    #[must_use]
    pub const fn is_structure(&self) -> bool {
        matches!(self.kind, ObjectKind::Structure(_))
    }

    /// Whether this is a unit.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self.kind, ObjectKind::Unit(_))
    }

    /// Unit state, if this is a unit.
    #[must_use]
    pub const fn as_unit(&self) -> Option<&Unit> {
        match &self.kind {
            ObjectKind::Unit(unit) => Some(unit),
            ObjectKind::Structure(_) => None,
        }
    }

    /// Mutable unit state.
    pub fn as_unit_mut(&mut self) -> Option<&mut Unit> {
        match &mut self.kind {
            ObjectKind::Unit(unit) => Some(unit),
            ObjectKind::Structure(_) => None,
        }
    }

    /// Structure state, if this is a structure.
    #[must_use]
    pub const fn as_structure(&self) -> Option<&Structure> {
        match &self.kind {
            ObjectKind::Structure(structure) => Some(structure),
            ObjectKind::Unit(_) => None,
        }
    }

    /// Mutable structure state.
    pub fn as_structure_mut(&mut self) -> Option<&mut Structure> {
        match &mut self.kind {
            ObjectKind::Structure(structure) => Some(structure),
            ObjectKind::Unit(_) => None,
        }
    }

    /// Ground-unit state.
    #[must_use]
    pub fn ground(&self) -> Option<&GroundUnit> {
        match &self.as_unit()?.class {
            UnitClass::Ground(ground) => Some(ground),
            UnitClass::Air(_) => None,
        }
    }

    /// Mutable ground-unit state.
    pub fn ground_mut(&mut self) -> Option<&mut GroundUnit> {
        match &mut self.as_unit_mut()?.class {
            UnitClass::Ground(ground) => Some(ground),
            UnitClass::Air(_) => None,
        }
    }

    /// Carryall state.
    #[must_use]
    pub fn carryall(&self) -> Option<&CarryallState> {
        match &self.as_unit()?.class {
            UnitClass::Air(AirUnit {
                kind: AirKind::Carryall(carryall),
            }) => Some(carryall),
            _ => None,
        }
    }

    /// Mutable carryall state.
    pub fn carryall_mut(&mut self) -> Option<&mut CarryallState> {
        match &mut self.as_unit_mut()?.class {
            UnitClass::Air(AirUnit {
                kind: AirKind::Carryall(carryall),
            }) => Some(carryall),
            _ => None,
        }
    }

    /// Harvester state.
    #[must_use]
    pub fn harvester(&self) -> Option<&HarvesterState> {
        match &self.ground()?.kind {
            GroundKind::Harvester(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable harvester state.
    pub fn harvester_mut(&mut self) -> Option<&mut HarvesterState> {
        match &mut self.ground_mut()?.kind {
            GroundKind::Harvester(state) => Some(state),
            _ => None,
        }
    }

    /// Dock of a refinery or repair yard.
    #[must_use]
    pub fn dock(&self) -> Option<&DockState> {
        match &self.as_structure()?.role {
            StructureRole::Refinery(dock) | StructureRole::RepairYard(dock) => Some(dock),
            _ => None,
        }
    }

    /// Mutable dock.
    pub fn dock_mut(&mut self) -> Option<&mut DockState> {
        match &mut self.as_structure_mut()?.role {
            StructureRole::Refinery(dock) | StructureRole::RepairYard(dock) => Some(dock),
            _ => None,
        }
    }

    /// Builder state.
    #[must_use]
    pub fn builder(&self) -> Option<&BuilderState> {
        match &self.as_structure()?.role {
            StructureRole::Builder(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable builder state.
    pub fn builder_mut(&mut self) -> Option<&mut BuilderState> {
        match &mut self.as_structure_mut()?.role {
            StructureRole::Builder(state) => Some(state),
            _ => None,
        }
    }

    /// Whether this is an infantry unit.
    #[must_use]
    pub const fn is_infantry(&self) -> bool {
        self.base.item.is_infantry()
    }

    /// Whether the unit has been lifted by a carryall or is inside a structure.
    #[must_use]
    pub fn is_off_map(&self) -> bool {
        self.ground()
            .is_some_and(|g| g.picked_up || g.docked_at.is_some())
    }

    /// Footprint size in tiles, `(1, 1)` for units.
    #[must_use]
    pub fn size(&self) -> (i32, i32) {
        self.as_structure().map_or((1, 1), |s| s.size)
    }

    /// Whether `pos` is one of the tiles this object covers.
    #[must_use]
    pub fn occupies(&self, pos: Coord) -> bool {
        let (w, h) = self.size();
        let loc = self.base.location;
        pos.x >= loc.x && pos.x < loc.x + w && pos.y >= loc.y && pos.y < loc.y + h
    }

    /// Attack mode a unit falls back to when it has no orders.
    #[must_use]
    pub const fn default_attack_mode(&self) -> AttackMode {
        match self.base.item {
            ItemId::Harvester => AttackMode::Harvest,
            ItemId::Saboteur | ItemId::Sandworm => AttackMode::Hunt,
            ItemId::Carryall | ItemId::Frigate | ItemId::Mcv => AttackMode::Stop,
            _ if self.base.item.is_structure() => AttackMode::Guard,
            _ => AttackMode::AreaGuard,
        }
    }

    /// Per-tick update.
    pub fn update(&mut self, ctx: &mut GameContext) {
        if !self.base.active || self.base.departed {
            return;
        }
        match self.kind {
            ObjectKind::Structure(_) => structures::update(self, ctx),
            ObjectKind::Unit(_) => units::update(self, ctx),
        }
    }

    /// Apply damage, flooring health at zero.
    ///
    /// When health reaches zero the death is recorded immediately, with the
    /// kill credited to `damager`. Removal from the registry happens later
    /// in the tick.
    pub fn handle_damage(&mut self, ctx: &mut GameContext, amount: Fixed, damager: Option<Damager>) {
        combat::handle_damage(self, ctx, amount, damager);
    }

    /// Point the object at a new target, releasing any carryall booking the
    /// old target held.
    pub fn set_target(&mut self, ctx: &mut GameContext, target: Option<ObjectId>) {
        if self.carryall().is_some() {
            carryall::set_target(self, ctx, target);
            return;
        }
        combat::set_target(self, ctx, target);
    }
}

// ===== Capability traits =====

/// Objects that can be aimed at.
pub trait Targetable {
    /// Footprint tile closest to `from`.
    fn closest_point(&self, from: Coord) -> Coord;
    /// Pixel centre.
    fn center_pixel(&self) -> Vec2Fixed;
    /// Whether only anti-air weapons can reach it.
    fn is_flying(&self) -> bool;
    /// Whether it can be targeted at all right now.
    fn can_be_targeted(&self) -> bool;
}

/// Objects with a weapon.
pub trait Attacker {
    /// Weapon data, if armed.
    fn weapon<'r>(&self, rules: &'r Rules) -> Option<&'r WeaponData>;
    /// Whether this object may attack `target` now.
    fn can_attack(&self, ctx: &GameContext, target: &GameObject) -> bool;
    /// Tiles within which this object engages, for its current mode.
    fn search_radius(&self, rules: &Rules) -> Option<i32>;
}

/// Objects that move under orders.
pub trait Movable {
    /// How terrain and occupancy constrain movement.
    fn move_class(&self) -> MoveClass;
    /// Order a move to a tile.
    fn do_move_to_pos(&mut self, ctx: &mut GameContext, pos: Coord, forced: bool);
    /// Order a move onto another object.
    fn do_move_to_object(&mut self, ctx: &mut GameContext, target: ObjectId);
    /// Halt at the current tile.
    fn stop_moving(&mut self);
}

/// Structures with a production queue.
pub trait Builder {
    /// Whether `item` can be produced here now.
    fn can_produce(&self, ctx: &GameContext, item: ItemId) -> bool;
    /// Queue one or several of `item`.
    fn produce_item(&mut self, ctx: &mut GameContext, item: ItemId, multiple: bool) -> Result<()>;
    /// Remove one or all queued `item`, refunding spent credits.
    fn cancel_item(&mut self, ctx: &mut GameContext, item: ItemId, all: bool) -> Result<()>;
    /// Pause or resume production.
    fn set_on_hold(&mut self, on_hold: bool) -> Result<()>;
    /// Start the next upgrade level.
    fn start_upgrade(&mut self, ctx: &mut GameContext) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Rules {
        Rules::standard().expect("rules")
    }

    #[test]
    fn test_factory_builds_every_object_type() {
        let rules = rules();
        for (n, item) in ItemId::ALL.into_iter().enumerate() {
            let id = ObjectId::from_raw(0x0010_0000 + n as u32);
            let object = create_object(&rules, item.as_u32(), id, HouseId::Harkonnen, Coord::new(3, 3));
            if item.is_slab() {
                assert!(object.is_none());
                continue;
            }
            let object = object.expect("known item");
            assert_eq!(object.item(), item);
            assert_eq!(object.is_structure(), item.is_structure());
            assert_eq!(object.base.health, rules.get(item).max_health());
        }
    }

    #[test]
    fn test_factory_rejects_unknown_item() {
        let rules = rules();
        let id = ObjectId::from_raw(0x0010_0000);
        assert!(create_object(&rules, 0, id, HouseId::Ordos, Coord::ZERO).is_none());
        assert!(create_object(&rules, 999, id, HouseId::Ordos, Coord::ZERO).is_none());
    }

    #[test]
    fn test_default_modes() {
        let rules = rules();
        let id = ObjectId::from_raw(0x0010_0000);
        let make = |item: ItemId| {
            create_object(&rules, item.as_u32(), id, HouseId::Atreides, Coord::new(1, 1))
                .expect("known item")
        };
        assert_eq!(make(ItemId::Harvester).base.attack_mode, AttackMode::Harvest);
        assert_eq!(make(ItemId::Saboteur).base.attack_mode, AttackMode::Hunt);
        assert_eq!(make(ItemId::Tank).base.attack_mode, AttackMode::AreaGuard);
    }

    #[test]
    fn test_structure_footprint() {
        let rules = rules();
        let id = ObjectId::from_raw(0x0010_0000);
        let refinery = create_object(&rules, ItemId::Refinery.as_u32(), id, HouseId::Atreides, Coord::new(4, 4))
            .expect("known item");
        assert!(refinery.occupies(Coord::new(6, 5)));
        assert!(!refinery.occupies(Coord::new(7, 5)));
        assert!(!refinery.occupies(Coord::new(4, 6)));
        assert!(refinery.dock().is_some_and(DockState::is_free));
    }
}
