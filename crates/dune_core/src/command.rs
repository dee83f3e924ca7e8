//! Player and AI commands.
//!
//! A [`Command`] is a flat record: the issuing player, a type tag and a
//! list of `u32` parameters whose count is fixed per [`CommandType`].
//! Commands carry object IDs, never references, so a command can be
//! written to a replay or sent over a network and executed later against
//! whatever the registry holds by then.
//!
//! # Wire format
//!
//! ```text
//! [player: u8][tag: u32 LE][param_0: u32 LE] .. [param_n: u32 LE]
//! ```
//!
//! At least one parameter slot is required.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coord::Coord;
use crate::data::{HouseId, ItemId};
use crate::error::{GameError, Result};
use crate::game::{house_of_player, GameContext, GameEvent};
use crate::objects::{
    deploy_mcv, head_home, place_structure, request_carryall, start_devastate, AttackMode, Attacker,
    Builder, GameObject, Movable, ObjectId, Targetable, CARRYALL_TRIP_TILES,
};

/// Bytes before the first parameter.
pub const HEADER_LEN: usize = 5;

/// Every command the core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum CommandType {
    /// `(builder, item, x, y)`: put a finished structure down.
    PlaceStructure = 1,
    /// `(unit, x, y, forced)`.
    UnitMove2Pos,
    /// `(unit, target)`.
    UnitMove2Object,
    /// `(unit, x, y, forced)`.
    UnitAttackPos,
    /// `(unit, target, forced)`.
    UnitAttackObject,
    /// `(infantry, structure)`.
    InfantryCapture,
    /// `(unit, x, y)`: fly the unit to a tile.
    UnitRequestCarryallDrop,
    /// `(harvester)`.
    HarvesterReturn,
    /// `(unit)`.
    UnitSendToRepair,
    /// `(unit, mode)`.
    UnitSetMode,
    /// `(devastator)`.
    DevastatorStartDevastate,
    /// `(mcv)`.
    McvDeploy,
    /// `(structure, x, y)`.
    StructureSetDeployPosition,
    /// `(structure)`.
    StructureRepair,
    /// `(turret, target)`.
    TurretAttackObject,
    /// `(builder)`.
    BuilderUpgrade,
    /// `(builder, item, multiple)`.
    BuilderProduceItem,
    /// `(builder, item, all)`.
    BuilderCancelItem,
    /// `(builder, on_hold)`.
    BuilderSetOnHold,
    /// `(state_hash)`: compare the low 32 bits of the state hash.
    TestSync,
}

impl CommandType {
    /// All command types in tag order.
    pub const ALL: [Self; 20] = [
        Self::PlaceStructure,
        Self::UnitMove2Pos,
        Self::UnitMove2Object,
        Self::UnitAttackPos,
        Self::UnitAttackObject,
        Self::InfantryCapture,
        Self::UnitRequestCarryallDrop,
        Self::HarvesterReturn,
        Self::UnitSendToRepair,
        Self::UnitSetMode,
        Self::DevastatorStartDevastate,
        Self::McvDeploy,
        Self::StructureSetDeployPosition,
        Self::StructureRepair,
        Self::TurretAttackObject,
        Self::BuilderUpgrade,
        Self::BuilderProduceItem,
        Self::BuilderCancelItem,
        Self::BuilderSetOnHold,
        Self::TestSync,
    ];

    /// Decode a wire tag.
    #[must_use]
    pub fn from_u32(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Wire tag.
    #[must_use]
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Exact number of parameters.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::PlaceStructure | Self::UnitMove2Pos | Self::UnitAttackPos => 4,
            Self::UnitAttackObject
            | Self::UnitRequestCarryallDrop
            | Self::StructureSetDeployPosition
            | Self::BuilderProduceItem
            | Self::BuilderCancelItem => 3,
            Self::UnitMove2Object
            | Self::InfantryCapture
            | Self::UnitSetMode
            | Self::TurretAttackObject
            | Self::BuilderSetOnHold => 2,
            Self::HarvesterReturn
            | Self::UnitSendToRepair
            | Self::DevastatorStartDevastate
            | Self::McvDeploy
            | Self::StructureRepair
            | Self::BuilderUpgrade
            | Self::TestSync => 1,
        }
    }
}

/// One player or AI intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    /// Issuing player; the player's house must own the commanded object.
    pub player_id: u8,
    /// Raw [`CommandType`] tag. Kept raw so that unknown tags survive
    /// decoding and are rejected at execution.
    pub tag: u32,
    /// Parameters, meaning fixed per type.
    pub params: Vec<u32>,
}

impl Command {
    /// Build a command of a known type.
    #[must_use]
    pub fn new(player_id: u8, kind: CommandType, params: Vec<u32>) -> Self {
        Self {
            player_id,
            tag: kind.tag(),
            params,
        }
    }

    /// Player byte for a house.
    #[must_use]
    pub const fn player_of(house: HouseId) -> u8 {
        house.index() as u8
    }

    /// Command type, if the tag is known.
    #[must_use]
    pub fn kind(&self) -> Option<CommandType> {
        CommandType::from_u32(self.tag)
    }

    /// Encode to the wire format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + 4 * self.params.len());
        out.push(self.player_id);
        out.extend_from_slice(&self.tag.to_le_bytes());
        for param in &self.params {
            out.extend_from_slice(&param.to_le_bytes());
        }
        out
    }

    /// Decode from the wire format.
    ///
    /// # Errors
    ///
    /// [`GameError::MalformedCommand`] when the length is not a header
    /// plus a positive whole number of parameter slots.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let length = bytes.len();
        if length < HEADER_LEN + 4 {
            return Err(GameError::MalformedCommand {
                length,
                reason: "shorter than a header and one parameter".into(),
            });
        }
        if (length - HEADER_LEN) % 4 != 0 {
            return Err(GameError::MalformedCommand {
                length,
                reason: "parameters are not whole 4-byte slots".into(),
            });
        }
        let word = |chunk: &[u8]| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        Ok(Self {
            player_id: bytes[0],
            tag: word(&bytes[1..HEADER_LEN]),
            params: bytes[HEADER_LEN..].chunks_exact(4).map(word).collect(),
        })
    }

    // ===== Constructors =====

    /// Move a unit to a tile.
    #[must_use]
    pub fn move_to(player_id: u8, unit: ObjectId, pos: Coord, forced: bool) -> Self {
        Self::new(
            player_id,
            CommandType::UnitMove2Pos,
            vec![unit.raw(), pos.x_param(), pos.y_param(), u32::from(forced)],
        )
    }

    /// Attack an object.
    #[must_use]
    pub fn attack_object(player_id: u8, unit: ObjectId, target: ObjectId, forced: bool) -> Self {
        Self::new(
            player_id,
            CommandType::UnitAttackObject,
            vec![unit.raw(), target.raw(), u32::from(forced)],
        )
    }

    /// Change a unit's attack mode.
    #[must_use]
    pub fn set_mode(player_id: u8, unit: ObjectId, mode: AttackMode) -> Self {
        Self::new(player_id, CommandType::UnitSetMode, vec![unit.raw(), mode.as_u32()])
    }

    /// Queue production.
    #[must_use]
    pub fn produce(player_id: u8, builder: ObjectId, item: ItemId, multiple: bool) -> Self {
        Self::new(
            player_id,
            CommandType::BuilderProduceItem,
            vec![builder.raw(), item.as_u32(), u32::from(multiple)],
        )
    }

    /// Place a finished structure.
    #[must_use]
    pub fn place_structure(player_id: u8, builder: ObjectId, item: ItemId, pos: Coord) -> Self {
        Self::new(
            player_id,
            CommandType::PlaceStructure,
            vec![builder.raw(), item.as_u32(), pos.x_param(), pos.y_param()],
        )
    }

    /// Apply an object-only command such as repair or deploy.
    #[must_use]
    pub fn on_object(player_id: u8, kind: CommandType, id: ObjectId) -> Self {
        Self::new(player_id, kind, vec![id.raw()])
    }
}

// ===== Execution =====

fn coord_param(ctx: &GameContext, x: u32, y: u32) -> Result<Coord> {
    let pos = Coord::from_params(x, y);
    if ctx.map.contains(pos) {
        Ok(pos)
    } else {
        Err(GameError::invalid_argument(format!("({x}, {y}) is off the map")))
    }
}

fn item_param(raw: u32) -> Result<ItemId> {
    ItemId::from_u32(raw).ok_or(GameError::UnknownItem(raw))
}

fn flag_param(raw: u32) -> Result<bool> {
    match raw {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(GameError::invalid_argument(format!("{raw} is not a flag"))),
    }
}

fn wrong_kind(object: &GameObject, kind: CommandType) -> GameError {
    GameError::invalid_argument(format!("{kind:?} does not apply to {}", object.item()))
}

/// Execute one command.
///
/// The parameter count is checked before anything else, so a rejected
/// command changes nothing. An object ID that no longer resolves skips the
/// command without error, as does an object owned by another player.
///
/// # Errors
///
/// [`GameError::InvalidArgument`] for an unknown tag, a wrong parameter
/// count or a bad parameter value, [`GameError::UnknownItem`] for a bad
/// item ID, and the builder's own errors for production commands.
pub fn execute_command(ctx: &mut GameContext, command: &Command) -> Result<()> {
    let kind = command
        .kind()
        .ok_or_else(|| GameError::invalid_argument(format!("unknown command type {}", command.tag)))?;
    let params = command.params.as_slice();
    if params.len() != kind.arity() {
        return Err(GameError::invalid_argument(format!(
            "{kind:?} takes {} parameters, got {}",
            kind.arity(),
            params.len()
        )));
    }
    let house = house_of_player(command.player_id)?;

    if kind == CommandType::TestSync {
        let actual = ctx.state_hash() as u32;
        if actual != params[0] {
            warn!(tick = ctx.tick, expected = params[0], actual, "desync detected");
            ctx.emit(GameEvent::Desync {
                expected: params[0],
                actual,
            });
        }
        return Ok(());
    }

    let id = ObjectId::from_raw(params[0]);
    let Some(object) = ctx.objects.get(id) else {
        debug!(?kind, %id, "command for a vanished object dropped");
        return Ok(());
    };
    if object.base.is_dead() || object.base.departed {
        return Ok(());
    }
    if object.owner() != house {
        warn!(?kind, %id, player = command.player_id, owner = ?object.owner(), "command for a foreign object ignored");
        return Ok(());
    }
    if object.is_off_map() && kind != CommandType::UnitSetMode {
        debug!(?kind, %id, "object is off the map");
        return Ok(());
    }

    ctx.with_object(id, |object, ctx| dispatch(object, ctx, kind, params))
        .unwrap_or(Ok(()))
}

/// Resolve the target parameter, or `None` for a stale ID.
fn live_target(ctx: &GameContext, raw: u32) -> Option<ObjectId> {
    let id = ObjectId::from_raw(raw);
    ctx.objects
        .get(id)
        .filter(|t| t.can_be_targeted())
        .map(|_| id)
}

#[allow(clippy::too_many_lines)]
fn dispatch(object: &mut GameObject, ctx: &mut GameContext, kind: CommandType, p: &[u32]) -> Result<()> {
    match kind {
        CommandType::PlaceStructure => {
            let item = item_param(p[1])?;
            let pos = coord_param(ctx, p[2], p[3])?;
            if object.builder().is_none() {
                return Err(wrong_kind(object, kind));
            }
            place_structure(object, ctx, item, pos)
        }
        CommandType::UnitMove2Pos => {
            let pos = coord_param(ctx, p[1], p[2])?;
            let forced = flag_param(p[3])?;
            if !object.is_unit() {
                return Err(wrong_kind(object, kind));
            }
            object.base.attack_pos = Coord::INVALID;
            object.do_move_to_pos(ctx, pos, forced);
            Ok(())
        }
        CommandType::UnitMove2Object => {
            if !object.is_unit() {
                return Err(wrong_kind(object, kind));
            }
            if let Some(target) = live_target(ctx, p[1]) {
                object.base.attack_pos = Coord::INVALID;
                object.do_move_to_object(ctx, target);
            }
            Ok(())
        }
        CommandType::UnitAttackPos => {
            let pos = coord_param(ctx, p[1], p[2])?;
            let forced = flag_param(p[3])?;
            if !object.is_unit() || object.weapon(&ctx.rules).is_none() {
                return Err(wrong_kind(object, kind));
            }
            object.set_target(ctx, None);
            object.base.attack_pos = pos;
            object.base.destination = pos;
            object.base.forced_target = forced;
            object.base.forced_move = false;
            Ok(())
        }
        CommandType::UnitAttackObject => {
            let forced = flag_param(p[2])?;
            if !object.is_unit() {
                return Err(wrong_kind(object, kind));
            }
            let Some(target) = live_target(ctx, p[1]) else {
                return Ok(());
            };
            object.base.attack_pos = Coord::INVALID;
            object.base.forced_move = false;
            object.set_target(ctx, Some(target));
            object.base.forced_target = forced;
            if let Some(dest) = ctx.objects.get(target).map(|t| t.closest_point(object.base.location)) {
                object.base.destination = dest;
            }
            Ok(())
        }
        CommandType::InfantryCapture => {
            if !object.is_infantry() || object.item() == ItemId::Saboteur {
                return Err(wrong_kind(object, kind));
            }
            let Some(target) = live_target(ctx, p[1]) else {
                return Ok(());
            };
            if !ctx.objects.get(target).is_some_and(GameObject::is_structure) {
                return Err(GameError::invalid_argument("capture target is not a structure"));
            }
            object.base.attack_mode = AttackMode::Capture;
            object.do_move_to_object(ctx, target);
            Ok(())
        }
        CommandType::UnitRequestCarryallDrop => {
            let pos = coord_param(ctx, p[1], p[2])?;
            if object.ground().is_none() || object.item() == ItemId::Sandworm {
                return Err(wrong_kind(object, kind));
            }
            object.do_move_to_pos(ctx, pos, false);
            if !request_carryall(ctx, object) {
                object.base.attack_mode = AttackMode::CarryallRequested;
            }
            Ok(())
        }
        CommandType::HarvesterReturn => {
            if object.harvester().is_none() {
                return Err(wrong_kind(object, kind));
            }
            object.base.forced_move = false;
            object.base.attack_mode = AttackMode::Harvest;
            head_home(object, ctx);
            Ok(())
        }
        CommandType::UnitSendToRepair => {
            if object.ground().is_none() || object.is_infantry() || object.item() == ItemId::Sandworm {
                return Err(wrong_kind(object, kind));
            }
            send_to_repair(object, ctx);
            Ok(())
        }
        CommandType::UnitSetMode => {
            let mode = AttackMode::from_u32(p[1])
                .ok_or_else(|| GameError::invalid_argument(format!("unknown attack mode {}", p[1])))?;
            if !object.is_unit() {
                return Err(wrong_kind(object, kind));
            }
            set_mode(object, ctx, mode)
        }
        CommandType::DevastatorStartDevastate => {
            if start_devastate(object, &ctx.rules) {
                Ok(())
            } else {
                Err(wrong_kind(object, kind))
            }
        }
        CommandType::McvDeploy => {
            if object.item() != ItemId::Mcv {
                return Err(wrong_kind(object, kind));
            }
            // A blocked footprint is not an error; the player can move and retry.
            deploy_mcv(ctx, object);
            Ok(())
        }
        CommandType::StructureSetDeployPosition => {
            let pos = coord_param(ctx, p[1], p[2])?;
            let structure = object.as_structure_mut().ok_or_else(|| GameError::invalid_argument("not a structure"))?;
            structure.deploy_point = pos;
            Ok(())
        }
        CommandType::StructureRepair => {
            let damaged = object.base.health < object.max_health(&ctx.rules);
            let structure = object.as_structure_mut().ok_or_else(|| GameError::invalid_argument("not a structure"))?;
            structure.repairing = damaged;
            Ok(())
        }
        CommandType::TurretAttackObject => {
            if !object.item().is_turret() {
                return Err(wrong_kind(object, kind));
            }
            if let Some(target) = live_target(ctx, p[1]) {
                object.set_target(ctx, Some(target));
                object.base.forced_target = true;
            }
            Ok(())
        }
        CommandType::BuilderUpgrade => object.start_upgrade(ctx),
        CommandType::BuilderProduceItem => {
            let item = item_param(p[1])?;
            let multiple = flag_param(p[2])?;
            object.produce_item(ctx, item, multiple)
        }
        CommandType::BuilderCancelItem => {
            let item = item_param(p[1])?;
            let all = flag_param(p[2])?;
            object.cancel_item(ctx, item, all)
        }
        CommandType::BuilderSetOnHold => {
            let on_hold = flag_param(p[1])?;
            object.set_on_hold(on_hold)
        }
        CommandType::TestSync => Ok(()),
    }
}

fn send_to_repair(object: &mut GameObject, ctx: &mut GameContext) {
    let from = object.base.location;
    let Some(yard) = ctx
        .objects
        .iter()
        .filter(|(_, s)| s.item() == ItemId::RepairYard && s.owner() == object.owner() && s.can_be_targeted())
        .min_by_key(|(id, s)| (s.closest_point(from).distance_squared(from), *id))
        .map(|(id, _)| id)
    else {
        debug!(unit = %object.id(), "no repair yard");
        return;
    };
    object.base.forced_move = false;
    object.base.attack_pos = Coord::INVALID;
    object.set_target(ctx, Some(yard));
    let far = ctx.objects.get(yard).is_some_and(|y| {
        y.closest_point(from).chebyshev_distance(from) > CARRYALL_TRIP_TILES
    });
    if far && !request_carryall(ctx, object) {
        debug!(unit = %object.id(), %yard, "driving to repair, no carryall free");
    }
}

fn set_mode(object: &mut GameObject, ctx: &mut GameContext, mode: AttackMode) -> Result<()> {
    match mode {
        AttackMode::CarryallRequested | AttackMode::Capture => {
            return Err(GameError::invalid_argument(format!("{mode:?} cannot be set directly")));
        }
        AttackMode::Harvest if object.harvester().is_none() => {
            return Err(GameError::invalid_argument("only harvesters harvest"));
        }
        _ => {}
    }
    object.base.attack_mode = mode;
    object.base.forced_move = false;
    match mode {
        AttackMode::Stop => {
            object.set_target(ctx, None);
            object.base.attack_pos = Coord::INVALID;
            object.stop_moving();
        }
        AttackMode::Guard | AttackMode::AreaGuard | AttackMode::Ambush => {
            object.base.guard_point = object.base.location;
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Rules;
    use crate::game::GameSettings;
    use crate::map::{Map, TerrainType};
    use crate::math::Fixed;

    fn context() -> GameContext {
        let mut ctx = GameContext::new(Map::new(32, 32), Rules::standard().expect("rules"), GameSettings::default());
        let rules = ctx.rules.clone();
        ctx.map.fill_terrain(Coord::new(0, 0), Coord::new(12, 12), TerrainType::Rock, &rules);
        ctx.house_mut(HouseId::Atreides).credits = Fixed::from_num(2000);
        ctx
    }

    const ATREIDES: u8 = Command::player_of(HouseId::Atreides);

    #[test]
    fn test_wire_format() {
        let command = Command::move_to(3, ObjectId::from_raw(0x0100_0002), Coord::new(7, 9), true);
        let bytes = command.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN + 16);
        assert_eq!(bytes[0], 3);
        assert_eq!(&bytes[1..5], &CommandType::UnitMove2Pos.tag().to_le_bytes());
        assert_eq!(Command::from_bytes(&bytes), Ok(command));
    }

    #[test]
    fn test_wire_rejects_bad_lengths() {
        for length in [0, 1, 5, 8, 10, 11, 12, 14] {
            let bytes = vec![0u8; length];
            assert!(
                matches!(Command::from_bytes(&bytes), Err(GameError::MalformedCommand { .. })),
                "length {length}"
            );
        }
        assert!(Command::from_bytes(&[0u8; 9]).is_ok());
        assert!(Command::from_bytes(&[0u8; 13]).is_ok());
    }

    #[test]
    fn test_arity_table_matches_tags() {
        for (n, kind) in CommandType::ALL.into_iter().enumerate() {
            assert_eq!(kind.tag(), n as u32 + 1);
            assert_eq!(CommandType::from_u32(kind.tag()), Some(kind));
            assert!((1..=4).contains(&kind.arity()));
        }
        assert_eq!(CommandType::from_u32(0), None);
        assert_eq!(CommandType::from_u32(21), None);
    }

    #[test]
    fn test_wrong_arity_changes_nothing() {
        let mut ctx = context();
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(3, 3)).expect("spawn");
        ctx.events.clear();
        let before = ctx.state_hash();
        for kind in CommandType::ALL {
            let params = vec![tank.raw(); kind.arity() + 1];
            let result = execute_command(&mut ctx, &Command::new(ATREIDES, kind, params));
            assert!(matches!(result, Err(GameError::InvalidArgument(_))), "{kind:?}");
            if kind.arity() > 1 {
                let short = vec![tank.raw(); kind.arity() - 1];
                let result = execute_command(&mut ctx, &Command::new(ATREIDES, kind, short));
                assert!(matches!(result, Err(GameError::InvalidArgument(_))), "{kind:?}");
            }
        }
        assert_eq!(before, ctx.state_hash());
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut ctx = context();
        let command = Command {
            player_id: ATREIDES,
            tag: 999,
            params: vec![1],
        };
        assert!(matches!(execute_command(&mut ctx, &command), Err(GameError::InvalidArgument(_))));
    }

    #[test]
    fn test_stale_object_is_skipped() {
        let mut ctx = context();
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(3, 3)).expect("spawn");
        let enemy = ctx.spawn_unit(ItemId::Trike, HouseId::Harkonnen, Coord::new(6, 3)).expect("spawn");
        ctx.kill_object(enemy, None);
        ctx.reap();
        let before = ctx.state_hash();
        let command = Command::attack_object(ATREIDES, tank, enemy, true);
        assert_eq!(execute_command(&mut ctx, &command), Ok(()));
        assert_eq!(before, ctx.state_hash());

        let gone = Command::move_to(ATREIDES, enemy, Coord::new(1, 1), false);
        assert_eq!(execute_command(&mut ctx, &gone), Ok(()));
    }

    #[test]
    fn test_foreign_object_is_ignored() {
        let mut ctx = context();
        let trike = ctx.spawn_unit(ItemId::Trike, HouseId::Harkonnen, Coord::new(3, 3)).expect("spawn");
        let command = Command::move_to(ATREIDES, trike, Coord::new(9, 9), true);
        assert_eq!(execute_command(&mut ctx, &command), Ok(()));
        assert_eq!(ctx.objects.get(trike).map(|t| t.base.destination), Some(Coord::INVALID));
    }

    #[test]
    fn test_move_and_attack_orders() {
        let mut ctx = context();
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(3, 3)).expect("spawn");
        let enemy = ctx.spawn_unit(ItemId::Trike, HouseId::Harkonnen, Coord::new(9, 3)).expect("spawn");

        execute_command(&mut ctx, &Command::move_to(ATREIDES, tank, Coord::new(8, 8), true)).expect("move");
        let unit = ctx.objects.get(tank).expect("alive");
        assert_eq!(unit.base.destination, Coord::new(8, 8));
        assert!(unit.base.forced_move);

        execute_command(&mut ctx, &Command::attack_object(ATREIDES, tank, enemy, true)).expect("attack");
        let unit = ctx.objects.get(tank).expect("alive");
        assert_eq!(unit.base.target, Some(enemy));
        assert!(unit.base.forced_target);
        assert!(!unit.base.target_friendly);

        let off_map = Command::move_to(ATREIDES, tank, Coord::new(40, 2), false);
        assert!(matches!(execute_command(&mut ctx, &off_map), Err(GameError::InvalidArgument(_))));
    }

    #[test]
    fn test_set_mode() {
        let mut ctx = context();
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(3, 3)).expect("spawn");
        execute_command(&mut ctx, &Command::set_mode(ATREIDES, tank, AttackMode::Hunt)).expect("hunt");
        assert_eq!(ctx.objects.get(tank).map(|t| t.base.attack_mode), Some(AttackMode::Hunt));

        let bad = Command::new(ATREIDES, CommandType::UnitSetMode, vec![tank.raw(), 77]);
        assert!(execute_command(&mut ctx, &bad).is_err());
        let harvest = Command::set_mode(ATREIDES, tank, AttackMode::Harvest);
        assert!(execute_command(&mut ctx, &harvest).is_err());
    }

    #[test]
    fn test_production_commands() {
        let mut ctx = context();
        let factory = ctx
            .spawn_structure(ItemId::LightFactory, HouseId::Atreides, Coord::new(2, 2))
            .expect("placed");
        execute_command(&mut ctx, &Command::produce(ATREIDES, factory, ItemId::Trike, true)).expect("queued");
        assert_eq!(
            ctx.objects.get(factory).and_then(GameObject::builder).map(|b| b.queue.len()),
            Some(crate::objects::MAX_MULTIPLE_ORDER)
        );

        let tank = Command::produce(ATREIDES, factory, ItemId::Tank, false);
        assert!(execute_command(&mut ctx, &tank).is_err());
        let unknown = Command::new(ATREIDES, CommandType::BuilderProduceItem, vec![factory.raw(), 500, 0]);
        assert_eq!(execute_command(&mut ctx, &unknown), Err(GameError::UnknownItem(500)));

        let hold = Command::new(ATREIDES, CommandType::BuilderSetOnHold, vec![factory.raw(), 1]);
        execute_command(&mut ctx, &hold).expect("held");
        assert!(ctx.objects.get(factory).and_then(GameObject::builder).is_some_and(|b| b.on_hold));
    }

    #[test]
    fn test_structure_commands() {
        let mut ctx = context();
        let trap = ctx
            .spawn_structure(ItemId::WindTrap, HouseId::Atreides, Coord::new(2, 2))
            .expect("placed");
        let repair = Command::on_object(ATREIDES, CommandType::StructureRepair, trap);
        execute_command(&mut ctx, &repair).expect("undamaged");
        assert!(ctx.objects.get(trap).and_then(GameObject::as_structure).is_some_and(|s| !s.repairing));

        ctx.damage_object(trap, Fixed::from_num(50), None);
        execute_command(&mut ctx, &repair).expect("damaged");
        assert!(ctx.objects.get(trap).and_then(GameObject::as_structure).is_some_and(|s| s.repairing));

        let deploy = Command::new(
            ATREIDES,
            CommandType::StructureSetDeployPosition,
            vec![trap.raw(), 6, 7],
        );
        execute_command(&mut ctx, &deploy).expect("set");
        assert_eq!(
            ctx.objects.get(trap).and_then(GameObject::as_structure).map(|s| s.deploy_point),
            Some(Coord::new(6, 7))
        );
    }

    #[test]
    fn test_mcv_deploy_command() {
        let mut ctx = context();
        let mcv = ctx.spawn_unit(ItemId::Mcv, HouseId::Atreides, Coord::new(5, 5)).expect("spawn");
        execute_command(&mut ctx, &Command::on_object(ATREIDES, CommandType::McvDeploy, mcv)).expect("deploy");
        ctx.reap();
        assert!(ctx.objects.get(mcv).is_none());
        assert!(ctx.objects.iter().any(|(_, o)| o.item() == ItemId::ConstructionYard));
    }

    #[test]
    fn test_carryall_drop_without_carryall_keeps_asking() {
        let mut ctx = context();
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(3, 3)).expect("spawn");
        let command = Command::new(
            ATREIDES,
            CommandType::UnitRequestCarryallDrop,
            vec![tank.raw(), 20, 20],
        );
        execute_command(&mut ctx, &command).expect("requested");
        let unit = ctx.objects.get(tank).expect("alive");
        assert_eq!(unit.base.attack_mode, AttackMode::CarryallRequested);
        assert_eq!(unit.base.destination, Coord::new(20, 20));
    }

    #[test]
    fn test_sync_mismatch_emits_desync() {
        let mut ctx = context();
        let hash = ctx.state_hash() as u32;
        let good = Command::new(ATREIDES, CommandType::TestSync, vec![hash]);
        execute_command(&mut ctx, &good).expect("sync");
        assert!(ctx.events.is_empty());

        let bad = Command::new(ATREIDES, CommandType::TestSync, vec![hash.wrapping_add(1)]);
        execute_command(&mut ctx, &bad).expect("sync");
        assert!(matches!(ctx.events.last(), Some(GameEvent::Desync { .. })));
    }
}
