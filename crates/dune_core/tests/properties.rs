//! Property tests over random inputs.

use dune_core::ai::find_place_location;
use dune_core::command::{execute_command, Command};
use dune_core::coord::Coord;
use dune_core::data::{HouseId, ItemId};
use dune_core::error::GameError;
use dune_core::game::GameContext;
use dune_core::math::Fixed;
use dune_core::objects::{request_carryall, ObjectId};
use dune_test_utils::determinism::strategies::{
    arb_coord, arb_damage_sequence, arb_ground_combat_item, arb_structure_item, arb_unit_item,
    arb_wrong_arity_command,
};
use dune_test_utils::fixtures::{game_with_houses, plateau_map, rock_map, DEFAULT_SEED};
use proptest::prelude::*;

const PLAYER: HouseId = HouseId::Atreides;

/// Every carryall's pickup target, checking that no unit is claimed twice
/// and that every claimed unit knows its carrier.
fn assert_bookings_exclusive(ctx: &GameContext) -> Result<(), TestCaseError> {
    let mut claimed: Vec<ObjectId> = Vec::new();
    for (carrier, object) in ctx.objects.iter() {
        if object.carryall().is_none() {
            continue;
        }
        let Some(target) = object.base.target else {
            continue;
        };
        let Some(ground) = ctx.objects.get(target).and_then(|t| t.ground()) else {
            continue;
        };
        prop_assert!(!claimed.contains(&target), "{target} booked twice");
        claimed.push(target);
        prop_assert_eq!(ground.booked_carrier, Some(carrier));
    }
    for (id, object) in ctx.objects.iter() {
        if let Some(ground) = object.ground() {
            if ground.awaiting_pickup {
                prop_assert!(ground.booked_carrier.is_some(), "{id} waits without a carrier");
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_health_never_negative(
        item in arb_unit_item(),
        hits in arb_damage_sequence(20),
    ) {
        let mut game = game_with_houses(rock_map(16, 16), DEFAULT_SEED, &[PLAYER], 0);
        let ctx = game.context_mut();
        let Some(id) = ctx.spawn_unit(item, PLAYER, Coord::new(8, 8)) else {
            return Ok(());
        };
        for amount in hits {
            ctx.damage_object(id, amount, None);
            if let Some(object) = ctx.objects.get(id) {
                prop_assert!(object.base.health >= Fixed::ZERO);
            }
        }
        ctx.reap();
        if let Some(object) = ctx.objects.get(id) {
            prop_assert!(object.base.health > Fixed::ZERO);
        }
    }

    #[test]
    fn prop_carryall_bookings_exclusive(
        carriers in proptest::collection::vec(arb_coord(24, 24), 1..4),
        cargo in proptest::collection::vec((arb_ground_combat_item(), arb_coord(24, 24)), 1..6),
        cancel in proptest::collection::vec(any::<bool>(), 6),
    ) {
        let mut game = game_with_houses(rock_map(24, 24), DEFAULT_SEED, &[PLAYER], 0);
        let ctx = game.context_mut();
        for pos in carriers {
            let _ = ctx.spawn_unit(ItemId::Carryall, PLAYER, pos);
        }
        let units: Vec<ObjectId> = cargo
            .into_iter()
            .filter_map(|(item, pos)| ctx.spawn_unit(item, PLAYER, pos))
            .collect();

        for &unit in &units {
            let _ = ctx.with_object(unit, |obj, _| obj.base.destination = Coord::new(23 - obj.base.location.x, 2));
            let _ = ctx.with_object(unit, |obj, ctx| request_carryall(ctx, obj));
            let _ = ctx.with_object(unit, |obj, ctx| request_carryall(ctx, obj));
            assert_bookings_exclusive(ctx)?;
        }

        for (&unit, &cancel) in units.iter().zip(&cancel) {
            if !cancel {
                continue;
            }
            let picked_up = ctx.objects.get(unit).and_then(|u| u.ground()).is_some_and(|g| g.picked_up);
            let forced = Command::move_to(Command::player_of(PLAYER), unit, Coord::new(1, 1), true);
            prop_assert_eq!(execute_command(ctx, &forced), Ok(()));
            if !picked_up {
                let ground = ctx.objects.get(unit).and_then(|u| u.ground()).cloned();
                prop_assert!(ground.is_some_and(|g| !g.awaiting_pickup && g.booked_carrier.is_none()));
            }
        }
        assert_bookings_exclusive(game.context())?;

        for _ in 0..200 {
            game.advance_tick();
            assert_bookings_exclusive(game.context())?;
        }
    }

    #[test]
    fn prop_registry_ids_unique_and_dead_ids_stay_dead(
        spawns in proptest::collection::vec((arb_unit_item(), arb_coord(20, 20)), 1..25),
        kills in proptest::collection::vec(any::<bool>(), 25),
    ) {
        let mut game = game_with_houses(rock_map(20, 20), DEFAULT_SEED, &[PLAYER], 0);
        let ctx = game.context_mut();
        let mut dead: Vec<ObjectId> = Vec::new();
        for (i, (item, pos)) in spawns.into_iter().enumerate() {
            let Some(id) = ctx.spawn_unit(item, PLAYER, pos) else {
                continue;
            };
            prop_assert!(!dead.contains(&id), "reused id {id}");
            if kills[i] {
                ctx.kill_object(id, None);
                ctx.reap();
                dead.push(id);
            }
            let mut live = ctx.objects.ids();
            let count = live.len();
            live.sort();
            live.dedup();
            prop_assert_eq!(live.len(), count);
            for &gone in &dead {
                prop_assert!(ctx.objects.get(gone).is_none());
            }
        }
    }

    #[test]
    fn prop_wrong_arity_is_rejected_without_effect(
        command in arb_wrong_arity_command(Command::player_of(PLAYER), 0),
    ) {
        let mut game = game_with_houses(rock_map(16, 16), DEFAULT_SEED, &[PLAYER], 1000);
        let ctx = game.context_mut();
        let tank = ctx.spawn_unit(ItemId::Tank, PLAYER, Coord::new(4, 4)).expect("tank");
        ctx.spawn_structure(ItemId::ConstructionYard, PLAYER, Coord::new(8, 8)).expect("yard");
        ctx.events.clear();
        let command = Command { params: vec![tank.raw(); command.params.len()], ..command };
        let before = ctx.state_hash();

        let result = execute_command(ctx, &command);
        prop_assert!(matches!(result, Err(GameError::InvalidArgument(_))), "{:?}", result);
        prop_assert_eq!(ctx.state_hash(), before);
        prop_assert!(ctx.events.is_empty());
    }

    #[test]
    fn prop_found_placement_is_legal(
        item in arb_structure_item(),
        extra in proptest::collection::vec((arb_structure_item(), arb_coord(40, 40)), 0..6),
        enemies in proptest::collection::vec(arb_coord(40, 40), 0..6),
        rally in arb_coord(40, 40),
    ) {
        let map = plateau_map(40, 40, Coord::new(4, 4), Coord::new(28, 28));
        let mut game = game_with_houses(map, DEFAULT_SEED, &[PLAYER, HouseId::Ordos], 0);
        let ctx = game.context_mut();
        ctx.spawn_structure(ItemId::ConstructionYard, PLAYER, Coord::new(14, 14)).expect("yard");
        for (extra_item, pos) in extra {
            if ctx.map.okay_to_place_structure(&ctx.objects, &ctx.rules, extra_item, pos, PLAYER) {
                let _ = ctx.spawn_structure(extra_item, PLAYER, pos);
            }
        }
        for pos in enemies {
            let _ = ctx.spawn_unit(ItemId::Trike, HouseId::Ordos, pos);
        }

        let pos = find_place_location(ctx, PLAYER, item, rally);
        if pos.is_valid() {
            prop_assert!(ctx.map.okay_to_place_structure(&ctx.objects, &ctx.rules, item, pos, PLAYER));
        }
    }
}

#[test]
fn test_placement_found_in_open_base() {
    let map = plateau_map(40, 40, Coord::new(4, 4), Coord::new(28, 28));
    let mut game = game_with_houses(map, DEFAULT_SEED, &[PLAYER], 0);
    let ctx = game.context_mut();
    ctx.spawn_structure(ItemId::ConstructionYard, PLAYER, Coord::new(14, 14)).expect("yard");
    for item in ItemId::ALL.into_iter().filter(|i| i.is_structure() && !i.is_slab()) {
        assert!(find_place_location(ctx, PLAYER, item, Coord::INVALID).is_valid(), "{item}");
    }
}
