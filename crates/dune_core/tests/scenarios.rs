//! End-to-end scenarios run through the public `Game` API.

use dune_core::ai::settings::harvester_limit;
use dune_core::ai::Difficulty;
use dune_core::command::{execute_command, Command, CommandType};
use dune_core::coord::Coord;
use dune_core::data::{HouseId, ItemId};
use dune_core::game::{Game, GameEvent, GameMode};
use dune_core::math::Fixed;
use dune_core::objects::{request_carryall, AttackMode, GameObject, ObjectId, Targetable};
use dune_test_utils::fixtures::{
    ai_skirmish, game_with_houses, plateau_map, rock_map, run_until, skirmish, spawn_structure, spawn_unit,
    DEFAULT_SEED,
};
use dune_test_utils::init_tracing;

fn object(game: &Game, id: ObjectId) -> &GameObject {
    game.context().objects.get(id).expect("object is alive")
}

fn touches_footprint(structure: &GameObject, pos: Coord) -> bool {
    let closest = structure.closest_point(pos);
    closest != pos && closest.chebyshev_distance(pos) == 1
}

#[test]
fn test_full_harvester_unloads_at_refinery() {
    init_tracing();
    let map = plateau_map(64, 64, Coord::new(4, 4), Coord::new(30, 30));
    let mut game = game_with_houses(map, DEFAULT_SEED, &[HouseId::Atreides], 0);
    let refinery = spawn_structure(&mut game, ItemId::Refinery, HouseId::Atreides, Coord::new(10, 10));
    let harvester = spawn_unit(&mut game, ItemId::Harvester, HouseId::Atreides, Coord::new(18, 11));
    let capacity = Fixed::from_num(game.context().rules.constants.harvester_capacity);
    game.context_mut().with_object(harvester, |obj, _| {
        if let Some(state) = obj.harvester_mut() {
            state.spice = capacity;
        }
    });

    let mut busy_while_docked = false;
    let mut was_docked = false;
    let returned = run_until(&mut game, 3000, |g| {
        let dock = object(g, refinery).dock().cloned().expect("refinery dock");
        if dock.docked == Some(harvester) {
            was_docked = true;
            busy_while_docked = !dock.is_free();
        }
        was_docked && !object(g, harvester).is_off_map()
    });

    assert!(returned.is_some(), "harvester never came back out");
    assert!(busy_while_docked);
    let unit = object(&game, harvester);
    assert!(
        touches_footprint(object(&game, refinery), unit.base.location),
        "deployed at {:?}",
        unit.base.location
    );
    assert_eq!(unit.harvester().map(|h| h.spice), Some(Fixed::ZERO));
    assert_eq!(game.context().house(HouseId::Atreides).credits, capacity);
}

#[test]
fn test_damaged_unit_is_ferried_to_repair() {
    init_tracing();
    let mut game = game_with_houses(rock_map(64, 64), DEFAULT_SEED, &[HouseId::Ordos], 5000);
    let yard = spawn_structure(&mut game, ItemId::RepairYard, HouseId::Ordos, Coord::new(40, 40));
    spawn_unit(&mut game, ItemId::Carryall, HouseId::Ordos, Coord::new(30, 30));
    let tank = spawn_unit(&mut game, ItemId::Tank, HouseId::Ordos, Coord::new(8, 8));
    let max = object(&game, tank).max_health(&game.context().rules);
    game.context_mut().damage_object(tank, max * Fixed::from_num(3) / Fixed::from_num(5), None);
    assert_eq!(object(&game, tank).base.health, max * Fixed::from_num(2) / Fixed::from_num(5));

    game.queue_command(Command::on_object(
        Command::player_of(HouseId::Ordos),
        CommandType::UnitSendToRepair,
        tank,
    ));
    game.advance_tick();
    let ground = object(&game, tank).ground().cloned().expect("ground unit");
    assert!(ground.awaiting_pickup);
    assert!(ground.booked_carrier.is_some());

    let lifted = run_until(&mut game, 2000, |g| object(g, tank).ground().is_some_and(|u| u.picked_up));
    assert!(lifted.is_some(), "carryall never arrived");
    let location = object(&game, tank).base.location;
    assert_ne!(game.context().map.tile(location).and_then(|t| t.ground()), Some(tank));

    let docked = run_until(&mut game, 2000, |g| object(g, tank).ground().is_some_and(|u| u.docked_at.is_some()));
    assert!(docked.is_some(), "never reached the repair yard");
    let unit = object(&game, tank);
    assert_eq!(unit.ground().and_then(|g| g.docked_at), Some(yard));
    assert!(object(&game, yard).occupies(unit.base.location));
    assert!(!unit.ground().is_some_and(|g| g.awaiting_pickup || g.picked_up));

    let repaired = run_until(&mut game, 3000, |g| object(g, tank).base.health == max);
    assert!(repaired.is_some());
}

#[test]
fn test_attack_on_destroyed_unit_is_ignored() {
    init_tracing();
    let mut game = game_with_houses(rock_map(32, 32), DEFAULT_SEED, &[HouseId::Atreides, HouseId::Harkonnen], 0);
    let tank = spawn_unit(&mut game, ItemId::Tank, HouseId::Atreides, Coord::new(4, 4));
    let trike = spawn_unit(&mut game, ItemId::Trike, HouseId::Harkonnen, Coord::new(20, 20));
    game.context_mut().kill_object(trike, None);
    game.advance_tick();
    assert!(game.context().objects.get(trike).is_none());

    let command = Command::attack_object(Command::player_of(HouseId::Atreides), tank, trike, true);
    let before = game.state_hash();
    assert_eq!(execute_command(game.context_mut(), &command), Ok(()));
    assert_eq!(game.state_hash(), before);

    game.queue_command(command);
    game.advance_tick();
    assert!(game.take_rejected().is_empty());
    assert_eq!(object(&game, tank).base.target, None);
}

#[test]
fn test_one_request_books_one_carryall() {
    init_tracing();
    let mut game = game_with_houses(rock_map(32, 32), DEFAULT_SEED, &[HouseId::Fremen], 0);
    let first = spawn_unit(&mut game, ItemId::Carryall, HouseId::Fremen, Coord::new(10, 10));
    let second = spawn_unit(&mut game, ItemId::Carryall, HouseId::Fremen, Coord::new(12, 12));
    let quad = spawn_unit(&mut game, ItemId::Quad, HouseId::Fremen, Coord::new(3, 3));

    let ctx = game.context_mut();
    assert_eq!(ctx.with_object(quad, |obj, ctx| request_carryall(ctx, obj)), Some(true));
    assert_eq!(ctx.with_object(quad, |obj, ctx| request_carryall(ctx, obj)), Some(false));

    let booked: Vec<ObjectId> = [first, second]
        .into_iter()
        .filter(|&c| game.context().objects.get(c).and_then(|o| o.base.target) == Some(quad))
        .collect();
    assert_eq!(booked, vec![first]);
    assert_eq!(object(&game, quad).ground().and_then(|g| g.booked_carrier), Some(first));
    assert_eq!(object(&game, second).base.target, None);
}

#[test]
fn test_brutal_harvester_limit_on_reference_map() {
    assert_eq!(harvester_limit(Difficulty::Brutal, GameMode::Custom, 4096), 25);

    let mut game = skirmish(DEFAULT_SEED);
    assert_eq!(game.context().map.tile_count(), 4096);
    game.add_ai_player(HouseId::Harkonnen, Difficulty::Brutal);
    game.run_ticks(60);
    let bot = &game.ai_players()[0];
    assert_eq!(bot.harvester_limit(), 25);
    assert_eq!(bot.military_value_limit(), 60000);
}

// ===== Longer games =====

#[test]
fn test_ai_houses_build_bases() {
    init_tracing();
    let mut game = ai_skirmish(DEFAULT_SEED, Difficulty::Brutal);
    game.run_ticks(8000);

    let ctx = game.context();
    for house in [HouseId::Atreides, HouseId::Harkonnen] {
        let structures = ctx
            .objects
            .iter()
            .filter(|(_, o)| o.owner() == house && o.is_structure())
            .count();
        assert!(structures >= 3, "{house:?} built only {structures} structures");
    }
}

#[test]
fn test_reinforcements_arrive_by_air() {
    init_tracing();
    let mut game = game_with_houses(rock_map(40, 40), DEFAULT_SEED, &[HouseId::Sardaukar], 0);
    let carrier = game
        .deliver_reinforcements(HouseId::Sardaukar, &[ItemId::Trooper, ItemId::Tank], Coord::new(20, 20))
        .expect("carrier");
    let mut drops = 0;
    let done = run_until(&mut game, 3000, |g| {
        drops += g.events().iter().filter(|e| matches!(e, GameEvent::CarryallDrop { .. })).count();
        g.context().objects.get(carrier).is_none()
    });
    assert!(done.is_some(), "reinforcement carryall never left");
    assert_eq!(drops, 2);
    let arrived = game
        .context()
        .objects
        .iter()
        .filter(|(_, o)| o.owner() == HouseId::Sardaukar && !o.is_off_map())
        .count();
    assert_eq!(arrived, 2);
    assert!(game
        .context()
        .objects
        .iter()
        .all(|(_, o)| o.base.attack_mode == AttackMode::AreaGuard));
}
