//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays, saves and lockstep play all assume that a game built from the
//! same map, rules and seed reaches the same state hash after the same
//! commands. Sources of non-determinism include:
//!
//! - **Floating-point math**: The core uses [`dune_core::math::Fixed`]
//!   throughout.
//!
//! - **HashMap iteration order**: Objects are always visited in ID order.
//!
//! - **System randomness**: All random choices draw from seeded ChaCha
//!   generators whose positions are saved.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual behaviours (movement, combat, carryalls)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full AI games are reproducible
//! 4. **Parallel tests**: Running N games on N threads all match

use std::thread;

use tracing::warn;

use dune_core::game::Game;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run two games built by `setup_fn` for `num_ticks` and compare hashes.
///
/// # Example
///
/// ```ignore
/// use dune_core::ai::Difficulty;
/// use dune_test_utils::determinism::verify_game_determinism;
/// use dune_test_utils::fixtures::ai_skirmish;
///
/// assert!(verify_game_determinism(|| ai_skirmish(7, Difficulty::Hard), 1000));
/// ```
pub fn verify_game_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Game,
{
    verify_determinism(2, num_ticks, &setup_fn, Game::advance_tick, Game::state_hash).is_deterministic
}

/// Run N games on scoped threads and collect the final hashes.
///
/// Catches non-determinism that only shows up under different memory
/// layouts or thread scheduling.
pub fn run_parallel_games<F>(setup_fn: F, num_games: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Game + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_games)
            .map(|_| {
                s.spawn(|| {
                    let mut game = setup_fn();
                    for _ in 0..num_ticks {
                        game.advance_tick();
                    }
                    game.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two runs tick by tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree throughout, `Some(tick)` for the first tick
/// whose hashes differ.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Game,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        first.advance_tick();
        second.advance_tick();

        if first.state_hash() != second.state_hash() {
            warn!(tick, first = first.state_hash(), second = second.state_hash(), "games diverged");
            return Some(tick);
        }
    }

    None
}

/// Verify that a save taken after `num_ticks` restores the same state and
/// that the restored game keeps evolving identically for `continue_ticks`.
pub fn verify_save_determinism<F>(setup_fn: F, num_ticks: u64, continue_ticks: u64) -> bool
where
    F: Fn() -> Game,
{
    let mut game = setup_fn();
    for _ in 0..num_ticks {
        game.advance_tick();
    }

    let Ok(bytes) = game.save() else {
        return false;
    };
    let Ok(mut restored) = Game::load(&bytes) else {
        return false;
    };
    if restored.state_hash() != game.state_hash() {
        return false;
    }

    for _ in 0..continue_ticks {
        game.advance_tick();
        restored.advance_tick();
    }
    restored.state_hash() == game.state_hash()
}

/// Proptest strategies for simulation inputs.
///
/// These strategies generate random but reproducible inputs for
/// property-based tests against the core.
pub mod strategies {
    use dune_core::command::{Command, CommandType};
    use dune_core::coord::Coord;
    use dune_core::data::ItemId;
    use dune_core::math::Fixed;
    use proptest::prelude::*;
    use proptest::sample::select;

    /// Any unit type.
    pub fn arb_unit_item() -> impl Strategy<Value = ItemId> {
        select(ItemId::ALL.into_iter().filter(|i| i.is_unit()).collect::<Vec<_>>())
    }

    /// Ground combat unit types, the ones that can be ferried and fight.
    pub fn arb_ground_combat_item() -> impl Strategy<Value = ItemId> {
        select(vec![
            ItemId::Trike,
            ItemId::Quad,
            ItemId::Tank,
            ItemId::SiegeTank,
            ItemId::Launcher,
            ItemId::Soldier,
            ItemId::Trooper,
        ])
    }

    /// Any structure type except slabs, which never become objects.
    pub fn arb_structure_item() -> impl Strategy<Value = ItemId> {
        select(
            ItemId::ALL
                .into_iter()
                .filter(|i| i.is_structure() && !i.is_slab())
                .collect::<Vec<_>>(),
        )
    }

    /// A tile on a `width` x `height` map.
    pub fn arb_coord(width: i32, height: i32) -> impl Strategy<Value = Coord> {
        (0..width, 0..height).prop_map(|(x, y)| Coord::new(x, y))
    }

    /// Damage amounts from a scratch to several times any unit's health.
    pub fn arb_damage() -> impl Strategy<Value = Fixed> {
        (0i32..5000, 0u32..100).prop_map(|(whole, hundredths)| {
            Fixed::from_num(whole) + Fixed::from_num(hundredths) / Fixed::from_num(100)
        })
    }

    /// A sequence of damage amounts.
    pub fn arb_damage_sequence(max_len: usize) -> impl Strategy<Value = Vec<Fixed>> {
        proptest::collection::vec(arb_damage(), 1..max_len)
    }

    /// Any command type.
    pub fn arb_command_type() -> impl Strategy<Value = CommandType> {
        select(CommandType::ALL.to_vec())
    }

    /// A command of some type whose parameter count is wrong, every
    /// parameter set to `param`.
    pub fn arb_wrong_arity_command(player: u8, param: u32) -> impl Strategy<Value = Command> {
        (arb_command_type(), 0usize..8)
            .prop_filter("arity must differ", |(kind, len)| *len != kind.arity())
            .prop_map(move |(kind, len)| Command::new(player, kind, vec![param; len]))
    }
}
