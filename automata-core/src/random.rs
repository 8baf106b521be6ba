use fastrand::Rng;
use itertools::Itertools;
use tracing::debug;

use crate::prelude::*;

/// Generates a random, complete Mealy machine with `size` states over the given alphabet whose
/// outputs are drawn from `0..outputs`. Every state is reachable from the initial state `0`.
///
/// The algorithm works in two phases:
/// 1. Build a random spanning tree: each new state becomes the target of a transition that is
///    drawn uniformly from the free transitions of the states that already exist.
/// 2. Every remaining transition gets a uniformly drawn target.
///
/// The machine is not necessarily minimal. Passing an [`Rng`] with a fixed seed makes the
/// result reproducible.
pub fn generate_random_mealy<A: Alphabet>(
    rng: &mut Rng,
    alphabet: A,
    size: usize,
    outputs: usize,
) -> MealyMachine<A, usize> {
    assert!(size > 0, "a Mealy machine needs at least one state");
    assert!(outputs > 0, "there must be at least one output");
    assert!(!alphabet.is_empty(), "the alphabet must not be empty");

    let symbols = alphabet.universe().collect_vec();
    let mut mm = MealyMachine::new(alphabet);
    let initial = mm.add_state();

    let mut free = symbols.iter().map(|&s| (initial, s)).collect_vec();
    for _ in 1..size {
        let (source, symbol) = free.swap_remove(rng.usize(..free.len()));
        let target = mm.add_state();
        mm.add_transition(source, symbol, rng.usize(..outputs), target);
        free.extend(symbols.iter().map(|&s| (target, s)));
    }

    for (source, symbol) in free {
        let target = rng.u32(..(size as DefaultIdType));
        mm.add_transition(source, symbol, rng.usize(..outputs), target);
    }
    debug!("generated random Mealy machine with {size} states");
    mm.with_initial(initial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn random_machines_are_complete_and_reproducible() {
        let first = generate_random_mealy(&mut Rng::with_seed(7), CharAlphabet::of_size(3), 10, 2);
        let second =
            generate_random_mealy(&mut Rng::with_seed(7), CharAlphabet::of_size(3), 10, 2);
        assert_eq!(first, second);
        assert_eq!(first.size(), 10);
        assert!(first.is_complete());
        assert!(first.output_range().iter().all(|o| *o < 2));
    }
}
