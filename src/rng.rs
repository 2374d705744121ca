//! Injectable randomness for the automaton.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The two kinds of draws the movement rules make.
pub trait RandomSource {
    /// Uniform in `[0, 1)`.
    fn next_f32(&mut self) -> f32;

    /// Uniform in `0..len`. `len` is never zero.
    fn next_index(&mut self, len: usize) -> usize;

    /// True with probability `p`.
    fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_f32(&mut self) -> f32 {
        (**self).next_f32()
    }

    fn next_index(&mut self, len: usize) -> usize {
        (**self).next_index(len)
    }
}

/// Default source backed by a seedable `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn from_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Underlying generator, for callers that need richer draws (world generation).
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl RandomSource for SeededRandom {
    fn next_f32(&mut self) -> f32 {
        self.rng.gen_range(0.0f32..1.0)
    }

    fn next_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        self.rng.gen_range(0..len.max(1))
    }
}

/// Returns the same float for every draw and always the first index.
///
/// `FixedRandom(0.0)` passes every probability check. `FixedRandom(0.99)` never settles and
/// never rolls a grade whose roll chance is below 0.99 (variants 4 and 5 still roll).
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f32);

impl RandomSource for FixedRandom {
    fn next_f32(&mut self) -> f32 {
        self.0
    }

    fn next_index(&mut self, _len: usize) -> usize {
        0
    }
}

/// Replays a script of floats and indices, cycling when exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    floats: Vec<f32>,
    indices: Vec<usize>,
    next_float: usize,
    next_idx: usize,
}

impl ScriptedRandom {
    pub fn new(floats: Vec<f32>, indices: Vec<usize>) -> Self {
        Self { floats, indices, next_float: 0, next_idx: 0 }
    }

    /// Number of float draws served so far.
    pub fn float_draws(&self) -> usize {
        self.next_float
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f32(&mut self) -> f32 {
        let v = if self.floats.is_empty() {
            0.0
        } else {
            self.floats[self.next_float % self.floats.len()]
        };
        self.next_float += 1;
        v
    }

    fn next_index(&mut self, len: usize) -> usize {
        let v = if self.indices.is_empty() {
            0
        } else {
            self.indices[self.next_idx % self.indices.len()]
        };
        self.next_idx += 1;
        v % len.max(1)
    }
}
