use rand::prelude::*;

use super::*;

/// Seeded gameplay randomness. Every random decision of a game is drawn from one of these, so two engines built
/// from the same seed and fed the same actions stay in lockstep.
#[derive(Clone, Debug)]
pub struct GameRng {
    rng: SmallRng,
    calls: u64,
}

impl GameRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            calls: 0,
        }
    }

    pub fn next_color(&mut self) -> BlockColor {
        self.calls += 1;
        BlockColor::ALL[self.rng.random_range(0..BlockColor::ALL.len())]
    }

    /// Uniform index in `0..bound`, or 0 when the range is empty.
    pub fn next_index(&mut self, bound: usize) -> usize {
        self.calls += 1;
        if bound == 0 {
            return 0;
        }
        self.rng.random_range(0..bound)
    }

    pub fn next_float(&mut self) -> f32 {
        self.calls += 1;
        self.rng.random()
    }

    pub fn next_bool(&mut self) -> bool {
        self.calls += 1;
        self.rng.random()
    }

    /// Splits off an independent generator seeded from this stream.
    pub fn fork(&mut self) -> GameRng {
        self.calls += 1;
        GameRng::new(self.rng.random())
    }

    pub fn call_count(&self) -> u64 {
        self.calls
    }
}
