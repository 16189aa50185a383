// Per-history random number streams: a 64-bit LCG advanced under a PCG
// RXS-M-XS output permutation. State is one u64, so deriving a fresh
// stream per particle history costs nothing.
//
// Reference: Melissa E. O'Neill, "PCG: A Family of Simple Fast
// Space-Efficient Statistically Good Algorithms for Random Number
// Generation"

use rand::{RngCore, SeedableRng};

const LCG_MULT: u64 = 6364136223846793005;
const LCG_ADD: u64 = 1442695040888963407;
const PERM_MULT: u64 = 12605985483714917081;
/// Seed offset between consecutive history streams.
const HISTORY_STRIDE: u64 = 152917;

/// Fast RNG for particle sampling.
///
/// Every history gets its own stream through [`FastRng::from_history`], so
/// results depend only on the global seed and the history index, never on
/// how histories are scheduled across threads.
#[derive(Clone, Copy, Debug)]
pub struct FastRng {
    state: u64,
}

impl FastRng {
    #[inline]
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// The stream for one particle history.
    #[inline]
    pub fn from_history(seed: u64, history: u64) -> Self {
        Self::new(seed.wrapping_add(history.wrapping_mul(HISTORY_STRIDE)))
    }

    /// Restart the stream from a seed.
    #[inline]
    pub fn reseed(&mut self, seed: u64) {
        self.state = seed;
    }

    // Advance the LCG one step.
    #[inline(always)]
    fn step(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(LCG_MULT).wrapping_add(LCG_ADD);
        self.state
    }

    // RXS-M-XS output permutation: random xorshift, multiply, xorshift.
    #[inline(always)]
    fn permute(state: u64) -> u64 {
        let word = ((state >> ((state >> 59) + 5)) ^ state).wrapping_mul(PERM_MULT);
        (word >> 43) ^ word
    }

    /// A uniform deviate in [0, 1), built from the top 53 bits so every
    /// value is representable exactly.
    #[inline(always)]
    pub fn random(&mut self) -> f64 {
        const SCALE: f64 = 1.0 / (1u64 << 53) as f64;
        (self.next_u64() >> 11) as f64 * SCALE
    }
}

impl SeedableRng for FastRng {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(seed: u64) -> Self {
        Self::new(seed)
    }
}

impl RngCore for FastRng {
    #[inline(always)]
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline(always)]
    fn next_u64(&mut self) -> u64 {
        Self::permute(self.step())
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut chunks = dest.chunks_exact_mut(8);
        for chunk in &mut chunks {
            chunk.copy_from_slice(&self.next_u64().to_le_bytes());
        }
        let tail = chunks.into_remainder();
        if !tail.is_empty() {
            let bytes = self.next_u64().to_le_bytes();
            tail.copy_from_slice(&bytes[..tail.len()]);
        }
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
