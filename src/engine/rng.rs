// Injectable random sources for the simulation.
//
// Attention weights, simulated embeddings, cross-head influence and the
// shared-cache hit model all draw from a `RandomSource`. Components own
// their source so tests can swap in a `FixedSource`. The default generator
// is a simple XorShift64 to avoid adding the `rand` crate dependency.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of uniformly distributed values in `[0, 1)`.
pub trait RandomSource: Send {
    /// Next value in `[0, 1)`.
    fn next_f32(&mut self) -> f32;

    /// Next value in `[low, high)`.
    fn uniform(&mut self, low: f32, high: f32) -> f32 {
        low + self.next_f32() * (high - low)
    }
}

/// Simple XorShift64 RNG.
pub struct XorShiftRng {
    state: u64,
}

impl XorShiftRng {
    /// Create a new RNG from a seed. Seed of 0 is adjusted to 1.
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Create an RNG seeded from the wall clock.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self::new(splitmix64(nanos))
    }

    /// Generate the next u64 value.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

impl RandomSource for XorShiftRng {
    fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// Replays a fixed sequence of values, cycling when exhausted.
///
/// Values are clamped into `[0, 1)` so formulas built on `uniform` keep
/// their documented ranges.
pub struct FixedSource {
    values: Vec<f32>,
    next: usize,
}

impl FixedSource {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, next: 0 }
    }

    /// A source that always returns `value`.
    pub fn constant(value: f32) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for FixedSource {
    fn next_f32(&mut self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let v = self.values[self.next % self.values.len()];
        self.next = self.next.wrapping_add(1);
        v.clamp(0.0, 1.0 - f32::EPSILON)
    }
}

/// Build the source for one component.
///
/// With a seed, every component gets an independent but reproducible
/// stream derived from `seed` and its `salt`; without one the wall clock
/// is used.
pub fn seeded_source(seed: Option<u64>, salt: u64) -> Box<dyn RandomSource> {
    match seed {
        Some(seed) => Box::new(XorShiftRng::new(splitmix64(seed ^ splitmix64(salt)))),
        None => Box::new(XorShiftRng::new(splitmix64(
            XorShiftRng::from_entropy().next_u64() ^ salt,
        ))),
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
