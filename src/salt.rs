//! Salt generation strategies for the batch harness.
//!
//! Three interchangeable sources feed the predictor: a deterministic counter
//! form for reproducible benchmarks, a crypto-random form for production salt
//! selection, and a PCG32 lane stream mirroring the GPU kernel's generator.

use rand::rngs::OsRng;
use rand::RngCore;

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// Multiplier of the PCG32 LCG step.
const PCG32_MULT: u64 = 6364136223846793005;

/// Large odd constant decorrelating lane streams; the Metal kernel uses the
/// same value so CPU and GPU salt streams line up for identical seeds.
pub const PCG32_STREAM_STRIDE: u64 = 0x9e3779b97f4a7c15;

/// PCG32 (XSH-RR 64/32) pseudorandom generator
///
/// Statistically strong and fast, but NOT cryptographically secure; only
/// acceptable for benchmark and throughput workloads. This is the reference
/// implementation the GPU kernel must match bit-for-bit.
#[derive(Debug, Clone)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    /// Seed with an initial state and a stream selector (pcg32_srandom_r).
    pub fn new(initstate: u64, initseq: u64) -> Self {
        let mut rng = Pcg32 {
            state: 0,
            inc: (initseq << 1) | 1,
        };
        rng.next_u32();
        rng.state = rng.state.wrapping_add(initstate);
        rng.next_u32();
        rng
    }

    /// Per-lane seeding: state from `base_seed + lane`, stream decorrelated by
    /// `stream_index` times a large odd constant so lanes never collide.
    pub fn for_lane(base_seed: u64, lane: u64, stream_index: u64) -> Self {
        Self::new(
            base_seed.wrapping_add(lane),
            stream_index.wrapping_mul(PCG32_STREAM_STRIDE),
        )
    }

    #[inline(always)]
    pub fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.state = old.wrapping_mul(PCG32_MULT).wrapping_add(self.inc);
        let xorshifted = (((old >> 18) ^ old) >> 27) as u32;
        let rot = (old >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// One 32-hex-character salt: four low-order nibbles from each of eight
    /// successive 32-bit outputs, low nibble first.
    pub fn next_salt(&mut self) -> String {
        let mut salt = String::with_capacity(32);
        for _ in 0..8 {
            let word = self.next_u32();
            for k in 0..4 {
                let nibble = (word >> (4 * k)) & 0x0f;
                salt.push(HEX_CHARS[nibble as usize] as char);
            }
        }
        salt
    }
}

/// Salt strategy selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaltStrategy {
    /// `"Salt-<i>"` for iteration index i; reproducible benchmarking
    Sequential,
    /// 16 bytes from the OS entropy source, hex encoded to 32 chars
    CryptoRandom,
    /// Seeded PCG32 lane stream, as on the GPU
    LanePrng,
}

impl std::fmt::Display for SaltStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaltStrategy::Sequential => write!(f, "sequential"),
            SaltStrategy::CryptoRandom => write!(f, "random"),
            SaltStrategy::LanePrng => write!(f, "prng"),
        }
    }
}

/// Error types for salt generation
#[derive(Debug)]
pub enum SaltError {
    /// OS entropy source unavailable; aborts the batch rather than silently
    /// substituting a weaker generator
    RandomSource(rand::Error),
}

impl std::fmt::Display for SaltError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaltError::RandomSource(e) => write!(f, "random source failure: {}", e),
        }
    }
}

impl std::error::Error for SaltError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SaltError::RandomSource(e) => Some(e),
        }
    }
}

/// Per-worker salt source; one instance per dispatch lane
pub enum SaltSource {
    Sequential,
    CryptoRandom(OsRng),
    LanePrng(Pcg32),
}

impl SaltSource {
    pub fn for_lane(strategy: SaltStrategy, base_seed: u64, lane: u64) -> Self {
        match strategy {
            SaltStrategy::Sequential => SaltSource::Sequential,
            SaltStrategy::CryptoRandom => SaltSource::CryptoRandom(OsRng),
            SaltStrategy::LanePrng => SaltSource::LanePrng(Pcg32::for_lane(base_seed, lane, lane)),
        }
    }

    /// Produce the salt for global iteration `index`
    pub fn next(&mut self, index: usize) -> Result<String, SaltError> {
        match self {
            SaltSource::Sequential => Ok(format!("Salt-{}", index)),
            SaltSource::CryptoRandom(rng) => {
                let mut bytes = [0u8; 16];
                rng.try_fill_bytes(&mut bytes)
                    .map_err(SaltError::RandomSource)?;
                Ok(hex::encode(bytes))
            }
            SaltSource::LanePrng(rng) => Ok(rng.next_salt()),
        }
    }
}
