use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Random state owned by one simulation run.
///
/// Components that need randomness derive an independent stream from the
/// run seed and a label, so results do not depend on the order in which
/// components draw numbers.
#[derive(Debug, Clone)]
pub struct RunContext {
    seed: u64,
}

impl RunContext {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A fresh generator for the component named `label`.
    pub fn rng_for(&self, label: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(derive_seed(self.seed, label))
    }
}

/// Mixes `label` into `seed` with 64-bit FNV-1a.
pub fn derive_seed(seed: u64, label: &str) -> u64 {
    let hash = label.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    seed ^ hash
}
