use std::hash::{BuildHasher, Hasher};

/// Return a 64-bit digest for `bytes`, stable across runs, processes
/// and platforms. No randomized seeding.
///
/// Reduce-key digests persisted by the [mri][crate::mri] engine are
/// computed with this function, refer [cityhash_rs] for details.
#[inline]
pub fn digest64(bytes: &[u8]) -> u64 {
    let digest = cityhash_rs::cityhash_110_128(bytes);
    ((digest >> 64) as u64) ^ ((digest & 0xFFFFFFFFFFFFFFFF) as u64)
}

/// Type uses google's city hash to convert [Hash][std::hash::Hash]able
/// key into ``u64``. Refer [cityhash_rs] for details.
#[derive(Clone, Copy, Default)]
pub struct CityHasher {
    digest: u128,
}

impl CityHasher {
    pub fn new() -> CityHasher {
        CityHasher::default()
    }
}

impl BuildHasher for CityHasher {
    type Hasher = Self;

    #[inline]
    fn build_hasher(&self) -> Self {
        *self
    }
}

impl Hasher for CityHasher {
    fn finish(&self) -> u64 {
        ((self.digest >> 64) as u64) ^ ((self.digest & 0xFFFFFFFFFFFFFFFF) as u64)
    }

    fn write(&mut self, bytes: &[u8]) {
        self.digest = cityhash_rs::cityhash_110_128(bytes);
    }
}
