//! Maps integer signatures onto a fixed range of bucket ids.

use std::num::NonZeroUsize;

use crate::error::{MemoryError, MemoryResult};

/// Integer signature produced by an embedding source.
pub type Signature = i64;

/// Index of a bucket in `[0, num_buckets)`.
pub type BucketId = usize;

/// Pure, total signature → bucket mapping.
///
/// Negative signatures are normalized with a euclidean remainder, so every
/// `i64` (including `i64::MIN`) lands in range. The bucket count is fixed for
/// the lifetime of the hasher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketHasher {
    num_buckets: NonZeroUsize,
}

impl BucketHasher {
    /// Create a hasher over `num_buckets` buckets. Zero buckets is rejected.
    pub fn new(num_buckets: usize) -> MemoryResult<Self> {
        let num_buckets = NonZeroUsize::new(num_buckets).ok_or_else(|| {
            MemoryError::InvalidArgument("num_buckets must be at least 1".to_string())
        })?;
        Ok(Self { num_buckets })
    }

    pub fn num_buckets(&self) -> usize {
        self.num_buckets.get()
    }

    pub fn bucket_of(&self, signature: Signature) -> BucketId {
        let n = self.num_buckets.get() as i128;
        (i128::from(signature).rem_euclid(n)) as BucketId
    }
}
