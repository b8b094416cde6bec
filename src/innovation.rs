//! Identity allocation for neurons and genomes.
//!
//! Fresh neuron ids come from a process-wide atomic counter. Ids that enter
//! from outside (editor payloads, imported records, explicit neuron lists) are
//! reported to the counter so it never hands one of them out again.
//! Neurons created by splitting a connection get an id computed as a
//! deterministic hash of the split edge: `Hash(source, target, SPLIT_MARKER)`.
//! The same split performed independently in two genomes therefore yields the
//! same hidden neuron id, and crossover aligns the two as homologous genes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::gene::NeuronId;

/// Marker value mixed into split hashes.
const SPLIT_MARKER: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// Ids below this bound are never produced by hashing.
/// Counter-allocated and editor-supplied ids live here.
pub const RESERVED_ID_RANGE: u64 = 1 << 16;

static NEXT_NEURON_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_GENOME_ID: AtomicU64 = AtomicU64::new(1);

impl NeuronId {
    /// Allocate a process-unique neuron id.
    ///
    /// The id is greater than every counter-range id admitted into a genome
    /// so far.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_NEURON_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Advance the neuron counter past an externally supplied id.
///
/// Hashed split ids live above [`RESERVED_ID_RANGE`] and are left alone.
pub(crate) fn observe_neuron_id(id: NeuronId) {
    if id.0 < RESERVED_ID_RANGE {
        NEXT_NEURON_ID.fetch_max(id.0 + 1, Ordering::Relaxed);
    }
}

/// Identity of a genome, used to record lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenomeId(pub u64);

impl GenomeId {
    /// Allocate a process-unique genome id.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_GENOME_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// FxHash-style multiplicative hasher with a final avalanche mix.
///
/// Output is mapped into `[RESERVED_ID_RANGE, u64::MAX]`.
#[derive(Default)]
struct InnovationHasher {
    state: u64,
}

impl Hasher for InnovationHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state = self
                .state
                .wrapping_mul(0x517c_c1b7_2722_0a95)
                .wrapping_add(u64::from(byte));
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        let mut h = self.state;
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
        h ^= h >> 33;
        h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
        h ^= h >> 33;

        let range = u64::MAX - RESERVED_ID_RANGE;
        RESERVED_ID_RANGE + (h % range)
    }
}

/// Compute the id of the hidden neuron created by splitting `source -> target`.
///
/// `salt` is 0 for the first attempt; callers bump it when the id is already
/// taken in the genome being mutated.
#[inline]
#[must_use]
pub fn split_neuron_id(source: NeuronId, target: NeuronId, salt: u32) -> NeuronId {
    let mut hasher = InnovationHasher::default();
    source.0.hash(&mut hasher);
    target.0.hash(&mut hasher);
    SPLIT_MARKER.hash(&mut hasher);
    salt.hash(&mut hasher);
    NeuronId(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_id_deterministic() {
        let a = split_neuron_id(NeuronId(1), NeuronId(2), 0);
        let b = split_neuron_id(NeuronId(1), NeuronId(2), 0);
        assert_eq!(a, b, "Same split should produce same neuron id");
    }

    #[test]
    fn test_split_id_direction_and_salt_matter() {
        let forward = split_neuron_id(NeuronId(1), NeuronId(2), 0);
        assert_ne!(forward, split_neuron_id(NeuronId(2), NeuronId(1), 0));
        assert_ne!(forward, split_neuron_id(NeuronId(1), NeuronId(2), 1));
    }

    #[test]
    fn test_split_id_outside_reserved_range() {
        for i in 0..100 {
            let id = split_neuron_id(NeuronId(i), NeuronId(i + 1), 0);
            assert!(id.0 >= RESERVED_ID_RANGE);
        }
    }

    #[test]
    fn test_split_id_distribution() {
        let mut ids: Vec<u64> = (0..100)
            .map(|i| split_neuron_id(NeuronId(i), NeuronId(i + 1), 0).0)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 100, "Should have no collisions");
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = NeuronId::fresh();
        let b = NeuronId::fresh();
        assert_ne!(a, b);
        assert_ne!(GenomeId::fresh(), GenomeId::fresh());
    }

    #[test]
    fn test_fresh_skips_observed_ids() {
        observe_neuron_id(NeuronId(4_000));
        assert!(NeuronId::fresh().0 > 4_000);

        // Split ids do not drag the counter out of its range.
        observe_neuron_id(split_neuron_id(NeuronId(1), NeuronId(2), 0));
        assert!(NeuronId::fresh().0 < RESERVED_ID_RANGE);
    }
}
