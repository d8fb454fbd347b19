// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The HLL value type.
//!
//! An [`Hll`] holds one of four representations and promotes through them
//! as cardinality grows:
//!
//! - **EMPTY**: no payload; promoted on the first add.
//! - **EXPLICIT**: an exact set of the hashed values themselves, up to a
//!   configurable threshold.
//! - **SPARSE**: a map of only the non-zero probabilistic registers.
//! - **FULL**: the dense bit-packed register file; terminal.
//!
//! Inputs must already be hashed with an avalanche-quality 64-bit hash
//! function; [`Hll::add_raw`] ingests such a value directly and
//! [`Hll::update`] hashes an arbitrary value through MurmurHash3 first.

use std::hash::Hash;

use crate::bit_vector::BitVector;
use crate::bits::least_significant_bit;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::estimator;
use crate::explicit_set::ExplicitSet;
use crate::sparse_map::SparseMap;

/// Minimum value of the `log2m` parameter.
pub const MINIMUM_LOG2M_PARAM: u32 = 4;
/// Maximum value of the `log2m` parameter.
pub const MAXIMUM_LOG2M_PARAM: u32 = 30;
/// Minimum value of the `regwidth` parameter.
pub const MINIMUM_REGWIDTH_PARAM: u32 = 1;
/// Maximum value of the `regwidth` parameter.
pub const MAXIMUM_REGWIDTH_PARAM: u32 = 8;
/// Minimum value of the `expthresh` parameter.
pub const MINIMUM_EXPTHRESH_PARAM: i32 = -1;
/// Maximum value of the `expthresh` parameter.
pub const MAXIMUM_EXPTHRESH_PARAM: i32 = 18;
/// Largest EXPLICIT promotion threshold the storage spec can encode.
pub const MAXIMUM_EXPLICIT_THRESHOLD: usize = 1 << (MAXIMUM_EXPTHRESH_PARAM - 1);

/// Seed of the convenience [`Hll::update`] hasher. Any fixed non-zero
/// seed works; all instances must agree for unions to be meaningful.
const DEFAULT_HASH_SEED: u32 = 9001;

/// The representation an [`Hll`] currently occupies. The discriminants
/// are the wire type ordinals of the storage spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HllType {
    Empty = 1,
    Explicit = 2,
    Sparse = 3,
    Full = 4,
}

impl HllType {
    pub(crate) fn from_ordinal(ordinal: u8) -> Option<HllType> {
        match ordinal {
            1 => Some(HllType::Empty),
            2 => Some(HllType::Explicit),
            3 => Some(HllType::Sparse),
            4 => Some(HllType::Full),
            _ => None,
        }
    }

    pub(crate) fn ordinal(self) -> u8 {
        self as u8
    }
}

/// Exactly one representation is active at a time; promotion drops the
/// superseded backing store in the same operation that installs the new
/// one.
#[derive(Clone, Debug)]
pub(crate) enum Storage {
    Empty,
    Explicit(ExplicitSet),
    Sparse(SparseMap),
    Full(BitVector),
}

/// A HyperLogLog-backed distinct-value counter, storage-compatible with
/// the java-hll / postgresql-hll v1.0.0 byte format.
///
/// # Examples
///
/// ```
/// use hll::Hll;
///
/// let mut counter = Hll::new(14, 5).unwrap();
/// for i in 0..1000u64 {
///     counter.update(i);
/// }
/// let estimate = counter.cardinality();
/// assert!(estimate > 900 && estimate < 1100);
/// ```
#[derive(Clone, Debug)]
pub struct Hll {
    pub(crate) storage: Storage,

    // Characteristic parameters, named to match the PostgreSQL
    // implementation's parameters.
    pub(crate) log2m: u32,
    pub(crate) regwidth: u32,

    // EXPLICIT-specific constants.
    pub(crate) explicit_off: bool,
    pub(crate) explicit_auto: bool,
    pub(crate) explicit_threshold: usize,

    // SPARSE-specific constants.
    pub(crate) short_word_length: u32,
    pub(crate) sparse_off: bool,
    pub(crate) sparse_threshold: usize,

    // Probabilistic algorithm constants.
    pub(crate) m: usize,
    pub(crate) m_bits_mask: u64,
    pub(crate) value_mask: u64,
    pub(crate) pw_max_mask: u64,
    pub(crate) alpha_m_squared: f64,
    pub(crate) small_estimator_cutoff: f64,
    pub(crate) large_estimator_cutoff: f64,
}

impl Hll {
    /// Construct an empty HLL with the given `log2m` and `regwidth`.
    ///
    /// This is equivalent to
    /// `Hll::with_settings(log2m, regwidth, -1, true, HllType::Empty)`.
    pub fn new(log2m: u32, regwidth: u32) -> Result<Hll, Error> {
        Hll::with_settings(log2m, regwidth, -1, true, HllType::Empty)
    }

    /// Construct an HLL with full control over the promotion hierarchy.
    ///
    /// Arguments are named and structured identically to those of the
    /// PostgreSQL implementation:
    ///
    /// * `log2m` - log-base-2 of the number of registers. Must be at
    ///   least 4 and at most 30.
    /// * `regwidth` - number of bits per register. Must be at least 1 and
    ///   at most 8.
    /// * `expthresh` - tunes when the EXPLICIT-to-SPARSE promotion
    ///   occurs: `-1` promotes at the memory-optimal cutoff ("auto"),
    ///   `0` skips EXPLICIT entirely, and `n` in `[1, 18]` promotes at
    ///   cardinality `2^(n-1)`.
    /// * `sparseon` - whether the SPARSE representation is used at all.
    /// * `initial_type` - the representation to start in. `Empty` is the
    ///   normal construction; deserialization starts elsewhere.
    pub fn with_settings(
        log2m: u32,
        regwidth: u32,
        expthresh: i32,
        sparseon: bool,
        initial_type: HllType,
    ) -> Result<Hll, Error> {
        if !(MINIMUM_LOG2M_PARAM..=MAXIMUM_LOG2M_PARAM).contains(&log2m) {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                format!(
                    "log2m must be at least {MINIMUM_LOG2M_PARAM} and at most {MAXIMUM_LOG2M_PARAM}"
                ),
            )
            .with_context("log2m", log2m));
        }
        if !(MINIMUM_REGWIDTH_PARAM..=MAXIMUM_REGWIDTH_PARAM).contains(&regwidth) {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                format!(
                    "regwidth must be at least {MINIMUM_REGWIDTH_PARAM} and at most {MAXIMUM_REGWIDTH_PARAM}"
                ),
            )
            .with_context("regwidth", regwidth));
        }

        let m = 1usize << log2m;

        let (explicit_auto, explicit_off, explicit_threshold) = if expthresh == -1 {
            // This math matches the size calculation in the PostgreSQL
            // implementation: the full representation size in whole
            // bytes, measured in longs.
            let full_representation_size = (regwidth as usize * m + 7) / 8;
            let num_longs = full_representation_size / 8;
            (true, false, num_longs.min(MAXIMUM_EXPLICIT_THRESHOLD))
        } else if expthresh == 0 {
            (false, true, 0)
        } else if expthresh > 0 && expthresh <= MAXIMUM_EXPTHRESH_PARAM {
            (false, false, 1usize << (expthresh - 1))
        } else {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                format!(
                    "expthresh must be at least {MINIMUM_EXPTHRESH_PARAM} and at most {MAXIMUM_EXPTHRESH_PARAM}"
                ),
            )
            .with_context("expthresh", expthresh));
        };

        let short_word_length = regwidth + log2m;
        let sparse_off = !sparseon;
        let sparse_threshold = if sparse_off {
            0
        } else {
            let largest_pow2_less_than_cutoff =
                ((m * regwidth as usize) / short_word_length as usize).ilog2();
            1usize << largest_pow2_less_than_cutoff
        };

        let mut hll = Hll {
            storage: Storage::Empty,
            log2m,
            regwidth,
            explicit_off,
            explicit_auto,
            explicit_threshold,
            short_word_length,
            sparse_off,
            sparse_threshold,
            m,
            m_bits_mask: (m - 1) as u64,
            value_mask: (1u64 << regwidth) - 1,
            pw_max_mask: estimator::pw_max_mask(regwidth),
            alpha_m_squared: estimator::alpha_m_squared(m as f64),
            small_estimator_cutoff: estimator::small_estimator_cutoff(m),
            large_estimator_cutoff: estimator::large_estimator_cutoff(log2m, regwidth),
        };
        hll.initialize_storage(initial_type);
        Ok(hll)
    }

    /// The representation this instance currently occupies.
    pub fn hll_type(&self) -> HllType {
        match self.storage {
            Storage::Empty => HllType::Empty,
            Storage::Explicit(_) => HllType::Explicit,
            Storage::Sparse(_) => HllType::Sparse,
            Storage::Full(_) => HllType::Full,
        }
    }

    /// Log-base-2 of the number of registers.
    pub fn log2m(&self) -> u32 {
        self.log2m
    }

    /// Width of a register, in bits.
    pub fn regwidth(&self) -> u32 {
        self.regwidth
    }

    /// Whether nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        matches!(self.storage, Storage::Empty)
    }

    /// Hash `value` through MurmurHash3 and add the result.
    ///
    /// All instances that will be unioned must ingest values through the
    /// same path: either always this method, or always pre-hashed values
    /// from one external hash function via [`Hll::add_raw`].
    pub fn update<T: Hash>(&mut self, value: T) {
        let mut hasher = mur3::Hasher128::with_seed(DEFAULT_HASH_SEED);
        value.hash(&mut hasher);
        let (lo, _) = hasher.finish128();
        self.add_raw(lo);
    }

    /// Add `raw_value` directly.
    ///
    /// It is very important that this value *already be hashed* with a
    /// strong (but not necessarily cryptographic) hash function; the
    /// registers index straight into its bits.
    pub fn add_raw(&mut self, raw_value: u64) {
        if matches!(self.storage, Storage::Empty) {
            // EMPTY is always promoted on the first add.
            self.storage = if self.explicit_threshold > 0 {
                Storage::Explicit(ExplicitSet::new())
            } else if !self.sparse_off {
                Storage::Sparse(SparseMap::new())
            } else {
                Storage::Full(BitVector::new(self.regwidth, self.m))
            };
        }

        let update = self.register_update(raw_value);
        let promote = match &mut self.storage {
            Storage::Empty => unreachable!("storage was installed above"),
            Storage::Explicit(set) => {
                set.add(raw_value);
                set.size() > self.explicit_threshold
            }
            Storage::Sparse(map) => {
                if let Some((register_index, p_w)) = update {
                    if p_w > map.get(register_index) {
                        map.put(register_index, p_w);
                    }
                }
                map.size() > self.sparse_threshold
            }
            Storage::Full(registers) => {
                if let Some((register_index, p_w)) = update {
                    registers.set_max_register(register_index as usize, p_w as u64);
                }
                false
            }
        };
        if promote {
            self.promote();
        }
    }

    /// The register update `(j, p(w))` for a hashed value, or `None` when
    /// the update would write the unset register value.
    ///
    /// `p(w)` is the one-indexed position of the least significant set
    /// bit of the substream. By construction of `pw_max_mask`,
    /// `lsb(pw_max_mask) == 2^regwidth - 2`, thus
    /// `1 + lsb(x | pw_max_mask) <= 2^regwidth - 1` for any `x`: the
    /// register can never overflow.
    fn register_update(&self, raw_value: u64) -> Option<(u32, u8)> {
        let substream_value = raw_value >> self.log2m;
        // The paper does not cover p(0x0), so the special value 0 is
        // used. 0 is the initialization value of the registers, so the
        // multiset simply ignores it; the probability of hitting it is
        // vanishing. A zero register is "unset" and is never stored.
        if substream_value == 0 {
            return None;
        }
        let p_w = (1 + least_significant_bit(substream_value | self.pw_max_mask)) as u8;

        // No +1 as in the paper since indexing is 0-based.
        let register_index = (raw_value & self.m_bits_mask) as u32;
        Some((register_index, p_w))
    }

    /// Promote the current representation one step up the hierarchy:
    /// EXPLICIT to SPARSE (or FULL when SPARSE is disabled) by replaying
    /// the stored hashed values, SPARSE to FULL by draining the register
    /// map.
    fn promote(&mut self) {
        match std::mem::replace(&mut self.storage, Storage::Empty) {
            Storage::Explicit(set) => {
                self.storage = if !self.sparse_off {
                    Storage::Sparse(SparseMap::new())
                } else {
                    Storage::Full(BitVector::new(self.regwidth, self.m))
                };
                // Replaying through add_raw keeps the SPARSE threshold
                // honored even when the EXPLICIT threshold exceeds it.
                for raw_value in set.iter() {
                    self.add_raw(raw_value);
                }
            }
            Storage::Sparse(map) => {
                let mut registers = BitVector::new(self.regwidth, self.m);
                for (register_index, register_value) in map.iter() {
                    registers.set_max_register(register_index as usize, register_value as u64);
                }
                self.storage = Storage::Full(registers);
            }
            storage => self.storage = storage,
        }
    }

    /// The cardinality estimate. Exact while EXPLICIT; the corrected
    /// HyperLogLog estimate, rounded up, for SPARSE and FULL.
    pub fn cardinality(&self) -> u64 {
        match &self.storage {
            Storage::Empty => 0,
            Storage::Explicit(set) => set.size() as u64,
            Storage::Sparse(map) => {
                // The indicator function over all m registers, reading
                // absent registers as zero.
                let mut sum = 0.0;
                let mut number_of_zeroes = 0usize;
                for register_index in 0..self.m as u32 {
                    let register = map.get(register_index);
                    sum += estimator::inv_pow2(register as u64);
                    if register == 0 {
                        number_of_zeroes += 1;
                    }
                }
                self.corrected_estimate(sum, number_of_zeroes).ceil() as u64
            }
            Storage::Full(registers) => {
                let (sum, number_of_zeroes) = registers.sum();
                self.corrected_estimate(sum, number_of_zeroes as usize).ceil() as u64
            }
        }
    }

    /// Apply the raw estimator and its range corrections to an indicator
    /// sum.
    fn corrected_estimate(&self, sum: f64, number_of_zeroes: usize) -> f64 {
        let estimator = self.alpha_m_squared / sum;
        if number_of_zeroes != 0 && estimator < self.small_estimator_cutoff {
            estimator::small_estimator(self.m, number_of_zeroes)
        } else if estimator <= self.large_estimator_cutoff {
            estimator
        } else {
            estimator::large_estimator(self.log2m, self.regwidth, estimator)
        }
    }

    /// Union `other` into this instance.
    ///
    /// The two instances must have been constructed with the same
    /// `log2m` and `regwidth`; the merged registers are meaningless
    /// otherwise.
    pub fn union(&mut self, other: &Hll) {
        assert!(
            self.log2m == other.log2m && self.regwidth == other.regwidth,
            "cannot union HLLs of different parameters (log2m {} vs {}, regwidth {} vs {})",
            self.log2m,
            other.log2m,
            self.regwidth,
            other.regwidth,
        );

        if self.hll_type() == other.hll_type() {
            self.homogeneous_union(other);
        } else {
            self.heterogeneous_union(other);
        }
    }

    /// Union of two instances occupying the same representation.
    fn homogeneous_union(&mut self, other: &Hll) {
        match &other.storage {
            // Union of empty and empty is empty.
            Storage::Empty => {}
            Storage::Explicit(src) => {
                // add_raw will handle promotion, if necessary.
                for raw_value in src.iter() {
                    self.add_raw(raw_value);
                }
            }
            Storage::Sparse(src) => {
                let promote = if let Storage::Sparse(dest) = &mut self.storage {
                    for (register_index, register_value) in src.iter() {
                        if register_value > dest.get(register_index) {
                            dest.put(register_index, register_value);
                        }
                    }
                    dest.size() > self.sparse_threshold
                } else {
                    unreachable!("representations matched by union()")
                };
                if promote {
                    self.promote();
                }
            }
            Storage::Full(src) => {
                if let Storage::Full(dest) = &mut self.storage {
                    for register_index in 0..self.m {
                        dest.set_max_register(register_index, src.get_register(register_index));
                    }
                } else {
                    unreachable!("representations matched by union()")
                }
            }
        }
    }

    /// Union of two instances occupying different representations. The
    /// result occupies at least the higher-ranked of the two: the
    /// higher-ranked side's storage is cloned and the lower-ranked side's
    /// contents are replayed into the clone.
    fn heterogeneous_union(&mut self, other: &Hll) {
        // The union of empty with a non-empty HLL is a clone of the
        // non-empty one, materialized in the destination.
        if matches!(self.storage, Storage::Empty) {
            match &other.storage {
                Storage::Explicit(src) => {
                    if src.size() <= self.explicit_threshold {
                        self.storage = Storage::Explicit(src.clone());
                    } else {
                        self.storage = if !self.sparse_off {
                            Storage::Sparse(SparseMap::new())
                        } else {
                            Storage::Full(BitVector::new(self.regwidth, self.m))
                        };
                        for raw_value in src.iter() {
                            self.add_raw(raw_value);
                        }
                    }
                }
                Storage::Sparse(src) => {
                    if !self.sparse_off {
                        self.storage = Storage::Sparse(src.clone());
                    } else {
                        let mut registers = BitVector::new(self.regwidth, self.m);
                        for (register_index, register_value) in src.iter() {
                            registers
                                .set_max_register(register_index as usize, register_value as u64);
                        }
                        self.storage = Storage::Full(registers);
                    }
                }
                Storage::Full(src) => {
                    self.storage = Storage::Full(src.clone());
                }
                Storage::Empty => unreachable!("representations differ by definition"),
            }
            return;
        }
        if matches!(other.storage, Storage::Empty) {
            // Source is empty: the destination is unchanged.
            return;
        }

        // Both sides are non-empty below.
        match self.hll_type() {
            HllType::Explicit => {
                // Storing into the destination cannot be done (it is by
                // definition of smaller capacity than the source), so the
                // source storage is cloned and the destination's values
                // are replayed into the clone.
                let old = std::mem::replace(&mut self.storage, Storage::Empty);
                match &other.storage {
                    Storage::Sparse(src) => {
                        if !self.sparse_off {
                            self.storage = Storage::Sparse(src.clone());
                        } else {
                            let mut registers = BitVector::new(self.regwidth, self.m);
                            for (register_index, register_value) in src.iter() {
                                registers.set_max_register(
                                    register_index as usize,
                                    register_value as u64,
                                );
                            }
                            self.storage = Storage::Full(registers);
                        }
                    }
                    Storage::Full(src) => {
                        self.storage = Storage::Full(src.clone());
                    }
                    _ => unreachable!("source is SPARSE or FULL here"),
                }
                if let Storage::Explicit(dest) = old {
                    for raw_value in dest.iter() {
                        self.add_raw(raw_value);
                    }
                }
            }
            HllType::Sparse => match &other.storage {
                Storage::Explicit(src) => {
                    // add_raw will handle promotion cleanup.
                    for raw_value in src.iter() {
                        self.add_raw(raw_value);
                    }
                }
                Storage::Full(src) => {
                    // Clone the source registers and merge the sparse
                    // destination into the clone.
                    let old = std::mem::replace(&mut self.storage, Storage::Full(src.clone()));
                    if let (Storage::Full(registers), Storage::Sparse(dest)) =
                        (&mut self.storage, old)
                    {
                        for (register_index, register_value) in dest.iter() {
                            registers
                                .set_max_register(register_index as usize, register_value as u64);
                        }
                    }
                }
                _ => unreachable!("source is EXPLICIT or FULL here"),
            },
            HllType::Full => match &other.storage {
                Storage::Explicit(src) => {
                    // Promotion is not possible, so don't bother checking.
                    for raw_value in src.iter() {
                        self.add_raw(raw_value);
                    }
                }
                Storage::Sparse(src) => {
                    for (register_index, register_value) in src.iter() {
                        if let Storage::Full(registers) = &mut self.storage {
                            registers
                                .set_max_register(register_index as usize, register_value as u64);
                        }
                    }
                }
                _ => unreachable!("source is EXPLICIT or SPARSE here"),
            },
            HllType::Empty => unreachable!("EMPTY handled above"),
        }
    }

    pub(crate) fn initialize_storage(&mut self, hll_type: HllType) {
        self.storage = match hll_type {
            HllType::Empty => Storage::Empty,
            HllType::Explicit => Storage::Explicit(ExplicitSet::new()),
            HllType::Sparse => Storage::Sparse(SparseMap::new()),
            HllType::Full => Storage::Full(BitVector::new(self.regwidth, self.m)),
        };
    }
}
