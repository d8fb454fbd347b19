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

//! Constants and correction formulas of the raw HyperLogLog estimator:
//! the `alpha * m^2` bias constant, the small/large range cutoffs, and the
//! 64-bit-hash adaptation of the large range correction.

use std::sync::LazyLock;

use crate::sketch::MAXIMUM_LOG2M_PARAM;
use crate::sketch::MAXIMUM_REGWIDTH_PARAM;
use crate::sketch::MINIMUM_LOG2M_PARAM;
use crate::sketch::MINIMUM_REGWIDTH_PARAM;

/// Stride for the `(regwidth, log2m)` linear index of [`TWO_TO_L`].
const REG_WIDTH_INDEX_MULTIPLIER: usize = MAXIMUM_LOG2M_PARAM as usize + 1;

/// Masks forcing an upper bound on `1 + lsb(substream | mask)` so that a
/// register value can never overflow `regwidth` bits. Indexed by
/// `regwidth`; the entry for width 0 is unused padding.
const PW_MASK: [u64; MAXIMUM_REGWIDTH_PARAM as usize + 1] = [
    0x8000000000000000,
    0xffffffffffffffff,
    0xfffffffffffffffc,
    0xffffffffffffffc0,
    0xffffffffffffc000,
    0xffffffffc0000000,
    0xc000000000000000,
    0xc000000000000000,
    0xc000000000000000,
];

/// `2^L` per `(regwidth, log2m)` pair: the size of the hash space
/// observable under the register encoding, used by the large range
/// correction. Built once on first use.
static TWO_TO_L: LazyLock<
    [f64; (MAXIMUM_REGWIDTH_PARAM as usize + 1) * (MAXIMUM_LOG2M_PARAM as usize + 1)],
> = LazyLock::new(|| {
    let mut table = [0.0; (MAXIMUM_REGWIDTH_PARAM as usize + 1) * (MAXIMUM_LOG2M_PARAM as usize + 1)];
    for regwidth in MINIMUM_REGWIDTH_PARAM..=MAXIMUM_REGWIDTH_PARAM {
        for log2m in MINIMUM_LOG2M_PARAM..=MAXIMUM_LOG2M_PARAM {
            let max_register_value = (1u64 << regwidth) - 1;

            // Since 1 is added to p(w) on insertion, only
            // (max_register_value - 1) bits are inspected, hence the hash
            // space is one power of two smaller.
            let pw_bits = max_register_value - 1;
            let total_bits = pw_bits + log2m as u64;
            table[REG_WIDTH_INDEX_MULTIPLIER * regwidth as usize + log2m as usize] =
                2f64.powi(total_bits as i32);
        }
    }
    table
});

/// Mask that prevents overflow of a register of `regwidth` bits.
pub(crate) fn pw_max_mask(regwidth: u32) -> u64 {
    PW_MASK[regwidth as usize]
}

/// The `alpha * m^2` constant of the raw estimator. `m` must be a power
/// of two and at least 16.
pub(crate) fn alpha_m_squared(m: f64) -> f64 {
    debug_assert!(m >= 16.0, "'m' cannot be less than 16 ({m} < 16)");
    match m as u64 {
        16 => 0.673 * m * m,
        32 => 0.697 * m * m,
        64 => 0.709 * m * m,
        _ => (0.7213 / (1.0 + 1.079 / m)) * m * m,
    }
}

/// Cutoff below which the small range correction applies.
pub(crate) fn small_estimator_cutoff(m: usize) -> f64 {
    (m as f64 * 5.0) / 2.0
}

/// Cutoff above which the large range correction applies, adapted for
/// 64-bit hashes.
pub(crate) fn large_estimator_cutoff(log2m: u32, regwidth: u32) -> f64 {
    two_to_l(log2m, regwidth) / 30.0
}

/// The small range ("linear counting") correction: `m * ln(m / V)` where
/// `V` is the number of zero registers.
pub(crate) fn small_estimator(m: usize, number_of_zeroes: usize) -> f64 {
    m as f64 * (m as f64 / number_of_zeroes as f64).ln()
}

/// The large range correction: `-2^L * ln(1 - E/2^L)`.
pub(crate) fn large_estimator(log2m: u32, regwidth: u32, estimator: f64) -> f64 {
    let two_to_l = two_to_l(log2m, regwidth);
    -two_to_l * (1.0 - estimator / two_to_l).ln()
}

/// `1 / 2^value` without overflowing the shift for wide registers.
pub(crate) fn inv_pow2(value: u64) -> f64 {
    if value == 0 {
        1.0
    } else if value <= 63 {
        1.0 / (1u64 << value) as f64
    } else {
        f64::exp2(-(value as f64))
    }
}

fn two_to_l(log2m: u32, regwidth: u32) -> f64 {
    TWO_TO_L[REG_WIDTH_INDEX_MULTIPLIER * regwidth as usize + log2m as usize]
}
