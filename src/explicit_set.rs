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

//! Open-addressed hash set of 64-bit hashed values, the backing store of
//! the EXPLICIT representation.
//!
//! Keys are already avalanche-hashed, so probing only rehashes them with
//! the Murmur3 finalizer XORed with the current mask to break up any
//! clustering a previous table size may have produced.

use crate::bits::array_size;
use crate::bits::max_fill;
use crate::bits::murmur3_finalize64;
use crate::error::Error;
use crate::error::ErrorKind;

/// The initial default size of a hash table.
pub(crate) const DEFAULT_INITIAL_SIZE: usize = 16;
/// The default load factor of a hash table.
pub(crate) const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Linear-probing set of `u64` keys with power-of-two capacity.
#[derive(Clone, Debug)]
pub(crate) struct ExplicitSet {
    /// The array of keys.
    keys: Vec<u64>,
    /// Whether a position is used.
    used: Vec<bool>,
    /// The acceptable load factor.
    f: f64,
    /// Entry count at which the table grows. Always `max_fill(n, f)`.
    max_fill: usize,
    /// Mask for wrapping a position counter.
    mask: u64,
    /// Number of entries in the set.
    size: usize,
}

impl ExplicitSet {
    pub fn new() -> Self {
        match Self::with_load_factor(DEFAULT_INITIAL_SIZE, DEFAULT_LOAD_FACTOR) {
            Ok(set) => set,
            Err(_) => unreachable!("the default load factor is in range"),
        }
    }

    /// Create a set sized for `expected` elements at load factor `f`.
    pub fn with_load_factor(expected: usize, f: f64) -> Result<Self, Error> {
        if f <= 0.0 || f > 1.0 {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "load factor must be greater than 0 and smaller than or equal to 1",
            )
            .with_context("load_factor", f));
        }
        Ok(Self::build(expected, f))
    }

    fn build(expected: usize, f: f64) -> Self {
        let n = array_size(expected, f);
        Self {
            keys: vec![0u64; n],
            used: vec![false; n],
            f,
            max_fill: max_fill(n, f),
            mask: (n - 1) as u64,
            size: 0,
        }
    }

    /// Insert `k`, returning whether it was not already present.
    pub fn add(&mut self, k: u64) -> bool {
        let mut pos = (murmur3_finalize64(k ^ self.mask) & self.mask) as usize;
        // There's always an unused entry.
        while self.used[pos] {
            if self.keys[pos] == k {
                return false;
            }
            pos = (pos + 1) & self.mask as usize;
        }

        self.used[pos] = true;
        self.keys[pos] = k;
        self.size += 1;
        if self.size >= self.max_fill {
            self.rehash(array_size(self.size + 1, self.f));
        }
        true
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Visit every stored key exactly once, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.keys
            .iter()
            .zip(self.used.iter())
            .filter(|(_, &used)| used)
            .map(|(&k, _)| k)
    }

    fn rehash(&mut self, new_n: usize) {
        let new_mask = (new_n - 1) as u64;
        let mut new_keys = vec![0u64; new_n];
        let mut new_used = vec![false; new_n];

        for (i, &k) in self.keys.iter().enumerate() {
            if !self.used[i] {
                continue;
            }
            let mut pos = (murmur3_finalize64(k ^ new_mask) & new_mask) as usize;
            while new_used[pos] {
                pos = (pos + 1) & new_mask as usize;
            }
            new_used[pos] = true;
            new_keys[pos] = k;
        }

        self.keys = new_keys;
        self.used = new_used;
        self.mask = new_mask;
        self.max_fill = max_fill(new_n, self.f);
    }
}
