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

//! Open-addressed map from register index to register value, the backing
//! store of the SPARSE representation. Only non-zero registers are ever
//! stored; `get` of an absent key is 0, the unset register value.

use crate::bits::array_size;
use crate::bits::max_fill;
use crate::bits::murmur3_finalize32;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::explicit_set::DEFAULT_INITIAL_SIZE;
use crate::explicit_set::DEFAULT_LOAD_FACTOR;

/// Linear-probing map of `u32` register indexes to byte-wide register
/// values, with power-of-two capacity.
#[derive(Clone, Debug)]
pub(crate) struct SparseMap {
    /// The array of keys.
    keys: Vec<u32>,
    /// The array of values.
    values: Vec<u8>,
    /// Whether a position is used.
    used: Vec<bool>,
    /// The acceptable load factor.
    f: f64,
    /// Entry count at which the table grows. Always `max_fill(n, f)`.
    max_fill: usize,
    /// Mask for wrapping a position counter.
    mask: u32,
    /// Number of entries in the map.
    size: usize,
}

impl SparseMap {
    pub fn new() -> Self {
        match Self::with_load_factor(DEFAULT_INITIAL_SIZE, DEFAULT_LOAD_FACTOR) {
            Ok(map) => map,
            Err(_) => unreachable!("the default load factor is in range"),
        }
    }

    /// Create a map sized for `expected` entries at load factor `f`.
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
            keys: vec![0u32; n],
            values: vec![0u8; n],
            used: vec![false; n],
            f,
            max_fill: max_fill(n, f),
            mask: (n - 1) as u32,
            size: 0,
        }
    }

    /// Store `v` under `k`, returning the previous value (0 if absent).
    pub fn put(&mut self, k: u32, v: u8) -> u8 {
        let mut pos = (murmur3_finalize32(k ^ self.mask) & self.mask) as usize;
        // There's always an unused entry.
        while self.used[pos] {
            if self.keys[pos] == k {
                let old_value = self.values[pos];
                self.values[pos] = v;
                return old_value;
            }
            pos = (pos + 1) & self.mask as usize;
        }

        self.used[pos] = true;
        self.keys[pos] = k;
        self.values[pos] = v;
        self.size += 1;
        if self.size >= self.max_fill {
            self.rehash(array_size(self.size + 1, self.f));
        }
        0
    }

    /// The value stored under `k`, or 0 when absent.
    pub fn get(&self, k: u32) -> u8 {
        let mut pos = (murmur3_finalize32(k ^ self.mask) & self.mask) as usize;
        while self.used[pos] {
            if self.keys[pos] == k {
                return self.values[pos];
            }
            pos = (pos + 1) & self.mask as usize;
        }
        0
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Visit every stored entry exactly once, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.used
            .iter()
            .enumerate()
            .filter(|(_, &used)| used)
            .map(|(i, _)| (self.keys[i], self.values[i]))
    }

    fn rehash(&mut self, new_n: usize) {
        let new_mask = (new_n - 1) as u32;
        let mut new_keys = vec![0u32; new_n];
        let mut new_values = vec![0u8; new_n];
        let mut new_used = vec![false; new_n];

        for (i, &k) in self.keys.iter().enumerate() {
            if !self.used[i] {
                continue;
            }
            let mut pos = (murmur3_finalize32(k ^ new_mask) & new_mask) as usize;
            while new_used[pos] {
                pos = (pos + 1) & new_mask as usize;
            }
            new_used[pos] = true;
            new_keys[pos] = k;
            new_values[pos] = self.values[i];
        }

        self.keys = new_keys;
        self.values = new_values;
        self.used = new_used;
        self.mask = new_mask;
        self.max_fill = max_fill(new_n, self.f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_and_overwrite() {
        let mut map = SparseMap::new();
        assert_eq!(map.get(3), 0);
        assert_eq!(map.put(3, 5), 0);
        assert_eq!(map.get(3), 5);
        assert_eq!(map.put(3, 9), 5);
        assert_eq!(map.get(3), 9);
        assert_eq!(map.size(), 1);
    }

    #[test]
    fn test_absent_key_reads_as_zero_register() {
        let mut map = SparseMap::new();
        map.put(100, 2);
        assert_eq!(map.get(101), 0);
        assert_eq!(map.get(0), 0);
    }

    #[test]
    fn test_grows_and_keeps_entries() {
        let mut map = SparseMap::new();
        for k in 0..5_000u32 {
            map.put(k, (k % 31 + 1) as u8);
        }
        assert_eq!(map.size(), 5_000);
        for k in 0..5_000u32 {
            assert_eq!(map.get(k), (k % 31 + 1) as u8);
        }
    }

    #[test]
    fn test_iterator_yields_all_pairs() {
        let mut map = SparseMap::new();
        for k in 0..200u32 {
            map.put(k * 7, (k % 29 + 1) as u8);
        }
        let mut pairs: Vec<(u32, u8)> = map.iter().collect();
        pairs.sort_unstable();
        assert_eq!(pairs.len(), 200);
        for (i, (k, v)) in pairs.iter().enumerate() {
            assert_eq!(*k, i as u32 * 7);
            assert_eq!(*v, (i as u32 % 29 + 1) as u8);
        }
    }

    #[test]
    fn test_invalid_load_factor() {
        assert!(SparseMap::with_load_factor(16, -0.5).is_err());
        assert!(SparseMap::with_load_factor(16, 2.0).is_err());
    }
}
