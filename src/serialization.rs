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

//! The v1.0.0 storage format: a three-byte header carrying the algorithm
//! parameters, followed by a big-endian ascending bit-packed word stream
//! whose word width depends on the representation.
//!
//! | Byte | Layout |
//! |------|--------|
//! | 0 | `(schema_version << 4) \| type_ordinal` |
//! | 1 | `((regwidth - 1) << 5) \| log2m` |
//! | 2 | `(sparse_enabled << 6) \| explicit_cutoff` |
//!
//! The payload is absent for EMPTY; EXPLICIT writes one 64-bit word per
//! stored hash, SPARSE one `(log2m + regwidth)`-bit word per non-zero
//! register encoded `(index << regwidth) | value`, and FULL one
//! `regwidth`-bit word per register in ascending index order.

use crate::codec::WordReader;
use crate::codec::WordWriter;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::sketch::Hll;
use crate::sketch::HllType;
use crate::sketch::Storage;

/// The schema version written by this implementation.
const SCHEMA_VERSION: u8 = 1;

/// Number of header bytes for all HLL types.
const HEADER_BYTE_COUNT: usize = 3;

// Sentinel values from the storage spec for 'explicit-disabled' and
// 'auto'.
const EXPLICIT_OFF: u8 = 0;
const EXPLICIT_AUTO: u8 = 63;

/// Bits of the parameters byte encoding the register width.
const REGISTER_WIDTH_BITS: u8 = 3;
const REGISTER_WIDTH_MASK: u8 = (1 << REGISTER_WIDTH_BITS) - 1;

/// Bits of the parameters byte encoding `log2(registerCount)`.
const LOG2_REGISTER_COUNT_BITS: u8 = 5;
const LOG2_REGISTER_COUNT_MASK: u8 = (1 << LOG2_REGISTER_COUNT_BITS) - 1;

/// Bits of the cutoff byte encoding the explicit cutoff choice.
const EXPLICIT_CUTOFF_BITS: u8 = 6;
const EXPLICIT_CUTOFF_MASK: u8 = (1 << EXPLICIT_CUTOFF_BITS) - 1;

const NIBBLE_BITS: u8 = 4;
const NIBBLE_MASK: u8 = (1 << NIBBLE_BITS) - 1;

/// Pack the schema version (top nibble) and type ordinal (bottom nibble).
fn pack_version_byte(schema_version: u8, type_ordinal: u8) -> u8 {
    ((NIBBLE_MASK & schema_version) << NIBBLE_BITS) | (NIBBLE_MASK & type_ordinal)
}

/// Pack `regwidth - 1` (top 3 bits) and `log2m` (bottom 5 bits).
fn pack_parameters_byte(regwidth: u32, log2m: u32) -> u8 {
    let width_bits = (regwidth as u8 - 1) & REGISTER_WIDTH_MASK;
    let count_bits = log2m as u8 & LOG2_REGISTER_COUNT_MASK;
    (width_bits << LOG2_REGISTER_COUNT_BITS) | count_bits
}

/// Pack the sparse-enabled flag (bit 6) and the explicit cutoff value
/// (bottom 6 bits). The top bit is always padding.
fn pack_cutoff_byte(explicit_cutoff: u8, sparse_enabled: bool) -> u8 {
    let sparse_bit = if sparse_enabled {
        1 << EXPLICIT_CUTOFF_BITS
    } else {
        0
    };
    sparse_bit | (EXPLICIT_CUTOFF_MASK & explicit_cutoff)
}

fn schema_version(version_byte: u8) -> u8 {
    NIBBLE_MASK & (version_byte >> NIBBLE_BITS)
}

fn type_ordinal(version_byte: u8) -> u8 {
    version_byte & NIBBLE_MASK
}

fn register_width(parameters_byte: u8) -> u32 {
    (((parameters_byte >> LOG2_REGISTER_COUNT_BITS) & REGISTER_WIDTH_MASK) + 1) as u32
}

fn register_count_log2(parameters_byte: u8) -> u32 {
    (parameters_byte & LOG2_REGISTER_COUNT_MASK) as u32
}

fn sparse_enabled(cutoff_byte: u8) -> bool {
    (cutoff_byte >> EXPLICIT_CUTOFF_BITS) & 1 == 1
}

fn explicit_cutoff(cutoff_byte: u8) -> u8 {
    cutoff_byte & EXPLICIT_CUTOFF_MASK
}

impl Hll {
    /// Serialize to the v1.0.0 byte format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = match &self.storage {
            Storage::Empty => vec![0u8; HEADER_BYTE_COUNT],
            Storage::Explicit(set) => {
                // Ascending order, as the reference serializers write it;
                // equal sets then serialize to equal bytes regardless of
                // table history.
                let mut values: Vec<u64> = set.iter().collect();
                values.sort_unstable();

                let mut writer = WordWriter::new(64, values.len(), HEADER_BYTE_COUNT);
                for raw_value in values {
                    writer.write_word(raw_value);
                }
                writer.into_bytes()
            }
            Storage::Sparse(map) => {
                // Ascending register-index order, see above.
                let mut entries: Vec<(u32, u8)> = map.iter().collect();
                entries.sort_unstable();

                let mut writer =
                    WordWriter::new(self.short_word_length, entries.len(), HEADER_BYTE_COUNT);
                for (register_index, register_value) in entries {
                    writer.write_word(
                        ((register_index as u64) << self.regwidth) | register_value as u64,
                    );
                }
                writer.into_bytes()
            }
            Storage::Full(registers) => {
                let mut writer = WordWriter::new(self.regwidth, self.m, HEADER_BYTE_COUNT);
                for register in registers.iter() {
                    writer.write_word(register);
                }
                writer.into_bytes()
            }
        };
        self.write_metadata(&mut bytes);
        bytes
    }

    fn write_metadata(&self, bytes: &mut [u8]) {
        let explicit_cutoff_value = if self.explicit_off {
            EXPLICIT_OFF
        } else if self.explicit_auto {
            EXPLICIT_AUTO
        } else {
            // The threshold is a power of two; the spec encodes its log
            // plus one.
            self.explicit_threshold.ilog2() as u8 + 1
        };

        bytes[0] = pack_version_byte(SCHEMA_VERSION, self.hll_type().ordinal());
        bytes[1] = pack_parameters_byte(self.regwidth, self.log2m);
        bytes[2] = pack_cutoff_byte(explicit_cutoff_value, !self.sparse_off);
    }

    /// Deserialize an HLL from the v1.0.0 byte format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Hll, Error> {
        if bytes.len() < HEADER_BYTE_COUNT {
            return Err(Error::new(
                ErrorKind::TruncatedInput,
                format!("the byte stream is shorter than the {HEADER_BYTE_COUNT}-byte header"),
            )
            .with_context("length", bytes.len()));
        }

        let version = schema_version(bytes[0]);
        if version != SCHEMA_VERSION {
            return Err(Error::new(
                ErrorKind::InvalidHeader,
                format!("unsupported schema version (expected {SCHEMA_VERSION})"),
            )
            .with_context("schema_version", version));
        }

        let ordinal = type_ordinal(bytes[0]);
        let hll_type = HllType::from_ordinal(ordinal).ok_or_else(|| {
            Error::new(ErrorKind::UnsupportedType, "unsupported HLL type ordinal")
                .with_context("type_ordinal", ordinal)
        })?;

        let regwidth = register_width(bytes[1]);
        let log2m = register_count_log2(bytes[1]);
        let sparseon = sparse_enabled(bytes[2]);
        let expthresh = match explicit_cutoff(bytes[2]) {
            EXPLICIT_OFF => 0,
            EXPLICIT_AUTO => -1,
            cutoff => cutoff as i32,
        };

        let mut hll = Hll::with_settings(log2m, regwidth, expthresh, sparseon, hll_type)?;
        match &mut hll.storage {
            Storage::Empty => {}
            Storage::Explicit(set) => {
                // The wire size is at most the explicit threshold by
                // construction, so the values are inserted without
                // promotion checks.
                let mut reader = WordReader::new(64, HEADER_BYTE_COUNT, bytes);
                for _ in 0..reader.total_word_count() {
                    set.add(reader.read_word());
                }
            }
            Storage::Sparse(map) => {
                let mut reader = WordReader::new(hll.short_word_length, HEADER_BYTE_COUNT, bytes);
                for _ in 0..reader.total_word_count() {
                    let short_word = reader.read_word();
                    let register_value = (short_word & hll.value_mask) as u8;
                    // The index occupies log2m bits of the short word, so
                    // it cannot address past the register file.
                    let register_index = (short_word >> hll.regwidth) as u32;
                    // A zero value is an unset register and is never
                    // stored.
                    if register_value != 0 {
                        map.put(register_index, register_value);
                    }
                }
            }
            Storage::Full(registers) => {
                let mut reader = WordReader::new(hll.regwidth, HEADER_BYTE_COUNT, bytes);
                let word_count = reader.total_word_count();
                // m register words always fill whole bytes, so a payload
                // with more words than registers is not padding but a
                // write past the register file.
                if word_count > hll.m {
                    return Err(Error::new(
                        ErrorKind::WordOutOfBounds,
                        "payload holds more register words than the register file",
                    )
                    .with_context("word_count", word_count)
                    .with_context("m", hll.m));
                }
                // The exact writer restores registers byte-for-byte; a
                // short payload leaves the high registers zero.
                for register_index in 0..word_count {
                    registers.set_register(register_index, reader.read_word());
                }
            }
        }

        Ok(hll)
    }
}
