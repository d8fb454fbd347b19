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

//! Wire-format tests for the v1.0.0 storage spec: literal header bytes,
//! byte round-trips for every reachable representation, and malformed
//! input handling.

mod common;

use common::hashed;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use hll::Hll;
use hll::HllType;
use hll::error::ErrorKind;

fn round_trip(hll: &Hll) -> Hll {
    let bytes = hll.to_bytes();
    let restored = Hll::from_bytes(&bytes).unwrap();
    assert_eq!(restored.to_bytes(), bytes, "round-trip bytes differ");
    assert_eq!(restored.cardinality(), hll.cardinality());
    assert_eq!(restored.hll_type(), hll.hll_type());
    restored
}

#[test]
fn test_empty_hll_is_three_header_bytes() {
    let hll = Hll::new(14, 5).unwrap();
    let bytes = hll.to_bytes();

    // Version 1, type EMPTY; regwidth 5, log2m 14; sparse on, auto
    // explicit cutoff.
    assert_eq!(bytes, vec![0x11, 0x8E, 0x7F]);
}

#[test]
fn test_header_reflects_representation_and_settings() {
    let mut hll = Hll::with_settings(13, 5, 4, true, HllType::Empty).unwrap();
    for i in 0..4u64 {
        hll.add_raw(hashed(i));
    }
    let bytes = hll.to_bytes();
    assert_eq!(bytes[0], 0x12); // version 1, type EXPLICIT
    assert_eq!(bytes[1], ((5 - 1) << 5) | 13);
    assert_eq!(bytes[2], (1 << 6) | 4); // sparse on, cutoff log2(8)+1

    let hll = Hll::with_settings(14, 6, 0, false, HllType::Empty).unwrap();
    let bytes = hll.to_bytes();
    assert_eq!(bytes[0], 0x11);
    assert_eq!(bytes[1], ((6 - 1) << 5) | 14);
    assert_eq!(bytes[2], 0x00); // sparse off, explicit off
}

#[test]
fn test_round_trip_empty() {
    let hll = Hll::new(14, 5).unwrap();
    let restored = round_trip(&hll);
    assert_eq!(restored.log2m(), 14);
    assert_eq!(restored.regwidth(), 5);
}

#[test]
fn test_round_trip_explicit() {
    let mut hll = Hll::new(13, 5).unwrap();
    for i in 0..100u64 {
        hll.add_raw(hashed(i));
    }
    assert_eq!(hll.hll_type(), HllType::Explicit);

    let restored = round_trip(&hll);
    assert_eq!(restored.cardinality(), 100);
}

#[test]
fn test_round_trip_sparse() {
    let mut hll = Hll::new(11, 5).unwrap();
    for i in 0..400u64 {
        hll.add_raw(hashed(i));
    }
    assert_eq!(hll.hll_type(), HllType::Sparse);

    round_trip(&hll);
}

#[test]
fn test_round_trip_full() {
    let mut hll = Hll::new(14, 6).unwrap();
    for i in 0..10_000_000u64 {
        hll.add_raw(hashed(i));
    }
    assert_eq!(hll.hll_type(), HllType::Full);

    round_trip(&hll);
}

#[test]
fn test_full_payload_length_is_exact() {
    let mut hll = Hll::with_settings(11, 5, 0, false, HllType::Empty).unwrap();
    hll.add_raw(hashed(1));
    // 2048 registers of 5 bits behind the 3-byte header.
    assert_eq!(hll.to_bytes().len(), 3 + (2048 * 5) / 8);
}

#[test]
fn test_sparse_words_carry_index_and_value() {
    // One known register: with log2m=11 the short word is 16 bits,
    // (index << 5) | value, packed MSB-first right after the header.
    let mut hll = Hll::with_settings(11, 5, 0, true, HllType::Empty).unwrap();
    let raw = (1u64 << 11) | 0x123; // substream 1, index 0x123
    hll.add_raw(raw);
    assert_eq!(hll.hll_type(), HllType::Sparse);

    // lsb(substream | pwMaxMask) = 0, so the register value is 1.
    let bytes = hll.to_bytes();
    assert_eq!(bytes.len(), 3 + 2);
    let short_word = u16::from_be_bytes([bytes[3], bytes[4]]);
    assert_eq!(short_word, (0x123 << 5) | 1);
}

#[test]
fn test_deserialized_sparse_drops_zero_valued_words() {
    // A SPARSE payload with an all-zero short word must not materialize
    // a zero register.
    let header = [0x13u8, (4 << 5) | 11, 0x7F];
    let mut bytes = header.to_vec();
    bytes.extend_from_slice(&[0x00, 0x00]); // index 0, value 0

    let hll = Hll::from_bytes(&bytes).unwrap();
    assert_eq!(hll.hll_type(), HllType::Sparse);
    assert_eq!(hll.cardinality(), 0);
}

#[test]
fn test_truncated_input() {
    for bytes in [&[][..], &[0x11][..], &[0x11, 0x8E][..]] {
        let err = Hll::from_bytes(bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
        assert_that!(err.message(), contains_substring("header"));
    }
}

#[test]
fn test_unsupported_schema_version() {
    let err = Hll::from_bytes(&[0x21, 0x8E, 0x7F]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHeader);
    assert_that!(err.message(), contains_substring("schema version"));
}

#[test]
fn test_unsupported_type_ordinal() {
    for version_byte in [0x10u8, 0x15, 0x1F] {
        let err = Hll::from_bytes(&[version_byte, 0x8E, 0x7F]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        assert_that!(err.message(), contains_substring("type ordinal"));
    }
}

#[test]
fn test_header_parameters_out_of_range() {
    // log2m = 3 is below the minimum.
    let err = Hll::from_bytes(&[0x11, (5 - 1) << 5 | 3, 0x7F]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    assert_that!(err.message(), contains_substring("log2m"));

    // Explicit cutoff 20 maps to an out-of-range expthresh.
    let err = Hll::from_bytes(&[0x11, (5 - 1) << 5 | 14, (1 << 6) | 20]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    assert_that!(err.message(), contains_substring("expthresh"));
}

#[test]
fn test_oversized_full_payload() {
    let mut hll = Hll::with_settings(11, 5, 0, false, HllType::Empty).unwrap();
    hll.add_raw(hashed(1));
    let mut bytes = hll.to_bytes();
    bytes.push(0xFF); // eight bits past the register file

    let err = Hll::from_bytes(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WordOutOfBounds);
    assert_that!(err.message(), contains_substring("register file"));
}

#[test]
fn test_short_full_payload_reads_leniently() {
    let mut hll = Hll::with_settings(11, 5, 0, false, HllType::Empty).unwrap();
    for i in 0..5_000u64 {
        hll.add_raw(hashed(i));
    }
    let bytes = hll.to_bytes();

    // Drop the tail: the missing registers deserialize as zero.
    let truncated = &bytes[..bytes.len() - 40];
    let restored = Hll::from_bytes(truncated).unwrap();
    assert_eq!(restored.hll_type(), HllType::Full);
    assert!(restored.cardinality() <= hll.cardinality());
}

#[test]
fn test_promotion_settings_survive_round_trip() {
    let mut hll = Hll::with_settings(13, 5, 4, true, HllType::Empty).unwrap();
    for i in 0..8u64 {
        hll.add_raw(hashed(i));
    }
    let restored = round_trip(&hll);
    assert_eq!(restored.hll_type(), HllType::Explicit);

    // The restored instance promotes at the same cutoff.
    let mut restored = restored;
    restored.add_raw(hashed(8));
    assert_eq!(restored.hll_type(), HllType::Sparse);
}

#[test]
fn test_cross_state_union_after_deserialization() {
    let mut full = Hll::new(12, 5).unwrap();
    for i in 0..100_000u64 {
        full.add_raw(hashed(i));
    }
    let mut sparse = Hll::new(12, 5).unwrap();
    for i in 100_000..100_400u64 {
        sparse.add_raw(hashed(i));
    }

    let mut restored_full = Hll::from_bytes(&full.to_bytes()).unwrap();
    let restored_sparse = Hll::from_bytes(&sparse.to_bytes()).unwrap();

    restored_full.union(&restored_sparse);
    full.union(&sparse);
    assert_eq!(restored_full.to_bytes(), full.to_bytes());
}
