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

//! Big-endian ascending bit-packed word streams.
//!
//! Words of a fixed bit width are laid out back to back in ascending
//! order: the highest-order bit of the first word lands in bit 7 of the
//! first data byte, bytes fill MSB-first, and any trailing bits of the
//! last byte are zero. A configurable number of padding bytes (the
//! serialized header) precedes the data.

const BITS_PER_BYTE: usize = 8;
const BITS_PER_LONG: u32 = 64;

/// Writer for a promised number of fixed-width words.
///
/// Writing more than `word_count` words, or taking the bytes before all
/// of them have been written, is a caller bug and panics.
pub(crate) struct WordWriter {
    // The length in bits of the words to be written.
    word_length: u32,
    // The number of words to be written.
    word_count: usize,
    // The byte array to which the words are serialized.
    bytes: Vec<u8>,

    // Write state.
    bits_left_in_byte: u32,
    byte_index: usize,
    words_written: usize,
}

impl WordWriter {
    /// Create a writer for `word_count` words of `word_length` bits,
    /// preceded by `byte_padding` zeroed bytes.
    pub fn new(word_length: u32, word_count: usize, byte_padding: usize) -> Self {
        assert!(
            (1..=BITS_PER_LONG).contains(&word_length),
            "word length must be >= 1 and <= 64 (was: {word_length})"
        );

        let bits_required = word_length as usize * word_count;
        let bytes_required = byte_padding + bits_required.div_ceil(BITS_PER_BYTE);

        Self {
            word_length,
            word_count,
            bytes: vec![0u8; bytes_required],
            bits_left_in_byte: BITS_PER_BYTE as u32,
            byte_index: byte_padding,
            words_written: 0,
        }
    }

    /// Append the low `word_length` bits of `word` to the stream.
    pub fn write_word(&mut self, word: u64) {
        assert!(
            self.words_written < self.word_count,
            "cannot write more words, backing array full ({}/{})",
            self.words_written,
            self.word_count
        );

        let mut bits_left_in_word = self.word_length;
        while bits_left_in_word > 0 {
            // Move to the next byte if the current one is fully packed.
            if self.bits_left_in_byte == 0 {
                self.byte_index += 1;
                self.bits_left_in_byte = BITS_PER_BYTE as u32;
            }

            let consumed_mask: u64 = if bits_left_in_word == 64 {
                u64::MAX
            } else {
                (1u64 << bits_left_in_word) - 1
            };

            // Number of bits written this cycle: the smaller of what is
            // left in the word and what is left in the byte.
            let bits_to_write = self.bits_left_in_byte.min(bits_left_in_word);
            let bits_in_byte_after_write = self.bits_left_in_byte - bits_to_write;

            // The highest bits of the word go first, so strip the bits
            // consumed in previous cycles.
            let remaining_bits_of_word = word & consumed_mask;

            // If more bits remain in the word than this byte can accept,
            // shift the excess off the bottom.
            let bits_the_byte_can_accept = if bits_left_in_word > bits_to_write {
                remaining_bits_of_word >> (bits_left_in_word - self.bits_left_in_byte)
            } else {
                remaining_bits_of_word
            };

            // Align against the bits already written to this byte.
            let aligned_bits = bits_the_byte_can_accept << bits_in_byte_after_write;
            self.bytes[self.byte_index] |= aligned_bits as u8;

            bits_left_in_word -= bits_to_write;
            self.bits_left_in_byte = bits_in_byte_after_write;
        }

        self.words_written += 1;
    }

    /// Take the backing buffer (padding included).
    pub fn into_bytes(self) -> Vec<u8> {
        assert!(
            self.words_written == self.word_count,
            "not all words have been written ({}/{})",
            self.words_written,
            self.word_count
        );
        self.bytes
    }
}

/// Reader over a byte buffer written by [`WordWriter`].
pub(crate) struct WordReader<'a> {
    // The length in bits of the words to be read.
    word_length: u32,
    bytes: &'a [u8],
    // Leading bytes of `bytes` to ignore.
    byte_padding: usize,
    // The number of whole words the data bytes contain.
    word_count: usize,

    current_word_index: usize,
}

impl<'a> WordReader<'a> {
    pub fn new(word_length: u32, byte_padding: usize, bytes: &'a [u8]) -> Self {
        assert!(
            (1..=BITS_PER_LONG).contains(&word_length),
            "word length must be >= 1 and <= 64 (was: {word_length})"
        );
        assert!(bytes.len() >= byte_padding, "buffer shorter than padding");

        let data_bits = (bytes.len() - byte_padding) * BITS_PER_BYTE;
        Self {
            word_length,
            bytes,
            byte_padding,
            word_count: data_bits / word_length as usize,
            current_word_index: 0,
        }
    }

    /// Number of whole words the buffer holds. Trailing bits that cannot
    /// form a whole word are not counted.
    pub fn total_word_count(&self) -> usize {
        self.word_count
    }

    /// Read the next word in ascending order.
    pub fn read_word(&mut self) -> u64 {
        let word = self.word_at(self.current_word_index);
        self.current_word_index += 1;
        word
    }

    fn word_at(&self, position: usize) -> u64 {
        let word_length = self.word_length as usize;

        // First bit of the word.
        let first_bit_index = position * word_length;
        let first_byte_index = self.byte_padding + first_bit_index / BITS_PER_BYTE;
        let first_byte_skip_bits = first_bit_index % BITS_PER_BYTE;

        // Last bit of the word.
        let last_bit_index = first_bit_index + word_length - 1;
        let last_byte_index = self.byte_padding + last_bit_index / BITS_PER_BYTE;
        let bits_after_byte_boundary = (last_bit_index + 1) % BITS_PER_BYTE;
        // A word terminating at a byte boundary consumes the whole byte.
        let last_byte_bits_to_consume = if bits_after_byte_boundary == 0 {
            BITS_PER_BYTE
        } else {
            bits_after_byte_boundary
        };

        assert!(
            last_byte_index < self.bytes.len(),
            "word out of bounds of backing array"
        );

        // First byte: mask off the skipped high bits, then right-align
        // what the word needs.
        let bits_remaining_in_first_byte = BITS_PER_BYTE - first_byte_skip_bits;
        let bits_to_consume_in_first_byte = bits_remaining_in_first_byte.min(word_length);
        let mut first_byte = self.bytes[first_byte_index] as u64;
        first_byte &= (1u64 << bits_remaining_in_first_byte) - 1;
        first_byte >>= bits_remaining_in_first_byte - bits_to_consume_in_first_byte;

        let mut value = first_byte;
        if first_byte_index == last_byte_index {
            return value;
        }

        // Middle bytes are consumed whole.
        let middle_byte_count = last_byte_index - first_byte_index - 1;
        for i in 0..middle_byte_count {
            value = (value << BITS_PER_BYTE) | self.bytes[first_byte_index + i + 1] as u64;
        }

        // Last byte: only its high bits belong to this word.
        let last_byte =
            (self.bytes[last_byte_index] >> (BITS_PER_BYTE - last_byte_bits_to_consume)) as u64;
        (value << last_byte_bits_to_consume) | last_byte
    }
}
