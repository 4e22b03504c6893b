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

//! The entropy-coding layer between a sketch's logical state and its
//! serialized streams.
//!
//! The bit-stream state is an explicit `(words, next_word_index, bitbuf,
//! bufbits)` cursor threaded through every pack/unpack routine rather than a
//! stream object. That keeps the exact bit layout auditable: bits are packed
//! low-to-high within 32-bit words, the buffer flushes as soon as 32 bits
//! are pending, and each stream is padded at the end so the decoder's 12-bit
//! peek can never read past its input.

use crate::cpc::CpcSketch;
use crate::cpc::Flavor;
use crate::cpc::code_tables::byte_decoding_table;
use crate::cpc::code_tables::byte_encoding_table;
use crate::cpc::code_tables::column_permutation_for_decoding;
use crate::cpc::code_tables::column_permutation_for_encoding;
use crate::cpc::code_tables::xdelta_decoding_table;
use crate::cpc::code_tables::xdelta_encoding_table;
use crate::cpc::determine_correct_offset;
use crate::cpc::determine_flavor;
use crate::cpc::pair_table::PairTable;
use crate::cpc::pair_table::introspective_insertion_sort;

/// An immutable snapshot of a sketch's compressed streams, ready to be
/// framed by the preamble.
#[derive(Default)]
pub(super) struct CompressedState {
    pub(super) table_data: Vec<u32>,
    pub(super) table_data_words: usize,
    // can be different from the number of entries in the sketch in hybrid mode
    pub(super) table_num_entries: u32,
    pub(super) window_data: Vec<u32>,
    pub(super) window_data_words: usize,
}

impl CompressedState {
    pub fn compress(&mut self, source: &CpcSketch) {
        match source.flavor() {
            Flavor::Empty => {
                // nothing to encode
            }
            Flavor::Sparse => {
                self.compress_sparse_flavor(source);
                debug_assert!(self.window_data.is_empty(), "window is not expected");
                debug_assert!(!self.table_data.is_empty(), "table is expected");
            }
            Flavor::Hybrid => {
                self.compress_hybrid_flavor(source);
                debug_assert!(self.window_data.is_empty(), "window is not expected");
                debug_assert!(!self.table_data.is_empty(), "table is expected");
            }
            Flavor::Pinned => {
                self.compress_pinned_flavor(source);
                debug_assert!(!self.window_data.is_empty(), "window is expected");
            }
            Flavor::Sliding => {
                self.compress_sliding_flavor(source);
                debug_assert!(!self.window_data.is_empty(), "window is expected");
            }
        }
    }

    fn compress_sparse_flavor(&mut self, source: &CpcSketch) {
        debug_assert!(source.sliding_window.is_empty());
        let mut pairs = source.surprising_value_table().unwrapping_get_items();
        introspective_insertion_sort(&mut pairs);
        self.compress_surprising_values(&pairs, source.lg_k());
    }

    /// In the hybrid flavor the window holds columns 0..8 at offset zero, so
    /// its bits are re-expressed as pairs and merged with the table's pairs
    /// into one sorted stream.
    fn compress_hybrid_flavor(&mut self, source: &CpcSketch) {
        debug_assert!(!source.sliding_window.is_empty());
        debug_assert_eq!(source.window_offset, 0);

        let k = 1usize << source.lg_k();
        let mut table_pairs = source.surprising_value_table().unwrapping_get_items();
        introspective_insertion_sort(&mut table_pairs);
        let num_pairs_from_table = table_pairs.len();
        let num_pairs_total = source.num_coupons() as usize;

        // Reading the window row by row produces its pairs already sorted;
        // they land after the space reserved for the merge output.
        let mut all_pairs = vec![0u32; num_pairs_total];
        let mut idx = num_pairs_from_table;
        for (row, &byte) in source.sliding_window.iter().enumerate().take(k) {
            let mut bits = byte;
            while bits != 0 {
                let col = bits.trailing_zeros();
                bits ^= 1 << col; // erase the 1
                all_pairs[idx] = ((row as u32) << 6) | col;
                idx += 1;
            }
        }
        assert_eq!(idx, num_pairs_total);

        // two-way merge of the table pairs and the window pairs
        let mut final_idx = 0;
        let mut table_idx = 0;
        let mut window_idx = num_pairs_from_table;
        while final_idx < num_pairs_total {
            if table_idx < num_pairs_from_table
                && (window_idx >= num_pairs_total
                    || table_pairs[table_idx] <= all_pairs[window_idx])
            {
                all_pairs[final_idx] = table_pairs[table_idx];
                table_idx += 1;
            } else {
                all_pairs[final_idx] = all_pairs[window_idx];
                window_idx += 1;
            }
            final_idx += 1;
        }

        self.compress_surprising_values(&all_pairs, source.lg_k());
    }

    fn compress_pinned_flavor(&mut self, source: &CpcSketch) {
        self.compress_sliding_window(&source.sliding_window, source.lg_k(), source.num_coupons());
        let mut pairs = source.surprising_value_table().unwrapping_get_items();
        if !pairs.is_empty() {
            // No column index is less than 8 for a pinned sketch, and the
            // column lives in the low 6 bits of the pair, so shifting the
            // columns down past the window is a plain subtraction on the
            // packed pairs.
            for pair in &mut pairs {
                assert!(*pair & 63 >= 8, "pinned pair below the window: {pair}");
                *pair -= 8;
            }

            introspective_insertion_sort(&mut pairs);
            self.compress_surprising_values(&pairs, source.lg_k());
        }
    }

    // Complicated by the existence of both a left fringe and a right fringe.
    fn compress_sliding_flavor(&mut self, source: &CpcSketch) {
        self.compress_sliding_window(&source.sliding_window, source.lg_k(), source.num_coupons());
        let mut pairs = source.surprising_value_table().unwrapping_get_items();
        if !pairs.is_empty() {
            // The column transformation changes the implied ordering of the
            // pairs, so it must happen before sorting.
            let pseudo_phase = determine_pseudo_phase(source.lg_k(), source.num_coupons());
            debug_assert!(pseudo_phase < 16);
            let permutation = column_permutation_for_encoding(pseudo_phase);
            let offset = source.window_offset;
            debug_assert!(offset <= 56);
            for pair in &mut pairs {
                let row = *pair >> 6;
                let mut col = (*pair & 63) as u8;
                // rotate the columns into a canonical configuration:
                //  new = ((old - (offset+8)) + 64) mod 64
                col = (col + 56 - offset) & 63;
                debug_assert!(col < 56);
                col = permutation[col as usize];
                *pair = (row << 6) | (col as u32);
            }

            introspective_insertion_sort(&mut pairs);
            self.compress_surprising_values(&pairs, source.lg_k());
        }
    }

    fn compress_surprising_values(&mut self, pairs: &[u32], lg_k: u8) {
        let k = 1u32 << lg_k;
        let num_pairs = pairs.len() as u32;
        let num_base_bits = golomb_choose_number_of_base_bits(k + num_pairs, num_pairs as u64);
        let table_len = safe_length_for_compressed_pair_buf(k, num_pairs, num_base_bits);
        self.table_data.resize(table_len, 0);

        self.table_data_words = low_level_compress_pairs(&mut self.table_data, pairs, num_base_bits);
        self.table_num_entries = num_pairs;
    }

    fn compress_sliding_window(&mut self, window: &[u8], lg_k: u8, num_coupons: u32) {
        let k = 1u32 << lg_k;
        self.window_data
            .resize(safe_length_for_compressed_window_buf(k), 0);
        let pseudo_phase = determine_pseudo_phase(lg_k, num_coupons);
        self.window_data_words = low_level_compress_bytes(
            &mut self.window_data,
            window,
            byte_encoding_table(pseudo_phase),
        );
    }
}

pub(super) struct UncompressedState {
    pub(super) table: PairTable,
    pub(super) window: Vec<u8>,
}

impl CompressedState {
    pub fn uncompress(&self, lg_k: u8, num_coupons: u32) -> UncompressedState {
        match determine_flavor(lg_k, num_coupons) {
            Flavor::Empty => UncompressedState {
                table: PairTable::new(2, lg_k + 6),
                window: vec![],
            },
            Flavor::Sparse => self.uncompress_sparse_flavor(lg_k),
            Flavor::Hybrid => self.uncompress_hybrid_flavor(lg_k),
            Flavor::Pinned => self.uncompress_pinned_flavor(lg_k, num_coupons),
            Flavor::Sliding => self.uncompress_sliding_flavor(lg_k, num_coupons),
        }
    }

    fn uncompress_sparse_flavor(&self, lg_k: u8) -> UncompressedState {
        debug_assert!(self.window_data.is_empty(), "window is not expected");
        debug_assert!(!self.table_data.is_empty(), "table is expected");

        let pairs = self.uncompress_surprising_values(self.table_num_entries, lg_k);
        UncompressedState {
            table: PairTable::from_slots(lg_k, self.table_num_entries, pairs),
            window: vec![],
        }
    }

    fn uncompress_hybrid_flavor(&self, lg_k: u8) -> UncompressedState {
        debug_assert!(self.window_data.is_empty(), "window is not expected");
        debug_assert!(!self.table_data.is_empty(), "table is expected");

        let mut pairs = self.uncompress_surprising_values(self.table_num_entries, lg_k);

        // Some of these pairs belong in the window; move the true table
        // pairs to the bottom of the array as the window bits are set.
        let k = 1usize << lg_k;
        let mut window = vec![0u8; k]; // important: zero the memory
        let mut next_true_pair = 0u32;
        for i in 0..self.table_num_entries {
            let row_col = pairs[i as usize];
            assert_ne!(row_col, u32::MAX);
            let col = row_col & 63;
            if col < 8 {
                let row = row_col >> 6;
                window[row as usize] |= 1 << col;
            } else {
                pairs[next_true_pair as usize] = row_col;
                next_true_pair += 1;
            }
        }

        UncompressedState {
            table: PairTable::from_slots(lg_k, next_true_pair, pairs),
            window,
        }
    }

    fn uncompress_pinned_flavor(&self, lg_k: u8, num_coupons: u32) -> UncompressedState {
        debug_assert!(!self.window_data.is_empty(), "window is expected");

        let window = self.uncompress_sliding_window(lg_k, num_coupons);
        let num_pairs = self.table_num_entries;
        let table = if num_pairs == 0 {
            PairTable::new(2, lg_k + 6)
        } else {
            debug_assert!(!self.table_data.is_empty(), "table is expected");
            let mut pairs = self.uncompress_surprising_values(num_pairs, lg_k);
            // undo the compressor's 8-column shift
            for pair in pairs.iter_mut() {
                assert!((*pair & 63) < 56, "pinned pair column out of range: {pair}");
                *pair += 8;
            }
            PairTable::from_slots(lg_k, num_pairs, pairs)
        };
        UncompressedState { table, window }
    }

    fn uncompress_sliding_flavor(&self, lg_k: u8, num_coupons: u32) -> UncompressedState {
        debug_assert!(!self.window_data.is_empty(), "window is expected");

        let window = self.uncompress_sliding_window(lg_k, num_coupons);
        let num_pairs = self.table_num_entries;
        let table = if num_pairs == 0 {
            PairTable::new(2, lg_k + 6)
        } else {
            debug_assert!(!self.table_data.is_empty(), "table is expected");
            let mut pairs = self.uncompress_surprising_values(num_pairs, lg_k);

            let pseudo_phase = determine_pseudo_phase(lg_k, num_coupons);
            debug_assert!(pseudo_phase < 16);
            let permutation = column_permutation_for_decoding(pseudo_phase);
            let offset = determine_correct_offset(lg_k, num_coupons);
            assert!(offset <= 56, "window offset out of range: {offset}");

            for pair in pairs.iter_mut() {
                let row = *pair >> 6;
                let mut col = (*pair & 63) as u8;
                // first undo the permutation
                col = permutation[col as usize];
                // then undo the rotation: old = (new + (offset+8)) mod 64
                col = (col + (offset + 8)) & 63;
                *pair = (row << 6) | (col as u32);
            }

            PairTable::from_slots(lg_k, num_pairs, pairs)
        };
        UncompressedState { table, window }
    }

    fn uncompress_surprising_values(&self, num_pairs: u32, lg_k: u8) -> Vec<u32> {
        let k = 1u32 << lg_k;
        let num_base_bits = golomb_choose_number_of_base_bits(k + num_pairs, num_pairs as u64);
        let mut pairs = vec![0u32; num_pairs as usize];
        low_level_uncompress_pairs(
            &mut pairs,
            num_base_bits,
            &self.table_data,
            self.table_data_words,
        );
        pairs
    }

    fn uncompress_sliding_window(&self, lg_k: u8, num_coupons: u32) -> Vec<u8> {
        let k = 1usize << lg_k;
        let mut window = vec![0u8; k];
        let pseudo_phase = determine_pseudo_phase(lg_k, num_coupons);
        low_level_uncompress_bytes(
            &mut window,
            &self.window_data,
            self.window_data_words,
            byte_decoding_table(pseudo_phase),
        );
        window
    }
}

/// Returns the number of compressed words actually used.
///
/// It is the caller's responsibility to ensure the output buffer is long
/// enough (see [`safe_length_for_compressed_window_buf`]).
fn low_level_compress_bytes(
    compressed_words: &mut [u32],
    byte_array: &[u8],
    encoding_table: &[u16; 256],
) -> usize {
    let mut bitbuf: u64 = 0;
    // number of bits currently in bitbuf; must be between 0 and 31
    let mut bufbits: u8 = 0;
    let mut next_word_index = 0usize;

    for &byte in byte_array {
        let code_info = encoding_table[byte as usize];
        let code_val = (code_info & 0xfff) as u64;
        let code_len = (code_info >> 12) as u8;
        bitbuf |= code_val << bufbits;
        bufbits += code_len;
        maybe_flush_bitbuf(&mut bitbuf, &mut bufbits, compressed_words, &mut next_word_index);
    }

    // Pad the bitstream with 11 zero-bits so that the decompressor's 12-bit
    // peek can't overrun its input.
    bufbits += 11;
    maybe_flush_bitbuf(&mut bitbuf, &mut bufbits, compressed_words, &mut next_word_index);

    if bufbits > 0 {
        debug_assert!(bufbits < 32);
        compressed_words[next_word_index] = (bitbuf & 0xffffffff) as u32;
        next_word_index += 1;
    }

    next_word_index
}

fn low_level_uncompress_bytes(
    byte_array: &mut [u8],
    compressed_words: &[u32],
    num_compressed_words: usize,
    decoding_table: &[u16],
) {
    let mut word_index = 0usize;
    let mut bitbuf: u64 = 0;
    let mut bufbits: u8 = 0;

    for byte in byte_array.iter_mut() {
        // These 12 bits will include an entire codeword.
        maybe_fill_bitbuf(&mut bitbuf, &mut bufbits, compressed_words, &mut word_index, 12);
        let peek12 = bitbuf & 0xfff;
        let lookup = decoding_table[peek12 as usize];
        let code_len = (lookup >> 8) as u8;
        *byte = (lookup & 0xff) as u8;
        bitbuf >>= code_len;
        bufbits -= code_len;
    }

    // Buffer over-run should be impossible unless there is a bug.
    debug_assert!(
        word_index <= num_compressed_words,
        "word_index: {word_index}, num_compressed_words: {num_compressed_words}",
    );
}

/// Returns the number of compressed words actually used.
///
/// Here "pairs" refers to row/column pairs that specify the positions of
/// surprising values in the bit matrix. The row delta is Golomb-coded with
/// `num_base_bits` raw low bits plus a unary quotient, and the column delta
/// goes through the 65-symbol length-limited code.
fn low_level_compress_pairs(
    compressed_words: &mut [u32],
    pairs: &[u32],
    num_base_bits: u8,
) -> usize {
    let xdelta_table = xdelta_encoding_table();
    let mut bitbuf: u64 = 0;
    let mut bufbits: u8 = 0;
    let mut next_word_index = 0usize;
    let golomb_lo_mask: u64 = (1 << num_base_bits) - 1;
    let mut predicted_row_index: u32 = 0;
    let mut predicted_col_index: u32 = 0;

    for &row_col in pairs {
        let row_index = row_col >> 6;
        let col_index = row_col & 63;

        if row_index != predicted_row_index {
            predicted_col_index = 0;
        }
        assert!(row_index >= predicted_row_index);
        assert!(col_index >= predicted_col_index);

        let y_delta = row_index - predicted_row_index;
        let x_delta = col_index - predicted_col_index;

        predicted_row_index = row_index;
        predicted_col_index = col_index + 1;

        let code_info = xdelta_table[x_delta as usize];
        let code_val = (code_info & 0xfff) as u64;
        let code_len = (code_info >> 12) as u8;
        bitbuf |= code_val << bufbits;
        bufbits += code_len;
        maybe_flush_bitbuf(&mut bitbuf, &mut bufbits, compressed_words, &mut next_word_index);

        let golomb_lo = (y_delta as u64) & golomb_lo_mask;
        let golomb_hi = (y_delta as u64) >> num_base_bits;
        write_unary(
            compressed_words,
            &mut next_word_index,
            &mut bitbuf,
            &mut bufbits,
            golomb_hi,
        );

        bitbuf |= golomb_lo << bufbits;
        bufbits += num_base_bits;
        maybe_flush_bitbuf(&mut bitbuf, &mut bufbits, compressed_words, &mut next_word_index);
    }

    // Pad the bitstream so that the decompressor's 12-bit peek can't overrun
    // its input.
    bufbits += 10u8.saturating_sub(num_base_bits);
    maybe_flush_bitbuf(&mut bitbuf, &mut bufbits, compressed_words, &mut next_word_index);

    if bufbits > 0 {
        debug_assert!(bufbits < 32);
        compressed_words[next_word_index] = (bitbuf & 0xffffffff) as u32;
        next_word_index += 1;
    }

    next_word_index
}

fn low_level_uncompress_pairs(
    pairs: &mut [u32],
    num_base_bits: u8,
    compressed_words: &[u32],
    num_compressed_words: usize,
) {
    let xdelta_table = xdelta_decoding_table();
    let mut word_index = 0usize;
    let mut bitbuf: u64 = 0;
    let mut bufbits: u8 = 0;
    let golomb_lo_mask: u64 = (1 << num_base_bits) - 1;
    let mut predicted_row_index: u32 = 0;
    let mut predicted_col_index: u32 = 0;

    // Per pair the stream holds: x_delta (12-bit-peek prefix code),
    // y_delta_hi (unary), y_delta_lo (num_base_bits raw bits).
    for pair in pairs.iter_mut() {
        maybe_fill_bitbuf(&mut bitbuf, &mut bufbits, compressed_words, &mut word_index, 12);
        let peek12 = bitbuf & 0xfff;
        let lookup = xdelta_table[peek12 as usize];
        let code_len = (lookup >> 8) as u8;
        let x_delta = (lookup & 0xff) as u32;
        bitbuf >>= code_len;
        bufbits -= code_len;

        let golomb_hi = read_unary(compressed_words, &mut word_index, &mut bitbuf, &mut bufbits);
        maybe_fill_bitbuf(
            &mut bitbuf,
            &mut bufbits,
            compressed_words,
            &mut word_index,
            num_base_bits,
        );
        let golomb_lo = bitbuf & golomb_lo_mask;
        bitbuf >>= num_base_bits;
        bufbits -= num_base_bits;
        let y_delta = ((golomb_hi << num_base_bits) | golomb_lo) as u32;

        if y_delta > 0 {
            predicted_col_index = 0;
        }
        let row_index = predicted_row_index + y_delta;
        let col_index = predicted_col_index + x_delta;
        *pair = (row_index << 6) | col_index;
        predicted_row_index = row_index;
        predicted_col_index = col_index + 1;
    }

    debug_assert!(
        word_index <= num_compressed_words,
        "word_index: {word_index}, num_compressed_words: {num_compressed_words}",
    );
}

/// Selects the code table for the window bytes (and, in the Sliding flavor,
/// the column permutation).
fn determine_pseudo_phase(lg_k: u8, num_coupons: u32) -> u8 {
    let k = 1u64 << lg_k;
    let c = num_coupons as u64;
    // This mid-range logic produces pseudo-phases. They are used to select
    // encoding tables. The thresholds were chosen by hand after looking at
    // plots of measured compression.
    if 1000 * c < 2375 * k {
        if 4 * c < 3 * k {
            16 // mid-range table
        } else if 10 * c < 11 * k {
            16 + 1
        } else if 100 * c < 132 * k {
            16 + 2
        } else if 3 * c < 5 * k {
            16 + 3
        } else if 1000 * c < 1965 * k {
            16 + 4
        } else if 1000 * c < 2275 * k {
            16 + 5
        } else {
            // steady-state table employed before its actual phase
            6
        }
    } else {
        // This steady-state logic produces true phases. They are used to
        // select encoding tables, and also column permutations for the
        // Sliding flavor.
        debug_assert!(lg_k >= 4);
        ((num_coupons >> (lg_k - 4)) & 15) as u8
    }
}

fn write_unary(
    compressed_words: &mut [u32],
    next_word_index: &mut usize,
    bitbuf: &mut u64,
    bufbits: &mut u8,
    value: u64,
) {
    debug_assert!(*bufbits <= 31);

    let mut remaining = value;
    while remaining >= 16 {
        remaining -= 16;
        // Here we output 16 zeros, but we don't need to physically write
        // them into bitbuf because it already contains zeros in that region.
        *bufbits += 16;
        maybe_flush_bitbuf(bitbuf, bufbits, compressed_words, next_word_index);
    }

    let unary_code = 1u64 << remaining;
    *bitbuf |= unary_code << *bufbits;
    *bufbits += (remaining + 1) as u8;
    maybe_flush_bitbuf(bitbuf, bufbits, compressed_words, next_word_index);
}

fn read_unary(
    compressed_words: &[u32],
    next_word_index: &mut usize,
    bitbuf: &mut u64,
    bufbits: &mut u8,
) -> u64 {
    let mut subtotal = 0u64;
    loop {
        // These 8 bits include either all or part of the unary codeword.
        maybe_fill_bitbuf(bitbuf, bufbits, compressed_words, next_word_index, 8);
        let peek8 = *bitbuf & 0xff;
        let trailing_zeros = peek8.trailing_zeros() as u8;
        if trailing_zeros < 8 {
            *bufbits -= 1 + trailing_zeros;
            *bitbuf >>= 1 + trailing_zeros;
            return subtotal + trailing_zeros as u64;
        }
        // the codeword was partial, so read some more
        subtotal += 8;
        *bufbits -= 8;
        *bitbuf >>= 8;
    }
}

fn maybe_flush_bitbuf(
    bitbuf: &mut u64,
    bufbits: &mut u8,
    words: &mut [u32],
    word_index: &mut usize,
) {
    if *bufbits >= 32 {
        words[*word_index] = (*bitbuf & 0xffffffff) as u32;
        *word_index += 1;
        *bitbuf >>= 32;
        *bufbits -= 32;
    }
}

fn maybe_fill_bitbuf(
    bitbuf: &mut u64,
    bufbits: &mut u8,
    words: &[u32],
    word_index: &mut usize,
    minbits: u8,
) {
    if *bufbits < minbits {
        *bitbuf |= (words[*word_index] as u64) << *bufbits;
        *word_index += 1;
        *bufbits += 32;
    }
}

// Explanation of padding: per pair we write
// 1) x_delta (prefix code, provides at least 1 bit, requires 12-bit lookahead)
// 2) y_delta golomb hi (unary, provides at least 1 bit, requires 8-bit lookahead)
// 3) y_delta golomb lo (straight B bits).
// So the 12-bit lookahead is the tight constraint, but there are at least
// (2 + B) bits emitted, so we are safe with max(0, 10 - B) bits of padding
// at the end of the bitstream.
fn safe_length_for_compressed_window_buf(k: u32) -> usize {
    // 11 bits of padding, due to 12-bit lookahead, with 1 bit certainly present.
    let bits = 12 * (k as usize) + 11;
    divide_rounding_up(bits, 32)
}

fn safe_length_for_compressed_pair_buf(k: u32, num_pairs: u32, num_base_bits: u8) -> usize {
    // The following tighter upper bound on the y bits is based on page 198
    // of the textbook "Managing Gigabytes" by Witten, Moffat, and Bell.
    // Notice that if num_base_bits == 0 it coincides with (k + num_pairs).
    let k = k as usize;
    let num_pairs = num_pairs as usize;
    let num_base_bits = num_base_bits as usize;

    let ybits = num_pairs * (1 + num_base_bits) + (k >> num_base_bits);
    let xbits = 12 * num_pairs;
    let padding = 10usize.saturating_sub(num_base_bits);
    divide_rounding_up(xbits + ybits + padding, 32)
}

fn divide_rounding_up(x: usize, y: usize) -> usize {
    debug_assert_ne!(y, 0);
    x.div_ceil(y)
}

/// Returns an integer that is between zero and ceil(log_2(k)) - 1, inclusive.
fn golomb_choose_number_of_base_bits(k: u32, count: u64) -> u8 {
    debug_assert!(k > 0);
    if count == 0 {
        return 0;
    }
    let quotient = ((k as u64) - count) / count; // integer division
    if quotient == 0 {
        0
    } else {
        floor_log2(quotient)
    }
}

fn floor_log2(x: u64) -> u8 {
    debug_assert!(x > 0);
    (63 - x.leading_zeros()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_pairs(pairs: &[u32], lg_k: u8, num_base_bits: u8) {
        let k = 1u32 << lg_k;
        let buf_len = safe_length_for_compressed_pair_buf(k, pairs.len() as u32, num_base_bits);
        let mut words = vec![0u32; buf_len];
        let used = low_level_compress_pairs(&mut words, pairs, num_base_bits);
        assert!(used <= buf_len);

        let mut decoded = vec![0u32; pairs.len()];
        low_level_uncompress_pairs(&mut decoded, num_base_bits, &words, used);
        assert_eq!(decoded, pairs, "base bits {num_base_bits}");
    }

    #[test]
    fn test_pair_stream_roundtrip_across_base_bits() {
        let lg_k = 12u8;
        let k = 1u32 << lg_k;
        // a deterministic but scattered set of sorted pairs
        let mut pairs: Vec<u32> = (0..500u32)
            .map(|i| {
                let row = i.wrapping_mul(2654435761) % k;
                let col = (i * 13) % 64;
                (row << 6) | col
            })
            .collect();
        pairs.sort_unstable();
        pairs.dedup();

        for num_base_bits in 0..=11u8 {
            roundtrip_pairs(&pairs, lg_k, num_base_bits);
        }
    }

    #[test]
    fn test_pair_stream_roundtrip_dense_rows() {
        // many columns within the same rows exercises the x_delta path
        let mut pairs = Vec::new();
        for row in [0u32, 1, 5, 1000] {
            for col in 0..40u32 {
                pairs.push((row << 6) | col);
            }
        }
        pairs.sort_unstable();
        roundtrip_pairs(&pairs, 10, 3);
    }

    #[test]
    fn test_byte_stream_roundtrip_all_tables() {
        let k = 1usize << 10;
        // skewed toward low-bit-heavy bytes, the distribution the tables model
        let bytes: Vec<u8> = (0..k)
            .map(|i| {
                let x = (i as u32).wrapping_mul(2654435761);
                ((x & 0xff) & (x >> 8) & 0x7f) as u8
            })
            .collect();

        for phase in 0..super::super::code_tables::NUM_BYTE_TABLES as u8 {
            let mut words = vec![0u32; safe_length_for_compressed_window_buf(k as u32)];
            let used = low_level_compress_bytes(&mut words, &bytes, byte_encoding_table(phase));
            let mut decoded = vec![0u8; k];
            low_level_uncompress_bytes(&mut decoded, &words, used, byte_decoding_table(phase));
            assert_eq!(decoded, bytes, "phase {phase}");
        }
    }

    #[test]
    fn test_unary_roundtrip() {
        let values = [0u64, 1, 2, 7, 8, 15, 16, 17, 40, 100, 1000];
        let mut words = vec![0u32; 64];
        let mut bitbuf = 0u64;
        let mut bufbits = 0u8;
        let mut word_index = 0usize;
        for &v in &values {
            write_unary(&mut words, &mut word_index, &mut bitbuf, &mut bufbits, v);
        }
        // flush the tail
        bufbits += 11;
        maybe_flush_bitbuf(&mut bitbuf, &mut bufbits, &mut words, &mut word_index);
        if bufbits > 0 {
            words[word_index] = (bitbuf & 0xffffffff) as u32;
        }

        let mut bitbuf = 0u64;
        let mut bufbits = 0u8;
        let mut word_index = 0usize;
        for &v in &values {
            let decoded = read_unary(&words, &mut word_index, &mut bitbuf, &mut bufbits);
            assert_eq!(decoded, v);
        }
    }

    #[test]
    fn test_golomb_base_bits() {
        assert_eq!(golomb_choose_number_of_base_bits(1024, 1024), 0);
        assert_eq!(golomb_choose_number_of_base_bits(1024, 512), 0);
        assert_eq!(golomb_choose_number_of_base_bits(1024 + 8, 8), 7);
        assert_eq!(golomb_choose_number_of_base_bits(1024, 3), 8);
    }
}
