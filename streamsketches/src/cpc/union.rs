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

//! The merging logic is somewhat involved, so it will be summarized here.
//!
//! First, we compare the K values of the union and the source sketch.
//!
//! If `source.K < union.K`, we reduce the union's K to match, which requires
//! downsampling the union's internal state.
//!
//! Here is how to perform the downsampling:
//!
//! If the union contains a bit matrix, downsample it by row-wise ORing.
//!
//! If the union contains a sparse sketch, then create a new empty sketch,
//! and walk the old target sketch updating the new one (with modulo). At the
//! end, check whether the new target sketch is still in sparse mode (it
//! might not be, because downsampling densifies the set of collected
//! coupons). If it is NOT in sparse mode, immediately convert it to a bit
//! matrix.
//!
//! At this point, we have `source.K >= union.K`. (We won't keep mentioning
//! this, but in all the following the source's row indices are used mod
//! union.K while updating the union's sketch. That takes care of the
//! situation where `source.K > union.K`.)
//!
//! Case A: union is Sparse and source is Sparse. We walk the source sketch
//! updating the union's sketch. At the end, if the union's sketch is no
//! longer in sparse mode, we convert it to a bit matrix.
//!
//! Case B: union is bit matrix and source is Sparse. We walk the source
//! sketch, setting bits in the bit matrix.
//!
//! In the remaining cases, we have flavor(source) > Sparse, so we
//! immediately convert the union's sketch to a bit matrix (even if the union
//! contains very few coupons). Then:
//!
//! Case C: union is bit matrix and source is Hybrid or Pinned. Then we OR
//! the source's sliding window into the bit matrix, and walk the source's
//! table, setting bits in the bit matrix.
//!
//! Case D: union is bit matrix, and source is Sliding. Then we convert the
//! source into a bit matrix, and OR it into the union's bit matrix.
//! (Important note: merely walking the source wouldn't work because of the
//! partially inverted logic in the Sliding flavor, where the presence of
//! coupons is sometimes indicated by the ABSENCE of row/col pairs in the
//! surprises table.)
//!
//! How does [`CpcUnion::get_result`] work?
//!
//! If the union has an Accumulator state, make a copy of that sketch.
//!
//! If the union has a BitMatrix state, then we have to convert the bit
//! matrix back into a sketch, which requires doing some extra work to figure
//! out the values of num_coupons, offset, first_interesting_column, and kxp.

use crate::cpc::CpcSketch;
use crate::cpc::DEFAULT_LG_K;
use crate::cpc::Flavor;
use crate::cpc::count_bits_set_in_matrix;
use crate::cpc::determine_correct_offset;
use crate::cpc::pair_table::PairTable;
use crate::hash::DEFAULT_UPDATE_SEED;

/// The union (merge) operation for CPC sketches.
///
/// The union's effective K never grows: it narrows to the smallest K among
/// the non-empty inputs. For any two streams, unioning sketches of those
/// streams produces a bit matrix identical to a single sketch fed their
/// concatenation at the union's final K.
#[derive(Debug, Clone)]
pub struct CpcUnion {
    // immutable config variables
    lg_k: u8,
    seed: u64,

    // union state
    state: UnionState,
}

/// The internal state of the union operation.
///
/// Exactly one representation is active at any given moment. The
/// accumulator is a sketch object that is employed until it graduates out of
/// sparse mode; at that point it is converted into a full-sized bit matrix,
/// which is mathematically a sketch but doesn't maintain any of the "extra"
/// fields of the sketch object. The bit matrix is owned by the union and is
/// never aliased with any source sketch's storage.
#[derive(Debug, Clone)]
enum UnionState {
    Accumulator(CpcSketch),
    BitMatrix(Vec<u64>),
}

impl Default for CpcUnion {
    fn default() -> Self {
        Self::new(DEFAULT_LG_K)
    }
}

impl CpcUnion {
    /// Creates a new `CpcUnion` with the given `lg_k` and default seed.
    ///
    /// # Panics
    ///
    /// Panics if `lg_k` is not in the range `[4, 26]`.
    pub fn new(lg_k: u8) -> Self {
        Self::with_seed(lg_k, DEFAULT_UPDATE_SEED)
    }

    /// Creates a new `CpcUnion` with the given `lg_k` and `seed`.
    ///
    /// # Panics
    ///
    /// Panics if `lg_k` is not in the range `[4, 26]`.
    pub fn with_seed(lg_k: u8, seed: u64) -> Self {
        // We begin with the accumulator holding an empty merged sketch.
        let sketch = CpcSketch::with_seed(lg_k, seed);
        let state = UnionState::Accumulator(sketch);
        Self { lg_k, seed, state }
    }

    /// Return the parameter lg_k.
    ///
    /// Note that due to merging with source sketches that may have a lower
    /// value of lg_k, this value can be less than what the union object was
    /// configured with.
    pub fn lg_k(&self) -> u8 {
        self.lg_k
    }

    /// Merges a sketch into this union. An empty sketch is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the provided sketch was built with a different seed than
    /// this union.
    pub fn update(&mut self, sketch: &CpcSketch) {
        assert_eq!(
            self.seed,
            sketch.seed(),
            "the sketch seed must match the union seed"
        );

        let flavor = sketch.flavor();
        if flavor == Flavor::Empty {
            return;
        }

        if sketch.lg_k() < self.lg_k {
            self.reduce_k(sketch.lg_k());
        }

        // if source is past SPARSE mode, make sure the union is a bit matrix
        if flavor > Flavor::Sparse {
            if let UnionState::Accumulator(old_sketch) = &self.state {
                self.state = UnionState::BitMatrix(old_sketch.build_bit_matrix());
            }
        }

        match &mut self.state {
            UnionState::Accumulator(old_sketch) => {
                // [Case A] Sparse source, accumulator valid
                assert_eq!(flavor, Flavor::Sparse);
                let old_flavor = old_sketch.flavor();
                assert!(
                    old_flavor == Flavor::Empty || old_flavor == Flavor::Sparse,
                    "unexpected accumulator flavor {old_flavor:?}"
                );

                // The following partially fixes the snowplow problem
                // provided that the K's are equal.
                if old_flavor == Flavor::Empty && self.lg_k == sketch.lg_k() {
                    *old_sketch = sketch.clone();
                    return;
                }

                walk_table_updating_sketch(old_sketch, sketch.surprising_value_table());
                // if the accumulator has graduated beyond sparse, switch to
                // a bit matrix representation
                if old_sketch.flavor() > Flavor::Sparse {
                    let bit_matrix = old_sketch.build_bit_matrix();
                    self.state = UnionState::BitMatrix(bit_matrix);
                }
            }
            UnionState::BitMatrix(old_matrix) => match flavor {
                // [Case B] Sparse source, bit matrix valid
                Flavor::Sparse => {
                    or_table_into_matrix(old_matrix, self.lg_k, sketch.surprising_value_table());
                }
                // [Case C] Hybrid or Pinned source, bit matrix valid
                Flavor::Hybrid | Flavor::Pinned => {
                    or_window_into_matrix(
                        old_matrix,
                        self.lg_k,
                        &sketch.sliding_window,
                        sketch.window_offset,
                        sketch.lg_k(),
                    );
                    or_table_into_matrix(old_matrix, self.lg_k, sketch.surprising_value_table());
                }
                // [Case D] Sliding source, bit matrix valid. SLIDING mode
                // involves inverted logic, so we cannot just walk the source
                // sketch. Instead, we convert it to a bit matrix that can be
                // ORed into the destination.
                Flavor::Sliding => {
                    let src_matrix = sketch.build_bit_matrix();
                    or_matrix_into_matrix(old_matrix, self.lg_k, &src_matrix, sketch.lg_k());
                }
                Flavor::Empty => unreachable!("empty sources return early"),
            },
        }
    }

    /// Get the union result as a new sketch.
    ///
    /// The result carries the merged flag: its HIP estimator history is gone
    /// permanently, and the ICON estimator answers for it from here on.
    ///
    /// # Examples
    ///
    /// ```
    /// # use streamsketches::cpc::CpcSketch;
    /// # use streamsketches::cpc::CpcUnion;
    /// let mut s1 = CpcSketch::new(12);
    /// s1.update_str("apple");
    ///
    /// let mut s2 = CpcSketch::new(12);
    /// s2.update_str("apple");
    /// s2.update_str("banana");
    ///
    /// let mut union = CpcUnion::new(12);
    /// union.update(&s1);
    /// union.update(&s2);
    ///
    /// let result = union.get_result();
    /// assert_eq!(result.estimate().round(), 2.0);
    /// ```
    pub fn get_result(&self) -> CpcSketch {
        match &self.state {
            UnionState::Accumulator(sketch) => {
                if sketch.is_empty() {
                    let mut empty = CpcSketch::with_seed(self.lg_k, self.seed);
                    empty.merge_flag = true;
                    return empty;
                }
                debug_assert_eq!(sketch.flavor(), Flavor::Sparse);
                let mut result = sketch.clone();
                result.merge_flag = true;
                result
            }
            UnionState::BitMatrix(matrix) => {
                let lg_k = self.lg_k;
                let k = 1usize << lg_k;

                let mut sketch = CpcSketch::with_seed(lg_k, self.seed);
                let num_coupons = count_bits_set_in_matrix(matrix);
                sketch.num_coupons = num_coupons;
                let offset = determine_correct_offset(lg_k, num_coupons);
                sketch.window_offset = offset;

                let mut sliding_window = vec![0u8; k];
                // lg_size = lg_k - 4 gives about K/16 slots; in some cases
                // this will end up being oversized
                let new_table_lg_size = (lg_k.saturating_sub(4)).max(2);
                let mut table = PairTable::new(new_table_lg_size, 6 + lg_k);

                // the following works even when the offset is zero
                let mask_for_clearing_window = (0xFFu64 << offset) ^ u64::MAX;
                let mask_for_flipping_early_zone = (1u64 << offset) - 1;
                let mut all_surprises_ored = 0u64;

                // The snowplow effect was caused by processing the rows in
                // order, but we have fixed it by using a sufficiently large
                // hash table.
                for (i, window_byte) in sliding_window.iter_mut().enumerate() {
                    let mut pattern = matrix[i];
                    *window_byte = ((pattern >> offset) & 0xFF) as u8;
                    pattern &= mask_for_clearing_window;
                    // this flipping converts surprising 0's to 1's
                    pattern ^= mask_for_flipping_early_zone;
                    all_surprises_ored |= pattern;
                    while pattern != 0 {
                        let col = pattern.trailing_zeros();
                        pattern ^= 1u64 << col; // erase the 1
                        let row_col = ((i as u32) << 6) | col;
                        let is_novel = table.maybe_insert(row_col);
                        debug_assert!(is_novel);
                    }
                }

                // at this point we could shrink an oversized hash table, but
                // the relative waste isn't very big
                sketch.first_interesting_column = all_surprises_ored.trailing_zeros() as u8;
                if sketch.first_interesting_column > offset {
                    sketch.first_interesting_column = offset; // corner case
                }

                // HIP-related fields stay zeroed, which is fine: merge_flag
                // is set, so the HIP estimator will never read them.
                sketch.sliding_window = sliding_window;
                sketch.surprising_value_table = Some(table);
                sketch.merge_flag = true;

                sketch
            }
        }
    }

    fn reduce_k(&mut self, new_lg_k: u8) {
        match &mut self.state {
            UnionState::Accumulator(sketch) => {
                if sketch.is_empty() {
                    self.lg_k = new_lg_k;
                    self.state = UnionState::Accumulator(CpcSketch::with_seed(new_lg_k, self.seed));
                    return;
                }

                let mut new_sketch = CpcSketch::with_seed(new_lg_k, self.seed);
                walk_table_updating_sketch(&mut new_sketch, sketch.surprising_value_table());

                let final_new_flavor = new_sketch.flavor();
                // the table had to have something in it
                assert_ne!(final_new_flavor, Flavor::Empty);
                self.lg_k = new_lg_k;
                if final_new_flavor == Flavor::Sparse {
                    self.state = UnionState::Accumulator(new_sketch);
                } else {
                    // the downsampled sketch graduated beyond sparse
                    self.state = UnionState::BitMatrix(new_sketch.build_bit_matrix());
                }
            }
            UnionState::BitMatrix(matrix) => {
                let new_k = 1usize << new_lg_k;
                let mut new_matrix = vec![0u64; new_k];
                or_matrix_into_matrix(&mut new_matrix, new_lg_k, matrix, self.lg_k);
                self.lg_k = new_lg_k;
                self.state = UnionState::BitMatrix(new_matrix);
            }
        }
    }
}

// testing methods
impl CpcUnion {
    /// Returns the number of coupons currently held by the union.
    ///
    /// This is primarily for testing and validation purposes.
    pub fn num_coupons(&self) -> u32 {
        match &self.state {
            UnionState::Accumulator(sketch) => sketch.num_coupons,
            UnionState::BitMatrix(matrix) => count_bits_set_in_matrix(matrix),
        }
    }

    /// Returns a copy of the union's effective bit matrix.
    ///
    /// This is primarily for testing and validation purposes.
    ///
    /// # Panics
    ///
    /// Panics if the union has never absorbed a sketch: an empty accumulator
    /// has no matrix to report.
    pub fn bit_matrix(&self) -> Vec<u64> {
        match &self.state {
            UnionState::Accumulator(sketch) => {
                assert!(
                    !sketch.is_empty(),
                    "the union is empty; there is no bit matrix to retrieve"
                );
                sketch.build_bit_matrix()
            }
            UnionState::BitMatrix(matrix) => matrix.clone(),
        }
    }
}

fn or_window_into_matrix(
    dst_matrix: &mut [u64],
    dst_lg_k: u8,
    src_window: &[u8],
    src_offset: u8,
    src_lg_k: u8,
) {
    assert!(dst_lg_k <= src_lg_k);
    let dst_mask = (1usize << dst_lg_k) - 1; // downsamples when dst_lg_k < src_lg_k
    for (src_row, &window_byte) in src_window.iter().enumerate().take(1 << src_lg_k) {
        dst_matrix[src_row & dst_mask] |= (window_byte as u64) << src_offset;
    }
}

fn or_table_into_matrix(dst_matrix: &mut [u64], dst_lg_k: u8, src_table: &PairTable) {
    let dst_mask = (1usize << dst_lg_k) - 1; // downsamples when dst_lg_k < src_lg_k
    for &row_col in src_table.slots() {
        if row_col != u32::MAX {
            let src_row = (row_col >> 6) as usize;
            let src_col = row_col & 63;
            dst_matrix[src_row & dst_mask] |= 1u64 << src_col;
        }
    }
}

fn or_matrix_into_matrix(dst_matrix: &mut [u64], dst_lg_k: u8, src_matrix: &[u64], src_lg_k: u8) {
    assert!(dst_lg_k <= src_lg_k);
    let dst_mask = (1usize << dst_lg_k) - 1; // downsamples when dst_lg_k < src_lg_k
    for (src_row, &word) in src_matrix.iter().enumerate().take(1 << src_lg_k) {
        dst_matrix[src_row & dst_mask] |= word;
    }
}

fn walk_table_updating_sketch(sketch: &mut CpcSketch, table: &PairTable) {
    let slots = table.slots();
    let num_slots = slots.len() as u32;

    // downsamples when the sketch's lg_k is smaller than the source's
    let dst_mask = ((((1u64 << sketch.lg_k()) - 1) << 6) | 63) as u32;

    // Using a golden ratio stride fixes the snowplow effect.
    let mut stride = (0.6180339887498949 * (num_slots as f64)) as u32;
    assert!(stride >= 2);
    if stride == ((stride >> 1) << 1) {
        stride += 1; // force the stride to be odd
    }
    assert!((3..num_slots).contains(&stride));

    let mut probe = 0u32;
    for _ in 0..num_slots {
        probe &= num_slots - 1;
        let row_col = slots[probe as usize];
        if row_col != u32::MAX {
            sketch.row_col_update(row_col & dst_mask);
        }
        probe += stride;
    }
}
