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

//! Serialization format constants for CPC sketches.
//!
//! The first 8 bytes of every image are `{preamble_ints, serial_version,
//! family, lg_k, first_interesting_column, flags, seed_hash(2)}`. The flags
//! byte carries the compressed indicator plus a 3-bit [`Format`] ordinal
//! whose bits are exactly the three "which fields are present" predicates,
//! so the format is always derivable from the state being written and never
//! stored as independent truth.

use crate::error::Error;

pub(super) const SERIAL_VERSION: u8 = 1;

/// Flag bit positions within the flags byte.
const FLAG_COMPRESSED: u8 = 1;
const FLAG_HAS_HIP: u8 = 2;
const FLAG_HAS_TABLE: u8 = 3;
const FLAG_HAS_WINDOW: u8 = 4;

/// One of the 8 serialized layouts, as `{empty, sparse/hybrid,
/// pinned/sliding without SV table, pinned/sliding} x {merged, HIP}`.
///
/// The ordinal's bits are the field-presence predicates: bit 0 HIP, bit 1
/// surprising-value table, bit 2 window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Format {
    EmptyMerged = 0,
    EmptyHip = 1,
    SparseHybridMerged = 2,
    SparseHybridHip = 3,
    PinnedSlidingMergedNoSv = 4,
    PinnedSlidingHipNoSv = 5,
    PinnedSlidingMerged = 6,
    PinnedSlidingHip = 7,
}

impl Format {
    pub fn determine(has_hip: bool, has_table: bool, has_window: bool) -> Self {
        let ordinal =
            (has_hip as u8) | ((has_table as u8) << 1) | ((has_window as u8) << 2);
        Self::from_ordinal(ordinal).expect("all 8 ordinals are valid")
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Format::EmptyMerged),
            1 => Some(Format::EmptyHip),
            2 => Some(Format::SparseHybridMerged),
            3 => Some(Format::SparseHybridHip),
            4 => Some(Format::PinnedSlidingMergedNoSv),
            5 => Some(Format::PinnedSlidingHipNoSv),
            6 => Some(Format::PinnedSlidingMerged),
            7 => Some(Format::PinnedSlidingHip),
            _ => None,
        }
    }

    pub fn has_hip(self) -> bool {
        (self as u8) & 1 != 0
    }

    pub fn has_table(self) -> bool {
        (self as u8) & 2 != 0
    }

    pub fn has_window(self) -> bool {
        (self as u8) & 4 != 0
    }
}

/// Packs the compressed indicator and the format ordinal into the flags
/// byte. The ordinal lands with its HIP/table/window bits at positions 2-4.
pub(super) fn make_flags(format: Format) -> u8 {
    (1 << FLAG_COMPRESSED) | ((format as u8) << FLAG_HAS_HIP)
}

/// Recovers the format from a flags byte, rejecting uncompressed images.
pub(super) fn parse_flags(flags: u8) -> Result<Format, Error> {
    if flags & (1 << FLAG_COMPRESSED) == 0 {
        return Err(Error::deserial("only compressed sketch images are supported"));
    }
    let ordinal = (flags >> FLAG_HAS_HIP) & 0x7;
    Format::from_ordinal(ordinal)
        .ok_or_else(|| Error::deserial("invalid format ordinal").with_context("ordinal", ordinal))
}

/// The number of 4-byte preamble ints a format occupies ahead of its
/// compressed streams.
pub(super) fn make_preamble_ints(num_coupons: u32, format: Format) -> u8 {
    let mut preamble_ints = 2;
    if num_coupons > 0 {
        preamble_ints += 1; // number of coupons
        if format.has_hip() {
            preamble_ints += 4; // kxp and hip_est_accum
        }
        if format.has_table() {
            preamble_ints += 1; // table stream length
            // number of table entries; implied by num_coupons unless a
            // window coexists with the table
            if format.has_window() {
                preamble_ints += 1;
            }
        }
        if format.has_window() {
            preamble_ints += 1; // window stream length
        }
    }
    preamble_ints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_roundtrip_through_flags() {
        for ordinal in 0..8u8 {
            let format = Format::from_ordinal(ordinal).unwrap();
            assert_eq!(parse_flags(make_flags(format)).unwrap(), format);
        }
    }

    #[test]
    fn test_uncompressed_flag_rejected() {
        assert!(parse_flags(0).is_err());
    }

    #[test]
    fn test_preamble_ints_per_format() {
        assert_eq!(make_preamble_ints(0, Format::EmptyMerged), 2);
        assert_eq!(make_preamble_ints(0, Format::EmptyHip), 2);
        assert_eq!(make_preamble_ints(10, Format::SparseHybridMerged), 4);
        assert_eq!(make_preamble_ints(10, Format::SparseHybridHip), 8);
        assert_eq!(make_preamble_ints(10, Format::PinnedSlidingMergedNoSv), 4);
        assert_eq!(make_preamble_ints(10, Format::PinnedSlidingHipNoSv), 8);
        assert_eq!(make_preamble_ints(10, Format::PinnedSlidingMerged), 6);
        assert_eq!(make_preamble_ints(10, Format::PinnedSlidingHip), 10);
    }
}
