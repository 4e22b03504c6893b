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

use streamsketches::cpc::CpcSketch;
use streamsketches::cpc::CpcUnion;
use streamsketches::error::ErrorKind;

/// Serialize, deserialize, and serialize again; the image must be stable
/// byte for byte, and the estimate must survive exactly.
fn assert_roundtrip(sketch: &CpcSketch) -> CpcSketch {
    let bytes = sketch.serialize();
    let recovered = CpcSketch::deserialize(&bytes).unwrap();
    assert_eq!(recovered.lg_k(), sketch.lg_k());
    assert_eq!(recovered.num_coupons(), sketch.num_coupons());
    assert_eq!(recovered.estimate(), sketch.estimate());
    assert!(recovered.validate());
    assert_eq!(recovered.serialize(), bytes, "image must be stable");
    recovered
}

fn sketch_with_n(lg_k: u8, n: u64) -> CpcSketch {
    let mut sketch = CpcSketch::new(lg_k);
    for i in 0..n {
        sketch.update_u64(i);
    }
    sketch
}

#[test]
fn test_roundtrip_empty() {
    let sketch = CpcSketch::new(11);
    let recovered = assert_roundtrip(&sketch);
    assert!(recovered.is_empty());
}

// Coupon targets chosen to land in each flavor at lg_k = 10 (K = 1024):
// sparse < 96, hybrid < 512, pinned < 3456, sliding above.
#[test]
fn test_roundtrip_all_flavors() {
    for n in [1, 50, 300, 2_000, 20_000, 100_000] {
        let sketch = sketch_with_n(10, n);
        assert_roundtrip(&sketch);
    }
}

#[test]
fn test_roundtrip_small_and_large_k() {
    for lg_k in [4u8, 7, 12, 16] {
        for n in [0u64, 10, 1_000, 50_000] {
            let sketch = sketch_with_n(lg_k, n);
            assert_roundtrip(&sketch);
        }
    }
}

#[test]
fn test_roundtrip_merged_sketches_lose_hip() {
    let mut union = CpcUnion::new(10);
    union.update(&sketch_with_n(10, 10_000));
    union.update(&sketch_with_n(10, 20_000));
    let merged = union.get_result();

    let recovered = assert_roundtrip(&merged);
    // a merged sketch keeps using the ICON estimator after a round-trip
    assert_eq!(recovered.estimate(), merged.estimate());
}

#[test]
fn test_roundtrip_custom_seed() {
    let mut sketch = CpcSketch::with_seed(11, 12345);
    for i in 0..5_000u64 {
        sketch.update_u64(i);
    }
    let bytes = sketch.serialize();
    let recovered = CpcSketch::deserialize_with_seed(&bytes, 12345).unwrap();
    assert_eq!(recovered.estimate(), sketch.estimate());

    // the default seed must be rejected
    let err = CpcSketch::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_truncated_image_is_rejected() {
    let sketch = sketch_with_n(10, 5_000);
    let bytes = sketch.serialize();
    for len in [0, 1, 4, 7, 9, bytes.len() / 2, bytes.len() - 1] {
        let err = CpcSketch::deserialize(&bytes[..len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData, "prefix of {len} bytes");
    }
}

#[test]
fn test_wrong_family_is_rejected() {
    let sketch = sketch_with_n(10, 100);
    let mut bytes = sketch.serialize();
    bytes[2] = 99; // family byte
    let err = CpcSketch::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_wrong_serial_version_is_rejected() {
    let sketch = sketch_with_n(10, 100);
    let mut bytes = sketch.serialize();
    bytes[1] = 99; // serial version byte
    let err = CpcSketch::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_inconsistent_flags_are_rejected() {
    // A sparse-sized coupon count serialized with window-bearing flags (or
    // the reverse) implies fields outside the declared format.
    let sketch = sketch_with_n(10, 5_000); // pinned/sliding: has a window
    let mut bytes = sketch.serialize();
    // rewrite the format ordinal to "sparse/hybrid with HIP" (table only)
    bytes[5] = 0b10 | (0b011 << 2);
    let err = CpcSketch::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_uncompressed_flag_is_rejected() {
    let sketch = sketch_with_n(10, 100);
    let mut bytes = sketch.serialize();
    bytes[5] &= !0b10; // clear the compressed indicator
    let err = CpcSketch::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_entropy_coding_beats_raw_window() {
    // A pinned/sliding sketch stores a K-byte window plus a surprise table;
    // the entropy-coded image must come in well under the raw K bytes.
    for lg_k in [10u8, 12] {
        let k = 1usize << lg_k;
        let sketch = sketch_with_n(lg_k, 40 * k as u64);
        let len = sketch.serialize().len();
        assert!(
            len < k,
            "lg_k={lg_k}: {len} bytes is not smaller than the raw window ({k})"
        );
    }
}
