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

use googletest::assert_that;
use googletest::prelude::near;
use streamsketches::cpc::CpcSketch;
use streamsketches::cpc::CpcUnion;

const RELATIVE_ERROR_FOR_LG_K_11: f64 = 0.02;

fn sketch_of_range(lg_k: u8, range: std::ops::Range<u64>) -> CpcSketch {
    let mut sketch = CpcSketch::new(lg_k);
    for i in range {
        sketch.update_u64(i);
    }
    sketch
}

/// The union's bit matrix, for comparison against a directly built sketch.
fn matrix_of(sketch: &CpcSketch) -> Vec<u64> {
    let mut union = CpcUnion::new(sketch.lg_k());
    union.update(sketch);
    union.bit_matrix()
}

#[test]
fn test_empty() {
    let union = CpcUnion::new(11);
    let sketch = union.get_result();
    assert!(sketch.is_empty());
    assert_eq!(sketch.estimate(), 0.0);
}

#[test]
fn test_two_values() {
    let mut sketch = CpcSketch::new(11);
    sketch.update_u64(1);
    let mut union = CpcUnion::new(11);
    union.update(&sketch);

    let result = union.get_result();
    assert!(!result.is_empty());
    assert_eq!(result.num_coupons(), 1);

    sketch.update_u64(2);
    union.update(&sketch);
    let result = union.get_result();
    assert_that!(
        result.estimate(),
        near(2.0, RELATIVE_ERROR_FOR_LG_K_11 * 2.0)
    );
}

#[test]
fn test_empty_input_is_a_no_op() {
    let mut union = CpcUnion::new(11);
    union.update(&CpcSketch::new(11));
    union.update(&CpcSketch::new(8)); // empty sketches never narrow K either
    assert_eq!(union.lg_k(), 11);
    assert!(union.get_result().is_empty());
}

#[test]
#[should_panic(expected = "seed must match")]
fn test_seed_mismatch_panics() {
    let mut sketch = CpcSketch::with_seed(11, 123);
    sketch.update_u64(1);
    let mut union = CpcUnion::with_seed(11, 234);
    union.update(&sketch);
}

#[test]
#[should_panic(expected = "the union is empty")]
fn test_bit_matrix_of_empty_union_panics() {
    let union = CpcUnion::new(11);
    let _ = union.bit_matrix();
}

/// The core merge property: the union of sketches over streams X and Y has
/// a bit matrix identical to one sketch fed X ++ Y, for every combination
/// of flavors on both sides.
#[test]
fn test_union_matches_directly_built_sketch() {
    let lg_k = 10u8;
    let k = 1u64 << lg_k;
    // stream sizes landing in sparse, hybrid, pinned, and sliding
    let sizes = [k / 16, k / 3, 2 * k, 6 * k];

    for &na in &sizes {
        for &nb in &sizes {
            // overlapping streams: [0, na) and [na/2, na/2 + nb)
            let a = sketch_of_range(lg_k, 0..na);
            let b = sketch_of_range(lg_k, na / 2..na / 2 + nb);
            let direct = sketch_of_range(lg_k, 0..na / 2 + nb);

            let mut union = CpcUnion::new(lg_k);
            union.update(&a);
            union.update(&b);

            let result = union.get_result();
            assert_eq!(
                result.num_coupons(),
                direct.num_coupons(),
                "coupon count for na={na} nb={nb}"
            );
            assert_eq!(
                union.bit_matrix(),
                matrix_of(&direct),
                "bit matrix for na={na} nb={nb}"
            );
            assert!(result.validate());
        }
    }
}

#[test]
fn test_union_is_order_insensitive() {
    let lg_k = 11u8;
    let parts: Vec<CpcSketch> = (0..8)
        .map(|i| sketch_of_range(lg_k, i * 5_000..(i + 1) * 5_000))
        .collect();

    let mut forward = CpcUnion::new(lg_k);
    for part in &parts {
        forward.update(part);
    }
    let mut backward = CpcUnion::new(lg_k);
    for part in parts.iter().rev() {
        backward.update(part);
    }

    assert_eq!(forward.bit_matrix(), backward.bit_matrix());
    assert_eq!(
        forward.get_result().estimate(),
        backward.get_result().estimate()
    );
}

#[test]
fn test_many_unions_accumulate() {
    let mut key = 0u64;
    let mut sketch = CpcSketch::new(11);
    let mut union = CpcUnion::new(11);
    for _ in 0..100 {
        let mut tmp = CpcSketch::new(11);
        for _ in 0..1_000 {
            sketch.update_u64(key);
            tmp.update_u64(key);
            key += 1;
        }
        union.update(&tmp);
    }
    let result = union.get_result();
    assert_eq!(result.num_coupons(), union.num_coupons());
    assert_eq!(result.num_coupons(), sketch.num_coupons());
    let estimate = sketch.estimate();
    assert_that!(
        result.estimate(),
        near(estimate, RELATIVE_ERROR_FOR_LG_K_11 * estimate)
    );
}

#[test]
fn test_union_narrows_to_smaller_source_k() {
    let mut union = CpcUnion::new(12);

    let sketch12 = sketch_of_range(12, 0..100);
    union.update(&sketch12);

    let sketch11 = sketch_of_range(11, 0..1_000);
    union.update(&sketch11);

    let result = union.get_result();
    assert_eq!(result.lg_k(), 11);
    assert_that!(
        result.estimate(),
        near(1000.0, RELATIVE_ERROR_FOR_LG_K_11 * 10_000.0)
    );
}

#[test]
fn test_union_narrows_with_windowed_state() {
    let mut union = CpcUnion::new(12);

    // push the union's own state beyond sparse before the narrower source
    let sketch12 = sketch_of_range(12, 0..5_000);
    union.update(&sketch12);

    let sketch10 = sketch_of_range(10, 0..8_000);
    union.update(&sketch10);

    let result = union.get_result();
    assert_eq!(result.lg_k(), 10);
    assert!(result.validate());
    assert_that!(result.estimate(), near(8_000.0, 8_000.0 * 0.1));
}

#[test]
fn test_merged_result_survives_further_updates_via_new_union() {
    // chaining unions: result of one union feeds another
    let a = sketch_of_range(11, 0..10_000);
    let b = sketch_of_range(11, 10_000..20_000);
    let c = sketch_of_range(11, 20_000..30_000);

    let mut u1 = CpcUnion::new(11);
    u1.update(&a);
    u1.update(&b);
    let ab = u1.get_result();

    let mut u2 = CpcUnion::new(11);
    u2.update(&ab);
    u2.update(&c);
    let abc = u2.get_result();

    let direct = sketch_of_range(11, 0..30_000);
    assert_eq!(abc.num_coupons(), direct.num_coupons());
    assert_eq!(u2.bit_matrix(), matrix_of(&direct));
}
