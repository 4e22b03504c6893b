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

use streamsketches::quantiles::InequalitySearch;
use streamsketches::quantiles::evenly_spaced_doubles;

use InequalitySearch::*;

/// Randomized totality check over sorted arrays with heavy duplication: the
/// search never returns an out-of-range index, and agrees with a linear
/// scan for every criterion.
#[test]
fn test_search_agrees_with_linear_scan_on_random_arrays() {
    for trial in 0..200 {
        let len = rand::random_range(1..40usize);
        let mut arr: Vec<u64> = (0..len).map(|_| rand::random_range(0..15u64)).collect();
        arr.sort_unstable();
        let high = arr.len() - 1;

        for v in 0..16u64 {
            assert_eq!(
                Lt.find(&arr, 0, high, &v),
                arr.iter().rposition(|x| *x < v),
                "Lt trial={trial} arr={arr:?} v={v}"
            );
            assert_eq!(
                Le.find(&arr, 0, high, &v),
                arr.iter().rposition(|x| *x <= v),
                "Le trial={trial} arr={arr:?} v={v}"
            );
            assert_eq!(
                Ge.find(&arr, 0, high, &v),
                arr.iter().position(|x| *x >= v),
                "Ge trial={trial} arr={arr:?} v={v}"
            );
            assert_eq!(
                Gt.find(&arr, 0, high, &v),
                arr.iter().position(|x| *x > v),
                "Gt trial={trial} arr={arr:?} v={v}"
            );
            match Eq.find(&arr, 0, high, &v) {
                Some(i) => assert_eq!(arr[i], v),
                None => assert!(!arr.contains(&v)),
            }
        }
    }
}

#[test]
fn test_comparator_variant_with_floats() {
    let arr = [0.5f64, 1.5, 1.5, 1.5, 9.0];
    let high = arr.len() - 1;
    assert_eq!(Lt.find_with(&arr, 0, high, &1.5, f64::total_cmp), Some(0));
    assert_eq!(Le.find_with(&arr, 0, high, &1.5, f64::total_cmp), Some(3));
    assert_eq!(Ge.find_with(&arr, 0, high, &1.5, f64::total_cmp), Some(1));
    assert_eq!(Gt.find_with(&arr, 0, high, &1.5, f64::total_cmp), Some(4));
    assert_eq!(Gt.find_with(&arr, 0, high, &9.0, f64::total_cmp), None);
}

#[test]
fn test_evenly_spaced_endpoints_are_exact() {
    for num in [2usize, 3, 4, 7, 100] {
        let points = evenly_spaced_doubles(-2.5, 7.25, num);
        assert_eq!(points.len(), num);
        assert_eq!(points[0], -2.5);
        assert_eq!(points[num - 1], 7.25);
        for pair in points.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
