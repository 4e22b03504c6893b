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

//! The rank-search engine shared by the quantiles sketches.
//!
//! Everything a quantiles sketch answers (rank, quantile, CDF, PMF,
//! partition boundaries) reduces to one primitive: a boundary-sensitive
//! binary search over a sorted array with possible duplicates. That
//! primitive lives in [`InequalitySearch`]; [`SortedView`] packages a
//! sketch's retained samples into the two parallel arrays the searches run
//! over, and [`GenericPartitionBoundaries`] is the result object for
//! equal-weight partitioning.

mod partition;
mod search;
mod sorted_view;

pub use self::partition::GenericPartitionBoundaries;
pub use self::search::InequalitySearch;
pub use self::sorted_view::SortedView;

pub(crate) use self::partition::partition_boundaries_from_sorted_view;

use std::cmp::Ordering;

/// The two boundary semantics a rank or quantile query can use.
///
/// `Inclusive` means the weight of a queried item is included in its own
/// rank; `Exclusive` means it is not. All query methods on the quantiles
/// sketches take one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantileSearchCriteria {
    /// The given item is included in the rank computed for it.
    Inclusive,
    /// The given item is excluded from the rank computed for it.
    Exclusive,
}

/// Trait implemented by item types the quantiles machinery can order.
///
/// The floating point implementations use a total order (`total_cmp`), which
/// is safe because NaN inputs are filtered out before they reach any sorted
/// structure.
pub trait QuantileItem: Clone {
    /// Compare two items.
    fn compare(a: &Self, b: &Self) -> Ordering;

    /// Returns true if the item is NaN.
    fn is_nan(_value: &Self) -> bool {
        false
    }
}

impl QuantileItem for f32 {
    fn compare(a: &Self, b: &Self) -> Ordering {
        a.total_cmp(b)
    }

    fn is_nan(value: &Self) -> bool {
        value.is_nan()
    }
}

impl QuantileItem for f64 {
    fn compare(a: &Self, b: &Self) -> Ordering {
        a.total_cmp(b)
    }

    fn is_nan(value: &Self) -> bool {
        value.is_nan()
    }
}

impl QuantileItem for u64 {
    fn compare(a: &Self, b: &Self) -> Ordering {
        a.cmp(b)
    }
}

impl QuantileItem for i64 {
    fn compare(a: &Self, b: &Self) -> Ordering {
        a.cmp(b)
    }
}

impl QuantileItem for String {
    fn compare(a: &Self, b: &Self) -> Ordering {
        a.cmp(b)
    }
}

/// Returns `num` evenly spaced values over `[value1, value2]`, both ends
/// included.
///
/// # Panics
///
/// Panics if `num < 2` or either bound is not finite.
pub fn evenly_spaced_doubles(value1: f64, value2: f64, num: usize) -> Vec<f64> {
    assert!(num >= 2, "num must be at least 2, got {num}");
    assert!(
        value1.is_finite() && value2.is_finite(),
        "the interval bounds must be finite"
    );

    let mut out = Vec::with_capacity(num);
    let delta = value2 - value1;
    let denominator = (num - 1) as f64;
    for i in 0..num {
        out.push(value1 + delta * (i as f64) / denominator);
    }
    // guard the far end against accumulated rounding
    out[num - 1] = value2;
    out
}

/// Converts a normalized rank into the natural rank to search for.
///
/// For small streams the product is first rounded to 1e-7 precision, so a
/// normalized rank that is mathematically exact (like 0.8 of 5 items) is not
/// pushed across the ceil/floor boundary by floating point representation
/// error.
pub(crate) fn natural_rank(
    normalized_rank: f64,
    total_n: u64,
    search_crit: QuantileSearchCriteria,
) -> u64 {
    let mut natural: f64 = normalized_rank * (total_n as f64);
    const TEN_MILLION: f64 = 1e7;
    if total_n <= TEN_MILLION as u64 {
        natural = (natural * TEN_MILLION).round() / TEN_MILLION;
    }
    match search_crit {
        QuantileSearchCriteria::Inclusive => natural.ceil() as u64,
        QuantileSearchCriteria::Exclusive => natural.floor() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evenly_spaced_doubles() {
        assert_eq!(
            evenly_spaced_doubles(0.0, 1.0, 4),
            vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]
        );
        assert_eq!(evenly_spaced_doubles(0.0, 100.0, 2), vec![0.0, 100.0]);
        assert_eq!(
            evenly_spaced_doubles(3.0, -3.0, 3),
            vec![3.0, 0.0, -3.0]
        );
    }

    #[test]
    #[should_panic(expected = "num must be at least 2")]
    fn test_evenly_spaced_doubles_rejects_single_point() {
        evenly_spaced_doubles(0.0, 1.0, 1);
    }

    #[test]
    fn test_natural_rank_rounding_tolerance() {
        // 0.8 * 5 is 4.000000000000001 in floating point; the rounding rule
        // must keep the inclusive ceil at 4, not 5.
        assert_eq!(natural_rank(0.8, 5, QuantileSearchCriteria::Inclusive), 4);
        assert_eq!(natural_rank(0.8, 5, QuantileSearchCriteria::Exclusive), 4);
        assert_eq!(natural_rank(0.5, 3, QuantileSearchCriteria::Inclusive), 2);
        assert_eq!(natural_rank(0.5, 3, QuantileSearchCriteria::Exclusive), 1);
        assert_eq!(natural_rank(0.0, 10, QuantileSearchCriteria::Inclusive), 0);
        assert_eq!(natural_rank(1.0, 10, QuantileSearchCriteria::Exclusive), 10);
    }
}
