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

use crate::quantiles::QuantileItem;
use crate::quantiles::QuantileSearchCriteria;
use crate::quantiles::SortedView;
use crate::quantiles::evenly_spaced_doubles;

/// The boundaries that partition a sketched stream into equally weighted
/// parts, with the rank metadata needed to act on them.
///
/// All arrays are parallel: `boundaries.len() == natural_ranks.len() ==
/// normalized_ranks.len() == num_delta_items.len() == num_partitions + 1`.
/// `num_delta_items[i]` is the approximate number of stream items falling in
/// partition `i` (its entry at index 0 is always zero), and their sum equals
/// the total stream weight.
///
/// Immutable once returned.
#[derive(Debug, Clone)]
pub struct GenericPartitionBoundaries<T> {
    total_n: u64,
    boundaries: Vec<T>,
    natural_ranks: Vec<u64>,
    normalized_ranks: Vec<f64>,
    min_item: T,
    max_item: T,
    search_criterion: QuantileSearchCriteria,
    num_delta_items: Vec<u64>,
    num_partitions: usize,
}

impl<T> GenericPartitionBoundaries<T> {
    /// Returns the total weight of the sketched stream.
    pub fn total_n(&self) -> u64 {
        self.total_n
    }

    /// Returns the boundary items, including both stream extremes.
    pub fn boundaries(&self) -> &[T] {
        &self.boundaries
    }

    /// Returns the natural rank resolved for each boundary.
    pub fn natural_ranks(&self) -> &[u64] {
        &self.natural_ranks
    }

    /// Returns the normalized rank resolved for each boundary.
    pub fn normalized_ranks(&self) -> &[f64] {
        &self.normalized_ranks
    }

    /// Returns the smallest item of the stream.
    pub fn min_item(&self) -> &T {
        &self.min_item
    }

    /// Returns the largest item of the stream.
    pub fn max_item(&self) -> &T {
        &self.max_item
    }

    /// Returns the search criterion the boundaries were resolved with.
    pub fn search_criterion(&self) -> QuantileSearchCriteria {
        self.search_criterion
    }

    /// Returns the approximate number of items in each partition. Index 0 is
    /// always zero; entry `i` counts the items between boundaries `i - 1`
    /// and `i`.
    pub fn num_delta_items(&self) -> &[u64] {
        &self.num_delta_items
    }

    /// Returns the number of partitions.
    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }
}

/// Resolves `num_equally_sized` partitions over a sorted view.
///
/// The requested boundary ranks are evenly spaced over `[0, 1]`; each is
/// resolved to a retained quantile through the same rank search the
/// quantile queries use, so the boundary metadata is exactly consistent
/// with `view.quantile()`.
///
/// # Panics
///
/// Panics if `num_equally_sized` is zero.
pub(crate) fn partition_boundaries_from_sorted_view<T: QuantileItem>(
    view: &SortedView<T>,
    num_equally_sized: usize,
    search_crit: QuantileSearchCriteria,
) -> GenericPartitionBoundaries<T> {
    assert!(num_equally_sized >= 1, "at least one partition is required");

    let total_n = view.total_n();
    let requested_ranks = evenly_spaced_doubles(0.0, 1.0, num_equally_sized + 1);

    let mut boundaries = Vec::with_capacity(requested_ranks.len());
    let mut natural_ranks = Vec::with_capacity(requested_ranks.len());
    let mut normalized_ranks = Vec::with_capacity(requested_ranks.len());
    for &rank in &requested_ranks {
        let (boundary, natural) = resolve_boundary(view, rank, search_crit);
        boundaries.push(boundary);
        natural_ranks.push(natural);
        normalized_ranks.push(natural as f64 / total_n as f64);
    }

    // The first partition owns its low boundary under the inclusive
    // criterion, and the last partition owns its high boundary under the
    // exclusive criterion; the corresponding delta gets the extra item.
    let len = natural_ranks.len();
    let mut num_delta_items = vec![0u64; len];
    for i in 1..len {
        let add_one = (i == 1 && search_crit == QuantileSearchCriteria::Inclusive)
            || (i == len - 1 && search_crit == QuantileSearchCriteria::Exclusive);
        num_delta_items[i] = natural_ranks[i] - natural_ranks[i - 1] + (add_one as u64);
    }

    GenericPartitionBoundaries {
        total_n,
        boundaries,
        natural_ranks,
        normalized_ranks,
        min_item: view.min_item().clone(),
        max_item: view.max_item().clone(),
        search_criterion: search_crit,
        num_delta_items,
        num_partitions: num_equally_sized,
    }
}

/// Resolves one requested normalized rank to its (boundary item, natural
/// rank) pair, mirroring the quantile search.
fn resolve_boundary<T: QuantileItem>(
    view: &SortedView<T>,
    rank: f64,
    search_crit: QuantileSearchCriteria,
) -> (T, u64) {
    use crate::quantiles::InequalitySearch;
    use crate::quantiles::natural_rank;

    let target = natural_rank(rank, view.total_n(), search_crit);
    let crit = match search_crit {
        QuantileSearchCriteria::Inclusive => InequalitySearch::Ge,
        QuantileSearchCriteria::Exclusive => InequalitySearch::Gt,
    };
    let weights = view.cumulative_weights();
    let high = weights.len() - 1;
    let index = crit
        .find(weights, 0, high, &target)
        // past the top of the distribution
        .unwrap_or(high);
    (view.quantiles()[index].clone(), weights[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    use QuantileSearchCriteria::*;

    fn unit_view(n: u64) -> SortedView<f64> {
        let entries: Vec<(f64, u64)> = (1..=n).map(|i| (i as f64, 1)).collect();
        SortedView::from_entries(entries, 1.0, n as f64)
    }

    #[test]
    fn test_invariants_inclusive() {
        let view = unit_view(100);
        let gpb = partition_boundaries_from_sorted_view(&view, 4, Inclusive);
        assert_eq!(gpb.num_partitions(), 4);
        assert_eq!(gpb.boundaries().len(), 5);
        assert_eq!(gpb.natural_ranks().len(), 5);
        assert_eq!(gpb.normalized_ranks().len(), 5);
        assert_eq!(gpb.num_delta_items()[0], 0);
        let total: u64 = gpb.num_delta_items().iter().sum();
        assert_eq!(total, gpb.total_n());
    }

    #[test]
    fn test_invariants_exclusive() {
        let view = unit_view(100);
        let gpb = partition_boundaries_from_sorted_view(&view, 3, Exclusive);
        assert_eq!(gpb.num_partitions(), 3);
        assert_eq!(gpb.num_delta_items()[0], 0);
        let total: u64 = gpb.num_delta_items().iter().sum();
        assert_eq!(total, gpb.total_n());
    }

    #[test]
    fn test_boundaries_span_stream_extremes() {
        let view = unit_view(1000);
        for crit in [Inclusive, Exclusive] {
            let gpb = partition_boundaries_from_sorted_view(&view, 10, crit);
            assert_eq!(gpb.boundaries()[0], 1.0);
            assert_eq!(*gpb.boundaries().last().unwrap(), 1000.0);
            assert_eq!(*gpb.natural_ranks().last().unwrap(), 1000);
        }
    }

    #[test]
    fn test_exact_quarters() {
        let view = unit_view(8);
        let gpb = partition_boundaries_from_sorted_view(&view, 4, Inclusive);
        assert_eq!(gpb.boundaries(), &[1.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(gpb.natural_ranks(), &[1, 2, 4, 6, 8]);
        // first delta carries the +1 inclusive correction
        assert_eq!(gpb.num_delta_items(), &[0, 2, 2, 2, 2]);
    }

    #[test]
    #[should_panic(expected = "at least one partition is required")]
    fn test_zero_partitions_panics() {
        let view = unit_view(10);
        partition_boundaries_from_sorted_view(&view, 0, Inclusive);
    }
}
