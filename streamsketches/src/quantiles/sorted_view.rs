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

use std::cmp::Ordering;

use crate::quantiles::InequalitySearch;
use crate::quantiles::QuantileItem;
use crate::quantiles::QuantileSearchCriteria;
use crate::quantiles::natural_rank;

/// An immutable sorted view of a sketch's retained samples.
///
/// The view is a pair of parallel arrays: the sorted quantiles and their
/// cumulative weights, with `cumulative_weights[last] == total_n`. Because a
/// sketch's retained sample set may not contain the true stream extremes,
/// the constructor splices the tracked minimum in at the front (weight 1)
/// and the tracked maximum at the end (preserving the total weight) when
/// they are absent; every rank and quantile query then sees the full range
/// of the stream.
///
/// A view is immutable once built and safe to share between readers.
#[derive(Debug, Clone)]
pub struct SortedView<T> {
    quantiles: Vec<T>,
    cumulative_weights: Vec<u64>,
    total_n: u64,
    min_item: T,
    max_item: T,
}

impl<T: QuantileItem> SortedView<T> {
    /// Builds a view from unsorted (item, weight) entries plus the true
    /// stream extremes tracked by the sketch.
    ///
    /// # Panics
    ///
    /// Panics if `entries` is empty or any weight is zero.
    pub(crate) fn from_entries(mut entries: Vec<(T, u64)>, min_item: T, max_item: T) -> Self {
        assert!(!entries.is_empty(), "a sorted view requires at least one entry");
        entries.sort_by(|a, b| T::compare(&a.0, &b.0));

        let mut quantiles = Vec::with_capacity(entries.len() + 2);
        let mut cumulative_weights = Vec::with_capacity(entries.len() + 2);
        let mut total = 0u64;
        for (item, weight) in entries {
            assert!(weight > 0, "entry weights must be positive");
            total += weight;
            quantiles.push(item);
            cumulative_weights.push(total);
        }

        let mut view = Self {
            quantiles,
            cumulative_weights,
            total_n: total,
            min_item,
            max_item,
        };
        view.include_min_max();
        view
    }

    /// Splices the true stream extremes into the arrays when absent.
    ///
    /// The minimum enters at index 0 with cumulative weight 1 (borrowing one
    /// unit from the first retained item); the maximum enters at the end
    /// with cumulative weight `total_n`, demoting the previous last entry to
    /// `total_n - 1`. The total weight is unchanged by both adjustments.
    fn include_min_max(&mut self) {
        let adjust_low =
            T::compare(&self.quantiles[0], &self.min_item) != Ordering::Equal;
        let last = self.quantiles.len() - 1;
        let adjust_high =
            T::compare(&self.quantiles[last], &self.max_item) != Ordering::Equal;

        if adjust_low {
            self.quantiles.insert(0, self.min_item.clone());
            self.cumulative_weights.insert(0, 1);
        }
        if adjust_high {
            let last = self.cumulative_weights.len() - 1;
            self.cumulative_weights[last] = self.total_n - 1;
            self.quantiles.push(self.max_item.clone());
            self.cumulative_weights.push(self.total_n);
        }
    }

    /// Returns the total weight of the stream.
    pub fn total_n(&self) -> u64 {
        self.total_n
    }

    /// Returns the number of entries in the view.
    pub fn num_entries(&self) -> usize {
        self.quantiles.len()
    }

    /// Returns the sorted quantiles array.
    pub fn quantiles(&self) -> &[T] {
        &self.quantiles
    }

    /// Returns the cumulative weights array, parallel to
    /// [`quantiles`](Self::quantiles).
    pub fn cumulative_weights(&self) -> &[u64] {
        &self.cumulative_weights
    }

    /// Returns the smallest item of the stream.
    pub fn min_item(&self) -> &T {
        &self.min_item
    }

    /// Returns the largest item of the stream.
    pub fn max_item(&self) -> &T {
        &self.max_item
    }

    /// Returns the approximate quantile at the given normalized rank.
    ///
    /// # Panics
    ///
    /// Panics if `rank` is outside `[0.0, 1.0]`.
    pub fn quantile(&self, rank: f64, search_crit: QuantileSearchCriteria) -> T {
        assert!(
            (0.0..=1.0).contains(&rank),
            "rank must be in [0.0, 1.0], got {rank}"
        );
        let target = natural_rank(rank, self.total_n, search_crit);
        let crit = match search_crit {
            QuantileSearchCriteria::Inclusive => InequalitySearch::Ge,
            QuantileSearchCriteria::Exclusive => InequalitySearch::Gt,
        };
        let high = self.cumulative_weights.len() - 1;
        match crit.find(&self.cumulative_weights, 0, high, &target) {
            Some(index) => self.quantiles[index].clone(),
            // past the top of the distribution
            None => self.quantiles[high].clone(),
        }
    }

    /// Returns the normalized rank of the given item.
    pub fn rank(&self, item: &T, search_crit: QuantileSearchCriteria) -> f64 {
        let crit = match search_crit {
            QuantileSearchCriteria::Inclusive => InequalitySearch::Le,
            QuantileSearchCriteria::Exclusive => InequalitySearch::Lt,
        };
        let high = self.quantiles.len() - 1;
        match crit.find_with(&self.quantiles, 0, high, item, T::compare) {
            Some(index) => self.cumulative_weights[index] as f64 / self.total_n as f64,
            // below the bottom of the distribution
            None => 0.0,
        }
    }

    /// Returns the cumulative distribution over the given split points: one
    /// rank per split point plus a trailing 1.0.
    ///
    /// # Panics
    ///
    /// Panics if the split points are not unique and strictly increasing, or
    /// contain NaN.
    pub fn cdf(&self, split_points: &[T], search_crit: QuantileSearchCriteria) -> Vec<f64> {
        validate_split_points(split_points);
        let mut ranks = Vec::with_capacity(split_points.len() + 1);
        for point in split_points {
            ranks.push(self.rank(point, search_crit));
        }
        ranks.push(1.0);
        ranks
    }

    /// Returns the probability mass between consecutive split points, as the
    /// discrete derivative of [`cdf`](Self::cdf).
    ///
    /// # Panics
    ///
    /// Panics if the split points are not unique and strictly increasing, or
    /// contain NaN.
    pub fn pmf(&self, split_points: &[T], search_crit: QuantileSearchCriteria) -> Vec<f64> {
        let mut buckets = self.cdf(split_points, search_crit);
        for i in (1..buckets.len()).rev() {
            buckets[i] -= buckets[i - 1];
        }
        buckets
    }
}

fn validate_split_points<T: QuantileItem>(split_points: &[T]) {
    for i in 0..split_points.len() {
        if T::is_nan(&split_points[i]) {
            panic!("split_points must not contain NaN values");
        }
        if i + 1 < split_points.len()
            && T::compare(&split_points[i], &split_points[i + 1]) != Ordering::Less
        {
            panic!("split_points must be unique and monotonically increasing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use QuantileSearchCriteria::*;

    fn view_of(items: &[(f64, u64)], min: f64, max: f64) -> SortedView<f64> {
        SortedView::from_entries(items.to_vec(), min, max)
    }

    #[test]
    fn test_cumulative_weights_strictly_increasing() {
        let view = view_of(&[(3.0, 2), (1.0, 1), (2.0, 4)], 1.0, 3.0);
        assert_eq!(view.quantiles(), &[1.0, 2.0, 3.0]);
        assert_eq!(view.cumulative_weights(), &[1, 5, 7]);
        assert_eq!(view.total_n(), 7);
    }

    #[test]
    fn test_min_max_reinsertion() {
        // retained samples do not include the true extremes
        let view = view_of(&[(5.0, 3), (7.0, 3)], 2.0, 9.0);
        assert_eq!(view.quantiles(), &[2.0, 5.0, 7.0, 9.0]);
        // min takes weight 1 from the first sample; max takes 1 from the last
        assert_eq!(view.cumulative_weights(), &[1, 3, 5, 6]);
        assert_eq!(view.total_n(), 6);
        assert_eq!(view.quantile(0.0, Inclusive), 2.0);
        assert_eq!(view.quantile(1.0, Inclusive), 9.0);
    }

    #[test]
    fn test_quantile_and_rank_are_inverse() {
        let entries: Vec<(f64, u64)> = (1..=100).map(|i| (i as f64, 1)).collect();
        let view = view_of(&entries, 1.0, 100.0);
        for i in 1..=100u64 {
            let r = view.rank(&(i as f64), Inclusive);
            assert_eq!(r, i as f64 / 100.0);
            assert_eq!(view.quantile(r, Inclusive), i as f64);
        }
    }

    #[test]
    fn test_exclusive_rank_excludes_own_weight() {
        let entries = vec![(10.0, 1), (20.0, 1), (30.0, 1)];
        let view = view_of(&entries, 10.0, 30.0);
        assert_eq!(view.rank(&10.0, Exclusive), 0.0);
        assert_eq!(view.rank(&20.0, Exclusive), 1.0 / 3.0);
        assert_eq!(view.rank(&20.0, Inclusive), 2.0 / 3.0);
        assert_eq!(view.rank(&31.0, Exclusive), 1.0);
        assert_eq!(view.rank(&9.0, Inclusive), 0.0);
    }

    #[test]
    fn test_exclusive_top_rank_returns_last_quantile() {
        let entries = vec![(10.0, 1), (20.0, 1)];
        let view = view_of(&entries, 10.0, 20.0);
        // GT search at the full weight finds nothing; the documented result
        // is the top of the distribution
        assert_eq!(view.quantile(1.0, Exclusive), 20.0);
    }

    #[test]
    fn test_cdf_pmf() {
        let entries = vec![(1.0, 1), (2.0, 1), (3.0, 1), (4.0, 1)];
        let view = view_of(&entries, 1.0, 4.0);
        let cdf = view.cdf(&[1.5, 3.0], Inclusive);
        assert_eq!(cdf, vec![0.25, 0.75, 1.0]);
        let pmf = view.pmf(&[1.5, 3.0], Inclusive);
        assert_eq!(pmf, vec![0.25, 0.5, 0.25]);
    }

    #[test]
    #[should_panic(expected = "split_points must be unique and monotonically increasing")]
    fn test_unsorted_split_points_panic() {
        let view = view_of(&[(1.0, 1)], 1.0, 1.0);
        view.cdf(&[2.0, 1.0], Inclusive);
    }

    #[test]
    #[should_panic(expected = "split_points must not contain NaN values")]
    fn test_nan_split_point_panics() {
        let view = view_of(&[(1.0, 1)], 1.0, 1.0);
        view.cdf(&[f64::NAN], Inclusive);
    }
}
