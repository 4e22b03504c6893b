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

//! The ICON cardinality estimator and the confidence bounds for both
//! estimators.
//!
//! The ICON estimate inverts the expected-coupon-count map: for a stream of
//! `n` distinct items, the expected number of collected coupons is
//!
//! ```text
//! E[C](n) = K * sum over columns j of (1 - (1 - q_j / K)^n)
//! ```
//!
//! where `q_j = 2^-(j+1)` and the last column absorbs the geometric tail.
//! `E[C]` is strictly increasing in `n`, so given an observed coupon count
//! the estimate is recovered by bisection. Above `5.6K..5.7K` coupons the
//! closed-form exponential approximation takes over; the differing
//! thresholds by `lg_k` keep the combined estimator monotonic.

use std::f64::consts::LN_2;

use crate::common::NumStdDev;
use crate::common::inv_pow2_table::INVERSE_POWERS_OF_2;

const ICON_ERROR_CONSTANT: f64 = LN_2;

const ICON_LOW_SIDE_DATA: [u16; 33] = [
    //1,    2,    3,   kappa
    //                 lgK num trials
    6037, 5720, 5328, // 4 1000000
    6411, 6262, 5682, // 5 1000000
    6724, 6403, 6127, // 6 1000000
    6665, 6411, 6208, // 7 1000000
    6959, 6525, 6427, // 8 1000000
    6892, 6665, 6619, // 9 1000000
    6792, 6752, 6690, // 10 1000000
    6899, 6818, 6708, // 11 1000000
    6871, 6845, 6812, // 12 1046369
    6909, 6861, 6828, // 13 1043411
    6919, 6897, 6842, // 14 1000297
];

const ICON_HIGH_SIDE_DATA: [u16; 33] = [
    //1,    2,    3,   kappa
    //                 lgK num trials
    8031, 8559, 9309, // 4 1000000
    7084, 7959, 8660, // 5 1000000
    7141, 7514, 7876, // 6 1000000
    7458, 7430, 7572, // 7 1000000
    6892, 7141, 7497, // 8 1000000
    6889, 7132, 7290, // 9 1000000
    7075, 7118, 7185, // 10 1000000
    7040, 7047, 7085, // 11 1000000
    6993, 7019, 7053, // 12 1046369
    6953, 7001, 6983, // 13 1043411
    6944, 6966, 7004, // 14 1000297
];

#[allow(clippy::excessive_precision)]
const HIP_ERROR_CONSTANT: f64 = 0.588705011257737332; // (LN_2 / 2.0).sqrt()

const HIP_LOW_SIDE_DATA: [u16; 33] = [
    //1,    2,    3,   kappa
    //                 lgK num trials
    5871, 5247, 4826, // 4 1000000
    5877, 5403, 5070, // 5 1000000
    5873, 5533, 5304, // 6 1000000
    5878, 5632, 5464, // 7 1000000
    5874, 5690, 5564, // 8 1000000
    5880, 5745, 5619, // 9 1000000
    5875, 5784, 5701, // 10 1000000
    5866, 5789, 5742, // 11 1000000
    5869, 5827, 5784, // 12 1046369
    5876, 5860, 5827, // 13 1043411
    5881, 5853, 5842, // 14 1000297
];

const HIP_HIGH_SIDE_DATA: [u16; 33] = [
    //1,    2,    3,   kappa
    //                 lgK num trials
    5855, 6688, 7391, // 4 1000000
    5886, 6444, 6923, // 5 1000000
    5885, 6254, 6594, // 6 1000000
    5889, 6134, 6326, // 7 1000000
    5900, 6072, 6203, // 8 1000000
    5875, 6005, 6089, // 9 1000000
    5871, 5980, 6040, // 10 1000000
    5889, 5941, 6015, // 11 1000000
    5871, 5926, 5973, // 12 1046369
    5866, 5901, 5915, // 13 1043411
    5880, 5914, 5953, // 14 1000297
];

/// The closed-form approximation used once the sketch is deep into the
/// sliding regime.
fn icon_exponential_approximation(k: f64, c: f64) -> f64 {
    0.7940236163830469 * k * (2.0f64).powf(c / k)
}

/// Expected number of collected coupons after a stream of `n` distinct
/// items. Also consumed by the code-table builder to model mid-range byte
/// distributions.
pub(super) fn expected_coupons(lg_k: u8, n: f64) -> f64 {
    let k = (1u64 << lg_k) as f64;
    let mut sum = 0.0;
    for col in 0..64usize {
        // the last column absorbs the geometric tail of the column law
        let q = if col < 63 {
            INVERSE_POWERS_OF_2[col + 1]
        } else {
            INVERSE_POWERS_OF_2[63]
        };
        // k * (1 - (1 - q/k)^n), computed in log space for accuracy
        sum += k * (-f64::exp_m1(n * f64::ln_1p(-q / k)));
    }
    sum
}

/// Returns the ICON estimate of the number of distinct items, given the
/// observed coupon count.
pub(super) fn icon_estimate(lg_k: u8, num_coupons: u32) -> f64 {
    if num_coupons < 2 {
        return num_coupons as f64;
    }
    let k = (1u64 << lg_k) as f64;
    let c = num_coupons as f64;

    let threshold_factor = if lg_k < 14 { 5.7 } else { 5.6 };
    if c > threshold_factor * k {
        return icon_exponential_approximation(k, c);
    }

    // Bisection on n. E[C](n) <= n always, so n = c is a lower bound; the
    // upper bound is found by doubling.
    let mut lo = c;
    let mut hi = c.max(k);
    while expected_coupons(lg_k, hi) < c {
        lo = hi;
        hi *= 2.0;
    }
    for _ in 0..80 {
        let mid = 0.5 * (lo + hi);
        if expected_coupons(lg_k, mid) < c {
            lo = mid;
        } else {
            hi = mid;
        }
        if (hi - lo) <= 1e-9 * hi {
            break;
        }
    }
    0.5 * (lo + hi)
}

pub(super) fn icon_confidence_lb(lg_k: u8, num_coupons: u32, kappa: NumStdDev) -> f64 {
    if num_coupons == 0 {
        return 0.0;
    }

    let k = (1u64 << lg_k) as f64;
    let kappa = kappa.as_u8();

    let mut x = ICON_ERROR_CONSTANT;
    if lg_k <= 14 {
        let idx = (3 * (lg_k - 4) + (kappa - 1)) as usize;
        x = (ICON_HIGH_SIDE_DATA[idx] as f64) / 10000.0;
    }
    let rel = x / k.sqrt();
    let eps = (kappa as f64) * rel;
    let est = icon_estimate(lg_k, num_coupons);
    let result = est / (1.0 + eps);
    result.max(num_coupons as f64)
}

pub(super) fn icon_confidence_ub(lg_k: u8, num_coupons: u32, kappa: NumStdDev) -> f64 {
    if num_coupons == 0 {
        return 0.0;
    }

    let k = (1u64 << lg_k) as f64;
    let kappa = kappa.as_u8();

    let mut x = ICON_ERROR_CONSTANT;
    if lg_k <= 14 {
        let idx = (3 * (lg_k - 4) + (kappa - 1)) as usize;
        x = (ICON_LOW_SIDE_DATA[idx] as f64) / 10000.0;
    }
    let rel = x / k.sqrt();
    let eps = (kappa as f64) * rel;
    let est = icon_estimate(lg_k, num_coupons);
    let result = est / (1.0 - eps);
    result.ceil() // slight widening of interval to be conservative
}

// merge_flag must already be checked as false
pub(super) fn hip_confidence_lb(
    lg_k: u8,
    num_coupons: u32,
    hip_estimate: f64,
    kappa: NumStdDev,
) -> f64 {
    if num_coupons == 0 {
        return 0.0;
    }

    let k = (1u64 << lg_k) as f64;
    let kappa = kappa.as_u8();

    let mut x = HIP_ERROR_CONSTANT;
    if lg_k <= 14 {
        let idx = (3 * (lg_k - 4) + (kappa - 1)) as usize;
        x = (HIP_HIGH_SIDE_DATA[idx] as f64) / 10000.0;
    }
    let rel = x / k.sqrt();
    let eps = (kappa as f64) * rel;
    let result = hip_estimate / (1.0 + eps);
    result.max(num_coupons as f64)
}

// merge_flag must already be checked as false
pub(super) fn hip_confidence_ub(
    lg_k: u8,
    num_coupons: u32,
    hip_estimate: f64,
    kappa: NumStdDev,
) -> f64 {
    if num_coupons == 0 {
        return 0.0;
    }

    let k = (1u64 << lg_k) as f64;
    let kappa = kappa.as_u8();

    let mut x = HIP_ERROR_CONSTANT;
    if lg_k <= 14 {
        let idx = (3 * (lg_k - 4) + (kappa - 1)) as usize;
        x = (HIP_LOW_SIDE_DATA[idx] as f64) / 10000.0;
    }
    let rel = x / k.sqrt();
    let eps = (kappa as f64) * rel;
    let result = hip_estimate / (1.0 - eps);
    result.ceil() // widening for coverage
}
