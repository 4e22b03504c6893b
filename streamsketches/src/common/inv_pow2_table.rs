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

/// `INVERSE_POWERS_OF_2[i] == 2^-i`, exactly representable for the whole
/// range used by the estimators (columns 0..=63 plus one).
pub(crate) const INVERSE_POWERS_OF_2: [f64; 65] = build_table();

const fn build_table() -> [f64; 65] {
    let mut table = [0.0f64; 65];
    table[0] = 1.0;
    let mut i = 1;
    while i < 65 {
        table[i] = table[i - 1] / 2.0;
        i += 1;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_values() {
        assert_eq!(INVERSE_POWERS_OF_2[0], 1.0);
        assert_eq!(INVERSE_POWERS_OF_2[1], 0.5);
        assert_eq!(INVERSE_POWERS_OF_2[10], 1.0 / 1024.0);
        assert_eq!(INVERSE_POWERS_OF_2[64], (2.0f64).powi(-64));
    }
}
