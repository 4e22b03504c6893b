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

//! # streamsketches
//!
//! A library of stochastic streaming algorithms ("sketches") for single-pass
//! analysis of massive data streams.
//!
//! The library is divided into modules that constitute distinct groups of
//! functionality:
//!
//! - [`cpc`] — Compressed Probabilistic Counting distinct-counting sketch and
//!   its union operation.
//! - [`kll`] — KLL streaming quantiles sketch.
//! - [`quantiles`] — the shared rank-search engine behind the quantiles
//!   sketches: boundary-sensitive inequality search, sorted views, and
//!   partition boundaries.
//! - [`common`], [`error`] — shared support types.
//!
//! Sketches are single-writer data structures; none of them are safe for
//! concurrent mutation. Derived snapshots (sorted views, partition
//! boundaries, serialized images) are immutable once constructed.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod common;
pub mod cpc;
pub mod error;
pub mod kll;
pub mod quantiles;

mod codec;
mod hash;
