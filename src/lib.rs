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

//! A HyperLogLog cardinality estimator, storage-compatible with the
//! byte format (v1.0.0) shared by the java-hll and postgresql-hll
//! implementations.
//!
//! # Overview
//!
//! An [`Hll`] estimates the number of distinct 64-bit hashed values it
//! has observed, in sub-linear memory. It moves through four
//! representations as cardinality grows, promoting automatically:
//!
//! - **EMPTY**: nothing stored; cardinality is exactly 0.
//! - **EXPLICIT**: the hashed values themselves, so cardinality stays
//!   exact while the set is small.
//! - **SPARSE**: only the non-zero probabilistic registers, keyed by
//!   register index.
//! - **FULL**: the dense bit-packed register file of the HyperLogLog
//!   paper, with small- and large-range corrections (the latter adapted
//!   for 64-bit hashes).
//!
//! Estimators configured with the same parameters union losslessly, and
//! [`Hll::to_bytes`] / [`Hll::from_bytes`] interoperate with the other
//! implementations of the same storage spec.
//!
//! # Examples
//!
//! ```
//! use hll::Hll;
//!
//! let mut visitors = Hll::new(14, 5).unwrap();
//! for visitor in ["alice", "bob", "carol", "alice"] {
//!     visitors.update(visitor);
//! }
//! assert_eq!(visitors.cardinality(), 3);
//!
//! let bytes = visitors.to_bytes();
//! let restored = Hll::from_bytes(&bytes).unwrap();
//! assert_eq!(restored.cardinality(), 3);
//! ```
//!
//! Inputs fed through [`Hll::add_raw`] must already be hashed with an
//! avalanche-quality 64-bit hash function (for instance MurmurHash3);
//! [`Hll::update`] does that hashing for any `Hash` value.

mod bit_vector;
mod bits;
mod codec;
pub mod error;
mod estimator;
mod explicit_set;
mod serialization;
mod sketch;
mod sparse_map;

pub use sketch::Hll;
pub use sketch::HllType;
pub use sketch::MAXIMUM_EXPTHRESH_PARAM;
pub use sketch::MAXIMUM_LOG2M_PARAM;
pub use sketch::MAXIMUM_REGWIDTH_PARAM;
pub use sketch::MINIMUM_EXPTHRESH_PARAM;
pub use sketch::MINIMUM_LOG2M_PARAM;
pub use sketch::MINIMUM_REGWIDTH_PARAM;
