//! # DualDB Testkit
//!
//! Test utilities for DualDB.
//!
//! This crate provides:
//! - Sample schemas and records
//! - Entity stores wired to the in-memory services, one per backend
//! - Property-based test generators using proptest
//! - Tracing setup for test output
//!
//! ## Usage
//!
//! ```rust
//! use dualdb_testkit::prelude::*;
//!
//! with_each_backend(2, |store| {
//!     let mut abc = person("abc", 25);
//!     store.put(PERSON, &mut abc).unwrap();
//!     assert_eq!(store.get(PERSON, "abc").unwrap(), Some(abc));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
