//! # wikidb testkit
//!
//! Test utilities for wikidb.
//!
//! This crate provides:
//! - Store fixtures, in memory and on disk
//! - Sample documents and classes
//! - A storage backend that fails on demand
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wikidb_testkit::prelude::*;
//!
//! #[test]
//! fn saves_a_page() {
//!     with_temp_store(|store| {
//!         let mut doc = page("Main", "A", "[[B]]");
//!         store.documents().save(&mut doc, &store.context()).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
