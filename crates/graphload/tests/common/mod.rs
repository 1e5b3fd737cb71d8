//! Shared test utilities for graphload integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an upload service to in-memory stores
//! - Builders for RDF documents and class catalogs

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
