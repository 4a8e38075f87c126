//! Shared test utilities for fieldmatch integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an in-memory (or temp-dir) engine
//! - Builders for documents, templates and mapping configurations

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
