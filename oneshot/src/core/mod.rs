//! Deterministic, pure logic shared by oneshot.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod branch;
pub mod classifier;
pub mod pr_url;
pub mod types;
