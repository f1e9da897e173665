//! Deterministic, pure logic shared by bt.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod convergence;
pub mod history;
pub mod invariants;
pub mod progress;
pub mod slug;
pub mod staging;
pub mod types;
pub mod verdict;
