//! Memory collaborator used by devcrew agents and the orchestrator.
//!
//! The orchestrator and agents never call each other directly once a task is
//! handed out; every assignment and progress record travels through the
//! world-state partition of a [`MemoryClient`].
//!
//! # Main types
//!
//! - [`MemoryClient`]: Async contract with short-term, long-term and world-state partitions.
//! - [`InMemoryClient`]: In-process backend with TTLs and versioned world state.
//! - [`FileMemoryClient`]: Same, with the long-term partition appended to a JSONL file.

/// Memory contract and in-process backend.
pub mod client;
/// JSONL-backed long-term partition.
pub mod file;
pub mod keys;

pub use client::{InMemoryClient, MemoryClient, DEFAULT_SHORT_TERM_TTL};
pub use file::FileMemoryClient;
