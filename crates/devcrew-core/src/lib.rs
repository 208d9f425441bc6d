//! Core types and error definitions for devcrew.
//!
//! This crate provides the foundational types shared across all devcrew crates:
//! the unified error enum and the capability tag that links tasks to the agents
//! able to run them.
//!
//! # Main types
//!
//! - [`DevcrewError`]: Unified error enum for all devcrew subsystems.
//! - [`DevcrewResult`]: Convenience alias for `Result<T, DevcrewError>`.
//! - [`Capability`]: Opaque tag naming a kind of work.
//! - [`TaskId`]: Identifier of a queued task.

/// Error types.
pub mod error;

pub use error::{DevcrewError, DevcrewResult};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a task. Generated once at creation and never reassigned.
pub type TaskId = uuid::Uuid;

/// An opaque tag denoting a kind of work an agent can perform
/// (e.g. `code_generation`, `test_writing`).
///
/// Tags compare by exact string value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    /// Creates a capability tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for Capability {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// Builds a capability set from anything yielding tag-like values.
pub fn capability_set<I, C>(tags: I) -> BTreeSet<Capability>
where
    I: IntoIterator<Item = C>,
    C: Into<Capability>,
{
    tags.into_iter().map(Into::into).collect()
}
