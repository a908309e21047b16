//! Forward references to results earlier in the same pipeline.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies one pipeline of one batch, so pointers cannot leak between them.
pub type PipelineId = u64;

/// Stands for "the entity produced by operation N of this pipeline".
///
/// The server substitutes the pointer with that entity while executing the
/// pipeline, so the address is meaningful only inside the pipeline that
/// issued it. Equality compares addresses only.
#[derive(Clone, Copy)]
pub struct Pointer {
    address: usize,
    pipeline: Option<PipelineId>,
}

impl Pointer {
    /// A pointer with no recorded origin, as received from a server reply or
    /// parsed from a request line.
    pub fn new(address: usize) -> Self {
        Self {
            address,
            pipeline: None,
        }
    }

    /// A pointer issued by the given pipeline.
    pub fn issued(address: usize, pipeline: PipelineId) -> Self {
        Self {
            address,
            pipeline: Some(pipeline),
        }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn pipeline(&self) -> Option<PipelineId> {
        self.pipeline
    }
}

impl PartialEq for Pointer {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Pointer {}

impl Hash for Pointer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer({})", self.address)
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*{}", self.address)
    }
}
