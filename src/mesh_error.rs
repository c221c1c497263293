//! MeshError: Unified error type for mesh-attrib public APIs
//!
//! Every fallible operation of the attribute store, the mesh facade and the
//! transfer algorithms reports failures through this enum. Variants are grouped
//! by [`ErrorKind`] so callers can tell precondition violations apart from
//! mapping collisions without matching every variant.

use thiserror::Error;

use crate::data::attribute::{AttributeElement, AttributeUsage};
use crate::data::attribute_store::AttributeId;
use crate::data::value_type::ScalarType;

/// Coarse classification of a [`MeshError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The caller broke a documented precondition (duplicate name, wrong type,
    /// out-of-range index, malformed mapping, ...).
    PreconditionViolation,
    /// Several source rows collapsed onto one target under `MappingPolicy::Error`.
    Collision,
    /// An internal structural invariant (row counts, index bounds) does not hold.
    InvariantViolation,
}

/// Unified error type for mesh-attrib operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// An attribute with this name already exists.
    #[error("attribute `{0}` already exists")]
    DuplicateAttributeName(String),
    /// No attribute is registered under this name.
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),
    /// The id was never issued or its attribute has been removed.
    #[error("stale or unknown attribute id {0}")]
    StaleAttributeId(AttributeId),
    /// Typed access with a value type that differs from the stored tag.
    #[error("attribute `{name}` stores {found:?}, requested {expected:?}")]
    AttributeTypeMismatch {
        name: String,
        expected: ScalarType,
        found: ScalarType,
    },
    /// Plain access to an indexed attribute or vice versa.
    #[error("attribute `{name}` is {}", storage_label(.indexed))]
    StorageModeMismatch { name: String, indexed: bool },
    /// Reserved (`$`-prefixed) attributes cannot be created, removed or renamed by users.
    #[error("attribute `{0}` is reserved")]
    ReservedAttribute(String),
    /// An element index exceeded the current element count.
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    /// A buffer had the wrong number of entries.
    #[error("{what}: expected {expected} entries, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// The usage tag is incompatible with the channel count or value type.
    #[error("invalid usage {usage:?} for attribute `{name}`: {reason}")]
    InvalidUsage {
        name: String,
        usage: AttributeUsage,
        reason: String,
    },
    /// Attributes need at least one channel and a buffer that is a whole number of rows.
    #[error("invalid channel layout: {channels} channels for {len} values")]
    InvalidChannelCount { channels: usize, len: usize },
    /// Operation not supported for this element kind.
    #[error("unsupported element kind {element:?}: {reason}")]
    UnsupportedElement {
        element: AttributeElement,
        reason: &'static str,
    },
    /// Vertex dimension was zero or did not match another mesh.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// A forward mapping left some target element without any source.
    #[error("mapping is not surjective: target {target} has no source")]
    NotSurjective { target: usize },
    /// A mapping that must be a permutation is not.
    #[error("mapping of length {len} is not a permutation")]
    NotAPermutation { len: usize },
    /// Averaging requested on an attribute that stores element indices.
    #[error("cannot average index attribute `{0}`")]
    CannotAverageIndices(String),
    /// More than one source row maps to a target under `MappingPolicy::Error`.
    #[error("mapping collision on {element:?} target {target} ({count} sources)")]
    MappingCollision {
        element: AttributeElement,
        target: usize,
        count: usize,
    },
    /// A stored value cannot be represented in the requested value type.
    #[error("attribute `{name}`: value {value} does not fit {target:?}")]
    ValueOutOfRange {
        name: String,
        value: String,
        target: ScalarType,
    },
    /// Facets must have at least three corners.
    #[error("facet size {0} is below the minimum of 3")]
    InvalidFacetSize(usize),
    /// Structural invariant check failed.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

fn storage_label(indexed: &bool) -> &'static str {
    if *indexed { "indexed" } else { "not indexed" }
}

impl MeshError {
    /// Returns the coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshError::MappingCollision { .. } => ErrorKind::Collision,
            MeshError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            _ => ErrorKind::PreconditionViolation,
        }
    }

    /// Shorthand for `self.kind() == ErrorKind::PreconditionViolation`.
    pub fn is_precondition_violation(&self) -> bool {
        self.kind() == ErrorKind::PreconditionViolation
    }

    pub(crate) fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        MeshError::IndexOutOfRange { what, index, len }
    }
}
