//! Structural self-checks for attribute stores and meshes.
//!
//! [`DebugInvariants::validate_invariants`] always runs the full check and
//! reports the first problem as [`MeshError::InvariantViolation`]. Structural
//! edits call [`debug_invariants!`](crate::debug_invariants) on their result,
//! which panics when checks are compiled in (debug builds, or the
//! `check-invariants` / `strict-invariants` features) and expands to nothing
//! otherwise.

use std::fmt::Display;

use crate::mesh_error::MeshError;

/// Whether [`debug_invariants!`](crate::debug_invariants) checks run in this build.
pub const INVARIANT_CHECKS_ENABLED: bool = cfg!(any(
    debug_assertions,
    feature = "strict-invariants",
    feature = "check-invariants"
));

/// Self-validation of a structure whose parts must stay in step
/// (row counts against element counts, index values against their targets).
pub trait DebugInvariants {
    /// Check every invariant and return the first violation.
    fn validate_invariants(&self) -> Result<(), MeshError>;

    /// Panic on a violated invariant when checks are compiled in.
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "invariant check");
    }
}

/// Attach the name of the violated invariant to a failing sub-check.
///
/// Errors from helpers that normally report bad input (an out-of-range index,
/// a stale id) describe corrupted state when they surface during validation,
/// so they are rewrapped as [`MeshError::InvariantViolation`].
pub(crate) trait InvariantContext<T> {
    fn invariant(self, what: impl Display) -> Result<T, MeshError>;
}

impl<T> InvariantContext<T> for Result<T, MeshError> {
    fn invariant(self, what: impl Display) -> Result<T, MeshError> {
        self.map_err(|e| match e {
            MeshError::InvariantViolation(msg) => {
                MeshError::InvariantViolation(format!("{what}: {msg}"))
            }
            other => MeshError::InvariantViolation(format!("{what}: {other}")),
        })
    }
}

/// Run a fallible check after an edit and panic with `ctx` when it fails.
/// Compiles to nothing unless [`INVARIANT_CHECKS_ENABLED`].
#[doc(hidden)]
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
