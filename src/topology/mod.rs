//! Connectivity derived from a facet buffer.
//!
//! This module provides:
//! - [`corner_to_edge_mapping`], the deterministic corner → edge id assignment
//! - [`Connectivity`], CSR adjacency between vertices, edges, corners and facets
//! - [`extract_boundary_loops`], chaining of boundary edges into loops
//!
//! Most users reach these through `SurfaceMesh`, which builds the connectivity
//! lazily and drops it on every structural edit.

pub mod boundary;
pub mod cache;
pub mod connectivity;

pub use boundary::{BoundaryLoop, BoundaryLoopOptions, BoundaryLoops, extract_boundary_loops};
pub use cache::InvalidateCache;
pub use connectivity::{Connectivity, Csr, FacetBuffer, corner_to_edge_mapping};
