#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-attrib
//!
//! mesh-attrib is the data layer of a polygonal mesh processing library: typed
//! per-element attributes, connectivity derived from the facet buffer, and the
//! machinery that moves attribute rows around when elements are merged,
//! permuted, split or copied between meshes.
//!
//! ## Features
//! - [`SurfaceMesh`] with fixed or mixed facet sizes, addressed through corner offsets
//! - Plain and indexed attributes over a closed set of value types, with
//!   type-erased enumeration through visitors
//! - Deterministic corner → edge mapping, CSR adjacency and boundary loops
//! - Connected components under vertex or edge connectivity
//! - Backward and forward attribute transfer with per-type collision policies
//! - Optional `rayon` parallelism for per-attribute work
//!
//! ## Determinism
//!
//! Edge ids, component ids and every transfer result depend only on the input
//! buffers. Edges are numbered by sorted vertex pair and components by the
//! first facet reached in index order, so repeated runs give identical output.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-attrib = "0.3"
//! # features = ["rayon"]
//! ```
//!
//! ```
//! use mesh_attrib::prelude::*;
//!
//! let mut mesh = SurfaceMesh::<f64>::new(3)?;
//! mesh.add_vertices(&[0., 0., 0., 1., 0., 0., 0., 1., 0.])?;
//! mesh.add_triangle(0, 1, 2)?;
//! assert_eq!(mesh.get_num_edges(), 3);
//!
//! let id = mesh.create_attribute::<f32>(
//!     "weight",
//!     AttributeElement::Vertex,
//!     AttributeUsage::Scalar,
//!     1,
//!     &[],
//! )?;
//! mesh.add_vertex(&[1., 1., 0.])?;
//! assert_eq!(mesh.get_attribute::<f32, _>(&id)?.num_rows(), 4);
//! # Ok::<(), MeshError>(())
//! ```
//!
//! ## Logging
//!
//! Diagnostics go through a [`LogSink`](diagnostics::LogSink) owned by each
//! mesh. The default forwards to the [`log`] facade; install
//! [`NullSink`](diagnostics::NullSink) or your own sink with
//! [`SurfaceMesh::with_log_sink`].

pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod diagnostics;
pub mod mesh;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use mesh::SurfaceMesh;
pub use mesh_error::{ErrorKind, MeshError};

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::{
        CollisionPolicies, ComponentOptions, ConnectivityType, MapAttributesOptions, MapTarget,
        MappingPolicy, RemapVerticesOptions, RemoveDuplicateFacetOptions,
        RemoveDuplicateVerticesOptions, SeparateOptions, SubmeshOptions, WeldOptions,
        cast_attribute, combine_meshes, compute_components, extract_submesh, map_attribute,
        map_attribute_in_place, map_attributes, remap_vertices, remove_duplicate_facets,
        remove_duplicate_vertices, remove_isolated_vertices, separate_by_components,
        unify_index_buffer, weld_indexed_attribute,
    };
    pub use crate::data::{
        Attribute, AttributeElement, AttributeFilter, AttributeId, AttributeUsage, AttributeValue,
        ErasedAttribute, INVALID_INDEX, Index, IndexedAttribute, ScalarType, StorageMode,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::diagnostics::{CaptureSink, LogSink, NullSink, SharedSink};
    pub use crate::mesh::SurfaceMesh;
    pub use crate::mesh_error::{ErrorKind, MeshError};
    pub use crate::topology::{BoundaryLoopOptions, BoundaryLoops, Connectivity};
}
