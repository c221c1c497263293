//! Forward vertex remapping (merging and reordering vertices in place).

use serde::{Deserialize, Serialize};

use crate::algs::inverse_mapping::{count_targets, invert_mapping};
use crate::algs::mapping_policy::{CollisionPolicies, RemapVisitor, map_each};
use crate::data::attribute::{AttributeElement, StorageMode};
use crate::data::attribute_store::{AttributeFilter, AttributeRef};
use crate::data::value_type::{INVALID_INDEX, Index, RealValue};
use crate::debug_invariants::DebugInvariants;
use crate::diagnostics::NullSink;
use crate::mesh::{SurfaceMesh, rekey_edges};
use crate::mesh_error::MeshError;
use crate::sink_debug;
use crate::topology::connectivity::{Connectivity, FacetBuffer};

/// Options for [`remap_vertices`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapVerticesOptions {
    /// Collision resolution for vertex and edge attributes.
    pub policies: CollisionPolicies,
}

/// Send vertex `i` to `old_to_new[i]`.
///
/// The mapping must cover every vertex and be surjective onto
/// `0..max + 1`. Vertices landing on the same target are merged: their
/// attribute rows are combined with the policy configured for the value type.
/// Facets keep their corners, so merging the endpoints of an edge can leave
/// degenerate facets behind; removing them is left to the caller.
///
/// Edge attributes follow their vertex pairs; edges that collapse onto one
/// are combined with the same policies. Nothing is modified when an error is
/// returned.
pub fn remap_vertices<S: RealValue>(
    mesh: &mut SurfaceMesh<S>,
    old_to_new: &[Index],
    options: RemapVerticesOptions,
) -> Result<(), MeshError> {
    let num_vertices = mesh.get_num_vertices();
    if old_to_new.len() != num_vertices {
        return Err(MeshError::LengthMismatch {
            what: "vertex mapping",
            expected: num_vertices,
            found: old_to_new.len(),
        });
    }
    let num_targets = count_targets(old_to_new);
    if let Some(i) = old_to_new.iter().position(|&t| t == INVALID_INDEX) {
        return Err(MeshError::out_of_range("vertex mapping target", i, num_vertices));
    }
    let inv = invert_mapping(old_to_new, num_targets)?;
    if let Some(target) = inv.first_empty_target() {
        return Err(MeshError::NotSurjective { target });
    }
    let policies = options.policies;

    // Everything is computed against the untouched mesh first.
    let store = mesh.attributes();
    let vertex_filter = AttributeFilter::default()
        .including_reserved()
        .with_elements([AttributeElement::Vertex])
        .with_storage(StorageMode::Plain);
    let vertex_refs: Vec<AttributeRef<'_>> = store.filtered(&vertex_filter).collect();
    let vertex_updates = map_each(&vertex_refs, |r| {
        r.attr.visit(&mut RemapVisitor {
            name: r.name,
            inv: &inv,
            policies,
            element: None,
        })
    })?;

    let edge_updates = if store.has_element(AttributeElement::Edge)
        || store.has_index_usage(AttributeElement::Edge)
    {
        let old_edges = mesh.connectivity().edge_vertices();
        let corner_to_vertex: Vec<Index> = mesh
            .corner_to_vertex()
            .iter()
            .map(|&v| old_to_new[v as usize])
            .collect();
        let facets = FacetBuffer::new(&corner_to_vertex, mesh.facet_to_first_corner());
        let conn = Connectivity::build(&facets, num_targets, &NullSink);
        let (edge_old_to_new, edge_inv) = rekey_edges(&conn, old_edges, Some(old_to_new))?;

        let edge_filter = AttributeFilter::default()
            .with_elements([AttributeElement::Edge])
            .with_storage(StorageMode::Plain);
        let edge_refs: Vec<AttributeRef<'_>> = store.filtered(&edge_filter).collect();
        let updates = map_each(&edge_refs, |r| {
            r.attr.visit(&mut RemapVisitor {
                name: r.name,
                inv: &edge_inv,
                policies,
                element: None,
            })
        })?;
        Some((edge_old_to_new, updates))
    } else {
        None
    };

    let store = mesh.attributes_mut();
    for (id, attr) in vertex_updates {
        store.replace(id, attr)?;
    }
    if let Some((edge_old_to_new, updates)) = edge_updates {
        for (id, attr) in updates {
            store.replace(id, attr)?;
        }
        store.remap_index_values(AttributeElement::Edge, &edge_old_to_new);
    }
    store.remap_index_values(AttributeElement::Vertex, old_to_new);
    mesh.set_num_vertices(num_targets);
    sink_debug!(
        mesh.log_sink(),
        "remapped {num_vertices} vertices onto {num_targets}"
    );
    crate::debug_invariants!(mesh.validate_invariants(), "remap_vertices");
    Ok(())
}
