//! Submesh extraction.

use serde::{Deserialize, Serialize};

use crate::algs::inverse_mapping::InverseMapping;
use crate::algs::map_attributes::{ElementMappings, transfer_attributes};
use crate::algs::mapping_policy::CollisionPolicies;
use crate::data::attribute::{AttributeElement, AttributeUsage};
use crate::data::attribute_store::AttributeFilter;
use crate::data::value_type::{INVALID_INDEX, Index, RealValue};
use crate::debug_invariants::DebugInvariants;
use crate::mesh::SurfaceMesh;
use crate::mesh_error::MeshError;

/// Options for [`extract_submesh`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmeshOptions {
    /// Vertex attribute recording the source vertex of each extracted vertex.
    pub source_vertex_attribute_name: Option<String>,
    /// Facet attribute recording the source facet of each extracted facet.
    pub source_facet_attribute_name: Option<String>,
    /// Transfer the vertex, facet, corner and indexed attributes of the source.
    pub map_attributes: bool,
}

/// Build a new mesh from the listed facets of `mesh`.
///
/// Facets keep the order of `facets`; vertices are numbered by first use in
/// that order. The result shares the log sink of `mesh`.
pub fn extract_submesh<S: RealValue>(
    mesh: &SurfaceMesh<S>,
    facets: &[Index],
    options: &SubmeshOptions,
) -> Result<SurfaceMesh<S>, MeshError> {
    let num_facets = mesh.get_num_facets();
    let fb = mesh.facet_buffer();
    let mut vertex_old_to_new = vec![INVALID_INDEX; mesh.get_num_vertices()];
    let mut vertex_new_to_old: Vec<Index> = Vec::new();
    let mut corner_new_to_old: Vec<Index> = Vec::new();
    let mut sizes = Vec::with_capacity(facets.len());
    let mut corner_vertices = Vec::new();
    for &f in facets {
        if f as usize >= num_facets {
            return Err(MeshError::out_of_range("facet", f as usize, num_facets));
        }
        let range = fb.facet_corners(f as usize);
        sizes.push(range.len());
        for c in range {
            let v = fb.corner_to_vertex()[c] as usize;
            if vertex_old_to_new[v] == INVALID_INDEX {
                vertex_old_to_new[v] = vertex_new_to_old.len() as Index;
                vertex_new_to_old.push(v as Index);
            }
            corner_vertices.push(vertex_old_to_new[v]);
            corner_new_to_old.push(c as Index);
        }
    }

    let dim = mesh.get_dimension();
    let positions = mesh.positions();
    let mut out = SurfaceMesh::<S>::new(dim)?.with_log_sink(mesh.log_sink().clone());
    let coords: Vec<S> = vertex_new_to_old
        .iter()
        .flat_map(|&v| &positions[v as usize * dim..(v as usize + 1) * dim])
        .copied()
        .collect();
    out.add_vertices(&coords)?;
    out.add_hybrid(&sizes, &corner_vertices)?;

    if options.map_attributes {
        let mappings = ElementMappings {
            vertex: Some(InverseMapping::from_backward(vertex_new_to_old.clone(), None)?),
            facet: Some(InverseMapping::from_backward(facets.to_vec(), None)?),
            corner: Some(InverseMapping::from_backward(corner_new_to_old, None)?),
        };
        let attrs = transfer_attributes(
            mesh,
            &mappings,
            &AttributeFilter::default(),
            CollisionPolicies::default(),
        )?;
        for (name, attr) in attrs {
            out.insert_attribute(&name, attr)?;
        }
    }
    if let Some(name) = &options.source_vertex_attribute_name {
        out.create_attribute::<Index>(
            name,
            AttributeElement::Vertex,
            AttributeUsage::Scalar,
            1,
            &vertex_new_to_old,
        )?;
    }
    if let Some(name) = &options.source_facet_attribute_name {
        out.create_attribute::<Index>(name, AttributeElement::Facet, AttributeUsage::Scalar, 1, facets)?;
    }
    crate::debug_invariants!(out.validate_invariants(), "extract_submesh");
    Ok(out)
}
