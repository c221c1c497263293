//! Connected components of facets.
//!
//! Facets are connected through shared edges. Blockers cut that connection:
//! under [`ConnectivityType::Edge`] they name edges that do not connect, under
//! [`ConnectivityType::Vertex`] they name vertices that do not connect, and an
//! edge connects as long as one of its endpoints is not blocked.
//!
//! Component ids follow the order in which the breadth-first search reaches
//! its seeds: the facet scan runs from 0 to `num_facets - 1`, so component 0
//! always contains facet 0.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::algs::submesh::{SubmeshOptions, extract_submesh};
use crate::data::attribute::{AttributeElement, AttributeUsage};
use crate::data::attribute_store::AttributeId;
use crate::data::tagged::ErasedAttribute;
use crate::data::value_type::{Index, RealValue};
use crate::mesh::SurfaceMesh;
use crate::mesh_error::MeshError;
use crate::sink_debug;

/// Which shared elements connect two facets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectivityType {
    /// Facets sharing an edge through at least one unblocked vertex.
    Vertex,
    /// Facets sharing an unblocked edge.
    #[default]
    Edge,
}

/// Options for [`compute_components`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentOptions {
    pub connectivity_type: ConnectivityType,
    /// Facet attribute receiving the component id of each facet.
    pub output_attribute_name: String,
    /// Vertex ids (Vertex connectivity) or edge ids (Edge connectivity) that
    /// do not connect facets.
    pub blockers: Vec<Index>,
}

impl Default for ComponentOptions {
    fn default() -> Self {
        Self {
            connectivity_type: ConnectivityType::default(),
            output_attribute_name: "@component_id".to_owned(),
            blockers: Vec::new(),
        }
    }
}

/// Component id of every facet, and the number of components.
pub fn facet_component_ids<S: RealValue>(
    mesh: &SurfaceMesh<S>,
    connectivity_type: ConnectivityType,
    blockers: &[Index],
) -> Result<(Vec<Index>, usize), MeshError> {
    let conn = mesh.connectivity();
    let num_facets = mesh.get_num_facets();
    let num_edges = conn.num_edges();

    let mut open = vec![true; num_edges];
    match connectivity_type {
        ConnectivityType::Edge => {
            for &e in blockers {
                *open
                    .get_mut(e as usize)
                    .ok_or_else(|| MeshError::out_of_range("blocker edge", e as usize, num_edges))? =
                    false;
            }
        }
        ConnectivityType::Vertex => {
            let nv = mesh.get_num_vertices();
            let mut blocked = vec![false; nv];
            for &v in blockers {
                *blocked
                    .get_mut(v as usize)
                    .ok_or_else(|| MeshError::out_of_range("blocker vertex", v as usize, nv))? =
                    true;
            }
            for (e, [a, b]) in conn.edge_vertices().iter().enumerate() {
                open[e] = !(blocked[*a as usize] && blocked[*b as usize]);
            }
        }
    }

    let corner_to_edge = conn.corner_to_edge();
    let facets = mesh.facet_buffer();
    let mut ids = vec![Index::MAX; num_facets];
    let mut queue = VecDeque::new();
    let mut count = 0usize;
    for seed in 0..num_facets {
        if ids[seed] != Index::MAX {
            continue;
        }
        let id = count as Index;
        count += 1;
        ids[seed] = id;
        queue.push_back(seed);
        while let Some(f) = queue.pop_front() {
            for c in facets.facet_corners(f) {
                let e = corner_to_edge[c] as usize;
                if !open[e] {
                    continue;
                }
                for &g in conn.facets_around_edge(e) {
                    let slot = &mut ids[g as usize];
                    if *slot == Index::MAX {
                        *slot = id;
                        queue.push_back(g as usize);
                    }
                }
            }
        }
    }
    Ok((ids, count))
}

/// Label every facet with its component id and return the number of
/// components.
///
/// The ids are written to the facet attribute `options.output_attribute_name`
/// (value type `Index`). An existing attribute of that name is overwritten if
/// it has the same layout; anything else is an error.
pub fn compute_components<S: RealValue>(
    mesh: &mut SurfaceMesh<S>,
    options: &ComponentOptions,
) -> Result<usize, MeshError> {
    let (ids, count) = facet_component_ids(mesh, options.connectivity_type, &options.blockers)?;
    let name = options.output_attribute_name.as_str();
    let id = output_attribute(mesh, name)?;
    mesh.ref_attribute::<Index, _>(&id)?.set_all(&ids)?;
    sink_debug!(
        mesh.log_sink(),
        "{count} components over {} facets ({:?} connectivity)",
        ids.len(),
        options.connectivity_type
    );
    Ok(count)
}

fn output_attribute<S: RealValue>(mesh: &mut SurfaceMesh<S>, name: &str) -> Result<AttributeId, MeshError> {
    if !mesh.has_attribute(name) {
        return mesh.create_attribute::<Index>(name, AttributeElement::Facet, AttributeUsage::Scalar, 1, &[]);
    }
    let id = mesh.get_attribute_id(name)?;
    match mesh.get_erased_attribute(&id)? {
        ErasedAttribute::Plain(a) if a.element() == AttributeElement::Facet && a.num_channels() == 1 => {
            // Typed access reports a value-type mismatch.
            mesh.get_attribute::<Index, _>(&id)?;
            Ok(id)
        }
        other => Err(MeshError::InvalidUsage {
            name: name.to_owned(),
            usage: other.usage(),
            reason: "component ids need a single-channel facet attribute".to_owned(),
        }),
    }
}

/// Options for [`separate_by_components`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparateOptions {
    pub connectivity_type: ConnectivityType,
    pub blockers: Vec<Index>,
    /// Vertex attribute recording, in each piece, the source vertex index.
    pub source_vertex_attribute_name: Option<String>,
    /// Facet attribute recording, in each piece, the source facet index.
    pub source_facet_attribute_name: Option<String>,
    /// Transfer the attributes of `mesh` onto the pieces.
    pub map_attributes: bool,
}

/// Split `mesh` into one mesh per component, in component id order.
pub fn separate_by_components<S: RealValue>(
    mesh: &SurfaceMesh<S>,
    options: &SeparateOptions,
) -> Result<Vec<SurfaceMesh<S>>, MeshError> {
    let (ids, count) = facet_component_ids(mesh, options.connectivity_type, &options.blockers)?;
    let mut groups: Vec<Vec<Index>> = vec![Vec::new(); count];
    for (f, &c) in ids.iter().enumerate() {
        groups[c as usize].push(f as Index);
    }
    let submesh_options = SubmeshOptions {
        source_vertex_attribute_name: options.source_vertex_attribute_name.clone(),
        source_facet_attribute_name: options.source_facet_attribute_name.clone(),
        map_attributes: options.map_attributes,
    };
    groups
        .iter()
        .map(|facets| extract_submesh(mesh, facets, &submesh_options))
        .collect()
}
