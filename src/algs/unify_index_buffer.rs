//! Splitting vertices so indexed attributes become per-vertex.

use std::cmp::Ordering;

use crate::algs::inverse_mapping::{InverseMapping, invert_mapping};
use crate::algs::map_attributes::{ElementMappings, transfer_attributes};
use crate::algs::mapping_policy::CollisionPolicies;
use crate::data::attribute::{Attribute, AttributeElement, StorageMode};
use crate::data::attribute_store::{AttributeFilter, AttributeId};
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::tagged::{AttributeVisitor, ErasedAttribute};
use crate::data::value_type::{AttributeValue, Index, RealValue};
use crate::debug_invariants::DebugInvariants;
use crate::mesh::SurfaceMesh;
use crate::mesh_error::MeshError;
use crate::{sink_debug, sink_warn};

/// Build a mesh whose vertices are the distinct (vertex, value index) corner
/// combinations of the selected indexed attributes, which become plain vertex
/// attributes of the same name.
///
/// An empty `attribute_ids` selects every non-reserved indexed attribute.
/// New vertices are ordered by source vertex, then by index tuple; unset
/// indices sort last. Vertices no corner references are dropped. Facets keep
/// their order and size.
///
/// Vertex attributes are copied from the source vertex, facet, corner and
/// value attributes are carried as they are, and unselected indexed
/// attributes stay indexed. Edge attributes and attributes whose values are
/// element indices are not carried over.
pub fn unify_index_buffer<S: RealValue>(
    mesh: &SurfaceMesh<S>,
    attribute_ids: &[AttributeId],
) -> Result<SurfaceMesh<S>, MeshError> {
    let selected = select(mesh, attribute_ids)?;
    let indices: Vec<&[Index]> = selected
        .iter()
        .filter_map(|&(_, a)| match a {
            ErasedAttribute::Indexed(a) => Some(a.indices().get_all()),
            ErasedAttribute::Plain(_) => None,
        })
        .collect();
    let compare = |a: Index, b: Index| {
        indices
            .iter()
            .map(|idx| idx[a as usize].cmp(&idx[b as usize]))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    };

    let corner_to_vertex = mesh.corner_to_vertex();
    let by_vertex = invert_mapping(corner_to_vertex, mesh.get_num_vertices())?;
    let mut corner_to_new = vec![0 as Index; mesh.get_num_corners()];
    let mut representative: Vec<Index> = Vec::new();
    let mut group: Vec<Index> = Vec::new();
    for v in 0..by_vertex.num_targets() {
        group.clear();
        group.extend_from_slice(by_vertex.sources(v));
        // Stable, so the first corner of each run is its lowest.
        group.sort_by(|&a, &b| compare(a, b));
        for (k, &c) in group.iter().enumerate() {
            if k == 0 || compare(group[k - 1], c).is_ne() {
                representative.push(c);
            }
            corner_to_new[c as usize] = (representative.len() - 1) as Index;
        }
    }
    let vertex_new_to_old: Vec<Index> = representative
        .iter()
        .map(|&c| corner_to_vertex[c as usize])
        .collect();

    let dim = mesh.get_dimension();
    let positions = mesh.positions();
    let coords: Vec<S> = vertex_new_to_old
        .iter()
        .flat_map(|&v| &positions[v as usize * dim..(v as usize + 1) * dim])
        .copied()
        .collect();
    let sizes: Vec<usize> = mesh.facet_buffer().facets().map(|(_, r)| r.len()).collect();
    let mut out = SurfaceMesh::<S>::new(dim)?.with_log_sink(mesh.log_sink().clone());
    out.add_vertices(&coords)?;
    out.add_hybrid(&sizes, &corner_to_new)?;

    if mesh.attributes().has_element(AttributeElement::Edge) {
        sink_warn!(
            mesh.log_sink(),
            "edge attributes are not carried over when unifying index buffers"
        );
    }
    let mappings = ElementMappings {
        vertex: Some(InverseMapping::from_backward(vertex_new_to_old, None)?),
        facet: Some(InverseMapping::identity(mesh.get_num_facets())),
        corner: Some(InverseMapping::identity(mesh.get_num_corners())),
    };
    let carried = transfer_attributes(
        mesh,
        &mappings,
        &AttributeFilter::default(),
        CollisionPolicies::default(),
    )?;
    for (name, attr) in carried {
        if selected.iter().all(|&(n, _)| n != name) {
            out.insert_attribute(&name, attr)?;
        }
    }
    for (name, attr) in &selected {
        let per_vertex = attr.visit(&mut PerVertex {
            representative: &representative,
        })?;
        out.insert_attribute(name, per_vertex)?;
    }

    sink_debug!(
        out.log_sink(),
        "unified {} indexed attributes: {} vertices became {}",
        selected.len(),
        mesh.get_num_vertices(),
        out.get_num_vertices()
    );
    crate::debug_invariants!(out.validate_invariants(), "unify_index_buffer");
    Ok(out)
}

/// [`unify_index_buffer`] with attributes given by name.
pub fn unify_named_index_buffer<S: RealValue>(
    mesh: &SurfaceMesh<S>,
    names: &[&str],
) -> Result<SurfaceMesh<S>, MeshError> {
    let ids = names
        .iter()
        .map(|n| mesh.get_attribute_id(n))
        .collect::<Result<Vec<_>, _>>()?;
    unify_index_buffer(mesh, &ids)
}

/// Names and attributes to unify; each must be indexed.
fn select<'m, S: RealValue>(
    mesh: &'m SurfaceMesh<S>,
    ids: &[AttributeId],
) -> Result<Vec<(&'m str, &'m ErasedAttribute)>, MeshError> {
    if ids.is_empty() {
        let filter = AttributeFilter::default().with_storage(StorageMode::Indexed);
        return Ok(mesh.foreach_attribute(&filter).map(|r| (r.name, r.attr)).collect());
    }
    ids.iter()
        .map(|&id| {
            let name = mesh.get_attribute_name(id)?;
            let attr = mesh.get_erased_attribute(&id)?;
            match attr {
                ErasedAttribute::Indexed(_) => Ok((name, attr)),
                ErasedAttribute::Plain(_) => Err(MeshError::StorageModeMismatch {
                    name: name.to_owned(),
                    indexed: false,
                }),
            }
        })
        .collect()
}

/// Values of an indexed attribute read at one corner per new vertex.
struct PerVertex<'a> {
    representative: &'a [Index],
}

impl AttributeVisitor for PerVertex<'_> {
    type Output = Result<ErasedAttribute, MeshError>;

    fn visit_plain<T: AttributeValue>(&mut self, attr: &Attribute<T>) -> Self::Output {
        Ok(attr.clone().into())
    }

    fn visit_indexed<T: AttributeValue>(&mut self, attr: &IndexedAttribute<T>) -> Self::Output {
        let indices = attr.indices().get_all();
        let rows: Vec<Index> = self
            .representative
            .iter()
            .map(|&c| indices[c as usize])
            .collect();
        let mut out = attr.values().gather(&rows)?;
        out.set_element(AttributeElement::Vertex);
        Ok(out.into())
    }
}
