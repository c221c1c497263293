//! Cleanup helpers built on the structural edits of [`SurfaceMesh`].

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::algs::remap_vertices::{RemapVerticesOptions, remap_vertices};
use crate::data::attribute::{Attribute, AttributeElement};
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::tagged::AttributeVisitor;
use crate::data::value_type::{AttributeValue, Index, RealValue};
use crate::mesh::SurfaceMesh;
use crate::mesh_error::MeshError;
use crate::sink_debug;

/// Remove every vertex no corner references. Returns how many were removed.
///
/// Facets are untouched: a referenced vertex is never removed, so no facet
/// loses a corner.
pub fn remove_isolated_vertices<S: RealValue>(mesh: &mut SurfaceMesh<S>) -> Result<usize, MeshError> {
    let isolated = mesh.isolated_vertices();
    if isolated.is_empty() {
        return Ok(0);
    }
    mesh.remove_vertices(&isolated)?;
    sink_debug!(mesh.log_sink(), "removed {} isolated vertices", isolated.len());
    Ok(isolated.len())
}

/// Remove facets with fewer than three distinct vertices, as left behind by
/// vertex merging. Returns how many were removed.
pub fn remove_topologically_degenerate_facets<S: RealValue>(
    mesh: &mut SurfaceMesh<S>,
) -> Result<usize, MeshError> {
    let fb = mesh.facet_buffer();
    let degenerate: Vec<Index> = fb
        .facets()
        .filter(|(f, _)| fb.facet_vertices(*f).iter().unique().count() < 3)
        .map(|(f, _)| f as Index)
        .collect();
    mesh.remove_facets(&degenerate)?;
    Ok(degenerate.len())
}

/// Options for [`remove_duplicate_vertices`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDuplicateVerticesOptions {
    /// Vertex attributes that must also agree for two vertices to merge.
    pub extra_attributes: Vec<String>,
}

/// Merge vertices with identical positions. Returns how many were removed.
///
/// Coordinates compare exactly, with `-0.0` equal to `0.0`. Merged vertices
/// take the index of the first one and their attributes are combined through
/// [`remap_vertices`] with its default policies. Facets are kept even when
/// they collapse; see [`remove_topologically_degenerate_facets`].
pub fn remove_duplicate_vertices<S: RealValue>(
    mesh: &mut SurfaceMesh<S>,
    options: &RemoveDuplicateVerticesOptions,
) -> Result<usize, MeshError> {
    let num_vertices = mesh.get_num_vertices();
    let dim = mesh.get_dimension();
    let mut keys: Vec<Vec<u64>> = mesh
        .positions()
        .chunks_exact(dim)
        .map(|p| p.iter().map(|&x| comparable_bits(x)).collect())
        .collect();
    for name in &options.extra_attributes {
        mesh.get_erased_attribute(name.as_str())?.visit(&mut AppendRowKeys {
            name,
            keys: &mut keys,
        })?;
    }

    let mut first_of: HashMap<&[u64], Index> = HashMap::with_capacity(num_vertices);
    let old_to_new: Vec<Index> = keys
        .iter()
        .map(|k| {
            let next = first_of.len() as Index;
            *first_of.entry(k.as_slice()).or_insert(next)
        })
        .collect();
    let removed = num_vertices - first_of.len();
    if removed == 0 {
        return Ok(0);
    }
    remap_vertices(mesh, &old_to_new, RemapVerticesOptions::default())?;
    sink_debug!(mesh.log_sink(), "merged {removed} duplicate vertices");
    Ok(removed)
}

/// Bits under which equal values hash alike (`-0.0` and `0.0` included).
fn comparable_bits<T: AttributeValue>(v: T) -> u64 {
    if v == T::default() {
        T::default().key_bits()
    } else {
        v.key_bits()
    }
}

/// Extends each vertex key with that vertex's row of a vertex attribute.
struct AppendRowKeys<'a> {
    name: &'a str,
    keys: &'a mut [Vec<u64>],
}

impl AttributeVisitor for AppendRowKeys<'_> {
    type Output = Result<(), MeshError>;

    fn visit_plain<T: AttributeValue>(&mut self, attr: &Attribute<T>) -> Self::Output {
        if attr.element() != AttributeElement::Vertex {
            return Err(MeshError::UnsupportedElement {
                element: attr.element(),
                reason: "only vertex attributes can tell duplicate vertices apart",
            });
        }
        for (key, row) in self.keys.iter_mut().zip(attr.rows()) {
            key.extend(row.iter().map(|&v| comparable_bits(v)));
        }
        Ok(())
    }

    fn visit_indexed<T: AttributeValue>(&mut self, _: &IndexedAttribute<T>) -> Self::Output {
        Err(MeshError::StorageModeMismatch {
            name: self.name.to_owned(),
            indexed: true,
        })
    }
}

/// Options for [`remove_duplicate_facets`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDuplicateFacetOptions {
    /// Treat a facet and its reverse as different facets.
    pub consider_orientation: bool,
}

/// Remove facets that repeat another facet's vertex cycle. Returns how many
/// were removed.
///
/// Two facets are duplicates when one vertex list is a rotation of the other,
/// or of its reverse unless `consider_orientation` is set. Each group of
/// duplicates keeps its lowest facet of the majority orientation; a group
/// whose orientations tie is removed entirely.
pub fn remove_duplicate_facets<S: RealValue>(
    mesh: &mut SurfaceMesh<S>,
    options: &RemoveDuplicateFacetOptions,
) -> Result<usize, MeshError> {
    let fb = mesh.facet_buffer();
    // Facets in each group, in increasing order, with their orientation.
    let mut groups: HashMap<Vec<Index>, Vec<(Index, bool)>> = HashMap::new();
    for (f, _) in fb.facets() {
        let forward = min_rotation(fb.facet_vertices(f).iter().copied());
        let (key, positive) = if options.consider_orientation {
            (forward, true)
        } else {
            let backward = min_rotation(fb.facet_vertices(f).iter().rev().copied());
            if backward < forward {
                (backward, false)
            } else {
                (forward, true)
            }
        };
        match groups.entry(key) {
            Entry::Occupied(mut e) => e.get_mut().push((f as Index, positive)),
            Entry::Vacant(e) => {
                e.insert(vec![(f as Index, positive)]);
            }
        }
    }

    let mut removed: Vec<Index> = Vec::new();
    for members in groups.values().filter(|m| m.len() > 1) {
        let (pos, neg): (Vec<_>, Vec<_>) = members.iter().partition(|(_, p)| *p);
        let keep = match pos.len().cmp(&neg.len()) {
            std::cmp::Ordering::Greater => pos.first().map(|&&(f, _)| f),
            std::cmp::Ordering::Less => neg.first().map(|&&(f, _)| f),
            std::cmp::Ordering::Equal => None,
        };
        removed.extend(members.iter().map(|&(f, _)| f).filter(|&f| Some(f) != keep));
    }
    removed.sort_unstable();
    mesh.remove_facets(&removed)?;
    sink_debug!(mesh.log_sink(), "removed {} duplicate facets", removed.len());
    Ok(removed.len())
}

/// Lexicographically smallest rotation of a vertex cycle.
fn min_rotation(cycle: impl Iterator<Item = Index>) -> Vec<Index> {
    let owned: Vec<Index> = cycle.collect();
    let vs = owned.as_slice();
    let rotation = move |s: usize| vs[s..].iter().chain(&vs[..s]);
    let start = (0..vs.len())
        .min_by(|&a, &b| rotation(a).cmp(rotation(b)))
        .unwrap_or(0);
    rotation(start).copied().collect()
}
