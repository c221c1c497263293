//! Per-vertex welding of indexed attribute values.
//!
//! Corners meeting at a vertex often carry separate value rows that happen to
//! be equal (per-facet normals of a smooth region, UVs away from a seam).
//! Welding merges such rows so the corners share one value index. Unlike
//! [`IndexedAttribute::condense`], rows are only merged when they meet at a
//! common vertex; equal values on opposite sides of the mesh stay apart.

use serde::{Deserialize, Serialize};

use crate::algs::inverse_mapping::{InverseMapping, invert_mapping};
use crate::algs::mapping_policy::{CollisionPolicies, remap_rows};
use crate::data::attribute::Attribute;
use crate::data::attribute_store::{AttributeKey, is_reserved_name};
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::tagged::{AttributeVisitor, ErasedAttribute};
use crate::data::value_type::{AttributeValue, INVALID_INDEX, Index, RealValue, ScalarType};
use crate::mesh::SurfaceMesh;
use crate::mesh_error::MeshError;
use crate::sink_debug;

/// Tolerances for [`weld_indexed_attribute`].
///
/// With both unset rows must compare equal. Setting either switches to the
/// test `|a - b| <= abs + rel * |b|` per channel; the unset one then defaults
/// to a value suited to the stored type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeldOptions {
    pub epsilon_rel: Option<f64>,
    pub epsilon_abs: Option<f64>,
}

impl WeldOptions {
    fn tolerances(&self, t: ScalarType) -> Option<(f64, f64)> {
        if self.epsilon_rel.is_none() && self.epsilon_abs.is_none() {
            return None;
        }
        let (rel, abs) = match t {
            ScalarType::F32 => (1e-5, f32::EPSILON as f64),
            _ => (1e-12, f64::EPSILON),
        };
        Some((
            self.epsilon_rel.unwrap_or(rel),
            self.epsilon_abs.unwrap_or(abs),
        ))
    }
}

/// Merge equal value rows of the indexed attribute `key` wherever they meet
/// at a vertex. Returns the number of value rows removed.
///
/// Merging is transitive: rows linked through a chain of shared vertices end
/// up in one group, represented by its lowest row. Merged float rows are
/// averaged; integer rows keep the representative. Unset corners are left
/// alone and value rows no corner references are kept.
pub fn weld_indexed_attribute<S, K>(
    mesh: &mut SurfaceMesh<S>,
    key: &K,
    options: &WeldOptions,
) -> Result<usize, MeshError>
where
    S: RealValue,
    K: AttributeKey + ?Sized,
{
    let id = key.resolve(mesh.attributes())?;
    let name = mesh.get_attribute_name(id)?;
    if is_reserved_name(name) {
        return Err(MeshError::ReservedAttribute(name.to_owned()));
    }
    let corners = invert_mapping(mesh.corner_to_vertex(), mesh.get_num_vertices())?;
    let welded = mesh.get_erased_attribute(&id)?.visit(&mut Weld {
        name,
        corners: &corners,
        options,
    })?;
    let Some((attr, removed)) = welded else {
        return Ok(0);
    };
    sink_debug!(mesh.log_sink(), "welded {removed} values of `{name}`");
    mesh.attributes_mut().replace(id, attr)?;
    Ok(removed)
}

struct Weld<'a> {
    name: &'a str,
    corners: &'a InverseMapping,
    options: &'a WeldOptions,
}

impl AttributeVisitor for Weld<'_> {
    type Output = Result<Option<(ErasedAttribute, usize)>, MeshError>;

    fn visit_plain<T: AttributeValue>(&mut self, _: &Attribute<T>) -> Self::Output {
        Err(MeshError::StorageModeMismatch {
            name: self.name.to_owned(),
            indexed: false,
        })
    }

    fn visit_indexed<T: AttributeValue>(&mut self, attr: &IndexedAttribute<T>) -> Self::Output {
        attr.check_indices()?;
        let values = attr.values();
        let indices = attr.indices().get_all();
        let nc = attr.num_channels();
        let num_values = attr.num_values();
        let row = |i: Index| &values.get_all()[i as usize * nc..(i as usize + 1) * nc];
        let tolerances = self.options.tolerances(T::SCALAR_TYPE);
        let equal = |a: Index, b: Index| match tolerances {
            None => row(a) == row(b),
            Some((rel, abs)) => row(a).iter().zip(row(b)).all(|(x, y)| {
                let (x, y) = (x.to_f64_lossy(), y.to_f64_lossy());
                (x - y).abs() <= abs + rel * y.abs()
            }),
        };

        let mut parent: Vec<Index> = (0..num_values as Index).collect();
        let mut around: Vec<Index> = Vec::new();
        for v in 0..self.corners.num_targets() {
            around.clear();
            around.extend(
                self.corners
                    .sources(v)
                    .iter()
                    .map(|&c| indices[c as usize])
                    .filter(|&i| i != INVALID_INDEX),
            );
            around.sort_unstable();
            around.dedup();
            for (k, &a) in around.iter().enumerate() {
                for &b in &around[k + 1..] {
                    if equal(a, b) {
                        union(&mut parent, a, b);
                    }
                }
            }
        }

        let mut old_to_new = vec![INVALID_INDEX; num_values];
        let mut count: Index = 0;
        for i in 0..num_values {
            let root = find(&mut parent, i as Index) as usize;
            if root == i {
                old_to_new[i] = count;
                count += 1;
            } else {
                old_to_new[i] = old_to_new[root];
            }
        }
        let removed = num_values - count as usize;
        if removed == 0 {
            return Ok(None);
        }

        let groups = invert_mapping(&old_to_new, count as usize)?;
        let policy = CollisionPolicies::default().for_type(T::SCALAR_TYPE);
        let merged = remap_rows(values, self.name, &groups, policy)?;
        let new_indices: Vec<Index> = indices
            .iter()
            .map(|&i| if i == INVALID_INDEX { i } else { old_to_new[i as usize] })
            .collect();
        let mut out = IndexedAttribute::from_parts(
            attr.usage(),
            nc,
            merged.get_all().to_vec(),
            new_indices,
        )?;
        out.values_mut().set_default_value(values.default_value());
        Ok(Some((out.into(), removed)))
    }
}

fn find(parent: &mut [Index], mut i: Index) -> Index {
    while parent[i as usize] != i {
        let up = parent[parent[i as usize] as usize];
        parent[i as usize] = up;
        i = up;
    }
    i
}

/// Join the sets of `a` and `b`; the lower root wins.
fn union(parent: &mut [Index], a: Index, b: Index) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        parent[ra.max(rb) as usize] = ra.min(rb);
    }
}
