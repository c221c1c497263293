//! Concatenation of several meshes into one.

use hashbrown::HashSet;

use crate::data::attribute::{Attribute, AttributeElement, AttributeUsage, StorageMode};
use crate::data::attribute_store::AttributeFilter;
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::tagged::{AttributeVisitor, ErasedAttribute};
use crate::data::value_type::{AttributeValue, INVALID_INDEX, Index, RealValue, ScalarType};
use crate::mesh::{SurfaceMesh, check_index_capacity};
use crate::mesh_error::MeshError;
use crate::{sink_debug, sink_warn};

/// Structural signature two attributes must share to be concatenated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Signature {
    scalar_type: ScalarType,
    element: AttributeElement,
    usage: AttributeUsage,
    num_channels: usize,
    storage: StorageMode,
}

impl Signature {
    fn of(attr: &ErasedAttribute) -> Self {
        Self {
            scalar_type: attr.scalar_type(),
            element: attr.element(),
            usage: attr.usage(),
            num_channels: attr.num_channels(),
            storage: attr.storage_mode(),
        }
    }
}

/// Concatenate `meshes` into a new mesh.
///
/// Vertex indices of mesh `k` are shifted by the number of vertices in meshes
/// `0..k`. With `preserve_attributes`, every non-reserved attribute is carried
/// over if all inputs declaring it agree on value type, element, usage, channel
/// count and storage mode; inputs that lack it contribute default rows (unset
/// indices for indexed attributes). Attributes that disagree are dropped with a
/// warning. Values of index usages are shifted like vertex indices, by the
/// cumulative count of the element they reference.
///
/// All inputs must have the same dimension. An empty input gives an empty
/// 3D mesh.
pub fn combine_meshes<S: RealValue>(
    meshes: &[&SurfaceMesh<S>],
    preserve_attributes: bool,
) -> Result<SurfaceMesh<S>, MeshError> {
    let Some(first) = meshes.first() else {
        return SurfaceMesh::new(3);
    };
    let dimension = first.get_dimension();
    if let Some(m) = meshes.iter().find(|m| m.get_dimension() != dimension) {
        return Err(MeshError::DimensionMismatch {
            expected: dimension,
            found: m.get_dimension(),
        });
    }

    let mut out = SurfaceMesh::<S>::new(dimension)?.with_log_sink(first.log_sink().clone());
    let total_facets: usize = meshes.iter().map(|m| m.get_num_facets()).sum();
    let total_corners: usize = meshes.iter().map(|m| m.get_num_corners()).sum();
    let mut positions = Vec::with_capacity(meshes.iter().map(|m| m.positions().len()).sum());
    let mut sizes = Vec::with_capacity(total_facets);
    let mut vertices = Vec::with_capacity(total_corners);
    let mut vertex_offset = 0usize;
    for m in meshes {
        let offset = narrow_offset(vertex_offset, m.get_num_vertices())?;
        positions.extend_from_slice(m.positions());
        let fb = m.facet_buffer();
        sizes.extend(fb.facets().map(|(_, r)| r.len()));
        vertices.extend(fb.corner_to_vertex().iter().map(|&v| v + offset));
        vertex_offset += m.get_num_vertices();
    }
    out.add_vertices(&positions)?;
    out.add_hybrid(&sizes, &vertices)?;

    if preserve_attributes {
        for name in attribute_names(meshes) {
            let parts: Vec<Option<&ErasedAttribute>> = meshes
                .iter()
                .map(|m| m.get_erased_attribute(name.as_str()).ok())
                .collect();
            let mut declared = parts.iter().flatten();
            let Some(reference) = declared.next().map(|a| Signature::of(a)) else {
                continue;
            };
            if declared.any(|a| Signature::of(a) != reference) {
                sink_warn!(
                    out.log_sink(),
                    "dropping attribute `{name}`: inputs disagree on its layout"
                );
                continue;
            }
            let merged = parts
                .iter()
                .flatten()
                .next()
                .map(|a| {
                    a.visit(&mut Concat {
                        name: &name,
                        meshes,
                        parts: &parts,
                    })
                })
                .transpose()?;
            if let Some(attr) = merged {
                out.insert_attribute(&name, attr)?;
            }
        }
    }
    sink_debug!(
        out.log_sink(),
        "combined {} meshes into {} vertices, {} facets",
        meshes.len(),
        out.get_num_vertices(),
        out.get_num_facets()
    );
    Ok(out)
}

/// `offset` as an index, provided `offset + count` vertices stay addressable.
fn narrow_offset(offset: usize, count: usize) -> Result<Index, MeshError> {
    check_index_capacity("vertex", offset, count)?;
    Ok(offset as Index)
}

/// Non-reserved attribute names in order of first appearance.
fn attribute_names<S: RealValue>(meshes: &[&SurfaceMesh<S>]) -> Vec<String> {
    let filter = AttributeFilter::default();
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for m in meshes {
        for r in m.foreach_attribute(&filter) {
            if seen.insert(r.name) {
                names.push(r.name.to_owned());
            }
        }
    }
    names
}

/// Concatenates the per-mesh parts of one attribute, typed by the first part.
struct Concat<'a, S: RealValue> {
    name: &'a str,
    meshes: &'a [&'a SurfaceMesh<S>],
    parts: &'a [Option<&'a ErasedAttribute>],
}

impl<S: RealValue> Concat<'_, S> {
    fn mismatch<T: AttributeValue>(&self, found: &ErasedAttribute) -> MeshError {
        MeshError::AttributeTypeMismatch {
            name: self.name.to_owned(),
            expected: T::SCALAR_TYPE,
            found: found.scalar_type(),
        }
    }

    /// Offset added to index values of each part.
    fn index_offsets(&self, usage: AttributeUsage) -> Option<Vec<usize>> {
        let element = usage.indexed_element()?;
        let mut acc = 0;
        Some(
            self.meshes
                .iter()
                .map(|m| {
                    let o = acc;
                    acc += m.num_elements(element).unwrap_or(0);
                    o
                })
                .collect(),
        )
    }
}

fn shift_indices(values: &mut [Index], offset: usize) {
    for v in values.iter_mut().filter(|v| **v != INVALID_INDEX) {
        *v += offset as Index;
    }
}

impl<S: RealValue> AttributeVisitor for Concat<'_, S> {
    type Output = Result<ErasedAttribute, MeshError>;

    fn visit_plain<T: AttributeValue>(&mut self, first: &Attribute<T>) -> Self::Output {
        let element = first.element();
        let nc = first.num_channels();
        let offsets = self.index_offsets(first.usage());
        let mut data: Vec<T> = Vec::new();
        let mut segments = Vec::with_capacity(self.meshes.len());
        for (m, part) in self.meshes.iter().zip(self.parts) {
            let start = data.len();
            match part {
                Some(p) => {
                    let typed = p
                        .as_plain()
                        .and_then(T::unwrap)
                        .ok_or_else(|| self.mismatch::<T>(p))?;
                    data.extend_from_slice(typed.get_all());
                }
                None => {
                    let rows = m.num_elements(element).unwrap_or(0);
                    data.extend(std::iter::repeat_n(first.default_value(), rows * nc));
                }
            }
            segments.push(start..data.len());
        }
        let mut out = first.with_data(data);
        if let (Some(offsets), Some(idx)) = (offsets, index_slice_mut(&mut out)) {
            for (range, offset) in segments.into_iter().zip(offsets) {
                shift_indices(&mut idx[range], offset);
            }
        }
        Ok(out.into())
    }

    fn visit_indexed<T: AttributeValue>(&mut self, first: &IndexedAttribute<T>) -> Self::Output {
        let nc = first.num_channels();
        let offsets = self.index_offsets(first.usage());
        let mut values: Vec<T> = Vec::new();
        let mut indices: Vec<Index> = Vec::new();
        let mut segments = Vec::with_capacity(self.meshes.len());
        for (m, part) in self.meshes.iter().zip(self.parts) {
            let start = values.len();
            match part {
                Some(p) => {
                    let typed = p
                        .as_indexed()
                        .and_then(T::unwrap_indexed)
                        .ok_or_else(|| self.mismatch::<T>(p))?;
                    let base = (values.len() / nc) as Index;
                    values.extend_from_slice(typed.values().get_all());
                    indices.extend(typed.indices().get_all().iter().map(|&i| {
                        if i == INVALID_INDEX { i } else { i + base }
                    }));
                }
                None => {
                    indices.extend(std::iter::repeat_n(INVALID_INDEX, m.get_num_corners()));
                }
            }
            segments.push(start..values.len());
        }
        let mut out = IndexedAttribute::from_parts(first.usage(), nc, values, indices)?;
        if let Some(offsets) = offsets {
            if let Some(idx) = index_slice_mut(out.values_mut()) {
                for (range, offset) in segments.into_iter().zip(offsets) {
                    shift_indices(&mut idx[range], offset);
                }
            }
        }
        Ok(out.into())
    }
}

/// The values of `attr` as indices, when its value type is `Index`.
fn index_slice_mut<T: AttributeValue>(attr: &mut Attribute<T>) -> Option<&mut [Index]> {
    if T::SCALAR_TYPE != Index::SCALAR_TYPE {
        return None;
    }
    bytemuck::try_cast_slice_mut(attr.ref_all()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CaptureSink;
    use std::sync::Arc;

    fn triangle(shift: f64) -> SurfaceMesh<f64> {
        let mut m = SurfaceMesh::new(3).unwrap();
        m.add_vertices(&[shift, 0., 0., shift + 1., 0., 0., shift, 1., 0.])
            .unwrap();
        m.add_triangle(0, 1, 2).unwrap();
        m
    }

    #[test]
    fn counts_add_up_and_facets_are_offset() {
        let a = triangle(0.0);
        let mut b = triangle(5.0);
        b.add_vertex(&[9., 9., 9.]).unwrap();
        b.add_quad(0, 1, 3, 2).unwrap();
        let c = combine_meshes(&[&a, &b, &a], false).unwrap();
        assert_eq!(c.get_num_vertices(), 3 + 4 + 3);
        assert_eq!(c.get_num_facets(), 4);
        assert_eq!(c.get_facet_vertices(1).unwrap(), &[3, 4, 5]);
        assert_eq!(c.get_facet_vertices(2).unwrap(), &[3, 4, 6, 5]);
        assert_eq!(c.get_facet_vertices(3).unwrap(), &[7, 8, 9]);
        assert_eq!(c.get_position(3).unwrap(), &[5., 0., 0.]);
    }

    #[test]
    fn matching_attributes_concatenate_and_missing_get_defaults() {
        let mut a = triangle(0.0);
        let mut b = triangle(1.0);
        a.create_attribute::<f32>("w", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[1., 2., 3.])
            .unwrap();
        b.create_attribute::<f32>("w", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[4., 5., 6.])
            .unwrap();
        a.create_attribute::<i8>("only_a", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[7])
            .unwrap();
        let c = combine_meshes(&[&a, &b], true).unwrap();
        assert_eq!(
            c.get_attribute::<f32, _>("w").unwrap().get_all(),
            &[1., 2., 3., 4., 5., 6.]
        );
        assert_eq!(c.get_attribute::<i8, _>("only_a").unwrap().get_all(), &[7, 0]);
    }

    #[test]
    fn mismatched_attribute_is_dropped_with_warning() {
        let sink = Arc::new(CaptureSink::new());
        let mut a = triangle(0.0).with_log_sink(sink.clone());
        let mut b = triangle(1.0);
        a.create_attribute::<f32>("w", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[0.; 3])
            .unwrap();
        b.create_attribute::<f64>("w", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[0.; 3])
            .unwrap();
        let c = combine_meshes(&[&a, &b], true).unwrap();
        assert!(!c.has_attribute("w"));
        assert_eq!(sink.count(log::Level::Warn), 1);
    }

    #[test]
    fn index_values_and_indexed_attributes_are_offset() {
        let mut a = triangle(0.0);
        let mut b = triangle(1.0);
        for m in [&mut a, &mut b] {
            m.create_attribute::<Index>(
                "tip",
                AttributeElement::Facet,
                AttributeUsage::VertexIndex,
                1,
                &[2],
            )
            .unwrap();
            m.create_indexed_attribute::<f32>("uv", AttributeUsage::UV, 2, &[0., 0., 1., 1.], &[0, 1, 1])
                .unwrap();
        }
        let c = combine_meshes(&[&a, &b], true).unwrap();
        assert_eq!(c.get_attribute::<Index, _>("tip").unwrap().get_all(), &[2, 5]);
        let uv = c.get_indexed_attribute::<f32, _>("uv").unwrap();
        assert_eq!(uv.num_values(), 4);
        assert_eq!(uv.indices().get_all(), &[0, 1, 1, 2, 3, 3]);
    }

    #[test]
    fn attribute_names_keep_first_appearance_order() {
        let mut a = triangle(0.0);
        let mut b = triangle(1.0);
        a.create_attribute::<u8>("q", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[1])
            .unwrap();
        b.create_attribute::<u8>("p", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[2])
            .unwrap();
        b.create_attribute::<u8>("q", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[3])
            .unwrap();
        assert_eq!(attribute_names(&[&a, &b]), vec!["q".to_owned(), "p".to_owned()]);
    }

    #[test]
    fn vertex_offsets_past_the_index_range_are_rejected() {
        assert_eq!(narrow_offset(7, 3).unwrap(), 7);
        let last = INVALID_INDEX as usize;
        assert!(matches!(
            narrow_offset(last - 2, 2),
            Err(MeshError::IndexOutOfRange { what: "vertex", .. })
        ));
        assert!(narrow_offset(usize::MAX, 1).is_err());
    }

    #[test]
    fn dimension_mismatch_fails() {
        let a = triangle(0.0);
        let b = SurfaceMesh::<f64>::new(2).unwrap();
        assert_eq!(
            combine_meshes(&[&a, &b], true).unwrap_err(),
            MeshError::DimensionMismatch { expected: 3, found: 2 }
        );
        assert_eq!(combine_meshes::<f64>(&[], true).unwrap().get_num_vertices(), 0);
    }
}
