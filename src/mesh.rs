//! SurfaceMesh: vertices, polygonal facets and their attributes.
//!
//! The mesh owns every buffer through its [`AttributeStore`]. Facet structure
//! lives in reserved, index-tagged attributes:
//!
//! | name                       | element | usage         |
//! |----------------------------|---------|---------------|
//! | `$vertex_to_position`      | Vertex  | Position      |
//! | `$corner_to_vertex`        | Corner  | VertexIndex   |
//! | `$facet_to_first_corner`   | Facet   | CornerIndex   |
//! | `$corner_to_facet`         | Corner  | FacetIndex    |
//!
//! Structural edits (add, remove, permute) are the only operations that change
//! element counts. Each one keeps every plain attribute's row count in step
//! with its element, rewrites index-tagged values through the old → new
//! mapping, and drops the cached [`Connectivity`]. Edge attributes are carried
//! over by vertex pair onto the rebuilt edge set.

use std::marker::PhantomData;

use hashbrown::HashSet;
use once_cell::sync::OnceCell;

use crate::algs::inverse_mapping::{InverseMapping, invert_mapping};
use crate::data::attribute::{Attribute, AttributeElement, AttributeUsage, check_usage};
use crate::data::attribute_store::{
    AttributeFilter, AttributeId, AttributeKey, AttributeRef, AttributeStore, is_reserved_name,
};
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::tagged::ErasedAttribute;
use crate::data::value_type::{AttributeValue, INVALID_INDEX, Index, RealValue};
use crate::debug_invariants::{DebugInvariants, InvariantContext};
use crate::diagnostics::{SharedSink, default_sink};
use crate::mesh_error::MeshError;
use crate::topology::boundary::{BoundaryLoopOptions, BoundaryLoops, extract_boundary_loops};
use crate::topology::cache::InvalidateCache;
use crate::topology::connectivity::{Connectivity, FacetBuffer};
use crate::sink_debug;

/// Reserved name of the vertex position attribute.
pub const VERTEX_TO_POSITION: &str = "$vertex_to_position";
/// Reserved name of the corner → vertex buffer.
pub const CORNER_TO_VERTEX: &str = "$corner_to_vertex";
/// Reserved name of the facet → first corner offsets.
pub const FACET_TO_FIRST_CORNER: &str = "$facet_to_first_corner";
/// Reserved name of the corner → facet buffer.
pub const CORNER_TO_FACET: &str = "$corner_to_facet";

/// Polygonal surface mesh with typed per-element attributes.
#[derive(Clone, Debug)]
pub struct SurfaceMesh<S: RealValue = f64> {
    dimension: usize,
    num_vertices: usize,
    num_facets: usize,
    num_corners: usize,
    attributes: AttributeStore,
    position_id: AttributeId,
    corner_to_vertex_id: AttributeId,
    facet_to_first_corner_id: AttributeId,
    corner_to_facet_id: AttributeId,
    connectivity: OnceCell<Connectivity>,
    sink: SharedSink,
    _scalar: PhantomData<S>,
}

impl<S: RealValue> SurfaceMesh<S> {
    /// Empty mesh whose vertices have `dimension` coordinates.
    pub fn new(dimension: usize) -> Result<Self, MeshError> {
        if dimension == 0 {
            return Err(MeshError::DimensionMismatch {
                expected: 1,
                found: 0,
            });
        }
        let mut attributes = AttributeStore::new();
        let position_id = attributes.insert_unchecked(
            VERTEX_TO_POSITION,
            Attribute::<S>::new(AttributeElement::Vertex, AttributeUsage::Position, dimension)?
                .into(),
        )?;
        let index_attr = |element, usage| -> Result<ErasedAttribute, MeshError> {
            Ok(Attribute::<Index>::new(element, usage, 1)?
                .with_default_value(INVALID_INDEX)
                .into())
        };
        let corner_to_vertex_id = attributes.insert_unchecked(
            CORNER_TO_VERTEX,
            index_attr(AttributeElement::Corner, AttributeUsage::VertexIndex)?,
        )?;
        let facet_to_first_corner_id = attributes.insert_unchecked(
            FACET_TO_FIRST_CORNER,
            index_attr(AttributeElement::Facet, AttributeUsage::CornerIndex)?,
        )?;
        let corner_to_facet_id = attributes.insert_unchecked(
            CORNER_TO_FACET,
            index_attr(AttributeElement::Corner, AttributeUsage::FacetIndex)?,
        )?;
        Ok(Self {
            dimension,
            num_vertices: 0,
            num_facets: 0,
            num_corners: 0,
            attributes,
            position_id,
            corner_to_vertex_id,
            facet_to_first_corner_id,
            corner_to_facet_id,
            connectivity: OnceCell::new(),
            sink: default_sink(),
            _scalar: PhantomData,
        })
    }

    /// Replace the log sink (builder style).
    pub fn with_log_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn set_log_sink(&mut self, sink: SharedSink) {
        self.sink = sink;
    }

    pub fn log_sink(&self) -> &SharedSink {
        &self.sink
    }

    // ---------------------------------------------------------------------
    // Counts
    // ---------------------------------------------------------------------

    pub fn get_dimension(&self) -> usize {
        self.dimension
    }

    pub fn get_num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn get_num_facets(&self) -> usize {
        self.num_facets
    }

    pub fn get_num_corners(&self) -> usize {
        self.num_corners
    }

    /// Number of edges. Builds the connectivity if needed.
    pub fn get_num_edges(&self) -> usize {
        self.connectivity().num_edges()
    }

    /// Current row count required for `element`; `None` for `Value`.
    pub fn num_elements(&self, element: AttributeElement) -> Option<usize> {
        match element {
            AttributeElement::Vertex => Some(self.num_vertices),
            AttributeElement::Facet => Some(self.num_facets),
            AttributeElement::Corner => Some(self.num_corners),
            AttributeElement::Edge => Some(self.get_num_edges()),
            AttributeElement::Value => None,
        }
    }

    // ---------------------------------------------------------------------
    // Vertices
    // ---------------------------------------------------------------------

    /// Append one vertex and return its index.
    pub fn add_vertex(&mut self, position: &[S]) -> Result<Index, MeshError> {
        if position.len() != self.dimension {
            return Err(MeshError::DimensionMismatch {
                expected: self.dimension,
                found: position.len(),
            });
        }
        self.add_vertices(position)
    }

    /// Append vertices from a flat coordinate buffer. Returns the first new index.
    pub fn add_vertices(&mut self, positions: &[S]) -> Result<Index, MeshError> {
        if positions.len() % self.dimension != 0 {
            return Err(MeshError::InvalidChannelCount {
                channels: self.dimension,
                len: positions.len(),
            });
        }
        let n = positions.len() / self.dimension;
        check_index_capacity("vertex", self.num_vertices, n)?;
        let first = self.num_vertices;
        self.attributes.insert_rows(AttributeElement::Vertex, n);
        let dim = self.dimension;
        self.attributes.get_mut::<S, _>(&self.position_id)?.ref_all()[first * dim..]
            .copy_from_slice(positions);
        self.num_vertices += n;
        self.invalidate_cache();
        crate::debug_invariants!(self.validate_invariants(), "add_vertices");
        Ok(first as Index)
    }

    /// Coordinates of vertex `v`.
    pub fn get_position(&self, v: usize) -> Result<&[S], MeshError> {
        self.attributes.get::<S, _>(&self.position_id)?.get_row(v)
    }

    /// Writable coordinates of vertex `v`.
    pub fn ref_position(&mut self, v: usize) -> Result<&mut [S], MeshError> {
        self.attributes.get_mut::<S, _>(&self.position_id)?.ref_row(v)
    }

    /// All coordinates, row-major.
    pub fn positions(&self) -> &[S] {
        self.reserved_buffer::<S>(self.position_id)
    }

    /// All coordinates, writable.
    pub fn positions_mut(&mut self) -> &mut [S] {
        match self.attributes.get_mut::<S, _>(&self.position_id) {
            Ok(a) => a.ref_all(),
            Err(err) => unreachable_reserved(self.position_id, &err, &mut []),
        }
    }

    pub fn get_vertex_to_position_id(&self) -> AttributeId {
        self.position_id
    }

    // ---------------------------------------------------------------------
    // Facets
    // ---------------------------------------------------------------------

    pub fn add_triangle(&mut self, v0: Index, v1: Index, v2: Index) -> Result<Index, MeshError> {
        self.add_polygon(&[v0, v1, v2])
    }

    pub fn add_quad(&mut self, v0: Index, v1: Index, v2: Index, v3: Index) -> Result<Index, MeshError> {
        self.add_polygon(&[v0, v1, v2, v3])
    }

    /// Append one facet and return its index.
    pub fn add_polygon(&mut self, vertices: &[Index]) -> Result<Index, MeshError> {
        self.append_facets(std::iter::once(vertices.len()), vertices)
    }

    /// Append triangles from a flat index buffer. Returns the first new facet.
    pub fn add_triangles(&mut self, vertices: &[Index]) -> Result<Index, MeshError> {
        self.add_polygons(3, vertices)
    }

    pub fn add_quads(&mut self, vertices: &[Index]) -> Result<Index, MeshError> {
        self.add_polygons(4, vertices)
    }

    /// Append facets of a fixed size from a flat index buffer.
    pub fn add_polygons(&mut self, facet_size: usize, vertices: &[Index]) -> Result<Index, MeshError> {
        if facet_size < 3 {
            return Err(MeshError::InvalidFacetSize(facet_size));
        }
        if vertices.len() % facet_size != 0 {
            return Err(MeshError::LengthMismatch {
                what: "facet vertices",
                expected: vertices.len().next_multiple_of(facet_size),
                found: vertices.len(),
            });
        }
        self.append_facets(
            std::iter::repeat_n(facet_size, vertices.len() / facet_size),
            vertices,
        )
    }

    /// Append facets of mixed sizes: facet `i` takes the next `sizes[i]` vertices.
    pub fn add_hybrid(&mut self, sizes: &[usize], vertices: &[Index]) -> Result<Index, MeshError> {
        self.append_facets(sizes.iter().copied(), vertices)
    }

    fn append_facets<I>(&mut self, sizes: I, vertices: &[Index]) -> Result<Index, MeshError>
    where
        I: Iterator<Item = usize> + Clone,
    {
        let mut total = 0usize;
        let mut count = 0usize;
        for s in sizes.clone() {
            if s < 3 {
                return Err(MeshError::InvalidFacetSize(s));
            }
            total += s;
            count += 1;
        }
        if total != vertices.len() {
            return Err(MeshError::LengthMismatch {
                what: "facet vertices",
                expected: total,
                found: vertices.len(),
            });
        }
        if let Some(&v) = vertices.iter().find(|&&v| v as usize >= self.num_vertices) {
            return Err(MeshError::out_of_range("vertex", v as usize, self.num_vertices));
        }
        check_index_capacity("corner", self.num_corners, total)?;
        if count == 0 {
            return Ok(self.num_facets as Index);
        }

        let edges = self.edge_snapshot();
        let first_facet = self.num_facets;
        let first_corner = self.num_corners;
        self.attributes.insert_rows(AttributeElement::Facet, count);
        self.attributes.insert_rows(AttributeElement::Corner, total);

        self.attributes
            .get_mut::<Index, _>(&self.corner_to_vertex_id)?
            .ref_all()[first_corner..]
            .copy_from_slice(vertices);
        {
            let c2f = &mut self.attributes.get_mut::<Index, _>(&self.corner_to_facet_id)?.ref_all()
                [first_corner..];
            let mut c = 0;
            for (i, s) in sizes.clone().enumerate() {
                c2f[c..c + s].fill((first_facet + i) as Index);
                c += s;
            }
        }
        {
            let f2c = &mut self
                .attributes
                .get_mut::<Index, _>(&self.facet_to_first_corner_id)?
                .ref_all()[first_facet..];
            let mut c = first_corner;
            for (slot, s) in f2c.iter_mut().zip(sizes) {
                *slot = c as Index;
                c += s;
            }
        }
        self.num_facets += count;
        self.num_corners += total;
        self.finish_edit(edges, None)?;
        Ok(first_facet as Index)
    }

    /// Borrowed view of the facet buffers.
    pub fn facet_buffer(&self) -> FacetBuffer<'_> {
        FacetBuffer::new(
            self.index_buffer(self.corner_to_vertex_id),
            self.index_buffer(self.facet_to_first_corner_id),
        )
    }

    pub fn corner_to_vertex(&self) -> &[Index] {
        self.index_buffer(self.corner_to_vertex_id)
    }

    pub fn facet_to_first_corner(&self) -> &[Index] {
        self.index_buffer(self.facet_to_first_corner_id)
    }

    pub fn corner_to_facet(&self) -> &[Index] {
        self.index_buffer(self.corner_to_facet_id)
    }

    fn check_facet(&self, f: usize) -> Result<(), MeshError> {
        if f >= self.num_facets {
            return Err(MeshError::out_of_range("facet", f, self.num_facets));
        }
        Ok(())
    }

    pub fn get_facet_corner_begin(&self, f: usize) -> Result<usize, MeshError> {
        self.check_facet(f)?;
        Ok(self.facet_buffer().facet_corners(f).start)
    }

    pub fn get_facet_corner_end(&self, f: usize) -> Result<usize, MeshError> {
        self.check_facet(f)?;
        Ok(self.facet_buffer().facet_corners(f).end)
    }

    pub fn get_facet_size(&self, f: usize) -> Result<usize, MeshError> {
        self.check_facet(f)?;
        Ok(self.facet_buffer().facet_corners(f).len())
    }

    /// Vertex indices of facet `f`, in corner order.
    pub fn get_facet_vertices(&self, f: usize) -> Result<&[Index], MeshError> {
        self.check_facet(f)?;
        let range = self.facet_buffer().facet_corners(f);
        Ok(&self.corner_to_vertex()[range])
    }

    pub fn get_corner_vertex(&self, c: usize) -> Result<Index, MeshError> {
        self.corner_to_vertex()
            .get(c)
            .copied()
            .ok_or_else(|| MeshError::out_of_range("corner", c, self.num_corners))
    }

    pub fn get_corner_facet(&self, c: usize) -> Result<Index, MeshError> {
        self.corner_to_facet()
            .get(c)
            .copied()
            .ok_or_else(|| MeshError::out_of_range("corner", c, self.num_corners))
    }

    /// Common facet size, if every facet has the same number of corners.
    pub fn get_vertex_per_facet(&self) -> Option<usize> {
        let fb = self.facet_buffer();
        let first = fb.facets().next().map(|(_, r)| r.len())?;
        fb.facets().all(|(_, r)| r.len() == first).then_some(first)
    }

    /// All facets have the same size (vacuously true when empty).
    pub fn is_regular(&self) -> bool {
        self.num_facets == 0 || self.get_vertex_per_facet().is_some()
    }

    pub fn is_triangle_mesh(&self) -> bool {
        self.num_facets == 0 || self.get_vertex_per_facet() == Some(3)
    }

    pub fn is_quad_mesh(&self) -> bool {
        self.num_facets == 0 || self.get_vertex_per_facet() == Some(4)
    }

    // ---------------------------------------------------------------------
    // Structural edits
    // ---------------------------------------------------------------------

    /// Remove the listed vertices and every facet touching them.
    pub fn remove_vertices(&mut self, vertices: &[Index]) -> Result<(), MeshError> {
        let mut keep = vec![true; self.num_vertices];
        for &v in vertices {
            *keep
                .get_mut(v as usize)
                .ok_or_else(|| MeshError::out_of_range("vertex", v as usize, self.num_vertices))? =
                false;
        }
        self.retain_vertices(&keep)
    }

    /// Remove every vertex for which `pred` is true, and the facets touching them.
    pub fn remove_vertices_if<F: FnMut(Index) -> bool>(&mut self, mut pred: F) -> Result<(), MeshError> {
        let keep: Vec<bool> = (0..self.num_vertices as Index).map(|v| !pred(v)).collect();
        self.retain_vertices(&keep)
    }

    /// Remove the listed facets.
    pub fn remove_facets(&mut self, facets: &[Index]) -> Result<(), MeshError> {
        let mut keep = vec![true; self.num_facets];
        for &f in facets {
            *keep
                .get_mut(f as usize)
                .ok_or_else(|| MeshError::out_of_range("facet", f as usize, self.num_facets))? =
                false;
        }
        self.retain_facets(&keep)
    }

    /// Remove every facet for which `pred` is true.
    pub fn remove_facets_if<F: FnMut(Index) -> bool>(&mut self, mut pred: F) -> Result<(), MeshError> {
        let keep: Vec<bool> = (0..self.num_facets as Index).map(|f| !pred(f)).collect();
        self.retain_facets(&keep)
    }

    /// Remove all facets; vertices are kept.
    pub fn clear_facets(&mut self) -> Result<(), MeshError> {
        let keep = vec![false; self.num_facets];
        self.retain_facets(&keep)
    }

    /// Remove all vertices and facets. Attributes are kept, with zero rows.
    pub fn clear_vertices(&mut self) -> Result<(), MeshError> {
        let keep = vec![false; self.num_vertices];
        self.retain_vertices(&keep)
    }

    /// Reorder vertices so that new vertex `i` is old vertex `new_to_old[i]`.
    pub fn permute_vertices(&mut self, new_to_old: &[Index]) -> Result<(), MeshError> {
        check_permutation(new_to_old, self.num_vertices)?;
        let edges = self.edge_snapshot();
        let old_to_new = self.reorder_vertices(new_to_old)?;
        self.finish_edit(edges, Some(&old_to_new))
    }

    /// Reorder facets so that new facet `i` is old facet `new_to_old[i]`.
    pub fn permute_facets(&mut self, new_to_old: &[Index]) -> Result<(), MeshError> {
        check_permutation(new_to_old, self.num_facets)?;
        let edges = self.edge_snapshot();
        self.reorder_facets(new_to_old)?;
        self.finish_edit(edges, None)
    }

    fn retain_vertices(&mut self, keep: &[bool]) -> Result<(), MeshError> {
        let new_to_old: Vec<Index> = kept_indices(keep);
        if new_to_old.len() == self.num_vertices {
            return Ok(());
        }
        let edges = self.edge_snapshot();
        let facets_before = self.num_facets;
        let old_to_new = self.reorder_vertices(&new_to_old)?;
        sink_debug!(
            self.sink,
            "removed {} vertices and {} facets",
            keep.len() - new_to_old.len(),
            facets_before - self.num_facets
        );
        self.finish_edit(edges, Some(&old_to_new))
    }

    fn retain_facets(&mut self, keep: &[bool]) -> Result<(), MeshError> {
        let new_to_old: Vec<Index> = kept_indices(keep);
        if new_to_old.len() == self.num_facets {
            return Ok(());
        }
        let edges = self.edge_snapshot();
        self.reorder_facets(&new_to_old)?;
        sink_debug!(self.sink, "removed {} facets", keep.len() - new_to_old.len());
        self.finish_edit(edges, None)
    }

    /// Apply a vertex selection/reordering and drop facets that lost a vertex.
    /// Returns the vertex old → new mapping.
    fn reorder_vertices(&mut self, new_to_old: &[Index]) -> Result<Vec<Index>, MeshError> {
        let old_to_new = forward_of(new_to_old, self.num_vertices);
        self.attributes
            .remap_index_values(AttributeElement::Vertex, &old_to_new);
        self.attributes
            .reindex(AttributeElement::Vertex, new_to_old)?;
        self.num_vertices = new_to_old.len();

        let fb = self.facet_buffer();
        let surviving: Vec<Index> = fb
            .facets()
            .filter(|(_, r)| fb.corner_to_vertex()[r.clone()].iter().all(|&v| v != INVALID_INDEX))
            .map(|(f, _)| f as Index)
            .collect();
        if surviving.len() != self.num_facets {
            self.reorder_facets(&surviving)?;
        }
        Ok(old_to_new)
    }

    /// Apply a facet selection/reordering; corners follow their facets.
    fn reorder_facets(&mut self, new_to_old: &[Index]) -> Result<(), MeshError> {
        let facet_old_to_new = forward_of(new_to_old, self.num_facets);
        let mut corner_new_to_old = Vec::with_capacity(self.num_corners);
        {
            let fb = self.facet_buffer();
            for &f in new_to_old {
                corner_new_to_old.extend(fb.facet_corners(f as usize).map(|c| c as Index));
            }
        }
        let corner_old_to_new = forward_of(&corner_new_to_old, self.num_corners);

        self.attributes
            .remap_index_values(AttributeElement::Facet, &facet_old_to_new);
        self.attributes
            .remap_index_values(AttributeElement::Corner, &corner_old_to_new);
        self.attributes.reindex(AttributeElement::Facet, new_to_old)?;
        self.attributes
            .reindex(AttributeElement::Corner, &corner_new_to_old)?;
        self.num_facets = new_to_old.len();
        self.num_corners = corner_new_to_old.len();
        Ok(())
    }

    /// Old edge endpoints, when edge data has to survive the coming edit.
    fn edge_snapshot(&self) -> Option<Vec<[Index; 2]>> {
        let needed = self.attributes.has_element(AttributeElement::Edge)
            || self.attributes.has_index_usage(AttributeElement::Edge);
        needed.then(|| self.connectivity().edge_vertices().to_vec())
    }

    fn finish_edit(
        &mut self,
        old_edges: Option<Vec<[Index; 2]>>,
        vertex_old_to_new: Option<&[Index]>,
    ) -> Result<(), MeshError> {
        self.invalidate_cache();
        if let Some(old_edges) = old_edges {
            let (old_to_new, inv) =
                rekey_edges(self.connectivity(), &old_edges, vertex_old_to_new)?;
            self.attributes
                .remap_index_values(AttributeElement::Edge, &old_to_new);
            self.attributes
                .reindex(AttributeElement::Edge, &inv.first_sources())?;
        }
        crate::debug_invariants!(self.validate_invariants(), "SurfaceMesh structural edit");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

    /// Create a plain attribute sized to the current count of `element`.
    ///
    /// `initial` must hold `rows × num_channels` values, or be empty to fill
    /// with defaults. For `Value` attributes the row count is taken from
    /// `initial`.
    pub fn create_attribute<T: AttributeValue>(
        &mut self,
        name: &str,
        element: AttributeElement,
        usage: AttributeUsage,
        num_channels: usize,
        initial: &[T],
    ) -> Result<AttributeId, MeshError> {
        self.check_new_name(name)?;
        check_usage(name, usage, num_channels, T::SCALAR_TYPE, self.dimension)?;
        let mut attr = Attribute::<T>::new(element, usage, num_channels)?;
        if usage.is_index() {
            attr.set_default_value(T::from_f64(INVALID_INDEX as f64));
        }
        match self.num_elements(element) {
            Some(rows) if initial.is_empty() => attr.resize(rows),
            Some(rows) if initial.len() != rows * num_channels => {
                return Err(MeshError::LengthMismatch {
                    what: "initial attribute values",
                    expected: rows * num_channels,
                    found: initial.len(),
                });
            }
            _ => attr.insert_rows_from(initial)?,
        }
        let id = self.attributes.insert(name, attr)?;
        sink_debug!(self.sink, "created attribute `{name}` ({element:?}, {usage:?})");
        Ok(id)
    }

    /// Create an indexed attribute.
    ///
    /// With empty `indices`, every corner starts unset. Otherwise `indices`
    /// needs one entry per corner, each below the number of value rows.
    pub fn create_indexed_attribute<T: AttributeValue>(
        &mut self,
        name: &str,
        usage: AttributeUsage,
        num_channels: usize,
        values: &[T],
        indices: &[Index],
    ) -> Result<AttributeId, MeshError> {
        self.check_new_name(name)?;
        check_usage(name, usage, num_channels, T::SCALAR_TYPE, self.dimension)?;
        let attr = if indices.is_empty() {
            let mut a = IndexedAttribute::<T>::new(usage, num_channels, self.num_corners)?;
            a.values_mut().insert_rows_from(values)?;
            a
        } else {
            if indices.len() != self.num_corners {
                return Err(MeshError::LengthMismatch {
                    what: "indexed attribute indices",
                    expected: self.num_corners,
                    found: indices.len(),
                });
            }
            IndexedAttribute::from_parts(usage, num_channels, values.to_vec(), indices.to_vec())?
        };
        let id = self.attributes.insert(name, attr)?;
        sink_debug!(self.sink, "created indexed attribute `{name}` ({usage:?})");
        Ok(id)
    }

    fn check_new_name(&self, name: &str) -> Result<(), MeshError> {
        if is_reserved_name(name) {
            return Err(MeshError::ReservedAttribute(name.to_owned()));
        }
        if self.attributes.contains(name) {
            return Err(MeshError::DuplicateAttributeName(name.to_owned()));
        }
        Ok(())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    pub fn get_attribute_id(&self, name: &str) -> Result<AttributeId, MeshError> {
        self.attributes.id(name)
    }

    pub fn get_attribute_name(&self, id: AttributeId) -> Result<&str, MeshError> {
        self.attributes.name(id)
    }

    pub fn get_attribute<T: AttributeValue, K: AttributeKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<&Attribute<T>, MeshError> {
        self.attributes.get(key)
    }

    /// Writable plain attribute. Reserved attributes other than positions are
    /// read-only.
    pub fn ref_attribute<T: AttributeValue, K: AttributeKey + ?Sized>(
        &mut self,
        key: &K,
    ) -> Result<&mut Attribute<T>, MeshError> {
        let id = self.writable_id(key)?;
        self.attributes.get_mut(&id)
    }

    pub fn get_indexed_attribute<T: AttributeValue, K: AttributeKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<&IndexedAttribute<T>, MeshError> {
        self.attributes.get_indexed(key)
    }

    pub fn ref_indexed_attribute<T: AttributeValue, K: AttributeKey + ?Sized>(
        &mut self,
        key: &K,
    ) -> Result<&mut IndexedAttribute<T>, MeshError> {
        let id = self.writable_id(key)?;
        self.attributes.get_indexed_mut(&id)
    }

    pub fn get_erased_attribute<K: AttributeKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<&ErasedAttribute, MeshError> {
        self.attributes.erased(key)
    }

    fn writable_id<K: AttributeKey + ?Sized>(&self, key: &K) -> Result<AttributeId, MeshError> {
        let id = key.resolve(&self.attributes)?;
        let name = self.attributes.name(id)?;
        if is_reserved_name(name) && id != self.position_id {
            return Err(MeshError::ReservedAttribute(name.to_owned()));
        }
        Ok(id)
    }

    pub fn remove_attribute<K: AttributeKey + ?Sized>(&mut self, key: &K) -> Result<(), MeshError> {
        let id = key.resolve(&self.attributes)?;
        self.attributes.remove(&id)?;
        sink_debug!(self.sink, "removed attribute {id}");
        Ok(())
    }

    pub fn rename_attribute<K: AttributeKey + ?Sized>(
        &mut self,
        key: &K,
        new_name: &str,
    ) -> Result<(), MeshError> {
        self.attributes.rename(key, new_name)
    }

    pub fn duplicate_attribute<K: AttributeKey + ?Sized>(
        &mut self,
        key: &K,
        new_name: &str,
    ) -> Result<AttributeId, MeshError> {
        self.attributes.duplicate(key, new_name)
    }

    pub fn is_attribute_type<T: AttributeValue, K: AttributeKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<bool, MeshError> {
        self.attributes.is_type::<T, K>(key)
    }

    pub fn is_attribute_indexed<K: AttributeKey + ?Sized>(&self, key: &K) -> Result<bool, MeshError> {
        self.attributes.is_indexed(key)
    }

    /// Lazily enumerate attributes matching `filter`. Restartable via `clone()`.
    ///
    /// Yielded references borrow the mesh only, so they may outlive `filter`.
    pub fn foreach_attribute<'s, 'f>(
        &'s self,
        filter: &'f AttributeFilter,
    ) -> impl Iterator<Item = AttributeRef<'s>> + Clone + use<'s, 'f, S> {
        self.attributes.filtered(filter)
    }

    /// Read-only access to the attribute store.
    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Deduplicate the value rows of an indexed attribute. Returns the number
    /// of rows removed.
    pub fn condense_indexed_attribute<K: AttributeKey + ?Sized>(
        &mut self,
        key: &K,
    ) -> Result<usize, MeshError> {
        let id = self.writable_id(key)?;
        if !self.attributes.is_indexed(&id)? {
            return Err(MeshError::StorageModeMismatch {
                name: self.attributes.name(id)?.to_owned(),
                indexed: false,
            });
        }
        match self.attributes.erased_mut(&id)? {
            ErasedAttribute::Indexed(a) => a.condense(),
            ErasedAttribute::Plain(_) => Ok(0),
        }
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }

    /// Register an attribute built elsewhere, checking its row count.
    pub(crate) fn insert_attribute(
        &mut self,
        name: &str,
        attr: ErasedAttribute,
    ) -> Result<AttributeId, MeshError> {
        self.check_new_name(name)?;
        match &attr {
            ErasedAttribute::Plain(a) => {
                if let Some(rows) = self.num_elements(a.element()) {
                    if rows != a.num_rows() {
                        return Err(MeshError::LengthMismatch {
                            what: "attribute rows",
                            expected: rows,
                            found: a.num_rows(),
                        });
                    }
                }
            }
            ErasedAttribute::Indexed(a) => {
                if a.num_corners() != self.num_corners {
                    return Err(MeshError::LengthMismatch {
                        what: "indexed attribute indices",
                        expected: self.num_corners,
                        found: a.num_corners(),
                    });
                }
                a.check_indices()?;
            }
        }
        self.attributes.insert(name, attr)
    }

    /// Overwrite the vertex count after the caller has resized every vertex
    /// attribute itself.
    pub(crate) fn set_num_vertices(&mut self, n: usize) {
        self.num_vertices = n;
        self.invalidate_cache();
    }

    fn index_buffer(&self, id: AttributeId) -> &[Index] {
        self.reserved_buffer::<Index>(id)
    }

    /// Buffer of a reserved attribute.
    ///
    /// Reserved attributes are created with the mesh, cannot be removed and
    /// keep their value type, so the lookup cannot fail on a consistent mesh.
    fn reserved_buffer<T: AttributeValue>(&self, id: AttributeId) -> &[T] {
        match self.attributes.get::<T, _>(&id) {
            Ok(a) => a.get_all(),
            Err(err) => unreachable_reserved(id, &err, &mut []),
        }
    }

    // ---------------------------------------------------------------------
    // Connectivity
    // ---------------------------------------------------------------------

    /// Derived connectivity, built on first use after each structural edit.
    pub fn connectivity(&self) -> &Connectivity {
        self.connectivity.get_or_init(|| {
            Connectivity::build(&self.facet_buffer(), self.num_vertices, self.sink.as_ref())
        })
    }

    /// Build the connectivity now.
    pub fn initialize_edges(&self) {
        self.connectivity();
    }

    /// True if the connectivity is currently built.
    pub fn has_edges(&self) -> bool {
        self.connectivity.get().is_some()
    }

    pub fn get_edge_vertices(&self, e: usize) -> Result<[Index; 2], MeshError> {
        self.connectivity().get_edge_vertices(e)
    }

    pub fn find_edge_from_vertices(&self, v0: Index, v1: Index) -> Option<Index> {
        self.connectivity().find_edge_from_vertices(v0, v1)
    }

    pub fn get_corner_edge(&self, c: usize) -> Result<Index, MeshError> {
        self.connectivity().get_corner_edge(c)
    }

    pub fn is_boundary_edge(&self, e: usize) -> Result<bool, MeshError> {
        self.check_edge(e)?;
        Ok(self.connectivity().is_boundary_edge(e))
    }

    pub fn is_manifold_edge(&self, e: usize) -> Result<bool, MeshError> {
        self.check_edge(e)?;
        Ok(self.connectivity().is_manifold_edge(e))
    }

    pub fn count_facets_around_edge(&self, e: usize) -> Result<usize, MeshError> {
        self.check_edge(e)?;
        Ok(self.connectivity().count_facets_around_edge(e))
    }

    pub fn num_non_manifold_edges(&self) -> usize {
        self.connectivity().num_non_manifold_edges()
    }

    fn check_edge(&self, e: usize) -> Result<(), MeshError> {
        let ne = self.get_num_edges();
        if e >= ne {
            return Err(MeshError::out_of_range("edge", e, ne));
        }
        Ok(())
    }

    /// Chain boundary edges into loops, warning through the mesh sink on
    /// non-simple boundaries.
    pub fn extract_boundary_loops(&self, opts: BoundaryLoopOptions) -> BoundaryLoops {
        extract_boundary_loops(
            &self.facet_buffer(),
            self.connectivity(),
            self.num_vertices,
            opts,
            self.sink.as_ref(),
        )
    }

    /// Vertices not referenced by any corner.
    pub fn isolated_vertices(&self) -> Vec<Index> {
        let used: HashSet<Index> = self.corner_to_vertex().iter().copied().collect();
        (0..self.num_vertices as Index)
            .filter(|v| !used.contains(v))
            .collect()
    }
}

impl<S: RealValue> InvalidateCache for SurfaceMesh<S> {
    fn invalidate_cache(&mut self) {
        self.connectivity = OnceCell::new();
    }
}

impl<S: RealValue> DebugInvariants for SurfaceMesh<S> {
    fn validate_invariants(&self) -> Result<(), MeshError> {
        let fb = self.facet_buffer();
        if fb.num_facets() != self.num_facets || fb.num_corners() != self.num_corners {
            return Err(MeshError::InvariantViolation(format!(
                "facet buffers hold {} facets / {} corners, mesh counts {} / {}",
                fb.num_facets(),
                fb.num_corners(),
                self.num_facets,
                self.num_corners
            )));
        }
        fb.validate(self.num_vertices).invariant("facet buffer")?;
        let c2f = self.corner_to_facet();
        for (f, range) in fb.facets() {
            if range.len() < 3 {
                return Err(MeshError::InvariantViolation(format!(
                    "facet {f} has {} corners",
                    range.len()
                )));
            }
            if let Some(c) = range.clone().find(|&c| c2f.get(c) != Some(&(f as Index))) {
                return Err(MeshError::InvariantViolation(format!(
                    "corner {c} does not point back to facet {f}"
                )));
            }
        }
        let has_edge_attrs = self.attributes.has_element(AttributeElement::Edge);
        self.attributes.validate(|e| match e {
            AttributeElement::Edge if !has_edge_attrs => None,
            other => self.num_elements(other),
        })
    }
}

static_assertions::assert_impl_all!(SurfaceMesh<f64>: Send, Sync, Clone);
static_assertions::assert_impl_all!(SurfaceMesh<f32>: Send, Sync, Clone);

/// Match `old_edges` to the edges of `conn` by vertex pair, after passing the
/// endpoints through `vertex_old_to_new` when given.
///
/// Returns the edge old → new mapping and its inverse over the edges of `conn`.
pub(crate) fn rekey_edges(
    conn: &Connectivity,
    old_edges: &[[Index; 2]],
    vertex_old_to_new: Option<&[Index]>,
) -> Result<(Vec<Index>, InverseMapping), MeshError> {
    let map = |v: Index| match vertex_old_to_new {
        Some(m) => m.get(v as usize).copied().unwrap_or(INVALID_INDEX),
        None => v,
    };
    let old_to_new: Vec<Index> = old_edges
        .iter()
        .map(|&[a, b]| {
            let (a, b) = (map(a), map(b));
            if a == INVALID_INDEX || b == INVALID_INDEX {
                return INVALID_INDEX;
            }
            conn.find_edge_from_vertices(a, b).unwrap_or(INVALID_INDEX)
        })
        .collect();
    let inv = invert_mapping(&old_to_new, conn.num_edges())?;
    Ok((old_to_new, inv))
}

/// Positions of the `true` entries.
fn kept_indices(keep: &[bool]) -> Vec<Index> {
    keep.iter()
        .enumerate()
        .filter(|&(_, &k)| k)
        .map(|(i, _)| i as Index)
        .collect()
}

/// Forward mapping of a selection: entries not selected map to INVALID_INDEX.
fn forward_of(new_to_old: &[Index], len: usize) -> Vec<Index> {
    let mut old_to_new = vec![INVALID_INDEX; len];
    for (new, &old) in new_to_old.iter().enumerate() {
        old_to_new[old as usize] = new as Index;
    }
    old_to_new
}

fn check_permutation(new_to_old: &[Index], len: usize) -> Result<(), MeshError> {
    if new_to_old.len() != len {
        return Err(MeshError::NotAPermutation { len: new_to_old.len() });
    }
    let mut seen = vec![false; len];
    for &i in new_to_old {
        match seen.get_mut(i as usize) {
            Some(s) if !*s => *s = true,
            _ => return Err(MeshError::NotAPermutation { len }),
        }
    }
    Ok(())
}

/// Debug builds stop here; release builds fall back to `empty`, which the
/// next invariant check reports.
fn unreachable_reserved<'a, T>(id: AttributeId, err: &MeshError, empty: &'a mut [T]) -> &'a mut [T] {
    debug_assert!(false, "reserved attribute {id:?} is unreadable: {err}");
    empty
}

pub(crate) fn check_index_capacity(what: &'static str, current: usize, added: usize) -> Result<(), MeshError> {
    let total = current.saturating_add(added);
    if total >= INVALID_INDEX as usize {
        return Err(MeshError::out_of_range(what, total, INVALID_INDEX as usize));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CaptureSink;
    use std::sync::Arc;

    fn square() -> SurfaceMesh<f64> {
        let mut m = SurfaceMesh::new(3).unwrap();
        m.add_vertices(&[0., 0., 0., 1., 0., 0., 1., 1., 0., 0., 1., 0.])
            .unwrap();
        m.add_triangle(0, 1, 2).unwrap();
        m.add_triangle(0, 2, 3).unwrap();
        m
    }

    #[test]
    fn counts_and_facet_queries() {
        let m = square();
        assert_eq!(m.get_num_vertices(), 4);
        assert_eq!(m.get_num_facets(), 2);
        assert_eq!(m.get_num_corners(), 6);
        assert_eq!(m.get_facet_vertices(1).unwrap(), &[0, 2, 3]);
        assert_eq!(m.get_facet_corner_begin(1).unwrap(), 3);
        assert_eq!(m.get_corner_facet(4).unwrap(), 1);
        assert!(m.is_triangle_mesh());
        assert!(m.get_facet_size(2).is_err());
        m.validate_invariants().unwrap();
    }

    #[test]
    fn reserved_attributes_exist_and_are_protected() {
        let mut m = square();
        assert!(m.has_attribute(VERTEX_TO_POSITION));
        assert!(m.remove_attribute(CORNER_TO_VERTEX).is_err());
        assert!(m.ref_attribute::<Index, _>(CORNER_TO_VERTEX).is_err());
        assert!(m.ref_attribute::<f64, _>(VERTEX_TO_POSITION).is_ok());
        assert!(matches!(
            m.create_attribute::<f32>("$mine", AttributeElement::Vertex, AttributeUsage::Vector, 1, &[]),
            Err(MeshError::ReservedAttribute(_))
        ));
    }

    #[test]
    fn reserved_buffers_track_edits() {
        let mut m = square();
        m.positions_mut()[0] = 7.;
        assert_eq!(m.get_position(0).unwrap()[0], 7.);
        assert_eq!(m.positions().len(), m.get_num_vertices() * m.get_dimension());
        m.remove_facets(&[0]).unwrap();
        assert_eq!(m.corner_to_vertex().len(), m.get_num_corners());
        assert_eq!(m.facet_buffer().facets().count(), m.get_num_facets());
    }

    #[test]
    fn bad_facets_rejected() {
        let mut m = square();
        assert_eq!(m.add_polygon(&[0, 1]).unwrap_err(), MeshError::InvalidFacetSize(2));
        assert!(m.add_triangle(0, 1, 9).is_err());
        assert!(m.add_hybrid(&[3, 4], &[0, 1, 2]).is_err());
        assert_eq!(m.get_num_facets(), 2);
    }

    #[test]
    fn mixed_arity_facets() {
        let mut m = square();
        m.add_vertex(&[2., 0., 0.]).unwrap();
        let f = m.add_hybrid(&[4, 3], &[0, 1, 2, 3, 1, 4, 2]).unwrap();
        assert_eq!(f, 2);
        assert_eq!(m.get_facet_size(2).unwrap(), 4);
        assert_eq!(m.get_facet_vertices(3).unwrap(), &[1, 4, 2]);
        assert!(!m.is_regular());
        m.validate_invariants().unwrap();
    }

    #[test]
    fn remove_vertex_drops_incident_facets() {
        let mut m = square();
        let id = m
            .create_attribute::<i32>("tag", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[10, 20])
            .unwrap();
        m.remove_vertices(&[1]).unwrap();
        assert_eq!(m.get_num_vertices(), 3);
        assert_eq!(m.get_num_facets(), 1);
        assert_eq!(m.get_facet_vertices(0).unwrap(), &[0, 1, 2]);
        assert_eq!(m.get_attribute::<i32, _>(&id).unwrap().get_all(), &[20]);
        assert_eq!(m.get_position(1).unwrap(), &[1., 1., 0.]);
        m.validate_invariants().unwrap();
    }

    #[test]
    fn permute_facets_moves_corners() {
        let mut m = square();
        m.create_attribute::<f32>(
            "corner_w",
            AttributeElement::Corner,
            AttributeUsage::Scalar,
            1,
            &[0., 1., 2., 3., 4., 5.],
        )
        .unwrap();
        m.permute_facets(&[1, 0]).unwrap();
        assert_eq!(m.get_facet_vertices(0).unwrap(), &[0, 2, 3]);
        assert_eq!(
            m.get_attribute::<f32, _>("corner_w").unwrap().get_all(),
            &[3., 4., 5., 0., 1., 2.]
        );
        assert_eq!(m.corner_to_facet(), &[0, 0, 0, 1, 1, 1]);
        assert!(m.permute_facets(&[0, 0]).is_err());
        m.validate_invariants().unwrap();
    }

    #[test]
    fn index_usage_values_follow_vertex_permutation() {
        let mut m = square();
        let id = m
            .create_attribute::<Index>(
                "anchor",
                AttributeElement::Facet,
                AttributeUsage::VertexIndex,
                1,
                &[2, 3],
            )
            .unwrap();
        m.permute_vertices(&[3, 2, 1, 0]).unwrap();
        assert_eq!(m.get_attribute::<Index, _>(&id).unwrap().get_all(), &[1, 0]);
        assert_eq!(m.get_facet_vertices(0).unwrap(), &[3, 2, 1]);
        assert_eq!(m.get_position(0).unwrap(), &[0., 1., 0.]);
    }

    #[test]
    fn edge_attributes_survive_edits() {
        let mut m = square();
        let ne = m.get_num_edges();
        assert_eq!(ne, 5);
        let values: Vec<f64> = (0..ne)
            .map(|e| {
                let [a, b] = m.get_edge_vertices(e).unwrap();
                (a.min(b) * 10 + a.max(b)) as f64
            })
            .collect();
        m.create_attribute::<f64>("key", AttributeElement::Edge, AttributeUsage::Scalar, 1, &values)
            .unwrap();
        m.add_vertex(&[2., 2., 0.]).unwrap();
        m.add_triangle(2, 4, 3).unwrap();
        m.remove_facets(&[0]).unwrap();
        let attr = m.get_attribute::<f64, _>("key").unwrap();
        assert_eq!(attr.num_rows(), m.get_num_edges());
        for e in 0..m.get_num_edges() {
            let [a, b] = m.get_edge_vertices(e).unwrap();
            let expected = match (a.min(b), a.max(b)) {
                (2, 4) | (3, 4) => 0.0,
                (lo, hi) => (lo * 10 + hi) as f64,
            };
            assert_eq!(attr.get(e, 0).unwrap(), expected);
        }
        m.validate_invariants().unwrap();
    }

    #[test]
    fn indexed_attributes_track_corners() {
        let mut m = square();
        let id = m
            .create_indexed_attribute::<f32>("uv", AttributeUsage::UV, 2, &[0., 0., 1., 1.], &[0, 1, 1, 0, 1, 0])
            .unwrap();
        m.add_triangle(1, 2, 3).unwrap();
        let uv = m.get_indexed_attribute::<f32, _>(&id).unwrap();
        assert_eq!(uv.num_corners(), 9);
        assert_eq!(uv.value_index(8).unwrap(), INVALID_INDEX);
        m.remove_facets(&[0]).unwrap();
        let uv = m.get_indexed_attribute::<f32, _>(&id).unwrap();
        assert_eq!(&uv.indices().get_all()[..3], &[0, 1, 0]);
        m.validate_invariants().unwrap();
    }

    #[test]
    fn attribute_size_validation() {
        let mut m = square();
        assert!(matches!(
            m.create_attribute::<f32>("n", AttributeElement::Vertex, AttributeUsage::Normal, 2, &[]),
            Err(MeshError::InvalidUsage { .. })
        ));
        assert!(matches!(
            m.create_attribute::<f32>("w", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[1.0]),
            Err(MeshError::LengthMismatch { .. })
        ));
        let g = m
            .create_attribute::<u8>("g", AttributeElement::Value, AttributeUsage::Vector, 2, &[1, 2, 3, 4])
            .unwrap();
        assert_eq!(m.get_attribute::<u8, _>(&g).unwrap().num_rows(), 2);
        m.add_vertex(&[5., 5., 5.]).unwrap();
        assert_eq!(m.get_attribute::<u8, _>(&g).unwrap().num_rows(), 2);
    }

    #[test]
    fn non_simple_boundary_warns_through_sink() {
        let sink = Arc::new(CaptureSink::new());
        let mut m = SurfaceMesh::<f32>::new(2).unwrap().with_log_sink(sink.clone());
        m.add_vertices(&[0., 0., 1., 0., 0., 1., -1., 0., 0., -1.]).unwrap();
        m.add_triangles(&[0, 1, 2, 0, 3, 4]).unwrap();
        let loops = m.extract_boundary_loops(BoundaryLoopOptions::default());
        assert_eq!(loops.branching_vertices, 1);
        assert_eq!(sink.count(log::Level::Warn), 1);
    }

    #[test]
    fn isolated_vertices_are_listed() {
        let mut m = square();
        m.add_vertex(&[3., 3., 3.]).unwrap();
        assert_eq!(m.isolated_vertices(), vec![4]);
    }
}
