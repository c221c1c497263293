//! Edge derivation and CSR adjacency for polygonal facet buffers.
//!
//! Determinism:
//! - Edge ids are assigned in increasing `(min vertex, max vertex)` order, so
//!   repeated builds over an unmodified facet buffer give identical ids.
//! - Every adjacency list is sorted by the id of the entry it lists.

use std::ops::Range;

use itertools::Itertools;

use crate::data::value_type::{INVALID_INDEX, Index};
use crate::diagnostics::LogSink;
use crate::mesh_error::MeshError;
use crate::sink_warn;

/// Borrowed view of a mesh's facet buffers.
///
/// Corner addressing always goes through `facet_to_first_corner`; facet `f`
/// owns corners `first[f] .. first[f + 1]` (or `.. num_corners` for the last).
#[derive(Clone, Copy, Debug)]
pub struct FacetBuffer<'a> {
    corner_to_vertex: &'a [Index],
    facet_to_first_corner: &'a [Index],
}

impl<'a> FacetBuffer<'a> {
    pub fn new(corner_to_vertex: &'a [Index], facet_to_first_corner: &'a [Index]) -> Self {
        Self {
            corner_to_vertex,
            facet_to_first_corner,
        }
    }

    pub fn num_facets(&self) -> usize {
        self.facet_to_first_corner.len()
    }

    pub fn num_corners(&self) -> usize {
        self.corner_to_vertex.len()
    }

    pub fn corner_to_vertex(&self) -> &'a [Index] {
        self.corner_to_vertex
    }

    /// Corner range of facet `f`. `f` must be in range.
    pub fn facet_corners(&self, f: usize) -> Range<usize> {
        let begin = self.facet_to_first_corner[f] as usize;
        let end = self
            .facet_to_first_corner
            .get(f + 1)
            .map_or(self.num_corners(), |&c| c as usize);
        begin..end
    }

    /// Vertex indices of facet `f`.
    pub fn facet_vertices(&self, f: usize) -> &'a [Index] {
        &self.corner_to_vertex[self.facet_corners(f)]
    }

    /// Iterate `(facet, corner range)` for every facet.
    pub fn facets(&self) -> impl Iterator<Item = (usize, Range<usize>)> + '_ {
        (0..self.num_facets()).map(move |f| (f, self.facet_corners(f)))
    }

    /// Check offsets are non-decreasing, start at zero and stay in range, and
    /// that every vertex index is below `num_vertices`.
    pub fn validate(&self, num_vertices: usize) -> Result<(), MeshError> {
        let nc = self.num_corners();
        if let Some(&first) = self.facet_to_first_corner.first() {
            if first != 0 {
                return Err(MeshError::InvariantViolation(format!(
                    "first facet starts at corner {first}"
                )));
            }
        } else if nc != 0 {
            return Err(MeshError::InvariantViolation(format!(
                "{nc} corners but no facets"
            )));
        }
        for (f, range) in self.facets() {
            if range.start > range.end || range.end > nc {
                return Err(MeshError::InvariantViolation(format!(
                    "facet {f} has corner range {range:?} outside 0..{nc}"
                )));
            }
        }
        if let Some((c, &v)) = self
            .corner_to_vertex
            .iter()
            .find_position(|&&v| v as usize >= num_vertices)
        {
            return Err(MeshError::InvariantViolation(format!(
                "corner {c} references vertex {v}, mesh has {num_vertices}"
            )));
        }
        Ok(())
    }
}

/// Compressed sparse row adjacency (`xadj`/`adjncy`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Csr {
    /// Offsets into `adjncy`; length is `rows + 1`.
    pub xadj: Vec<Index>,
    /// Concatenated neighbor lists.
    pub adjncy: Vec<Index>,
}

impl Csr {
    /// Build from `(row, value)` pairs. Within a row, values keep the order
    /// in which they were produced.
    pub fn from_pairs<I>(rows: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (Index, Index)> + Clone,
    {
        let mut xadj = vec![0 as Index; rows + 1];
        for (r, _) in pairs.clone() {
            xadj[r as usize + 1] += 1;
        }
        for i in 0..rows {
            xadj[i + 1] += xadj[i];
        }
        let mut cursor = xadj.clone();
        let mut adjncy = vec![INVALID_INDEX; xadj[rows] as usize];
        for (r, v) in pairs {
            let slot = &mut cursor[r as usize];
            adjncy[*slot as usize] = v;
            *slot += 1;
        }
        Self { xadj, adjncy }
    }

    /// Build from one list per row.
    pub fn from_lists(lists: &[Vec<Index>]) -> Self {
        let mut xadj = Vec::with_capacity(lists.len() + 1);
        let mut adjncy = Vec::with_capacity(lists.iter().map(Vec::len).sum());
        xadj.push(0);
        for list in lists {
            adjncy.extend_from_slice(list);
            xadj.push(adjncy.len() as Index);
        }
        Self { xadj, adjncy }
    }

    pub fn num_rows(&self) -> usize {
        self.xadj.len().saturating_sub(1)
    }

    /// Neighbor slice of row `i`, empty when out of range.
    #[inline]
    pub fn neighbors(&self, i: usize) -> &[Index] {
        match (self.xadj.get(i), self.xadj.get(i + 1)) {
            (Some(&b), Some(&e)) => &self.adjncy[b as usize..e as usize],
            _ => &[],
        }
    }

    /// Sort and deduplicate every row in place.
    fn normalize(&mut self) {
        let lists: Vec<Vec<Index>> = (0..self.num_rows())
            .map(|i| {
                let mut l = self.neighbors(i).to_vec();
                l.sort_unstable();
                l.dedup();
                l
            })
            .collect();
        *self = Self::from_lists(&lists);
    }
}

#[inline]
fn next_corner(range: &Range<usize>, c: usize) -> usize {
    if c + 1 < range.end { c + 1 } else { range.start }
}

/// Assign every corner the id of the undirected edge from its vertex to the
/// next vertex of its facet. Returns `(corner_to_edge, num_edges)`.
///
/// Two corners share an edge id iff their vertex pairs are equal as
/// unordered pairs. Ids follow sorted `(min, max)` vertex order.
pub fn corner_to_edge_mapping(facets: &FacetBuffer<'_>) -> (Vec<Index>, usize) {
    let c2v = facets.corner_to_vertex();
    let mut keys: Vec<(Index, Index, Index)> = Vec::with_capacity(c2v.len());
    for (_, range) in facets.facets() {
        for c in range.clone() {
            let a = c2v[c];
            let b = c2v[next_corner(&range, c)];
            keys.push((a.min(b), a.max(b), c as Index));
        }
    }
    keys.sort_unstable();

    let mut corner_to_edge = vec![INVALID_INDEX; c2v.len()];
    let mut num_edges = 0usize;
    for (_, group) in &keys.iter().chunk_by(|k| (k.0, k.1)) {
        for &(_, _, c) in group {
            corner_to_edge[c as usize] = num_edges as Index;
        }
        num_edges += 1;
    }
    (corner_to_edge, num_edges)
}

/// Derived edge set and adjacency of a facet buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Connectivity {
    corner_to_edge: Vec<Index>,
    corner_to_facet: Vec<Index>,
    corner_next: Vec<Index>,
    edge_vertices: Vec<[Index; 2]>,
    vertex_to_edges: Csr,
    vertex_to_corners: Csr,
    vertex_to_facets: Csr,
    edge_to_corners: Csr,
    edge_to_facets: Csr,
    facet_neighbors: Csr,
    num_non_manifold_edges: usize,
}

impl Connectivity {
    /// Derive edges and adjacency. Non-manifold edges are reported through `sink`.
    pub fn build(facets: &FacetBuffer<'_>, num_vertices: usize, sink: &dyn LogSink) -> Self {
        let c2v = facets.corner_to_vertex();
        let nc = c2v.len();
        let nf = facets.num_facets();
        let (corner_to_edge, ne) = corner_to_edge_mapping(facets);

        let mut corner_to_facet = vec![INVALID_INDEX; nc];
        let mut corner_next = vec![INVALID_INDEX; nc];
        for (f, range) in facets.facets() {
            for c in range.clone() {
                corner_to_facet[c] = f as Index;
                corner_next[c] = next_corner(&range, c) as Index;
            }
        }

        // Corners are visited in increasing order, so each edge's list starts
        // with its lowest corner, which fixes the edge orientation.
        let edge_to_corners = Csr::from_pairs(
            ne,
            corner_to_edge
                .iter()
                .enumerate()
                .map(|(c, &e)| (e, c as Index)),
        );
        let edge_vertices: Vec<[Index; 2]> = (0..ne)
            .map(|e| {
                let c = edge_to_corners.neighbors(e)[0] as usize;
                [c2v[c], c2v[corner_next[c] as usize]]
            })
            .collect();

        let mut edge_to_facets = Csr::from_pairs(
            ne,
            corner_to_edge
                .iter()
                .zip(&corner_to_facet)
                .map(|(&e, &f)| (e, f)),
        );
        edge_to_facets.normalize();

        let vertex_to_corners =
            Csr::from_pairs(num_vertices, c2v.iter().enumerate().map(|(c, &v)| (v, c as Index)));
        let mut vertex_to_facets = Csr::from_pairs(
            num_vertices,
            c2v.iter().zip(&corner_to_facet).map(|(&v, &f)| (v, f)),
        );
        vertex_to_facets.normalize();

        let vertex_to_edges = Csr::from_pairs(
            num_vertices,
            edge_vertices
                .iter()
                .enumerate()
                .flat_map(|(e, &[a, b])| {
                    let e = e as Index;
                    let second = (a != b).then_some((b, e));
                    std::iter::once((a, e)).chain(second)
                }),
        );

        let mut facet_neighbors = Csr::from_pairs(
            nf,
            (0..ne).flat_map(|e| {
                let fs = edge_to_facets.neighbors(e);
                fs.iter()
                    .flat_map(move |&f| fs.iter().filter(move |&&g| g != f).map(move |&g| (f, g)))
            })
            .collect_vec(),
        );
        facet_neighbors.normalize();

        let num_non_manifold_edges = (0..ne)
            .filter(|&e| edge_to_facets.neighbors(e).len() > 2)
            .count();
        if num_non_manifold_edges > 0 {
            sink_warn!(
                sink,
                "{num_non_manifold_edges} non-manifold edges (more than two incident facets)"
            );
        }

        Self {
            corner_to_edge,
            corner_to_facet,
            corner_next,
            edge_vertices,
            vertex_to_edges,
            vertex_to_corners,
            vertex_to_facets,
            edge_to_corners,
            edge_to_facets,
            facet_neighbors,
            num_non_manifold_edges,
        }
    }

    pub fn num_edges(&self) -> usize {
        self.edge_vertices.len()
    }

    /// Edge id of every corner.
    pub fn corner_to_edge(&self) -> &[Index] {
        &self.corner_to_edge
    }

    pub fn get_corner_edge(&self, c: usize) -> Result<Index, MeshError> {
        self.corner_to_edge
            .get(c)
            .copied()
            .ok_or_else(|| MeshError::out_of_range("corner", c, self.corner_to_edge.len()))
    }

    /// Corner following `c` in its facet.
    pub fn next_corner_around_facet(&self, c: usize) -> Result<Index, MeshError> {
        self.corner_next
            .get(c)
            .copied()
            .ok_or_else(|| MeshError::out_of_range("corner", c, self.corner_next.len()))
    }

    /// Endpoints of edge `e`, oriented as in its lowest-index corner.
    pub fn get_edge_vertices(&self, e: usize) -> Result<[Index; 2], MeshError> {
        self.edge_vertices
            .get(e)
            .copied()
            .ok_or_else(|| MeshError::out_of_range("edge", e, self.num_edges()))
    }

    pub fn edge_vertices(&self) -> &[[Index; 2]] {
        &self.edge_vertices
    }

    /// Edge joining `v0` and `v1` in either direction.
    pub fn find_edge_from_vertices(&self, v0: Index, v1: Index) -> Option<Index> {
        self.vertex_to_edges
            .neighbors(v0 as usize)
            .iter()
            .copied()
            .find(|&e| {
                let [a, b] = self.edge_vertices[e as usize];
                (a == v0 && b == v1) || (a == v1 && b == v0)
            })
    }

    pub fn edges_around_vertex(&self, v: usize) -> &[Index] {
        self.vertex_to_edges.neighbors(v)
    }

    pub fn corners_around_vertex(&self, v: usize) -> &[Index] {
        self.vertex_to_corners.neighbors(v)
    }

    /// Distinct facets touching `v`, sorted.
    pub fn facets_around_vertex(&self, v: usize) -> &[Index] {
        self.vertex_to_facets.neighbors(v)
    }

    pub fn corners_around_edge(&self, e: usize) -> &[Index] {
        self.edge_to_corners.neighbors(e)
    }

    /// Distinct facets containing `e`, sorted.
    pub fn facets_around_edge(&self, e: usize) -> &[Index] {
        self.edge_to_facets.neighbors(e)
    }

    pub fn count_facets_around_edge(&self, e: usize) -> usize {
        self.edge_to_facets.neighbors(e).len()
    }

    /// Exactly one incident facet.
    pub fn is_boundary_edge(&self, e: usize) -> bool {
        self.count_facets_around_edge(e) == 1
    }

    /// At most two incident facets.
    pub fn is_manifold_edge(&self, e: usize) -> bool {
        self.count_facets_around_edge(e) <= 2
    }

    pub fn num_non_manifold_edges(&self) -> usize {
        self.num_non_manifold_edges
    }

    pub fn boundary_edges(&self) -> impl Iterator<Item = Index> + '_ {
        (0..self.num_edges())
            .filter(|&e| self.is_boundary_edge(e))
            .map(|e| e as Index)
    }

    /// Facets sharing an edge with `f`, sorted, without `f` itself.
    pub fn facet_neighbors(&self, f: usize) -> &[Index] {
        self.facet_neighbors.neighbors(f)
    }

    pub(crate) fn corner_to_facet(&self) -> &[Index] {
        &self.corner_to_facet
    }

    pub(crate) fn corner_next(&self) -> &[Index] {
        &self.corner_next
    }
}
