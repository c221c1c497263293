//! Boundary loop extraction.
//!
//! Boundary edges are oriented like the single facet that owns them, and are
//! chained by following the unique outgoing boundary edge at each vertex. A
//! vertex with several outgoing boundary edges stops the chain there; such
//! chains are counted, not returned.

use serde::{Deserialize, Serialize};

use crate::data::value_type::{INVALID_INDEX, Index};
use crate::diagnostics::LogSink;
use crate::sink_warn;
use crate::topology::connectivity::{Connectivity, Csr, FacetBuffer};

/// Options for [`extract_boundary_loops`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryLoopOptions {
    /// Rotate each loop so it starts at its smallest vertex index.
    pub canonical_start: bool,
    /// Report open chains and branching vertices through the log sink.
    pub warn_on_open_chains: bool,
}

impl Default for BoundaryLoopOptions {
    fn default() -> Self {
        Self {
            canonical_start: false,
            warn_on_open_chains: true,
        }
    }
}

/// One closed boundary cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Vertices in traversal order; the loop closes back to the first one.
    pub vertices: Vec<Index>,
    /// `edges[i]` joins `vertices[i]` and `vertices[i + 1]` (cyclically).
    pub edges: Vec<Index>,
}

/// Result of [`extract_boundary_loops`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoundaryLoops {
    pub loops: Vec<BoundaryLoop>,
    /// Chains that could not be closed.
    pub open_chains: usize,
    /// Vertices with more than one outgoing boundary edge.
    pub branching_vertices: usize,
}

impl BoundaryLoops {
    /// True when every boundary edge belongs to a returned loop.
    pub fn is_complete(&self) -> bool {
        self.open_chains == 0
    }
}

/// Chain the boundary edges of `conn` into closed loops.
///
/// Loops are seeded in increasing edge id order.
pub fn extract_boundary_loops(
    facets: &FacetBuffer<'_>,
    conn: &Connectivity,
    num_vertices: usize,
    opts: BoundaryLoopOptions,
    sink: &dyn LogSink,
) -> BoundaryLoops {
    let c2v = facets.corner_to_vertex();

    // Directed boundary edges: (tail, head) following the owning facet.
    let mut tail = vec![INVALID_INDEX; conn.num_edges()];
    let mut head = vec![INVALID_INDEX; conn.num_edges()];
    let mut boundary = Vec::new();
    for e in conn.boundary_edges() {
        let c = conn.corners_around_edge(e as usize)[0] as usize;
        tail[e as usize] = c2v[c];
        head[e as usize] = c2v[conn.corner_next()[c] as usize];
        boundary.push(e);
    }
    let outgoing = Csr::from_pairs(
        num_vertices,
        boundary
            .iter()
            .map(|&e| (tail[e as usize], e))
            .collect::<Vec<_>>(),
    );
    let branching_vertices = (0..num_vertices)
        .filter(|&v| outgoing.neighbors(v).len() > 1)
        .count();

    let mut visited = vec![false; conn.num_edges()];
    let mut result = BoundaryLoops {
        branching_vertices,
        ..Default::default()
    };

    for &seed in &boundary {
        if visited[seed as usize] {
            continue;
        }
        let start = tail[seed as usize];
        let mut current = BoundaryLoop::default();
        let mut e = seed;
        let closed = loop {
            visited[e as usize] = true;
            current.vertices.push(tail[e as usize]);
            current.edges.push(e);
            let v = head[e as usize];
            if v == start {
                break true;
            }
            match outgoing.neighbors(v as usize) {
                [next] if !visited[*next as usize] => e = *next,
                _ => break false,
            }
        };
        if closed {
            if opts.canonical_start {
                rotate_to_min(&mut current);
            }
            result.loops.push(current);
        } else {
            result.open_chains += 1;
        }
    }

    if opts.warn_on_open_chains && (result.open_chains > 0 || branching_vertices > 0) {
        sink_warn!(
            sink,
            "non-simple boundary: {} open chains, {} branching vertices, {} loops closed",
            result.open_chains,
            branching_vertices,
            result.loops.len()
        );
    }
    result
}

fn rotate_to_min(l: &mut BoundaryLoop) {
    if let Some(pos) = l
        .vertices
        .iter()
        .enumerate()
        .min_by_key(|&(_, v)| *v)
        .map(|(i, _)| i)
    {
        l.vertices.rotate_left(pos);
        l.edges.rotate_left(pos);
    }
}
