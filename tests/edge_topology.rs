mod util;

use std::collections::HashMap;

use mesh_attrib::prelude::*;
use mesh_attrib::topology::{FacetBuffer, corner_to_edge_mapping};
use proptest::prelude::*;
use util::*;

#[test]
fn triangle_has_three_boundary_edges() {
    let m = triangle();
    assert_eq!(m.get_num_edges(), 3);
    let mut lengths: Vec<f64> = (0..3).map(|e| edge_length(&m, e)).collect();
    lengths.sort_by(f64::total_cmp);
    assert!((lengths[0] - 1.).abs() < 1e-12);
    assert!((lengths[1] - 1.).abs() < 1e-12);
    assert!((lengths[2] - 2f64.sqrt()).abs() < 1e-12);
    for e in 0..3 {
        assert!(m.is_boundary_edge(e).unwrap());
        assert!(m.is_manifold_edge(e).unwrap());
    }
    assert!(m.is_boundary_edge(3).is_err());
}

#[test]
fn grid_edges_and_boundary() {
    let m = grid(2, 2);
    // 12 axis-aligned edges plus 4 diagonals.
    assert_eq!(m.get_num_edges(), 16);
    let boundary = (0..16).filter(|&e| m.is_boundary_edge(e).unwrap()).count();
    assert_eq!(boundary, 8);
    assert_eq!(m.num_non_manifold_edges(), 0);

    let loops = m.extract_boundary_loops(BoundaryLoopOptions {
        canonical_start: true,
        ..Default::default()
    });
    assert!(loops.is_complete());
    assert_eq!(loops.loops.len(), 1);
    let l = &loops.loops[0];
    assert_eq!(l.vertices.len(), 8);
    assert_eq!(l.vertices[0], 0);
    assert!(!l.vertices.contains(&4));
}

#[test]
fn edges_rebuild_after_edits() {
    let mut m = grid(1, 1);
    assert_eq!(m.get_num_edges(), 5);
    assert!(m.has_edges());
    m.remove_facets(&[1]).unwrap();
    assert!(!m.has_edges());
    assert_eq!(m.get_num_edges(), 3);
}

#[test]
fn fan_of_three_facets_is_non_manifold() {
    let mut m = SurfaceMesh::<f64>::new(3).unwrap();
    m.add_vertices(&[0., 0., 0., 1., 0., 0., 0., 1., 0., 0., -1., 0., 0., 0., 1.])
        .unwrap();
    m.add_triangles(&[0, 1, 2, 1, 0, 3, 0, 1, 4]).unwrap();
    let e = m.find_edge_from_vertices(1, 0).unwrap() as usize;
    assert_eq!(m.count_facets_around_edge(e).unwrap(), 3);
    assert!(!m.is_manifold_edge(e).unwrap());
    assert_eq!(m.num_non_manifold_edges(), 1);
}

#[test]
fn two_patches_give_two_loops() {
    let a = grid(1, 1);
    let mut b = grid(1, 1);
    for x in b.positions_mut().iter_mut().step_by(3) {
        *x += 5.;
    }
    let m = combine_meshes(&[&a, &b], false).unwrap();
    let loops = m.extract_boundary_loops(BoundaryLoopOptions::default());
    assert_eq!(loops.loops.len(), 2);
    assert_eq!(loops.loops.iter().map(|l| l.edges.len()).sum::<usize>(), 8);
}

#[test]
fn hybrid_mesh_edges() {
    let mut m = SurfaceMesh::<f32>::new(2).unwrap();
    m.add_vertices(&[0., 0., 1., 0., 1., 1., 0., 1., 2., 0.5]).unwrap();
    m.add_quad(0, 1, 2, 3).unwrap();
    m.add_triangle(1, 4, 2).unwrap();
    assert_eq!(m.get_num_edges(), 6);
    let shared = m.find_edge_from_vertices(2, 1).unwrap() as usize;
    assert_eq!(m.count_facets_around_edge(shared).unwrap(), 2);
    // Quad corner 1 runs 1 -> 2, triangle corner 6 runs 2 -> 1, corner 5 runs 4 -> 2.
    assert_eq!(m.get_corner_edge(1).unwrap() as usize, shared);
    assert_eq!(m.get_corner_edge(6).unwrap() as usize, shared);
    assert_ne!(m.get_corner_edge(5).unwrap() as usize, shared);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn corners_share_an_edge_iff_same_vertex_pair(seed in any::<u64>(), nf in 1usize..40) {
        let m = random_mesh(seed, 12, nf);
        let fb = m.facet_buffer();
        let (c2e, ne) = corner_to_edge_mapping(&fb);
        prop_assert_eq!(ne, m.get_num_edges());

        let mut pair_of: HashMap<Index, (Index, Index)> = HashMap::new();
        for (_, range) in fb.facets() {
            for c in range.clone() {
                let next = if c + 1 < range.end { c + 1 } else { range.start };
                let a = fb.corner_to_vertex()[c];
                let b = fb.corner_to_vertex()[next];
                let key = (a.min(b), a.max(b));
                let prev = pair_of.insert(c2e[c], key);
                prop_assert!(prev.is_none() || prev == Some(key));
            }
        }
        // Distinct edges have distinct pairs.
        let mut pairs: Vec<_> = pair_of.values().copied().collect();
        pairs.sort_unstable();
        pairs.dedup();
        prop_assert_eq!(pairs.len(), ne);
    }

    #[test]
    fn edge_mapping_is_idempotent(seed in any::<u64>(), nf in 0usize..30) {
        let m = random_mesh(seed, 10, nf);
        let fb = FacetBuffer::new(m.corner_to_vertex(), m.facet_to_first_corner());
        let first = corner_to_edge_mapping(&fb);
        let second = corner_to_edge_mapping(&fb);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn every_edge_has_a_facet(seed in any::<u64>(), nf in 1usize..30) {
        let m = random_mesh(seed, 9, nf);
        for e in 0..m.get_num_edges() {
            prop_assert!(m.count_facets_around_edge(e).unwrap() >= 1);
        }
    }
}
