#![allow(dead_code)]
use mesh_attrib::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Right triangle (0,0,0) (1,0,0) (0,1,0).
pub fn triangle() -> SurfaceMesh<f64> {
    let mut m = SurfaceMesh::new(3).unwrap();
    m.add_vertices(&[0., 0., 0., 1., 0., 0., 0., 1., 0.]).unwrap();
    m.add_triangle(0, 1, 2).unwrap();
    m
}

/// `nx` by `ny` unit squares, each split into two triangles, in the z = 0 plane.
pub fn grid(nx: usize, ny: usize) -> SurfaceMesh<f64> {
    let mut m = SurfaceMesh::new(3).unwrap();
    let mut coords = Vec::new();
    for j in 0..=ny {
        for i in 0..=nx {
            coords.extend_from_slice(&[i as f64, j as f64, 0.]);
        }
    }
    m.add_vertices(&coords).unwrap();
    let v = |i: usize, j: usize| (j * (nx + 1) + i) as Index;
    let mut tris = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            tris.extend_from_slice(&[v(i, j), v(i + 1, j), v(i + 1, j + 1)]);
            tris.extend_from_slice(&[v(i, j), v(i + 1, j + 1), v(i, j + 1)]);
        }
    }
    m.add_triangles(&tris).unwrap();
    m
}

/// `nf` triangles over `nv` random 3D points; some vertices may stay unused.
pub fn random_mesh(seed: u64, nv: usize, nf: usize) -> SurfaceMesh<f64> {
    assert!(nv >= 3);
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut m = SurfaceMesh::new(3).unwrap();
    let coords: Vec<f64> = (0..nv * 3).map(|_| rng.gen_range(-1.0..1.0)).collect();
    m.add_vertices(&coords).unwrap();
    for _ in 0..nf {
        let a = rng.gen_range(0..nv) as Index;
        let mut b = rng.gen_range(0..nv) as Index;
        while b == a {
            b = rng.gen_range(0..nv) as Index;
        }
        let mut c = rng.gen_range(0..nv) as Index;
        while c == a || c == b {
            c = rng.gen_range(0..nv) as Index;
        }
        m.add_triangle(a, b, c).unwrap();
    }
    m
}

pub fn edge_length(mesh: &SurfaceMesh<f64>, e: usize) -> f64 {
    let [a, b] = mesh.get_edge_vertices(e).unwrap();
    let pa = mesh.get_position(a as usize).unwrap();
    let pb = mesh.get_position(b as usize).unwrap();
    pa.iter()
        .zip(pb)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
