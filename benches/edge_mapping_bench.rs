use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use mesh_attrib::SurfaceMesh;
use mesh_attrib::data::Index;
use mesh_attrib::topology::{Connectivity, corner_to_edge_mapping};
use mesh_attrib::diagnostics::NullSink;

/// `n` by `n` triangulated grid.
fn build_grid(n: usize) -> SurfaceMesh<f64> {
    let mut mesh = SurfaceMesh::new(3).expect("3D mesh");
    let mut coords = Vec::with_capacity((n + 1) * (n + 1) * 3);
    for j in 0..=n {
        for i in 0..=n {
            coords.extend_from_slice(&[i as f64, j as f64, 0.0]);
        }
    }
    mesh.add_vertices(&coords).expect("vertices");
    let v = |i: usize, j: usize| (j * (n + 1) + i) as Index;
    let mut tris = Vec::with_capacity(n * n * 6);
    for j in 0..n {
        for i in 0..n {
            tris.extend_from_slice(&[v(i, j), v(i + 1, j), v(i + 1, j + 1)]);
            tris.extend_from_slice(&[v(i, j), v(i + 1, j + 1), v(i, j + 1)]);
        }
    }
    mesh.add_triangles(&tris).expect("triangles");
    mesh
}

fn bench_edge_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_mapping");

    for &n in &[64usize, 256usize] {
        let mesh = build_grid(n);

        group.bench_with_input(BenchmarkId::new("corner_to_edge", n), &n, |b, _| {
            b.iter(|| {
                let out = corner_to_edge_mapping(&mesh.facet_buffer());
                black_box(out);
            });
        });

        group.bench_with_input(BenchmarkId::new("full_connectivity", n), &n, |b, _| {
            b.iter(|| {
                let conn =
                    Connectivity::build(&mesh.facet_buffer(), mesh.get_num_vertices(), &NullSink);
                black_box(conn);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_edge_mapping);
criterion_main!(benches);
