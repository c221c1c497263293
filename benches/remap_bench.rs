use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use mesh_attrib::algs::{RemapVerticesOptions, combine_meshes, remap_vertices};
use mesh_attrib::data::{AttributeElement, AttributeUsage, Index};
use mesh_attrib::SurfaceMesh;

/// Triangle soup: every facet owns its three vertices, so welding them
/// through `remap_vertices` merges most rows.
fn build_soup(n: usize, seed: u64) -> (SurfaceMesh<f64>, Vec<Index>) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut mesh = SurfaceMesh::new(3).expect("3D mesh");
    let grid = |i: usize, j: usize| [i as f64, j as f64, 0.0];
    let mut coords = Vec::new();
    let mut weld = Vec::new();
    for j in 0..n {
        for i in 0..n {
            for (a, b) in [(i, j), (i + 1, j), (i + 1, j + 1)] {
                coords.extend_from_slice(&grid(a, b));
                weld.push((b * (n + 1) + a) as Index);
            }
        }
    }
    mesh.add_vertices(&coords).expect("vertices");
    let tris: Vec<Index> = (0..weld.len() as Index).collect();
    mesh.add_triangles(&tris).expect("triangles");
    let nv = mesh.get_num_vertices();
    let noise: Vec<f32> = (0..nv * 3).map(|_| rng.gen_range(0.0..1.0)).collect();
    mesh.create_attribute::<f32>("color", AttributeElement::Vertex, AttributeUsage::Color, 3, &noise)
        .expect("color");
    let labels: Vec<u32> = (0..nv).map(|_| rng.gen_range(0..8)).collect();
    mesh.create_attribute::<u32>("label", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &labels)
        .expect("label");

    // Compact the weld map onto the vertices actually used.
    let mut compact = vec![Index::MAX; (n + 1) * (n + 1)];
    let mut next = 0;
    for w in &mut weld {
        if compact[*w as usize] == Index::MAX {
            compact[*w as usize] = next;
            next += 1;
        }
        *w = compact[*w as usize];
    }
    (mesh, weld)
}

fn bench_remap(c: &mut Criterion) {
    let mut group = c.benchmark_group("remap");

    for &n in &[32usize, 128usize] {
        let (mesh, weld) = build_soup(n, 7);

        group.bench_with_input(BenchmarkId::new("weld_soup", n), &n, |b, _| {
            b.iter(|| {
                let mut m = mesh.clone();
                remap_vertices(&mut m, &weld, RemapVerticesOptions::default()).expect("weld");
                black_box(m);
            });
        });

        group.bench_with_input(BenchmarkId::new("combine_four", n), &n, |b, _| {
            b.iter(|| {
                let out = combine_meshes(&[&mesh, &mesh, &mesh, &mesh], true).expect("combine");
                black_box(out);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_remap);
criterion_main!(benches);
