mod util;

use mesh_attrib::prelude::*;
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use util::*;

fn merged_value(policy: MappingPolicy) -> f64 {
    let mut m = SurfaceMesh::<f64>::new(3).unwrap();
    m.add_vertices(&[0., 0., 0., 1., 0., 0., 0., 1., 0., 1., 0., 0.])
        .unwrap();
    m.add_triangles(&[0, 1, 2, 0, 2, 3]).unwrap();
    m.create_attribute::<f64>(
        "value",
        AttributeElement::Vertex,
        AttributeUsage::Scalar,
        1,
        &[1., 2., 3., 4.],
    )
    .unwrap();
    let options = RemapVerticesOptions {
        policies: CollisionPolicies::uniform(policy),
    };
    // Vertex 3 duplicates vertex 1.
    remap_vertices(&mut m, &[0, 1, 2, 1], options).unwrap();
    assert_eq!(m.get_num_vertices(), 3);
    m.get_attribute::<f64, _>("value").unwrap().get(1, 0).unwrap()
}

#[test]
fn merge_policy_decides_the_surviving_value() {
    assert_eq!(merged_value(MappingPolicy::Average), 3.0);
    assert_eq!(merged_value(MappingPolicy::KeepFirst), 2.0);
}

#[test]
fn merging_keeps_facets_and_positions() {
    let mut m = grid(1, 1);
    m.add_vertex(&[1., 0., 0.]).unwrap();
    m.add_triangle(4, 3, 1).unwrap();
    remap_vertices(&mut m, &[0, 1, 2, 3, 1], RemapVerticesOptions::default()).unwrap();
    assert_eq!(m.get_num_vertices(), 4);
    assert_eq!(m.get_facet_vertices(2).unwrap(), &[1, 3, 1]);
    assert_eq!(m.get_position(1).unwrap(), &[1., 0., 0.]);
    assert_eq!(
        mesh_attrib::algs::remove_topologically_degenerate_facets(&mut m).unwrap(),
        1
    );
    m.validate_invariants().unwrap();
}

#[test]
fn map_attributes_follows_explicit_mappings() {
    let mut source = grid(1, 1);
    source
        .create_attribute::<f32>("h", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[0., 1., 2., 3.])
        .unwrap();
    source
        .create_attribute::<i32>("id", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[10, 20])
        .unwrap();

    // Target: a single triangle covering source vertices 3, 1, 0.
    let mut target = triangle();
    let options = MapAttributesOptions {
        source_vertices: Some(vec![3, 1, 0]),
        source_facets: Some(vec![1, 0]),
        source_facet_offsets: Some(vec![0, 2]),
        ..Default::default()
    };
    map_attributes(&source, &mut target, &options).unwrap();
    assert_eq!(target.get_attribute::<f32, _>("h").unwrap().get_all(), &[3., 1., 0.]);
    // Two integer sources listed out of order: the lower index still wins.
    assert_eq!(target.get_attribute::<i32, _>("id").unwrap().get_all(), &[10]);
}

#[test]
fn map_attributes_replaces_same_name_on_target() {
    let mut source = triangle();
    source
        .create_attribute::<u8>("flag", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[1])
        .unwrap();
    let mut target = triangle();
    let id = target
        .create_attribute::<u8>("flag", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[7])
        .unwrap();
    map_attributes(&source, &mut target, &MapAttributesOptions::default()).unwrap();
    assert_eq!(target.get_attribute::<u8, _>(&id).unwrap().get_all(), &[1]);
}

#[test]
fn combine_offsets_vertices_and_index_values() {
    let a = triangle();
    let mut b = grid(1, 1);
    b.create_attribute::<Index>(
        "twin",
        AttributeElement::Vertex,
        AttributeUsage::VertexIndex,
        1,
        &[3, 2, 1, 0],
    )
    .unwrap();
    let m = combine_meshes(&[&a, &b], true).unwrap();
    assert_eq!(m.get_num_vertices(), 7);
    assert_eq!(m.get_num_facets(), 3);
    assert_eq!(m.get_facet_vertices(1).unwrap(), &[3, 4, 6]);
    assert_eq!(
        m.get_attribute::<Index, _>("twin").unwrap().get_all(),
        &[INVALID_INDEX, INVALID_INDEX, INVALID_INDEX, 6, 5, 4, 3]
    );
    m.validate_invariants().unwrap();
}

#[test]
fn submesh_round_trips_through_combine() {
    let m = grid(2, 1);
    let opts = SeparateOptions {
        connectivity_type: ConnectivityType::Edge,
        blockers: (0..m.get_num_edges() as Index).collect(),
        source_facet_attribute_name: Some("src".into()),
        ..Default::default()
    };
    let pieces = separate_by_components(&m, &opts).unwrap();
    assert_eq!(pieces.len(), 4);
    let refs: Vec<&SurfaceMesh<f64>> = pieces.iter().collect();
    let joined = combine_meshes(&refs, true).unwrap();
    assert_eq!(joined.get_num_facets(), 4);
    assert_eq!(joined.get_num_vertices(), 12);
    assert_eq!(
        joined.get_attribute::<Index, _>("src").unwrap().get_all(),
        &[0, 1, 2, 3]
    );
}

#[test]
fn facet_to_vertex_conversion_averages_incident_facets() {
    let mut m = grid(1, 1);
    m.create_attribute::<f64>("a", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[2., 4.])
        .unwrap();
    map_attribute(&mut m, "a", "a_v", AttributeElement::Vertex).unwrap();
    // Vertices 0 and 3 touch both triangles, 1 only the first, 2 only the second.
    assert_eq!(m.get_attribute::<f64, _>("a_v").unwrap().get_all(), &[3., 2., 4., 3.]);
}

/// Random surjective map of `n` vertices onto `k <= n` targets.
fn random_surjection(rng: &mut SmallRng, n: usize, k: usize) -> Vec<Index> {
    let mut map: Vec<Index> = (0..n).map(|i| (i % k) as Index).collect();
    map.shuffle(rng);
    map
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn remap_averages_every_group(seed in any::<u64>(), n in 3usize..20) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let k = rng.gen_range(1..=n);
        let mut m = random_mesh(seed, n, 4);
        let values: Vec<f64> = (0..n).map(|_| rng.gen_range(-10.0..10.0)).collect();
        m.create_attribute::<f64>("x", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &values)
            .unwrap();
        let map = random_surjection(&mut rng, n, k);
        remap_vertices(&mut m, &map, RemapVerticesOptions::default()).unwrap();

        prop_assert_eq!(m.get_num_vertices(), k);
        let out = m.get_attribute::<f64, _>("x").unwrap();
        for t in 0..k {
            let group: Vec<f64> = map
                .iter()
                .zip(&values)
                .filter(|(to, _)| **to as usize == t)
                .map(|(_, v)| *v)
                .collect();
            let mean = group.iter().sum::<f64>() / group.len() as f64;
            prop_assert!((out.get(t, 0).unwrap() - mean).abs() < 1e-9);
        }
        m.validate_invariants().unwrap();
    }

    #[test]
    fn combine_sums_counts(seeds in prop::collection::vec(any::<u64>(), 0..5)) {
        let meshes: Vec<SurfaceMesh<f64>> = seeds
            .iter()
            .enumerate()
            .map(|(i, &s)| random_mesh(s, 3 + i, 2 * i))
            .collect();
        let refs: Vec<&SurfaceMesh<f64>> = meshes.iter().collect();
        let out = combine_meshes(&refs, true).unwrap();
        prop_assert_eq!(out.get_num_vertices(), meshes.iter().map(|m| m.get_num_vertices()).sum::<usize>());
        prop_assert_eq!(out.get_num_facets(), meshes.iter().map(|m| m.get_num_facets()).sum::<usize>());
        prop_assert_eq!(out.get_num_corners(), meshes.iter().map(|m| m.get_num_corners()).sum::<usize>());
    }
}
