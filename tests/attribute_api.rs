mod util;

use mesh_attrib::prelude::*;
use proptest::prelude::*;
use util::*;

#[test]
fn appending_vertices_keeps_existing_rows() {
    let mut m = triangle();
    let id = m
        .create_attribute::<f64>(
            "temperature",
            AttributeElement::Vertex,
            AttributeUsage::Scalar,
            1,
            &[10., 20., 30.],
        )
        .unwrap();
    let before = m.get_attribute::<f64, _>(&id).unwrap().as_bytes().to_vec();

    m.add_vertices(&[2., 2., 0., 3., 3., 0.]).unwrap();
    let t = m.get_attribute::<f64, _>(&id).unwrap();
    assert_eq!(t.num_rows(), 5);
    assert_eq!(&t.as_bytes()[..before.len()], &before[..]);
    assert_eq!(&t.get_all()[3..], &[0., 0.]);
}

#[test]
fn appending_facets_extends_facet_and_corner_attributes() {
    let mut m = grid(1, 1);
    m.create_attribute::<u32>("tag", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[7, 8])
        .unwrap();
    m.create_attribute::<f32>("w", AttributeElement::Corner, AttributeUsage::Scalar, 1, &[1.; 6])
        .unwrap();
    m.add_quad(0, 1, 3, 2).unwrap();
    assert_eq!(m.get_attribute::<u32, _>("tag").unwrap().get_all(), &[7, 8, 0]);
    assert_eq!(m.get_attribute::<f32, _>("w").unwrap().num_rows(), 10);
    m.validate_invariants().unwrap();
}

#[test]
fn ids_are_stable_until_removal() {
    let mut m = triangle();
    let a = m
        .create_attribute::<i32>("a", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[])
        .unwrap();
    let b = m
        .create_attribute::<i32>("b", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[])
        .unwrap();
    m.rename_attribute(&a, "a2").unwrap();
    assert_eq!(m.get_attribute_id("a2").unwrap(), a);
    assert_eq!(m.get_attribute_name(a).unwrap(), "a2");

    m.remove_attribute("a2").unwrap();
    assert!(matches!(
        m.get_attribute::<i32, _>(&a),
        Err(MeshError::StaleAttributeId(_))
    ));
    // The other id is unaffected and a fresh attribute gets a fresh id.
    assert_eq!(m.get_attribute_id("b").unwrap(), b);
    let c = m
        .create_attribute::<i32>("a2", AttributeElement::Facet, AttributeUsage::Scalar, 1, &[])
        .unwrap();
    assert_ne!(c, a);
}

#[test]
fn typed_access_reports_mismatches() {
    let mut m = triangle();
    m.create_attribute::<f32>("f", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[])
        .unwrap();
    m.create_indexed_attribute::<f32>("uv", AttributeUsage::UV, 2, &[0., 0.], &[0, 0, 0])
        .unwrap();

    assert!(matches!(
        m.get_attribute::<f64, _>("f"),
        Err(MeshError::AttributeTypeMismatch { .. })
    ));
    assert!(matches!(
        m.get_indexed_attribute::<f32, _>("f"),
        Err(MeshError::StorageModeMismatch { .. })
    ));
    assert!(matches!(
        m.get_attribute::<f32, _>("uv"),
        Err(MeshError::StorageModeMismatch { .. })
    ));
    assert!(matches!(
        m.get_attribute::<f32, _>("missing"),
        Err(MeshError::UnknownAttribute(_))
    ));
    assert!(m.is_attribute_type::<f32, _>("f").unwrap());
    assert!(m.is_attribute_indexed("uv").unwrap());
}

#[test]
fn creation_validates_name_usage_and_length() {
    let mut m = triangle();
    assert!(matches!(
        m.create_attribute::<f64>("$mine", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[]),
        Err(MeshError::ReservedAttribute(_))
    ));
    assert!(matches!(
        m.create_attribute::<f64>("n", AttributeElement::Vertex, AttributeUsage::Normal, 2, &[]),
        Err(MeshError::InvalidUsage { .. })
    ));
    assert!(matches!(
        m.create_attribute::<f32>("vi", AttributeElement::Vertex, AttributeUsage::VertexIndex, 1, &[]),
        Err(MeshError::InvalidUsage { .. })
    ));
    assert!(matches!(
        m.create_attribute::<f64>("s", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[1., 2.]),
        Err(MeshError::LengthMismatch { .. })
    ));
    m.create_attribute::<f64>("n", AttributeElement::Vertex, AttributeUsage::Normal, 4, &[])
        .unwrap();
    assert!(matches!(
        m.create_attribute::<f64>("n", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[]),
        Err(MeshError::DuplicateAttributeName(_))
    ));
}

#[test]
fn index_attributes_default_to_invalid() {
    let mut m = triangle();
    m.create_attribute::<Index>(
        "partner",
        AttributeElement::Facet,
        AttributeUsage::VertexIndex,
        1,
        &[],
    )
    .unwrap();
    m.add_triangle(2, 1, 0).unwrap();
    assert_eq!(
        m.get_attribute::<Index, _>("partner").unwrap().get_all(),
        &[INVALID_INDEX, INVALID_INDEX]
    );
}

#[test]
fn enumeration_is_filtered_and_restartable() {
    let mut m = triangle();
    m.create_attribute::<f32>("a", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[])
        .unwrap();
    m.create_attribute::<u8>("b", AttributeElement::Facet, AttributeUsage::Color, 4, &[])
        .unwrap();
    m.create_indexed_attribute::<f64>("c", AttributeUsage::UV, 2, &[], &[])
        .unwrap();

    let all = AttributeFilter::default();
    let it = m.foreach_attribute(&all);
    let first: Vec<&str> = it.clone().map(|r| r.name).collect();
    let second: Vec<&str> = it.map(|r| r.name).collect();
    assert_eq!(first, vec!["a", "b", "c"]);
    assert_eq!(first, second);

    let reserved = AttributeFilter::default().including_reserved();
    assert!(m.foreach_attribute(&reserved).any(|r| r.name.starts_with('$')));

    let facets = AttributeFilter::default().with_elements([AttributeElement::Facet]);
    let names: Vec<&str> = m.foreach_attribute(&facets).map(|r| r.name).collect();
    assert_eq!(names, vec!["b"]);

    let indexed = AttributeFilter::default().with_storage(StorageMode::Indexed);
    let names: Vec<&str> = m.foreach_attribute(&indexed).map(|r| r.name).collect();
    assert_eq!(names, vec!["c"]);
}

#[test]
fn duplicate_copies_data_under_a_new_id() {
    let mut m = triangle();
    let a = m
        .create_attribute::<i16>("a", AttributeElement::Vertex, AttributeUsage::Scalar, 1, &[1, 2, 3])
        .unwrap();
    let b = m.duplicate_attribute(&a, "b").unwrap();
    assert_ne!(a, b);
    m.ref_attribute::<i16, _>(&b).unwrap().set_row(0, &[9]).unwrap();
    assert_eq!(m.get_attribute::<i16, _>(&a).unwrap().get_all(), &[1, 2, 3]);
    assert_eq!(m.get_attribute::<i16, _>(&b).unwrap().get_all(), &[9, 2, 3]);
}

#[test]
fn condense_drops_unused_and_duplicate_values() {
    let mut m = grid(1, 1);
    m.create_indexed_attribute::<f32>(
        "uv",
        AttributeUsage::UV,
        2,
        &[0., 0., 1., 0., 0., 0., 5., 5., 1., 1.],
        &[0, 1, 4, 2, 4, 4],
    )
    .unwrap();
    let before: Vec<Vec<f32>> = {
        let uv = m.get_indexed_attribute::<f32, _>("uv").unwrap();
        (0..6).map(|c| uv.get(c).unwrap().to_vec()).collect()
    };
    m.condense_indexed_attribute("uv").unwrap();
    let uv = m.get_indexed_attribute::<f32, _>("uv").unwrap();
    assert_eq!(uv.num_values(), 3);
    for (c, row) in before.iter().enumerate() {
        assert_eq!(uv.get(c).unwrap(), &row[..]);
    }
}

#[test]
fn row_slice_repeats_rows() {
    let mut m = triangle();
    m.create_attribute::<f64>("p2", AttributeElement::Vertex, AttributeUsage::Vector, 2, &[0., 1., 2., 3., 4., 5.])
        .unwrap();
    let a = m.get_attribute::<f64, _>("p2").unwrap();
    let s = a.row_slice(&[2, 0, 2]).unwrap();
    assert_eq!(s.get_all(), &[4., 5., 0., 1., 4., 5.]);
    assert!(a.row_slice(&[3]).is_err());
}

proptest! {
    #[test]
    fn row_slice_takes_requested_rows(
        data in prop::collection::vec(-100i32..100, 3..60),
        picks in prop::collection::vec(0usize..1000, 0..40),
    ) {
        let rows = data.len() / 3;
        let values = &data[..rows * 3];
        let attr = Attribute::<i32>::from_data(
            AttributeElement::Value,
            AttributeUsage::Vector,
            3,
            values.to_vec(),
        ).unwrap();
        let picks: Vec<Index> = picks.iter().map(|p| (p % rows) as Index).collect();
        let out = attr.row_slice(&picks).unwrap();
        prop_assert_eq!(out.num_rows(), picks.len());
        for (i, &r) in picks.iter().enumerate() {
            prop_assert_eq!(out.get_row(i).unwrap(), attr.get_row(r as usize).unwrap());
        }
    }
}
