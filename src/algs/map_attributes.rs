//! Backward attribute transfer between two meshes.
//!
//! A backward mapping has one entry per *target* element naming the source
//! element it comes from. With an offsets array, target `t` gathers several
//! sources `data[offsets[t]..offsets[t + 1]]`, which are combined with the
//! configured [`CollisionPolicies`].

use serde::{Deserialize, Serialize};

use crate::algs::inverse_mapping::InverseMapping;
use crate::algs::mapping_policy::{CollisionPolicies, RemapVisitor, map_each};
use crate::data::attribute::AttributeElement;
use crate::data::attribute_store::{AttributeFilter, AttributeRef};
use crate::data::tagged::ErasedAttribute;
use crate::data::value_type::{Index, RealValue};
use crate::debug_invariants::DebugInvariants;
use crate::mesh::SurfaceMesh;
use crate::mesh_error::MeshError;
use crate::{sink_debug, sink_warn};

/// Options for [`map_attributes`].
///
/// A mapping left as `None` defaults to the identity when source and target
/// have the same number of elements of that kind; otherwise attributes of
/// that kind are not transferred.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapAttributesOptions {
    pub source_vertices: Option<Vec<Index>>,
    pub source_vertex_offsets: Option<Vec<Index>>,
    pub source_facets: Option<Vec<Index>>,
    pub source_facet_offsets: Option<Vec<Index>>,
    pub source_corners: Option<Vec<Index>>,
    pub source_corner_offsets: Option<Vec<Index>>,
    /// Which source attributes to transfer. Reserved attributes never are.
    pub filter: AttributeFilter,
    pub policies: CollisionPolicies,
}

/// Per-element inverse mappings resolved against a source/target pair.
pub(crate) struct ElementMappings {
    pub vertex: Option<InverseMapping>,
    pub facet: Option<InverseMapping>,
    pub corner: Option<InverseMapping>,
}

impl ElementMappings {
    pub(crate) fn get(&self, element: AttributeElement) -> Option<&InverseMapping> {
        match element {
            AttributeElement::Vertex => self.vertex.as_ref(),
            AttributeElement::Facet => self.facet.as_ref(),
            AttributeElement::Corner => self.corner.as_ref(),
            AttributeElement::Edge | AttributeElement::Value => None,
        }
    }
}

fn resolve(
    what: &'static str,
    data: &Option<Vec<Index>>,
    offsets: &Option<Vec<Index>>,
    num_sources: usize,
    num_targets: usize,
) -> Result<Option<InverseMapping>, MeshError> {
    match data {
        Some(d) => {
            let inv = InverseMapping::from_backward(d.clone(), offsets.clone())?;
            if inv.num_targets() != num_targets {
                return Err(MeshError::LengthMismatch {
                    what,
                    expected: num_targets,
                    found: inv.num_targets(),
                });
            }
            Ok(Some(inv))
        }
        None if num_sources == num_targets => Ok(Some(InverseMapping::identity(num_targets))),
        None => Ok(None),
    }
}

/// Transfer the attributes of `source` selected by `options.filter` onto
/// `target` through backward mappings.
///
/// Target attributes with the same name are replaced. `Value` attributes are
/// copied verbatim. Edge attributes and attributes holding element indices
/// are skipped, since their values cannot be translated through a row
/// mapping; indexed attributes follow the corner mapping and keep their value
/// buffer.
pub fn map_attributes<S: RealValue>(
    source: &SurfaceMesh<S>,
    target: &mut SurfaceMesh<S>,
    options: &MapAttributesOptions,
) -> Result<(), MeshError> {
    let mappings = ElementMappings {
        vertex: resolve(
            "vertex mapping",
            &options.source_vertices,
            &options.source_vertex_offsets,
            source.get_num_vertices(),
            target.get_num_vertices(),
        )?,
        facet: resolve(
            "facet mapping",
            &options.source_facets,
            &options.source_facet_offsets,
            source.get_num_facets(),
            target.get_num_facets(),
        )?,
        corner: resolve(
            "corner mapping",
            &options.source_corners,
            &options.source_corner_offsets,
            source.get_num_corners(),
            target.get_num_corners(),
        )?,
    };
    let updates = transfer_attributes(source, &mappings, &options.filter, options.policies)?;
    for (name, attr) in updates {
        match target.attributes().id(&name) {
            Ok(id) => {
                target.attributes_mut().replace(id, attr)?;
            }
            Err(_) => {
                target.insert_attribute(&name, attr)?;
            }
        }
    }
    crate::debug_invariants!(target.validate_invariants(), "map_attributes");
    Ok(())
}

/// Compute the transferred copies of the selected attributes of `source`.
///
/// Returns `(name, attribute)` pairs in source id order. Nothing is written.
pub(crate) fn transfer_attributes<S: RealValue>(
    source: &SurfaceMesh<S>,
    mappings: &ElementMappings,
    filter: &AttributeFilter,
    policies: CollisionPolicies,
) -> Result<Vec<(String, ErasedAttribute)>, MeshError> {
    let sink = source.log_sink();
    let mut filter = filter.clone();
    filter.include_reserved = false;

    let items: Vec<AttributeRef<'_>> = source
        .foreach_attribute(&filter)
        .filter(|r| {
            let element = r.attr.element();
            if r.attr.usage().is_index() {
                sink_debug!(sink, "skipping index attribute `{}`", r.name);
                return false;
            }
            match element {
                AttributeElement::Value => true,
                AttributeElement::Edge => {
                    sink_debug!(sink, "skipping edge attribute `{}`", r.name);
                    false
                }
                e if mappings.get(e).is_none() => {
                    sink_warn!(
                        sink,
                        "no {e:?} mapping for attribute `{}`, element counts differ",
                        r.name
                    );
                    false
                }
                _ => true,
            }
        })
        .collect();

    let mapped = map_each(&items, |r| match mappings.get(r.attr.element()) {
        Some(inv) => r.attr.visit(&mut RemapVisitor {
            name: r.name,
            inv,
            policies,
            element: None,
        }),
        None => Ok(r.attr.clone()),
    })?;

    mapped
        .into_iter()
        .map(|(id, attr)| Ok((source.get_attribute_name(id)?.to_owned(), attr)))
        .collect()
}
