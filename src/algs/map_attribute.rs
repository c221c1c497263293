//! Conversion of an attribute between element kinds.
//!
//! Every conversion goes through corners: a per-vertex, per-facet or per-edge
//! value is first scattered to the corners that reference it, then corners are
//! gathered onto the target element with the configured collision policy
//! (floats average, integers keep the first corner).

use crate::algs::inverse_mapping::invert_mapping;
use crate::algs::mapping_policy::{CollisionPolicies, remap_rows};
use crate::data::attribute::{Attribute, AttributeElement};
use crate::data::attribute_store::{AttributeId, AttributeKey, is_reserved_name};
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::tagged::{AttributeVisitor, ErasedAttribute};
use crate::data::value_type::{AttributeValue, Index, RealValue};
use crate::mesh::SurfaceMesh;
use crate::mesh_error::MeshError;

/// Destination layout of [`map_attribute`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapTarget {
    /// Plain attribute attached to this element kind.
    Element(AttributeElement),
    /// Indexed attribute (values plus one index per corner).
    Indexed,
}

impl From<AttributeElement> for MapTarget {
    fn from(element: AttributeElement) -> Self {
        MapTarget::Element(element)
    }
}

/// Create `new_name` holding the attribute `key` converted to `target`.
///
/// - Vertex, facet or edge → corner: each corner copies its element's row.
/// - Corner → vertex, facet or edge: rows of the incident corners are
///   combined; elements without corners get default rows.
/// - Plain → indexed: the rows become the value buffer, indexed per corner
///   through the element it was attached to.
/// - Indexed → plain: expanded per corner first.
///
/// `Value` attributes cannot be converted, nor can anything become one.
pub fn map_attribute<S, K>(
    mesh: &mut SurfaceMesh<S>,
    key: &K,
    new_name: &str,
    target: impl Into<MapTarget>,
) -> Result<AttributeId, MeshError>
where
    S: RealValue,
    K: AttributeKey + ?Sized,
{
    let converted = convert(mesh, key, target.into())?;
    mesh.insert_attribute(new_name, converted)
}

/// Convert the attribute `key` to `target`, keeping its name and id.
pub fn map_attribute_in_place<S, K>(
    mesh: &mut SurfaceMesh<S>,
    key: &K,
    target: impl Into<MapTarget>,
) -> Result<AttributeId, MeshError>
where
    S: RealValue,
    K: AttributeKey + ?Sized,
{
    let id = key.resolve(mesh.attributes())?;
    let name = mesh.get_attribute_name(id)?;
    if is_reserved_name(name) {
        return Err(MeshError::ReservedAttribute(name.to_owned()));
    }
    let converted = convert(mesh, &id, target.into())?;
    mesh.attributes_mut().replace(id, converted)?;
    Ok(id)
}

fn convert<S, K>(mesh: &SurfaceMesh<S>, key: &K, target: MapTarget) -> Result<ErasedAttribute, MeshError>
where
    S: RealValue,
    K: AttributeKey + ?Sized,
{
    let id = key.resolve(mesh.attributes())?;
    let name = mesh.get_attribute_name(id)?;
    mesh.get_erased_attribute(&id)?.visit(&mut Convert {
        mesh,
        name,
        target,
        policies: CollisionPolicies::default(),
    })
}

struct Convert<'a, S: RealValue> {
    mesh: &'a SurfaceMesh<S>,
    name: &'a str,
    target: MapTarget,
    policies: CollisionPolicies,
}

impl<S: RealValue> Convert<'_, S> {
    /// For each corner, the row of `element` it reads from.
    fn corner_rows(&self, element: AttributeElement) -> Result<Vec<Index>, MeshError> {
        match element {
            AttributeElement::Vertex => Ok(self.mesh.corner_to_vertex().to_vec()),
            AttributeElement::Facet => Ok(self.mesh.corner_to_facet().to_vec()),
            AttributeElement::Corner => Ok((0..self.mesh.get_num_corners() as Index).collect()),
            AttributeElement::Edge => Ok(self.mesh.connectivity().corner_to_edge().to_vec()),
            AttributeElement::Value => Err(MeshError::UnsupportedElement {
                element,
                reason: "value attributes are not attached to mesh elements",
            }),
        }
    }

    /// Gather per-corner rows onto `element`.
    fn from_corners<T: AttributeValue>(
        &self,
        per_corner: &Attribute<T>,
        element: AttributeElement,
    ) -> Result<Attribute<T>, MeshError> {
        let mut out = if element == AttributeElement::Corner {
            per_corner.clone()
        } else {
            let rows = self.corner_rows(element)?;
            let count = self.mesh.num_elements(element).unwrap_or(0);
            let inv = invert_mapping(&rows, count)?;
            remap_rows(per_corner, self.name, &inv, self.policies.for_type(T::SCALAR_TYPE))?
        };
        out.set_element(element);
        Ok(out)
    }
}

impl<S: RealValue> AttributeVisitor for Convert<'_, S> {
    type Output = Result<ErasedAttribute, MeshError>;

    fn visit_plain<T: AttributeValue>(&mut self, attr: &Attribute<T>) -> Self::Output {
        let element = attr.element();
        if element == AttributeElement::Value {
            return Err(MeshError::UnsupportedElement {
                element,
                reason: "value attributes are not attached to mesh elements",
            });
        }
        match self.target {
            MapTarget::Element(e) if e == element => Ok(attr.clone().into()),
            MapTarget::Element(AttributeElement::Value) => Err(MeshError::UnsupportedElement {
                element: AttributeElement::Value,
                reason: "cannot convert to a value attribute",
            }),
            MapTarget::Element(e) => {
                let mut per_corner = attr.gather(&self.corner_rows(element)?)?;
                per_corner.set_element(AttributeElement::Corner);
                Ok(self.from_corners(&per_corner, e)?.into())
            }
            MapTarget::Indexed => {
                let indices = self.corner_rows(element)?;
                let mut out = IndexedAttribute::from_parts(
                    attr.usage(),
                    attr.num_channels(),
                    attr.get_all().to_vec(),
                    indices,
                )?;
                out.values_mut().set_default_value(attr.default_value());
                Ok(out.into())
            }
        }
    }

    fn visit_indexed<T: AttributeValue>(&mut self, attr: &IndexedAttribute<T>) -> Self::Output {
        match self.target {
            MapTarget::Indexed => Ok(attr.clone().into()),
            MapTarget::Element(AttributeElement::Value) => Err(MeshError::UnsupportedElement {
                element: AttributeElement::Value,
                reason: "cannot convert to a value attribute",
            }),
            MapTarget::Element(e) => Ok(self.from_corners(&attr.expand()?, e)?.into()),
        }
    }
}
