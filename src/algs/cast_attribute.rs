//! Conversion of an attribute to another value type.

use std::marker::PhantomData;

use crate::data::attribute::{Attribute, check_usage};
use crate::data::attribute_store::{AttributeId, AttributeKey, is_reserved_name};
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::tagged::{AttributeVisitor, ErasedAttribute};
use crate::data::value_type::{AttributeValue, RealValue};
use crate::mesh::SurfaceMesh;
use crate::mesh_error::MeshError;
use crate::sink_warn;

/// Create `new_name` holding the attribute `key` with values converted to `T`.
///
/// Element, usage, channel count and (for indexed attributes) the index buffer
/// are kept. Conversion is numeric: floats are truncated toward zero when cast
/// to integers, and a value outside the range of `T` fails with
/// [`MeshError::ValueOutOfRange`]. Index usages only accept [`Index`] values.
/// Casting to the type already stored makes a plain copy.
///
/// [`Index`]: crate::data::value_type::Index
pub fn cast_attribute<T, S, K>(
    mesh: &mut SurfaceMesh<S>,
    key: &K,
    new_name: &str,
) -> Result<AttributeId, MeshError>
where
    T: AttributeValue,
    S: RealValue,
    K: AttributeKey + ?Sized,
{
    let id = key.resolve(mesh.attributes())?;
    if mesh.get_erased_attribute(&id)?.scalar_type() == T::SCALAR_TYPE {
        sink_warn!(
            mesh.log_sink(),
            "`{}` already stores {}, copying it",
            mesh.get_attribute_name(id)?,
            T::SCALAR_TYPE.as_str()
        );
        return mesh.duplicate_attribute(&id, new_name);
    }
    let converted = convert::<T, S>(mesh, id)?;
    mesh.insert_attribute(new_name, converted)
}

/// Convert the values of `key` to `T`, keeping its name and id.
pub fn cast_attribute_in_place<T, S, K>(
    mesh: &mut SurfaceMesh<S>,
    key: &K,
) -> Result<AttributeId, MeshError>
where
    T: AttributeValue,
    S: RealValue,
    K: AttributeKey + ?Sized,
{
    let id = key.resolve(mesh.attributes())?;
    let name = mesh.get_attribute_name(id)?;
    if is_reserved_name(name) {
        return Err(MeshError::ReservedAttribute(name.to_owned()));
    }
    if mesh.get_erased_attribute(&id)?.scalar_type() == T::SCALAR_TYPE {
        sink_warn!(mesh.log_sink(), "`{name}` already stores {}", T::SCALAR_TYPE.as_str());
        return Ok(id);
    }
    let converted = convert::<T, S>(mesh, id)?;
    mesh.attributes_mut().replace(id, converted)?;
    Ok(id)
}

fn convert<T: AttributeValue, S: RealValue>(
    mesh: &SurfaceMesh<S>,
    id: AttributeId,
) -> Result<ErasedAttribute, MeshError> {
    let name = mesh.get_attribute_name(id)?;
    let attr = mesh.get_erased_attribute(&id)?;
    check_usage(
        name,
        attr.usage(),
        attr.num_channels(),
        T::SCALAR_TYPE,
        mesh.get_dimension(),
    )?;
    attr.visit(&mut Cast::<T> {
        name,
        target: PhantomData,
    })
}

struct Cast<'a, T> {
    name: &'a str,
    target: PhantomData<T>,
}

impl<T: AttributeValue> Cast<'_, T> {
    fn column<U: AttributeValue>(&self, attr: &Attribute<U>) -> Result<Attribute<T>, MeshError> {
        let data = attr
            .get_all()
            .iter()
            .map(|&v| self.value(v))
            .collect::<Result<Vec<T>, _>>()?;
        let mut out = Attribute::from_data(attr.element(), attr.usage(), attr.num_channels(), data)?;
        if let Some(d) = num_traits::cast::<U, T>(attr.default_value()) {
            out.set_default_value(d);
        }
        Ok(out)
    }

    fn value<U: AttributeValue>(&self, v: U) -> Result<T, MeshError> {
        num_traits::cast::<U, T>(v).ok_or_else(|| MeshError::ValueOutOfRange {
            name: self.name.to_owned(),
            value: format!("{v:?}"),
            target: T::SCALAR_TYPE,
        })
    }
}

impl<T: AttributeValue> AttributeVisitor for Cast<'_, T> {
    type Output = Result<ErasedAttribute, MeshError>;

    fn visit_plain<U: AttributeValue>(&mut self, attr: &Attribute<U>) -> Self::Output {
        Ok(self.column(attr)?.into())
    }

    fn visit_indexed<U: AttributeValue>(&mut self, attr: &IndexedAttribute<U>) -> Self::Output {
        let values = self.column(attr.values())?;
        let mut out = IndexedAttribute::from_parts(
            attr.usage(),
            attr.num_channels(),
            values.get_all().to_vec(),
            attr.indices().get_all().to_vec(),
        )?;
        out.values_mut().set_default_value(values.default_value());
        Ok(out.into())
    }
}
