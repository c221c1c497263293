//! Collision policies for row transfer.
//!
//! Every transfer routine funnels through [`remap_rows`]: given an
//! [`InverseMapping`], target row `t` is built from the source rows listed for
//! `t`. How several sources combine is decided by a [`MappingPolicy`], chosen
//! per value-type family.

use serde::{Deserialize, Serialize};

use crate::algs::inverse_mapping::InverseMapping;
use crate::data::attribute::{Attribute, AttributeElement};
use crate::data::attribute_store::{AttributeId, AttributeRef};
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::tagged::{AttributeVisitor, ErasedAttribute};
use crate::data::value_type::{AttributeValue, INVALID_INDEX, ScalarType};
use crate::mesh_error::MeshError;

/// How to resolve several source rows landing on one target row.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MappingPolicy {
    /// Arithmetic mean, channel by channel.
    Average,
    /// Row of the lowest-index source.
    KeepFirst,
    /// Fail with [`MeshError::MappingCollision`].
    Error,
}

/// Policy pair keyed by value-type family.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CollisionPolicies {
    pub float: MappingPolicy,
    pub integral: MappingPolicy,
}

impl Default for CollisionPolicies {
    fn default() -> Self {
        Self {
            float: MappingPolicy::Average,
            integral: MappingPolicy::KeepFirst,
        }
    }
}

impl CollisionPolicies {
    /// Same policy for both families.
    pub fn uniform(policy: MappingPolicy) -> Self {
        Self {
            float: policy,
            integral: policy,
        }
    }

    pub fn for_type(&self, t: ScalarType) -> MappingPolicy {
        if t.is_float() { self.float } else { self.integral }
    }
}

/// Build one row per target of `inv` from the rows of `attr`.
///
/// Targets without sources get default rows. `name` is only used in errors.
/// Averaging an attribute whose usage holds element indices fails up front.
pub fn remap_rows<T: AttributeValue>(
    attr: &Attribute<T>,
    name: &str,
    inv: &InverseMapping,
    policy: MappingPolicy,
) -> Result<Attribute<T>, MeshError> {
    if policy == MappingPolicy::Average && attr.usage().is_index() {
        return Err(MeshError::CannotAverageIndices(name.to_owned()));
    }
    let nc = attr.num_channels();
    let n = attr.num_rows();
    let src = attr.get_all();
    let mut out = Vec::with_capacity(inv.num_targets() * nc);
    let mut acc = vec![0.0f64; nc];

    for t in 0..inv.num_targets() {
        let sources = inv.sources(t);
        let mut valid = sources.iter().copied().filter(|&s| s != INVALID_INDEX);
        if let Some(&bad) = sources
            .iter()
            .find(|&&s| s != INVALID_INDEX && s as usize >= n)
        {
            return Err(MeshError::out_of_range("mapping source", bad as usize, n));
        }
        let count = sources.iter().filter(|&&s| s != INVALID_INDEX).count();
        let Some(first) = valid.next() else {
            out.extend(std::iter::repeat_n(attr.default_value(), nc));
            continue;
        };
        let row = |s: u32| &src[s as usize * nc..(s as usize + 1) * nc];
        match policy {
            _ if count == 1 => out.extend_from_slice(row(first)),
            MappingPolicy::KeepFirst => out.extend_from_slice(row(first)),
            MappingPolicy::Error => {
                return Err(MeshError::MappingCollision {
                    element: attr.element(),
                    target: t,
                    count,
                });
            }
            MappingPolicy::Average => {
                acc.iter_mut()
                    .zip(row(first))
                    .for_each(|(a, v)| *a = v.to_f64_lossy());
                for s in valid {
                    acc.iter_mut()
                        .zip(row(s))
                        .for_each(|(a, v)| *a += v.to_f64_lossy());
                }
                out.extend(acc.iter().map(|&a| T::from_f64(a / count as f64)));
            }
        }
    }
    Ok(attr.with_data(out))
}

/// Remap a type-erased plain attribute, picking the policy from its value type.
pub(crate) struct RemapVisitor<'a> {
    pub name: &'a str,
    pub inv: &'a InverseMapping,
    pub policies: CollisionPolicies,
    pub element: Option<AttributeElement>,
}

impl AttributeVisitor for RemapVisitor<'_> {
    type Output = Result<ErasedAttribute, MeshError>;

    fn visit_plain<T: AttributeValue>(&mut self, attr: &Attribute<T>) -> Self::Output {
        let mut out = remap_rows(attr, self.name, self.inv, self.policies.for_type(T::SCALAR_TYPE))?;
        if let Some(e) = self.element {
            out.set_element(e);
        }
        Ok(out.into())
    }

    fn visit_indexed<T: AttributeValue>(&mut self, attr: &IndexedAttribute<T>) -> Self::Output {
        // Corner indices: each target corner takes the first source corner's index.
        let mut out = attr.clone();
        let indices = attr.indices().gather(&self.inv.first_sources())?;
        out.replace_indices(indices);
        Ok(out.into())
    }
}

/// Run `f` over `items`, in parallel with the `rayon` feature, and collect
/// the replacements.
pub(crate) fn map_each<'a, F>(
    items: &[AttributeRef<'a>],
    f: F,
) -> Result<Vec<(AttributeId, ErasedAttribute)>, MeshError>
where
    F: Fn(&AttributeRef<'a>) -> Result<ErasedAttribute, MeshError> + Send + Sync,
{
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        items
            .par_iter()
            .map(|r| f(r).map(|a| (r.id, a)))
            .collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        items.iter().map(|r| f(r).map(|a| (r.id, a))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::inverse_mapping::invert_mapping;
    use crate::data::attribute::AttributeUsage;

    fn values(v: Vec<f64>) -> Attribute<f64> {
        Attribute::from_data(AttributeElement::Vertex, AttributeUsage::Scalar, 1, v).unwrap()
    }

    #[test]
    fn average_and_keep_first() {
        let a = values(vec![2.0, 4.0, 7.0]);
        let inv = invert_mapping(&[0, 0, 1], 2).unwrap();
        let avg = remap_rows(&a, "a", &inv, MappingPolicy::Average).unwrap();
        assert_eq!(avg.get_all(), &[3.0, 7.0]);
        let first = remap_rows(&a, "a", &inv, MappingPolicy::KeepFirst).unwrap();
        assert_eq!(first.get_all(), &[2.0, 7.0]);
    }

    #[test]
    fn error_policy_reports_collision() {
        let a = values(vec![2.0, 4.0]);
        let inv = invert_mapping(&[0, 0], 1).unwrap();
        let err = remap_rows(&a, "a", &inv, MappingPolicy::Error).unwrap_err();
        assert_eq!(
            err,
            MeshError::MappingCollision {
                element: AttributeElement::Vertex,
                target: 0,
                count: 2
            }
        );
        let ok = invert_mapping(&[1, 0], 2).unwrap();
        assert_eq!(
            remap_rows(&a, "a", &ok, MappingPolicy::Error).unwrap().get_all(),
            &[4.0, 2.0]
        );
    }

    #[test]
    fn index_usage_cannot_be_averaged() {
        let a = Attribute::from_data(
            AttributeElement::Facet,
            AttributeUsage::VertexIndex,
            1,
            vec![0u32, 1],
        )
        .unwrap();
        let inv = invert_mapping(&[0, 1], 2).unwrap();
        assert_eq!(
            remap_rows(&a, "idx", &inv, MappingPolicy::Average).unwrap_err(),
            MeshError::CannotAverageIndices("idx".into())
        );
    }

    #[test]
    fn integer_average_truncates_and_empty_targets_default() {
        let a = Attribute::from_data(AttributeElement::Vertex, AttributeUsage::Vector, 2, vec![1i32, 10, 2, 11])
            .unwrap()
            .with_default_value(-1);
        let inv = invert_mapping(&[0, 0], 2).unwrap();
        let out = remap_rows(&a, "a", &inv, MappingPolicy::Average).unwrap();
        assert_eq!(out.get_all(), &[1, 10, -1, -1]);
    }

    #[test]
    fn default_policies_by_family() {
        let p = CollisionPolicies::default();
        assert_eq!(p.for_type(ScalarType::F32), MappingPolicy::Average);
        assert_eq!(p.for_type(ScalarType::U8), MappingPolicy::KeepFirst);
        assert_eq!(CollisionPolicies::uniform(MappingPolicy::Error).float, MappingPolicy::Error);
    }
}
