//! Indexed attributes: per-corner indices into a shared value buffer.
//!
//! `value(corner) = values[indices[corner]]`. The value buffer has its own row
//! count; the index buffer always has one row per corner. Unset corners hold
//! [`INVALID_INDEX`].

use hashbrown::HashMap;

use crate::data::attribute::{Attribute, AttributeElement, AttributeUsage};
use crate::data::value_type::{AttributeValue, INVALID_INDEX, Index};
use crate::mesh_error::MeshError;

/// Typed indexed attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedAttribute<T: AttributeValue> {
    usage: AttributeUsage,
    values: Attribute<T>,
    indices: Attribute<Index>,
}

impl<T: AttributeValue> IndexedAttribute<T> {
    /// Empty value buffer and `num_corners` unset indices.
    pub fn new(
        usage: AttributeUsage,
        num_channels: usize,
        num_corners: usize,
    ) -> Result<Self, MeshError> {
        let values = Attribute::new(AttributeElement::Value, usage, num_channels)?;
        let mut indices = Attribute::new(AttributeElement::Corner, AttributeUsage::Scalar, 1)?
            .with_default_value(INVALID_INDEX);
        indices.resize(num_corners);
        Ok(Self {
            usage,
            values,
            indices,
        })
    }

    /// Build from a value buffer and one index per corner.
    pub fn from_parts(
        usage: AttributeUsage,
        num_channels: usize,
        values: Vec<T>,
        indices: Vec<Index>,
    ) -> Result<Self, MeshError> {
        let values = Attribute::from_data(AttributeElement::Value, usage, num_channels, values)?;
        let indices =
            Attribute::from_data(AttributeElement::Corner, AttributeUsage::Scalar, 1, indices)?
                .with_default_value(INVALID_INDEX);
        let attr = Self {
            usage,
            values,
            indices,
        };
        attr.check_indices()?;
        Ok(attr)
    }

    pub fn usage(&self) -> AttributeUsage {
        self.usage
    }

    pub fn num_channels(&self) -> usize {
        self.values.num_channels()
    }

    pub fn num_values(&self) -> usize {
        self.values.num_rows()
    }

    pub fn num_corners(&self) -> usize {
        self.indices.num_rows()
    }

    pub fn values(&self) -> &Attribute<T> {
        &self.values
    }

    /// Writable value buffer. Indices are not touched.
    pub fn values_mut(&mut self) -> &mut Attribute<T> {
        &mut self.values
    }

    pub fn indices(&self) -> &Attribute<Index> {
        &self.indices
    }

    /// Index stored for `corner`; may be [`INVALID_INDEX`].
    pub fn value_index(&self, corner: usize) -> Result<Index, MeshError> {
        self.indices.get(corner, 0)
    }

    /// Value row seen by `corner`.
    pub fn get(&self, corner: usize) -> Result<&[T], MeshError> {
        let idx = self.value_index(corner)?;
        if idx == INVALID_INDEX {
            return Err(MeshError::out_of_range(
                "unset indexed value",
                corner,
                self.num_corners(),
            ));
        }
        self.values.get_row(idx as usize)
    }

    /// Point `corner` at value row `value` ([`INVALID_INDEX`] unsets it).
    pub fn set_index(&mut self, corner: usize, value: Index) -> Result<(), MeshError> {
        if value != INVALID_INDEX && value as usize >= self.num_values() {
            return Err(MeshError::out_of_range(
                "indexed value",
                value as usize,
                self.num_values(),
            ));
        }
        self.indices.set_row(corner, &[value])
    }

    /// Replace every corner index at once.
    pub fn set_indices(&mut self, indices: &[Index]) -> Result<(), MeshError> {
        let n = self.num_values();
        if let Some(&bad) = indices
            .iter()
            .find(|&&i| i != INVALID_INDEX && i as usize >= n)
        {
            return Err(MeshError::out_of_range("indexed value", bad as usize, n));
        }
        self.indices.set_all(indices)
    }

    /// Append one value row and return its index.
    pub fn add_value(&mut self, row: &[T]) -> Result<Index, MeshError> {
        if row.len() != self.num_channels() {
            return Err(MeshError::LengthMismatch {
                what: "indexed value row",
                expected: self.num_channels(),
                found: row.len(),
            });
        }
        let idx = self.num_values() as Index;
        self.values.insert_rows_from(row)?;
        Ok(idx)
    }

    /// Deduplicate value rows and drop rows no corner references.
    ///
    /// Surviving rows are ordered by first reference in corner order. Rows are
    /// compared bitwise, so `-0.0` and `0.0` stay distinct. Returns the number
    /// of value rows removed. An out-of-range index fails before anything is
    /// rewritten.
    pub fn condense(&mut self) -> Result<usize, MeshError> {
        self.check_indices()?;
        let nc = self.num_channels();
        let num_values = self.num_values();
        let mut old_to_new = vec![INVALID_INDEX; num_values];
        let mut lookup: HashMap<Vec<u64>, Index> = HashMap::new();
        let mut new_values: Vec<T> = Vec::new();

        for slot in self.indices.ref_all() {
            let old = *slot;
            if old == INVALID_INDEX {
                continue;
            }
            if old_to_new[old as usize] == INVALID_INDEX {
                let row = self.values.get_row(old as usize)?;
                let key: Vec<u64> = row.iter().map(|v| v.key_bits()).collect();
                let next = (new_values.len() / nc) as Index;
                let id = *lookup.entry(key).or_insert_with(|| {
                    new_values.extend_from_slice(row);
                    next
                });
                old_to_new[old as usize] = id;
            }
            *slot = old_to_new[old as usize];
        }

        let removed = num_values - new_values.len() / nc;
        self.values = self.values.with_data(new_values);
        Ok(removed)
    }

    /// Expand to a plain per-corner attribute. Unset corners get default rows.
    pub fn expand(&self) -> Result<Attribute<T>, MeshError> {
        let mut out = self.values.gather(self.indices.get_all())?;
        out.set_element(AttributeElement::Corner);
        Ok(out)
    }

    /// Check that every index is in range or unset.
    pub fn check_indices(&self) -> Result<(), MeshError> {
        let n = self.num_values();
        match self
            .indices
            .get_all()
            .iter()
            .find(|&&i| i != INVALID_INDEX && i as usize >= n)
        {
            Some(&bad) => Err(MeshError::out_of_range("indexed value", bad as usize, n)),
            None => Ok(()),
        }
    }

    pub(crate) fn indices_mut(&mut self) -> &mut Attribute<Index> {
        &mut self.indices
    }

    pub(crate) fn replace_indices(&mut self, indices: Attribute<Index>) {
        self.indices = indices;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uv() -> IndexedAttribute<f32> {
        // Six corners sharing three distinct UVs, with two duplicate value rows.
        IndexedAttribute::from_parts(
            AttributeUsage::UV,
            2,
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.5, 0.5],
            vec![0, 1, 4, 2, 3, 4],
        )
        .unwrap()
    }

    #[test]
    fn lookup_through_indices() {
        let a = uv();
        assert_eq!(a.num_corners(), 6);
        assert_eq!(a.get(2).unwrap(), &[0.5, 0.5]);
        assert_eq!(a.get(4).unwrap(), &[1.0, 0.0]);
    }

    #[test]
    fn new_starts_unset() {
        let a = IndexedAttribute::<f64>::new(AttributeUsage::Normal, 3, 4).unwrap();
        assert_eq!(a.num_values(), 0);
        assert!(a.indices().get_all().iter().all(|&i| i == INVALID_INDEX));
        assert!(a.get(0).is_err());
    }

    #[test]
    fn out_of_range_indices_rejected() {
        let err =
            IndexedAttribute::<u8>::from_parts(AttributeUsage::Vector, 1, vec![1], vec![0, 1]);
        assert!(err.is_err());
        let mut a = uv();
        assert!(a.set_index(0, 9).is_err());
        a.set_index(0, INVALID_INDEX).unwrap();
    }

    #[test]
    fn condense_merges_duplicates_and_keeps_lookup() {
        let mut a = uv();
        let before: Vec<Vec<f32>> = (0..6).map(|c| a.get(c).unwrap().to_vec()).collect();
        let removed = a.condense().unwrap();
        assert_eq!(removed, 2);
        assert_eq!(a.num_values(), 3);
        assert_eq!(a.indices().get_all(), &[0, 1, 2, 0, 1, 2]);
        for (c, row) in before.iter().enumerate() {
            assert_eq!(a.get(c).unwrap(), row.as_slice());
        }
    }

    #[test]
    fn condense_drops_unreferenced() {
        let mut a = IndexedAttribute::from_parts(
            AttributeUsage::Scalar,
            1,
            vec![7i32, 8, 9],
            vec![2, INVALID_INDEX, 2],
        )
        .unwrap();
        assert_eq!(a.condense().unwrap(), 2);
        assert_eq!(a.values().get_all(), &[9]);
        assert_eq!(a.indices().get_all(), &[0, INVALID_INDEX, 0]);
    }

    #[test]
    fn condense_leaves_indices_alone_when_one_is_out_of_range() {
        let mut a = IndexedAttribute::from_parts(
            AttributeUsage::Scalar,
            1,
            vec![5i32, 5, 6, 7],
            vec![1, 1, 2, 0, 3, 3],
        )
        .unwrap();
        a.values_mut().resize(3);
        assert_eq!(
            a.condense().unwrap_err(),
            MeshError::out_of_range("indexed value", 3, 3)
        );
        assert_eq!(a.indices().get_all(), &[1, 1, 2, 0, 3, 3]);
        assert_eq!(a.values().get_all(), &[5, 5, 6]);
    }

    #[test]
    fn expand_per_corner() {
        let mut a = uv();
        a.set_index(5, INVALID_INDEX).unwrap();
        let e = a.expand().unwrap();
        assert_eq!(e.element(), AttributeElement::Corner);
        assert_eq!(e.num_rows(), 6);
        assert_eq!(e.get_row(1).unwrap(), &[1.0, 0.0]);
        assert_eq!(e.get_row(5).unwrap(), &[0.0, 0.0]);
    }
}
