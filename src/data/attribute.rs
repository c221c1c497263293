//! Plain attributes: row-major typed columns with one row per element.
//!
//! An [`Attribute<T>`] stores `num_rows × num_channels` values of a single
//! [`AttributeValue`] type. The element kind and usage are metadata used by the
//! attribute store and the transfer algorithms; the column itself only knows
//! rows and channels.

use serde::{Deserialize, Serialize};

use crate::data::storage::{Storage, VecStorage};
use crate::data::value_type::{AttributeValue, INVALID_INDEX, Index, ScalarType};
use crate::mesh_error::MeshError;

/// Mesh element an attribute is attached to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AttributeElement {
    Vertex,
    Facet,
    Edge,
    Corner,
    /// Free-standing rows with no element binding (indexed value buffers, globals).
    Value,
}

impl AttributeElement {
    pub const ALL: [AttributeElement; 5] = [
        AttributeElement::Vertex,
        AttributeElement::Facet,
        AttributeElement::Edge,
        AttributeElement::Corner,
        AttributeElement::Value,
    ];
}

/// Semantic tag of an attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AttributeUsage {
    Vector,
    Scalar,
    Position,
    Normal,
    Tangent,
    Bitangent,
    Color,
    UV,
    /// Values are vertex indices, updated when vertices are reindexed.
    VertexIndex,
    /// Values are facet indices, updated when facets are reindexed.
    FacetIndex,
    /// Values are corner indices, updated when corners are reindexed.
    CornerIndex,
    /// Values are edge indices, updated when edges are rebuilt.
    EdgeIndex,
}

impl AttributeUsage {
    /// True for the four usages whose values reference other elements.
    pub fn is_index(self) -> bool {
        self.indexed_element().is_some()
    }

    /// Element referenced by the values of an index usage.
    pub fn indexed_element(self) -> Option<AttributeElement> {
        match self {
            AttributeUsage::VertexIndex => Some(AttributeElement::Vertex),
            AttributeUsage::FacetIndex => Some(AttributeElement::Facet),
            AttributeUsage::CornerIndex => Some(AttributeElement::Corner),
            AttributeUsage::EdgeIndex => Some(AttributeElement::Edge),
            _ => None,
        }
    }

    /// Usage whose values reference `element`, if any.
    pub fn index_of(element: AttributeElement) -> Option<AttributeUsage> {
        match element {
            AttributeElement::Vertex => Some(AttributeUsage::VertexIndex),
            AttributeElement::Facet => Some(AttributeUsage::FacetIndex),
            AttributeElement::Corner => Some(AttributeUsage::CornerIndex),
            AttributeElement::Edge => Some(AttributeUsage::EdgeIndex),
            AttributeElement::Value => None,
        }
    }
}

/// Storage mode of an attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum StorageMode {
    Plain,
    Indexed,
}

/// Check that `usage` is compatible with the channel count and value type.
///
/// `dimension` is the vertex dimension of the owning mesh.
pub fn check_usage(
    name: &str,
    usage: AttributeUsage,
    num_channels: usize,
    scalar_type: ScalarType,
    dimension: usize,
) -> Result<(), MeshError> {
    let fail = |reason: String| {
        Err(MeshError::InvalidUsage {
            name: name.to_owned(),
            usage,
            reason,
        })
    };
    match usage {
        AttributeUsage::Vector | AttributeUsage::Color => Ok(()),
        AttributeUsage::Scalar if num_channels != 1 => {
            fail(format!("needs 1 channel, got {num_channels}"))
        }
        AttributeUsage::Scalar => Ok(()),
        AttributeUsage::UV if num_channels != 2 => {
            fail(format!("needs 2 channels, got {num_channels}"))
        }
        AttributeUsage::UV => Ok(()),
        AttributeUsage::Position
        | AttributeUsage::Normal
        | AttributeUsage::Tangent
        | AttributeUsage::Bitangent => {
            if num_channels == dimension || num_channels == dimension + 1 {
                Ok(())
            } else {
                fail(format!(
                    "needs {dimension} or {} channels, got {num_channels}",
                    dimension + 1
                ))
            }
        }
        AttributeUsage::VertexIndex
        | AttributeUsage::FacetIndex
        | AttributeUsage::CornerIndex
        | AttributeUsage::EdgeIndex => {
            if num_channels != 1 {
                fail(format!("needs 1 channel, got {num_channels}"))
            } else if scalar_type != <Index as AttributeValue>::SCALAR_TYPE {
                fail(format!(
                    "needs value type {}, got {}",
                    <Index as AttributeValue>::SCALAR_TYPE.as_str(),
                    scalar_type.as_str()
                ))
            } else {
                Ok(())
            }
        }
    }
}

/// Typed, row-major attribute column.
///
/// Changing the row count of an attribute owned by a mesh (through
/// [`resize`](Self::resize) or [`insert_rows`](Self::insert_rows)) breaks the
/// row-count invariant; `validate_invariants` on the mesh reports it.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute<T: AttributeValue> {
    element: AttributeElement,
    usage: AttributeUsage,
    num_channels: usize,
    default_value: T,
    data: VecStorage<T>,
}

impl<T: AttributeValue> Attribute<T> {
    /// Empty attribute with zero rows.
    pub fn new(
        element: AttributeElement,
        usage: AttributeUsage,
        num_channels: usize,
    ) -> Result<Self, MeshError> {
        if num_channels == 0 {
            return Err(MeshError::InvalidChannelCount {
                channels: 0,
                len: 0,
            });
        }
        Ok(Self {
            element,
            usage,
            num_channels,
            default_value: T::default(),
            data: VecStorage::default(),
        })
    }

    /// Attribute wrapping an existing row-major buffer.
    pub fn from_data(
        element: AttributeElement,
        usage: AttributeUsage,
        num_channels: usize,
        data: Vec<T>,
    ) -> Result<Self, MeshError> {
        let mut attr = Self::new(element, usage, num_channels)?;
        if data.len() % num_channels != 0 {
            return Err(MeshError::InvalidChannelCount {
                channels: num_channels,
                len: data.len(),
            });
        }
        attr.data = data.into();
        Ok(attr)
    }

    /// Builder-style override of the value used for appended rows.
    pub fn with_default_value(mut self, value: T) -> Self {
        self.default_value = value;
        self
    }

    pub fn element(&self) -> AttributeElement {
        self.element
    }

    pub fn usage(&self) -> AttributeUsage {
        self.usage
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn default_value(&self) -> T {
        self.default_value
    }

    pub fn set_default_value(&mut self, value: T) {
        self.default_value = value;
    }

    pub fn num_rows(&self) -> usize {
        self.data.len() / self.num_channels
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entire buffer, row-major.
    pub fn get_all(&self) -> &[T] {
        self.data.as_slice()
    }

    /// Entire buffer, writable. The row count cannot change through this view.
    pub fn ref_all(&mut self) -> &mut [T] {
        self.data.as_mut_slice()
    }

    /// Overwrite every value. `values` must have the current length.
    pub fn set_all(&mut self, values: &[T]) -> Result<(), MeshError> {
        if values.len() != self.data.len() {
            return Err(MeshError::LengthMismatch {
                what: "attribute values",
                expected: self.data.len(),
                found: values.len(),
            });
        }
        self.data.write_at(0, values)
    }

    /// Row `i` as a slice of `num_channels` values.
    pub fn get_row(&self, i: usize) -> Result<&[T], MeshError> {
        let nc = self.num_channels;
        let rows = self.num_rows();
        self.data
            .as_slice()
            .get(i * nc..(i + 1) * nc)
            .ok_or_else(|| MeshError::out_of_range("attribute row", i, rows))
    }

    /// Writable row `i`.
    pub fn ref_row(&mut self, i: usize) -> Result<&mut [T], MeshError> {
        let nc = self.num_channels;
        let rows = self.num_rows();
        self.data
            .as_mut_slice()
            .get_mut(i * nc..(i + 1) * nc)
            .ok_or_else(|| MeshError::out_of_range("attribute row", i, rows))
    }

    /// Single value at (`row`, `channel`).
    pub fn get(&self, row: usize, channel: usize) -> Result<T, MeshError> {
        if channel >= self.num_channels {
            return Err(MeshError::out_of_range(
                "attribute channel",
                channel,
                self.num_channels,
            ));
        }
        Ok(self.get_row(row)?[channel])
    }

    /// Overwrite row `i`.
    pub fn set_row(&mut self, i: usize, values: &[T]) -> Result<(), MeshError> {
        if values.len() != self.num_channels {
            return Err(MeshError::LengthMismatch {
                what: "attribute row",
                expected: self.num_channels,
                found: values.len(),
            });
        }
        self.ref_row(i)?.copy_from_slice(values);
        Ok(())
    }

    /// Iterator over rows.
    pub fn rows(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.as_slice().chunks_exact(self.num_channels)
    }

    /// Append `n` rows filled with the default value.
    pub fn insert_rows(&mut self, n: usize) {
        let len = self.data.len() + n * self.num_channels;
        self.data.resize(len, self.default_value);
    }

    /// Append whole rows from a row-major buffer.
    pub fn insert_rows_from(&mut self, values: &[T]) -> Result<(), MeshError> {
        if values.len() % self.num_channels != 0 {
            return Err(MeshError::InvalidChannelCount {
                channels: self.num_channels,
                len: values.len(),
            });
        }
        self.data.extend_from_slice(values);
        Ok(())
    }

    /// Truncate or default-extend to `num_rows` rows.
    pub fn resize(&mut self, num_rows: usize) {
        self.data
            .resize(num_rows * self.num_channels, self.default_value);
    }

    /// New attribute whose row `i` is this attribute's row `rows[i]`.
    ///
    /// `rows` may repeat or reorder entries. Every entry must be in range.
    pub fn row_slice(&self, rows: &[Index]) -> Result<Self, MeshError> {
        let n = self.num_rows();
        let mut out = Vec::with_capacity(rows.len() * self.num_channels);
        for &r in rows {
            let r = r as usize;
            if r >= n {
                return Err(MeshError::out_of_range("row slice", r, n));
            }
            out.extend_from_slice(&self.data.as_slice()[r * self.num_channels..(r + 1) * self.num_channels]);
        }
        Ok(self.with_data(out))
    }

    /// Like [`row_slice`](Self::row_slice), but [`INVALID_INDEX`] entries
    /// produce default rows.
    pub fn gather(&self, rows: &[Index]) -> Result<Self, MeshError> {
        let n = self.num_rows();
        let nc = self.num_channels;
        let mut out = Vec::with_capacity(rows.len() * nc);
        for &r in rows {
            if r == INVALID_INDEX {
                out.extend(std::iter::repeat_n(self.default_value, nc));
                continue;
            }
            let r = r as usize;
            if r >= n {
                return Err(MeshError::out_of_range("row gather", r, n));
            }
            out.extend_from_slice(&self.data.as_slice()[r * nc..(r + 1) * nc]);
        }
        Ok(self.with_data(out))
    }

    /// Raw bytes of the buffer, for I/O consumers.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.data.as_slice())
    }

    /// Release unused capacity.
    pub fn shrink_to_fit(&mut self) {
        self.data.shrink_to_fit();
    }

    /// Same metadata, new buffer.
    pub(crate) fn with_data(&self, data: Vec<T>) -> Self {
        Self {
            element: self.element,
            usage: self.usage,
            num_channels: self.num_channels,
            default_value: self.default_value,
            data: data.into(),
        }
    }

    pub(crate) fn set_element(&mut self, element: AttributeElement) {
        self.element = element;
    }
}
