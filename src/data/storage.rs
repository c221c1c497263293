//! Pluggable storage for attribute buffers.
//!
//! This trait abstracts how an attribute's flat, row-major buffer is stored.
//! Only a `Vec` backend exists today; the slice-based interface keeps the door
//! open for mapped or externally owned buffers without touching `Attribute`.

use core::fmt::{self, Debug};

use crate::mesh_error::MeshError;

/// Contiguous, indexable storage for `V` with slice access.
pub trait Storage<V>: Debug {
    /// Current length in elements.
    fn len(&self) -> usize;

    /// True when the buffer holds no element.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize to `new_len`, filling new cells with `fill`.
    fn resize(&mut self, new_len: usize, fill: V)
    where
        V: Clone;

    /// Append `src` at the end of the buffer.
    fn extend_from_slice(&mut self, src: &[V])
    where
        V: Clone;

    /// Entire read-only buffer.
    fn as_slice(&self) -> &[V];

    /// Entire mutable buffer.
    fn as_mut_slice(&mut self) -> &mut [V];

    /// Copy `src` into the range `[offset .. offset + src.len())`.
    fn write_at(&mut self, offset: usize, src: &[V]) -> Result<(), MeshError>
    where
        V: Clone,
    {
        let len = self.len();
        let end = offset
            .checked_add(src.len())
            .ok_or_else(|| MeshError::out_of_range("storage offset", offset, len))?;
        let dst = self
            .as_mut_slice()
            .get_mut(offset..end)
            .ok_or_else(|| MeshError::out_of_range("storage offset", end, len))?;
        dst.clone_from_slice(src);
        Ok(())
    }
}

/// `Vec`-backed storage (default).
#[derive(Clone, Default, PartialEq)]
pub struct VecStorage<V>(pub(crate) Vec<V>);

impl<V> Debug for VecStorage<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VecStorage")
            .field("len", &self.0.len())
            .finish()
    }
}

impl<V> Storage<V> for VecStorage<V> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn resize(&mut self, new_len: usize, fill: V)
    where
        V: Clone,
    {
        self.0.resize(new_len, fill);
    }

    fn extend_from_slice(&mut self, src: &[V])
    where
        V: Clone,
    {
        self.0.extend_from_slice(src);
    }

    fn as_slice(&self) -> &[V] {
        &self.0
    }

    fn as_mut_slice(&mut self) -> &mut [V] {
        &mut self.0
    }
}

impl<V> From<Vec<V>> for VecStorage<V> {
    fn from(v: Vec<V>) -> Self {
        Self(v)
    }
}

impl<V> VecStorage<V> {
    /// Release unused capacity.
    pub fn shrink_to_fit(&mut self) {
        self.0.shrink_to_fit();
    }
}
