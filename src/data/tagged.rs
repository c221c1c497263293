//! Type-erased attributes.
//!
//! The store keeps attributes of heterogeneous value types behind the closed
//! enums defined here. Generic code reaches the concrete type either through
//! [`AttributeValue::unwrap`] when the type is known statically, or through the
//! visitor traits when it is not. Inside the crate, `dispatch_tagged!` expands
//! one generic body into a match arm per value type.

use crate::data::attribute::{Attribute, AttributeElement, AttributeUsage, StorageMode};
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::value_type::{AttributeValue, INVALID_INDEX, Index, ScalarType};
use crate::mesh_error::MeshError;

/// Tagged plain attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum TaggedAttribute {
    I8(Attribute<i8>),
    I16(Attribute<i16>),
    I32(Attribute<i32>),
    I64(Attribute<i64>),
    U8(Attribute<u8>),
    U16(Attribute<u16>),
    U32(Attribute<u32>),
    U64(Attribute<u64>),
    F32(Attribute<f32>),
    F64(Attribute<f64>),
}

/// Tagged indexed attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum TaggedIndexedAttribute {
    I8(IndexedAttribute<i8>),
    I16(IndexedAttribute<i16>),
    I32(IndexedAttribute<i32>),
    I64(IndexedAttribute<i64>),
    U8(IndexedAttribute<u8>),
    U16(IndexedAttribute<u16>),
    U32(IndexedAttribute<u32>),
    U64(IndexedAttribute<u64>),
    F32(IndexedAttribute<f32>),
    F64(IndexedAttribute<f64>),
}

/// Match a tagged enum and run `$body` with `$inner` bound to the typed value.
///
/// The body is expanded once per value type, so it may call generic functions.
macro_rules! dispatch_tagged {
    (plain $value:expr, $inner:ident => $body:expr) => {{
        use $crate::data::tagged::TaggedAttribute as __T;
        match $value {
            __T::I8($inner) => $body,
            __T::I16($inner) => $body,
            __T::I32($inner) => $body,
            __T::I64($inner) => $body,
            __T::U8($inner) => $body,
            __T::U16($inner) => $body,
            __T::U32($inner) => $body,
            __T::U64($inner) => $body,
            __T::F32($inner) => $body,
            __T::F64($inner) => $body,
        }
    }};
    (indexed $value:expr, $inner:ident => $body:expr) => {{
        use $crate::data::tagged::TaggedIndexedAttribute as __T;
        match $value {
            __T::I8($inner) => $body,
            __T::I16($inner) => $body,
            __T::I32($inner) => $body,
            __T::I64($inner) => $body,
            __T::U8($inner) => $body,
            __T::U16($inner) => $body,
            __T::U32($inner) => $body,
            __T::U64($inner) => $body,
            __T::F32($inner) => $body,
            __T::F64($inner) => $body,
        }
    }};
}

/// Read-only visitor over a type-erased attribute.
pub trait AttributeVisitor {
    type Output;

    fn visit_plain<T: AttributeValue>(&mut self, attr: &Attribute<T>) -> Self::Output;

    fn visit_indexed<T: AttributeValue>(&mut self, attr: &IndexedAttribute<T>) -> Self::Output;
}

/// Mutating visitor over a type-erased attribute.
pub trait AttributeVisitorMut {
    type Output;

    fn visit_plain<T: AttributeValue>(&mut self, attr: &mut Attribute<T>) -> Self::Output;

    fn visit_indexed<T: AttributeValue>(
        &mut self,
        attr: &mut IndexedAttribute<T>,
    ) -> Self::Output;
}

impl TaggedAttribute {
    pub fn scalar_type(&self) -> ScalarType {
        dispatch_tagged!(plain self, a => scalar_of(a))
    }

    pub fn element(&self) -> AttributeElement {
        dispatch_tagged!(plain self, a => a.element())
    }

    pub fn usage(&self) -> AttributeUsage {
        dispatch_tagged!(plain self, a => a.usage())
    }

    pub fn num_channels(&self) -> usize {
        dispatch_tagged!(plain self, a => a.num_channels())
    }

    pub fn num_rows(&self) -> usize {
        dispatch_tagged!(plain self, a => a.num_rows())
    }

    pub fn as_bytes(&self) -> &[u8] {
        dispatch_tagged!(plain self, a => a.as_bytes())
    }

    pub(crate) fn insert_rows(&mut self, n: usize) {
        dispatch_tagged!(plain self, a => a.insert_rows(n))
    }

    pub(crate) fn gather(&self, rows: &[Index]) -> Result<Self, MeshError> {
        dispatch_tagged!(plain self, a => Ok(AttributeValue::wrap(a.gather(rows)?)))
    }

    /// Index-typed view, if this attribute stores [`Index`] values.
    pub(crate) fn as_index_mut(&mut self) -> Option<&mut Attribute<Index>> {
        <Index as AttributeValue>::unwrap_mut(self)
    }
}

impl TaggedIndexedAttribute {
    pub fn scalar_type(&self) -> ScalarType {
        dispatch_tagged!(indexed self, a => scalar_of_indexed(a))
    }

    pub fn usage(&self) -> AttributeUsage {
        dispatch_tagged!(indexed self, a => a.usage())
    }

    pub fn num_channels(&self) -> usize {
        dispatch_tagged!(indexed self, a => a.num_channels())
    }

    pub fn num_values(&self) -> usize {
        dispatch_tagged!(indexed self, a => a.num_values())
    }

    pub fn num_corners(&self) -> usize {
        dispatch_tagged!(indexed self, a => a.num_corners())
    }

    pub fn indices(&self) -> &Attribute<Index> {
        dispatch_tagged!(indexed self, a => a.indices())
    }

    pub fn check_indices(&self) -> Result<(), MeshError> {
        dispatch_tagged!(indexed self, a => a.check_indices())
    }

    pub fn condense(&mut self) -> Result<usize, MeshError> {
        dispatch_tagged!(indexed self, a => a.condense())
    }

    pub(crate) fn indices_mut(&mut self) -> &mut Attribute<Index> {
        dispatch_tagged!(indexed self, a => a.indices_mut())
    }

    pub(crate) fn values_as_index_mut(&mut self) -> Option<&mut Attribute<Index>> {
        <Index as AttributeValue>::unwrap_indexed_mut(self).map(|a| a.values_mut())
    }
}

fn scalar_of<T: AttributeValue>(_: &Attribute<T>) -> ScalarType {
    T::SCALAR_TYPE
}

fn scalar_of_indexed<T: AttributeValue>(_: &IndexedAttribute<T>) -> ScalarType {
    T::SCALAR_TYPE
}

/// A type-erased attribute of either storage mode.
#[derive(Clone, Debug, PartialEq)]
pub enum ErasedAttribute {
    Plain(TaggedAttribute),
    Indexed(TaggedIndexedAttribute),
}

impl ErasedAttribute {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ErasedAttribute::Plain(a) => a.scalar_type(),
            ErasedAttribute::Indexed(a) => a.scalar_type(),
        }
    }

    /// Element kind. Indexed attributes report [`AttributeElement::Corner`].
    pub fn element(&self) -> AttributeElement {
        match self {
            ErasedAttribute::Plain(a) => a.element(),
            ErasedAttribute::Indexed(_) => AttributeElement::Corner,
        }
    }

    pub fn usage(&self) -> AttributeUsage {
        match self {
            ErasedAttribute::Plain(a) => a.usage(),
            ErasedAttribute::Indexed(a) => a.usage(),
        }
    }

    pub fn num_channels(&self) -> usize {
        match self {
            ErasedAttribute::Plain(a) => a.num_channels(),
            ErasedAttribute::Indexed(a) => a.num_channels(),
        }
    }

    pub fn storage_mode(&self) -> StorageMode {
        match self {
            ErasedAttribute::Plain(_) => StorageMode::Plain,
            ErasedAttribute::Indexed(_) => StorageMode::Indexed,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, ErasedAttribute::Indexed(_))
    }

    pub fn as_plain(&self) -> Option<&TaggedAttribute> {
        match self {
            ErasedAttribute::Plain(a) => Some(a),
            ErasedAttribute::Indexed(_) => None,
        }
    }

    pub fn as_indexed(&self) -> Option<&TaggedIndexedAttribute> {
        match self {
            ErasedAttribute::Plain(_) => None,
            ErasedAttribute::Indexed(a) => Some(a),
        }
    }

    /// Dispatch to the typed handler of `visitor`.
    pub fn visit<V: AttributeVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            ErasedAttribute::Plain(t) => dispatch_tagged!(plain t, a => visitor.visit_plain(a)),
            ErasedAttribute::Indexed(t) => {
                dispatch_tagged!(indexed t, a => visitor.visit_indexed(a))
            }
        }
    }

    /// Dispatch to the typed handler of a mutating `visitor`.
    pub fn visit_mut<V: AttributeVisitorMut>(&mut self, visitor: &mut V) -> V::Output {
        match self {
            ErasedAttribute::Plain(t) => dispatch_tagged!(plain t, a => visitor.visit_plain(a)),
            ErasedAttribute::Indexed(t) => {
                dispatch_tagged!(indexed t, a => visitor.visit_indexed(a))
            }
        }
    }

    /// Rewrite element-index values through `old_to_new` if this attribute's
    /// usage references `element`. Entries outside the mapping become
    /// [`INVALID_INDEX`]. Returns true when values were rewritten.
    pub(crate) fn remap_index_values(
        &mut self,
        element: AttributeElement,
        old_to_new: &[Index],
    ) -> bool {
        if self.usage().indexed_element() != Some(element) {
            return false;
        }
        let target = match self {
            ErasedAttribute::Plain(a) => a.as_index_mut(),
            ErasedAttribute::Indexed(a) => a.values_as_index_mut(),
        };
        let Some(attr) = target else {
            return false;
        };
        for v in attr.ref_all() {
            if *v != INVALID_INDEX {
                *v = old_to_new.get(*v as usize).copied().unwrap_or(INVALID_INDEX);
            }
        }
        true
    }
}

impl<T: AttributeValue> From<Attribute<T>> for ErasedAttribute {
    fn from(attr: Attribute<T>) -> Self {
        ErasedAttribute::Plain(T::wrap(attr))
    }
}

impl<T: AttributeValue> From<IndexedAttribute<T>> for ErasedAttribute {
    fn from(attr: IndexedAttribute<T>) -> Self {
        ErasedAttribute::Indexed(T::wrap_indexed(attr))
    }
}

static_assertions::assert_impl_all!(ErasedAttribute: Send, Sync, Clone);
