//! Closed registry of attribute value types.
//!
//! Every attribute stores one of a fixed set of scalar types. The set is
//! closed on purpose: [`ScalarType`] is the runtime tag, [`AttributeValue`]
//! links each concrete type to its tag and to its slot in the tagged enums of
//! [`crate::data::tagged`]. Adding a type means adding a variant here and an
//! arm to every dispatch site (`dispatch_tagged!`).

use std::fmt::Debug;

use num_traits::{NumCast, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::data::attribute::Attribute;
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::tagged::{TaggedAttribute, TaggedIndexedAttribute};

/// Integer type used for every element index stored in the mesh.
pub type Index = u32;

/// Sentinel for "no element" / "unset" index entries.
pub const INVALID_INDEX: Index = Index::MAX;

/// Runtime tag of an attribute value type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ScalarType {
    /// All tags, in declaration order.
    pub const ALL: [ScalarType; 10] = [
        ScalarType::I8,
        ScalarType::I16,
        ScalarType::I32,
        ScalarType::I64,
        ScalarType::U8,
        ScalarType::U16,
        ScalarType::U32,
        ScalarType::U64,
        ScalarType::F32,
        ScalarType::F64,
    ];

    /// Returns a stable string label for the scalar type.
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    /// Parse a scalar type from a string label.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    /// True for the integer family (collision policy `collision_policy_integral`).
    pub fn is_integral(self) -> bool {
        !self.is_float()
    }

    /// True for `f32`/`f64`.
    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    /// Size of one value in bytes.
    pub fn size_of(self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
        }
    }
}

/// A concrete type that can be stored in an attribute.
///
/// Implemented for exactly the types listed in [`ScalarType`].
pub trait AttributeValue:
    Copy
    + Default
    + PartialEq
    + PartialOrd
    + Debug
    + Send
    + Sync
    + bytemuck::Pod
    + NumCast
    + ToPrimitive
    + 'static
{
    /// Scalar type tag for this concrete type.
    const SCALAR_TYPE: ScalarType;

    /// Bit pattern used to compare rows for exact equality (floats compare by bits).
    fn key_bits(self) -> u64;

    /// Lossy conversion used when averaging; integers truncate toward zero.
    fn from_f64(value: f64) -> Self {
        <Self as NumCast>::from(value).unwrap_or_default()
    }

    /// Lossy conversion to `f64`.
    fn to_f64_lossy(self) -> f64 {
        self.to_f64().unwrap_or(0.0)
    }

    /// Wrap a typed attribute into the tagged container.
    fn wrap(attr: Attribute<Self>) -> TaggedAttribute;
    /// Borrow a typed attribute if the tag matches.
    fn unwrap(attr: &TaggedAttribute) -> Option<&Attribute<Self>>;
    /// Mutably borrow a typed attribute if the tag matches.
    fn unwrap_mut(attr: &mut TaggedAttribute) -> Option<&mut Attribute<Self>>;

    /// Wrap a typed indexed attribute into the tagged container.
    fn wrap_indexed(attr: IndexedAttribute<Self>) -> TaggedIndexedAttribute;
    /// Borrow a typed indexed attribute if the tag matches.
    fn unwrap_indexed(attr: &TaggedIndexedAttribute) -> Option<&IndexedAttribute<Self>>;
    /// Mutably borrow a typed indexed attribute if the tag matches.
    fn unwrap_indexed_mut(
        attr: &mut TaggedIndexedAttribute,
    ) -> Option<&mut IndexedAttribute<Self>>;
}

macro_rules! impl_attribute_value {
    ($ty:ty, $variant:ident, $bits:expr) => {
        impl AttributeValue for $ty {
            const SCALAR_TYPE: ScalarType = ScalarType::$variant;

            #[inline]
            fn key_bits(self) -> u64 {
                let f: fn($ty) -> u64 = $bits;
                f(self)
            }

            fn wrap(attr: Attribute<Self>) -> TaggedAttribute {
                TaggedAttribute::$variant(attr)
            }

            fn unwrap(attr: &TaggedAttribute) -> Option<&Attribute<Self>> {
                if let TaggedAttribute::$variant(attr) = attr {
                    Some(attr)
                } else {
                    None
                }
            }

            fn unwrap_mut(attr: &mut TaggedAttribute) -> Option<&mut Attribute<Self>> {
                if let TaggedAttribute::$variant(attr) = attr {
                    Some(attr)
                } else {
                    None
                }
            }

            fn wrap_indexed(attr: IndexedAttribute<Self>) -> TaggedIndexedAttribute {
                TaggedIndexedAttribute::$variant(attr)
            }

            fn unwrap_indexed(attr: &TaggedIndexedAttribute) -> Option<&IndexedAttribute<Self>> {
                if let TaggedIndexedAttribute::$variant(attr) = attr {
                    Some(attr)
                } else {
                    None
                }
            }

            fn unwrap_indexed_mut(
                attr: &mut TaggedIndexedAttribute,
            ) -> Option<&mut IndexedAttribute<Self>> {
                if let TaggedIndexedAttribute::$variant(attr) = attr {
                    Some(attr)
                } else {
                    None
                }
            }
        }
    };
}

impl_attribute_value!(i8, I8, |v| v as u8 as u64);
impl_attribute_value!(i16, I16, |v| v as u16 as u64);
impl_attribute_value!(i32, I32, |v| v as u32 as u64);
impl_attribute_value!(i64, I64, |v| v as u64);
impl_attribute_value!(u8, U8, |v| v as u64);
impl_attribute_value!(u16, U16, |v| v as u64);
impl_attribute_value!(u32, U32, |v| v as u64);
impl_attribute_value!(u64, U64, |v| v);
impl_attribute_value!(f32, F32, |v| v.to_bits() as u64);
impl_attribute_value!(f64, F64, |v| v.to_bits());

/// Floating-point scalar usable for vertex positions.
pub trait RealValue: AttributeValue + num_traits::Float {}

impl RealValue for f32 {}
impl RealValue for f64 {}

static_assertions::assert_eq_size!(Index, u32);
