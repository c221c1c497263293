//! Data module: value types, attribute columns and the attribute store
#![warn(missing_docs)]

#[allow(missing_docs)]
pub mod attribute;
#[allow(missing_docs)]
pub mod attribute_store;
#[allow(missing_docs)]
pub mod indexed_attribute;
pub mod storage;
#[allow(missing_docs)]
pub mod tagged;
#[allow(missing_docs)]
pub mod value_type;

pub use attribute::{Attribute, AttributeElement, AttributeUsage, StorageMode, check_usage};
pub use attribute_store::{
    AttributeFilter, AttributeId, AttributeKey, AttributeRef, AttributeStore, is_reserved_name,
};
pub use indexed_attribute::IndexedAttribute;
pub use storage::{Storage, VecStorage};
pub use tagged::{
    AttributeVisitor, AttributeVisitorMut, ErasedAttribute, TaggedAttribute,
    TaggedIndexedAttribute,
};
pub use value_type::{AttributeValue, INVALID_INDEX, Index, RealValue, ScalarType};
