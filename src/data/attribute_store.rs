//! Named, id-addressed attribute storage.
//!
//! [`AttributeStore`] owns every attribute of a mesh behind a stable
//! [`AttributeId`]. Ids index an append-only slot table and are never reused,
//! so an id held across a removal reports [`MeshError::StaleAttributeId`]
//! instead of silently aliasing a newer attribute.
//!
//! The store does not know element counts. The mesh drives row bookkeeping
//! through [`insert_rows`](AttributeStore::insert_rows),
//! [`reindex`](AttributeStore::reindex) and
//! [`remap_index_values`](AttributeStore::remap_index_values), and checks the
//! result with [`validate`](AttributeStore::validate).

use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::data::attribute::{Attribute, AttributeElement, AttributeUsage, StorageMode};
use crate::data::indexed_attribute::IndexedAttribute;
use crate::data::tagged::ErasedAttribute;
use crate::data::value_type::{AttributeValue, Index};
use crate::debug_invariants::{DebugInvariants, InvariantContext};
use crate::mesh_error::MeshError;

/// Names starting with this character are reserved for mesh internals.
pub const RESERVED_PREFIX: char = '$';

/// True if `name` is reserved for mesh internals.
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Stable opaque handle to an attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(u32);

impl AttributeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything that names an attribute: a name or an id.
pub trait AttributeKey {
    fn resolve(&self, store: &AttributeStore) -> Result<AttributeId, MeshError>;
}

impl AttributeKey for AttributeId {
    fn resolve(&self, store: &AttributeStore) -> Result<AttributeId, MeshError> {
        match store.slots.get(self.index()) {
            Some(Some(_)) => Ok(*self),
            _ => Err(MeshError::StaleAttributeId(*self)),
        }
    }
}

impl AttributeKey for str {
    fn resolve(&self, store: &AttributeStore) -> Result<AttributeId, MeshError> {
        store.id(self)
    }
}

impl AttributeKey for String {
    fn resolve(&self, store: &AttributeStore) -> Result<AttributeId, MeshError> {
        store.id(self)
    }
}

impl<K: AttributeKey + ?Sized> AttributeKey for &K {
    fn resolve(&self, store: &AttributeStore) -> Result<AttributeId, MeshError> {
        (**self).resolve(store)
    }
}

/// Selects attributes during enumeration.
///
/// The default filter matches every non-reserved attribute.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    /// Accepted element kinds (`None` = any). Indexed attributes count as `Corner`.
    pub elements: Option<Vec<AttributeElement>>,
    /// Accepted usages (`None` = any).
    pub usages: Option<Vec<AttributeUsage>>,
    /// Accepted storage mode (`None` = any).
    pub storage: Option<StorageMode>,
    /// Whether `$`-prefixed attributes are included.
    pub include_reserved: bool,
}

impl AttributeFilter {
    pub fn with_elements(mut self, elements: impl IntoIterator<Item = AttributeElement>) -> Self {
        self.elements = Some(elements.into_iter().collect());
        self
    }

    pub fn with_usages(mut self, usages: impl IntoIterator<Item = AttributeUsage>) -> Self {
        self.usages = Some(usages.into_iter().collect());
        self
    }

    pub fn with_storage(mut self, storage: StorageMode) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn including_reserved(mut self) -> Self {
        self.include_reserved = true;
        self
    }

    pub fn matches(&self, name: &str, attr: &ErasedAttribute) -> bool {
        (self.include_reserved || !is_reserved_name(name))
            && self
                .elements
                .as_ref()
                .is_none_or(|e| e.contains(&attr.element()))
            && self.usages.as_ref().is_none_or(|u| u.contains(&attr.usage()))
            && self.storage.is_none_or(|s| s == attr.storage_mode())
    }
}

/// One attribute seen during enumeration.
#[derive(Clone, Copy, Debug)]
pub struct AttributeRef<'a> {
    pub id: AttributeId,
    pub name: &'a str,
    pub attr: &'a ErasedAttribute,
}

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    name: String,
    attr: ErasedAttribute,
}

/// Owns the attributes of one mesh.
#[derive(Clone, Debug, Default)]
pub struct AttributeStore {
    slots: Vec<Option<Entry>>,
    by_name: HashMap<String, AttributeId>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live attributes.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Id of the attribute called `name`.
    pub fn id(&self, name: &str) -> Result<AttributeId, MeshError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| MeshError::UnknownAttribute(name.to_owned()))
    }

    /// Name of the attribute behind `id`.
    pub fn name(&self, id: AttributeId) -> Result<&str, MeshError> {
        self.entry(id).map(|e| e.name.as_str())
    }

    /// Register a user attribute.
    pub fn insert(
        &mut self,
        name: &str,
        attr: impl Into<ErasedAttribute>,
    ) -> Result<AttributeId, MeshError> {
        if is_reserved_name(name) {
            return Err(MeshError::ReservedAttribute(name.to_owned()));
        }
        self.insert_unchecked(name, attr.into())
    }

    /// Register an attribute without the reserved-name check.
    pub(crate) fn insert_unchecked(
        &mut self,
        name: &str,
        attr: ErasedAttribute,
    ) -> Result<AttributeId, MeshError> {
        if self.by_name.contains_key(name) {
            return Err(MeshError::DuplicateAttributeName(name.to_owned()));
        }
        let id = AttributeId(self.slots.len() as u32);
        self.slots.push(Some(Entry {
            name: name.to_owned(),
            attr,
        }));
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    pub fn erased<K: AttributeKey + ?Sized>(&self, key: &K) -> Result<&ErasedAttribute, MeshError> {
        let id = key.resolve(self)?;
        self.entry(id).map(|e| &e.attr)
    }

    pub fn erased_mut<K: AttributeKey + ?Sized>(
        &mut self,
        key: &K,
    ) -> Result<&mut ErasedAttribute, MeshError> {
        let id = key.resolve(self)?;
        self.entry_mut(id).map(|e| &mut e.attr)
    }

    /// Typed plain attribute.
    pub fn get<T: AttributeValue, K: AttributeKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<&Attribute<T>, MeshError> {
        let id = key.resolve(self)?;
        let entry = self.entry(id)?;
        match &entry.attr {
            ErasedAttribute::Plain(t) => T::unwrap(t).ok_or_else(|| MeshError::AttributeTypeMismatch {
                name: entry.name.clone(),
                expected: T::SCALAR_TYPE,
                found: t.scalar_type(),
            }),
            ErasedAttribute::Indexed(_) => Err(MeshError::StorageModeMismatch {
                name: entry.name.clone(),
                indexed: true,
            }),
        }
    }

    /// Writable typed plain attribute.
    pub fn get_mut<T: AttributeValue, K: AttributeKey + ?Sized>(
        &mut self,
        key: &K,
    ) -> Result<&mut Attribute<T>, MeshError> {
        let id = key.resolve(self)?;
        let entry = self.entry_mut(id)?;
        let name = &entry.name;
        match &mut entry.attr {
            ErasedAttribute::Plain(t) => {
                let found = t.scalar_type();
                T::unwrap_mut(t).ok_or_else(|| MeshError::AttributeTypeMismatch {
                    name: name.clone(),
                    expected: T::SCALAR_TYPE,
                    found,
                })
            }
            ErasedAttribute::Indexed(_) => Err(MeshError::StorageModeMismatch {
                name: name.clone(),
                indexed: true,
            }),
        }
    }

    /// Typed indexed attribute.
    pub fn get_indexed<T: AttributeValue, K: AttributeKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<&IndexedAttribute<T>, MeshError> {
        let id = key.resolve(self)?;
        let entry = self.entry(id)?;
        match &entry.attr {
            ErasedAttribute::Indexed(t) => {
                T::unwrap_indexed(t).ok_or_else(|| MeshError::AttributeTypeMismatch {
                    name: entry.name.clone(),
                    expected: T::SCALAR_TYPE,
                    found: t.scalar_type(),
                })
            }
            ErasedAttribute::Plain(_) => Err(MeshError::StorageModeMismatch {
                name: entry.name.clone(),
                indexed: false,
            }),
        }
    }

    /// Writable typed indexed attribute.
    pub fn get_indexed_mut<T: AttributeValue, K: AttributeKey + ?Sized>(
        &mut self,
        key: &K,
    ) -> Result<&mut IndexedAttribute<T>, MeshError> {
        let id = key.resolve(self)?;
        let entry = self.entry_mut(id)?;
        let name = &entry.name;
        match &mut entry.attr {
            ErasedAttribute::Indexed(t) => {
                let found = t.scalar_type();
                T::unwrap_indexed_mut(t).ok_or_else(|| MeshError::AttributeTypeMismatch {
                    name: name.clone(),
                    expected: T::SCALAR_TYPE,
                    found,
                })
            }
            ErasedAttribute::Plain(_) => Err(MeshError::StorageModeMismatch {
                name: name.clone(),
                indexed: false,
            }),
        }
    }

    /// True if the attribute stores values of type `T`.
    pub fn is_type<T: AttributeValue, K: AttributeKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<bool, MeshError> {
        Ok(self.erased(key)?.scalar_type() == T::SCALAR_TYPE)
    }

    pub fn is_indexed<K: AttributeKey + ?Sized>(&self, key: &K) -> Result<bool, MeshError> {
        Ok(self.erased(key)?.is_indexed())
    }

    /// Remove a user attribute; its id becomes stale.
    pub fn remove<K: AttributeKey + ?Sized>(&mut self, key: &K) -> Result<ErasedAttribute, MeshError> {
        let id = key.resolve(self)?;
        let name = &self.entry(id)?.name;
        if is_reserved_name(name) {
            return Err(MeshError::ReservedAttribute(name.clone()));
        }
        self.take(id)
    }

    /// Rename a user attribute. The id is unchanged.
    pub fn rename<K: AttributeKey + ?Sized>(&mut self, key: &K, new_name: &str) -> Result<(), MeshError> {
        let id = key.resolve(self)?;
        let old = self.entry(id)?.name.clone();
        if is_reserved_name(&old) {
            return Err(MeshError::ReservedAttribute(old));
        }
        if is_reserved_name(new_name) {
            return Err(MeshError::ReservedAttribute(new_name.to_owned()));
        }
        if old == new_name {
            return Ok(());
        }
        if self.by_name.contains_key(new_name) {
            return Err(MeshError::DuplicateAttributeName(new_name.to_owned()));
        }
        self.by_name.remove(&old);
        self.by_name.insert(new_name.to_owned(), id);
        self.entry_mut(id)?.name = new_name.to_owned();
        Ok(())
    }

    /// Deep copy under a new name.
    pub fn duplicate<K: AttributeKey + ?Sized>(
        &mut self,
        key: &K,
        new_name: &str,
    ) -> Result<AttributeId, MeshError> {
        let attr = self.erased(key)?.clone();
        self.insert(new_name, attr)
    }

    /// Lazily enumerate live attributes in id order.
    ///
    /// The iterator is `Clone`, so the sequence can be restarted.
    pub fn iter(&self) -> impl Iterator<Item = AttributeRef<'_>> + Clone + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref().map(|e| AttributeRef {
                id: AttributeId(i as u32),
                name: e.name.as_str(),
                attr: &e.attr,
            })
        })
    }

    /// Enumerate attributes accepted by `filter`.
    pub fn filtered<'s, 'f>(
        &'s self,
        filter: &'f AttributeFilter,
    ) -> impl Iterator<Item = AttributeRef<'s>> + Clone + use<'s, 'f> {
        self.iter().filter(move |r| filter.matches(r.name, r.attr))
    }

    /// Ids accepted by `filter`, collected so the store can be mutated afterwards.
    pub fn ids(&self, filter: &AttributeFilter) -> Vec<AttributeId> {
        self.filtered(filter).map(|r| r.id).collect()
    }

    /// Visit every attribute accepted by `filter` mutably.
    pub fn for_each_mut<F>(&mut self, filter: &AttributeFilter, mut f: F)
    where
        F: FnMut(AttributeId, &str, &mut ErasedAttribute),
    {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(e) = slot {
                if filter.matches(&e.name, &e.attr) {
                    f(AttributeId(i as u32), &e.name, &mut e.attr);
                }
            }
        }
    }

    /// Parallel [`for_each_mut`](Self::for_each_mut); one task per attribute.
    #[cfg(feature = "rayon")]
    pub fn par_for_each_mut<F>(&mut self, filter: &AttributeFilter, f: F)
    where
        F: Fn(AttributeId, &str, &mut ErasedAttribute) + Send + Sync,
    {
        use rayon::prelude::*;
        self.slots
            .par_iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|e| (i, e)))
            .filter(|(_, e)| filter.matches(&e.name, &e.attr))
            .for_each(|(i, e)| f(AttributeId(i as u32), &e.name, &mut e.attr));
    }

    /// Append `n` default rows to every plain attribute of `element`. For
    /// corners, indexed attributes also get `n` unset indices.
    pub fn insert_rows(&mut self, element: AttributeElement, n: usize) {
        if n == 0 {
            return;
        }
        for e in self.slots.iter_mut().flatten() {
            match &mut e.attr {
                ErasedAttribute::Plain(a) if a.element() == element => a.insert_rows(n),
                ErasedAttribute::Indexed(a) if element == AttributeElement::Corner => {
                    a.indices_mut().insert_rows(n)
                }
                _ => {}
            }
        }
    }

    /// Rebuild every attribute of `element` so that new row `i` is old row
    /// `new_to_old[i]`. [`INVALID_INDEX`](crate::data::value_type::INVALID_INDEX)
    /// entries produce default rows (unset indices for indexed attributes).
    pub fn reindex(&mut self, element: AttributeElement, new_to_old: &[Index]) -> Result<(), MeshError> {
        for e in self.slots.iter_mut().flatten() {
            match &mut e.attr {
                ErasedAttribute::Plain(a) if a.element() == element => {
                    *a = a.gather(new_to_old)?;
                }
                ErasedAttribute::Indexed(a) if element == AttributeElement::Corner => {
                    let sliced = a.indices().gather(new_to_old)?;
                    *a.indices_mut() = sliced;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Rewrite the values of every attribute whose usage references `element`.
    /// Returns how many attributes were touched.
    pub fn remap_index_values(&mut self, element: AttributeElement, old_to_new: &[Index]) -> usize {
        let mut touched = 0;
        for e in self.slots.iter_mut().flatten() {
            if e.attr.remap_index_values(element, old_to_new) {
                touched += 1;
            }
        }
        touched
    }

    /// True if any live attribute is attached to `element`.
    pub fn has_element(&self, element: AttributeElement) -> bool {
        self.iter()
            .any(|r| !r.attr.is_indexed() && r.attr.element() == element)
    }

    /// True if any live attribute stores indices of `element`.
    pub fn has_index_usage(&self, element: AttributeElement) -> bool {
        self.iter()
            .any(|r| r.attr.usage().indexed_element() == Some(element))
    }

    /// Check row counts against `count` and indexed attribute bounds.
    ///
    /// `count` returns the current number of elements of a kind, or `None`
    /// when that count is unknown (edges before connectivity is built).
    pub fn validate<F>(&self, count: F) -> Result<(), MeshError>
    where
        F: Fn(AttributeElement) -> Option<usize>,
    {
        for r in self.iter() {
            match r.attr {
                ErasedAttribute::Plain(a) => {
                    let element = a.element();
                    if element == AttributeElement::Value {
                        continue;
                    }
                    match count(element) {
                        Some(n) if n != a.num_rows() => {
                            return Err(MeshError::InvariantViolation(format!(
                                "attribute `{}` has {} rows, expected {n} {element:?} rows",
                                r.name,
                                a.num_rows()
                            )));
                        }
                        None => {
                            return Err(MeshError::InvariantViolation(format!(
                                "attribute `{}` is attached to {element:?} but the element count is unknown",
                                r.name
                            )));
                        }
                        _ => {}
                    }
                }
                ErasedAttribute::Indexed(a) => {
                    if let Some(nc) = count(AttributeElement::Corner) {
                        if a.num_corners() != nc {
                            return Err(MeshError::InvariantViolation(format!(
                                "indexed attribute `{}` has {} indices, expected {nc}",
                                r.name,
                                a.num_corners()
                            )));
                        }
                    }
                    a.check_indices().map_err(|e| {
                        MeshError::InvariantViolation(format!("indexed attribute `{}`: {e}", r.name))
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Remove without the reserved check.
    pub(crate) fn take(&mut self, id: AttributeId) -> Result<ErasedAttribute, MeshError> {
        let entry = self
            .slots
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(MeshError::StaleAttributeId(id))?;
        self.by_name.remove(&entry.name);
        Ok(entry.attr)
    }

    /// Swap the contents behind `id`, keeping name and id.
    pub(crate) fn replace(
        &mut self,
        id: AttributeId,
        attr: ErasedAttribute,
    ) -> Result<ErasedAttribute, MeshError> {
        Ok(std::mem::replace(&mut self.entry_mut(id)?.attr, attr))
    }

    fn entry(&self, id: AttributeId) -> Result<&Entry, MeshError> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(MeshError::StaleAttributeId(id))
    }

    fn entry_mut(&mut self, id: AttributeId) -> Result<&mut Entry, MeshError> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(MeshError::StaleAttributeId(id))
    }
}

impl DebugInvariants for AttributeStore {
    /// Name table and slots agree, and indexed attributes stay in bounds.
    /// Row counts need element counts and are checked by [`AttributeStore::validate`].
    fn validate_invariants(&self) -> Result<(), MeshError> {
        let live = self.slots.iter().flatten().count();
        if live != self.by_name.len() {
            return Err(MeshError::InvariantViolation(format!(
                "{live} live slots but {} names",
                self.by_name.len()
            )));
        }
        for (name, &id) in &self.by_name {
            if self.entry(id).invariant(format_args!("name `{name}`"))?.name != *name {
                return Err(MeshError::InvariantViolation(format!(
                    "name `{name}` points at slot {id} holding another attribute"
                )));
            }
        }
        for r in self.iter() {
            if let ErasedAttribute::Indexed(a) = r.attr {
                a.check_indices()
                    .invariant(format_args!("indexed attribute `{}`", r.name))?;
            }
        }
        Ok(())
    }
}
