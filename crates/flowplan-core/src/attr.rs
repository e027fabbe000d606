//! Type-keyed attribute bag.
//!
//! Optimizer passes attach metadata (scheduling hints, debug numbering, ...) to
//! operators, stages and stage ports without widening the core types. The key
//! of each entry is the `TypeId` of its value, so an element holds at most one
//! value per attribute type and a later `put` replaces the earlier one.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Heterogeneous map from attribute type to a single value of that type.
#[derive(Default)]
pub struct AttributeMap {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, returning the previous value of the same type.
    pub fn put<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.entries
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for AttributeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeMap")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Elements that carry an attribute bag.
pub trait Attributed {
    fn attributes(&self) -> &AttributeMap;
    fn attributes_mut(&mut self) -> &mut AttributeMap;

    fn put_attribute<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.attributes_mut().put(value)
    }

    fn attribute<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.attributes().get::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Priority(u8);

    #[derive(Debug, PartialEq)]
    struct Label(&'static str);

    #[test]
    fn one_value_per_type() {
        let mut attrs = AttributeMap::new();
        assert_eq!(attrs.put(Priority(1)), None);
        assert_eq!(attrs.put(Label("hot")), None);
        assert_eq!(attrs.put(Priority(9)), Some(Priority(1)));

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get::<Priority>(), Some(&Priority(9)));
        assert_eq!(attrs.get::<Label>(), Some(&Label("hot")));
    }

    #[test]
    fn missing_type_is_none() {
        let attrs = AttributeMap::new();
        assert!(attrs.is_empty());
        assert!(attrs.get::<Priority>().is_none());
        assert!(!attrs.contains::<Label>());
    }

    #[test]
    fn get_mut_and_remove() {
        let mut attrs = AttributeMap::new();
        attrs.put(Priority(2));
        if let Some(p) = attrs.get_mut::<Priority>() {
            p.0 += 1;
        }
        assert_eq!(attrs.remove::<Priority>(), Some(Priority(3)));
        assert!(attrs.is_empty());
        assert_eq!(attrs.remove::<Priority>(), None);
    }

    #[test]
    fn type_aliases_share_a_slot() {
        type Count = u32;
        let mut attrs = AttributeMap::new();
        attrs.put::<Count>(1);
        attrs.put::<u32>(2);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get::<Count>(), Some(&2));
    }
}
