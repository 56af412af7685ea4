//! Operation-name keyed handler registry.

use std::collections::BTreeMap;

use crate::identity::Handler;
use crate::library::LibraryId;

/// One operation binding: the handler and the library whose identity owns it.
#[derive(Debug)]
pub struct RegistryEntry<T: ?Sized> {
    handler: Handler<T>,
    library: LibraryId,
}

impl<T: ?Sized> RegistryEntry<T> {
    pub fn new(handler: Handler<T>, library: LibraryId) -> Self {
        Self { handler, library }
    }

    pub fn handler(&self) -> &T {
        &self.handler
    }

    pub fn library(&self) -> LibraryId {
        self.library
    }

    pub fn into_parts(self) -> (Handler<T>, LibraryId) {
        (self.handler, self.library)
    }
}

/// Map from operation name to its single active handler.
///
/// Iteration is ordered by operation name.
#[derive(Debug)]
pub struct HandlerRegistry<T: ?Sized> {
    entries: BTreeMap<String, RegistryEntry<T>>,
}

impl<T: ?Sized> HandlerRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Bind `name`, returning the entry it displaced.
    pub fn insert(&mut self, name: impl Into<String>, entry: RegistryEntry<T>) -> Option<RegistryEntry<T>> {
        self.entries.insert(name.into(), entry)
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name).map(RegistryEntry::handler)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries.get_mut(name).map(|entry| &mut *entry.handler)
    }

    pub fn entry(&self, name: &str) -> Option<&RegistryEntry<T>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn handlers(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(RegistryEntry::handler)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry, yielding them in key order.
    pub fn drain(&mut self) -> impl Iterator<Item = (String, RegistryEntry<T>)> {
        std::mem::take(&mut self.entries).into_iter()
    }
}

impl<T: ?Sized> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
