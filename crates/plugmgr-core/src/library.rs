//! Loaded libraries and the arena that owns them.
//!
//! The manager never stores a reference to an [`Identity`]. Registry entries
//! carry a [`LibraryId`] instead, and the identity is borrowed from the
//! library through the arena whenever a handler has to be destroyed. Since
//! [`LibraryArena::release_all`] needs `&mut self`, no identity borrow can be
//! alive while libraries are being released.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::LoaderError;
use crate::identity::Identity;

/// Opens plugin files as libraries.
pub trait LibraryLoader<T: ?Sized> {
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedLibrary<T>>, LoaderError>;
}

/// One opened library.
pub trait LoadedLibrary<T: ?Sized> {
    /// File this library was opened from.
    fn path(&self) -> &Path;

    /// Resolve `symbol` as the identity entry point and call it.
    fn resolve_identity(&mut self, symbol: &str) -> Result<(), LoaderError>;

    /// The identity obtained by the last successful
    /// [`resolve_identity`](LoadedLibrary::resolve_identity).
    fn identity(&self) -> Option<&dyn Identity<T>>;

    /// Unload the library.
    fn close(self: Box<Self>) -> Result<(), LoaderError>;
}

/// Index of a library inside a [`LibraryArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LibraryId(usize);

impl Display for LibraryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Summary of a loaded library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryRecord {
    pub path: PathBuf,
    pub loaded_at: DateTime<Utc>,
    pub has_identity: bool,
}

struct LibrarySlot<T: ?Sized> {
    library: Box<dyn LoadedLibrary<T>>,
    loaded_at: DateTime<Utc>,
}

/// Insertion-ordered owner of every library the manager opened.
pub struct LibraryArena<T: ?Sized> {
    slots: Vec<LibrarySlot<T>>,
}

impl<T: ?Sized> LibraryArena<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn push(&mut self, library: Box<dyn LoadedLibrary<T>>) -> LibraryId {
        self.slots.push(LibrarySlot {
            library,
            loaded_at: Utc::now(),
        });
        LibraryId(self.slots.len() - 1)
    }

    pub fn get(&self, id: LibraryId) -> Option<&dyn LoadedLibrary<T>> {
        self.slots.get(id.0).map(|slot| slot.library.as_ref())
    }

    pub fn resolve_identity(&mut self, id: LibraryId, symbol: &str) -> Result<(), LoaderError> {
        match self.slots.get_mut(id.0) {
            Some(slot) => slot.library.resolve_identity(symbol),
            None => Err(LoaderError::NullIdentity {
                symbol: symbol.to_string(),
            }),
        }
    }

    pub fn identity(&self, id: LibraryId) -> Option<&dyn Identity<T>> {
        self.slots.get(id.0).and_then(|slot| slot.library.identity())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn records(&self) -> Vec<LibraryRecord> {
        self.slots
            .iter()
            .map(|slot| LibraryRecord {
                path: slot.library.path().to_path_buf(),
                loaded_at: slot.loaded_at,
                has_identity: slot.library.identity().is_some(),
            })
            .collect()
    }

    /// Close every library in load order and empty the arena.
    ///
    /// Returns how many libraries were released. A library that fails to
    /// close is logged and forgotten; it cannot be retried.
    pub fn release_all(&mut self) -> usize {
        let released = self.slots.len();
        for slot in self.slots.drain(..) {
            let path = slot.library.path().to_path_buf();
            if let Err(e) = slot.library.close() {
                tracing::warn!("Failed to unload plugin library {}: {}", path.display(), e);
            }
        }
        released
    }
}

impl<T: ?Sized> Default for LibraryArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
