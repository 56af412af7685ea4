//! Native plugin libraries (.so on Linux, .dylib on macOS, .dll on Windows).
//!
//! Libraries are opened with `libloading`. The identity entry point is looked
//! up by name and called as an [`IdentityEntryPoint`], i.e.
//! `unsafe extern "C" fn() -> *const RawPluginIdentity`. The record it returns
//! belongs to the library and is never freed by the host.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::{Library, Symbol};
use plugmgr_sdk::abi::{IdentityEntryPoint, RawPluginIdentity};
use serde::Serialize;

use crate::config::ApiVersion;
use crate::error::LoaderError;
use crate::identity::{Handler, Identity, Operations};
use crate::library::{LibraryLoader, LoadedLibrary};

/// Loader backed by the platform dynamic linker.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLoader;

impl<T: ?Sized + 'static> LibraryLoader<T> for NativeLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedLibrary<T>>, LoaderError> {
        // SAFETY: running a library's initialisers is inherent to loading a
        // plugin; the host trusts the configured plugin directories.
        let library = unsafe { Library::new(path) }.map_err(|e| LoaderError::Open {
            message: e.to_string(),
        })?;

        Ok(Box::new(NativeLibrary::<T> {
            path: path.to_path_buf(),
            identity: None,
            library,
        }))
    }
}

/// A library opened by [`NativeLoader`].
pub struct NativeLibrary<T: ?Sized> {
    path: PathBuf,
    // Declared before `library` so it is dropped first.
    identity: Option<NativeIdentity<T>>,
    library: Library,
}

impl<T: ?Sized + 'static> LoadedLibrary<T> for NativeLibrary<T> {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve_identity(&mut self, symbol: &str) -> Result<(), LoaderError> {
        // SAFETY: the symbol is trusted to have the entry point signature.
        let raw = unsafe { call_entry_point(&self.library, symbol)? };
        // SAFETY: the record lives as long as `self.library`, which outlives
        // `self.identity`.
        let identity = unsafe { NativeIdentity::from_raw(raw) }.ok_or_else(|| {
            LoaderError::NullIdentity {
                symbol: symbol.to_string(),
            }
        })?;
        self.identity = Some(identity);
        Ok(())
    }

    fn identity(&self) -> Option<&dyn Identity<T>> {
        self.identity.as_ref().map(|identity| identity as &dyn Identity<T>)
    }

    fn close(self: Box<Self>) -> Result<(), LoaderError> {
        let NativeLibrary {
            identity, library, ..
        } = *self;
        drop(identity);
        library.close().map_err(|e| LoaderError::Close {
            message: e.to_string(),
        })
    }
}

/// Host-side view of a [`RawPluginIdentity`].
pub struct NativeIdentity<T: ?Sized> {
    raw: NonNull<RawPluginIdentity>,
    _capability: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> NativeIdentity<T> {
    /// Wrap a record returned by an identity entry point. Null yields `None`.
    ///
    /// # Safety
    /// `raw` must be null or point to a valid record that outlives the returned
    /// value, whose handlers follow the convention in [`plugmgr_sdk::abi`] for
    /// capability type `T`.
    pub unsafe fn from_raw(raw: *const RawPluginIdentity) -> Option<Self> {
        NonNull::new(raw.cast_mut()).map(|raw| Self {
            raw,
            _capability: PhantomData,
        })
    }

    fn raw(&self) -> &RawPluginIdentity {
        // SAFETY: `from_raw` contract.
        unsafe { self.raw.as_ref() }
    }
}

impl<T: ?Sized> Identity<T> for NativeIdentity<T> {
    fn major_version(&self) -> i32 {
        self.raw().major_version
    }

    fn minor_version(&self) -> i32 {
        self.raw().minor_version
    }

    fn operations(&self) -> Operations<'_> {
        // SAFETY: the table belongs to the record, which outlives `self`.
        unsafe { Operations::from_raw(self.raw().operations) }
    }

    fn spawn_handler(&self) -> Option<Handler<T>> {
        // SAFETY: the plugin returns null or a `Box<T>` per the ABI convention.
        unsafe { Handler::from_raw((self.raw().spawn_handler)()) }
    }

    fn destroy_handler(&self, handler: Handler<T>) {
        // SAFETY: the handler came from this identity's spawn function.
        unsafe { (self.raw().destroy_handler)(handler.into_raw()) }
    }
}

/// Identity of a plugin file, read without spawning any handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub path: PathBuf,
    pub version: ApiVersion,
    pub operations: Vec<String>,
}

/// Open `path`, read its identity, and unload it again.
pub fn peek(path: impl AsRef<Path>, symbol: &str) -> Result<PluginInfo, LoaderError> {
    let path = path.as_ref();
    // SAFETY: see `NativeLoader::open`.
    let library = unsafe { Library::new(path) }.map_err(|e| LoaderError::Open {
        message: e.to_string(),
    })?;

    let info = {
        // SAFETY: as in `NativeLibrary::resolve_identity`; the record is only
        // read inside this block, before the library is closed.
        let raw = unsafe { call_entry_point(&library, symbol)? };
        let raw = unsafe { raw.as_ref() }.ok_or_else(|| LoaderError::NullIdentity {
            symbol: symbol.to_string(),
        })?;

        PluginInfo {
            path: path.to_path_buf(),
            version: ApiVersion::new(raw.major_version, raw.minor_version),
            operations: unsafe { Operations::from_raw(raw.operations) }
                .map(Cow::into_owned)
                .collect(),
        }
    };

    library.close().map_err(|e| LoaderError::Close {
        message: e.to_string(),
    })?;
    Ok(info)
}

/// Look up `symbol` and call it as the identity entry point.
///
/// # Safety
/// The symbol must really be an [`IdentityEntryPoint`].
unsafe fn call_entry_point(
    library: &Library,
    symbol: &str,
) -> Result<*const RawPluginIdentity, LoaderError> {
    let entry: Symbol<IdentityEntryPoint> =
        unsafe { library.get(symbol.as_bytes()) }.map_err(|e| LoaderError::Symbol {
            symbol: symbol.to_string(),
            message: e.to_string(),
        })?;
    Ok(unsafe { entry() })
}
