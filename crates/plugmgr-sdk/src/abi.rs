//! Binary contract between a host and a plugin library.
//!
//! A plugin library exports one zero-argument `extern "C"` function (the
//! identity entry point) which returns a pointer to a [`RawPluginIdentity`].
//! The record stays valid for as long as the library remains loaded.
//!
//! # Handler convention
//!
//! `spawn_handler` returns a handler of the host's capability type `T` as
//! `Box::into_raw(Box::new(Box<T>))` cast to `*mut c_void`, or null when the
//! handler could not be built. `destroy_handler` must receive exactly such a
//! pointer and frees it inside the plugin, so that allocation and release
//! happen on the same side of the boundary.
//!
//! Host and plugin must agree on `T` and be built with the same toolchain;
//! nothing at runtime can verify that.

use std::ffi::{c_char, c_int, c_void, CString};
use std::ptr;

/// Major API version used as the host's default baseline.
pub const PLUGIN_API_MAJOR_VERSION: c_int = 1;

/// Minor API version used as the host's default baseline.
pub const PLUGIN_API_MINOR_VERSION: c_int = 0;

/// Symbol name under which plugins export their identity entry point by default.
pub const DEFAULT_IDENTITY_SYMBOL: &str = "plugmgr_plugin_identity";

/// Builds one handler. Null signals a spawn failure.
pub type SpawnHandlerFn = unsafe extern "C" fn() -> *mut c_void;

/// Releases a handler produced by the matching [`SpawnHandlerFn`].
pub type DestroyHandlerFn = unsafe extern "C" fn(handler: *mut c_void);

/// Signature of the exported identity entry point.
pub type IdentityEntryPoint = unsafe extern "C" fn() -> *const RawPluginIdentity;

/// Identity record exported by every plugin.
#[repr(C)]
pub struct RawPluginIdentity {
    /// API major version the plugin was written against
    pub major_version: c_int,

    /// API minor version the plugin was written against
    pub minor_version: c_int,

    /// Operation names, terminated by a null pointer
    pub operations: *const *const c_char,

    /// Handler constructor
    pub spawn_handler: SpawnHandlerFn,

    /// Handler destructor
    pub destroy_handler: DestroyHandlerFn,
}

/// Owned storage behind a [`RawPluginIdentity`].
///
/// The operation names and the null-terminated pointer table live on the heap,
/// so the raw record keeps pointing at them after the cell is moved into a
/// `static`.
pub struct PluginIdentityCell {
    _names: Vec<CString>,
    _table: Vec<*const c_char>,
    raw: RawPluginIdentity,
}

// SAFETY: the cell is immutable after construction and the pointers it holds
// only reference its own heap allocations.
unsafe impl Send for PluginIdentityCell {}
unsafe impl Sync for PluginIdentityCell {}

impl PluginIdentityCell {
    /// Build an identity record.
    ///
    /// Names containing an interior NUL byte cannot cross the boundary and are
    /// left out of the table.
    pub fn new(
        major_version: c_int,
        minor_version: c_int,
        operations: &[&str],
        spawn_handler: SpawnHandlerFn,
        destroy_handler: DestroyHandlerFn,
    ) -> Self {
        let names: Vec<CString> = operations
            .iter()
            .filter_map(|op| CString::new(*op).ok())
            .collect();

        let mut table: Vec<*const c_char> = names.iter().map(|name| name.as_ptr()).collect();
        table.push(ptr::null());

        let raw = RawPluginIdentity {
            major_version,
            minor_version,
            operations: table.as_ptr(),
            spawn_handler,
            destroy_handler,
        };

        Self {
            _names: names,
            _table: table,
            raw,
        }
    }

    /// Pointer handed back to the host from the entry point.
    pub fn as_raw(&self) -> *const RawPluginIdentity {
        &self.raw
    }
}

/// Convert a handler into the pointer shape `spawn_handler` returns.
pub fn handler_into_raw<T: ?Sized>(handler: Box<T>) -> *mut c_void {
    Box::into_raw(Box::new(handler)).cast()
}

/// Reclaim a handler produced by [`handler_into_raw`].
///
/// # Safety
/// `raw` must come from `handler_into_raw::<T>` with the same `T`, and must not
/// be reclaimed twice.
pub unsafe fn handler_from_raw<T: ?Sized>(raw: *mut c_void) -> Box<T> {
    // SAFETY: guaranteed by the caller.
    unsafe { *Box::from_raw(raw.cast::<Box<T>>()) }
}
