//! plugmgr plugin SDK
//!
//! Types and macros for building plugin libraries that a `plugmgr` host can
//! discover and load.
//!
//! A plugin is a `cdylib` that exports one identity entry point. The identity
//! declares the API version the plugin targets, the operation names it serves,
//! and how to build and release a handler for the host's capability trait.
//!
//! ```toml
//! [lib]
//! crate-type = ["cdylib"]
//! ```
//!
//! See [`declare_plugin_identity!`] for the export side and [`abi`] for the
//! exact record layout.

pub mod abi;
#[macro_use]
pub mod macros;

pub use abi::{
    DEFAULT_IDENTITY_SYMBOL, DestroyHandlerFn, IdentityEntryPoint, PLUGIN_API_MAJOR_VERSION,
    PLUGIN_API_MINOR_VERSION, PluginIdentityCell, RawPluginIdentity, SpawnHandlerFn,
};
