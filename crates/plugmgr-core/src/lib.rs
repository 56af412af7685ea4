//! Dynamic plugin loading and handler registry.
//!
//! A [`PluginManager`] scans directories for plugin libraries, reads each
//! library's identity, checks its API version against the host's baseline,
//! and registers one handler per declared operation name. Handlers implement
//! a capability interface chosen by the application.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── PluginManager<T> ────────────────────────┐
//! │  HandlerRegistry<T>                 LibraryArena<T>              │
//! │  "encode" ─► (Handler<T>, #0) ───►  #0  LoadedLibrary ─► Identity │
//! │  "decode" ─► (Handler<T>, #0)       #1  LoadedLibrary ─► Identity │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Registry entries point at their library by index. Teardown destroys every
//! handler through its identity first, and only then closes the libraries.
//!
//! # Usage
//!
//! ```rust,ignore
//! use plugmgr_core::{LoggingErrorHandler, PluginManager};
//!
//! trait Codec {
//!     fn apply(&self, input: &str) -> String;
//! }
//!
//! let mut manager = PluginManager::<dyn Codec>::with_version(1, 0);
//! manager.load(&["/usr/lib/myapp/plugins"], &mut LoggingErrorHandler);
//!
//! if let Some(codec) = manager.get_handler("encode") {
//!     println!("{}", codec.apply("hello"));
//! }
//! ```
//!
//! Plugins are built with `plugmgr-sdk`.

pub mod config;
pub mod error;
pub mod error_handler;
pub mod identity;
pub mod library;
pub mod manager;
pub mod native;
pub mod registry;
pub mod version;

pub use config::{ApiVersion, ManagerConfig};
pub use error::{ConfigError, LoaderError, PluginError, ReportChannel};
pub use error_handler::{CollectingErrorHandler, Diagnostic, ErrorHandler, LoggingErrorHandler};
pub use identity::{Handler, Identity, Operations};
pub use library::{LibraryArena, LibraryId, LibraryLoader, LibraryRecord, LoadedLibrary};
pub use manager::{LoadStats, PluginManager};
pub use native::{peek, NativeIdentity, NativeLibrary, NativeLoader, PluginInfo};
pub use registry::{HandlerRegistry, RegistryEntry};
pub use version::{VersionMatch, VersionPolicy};
