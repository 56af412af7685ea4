//! Plugin manager: discovery, version negotiation, registry and teardown.
//!
//! ```text
//! load(dirs) ─► load_dir(dir) ─► load_plugin(file)
//!                                   │ open library      (LibraryOpenFailure)
//!                                   │ resolve identity  (SymbolNotFound / NullIdentity)
//!                                   │ check version     (VersionUnsupported)
//!                                   └ spawn per op      (HandlerSpawnFailure)
//!
//! unload(): destroy every handler via its identity, then close every library
//! ```
//!
//! Failures never propagate out of the load methods. They are reported to the
//! caller's [`ErrorHandler`] and loading moves on to the next operation, file
//! or directory.
//!
//! The manager is single-threaded: it holds raw plugin pointers and is neither
//! `Send` nor `Sync`.

use std::borrow::Cow;
use std::io;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ApiVersion, ManagerConfig};
use crate::error::PluginError;
use crate::error_handler::ErrorHandler;
use crate::library::{LibraryArena, LibraryLoader, LibraryRecord};
use crate::native::NativeLoader;
use crate::registry::{HandlerRegistry, RegistryEntry};
use crate::version::VersionPolicy;

/// Tally of one load call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Candidate files handed to `load_plugin`
    pub found: usize,
    /// Plugins whose version was accepted
    pub loaded: usize,
    /// Plugins rejected by the version policy
    pub rejected: usize,
    /// Plugins that failed to open or produce an identity
    pub failed: usize,
    /// Handlers registered, including ones that displaced an earlier binding
    pub handlers: usize,
}

impl AddAssign for LoadStats {
    fn add_assign(&mut self, other: Self) {
        self.found += other.found;
        self.loaded += other.loaded;
        self.rejected += other.rejected;
        self.failed += other.failed;
        self.handlers += other.handlers;
    }
}

/// Loads plugin libraries and serves their handlers by operation name.
///
/// `T` is the capability interface plugins implement, usually `dyn Trait`.
pub struct PluginManager<T: ?Sized + 'static> {
    config: ManagerConfig,
    policy: Box<dyn VersionPolicy>,
    loader: Box<dyn LibraryLoader<T>>,
    registry: HandlerRegistry<T>,
    libraries: LibraryArena<T>,
}

impl<T: ?Sized + 'static> PluginManager<T> {
    /// Manager with the SDK's default API version as its baseline.
    pub fn new() -> Self {
        Self::from_config(ManagerConfig::default())
    }

    /// Manager with an explicit baseline version.
    pub fn with_version(major: i32, minor: i32) -> Self {
        Self::from_config(ManagerConfig::default().with_api_version(major, minor))
    }

    pub fn from_config(config: ManagerConfig) -> Self {
        Self::with_loader(config, NativeLoader)
    }

    /// Manager that opens libraries through a custom loader.
    pub fn with_loader(config: ManagerConfig, loader: impl LibraryLoader<T> + 'static) -> Self {
        Self {
            policy: Box::new(config.version_match),
            config,
            loader: Box::new(loader),
            registry: HandlerRegistry::new(),
            libraries: LibraryArena::new(),
        }
    }

    /// Replace the compatibility rule.
    pub fn version_policy(mut self, policy: impl VersionPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The baseline plugins are checked against.
    pub fn version(&self) -> ApiVersion {
        self.config.api_version
    }

    pub fn is_version_supported(&self, major: i32, minor: i32) -> bool {
        self.policy
            .is_supported(self.config.api_version, ApiVersion::new(major, minor))
    }

    /// Load every directory in `directories`, in order.
    pub fn load<P: AsRef<Path>>(
        &mut self,
        directories: &[P],
        eh: &mut dyn ErrorHandler,
    ) -> LoadStats {
        let mut stats = LoadStats::default();
        for dir in directories {
            stats += self.load_dir(dir, eh);
        }
        stats
    }

    /// Load every file in `dir` whose name ends with the plugin suffix.
    ///
    /// A missing directory is reported and skipped.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>, eh: &mut dyn ErrorHandler) -> LoadStats {
        let dir = dir.as_ref();
        let mut stats = LoadStats::default();

        if !dir.exists() {
            eh.report(&PluginError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
            return stats;
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                eh.report(&PluginError::DirectoryUnreadable {
                    path: dir.to_path_buf(),
                    message: e.to_string(),
                });
                return stats;
            }
        };

        stats += self.load_entries(dir, entries.map(|entry| entry.map(|e| e.path())), eh);

        debug!(
            "Scanned plugin directory {}: {} candidates, {} handlers",
            dir.display(),
            stats.found,
            stats.handlers
        );
        stats
    }

    /// Load every plugin file among `entries`, reporting entries that could
    /// not be read.
    fn load_entries(
        &mut self,
        dir: &Path,
        entries: impl IntoIterator<Item = io::Result<PathBuf>>,
        eh: &mut dyn ErrorHandler,
    ) -> LoadStats {
        let mut stats = LoadStats::default();
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    eh.report(&PluginError::DirectoryUnreadable {
                        path: dir.to_path_buf(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let is_plugin = path
                .file_name()
                .is_some_and(|name| self.config.is_plugin_file_name(&name.to_string_lossy()));
            if is_plugin {
                stats += self.load_plugin(&path, eh);
            }
        }
        stats
    }

    /// Load a single plugin file.
    ///
    /// The opened library is kept until [`unload`](Self::unload) even when its
    /// version is rejected.
    pub fn load_plugin(&mut self, file: impl AsRef<Path>, eh: &mut dyn ErrorHandler) -> LoadStats {
        let file = file.as_ref();
        let mut stats = LoadStats {
            found: 1,
            ..LoadStats::default()
        };

        let library = match self.loader.open(file) {
            Ok(library) => library,
            Err(e) => {
                eh.report(&PluginError::from_loader(file, e));
                stats.failed = 1;
                return stats;
            }
        };
        let id = self.libraries.push(library);

        if let Err(e) = self
            .libraries
            .resolve_identity(id, &self.config.identity_symbol)
        {
            eh.report(&PluginError::from_loader(file, e));
            stats.failed = 1;
            return stats;
        }

        let Some(identity) = self.libraries.identity(id) else {
            eh.report(&PluginError::NullIdentity {
                path: file.to_path_buf(),
                symbol: self.config.identity_symbol.clone(),
            });
            stats.failed = 1;
            return stats;
        };

        let plugin_version = identity.version();
        if !self
            .policy
            .is_supported(self.config.api_version, plugin_version)
        {
            eh.report(&PluginError::VersionUnsupported {
                path: file.to_path_buf(),
                operations: identity.operations().map(Cow::into_owned).collect(),
                plugin: plugin_version,
                host: self.config.api_version,
            });
            stats.rejected = 1;
            return stats;
        }

        for operation in identity.operations() {
            let Some(handler) = identity.spawn_handler() else {
                eh.report(&PluginError::HandlerSpawnFailure {
                    path: file.to_path_buf(),
                    operation: operation.into_owned(),
                });
                continue;
            };

            debug!("Registered handler '{}' from {}", operation, file.display());
            let displaced = self
                .registry
                .insert(operation.as_ref(), RegistryEntry::new(handler, id));
            if let Some(displaced) = displaced {
                destroy_entry(&self.libraries, &operation, displaced);
            }
            stats.handlers += 1;
        }

        stats.loaded = 1;
        info!(
            "Plugin loaded: {} (version {}, {} handlers)",
            file.display(),
            plugin_version,
            stats.handlers
        );
        stats
    }

    /// Handler registered for `name`.
    pub fn get_handler(&self, name: &str) -> Option<&T> {
        self.registry.get(name)
    }

    pub fn get_handler_mut(&mut self, name: &str) -> Option<&mut T> {
        self.registry.get_mut(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Every registered handler, ordered by operation name.
    pub fn get_all_handlers(&self) -> Vec<&T> {
        self.registry.handlers().collect()
    }

    /// Every registered operation name, in sorted order.
    pub fn get_all_keys(&self) -> Vec<&str> {
        self.registry.keys().collect()
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Number of libraries currently held open.
    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }

    pub fn loaded_libraries(&self) -> Vec<LibraryRecord> {
        self.libraries.records()
    }

    /// Destroy every handler, then release every library.
    ///
    /// Handlers are all destroyed before any library is closed, because a
    /// handler's teardown may call into another plugin's library. The manager
    /// is empty and reusable afterwards.
    pub fn unload(&mut self) {
        let handlers = self.registry.len();
        for (name, entry) in self.registry.drain() {
            destroy_entry(&self.libraries, &name, entry);
        }

        let libraries = self.libraries.release_all();
        info!(
            "Plugins unloaded: {} handlers, {} libraries",
            handlers, libraries
        );
    }
}

impl<T: ?Sized + 'static> Default for PluginManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> Drop for PluginManager<T> {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            self.unload();
        }
    }
}

/// Return a handler to the identity of the library that owns it.
fn destroy_entry<T: ?Sized>(libraries: &LibraryArena<T>, name: &str, entry: RegistryEntry<T>) {
    let (handler, library) = entry.into_parts();
    match libraries.identity(library) {
        Some(identity) => identity.destroy_handler(handler),
        None => {
            // Only reachable if an entry outlived its library; leaking is the
            // one outcome that cannot call into unloaded code.
            tracing::error!(
                "No identity for library {} owning handler '{}'; leaking it",
                library,
                name
            );
        }
    }
}
