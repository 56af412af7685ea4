//! Error types for plugin loading.
//!
//! Nothing in the load path returns these to the caller. They are built by the
//! manager and handed to an [`ErrorHandler`](crate::ErrorHandler), which decides
//! what a failure means for the application.

use std::path::PathBuf;

use crate::config::ApiVersion;

/// A recoverable failure encountered while loading plugins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// A requested scan directory does not exist.
    #[error("Plugin directory not found: {}", .path.display())]
    DirectoryNotFound { path: PathBuf },

    /// The directory exists but could not be enumerated.
    #[error("Failed to read plugin directory {}: {message}", .path.display())]
    DirectoryUnreadable { path: PathBuf, message: String },

    /// The loader could not open or link a candidate file.
    #[error("Failed to load plugin {}: {message}", .path.display())]
    LibraryOpenFailure { path: PathBuf, message: String },

    /// The loader could not unload a library it had opened.
    #[error("Failed to unload plugin {}: {message}", .path.display())]
    LibraryCloseFailure { path: PathBuf, message: String },

    /// The library does not export the identity entry point.
    #[error("Plugin {} does not export '{symbol}': {message}", .path.display())]
    SymbolNotFound {
        path: PathBuf,
        symbol: String,
        message: String,
    },

    /// The identity entry point returned a null pointer.
    #[error("Identity entry point '{symbol}' in {} returned null", .path.display())]
    NullIdentity { path: PathBuf, symbol: String },

    /// The plugin's declared version was rejected by the version policy.
    #[error(
        "For plugin {} supporting ops {} version [{plugin}] not supported ({host})",
        .path.display(),
        .operations.join(":")
    )]
    VersionUnsupported {
        path: PathBuf,
        operations: Vec<String>,
        plugin: ApiVersion,
        host: ApiVersion,
    },

    /// One operation's handler could not be constructed.
    #[error("Failed to spawn handler for '{operation}' from plugin {}", .path.display())]
    HandlerSpawnFailure { path: PathBuf, operation: String },
}

/// Which [`ErrorHandler`](crate::ErrorHandler) callback a failure is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportChannel {
    /// `on_plugin_directory_not_found`
    DirectoryNotFound,
    /// `on_plugin_load_failed`
    LoadFailed,
    /// `on_plugin_version_unsupported`
    VersionUnsupported,
}

impl PluginError {
    /// Callback this error is delivered through.
    pub fn channel(&self) -> ReportChannel {
        match self {
            PluginError::DirectoryNotFound { .. } => ReportChannel::DirectoryNotFound,
            PluginError::VersionUnsupported { .. } => ReportChannel::VersionUnsupported,
            _ => ReportChannel::LoadFailed,
        }
    }

    /// Attach the plugin path to a loader failure.
    pub fn from_loader(path: impl Into<PathBuf>, error: LoaderError) -> Self {
        let path = path.into();
        match error {
            LoaderError::Open { message } => PluginError::LibraryOpenFailure { path, message },
            LoaderError::Close { message } => PluginError::LibraryCloseFailure { path, message },
            LoaderError::Symbol { symbol, message } => PluginError::SymbolNotFound {
                path,
                symbol,
                message,
            },
            LoaderError::NullIdentity { symbol } => PluginError::NullIdentity { path, symbol },
        }
    }
}

/// Failure reported by a [`LibraryLoader`](crate::LibraryLoader) or
/// [`LoadedLibrary`](crate::LoadedLibrary).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoaderError {
    #[error("{message}")]
    Open { message: String },

    #[error("symbol '{symbol}' not found: {message}")]
    Symbol { symbol: String, message: String },

    #[error("identity entry point '{symbol}' returned null")]
    NullIdentity { symbol: String },

    #[error("failed to close library: {message}")]
    Close { message: String },
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
