//! Error sinks for the plugin load path.
//!
//! The manager never decides that a failure is fatal. Every problem it meets
//! is handed to the caller's [`ErrorHandler`]; a sink that wants to stop the
//! application is free to do so, but should not panic across plugin code.

use crate::error::{PluginError, ReportChannel};

/// Receiver for load-path failures.
pub trait ErrorHandler {
    fn on_plugin_directory_not_found(&mut self, path: &str);

    fn on_plugin_load_failed(&mut self, message: &str);

    fn on_plugin_version_unsupported(&mut self, message: &str);

    /// Route a structured error to the matching callback.
    fn report(&mut self, error: &PluginError) {
        match error {
            PluginError::DirectoryNotFound { path } => {
                self.on_plugin_directory_not_found(&path.display().to_string())
            }
            PluginError::VersionUnsupported { .. } => {
                self.on_plugin_version_unsupported(&error.to_string())
            }
            _ => self.on_plugin_load_failed(&error.to_string()),
        }
    }
}

/// Sink that writes every report to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn on_plugin_directory_not_found(&mut self, path: &str) {
        tracing::warn!("Plugin directory not found: {}", path);
    }

    fn on_plugin_load_failed(&mut self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn on_plugin_version_unsupported(&mut self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// One report captured by [`CollectingErrorHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub channel: ReportChannel,
    pub message: String,
    /// Present when the report came through [`ErrorHandler::report`]
    pub error: Option<PluginError>,
}

/// Sink that keeps every report in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingErrorHandler {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Structured errors, in report order.
    pub fn errors(&self) -> impl Iterator<Item = &PluginError> {
        self.diagnostics.iter().filter_map(|d| d.error.as_ref())
    }

    pub fn count(&self, channel: ReportChannel) -> usize {
        self.diagnostics.iter().filter(|d| d.channel == channel).count()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }

    fn push(&mut self, channel: ReportChannel, message: &str) {
        self.diagnostics.push(Diagnostic {
            channel,
            message: message.to_string(),
            error: None,
        });
    }
}

impl ErrorHandler for CollectingErrorHandler {
    fn on_plugin_directory_not_found(&mut self, path: &str) {
        self.push(ReportChannel::DirectoryNotFound, path);
    }

    fn on_plugin_load_failed(&mut self, message: &str) {
        self.push(ReportChannel::LoadFailed, message);
    }

    fn on_plugin_version_unsupported(&mut self, message: &str) {
        self.push(ReportChannel::VersionUnsupported, message);
    }

    fn report(&mut self, error: &PluginError) {
        let message = match error {
            PluginError::DirectoryNotFound { path } => path.display().to_string(),
            _ => error.to_string(),
        };
        self.diagnostics.push(Diagnostic {
            channel: error.channel(),
            message,
            error: Some(error.clone()),
        });
    }
}
