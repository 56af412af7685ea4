//! Version compatibility rules.

use serde::{Deserialize, Serialize};

use crate::config::ApiVersion;

/// Decides whether a plugin's declared version is acceptable to the host.
///
/// Install a custom policy with
/// [`PluginManager::version_policy`](crate::PluginManager::version_policy).
/// Closures of the form `Fn(host, plugin) -> bool` implement it too.
pub trait VersionPolicy {
    fn is_supported(&self, host: ApiVersion, plugin: ApiVersion) -> bool;
}

impl<F> VersionPolicy for F
where
    F: Fn(ApiVersion, ApiVersion) -> bool,
{
    fn is_supported(&self, host: ApiVersion, plugin: ApiVersion) -> bool {
        self(host, plugin)
    }
}

/// Built-in policies selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionMatch {
    /// Major and minor must both equal the host's
    #[default]
    Exact,
    /// Only the major version must equal the host's
    Major,
}

impl VersionPolicy for VersionMatch {
    fn is_supported(&self, host: ApiVersion, plugin: ApiVersion) -> bool {
        match self {
            VersionMatch::Exact => host == plugin,
            VersionMatch::Major => host.major == plugin.major,
        }
    }
}
