//! In-memory plugin libraries for manager tests.
//!
//! `FakeLoader` maps file names to `FakePlugin` descriptions and records every
//! open, spawn, destroy and release in a shared event log, so tests can check
//! ordering and leaks without building real shared objects.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use plugmgr_core::{
    Handler, Identity, LibraryLoader, LoadedLibrary, LoaderError, ManagerConfig, Operations,
};
use plugmgr_sdk::DEFAULT_IDENTITY_SYMBOL;
use tempfile::TempDir;

pub const SUFFIX: &str = ".plugin";

/// Capability interface used by the tests.
pub trait Codec {
    fn plugin(&self) -> &str;
    fn apply(&self, input: &str) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Opened(String),
    Spawned(String),
    Destroyed(String),
    Released(String),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn count(events: &EventLog, matcher: impl Fn(&Event) -> bool) -> usize {
    events.borrow().iter().filter(|e| matcher(e)).count()
}

/// Handlers spawned and not yet destroyed.
pub fn live_handlers(events: &EventLog) -> usize {
    let spawned = count(events, |e| matches!(e, Event::Spawned(_)));
    let destroyed = count(events, |e| matches!(e, Event::Destroyed(_)));
    spawned - destroyed
}

/// Libraries opened and not yet released.
pub fn live_libraries(events: &EventLog) -> usize {
    let opened = count(events, |e| matches!(e, Event::Opened(_)));
    let released = count(events, |e| matches!(e, Event::Released(_)));
    opened - released
}

pub fn config() -> ManagerConfig {
    ManagerConfig::default()
        .with_api_version(1, 0)
        .with_plugin_suffix(SUFFIX)
}

/// Create a scratch directory holding empty files with the given names.
pub fn plugin_dir(files: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in files {
        fs::write(dir.path().join(file), b"").unwrap();
    }
    dir
}

#[derive(Debug, Clone)]
pub struct FakePlugin {
    pub name: &'static str,
    pub version: (i32, i32),
    pub operations: Vec<&'static str>,
    /// Zero-based spawn calls that return no handler
    pub failing_spawns: Vec<usize>,
    pub symbol: &'static str,
    pub null_identity: bool,
}

impl FakePlugin {
    pub fn new(name: &'static str, version: (i32, i32), operations: &[&'static str]) -> Self {
        Self {
            name,
            version,
            operations: operations.to_vec(),
            failing_spawns: Vec::new(),
            symbol: DEFAULT_IDENTITY_SYMBOL,
            null_identity: false,
        }
    }

    pub fn failing_spawn(mut self, call: usize) -> Self {
        self.failing_spawns.push(call);
        self
    }

    pub fn exporting(mut self, symbol: &'static str) -> Self {
        self.symbol = symbol;
        self
    }

    pub fn with_null_identity(mut self) -> Self {
        self.null_identity = true;
        self
    }
}

struct FakeCodec {
    plugin: &'static str,
}

impl Codec for FakeCodec {
    fn plugin(&self) -> &str {
        self.plugin
    }

    fn apply(&self, input: &str) -> String {
        format!("{}({})", self.plugin, input)
    }
}

pub struct FakeLoader {
    plugins: HashMap<String, FakePlugin>,
    events: EventLog,
}

impl FakeLoader {
    pub fn new(events: &EventLog) -> Self {
        Self {
            plugins: HashMap::new(),
            events: Rc::clone(events),
        }
    }

    pub fn with_plugin(mut self, file_name: &str, plugin: FakePlugin) -> Self {
        self.plugins.insert(file_name.to_string(), plugin);
        self
    }
}

impl LibraryLoader<dyn Codec> for FakeLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedLibrary<dyn Codec>>, LoaderError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let plugin = self
            .plugins
            .get(&file_name)
            .cloned()
            .ok_or_else(|| LoaderError::Open {
                message: format!("{}: invalid ELF header", path.display()),
            })?;

        self.events
            .borrow_mut()
            .push(Event::Opened(plugin.name.to_string()));

        Ok(Box::new(FakeLibrary {
            path: path.to_path_buf(),
            plugin,
            identity: None,
            events: Rc::clone(&self.events),
        }))
    }
}

struct FakeLibrary {
    path: PathBuf,
    plugin: FakePlugin,
    identity: Option<FakeIdentity>,
    events: EventLog,
}

impl LoadedLibrary<dyn Codec> for FakeLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve_identity(&mut self, symbol: &str) -> Result<(), LoaderError> {
        if symbol != self.plugin.symbol {
            return Err(LoaderError::Symbol {
                symbol: symbol.to_string(),
                message: "undefined symbol".to_string(),
            });
        }
        if self.plugin.null_identity {
            return Err(LoaderError::NullIdentity {
                symbol: symbol.to_string(),
            });
        }

        self.identity = Some(FakeIdentity {
            plugin: self.plugin.clone(),
            calls: Cell::new(0),
            events: Rc::clone(&self.events),
        });
        Ok(())
    }

    fn identity(&self) -> Option<&dyn Identity<dyn Codec>> {
        self.identity
            .as_ref()
            .map(|identity| identity as &dyn Identity<dyn Codec>)
    }

    fn close(self: Box<Self>) -> Result<(), LoaderError> {
        Ok(())
    }
}

impl Drop for FakeLibrary {
    fn drop(&mut self) {
        self.events
            .borrow_mut()
            .push(Event::Released(self.plugin.name.to_string()));
    }
}

struct FakeIdentity {
    plugin: FakePlugin,
    calls: Cell<usize>,
    events: EventLog,
}

impl Identity<dyn Codec> for FakeIdentity {
    fn major_version(&self) -> i32 {
        self.plugin.version.0
    }

    fn minor_version(&self) -> i32 {
        self.plugin.version.1
    }

    fn operations(&self) -> Operations<'_> {
        Operations::from_slice(&self.plugin.operations)
    }

    fn spawn_handler(&self) -> Option<Handler<dyn Codec>> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if self.plugin.failing_spawns.contains(&call) {
            return None;
        }

        self.events
            .borrow_mut()
            .push(Event::Spawned(self.plugin.name.to_string()));
        Some(Handler::new(Box::new(FakeCodec {
            plugin: self.plugin.name,
        })))
    }

    fn destroy_handler(&self, handler: Handler<dyn Codec>) {
        // SAFETY: every handler of this identity came from `Handler::new`.
        let codec = unsafe { handler.into_box() };
        self.events
            .borrow_mut()
            .push(Event::Destroyed(codec.plugin().to_string()));
    }
}
