//! Command-line interface for inspecting and loading plugin directories.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plugmgr_core::{
    peek, ApiVersion, CollectingErrorHandler, ErrorHandler, LibraryRecord, LoadStats,
    LoggingErrorHandler, ManagerConfig, PluginError, PluginManager, VersionMatch, VersionPolicy,
};
use serde::Serialize;

/// plugmgr - Inspect and load native plugin libraries.
#[derive(Parser, Debug)]
#[command(name = "plugmgr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// TOML file with manager settings.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Host API major version (overrides the config file).
    #[arg(long, global = true)]
    major: Option<i32>,

    /// Host API minor version (overrides the config file).
    #[arg(long, global = true)]
    minor: Option<i32>,

    /// Plugin file-name suffix (overrides the config file).
    #[arg(long, global = true)]
    suffix: Option<String>,

    /// Identity entry point symbol (overrides the config file).
    #[arg(long, global = true)]
    symbol: Option<String>,

    /// Version compatibility rule (overrides the config file).
    #[arg(long = "match", value_enum, global = true)]
    version_match: Option<MatchArg>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List plugin files and their identities without loading handlers.
    List {
        /// Plugin directory to scan (repeatable).
        #[arg(short, long)]
        dir: Vec<PathBuf>,
    },
    /// Show the identity of one plugin file.
    Info {
        /// Path to the plugin file.
        #[arg(required = true)]
        path: PathBuf,
    },
    /// Load plugin directories and print the registered operations.
    Load {
        /// Plugin directory to load (repeatable).
        #[arg(short, long)]
        dir: Vec<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MatchArg {
    Exact,
    Major,
}

impl From<MatchArg> for VersionMatch {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Exact => VersionMatch::Exact,
            MatchArg::Major => VersionMatch::Major,
        }
    }
}

/// Capability type for handlers loaded by the CLI.
///
/// The CLI never calls into a handler. It only registers handlers and hands
/// them back to their plugin on unload, so any plugin's handlers can be loaded
/// regardless of the trait they implement.
trait OpaqueHandler {}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = resolve_config(&args)?;

    match args.command {
        Command::List { ref dir } => list_plugins(&config, &plugin_dirs(dir), args.json),
        Command::Info { ref path } => show_plugin_info(&config, path, args.json),
        Command::Load { ref dir } => load_plugins(config, &plugin_dirs(dir), args.json),
    }
}

fn init_logging(verbose: bool) {
    // JSON logs for production/container environments
    let json_logging = std::env::var("PLUGMGR_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so --json output on stdout stays parseable.
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(args: &Args) -> Result<ManagerConfig> {
    let mut config = match &args.config {
        Some(path) => ManagerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ManagerConfig::default(),
    };

    if let Some(major) = args.major {
        config.api_version.major = major;
    }
    if let Some(minor) = args.minor {
        config.api_version.minor = minor;
    }
    if let Some(suffix) = &args.suffix {
        config.plugin_suffix = suffix.clone();
    }
    if let Some(symbol) = &args.symbol {
        config.identity_symbol = symbol.clone();
    }
    if let Some(version_match) = args.version_match {
        config.version_match = version_match.into();
    }

    tracing::debug!(
        "Host API {} ({:?}), suffix '{}', symbol '{}'",
        config.api_version,
        config.version_match,
        config.plugin_suffix,
        config.identity_symbol
    );
    Ok(config)
}

fn plugin_dirs(dirs: &[PathBuf]) -> Vec<PathBuf> {
    if dirs.is_empty() {
        vec![PathBuf::from("./plugins")]
    } else {
        dirs.to_vec()
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One candidate file found by `list`.
#[derive(Debug, Serialize)]
struct PluginListing {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<ApiVersion>,
    operations: Vec<String>,
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl PluginListing {
    fn inspect(config: &ManagerConfig, path: &Path) -> Self {
        match peek(path, &config.identity_symbol) {
            Ok(info) => Self {
                accepted: config
                    .version_match
                    .is_supported(config.api_version, info.version),
                path: info.path,
                version: Some(info.version),
                operations: info.operations,
                error: None,
            },
            Err(e) => Self {
                path: path.to_path_buf(),
                version: None,
                operations: Vec::new(),
                accepted: false,
                error: Some(PluginError::from_loader(path, e).to_string()),
            },
        }
    }

    fn print(&self) {
        match (&self.version, &self.error) {
            (Some(version), _) => println!(
                "  {}  v{}  [{}]  {}",
                self.path.display(),
                version,
                self.operations.join(", "),
                if self.accepted { "accepted" } else { "rejected" }
            ),
            (None, Some(error)) => println!("  {}  error: {}", self.path.display(), error),
            (None, None) => println!("  {}", self.path.display()),
        }
    }
}

/// Peek at every plugin file in `dirs`.
fn list_plugins(config: &ManagerConfig, dirs: &[PathBuf], json: bool) -> Result<()> {
    let mut listings = Vec::new();
    let mut sink = LoggingErrorHandler;

    for dir in dirs {
        if !dir.exists() {
            sink.report(&PluginError::DirectoryNotFound { path: dir.clone() });
            continue;
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                sink.report(&PluginError::DirectoryUnreadable {
                    path: dir.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) if config.is_plugin_file_name(&entry.file_name().to_string_lossy()) => {
                    files.push(entry.path())
                }
                Ok(_) => {}
                Err(e) => sink.report(&PluginError::DirectoryUnreadable {
                    path: dir.clone(),
                    message: e.to_string(),
                }),
            }
        }
        files.sort();

        listings.extend(
            files
                .iter()
                .map(|path| PluginListing::inspect(config, path)),
        );
    }

    if json {
        return print_json(&listings);
    }

    println!("Discovered Plugins (host API {})", config.api_version);
    println!("==================\n");
    for listing in &listings {
        listing.print();
    }
    println!("\nTotal: {} plugin file(s)", listings.len());
    Ok(())
}

/// Peek at a single plugin file.
fn show_plugin_info(config: &ManagerConfig, path: &Path, json: bool) -> Result<()> {
    let info = peek(path, &config.identity_symbol)
        .map_err(|e| PluginError::from_loader(path, e))
        .with_context(|| format!("Failed to inspect {}", path.display()))?;
    let accepted = config
        .version_match
        .is_supported(config.api_version, info.version);

    if json {
        #[derive(Serialize)]
        struct InfoReport<'a> {
            #[serde(flatten)]
            info: &'a plugmgr_core::PluginInfo,
            accepted: bool,
        }
        return print_json(&InfoReport {
            info: &info,
            accepted,
        });
    }

    println!("Plugin:     {}", info.path.display());
    println!("Version:    {}", info.version);
    println!("Host API:   {} ({})", config.api_version, if accepted { "accepted" } else { "rejected" });
    println!("Operations:");
    for operation in &info.operations {
        println!("  - {}", operation);
    }
    Ok(())
}

/// Error sink that logs every report and keeps a copy for the summary.
#[derive(Default)]
struct Reporter {
    log: LoggingErrorHandler,
    collected: CollectingErrorHandler,
}

impl ErrorHandler for Reporter {
    fn on_plugin_directory_not_found(&mut self, path: &str) {
        self.log.on_plugin_directory_not_found(path);
        self.collected.on_plugin_directory_not_found(path);
    }

    fn on_plugin_load_failed(&mut self, message: &str) {
        self.log.on_plugin_load_failed(message);
        self.collected.on_plugin_load_failed(message);
    }

    fn on_plugin_version_unsupported(&mut self, message: &str) {
        self.log.on_plugin_version_unsupported(message);
        self.collected.on_plugin_version_unsupported(message);
    }

    fn report(&mut self, error: &PluginError) {
        self.log.report(error);
        self.collected.report(error);
    }
}

#[derive(Debug, Serialize)]
struct LoadReport {
    api_version: ApiVersion,
    stats: LoadStats,
    operations: Vec<String>,
    libraries: Vec<LibraryRecord>,
    problems: Vec<String>,
}

/// Run a full load and report what was registered.
fn load_plugins(config: ManagerConfig, dirs: &[PathBuf], json: bool) -> Result<()> {
    let mut manager = PluginManager::<dyn OpaqueHandler>::from_config(config);
    let mut reporter = Reporter::default();

    let stats = manager.load(dirs, &mut reporter);

    let report = LoadReport {
        api_version: manager.version(),
        stats,
        operations: manager
            .get_all_keys()
            .into_iter()
            .map(str::to_string)
            .collect(),
        libraries: manager.loaded_libraries(),
        problems: reporter
            .collected
            .diagnostics()
            .iter()
            .map(|d| d.message.clone())
            .collect(),
    };
    manager.unload();

    if json {
        return print_json(&report);
    }

    println!(
        "Loaded {} of {} plugin(s) against host API {}: {} rejected, {} failed",
        report.stats.loaded,
        report.stats.found,
        report.api_version,
        report.stats.rejected,
        report.stats.failed
    );
    println!("\nOperations ({}):", report.operations.len());
    for operation in &report.operations {
        println!("  - {}", operation);
    }
    if !report.problems.is_empty() {
        println!("\nProblems ({}):", report.problems.len());
        for problem in &report.problems {
            println!("  - {}", problem);
        }
    }
    Ok(())
}
