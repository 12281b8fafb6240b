//! Watch mode for automatic rebuilds when character lists change
//!
//! Watches the asset root with debouncing. Each batch of changed `.txt`
//! files selects the auto-updating configurations that use one of them as
//! their character list, and those are rebuilt in order.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::schema::WatchConfig;
use crate::config::{FontConfig, Project};
use crate::dispatch::Dispatcher;
use crate::updater::{run_batch, BatchResult, RebuildContext};

/// Error during watch mode
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize file watcher
    WatcherInit(notify::Error),
    /// Failed to add watch path
    WatchPath(notify::Error),
    /// Channel receive error
    ChannelError(String),
    /// Asset root not found
    RootNotFound(PathBuf),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::WatcherInit(e) => write!(f, "Failed to initialize file watcher: {}", e),
            WatchError::WatchPath(e) => write!(f, "Failed to watch path: {}", e),
            WatchError::ChannelError(msg) => write!(f, "Watch channel error: {}", msg),
            WatchError::RootNotFound(path) => {
                write!(f, "Asset root not found: {}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WatchError::WatcherInit(e) | WatchError::WatchPath(e) => Some(e),
            _ => None,
        }
    }
}

/// Tracks failing configurations across batches to report recoveries
#[derive(Debug, Default)]
pub struct ErrorTracker {
    failing: HashSet<String>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch and return the configurations it fixed.
    ///
    /// Configurations that were not part of the batch keep their state.
    pub fn update(&mut self, result: &BatchResult) -> Vec<String> {
        let mut fixed = Vec::new();
        for outcome in &result.outcomes {
            if outcome.result.is_ok() {
                if self.failing.remove(&outcome.name) {
                    fixed.push(outcome.name.clone());
                }
            } else {
                self.failing.insert(outcome.name.clone());
            }
        }
        fixed
    }

    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.failing.len()
    }
}

/// Options for watch mode
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Directory to watch recursively
    pub root: PathBuf,
    /// Watch configuration (debounce, clear screen)
    pub config: WatchConfig,
    /// Echo each changed file to the console
    pub verbose: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self { root: PathBuf::from("."), config: WatchConfig::default(), verbose: false }
    }
}

/// Clear the terminal screen
fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Character lists are plain `.txt` files.
pub fn is_relevant_file(path: &Path) -> bool {
    path.extension().map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("txt")).unwrap_or(false)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Auto-updating configurations whose character list is among `changed`,
/// in config order. Paths that no longer exist are ignored, so deleting a
/// list never queues a rebuild.
pub fn affected_configs(project: &Project, changed: &[PathBuf]) -> Vec<(String, FontConfig)> {
    let present: Vec<&PathBuf> = changed.iter().filter(|path| path.is_file()).collect();
    if present.is_empty() {
        return Vec::new();
    }

    project
        .auto_update_fonts()
        .into_iter()
        .filter(|(_, font)| {
            let list = project.resolve(&font.character_list);
            present.iter().any(|path| same_file(path, &list))
        })
        .collect()
}

/// Rebuild the given configurations and print the outcome.
fn rebuild(
    dispatcher: &mut Dispatcher,
    ctx: &RebuildContext,
    fonts: Vec<(String, FontConfig)>,
    tracker: &mut ErrorTracker,
) {
    println!("[{}] Rebuilding {} font asset(s)...", timestamp(), fonts.len());
    let result = run_batch(dispatcher, ctx, fonts);
    let fixed = tracker.update(&result);
    print_batch_result(&result, &fixed);
}

/// Watch for character-list changes and rebuild automatically.
///
/// Blocks until the watcher channel closes.
pub fn watch_and_rebuild(
    project: &Project,
    options: WatchOptions,
    ctx: RebuildContext,
    dispatcher: &mut Dispatcher,
) -> Result<(), WatchError> {
    if !options.root.exists() {
        return Err(WatchError::RootNotFound(options.root.clone()));
    }

    let (tx, rx) = channel();

    let debounce_duration = Duration::from_millis(options.config.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce_duration, tx).map_err(WatchError::WatcherInit)?;

    debouncer
        .watcher()
        .watch(&options.root, RecursiveMode::Recursive)
        .map_err(WatchError::WatchPath)?;

    let mut tracker = ErrorTracker::new();
    let auto = project.auto_update_fonts();
    if auto.is_empty() {
        warn!("no font configuration has auto_update enabled");
    }
    for (name, font) in &auto {
        debug!(font = %name, list = %font.character_list.display(), "watching character list");
    }
    println!("[{}] Watching {} for changes...", timestamp(), options.root.display());

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<PathBuf> = events
                    .iter()
                    .filter(|e| {
                        matches!(e.kind, DebouncedEventKind::Any) && is_relevant_file(&e.path)
                    })
                    .map(|e| e.path.clone())
                    .collect();

                if changed.is_empty() {
                    continue;
                }

                for path in &changed {
                    info!(path = %path.display(), "character list changed");
                    if options.verbose {
                        println!("[{}] Changed: {}", timestamp(), path.display());
                    }
                }

                let fonts = affected_configs(project, &changed);
                if fonts.is_empty() {
                    debug!("no auto-updating configuration uses the changed files");
                    continue;
                }

                if options.config.clear_screen {
                    clear_screen();
                }
                rebuild(dispatcher, &ctx, fonts, &mut tracker);
                println!("[{}] Watching {} for changes...", timestamp(), options.root.display());
            }
            Ok(Err(error)) => {
                warn!(error = ?error, "watch error, continuing");
            }
            Err(e) => {
                return Err(WatchError::ChannelError(e.to_string()));
            }
        }
    }
}

/// Print batch result to console with recovery notifications
fn print_batch_result(result: &BatchResult, fixed: &[String]) {
    for name in fixed {
        println!("[{}] Fixed: {}", timestamp(), name);
    }

    if result.is_success() {
        println!(
            "[{}] Rebuild complete ({}) - Fonts: {}",
            timestamp(),
            format_duration(result.duration),
            result.succeeded()
        );
    } else {
        let failed = result.failed();
        println!(
            "[{}] Rebuild failed ({}) - {} error{}",
            timestamp(),
            format_duration(result.duration),
            failed,
            if failed == 1 { "" } else { "s" }
        );
        for outcome in &result.outcomes {
            if let Err(err) = &outcome.result {
                eprintln!("[{}] Error in {}: {}", timestamp(), outcome.name, err);
            }
        }
    }
}
