//! Rebuild progress reporting.
//!
//! Reporters receive events from the rebuild pipeline: batch boundaries,
//! per-font start and completion, render progress, the glyph report and
//! asset change notifications. Console and JSON-lines formats are provided.
//!
//! # Example
//!
//! ```ignore
//! use atlaswatch::progress::{ConsoleProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::BatchStarted { total: 2 });
//! reporter.report(ProgressEvent::RebuildStarted { name: "body".to_string() });
//! ```

use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of one font rebuild in progress events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildStatus {
    Success,
    Failed(String),
}

impl std::fmt::Display for RebuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RebuildStatus::Success => write!(f, "success"),
            RebuildStatus::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Events reported while rebuilding font assets.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A batch of rebuilds was queued
    BatchStarted { total: usize },
    /// A font configuration started rebuilding
    RebuildStarted { name: String },
    /// Render progress polled from the engine, in `[0, 1]`
    RenderProgress { name: String, fraction: f32 },
    /// Glyph packing summary for a finished render
    GlyphReport { name: String, requested: usize, packed: usize, missing: usize },
    /// A font asset was written
    AssetUpdated { name: String, path: PathBuf, created: bool },
    /// A font configuration finished, successfully or not
    RebuildCompleted { name: String, status: RebuildStatus, duration_ms: u64 },
    /// Every queued rebuild has completed
    BatchCompleted { succeeded: usize, failed: usize, duration_ms: u64 },
    Warning { name: Option<String>, message: String },
    Error { name: Option<String>, message: String },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// A progress reporter that keeps every event, for inspection after a run.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    use_colors: bool,
    verbose: bool,
    /// Completed rebuilds in the current batch
    current: AtomicUsize,
    /// Size of the current batch
    total: AtomicUsize,
    /// Output writer (for testing)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a new console progress reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn bold(&self, text: &str) -> String {
        self.color(text, "\x1b[1m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { total } => {
                self.total.store(total, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                if total > 0 {
                    self.writeln(&format!(
                        "{} Rebuilding {} font asset{}...",
                        self.cyan("[atlas]"),
                        total,
                        if total == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::RebuildStarted { name } => {
                if self.verbose {
                    let current = self.current.load(Ordering::SeqCst) + 1;
                    let total = self.total.load(Ordering::SeqCst);
                    self.writeln(&format!(
                        "{} [{}/{}] Rendering {}...",
                        self.cyan("[atlas]"),
                        current,
                        total,
                        name
                    ));
                }
            }
            ProgressEvent::RenderProgress { name, fraction } => {
                if self.verbose {
                    self.writeln(&format!(
                        "{} {} {:>3.0}%",
                        self.cyan("[render]"),
                        name,
                        fraction.clamp(0.0, 1.0) * 100.0
                    ));
                }
            }
            ProgressEvent::GlyphReport { name, requested, packed, missing } => {
                let line = format!("{}: packed {} of {} characters", name, packed, requested);
                if missing > 0 {
                    self.writeln(&format!(
                        "{} {} ({} missing)",
                        self.yellow("[glyphs]"),
                        line,
                        missing
                    ));
                } else if self.verbose {
                    self.writeln(&format!("{} {}", self.cyan("[glyphs]"), line));
                }
            }
            ProgressEvent::AssetUpdated { name, path, created } => {
                self.writeln(&format!(
                    "{} {}: {} {}",
                    self.green("[saved]"),
                    name,
                    if created { "created" } else { "updated" },
                    path.display()
                ));
            }
            ProgressEvent::RebuildCompleted { name, status, duration_ms } => {
                self.current.fetch_add(1, Ordering::SeqCst);
                let current = self.current.load(Ordering::SeqCst);
                let total = self.total.load(Ordering::SeqCst);

                let status_str = match &status {
                    RebuildStatus::Success => self.green("ok"),
                    RebuildStatus::Failed(_) => self.red("FAILED"),
                };

                self.writeln(&format!(
                    "{} [{}/{}] {} {} ({})",
                    self.cyan("[atlas]"),
                    current,
                    total,
                    status_str,
                    name,
                    format_duration(duration_ms)
                ));

                if let RebuildStatus::Failed(err) = status {
                    self.writeln(&format!("        {}", self.red(&err)));
                }
            }
            ProgressEvent::BatchCompleted { succeeded, failed, duration_ms } => {
                let duration_str = format_duration(duration_ms);
                if failed == 0 {
                    self.writeln(&format!(
                        "\n{} {} font asset{} rebuilt in {}",
                        self.green("[done]"),
                        self.bold(&succeeded.to_string()),
                        if succeeded == 1 { "" } else { "s" },
                        duration_str
                    ));
                } else {
                    self.writeln(&format!(
                        "\n{} Rebuild failed: {} succeeded, {} {} in {}",
                        self.red("[error]"),
                        succeeded,
                        failed,
                        if failed == 1 { "failure" } else { "failures" },
                        duration_str
                    ));
                }
            }
            ProgressEvent::Warning { name, message } => {
                let prefix = name.map(|n| format!("{}: ", n)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), prefix, message));
            }
            ProgressEvent::Error { name, message } => {
                let prefix = name.map(|n| format!("{}: ", n)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.red("[error]"), prefix, message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// JSON-lines progress reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }

    fn write_json(&self, value: serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let value = match event {
            ProgressEvent::BatchStarted { total } => {
                json!({ "event": "batch_started", "total": total })
            }
            ProgressEvent::RebuildStarted { name } => {
                json!({ "event": "rebuild_started", "name": name })
            }
            ProgressEvent::RenderProgress { name, fraction } => {
                json!({ "event": "render_progress", "name": name, "fraction": fraction })
            }
            ProgressEvent::GlyphReport { name, requested, packed, missing } => json!({
                "event": "glyph_report",
                "name": name,
                "requested": requested,
                "packed": packed,
                "missing": missing,
            }),
            ProgressEvent::AssetUpdated { name, path, created } => json!({
                "event": "asset_updated",
                "name": name,
                "path": path.to_string_lossy(),
                "created": created,
            }),
            ProgressEvent::RebuildCompleted { name, status, duration_ms } => {
                let mut value = json!({
                    "event": "rebuild_completed",
                    "name": name,
                    "status": match &status {
                        RebuildStatus::Success => "success",
                        RebuildStatus::Failed(_) => "failed",
                    },
                    "duration_ms": duration_ms,
                });
                if let RebuildStatus::Failed(e) = status {
                    value["error"] = json!(e);
                }
                value
            }
            ProgressEvent::BatchCompleted { succeeded, failed, duration_ms } => json!({
                "event": "batch_completed",
                "success": failed == 0,
                "succeeded": succeeded,
                "failed": failed,
                "duration_ms": duration_ms,
            }),
            ProgressEvent::Warning { name, message } => {
                json!({ "event": "warning", "name": name, "message": message })
            }
            ProgressEvent::Error { name, message } => {
                json!({ "event": "error", "name": name, "message": message })
            }
        };
        self.write_json(value);
    }
}

/// Aggregates statistics over one batch of rebuilds.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    start_time: Option<Instant>,
    total: usize,
    succeeded: usize,
    failed: usize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a batch.
    pub fn start(&mut self, total: usize) {
        self.start_time = Some(Instant::now());
        self.total = total;
        self.succeeded = 0;
        self.failed = 0;
    }

    pub fn record(&mut self, status: &RebuildStatus) {
        match status {
            RebuildStatus::Success => self.succeeded += 1,
            RebuildStatus::Failed(_) => self.failed += 1,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded + self.failed >= self.total
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Generate a BatchCompleted event from current state.
    pub fn batch_completed_event(&self) -> ProgressEvent {
        ProgressEvent::BatchCompleted {
            succeeded: self.succeeded,
            failed: self.failed,
            duration_ms: self.elapsed_ms(),
        }
    }
}

/// Format a duration in milliseconds to a human-readable string.
fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}
