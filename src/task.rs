//! Sequential task runner
//!
//! Runs a pre-built list of asynchronous units strictly one after another.
//! Each unit receives a [`Continuation`] and must fire it once to let the
//! next unit start. The runner has no notion of failure: a unit that never
//! fires its continuation stalls the queue, and there is no timeout.
//!
//! # Example
//!
//! ```ignore
//! let mut dispatcher = Dispatcher::new();
//! let runner = TaskRunner::new(dispatcher.handle());
//! runner.enqueue(|next| { println!("first"); next.resume(); });
//! runner.enqueue(|next| { println!("second"); next.resume(); });
//! runner.run(|| println!("all done"));
//! dispatcher.pump();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::dispatch::DispatchHandle;

/// A deferred operation that signals completion through its continuation.
pub type TaskUnit = Box<dyn FnOnce(Continuation) + Send>;

type Completion = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct RunnerState {
    /// Pending units. Slots are emptied as units are handed out.
    units: Vec<Option<TaskUnit>>,
    running: bool,
    on_complete: Option<Completion>,
}

/// Ordered queue of asynchronous units, executed one at a time.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct TaskRunner {
    state: Arc<Mutex<RunnerState>>,
    dispatch: DispatchHandle,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TaskRunner")
            .field("units", &state.units.len())
            .field("running", &state.running)
            .finish()
    }
}

impl TaskRunner {
    /// Create an empty runner whose continuations advance on `dispatch`.
    pub fn new(dispatch: DispatchHandle) -> Self {
        Self { state: Arc::new(Mutex::new(RunnerState::default())), dispatch }
    }

    /// Append a unit. Ignored while a run is in progress.
    pub fn enqueue<F>(&self, unit: F)
    where
        F: FnOnce(Continuation) + Send + 'static,
    {
        self.enqueue_opt(Some(Box::new(unit)));
    }

    /// Append a unit if present. Absent units and units offered while a run
    /// is in progress are silently dropped.
    pub fn enqueue_opt(&self, unit: Option<TaskUnit>) {
        let Some(unit) = unit else {
            return;
        };

        let mut state = self.lock();
        if state.running {
            tracing::debug!("task runner busy, dropping enqueued unit");
            return;
        }
        state.units.push(Some(unit));
    }

    /// Number of units queued for the next (or current) run.
    pub fn len(&self) -> usize {
        self.lock().units.len()
    }

    /// Check whether no units are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Start executing the queued units in order.
    ///
    /// With nothing queued, `on_all_complete` runs synchronously before this
    /// returns. Otherwise the first unit starts immediately and each later
    /// unit starts on the dispatcher's thread once its predecessor's
    /// continuation fires. Calling `run` while already running is ignored.
    pub fn run<F>(&self, on_all_complete: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.lock();
            if state.running {
                tracing::warn!("task runner already running, ignoring run request");
                return;
            }
            if state.units.is_empty() {
                drop(state);
                on_all_complete();
                return;
            }
            state.running = true;
            state.on_complete = Some(Box::new(on_all_complete));
        }

        self.step(0);
    }

    fn step(&self, index: usize) {
        let unit = {
            let mut state = self.lock();
            if index >= state.units.len() {
                let on_complete = state.on_complete.take();
                state.units.clear();
                drop(state);

                if let Some(on_complete) = on_complete {
                    on_complete();
                }
                self.lock().running = false;
                return;
            }
            state.units[index].take()
        };

        match unit {
            Some(unit) => unit(Continuation::new(self.clone(), index)),
            None => self.step(index + 1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunnerState> {
        // A panicking unit poisons nothing we can't keep using.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct ContinuationInner {
    fired: AtomicBool,
    runner: TaskRunner,
    index: usize,
}

/// One-shot signal that a task unit has finished.
///
/// Clones share the same one-shot flag, so only the first
/// [`resume`](Continuation::resume) across all clones advances the runner.
#[derive(Clone)]
pub struct Continuation {
    inner: Arc<ContinuationInner>,
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Continuation")
            .field("index", &self.inner.index)
            .field("fired", &self.is_fired())
            .finish()
    }
}

impl Continuation {
    fn new(runner: TaskRunner, index: usize) -> Self {
        Self { inner: Arc::new(ContinuationInner { fired: AtomicBool::new(false), runner, index }) }
    }

    /// Signal completion and schedule the next unit.
    ///
    /// Returns `false` (and does nothing) if this continuation already fired.
    pub fn resume(&self) -> bool {
        if self.inner.fired.swap(true, Ordering::SeqCst) {
            tracing::debug!(unit = self.inner.index, "continuation fired twice, ignoring");
            return false;
        }

        let runner = self.inner.runner.clone();
        let next = self.inner.index + 1;
        if !self.inner.runner.dispatch.post(move || runner.step(next)) {
            tracing::warn!(unit = self.inner.index, "dispatcher dropped, task chain cannot advance");
        }
        true
    }

    /// Check whether this continuation has already fired.
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Index of the unit this continuation belongs to.
    pub fn index(&self) -> usize {
        self.inner.index
    }
}
