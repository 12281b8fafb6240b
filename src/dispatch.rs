//! Owner-thread dispatcher
//!
//! Rebuild state is only ever touched from the thread that owns the
//! [`Dispatcher`]. Worker threads hand results back by posting closures
//! through a cloneable [`DispatchHandle`]; the owner runs them in the order
//! they were posted. Update hooks run once per tick and are where render
//! progress gets polled.
//!
//! # Example
//!
//! ```ignore
//! let mut dispatcher = Dispatcher::new();
//! let handle = dispatcher.handle();
//! std::thread::spawn(move || {
//!     handle.post(|| println!("back on the owner thread"));
//! });
//! dispatcher.run_until(|| false);
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A unit of work executed on the owner thread.
pub type Job = Box<dyn FnOnce() + Send>;

/// A hook invoked on every dispatcher tick.
pub type UpdateHook = Box<dyn FnMut() + Send>;

/// Default interval between update-hook ticks.
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

/// Identifies a registered update hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(u64);

enum Message {
    Call(Job),
    AddHook(HookId, UpdateHook),
    RemoveHook(HookId),
}

/// Sending side of the dispatcher. Cheap to clone and safe to move to
/// worker threads.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: Sender<Message>,
    next_hook: Arc<AtomicU64>,
}

impl std::fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHandle").finish_non_exhaustive()
    }
}

impl DispatchHandle {
    /// Queue a job for the owner thread.
    ///
    /// Returns `false` if the dispatcher has been dropped and the job will
    /// never run.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Message::Call(Box::new(job))).is_ok()
    }

    /// Register a hook that runs on every tick until removed.
    pub fn add_update_hook<F>(&self, hook: F) -> HookId
    where
        F: FnMut() + Send + 'static,
    {
        let id = HookId(self.next_hook.fetch_add(1, Ordering::SeqCst));
        if self.tx.send(Message::AddHook(id, Box::new(hook))).is_err() {
            tracing::debug!(hook = id.0, "dispatcher gone, update hook dropped");
        }
        id
    }

    /// Remove a previously registered hook. Unknown ids are ignored.
    pub fn remove_update_hook(&self, id: HookId) {
        let _ = self.tx.send(Message::RemoveHook(id));
    }
}

/// Receiving side, owned by the thread that mutates rebuild state.
pub struct Dispatcher {
    rx: Receiver<Message>,
    handle: DispatchHandle,
    hooks: BTreeMap<HookId, UpdateHook>,
    tick: Duration,
    last_tick: Instant,
}

impl Dispatcher {
    /// Create a dispatcher with the default tick interval.
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            rx,
            handle: DispatchHandle { tx, next_hook: Arc::new(AtomicU64::new(0)) },
            hooks: BTreeMap::new(),
            tick: DEFAULT_TICK,
            last_tick: Instant::now(),
        }
    }

    /// Set the interval between update-hook ticks.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Get a handle for posting work to this dispatcher.
    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Number of registered update hooks.
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Run every queued job without blocking, including jobs posted by the
    /// jobs themselves. Returns the number of jobs executed.
    pub fn pump(&mut self) -> usize {
        let mut executed = 0;
        while let Ok(message) = self.rx.try_recv() {
            if self.handle_message(message) {
                executed += 1;
            }
        }
        executed
    }

    /// Run update hooks once, regardless of the tick interval.
    pub fn tick(&mut self) {
        self.last_tick = Instant::now();
        for hook in self.hooks.values_mut() {
            hook();
        }
    }

    /// Block and dispatch until `done` returns true.
    ///
    /// `done` is checked before waiting and after every message, so a job
    /// that flips the condition ends the loop immediately.
    pub fn run_until<F>(&mut self, mut done: F)
    where
        F: FnMut() -> bool,
    {
        loop {
            if done() {
                return;
            }

            match self.rx.recv_timeout(self.tick) {
                Ok(message) => {
                    self.handle_message(message);
                    if self.last_tick.elapsed() >= self.tick {
                        self.tick();
                    }
                }
                Err(RecvTimeoutError::Timeout) => self.tick(),
                // The dispatcher holds its own sender, so this only happens
                // during teardown.
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::Call(job) => {
                job();
                true
            }
            Message::AddHook(id, hook) => {
                self.hooks.insert(id, hook);
                false
            }
            Message::RemoveHook(id) => {
                self.hooks.remove(&id);
                false
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
