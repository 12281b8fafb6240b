//! Sequential rebuild of several configurations

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::FontConfig;
use crate::dispatch::Dispatcher;
use crate::progress::{ProgressEvent, ProgressTracker, RebuildStatus};
use crate::task::TaskRunner;

use super::{FontAssetUpdater, RebuildContext, RebuildError, RebuildSummary};

/// How one configuration's rebuild ended.
#[derive(Debug)]
pub struct RebuildOutcome {
    pub name: String,
    pub result: Result<RebuildSummary, RebuildError>,
}

impl RebuildOutcome {
    pub fn status(&self) -> RebuildStatus {
        match &self.result {
            Ok(_) => RebuildStatus::Success,
            Err(e) => RebuildStatus::Failed(e.to_string()),
        }
    }
}

/// Outcomes of a batch, in the order the rebuilds ran.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<RebuildOutcome>,
    pub duration: Duration,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.outcomes.iter().filter(|o| o.result.is_err()).map(|o| o.name.as_str()).collect()
    }
}

/// Rebuild `fonts` one after another and block until all have completed.
///
/// `ctx.dispatch` must belong to `dispatcher`; it is pumped on the calling
/// thread until the chain finishes.
pub fn run_batch(
    dispatcher: &mut Dispatcher,
    ctx: &RebuildContext,
    fonts: Vec<(String, FontConfig)>,
) -> BatchResult {
    let mut tracker = ProgressTracker::new();
    tracker.start(fonts.len());
    ctx.reporter.report(ProgressEvent::BatchStarted { total: fonts.len() });

    let outcomes: Arc<Mutex<Vec<RebuildOutcome>>> = Arc::new(Mutex::new(Vec::new()));
    let runner = TaskRunner::new(ctx.dispatch.clone());

    for (name, config) in fonts {
        let ctx = ctx.clone();
        let outcomes = Arc::clone(&outcomes);
        runner.enqueue(move |next| {
            FontAssetUpdater::new(ctx, name.clone(), config).start(move |result| {
                if let Ok(mut outcomes) = outcomes.lock() {
                    outcomes.push(RebuildOutcome { name, result });
                }
                next.resume();
            });
        });
    }

    let done = Arc::new(AtomicBool::new(false));
    {
        let done = Arc::clone(&done);
        runner.run(move || done.store(true, Ordering::SeqCst));
    }
    dispatcher.run_until(|| done.load(Ordering::SeqCst));
    dispatcher.pump();

    let outcomes = match outcomes.lock() {
        Ok(mut outcomes) => mem::take(&mut *outcomes),
        Err(poisoned) => mem::take(&mut *poisoned.into_inner()),
    };
    for outcome in &outcomes {
        tracker.record(&outcome.status());
    }
    ctx.reporter.report(tracker.batch_completed_event());

    BatchResult { outcomes, duration: tracker.elapsed() }
}
