use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildwatch::errors::CountFailure;
use buildwatch::exec::{CountOutcome, ProcessCounter};
use buildwatch::types::{ProcessPattern, UserScope};
use tokio::time::Instant;

/// One scripted answer of a [`FakeCounter`].
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer immediately.
    Now(CountOutcome),
    /// Answer after sleeping (Tokio time, so paused-clock tests stay exact).
    After(Duration, CountOutcome),
    /// Panic inside the query task.
    Panic(String),
    /// Never answer.
    Hang,
}

impl Reply {
    pub fn count(n: u64) -> Self {
        Reply::Now(Ok(vec![n]))
    }

    pub fn counts(ns: &[u64]) -> Self {
        Reply::Now(Ok(ns.to_vec()))
    }

    pub fn failure(failure: CountFailure) -> Self {
        Reply::Now(Err(failure))
    }
}

/// A recorded call.
#[derive(Debug, Clone)]
pub struct Call {
    pub scope: UserScope,
    pub pattern: String,
    pub at: Instant,
}

/// A `ProcessCounter` that:
/// - answers from a script, one reply per call
/// - repeats the fallback reply once the script is exhausted
/// - records every call (with its Tokio timestamp)
/// - tracks how many query futures are still alive (not yet dropped)
///
/// Clones share the script and the call log.
#[derive(Debug, Clone)]
pub struct FakeCounter {
    script: Arc<Mutex<VecDeque<Reply>>>,
    fallback: Reply,
    calls: Arc<Mutex<Vec<Call>>>,
    live: Arc<AtomicUsize>,
}

/// Counts a query future as live until it is dropped, whether it finished,
/// panicked or was cancelled.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeCounter {
    /// Always answers `Ok([n])`.
    pub fn constant(n: u64) -> Self {
        Self::scripted(Vec::new(), Reply::count(n))
    }

    pub fn scripted(replies: impl IntoIterator<Item = Reply>, fallback: Reply) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into_iter().collect())),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Query futures created and not dropped yet.
    pub fn live_queries(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Reply {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl ProcessCounter for FakeCounter {
    fn count<'a>(
        &'a self,
        scope: UserScope,
        pattern: &'a ProcessPattern,
    ) -> Pin<Box<dyn Future<Output = CountOutcome> + Send + 'a>> {
        self.calls.lock().unwrap().push(Call {
            scope,
            pattern: pattern.as_str().to_string(),
            at: Instant::now(),
        });
        let reply = self.next_reply();
        let guard = LiveGuard::new(&self.live);

        Box::pin(async move {
            let _guard = guard;
            match reply {
                Reply::Now(outcome) => outcome,
                Reply::After(delay, outcome) => {
                    tokio::time::sleep(delay).await;
                    outcome
                }
                Reply::Panic(message) => panic!("{message}"),
                Reply::Hang => std::future::pending().await,
            }
        })
    }
}
