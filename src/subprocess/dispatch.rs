//! Event dispatch and handler task supervision
//!
//! Every dispatched event runs the registered [`EventHandler`] in its own
//! task. Tasks live in a [`JoinSet`] so they can be observed and cancelled
//! together; a failing handler only affects its own invocation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, trace};

use crate::events::ServerEvent;

/// Consumer of classified server events
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are logged by the dispatcher and never propagated.
    async fn handle(&self, event: ServerEvent) -> Result<()>;
}

/// Spawns handler tasks and keeps track of the ones still running
#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<dyn EventHandler>,
    tasks: Arc<Mutex<JoinSet<()>>>,
    running: Arc<RunningTasks>,
}

/// Count of handler tasks whose futures are still alive
#[derive(Default)]
struct RunningTasks {
    count: AtomicUsize,
    idle: Notify,
}

/// Held by each handler task; released when the task finishes, panics or is aborted
struct RunningGuard(Arc<RunningTasks>);

impl RunningGuard {
    fn new(running: &Arc<RunningTasks>) -> Self {
        running.count.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(running))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self {
            handler,
            tasks: Arc::new(Mutex::new(JoinSet::new())),
            running: Arc::new(RunningTasks::default()),
        }
    }

    /// Hand an event to the handler without waiting for it
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, event: ServerEvent) {
        if event.is_internal() {
            trace!(kind = %event.kind(), "Not dispatching internal event");
            return;
        }

        let handler = Arc::clone(&self.handler);
        let guard = RunningGuard::new(&self.running);
        let mut tasks = self.lock_tasks();
        self.reap(&mut tasks);

        tasks.spawn(async move {
            let _guard = guard;
            let kind = event.kind();
            if let Err(e) = handler.handle(event).await {
                error!(kind = %kind, error = ?e, "Event handler failed");
            }
        });
    }

    /// Number of handler tasks still running
    pub fn in_flight(&self) -> usize {
        self.running.count.load(Ordering::Acquire)
    }

    /// Wait until every handler task, including ones spawned meanwhile, has finished
    ///
    /// Cancel safe: dropping the future leaves the tasks running, and
    /// [`Dispatcher::shutdown`] can still cancel them.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.running.idle.notified();
            if self.in_flight() == 0 {
                break;
            }
            idle.await;
        }
        let mut tasks = self.lock_tasks();
        self.reap(&mut tasks);
    }

    /// Cancel outstanding handler tasks and wait for them to wind down
    pub async fn shutdown(&self) {
        let mut tasks = {
            let mut tasks = self.lock_tasks();
            if !tasks.is_empty() {
                debug!(count = tasks.len(), "Cancelling in-flight event handlers");
            }
            tasks.abort_all();
            std::mem::replace(&mut *tasks, JoinSet::new())
        };
        while let Some(finished) = tasks.join_next().await {
            report(finished);
        }
    }

    /// Report tasks that already finished
    fn reap(&self, tasks: &mut JoinSet<()>) {
        while let Some(finished) = tasks.try_join_next() {
            report(finished);
        }
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Log the outcome of a finished handler task
fn report(result: Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => debug!("Event handler task cancelled"),
        Err(e) => error!(error = %e, "Event handler task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelHandler {
        tx: mpsc::UnboundedSender<ServerEvent>,
    }

    #[async_trait]
    impl EventHandler for ChannelHandler {
        async fn handle(&self, event: ServerEvent) -> Result<()> {
            if let ServerEvent::RawLine { text } = &event {
                if text == "fail" {
                    anyhow::bail!("refusing to handle {text}");
                }
                if text == "panic" {
                    panic!("handler panicked");
                }
            }
            self.tx.send(event)?;
            Ok(())
        }
    }

    struct SlowHandler {
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for SlowHandler {
        async fn handle(&self, _event: ServerEvent) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn raw(text: &str) -> ServerEvent {
        ServerEvent::RawLine {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_later_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(Arc::new(ChannelHandler { tx }));

        dispatcher.dispatch(raw("fail"));
        dispatcher.dispatch(raw("panic"));
        dispatcher.dispatch(raw("after"));
        dispatcher.wait_idle().await;

        assert_eq!(rx.recv().await, Some(raw("after")));
        assert!(rx.try_recv().is_err());
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_internal_events_are_not_dispatched() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(Arc::new(ChannelHandler { tx }));

        dispatcher.dispatch(ServerEvent::LegacyListIndicator);
        dispatcher.wait_idle().await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_does_not_wait_for_handler() {
        let finished = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Arc::new(SlowHandler {
            finished: Arc::clone(&finished),
        }));

        dispatcher.dispatch(raw("one"));
        dispatcher.dispatch(raw("two"));

        assert_eq!(dispatcher.in_flight(), 2);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        dispatcher.shutdown().await;
        assert_eq!(dispatcher.in_flight(), 0);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_finished_tasks_are_reaped_on_dispatch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(Arc::new(ChannelHandler { tx }));

        dispatcher.dispatch(raw("first"));
        assert_eq!(rx.recv().await, Some(raw("first")));
        // give the finished task a chance to be observed as complete
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        dispatcher.dispatch(raw("second"));
        assert_eq!(dispatcher.lock_tasks().len(), 1);
        assert_eq!(dispatcher.in_flight(), 1);
        dispatcher.wait_idle().await;
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_wait_leaves_tasks_for_shutdown() {
        let finished = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Arc::new(SlowHandler {
            finished: Arc::clone(&finished),
        }));

        dispatcher.dispatch(raw("one"));
        dispatcher.dispatch(raw("two"));

        let waited =
            tokio::time::timeout(Duration::from_millis(50), dispatcher.wait_idle()).await;
        assert!(waited.is_err());
        assert_eq!(dispatcher.in_flight(), 2);
        assert_eq!(dispatcher.lock_tasks().len(), 2);

        dispatcher.shutdown().await;
        assert_eq!(dispatcher.in_flight(), 0);
        assert!(dispatcher.lock_tasks().is_empty());
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
