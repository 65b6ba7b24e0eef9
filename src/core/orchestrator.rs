//! Running orchestrators, cross-thread handles, and lifecycle.
//!
//! An orchestrator owns one dedicated OS thread. Work units and the message
//! handler are registered on an [`OrchestratorBuilder`](crate::builders::OrchestratorBuilder)
//! and moved onto that thread by `start`, so they are never shared and never
//! mutated once running.
//!
//! The only state reachable from other threads is [`Shared`]: the inbound
//! [`BoundedChannel`], the run state, and statistics counters. An
//! [`OrchestratorHandle`] is a cheap clone of that state and can be captured by
//! work units of other orchestrators to post messages or request a stop.
//!
//! # Lifecycle
//!
//! `Idle` (builder) → `Running` (`start`) → `Stopped` (`stop` or loop exit) →
//! joined (`wait` or drop). Stopping is cooperative: the flag is checked at
//! the top of each tick and a callable in flight is never interrupted.

mod tick;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::infra::BoundedChannel;

use super::error::{OrchestratorError, PostError};
use super::message::{Message, OrchestratorId, Origin};
use super::work_unit::WorkUnitRecord;

use tick::Pacing;

/// Handler invoked on the orchestrator's thread for every received message.
pub type MessageHandlerFn = Box<dyn FnMut(&Message) + Send + 'static>;

/// Lifecycle state of an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// Constructed; registration still open.
    Idle = 0,
    /// Execution thread is running the scheduling loop.
    Running = 1,
    /// Stop requested or the loop has exited.
    Stopped = 2,
}

impl RunState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Snapshot of orchestrator activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Completed scheduling ticks.
    pub ticks: u64,
    /// Work unit invocations.
    pub work_unit_runs: u64,
    /// Messages delivered to the handler.
    pub messages_handled: u64,
    /// Messages drained with no handler registered.
    pub messages_discarded: u64,
    /// Posts accepted into the inbox.
    pub posts_accepted: u64,
    /// Posts refused (inbox full or instance stopped).
    pub posts_rejected: u64,
}

/// Internal counters (lock-free atomics).
#[derive(Debug, Default)]
pub(crate) struct OrchestratorCounters {
    pub ticks: AtomicU64,
    pub work_unit_runs: AtomicU64,
    pub messages_handled: AtomicU64,
    pub messages_discarded: AtomicU64,
    pub posts_accepted: AtomicU64,
    pub posts_rejected: AtomicU64,
}

impl OrchestratorCounters {
    pub fn snapshot(&self) -> OrchestratorStats {
        OrchestratorStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            work_unit_runs: self.work_unit_runs.load(Ordering::Relaxed),
            messages_handled: self.messages_handled.load(Ordering::Relaxed),
            messages_discarded: self.messages_discarded.load(Ordering::Relaxed),
            posts_accepted: self.posts_accepted.load(Ordering::Relaxed),
            posts_rejected: self.posts_rejected.load(Ordering::Relaxed),
        }
    }
}

/// State shared between an orchestrator's thread and every handle to it.
pub(crate) struct Shared {
    id: OrchestratorId,
    name: String,
    inbox: BoundedChannel<Message>,
    state: AtomicU8,
    /// Set once the instance is gone: its `Orchestrator` (or unstarted
    /// builder) was dropped. Handles may outlive it.
    retired: AtomicBool,
    reject_posts_after_stop: bool,
    counters: OrchestratorCounters,
}

impl Shared {
    fn new(config: &OrchestratorConfig) -> Self {
        Self {
            id: OrchestratorId::new_v4(),
            name: config.name.clone(),
            inbox: BoundedChannel::new(config.inbox_capacity),
            state: AtomicU8::new(RunState::Idle as u8),
            retired: AtomicBool::new(false),
            reject_posts_after_stop: config.reject_posts_after_stop,
            counters: OrchestratorCounters::default(),
        }
    }

    fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    fn transition(&self, from: RunState, to: RunState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn mark_stopped(&self) {
        self.state.store(RunState::Stopped as u8, Ordering::Release);
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

/// Cloneable, thread-safe reference to an orchestrator.
///
/// Handles keep the inbox allocation alive but not the instance: once its
/// [`Orchestrator`] (or an unstarted builder) is dropped, posts through any
/// handle or [`Origin`] fail with [`PostError::Disconnected`].
#[derive(Clone)]
pub struct OrchestratorHandle {
    shared: Arc<Shared>,
}

impl OrchestratorHandle {
    pub(crate) fn new(config: &OrchestratorConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config)),
        }
    }

    pub(crate) const fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Mark the instance gone. Irreversible.
    pub(crate) fn retire(&self) {
        if !self.shared.retired.swap(true, Ordering::AcqRel) {
            debug!(orchestrator = %self.shared.name, "Orchestrator retired");
        }
    }

    /// Whether the instance has been dropped. Posts then fail with
    /// [`PostError::Disconnected`].
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.shared.is_retired()
    }

    /// Identity of the orchestrator.
    #[must_use]
    pub fn id(&self) -> OrchestratorId {
        self.shared.id
    }

    /// Configured name of the orchestrator.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    /// Whether the scheduling loop is (still) meant to run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        self.shared.counters.snapshot()
    }

    /// Messages currently queued in the inbox.
    #[must_use]
    pub fn pending_messages(&self) -> usize {
        self.shared.inbox.len()
    }

    /// A non-owning reference suitable for [`Message::with_origin`].
    #[must_use]
    pub fn downgrade(&self) -> Origin {
        Origin::new(self.shared.id, Arc::downgrade(&self.shared))
    }

    /// Copy `message` into the inbox. Callable from any thread at any time,
    /// including before start; the message is delivered on the
    /// orchestrator's own thread at the start of a later tick.
    ///
    /// # Errors
    ///
    /// - [`PostError::Full`] if the inbox is at capacity
    /// - [`PostError::Stopped`] if the orchestrator has stopped and
    ///   `reject_posts_after_stop` is set
    /// - [`PostError::Disconnected`] if the orchestrator has been dropped
    pub fn post(&self, message: &Message) -> Result<(), PostError> {
        let shared = &self.shared;
        if shared.is_retired() {
            shared.counters.posts_rejected.fetch_add(1, Ordering::Relaxed);
            debug!(orchestrator = %shared.name, "Post refused: orchestrator dropped");
            return Err(PostError::Disconnected);
        }
        if shared.reject_posts_after_stop && shared.state() == RunState::Stopped {
            shared.counters.posts_rejected.fetch_add(1, Ordering::Relaxed);
            debug!(orchestrator = %shared.name, "Post refused: orchestrator stopped");
            return Err(PostError::Stopped);
        }

        match shared.inbox.insert(message.clone()) {
            Ok(()) => {
                shared.counters.posts_accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(_) => {
                shared.counters.posts_rejected.fetch_add(1, Ordering::Relaxed);
                debug!(
                    orchestrator = %shared.name,
                    capacity = shared.inbox.capacity(),
                    "Post refused: inbox full"
                );
                Err(PostError::Full)
            }
        }
    }

    /// Request the scheduling loop to stop after the current tick.
    ///
    /// Non-blocking and idempotent. Has no effect on an orchestrator that
    /// has not been started.
    pub fn stop(&self) {
        if self.shared.transition(RunState::Running, RunState::Stopped) {
            info!(orchestrator = %self.shared.name, "Orchestrator stop requested");
        }
    }
}

impl fmt::Debug for OrchestratorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorHandle")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("state", &self.shared.state())
            .field("retired", &self.shared.is_retired())
            .finish()
    }
}

/// Marks the orchestrator stopped and signals waiters when the execution
/// thread exits, including by panic.
struct ExitGuard {
    shared: Arc<Shared>,
    _exited: Sender<()>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.shared.mark_stopped();
    }
}

/// A started orchestrator.
///
/// Dropping it stops the loop and joins the execution thread.
pub struct Orchestrator {
    handle: OrchestratorHandle,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    /// Disconnects when the execution thread exits.
    exited: Receiver<()>,
}

impl Orchestrator {
    /// Spawn the execution thread and hand it the registered callables.
    pub(crate) fn launch(
        handle: OrchestratorHandle,
        config: &OrchestratorConfig,
        units: Vec<WorkUnitRecord>,
        handler: Option<MessageHandlerFn>,
    ) -> Result<Self, OrchestratorError> {
        let started = handle.shared.transition(RunState::Idle, RunState::Running);
        assert!(started, "orchestrator `{}` started twice", handle.name());

        let (exit_tx, exit_rx) = bounded::<()>(0);
        let pacing = Pacing {
            idle_ceiling: config.idle_ceiling(),
            min_tick: config.min_tick(),
        };
        let guard = ExitGuard {
            shared: Arc::clone(&handle.shared),
            _exited: exit_tx,
        };

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(size) = config.thread_stack_size {
            builder = builder.stack_size(size);
        }

        let unit_count = units.len();
        let spawned = builder.spawn(move || {
            let guard = guard;
            tick::run_loop(&guard.shared, units, handler, pacing);
        });

        match spawned {
            Ok(thread) => {
                info!(
                    orchestrator = %handle.name(),
                    id = %handle.id(),
                    work_units = unit_count,
                    inbox_capacity = config.inbox_capacity,
                    "Orchestrator started"
                );
                Ok(Self {
                    handle,
                    thread_id: thread.thread().id(),
                    thread: Mutex::new(Some(thread)),
                    exited: exit_rx,
                })
            }
            Err(e) => {
                // The closure (and its guard) was dropped, which already marked
                // the instance stopped.
                error!(orchestrator = %handle.name(), error = %e, "Failed to spawn orchestrator thread");
                Err(OrchestratorError::Spawn(e))
            }
        }
    }

    /// A cloneable handle for posting and stopping from other threads.
    #[must_use]
    pub fn handle(&self) -> OrchestratorHandle {
        self.handle.clone()
    }

    /// Identity of the orchestrator.
    #[must_use]
    pub fn id(&self) -> OrchestratorId {
        self.handle.id()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.handle.state()
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        self.handle.stats()
    }

    /// See [`OrchestratorHandle::post`].
    ///
    /// # Errors
    ///
    /// See [`OrchestratorHandle::post`].
    pub fn post(&self, message: &Message) -> Result<(), PostError> {
        self.handle.post(message)
    }

    /// Request the loop to stop. Non-blocking and idempotent.
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Whether the execution thread has left the scheduling loop.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.exited.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until the execution thread has exited, joining it once.
    ///
    /// Idempotent. Concurrent callers all return once the thread has exited;
    /// the first one performs the join. Called from the orchestrator's own
    /// thread this returns immediately without joining.
    pub fn wait(&self) {
        if thread::current().id() == self.thread_id {
            warn!(orchestrator = %self.handle.name(), "wait() called on the orchestrator's own thread; not joining");
            return;
        }

        let taken = self.thread.lock().take();
        let Some(thread) = taken else {
            // Another caller owns the join; the exit signal is enough.
            let _ = self.exited.recv();
            return;
        };

        match thread.join() {
            Ok(()) => debug!(orchestrator = %self.handle.name(), "Orchestrator thread joined"),
            Err(_) => warn!(orchestrator = %self.handle.name(), "Orchestrator thread panicked"),
        }
    }

    /// Wait up to `timeout` for the execution thread to exit.
    ///
    /// Returns `true` if it exited (and has been joined).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.wait();
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Wait for the execution thread to exit without blocking the async
    /// runtime.
    #[cfg(feature = "tokio-runtime")]
    pub async fn wait_async(&self) {
        let exited = self.exited.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || {
            let _ = exited.recv();
        })
        .await
        {
            warn!(orchestrator = %self.handle.name(), error = %e, "Exit watcher failed");
        }
        self.wait();
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("handle", &self.handle)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.handle.stop();
        self.wait();
        self.handle.retire();
    }
}
