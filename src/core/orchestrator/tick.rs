//! The scheduling loop run on each orchestrator's thread.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, trace};

use super::{MessageHandlerFn, OrchestratorCounters, Shared};
use crate::core::work_unit::WorkUnitRecord;

/// Sleep policy between ticks.
#[derive(Debug, Clone, Copy)]
pub(super) struct Pacing {
    /// Longest sleep between ticks; bounds inbox latency.
    pub idle_ceiling: Duration,
    /// Anything shorter yields instead of sleeping.
    pub min_tick: Duration,
}

/// Run ticks until the state leaves `Running`.
///
/// Each tick drains the inbox, runs every due work unit in registration
/// order, then sleeps until the next unit falls due (at most `idle_ceiling`).
pub(super) fn run_loop(
    shared: &Shared,
    mut units: Vec<WorkUnitRecord>,
    mut handler: Option<MessageHandlerFn>,
    pacing: Pacing,
) {
    info!(orchestrator = %shared.name, "Scheduling loop entered");

    while shared.is_running() {
        let now = Instant::now();

        let drained = drain_inbox(shared, &mut handler);
        let ran = run_due_units(&mut units, now, &shared.counters);
        shared.counters.ticks.fetch_add(1, Ordering::Relaxed);

        let sleep = next_sleep(&units, Instant::now(), pacing.idle_ceiling);
        trace!(
            orchestrator = %shared.name,
            drained = drained,
            ran = ran,
            sleep_ns = u64::try_from(sleep.as_nanos()).unwrap_or(u64::MAX),
            "Tick complete"
        );

        if sleep < pacing.min_tick {
            thread::yield_now();
        } else {
            thread::sleep(sleep);
        }
    }

    info!(
        orchestrator = %shared.name,
        pending = shared.inbox.len(),
        "Scheduling loop exited"
    );
}

/// Remove every queued message, handing each to `handler`.
///
/// Messages are still removed when there is no handler so producers cannot
/// build an unbounded backlog.
fn drain_inbox(shared: &Shared, handler: &mut Option<MessageHandlerFn>) -> usize {
    let mut drained = 0;
    while let Some(message) = shared.inbox.remove() {
        drained += 1;
        match handler.as_mut() {
            Some(handle) => {
                handle(&message);
                shared
                    .counters
                    .messages_handled
                    .fetch_add(1, Ordering::Relaxed);
            }
            None => {
                shared
                    .counters
                    .messages_discarded
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    drained
}

/// Run every unit due at `now`, in registration order. Returns how many ran.
fn run_due_units(
    units: &mut [WorkUnitRecord],
    now: Instant,
    counters: &OrchestratorCounters,
) -> usize {
    let mut ran = 0;
    for unit in units.iter_mut().filter(|unit| unit.is_due(now)) {
        trace!(work_unit = unit.name(), "Running work unit");
        unit.run(now);
        ran += 1;
    }
    counters
        .work_unit_runs
        .fetch_add(ran as u64, Ordering::Relaxed);
    ran
}

/// Time until the earliest unit falls due, capped at `idle_ceiling`.
fn next_sleep(units: &[WorkUnitRecord], at: Instant, idle_ceiling: Duration) -> Duration {
    units
        .iter()
        .map(|unit| unit.until_due(at))
        .fold(idle_ceiling, Duration::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::core::message::Message;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_unit(
        name: &str,
        interval: Duration,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> WorkUnitRecord {
        let log = Arc::clone(log);
        let label = name.to_string();
        WorkUnitRecord::new(
            name.to_string(),
            Box::new(move || log.lock().push(label.clone())),
            interval,
        )
    }

    #[test]
    fn test_first_tick_runs_all_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut units = vec![
            recording_unit("a", Duration::from_millis(250), &log),
            recording_unit("b", Duration::from_secs(1), &log),
            recording_unit("c", Duration::from_millis(250), &log),
        ];
        let counters = OrchestratorCounters::default();
        let now = Instant::now();

        assert_eq!(run_due_units(&mut units, now, &counters), 3);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(counters.work_unit_runs.load(Ordering::Relaxed), 3);

        // Ceiling is below every interval.
        assert_eq!(
            next_sleep(&units, now, Duration::from_millis(100)),
            Duration::from_millis(100)
        );
        assert_eq!(
            next_sleep(&units, now, Duration::from_secs(5)),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_sleep_targets_next_due_unit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut units = vec![
            recording_unit("fast", Duration::from_millis(20), &log),
            recording_unit("slow", Duration::from_millis(50), &log),
        ];
        let counters = OrchestratorCounters::default();
        let ceiling = Duration::from_millis(100);
        let start = Instant::now();

        run_due_units(&mut units, start, &counters);
        assert_eq!(next_sleep(&units, start, ceiling), Duration::from_millis(20));

        let t40 = start + Duration::from_millis(40);
        assert_eq!(run_due_units(&mut units, t40, &counters), 1);
        // `slow` falls due before `fast` does again.
        assert_eq!(next_sleep(&units, t40, ceiling), Duration::from_millis(10));

        let t50 = start + Duration::from_millis(50);
        assert_eq!(run_due_units(&mut units, t50, &counters), 1);
        assert_eq!(*log.lock(), vec!["fast", "slow", "fast", "slow"]);
    }

    #[test]
    fn test_no_units_sleeps_ceiling() {
        let ceiling = Duration::from_millis(100);
        assert_eq!(next_sleep(&[], Instant::now(), ceiling), ceiling);
    }

    #[test]
    fn test_late_unit_runs_once_without_catch_up() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut units = vec![recording_unit("u", Duration::from_millis(10), &log)];
        let counters = OrchestratorCounters::default();
        let start = Instant::now();

        run_due_units(&mut units, start, &counters);
        run_due_units(&mut units, start + Duration::from_millis(95), &counters);
        run_due_units(&mut units, start + Duration::from_millis(96), &counters);

        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_drain_without_handler_discards() {
        let shared = Shared::new(&OrchestratorConfig::new().with_inbox_capacity(4));
        for i in 0..3u8 {
            shared.inbox.insert(Message::from_bytes(&[i])).unwrap();
        }

        assert_eq!(drain_inbox(&shared, &mut None), 3);
        assert!(shared.inbox.is_empty());
        assert_eq!(shared.counters.snapshot().messages_discarded, 3);
    }

    #[test]
    fn test_drain_delivers_in_order() {
        let shared = Shared::new(&OrchestratorConfig::new().with_inbox_capacity(4));
        for i in 0..4u8 {
            shared.inbox.insert(Message::from_bytes(&[i])).unwrap();
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: MessageHandlerFn =
            Box::new(move |msg: &Message| sink.lock().push(msg.payload()[0]));

        assert_eq!(drain_inbox(&shared, &mut Some(handler)), 4);
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3]);
        assert_eq!(shared.counters.snapshot().messages_handled, 4);
    }

    #[test]
    fn test_loop_exits_when_not_running() {
        let shared = Shared::new(&OrchestratorConfig::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        let units = vec![recording_unit("never", Duration::ZERO, &log)];

        // Idle: the loop must not execute a single tick.
        run_loop(
            &shared,
            units,
            None,
            Pacing {
                idle_ceiling: Duration::from_millis(1),
                min_tick: Duration::ZERO,
            },
        );
        assert!(log.lock().is_empty());
        assert_eq!(shared.counters.snapshot().ticks, 0);
    }
}
