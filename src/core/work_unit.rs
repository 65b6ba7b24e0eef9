//! Periodic work units and their due-time bookkeeping.

use std::fmt;
use std::time::{Duration, Instant};

/// Callable run by an orchestrator on every tick where it is due.
pub type WorkUnitFn = Box<dyn FnMut() + Send + 'static>;

/// A registered work unit.
///
/// Owned by the orchestrator that registered it. `last_run` is `None` until
/// the first execution, so every unit runs on the first tick.
pub(crate) struct WorkUnitRecord {
    name: String,
    cb: WorkUnitFn,
    min_interval: Duration,
    last_run: Option<Instant>,
}

impl WorkUnitRecord {
    pub(crate) fn new(name: String, cb: WorkUnitFn, min_interval: Duration) -> Self {
        Self {
            name,
            cb,
            min_interval,
            last_run: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Whether at least `min_interval` has passed since the last run.
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.last_run
            .is_none_or(|last| now.saturating_duration_since(last) >= self.min_interval)
    }

    /// Time left until the unit is due, measured from `at`. Zero when due or
    /// never run.
    pub(crate) fn until_due(&self, at: Instant) -> Duration {
        let Some(last) = self.last_run else {
            return Duration::ZERO;
        };
        last.checked_add(self.min_interval)
            .map_or(Duration::MAX, |due| due.saturating_duration_since(at))
    }

    /// Invoke the callable and stamp it with the tick time.
    ///
    /// Missed periods are not replayed: a late unit runs once and its next
    /// due time is measured from `now`.
    pub(crate) fn run(&mut self, now: Instant) {
        (self.cb)();
        self.last_run = Some(now);
    }
}

impl fmt::Debug for WorkUnitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnitRecord")
            .field("name", &self.name)
            .field("min_interval", &self.min_interval)
            .field("last_run", &self.last_run)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_unit(interval: Duration) -> (WorkUnitRecord, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let unit = WorkUnitRecord::new(
            "counter".into(),
            Box::new(move || {
                c.fetch_add(1, Ordering::Relaxed);
            }),
            interval,
        );
        (unit, count)
    }

    #[test]
    fn test_never_run_is_due() {
        let (unit, _) = counting_unit(Duration::from_secs(3600));
        assert!(unit.is_due(Instant::now()));
    }

    #[test]
    fn test_due_after_interval() {
        let (mut unit, count) = counting_unit(Duration::from_millis(250));
        let start = Instant::now();
        unit.run(start);
        assert_eq!(count.load(Ordering::Relaxed), 1);

        assert!(!unit.is_due(start + Duration::from_millis(249)));
        assert!(unit.is_due(start + Duration::from_millis(250)));
    }

    #[test]
    fn test_clock_behind_last_run_is_not_due() {
        let (mut unit, _) = counting_unit(Duration::from_millis(10));
        let later = Instant::now() + Duration::from_secs(1);
        unit.run(later);
        assert!(!unit.is_due(later - Duration::from_millis(500)));
    }

    #[test]
    fn test_until_due() {
        let (mut unit, _) = counting_unit(Duration::from_millis(100));
        let start = Instant::now();
        assert_eq!(unit.until_due(start), Duration::ZERO);

        unit.run(start);
        assert_eq!(
            unit.until_due(start + Duration::from_millis(30)),
            Duration::from_millis(70)
        );
        assert_eq!(unit.until_due(start + Duration::from_secs(1)), Duration::ZERO);
    }

    #[test]
    fn test_unbounded_interval_never_overflows() {
        let (mut unit, _) = counting_unit(Duration::MAX);
        let now = Instant::now();
        unit.run(now);
        assert!(!unit.is_due(now + Duration::from_secs(86_400)));
        assert_eq!(unit.until_due(now), Duration::MAX);
    }

    #[test]
    fn test_zero_interval_always_due() {
        let (mut unit, _) = counting_unit(Duration::ZERO);
        let now = Instant::now();
        unit.run(now);
        assert!(unit.is_due(now));
    }
}
