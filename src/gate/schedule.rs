//! Clock and timer abstraction.
//!
//! `schedule(delay, task)` returns a [`TimerHandle`]; dropping or cancelling the
//! handle guarantees the task never runs. [`TokioScheduler`] backs it with tokio
//! timers, [`ManualScheduler`] with a virtual clock advanced by hand.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Pending timer. Cancelled on drop.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Real timers on the ambient tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        TimerHandle::new(move || join.abort())
    }
}

#[derive(Default)]
struct ManualState {
    elapsed: Duration,
    next_id: u64,
    pending: BTreeMap<(Duration, u64), Task>,
}

/// Virtual clock; time only moves on [`ManualScheduler::advance`].
#[derive(Clone)]
pub struct ManualScheduler {
    epoch: Instant,
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            state: Arc::new(Mutex::new(ManualState::default())),
        }
    }

    /// Time elapsed on the virtual clock.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.state.lock().map_or(Duration::ZERO, |state| state.elapsed)
    }

    /// Number of armed timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().map_or(0, |state| state.pending.len())
    }

    /// Move the clock forward, running due tasks in deadline order.
    ///
    /// Tasks run without the internal lock held, so they may schedule more work;
    /// anything that falls due within the window runs too.
    pub fn advance(&self, by: Duration) {
        let target = self.elapsed().saturating_add(by);
        loop {
            let task = {
                let Ok(mut state) = self.state.lock() else {
                    return;
                };
                let due = state
                    .pending
                    .keys()
                    .next()
                    .copied()
                    .filter(|(deadline, _)| *deadline <= target);
                match due {
                    Some(key) => {
                        state.elapsed = key.0;
                        state.pending.remove(&key)
                    }
                    None => {
                        state.elapsed = target;
                        None
                    }
                }
            };
            match task {
                Some(task) => task(),
                None => return,
            }
        }
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.epoch + self.elapsed()
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let key = {
            let Ok(mut state) = self.state.lock() else {
                return TimerHandle::new(|| {});
            };
            let key = (state.elapsed.saturating_add(delay), state.next_id);
            state.next_id += 1;
            state.pending.insert(key, task);
            key
        };

        let weak: Weak<Mutex<ManualState>> = Arc::downgrade(&self.state);
        TimerHandle::new(move || {
            if let Some(state) = weak.upgrade() {
                if let Ok(mut state) = state.lock() {
                    state.pending.remove(&key);
                }
            }
        })
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("elapsed", &self.elapsed())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn manual_runs_only_due_tasks() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let _a = scheduler.schedule(Duration::from_secs(1), counter_task(&fired));
        let _b = scheduler.schedule(Duration::from_secs(5), counter_task(&fired));

        scheduler.advance(Duration::from_secs(2));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.elapsed(), Duration::from_secs(2));

        scheduler.advance(Duration::from_secs(3));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn dropping_handle_cancels() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule(Duration::from_secs(1), counter_task(&fired));
        drop(handle);
        assert_eq!(scheduler.pending(), 0);
        scheduler.advance(Duration::from_secs(10));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tasks_may_reschedule_within_window() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let inner = scheduler.clone();
        let counter = fired.clone();
        let handles = Arc::new(Mutex::new(Vec::new()));
        let keep = handles.clone();
        let _outer = scheduler.schedule(
            Duration::from_secs(1),
            Box::new(move || {
                let handle = inner.schedule(Duration::from_secs(1), counter_task(&counter));
                if let Ok(mut handles) = keep.lock() {
                    handles.push(handle);
                }
            }),
        );

        scheduler.advance(Duration::from_secs(3));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clock_moves_with_advance() {
        let scheduler = ManualScheduler::new();
        let start = scheduler.now();
        scheduler.advance(Duration::from_millis(1500));
        assert_eq!(scheduler.now() - start, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_fires_and_cancels() {
        let scheduler = TokioScheduler;
        let fired = Arc::new(AtomicUsize::new(0));
        let kept = scheduler.schedule(Duration::from_secs(1), counter_task(&fired));
        let cancelled = scheduler.schedule(Duration::from_secs(1), counter_task(&fired));
        cancelled.cancel();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        drop(kept);
    }
}
