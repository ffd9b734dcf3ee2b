//! Host run loop
//!
//! A macrotask queue with a virtual millisecond clock. Nothing runs until
//! the host advances time, which makes every deferred path in the core
//! deterministic under test. The browser binding pumps it from a timer;
//! the CLI pumps it from a tokio interval.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;

/// Handle of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Upper bound on tasks run by one [`RunLoop::run_until_idle`] call
pub const IDLE_TASK_LIMIT: usize = 100_000;

type Task = Box<dyn FnOnce()>;

/// Single-threaded task queue
#[derive(Default)]
pub struct RunLoop {
    now: Cell<u64>,
    next_id: Cell<u64>,
    /// Keyed by (due, id) so equal deadlines run in scheduling order
    tasks: RefCell<BTreeMap<(u64, u64), Task>>,
    due_by_id: RefCell<HashMap<u64, u64>>,
}

impl RunLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Schedule `task` to run `delay_ms` from now
    pub fn set_timeout(&self, delay_ms: u64, task: impl FnOnce() + 'static) -> TimerId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let due = self.now.get().saturating_add(delay_ms);
        self.tasks.borrow_mut().insert((due, id), Box::new(task));
        self.due_by_id.borrow_mut().insert(id, due);
        TimerId(id)
    }

    /// Cancel a task. Unknown or already-run ids are ignored.
    pub fn clear_timeout(&self, timer: TimerId) {
        if let Some(due) = self.due_by_id.borrow_mut().remove(&timer.0) {
            self.tasks.borrow_mut().remove(&(due, timer.0));
        }
    }

    pub fn is_pending(&self, timer: TimerId) -> bool {
        self.due_by_id.borrow().contains_key(&timer.0)
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    fn pop_due(&self, limit: Option<u64>) -> Option<(u64, Task)> {
        let mut tasks = self.tasks.borrow_mut();
        let (&(due, id), _) = tasks.iter().next()?;
        if limit.is_some_and(|limit| due > limit) {
            return None;
        }
        let task = tasks.remove(&(due, id))?;
        self.due_by_id.borrow_mut().remove(&id);
        Some((due, task))
    }

    /// Move the clock forward by `ms`, running every task that falls due on
    /// the way. Returns how many tasks ran.
    pub fn advance(&self, ms: u64) -> usize {
        let target = self.now.get().saturating_add(ms);
        let mut ran = 0;
        while let Some((due, task)) = self.pop_due(Some(target)) {
            self.now.set(self.now.get().max(due));
            task();
            ran += 1;
        }
        self.now.set(target);
        ran
    }

    /// Move the clock to an absolute time; earlier times are ignored
    pub fn advance_to(&self, time_ms: u64) -> usize {
        self.advance(time_ms.saturating_sub(self.now.get()))
    }

    /// Run tasks, jumping the clock as needed, until the queue is empty.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while ran < IDLE_TASK_LIMIT {
            let Some((due, task)) = self.pop_due(None) else {
                return ran;
            };
            self.now.set(self.now.get().max(due));
            task();
            ran += 1;
        }
        warn!(limit = IDLE_TASK_LIMIT, pending = self.pending(), "Run loop did not go idle");
        ran
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop")
            .field("now", &self.now.get())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_tasks_run_in_due_then_schedule_order() {
        let run_loop = RunLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, label) in [(10, "late"), (0, "first"), (0, "second"), (5, "mid")] {
            let log = log.clone();
            run_loop.set_timeout(delay, move || log.borrow_mut().push(label));
        }

        assert_eq!(run_loop.advance(4), 2);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        run_loop.advance(10);
        assert_eq!(*log.borrow(), vec!["first", "second", "mid", "late"]);
        assert_eq!(run_loop.now(), 14);
    }

    #[test]
    fn test_clear_timeout() {
        let run_loop = RunLoop::new();
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let timer = run_loop.set_timeout(1, move || flag.set(true));
        assert!(run_loop.is_pending(timer));

        run_loop.clear_timeout(timer);
        run_loop.clear_timeout(timer);
        run_loop.run_until_idle();
        assert!(!fired.get());
    }

    #[test]
    fn test_tasks_scheduled_from_tasks() {
        let run_loop = Rc::new(RunLoop::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner_loop = run_loop.clone();
        let inner_log = log.clone();
        run_loop.set_timeout(1, move || {
            inner_log.borrow_mut().push(inner_loop.now());
            let log = inner_log.clone();
            let clock = inner_loop.clone();
            inner_loop.set_timeout(3, move || log.borrow_mut().push(clock.now()));
        });

        assert_eq!(run_loop.run_until_idle(), 2);
        assert_eq!(*log.borrow(), vec![1, 4]);
    }
}
