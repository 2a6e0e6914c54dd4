//! Clock and deferred-task capabilities the player is driven by.
//!
//! The player never waits. It asks its runtime to schedule a [`Task`] and
//! keeps the returned [`TaskHandle`] so the task can be cancelled; whoever
//! owns the player fires due tasks through `Player::run_due`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Wake the scheduler loop.
    Tick,
    /// Run the end-of-sequence callback.
    End,
}

pub trait Runtime {
    /// Monotonic milliseconds.
    fn now(&self) -> f64;

    fn schedule(&mut self, delay_ms: f64, task: Task) -> TaskHandle;

    /// Returns false if the task already ran or was cancelled.
    fn cancel(&mut self, handle: TaskHandle) -> bool;

    /// Removes and returns the earliest task whose deadline has passed.
    fn pop_due(&mut self) -> Option<(TaskHandle, Task)>;

    fn next_deadline(&self) -> Option<f64>;

    /// Whether the host is currently coalescing or delaying timers.
    fn is_throttled(&self) -> bool {
        false
    }
}

#[derive(Debug)]
struct Entry {
    deadline: f64,
    handle: TaskHandle,
    task: Task,
}

/// Deadline-ordered pending tasks. Ties run in scheduling order.
#[derive(Debug, Default)]
pub struct TaskQueue {
    next_id: u64,
    entries: Vec<Entry>,
}

impl TaskQueue {
    pub fn push(&mut self, deadline: f64, task: Task) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            deadline,
            handle,
            task,
        });
        handle
    }

    pub fn remove(&mut self, handle: TaskHandle) -> bool {
        match self.entries.iter().position(|e| e.handle == handle) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    fn earliest(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.deadline
                    .total_cmp(&b.deadline)
                    .then_with(|| a.handle.cmp(&b.handle))
            })
            .map(|(idx, _)| idx)
    }

    pub fn pop_due(&mut self, now: f64) -> Option<(TaskHandle, Task)> {
        let idx = self.earliest()?;
        if self.entries[idx].deadline > now {
            return None;
        }
        let entry = self.entries.remove(idx);
        Some((entry.handle, entry.task))
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.earliest().map(|idx| self.entries[idx].deadline)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Manually advanced clock for tests and offline rendering.
#[derive(Debug, Default)]
pub struct VirtualRuntime {
    now: f64,
    tasks: TaskQueue,
    throttled: bool,
}

impl VirtualRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: f64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    /// Moves the clock; it never goes backwards.
    pub fn set_now(&mut self, now: f64) {
        self.now = self.now.max(now);
    }

    pub fn set_throttled(&mut self, throttled: bool) {
        self.throttled = throttled;
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

impl Runtime for VirtualRuntime {
    fn now(&self) -> f64 {
        self.now
    }

    fn schedule(&mut self, delay_ms: f64, task: Task) -> TaskHandle {
        self.tasks.push(self.now + delay_ms.max(0.0), task)
    }

    fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.tasks.remove(handle)
    }

    fn pop_due(&mut self) -> Option<(TaskHandle, Task)> {
        self.tasks.pop_due(self.now)
    }

    fn next_deadline(&self) -> Option<f64> {
        self.tasks.next_deadline()
    }

    fn is_throttled(&self) -> bool {
        self.throttled
    }
}

/// Wall-clock runtime: milliseconds since construction.
#[derive(Debug)]
pub struct SystemRuntime {
    epoch: Instant,
    tasks: TaskQueue,
    throttled: Option<Arc<AtomicBool>>,
}

impl SystemRuntime {
    pub fn new() -> Self {
        Self::with_epoch(Instant::now())
    }

    pub fn with_epoch(epoch: Instant) -> Self {
        Self {
            epoch,
            tasks: TaskQueue::default(),
            throttled: None,
        }
    }

    /// Shares a flag the host flips while its timers are being throttled.
    pub fn with_throttle_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.throttled = Some(flag);
        self
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// The instant a deadline on this clock corresponds to.
    pub fn instant_at(&self, deadline_ms: f64) -> Instant {
        self.epoch + std::time::Duration::from_secs_f64(deadline_ms.max(0.0) / 1000.0)
    }
}

impl Default for SystemRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime for SystemRuntime {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn schedule(&mut self, delay_ms: f64, task: Task) -> TaskHandle {
        let deadline = self.now() + delay_ms.max(0.0);
        self.tasks.push(deadline, task)
    }

    fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.tasks.remove(handle)
    }

    fn pop_due(&mut self) -> Option<(TaskHandle, Task)> {
        let now = self.now();
        self.tasks.pop_due(now)
    }

    fn next_deadline(&self) -> Option<f64> {
        self.tasks.next_deadline()
    }

    fn is_throttled(&self) -> bool {
        self.throttled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_orders_by_deadline_then_schedule_order() {
        let mut queue = TaskQueue::default();
        let late = queue.push(20.0, Task::End);
        let first = queue.push(10.0, Task::Tick);
        let second = queue.push(10.0, Task::End);

        assert_eq!(queue.next_deadline(), Some(10.0));
        assert_eq!(queue.pop_due(5.0), None);
        assert_eq!(queue.pop_due(15.0), Some((first, Task::Tick)));
        assert_eq!(queue.pop_due(15.0), Some((second, Task::End)));
        assert_eq!(queue.pop_due(15.0), None);
        assert_eq!(queue.pop_due(20.0), Some((late, Task::End)));
        assert!(queue.is_empty());
    }

    #[test]
    fn cancelled_tasks_never_fire() {
        let mut runtime = VirtualRuntime::new();
        let handle = runtime.schedule(0.0, Task::Tick);

        assert!(runtime.cancel(handle));
        assert!(!runtime.cancel(handle));
        assert_eq!(runtime.pop_due(), None);
    }

    #[test]
    fn virtual_clock_is_monotonic() {
        let mut runtime = VirtualRuntime::starting_at(100.0);
        runtime.set_now(50.0);
        assert_eq!(runtime.now(), 100.0);

        runtime.schedule(25.0, Task::Tick);
        assert_eq!(runtime.next_deadline(), Some(125.0));
    }

    #[test]
    fn system_runtime_reads_throttle_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let runtime = SystemRuntime::new().with_throttle_flag(flag.clone());

        assert!(!runtime.is_throttled());
        flag.store(true, Ordering::Relaxed);
        assert!(runtime.is_throttled());
    }
}
