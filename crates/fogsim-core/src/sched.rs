// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskState};

/// Floor on per-tick progress so contended tasks always move forward.
pub const MIN_PROGRESS_MI: u64 = 100;

/// Narrow CPU accounting surface handed to the scheduler instead of a
/// device back-reference. Allocation happens at dispatch, release at
/// completion; the pair must balance over every task's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuLedger {
    total_mips: u64,
    available_mips: u64,
}

impl CpuLedger {
    #[must_use]
    pub fn new(total_mips: u64) -> Self {
        Self {
            total_mips,
            available_mips: total_mips,
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total_mips
    }

    #[must_use]
    pub const fn available(&self) -> u64 {
        self.available_mips
    }

    pub fn allocate(&mut self, mi: u64) {
        assert!(
            mi <= self.available_mips,
            "mips ledger over-allocation: {mi} MI requested, {} available",
            self.available_mips
        );
        self.available_mips -= mi;
    }

    pub fn release(&mut self, mi: u64) {
        self.available_mips += mi;
        assert!(
            self.available_mips <= self.total_mips,
            "mips ledger over-release: {} available exceeds {} total",
            self.available_mips,
            self.total_mips
        );
    }
}

/// Per-device task scheduler: a deadline-priority queue in front of an
/// executing bag, driven once per simulation tick.
///
/// Admission is gated on queue capacity only; dispatch is gated on the
/// ledger. An oversized task is therefore admitted, never dispatched, and
/// eventually fails by deadline. Tasks admitted during a tick stage in
/// `arrivals` and join the queue at the end of that tick, so freshly
/// generated work is never dispatched mid-tick.
#[derive(Debug)]
pub struct Scheduler {
    max_queue: usize,
    queue: Vec<Task>,
    arrivals: Vec<Task>,
    executing: Vec<Task>,
    completed: Vec<Task>,
    pub failed_tasks: u64,
    pub executed_count: u64,
    pub forced_count: u64,
    pub total_response_ms: f64,
}

/// Urgent ahead of non-urgent, then earlier deadline, then id.
fn priority(a: &Task, b: &Task) -> Ordering {
    b.urgent
        .cmp(&a.urgent)
        .then(a.deadline_ticks.cmp(&b.deadline_ticks))
        .then_with(|| a.id.cmp(&b.id))
}

impl Scheduler {
    #[must_use]
    pub fn new(max_queue: usize) -> Self {
        Self {
            max_queue,
            queue: Vec::new(),
            arrivals: Vec::new(),
            executing: Vec::new(),
            completed: Vec::new(),
            failed_tasks: 0,
            executed_count: 0,
            forced_count: 0,
            total_response_ms: 0.0,
        }
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len() + self.arrivals.len()
    }

    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.queue_len() < self.max_queue
    }

    #[must_use]
    pub fn executing_len(&self) -> usize {
        self.executing.len()
    }

    #[must_use]
    pub fn executing(&self) -> &[Task] {
        &self.executing
    }

    #[must_use]
    pub fn completed(&self) -> &[Task] {
        &self.completed
    }

    /// Queued tasks, staged arrivals included.
    pub fn queued_tasks(&self) -> impl Iterator<Item = &Task> {
        self.queue.iter().chain(self.arrivals.iter())
    }

    /// MI waiting in the queue (staged arrivals included).
    #[must_use]
    pub fn queued_demand_mi(&self) -> u64 {
        self.queue.iter().map(|t| t.size_mi).sum::<u64>()
            + self.arrivals.iter().map(|t| t.size_mi).sum::<u64>()
    }

    /// Admit a task, or hand it back if the queue is full.
    pub fn admit(&mut self, mut task: Task) -> Result<(), Task> {
        if !self.has_capacity() {
            return Err(task);
        }
        task.state = TaskState::Queued;
        self.arrivals.push(task);
        Ok(())
    }

    /// One simulation step: progress, dispatch, deadline decay, then merge
    /// the tick's arrivals.
    pub fn tick(&mut self, ledger: &mut CpuLedger, now: u64, tick_ms: f64) {
        self.progress(ledger, now, tick_ms);
        self.dispatch(ledger);
        self.expire_deadlines();
        self.merge_arrivals();
    }

    fn progress(&mut self, ledger: &mut CpuLedger, now: u64, tick_ms: f64) {
        if self.executing.is_empty() {
            return;
        }
        let spare = ledger.available().saturating_sub(self.queued_demand_mi());
        let per_task = (spare / self.executing.len() as u64).max(1);
        let advance = per_task.max(MIN_PROGRESS_MI);

        let mut still = Vec::with_capacity(self.executing.len());
        for mut task in self.executing.drain(..) {
            task.remaining_mi = task.remaining_mi.saturating_sub(advance);
            if task.remaining_mi == 0 {
                ledger.release(task.size_mi);
                task.state = TaskState::Completed;
                task.response_time_ms += (now.saturating_sub(task.created_at)) as f64 * tick_ms;
                self.total_response_ms += task.response_time_ms;
                self.executed_count += 1;
                tracing::trace!(task = %task.id, response_ms = task.response_time_ms, "task completed");
                self.completed.push(task);
            } else {
                still.push(task);
            }
        }
        self.executing = still;
    }

    fn dispatch(&mut self, ledger: &mut CpuLedger) {
        while let Some(head) = self.queue.first() {
            if head.size_mi > ledger.available() {
                break;
            }
            let mut task = self.queue.remove(0);
            ledger.allocate(task.size_mi);
            task.state = TaskState::Executing;
            self.executing.push(task);
        }
    }

    fn expire_deadlines(&mut self) {
        for task in &mut self.queue {
            task.deadline_ticks -= 1;
            if task.deadline_ticks <= 0 {
                task.state = TaskState::Failed;
            }
        }
        let before = self.queue.len();
        self.queue.retain(|t| t.state != TaskState::Failed);
        let expired = before - self.queue.len();
        if expired > 0 {
            self.failed_tasks += expired as u64;
            tracing::trace!(expired, "queued tasks missed their deadline");
        }
    }

    fn merge_arrivals(&mut self) {
        if self.arrivals.is_empty() {
            return;
        }
        self.queue.append(&mut self.arrivals);
        self.queue.sort_by(priority);
    }

    /// Terminal sweep: close out queued and executing work so end-of-run
    /// metrics capture it. The caller reports the returned count as
    /// still-in-flight rather than completed.
    pub fn force_complete_all(&mut self, ledger: &mut CpuLedger, now: u64, tick_ms: f64) -> u64 {
        let mut forced = 0u64;
        for mut task in self.executing.drain(..) {
            ledger.release(task.size_mi);
            task.state = TaskState::Completed;
            task.response_time_ms += (now.saturating_sub(task.created_at)) as f64 * tick_ms;
            self.total_response_ms += task.response_time_ms;
            self.executed_count += 1;
            forced += 1;
            self.completed.push(task);
        }
        for mut task in self.queue.drain(..).chain(self.arrivals.drain(..)) {
            task.state = TaskState::Completed;
            task.response_time_ms += (now.saturating_sub(task.created_at)) as f64 * tick_ms;
            self.total_response_ms += task.response_time_ms;
            self.executed_count += 1;
            forced += 1;
            self.completed.push(task);
        }
        self.forced_count += forced;
        forced
    }
}
