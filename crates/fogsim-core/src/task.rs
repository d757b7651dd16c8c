// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use esnode_offload::TaskView;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Created,
    Queued,
    Executing,
    Completed,
    Failed,
}

/// A unit of work: immutable descriptor plus mutable execution state.
///
/// `remaining_mi` counts down from `size_mi`; `response_time_ms` only ever
/// grows (transfer latency while in flight, elapsed wall-clock at
/// completion). A `Completed` task is never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub source_iot: String,
    pub origin_fog: Option<String>,
    pub size_mi: u64,
    pub deadline_ticks: i64,
    pub urgent: bool,
    pub created_at: u64,
    pub remaining_mi: u64,
    pub response_time_ms: f64,
    pub state: TaskState,
}

impl Task {
    #[must_use]
    pub fn new(
        id: String,
        source_iot: String,
        size_mi: u64,
        deadline_ticks: i64,
        urgent: bool,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            source_iot,
            origin_fog: None,
            size_mi,
            deadline_ticks,
            urgent,
            created_at,
            remaining_mi: size_mi,
            response_time_ms: 0.0,
            state: TaskState::Created,
        }
    }

    #[must_use]
    pub fn view(&self) -> TaskView {
        TaskView {
            id: self.id.clone(),
            size_mi: self.size_mi,
            urgent: self.urgent,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.state, TaskState::Completed | TaskState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_task_carries_its_full_work() {
        let task = Task::new("task-000001".into(), "iot-000".into(), 750, 20, true, 3);
        assert_eq!(task.remaining_mi, 750);
        assert_eq!(task.state, TaskState::Created);
        assert!(task.origin_fog.is_none());
        assert!(!task.is_terminal());
        assert_eq!(task.view().size_mi, 750);
        assert!(task.view().urgent);
    }
}
