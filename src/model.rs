use super::errors::TaskError;
use std::fmt;
use tokio::time::Instant;


#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Единица работы. После создания не меняется,
/// воркер забирает её ровно один раз
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub payload: String,
    pub submitted_at: Instant,
}

impl Task {
    pub fn new(id: TaskId, payload: impl Into<String>) -> Self {
        Self {
            id,
            payload: payload.into(),
            submitted_at: Instant::now(),
        }
    }
}

/// Итог обработки задачи: либо вывод, либо ошибка этой задачи
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub outcome: Result<String, TaskError>,
    pub finished_at: Instant,
}

impl TaskResult {
    pub fn new(task_id: TaskId, outcome: Result<String, TaskError>) -> Self {
        Self {
            task_id,
            outcome,
            finished_at: Instant::now(),
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn output(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn err(&self) -> Option<&TaskError> {
        self.outcome.as_ref().err()
    }
}

/// Open -> Draining -> Closed, только вперёд
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DispatcherState {
    Open,
    Draining,
    Closed,
}

impl DispatcherState {
    #[inline]
    pub fn is_open(self) -> bool {
        self == DispatcherState::Open
    }
}


/// Снимок счётчиков диспетчера
#[derive(Debug, Clone)]
pub struct DispatcherMetrics {
    pub state: DispatcherState,
    pub queue_capacity: u64,
    pub submitted: u64,
    pub rejected: u64,
    pub queued: u64,
    pub processed: u64,
    pub failed: u64,
    pub timed_out: u64,
}

impl DispatcherMetrics {
    /// Доля занятой ёмкости очереди, 0.0..=1.0
    pub fn queue_pressure(&self) -> f64 {
        if self.queue_capacity == 0 {
            return 0.0;
        }
        (self.queued as f64 / self.queue_capacity as f64).min(1.0)
    }

    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 1.0;
        }
        (self.processed - self.failed) as f64 / self.processed as f64
    }
}

/// Что воркер успел сделать к моменту остановки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerSummary {
    pub processed: u64,
    pub failed: u64,
}
