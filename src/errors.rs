use thiserror::Error;
use tokio::time::Duration;


pub type DispatchResult<T> = Result<T, DispatchError>;

/// Ошибки, которые видит вызывающая сторона `submit` / `execute`
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DispatchError {
    /// Диспетчер не в состоянии Open. Повторять бессмысленно
    #[error("task queue is closed")]
    QueueClosed,

    /// Дедлайн истёк раньше, чем пришёл результат.
    /// Задача при этом могла быть (или ещё будет) обработана
    #[error("deadline elapsed before a result arrived")]
    Timeout,

    /// Сбой вне границы отдельной задачи
    #[error("worker failed: {0}")]
    WorkerFailed(String),
}

impl DispatchError {
    /// HTTP-статус, которым внешний обработчик запросов отвечает на ошибку
    pub fn http_status(&self) -> u16 {
        match self {
            DispatchError::QueueClosed => 503,
            DispatchError::Timeout => 408,
            DispatchError::WorkerFailed(_) => 500,
        }
    }
}

/// Ошибка обработки конкретной задачи. Живёт внутри `TaskResult`,
/// границу воркера никогда не пересекает
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TaskError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panic(String),

    #[error("processing exceeded {0:?}")]
    Timeout(Duration),
}

impl TaskError {
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: expected a non-negative integer")]
    InvalidNumber { key: String, value: String },

    #[error("{key} must be greater than zero")]
    Zero { key: String },
}
