//! Ядро конкурентной диспетчеризации задач
//!
//! # Features
//! - Приём задач от любого числа конкурентных вызывающих
//! - Один последовательный воркер, порядок обработки = порядок постановки
//! - Гонка результата с дедлайном (кооперативная отмена)
//! - Graceful shutdown с дренажом очереди
//! - Изоляция ошибок и паник на уровне отдельной задачи
//! - Lock-free пул переиспользуемых значений и счётчик под мьютексом

pub mod config;
pub mod counter;
pub mod dispatcher;
pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod processor;
mod worker;

pub use config::Config;
pub use counter::SharedCounter;
pub use dispatcher::{Dispatcher, TaskDispatcher};
pub use errors::{DispatchError, DispatchResult, TaskError};
pub use handle::{CallHandle, execute, execute_cooperative, execute_timeout};
pub use model::{DispatcherMetrics, DispatcherState, Task, TaskId, TaskResult};
pub use pool::ResourcePool;
pub use processor::{Processor, SimulatedProcessor};
