use super::{
    errors::TaskError,
    model::Task,
    pool::ResourcePool,
};
use std::{future::Future, sync::Arc};
use futures::{future::BoxFuture, FutureExt};
use tokio::time::Duration;


/// Payload, на котором `SimulatedProcessor` возвращает ошибку
pub const FAIL_PAYLOAD: &str = "fail";
/// Payload, на котором `SimulatedProcessor` паникует
pub const PANIC_PAYLOAD: &str = "panic";

/// Работа, которую воркер выполняет над задачей
pub trait Processor: Send + Sync + 'static {
    fn process(&self, task: Task) -> BoxFuture<'static, Result<String, TaskError>>;
}

impl<F, Fut> Processor for F
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, TaskError>> + Send + 'static,
{
    fn process(&self, task: Task) -> BoxFuture<'static, Result<String, TaskError>> {
        self(task).boxed()
    }
}

/// Имитация долгой обработки: ждёт `delay`, потом отвечает `Processed: <payload>`.
/// Буферы под вывод переиспользуются через `ResourcePool`
#[derive(Clone)]
pub struct SimulatedProcessor {
    delay: Duration,
    buffers: Arc<ResourcePool<String>>,
}

impl SimulatedProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            buffers: Arc::new(ResourcePool::new()),
        }
    }

    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn buffers(&self) -> &ResourcePool<String> {
        &self.buffers
    }
}

impl Default for SimulatedProcessor {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl Processor for SimulatedProcessor {
    fn process(&self, task: Task) -> BoxFuture<'static, Result<String, TaskError>> {
        let delay = self.delay;
        let buffers = Arc::clone(&self.buffers);

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match task.payload.as_str() {
                FAIL_PAYLOAD => {
                    return Err(TaskError::failed(format!("{} carried the failure sentinel", task.id)));
                }
                PANIC_PAYLOAD => panic!("{} carried the panic sentinel", task.id),
                _ => {}
            }

            let mut buf = buffers.pop().unwrap_or_default();
            buf.clear();
            buf.push_str("Processed: ");
            buf.push_str(&task.payload);
            let output = buf.as_str().to_owned();
            buffers.push(buf);

            Ok(output)
        }
        .boxed()
    }
}
