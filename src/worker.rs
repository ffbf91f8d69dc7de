use super::{
    counter::SharedCounter,
    errors::TaskError,
    handle::panic_message,
    model::{Task, TaskResult, WorkerSummary},
    processor::Processor,
};
use std::{
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use futures::FutureExt;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};


/// Задача вместе с приватным каналом завершения её вызывающего
pub(crate) struct Envelope {
    pub task: Task,
    pub reply: oneshot::Sender<TaskResult>,
}

#[derive(Debug, Default)]
pub(crate) struct DispatchStats {
    pub submitted: AtomicU64,
    pub rejected: AtomicU64,
    pub queued: AtomicU64,
    pub timed_out: AtomicU64,
    pub processed: SharedCounter,
    pub failed: SharedCounter,
}

/// Единственный потребитель канала задач.
///
/// Задачи обрабатываются строго по одной в порядке постановки в очередь.
/// Ресивер принадлежит только циклу, поэтому канал закрывается ровно один раз.
pub(crate) struct WorkerLoop {
    receiver: mpsc::Receiver<Envelope>,
    processor: Arc<dyn Processor>,
    shutdown: CancellationToken,
    process_timeout: Option<Duration>,
    stats: Arc<DispatchStats>,
}

impl WorkerLoop {
    pub fn new(
        receiver: mpsc::Receiver<Envelope>,
        processor: Arc<dyn Processor>,
        shutdown: CancellationToken,
        process_timeout: Option<Duration>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            receiver,
            processor,
            shutdown,
            process_timeout,
            stats,
        }
    }

    pub fn spawn(self) -> JoinHandle<WorkerSummary> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> WorkerSummary {
        let mut summary = WorkerSummary::default();

        // без default-ветки: ждём либо задачу, либо сигнал остановки
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("worker received shutdown signal");
                    break;
                }
                next = self.receiver.recv() => {
                    match next {
                        Some(envelope) => {
                            let ok = self.handle(envelope).await;
                            summary.processed += 1;
                            if !ok {
                                summary.failed += 1;
                            }
                        }
                        None => {
                            debug!("task channel closed and drained");
                            break;
                        }
                    }
                }
            }
        }

        self.receiver.close();
        let mut abandoned = 0u64;
        while let Ok(envelope) = self.receiver.try_recv() {
            self.stats.queued.fetch_sub(1, Ordering::Relaxed);
            // reply дропается вместе с конвертом, вызывающий увидит QueueClosed
            drop(envelope);
            abandoned += 1;
        }
        if abandoned > 0 {
            warn!(abandoned, "worker stopped with unprocessed tasks");
        }

        info!(
            processed = summary.processed,
            failed = summary.failed,
            "worker stopped"
        );
        summary
    }

    /// Всегда выдаёт ровно один `TaskResult`. Возвращает `false`, если задача упала
    async fn handle(&self, envelope: Envelope) -> bool {
        let Envelope { task, reply } = envelope;
        self.stats.queued.fetch_sub(1, Ordering::Relaxed);

        let task_id = task.id;
        let waited = task.submitted_at.elapsed();
        let outcome = self.process(task).await;

        self.stats.processed.increment();
        let ok = match &outcome {
            Ok(_) => {
                debug!(%task_id, ?waited, "task processed");
                true
            }
            Err(err) => {
                self.stats.failed.increment();
                warn!(%task_id, error = %err, "task failed");
                false
            }
        };

        if reply.send(TaskResult::new(task_id, outcome)).is_err() {
            debug!(%task_id, "caller gave up, result discarded");
        }
        ok
    }

    async fn process(&self, task: Task) -> Result<String, TaskError> {
        // паника может случиться и при создании future, и при его опросе
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| self.processor.process(task))) {
            Ok(fut) => fut,
            Err(panic) => return Err(TaskError::Panic(panic_message(&*panic))),
        };
        let guarded = AssertUnwindSafe(fut).catch_unwind();

        let result = match self.process_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => return Err(TaskError::Timeout(limit)),
            },
            None => guarded.await,
        };

        result.unwrap_or_else(|panic| Err(TaskError::Panic(panic_message(&*panic))))
    }
}
