use super::{
    config::Config,
    errors::{DispatchError, DispatchResult},
    handle,
    model::{DispatcherMetrics, DispatcherState, Task, TaskId, TaskResult, WorkerSummary},
    processor::Processor,
    worker::{DispatchStats, Envelope, WorkerLoop},
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};


pub type Dispatcher = Arc<TaskDispatcher>;

/// Всё, что меняется при переходе из Open. Живёт под одним мьютексом,
/// поэтому проверка состояния и допуск задачи атомарны относительно shutdown
struct Gate {
    sender: Option<mpsc::Sender<Envelope>>,
    worker: Option<JoinHandle<WorkerSummary>>,
}

/// Точка входа: принимает задачи от любого числа вызывающих,
/// отдаёт их единственному воркеру и возвращает результат или таймаут
pub struct TaskDispatcher {
    gate: Mutex<Gate>,
    state: Arc<watch::Sender<DispatcherState>>,
    closed: Arc<Mutex<Option<DispatchResult<()>>>>,
    worker_shutdown: CancellationToken,
    next_id: AtomicU64,
    stats: Arc<DispatchStats>,
    config: Config,
}

impl TaskDispatcher {
    pub fn new<P: Processor>(processor: P) -> Dispatcher {
        Self::with_config(Config::default(), processor)
    }

    /// Создаёт диспетчер и запускает воркер. Нужен работающий tokio runtime
    pub fn with_config<P: Processor>(config: Config, processor: P) -> Dispatcher {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (state, _) = watch::channel(DispatcherState::Open);
        let worker_shutdown = CancellationToken::new();
        let stats = Arc::new(DispatchStats::default());

        let worker = WorkerLoop::new(
            receiver,
            Arc::new(processor),
            worker_shutdown.clone(),
            config.process_timeout,
            stats.clone(),
        )
        .spawn();

        info!(
            queue_capacity = config.queue_capacity,
            default_deadline = ?config.default_deadline,
            "dispatcher started"
        );

        Arc::new(TaskDispatcher {
            gate: Mutex::new(Gate {
                sender: Some(sender),
                worker: Some(worker),
            }),
            state: Arc::new(state),
            closed: Arc::new(Mutex::new(None)),
            worker_shutdown,
            next_id: AtomicU64::new(1),
            stats,
            config,
        })
    }

    /// Задача со следующим id из последовательности этого диспетчера
    pub fn task(&self, payload: impl Into<String>) -> Task {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Task::new(TaskId(id), payload)
    }

    #[inline]
    pub fn state(&self) -> DispatcherState {
        *self.state.borrow()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ставит задачу в очередь и ждёт результат до `deadline`.
    ///
    /// Постановка и ожидание идут отдельной операцией, которая гоняется с
    /// дедлайном. По таймауту задача может всё равно быть обработана позже,
    /// но её результат будет выброшен.
    pub async fn submit(&self, task: Task, deadline: Instant) -> DispatchResult<TaskResult> {
        let sender = {
            let gate = self.gate.lock();
            match gate.sender.as_ref() {
                Some(sender) if self.state().is_open() => sender.clone(),
                _ => {
                    self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                    debug!(task_id = %task.id, "submit rejected, dispatcher is not open");
                    return Err(DispatchError::QueueClosed);
                }
            }
        };
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        let task_id = task.id;
        let stats = Arc::clone(&self.stats);
        let (reply_tx, reply_rx) = oneshot::channel();

        let call = handle::spawn_call(async move {
            stats.queued.fetch_add(1, Ordering::Relaxed);
            let envelope = Envelope { task, reply: reply_tx };
            if sender.send(envelope).await.is_err() {
                stats.queued.fetch_sub(1, Ordering::Relaxed);
                return Err(DispatchError::QueueClosed);
            }
            drop(sender);
            // reply дропнут без ответа только если воркер остановлен принудительно
            reply_rx.await.map_err(|_| DispatchError::QueueClosed)
        });

        match call.await_deadline(deadline).await {
            Ok(result) => result,
            Err(DispatchError::Timeout) => {
                self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                debug!(%task_id, "submit deadline elapsed");
                Err(DispatchError::Timeout)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn submit_timeout(&self, task: Task, timeout: Duration) -> DispatchResult<TaskResult> {
        self.submit(task, Instant::now() + timeout).await
    }

    /// `submit` с дедлайном из конфигурации
    pub async fn submit_default(&self, task: Task) -> DispatchResult<TaskResult> {
        self.submit_timeout(task, self.config.default_deadline).await
    }

    /// Open -> Draining -> Closed.
    ///
    /// Новые задачи перестают приниматься сразу, уже принятые дообрабатываются.
    /// Дренаж и переход в Closed идут отдельной tokio-задачей, поэтому брошенный
    /// на полпути вызов не оставит диспетчер в Draining навсегда.
    /// Вызов после Closed ничего не делает и возвращает `Ok(())`,
    /// вызовы во время Draining дожидаются Closed и возвращают итог воркера.
    pub async fn shutdown(&self) -> DispatchResult<()> {
        {
            let mut gate = self.gate.lock();
            match self.state() {
                DispatcherState::Closed => return Ok(()),
                DispatcherState::Draining => {}
                DispatcherState::Open => {
                    self.state.send_replace(DispatcherState::Draining);
                    // наш sender последний, кроме тех, что держат уже принятые задачи
                    gate.sender = None;
                    if let Some(worker) = gate.worker.take() {
                        info!(queued = self.stats.queued.load(Ordering::Relaxed), "dispatcher draining");
                        tokio::spawn(close_when_drained(
                            worker,
                            self.config.drain_timeout,
                            self.worker_shutdown.clone(),
                            Arc::clone(&self.state),
                            Arc::clone(&self.closed),
                        ));
                    }
                }
            }
        }

        wait_closed(&mut self.state.subscribe()).await;
        self.closed.lock().clone().unwrap_or(Ok(()))
    }

    #[inline]
    pub fn metrics(&self) -> DispatcherMetrics {
        DispatcherMetrics {
            state: self.state(),
            queue_capacity: self.config.queue_capacity as u64,
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            queued: self.stats.queued.load(Ordering::Relaxed),
            processed: self.stats.processed.value(),
            failed: self.stats.failed.value(),
            timed_out: self.stats.timed_out.load(Ordering::Relaxed),
        }
    }

    /// Мониторинг метрик с callback.
    /// Останавливается сам, когда диспетчер дошёл до Closed (callback получает
    /// финальные метрики), или раньше через token.cancel()
    pub fn start_monitoring<F>(self: &Arc<Self>, interval: Duration, callback: F) -> CancellationToken
    where
        F: Fn(DispatcherMetrics) + Send + 'static,
    {
        let dispatcher = Arc::clone(self);
        let token = CancellationToken::new();
        let token_clone = token.clone();

        let mut state = self.state.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        callback(dispatcher.metrics());
                    }
                    _ = wait_closed(&mut state) => {
                        callback(dispatcher.metrics());
                        break;
                    }
                    _ = token_clone.cancelled() => break,
                }
            }
            drop(dispatcher);
        });

        token
    }

    pub fn stop_monitoring(token: CancellationToken) {
        token.cancel();
    }
}

async fn wait_closed(state: &mut watch::Receiver<DispatcherState>) {
    // Err только если sender уничтожен, а он живёт не меньше диспетчера
    let _ = state.wait_for(|s| *s == DispatcherState::Closed).await;
}

/// Дожидается остановки воркера, публикует его итог и переводит состояние в Closed
async fn close_when_drained(
    mut worker: JoinHandle<WorkerSummary>,
    drain_timeout: Option<Duration>,
    worker_shutdown: CancellationToken,
    state: Arc<watch::Sender<DispatcherState>>,
    closed: Arc<Mutex<Option<DispatchResult<()>>>>,
) {
    let joined = match drain_timeout {
        None => (&mut worker).await,
        Some(limit) => match tokio::time::timeout(limit, &mut worker).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(?limit, "drain timeout elapsed, stopping worker");
                worker_shutdown.cancel();
                worker.await
            }
        },
    };
    worker_shutdown.cancel();

    let outcome = match joined {
        Ok(summary) => {
            info!(
                processed = summary.processed,
                failed = summary.failed,
                "dispatcher closed"
            );
            Ok(())
        }
        Err(join_err) => {
            error!(error = %join_err, "worker terminated abnormally");
            let reason = if join_err.is_panic() {
                handle::panic_message(&*join_err.into_panic())
            } else {
                join_err.to_string()
            };
            Err(DispatchError::WorkerFailed(reason))
        }
    };

    // итог сохраняется до Closed, чтобы ждущие shutdown его увидели
    *closed.lock() = Some(outcome);
    state.send_replace(DispatcherState::Closed);
}
