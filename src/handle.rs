use super::errors::{DispatchError, DispatchResult};
use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    task::{Context, Poll},
};
use futures::FutureExt;
use tokio::{
    sync::oneshot,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;


/// Handle на операцию, запущенную независимо от вызывающего.
///
/// Отмена кооперативная: `cancel()` только взводит токен, саму операцию
/// никто не прерывает. Если операция токен не слушает, она доработает
/// до конца в фоне, а её результат будет выброшен.
pub struct CallHandle<T> {
    cancel_token: CancellationToken,
    receiver: oneshot::Receiver<DispatchResult<T>>,
}

impl<T> CallHandle<T> {
    fn new(
        cancel_token: CancellationToken,
        receiver: oneshot::Receiver<DispatchResult<T>>,
    ) -> Self {
        Self {
            cancel_token,
            receiver,
        }
    }

    #[inline]
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Ждёт результат или дедлайн, что наступит раньше.
    /// По дедлайну взводит токен отмены и возвращает `Timeout`
    pub async fn await_deadline(self, deadline: Instant) -> DispatchResult<T> {
        let Self { cancel_token, receiver } = self;
        match tokio::time::timeout_at(deadline, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DispatchError::WorkerFailed("call dropped without a result".into())),
            Err(_) => {
                cancel_token.cancel();
                Err(DispatchError::Timeout)
            }
        }
    }
}

impl<T> Future for CallHandle<T> {
    type Output = DispatchResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or_else(|_| {
                Err(DispatchError::WorkerFailed("call dropped without a result".into()))
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Запускает операцию отдельной tokio-задачей и сразу возвращает handle
pub fn spawn_call<T, F>(fut: F) -> CallHandle<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    spawn_cooperative(move |_token| fut)
}

/// То же, что `spawn_call`, но операция получает токен, который взводится
/// при `cancel()` или по дедлайну в `await_deadline`
pub fn spawn_cooperative<T, F, Fut>(f: F) -> CallHandle<T>
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let (tx, rx) = oneshot::channel::<DispatchResult<T>>();
    let cancel_token = CancellationToken::new();
    let fut = f(cancel_token.clone());

    tokio::spawn(async move {
        let result = AssertUnwindSafe(fut)
            .catch_unwind()
            .await
            .map_err(|panic| DispatchError::WorkerFailed(panic_message(&*panic)));
        // получатель мог уже уйти по таймауту, тогда результат просто выбрасываем
        let _ = tx.send(result);
    });

    CallHandle::new(cancel_token, rx)
}

/// Гонка операции с дедлайном
pub async fn execute<T, F>(fut: F, deadline: Instant) -> DispatchResult<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    spawn_call(fut).await_deadline(deadline).await
}

pub async fn execute_timeout<T, F>(fut: F, timeout: Duration) -> DispatchResult<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    execute(fut, Instant::now() + timeout).await
}

/// Гонка с дедлайном для операций, которые умеют останавливаться сами:
/// по дедлайну операция видит отменённый токен
pub async fn execute_cooperative<T, F, Fut>(f: F, deadline: Instant) -> DispatchResult<T>
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    spawn_cooperative(f).await_deadline(deadline).await
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
