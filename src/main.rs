use anyhow::Result;
use task_dispatch::{Config, DispatchError, SimulatedProcessor, TaskDispatcher};
use tokio::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};


#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_dispatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, "configuration loaded");

    let dispatcher = TaskDispatcher::with_config(
        config,
        SimulatedProcessor::new(Duration::from_millis(20)),
    );
    let monitor = dispatcher.start_monitoring(Duration::from_millis(250), |metrics| {
        tracing::info!(
            queued = metrics.queued,
            pressure = metrics.queue_pressure(),
            processed = metrics.processed,
            failed = metrics.failed,
            "dispatcher metrics"
        );
    });

    let mut handles = Vec::new();
    for i in 0..64 {
        let dispatcher = dispatcher.clone();
        let payload = match i {
            13 => "fail".to_string(),
            42 => "panic".to_string(),
            _ => format!("job-{i}"),
        };
        handles.push(tokio::spawn(async move {
            let task = dispatcher.task(payload);
            dispatcher.submit_default(task).await
        }));
    }

    for handle in handles {
        match handle.await? {
            Ok(result) => match result.outcome {
                Ok(output) => tracing::info!(task_id = %result.task_id, status = 200, %output),
                Err(err) => tracing::warn!(task_id = %result.task_id, status = 500, error = %err),
            },
            Err(err @ (DispatchError::Timeout | DispatchError::QueueClosed)) => {
                tracing::warn!(status = err.http_status(), error = %err, "submit failed");
            }
            Err(err) => return Err(err.into()),
        }
    }

    TaskDispatcher::stop_monitoring(monitor);
    dispatcher.shutdown().await?;

    let metrics = dispatcher.metrics();
    tracing::info!(
        processed = metrics.processed,
        failed = metrics.failed,
        success_rate = metrics.success_rate(),
        "done"
    );
    Ok(())
}
