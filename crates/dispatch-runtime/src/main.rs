//! # Dispatch Runtime
//!
//! Demo process for the dispatch bus.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging, metrics) from the environment
//! 2. Build the container: one dispatcher, interceptors, subscribers
//! 3. Attach an observer to the global observation stream
//! 4. Publish a short session workload
//! 5. Print statistics (and metrics, when enabled)
//! 6. Dispose

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use dispatch_runtime::{DispatchContainer, RuntimeConfig, SessionEvent, SyncStatus};
use dispatch_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let metrics_enabled = telemetry.metrics_enabled;
    let _guard = init_telemetry(telemetry).context("Failed to initialize telemetry")?;

    let container =
        DispatchContainer::new(RuntimeConfig::from_env()).context("Failed to build container")?;

    let mut observer = container
        .dispatcher
        .observe_all()
        .context("Failed to attach observer")?;
    let observer_task = tokio::spawn(async move {
        let mut seen = 0usize;
        while let Some(event) = observer.recv().await {
            seen += 1;
            tracing::debug!(event_id = %event.id(), kind = ?event.kind(), "observed");
        }
        seen
    });

    // Disposing closes the observation stream, which ends the observer task.
    let outcome = container
        .shutdown_after(async {
            run_workload(&container).await?;
            report(&container, metrics_enabled)
        })
        .await;
    if let Err(error) = &outcome {
        warn!(error = %error, "Workload failed");
    }

    let observed = observer_task.await.context("Observer task failed")?;
    info!(observed, "Observer drained");

    outcome
}

fn report(container: &DispatchContainer, metrics_enabled: bool) -> Result<()> {
    let statistics = container
        .dispatcher
        .statistics()
        .context("Failed to read statistics")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&statistics).context("Failed to encode statistics")?
    );

    if metrics_enabled {
        println!("{}", dispatch_telemetry::gather().context("Failed to gather metrics")?);
    }

    info!(
        active_users = ?container.sessions.active_users(),
        completed_syncs = container.ledger.completed(),
        synced_items = container.ledger.items(),
        heartbeats = container.heartbeats(),
        "Workload finished"
    );

    Ok(())
}

async fn run_workload(container: &DispatchContainer) -> Result<()> {
    let workload = [
        SessionEvent::login("alice"),
        SessionEvent::login("bob"),
        SessionEvent::Heartbeat { sequence: 1 },
        SessionEvent::sync(SyncStatus::Started, 0),
        SessionEvent::sync(SyncStatus::Completed, 42),
        SessionEvent::sync(SyncStatus::Failed, 0),
        SessionEvent::logout("alice"),
        SessionEvent::logout("carol"),
    ];

    for payload in workload {
        let outcome = container.publish(payload).await?;
        if let Some(report) = outcome.report() {
            for failure in &report.failures {
                warn!(
                    subscription_id = %failure.subscription_id,
                    label = failure.label.as_deref(),
                    error = %failure.error,
                    removed = failure.removed,
                    "Subscriber failed"
                );
            }
        }
    }

    container.gate.set_enabled(true);
    let outcome = container
        .publish(SessionEvent::sync(SyncStatus::Completed, 7))
        .await?;
    info!(aborted = outcome.is_aborted(), "Sync attempted during maintenance");
    container.gate.set_enabled(false);

    tokio::time::sleep(Duration::from_millis(10)).await;
    container
        .publish(SessionEvent::Heartbeat { sequence: 2 })
        .await?;

    Ok(())
}
