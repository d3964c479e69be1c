//! # Runtime Flow
//!
//! The composition root end to end: telemetry interceptors, session handlers,
//! maintenance gate and shutdown, driven through `DispatchContainer`.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dispatch_bus::DispatchError;
    use dispatch_runtime::{
        DispatchContainer, RuntimeConfig, SessionEvent, SessionEventKind, SyncStatus,
    };
    use tokio::time::timeout;

    #[tokio::test]
    async fn session_day() {
        let container = DispatchContainer::new(RuntimeConfig::default()).unwrap();
        let mut observer = container.dispatcher.observe_all().unwrap();

        for user in ["ana", "ben", "cam"] {
            container.publish(SessionEvent::login(user)).await.unwrap();
        }
        container
            .publish(SessionEvent::sync(SyncStatus::Completed, 12))
            .await
            .unwrap();
        container.publish(SessionEvent::logout("ben")).await.unwrap();

        assert_eq!(container.sessions.active_users(), vec!["ana", "cam"]);
        assert_eq!(container.ledger.items(), 12);

        let mut observed = 0;
        while timeout(Duration::from_millis(20), observer.recv())
            .await
            .ok()
            .flatten()
            .is_some()
        {
            observed += 1;
        }
        assert_eq!(observed, 5);
    }

    #[tokio::test]
    async fn statistics_serialize_to_json() {
        let container = DispatchContainer::new(RuntimeConfig::default()).unwrap();
        container.publish(SessionEvent::login("dan")).await.unwrap();

        let statistics = container.dispatcher.statistics().unwrap();
        let json = serde_json::to_value(&statistics).unwrap();

        assert_eq!(json["events_published"], 1);
        assert_eq!(json["kinds"]["Login"]["active_count"], 2);
        assert_eq!(json["interceptors"], 3);
    }

    #[tokio::test]
    async fn maintenance_aborts_are_counted() {
        let container = DispatchContainer::new(RuntimeConfig::default()).unwrap();
        container.gate.set_enabled(true);

        let outcome = container
            .publish(SessionEvent::sync(SyncStatus::Completed, 1))
            .await
            .unwrap();

        assert!(outcome.is_aborted());
        let statistics = container.dispatcher.statistics().unwrap();
        assert_eq!(statistics.events_aborted, 1);
        assert_eq!(statistics.events_published, 0);
        assert_eq!(container.metrics.in_flight(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_everything() {
        let container = DispatchContainer::new(RuntimeConfig::default()).unwrap();
        let mut observer = container.dispatcher.observe_all().unwrap();

        container.shutdown().unwrap();

        assert!(observer.recv().await.is_none());
        assert_eq!(container.dispatcher.subscriber_count(SessionEventKind::Login), 0);
        assert_eq!(container.shutdown().unwrap_err(), DispatchError::Disposed);
    }
}
