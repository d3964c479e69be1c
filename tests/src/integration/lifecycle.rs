//! # Lifecycle
//!
//! Observation stream, statistics accounting, interceptor errors and dispose.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use dispatch_bus::{
        DispatchError, Dispatcher, DispatcherConfig, Event, EventDispatcherApi, HandlerError,
        InterceptDecision, Interceptor, InterceptorError, ObservationFilter, ObservationStream,
        SubscribeOptions, SubscriptionState, TimeSource,
    };
    use tokio::time::timeout;

    use crate::fixtures::{Counter, SyncState, TestEvent, TestKind};

    /// Drain whatever arrives within `window`.
    async fn collect_kinds(
        stream: &mut ObservationStream<TestEvent>,
        window: Duration,
    ) -> Vec<TestKind> {
        let mut kinds = Vec::new();
        while let Ok(Some(event)) = timeout(window, stream.recv()).await {
            kinds.push(event.kind());
        }
        kinds
    }

    struct FixedClock(u64);

    impl TimeSource for FixedClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    struct Ordered {
        name: &'static str,
        log: Arc<parking_lot::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Interceptor<TestEvent> for Ordered {
        fn name(&self) -> &str {
            self.name
        }

        async fn before_publish(
            &self,
            _event: &Event<TestEvent>,
        ) -> Result<InterceptDecision, InterceptorError> {
            self.log.lock().push(format!("before:{}", self.name));
            Ok(InterceptDecision::Continue)
        }

        async fn after_publish(&self, _event: &Event<TestEvent>) -> Result<(), InterceptorError> {
            self.log.lock().push(format!("after:{}", self.name));
            Ok(())
        }
    }

    struct FailingAfter;

    #[async_trait]
    impl Interceptor<TestEvent> for FailingAfter {
        fn name(&self) -> &str {
            "failing-after"
        }

        async fn after_publish(&self, _event: &Event<TestEvent>) -> Result<(), InterceptorError> {
            Err(InterceptorError::new("sink closed"))
        }
    }

    #[tokio::test]
    async fn observers_filter_by_kind() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let mut everything = dispatcher.observe_all().unwrap();
        let mut syncs_only = dispatcher
            .observe(ObservationFilter::kinds(vec![TestKind::Sync]))
            .unwrap();

        dispatcher.fire(TestEvent::login("jo")).await.unwrap();
        dispatcher
            .fire(TestEvent::Sync {
                status: SyncState::Started,
            })
            .await
            .unwrap();

        let window = Duration::from_millis(50);
        assert_eq!(
            collect_kinds(&mut everything, window).await,
            vec![TestKind::Login, TestKind::Sync]
        );
        assert_eq!(collect_kinds(&mut syncs_only, window).await, vec![TestKind::Sync]);
    }

    #[tokio::test]
    async fn observer_sees_event_before_handlers_settle() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let mut observer = dispatcher.observe_all().unwrap();

        dispatcher
            .subscribe(
                TestKind::Test,
                |_event| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<(), HandlerError>(())
                },
                SubscribeOptions::new(),
            )
            .unwrap();

        let publisher = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.fire(TestEvent::Test { n: 1 }).await })
        };

        let observed = timeout(Duration::from_millis(50), observer.recv())
            .await
            .expect("observed before handlers finished")
            .expect("event");
        assert_eq!(observed.kind(), TestKind::Test);
        publisher.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn fire_uses_configured_clock() {
        let dispatcher: Dispatcher<TestEvent> =
            Dispatcher::with_time_source(DispatcherConfig::default(), Arc::new(FixedClock(1_234)));
        let mut observer = dispatcher.observe_all().unwrap();

        dispatcher.fire(TestEvent::Test { n: 0 }).await.unwrap();

        let observed = observer.recv().await.expect("event");
        assert_eq!(observed.created_at(), 1_234);
    }

    #[tokio::test]
    async fn interceptors_wrap_in_registration_order() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            dispatcher
                .add_interceptor(Arc::new(Ordered {
                    name,
                    log: Arc::clone(&log),
                }))
                .unwrap();
        }
        {
            let log = Arc::clone(&log);
            dispatcher
                .subscribe(
                    TestKind::Login,
                    move |_event| {
                        log.lock().push("handler".to_string());
                        async { Ok(()) }
                    },
                    SubscribeOptions::new(),
                )
                .unwrap();
        }

        dispatcher.fire(TestEvent::login("kai")).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["before:first", "before:second", "handler", "after:first", "after:second"]
        );
    }

    #[tokio::test]
    async fn after_hook_error_reaches_publisher() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let counter = Counter::new();
        dispatcher
            .subscribe(TestKind::Login, counter.handler(), SubscribeOptions::new())
            .unwrap();
        dispatcher.add_interceptor(Arc::new(FailingAfter)).unwrap();

        let err = dispatcher.fire(TestEvent::login("lou")).await.unwrap_err();

        // Handlers already ran; only the publisher sees the failure.
        assert_eq!(counter.count(), 1);
        match err {
            DispatchError::Interceptor {
                interceptor,
                source,
            } => {
                assert_eq!(interceptor, "failing-after");
                assert_eq!(source.message(), "sink closed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn statistics_track_every_counter() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let counter = Counter::new();

        dispatcher
            .subscribe(
                TestKind::Sync,
                counter.handler(),
                SubscribeOptions::new().filter(|event: &Event<TestEvent>| {
                    matches!(
                        event.payload(),
                        TestEvent::Sync {
                            status: SyncState::Completed
                        }
                    )
                }),
            )
            .unwrap();
        dispatcher
            .subscribe(
                TestKind::Sync,
                counter.failing_handler(),
                SubscribeOptions::new().remove_on_error(true),
            )
            .unwrap();

        for status in [SyncState::Started, SyncState::Completed] {
            dispatcher.fire(TestEvent::Sync { status }).await.unwrap();
        }

        let stats = dispatcher.statistics().unwrap();
        let sync = stats.get(&TestKind::Sync).unwrap();
        assert_eq!(sync.total_count, 2);
        assert_eq!(sync.active_count, 1);
        assert_eq!(sync.published, 2);
        assert_eq!(sync.filter_rejections, 1);
        assert_eq!(sync.handler_failures, 1);
        assert_eq!(sync.removed_on_error, 1);
        assert_eq!(stats.events_published, 2);
        assert_eq!(stats.total_active(), 1);
    }

    #[tokio::test]
    async fn dispose_through_api_trait() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let api: Arc<dyn EventDispatcherApi<TestEvent>> = Arc::new(dispatcher.clone());
        let handle = dispatcher
            .subscribe(TestKind::Login, Counter::new().handler(), SubscribeOptions::new())
            .unwrap();
        let mut observer = api.observe_all().unwrap();

        api.dispose().unwrap();

        assert_eq!(handle.state(), SubscriptionState::Cancelled);
        assert!(observer.recv().await.is_none());
        assert_eq!(api.dispose().unwrap_err(), DispatchError::Disposed);
        assert_eq!(
            dispatcher
                .subscribe(TestKind::Login, Counter::new().handler(), SubscribeOptions::new())
                .unwrap_err(),
            DispatchError::Disposed
        );
    }

    #[tokio::test]
    async fn handle_outlives_dispatcher() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let handle = dispatcher
            .subscribe(TestKind::Login, Counter::new().handler(), SubscribeOptions::new())
            .unwrap();

        drop(dispatcher);

        assert!(!handle.is_active());
        assert!(!handle.cancel());
    }
}
