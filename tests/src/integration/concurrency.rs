//! # Concurrency
//!
//! Publishers, subscribers and cancellations racing on one dispatcher from
//! many tasks of a multi-threaded runtime.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use dispatch_bus::{Dispatcher, Event, HandlerError, SubscribeOptions};
    use futures::future::join_all;

    use crate::fixtures::{Counter, TestEvent, TestKind};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publishers_reach_every_subscriber() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let counters: Vec<Counter> = (0..5).map(|_| Counter::new()).collect();
        for counter in &counters {
            dispatcher
                .subscribe(TestKind::Test, counter.handler(), SubscribeOptions::new())
                .unwrap();
        }

        let publishers = (0..8).map(|task| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                for n in 0..25 {
                    dispatcher
                        .fire(TestEvent::Test { n: task * 100 + n })
                        .await
                        .unwrap();
                }
            })
        });
        for result in join_all(publishers).await {
            result.unwrap();
        }

        for counter in &counters {
            assert_eq!(counter.count(), 200);
        }
        assert_eq!(dispatcher.statistics().unwrap().events_published, 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn subscribing_while_publishing() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();

        let subscriber = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let mut handles = Vec::new();
                for _ in 0..50 {
                    handles.push(
                        dispatcher
                            .subscribe(
                                TestKind::Login,
                                |_event| async { Ok(()) },
                                SubscribeOptions::new(),
                            )
                            .unwrap(),
                    );
                    tokio::task::yield_now().await;
                }
                handles
            })
        };

        let publisher = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    dispatcher.fire(TestEvent::login("ivan")).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let handles = subscriber.await.unwrap();
        publisher.await.unwrap();

        assert_eq!(handles.len(), 50);
        assert_eq!(dispatcher.subscriber_count(TestKind::Login), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn handler_unsubscribing_itself_mid_publish() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let later = Counter::new();

        // The handle is only known after subscribing, so hand it in through a slot.
        let slot: Arc<parking_lot::Mutex<Option<dispatch_bus::SubscriptionHandle<TestEvent>>>> =
            Arc::new(parking_lot::Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let handle = {
            let slot = Arc::clone(&slot);
            let calls = Arc::clone(&calls);
            dispatcher
                .subscribe(
                    TestKind::Test,
                    move |_event| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        if let Some(handle) = slot.lock().as_ref() {
                            handle.cancel();
                        }
                        async { Ok(()) }
                    },
                    SubscribeOptions::new().priority(10),
                )
                .unwrap()
        };
        *slot.lock() = Some(handle);
        dispatcher
            .subscribe(TestKind::Test, later.handler(), SubscribeOptions::new())
            .unwrap();

        dispatcher.fire(TestEvent::Test { n: 1 }).await.unwrap();
        dispatcher.fire(TestEvent::Test { n: 2 }).await.unwrap();

        // The snapshot taken before fan-out still delivers to the lower priority
        // subscriber on the first publish.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(later.count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slow_handler_does_not_block_siblings() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let fast = Counter::new();

        dispatcher
            .subscribe(
                TestKind::Test,
                |_event| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<(), HandlerError>(())
                },
                SubscribeOptions::new().priority(5),
            )
            .unwrap();
        dispatcher
            .subscribe(TestKind::Test, fast.handler(), SubscribeOptions::new())
            .unwrap();

        let publish = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.fire(TestEvent::Test { n: 0 }).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fast.count(), 1);

        let outcome = publish.await.unwrap().unwrap();
        assert_eq!(outcome.report().unwrap().invoked, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_unsubscribe_counts_once() {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let handle = dispatcher
            .subscribe(TestKind::Sync, |_event: Arc<Event<TestEvent>>| async { Ok(()) }, SubscribeOptions::new())
            .unwrap();

        let attempts = (0..16).map(|_| {
            let dispatcher = dispatcher.clone();
            let handle = handle.clone();
            tokio::spawn(async move { dispatcher.unsubscribe(&handle).unwrap() })
        });
        let cancelled = join_all(attempts)
            .await
            .into_iter()
            .filter(|result| *result.as_ref().unwrap())
            .count();

        assert_eq!(cancelled, 1);
        let stats = dispatcher.statistics().unwrap();
        assert_eq!(stats.get(&TestKind::Sync).unwrap().total_count, 1);
        assert_eq!(stats.get(&TestKind::Sync).unwrap().active_count, 0);
    }
}
