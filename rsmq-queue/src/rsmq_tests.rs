//! Tests for the queue client against the ephemeral store

use crate::*;
use rsmq_core::{ManualClock, StoreTime};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// TEST HELPERS
// =============================================================================

const START: StoreTime = StoreTime {
    seconds: 1_700_000_000,
    micros: 0,
};

fn client() -> (Rsmq<EphemeralStore>, Arc<ManualClock>) {
    client_with(RsmqOptions::default())
}

fn client_with(options: RsmqOptions) -> (Rsmq<EphemeralStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let store = Arc::new(EphemeralStore::with_clock(clock.clone()));
    (Rsmq::new(store, options), clock)
}

async fn with_queue(name: &str) -> (Rsmq<EphemeralStore>, Arc<ManualClock>) {
    let (rsmq, clock) = client();
    rsmq.create_queue(name, QueueSettings::default())
        .await
        .unwrap();
    (rsmq, clock)
}

fn start_ms() -> u64 {
    START.as_unix_millis()
}

// =============================================================================
// QUEUE REGISTRY
// =============================================================================

mod queue_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_queue() {
        let (rsmq, _) = with_queue("jobs").await;
        assert_eq!(rsmq.list_queues().await.unwrap(), vec!["jobs".to_string()]);
    }

    #[tokio::test]
    async fn test_create_queue_already_exists() {
        let (rsmq, _) = with_queue("jobs").await;
        let result = rsmq.create_queue("jobs", QueueSettings::default()).await;
        assert!(matches!(result, Err(QueueError::QueueExists(_))));
    }

    #[tokio::test]
    async fn test_create_queue_invalid_settings() {
        let (rsmq, _) = client();

        let bad_name = rsmq.create_queue("bad name", QueueSettings::default()).await;
        assert!(matches!(bad_name, Err(QueueError::InvalidArgument(_))));

        let bad_size = rsmq
            .create_queue(
                "jobs",
                QueueSettings {
                    max_size: 10,
                    ..QueueSettings::default()
                },
            )
            .await;
        assert!(matches!(bad_size, Err(QueueError::InvalidArgument(_))));
        assert!(rsmq.list_queues().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_queue() {
        let (rsmq, _) = with_queue("jobs").await;
        rsmq.send_message("jobs", "pending", None).await.unwrap();

        rsmq.delete_queue("jobs").await.unwrap();
        assert!(rsmq.list_queues().await.unwrap().is_empty());
        assert_eq!(rsmq.store().key_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_queue_not_found() {
        let (rsmq, _) = client();
        let result = rsmq.delete_queue("missing").await;
        assert!(matches!(result, Err(QueueError::QueueNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_queues_sorted() {
        let (rsmq, _) = client();
        for name in ["gamma", "alpha", "beta"] {
            rsmq.create_queue(name, QueueSettings::default())
                .await
                .unwrap();
        }
        assert_eq!(rsmq.list_queues().await.unwrap(), vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let clock = Arc::new(ManualClock::new(START));
        let store = Arc::new(EphemeralStore::with_clock(clock));
        let a = Rsmq::new(store.clone(), RsmqOptions::default());
        let b = Rsmq::new(
            store,
            RsmqOptions {
                namespace: "other".to_string(),
                real_time: false,
            },
        );

        a.create_queue("jobs", QueueSettings::default()).await.unwrap();
        assert!(b.list_queues().await.unwrap().is_empty());
        b.create_queue("jobs", QueueSettings::default()).await.unwrap();
    }
}

// =============================================================================
// QUEUE ATTRIBUTES
// =============================================================================

mod attribute_tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults() {
        let (rsmq, _) = with_queue("jobs").await;
        let attrs = rsmq.get_queue_attributes("jobs").await.unwrap();

        assert_eq!(attrs.vt, 30);
        assert_eq!(attrs.delay, 0);
        assert_eq!(attrs.max_size, 65_536);
        assert_eq!(attrs.total_recv, 0);
        assert_eq!(attrs.total_sent, 0);
        assert_eq!(attrs.created, START.seconds);
        assert_eq!(attrs.modified, START.seconds);
        assert_eq!(attrs.msgs, 0);
        assert_eq!(attrs.hidden_msgs, 0);
    }

    #[tokio::test]
    async fn test_not_found() {
        let (rsmq, _) = client();
        let result = rsmq.get_queue_attributes("missing").await;
        assert!(matches!(result, Err(QueueError::QueueNotFound(_))));
    }

    #[tokio::test]
    async fn test_with_traffic() {
        let (rsmq, _) = with_queue("jobs").await;
        rsmq.send_message("jobs", "a", None).await.unwrap();
        rsmq.send_message("jobs", "b", None).await.unwrap();
        rsmq.send_message("jobs", "c", Some(60)).await.unwrap();
        rsmq.receive_message("jobs", None).await.unwrap().unwrap();

        let attrs = rsmq.get_queue_attributes("jobs").await.unwrap();
        assert_eq!(attrs.total_sent, 3);
        assert_eq!(attrs.total_recv, 1);
        assert_eq!(attrs.msgs, 3);
        assert_eq!(attrs.hidden_msgs, 2);
    }

    #[tokio::test]
    async fn test_hidden_uses_millisecond_precision() {
        let (rsmq, clock) = with_queue("jobs").await;
        clock.set(StoreTime::new(START.seconds, 400_000));
        rsmq.send_message("jobs", "now", None).await.unwrap();

        // Sent 400ms into the second: eligible immediately, so not hidden.
        let attrs = rsmq.get_queue_attributes("jobs").await.unwrap();
        assert_eq!(attrs.hidden_msgs, 0);
    }

    #[tokio::test]
    async fn test_set_attributes() {
        let (rsmq, clock) = with_queue("jobs").await;
        clock.advance(Duration::from_secs(5));

        let attrs = rsmq
            .set_queue_attributes(
                "jobs",
                QueueSettingsUpdate {
                    vt: Some(45),
                    delay: Some(2),
                    max_size: Some(-1),
                },
            )
            .await
            .unwrap();

        assert_eq!(attrs.vt, 45);
        assert_eq!(attrs.delay, 2);
        assert_eq!(attrs.max_size, -1);
        assert_eq!(attrs.created, START.seconds);
        assert_eq!(attrs.modified, START.seconds + 5);
    }

    #[tokio::test]
    async fn test_set_attributes_requires_one() {
        let (rsmq, _) = with_queue("jobs").await;
        let result = rsmq
            .set_queue_attributes("jobs", QueueSettingsUpdate::default())
            .await;
        assert!(matches!(result, Err(QueueError::NoAttributesSpecified)));
    }

    #[tokio::test]
    async fn test_set_attributes_missing_queue() {
        let (rsmq, _) = client();
        let result = rsmq
            .set_queue_attributes(
                "missing",
                QueueSettingsUpdate {
                    vt: Some(1),
                    ..QueueSettingsUpdate::default()
                },
            )
            .await;
        assert!(matches!(result, Err(QueueError::QueueNotFound(_))));
    }
}

// =============================================================================
// SEND / RECEIVE / POP
// =============================================================================

mod message_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_returns_id() {
        let (rsmq, _) = with_queue("jobs").await;
        let id = rsmq.send_message("jobs", "hello", None).await.unwrap();

        assert_eq!(id.len(), rsmq_core::id::ID_LENGTH);
        assert_eq!(rsmq_core::id::sent_at(&id), Some(start_ms()));
    }

    #[tokio::test]
    async fn test_send_to_missing_queue() {
        let (rsmq, _) = client();
        let result = rsmq.send_message("missing", "hello", None).await;
        assert!(matches!(result, Err(QueueError::QueueNotFound(_))));
    }

    #[tokio::test]
    async fn test_send_too_large() {
        let (rsmq, _) = client();
        rsmq.create_queue(
            "small",
            QueueSettings {
                max_size: 1024,
                ..QueueSettings::default()
            },
        )
        .await
        .unwrap();

        rsmq.send_message("small", vec![b'x'; 1024], None).await.unwrap();
        let result = rsmq.send_message("small", vec![b'x'; 1025], None).await;
        assert!(matches!(result, Err(QueueError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_receive_empty() {
        let (rsmq, _) = with_queue("jobs").await;
        for _ in 0..5 {
            assert!(rsmq.receive_message("jobs", None).await.unwrap().is_none());
            assert!(rsmq.pop_message("jobs").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_receive_missing_queue() {
        let (rsmq, _) = client();
        let result = rsmq.receive_message("missing", None).await;
        assert!(matches!(result, Err(QueueError::QueueNotFound(_))));

        let result = rsmq.pop_message("missing").await;
        assert!(matches!(result, Err(QueueError::QueueNotFound(_))));
    }

    #[tokio::test]
    async fn test_visibility_timeout_scenario() {
        let (rsmq, clock) = with_queue("jobs").await;
        let id = rsmq.send_message("jobs", "foobar", None).await.unwrap();

        let first = rsmq.receive_message("jobs", None).await.unwrap().unwrap();
        assert_eq!(first.id, id);
        assert_eq!(first.body_lossy(), "foobar");
        assert_eq!(first.rc, 1);
        assert_eq!(first.fr, start_ms());
        assert_eq!(first.sent, start_ms());

        clock.advance(Duration::from_secs(1));
        assert!(rsmq.receive_message("jobs", None).await.unwrap().is_none());

        clock.advance(Duration::from_secs(30));
        let second = rsmq.receive_message("jobs", None).await.unwrap().unwrap();
        assert_eq!(second.id, id);
        assert_eq!(second.rc, 2);
        assert_eq!(second.fr, start_ms());
    }

    #[tokio::test]
    async fn test_receive_vt_zero_redelivers() {
        let (rsmq, clock) = with_queue("jobs").await;
        rsmq.send_message("jobs", "again", None).await.unwrap();

        let first = rsmq.receive_message("jobs", Some(0)).await.unwrap().unwrap();
        clock.advance(Duration::from_millis(3));
        let second = rsmq.receive_message("jobs", Some(0)).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.rc, first.rc + 1);
        assert_eq!(second.fr, first.fr);
    }

    #[tokio::test]
    async fn test_delay_boundary() {
        let (rsmq, clock) = with_queue("jobs").await;
        rsmq.send_message("jobs", "later", Some(10)).await.unwrap();

        clock.advance(Duration::from_millis(9_999));
        assert!(rsmq.pop_message("jobs").await.unwrap().is_none());

        clock.advance(Duration::from_millis(1));
        assert!(rsmq.pop_message("jobs").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_queue_default_delay() {
        let (rsmq, clock) = client();
        rsmq.create_queue(
            "delayed",
            QueueSettings {
                delay: 5,
                ..QueueSettings::default()
            },
        )
        .await
        .unwrap();
        rsmq.send_message("delayed", "x", None).await.unwrap();

        assert!(rsmq.receive_message("delayed", None).await.unwrap().is_none());
        clock.advance(Duration::from_secs(5));
        assert!(rsmq.receive_message("delayed", None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pop_fifo_order() {
        let (rsmq, clock) = with_queue("jobs").await;
        let mut sent = Vec::new();
        for i in 0..100 {
            sent.push(rsmq.send_message("jobs", format!("m{i}"), None).await.unwrap());
            clock.advance(Duration::from_micros(1));
        }

        for (i, id) in sent.iter().enumerate() {
            let message = rsmq.pop_message("jobs").await.unwrap().unwrap();
            assert_eq!(&message.id, id);
            assert_eq!(message.body_lossy(), format!("m{i}"));
        }
        assert!(rsmq.pop_message("jobs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pop_is_final() {
        let (rsmq, clock) = with_queue("jobs").await;
        rsmq.send_message("jobs", "gone", None).await.unwrap();

        let popped = rsmq.pop_message("jobs").await.unwrap().unwrap();
        assert_eq!(popped.rc, 1);
        assert_eq!(popped.fr, start_ms());

        clock.advance(Duration::from_secs(3600));
        assert!(rsmq.receive_message("jobs", None).await.unwrap().is_none());
        assert_eq!(rsmq.get_queue_attributes("jobs").await.unwrap().msgs, 0);
    }
}

// =============================================================================
// VISIBILITY AND DELETION
// =============================================================================

mod visibility_tests {
    use super::*;

    #[tokio::test]
    async fn test_change_visibility_extends() {
        let (rsmq, clock) = with_queue("jobs").await;
        let id = rsmq.send_message("jobs", "slow", None).await.unwrap();
        rsmq.receive_message("jobs", None).await.unwrap().unwrap();

        clock.advance(Duration::from_secs(20));
        rsmq.change_message_visibility("jobs", &id, 60).await.unwrap();

        clock.advance(Duration::from_secs(30));
        assert!(rsmq.receive_message("jobs", None).await.unwrap().is_none());

        clock.advance(Duration::from_secs(30));
        assert_eq!(rsmq.receive_message("jobs", None).await.unwrap().unwrap().id, id);
    }

    #[tokio::test]
    async fn test_change_visibility_zero_exposes() {
        let (rsmq, _) = with_queue("jobs").await;
        let id = rsmq.send_message("jobs", "retry", None).await.unwrap();
        rsmq.receive_message("jobs", None).await.unwrap().unwrap();

        rsmq.change_message_visibility("jobs", &id, 0).await.unwrap();
        let again = rsmq.receive_message("jobs", None).await.unwrap().unwrap();
        assert_eq!(again.id, id);
        assert_eq!(again.rc, 2);
    }

    #[tokio::test]
    async fn test_change_visibility_missing_is_indistinguishable() {
        let (rsmq, _) = with_queue("jobs").await;
        let popped_id = rsmq.send_message("jobs", "x", None).await.unwrap();
        rsmq.pop_message("jobs").await.unwrap().unwrap();
        let never_id = rsmq_core::id::generate(start_ms(), 0);

        let after_pop = rsmq
            .change_message_visibility("jobs", &popped_id, 10)
            .await
            .unwrap_err();
        let never = rsmq
            .change_message_visibility("jobs", &never_id, 10)
            .await
            .unwrap_err();

        assert!(matches!(after_pop, QueueError::MessageNotFound(_)));
        assert!(matches!(never, QueueError::MessageNotFound(_)));
        assert_eq!(after_pop.code(), never.code());
    }

    #[tokio::test]
    async fn test_change_visibility_missing_queue() {
        let (rsmq, _) = client();
        let id = rsmq_core::id::generate(start_ms(), 0);
        let result = rsmq.change_message_visibility("missing", &id, 10).await;
        assert!(matches!(result, Err(QueueError::QueueNotFound(_))));
    }

    #[tokio::test]
    async fn test_change_visibility_bad_id() {
        let (rsmq, _) = with_queue("jobs").await;
        let result = rsmq.change_message_visibility("jobs", "nope", 10).await;
        assert!(matches!(result, Err(QueueError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_delete_message() {
        let (rsmq, clock) = with_queue("jobs").await;
        let id = rsmq.send_message("jobs", "done", None).await.unwrap();
        rsmq.receive_message("jobs", None).await.unwrap().unwrap();

        rsmq.delete_message("jobs", &id).await.unwrap();
        clock.advance(Duration::from_secs(31));
        assert!(rsmq.receive_message("jobs", None).await.unwrap().is_none());

        let again = rsmq.delete_message("jobs", &id).await;
        assert!(matches!(again, Err(QueueError::MessageNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_never_received() {
        let (rsmq, _) = with_queue("jobs").await;
        let id = rsmq.send_message("jobs", "unread", None).await.unwrap();
        rsmq.delete_message("jobs", &id).await.unwrap();
        assert_eq!(rsmq.get_queue_attributes("jobs").await.unwrap().msgs, 0);
    }
}

// =============================================================================
// CONCURRENCY AND NOTIFICATIONS
// =============================================================================

mod concurrency_tests {
    use super::*;
    use futures::future::join_all;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_receive_single_message() {
        let (rsmq, _) = with_queue("jobs").await;
        let rsmq = Arc::new(rsmq);
        let id = rsmq.send_message("jobs", "only one", None).await.unwrap();

        let consumers = (0..64).map(|_| {
            let rsmq = rsmq.clone();
            tokio::spawn(async move { rsmq.receive_message("jobs", None).await })
        });
        let delivered: Vec<Message> = join_all(consumers)
            .await
            .into_iter()
            .filter_map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_pop_delivers_each_once() {
        let (rsmq, clock) = with_queue("jobs").await;
        let rsmq = Arc::new(rsmq);
        for i in 0..50 {
            rsmq.send_message("jobs", format!("m{i}"), None).await.unwrap();
            clock.advance(Duration::from_micros(1));
        }

        let consumers = (0..100).map(|_| {
            let rsmq = rsmq.clone();
            tokio::spawn(async move { rsmq.pop_message("jobs").await })
        });
        let mut ids: Vec<String> = join_all(consumers)
            .await
            .into_iter()
            .filter_map(|r| r.unwrap().unwrap())
            .map(|m| m.id)
            .collect();

        assert_eq!(ids.len(), 50);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn test_real_time_publishes_depth() {
        let (rsmq, _) = client_with(RsmqOptions {
            real_time: true,
            ..RsmqOptions::default()
        });
        rsmq.create_queue("jobs", QueueSettings::default())
            .await
            .unwrap();
        let mut rx = rsmq.subscribe("jobs").await.unwrap();

        rsmq.send_message("jobs", "a", None).await.unwrap();
        rsmq.send_message("jobs", "b", None).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "1");
        assert_eq!(rx.recv().await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_no_publish_without_real_time() {
        let (rsmq, _) = with_queue("jobs").await;
        let mut rx = rsmq.subscribe("jobs").await.unwrap();

        rsmq.send_message("jobs", "a", None).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
