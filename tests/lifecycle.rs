//! End-to-end lifecycle tests over the in-process store: publish/consume
//! round trips and the priority ordering guarantees.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ordena::{ConsumerConfig, MemoryStore, OrdenaClient, PublishOptions, QueueOptions};

fn client() -> OrdenaClient {
    ordena::telemetry::init_tracing();
    OrdenaClient::with_store_and_config(
        Arc::new(MemoryStore::new()),
        ConsumerConfig {
            poll_interval_ms: 50,
        },
    )
}

#[tokio::test]
async fn publish_consume_round_trip() {
    let client = client();
    client
        .create_queue("orders", QueueOptions::default())
        .await
        .unwrap();

    let payload = serde_json::json!({"to": "user@example.com", "items": [1, 2, 3]});
    client
        .publish("orders", payload.clone(), PublishOptions::default())
        .await
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let consumer = client
        .consume("orders", move |payload| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(payload);
                Ok(())
            }
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    consumer.stop().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[payload]);
}

#[tokio::test]
async fn lower_priority_number_is_processed_first() {
    let client = client();
    client
        .create_queue("orders", QueueOptions::default())
        .await
        .unwrap();

    // Publish from lowest-urgency to highest; dequeue order must invert it
    for priority in [2u32, 1, 0] {
        client
            .publish(
                "orders",
                serde_json::json!(priority),
                PublishOptions::default().with_priority(priority),
            )
            .await
            .unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let consumer = client
        .consume("orders", move |payload| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(payload);
                Ok(())
            }
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    consumer.stop().await;

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.as_slice(),
        &[
            serde_json::json!(0),
            serde_json::json!(1),
            serde_json::json!(2)
        ]
    );
}

#[tokio::test]
async fn fifo_within_a_priority_tier() {
    let client = client();
    client
        .create_queue("orders", QueueOptions::default())
        .await
        .unwrap();

    for i in 0..5 {
        client
            .publish(
                "orders",
                serde_json::json!(i),
                PublishOptions::default().with_priority(1),
            )
            .await
            .unwrap();
        // Distinct enqueue milliseconds
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let consumer = client
        .consume("orders", move |payload| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(payload);
                Ok(())
            }
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    consumer.stop().await;

    let seen = seen.lock().unwrap();
    let order: Vec<i64> = seen.iter().map(|v| v.as_i64().unwrap()).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn consumer_picks_up_messages_published_after_start() {
    let client = client();
    client
        .create_queue("orders", QueueOptions::default())
        .await
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let consumer = client
        .consume("orders", move |payload| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(payload);
                Ok(())
            }
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    client
        .publish("orders", serde_json::json!("late"), PublishOptions::default())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    consumer.stop().await;

    assert_eq!(seen.lock().unwrap().len(), 1);
}
