use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use streambus::{
    BrokerError, Client, MemoryClient, Message, Producer, PublishAsync, ReceiveAsync, Shard,
    StreamingConsumer, Topic, Ulid,
};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

fn message(external_id: &str) -> Message {
    Message::builder()
        .external_id(external_id)
        .data("payload", external_id.as_bytes().to_vec())
        .build()
        .unwrap()
}

fn shard_of(topic: &Arc<dyn Topic>) -> Arc<dyn Shard> {
    topic.shard_of(&topic.first_shard()).unwrap()
}

#[test]
fn messages_arrive_in_publish_order() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let producer = topic.producer().unwrap();
    producer
        .publish(vec![message("a"), message("b"), message("c"), message("d")])
        .unwrap();

    let shard = shard_of(&topic);
    let consumer = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();

    let mut prev: Option<Ulid> = None;
    for expected in ["a", "b", "c", "d"] {
        let received = consumer.receive(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(received.external_id(), expected);
        let ulid = received.ulid().unwrap();
        if let Some(prev) = prev {
            assert!(ulid > prev);
        }
        prev = Some(ulid);
    }
    assert!(consumer.receive(Duration::from_millis(10)).unwrap().is_none());
}

#[test]
fn all_fields_survive_publish_and_consume() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let producer = topic.producer().unwrap();

    let original = Message::builder()
        .external_id("order-17")
        .client_source_id("client-1")
        .ordering_group("group-a")
        .sequence_number(3)
        .attribute("key1", "value1")
        .attribute("key2", "value2")
        .data("payload", vec![1, 2, 3])
        .data("attachment", vec![4, 5])
        .build()
        .unwrap();
    producer.publish(vec![original]).unwrap();

    let shard = shard_of(&topic);
    let consumer = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();
    let received = consumer.receive(Duration::from_secs(1)).unwrap().unwrap();

    assert_eq!(received.external_id(), "order-17");
    assert_eq!(received.client_source_id(), Some("client-1"));
    assert_eq!(received.ordering_group(), Some("group-a"));
    assert_eq!(received.sequence_number(), 3);
    assert_eq!(received.attribute("key1"), Some("value1"));
    assert_eq!(received.attribute("key2"), Some("value2"));
    let keys: Vec<&str> = received.keys().collect();
    assert_eq!(keys, vec!["payload", "attachment"]);
    assert_eq!(received.get("payload"), Some(&[1u8, 2, 3][..]));
    assert_eq!(received.get("attachment"), Some(&[4u8, 5][..]));

    let ulid = received.ulid().unwrap();
    let provider = received.provider().unwrap();
    assert_eq!(provider.shard_id, topic.first_shard());
    assert_eq!(provider.technology, "streambus-memory");
    assert_eq!(provider.sequence_number, ulid.to_string());
    assert!(provider.published_timestamp > 0);
    assert_eq!(received.client_published_timestamp(), Some(ulid.timestamp_ms()));
}

#[test]
fn checkpoint_resume_continues_where_left_off() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let producer = topic.producer().unwrap();
    producer
        .publish(vec![message("a"), message("b"), message("c")])
        .unwrap();

    let shard = shard_of(&topic);
    let consumer = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();
    consumer.receive(Duration::from_secs(1)).unwrap().unwrap();
    consumer.receive(Duration::from_secs(1)).unwrap().unwrap();
    let checkpoint = consumer.current_position().checkpoint().unwrap();
    consumer.close();

    let resumed = shard
        .streaming_consumer(shard.cursor_of_checkpoint(&checkpoint).unwrap())
        .unwrap();
    let next = resumed.receive(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(next.external_id(), "c");
}

#[test]
fn seek_repositions_by_timestamp() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let producer = topic.producer().unwrap();

    // Explicit identifiers pin each message to a known millisecond.
    let t0 = now_millis();
    let publish_at = |external_id: &str, ts: u64| {
        Message::builder()
            .ulid(Ulid::from_parts(ts, 1))
            .external_id(external_id)
            .build()
            .unwrap()
    };
    producer
        .publish(vec![
            publish_at("a", t0 - 2000),
            publish_at("b", t0 - 1000),
            publish_at("c", t0),
        ])
        .unwrap();

    let shard = shard_of(&topic);
    let consumer = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();
    consumer.seek(t0 - 1000);
    let next = consumer.receive(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(next.external_id(), "b");

    consumer.seek(t0 - 2000);
    let next = consumer.receive(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(next.external_id(), "a");

    // Seeking past the last message leaves nothing to receive.
    consumer.seek(t0 + 1000);
    assert!(consumer.receive(Duration::from_millis(100)).unwrap().is_none());
}

#[test]
fn external_id_cursor_inclusive_and_exclusive() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let producer = topic.producer().unwrap();
    producer
        .publish(vec![message("a"), message("b"), message("c"), message("d")])
        .unwrap();

    let shard = shard_of(&topic);
    let now = now_millis();

    let inclusive = shard
        .cursor_of()
        .external_id("b", now, Duration::from_secs(60))
        .inclusive(true)
        .build()
        .unwrap();
    let consumer = shard.streaming_consumer(inclusive).unwrap();
    let next = consumer.receive(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(next.external_id(), "b");

    let exclusive = shard
        .cursor_of()
        .external_id("b", now, Duration::from_secs(60))
        .inclusive(false)
        .build()
        .unwrap();
    let consumer = shard.streaming_consumer(exclusive).unwrap();
    let next = consumer.receive(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(next.external_id(), "c");
}

#[test]
fn missing_external_id_fails_resolution() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    topic
        .producer()
        .unwrap()
        .publish(vec![message("a")])
        .unwrap();

    let shard = shard_of(&topic);
    let cursor = shard
        .cursor_of()
        .external_id("nope", now_millis(), Duration::from_secs(60))
        .build()
        .unwrap();
    match shard.streaming_consumer(cursor) {
        Err(BrokerError::NoSuchExternalId(id)) => assert_eq!(id, "nope"),
        other => panic!("expected NoSuchExternalId, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn empty_topic_cursors() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let shard = shard_of(&topic);

    assert!(shard.cursor_at_last_message().unwrap().is_none());
    // After-last on an empty topic still builds a usable cursor.
    let after = shard.cursor_after_last_message().unwrap();
    let consumer = shard.streaming_consumer(after).unwrap();
    assert!(consumer.receive(Duration::from_millis(10)).unwrap().is_none());
}

#[test]
fn consumers_track_positions_independently() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let producer = topic.producer().unwrap();
    producer.publish(vec![message("a"), message("b")]).unwrap();

    let shard = shard_of(&topic);
    let first = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();
    let second = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();

    // Draining one consumer must not advance the other.
    assert_eq!(
        first.receive(Duration::from_secs(1)).unwrap().unwrap().external_id(),
        "a"
    );
    assert_eq!(
        first.receive(Duration::from_secs(1)).unwrap().unwrap().external_id(),
        "b"
    );
    assert_eq!(
        second.receive(Duration::from_secs(1)).unwrap().unwrap().external_id(),
        "a"
    );
}

#[test]
fn head_cursor_sees_only_later_messages() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let producer = topic.producer().unwrap();
    producer.publish(vec![message("old")]).unwrap();

    let shard = shard_of(&topic);
    // Head resolves at consumer construction, so "old" is behind it.
    thread::sleep(Duration::from_millis(5));
    let consumer = shard.streaming_consumer(shard.cursor_head()).unwrap();
    assert!(consumer.receive(Duration::from_millis(10)).unwrap().is_none());

    producer.publish(vec![message("new")]).unwrap();
    let next = consumer.receive(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(next.external_id(), "new");
}

#[test]
fn blocked_receive_wakes_on_publish() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let shard = shard_of(&topic);
    let consumer = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();

    let handle = thread::spawn(move || consumer.receive(Duration::from_secs(10)));
    thread::sleep(Duration::from_millis(50));
    topic.producer().unwrap().publish(vec![message("a")]).unwrap();

    let received = handle.join().unwrap().unwrap().unwrap();
    assert_eq!(received.external_id(), "a");
}

#[test]
fn close_wakes_blocked_receive() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let shard = shard_of(&topic);
    let consumer = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();
    let blocked = Arc::clone(&consumer);

    let handle = thread::spawn(move || blocked.receive(Duration::from_secs(30)));
    thread::sleep(Duration::from_millis(50));
    consumer.close();

    match handle.join().unwrap() {
        Err(BrokerError::Closed) => {}
        other => panic!("expected Closed, got {:?}", other.map(|_| ())),
    }
    assert!(consumer.is_closed());
}

#[test]
fn receive_deadline_holds_during_concurrent_receive() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let shard = shard_of(&topic);
    let consumer = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();
    let blocked = Arc::clone(&consumer);

    let handle = thread::spawn(move || blocked.receive(Duration::from_secs(5)));
    thread::sleep(Duration::from_millis(50));

    // A second receive on the same consumer must honor its own deadline
    // instead of queueing behind the blocked one.
    let started = std::time::Instant::now();
    let result = consumer.receive(Duration::from_millis(100)).unwrap();
    assert!(result.is_none());
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "concurrent receive took {:?}",
        started.elapsed()
    );

    topic.producer().unwrap().publish(vec![message("a")]).unwrap();
    let received = handle.join().unwrap().unwrap().unwrap();
    assert_eq!(received.external_id(), "a");
}

#[test]
fn seek_and_current_position_stay_prompt_during_blocked_receive() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let shard = shard_of(&topic);
    let consumer = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();
    let blocked = Arc::clone(&consumer);

    let handle = thread::spawn(move || blocked.receive(Duration::from_secs(5)));
    thread::sleep(Duration::from_millis(50));

    let started = std::time::Instant::now();
    consumer.seek(0);
    let position = consumer.current_position();
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "seek during a blocked receive took {:?}",
        started.elapsed()
    );
    assert!(position.is_resolved());

    // The blocked receive picks up the new position once data arrives.
    topic.producer().unwrap().publish(vec![message("a")]).unwrap();
    let received = handle.join().unwrap().unwrap().unwrap();
    assert_eq!(received.external_id(), "a");
}

#[test]
fn async_publish_and_receive() {
    let client = MemoryClient::new();
    let topic = client.topic_of("orders").unwrap();
    let producer = topic.producer().unwrap();

    producer
        .publish_async(vec![message("a")])
        .join()
        .unwrap()
        .unwrap();

    let shard = shard_of(&topic);
    let consumer = shard
        .streaming_consumer(shard.cursor_at_trim_horizon())
        .unwrap();
    let received = consumer.receive_async().join().unwrap().unwrap().unwrap();
    assert_eq!(received.external_id(), "a");
}
