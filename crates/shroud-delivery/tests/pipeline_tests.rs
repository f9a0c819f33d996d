// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end delivery tests over the full component graph.

use shroud_core::types::AckStatus;
use shroud_test_utils::{AckBehavior, TestHarness};

/// Give spawned connection tasks a moment to drain their channels.
async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}

#[tokio::test]
async fn conversation_resolution_is_order_independent() {
    let h = TestHarness::new().await.unwrap();

    let ab = h.directory.resolve("alice", "bob").await.unwrap();
    let ba = h.directory.resolve("bob", "alice").await.unwrap();
    assert_eq!(ab.id, ba.id);
    assert_eq!(ab.user_a, "alice");
    assert_eq!(ab.user_b, "bob");
}

#[tokio::test]
async fn live_send_is_delivered_and_acked() {
    let h = TestHarness::new().await.unwrap();
    let bob = h.connect("bob", AckBehavior::AckAll).await;

    let ack = h
        .pipeline
        .send(&TestHarness::payload(("alice", "dev-a"), ("bob", "dev-b"), "hello"))
        .await
        .unwrap();
    assert_eq!(ack.code, 200);
    assert_eq!(ack.status, AckStatus::Delivered);

    settle().await;
    let messages = bob.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0.payload, "hello");
    assert!(!messages[0].1, "live delivery must not be tagged as queued");
}

#[tokio::test]
async fn self_message_is_rejected() {
    let h = TestHarness::new().await.unwrap();

    let ack = h
        .pipeline
        .send(&TestHarness::payload(("alice", "dev-a"), ("alice", "dev-a"), "note"))
        .await
        .unwrap();
    assert_eq!(ack.code, 400);
    assert_eq!(ack.status, AckStatus::SelfMessage);
    assert_eq!(h.queue.count_for_user("alice").await, 0);
}

#[tokio::test]
async fn offline_sends_queue_in_order_and_survive_cache_flush() {
    let h = TestHarness::new().await.unwrap();

    for n in 1..=5 {
        let ack = h
            .pipeline
            .send(&TestHarness::payload(
                ("alice", "dev-a"),
                ("bob", "dev-b"),
                &format!("m{n}"),
            ))
            .await
            .unwrap();
        assert_eq!(ack.code, 202);
        assert_eq!(ack.status, AckStatus::Queued);
    }

    let drained = h.queue.drain("bob").await.unwrap();
    let payloads: Vec<_> = drained.iter().map(|m| m.payload.as_str()).collect();
    assert_eq!(payloads, vec!["m1", "m2", "m3", "m4", "m5"]);

    // A cache-tier flush must not lose anything: the durable store rebuilds.
    h.cache.flush_all();
    let recovered = h.queue.drain("bob").await.unwrap();
    let payloads: Vec<_> = recovered.iter().map(|m| m.payload.as_str()).collect();
    assert_eq!(payloads, vec!["m1", "m2", "m3", "m4", "m5"]);
}

#[tokio::test]
async fn locked_conversation_rejects_other_senders_and_allows_owner() {
    let h = TestHarness::new().await.unwrap();

    // alice's send to offline bob locks the conversation for alice.
    let ack = h
        .pipeline
        .send(&TestHarness::payload(("alice", "dev-a"), ("bob", "dev-b"), "m1"))
        .await
        .unwrap();
    assert_eq!(ack.status, AckStatus::Queued);

    // bob (not the owner) sending into the same conversation is gated.
    let ack = h
        .pipeline
        .send(&TestHarness::payload(("bob", "dev-b"), ("alice", "dev-a"), "reply"))
        .await
        .unwrap();
    assert_eq!(ack.code, 423);
    assert_eq!(ack.status, AckStatus::SessionLocked);
    assert_eq!(ack.locked_by.as_deref(), Some("alice"));
    assert_eq!(ack.queued_count, Some(1));

    // The owner keeps queueing under their own lock without error.
    let ack = h
        .pipeline
        .send(&TestHarness::payload(("alice", "dev-a"), ("bob", "dev-b"), "m2"))
        .await
        .unwrap();
    assert_eq!(ack.status, AckStatus::Queued);
    assert_eq!(h.queue.count_for_user("bob").await, 2);
}

#[tokio::test]
async fn reconnect_replays_backlog_and_releases_the_lock() {
    let h = TestHarness::new().await.unwrap();

    for n in 1..=3 {
        h.pipeline
            .send(&TestHarness::payload(
                ("alice", "dev-a"),
                ("bob", "dev-b"),
                &format!("m{n}"),
            ))
            .await
            .unwrap();
    }
    let conversation = h.directory.resolve("alice", "bob").await.unwrap();
    assert!(h.locks.status(&conversation.id).await.is_some());

    let bob = h.connect("bob", AckBehavior::AckAll).await;
    settle().await;

    let messages = bob.messages().await;
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|(_, is_queued)| *is_queued));
    let payloads: Vec<_> = messages.iter().map(|(m, _)| m.payload.as_str()).collect();
    assert_eq!(payloads, vec!["m1", "m2", "m3"]);

    assert!(h.locks.status(&conversation.id).await.is_none());
    assert_eq!(h.queue.count_for_user("bob").await, 0);

    // With the lock gone, bob can send back.
    h.disconnect("bob", &bob).await;
    let ack = h
        .pipeline
        .send(&TestHarness::payload(("bob", "dev-b"), ("alice", "dev-a"), "reply"))
        .await
        .unwrap();
    assert_eq!(ack.status, AckStatus::Queued);
}

#[tokio::test]
async fn partial_replay_keeps_lock_and_undelivered_rows_without_duplication() {
    let h = TestHarness::new().await.unwrap();

    for n in 1..=3 {
        h.pipeline
            .send(&TestHarness::payload(
                ("alice", "dev-a"),
                ("bob", "dev-b"),
                &format!("m{n}"),
            ))
            .await
            .unwrap();
    }
    let conversation = h.directory.resolve("alice", "bob").await.unwrap();

    // bob's transport acks message 1 then goes dead.
    let bob = h.connect("bob", AckBehavior::FailAfter(1)).await;
    settle().await;
    assert_eq!(bob.messages().await.len(), 2, "m1 acked, m2 attempted");

    // Lock held, exactly m2 and m3 still queued.
    assert!(h.locks.status(&conversation.id).await.is_some());
    let remaining = h.queue.drain("bob").await.unwrap();
    let payloads: Vec<_> = remaining.iter().map(|m| m.payload.as_str()).collect();
    assert_eq!(payloads, vec!["m2", "m3"]);

    // Next reconnect delivers only the remainder: m1 is never duplicated.
    h.disconnect("bob", &bob).await;
    let bob = h.connect("bob", AckBehavior::AckAll).await;
    settle().await;
    let payloads: Vec<_> = bob
        .messages()
        .await
        .iter()
        .map(|(m, _)| m.payload.clone())
        .collect();
    assert_eq!(payloads, vec!["m2", "m3"]);
    assert!(h.locks.status(&conversation.id).await.is_none());
    assert_eq!(h.queue.count_for_user("bob").await, 0);
}

#[tokio::test]
async fn dead_transport_mid_replay_short_circuits() {
    let h = TestHarness::new().await.unwrap();

    for n in 1..=4 {
        h.pipeline
            .send(&TestHarness::payload(
                ("alice", "dev-a"),
                ("bob", "dev-b"),
                &format!("m{n}"),
            ))
            .await
            .unwrap();
    }

    // The connection dies before replay starts: every emit fails fast.
    let conn = shroud_test_utils::TestConnection::spawn(AckBehavior::AckAll);
    conn.kill();
    settle().await;
    assert!(h.pipeline.handle_connect("bob", conn.handle()).await);

    // Nothing was delivered, everything remains queued.
    assert_eq!(h.queue.count_for_user("bob").await, 4);
    let conversation = h.directory.resolve("alice", "bob").await.unwrap();
    assert!(h.locks.status(&conversation.id).await.is_some());
}

#[tokio::test]
async fn device_mismatch_rejects_live_send_and_never_queues() {
    let h = TestHarness::new().await.unwrap();
    h.bind_device("bob", "dev-b-current").await.unwrap();
    let _bob = h.connect("bob", AckBehavior::AckAll).await;

    let before = h.queue.count_for_user("bob").await;
    let ack = h
        .pipeline
        .send(&TestHarness::payload(("alice", "dev-a"), ("bob", "dev-b-stale"), "m"))
        .await
        .unwrap();
    assert_eq!(ack.code, 409);
    assert_eq!(ack.status, AckStatus::DeviceIdMismatch);
    assert!(ack.reason.contains("dev-b-current"));
    assert_eq!(h.queue.count_for_user("bob").await, before);
}

#[tokio::test]
async fn matching_device_passes_the_check() {
    let h = TestHarness::new().await.unwrap();
    h.bind_device("bob", "dev-b").await.unwrap();
    let _bob = h.connect("bob", AckBehavior::AckAll).await;

    let ack = h
        .pipeline
        .send(&TestHarness::payload(("alice", "dev-a"), ("bob", "dev-b"), "m"))
        .await
        .unwrap();
    assert_eq!(ack.status, AckStatus::Delivered);
}

#[tokio::test]
async fn unacknowledged_live_delivery_falls_back_to_queue() {
    let h = TestHarness::new().await.unwrap();
    // bob is connected but never acks.
    let bob = h.connect("bob", AckBehavior::AckNone).await;

    let ack = h
        .pipeline
        .send(&TestHarness::payload(("alice", "dev-a"), ("bob", "dev-b"), "m"))
        .await
        .unwrap();
    assert_eq!(ack.code, 202);
    assert_eq!(ack.status, AckStatus::Queued);
    assert_eq!(h.queue.count_for_user("bob").await, 1);

    settle().await;
    // The emit did reach the transport; only the ack was withheld.
    assert_eq!(bob.messages().await.len(), 1);
}

#[tokio::test]
async fn presence_reaches_only_online_partners_with_last_seen_on_offline() {
    let h = TestHarness::new().await.unwrap();

    // alice has history with bob, carol, and dave; only bob and carol are
    // online when she disconnects.
    for partner in ["bob", "carol", "dave"] {
        h.directory.resolve("alice", partner).await.unwrap();
        h.directory.touch("alice", partner).await;
    }

    let bob = h.connect("bob", AckBehavior::AckAll).await;
    let carol = h.connect("carol", AckBehavior::AckAll).await;

    let alice = h.connect("alice", AckBehavior::AckAll).await;
    settle().await;

    let online: Vec<_> = bob.presence_events().await;
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].user_id, "alice");
    assert!(online[0].status);
    assert!(online[0].last_seen.is_none());

    h.disconnect("alice", &alice).await;
    settle().await;

    for conn in [&bob, &carol] {
        let events = conn.presence_events().await;
        let offline = events.last().unwrap();
        assert_eq!(offline.user_id, "alice");
        assert!(!offline.status);
        assert!(offline.last_seen.is_some(), "offline carries last_seen");
    }
}

#[tokio::test]
async fn contested_acquire_never_transfers_lock_ownership() {
    let h = TestHarness::new().await.unwrap();

    // alice's send to offline bob locks the conversation for alice.
    let ack = h
        .pipeline
        .send(&TestHarness::payload(("alice", "dev-a"), ("bob", "dev-b"), "m1"))
        .await
        .unwrap();
    assert_eq!(ack.status, AckStatus::Queued);
    let conversation = h.directory.resolve("alice", "bob").await.unwrap();

    // A racing acquire by bob loses and reads back alice's lock.
    let held = h
        .locks
        .acquire(&conversation.id, "bob")
        .await
        .unwrap()
        .expect("bob's acquire must lose");
    assert_eq!(held.locked_by, "alice");
    assert_eq!(
        h.locks.status(&conversation.id).await.unwrap().locked_by,
        "alice"
    );

    // alice still owns the lock and keeps queueing under it.
    let ack = h
        .pipeline
        .send(&TestHarness::payload(("alice", "dev-a"), ("bob", "dev-b"), "m2"))
        .await
        .unwrap();
    assert_eq!(ack.status, AckStatus::Queued);

    // Re-acquiring one's own lock is a quiet success.
    assert!(
        h.locks
            .acquire(&conversation.id, "alice")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn presence_fan_out_caps_at_the_fifty_most_recent_partners() {
    use shroud_core::StorageAdapter;

    let h = TestHarness::new().await.unwrap();

    // 60 partners with strictly increasing recency: p11..p60 are the 50
    // most recent.
    for i in 1..=60u32 {
        h.storage
            .touch_conversation(
                "alice",
                &format!("p{i:02}"),
                &format!("2026-01-01T00:00:00.{i:03}Z"),
            )
            .await
            .unwrap();
    }

    let mut partners = Vec::new();
    for i in 1..=60u32 {
        partners.push((i, h.connect(&format!("p{i:02}"), AckBehavior::AckAll).await));
    }

    let _alice = h.connect("alice", AckBehavior::AckAll).await;
    settle().await;

    for (i, conn) in &partners {
        let events = conn.presence_events().await;
        if *i <= 10 {
            assert!(events.is_empty(), "p{i:02} is outside the recency cap");
        } else {
            assert_eq!(events.len(), 1, "p{i:02} should hear alice come online");
            assert_eq!(events[0].user_id, "alice");
            assert!(events[0].status);
        }
    }
}

#[tokio::test]
async fn duplicate_connection_is_rejected_and_first_survives() {
    let h = TestHarness::new().await.unwrap();

    let first = h.connect("alice", AckBehavior::AckAll).await;
    let (_second, accepted) = h.try_connect("alice", AckBehavior::AckAll).await;
    assert!(!accepted);
    assert_eq!(
        h.registry.lookup("alice").unwrap().id(),
        first.connection_id()
    );
}

#[tokio::test]
async fn activity_status_is_forwarded_online_only_and_never_queued() {
    use shroud_core::types::{ActivityStatus, ActivityStatusEvent};

    let h = TestHarness::new().await.unwrap();
    let bob = h.connect("bob", AckBehavior::AckAll).await;

    let typing = ActivityStatusEvent {
        user_id: "alice".to_string(),
        recipient_id: "bob".to_string(),
        status: ActivityStatus::Typing,
        timestamp: shroud_delivery::now_millis(),
    };
    h.pipeline.forward_activity(&typing).await;

    let to_offline = ActivityStatusEvent {
        recipient_id: "carol".to_string(),
        ..typing.clone()
    };
    h.pipeline.forward_activity(&to_offline).await;
    settle().await;

    let events = bob.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(h.queue.count_for_user("carol").await, 0);
}

#[tokio::test]
async fn retention_sweep_is_wired_through_the_stack() {
    let h = TestHarness::new().await.unwrap();

    h.pipeline
        .send(&TestHarness::payload(("alice", "dev-a"), ("bob", "dev-b"), "m"))
        .await
        .unwrap();

    // Nothing is old enough yet.
    assert_eq!(h.queue.cleanup_old_messages().await.unwrap(), 0);
    assert_eq!(h.queue.count_for_user("bob").await, 1);
}
