//! The Firestore channel against an in-process stand-in server.

use std::sync::Arc;
use std::time::Duration;

use domains::{ChannelError, DeliveryChannel, Message, MessageId, Recipient};
use integration_tests::firestore_stub::FirestoreStub;
use integration_tests::{franco, giovanni, Recorder, WAIT};
use services::{ChatService, UserNotice};
use storage_adapters::firestore::SNAPSHOT_LIMIT;
use storage_adapters::FirestoreChannel;
use suggest_adapters::DisabledSuggester;
use tokio_test::assert_ok;

fn text_at(content: &str, timestamp: i64) -> Message {
    let mut m = Message::text(franco(), Recipient::user(&giovanni().id), content);
    m.timestamp = timestamp;
    m
}

fn channel(stub: &FirestoreStub) -> FirestoreChannel {
    FirestoreChannel::new(stub.config()).unwrap()
}

fn polling_channel(stub: &FirestoreStub, every: Duration) -> FirestoreChannel {
    let mut config = stub.config();
    config.poll_interval = every;
    FirestoreChannel::new(config).unwrap()
}

async fn wait_for_queries(stub: &FirestoreStub, at_least: usize) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while stub.query_count() < at_least {
        assert!(tokio::time::Instant::now() < deadline, "stub saw too few queries");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn message_reaches_the_other_client_and_comes_back_read() {
    let stub = FirestoreStub::start().await;
    let franco_side = polling_channel(&stub, Duration::from_millis(50));
    let giovanni_side = polling_channel(&stub, Duration::from_millis(50));

    let (listener, mut giovanni_view) = Recorder::pair();
    let _giovanni_sub = giovanni_side.subscribe(listener).await.unwrap();
    assert!(giovanni_view.until(|_| true).await.is_empty());

    let msg = Message::text(franco(), Recipient::user(&giovanni().id), "Ciao Giovanni");
    franco_side.submit(msg.clone()).await.unwrap();

    let snapshot = giovanni_view.until(|s| s.len() == 1).await;
    assert_eq!(snapshot[0].id, msg.id);
    assert!(!snapshot[0].read);

    giovanni_side.mark_as_read(&[msg.id.clone()]).await.unwrap();
    assert_eq!(stub.is_read(&msg.id), Some(true));

    let (listener, mut franco_view) = Recorder::pair();
    let _franco_sub = franco_side.subscribe(listener).await.unwrap();
    assert!(franco_view.until(|s| s.len() == 1).await[0].read);
}

#[tokio::test]
async fn local_write_refreshes_without_waiting_for_the_poll() {
    let stub = FirestoreStub::start().await;
    let channel = channel(&stub);

    let (listener, mut view) = Recorder::pair();
    let _sub = channel.subscribe(listener).await.unwrap();
    assert!(view.until(|_| true).await.is_empty());

    channel.submit(text_at("subito", 1_000)).await.unwrap();
    assert_eq!(view.until(|s| s.len() == 1).await[0].content, "subito");
}

#[tokio::test]
async fn write_during_a_slow_fetch_still_refreshes() {
    let stub = FirestoreStub::start().await;
    stub.delay_queries(Duration::from_millis(300));
    let channel = channel(&stub);

    let (listener, mut view) = Recorder::pair();
    let _sub = channel.subscribe(listener).await.unwrap();

    // The first query has already read the (empty) collection.
    wait_for_queries(&stub, 1).await;
    channel.submit(text_at("durante", 1_000)).await.unwrap();

    assert!(view.until(|_| true).await.is_empty());
    assert_eq!(view.until(|s| s.len() == 1).await[0].content, "durante");
}

#[tokio::test]
async fn unchanged_results_are_not_redelivered() {
    let stub = FirestoreStub::start().await;
    let channel = polling_channel(&stub, Duration::from_millis(20));
    channel.submit(text_at("fermo", 1_000)).await.unwrap();

    let (listener, mut view) = Recorder::pair();
    let _sub = channel.subscribe(listener).await.unwrap();
    view.until(|s| s.len() == 1).await;

    let seen = stub.query_count();
    wait_for_queries(&stub, seen + 5).await;
    assert!(view.next_within(Duration::from_millis(50)).await.is_none());
}

#[tokio::test]
async fn only_the_most_recent_messages_are_visible() {
    let stub = FirestoreStub::start().await;
    let channel = channel(&stub);
    let total = SNAPSHOT_LIMIT as i64 + 120;
    for at in 0..total {
        channel.submit(text_at(&format!("n{at}"), at)).await.unwrap();
    }
    assert_eq!(stub.document_count(), total as usize);

    let (listener, mut view) = Recorder::pair();
    let _sub = channel.subscribe(listener).await.unwrap();
    let snapshot = view.until(|s| !s.is_empty()).await;

    assert_eq!(snapshot.len(), SNAPSHOT_LIMIT);
    assert_eq!(snapshot.first().map(|m| m.timestamp), Some(120));
    assert_eq!(snapshot.last().map(|m| m.timestamp), Some(total - 1));
    assert!(snapshot.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn existing_document_id_is_a_duplicate() {
    let stub = FirestoreStub::start().await;
    let channel = channel(&stub);
    let msg = text_at("una volta", 1_000);
    channel.submit(msg.clone()).await.unwrap();

    let mut again = text_at("due volte", 2_000);
    again.id = msg.id.clone();
    assert_eq!(channel.submit(again).await, Err(ChannelError::DuplicateId(msg.id)));
    assert_eq!(stub.document_count(), 1);
}

#[tokio::test]
async fn permission_denied_reaches_the_user() {
    let stub = FirestoreStub::start().await;
    stub.deny_all();
    let chat = ChatService::new(Arc::new(channel(&stub)), Arc::new(DisabledSuggester));

    let notice = chat.send_text(franco(), giovanni(), "Ciao").await.unwrap_err();
    assert!(matches!(notice, UserNotice::Configuration(_)), "got {notice:?}");
    assert_eq!(stub.document_count(), 0);
}

#[tokio::test]
async fn read_marks_are_independent_per_message() {
    let stub = FirestoreStub::start().await;
    let channel = channel(&stub);
    let denied = text_at("protetto", 1_000);
    let allowed = text_at("libero", 2_000);
    channel.submit(denied.clone()).await.unwrap();
    channel.submit(allowed.clone()).await.unwrap();
    stub.deny_updates_to(&denied.id);

    let ids = [MessageId::new("missing"), denied.id.clone(), allowed.id.clone()];
    let err = channel.mark_as_read(&ids).await.unwrap_err();

    assert!(err.is_configuration(), "got {err:?}");
    assert_eq!(stub.is_read(&denied.id), Some(false));
    assert_eq!(stub.is_read(&allowed.id), Some(true));
}

#[tokio::test]
async fn missing_documents_are_ignored_when_marking() {
    let stub = FirestoreStub::start().await;
    let channel = channel(&stub);
    assert_ok!(channel.mark_as_read(&[MessageId::new("missing")]).await);
}

#[tokio::test]
async fn wrong_database_is_a_configuration_error_when_marking() {
    let stub = FirestoreStub::start().await;
    let mut config = stub.config();
    config.database = "chat".to_string();
    let channel = FirestoreChannel::new(config).unwrap();

    let err = channel.mark_as_read(&[MessageId::new("abc")]).await.unwrap_err();
    assert!(err.is_configuration(), "got {err:?}");
}
