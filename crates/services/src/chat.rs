//! # Chat service
//!
//! Coordinates the flow between the presentation layer and the ports.
//! Error policy:
//!
//! - configuration failures become an actionable [`UserNotice::Configuration`];
//! - transient failures are logged and treated as delivered, since the
//!   backend reconnects on its own;
//! - read-marking and suggestion failures are never shown.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    Backend, ChannelError, DeliveryChannel, Message, Recipient, ReplySuggester, SnapshotListener,
    Subscription, User,
};

use crate::attachments::Attachment;
use crate::conversation;
use crate::notice::UserNotice;

/// State shared by the whole session.
pub struct ChatService {
    channel: Arc<dyn DeliveryChannel>,
    suggester: Arc<dyn ReplySuggester>,
}

impl ChatService {
    pub fn new(channel: Arc<dyn DeliveryChannel>, suggester: Arc<dyn ReplySuggester>) -> Self {
        tracing::info!(backend = %channel.backend(), "chat service ready");
        Self { channel, suggester }
    }

    pub fn backend(&self) -> Backend {
        self.channel.backend()
    }

    pub async fn send(&self, message: Message) -> Result<(), UserNotice> {
        let id = message.id.clone();
        match self.channel.submit(message).await {
            Ok(()) => {
                tracing::debug!(%id, "message sent");
                Ok(())
            }
            Err(ChannelError::Transient(reason)) => {
                tracing::warn!(%id, %reason, "send hit a connectivity problem; relying on backend reconnect");
                Ok(())
            }
            Err(e) => {
                tracing::error!(%id, error = %e, "send failed");
                Err(e.into())
            }
        }
    }

    pub async fn send_text(&self, me: &User, partner: &User, text: &str) -> Result<(), UserNotice> {
        self.send(Message::text(me, Recipient::user(&partner.id), text.trim())).await
    }

    pub async fn send_file(&self, me: &User, partner: &User, file: Attachment) -> Result<(), UserNotice> {
        self.send(Message::file(me, Recipient::user(&partner.id), file.file_name, file.data_uri))
            .await
    }

    pub async fn send_audio(&self, me: &User, partner: &User, clip: Attachment) -> Result<(), UserNotice> {
        self.send(Message::audio(me, Recipient::user(&partner.id), clip.data_uri)).await
    }

    pub async fn subscribe(&self, listener: SnapshotListener) -> Result<Subscription, UserNotice> {
        self.channel.subscribe(listener).await.map_err(|e| {
            tracing::error!(error = %e, "subscription failed");
            UserNotice::from(e)
        })
    }

    /// Marks what `partner` sent to `me` as read. Returns how many ids were
    /// submitted; failures are logged only.
    pub async fn open_thread(&self, snapshot: &[Message], me: &User, partner: &User) -> usize {
        let unread = conversation::unread_in_thread(snapshot, &me.id, &partner.id);
        if unread.is_empty() {
            return 0;
        }
        if let Err(e) = self.channel.mark_as_read(&unread).await {
            tracing::error!(error = %e, count = unread.len(), "could not update read state");
        }
        unread.len()
    }

    /// Quick replies for the thread's last message, when it is a text
    /// `partner` sent to `me`. Empty otherwise.
    pub async fn suggest_replies(&self, snapshot: &[Message], me: &User, partner: &User) -> Vec<String> {
        match conversation::last_inbound_text(snapshot, &me.id, &partner.id) {
            Some(last) => {
                self.suggester
                    .generate_replies(&last.content, &last.sender_name, &me.name)
                    .await
            }
            None => Vec::new(),
        }
    }

    /// The user postponed a notification: tell the sender we are busy.
    pub async fn dismiss_notification(&self, me: &User, incoming: &Message) -> Result<(), UserNotice> {
        tracing::info!(to = %incoming.sender_id, "sending busy signal");
        self.send(Message::busy_signal(me, Recipient::user(&incoming.sender_id))).await
    }

    /// Unread notification worth showing right now, if any.
    pub fn pending_notification<'a>(&self, snapshot: &'a [Message], me: &User) -> Option<&'a Message> {
        conversation::notification_candidate(snapshot, &me.id, Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{find_user, MessageKind, MockDeliveryChannel, MockReplySuggester};
    use mockall::predicate::always;
    use tokio_test::{assert_err, assert_ok};

    fn franco() -> &'static User {
        find_user("1").unwrap()
    }

    fn giovanni() -> &'static User {
        find_user("2").unwrap()
    }

    fn service(channel: MockDeliveryChannel, suggester: MockReplySuggester) -> ChatService {
        let mut channel = channel;
        channel.expect_backend().return_const(Backend::Memory);
        ChatService::new(Arc::new(channel), Arc::new(suggester))
    }

    #[tokio::test]
    async fn transient_send_failures_are_swallowed() {
        let mut channel = MockDeliveryChannel::new();
        channel
            .expect_submit()
            .times(1)
            .returning(|_| Err(ChannelError::Transient("offline".into())));
        let chat = service(channel, MockReplySuggester::new());

        assert_ok!(chat.send_text(franco(), giovanni(), "ciao").await);
    }

    #[tokio::test]
    async fn permission_failures_become_configuration_notices() {
        let mut channel = MockDeliveryChannel::new();
        channel
            .expect_submit()
            .returning(|_| Err(ChannelError::Configuration("PERMISSION_DENIED".into())));
        let chat = service(channel, MockReplySuggester::new());

        let notice = chat.send_text(franco(), giovanni(), "ciao").await.unwrap_err();
        assert_eq!(notice, UserNotice::Configuration("PERMISSION_DENIED".into()));
        assert!(notice.to_string().contains("access rules"));
    }

    #[tokio::test]
    async fn opening_a_thread_marks_only_inbound_unread() {
        let mut inbound = Message::text(franco(), Recipient::user("2"), "ciao");
        inbound.timestamp = 1;
        let mut outbound = Message::text(giovanni(), Recipient::user("1"), "ciao!");
        outbound.timestamp = 2;
        let snapshot = vec![inbound.clone(), outbound];

        let expected = inbound.id.clone();
        let mut channel = MockDeliveryChannel::new();
        channel
            .expect_mark_as_read()
            .withf(move |ids| ids.len() == 1 && ids[0] == expected)
            .times(1)
            .returning(|_| Err(ChannelError::Transient("flaky".into())));
        let chat = service(channel, MockReplySuggester::new());

        assert_eq!(chat.open_thread(&snapshot, giovanni(), franco()).await, 1);
        // The sender's side has nothing to mark.
        assert_eq!(chat.open_thread(&snapshot, franco(), giovanni()).await, 0);
    }

    #[tokio::test]
    async fn suggestions_requested_for_inbound_text_only() {
        let incoming = Message::text(franco(), Recipient::user("2"), "Puoi venire in ufficio oggi?");
        let mut suggester = MockReplySuggester::new();
        suggester
            .expect_generate_replies()
            .withf(|text, sender, recipient| {
                text.starts_with("Puoi venire") && sender.starts_with("Franco") && recipient.starts_with("Giovanni")
            })
            .times(1)
            .returning(|_, _, _| vec!["Arrivo subito.".to_string()]);
        let chat = service(MockDeliveryChannel::new(), suggester);

        let snapshot = vec![incoming];
        assert_eq!(
            chat.suggest_replies(&snapshot, giovanni(), franco()).await,
            ["Arrivo subito."]
        );
        // Franco wrote the last message, so nothing to suggest for him.
        assert!(chat.suggest_replies(&snapshot, franco(), giovanni()).await.is_empty());
    }

    #[tokio::test]
    async fn dismissing_sends_busy_signal_to_sender() {
        let incoming = Message::text(franco(), Recipient::user("2"), "Ci sei?");
        let mut channel = MockDeliveryChannel::new();
        channel
            .expect_submit()
            .withf(|m| {
                m.kind == MessageKind::BusySignal
                    && m.is_to("1")
                    && m.is_from("2")
                    && m.content == domains::BUSY_SIGNAL_CONTENT
                    && !m.read
            })
            .times(1)
            .returning(|_| Ok(()));
        let chat = service(channel, MockReplySuggester::new());

        assert_ok!(chat.dismiss_notification(giovanni(), &incoming).await);
    }

    #[tokio::test]
    async fn subscription_errors_surface_as_notices() {
        let mut channel = MockDeliveryChannel::new();
        channel
            .expect_subscribe()
            .with(always())
            .returning(|_| Err(ChannelError::Storage("disk full".into())));
        let chat = service(channel, MockReplySuggester::new());

        let err = assert_err!(chat.subscribe(Arc::new(|_| {})).await);
        assert!(matches!(err, UserNotice::NotSent(_)));
    }

    #[tokio::test]
    async fn subscription_is_handed_back_to_the_caller() {
        let mut channel = MockDeliveryChannel::new();
        channel
            .expect_subscribe()
            .times(1)
            .returning(|_| Ok(Subscription::noop()));
        let chat = service(channel, MockReplySuggester::new());

        let subscription = assert_ok!(chat.subscribe(Arc::new(|_| {})).await);
        subscription.unsubscribe();
    }

    #[test]
    fn fresh_inbound_message_is_pending_notification() {
        let chat = service(MockDeliveryChannel::new(), MockReplySuggester::new());
        let snapshot = vec![Message::text(franco(), Recipient::user("2"), "Urgente")];
        let pending = chat.pending_notification(&snapshot, giovanni());
        assert_eq!(pending.map(|m| m.content.as_str()), Some("Urgente"));
    }
}
