use crate::types::{ConnectionResponseCode, DisconnectReason, LogLevel, Message, MessageId, QoS};
use crossbeam::channel::Sender;
use std::fmt;
use std::sync::Arc;

pub type ConnectHandler = Arc<dyn Fn(ConnectionResponseCode) + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;
pub type DisconnectHandler = Arc<dyn Fn(DisconnectReason) + Send + Sync>;
pub type PublishHandler = Arc<dyn Fn(MessageId) + Send + Sync>;
pub type SubscribeHandler = Arc<dyn Fn(MessageId, &[QoS]) + Send + Sync>;
pub type UnsubscribeHandler = Arc<dyn Fn(MessageId) + Send + Sync>;
pub type LogHandler = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Marshaled notification delivered by one trampoline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect(ConnectionResponseCode),
    Message(Message),
    Disconnect(DisconnectReason),
    Publish(MessageId),
    Subscribe { mid: MessageId, granted: Vec<QoS> },
    Unsubscribe(MessageId),
    Log { level: LogLevel, message: String },
}

/// One optional handler slot per event kind.
///
/// An empty slot means events of that kind are dropped.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub on_connect: Option<ConnectHandler>,
    pub on_message: Option<MessageHandler>,
    pub on_disconnect: Option<DisconnectHandler>,
    pub on_publish: Option<PublishHandler>,
    pub on_subscribe: Option<SubscribeHandler>,
    pub on_unsubscribe: Option<UnsubscribeHandler>,
    pub on_log: Option<LogHandler>,
}

impl EventHandlers {
    /// Handlers for every event kind that forward an owned [`Event`] into
    /// `sender`. Events are discarded once the receiving side is gone.
    pub fn forwarding(sender: Sender<Event>) -> Self {
        let connect = sender.clone();
        let message = sender.clone();
        let disconnect = sender.clone();
        let publish = sender.clone();
        let subscribe = sender.clone();
        let unsubscribe = sender.clone();
        let log = sender;
        Self {
            on_connect: Some(Arc::new(move |code| {
                let _ = connect.send(Event::Connect(code));
            })),
            on_message: Some(Arc::new(move |msg: &Message| {
                let _ = message.send(Event::Message(msg.clone()));
            })),
            on_disconnect: Some(Arc::new(move |reason| {
                let _ = disconnect.send(Event::Disconnect(reason));
            })),
            on_publish: Some(Arc::new(move |mid| {
                let _ = publish.send(Event::Publish(mid));
            })),
            on_subscribe: Some(Arc::new(move |mid, granted: &[QoS]| {
                let _ = subscribe.send(Event::Subscribe {
                    mid,
                    granted: granted.to_vec(),
                });
            })),
            on_unsubscribe: Some(Arc::new(move |mid| {
                let _ = unsubscribe.send(Event::Unsubscribe(mid));
            })),
            on_log: Some(Arc::new(move |level, line: &str| {
                let _ = log.send(Event::Log {
                    level,
                    message: line.to_owned(),
                });
            })),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.on_connect.is_none()
            && self.on_message.is_none()
            && self.on_disconnect.is_none()
            && self.on_publish.is_none()
            && self.on_subscribe.is_none()
            && self.on_unsubscribe.is_none()
            && self.on_log.is_none()
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_publish", &self.on_publish.is_some())
            .field("on_subscribe", &self.on_subscribe.is_some())
            .field("on_unsubscribe", &self.on_unsubscribe.is_some())
            .field("on_log", &self.on_log.is_some())
            .finish()
    }
}
