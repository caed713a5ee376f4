//! Notification bus: user-facing messages fired on a shared [`EventEmitter`].

mod emitter;
mod toast;

pub use emitter::{Event, EventEmitter, HandlerId};
pub use toast::{Toast, ToastPhase, TOAST_CLOSING, TOAST_LIFETIME};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Event type under which notifications are fired.
pub const NOTIFICATION_EVENT: &str = "notification";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Warning,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Message {
    pub fn new(title: impl Into<String>) -> Self {
        Message {
            title: title.into(),
            message: None,
        }
    }

    pub fn with_body(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Title for a raw text payload: a JSON body's `message`, else its `error`, else the text itself.
    pub fn from_text(text: &str) -> Self {
        let title = serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|v| {
                ["message", "error"]
                    .iter()
                    .find_map(|k| v.get(k).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_else(|| text.to_string());
        Message::new(title)
    }
}

/// Either a ready message or raw text to be interpreted by [`Message::from_text`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageInput {
    Structured(Message),
    Text(String),
}

impl From<Message> for MessageInput {
    fn from(m: Message) -> Self {
        MessageInput::Structured(m)
    }
}

impl From<String> for MessageInput {
    fn from(s: String) -> Self {
        MessageInput::Text(s)
    }
}

impl From<&str> for MessageInput {
    fn from(s: &str) -> Self {
        MessageInput::Text(s.to_string())
    }
}

pub type OnClick = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct Notification {
    pub kind: NotificationType,
    pub message: Message,
    pub onclick: Option<OnClick>,
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("onclick", &self.onclick.is_some())
            .finish()
    }
}

/// Sends notifications. Clones share subscribers.
#[derive(Clone, Default)]
pub struct Notifier {
    emitter: EventEmitter<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, kind: NotificationType, message: impl Into<MessageInput>) {
        self.send_with_click(kind, message, None);
    }

    pub fn send_with_click(&self, kind: NotificationType, message: impl Into<MessageInput>, onclick: Option<OnClick>) {
        let message = match message.into() {
            MessageInput::Structured(m) => m,
            MessageInput::Text(t) => Message::from_text(&t),
        };
        self.emitter.fire(
            NOTIFICATION_EVENT,
            Some(Notification {
                kind,
                message,
                onclick,
            }),
        );
    }

    pub fn subscribe<F>(&self, handler: F) -> Option<HandlerId>
    where
        F: Fn(&Event<Notification>) + Send + Sync + 'static,
    {
        self.emitter.on(NOTIFICATION_EVENT, handler)
    }

    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        self.emitter.off(NOTIFICATION_EVENT, id)
    }

    pub fn emitter(&self) -> &EventEmitter<Notification> {
        &self.emitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collect(notifier: &Notifier) -> Arc<Mutex<Vec<Notification>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        notifier.subscribe(move |e: &Event<Notification>| {
            if let Some(n) = &e.data {
                s.lock().unwrap().push(n.clone());
            }
        });
        seen
    }

    #[test]
    fn json_text_uses_message_then_error() {
        assert_eq!(Message::from_text(r#"{"message":"m","error":"e"}"#).title, "m");
        assert_eq!(Message::from_text(r#"{"type":"Error","error":"boom"}"#).title, "boom");
        assert_eq!(Message::from_text("plain failure").title, "plain failure");
        assert_eq!(Message::from_text(r#"{"other":1}"#).title, r#"{"other":1}"#);
    }

    #[test]
    fn structured_messages_pass_through() {
        let notifier = Notifier::new();
        let seen = collect(&notifier);
        notifier.send(NotificationType::Success, Message::new("Saved").with_body("2 records"));
        notifier.send(NotificationType::Warning, r#"{"error":"Record with id 7 not found."}"#);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].message.message.as_deref(), Some("2 records"));
        assert_eq!(seen[1].kind, NotificationType::Warning);
        assert_eq!(seen[1].message.title, "Record with id 7 not found.");
    }

    #[test]
    fn clones_share_subscribers() {
        let notifier = Notifier::new();
        let seen = collect(&notifier);
        notifier.clone().send(NotificationType::Info, "hello");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
