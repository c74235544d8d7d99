//! Human-readable announcement port.

use crate::ports::command::{Command, CommandSink};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Notifier trait.
///
/// Carries tool status and progress announcements to whoever is watching
/// the agent.
pub trait Notifier: Send + Sync {
    /// Delivers one message.
    fn notify(&self, message: &str);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, message: &str) {
        (**self).notify(message)
    }
}

/// Notifier that posts each announcement as a chat line.
///
/// Built over the connection's command link, so announcements made while
/// disconnected are dropped along with any other command.
#[derive(Clone)]
pub struct ChatNotifier {
    sink: Arc<dyn CommandSink>,
}

impl ChatNotifier {
    pub fn new(sink: Arc<dyn CommandSink>) -> Self {
        Self { sink }
    }
}

impl std::fmt::Debug for ChatNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatNotifier")
            .field("sink", &"Arc<dyn CommandSink>")
            .finish()
    }
}

impl Notifier for ChatNotifier {
    fn notify(&self, message: &str) {
        debug!(message, "posting announcement");
        self.sink.send(Command::Chat {
            message: message.to_string(),
        });
    }
}

/// Mock notifier that records every message.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message delivered so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::command_mock::MockCommandSink;

    #[test]
    fn test_should_post_announcement_as_chat() {
        let sink = MockCommandSink::new();
        let notifier = ChatNotifier::new(Arc::new(sink.clone()));
        notifier.notify("tool exhausted, halted");

        assert_eq!(
            sink.get_history(),
            vec![Command::Chat {
                message: "tool exhausted, halted".to_string()
            }]
        );
    }
}
