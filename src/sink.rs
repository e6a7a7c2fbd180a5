//! Terminal message consumers.

use crate::message::Message;
use std::sync::Mutex;

/// A terminal consumer of pipeline messages.
///
/// Implementations must tolerate delivery from multiple threads.
pub trait MessageSink: Send + Sync {
    fn deliver(&self, message: Message);
}

/// Sink that buffers everything it receives in memory.
///
/// Doubles as the assertion point in tests and as a real buffer sink for
/// callers that drain messages after a `process` call.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<Message>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        CollectingSink::default()
    }

    /// Snapshot of the messages received so far.
    pub fn received(&self) -> Vec<Message> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }
}

impl MessageSink for CollectingSink {
    fn deliver(&self, message: Message) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Document;

    #[test]
    fn test_collects_in_order() {
        let sink = CollectingSink::new();
        sink.deliver(Message::new(Document::from("<a/>")));
        sink.deliver(Message::new(Document::from("<b/>")));

        let received = sink.received();
        assert_eq!(sink.count(), 2);
        assert_eq!(received[0].body.as_str(), Some("<a/>"));
        assert_eq!(received[1].body.as_str(), Some("<b/>"));
    }
}
