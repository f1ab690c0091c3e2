//! Bridge that logs messages instead of sending them

use posebridge_core::{Bridge, MemoryBridge, Message};
use tracing::{info, warn};

/// Wraps a [`MemoryBridge`] that reports one connection on the first frame
pub struct DryRunBridge {
    inner: MemoryBridge,
}

impl DryRunBridge {
    pub fn new() -> Self {
        Self {
            inner: MemoryBridge::connected(),
        }
    }

    fn log(message: &Message) {
        match serde_json::to_string(message) {
            Ok(json) => info!(kind = message.kind(), message = %json, "Dry run"),
            Err(e) => warn!(kind = message.kind(), error = %e, "Failed to serialize message"),
        }
    }
}

impl Bridge for DryRunBridge {
    fn send_message(&mut self, message: Message) {
        self.inner.send_message(message);
        for message in self.inner.drain_sent() {
            Self::log(&message);
        }
    }

    fn run_frame(&mut self) -> bool {
        self.inner.run_frame()
    }

    fn next_message(&mut self) -> Option<Message> {
        self.inner.next_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_reports_connection() {
        let mut bridge = DryRunBridge::new();
        assert!(bridge.run_frame());
        assert!(!bridge.run_frame());
    }

    #[test]
    fn test_messages_are_not_retained() {
        let mut bridge = DryRunBridge::new();
        bridge.send_message(Message::UserAction { name: "calibrate".to_string() });
        bridge.send_message(Message::UserAction { name: "Confirm".to_string() });
        assert!(bridge.inner.sent().is_empty());
    }
}
