//! Bridge collaborator: delivers messages to the body-tracking server

use std::collections::VecDeque;
use tracing::trace;

use crate::message::Message;

/// Transport towards the server
///
/// Implementations own their connection lifecycle. Sends must not block for
/// longer than a bounded amount of time.
pub trait Bridge {
    /// Queue a message for delivery (fire-and-forget)
    fn send_message(&mut self, message: Message);

    /// Pump the connection once per tick, returns true on the frame a
    /// connection was (re)established
    fn run_frame(&mut self) -> bool;

    /// Next inbound message, if any
    fn next_message(&mut self) -> Option<Message>;
}

impl<B: Bridge + ?Sized> Bridge for &mut B {
    fn send_message(&mut self, message: Message) {
        (**self).send_message(message)
    }

    fn run_frame(&mut self) -> bool {
        (**self).run_frame()
    }

    fn next_message(&mut self) -> Option<Message> {
        (**self).next_message()
    }
}

impl<B: Bridge + ?Sized> Bridge for Box<B> {
    fn send_message(&mut self, message: Message) {
        (**self).send_message(message)
    }

    fn run_frame(&mut self) -> bool {
        (**self).run_frame()
    }

    fn next_message(&mut self) -> Option<Message> {
        (**self).next_message()
    }
}

/// In-memory bridge that records everything sent through it
#[derive(Debug, Default)]
pub struct MemoryBridge {
    sent: Vec<Message>,
    inbound: VecDeque<Message>,
    pending_reconnect: bool,
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge whose first frame reports a fresh connection
    pub fn connected() -> Self {
        Self {
            pending_reconnect: true,
            ..Self::default()
        }
    }

    /// Make the next `run_frame` report a reconnect
    pub fn simulate_reconnect(&mut self) {
        self.pending_reconnect = true;
    }

    /// Queue a message as if the server had sent it
    pub fn push_inbound(&mut self, message: Message) {
        self.inbound.push_back(message);
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    pub fn sent(&self) -> &[Message] {
        &self.sent
    }

    /// Take all messages sent since the last call
    pub fn drain_sent(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.sent)
    }
}

impl Bridge for MemoryBridge {
    fn send_message(&mut self, message: Message) {
        trace!(kind = message.kind(), "Recorded message");
        self.sent.push(message);
    }

    fn run_frame(&mut self) -> bool {
        std::mem::take(&mut self.pending_reconnect)
    }

    fn next_message(&mut self) -> Option<Message> {
        self.inbound.pop_front()
    }
}
