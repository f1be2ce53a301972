//! Fire-and-forget delivery between the simulator and the synthesis engine.

use std::collections::VecDeque;

use crate::message::EngineMessage;

/// Sending half of a transport. No acknowledgment and no back-pressure:
/// a message that cannot be delivered is dropped.
pub trait Transport {
    fn send(&mut self, msg: EngineMessage);
}

/// In-process outbox, drained by whoever owns it.
impl Transport for Vec<EngineMessage> {
    fn send(&mut self, msg: EngineMessage) {
        self.push(msg);
    }
}

#[cfg(feature = "native")]
impl Transport for tokio::sync::mpsc::UnboundedSender<EngineMessage> {
    fn send(&mut self, msg: EngineMessage) {
        if tokio::sync::mpsc::UnboundedSender::send(self, msg).is_err() {
            log::trace!("transport: receiver gone, message dropped");
        }
    }
}

/// Receiving queue on the synthesis side.
///
/// Discrete messages keep their arrival order. Continuous `STATE` snapshots
/// coalesce: only the newest one is kept, at the position it arrived.
#[derive(Debug, Default)]
pub struct Inbox {
    queue: VecDeque<EngineMessage>,
}

impl Inbox {
    pub fn new() -> Self {
        Inbox::default()
    }

    pub fn push(&mut self, msg: EngineMessage) {
        if matches!(msg, EngineMessage::State(_)) {
            self.queue.retain(|m| !matches!(m, EngineMessage::State(_)));
        }
        self.queue.push_back(msg);
    }

    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, EngineMessage> {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
