use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

/// Create a host inbox and the port that posts into it.
pub fn channel() -> (MessagePort, MessageInbox) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        MessagePort { sender, open: None },
        MessageInbox { receiver },
    )
}

/// Sending side of the host's message bus.
///
/// Posting never blocks and never fails from the sender's point of view: if
/// the host stopped listening, or the port's lease was released, the message
/// is dropped silently.
#[derive(Debug, Clone)]
pub struct MessagePort {
    sender: UnboundedSender<Value>,
    open: Option<Arc<AtomicBool>>,
}

impl MessagePort {
    pub fn post(&self, message: Value) {
        if !self.is_open() {
            return;
        }
        let _ = self.sender.send(message);
    }

    pub fn is_open(&self) -> bool {
        let leased = self
            .open
            .as_ref()
            .is_none_or(|open| open.load(Ordering::Acquire));
        leased && !self.sender.is_closed()
    }

    /// Derive a port that stops delivering once the returned lease is dropped.
    ///
    /// Each preview realm posts through its own scoped port so that output
    /// from a discarded realm can never reach the host after replacement.
    pub fn scoped(&self) -> (MessagePort, PortLease) {
        let open = Arc::new(AtomicBool::new(true));
        let port = MessagePort {
            sender: self.sender.clone(),
            open: Some(Arc::clone(&open)),
        };
        (port, PortLease { open })
    }
}

/// Keeps a scoped [`MessagePort`] open while held.
#[derive(Debug)]
pub struct PortLease {
    open: Arc<AtomicBool>,
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.open.store(false, Ordering::Release);
    }
}

/// Receiving side of the host's message bus.
#[derive(Debug)]
pub struct MessageInbox {
    receiver: UnboundedReceiver<Value>,
}

impl MessageInbox {
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    /// Take the next already-delivered message without waiting.
    pub fn try_recv(&mut self) -> Option<Value> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}
