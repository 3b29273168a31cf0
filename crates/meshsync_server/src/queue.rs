//! Bounded message queue
//!
//! Connection workers push, the consumer drains. Pushing onto a full queue
//! fails at once so a worker is never parked behind a slow consumer.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use meshsync_ir::{Message, MessageType};

use crate::error::QueueError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub accepted: u64,
    pub rejected: u64,
    pub processed: u64,
}

pub struct MessageQueue {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
    capacity: usize,
    accepted: AtomicU64,
    rejected: AtomicU64,
    processed: AtomicU64,
}

impl MessageQueue {
    /// Queue holding at most `capacity` messages (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            processed: AtomicU64::new(0),
        }
    }

    pub fn try_push(&self, message: Message) -> Result<(), QueueError> {
        match self.sender.try_send(message) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(rejected)) | Err(TrySendError::Disconnected(rejected)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Queue full ({}), {} message rejected",
                    self.capacity,
                    rejected.message_type()
                );
                Err(QueueError::Full { capacity: self.capacity })
            }
        }
    }

    /// Current depth
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hand every message queued at call time to `handler`, oldest first.
    ///
    /// Messages arriving during the drain wait for the next call.
    pub fn drain<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(MessageType, &Message),
    {
        let available = self.receiver.len();
        let mut count = 0;
        for _ in 0..available {
            match self.receiver.try_recv() {
                Ok(message) => {
                    handler(message.message_type(), &message);
                    count += 1;
                }
                Err(_) => break,
            }
        }
        self.processed.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Discard everything queued
    pub fn clear(&self) -> usize {
        self.receiver.try_iter().count()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
        }
    }
}
