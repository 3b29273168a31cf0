//! Query reply channel
//!
//! The connection that received a Query keeps the [`ResponseReceiver`];
//! the [`Responder`] travels with the message to the consumer, whose handler
//! calls [`Responder::add_response_text`] any number of times followed by
//! exactly one [`Responder::finish_respond`]. Nothing closes the reply on
//! the handler's behalf.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::error::ResponseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    Text(String),
    Finish,
}

/// Handler side of a query reply
#[derive(Clone)]
pub struct Responder {
    sender: Sender<ResponseEvent>,
    finished: Arc<AtomicBool>,
}

impl Responder {
    /// Create a connected responder/receiver pair
    pub fn channel() -> (Responder, ResponseReceiver) {
        let (sender, receiver) = unbounded();
        (
            Responder {
                sender,
                finished: Arc::new(AtomicBool::new(false)),
            },
            ResponseReceiver { receiver },
        )
    }

    pub fn add_response_text(&self, text: impl Into<String>) {
        if self.is_finished() {
            log::warn!("add_response_text after finish_respond ignored");
            return;
        }
        // the requester may already be gone
        let _ = self.sender.send(ResponseEvent::Text(text.into()));
    }

    pub fn finish_respond(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            log::warn!("finish_respond called more than once");
            return;
        }
        let _ = self.sender.send(ResponseEvent::Finish);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Requester side of a query reply
pub struct ResponseReceiver {
    receiver: Receiver<ResponseEvent>,
}

impl ResponseReceiver {
    /// Collect texts until the handler finishes.
    ///
    /// Polls every `poll` so `keep_waiting` can cancel the wait.
    pub fn wait(
        &self,
        poll: Duration,
        mut keep_waiting: impl FnMut() -> bool,
    ) -> Result<Vec<String>, ResponseError> {
        let mut texts = Vec::new();
        loop {
            match self.receiver.recv_timeout(poll) {
                Ok(ResponseEvent::Text(text)) => texts.push(text),
                Ok(ResponseEvent::Finish) => return Ok(texts),
                Err(RecvTimeoutError::Disconnected) => return Err(ResponseError::Abandoned),
                Err(RecvTimeoutError::Timeout) => {
                    if !keep_waiting() {
                        return Err(ResponseError::Cancelled);
                    }
                }
            }
        }
    }

    /// Events already delivered, without waiting
    pub fn drain(&self) -> Vec<ResponseEvent> {
        self.receiver.try_iter().collect()
    }
}
