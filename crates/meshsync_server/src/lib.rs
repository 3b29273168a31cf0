//! # MeshSync Server
//!
//! Accepts framed messages from DCC tools over TCP, buffers them in a
//! bounded queue and hands them to a single consumer thread.
//!
//! ## Architecture
//!
//! ```text
//! DCC ──TCP──► worker (≤ max_threads) ──try_push──► MessageQueue (≤ max_queue)
//!                 ▲                                       │
//!                 │ Response / Set                        ▼ process_messages
//!                 └──────── ServeState ◄── end_serve ── SyncSession (consumer)
//! ```

pub mod config;
pub mod queue;
pub mod server;
pub mod serve;
pub mod session;
pub mod error;

pub use config::ServerSettings;
pub use queue::{MessageQueue, QueueStats};
pub use server::Server;
pub use serve::ServeState;
pub use session::{ScreenshotCapture, SyncSession};
pub use error::{ServerError, QueueError, ConfigError, Result};

/// Server version reported to clients
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
