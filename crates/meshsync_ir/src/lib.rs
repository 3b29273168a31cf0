//! # MeshSync IR - Protocol & Scene Reconciliation
//!
//! Messages from a DCC tool are decoded into typed views, resolved against
//! a path-keyed identity registry and applied to a scene state. Batches
//! bracketed by fence messages are applied to a pending copy and swapped
//! into the live scene in one step.
//!
//! ## Architecture
//!
//! ```text
//! bytes ──► Codec ──► Message ──► SceneSequencer ──► Fence<SceneState>
//!                                      │                 ├── pending (SceneBegin..SceneEnd)
//!                                      ▼                 └── live    (Arc swap on SceneEnd)
//!                               IdentityRegistry
//! ```
//!
//! ## Key Concepts
//!
//! - **Message**: One protocol unit, tagged by a stable [`MessageType`]
//! - **Fence**: SceneBegin/SceneEnd bracket making a batch atomic
//! - **Registry**: path -> session id mapping, ids never reused
//! - **Responder**: Reply channel a Query handler must finish

pub mod message;
pub mod codec;
pub mod response;
pub mod registry;
pub mod fence;
pub mod state;
pub mod sequencer;
pub mod error;

pub use message::{
    Message, MessageType, GetMessage, SetMessage, DeleteMessage, FenceMessage, FenceType,
    TextMessage, TextType, QueryMessage, QueryType, ScreenshotMessage, ResponseMessage,
    ResponseStatus, PollType,
};
pub use codec::{
    read_message, write_message, encode_message, decode_message, FrameHeader,
    PROTOCOL_VERSION, MAX_MESSAGE_SIZE, HEADER_SIZE,
};
pub use response::{Responder, ResponseReceiver, ResponseEvent};
pub use registry::IdentityRegistry;
pub use fence::{Fence, FenceState, LiveReader};
pub use state::{SceneState, ApplyStats};
pub use sequencer::SceneSequencer;
pub use error::{CodecError, FenceError, ResponseError, Result};
