//! Message framing
//!
//! Frame layout (little endian):
//!
//! ```text
//! ┌──────────┬─────┬──────────┬────────┬──────────────────┐
//! │ version  │ tag │ reserved │ length │ body (bincode)   │
//! │ u32      │ u8  │ [u8; 3]  │ u32    │ `length` bytes   │
//! └──────────┴─────┴──────────┴────────┴──────────────────┘
//! ```

use std::io::{Read, Write};

use crate::error::{CodecError, Result};
use crate::message::{
    DeleteMessage, FenceMessage, GetMessage, Message, MessageType, QueryMessage,
    ResponseMessage, ScreenshotMessage, SetMessage, TextMessage,
};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum body size (64 MB, large meshes and raw textures)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Size of the fixed frame header
pub const HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u32,
    pub tag: u8,
    pub length: u32,
}

impl FrameHeader {
    pub fn new(message_type: MessageType, length: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            tag: message_type as u8,
            length,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.version.to_le_bytes());
        bytes[4] = self.tag;
        bytes[8..12].copy_from_slice(&self.length.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            version: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            tag: bytes[4],
            length: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }
}

fn encode_body(message: &Message) -> Result<Vec<u8>> {
    let body = match message {
        Message::Get(m) => bincode::serialize(m)?,
        Message::Set(m) => bincode::serialize(m)?,
        Message::Delete(m) => bincode::serialize(m)?,
        Message::Fence(m) => bincode::serialize(m)?,
        Message::Text(m) => bincode::serialize(m)?,
        Message::Screenshot(m) => bincode::serialize(m)?,
        Message::Query(m) => bincode::serialize(m)?,
        Message::Response(m) => bincode::serialize(m)?,
    };
    Ok(body)
}

/// Encode a message into a complete frame
pub fn encode_message(message: &Message) -> Result<Vec<u8>> {
    let body = encode_body(message)?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(body.len()));
    }
    let header = FrameHeader::new(message.message_type(), body.len() as u32);
    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode a body for the given wire tag
pub fn decode_message(tag: u8, body: &[u8]) -> Result<Message> {
    let message = match MessageType::from_u8(tag) {
        Some(MessageType::Get) => Message::Get(bincode::deserialize::<GetMessage>(body)?),
        Some(MessageType::Set) => Message::Set(bincode::deserialize::<SetMessage>(body)?),
        Some(MessageType::Delete) => Message::Delete(bincode::deserialize::<DeleteMessage>(body)?),
        Some(MessageType::Fence) => Message::Fence(bincode::deserialize::<FenceMessage>(body)?),
        Some(MessageType::Text) => Message::Text(bincode::deserialize::<TextMessage>(body)?),
        Some(MessageType::Screenshot) => {
            Message::Screenshot(bincode::deserialize::<ScreenshotMessage>(body)?)
        }
        Some(MessageType::Query) => Message::Query(bincode::deserialize::<QueryMessage>(body)?),
        Some(MessageType::Response) => {
            Message::Response(bincode::deserialize::<ResponseMessage>(body)?)
        }
        Some(MessageType::Unknown) | None => return Err(CodecError::InvalidMessageType(tag)),
    };
    Ok(message)
}

/// Write one framed message
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let frame = encode_message(message)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read one framed message
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_bytes)?;
    let header = FrameHeader::from_bytes(&header_bytes);

    if header.version != PROTOCOL_VERSION {
        return Err(CodecError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            got: header.version,
        });
    }

    let length = header.length as usize;
    if length > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(length));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;
    decode_message(header.tag, &body)
}
