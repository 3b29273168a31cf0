//! Protocol messages
//!
//! Every unit on the wire carries a [`MessageType`] tag whose ordinal is part
//! of the compatibility contract. [`Message`] is the decoded form; the
//! `as_*` accessors hand out borrowed typed views of the payload.

use serde::{Deserialize, Serialize};

use meshsync_scene::{GetFlags, Identifier, SceneData};

use crate::response::Responder;

/// Wire tag of a message. Reordering breaks compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    #[default]
    Unknown = 0,
    Get = 1,
    Set = 2,
    Delete = 3,
    Fence = 4,
    Text = 5,
    Screenshot = 6,
    Query = 7,
    Response = 8,
}

impl MessageType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Unknown),
            1 => Some(Self::Get),
            2 => Some(Self::Set),
            3 => Some(Self::Delete),
            4 => Some(Self::Fence),
            5 => Some(Self::Text),
            6 => Some(Self::Screenshot),
            7 => Some(Self::Query),
            8 => Some(Self::Response),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Get => "Get",
            Self::Set => "Set",
            Self::Delete => "Delete",
            Self::Fence => "Fence",
            Self::Text => "Text",
            Self::Screenshot => "Screenshot",
            Self::Query => "Query",
            Self::Response => "Response",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Request for the receiver's current scene
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GetMessage {
    pub flags: GetFlags,
    /// Apply skinning before sending
    pub bake_skin: bool,
    /// Apply cloth deformation before sending
    pub bake_cloth: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SetMessage {
    pub scene: SceneData,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeleteMessage {
    pub targets: Vec<Identifier>,
    pub materials: Vec<Identifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FenceType {
    #[default]
    Unknown = 0,
    SceneBegin = 1,
    SceneEnd = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FenceMessage {
    pub fence_type: FenceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextType {
    #[default]
    Normal = 0,
    Warning = 1,
    Error = 2,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextMessage {
    pub text: String,
    pub severity: TextType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum QueryType {
    #[default]
    Unknown = 0,
    ClientName = 1,
    RootNodes = 2,
    AllNodes = 3,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryMessage {
    pub query_type: QueryType,
    /// Reply channel, attached by the receiving connection
    #[serde(skip)]
    pub responder: Option<Responder>,
}

impl QueryMessage {
    pub fn new(query_type: QueryType) -> Self {
        Self { query_type, responder: None }
    }

    pub fn add_response_text(&self, text: impl Into<String>) {
        match &self.responder {
            Some(r) => r.add_response_text(text),
            None => log::debug!("Query {:?} has no responder", self.query_type),
        }
    }

    pub fn finish_respond(&self) {
        if let Some(r) = &self.responder {
            r.finish_respond();
        }
    }
}

/// Request for the receiver's current rendered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreenshotMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PollType {
    #[default]
    Unknown = 0,
    SceneUpdate = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[default]
    Ok,
    /// The receiver's queue was full
    Rejected,
    /// The requester stopped answering before the reply was complete
    Abandoned,
    /// One-way hint, no request attached
    Poll(PollType),
}

/// Reply written back to a peer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub status: ResponseStatus,
    pub texts: Vec<String>,
    pub data: Vec<u8>,
}

impl ResponseMessage {
    pub fn ok(texts: Vec<String>) -> Self {
        Self { texts, ..Default::default() }
    }

    pub fn with_status(status: ResponseStatus) -> Self {
        Self { status, ..Default::default() }
    }

    pub fn data(data: Vec<u8>) -> Self {
        Self { data, ..Default::default() }
    }
}

/// A decoded protocol message
#[derive(Debug, Clone)]
pub enum Message {
    Get(GetMessage),
    Set(SetMessage),
    Delete(DeleteMessage),
    Fence(FenceMessage),
    Text(TextMessage),
    Screenshot(ScreenshotMessage),
    Query(QueryMessage),
    Response(ResponseMessage),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Get(_) => MessageType::Get,
            Message::Set(_) => MessageType::Set,
            Message::Delete(_) => MessageType::Delete,
            Message::Fence(_) => MessageType::Fence,
            Message::Text(_) => MessageType::Text,
            Message::Screenshot(_) => MessageType::Screenshot,
            Message::Query(_) => MessageType::Query,
            Message::Response(_) => MessageType::Response,
        }
    }

    pub fn scene_begin() -> Self {
        Message::Fence(FenceMessage { fence_type: FenceType::SceneBegin })
    }

    pub fn scene_end() -> Self {
        Message::Fence(FenceMessage { fence_type: FenceType::SceneEnd })
    }

    pub fn set(scene: SceneData) -> Self {
        Message::Set(SetMessage { scene })
    }

    pub fn text(text: impl Into<String>, severity: TextType) -> Self {
        Message::Text(TextMessage { text: text.into(), severity })
    }

    pub fn query(query_type: QueryType) -> Self {
        Message::Query(QueryMessage::new(query_type))
    }

    pub fn as_get(&self) -> Option<&GetMessage> {
        match self {
            Message::Get(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&SetMessage> {
        match self {
            Message::Set(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_delete(&self) -> Option<&DeleteMessage> {
        match self {
            Message::Delete(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_fence(&self) -> Option<&FenceMessage> {
        match self {
            Message::Fence(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextMessage> {
        match self {
            Message::Text(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_screenshot(&self) -> Option<&ScreenshotMessage> {
        match self {
            Message::Screenshot(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_query(&self) -> Option<&QueryMessage> {
        match self {
            Message::Query(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&ResponseMessage> {
        match self {
            Message::Response(m) => Some(m),
            _ => None,
        }
    }
}
