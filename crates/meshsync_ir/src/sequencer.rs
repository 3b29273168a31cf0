//! Consumer-side message handling
//!
//! [`SceneSequencer`] applies Set/Delete/Fence/Text/Query messages to a
//! fenced [`SceneState`]. Outside a SceneBegin/SceneEnd bracket each Set
//! or Delete commits on its own.

use std::sync::Arc;

use crate::fence::{Fence, LiveReader};
use crate::message::{
    DeleteMessage, FenceType, Message, QueryMessage, QueryType, SetMessage, TextMessage, TextType,
};
use crate::state::SceneState;

pub struct SceneSequencer {
    fence: Fence<SceneState>,
    client_name: String,
    scene_update: bool,
}

impl SceneSequencer {
    pub fn new(client_name: impl Into<String>, mesh_split_unit: u32) -> Self {
        Self {
            fence: Fence::new(SceneState::new(mesh_split_unit)),
            client_name: client_name.into(),
            scene_update: false,
        }
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Committed scene
    pub fn live(&self) -> Arc<SceneState> {
        self.fence.live()
    }

    /// Read handle for other threads
    pub fn reader(&self) -> LiveReader<SceneState> {
        self.fence.reader()
    }

    pub fn in_transaction(&self) -> bool {
        self.fence.in_transaction()
    }

    pub fn commits(&self) -> u64 {
        self.fence.commits()
    }

    /// Take the "new committed scene available" hint
    pub fn take_scene_update(&mut self) -> bool {
        std::mem::take(&mut self.scene_update)
    }

    /// Apply one message; returns false for kinds this sequencer does not
    /// handle (Get, Screenshot, Response)
    pub fn handle(&mut self, message: &Message) -> bool {
        match message {
            Message::Fence(fence) => self.on_fence(fence.fence_type),
            Message::Set(set) => self.on_set(set),
            Message::Delete(delete) => self.on_delete(delete),
            Message::Text(text) => Self::on_text(text),
            Message::Query(query) => self.on_query(query),
            Message::Get(_) | Message::Screenshot(_) | Message::Response(_) => return false,
        }
        true
    }

    fn on_fence(&mut self, fence_type: FenceType) {
        match fence_type {
            FenceType::SceneBegin => {
                if let Err(e) = self.fence.begin() {
                    log::warn!("{}", e);
                }
            }
            FenceType::SceneEnd => {
                if let Some(pending) = self.fence.pending_mut() {
                    pending.settle_references();
                }
                match self.fence.end() {
                    Ok(live) => {
                        self.scene_update = true;
                        log::info!("Scene committed: {} entities", live.len());
                    }
                    Err(e) => log::warn!("{}", e),
                }
            }
            FenceType::Unknown => log::warn!("Fence message with unknown type ignored"),
        }
    }

    fn on_set(&mut self, set: &SetMessage) {
        match self.fence.pending_mut() {
            Some(pending) => {
                pending.apply_set(&set.scene);
            }
            None => {
                self.fence.apply_immediate(|state| {
                    state.apply_set(&set.scene);
                    state.settle_references();
                });
                self.scene_update = true;
            }
        }
    }

    fn on_delete(&mut self, delete: &DeleteMessage) {
        match self.fence.pending_mut() {
            Some(pending) => {
                pending.apply_delete(delete);
            }
            None => {
                self.fence.apply_immediate(|state| {
                    state.apply_delete(delete);
                });
                self.scene_update = true;
            }
        }
    }

    fn on_text(text: &TextMessage) {
        match text.severity {
            TextType::Normal => log::info!("[client] {}", text.text),
            TextType::Warning => log::warn!("[client] {}", text.text),
            TextType::Error => log::error!("[client] {}", text.text),
        }
    }

    /// Answers against the committed scene, then finishes the reply
    fn on_query(&self, query: &QueryMessage) {
        let live = self.fence.live();
        match query.query_type {
            QueryType::ClientName => query.add_response_text(self.client_name.as_str()),
            QueryType::RootNodes => {
                for path in live.root_nodes() {
                    query.add_response_text(path);
                }
            }
            QueryType::AllNodes => {
                for path in live.all_nodes() {
                    query.add_response_text(path);
                }
            }
            QueryType::Unknown => log::warn!("Query with unknown type answered empty"),
        }
        query.finish_respond();
    }
}
