//! Outbound scene serving
//!
//! The engine answers Get requests by serving its scene between
//! `begin_serve` and `end_serve`. Served entities collect in a pending
//! [`SceneData`] and are published together when the bracket closes.

use std::sync::Arc;

use crossbeam_channel::Sender;

use meshsync_ir::{Fence, GetMessage};
use meshsync_scene::{
    AnimationClipData, CameraData, ConstraintData, Entity, LightData, MaterialData, MeshData,
    PointsData, SceneData, TextureData, TransformData,
};

/// A Get request waiting for the next published scene
pub struct PendingGet {
    pub request: GetMessage,
    pub reply: Sender<SceneData>,
}

pub struct ServeState {
    fence: Fence<SceneData>,
    pending_gets: Vec<PendingGet>,
}

impl Default for ServeState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServeState {
    pub fn new() -> Self {
        Self {
            fence: Fence::new(SceneData::default()),
            pending_gets: Vec::new(),
        }
    }

    pub fn add_pending_get(&mut self, get: PendingGet) {
        self.pending_gets.push(get);
    }

    pub fn pending_gets(&self) -> usize {
        self.pending_gets.len()
    }

    /// Drop every waiting Get; waiters see a disconnect
    pub fn cancel_pending_gets(&mut self) {
        self.pending_gets.clear();
    }

    pub fn is_serving(&self) -> bool {
        self.fence.in_transaction()
    }

    /// Last published scene
    pub fn served(&self) -> Arc<SceneData> {
        self.fence.live()
    }

    pub fn begin_serve(&mut self) {
        if self.fence.begin_with(SceneData::new("served")).is_err() {
            log::warn!("begin_serve while serving, previous batch dropped");
        }
    }

    fn pending(&mut self, what: &str) -> Option<&mut SceneData> {
        let pending = self.fence.pending_mut();
        if pending.is_none() {
            log::warn!("serve_{} outside begin_serve/end_serve dropped", what);
        }
        pending
    }

    fn serve_entity(&mut self, what: &str, entity: Entity) {
        if let Some(scene) = self.pending(what) {
            scene.upsert_object(entity);
        }
    }

    pub fn serve_transform(&mut self, data: TransformData) {
        self.serve_entity("transform", data.into());
    }

    pub fn serve_camera(&mut self, data: CameraData) {
        self.serve_entity("camera", data.into());
    }

    pub fn serve_light(&mut self, data: LightData) {
        self.serve_entity("light", data.into());
    }

    pub fn serve_mesh(&mut self, data: MeshData) {
        self.serve_entity("mesh", data.into());
    }

    pub fn serve_points(&mut self, data: PointsData) {
        self.serve_entity("points", data.into());
    }

    pub fn serve_material(&mut self, data: MaterialData) {
        if let Some(scene) = self.pending("material") {
            scene.upsert_material(data);
        }
    }

    pub fn serve_texture(&mut self, data: TextureData) {
        if let Some(scene) = self.pending("texture") {
            scene.upsert_texture(data);
        }
    }

    pub fn serve_constraint(&mut self, data: ConstraintData) {
        if let Some(scene) = self.pending("constraint") {
            scene.constraints.push(data);
        }
    }

    pub fn serve_animation(&mut self, data: AnimationClipData) {
        if let Some(scene) = self.pending("animation") {
            scene.animation_clips.push(data);
        }
    }

    /// Publish the served scene and answer every waiting Get.
    ///
    /// Returns false when no serve bracket was open.
    pub fn end_serve(&mut self) -> bool {
        let scene = match self.fence.end() {
            Ok(scene) => scene,
            Err(_) => {
                log::warn!("end_serve without begin_serve");
                return false;
            }
        };

        let gets = std::mem::take(&mut self.pending_gets);
        log::debug!("Served {} objects to {} requests", scene.objects.len(), gets.len());
        for get in gets {
            // requester may have disconnected
            let _ = get.reply.send(scene.filtered(&get.request.flags));
        }
        true
    }
}
