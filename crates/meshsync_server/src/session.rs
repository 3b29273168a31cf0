//! Sync session
//!
//! Owns the server handle and the fenced scene the consumer thread applies
//! messages to. Call [`SyncSession::update`] once per frame.
//!
//! Raw-file textures are written under the file root only once the
//! transaction that carried them commits.

use std::path::Path;
use std::sync::Arc;

use meshsync_ir::{
    FenceType, GetMessage, LiveReader, Message, PollType, SceneSequencer, SceneState,
};
use meshsync_scene::{Entity, TextureData, INVALID_ID};

use crate::config::ServerSettings;
use crate::error::Result;
use crate::server::Server;

/// Renders the current frame to the given file
pub type ScreenshotCapture = Box<dyn FnMut(&Path) + Send>;

pub struct SyncSession {
    server: Server,
    sequencer: SceneSequencer,
    capture: Option<ScreenshotCapture>,
    /// Raw texture ids received in the open transaction
    pending_files: Vec<i32>,
}

impl SyncSession {
    pub fn start(settings: ServerSettings) -> Result<Self> {
        let sequencer = SceneSequencer::new(settings.client_name.clone(), settings.mesh_split_unit);
        let server = Server::start(settings)?;
        Ok(Self {
            server,
            sequencer,
            capture: None,
            pending_files: Vec::new(),
        })
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Committed scene
    pub fn live(&self) -> Arc<SceneState> {
        self.sequencer.live()
    }

    pub fn reader(&self) -> LiveReader<SceneState> {
        self.sequencer.reader()
    }

    pub fn take_scene_update(&mut self) -> bool {
        self.sequencer.take_scene_update()
    }

    /// Called with the screenshot path before Screenshot requests are answered
    pub fn set_screenshot_capture(&mut self, capture: impl FnMut(&Path) + Send + 'static) {
        self.capture = Some(Box::new(capture));
    }

    /// Drain the queue and apply every message; returns the count handled
    pub fn update(&mut self) -> usize {
        let Self { server, sequencer, capture, pending_files } = self;
        let server = &*server;

        server.process_messages(|ty, message| {
            match message {
                // a nested begin throws the open transaction away
                Message::Fence(fence) if fence.fence_type == FenceType::SceneBegin => {
                    pending_files.clear();
                }
                Message::Set(set) => pending_files.extend(
                    set.scene
                        .textures
                        .iter()
                        .filter(|t| t.is_raw_file() && t.id != INVALID_ID)
                        .map(|t| t.id),
                ),
                _ => {}
            }

            let commits = sequencer.commits();
            if sequencer.handle(message) {
                if sequencer.commits() != commits {
                    write_committed_files(server, &sequencer.live(), pending_files);
                }
                return;
            }
            match message {
                Message::Get(get) => serve_live(server, &sequencer.live(), get),
                Message::Screenshot(_) => {
                    match (capture.as_mut(), server.screenshot_path()) {
                        (Some(capture), Some(path)) => capture(&path),
                        (Some(_), None) => log::warn!("Screenshot requested without a screenshot path"),
                        (None, _) => log::debug!("Screenshot requested, serving existing file"),
                    }
                    server.screenshot_ready();
                }
                _ => log::debug!("Unhandled {} message", ty),
            }
        })
    }

    /// Tell connected peers a new scene is available
    pub fn notify_poll(&self, poll: PollType) {
        self.server.notify_poll(poll);
    }

    pub fn stop(&self) {
        self.server.stop();
    }
}

/// Answer a Get by serving the committed scene
fn serve_live(server: &Server, live: &SceneState, get: &GetMessage) {
    if get.bake_skin || get.bake_cloth {
        log::debug!("Get asked for baked deformation; serving rest pose");
    }
    let scene = live.to_scene_data("live");
    server.begin_serve();
    for entity in scene.objects {
        match entity {
            Entity::Transform(t) => server.serve_transform(t),
            Entity::Camera(c) => server.serve_camera(c),
            Entity::Light(l) => server.serve_light(l),
            Entity::Mesh(m) => server.serve_mesh(m),
            Entity::Points(p) => server.serve_points(p),
        }
    }
    for material in scene.materials {
        server.serve_material(material);
    }
    for texture in scene.textures {
        server.serve_texture(texture);
    }
    for constraint in scene.constraints {
        server.serve_constraint(constraint);
    }
    for clip in scene.animation_clips {
        server.serve_animation(clip);
    }
    server.end_serve();
}

/// Write the committed versions of the pending raw textures
fn write_committed_files(server: &Server, live: &SceneState, pending: &mut Vec<i32>) {
    let ids = std::mem::take(pending);
    let Some(root) = server.file_root_path() else {
        return;
    };
    for id in ids {
        match live.texture(id) {
            Some(texture) if texture.is_raw_file() => write_raw_texture(&root, texture),
            _ => log::trace!("Texture {} no longer a raw file, skipped", id),
        }
    }
}

/// Store an undecoded texture file under `root`
fn write_raw_texture(root: &Path, texture: &TextureData) {
    let Some(file_name) = Path::new(&texture.name).file_name() else {
        log::warn!("Raw texture with unusable name '{}' skipped", texture.name);
        return;
    };
    let path = root.join(file_name);
    if texture.write_to_file(&path) {
        log::debug!("Wrote {} ({} bytes)", path.display(), texture.size_in_bytes());
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        log::debug!("Sync session dropped after {} commits", self.sequencer.commits());
    }
}
