//! TCP queueing server
//!
//! One accept thread and at most `max_threads` connection workers. Workers
//! decode frames and push them onto the [`MessageQueue`]; the owning
//! application drains the queue with [`Server::process_messages`] from a
//! single thread.
//!
//! Replies a worker waits for (Query texts, Get scenes, screenshots) are
//! polled with a timeout so [`Server::stop`] can always join the workers.
//! Poll hints are handed to a broadcaster thread; the consumer never writes
//! to a socket.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use meshsync_ir::{
    read_message, write_message, CodecError, GetMessage, Message, MessageType, PollType,
    Responder, ResponseError, ResponseMessage, ResponseStatus, ScreenshotMessage,
};
use meshsync_scene::{
    AnimationClipData, CameraData, ConstraintData, LightData, MaterialData, MeshData, PointsData,
    TextureData, TransformData,
};

use crate::config::ServerSettings;
use crate::error::{Result, ServerError};
use crate::queue::{MessageQueue, QueueStats};
use crate::serve::{PendingGet, ServeState};

/// How often blocked workers and the accept loop re-check for shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A peer that accepts no bytes for this long is disconnected
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Poll hints waiting for the broadcaster; extra hints are coalesced
const POLL_BACKLOG: usize = 4;

type ConnectionId = u64;

struct Connection {
    peer: SocketAddr,
    /// Shared by the worker and poll broadcasts so frames never interleave
    writer: Arc<Mutex<TcpStream>>,
    /// Unlocked handle used to shut the socket down
    control: TcpStream,
}

struct Shared {
    settings: ServerSettings,
    running: AtomicBool,
    active_workers: AtomicUsize,
    next_connection: AtomicU64,
    queue: MessageQueue,
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    serve: Mutex<ServeState>,
    polls: Sender<PollType>,
    /// Workers waiting for the consumer to capture a screenshot
    pending_screenshots: Mutex<Vec<Sender<()>>>,
    screenshot_path: RwLock<Option<PathBuf>>,
    file_root_path: RwLock<Option<PathBuf>>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn close_connection(&self, id: ConnectionId) {
        if let Some(connection) = self.connections.lock().remove(&id) {
            let _ = connection.control.shutdown(Shutdown::Both);
        }
    }
}

/// Handle to a running server; stops on drop
pub struct Server {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
    poll_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Bind `settings.address()` and start accepting connections
    pub fn start(settings: ServerSettings) -> Result<Server> {
        let address = settings.address();
        let listener = TcpListener::bind(&address).map_err(|source| {
            log::error!("Failed to bind {}: {}", address, source);
            ServerError::Bind { address: address.clone(), source }
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let (polls, poll_rx) = bounded(POLL_BACKLOG);
        let shared = Arc::new(Shared {
            queue: MessageQueue::new(settings.max_queue),
            screenshot_path: RwLock::new(settings.screenshot_path.clone()),
            file_root_path: RwLock::new(settings.file_root_path.clone()),
            settings,
            running: AtomicBool::new(true),
            active_workers: AtomicUsize::new(0),
            next_connection: AtomicU64::new(1),
            connections: Mutex::new(HashMap::new()),
            workers: Mutex::new(Vec::new()),
            serve: Mutex::new(ServeState::new()),
            polls,
            pending_screenshots: Mutex::new(Vec::new()),
        });

        let poll_shared = Arc::clone(&shared);
        let poll_thread = thread::Builder::new()
            .name("meshsync-poll".to_string())
            .spawn(move || poll_loop(poll_shared, poll_rx))?;

        let accept_shared = Arc::clone(&shared);
        let accept_thread = match thread::Builder::new()
            .name("meshsync-accept".to_string())
            .spawn(move || accept_loop(accept_shared, listener))
        {
            Ok(handle) => handle,
            Err(e) => {
                shared.running.store(false, Ordering::Release);
                let _ = poll_thread.join();
                return Err(e.into());
            }
        };

        log::info!(
            "MeshSync server listening on {} (max_queue {}, max_threads {})",
            local_addr,
            shared.queue.capacity(),
            shared.settings.max_threads
        );

        Ok(Server {
            shared,
            local_addr,
            accept_thread: Mutex::new(Some(accept_thread)),
            poll_thread: Mutex::new(Some(poll_thread)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.shared.settings
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// File whose bytes answer Screenshot requests
    pub fn screenshot_path(&self) -> Option<PathBuf> {
        self.shared.screenshot_path.read().clone()
    }

    pub fn set_screenshot_path(&self, path: Option<PathBuf>) {
        *self.shared.screenshot_path.write() = path;
    }

    /// Directory raw-file textures are written to
    pub fn file_root_path(&self) -> Option<PathBuf> {
        self.shared.file_root_path.read().clone()
    }

    pub fn set_file_root_path(&self, path: Option<PathBuf>) {
        *self.shared.file_root_path.write() = path;
    }

    /// Stop accepting, close every connection, join all threads and
    /// discard queued messages. Safe to call more than once.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }

        let connections: Vec<Connection> =
            self.shared.connections.lock().drain().map(|(_, c)| c).collect();
        for connection in connections {
            let _ = connection.control.shutdown(Shutdown::Both);
        }
        self.shared.serve.lock().cancel_pending_gets();
        self.shared.pending_screenshots.lock().clear();

        if let Some(handle) = self.accept_thread.lock().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.poll_thread.lock().take() {
            let _ = handle.join();
        }
        let workers = std::mem::take(&mut *self.shared.workers.lock());
        for handle in workers {
            let _ = handle.join();
        }

        let dropped = self.shared.queue.clear();
        log::info!("MeshSync server stopped ({} queued messages discarded)", dropped);
    }

    /// Current queue depth
    pub fn num_messages(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.shared.queue.stats()
    }

    pub fn num_connections(&self) -> usize {
        self.shared.connections.lock().len()
    }

    /// Drain queued messages through `handler` in arrival order.
    ///
    /// Must only be called from one thread.
    pub fn process_messages<F>(&self, handler: F) -> usize
    where
        F: FnMut(MessageType, &Message),
    {
        self.shared.queue.drain(handler)
    }

    /// Queue a one-way poll hint for every connected peer.
    ///
    /// Never blocks; hints beyond a small backlog are coalesced.
    pub fn notify_poll(&self, poll: PollType) {
        match self.shared.polls.try_send(poll) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::trace!("Poll backlog full, {:?} coalesced", poll),
            Err(TrySendError::Disconnected(_)) => log::debug!("Poll broadcaster stopped"),
        }
    }

    /// Release workers waiting on Screenshot requests; each replies with
    /// the current contents of [`screenshot_path`](Server::screenshot_path).
    ///
    /// Call once the image has been written. Returns the number released.
    pub fn screenshot_ready(&self) -> usize {
        let waiting = std::mem::take(&mut *self.shared.pending_screenshots.lock());
        waiting.into_iter().filter(|tx| tx.send(()).is_ok()).count()
    }

    pub fn begin_serve(&self) {
        self.shared.serve.lock().begin_serve();
    }

    pub fn serve_transform(&self, data: TransformData) {
        self.shared.serve.lock().serve_transform(data);
    }

    pub fn serve_camera(&self, data: CameraData) {
        self.shared.serve.lock().serve_camera(data);
    }

    pub fn serve_light(&self, data: LightData) {
        self.shared.serve.lock().serve_light(data);
    }

    pub fn serve_mesh(&self, data: MeshData) {
        self.shared.serve.lock().serve_mesh(data);
    }

    pub fn serve_points(&self, data: PointsData) {
        self.shared.serve.lock().serve_points(data);
    }

    pub fn serve_material(&self, data: MaterialData) {
        self.shared.serve.lock().serve_material(data);
    }

    pub fn serve_texture(&self, data: TextureData) {
        self.shared.serve.lock().serve_texture(data);
    }

    pub fn serve_constraint(&self, data: ConstraintData) {
        self.shared.serve.lock().serve_constraint(data);
    }

    pub fn serve_animation(&self, data: AnimationClipData) {
        self.shared.serve.lock().serve_animation(data);
    }

    /// Publish the served scene to waiting Get requests
    pub fn end_serve(&self) -> bool {
        self.shared.serve.lock().end_serve()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(shared: Arc<Shared>, listener: TcpListener) {
    let max_threads = shared.settings.max_threads.max(1);

    while shared.is_running() {
        if shared.active_workers.load(Ordering::Acquire) >= max_threads {
            // leave new connections in the backlog until a worker frees up
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = spawn_worker(&shared, stream, peer) {
                    log::error!("Failed to start worker for {}: {}", peer, e);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log::error!("Accept error: {}", e);
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
    log::debug!("Accept loop exited");
}

fn poll_loop(shared: Arc<Shared>, polls: Receiver<PollType>) {
    while shared.is_running() {
        let poll = match polls.recv_timeout(POLL_INTERVAL) {
            Ok(poll) => poll,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let message = Message::Response(ResponseMessage::with_status(ResponseStatus::Poll(poll)));
        let peers: Vec<(ConnectionId, SocketAddr, Arc<Mutex<TcpStream>>)> = shared
            .connections
            .lock()
            .iter()
            .map(|(&id, c)| (id, c.peer, Arc::clone(&c.writer)))
            .collect();

        for (id, peer, writer) in peers {
            let written = write_message(&mut *writer.lock(), &message);
            if let Err(e) = written {
                log::warn!("Poll to {} failed, closing: {}", peer, e);
                shared.close_connection(id);
            }
        }
    }
    log::debug!("Poll broadcaster exited");
}

fn spawn_worker(shared: &Arc<Shared>, stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    // shared by every clone of the socket
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    let writer = Arc::new(Mutex::new(stream.try_clone()?));
    let control = stream.try_clone()?;

    let id = shared.next_connection.fetch_add(1, Ordering::Relaxed);
    shared.connections.lock().insert(
        id,
        Connection { peer, writer: Arc::clone(&writer), control },
    );
    if !shared.is_running() {
        // stop() may have drained the table before this insert
        let _ = stream.shutdown(Shutdown::Both);
    }
    shared.active_workers.fetch_add(1, Ordering::AcqRel);

    let worker_shared = Arc::clone(shared);
    let spawned = thread::Builder::new()
        .name(format!("meshsync-conn-{}", id))
        .spawn(move || {
            log::info!("Client connected: {} ({})", peer, id);
            let mut worker = Worker { shared: &worker_shared, reader: stream, writer, peer };
            worker.run();
            worker_shared.connections.lock().remove(&id);
            worker_shared.active_workers.fetch_sub(1, Ordering::AcqRel);
            log::info!("Client disconnected: {} ({})", peer, id);
        });

    match spawned {
        Ok(handle) => {
            let mut workers = shared.workers.lock();
            workers.retain(|h| !h.is_finished());
            workers.push(handle);
            Ok(())
        }
        Err(e) => {
            shared.connections.lock().remove(&id);
            shared.active_workers.fetch_sub(1, Ordering::AcqRel);
            Err(e)
        }
    }
}

/// Whether the worker should keep reading from its connection
enum Flow {
    Continue,
    Close,
}

struct Worker<'a> {
    shared: &'a Shared,
    reader: TcpStream,
    writer: Arc<Mutex<TcpStream>>,
    peer: SocketAddr,
}

impl Worker<'_> {
    fn run(&mut self) {
        while self.shared.is_running() {
            let message = match read_message(&mut self.reader) {
                Ok(message) => message,
                Err(CodecError::ConnectionClosed) => break,
                Err(CodecError::Io(e)) if !self.shared.is_running() => {
                    log::trace!("Read interrupted by shutdown: {}", e);
                    break;
                }
                Err(e) => {
                    log::warn!("Dropping {}: {}", self.peer, e);
                    break;
                }
            };

            log::debug!("{} from {}", message.message_type(), self.peer);
            let flow = match message {
                Message::Query(mut query) => {
                    let (responder, receiver) = Responder::channel();
                    query.responder = Some(responder);
                    if !self.enqueue(Message::Query(query)) {
                        continue;
                    }
                    match receiver.wait(POLL_INTERVAL, || self.shared.is_running()) {
                        Ok(texts) => self.reply(Message::Response(ResponseMessage::ok(texts))),
                        Err(ResponseError::Abandoned) => {
                            log::warn!("Query from {} was never finished, closing", self.peer);
                            let abandoned = ResponseMessage::with_status(ResponseStatus::Abandoned);
                            self.reply(Message::Response(abandoned));
                            Flow::Close
                        }
                        Err(ResponseError::Cancelled) => Flow::Close,
                    }
                }
                Message::Get(get) => self.handle_get(get),
                Message::Screenshot(shot) => self.handle_screenshot(shot),
                other => {
                    self.enqueue(other);
                    Flow::Continue
                }
            };

            if let Flow::Close = flow {
                break;
            }
        }
        let _ = self.reader.shutdown(Shutdown::Both);
    }

    /// Push onto the queue, answering Rejected when full
    fn enqueue(&self, message: Message) -> bool {
        match self.shared.queue.try_push(message) {
            Ok(()) => true,
            Err(_) => {
                self.reply(Message::Response(ResponseMessage::with_status(ResponseStatus::Rejected)));
                false
            }
        }
    }

    fn reply(&self, message: Message) -> Flow {
        match write_message(&mut *self.writer.lock(), &message) {
            Ok(()) => Flow::Continue,
            Err(e) => {
                log::warn!("Failed to reply to {}: {}", self.peer, e);
                Flow::Close
            }
        }
    }

    /// Queue the Get and wait for the next `end_serve`
    fn handle_get(&self, get: GetMessage) -> Flow {
        let (tx, rx) = bounded(1);
        self.shared.serve.lock().add_pending_get(PendingGet {
            request: get.clone(),
            reply: tx,
        });
        if !self.enqueue(Message::Get(get)) {
            // the registered reply is dropped with the next end_serve
            return Flow::Continue;
        }

        match self.wait_for(&rx) {
            Some(scene) => self.reply(Message::set(scene)),
            None => Flow::Close,
        }
    }

    /// Queue the Screenshot and reply once the consumer has captured it
    fn handle_screenshot(&self, shot: ScreenshotMessage) -> Flow {
        let (tx, rx) = bounded(1);
        self.shared.pending_screenshots.lock().push(tx);
        if !self.enqueue(Message::Screenshot(shot)) {
            return Flow::Continue;
        }

        match self.wait_for(&rx) {
            Some(()) => {
                let data = self.screenshot_bytes();
                self.reply(Message::Response(ResponseMessage::data(data)))
            }
            None => Flow::Close,
        }
    }

    /// Block until the consumer answers; `None` on shutdown
    fn wait_for<T>(&self, rx: &Receiver<T>) -> Option<T> {
        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(value) => return Some(value),
                Err(RecvTimeoutError::Timeout) if self.shared.is_running() => continue,
                Err(_) => return None,
            }
        }
    }

    fn screenshot_bytes(&self) -> Vec<u8> {
        let Some(path) = self.shared.screenshot_path.read().clone() else {
            return Vec::new();
        };
        std::fs::read(&path).unwrap_or_else(|e| {
            log::warn!("Screenshot {} unavailable: {}", path.display(), e);
            Vec::new()
        })
    }
}
