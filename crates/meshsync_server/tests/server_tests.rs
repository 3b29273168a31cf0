//! TCP round trips against a live server on an ephemeral port

use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use meshsync_ir::*;
use meshsync_scene::{GetFlags, MeshData, SceneData, SubmeshData, TextureData, TransformData};
use meshsync_server::{Server, ServerError, ServerSettings, SyncSession};

fn local_settings() -> ServerSettings {
    ServerSettings {
        port: 0,
        bind_address: "127.0.0.1".to_string(),
        ..Default::default()
    }
}

fn connect(server: &Server) -> TcpStream {
    let stream = TcpStream::connect(server.local_addr()).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn triangle(path: &str) -> MeshData {
    let mut mesh = MeshData::new(path);
    mesh.points = vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    mesh.add_submesh(SubmeshData::triangles(0, vec![0, 1, 2]));
    mesh
}

#[test]
fn test_bind_conflict_is_an_error() {
    let first = Server::start(local_settings()).unwrap();
    let taken = ServerSettings {
        port: first.local_addr().port(),
        ..local_settings()
    };
    match Server::start(taken) {
        Err(ServerError::Bind { .. }) => {}
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("second bind succeeded"),
    }
}

#[test]
fn test_full_queue_rejects() {
    let server = Server::start(ServerSettings { max_queue: 2, ..local_settings() }).unwrap();
    let mut client = connect(&server);

    for i in 0..3 {
        write_message(&mut client, &Message::text(format!("hello {}", i), TextType::Normal)).unwrap();
    }

    match read_message(&mut client).unwrap() {
        Message::Response(response) => assert_eq!(response.status, ResponseStatus::Rejected),
        other => panic!("expected response, got {}", other.message_type()),
    }
    assert_eq!(server.num_messages(), 2);
    assert_eq!(server.queue_stats().rejected, 1);

    let mut texts = Vec::new();
    server.process_messages(|_, message| {
        texts.push(message.as_text().unwrap().text.clone());
    });
    assert_eq!(texts, vec!["hello 0".to_string(), "hello 1".to_string()]);
}

#[test]
fn test_set_then_query_over_tcp() {
    let mut session = SyncSession::start(local_settings()).unwrap();
    let mut client = connect(session.server());

    let client_thread = thread::spawn(move || {
        let mut scene = SceneData::new("scene");
        scene.upsert_object(triangle("/root/mesh1").into());

        write_message(&mut client, &Message::scene_begin()).unwrap();
        write_message(&mut client, &Message::set(scene)).unwrap();
        write_message(&mut client, &Message::scene_end()).unwrap();
        write_message(&mut client, &Message::query(QueryType::AllNodes)).unwrap();

        match read_message(&mut client).unwrap() {
            Message::Response(response) => response,
            other => panic!("expected response, got {}", other.message_type()),
        }
    });

    assert!(wait_until(|| {
        session.update();
        client_thread.is_finished()
    }));
    let response = client_thread.join().unwrap();
    assert_eq!(response.status, ResponseStatus::Ok);
    assert_eq!(response.texts, vec!["/root/mesh1".to_string()]);
    assert_eq!(session.live().id_of("/root/mesh1"), Some(1));
    assert!(session.take_scene_update());
}

#[test]
fn test_get_answered_by_end_serve() {
    let server = Server::start(local_settings()).unwrap();
    let mut client = connect(&server);

    let get = GetMessage { flags: GetFlags::all(), ..Default::default() };
    write_message(&mut client, &Message::Get(get)).unwrap();
    assert!(wait_until(|| server.num_messages() == 1));

    let handled = server.process_messages(|ty, _| assert_eq!(ty, MessageType::Get));
    assert_eq!(handled, 1);

    server.begin_serve();
    server.serve_transform(TransformData::new("/camera_rig"));
    server.serve_mesh(triangle("/camera_rig/screen"));
    assert!(server.end_serve());

    let scene = match read_message(&mut client).unwrap() {
        Message::Set(set) => set.scene,
        other => panic!("expected set, got {}", other.message_type()),
    };
    assert_eq!(scene.objects.len(), 2);
    let mesh = scene.find_object("/camera_rig/screen").unwrap().as_mesh().unwrap();
    assert_eq!(mesh.points.len(), 3);
}

#[test]
fn test_session_serves_live_scene_to_get() {
    let mut session = SyncSession::start(local_settings()).unwrap();
    let mut client = connect(session.server());

    let mut scene = SceneData::new("scene");
    scene.upsert_object(TransformData::new("/lamp").into());
    write_message(&mut client, &Message::set(scene)).unwrap();
    write_message(&mut client, &Message::Get(GetMessage::default())).unwrap();

    let client_thread = thread::spawn(move || match read_message(&mut client).unwrap() {
        Message::Set(set) => set.scene,
        other => panic!("expected set, got {}", other.message_type()),
    });

    assert!(wait_until(|| {
        session.update();
        client_thread.is_finished()
    }));
    let served = client_thread.join().unwrap();
    assert!(served.find_object("/lamp").is_some());
}

#[test]
fn test_stop_with_unanswered_query() {
    let server = Server::start(local_settings()).unwrap();
    let mut client = connect(&server);

    write_message(&mut client, &Message::query(QueryType::ClientName)).unwrap();
    assert!(wait_until(|| server.num_messages() == 1));
    assert_eq!(server.num_connections(), 1);

    server.stop();
    assert!(!server.is_running());
    assert_eq!(server.num_connections(), 0);
    assert_eq!(server.num_messages(), 0);

    // second stop is a no-op
    server.stop();
}

#[test]
fn test_poll_reaches_connected_peers() {
    let server = Server::start(local_settings()).unwrap();
    let mut client = connect(&server);
    assert!(wait_until(|| server.num_connections() == 1));

    server.notify_poll(PollType::SceneUpdate);
    match read_message(&mut client).unwrap() {
        Message::Response(response) => {
            assert_eq!(response.status, ResponseStatus::Poll(PollType::SceneUpdate));
        }
        other => panic!("expected response, got {}", other.message_type()),
    }
}

#[test]
fn test_poll_never_blocks_on_stalled_peer() {
    let server = Server::start(local_settings()).unwrap();
    // connected but never reads
    let _stalled = TcpStream::connect(server.local_addr()).unwrap();
    assert!(wait_until(|| server.num_connections() == 1));

    let deadline = Instant::now() + Duration::from_secs(30);
    let mut slowest = Duration::ZERO;
    while server.num_connections() > 0 && Instant::now() < deadline {
        let started = Instant::now();
        server.notify_poll(PollType::SceneUpdate);
        slowest = slowest.max(started.elapsed());
    }

    assert_eq!(server.num_connections(), 0);
    assert!(slowest < Duration::from_millis(100), "notify_poll took {:?}", slowest);
    server.stop();
}

#[test]
fn test_screenshot_waits_for_capture() {
    let dir = tempfile::tempdir().unwrap();
    let shot = dir.path().join("frame.png");
    let server = Server::start(local_settings()).unwrap();
    server.set_screenshot_path(Some(shot.clone()));
    let mut client = connect(&server);

    write_message(&mut client, &Message::Screenshot(ScreenshotMessage)).unwrap();
    assert!(wait_until(|| server.num_messages() == 1));

    client.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    assert!(read_message(&mut client).is_err());

    std::fs::write(&shot, [7u8, 8, 9]).unwrap();
    server.process_messages(|ty, _| assert_eq!(ty, MessageType::Screenshot));
    assert_eq!(server.screenshot_ready(), 1);

    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    match read_message(&mut client).unwrap() {
        Message::Response(response) => assert_eq!(response.data, vec![7, 8, 9]),
        other => panic!("expected response, got {}", other.message_type()),
    }
}

#[test]
fn test_session_captures_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let settings = ServerSettings {
        screenshot_path: Some(dir.path().join("capture.bin")),
        ..local_settings()
    };
    let mut session = SyncSession::start(settings).unwrap();
    session.set_screenshot_capture(|path| std::fs::write(path, b"frame").unwrap());
    let mut client = connect(session.server());

    let client_thread = thread::spawn(move || {
        write_message(&mut client, &Message::Screenshot(ScreenshotMessage)).unwrap();
        match read_message(&mut client).unwrap() {
            Message::Response(response) => response.data,
            other => panic!("expected response, got {}", other.message_type()),
        }
    });

    assert!(wait_until(|| {
        session.update();
        client_thread.is_finished()
    }));
    assert_eq!(client_thread.join().unwrap(), b"frame".to_vec());
}

#[test]
fn test_raw_textures_written_only_after_commit() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = SyncSession::start(local_settings()).unwrap();
    session.server().set_file_root_path(Some(dir.path().to_path_buf()));
    let mut client = connect(session.server());

    let raw_scene = |id: i32, name: &str| {
        let mut scene = SceneData::new("textures");
        let mut texture = TextureData::raw_file(name, vec![id as u8; 4]);
        texture.id = id;
        scene.upsert_texture(texture);
        Message::set(scene)
    };

    write_message(&mut client, &Message::scene_begin()).unwrap();
    write_message(&mut client, &raw_scene(1, "dropped.png")).unwrap();
    // restarts the transaction, discarding the first Set
    write_message(&mut client, &Message::scene_begin()).unwrap();
    write_message(&mut client, &raw_scene(2, "kept.png")).unwrap();
    assert!(wait_until(|| {
        session.update();
        session.server().queue_stats().processed == 4
    }));
    assert!(!dir.path().join("kept.png").exists());

    write_message(&mut client, &Message::scene_end()).unwrap();
    assert!(wait_until(|| {
        session.update();
        session.live().texture(2).is_some()
    }));
    assert_eq!(std::fs::read(dir.path().join("kept.png")).unwrap(), vec![2; 4]);
    assert!(!dir.path().join("dropped.png").exists());
    assert!(session.live().texture(1).is_none());
}
