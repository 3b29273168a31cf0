//! Integration tests for protocol handling and fence sequencing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use meshsync_ir::*;
use meshsync_scene::{Identifier, MeshData, SceneData, SubmeshData, TransformData, UNBOUNDED_SPLIT_UNIT};

fn transform_set(paths: &[(&str, f32)]) -> Message {
    let mut scene = SceneData::new("batch");
    for (path, x) in paths {
        scene.upsert_object(TransformData::new(*path).with_position([*x, 0.0, 0.0]).into());
    }
    Message::set(scene)
}

fn query(seq: &mut SceneSequencer, query_type: QueryType) -> Vec<String> {
    let (responder, receiver) = Responder::channel();
    let message = Message::Query(QueryMessage {
        query_type,
        responder: Some(responder),
    });
    seq.handle(&message);
    receiver.wait(Duration::from_millis(10), || false).unwrap()
}

#[test]
fn test_end_to_end_set_query_delete() {
    let mut seq = SceneSequencer::new("receiver", UNBOUNDED_SPLIT_UNIT);

    let mut mesh = MeshData::new("/root/mesh1");
    mesh.points = vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    mesh.add_submesh(SubmeshData::triangles(0, vec![0, 1, 2]));
    let mut scene = SceneData::new("scene");
    scene.upsert_object(mesh.into());

    seq.handle(&Message::scene_begin());
    seq.handle(&Message::set(scene));
    seq.handle(&Message::scene_end());

    let id = seq.live().id_of("/root/mesh1").unwrap();
    assert_eq!(id, 1);
    assert_eq!(query(&mut seq, QueryType::AllNodes), vec!["/root/mesh1".to_string()]);

    seq.handle(&Message::Delete(DeleteMessage {
        targets: vec![Identifier::new(1, "mesh1")],
        materials: vec![],
    }));
    assert!(query(&mut seq, QueryType::AllNodes).is_empty());
}

#[test]
fn test_client_name_and_root_nodes() {
    let mut seq = SceneSequencer::new("unity-editor", UNBOUNDED_SPLIT_UNIT);
    seq.handle(&transform_set(&[("/root", 0.0), ("/root/child", 1.0), ("/lamp", 2.0)]));
    assert_eq!(query(&mut seq, QueryType::ClientName), vec!["unity-editor".to_string()]);
    assert_eq!(
        query(&mut seq, QueryType::RootNodes),
        vec!["/lamp".to_string(), "/root".to_string()]
    );
}

#[test]
fn test_identity_stable_across_sets() {
    let mut seq = SceneSequencer::new("receiver", UNBOUNDED_SPLIT_UNIT);
    seq.handle(&transform_set(&[("/a", 0.0), ("/b", 0.0)]));
    let first = seq.live().id_of("/a").unwrap();
    seq.handle(&transform_set(&[("/a", 5.0)]));
    let live = seq.live();
    assert_eq!(live.id_of("/a"), Some(first));
    assert_eq!(live.get("/a").unwrap().transform().position[0], 5.0);
    assert_ne!(live.id_of("/b"), Some(first));
}

#[test]
fn test_fence_atomic_for_concurrent_reader() {
    let mut seq = SceneSequencer::new("receiver", UNBOUNDED_SPLIT_UNIT);
    seq.handle(&transform_set(&[("/A", 0.0), ("/B", 0.0)]));

    let reader = seq.reader();
    let done = Arc::new(AtomicBool::new(false));
    let observer = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut torn = 0;
            while !done.load(Ordering::Acquire) {
                let snapshot = reader.snapshot();
                let a = snapshot.get("/A").unwrap().transform().position[0];
                let b = snapshot.get("/B").unwrap().transform().position[0];
                if a != b {
                    torn += 1;
                }
            }
            torn
        })
    };

    for round in 1..200 {
        let x = round as f32;
        seq.handle(&Message::scene_begin());
        seq.handle(&transform_set(&[("/A", x)]));
        seq.handle(&transform_set(&[("/B", x)]));
        seq.handle(&Message::scene_end());
    }
    done.store(true, Ordering::Release);

    assert_eq!(observer.join().unwrap(), 0);
    assert_eq!(seq.live().get("/B").unwrap().transform().position[0], 199.0);
}

#[test]
fn test_forward_reference_within_transaction() {
    let mut seq = SceneSequencer::new("receiver", UNBOUNDED_SPLIT_UNIT);
    let mut first = SceneData::new("1");
    first.upsert_object(TransformData::new("/instance").with_reference("/prototype").into());
    let mut second = SceneData::new("2");
    second.upsert_object(TransformData::new("/prototype").into());

    seq.handle(&Message::scene_begin());
    seq.handle(&Message::set(first));
    seq.handle(&Message::set(second));
    seq.handle(&Message::scene_end());

    let live = seq.live();
    assert_eq!(live.resolve_reference("/instance").map(|e| e.path().to_string()), Some("/prototype".into()));
}

#[test]
fn test_messages_through_codec() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, &Message::scene_begin()).unwrap();
    write_message(&mut buffer, &transform_set(&[("/x", 1.0)])).unwrap();
    write_message(&mut buffer, &Message::scene_end()).unwrap();

    let mut seq = SceneSequencer::new("receiver", UNBOUNDED_SPLIT_UNIT);
    let mut cursor = std::io::Cursor::new(buffer);
    while let Ok(message) = read_message(&mut cursor) {
        seq.handle(&message);
    }
    assert!(seq.live().get("/x").is_some());
    assert_eq!(seq.commits(), 1);
}
