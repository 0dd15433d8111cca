//! Integration tests for the threaded asset server

use std::path::Path;
use std::time::Duration;

use void_asset::*;

const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

fn server_for(dir: &Path) -> AssetServer {
    AssetServer::new(AssetServerConfig {
        asset_dir: dir.to_path_buf(),
        worker_threads: 1,
        cache_models: true,
    })
    .expect("server")
}

fn next_terminal(server: &AssetServer) -> AssetEvent {
    loop {
        let event = server
            .wait_event(Duration::from_secs(10))
            .expect("timed out waiting for asset event");
        if event.is_terminal() {
            return event;
        }
    }
}

#[test]
fn test_model_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("a")).unwrap();
    std::fs::write(dir.path().join("a/box.obj"), TRIANGLE).unwrap();

    let server = server_for(dir.path());
    let request = server
        .load_model("a/box.obj", &ImportSettings::default(), true)
        .unwrap();

    match next_terminal(&server) {
        AssetEvent::ModelLoaded { request: r, path, model } => {
            assert_eq!(r, request);
            assert!(path.ends_with("box.obj"));
            assert_eq!(model.triangle_count(), 1);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_missing_model_reports_failure() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(dir.path());

    let request = server
        .load_model("nowhere/ghost.obj", &ImportSettings::default(), false)
        .unwrap();

    match next_terminal(&server) {
        AssetEvent::ModelFailed { request: r, error, .. } => {
            assert_eq!(r, request);
            assert!(matches!(error, LoadError::NotFound(_)));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_issuance_rejects_bad_paths() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(dir.path());
    let settings = ImportSettings::default();

    assert!(matches!(
        server.load_model("", &settings, true),
        Err(LoadError::InvalidPath(_))
    ));
    assert!(matches!(
        server.load_model("model.fbx", &settings, true),
        Err(LoadError::UnsupportedFormat(_))
    ));
    assert!(server.poll_events().is_empty());
}

#[test]
fn test_cached_model_is_shared() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tri.obj"), TRIANGLE).unwrap();
    let server = server_for(dir.path());
    let settings = ImportSettings::default();

    server.load_model("tri.obj", &settings, true).unwrap();
    let first = match next_terminal(&server) {
        AssetEvent::ModelLoaded { model, .. } => model,
        other => panic!("unexpected event {:?}", other),
    };
    assert_eq!(server.cached_count(), 1);

    server.load_model("tri.obj", &settings, true).unwrap();
    let second = match next_terminal(&server) {
        AssetEvent::ModelLoaded { model, .. } => model,
        other => panic!("unexpected event {:?}", other),
    };
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    server.clear_cache();
    assert_eq!(server.cached_count(), 0);
}

#[test]
fn test_texture_failure_precedes_model() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("box.mtl"), "newmtl m\nmap_Kd gone.png\n").unwrap();
    std::fs::write(
        dir.path().join("box.obj"),
        format!("mtllib box.mtl\nusemtl m\n{}", TRIANGLE),
    )
    .unwrap();

    let server = server_for(dir.path());
    let request = server
        .load_model("box.obj", &ImportSettings::default(), false)
        .unwrap();

    let first = server.wait_event(Duration::from_secs(10)).unwrap();
    assert!(matches!(first, AssetEvent::TextureFailed { .. }));
    assert_eq!(first.request(), request);

    let second = next_terminal(&server);
    assert!(matches!(second, AssetEvent::ModelLoaded { .. }));
}

#[test]
fn test_texture_open_failure() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(dir.path());
    assert!(matches!(
        server.load_texture("sky.png"),
        Err(LoadError::NotFound(_))
    ));
    assert!(matches!(
        server.load_cubemap_texture("sky.zip"),
        Err(LoadError::NotFound(_))
    ));
}

/// Non-indexed triangle with positions only
fn write_gltf_triangle(dir: &Path) {
    let bin: Vec<u8> = [0.0f32, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    std::fs::write(dir.join("tri.bin"), &bin).unwrap();

    let document = serde_json::json!({
        "asset": { "version": "2.0" },
        "buffers": [{ "uri": "tri.bin", "byteLength": bin.len() }],
        "bufferViews": [{ "buffer": 0, "byteLength": bin.len() }],
        "accessors": [{
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [0.0, 0.0, 0.0], "max": [2.0, 2.0, 0.0]
        }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }]
    });
    std::fs::write(dir.join("tri.gltf"), document.to_string()).unwrap();
}

#[test]
fn test_gltf_model_load() {
    let dir = tempfile::tempdir().unwrap();
    write_gltf_triangle(dir.path());

    let server = server_for(dir.path());
    let request = server
        .load_model("tri.gltf", &ImportSettings::default(), false)
        .unwrap();

    let event = next_terminal(&server);
    assert_eq!(event.request(), request);
    assert!(event.path().ends_with("tri.gltf"));
    match event {
        AssetEvent::ModelLoaded { model, .. } => {
            assert_eq!(model.triangle_count(), 1);
            assert_eq!(model.meshes[0].vertices[0].normal, [0.0, 0.0, 1.0]);
            assert_eq!(model.bounds.center(), [1.0, 1.0, 0.0]);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(server.pending_count(), 0);
    assert_eq!(server.cached_count(), 0);
}
