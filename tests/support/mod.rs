#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use scene_translator::host::{HostDoc, HostNode, MeshData, Plug};
use serde_json::json;

/// Routes library logs to the test output; safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn unique_temp_dir(tag: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    std::env::temp_dir().join(format!("scene-translator-{tag}-{nonce}"))
}

/// Unit quad in the xy plane bound to one shading engine.
pub fn quad(engine: &str) -> MeshData {
    MeshData {
        points: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        normals: vec![[0.0, 0.0, 1.0]; 4],
        face_counts: vec![4],
        face_indices: vec![0, 1, 2, 3],
        shading_engines: vec![engine.to_string()],
        ..Default::default()
    }
}

/// `|<name>` transform at `translate` with a `|<name>|<name>Shape` mesh below it.
pub fn add_mesh(doc: &mut HostDoc, name: &str, translate: [f64; 3], mesh: MeshData) -> String {
    let transform = format!("|{name}");
    let shape = format!("{transform}|{name}Shape");
    doc.add_node(HostNode::new(&transform, "transform").with_param("translate", json!(translate)));
    doc.add_node(HostNode::new(&shape, "mesh").with_parent(&transform).with_mesh(mesh));
    shape
}

/// A lambert wired into `engine`.
pub fn add_lambert(doc: &mut HostDoc, shader: &str, engine: &str) {
    doc.add_node(HostNode::new(shader, "lambert").with_param("color", json!([0.8, 0.2, 0.2])));
    doc.add_node(HostNode::new(engine, "shadingEngine"));
    doc.connect(Plug::new(shader, "outColor"), Plug::new(engine, "surfaceShader"));
}

pub fn add_camera(doc: &mut HostDoc, name: &str) -> String {
    let transform = format!("|{name}");
    let shape = format!("{transform}|{name}Shape");
    doc.add_node(HostNode::new(&transform, "transform").with_param("translate", json!([0.0, 0.0, 10.0])));
    doc.add_node(
        HostNode::new(&shape, "camera")
            .with_parent(&transform)
            .with_param("focalLength", json!(35.0)),
    );
    shape
}

pub fn add_point_light(doc: &mut HostDoc, name: &str) -> String {
    let transform = format!("|{name}");
    let shape = format!("{transform}|{name}Shape");
    doc.add_node(HostNode::new(&transform, "transform").with_param("translate", json!([0.0, 5.0, 0.0])));
    doc.add_node(
        HostNode::new(&shape, "pointLight")
            .with_parent(&transform)
            .with_param("intensity", json!(2.0)),
    );
    shape
}

/// One quad bound to a lambert, a point light and a camera.
pub fn basic_scene() -> HostDoc {
    let mut doc = HostDoc::new("basic");
    add_lambert(&mut doc, "lambert1", "initialShadingGroup");
    add_mesh(&mut doc, "plane", [0.0, 0.0, 0.0], quad("initialShadingGroup"));
    add_point_light(&mut doc, "key");
    add_camera(&mut doc, "persp");
    doc
}
