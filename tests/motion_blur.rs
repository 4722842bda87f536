mod support;

use std::sync::{Arc, Mutex};

use scene_translator::{
    SessionMode, SessionOptions,
    error::ExportResult,
    exporters::{CreateContext, DagNodeExporter, FlushContext, MotionStep},
    host::{HostDoc, HostNode, PointKey, SceneGraph},
    registry::ExporterRegistry,
    session::{ExportSession, options::RENDER_GLOBALS_NODE},
    target::TargetScene,
};
use serde_json::json;
use support::{add_lambert, add_mesh, init_logging, quad};

fn globals(doc: &mut HostDoc, samples: i64) {
    doc.add_node(
        HostNode::new(RENDER_GLOBALS_NODE, "appleseedRenderGlobals")
            .with_param("motionBlur", json!(true))
            .with_param("mbCameraSamples", json!(samples))
            .with_param("mbTransformSamples", json!(samples))
            .with_param("mbDeformSamples", json!(samples)),
    );
}

fn inline_export(doc: &mut HostDoc) -> ExportSession {
    let options = SessionOptions {
        export_meshes_to_files: false,
        ..Default::default()
    };
    let mut session = ExportSession::new(SessionMode::Export, options, ExporterRegistry::shared());
    session.export(doc).expect("export");
    session
}

/// A quad whose points and transform both move between frames 0 and 2.
fn moving_quad_scene(samples: i64) -> HostDoc {
    let mut doc = HostDoc::new("motion");
    globals(&mut doc, samples);
    add_lambert(&mut doc, "lambert1", "sg");
    let shape = add_mesh(&mut doc, "m", [0.0, 0.0, 0.0], quad("sg"));
    let base = quad("sg").points;
    let lifted: Vec<[f32; 3]> = base.iter().map(|p| [p[0], p[1], p[2] + 1.0]).collect();
    if let Some(node) = doc.node_mut(&shape) {
        node.point_keys = vec![
            PointKey { time: 0.0, points: base },
            PointKey { time: 2.0, points: lifted },
        ];
    }
    doc.animate("|m", "translate", vec![(0.0, json!([0.0, 0.0, 0.0])), (2.0, json!([2.0, 0.0, 0.0]))]);
    doc
}

#[test]
fn deformation_and_transform_samples_are_stored() {
    init_logging();
    let mut doc = moving_quad_scene(3);
    let session = inline_export(&mut doc);
    let main = session.project().main_assembly().expect("main assembly");

    let wrapper = main
        .assemblies
        .get("|m|mShape_assembly")
        .expect("moving shape gets a wrapper assembly");
    let object = wrapper.objects.get("|m|mShape").expect("object");
    let geometry = object.geometry.as_ref().expect("inline geometry");
    assert_eq!(geometry.motion_poses.len(), 2);
    assert!((geometry.vertices[0][2] - 0.375).abs() < 1e-6);
    assert!((geometry.motion_poses[1].vertices[0][2] - 0.625).abs() < 1e-6);

    let instance = main
        .assembly_instances
        .get("|m|mShape_assembly_inst")
        .expect("wrapper instance");
    assert_eq!(instance.transform_sequence.len(), 3);

    // The host timeline is back on the exported frame.
    assert_eq!(doc.current_time(), 1.0);
}

#[test]
fn single_sample_stores_no_motion() {
    let mut doc = moving_quad_scene(1);
    let session = inline_export(&mut doc);
    let main = session.project().main_assembly().expect("main assembly");
    let object = main.objects.get("|m|mShape").expect("object in main assembly");
    let geometry = object.geometry.as_ref().expect("inline geometry");
    assert!(geometry.motion_poses.is_empty());
    assert!(main.assemblies.is_empty());
}

static PROBE_STEPS: Mutex<Vec<(char, f64, usize, usize)>> = Mutex::new(Vec::new());

struct Probe {
    path: String,
}

fn record(kind: char, step: MotionStep) {
    if let Ok(mut steps) = PROBE_STEPS.lock() {
        steps.push((kind, step.time, step.index, step.count));
    }
}

impl DagNodeExporter for Probe {
    fn dag_path(&self) -> &str {
        &self.path
    }

    fn create_entities(&mut self, _host: &dyn SceneGraph, _ctx: &CreateContext<'_>) -> ExportResult<()> {
        Ok(())
    }

    fn export_camera_motion_step(&mut self, _host: &dyn SceneGraph, step: MotionStep) {
        record('c', step);
    }

    fn export_transform_motion_step(&mut self, _host: &dyn SceneGraph, step: MotionStep) {
        record('t', step);
    }

    fn export_shape_motion_step(&mut self, _host: &dyn SceneGraph, step: MotionStep) {
        record('s', step);
    }

    fn flush_entities(&mut self, _ctx: &mut FlushContext<'_>) -> ExportResult<()> {
        Ok(())
    }

    fn remove_entities(&mut self, _scene: &mut TargetScene) {}
}

#[test]
fn each_category_is_stepped_at_its_own_times() {
    let mut registry = ExporterRegistry::with_default_exporters();
    registry.register_dag("probe", |node, _, _| {
        let probe: Box<dyn DagNodeExporter> = Box::new(Probe {
            path: node.to_string(),
        });
        Some(probe)
    });

    let mut doc = HostDoc::new("probe");
    doc.add_node(
        HostNode::new(RENDER_GLOBALS_NODE, "appleseedRenderGlobals")
            .with_param("motionBlur", json!(true))
            .with_param("mbCameraSamples", json!(1))
            .with_param("mbTransformSamples", json!(2))
            .with_param("mbDeformSamples", json!(5)),
    );
    doc.add_node(HostNode::new("|p", "transform"));
    doc.add_node(HostNode::new("|p|probe", "probe").with_parent("|p"));

    let options = SessionOptions {
        frame: Some(10.0),
        ..Default::default()
    };
    let mut session = ExportSession::new(SessionMode::Export, options, Arc::new(registry));
    session.export(&mut doc).expect("export");

    let steps = PROBE_STEPS.lock().expect("steps").clone();
    let of = |kind: char| -> Vec<(f64, usize, usize)> {
        steps
            .iter()
            .filter(|s| s.0 == kind)
            .map(|s| (s.1, s.2, s.3))
            .collect()
    };
    assert_eq!(of('c'), vec![(10.0, 0, 1)]);
    assert_eq!(of('t'), vec![(9.75, 0, 2), (10.25, 1, 2)]);
    assert_eq!(
        of('s'),
        vec![
            (9.75, 0, 5),
            (9.875, 1, 5),
            (10.0, 2, 5),
            (10.125, 3, 5),
            (10.25, 4, 5)
        ]
    );
}
