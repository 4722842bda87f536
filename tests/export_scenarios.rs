mod support;

use scene_translator::{
    SessionMode, SessionOptions,
    registry::ExporterRegistry,
    session::ExportSession,
    target::MAIN_ASSEMBLY,
};
use support::{add_lambert, add_mesh, basic_scene, init_logging, quad};

fn inline_options() -> SessionOptions {
    SessionOptions {
        export_meshes_to_files: false,
        ..Default::default()
    }
}

fn export(doc: &mut scene_translator::host::HostDoc, options: SessionOptions) -> ExportSession {
    let mut session = ExportSession::new(SessionMode::Export, options, ExporterRegistry::shared());
    session.export(doc).expect("export should succeed");
    session
}

#[test]
fn mesh_light_and_camera_scene() {
    init_logging();
    let mut doc = basic_scene();
    let session = export(&mut doc, inline_options());
    let project = session.project();
    let main = project.main_assembly().expect("main assembly");

    assert_eq!(main.objects.len(), 1);
    assert_eq!(main.object_instances.len(), 1);
    assert_eq!(main.materials.len(), 1);
    assert_eq!(main.lights.len(), 1);
    assert_eq!(project.scene.cameras.len(), 1);

    assert_eq!(main.shader_groups.len(), 1);
    let group = main
        .shader_groups
        .get("lambert1_shader_group")
        .expect("lambert network");
    let shaders: Vec<&str> = group.shaders.iter().map(|s| s.shader.as_str()).collect();
    assert_eq!(shaders, vec!["as_maya_lambert", "as_maya_closure2Surface"]);

    let instance = main
        .object_instances
        .get("|plane|planeShape_instance")
        .expect("object instance");
    assert_eq!(instance.object, "|plane|planeShape");
    assert_eq!(
        instance.front_materials.get("initialShadingGroup").map(String::as_str),
        Some("initialShadingGroup_material")
    );

    let camera = project.scene.cameras.get("|persp|perspShape").expect("camera");
    assert_eq!(camera.transform_sequence.len(), 1);
    assert_eq!(project.frame.params.get("camera"), Some("|persp|perspShape"));
    assert!(session.bounds().is_some());
}

#[test]
fn identical_meshes_share_one_object() {
    init_logging();
    let mut doc = scene_translator::host::HostDoc::new("twins");
    add_lambert(&mut doc, "lambert1", "sg");
    add_mesh(&mut doc, "a", [0.0, 0.0, 0.0], quad("sg"));
    add_mesh(&mut doc, "b", [3.0, 0.0, 0.0], quad("sg"));

    let session = export(&mut doc, inline_options());
    let main = session.project().main_assembly().expect("main assembly");

    let object_count: usize = main.objects.len()
        + main
            .assemblies
            .iter()
            .map(|a| a.objects.len())
            .sum::<usize>();
    assert_eq!(object_count, 1);
    assert_eq!(main.assemblies.len(), 1);
    assert!(main.assemblies.contains("|a|aShape_assembly"));

    let master = main
        .assembly_instances
        .get("|a|aShape_assembly_inst")
        .expect("master instance");
    let copy = main
        .assembly_instances
        .get("|b|bShape_assembly_inst")
        .expect("instance of the master");
    assert_eq!(master.assembly, "|a|aShape_assembly");
    assert_eq!(copy.assembly, "|a|aShape_assembly");
    let x = copy.transform_sequence.earliest().matrix.w_axis.x;
    assert!((x - 3.0).abs() < 1e-9);
}

#[test]
fn different_meshes_stay_independent() {
    let mut doc = scene_translator::host::HostDoc::new("pair");
    add_lambert(&mut doc, "lambert1", "sg");
    add_mesh(&mut doc, "a", [0.0, 0.0, 0.0], quad("sg"));
    let mut bigger = quad("sg");
    bigger.points[2] = [2.0, 2.0, 0.0];
    add_mesh(&mut doc, "b", [3.0, 0.0, 0.0], bigger);

    let session = export(&mut doc, inline_options());
    let main = session.project().main_assembly().expect("main assembly");
    assert_eq!(main.objects.len(), 2);
    assert!(main.assemblies.is_empty());
}

#[test]
fn instancing_can_be_disabled() {
    let mut doc = scene_translator::host::HostDoc::new("twins");
    add_lambert(&mut doc, "lambert1", "sg");
    add_mesh(&mut doc, "a", [0.0, 0.0, 0.0], quad("sg"));
    add_mesh(&mut doc, "b", [3.0, 0.0, 0.0], quad("sg"));

    let options = SessionOptions {
        enable_instancing: false,
        ..inline_options()
    };
    let session = export(&mut doc, options);
    let main = session.project().main_assembly().expect("main assembly");
    assert_eq!(main.objects.len(), 2);
}

#[test]
fn selection_limits_exported_nodes() {
    let mut doc = basic_scene();
    doc.selection = vec!["|plane".to_string()];
    let options = SessionOptions {
        selection_only: true,
        ..inline_options()
    };
    let session = export(&mut doc, options);
    let project = session.project();
    let main = project.main_assembly().expect("main assembly");
    assert_eq!(main.objects.len(), 1);
    assert!(main.lights.is_empty());
    assert!(project.scene.cameras.is_empty());
    assert_eq!(project.frame.params.get("camera"), None);
}

#[test]
fn unsupported_nodes_are_skipped() {
    let mut doc = basic_scene();
    doc.add_node(scene_translator::host::HostNode::new("|curve", "transform"));
    doc.add_node(
        scene_translator::host::HostNode::new("|curve|curveShape", "nurbsCurve").with_parent("|curve"),
    );
    let session = export(&mut doc, inline_options());
    assert!(session.exporter("|curve|curveShape").is_none());
    assert!(session.exporter("|plane|planeShape").is_some());
    assert!(session.project().scene.assemblies.contains(MAIN_ASSEMBLY));
}
