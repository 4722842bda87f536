use crate::{
    error::ExportResult,
    host::SceneGraph,
    session::{ExportServices, SessionMode},
    target::{
        Camera, EntityKind, EntityScope, InsertedEntities, ParamArray, TargetScene,
        TransformSequence,
    },
    utils::fmt_f64,
};

use super::{CreateContext, DagNodeExporter, FlushContext, MotionStep, world_transform};

const INCH_TO_METER: f64 = 0.0254;
const DEFAULT_HORIZONTAL_APERTURE: f64 = 1.417;
const DEFAULT_FOCAL_LENGTH_MM: f64 = 35.0;
const DEFAULT_ORTHO_WIDTH: f64 = 30.0;
const DEFAULT_NEAR_CLIP: f64 = 0.1;

pub struct CameraExporter {
    dag_path: String,
    camera: Option<Camera>,
    transform_sequence: TransformSequence,
    inserted: InsertedEntities,
}

impl CameraExporter {
    pub fn new(dag_path: &str) -> Self {
        Self {
            dag_path: dag_path.to_string(),
            camera: None,
            transform_sequence: TransformSequence::new(),
            inserted: InsertedEntities::default(),
        }
    }

    /// Cameras with `renderable` off are not exported.
    pub fn create(
        node: &str,
        host: &dyn SceneGraph,
        _mode: SessionMode,
    ) -> Option<Box<dyn DagNodeExporter>> {
        if !host.attr_bool(node, "renderable").unwrap_or(true) {
            log::debug!("[session] camera {node} is not renderable");
            return None;
        }
        Some(Box::new(Self::new(node)))
    }

    /// Projection parameters for an image of the given aspect ratio.
    pub fn projection_params(host: &dyn SceneGraph, node: &str, aspect: f64) -> (String, ParamArray) {
        let aspect = if aspect > 0.0 { aspect } else { 1.0 };
        let mut params = ParamArray::new();

        let near = host.attr_f64(node, "nearClipPlane").unwrap_or(DEFAULT_NEAR_CLIP);
        params.insert("near_z", fmt_f64(-near));

        if host.attr_bool(node, "orthographic").unwrap_or(false) {
            let width = host
                .attr_f64(node, "orthographicWidth")
                .unwrap_or(DEFAULT_ORTHO_WIDTH);
            params.insert(
                "film_dimensions",
                format!("{} {}", fmt_f64(width), fmt_f64(width / aspect)),
            );
            return ("orthographic_camera".to_string(), params);
        }

        let film_width = host
            .attr_f64(node, "horizontalFilmAperture")
            .unwrap_or(DEFAULT_HORIZONTAL_APERTURE)
            * INCH_TO_METER;
        let film_height = film_width / aspect;
        let focal_length = host
            .attr_f64(node, "focalLength")
            .unwrap_or(DEFAULT_FOCAL_LENGTH_MM)
            / 1000.0;
        let fov = 2.0 * (film_width / (2.0 * focal_length)).atan();
        params
            .insert(
                "film_dimensions",
                format!("{} {}", fmt_f64(film_width), fmt_f64(film_height)),
            )
            .insert("focal_length", fmt_f64(focal_length))
            .insert("horizontal_fov", fmt_f64(fov.to_degrees()));
        ("pinhole_camera".to_string(), params)
    }
}

impl DagNodeExporter for CameraExporter {
    fn dag_path(&self) -> &str {
        &self.dag_path
    }

    fn create_exporters(&mut self, _host: &dyn SceneGraph, _services: &mut ExportServices) {}

    fn create_entities(&mut self, host: &dyn SceneGraph, ctx: &CreateContext<'_>) -> ExportResult<()> {
        let aspect = ctx.globals.width as f64 / ctx.globals.height.max(1) as f64;
        let (model, mut params) = Self::projection_params(host, &self.dag_path, aspect);
        if ctx.globals.motion_blur {
            params
                .insert("shutter_open_time", fmt_f64(ctx.globals.shutter_open))
                .insert("shutter_close_time", fmt_f64(ctx.globals.shutter_close));
        }
        self.camera = Some(Camera {
            name: self.dag_path.clone(),
            model,
            params,
            transform_sequence: TransformSequence::new(),
        });
        Ok(())
    }

    fn export_camera_motion_step(&mut self, host: &dyn SceneGraph, step: MotionStep) {
        self.transform_sequence
            .set_transform(step.shutter_time, world_transform(host, &self.dag_path));
    }

    fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) -> ExportResult<()> {
        let Some(mut camera) = self.camera.take() else {
            return Ok(());
        };
        self.transform_sequence.optimize();
        camera.transform_sequence = self.transform_sequence.clone();
        let name = ctx.scene.scene.cameras.insert_unique(camera);
        self.inserted.record(EntityScope::Scene, EntityKind::Camera, &name);
        ctx.names.cameras.push(name);
        Ok(())
    }

    fn remove_entities(&mut self, scene: &mut TargetScene) {
        self.inserted.remove_from(scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostDoc, HostNode};
    use serde_json::json;

    #[test]
    fn pinhole_film_and_fov_from_apertures() {
        let mut doc = HostDoc::new("cam");
        doc.add_node(
            HostNode::new("|cam|camShape", "camera")
                .with_parent("|cam")
                .with_param("horizontalFilmAperture", json!(1.0))
                .with_param("focalLength", json!(25.4)),
        );
        let (model, params) = CameraExporter::projection_params(&doc, "|cam|camShape", 2.0);
        assert_eq!(model, "pinhole_camera");
        assert_eq!(params.get("film_dimensions"), Some("0.0254 0.0127"));
        assert_eq!(params.get("focal_length"), Some("0.0254"));
        let fov: f64 = params
            .get("horizontal_fov")
            .and_then(|v| v.parse().ok())
            .expect("fov");
        assert!((fov - 53.130102).abs() < 1e-4, "fov {fov}");
        assert_eq!(params.get("near_z"), Some("-0.1"));
    }

    #[test]
    fn orthographic_uses_ortho_width() {
        let mut doc = HostDoc::new("cam");
        doc.add_node(
            HostNode::new("|top|topShape", "camera")
                .with_parent("|top")
                .with_param("orthographic", json!(true))
                .with_param("orthographicWidth", json!(10.0)),
        );
        let (model, params) = CameraExporter::projection_params(&doc, "|top|topShape", 2.0);
        assert_eq!(model, "orthographic_camera");
        assert_eq!(params.get("film_dimensions"), Some("10 5"));
        assert!(!params.contains("horizontal_fov"));
    }

    #[test]
    fn non_renderable_cameras_are_skipped() {
        let mut doc = HostDoc::new("cam");
        doc.add_node(
            HostNode::new("|persp|perspShape", "camera")
                .with_parent("|persp")
                .with_param("renderable", json!(false)),
        );
        assert!(CameraExporter::create("|persp|perspShape", &doc, SessionMode::Export).is_none());
    }
}
