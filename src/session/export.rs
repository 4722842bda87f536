use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use glam::{DMat4, DVec3};

use super::{ExportServices, RenderGlobals, SessionMode, SessionOptions};
use crate::{
    error::{ExportError, ExportResult},
    exporters::{Aabb, CreateContext, DagNodeExporter, FlushContext, MotionStep, ResolvedNames},
    host::SceneGraph,
    instancing::create_instances,
    motion::MotionBlurSampleTimes,
    registry::ExporterRegistry,
    target::{MAIN_ASSEMBLY_INSTANCE, TargetScene, Transform},
};

/// One export pass: builds the exporters for a host scene and flushes them into a fresh
/// target document.
pub struct ExportSession {
    mode: SessionMode,
    options: SessionOptions,
    registry: Arc<ExporterRegistry>,
    project: TargetScene,
    project_dir: Option<PathBuf>,
    globals: RenderGlobals,
    motion: MotionBlurSampleTimes,
    services: ExportServices,
    exporters: Vec<Box<dyn DagNodeExporter>>,
    names: ResolvedNames,
    bounds: Option<Aabb>,
}

fn check_abort(host: &dyn SceneGraph) -> ExportResult<()> {
    if host.is_interrupt_requested() {
        log::info!("[session] abort requested");
        return Err(ExportError::AbortRequested);
    }
    Ok(())
}

impl ExportSession {
    pub fn new(mode: SessionMode, options: SessionOptions, registry: Arc<ExporterRegistry>) -> Self {
        Self {
            mode,
            options,
            registry,
            project: TargetScene::new_project("project"),
            project_dir: None,
            globals: RenderGlobals::default(),
            motion: MotionBlurSampleTimes::current_frame(0.0),
            services: ExportServices::new(),
            exporters: Vec::new(),
            names: ResolvedNames::default(),
            bounds: None,
        }
    }

    /// Directory geometry files are written below when exporting to a project file.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn project(&self) -> &TargetScene {
        &self.project
    }

    /// Moves the document out, leaving an empty project behind. The session can still
    /// remove its entities from the document afterwards.
    pub fn take_project(&mut self) -> TargetScene {
        std::mem::take(&mut self.project)
    }

    pub fn globals(&self) -> &RenderGlobals {
        &self.globals
    }

    pub fn motion(&self) -> &MotionBlurSampleTimes {
        &self.motion
    }

    pub fn services(&self) -> &ExportServices {
        &self.services
    }

    pub fn exporters(&self) -> &[Box<dyn DagNodeExporter>] {
        &self.exporters
    }

    pub fn exporter(&self, dag_path: &str) -> Option<&dyn DagNodeExporter> {
        self.exporters
            .iter()
            .find(|e| e.dag_path() == dag_path)
            .map(|e| e.as_ref())
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// Runs every export phase against `host`, checking for an abort request between
    /// phases. The host's time is moved while sampling motion and restored afterwards.
    pub fn export(&mut self, host: &mut dyn SceneGraph) -> ExportResult<()> {
        let frame = self.options.frame.unwrap_or_else(|| host.current_time());
        log::info!("[session] {:?} export of frame {frame}", self.mode);

        self.globals = RenderGlobals::from_host(&*host, &self.options);
        self.globals
            .apply_to(&mut self.project, None, &self.options.aovs);
        check_abort(&*host)?;

        self.motion = if self.mode == SessionMode::ProgressiveRender {
            MotionBlurSampleTimes::current_frame(frame)
        } else {
            MotionBlurSampleTimes::from_globals(frame, &self.globals)
        };
        host.set_time(frame);
        check_abort(&*host)?;

        self.create_dag_exporters(&*host);
        check_abort(&*host)?;

        for exporter in &mut self.exporters {
            exporter.create_exporters(&*host, &mut self.services);
        }
        check_abort(&*host)?;

        self.create_entities(&*host)?;
        check_abort(&*host)?;

        if self.options.enable_instancing && self.mode != SessionMode::ProgressiveRender {
            create_instances(&*host, &mut self.exporters);
            check_abort(&*host)?;
        }

        let result = self.export_motion_steps(host);
        host.set_time(frame);
        result?;
        check_abort(&*host)?;

        self.flush_entities()?;
        check_abort(&*host)?;

        self.post_process();
        Ok(())
    }

    fn create_dag_exporters(&mut self, host: &dyn SceneGraph) {
        let nodes = if self.options.selection_only {
            selected_subtrees(host)
        } else {
            host.dag_nodes()
        };
        for node in nodes {
            match self.registry.create_dag(&node, host, self.mode) {
                Ok(Some(exporter)) => self.exporters.push(exporter),
                Ok(None) => {}
                Err(e) => log::warn!("[session] skipping {node}: {e}"),
            }
        }
        log::debug!("[session] {} dag exporters", self.exporters.len());
    }

    fn create_entities(&mut self, host: &dyn SceneGraph) -> ExportResult<()> {
        self.services.create_alpha_map_entities(host);
        self.services
            .create_network_entities(host, &self.registry)?;

        let ctx = CreateContext {
            options: &self.options,
            globals: &self.globals,
            motion: &self.motion,
            mode: self.mode,
        };
        for exporter in &mut self.exporters {
            exporter.create_entities(host, &ctx)?;
        }
        Ok(())
    }

    fn export_motion_steps(&mut self, host: &mut dyn SceneGraph) -> ExportResult<()> {
        let motion = &self.motion;
        for &time in &motion.all_times {
            host.set_time(time);
            check_abort(&*host)?;
            let shutter_time = motion.normalized_time(time);
            let step = |times: &[f64]| {
                times.iter().position(|&t| t == time).map(|index| MotionStep {
                    time,
                    shutter_time,
                    index,
                    count: times.len(),
                })
            };
            let camera = step(&motion.camera_times);
            let transform = step(&motion.transform_times);
            let shape = step(&motion.deformation_times);

            for exporter in &mut self.exporters {
                if !exporter.supports_motion_blur() {
                    continue;
                }
                if let Some(s) = camera {
                    exporter.export_camera_motion_step(&*host, s);
                }
                if let Some(s) = transform {
                    exporter.export_transform_motion_step(&*host, s);
                }
                if let Some(s) = shape {
                    exporter.export_shape_motion_step(&*host, s);
                }
            }
        }
        Ok(())
    }

    fn flush_entities(&mut self) -> ExportResult<()> {
        let mut ctx = FlushContext {
            scene: &mut self.project,
            names: &mut self.names,
            project_dir: self.project_dir.as_deref(),
            mode: self.mode,
        };
        self.services.flush_entities(&mut ctx);
        for exporter in &mut self.exporters {
            exporter.flush_entities(&mut ctx)?;
        }
        Ok(())
    }

    fn post_process(&mut self) {
        let scale = self.globals.scene_scale;
        if scale != 1.0 {
            let scaling = Transform::from_matrix(DMat4::from_scale(DVec3::splat(scale)));
            if let Some(instance) = self
                .project
                .scene
                .assembly_instances
                .get_mut(MAIN_ASSEMBLY_INSTANCE)
            {
                instance.transform_sequence.premultiply(&scaling);
            }
        }

        let environments = &self.names.environments;
        let chosen = self
            .globals
            .env_light
            .as_deref()
            .and_then(|light| environments.iter().find(|e| e.dag_path == light))
            .or_else(|| environments.first());
        if let Some(env) = chosen {
            let params = &mut self.project.scene.environment.params;
            params.insert("environment_edf", env.edf.as_str());
            params.insert("environment_shader", env.shader.as_str());
        }

        match self.frame_camera() {
            Some(camera) => {
                self.project.frame.params.insert("camera", camera);
            }
            None => log::warn!("[session] no renderable camera found"),
        }

        self.bounds = self
            .exporters
            .iter()
            .filter(|e| e.as_shape().is_some())
            .filter_map(|e| e.bounding_box())
            .reduce(|a, b| a.union(&b));
        if let Some(b) = self.bounds {
            log::info!("[session] scene bounds {} .. {}", b.min, b.max);
        }
    }

    /// The requested camera when it was exported, addressed by its shape or its
    /// transform; otherwise the first camera.
    fn frame_camera(&self) -> Option<String> {
        let cameras = &self.names.cameras;
        if let Some(requested) = self.options.camera.as_deref() {
            let prefix = format!("{requested}|");
            if let Some(found) = cameras
                .iter()
                .find(|c| c.as_str() == requested || c.starts_with(&prefix))
            {
                return Some(found.clone());
            }
            log::warn!("[session] camera {requested} was not exported, using the first camera");
        }
        cameras.first().cloned()
    }

    /// Removes every entity this session inserted into `scene`, most recent stage first.
    pub fn remove_entities(&mut self, scene: &mut TargetScene) {
        for exporter in self.exporters.iter_mut().rev() {
            exporter.remove_entities(scene);
        }
        self.services.remove_entities(scene);
    }

    /// Writes the project; the geometry directory was populated during flush.
    pub fn write_project(&self, path: &Path) -> ExportResult<()> {
        self.project.write_project(path)?;
        log::info!("[session] wrote {}", path.display());
        Ok(())
    }
}

/// Selected nodes and all of their DAG descendants, each once, in selection order.
fn selected_subtrees(host: &dyn SceneGraph) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for root in host.selection() {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !seen.insert(node.clone()) {
                continue;
            }
            let mut children = host.children(&node);
            children.reverse();
            stack.extend(children);
            out.push(node);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostDoc, HostNode};
    use serde_json::json;

    #[test]
    fn selection_includes_descendants_once() {
        let mut doc = HostDoc::new("sel");
        doc.add_node(HostNode::new("|a", "transform"));
        doc.add_node(HostNode::new("|a|b", "transform").with_parent("|a"));
        doc.add_node(HostNode::new("|a|b|bShape", "mesh").with_parent("|a|b"));
        doc.add_node(HostNode::new("|c", "transform"));
        doc.selection = vec!["|a".to_string(), "|a|b".to_string()];
        assert_eq!(selected_subtrees(&doc), vec!["|a", "|a|b", "|a|b|bShape"]);
    }

    #[test]
    fn requested_camera_matches_its_transform() {
        let mut doc = HostDoc::new("cams");
        for cam in ["|front", "|persp"] {
            doc.add_node(HostNode::new(cam, "transform"));
            doc.add_node(
                HostNode::new(format!("{cam}{cam}Shape"), "camera")
                    .with_parent(cam)
                    .with_param("focalLength", json!(35.0)),
            );
        }
        let options = SessionOptions {
            camera: Some("|persp".to_string()),
            ..Default::default()
        };
        let mut session = ExportSession::new(SessionMode::Export, options, ExporterRegistry::shared());
        session.export(&mut doc).expect("export");
        assert_eq!(
            session.project().frame.params.get("camera"),
            Some("|persp|perspShape")
        );
        assert_eq!(session.project().scene.cameras.len(), 2);
    }

    #[test]
    fn scene_scale_scales_the_main_assembly_instance() {
        let mut doc = HostDoc::new("scale");
        doc.add_node(
            HostNode::new(crate::session::options::RENDER_GLOBALS_NODE, "appleseedRenderGlobals")
                .with_param("sceneScale", json!(2.0)),
        );
        let mut session =
            ExportSession::new(SessionMode::Export, SessionOptions::default(), ExporterRegistry::shared());
        session.export(&mut doc).expect("export");
        let instance = session
            .project()
            .scene
            .assembly_instances
            .get(MAIN_ASSEMBLY_INSTANCE)
            .expect("main instance");
        let m = instance.transform_sequence.earliest().matrix;
        assert!((m.x_axis.x - 2.0).abs() < 1e-12);
    }
}
