//! Environment lights: the physically modelled sky and the lat-long sky dome.

use crate::{
    error::ExportResult,
    host::SceneGraph,
    target::{
        EntityKind, EntityScope, EnvironmentEdf, EnvironmentShader, InsertedEntities, Light,
        ParamArray, TargetScene, Texture, TextureInstance, TransformSequence,
    },
    utils::{fmt_color, fmt_f32},
};

use super::{
    CreateContext, DagNodeExporter, EnvironmentNames, FlushContext, MotionStep, is_renderable,
    world_transform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkyModel {
    PhysicalSky,
    SkyDome,
}

pub struct EnvLightExporter {
    dag_path: String,
    model: SkyModel,
    edf: Option<EnvironmentEdf>,
    sun: Option<Light>,
    /// Sky dome map texture and its instance.
    map: Option<(Texture, TextureInstance)>,
    transform_sequence: TransformSequence,
    inserted: InsertedEntities,
}

impl EnvLightExporter {
    pub fn new(dag_path: &str, model: SkyModel) -> Self {
        Self {
            dag_path: dag_path.to_string(),
            model,
            edf: None,
            sun: None,
            map: None,
            transform_sequence: TransformSequence::new(),
            inserted: InsertedEntities::default(),
        }
    }

    pub fn create(
        node: &str,
        host: &dyn SceneGraph,
        model: SkyModel,
    ) -> Option<Box<dyn DagNodeExporter>> {
        if !is_renderable(host, node) {
            return None;
        }
        Some(Box::new(Self::new(node, model)))
    }

    pub fn model(&self) -> SkyModel {
        self.model
    }

    fn physical_sky(&mut self, host: &dyn SceneGraph) -> (String, ParamArray) {
        let node = self.dag_path.as_str();
        let value = |attr: &str, default: f32| fmt_f32(host.attr_f32(node, attr).unwrap_or(default));
        let turbidity = value("turbidity", 4.0);

        let mut params = ParamArray::new();
        params
            .insert("sun_theta", value("sunTheta", 45.0))
            .insert("sun_phi", value("sunPhi", 0.0))
            .insert("turbidity", turbidity.as_str())
            .insert("turbidity_multiplier", value("turbidityScale", 2.0))
            .insert("luminance_multiplier", value("luminanceScale", 1.0))
            .insert("luminance_gamma", value("luminanceGamma", 1.0))
            .insert("saturation_multiplier", value("saturationScale", 1.0))
            .insert("horizon_shift", value("horizonShift", 0.0))
            .insert("ground_albedo", value("groundAlbedo", 0.3));

        if host.attr_bool(node, "sunEnable").unwrap_or(true) {
            let mut sun_params = ParamArray::new();
            sun_params
                .insert("environment_edf", node)
                .insert("turbidity", turbidity)
                .insert("radiance_multiplier", value("sunRadianceScale", 1.0))
                .insert("size_multiplier", value("sunSizeScale", 1.0));
            self.sun = Some(Light {
                name: format!("{node}_sun_light"),
                model: "sun_light".to_string(),
                params: sun_params,
                transform: world_transform(host, node),
            });
        }
        ("hosek_environment_edf".to_string(), params)
    }

    fn sky_dome(&mut self, host: &dyn SceneGraph) -> (String, ParamArray) {
        let node = self.dag_path.as_str();
        let value = |attr: &str, default: f32| fmt_f32(host.attr_f32(node, attr).unwrap_or(default));

        let mut params = ParamArray::new();
        params
            .insert("radiance_multiplier", value("intensity", 1.0))
            .insert("exposure", value("exposure", 0.0))
            .insert("horizontal_shift", value("hShift", 0.0))
            .insert("vertical_shift", value("vShift", 0.0));

        match host.attr_string(node, "map").filter(|m| !m.is_empty()) {
            Some(file) => {
                let texture = Texture {
                    name: format!("{node}_texture"),
                    model: "disk_texture_2d".to_string(),
                    params: ParamArray::new()
                        .with("filename", file)
                        .with("color_space", "linear_rgb"),
                };
                let instance = TextureInstance {
                    name: format!("{node}_texture_instance"),
                    params: ParamArray::new(),
                    texture: texture.name.clone(),
                };
                self.map = Some((texture, instance));
            }
            None => {
                let color = host.attr_color(node, "color").unwrap_or([1.0, 1.0, 1.0]);
                params.insert("radiance", fmt_color(color));
            }
        }
        ("latlong_map_environment_edf".to_string(), params)
    }
}

impl DagNodeExporter for EnvLightExporter {
    fn dag_path(&self) -> &str {
        &self.dag_path
    }

    fn create_entities(&mut self, host: &dyn SceneGraph, _ctx: &CreateContext<'_>) -> ExportResult<()> {
        let (model, params) = match self.model {
            SkyModel::PhysicalSky => self.physical_sky(host),
            SkyModel::SkyDome => self.sky_dome(host),
        };
        self.edf = Some(EnvironmentEdf {
            name: self.dag_path.clone(),
            model,
            params,
            transform_sequence: TransformSequence::new(),
        });
        Ok(())
    }

    fn export_transform_motion_step(&mut self, host: &dyn SceneGraph, step: MotionStep) {
        self.transform_sequence
            .set_transform(step.shutter_time, world_transform(host, &self.dag_path));
    }

    fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) -> ExportResult<()> {
        let Some(mut edf) = self.edf.take() else {
            return Ok(());
        };
        let scene = &mut ctx.scene.scene;

        if let Some((texture, mut instance)) = self.map.take() {
            let texture_name = scene.textures.insert_unique(texture);
            instance.texture = texture_name.clone();
            let instance_name = scene.texture_instances.insert_unique(instance);
            edf.params.insert("radiance", instance_name.as_str());
            self.inserted
                .record(EntityScope::Scene, EntityKind::Texture, &texture_name);
            self.inserted
                .record(EntityScope::Scene, EntityKind::TextureInstance, &instance_name);
        }

        self.transform_sequence.optimize();
        edf.transform_sequence = self.transform_sequence.clone();
        let edf_name = scene.environment_edfs.insert_unique(edf);
        let shader_name = scene.environment_shaders.insert_unique(EnvironmentShader {
            name: format!("{}_shader", self.dag_path),
            model: "edf_environment_shader".to_string(),
            params: ParamArray::new().with("environment_edf", edf_name.as_str()),
        });
        self.inserted
            .record(EntityScope::Scene, EntityKind::EnvironmentEdf, &edf_name);
        self.inserted
            .record(EntityScope::Scene, EntityKind::EnvironmentShader, &shader_name);

        if let Some(mut sun) = self.sun.take() {
            sun.params.insert("environment_edf", edf_name.as_str());
            let sun_name = ctx.scene.main_assembly_mut().lights.insert_unique(sun);
            self.inserted
                .record(EntityScope::MainAssembly, EntityKind::Light, &sun_name);
        }

        ctx.names.environments.push(EnvironmentNames {
            dag_path: self.dag_path.clone(),
            edf: edf_name,
            shader: shader_name,
        });
        Ok(())
    }

    fn remove_entities(&mut self, scene: &mut TargetScene) {
        self.inserted.remove_from(scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exporters::ResolvedNames,
        host::{HostDoc, HostNode},
        motion::MotionBlurSampleTimes,
        session::{RenderGlobals, SessionMode, SessionOptions},
    };
    use serde_json::json;

    fn export(doc: &HostDoc, node: &str, model: SkyModel) -> (TargetScene, ResolvedNames) {
        let options = SessionOptions::default();
        let globals = RenderGlobals::default();
        let motion = MotionBlurSampleTimes::current_frame(1.0);
        let ctx = CreateContext {
            options: &options,
            globals: &globals,
            motion: &motion,
            mode: SessionMode::Export,
        };
        let mut exporter = EnvLightExporter::new(node, model);
        exporter.create_entities(doc, &ctx).expect("create");
        let mut scene = TargetScene::new_project("env");
        let mut names = ResolvedNames::default();
        {
            let mut flush = FlushContext {
                scene: &mut scene,
                names: &mut names,
                project_dir: None,
                mode: SessionMode::Export,
            };
            exporter.flush_entities(&mut flush).expect("flush");
        }
        (scene, names)
    }

    #[test]
    fn physical_sky_exports_sun_only_when_enabled() {
        let mut doc = HostDoc::new("sky");
        doc.add_node(
            HostNode::new("|sky|skyShape", "appleseedPhysicalSkyLight")
                .with_parent("|sky")
                .with_param("turbidity", json!(3.0))
                .with_param("sunTheta", json!({"angle": 30.0})),
        );
        let (scene, names) = export(&doc, "|sky|skyShape", SkyModel::PhysicalSky);
        let edf = scene
            .scene
            .environment_edfs
            .get("|sky|skyShape")
            .expect("edf");
        assert_eq!(edf.model, "hosek_environment_edf");
        assert_eq!(edf.params.get("turbidity"), Some("3"));
        assert_eq!(edf.params.get("sun_theta"), Some("30"));
        let sun = scene
            .main_assembly()
            .and_then(|a| a.lights.get("|sky|skyShape_sun_light"))
            .expect("sun");
        assert_eq!(sun.params.get("environment_edf"), Some("|sky|skyShape"));
        assert_eq!(names.environments[0].shader, "|sky|skyShape_shader");

        doc.node_mut("|sky|skyShape")
            .expect("node")
            .params
            .insert("sunEnable".to_string(), json!(false));
        let (scene, _) = export(&doc, "|sky|skyShape", SkyModel::PhysicalSky);
        assert!(scene.main_assembly().expect("main").lights.is_empty());
    }

    #[test]
    fn sky_dome_map_becomes_scene_texture() {
        let mut doc = HostDoc::new("dome");
        doc.add_node(
            HostNode::new("|dome|domeShape", "appleseedSkyDomeLight")
                .with_parent("|dome")
                .with_param("map", json!("sky.exr"))
                .with_param("intensity", json!(2.0)),
        );
        let (scene, _) = export(&doc, "|dome|domeShape", SkyModel::SkyDome);
        let edf = scene
            .scene
            .environment_edfs
            .get("|dome|domeShape")
            .expect("edf");
        assert_eq!(edf.model, "latlong_map_environment_edf");
        assert_eq!(edf.params.get("radiance"), Some("|dome|domeShape_texture_instance"));
        assert_eq!(edf.params.get("radiance_multiplier"), Some("2"));
        let texture = scene
            .scene
            .textures
            .get("|dome|domeShape_texture")
            .expect("texture");
        assert_eq!(texture.params.get("filename"), Some("sky.exr"));
    }
}
