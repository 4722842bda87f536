use crate::{
    error::ExportResult,
    host::SceneGraph,
    session::SessionMode,
    target::{
        ColorEntity, EntityKind, EntityScope, InsertedEntities, Light, ParamArray, TargetScene,
    },
    utils::{bool_str, fmt_f32},
};

use super::{CreateContext, DagNodeExporter, FlushContext, is_renderable, world_transform};

const DEFAULT_CONE_ANGLE: f32 = 20.0;
const DEFAULT_PENUMBRA_ANGLE: f32 = 5.0;

/// Point, spot and directional lights.
pub struct LightExporter {
    dag_path: String,
    color: Option<ColorEntity>,
    light: Option<Light>,
    /// Light parameter that names the color entity.
    color_param: &'static str,
    inserted: InsertedEntities,
}

impl LightExporter {
    pub fn new(dag_path: &str) -> Self {
        Self {
            dag_path: dag_path.to_string(),
            color: None,
            light: None,
            color_param: "intensity",
            inserted: InsertedEntities::default(),
        }
    }

    pub fn create(
        node: &str,
        host: &dyn SceneGraph,
        _mode: SessionMode,
    ) -> Option<Box<dyn DagNodeExporter>> {
        if !is_renderable(host, node) {
            return None;
        }
        Some(Box::new(Self::new(node)))
    }

    pub fn color_name(&self) -> String {
        format!("{}_intensity_color", self.dag_path)
    }
}

impl DagNodeExporter for LightExporter {
    fn dag_path(&self) -> &str {
        &self.dag_path
    }

    fn create_entities(&mut self, host: &dyn SceneGraph, _ctx: &CreateContext<'_>) -> ExportResult<()> {
        let node = self.dag_path.as_str();
        let node_type = host.node_type(node).unwrap_or_default();
        let color_name = self.color_name();
        let intensity = fmt_f32(host.attr_f32(node, "intensity").unwrap_or(1.0));

        let mut params = ParamArray::new();
        let model = match node_type.as_str() {
            "directionalLight" => {
                params
                    .insert("irradiance", color_name.as_str())
                    .insert("irradiance_multiplier", intensity);
                self.color_param = "irradiance";
                "directional_light"
            }
            "spotLight" => {
                let cone = host.attr_f32(node, "coneAngle").unwrap_or(DEFAULT_CONE_ANGLE);
                let penumbra = host
                    .attr_f32(node, "penumbraAngle")
                    .unwrap_or(DEFAULT_PENUMBRA_ANGLE);
                params
                    .insert("intensity", color_name.as_str())
                    .insert("intensity_multiplier", intensity)
                    .insert("inner_angle", fmt_f32(cone))
                    .insert("outer_angle", fmt_f32(cone + 2.0 * penumbra));
                "spot_light"
            }
            _ => {
                params
                    .insert("intensity", color_name.as_str())
                    .insert("intensity_multiplier", intensity);
                "point_light"
            }
        };

        let cast_indirect = host
            .attr_bool(node, "asCastIndirectLight")
            .or_else(|| host.attr_bool(node, "emitDiffuse"))
            .unwrap_or(true);
        params.insert_path("cast_indirect_light", bool_str(cast_indirect));

        self.color = Some(ColorEntity {
            name: color_name,
            params: ParamArray::new().with("color_space", "linear_rgb"),
            values: host.attr_color(node, "color").unwrap_or([1.0, 1.0, 1.0]),
        });
        self.light = Some(Light {
            name: self.dag_path.clone(),
            model: model.to_string(),
            params,
            transform: world_transform(host, node),
        });
        Ok(())
    }

    fn supports_motion_blur(&self) -> bool {
        false
    }

    fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) -> ExportResult<()> {
        let main = ctx.scene.main_assembly_mut();
        let mut color_name = None;
        if let Some(color) = self.color.take() {
            let name = main.colors.insert_unique(color);
            self.inserted
                .record(EntityScope::MainAssembly, EntityKind::Color, &name);
            color_name = Some(name);
        }
        if let Some(mut light) = self.light.take() {
            if let Some(color_name) = color_name {
                light.params.insert(self.color_param, color_name);
            }
            let name = main.lights.insert_unique(light);
            self.inserted
                .record(EntityScope::MainAssembly, EntityKind::Light, &name);
        }
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
        motion::MotionBlurSampleTimes,
        session::{RenderGlobals, SessionOptions},
        host::{HostDoc, HostNode},
    };
    use serde_json::json;

    fn export(doc: &HostDoc, node: &str) -> TargetScene {
        export_into(doc, node, TargetScene::new_project("lights"))
    }

    fn export_into(doc: &HostDoc, node: &str, mut scene: TargetScene) -> TargetScene {
        let options = SessionOptions::default();
        let globals = RenderGlobals::default();
        let motion = MotionBlurSampleTimes::current_frame(1.0);
        let ctx = CreateContext {
            options: &options,
            globals: &globals,
            motion: &motion,
            mode: SessionMode::Export,
        };
        let mut exporter = LightExporter::new(node);
        exporter.create_entities(doc, &ctx).expect("create");
        let mut names = ResolvedNames::default();
        let mut flush = FlushContext {
            scene: &mut scene,
            names: &mut names,
            project_dir: None,
            mode: SessionMode::Export,
        };
        exporter.flush_entities(&mut flush).expect("flush");
        scene
    }

    #[test]
    fn spot_light_angles_include_penumbra() {
        let mut doc = HostDoc::new("l");
        doc.add_node(
            HostNode::new("|spot|spotShape", "spotLight")
                .with_parent("|spot")
                .with_param("intensity", json!(2.0))
                .with_param("coneAngle", json!({"angle": 30.0}))
                .with_param("penumbraAngle", json!({"angle": 4.0}))
                .with_param("color", json!([1.0, 0.5, 0.25])),
        );
        let scene = export(&doc, "|spot|spotShape");
        let main = scene.main_assembly().expect("main");
        let light = main.lights.get("|spot|spotShape").expect("light");
        assert_eq!(light.model, "spot_light");
        assert_eq!(light.params.get("inner_angle"), Some("30"));
        assert_eq!(light.params.get("outer_angle"), Some("38"));
        assert_eq!(light.params.get("intensity"), Some("|spot|spotShape_intensity_color"));
        assert_eq!(light.params.get("intensity_multiplier"), Some("2"));
        let color = main
            .colors
            .get("|spot|spotShape_intensity_color")
            .expect("color");
        assert_eq!(color.values, [1.0, 0.5, 0.25]);
    }

    #[test]
    fn directional_light_uses_irradiance() {
        let mut doc = HostDoc::new("l");
        doc.add_node(
            HostNode::new("|sun|sunShape", "directionalLight")
                .with_parent("|sun")
                .with_param("emitDiffuse", json!(false)),
        );
        let scene = export(&doc, "|sun|sunShape");
        let light = scene
            .main_assembly()
            .and_then(|a| a.lights.get("|sun|sunShape"))
            .expect("light");
        assert_eq!(light.model, "directional_light");
        assert!(light.params.contains("irradiance"));
        assert_eq!(light.params.get("cast_indirect_light"), Some("false"));
    }

    #[test]
    fn light_follows_a_renamed_color() {
        let mut doc = HostDoc::new("l");
        doc.add_node(HostNode::new("|pt|ptShape", "pointLight").with_parent("|pt"));
        let mut scene = TargetScene::new_project("lights");
        scene.main_assembly_mut().colors.insert_unique(ColorEntity {
            name: "|pt|ptShape_intensity_color".to_string(),
            params: ParamArray::new(),
            values: [0.0, 0.0, 0.0],
        });

        let scene = export_into(&doc, "|pt|ptShape", scene);
        let main = scene.main_assembly().expect("main");
        let light = main.lights.get("|pt|ptShape").expect("light");
        assert_eq!(
            light.params.get("intensity"),
            Some("|pt|ptShape_intensity_color_1")
        );
        assert_eq!(main.colors.len(), 2);
    }
}
