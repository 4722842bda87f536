//! Per-node exporters and the staged protocol they follow.
//!
//! Every exported DAG node gets one [`DagNodeExporter`]. The session drives all of them
//! through the same stages: dependency discovery, static entity creation, one call per
//! motion sample, then a flush that commits entities into the target document.

use std::{collections::HashMap, path::Path};

use glam::{DMat4, DVec3};

use crate::{
    error::ExportResult,
    hash::ContentHash,
    host::{Plug, SceneGraph},
    motion::MotionBlurSampleTimes,
    session::{ExportServices, RenderGlobals, SessionMode, SessionOptions},
    shading::NetworkKey,
    target::{ParamArray, TargetScene, Transform},
    utils::bool_str,
};

pub mod alpha_map;
pub mod area_light;
pub mod camera;
pub mod env_light;
pub mod instance;
pub mod light;
pub mod mesh;
pub mod procedural;
pub mod shading_engine;
pub mod shape;

pub use alpha_map::AlphaMapExporter;
pub use area_light::AreaLightExporter;
pub use camera::CameraExporter;
pub use env_light::{EnvLightExporter, SkyModel};
pub use instance::InstanceExporter;
pub use light::LightExporter;
pub use mesh::MeshExporter;
pub use procedural::ProceduralGroupExporter;
pub use shading_engine::ShadingEngineExporter;
pub use shape::{ShapeBase, ShapeExporter};

/// Inputs shared by every `create_entities` call of one export pass.
pub struct CreateContext<'a> {
    pub options: &'a SessionOptions,
    pub globals: &'a RenderGlobals,
    pub motion: &'a MotionBlurSampleTimes,
    pub mode: SessionMode,
}

/// One sample of a motion category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    /// Host time.
    pub time: f64,
    /// Time normalized over the shutter; the key of transform sequences.
    pub shutter_time: f64,
    /// Position within the category's samples.
    pub index: usize,
    pub count: usize,
}

/// Names entities ended up with after unique-name resolution, for exporters that refer to
/// entities flushed in an earlier stage.
#[derive(Debug, Clone, Default)]
pub struct ResolvedNames {
    pub shader_groups: HashMap<NetworkKey, String>,
    /// Shading engine node -> material.
    pub materials: HashMap<String, String>,
    /// Alpha map node -> texture instance.
    pub alpha_maps: HashMap<String, String>,
    /// Shape path -> wrapping assembly.
    pub assemblies: HashMap<String, String>,
    /// Camera entities in flush order.
    pub cameras: Vec<String>,
    pub environments: Vec<EnvironmentNames>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentNames {
    pub dag_path: String,
    pub edf: String,
    pub shader: String,
}

pub struct FlushContext<'a> {
    pub scene: &'a mut TargetScene,
    pub names: &'a mut ResolvedNames,
    /// Directory the project file is written to; geometry files go below it.
    pub project_dir: Option<&'a Path>,
    pub mode: SessionMode,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f32; 3]>) -> Option<Aabb> {
        let mut iter = points.into_iter().map(|p| DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64));
        let first = iter.next()?;
        Some(iter.fold(Aabb { min: first, max: first }, |b, p| Aabb {
            min: b.min.min(p),
            max: b.max.max(p),
        }))
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Bounds of the eight transformed corners.
    pub fn transformed(&self, m: &DMat4) -> Aabb {
        let corners = (0..8).map(|i| {
            m.transform_point3(DVec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            ))
        });
        let mut out: Option<Aabb> = None;
        for c in corners {
            out = Some(match out {
                None => Aabb { min: c, max: c },
                Some(b) => Aabb {
                    min: b.min.min(c),
                    max: b.max.max(c),
                },
            });
        }
        out.unwrap_or(*self)
    }
}

pub trait DagNodeExporter {
    /// Full DAG path of the node; also the name of its main entity.
    fn dag_path(&self) -> &str;

    /// Discovers and registers exporters for nodes this one depends on but does not own.
    fn create_exporters(&mut self, _host: &dyn SceneGraph, _services: &mut ExportServices) {}

    /// Builds the time-invariant entities.
    fn create_entities(&mut self, host: &dyn SceneGraph, ctx: &CreateContext<'_>) -> ExportResult<()>;

    /// `false` for exporters whose output never varies over the shutter.
    fn supports_motion_blur(&self) -> bool {
        true
    }

    fn export_camera_motion_step(&mut self, _host: &dyn SceneGraph, _step: MotionStep) {}

    fn export_transform_motion_step(&mut self, _host: &dyn SceneGraph, _step: MotionStep) {}

    fn export_shape_motion_step(&mut self, _host: &dyn SceneGraph, _step: MotionStep) {}

    fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) -> ExportResult<()>;

    /// World-space bounds, when the exporter knows them.
    fn bounding_box(&self) -> Option<Aabb> {
        None
    }

    /// Removes everything this exporter inserted.
    fn remove_entities(&mut self, scene: &mut TargetScene);

    fn as_shape(&self) -> Option<&dyn ShapeExporter> {
        None
    }

    fn as_shape_mut(&mut self) -> Option<&mut dyn ShapeExporter> {
        None
    }
}

/// The node and all of its ancestors are visible, not templated and not intermediate.
pub fn is_renderable(host: &dyn SceneGraph, node: &str) -> bool {
    let mut cursor = Some(node.to_string());
    while let Some(n) = cursor {
        if !host.attr_bool(&n, "visibility").unwrap_or(true)
            || host.attr_bool(&n, "template").unwrap_or(false)
            || host.attr_bool(&n, "intermediateObject").unwrap_or(false)
        {
            return false;
        }
        cursor = host.parent(&n);
    }
    true
}

const VISIBILITY_FLAGS: [(&str, &str); 6] = [
    ("camera", "asVisibilityCamera"),
    ("light", "asVisibilityLight"),
    ("shadow", "asVisibilityShadow"),
    ("diffuse", "asVisibilityDiffuse"),
    ("specular", "asVisibilitySpecular"),
    ("glossy", "asVisibilityGlossy"),
];

/// `visibility.*` parameters from the node's ray visibility attributes.
pub fn visibility_params(host: &dyn SceneGraph, node: &str) -> ParamArray {
    let mut params = ParamArray::new();
    for (flag, attr) in VISIBILITY_FLAGS {
        let visible = host.attr_bool(node, attr).unwrap_or(true);
        params.insert_path(&format!("visibility.{flag}"), bool_str(visible));
    }
    params
}

/// World transform of `node` at the host's current time.
pub fn world_transform(host: &dyn SceneGraph, node: &str) -> Transform {
    Transform::from_matrix(host.world_matrix(node))
}

/// The node driving `node.attr`, if any.
pub fn connected_node(host: &dyn SceneGraph, node: &str, attr: &str) -> Option<String> {
    host.source_of(&Plug::new(node, attr)).map(|p| p.node)
}

/// Appends a shape's geometry-independent bindings to its hash.
pub fn hash_bindings(hash: &mut ContentHash, slots: &[String], alpha_map: Option<&str>) {
    for slot in slots {
        hash.append_str(slot);
    }
    hash.append_str(alpha_map.unwrap_or(""));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostDoc, HostNode};
    use serde_json::json;

    #[test]
    fn hidden_ancestor_makes_node_unrenderable() {
        let mut doc = HostDoc::new("vis");
        doc.add_node(HostNode::new("|grp", "transform").with_param("visibility", json!(false)));
        doc.add_node(HostNode::new("|grp|m", "transform").with_parent("|grp"));
        doc.add_node(HostNode::new("|grp|m|mShape", "mesh").with_parent("|grp|m"));
        doc.add_node(HostNode::new("|t", "transform").with_param("template", json!(true)));
        doc.add_node(HostNode::new("|ok", "transform"));
        assert!(!is_renderable(&doc, "|grp|m|mShape"));
        assert!(!is_renderable(&doc, "|t"));
        assert!(is_renderable(&doc, "|ok"));
    }

    #[test]
    fn visibility_flags_default_to_visible() {
        let mut doc = HostDoc::new("flags");
        doc.add_node(HostNode::new("|m", "transform").with_param("asVisibilityShadow", json!(false)));
        let params = visibility_params(&doc, "|m");
        assert_eq!(params.get("visibility.shadow"), Some("false"));
        assert_eq!(params.get("visibility.camera"), Some("true"));
        assert_eq!(params.len(), 6);
    }

    #[test]
    fn transformed_box_covers_rotated_corners() {
        let b = Aabb {
            min: DVec3::splat(-1.0),
            max: DVec3::splat(1.0),
        };
        let m = DMat4::from_translation(DVec3::new(5.0, 0.0, 0.0))
            * DMat4::from_rotation_z(std::f64::consts::FRAC_PI_4);
        let t = b.transformed(&m);
        assert!((t.max.x - (5.0 + 2f64.sqrt())).abs() < 1e-9);
        assert!((t.min.y + 2f64.sqrt()).abs() < 1e-9);
    }
}
