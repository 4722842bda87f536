use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use serde::Serialize;

use super::{
    EntityContainer, ParamArray, Transform, TransformSequence, container::impl_entity,
};

/// Index used for absent normal/uv references.
pub const NO_INDEX: u32 = u32::MAX;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Serialize)]
pub struct Triangle {
    pub v0: u32,
    pub v1: u32,
    pub v2: u32,
    pub n0: u32,
    pub n1: u32,
    pub n2: u32,
    pub t0: u32,
    pub t1: u32,
    pub t2: u32,
    pub material: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshPose {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshGeometry {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub tangents: Vec<[f32; 3]>,
    pub triangles: Vec<Triangle>,
    /// Deformation poses after the base pose.
    pub motion_poses: Vec<MeshPose>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MeshObject {
    pub name: String,
    pub params: ParamArray,
    pub material_slots: Vec<String>,
    /// Absent when the geometry lives in an external file (`params["filename"]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<MeshGeometry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectInstance {
    pub name: String,
    pub params: ParamArray,
    pub object: String,
    pub transform: Transform,
    /// Material slot -> material name.
    pub front_materials: BTreeMap<String, String>,
    pub back_materials: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Material {
    pub name: String,
    pub model: String,
    pub params: ParamArray,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SurfaceShader {
    pub name: String,
    pub model: String,
    pub params: ParamArray,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaderEntry {
    #[serde(rename = "type")]
    pub shader_type: String,
    pub shader: String,
    pub layer: String,
    pub params: ParamArray,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShaderConnection {
    pub src_layer: String,
    pub src_param: String,
    pub dst_layer: String,
    pub dst_param: String,
}

/// Ordered shader list plus connections between named ports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShaderGroup {
    pub name: String,
    pub shaders: Vec<ShaderEntry>,
    pub connections: Vec<ShaderConnection>,
}

impl ShaderGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_shader(
        &mut self,
        shader_type: &str,
        shader: &str,
        layer: &str,
        params: ParamArray,
    ) {
        self.shaders.push(ShaderEntry {
            shader_type: shader_type.to_string(),
            shader: shader.to_string(),
            layer: layer.to_string(),
            params,
        });
    }

    pub fn add_connection(&mut self, src_layer: &str, src_param: &str, dst_layer: &str, dst_param: &str) {
        self.connections.push(ShaderConnection {
            src_layer: src_layer.to_string(),
            src_param: src_param.to_string(),
            dst_layer: dst_layer.to_string(),
            dst_param: dst_param.to_string(),
        });
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub fn shader(&self, layer: &str) -> Option<&ShaderEntry> {
        self.shaders.iter().find(|s| s.layer == layer)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Light {
    pub name: String,
    pub model: String,
    pub params: ParamArray,
    pub transform: Transform,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ColorEntity {
    pub name: String,
    pub params: ParamArray,
    pub values: [f32; 3],
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Texture {
    pub name: String,
    pub model: String,
    pub params: ParamArray,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TextureInstance {
    pub name: String,
    pub params: ParamArray,
    pub texture: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnvironmentEdf {
    pub name: String,
    pub model: String,
    pub params: ParamArray,
    pub transform_sequence: TransformSequence,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnvironmentShader {
    pub name: String,
    pub model: String,
    pub params: ParamArray,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Environment {
    pub name: String,
    pub params: ParamArray,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Camera {
    pub name: String,
    pub model: String,
    pub params: ParamArray,
    pub transform_sequence: TransformSequence,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssemblyInstance {
    pub name: String,
    pub params: ParamArray,
    pub assembly: String,
    pub transform_sequence: TransformSequence,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Assembly {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub params: ParamArray,
    pub objects: EntityContainer<MeshObject>,
    pub object_instances: EntityContainer<ObjectInstance>,
    pub materials: EntityContainer<Material>,
    pub surface_shaders: EntityContainer<SurfaceShader>,
    pub shader_groups: EntityContainer<ShaderGroup>,
    pub lights: EntityContainer<Light>,
    pub colors: EntityContainer<ColorEntity>,
    pub textures: EntityContainer<Texture>,
    pub texture_instances: EntityContainer<TextureInstance>,
    pub assemblies: EntityContainer<Assembly>,
    pub assembly_instances: EntityContainer<AssemblyInstance>,
}

impl Assembly {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Frame {
    pub name: String,
    pub params: ParamArray,
    pub aovs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Configuration {
    pub name: String,
    pub params: ParamArray,
}

impl_entity!(
    MeshObject,
    ObjectInstance,
    Material,
    SurfaceShader,
    ShaderGroup,
    Light,
    ColorEntity,
    Texture,
    TextureInstance,
    EnvironmentEdf,
    EnvironmentShader,
    Camera,
    AssemblyInstance,
    Assembly,
    Configuration,
);
