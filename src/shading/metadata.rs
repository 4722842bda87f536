//! Shader descriptions for every supported shading node type.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

const DEFAULT_SHADING_SCHEME_JSON: &str = include_str!("../../assets/shading-node-scheme.json");

/// Declared type of a shader parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Color,
    Float,
    Int,
    Matrix,
    Normal,
    Point,
    Vector,
    String,
    Float2,
    FloatArray,
    IntArray,
    ColorArray,
    Closure,
    Other(String),
}

impl ParamType {
    pub fn parse(s: &str) -> ParamType {
        match s {
            "color" => ParamType::Color,
            "float" => ParamType::Float,
            "int" => ParamType::Int,
            "matrix" => ParamType::Matrix,
            "normal" => ParamType::Normal,
            "point" => ParamType::Point,
            "vector" => ParamType::Vector,
            "string" => ParamType::String,
            "float[2]" => ParamType::Float2,
            "float[]" => ParamType::FloatArray,
            "int[]" => ParamType::IntArray,
            "color[]" => ParamType::ColorArray,
            "closure color" => ParamType::Closure,
            other => ParamType::Other(other.to_string()),
        }
    }

    /// Number of scalar children a compound parameter exposes; 0 for non-compounds.
    pub fn component_count(&self) -> usize {
        match self {
            ParamType::Color | ParamType::Normal | ParamType::Point | ParamType::Vector => 3,
            ParamType::Float2 => 2,
            _ => 0,
        }
    }

    pub fn is_vector_like(&self) -> bool {
        self.component_count() == 3
    }

    pub fn is_uv(&self) -> bool {
        matches!(self, ParamType::Float2)
    }
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    pub param_type: ParamType,
    /// Host attribute the parameter reads from.
    pub attribute: String,
    pub is_output: bool,
    pub valid_default: bool,
    pub is_array: bool,
    pub widget: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ShaderInfo {
    pub host_type: String,
    pub shader_name: String,
    pub shader_type: String,
    pub params: Vec<ParamInfo>,
}

impl ShaderInfo {
    /// First parameter bound to `attribute` with the requested direction.
    pub fn find_param_for_attribute(&self, attribute: &str, output: bool) -> Option<&ParamInfo> {
        self.params
            .iter()
            .find(|p| p.attribute == attribute && p.is_output == output)
    }

    pub fn find_param(&self, name: &str) -> Option<&ParamInfo> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &ParamInfo> {
        self.params.iter().filter(|p| !p.is_output)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawScheme {
    #[serde(rename = "schemaVersion")]
    schema_version: u32,
    #[serde(default)]
    shaders: Vec<RawShader>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawShader {
    #[serde(rename = "hostType")]
    host_type: String,
    shader: String,
    #[serde(rename = "type", default = "default_shader_type")]
    shader_type: String,
    #[serde(default)]
    params: Vec<RawParam>,
}

fn default_shader_type() -> String {
    "shader".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct RawParam {
    name: String,
    #[serde(rename = "type")]
    param_type: String,
    #[serde(default)]
    attribute: Option<String>,
    #[serde(default)]
    output: Option<bool>,
    #[serde(rename = "validDefault", default)]
    valid_default: Option<bool>,
    #[serde(default)]
    array: bool,
    #[serde(default)]
    widget: Option<String>,
}

impl RawParam {
    fn into_info(self) -> ParamInfo {
        let is_output = self.output.unwrap_or_else(|| self.name.starts_with("out_"));
        let attribute = self.attribute.unwrap_or_else(|| {
            self.name
                .strip_prefix("in_")
                .or_else(|| self.name.strip_prefix("out_"))
                .unwrap_or(&self.name)
                .to_string()
        });
        ParamInfo {
            param_type: ParamType::parse(&self.param_type),
            valid_default: self.valid_default.unwrap_or(!is_output),
            name: self.name,
            attribute,
            is_output,
            is_array: self.array,
            widget: self.widget,
        }
    }
}

/// Host node type -> shader description.
#[derive(Debug, Clone, Default)]
pub struct ShadingNodeRegistry {
    shaders: HashMap<String, ShaderInfo>,
}

impl ShadingNodeRegistry {
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawScheme = serde_json::from_str(text).context("failed to parse shading node scheme")?;
        if raw.schema_version != 1 {
            bail!("unsupported shading node scheme version {}", raw.schema_version);
        }
        let mut registry = ShadingNodeRegistry::default();
        for s in raw.shaders {
            registry.insert(ShaderInfo {
                host_type: s.host_type,
                shader_name: s.shader,
                shader_type: s.shader_type,
                params: s.params.into_iter().map(RawParam::into_info).collect(),
            });
        }
        Ok(registry)
    }

    pub fn load_default() -> Result<Self> {
        Self::from_json(DEFAULT_SHADING_SCHEME_JSON)
    }

    /// The bundled registry, parsed once.
    pub fn shared() -> Arc<ShadingNodeRegistry> {
        static SHARED: OnceLock<Arc<ShadingNodeRegistry>> = OnceLock::new();
        SHARED
            .get_or_init(|| {
                Arc::new(Self::load_default().unwrap_or_else(|e| {
                    log::error!("[shading] bundled shading node scheme is invalid: {e:#}");
                    ShadingNodeRegistry::default()
                }))
            })
            .clone()
    }

    pub fn insert(&mut self, info: ShaderInfo) {
        self.shaders.insert(info.host_type.clone(), info);
    }

    pub fn get(&self, host_type: &str) -> Option<&ShaderInfo> {
        self.shaders.get(host_type)
    }

    pub fn is_supported(&self, host_type: &str) -> bool {
        self.shaders.contains_key(host_type)
    }

    pub fn host_types(&self) -> impl Iterator<Item = &str> {
        self.shaders.keys().map(|s| s.as_str())
    }
}
