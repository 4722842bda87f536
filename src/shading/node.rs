use super::{
    literal::format_literal,
    metadata::{ParamInfo, ParamType, ShaderInfo},
};
use crate::{
    host::{Plug, SceneGraph},
    target::ParamArray,
};

/// Exports one shading node as one shader of a shader group.
///
/// The layer of the shader is the node name. Node types that pack parameters in a way
/// the metadata cannot describe override [`export_parameter_value`] or
/// [`output_param_for`].
///
/// [`export_parameter_value`]: ShadingNodeExporter::export_parameter_value
/// [`output_param_for`]: ShadingNodeExporter::output_param_for
pub trait ShadingNodeExporter {
    fn node(&self) -> &str;

    fn shader_info(&self) -> &ShaderInfo;

    fn export_parameter_value(
        &self,
        host: &dyn SceneGraph,
        param: &ParamInfo,
        params: &mut ParamArray,
    ) {
        export_default_parameter_value(host, self.node(), param, params);
    }

    /// Shader output parameter a plug of this node maps to.
    fn output_param_for(&self, plug: &Plug) -> Option<ParamInfo> {
        if plug.is_element() {
            log::warn!("[shading] skipping array element connection from {plug}");
            return None;
        }
        self.shader_info()
            .find_param_for_attribute(&plug.attr, true)
            .cloned()
    }

    /// All literal parameters of the node's shader.
    fn export_parameters(&self, host: &dyn SceneGraph) -> ParamArray {
        let mut params = ParamArray::new();
        for param in &self.shader_info().params {
            self.export_parameter_value(host, param, &mut params);
        }
        params
    }
}

/// Writes the literal for `param` unless it is an output, connected, or lacks a usable
/// default. Missing attributes and type mismatches are logged and skipped.
pub fn export_default_parameter_value(
    host: &dyn SceneGraph,
    node: &str,
    param: &ParamInfo,
    params: &mut ParamArray,
) {
    if !param.valid_default || param.is_output {
        return;
    }
    if host.is_connected(&Plug::new(node, &param.attribute)) {
        return;
    }
    let Some(value) = host.attribute(node, &param.attribute) else {
        log::warn!("[shading] skipping unknown attribute {node}.{}", param.attribute);
        return;
    };
    if matches!(param.param_type, ParamType::Closure) {
        return;
    }
    match format_literal(&value, &param.param_type) {
        Some(literal) => {
            log::debug!("[shading] {node}.{} = {literal}", param.attribute);
            params.insert(param.name.as_str(), literal);
        }
        None => log::warn!(
            "[shading] skipping attribute {node}.{} of type {:?}: value {value:?} does not fit",
            param.attribute,
            param.param_type
        ),
    }
}

/// Metadata-driven exporter used for every node type without a specialized one.
#[derive(Debug, Clone)]
pub struct GenericShadingNodeExporter {
    node: String,
    info: ShaderInfo,
}

impl GenericShadingNodeExporter {
    pub fn new(node: impl Into<String>, info: ShaderInfo) -> Self {
        Self {
            node: node.into(),
            info,
        }
    }
}

impl ShadingNodeExporter for GenericShadingNodeExporter {
    fn node(&self) -> &str {
        &self.node
    }

    fn shader_info(&self) -> &ShaderInfo {
        &self.info
    }
}

/// Component names of the composing/decomposing adaptor shaders.
pub const VECTOR_COMPONENTS: [&str; 3] = ["compX", "compY", "compZ"];
pub const UV_COMPONENTS: [&str; 2] = ["compU", "compV"];
pub const ADAPTOR_COMPOUND_PARAM: &str = "comp";

/// Shader, layer pattern and component names of an adaptor for one compound type.
#[derive(Debug, Clone, Copy)]
pub struct AdaptorKind {
    pub shader: &'static str,
    pub layer_pattern: &'static str,
    pub components: &'static [&'static str],
}

impl AdaptorKind {
    /// Composes scalar components into a compound input.
    pub fn input(param_type: &ParamType) -> Option<AdaptorKind> {
        if param_type.is_vector_like() {
            Some(AdaptorKind {
                shader: "as_maya_components2Vector",
                layer_pattern: "__comp2Vector#",
                components: &VECTOR_COMPONENTS,
            })
        } else if param_type.is_uv() {
            Some(AdaptorKind {
                shader: "as_maya_components2UV",
                layer_pattern: "__comp2UV#",
                components: &UV_COMPONENTS,
            })
        } else {
            None
        }
    }

    /// Splits a compound output into scalar components.
    pub fn output(param_type: &ParamType) -> Option<AdaptorKind> {
        if param_type.is_vector_like() {
            Some(AdaptorKind {
                shader: "as_maya_vector2Components",
                layer_pattern: "__vector2Comp#",
                components: &VECTOR_COMPONENTS,
            })
        } else if param_type.is_uv() {
            Some(AdaptorKind {
                shader: "as_maya_uv2Components",
                layer_pattern: "__uv2Comp#",
                components: &UV_COMPONENTS,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::{HostDoc, HostNode},
        shading::ShadingNodeRegistry,
    };
    use serde_json::json;

    #[test]
    fn connected_and_invalid_default_params_are_skipped() {
        let mut doc = HostDoc::new("n");
        doc.add_node(
            HostNode::new("file1", "file")
                .with_param("fileTextureName", json!("wood.png"))
                .with_param("colorGain", json!([1.0, 0.5, 0.5]))
                .with_param("alphaGain", json!(0.25))
                .with_param("uvCoord", json!([0.0, 0.0])),
        );
        doc.add_node(HostNode::new("p2d", "place2dTexture"));
        doc.add_node(HostNode::new("ramp1", "ramp").with_param("alphaGain", json!(1.0)));
        doc.connect(Plug::new("ramp1", "outAlpha"), Plug::new("file1", "alphaGain"));

        let reg = ShadingNodeRegistry::load_default().expect("scheme");
        let exporter = GenericShadingNodeExporter::new(
            "file1",
            reg.get("file").cloned().expect("file"),
        );
        let params = exporter.export_parameters(&doc);
        assert_eq!(params.get("in_colorGain"), Some("color 1 0.5 0.5"));
        assert!(!params.contains("in_alphaGain"), "connected param exported");
        assert!(!params.contains("in_uvCoord"), "param without valid default exported");
        assert!(!params.contains("out_outColor"));
    }

    #[test]
    fn output_params_follow_attribute_names() {
        let reg = ShadingNodeRegistry::load_default().expect("scheme");
        let exporter =
            GenericShadingNodeExporter::new("chk", reg.get("checker").cloned().expect("checker"));
        let p = exporter
            .output_param_for(&Plug::new("chk", "outAlpha"))
            .expect("outAlpha");
        assert_eq!(p.name, "out_outAlpha");
        assert!(exporter.output_param_for(&Plug::new("chk", "color1")).is_none());
    }
}
