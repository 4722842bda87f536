//! Shading nodes whose parameters need custom packing.

use super::{
    metadata::{ParamInfo, ShaderInfo},
    node::{ShadingNodeExporter, export_default_parameter_value},
    ramp::{
        RampEntry, color_values_literal, float_values_literal, interps_literal, positions_literal,
        read_color_ramp, read_float_ramp,
    },
};
use crate::{
    host::{Plug, SceneGraph},
    target::{ParamArray, Transform},
    utils::{fmt_f64, numbered_string},
};

macro_rules! shading_node_exporter {
    ($name:ident $({ $($field:ident : $ty:ty),* })?) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            node: String,
            info: ShaderInfo,
            $($($field: $ty,)*)?
        }

        impl $name {
            pub fn boxed(node: &str, info: ShaderInfo) -> Box<dyn ShadingNodeExporter> {
                Box::new(Self::new(node, info))
            }
        }
    };
}

shading_node_exporter!(FileExporter);

impl FileExporter {
    pub fn new(node: &str, info: ShaderInfo) -> Self {
        Self {
            node: node.to_string(),
            info,
        }
    }

    /// The texture path with any frame-number placeholder substituted.
    pub fn resolved_file_name(host: &dyn SceneGraph, node: &str) -> Option<String> {
        let name = host.attr_string(node, "fileTextureName")?;
        if host.attr_bool(node, "useFrameExtension").unwrap_or(false) && name.contains('#') {
            let frame = host
                .attribute(node, "frameExtension")
                .and_then(|v| v.as_f64())
                .unwrap_or_else(|| host.current_time());
            return Some(numbered_string(&name, frame.round().max(0.0) as usize));
        }
        Some(name)
    }
}

impl ShadingNodeExporter for FileExporter {
    fn node(&self) -> &str {
        &self.node
    }

    fn shader_info(&self) -> &ShaderInfo {
        &self.info
    }

    fn export_parameter_value(&self, host: &dyn SceneGraph, param: &ParamInfo, params: &mut ParamArray) {
        if param.name != "in_fileTextureName" {
            export_default_parameter_value(host, &self.node, param, params);
            return;
        }
        match Self::resolved_file_name(host, &self.node) {
            Some(path) => {
                params.insert("in_fileTextureName", format!("string {path}"));
            }
            None => log::warn!("[shading] {}: file node has no texture name", self.node),
        }
    }
}

shading_node_exporter!(RampExporter);

impl RampExporter {
    pub fn new(node: &str, info: ShaderInfo) -> Self {
        Self {
            node: node.to_string(),
            info,
        }
    }
}

impl ShadingNodeExporter for RampExporter {
    fn node(&self) -> &str {
        &self.node
    }

    fn shader_info(&self) -> &ShaderInfo {
        &self.info
    }

    fn export_parameter_value(&self, host: &dyn SceneGraph, param: &ParamInfo, params: &mut ParamArray) {
        match param.name.as_str() {
            "in_position" => {
                let entries = read_color_ramp(host, &self.node, "colorEntryList");
                params.insert("in_position", positions_literal(&entries));
                params.insert("in_color", color_values_literal(&entries));
            }
            // Written together with the positions.
            "in_color" => {}
            _ => export_default_parameter_value(host, &self.node, param, params),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    Float,
    Color,
}

shading_node_exporter!(RemapExporter { curves: &'static [(&'static str, CurveKind)] });

/// Curve attributes of the remap node family.
pub const REMAP_VALUE_CURVES: &[(&str, CurveKind)] =
    &[("value", CurveKind::Float), ("color", CurveKind::Color)];
pub const REMAP_COLOR_CURVES: &[(&str, CurveKind)] = &[
    ("red", CurveKind::Float),
    ("green", CurveKind::Float),
    ("blue", CurveKind::Float),
];
pub const REMAP_HSV_CURVES: &[(&str, CurveKind)] = &[
    ("hue", CurveKind::Float),
    ("saturation", CurveKind::Float),
    ("value", CurveKind::Float),
];

impl RemapExporter {
    /// Remap nodes differ only in their curve set, chosen by host type.
    pub fn new(node: &str, info: ShaderInfo) -> Self {
        let curves = match info.host_type.as_str() {
            "remapColor" => REMAP_COLOR_CURVES,
            "remapHsv" => REMAP_HSV_CURVES,
            _ => REMAP_VALUE_CURVES,
        };
        Self {
            node: node.to_string(),
            info,
            curves,
        }
    }

    fn export_curve(&self, host: &dyn SceneGraph, attr: &str, kind: CurveKind, params: &mut ParamArray) {
        match kind {
            CurveKind::Float => {
                let entries: Vec<RampEntry<f32>> = read_float_ramp(host, &self.node, attr);
                params.insert(format!("in_{attr}_Position"), positions_literal(&entries));
                params.insert(format!("in_{attr}_FloatValue"), float_values_literal(&entries));
                params.insert(format!("in_{attr}_Interp"), interps_literal(&entries));
            }
            CurveKind::Color => {
                let entries = read_color_ramp(host, &self.node, attr);
                params.insert(format!("in_{attr}_Position"), positions_literal(&entries));
                params.insert(format!("in_{attr}_Color"), color_values_literal(&entries));
                params.insert(format!("in_{attr}_Interp"), interps_literal(&entries));
            }
        }
    }
}

impl ShadingNodeExporter for RemapExporter {
    fn node(&self) -> &str {
        &self.node
    }

    fn shader_info(&self) -> &ShaderInfo {
        &self.info
    }

    fn export_parameter_value(&self, host: &dyn SceneGraph, param: &ParamInfo, params: &mut ParamArray) {
        let curve = self
            .curves
            .iter()
            .find(|(attr, _)| param.attribute == *attr && param.is_array);
        match curve {
            Some((attr, kind)) if param.name.ends_with("_Position") => {
                self.export_curve(host, attr, *kind, params);
            }
            // Values and interpolations are written with the positions.
            Some(_) => {}
            None => export_default_parameter_value(host, &self.node, param, params),
        }
    }
}

shading_node_exporter!(Place3dTextureExporter);

impl Place3dTextureExporter {
    pub fn new(node: &str, info: ShaderInfo) -> Self {
        Self {
            node: node.to_string(),
            info,
        }
    }
}

impl ShadingNodeExporter for Place3dTextureExporter {
    fn node(&self) -> &str {
        &self.node
    }

    fn shader_info(&self) -> &ShaderInfo {
        &self.info
    }

    fn export_parameters(&self, host: &dyn SceneGraph) -> ParamArray {
        let mut params = ParamArray::new();
        for param in &self.info.params {
            export_default_parameter_value(host, &self.node, param, &mut params);
        }
        let inverse = Transform::from_matrix(host.world_matrix(&self.node)).inverse;
        let values: Vec<String> = inverse.to_cols_array().iter().copied().map(fmt_f64).collect();
        params.insert("in_inclusiveMatrixInverse", format!("matrix {}", values.join(" ")));
        params
    }

    fn output_param_for(&self, plug: &Plug) -> Option<ParamInfo> {
        if plug.attr == "worldInverseMatrix" {
            return self.info.find_param("out_worldInverseMatrix").cloned();
        }
        self.info.find_param_for_attribute(&plug.attr, true).cloned()
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

    fn info(host_type: &str) -> ShaderInfo {
        ShadingNodeRegistry::load_default()
            .expect("scheme")
            .get(host_type)
            .cloned()
            .expect("shader info")
    }

    #[test]
    fn ramp_writes_sorted_parallel_arrays() {
        let mut doc = HostDoc::new("ramp");
        doc.add_node(HostNode::new("ramp1", "ramp").with_param(
            "colorEntryList",
            json!([
                {"position": 1.0, "color": [0.0, 0.0, 1.0]},
                {"position": 0.0, "color": [1.0, 0.0, 0.0]}
            ]),
        ));
        let params = RampExporter::new("ramp1", info("ramp")).export_parameters(&doc);
        assert_eq!(params.get("in_position"), Some("float[] 0 0 1 1"));
        assert_eq!(
            params.get("in_color"),
            Some("color[] 1 0 0 1 0 0 0 0 1 0 0 1")
        );
    }

    #[test]
    fn remap_value_writes_all_curve_arrays() {
        let mut doc = HostDoc::new("remap");
        doc.add_node(
            HostNode::new("rv", "remapValue")
                .with_param("inputValue", json!(0.5))
                .with_param(
                    "value",
                    json!([
                        {"value_Position": 0.0, "value_FloatValue": 0.0, "value_Interp": 1},
                        {"value_Position": 0.5, "value_FloatValue": 1.0, "value_Interp": 2},
                        {"value_Position": 0.7, "value_FloatValue": 0.2, "value_Interp": 1},
                        {"value_Position": 1.0, "value_FloatValue": 1.0, "value_Interp": 1}
                    ]),
                )
                .with_param(
                    "color",
                    json!([{"color_Position": 0.0, "color_Color": [1.0, 1.0, 1.0]}]),
                ),
        );
        let params = RemapExporter::new("rv", info("remapValue")).export_parameters(&doc);
        assert_eq!(params.get("in_inputValue"), Some("float 0.5"));
        assert_eq!(params.get("in_value_Position"), Some("float[] 0 0.5 0.7 1"));
        assert_eq!(params.get("in_value_FloatValue"), Some("float[] 0 1 0.2 1"));
        assert_eq!(params.get("in_value_Interp"), Some("int[] 1 2 1 1"));
        assert_eq!(params.get("in_color_Interp"), Some("int[] 1 1 1 1"));
    }

    #[test]
    fn remap_hsv_uses_its_own_curves() {
        let e = RemapExporter::new("hsv", info("remapHsv"));
        assert_eq!(e.curves, REMAP_HSV_CURVES);
    }

    #[test]
    fn file_name_substitutes_frame_number() {
        let mut doc = HostDoc::new("file");
        doc.add_node(
            HostNode::new("file1", "file")
                .with_param("fileTextureName", json!("tex/seq.####.exr"))
                .with_param("useFrameExtension", json!(true))
                .with_param("frameExtension", json!(12)),
        );
        assert_eq!(
            FileExporter::resolved_file_name(&doc, "file1").as_deref(),
            Some("tex/seq.0012.exr")
        );
    }

    #[test]
    fn place3d_maps_world_inverse_matrix_elements() {
        let mut doc = HostDoc::new("p3d");
        doc.add_node(HostNode::new("place3d", "place3dTexture").with_param("translate", json!([1.0, 2.0, 3.0])));
        let e = Place3dTextureExporter::new("place3d", info("place3dTexture"));
        let p = e
            .output_param_for(&Plug::new("place3d", "worldInverseMatrix").with_element(0))
            .expect("mapped");
        assert_eq!(p.name, "out_worldInverseMatrix");
        let params = e.export_parameters(&doc);
        let m = params.get("in_inclusiveMatrixInverse").expect("inverse matrix");
        assert!(m.ends_with("-1 -2 -3 1"), "got {m}");
    }
}
