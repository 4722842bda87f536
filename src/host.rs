//! Boundary to the host application's scene graph.
//!
//! The exporters only ever read through [`SceneGraph`]; the host owns the nodes and the
//! timeline. [`HostDoc`] is an in-memory implementation loaded from JSON.

use std::fmt;

use glam::DMat4;
use serde::{Deserialize, Serialize};

pub mod doc;
pub mod value;

pub use doc::{
    AnimCurve, AnimKey, Endpoint, HostConnection, HostDoc, HostNode, PointKey, load_host_doc_from_path,
};
pub use value::AttrValue;

/// An attribute on a node, optionally narrowed to one array element and/or one compound
/// child (component).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Plug {
    pub node: String,
    pub attr: String,
    pub element: Option<usize>,
    pub component: Option<usize>,
}

impl Plug {
    pub fn new(node: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            attr: attr.into(),
            element: None,
            component: None,
        }
    }

    pub fn with_component(mut self, component: usize) -> Self {
        self.component = Some(component);
        self
    }

    pub fn with_element(mut self, element: usize) -> Self {
        self.element = Some(element);
        self
    }

    pub fn is_component(&self) -> bool {
        self.component.is_some()
    }

    pub fn is_element(&self) -> bool {
        self.element.is_some()
    }

    /// The compound plug this component belongs to.
    pub fn parent(&self) -> Plug {
        Plug {
            component: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Plug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attr)?;
        if let Some(e) = self.element {
            write!(f, "[{e}]")?;
        }
        if let Some(c) = self.component {
            write!(f, ".{c}")?;
        }
        Ok(())
    }
}

/// Polygon mesh as evaluated by the host at the current time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshData {
    pub points: Vec<[f32; 3]>,
    #[serde(default)]
    pub normals: Vec<[f32; 3]>,
    #[serde(default)]
    pub uvs: Vec<[f32; 2]>,
    pub face_counts: Vec<u32>,
    pub face_indices: Vec<u32>,
    /// Per face-vertex; empty means normals are indexed like points.
    #[serde(default)]
    pub face_normal_indices: Vec<u32>,
    /// Per face-vertex; empty means uvs are indexed like points.
    #[serde(default)]
    pub face_uv_indices: Vec<u32>,
    /// Per face index into `shading_engines`; empty means slot 0 everywhere.
    #[serde(default)]
    pub face_materials: Vec<u32>,
    #[serde(default)]
    pub shading_engines: Vec<String>,
}

impl MeshData {
    pub fn face_count(&self) -> usize {
        self.face_counts.len()
    }
}

/// Read access to the host scene graph plus its timeline cursor.
pub trait SceneGraph {
    /// DAG nodes in depth-first traversal order.
    fn dag_nodes(&self) -> Vec<String>;

    fn node_type(&self, node: &str) -> Option<String>;

    fn parent(&self, node: &str) -> Option<String>;

    /// Value of a whole attribute at the current time.
    fn attribute(&self, node: &str, attr: &str) -> Option<AttrValue>;

    /// The upstream plug driving exactly this plug, if any.
    fn source_of(&self, plug: &Plug) -> Option<Plug>;

    /// Compound children of `plug` that have an incoming connection.
    fn connected_components(&self, plug: &Plug) -> Vec<usize>;

    /// Array elements of `plug` that have an incoming connection (on the element or one of
    /// its children).
    fn connected_elements(&self, plug: &Plug) -> Vec<usize>;

    fn world_matrix(&self, node: &str) -> DMat4;

    /// Mesh data, optionally smoothed `smooth_levels` times by the host.
    fn mesh(&self, node: &str, smooth_levels: u32) -> Option<MeshData>;

    fn selection(&self) -> Vec<String>;

    fn current_time(&self) -> f64;

    fn set_time(&mut self, time: f64);

    /// Polled at export checkpoints.
    fn is_interrupt_requested(&self) -> bool {
        false
    }

    fn node_exists(&self, node: &str) -> bool {
        self.node_type(node).is_some()
    }

    /// Direct DAG children of `node`, in traversal order.
    fn children(&self, node: &str) -> Vec<String> {
        self.dag_nodes()
            .into_iter()
            .filter(|n| self.parent(n).as_deref() == Some(node))
            .collect()
    }

    /// Value addressed by a plug, narrowed to its element and component.
    fn plug_value(&self, plug: &Plug) -> Option<AttrValue> {
        let mut value = self.attribute(&plug.node, &plug.attr)?;
        if let Some(e) = plug.element {
            value = value.element(e)?;
        }
        if let Some(c) = plug.component {
            value = value.component(c)?;
        }
        Some(value)
    }

    fn is_connected(&self, plug: &Plug) -> bool {
        self.source_of(plug).is_some()
    }

    fn attr_bool(&self, node: &str, attr: &str) -> Option<bool> {
        self.attribute(node, attr).and_then(|v| v.as_bool())
    }

    fn attr_f32(&self, node: &str, attr: &str) -> Option<f32> {
        self.attribute(node, attr).and_then(|v| v.as_f32())
    }

    fn attr_f64(&self, node: &str, attr: &str) -> Option<f64> {
        self.attribute(node, attr).and_then(|v| v.as_f64())
    }

    fn attr_i64(&self, node: &str, attr: &str) -> Option<i64> {
        self.attribute(node, attr).and_then(|v| v.as_i64())
    }

    fn attr_string(&self, node: &str, attr: &str) -> Option<String> {
        self.attribute(node, attr)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    fn attr_color(&self, node: &str, attr: &str) -> Option<[f32; 3]> {
        self.attribute(node, attr).and_then(|v| v.as_color())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plug_display_includes_element_and_component() {
        let p = Plug::new("ramp1", "colorEntryList").with_element(2).with_component(1);
        assert_eq!(p.to_string(), "ramp1.colorEntryList[2].1");
        assert_eq!(p.parent().to_string(), "ramp1.colorEntryList[2]");
    }
}
