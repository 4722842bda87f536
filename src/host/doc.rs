use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use glam::{DMat4, DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};

use super::{AttrValue, MeshData, Plug, SceneGraph};

/// In-memory host scene, loadable from JSON.
///
/// A node takes part in the DAG when it has a `parent` or is a `transform`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostDoc {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub nodes: Vec<HostNode>,
    #[serde(default)]
    pub connections: Vec<HostConnection>,
    #[serde(default)]
    pub animation: Vec<AnimCurve>,
    #[serde(default)]
    pub selection: Vec<String>,
    #[serde(default = "default_time", rename = "currentTime")]
    pub current_time: f64,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_time() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub mesh: Option<MeshData>,
    /// Deformed point positions keyed by time.
    #[serde(default, rename = "pointKeys")]
    pub point_keys: Vec<PointKey>,
}

impl HostNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            parent: None,
            params: HashMap::new(),
            mesh: None,
            point_keys: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_mesh(mut self, mesh: MeshData) -> Self {
        self.mesh = Some(mesh);
        self
    }

    fn is_dag(&self) -> bool {
        self.parent.is_some() || self.node_type == "transform"
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PointKey {
    pub time: f64,
    pub points: Vec<[f32; 3]>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConnection {
    pub from: Endpoint,
    pub to: Endpoint,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Endpoint {
    pub node: String,
    pub attr: String,
    #[serde(default)]
    pub element: Option<usize>,
    #[serde(default)]
    pub component: Option<usize>,
}

impl From<&Plug> for Endpoint {
    fn from(p: &Plug) -> Self {
        Self {
            node: p.node.clone(),
            attr: p.attr.clone(),
            element: p.element,
            component: p.component,
        }
    }
}

impl Endpoint {
    fn to_plug(&self) -> Plug {
        Plug {
            node: self.node.clone(),
            attr: self.attr.clone(),
            element: self.element,
            component: self.component,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnimCurve {
    pub node: String,
    pub attr: String,
    pub keys: Vec<AnimKey>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnimKey {
    pub time: f64,
    pub value: serde_json::Value,
}

pub fn load_host_doc_from_path(path: impl AsRef<std::path::Path>) -> Result<HostDoc> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read host scene json at {}", path.display()))?;
    HostDoc::from_json_str(&text)
}

impl HostDoc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            metadata: Metadata { name: name.into() },
            current_time: default_time(),
            ..Default::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut doc: HostDoc = serde_json::from_str(text).context("failed to parse host scene json")?;
        doc.reindex()?;
        Ok(doc)
    }

    fn reindex(&mut self) -> Result<()> {
        self.index.clear();
        for (i, n) in self.nodes.iter().enumerate() {
            if self.index.insert(n.id.clone(), i).is_some() {
                bail!("duplicate host node id: {}", n.id);
            }
        }
        Ok(())
    }

    pub fn add_node(&mut self, node: HostNode) -> &mut Self {
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        self
    }

    pub fn connect(&mut self, from: Plug, to: Plug) -> &mut Self {
        self.connections.push(HostConnection {
            from: Endpoint::from(&from),
            to: Endpoint::from(&to),
        });
        self
    }

    pub fn animate(&mut self, node: &str, attr: &str, keys: Vec<(f64, serde_json::Value)>) -> &mut Self {
        self.animation.push(AnimCurve {
            node: node.to_string(),
            attr: attr.to_string(),
            keys: keys
                .into_iter()
                .map(|(time, value)| AnimKey { time, value })
                .collect(),
        });
        self
    }

    pub fn node(&self, id: &str) -> Option<&HostNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut HostNode> {
        self.index.get(id).copied().map(move |i| &mut self.nodes[i])
    }

    fn animated_value(&self, node: &str, attr: &str) -> Option<AttrValue> {
        let curve = self
            .animation
            .iter()
            .find(|c| c.node == node && c.attr == attr)?;
        let t = self.current_time;
        let first = curve.keys.first()?;
        if t <= first.time {
            return AttrValue::from_json(&first.value);
        }
        for pair in curve.keys.windows(2) {
            let (k0, k1) = (&pair[0], &pair[1]);
            if t <= k1.time {
                let span = k1.time - k0.time;
                let w = if span > 0.0 { (t - k0.time) / span } else { 1.0 };
                let a = AttrValue::from_json(&k0.value)?;
                let b = AttrValue::from_json(&k1.value)?;
                return Some(a.lerp(&b, w));
            }
        }
        curve.keys.last().and_then(|k| AttrValue::from_json(&k.value))
    }

    fn local_matrix(&self, node: &HostNode) -> DMat4 {
        if let Some(m) = self
            .attribute(&node.id, "matrix")
            .and_then(|v| v.as_matrix())
        {
            return DMat4::from_cols_array(&m);
        }
        let vec3 = |attr: &str, fallback: f64| {
            self.attribute(&node.id, attr)
                .and_then(|v| v.as_tuple().map(|t| t.to_vec()))
                .filter(|t| t.len() >= 3)
                .map(|t| DVec3::new(t[0], t[1], t[2]))
                .unwrap_or(DVec3::splat(fallback))
        };
        let translate = vec3("translate", 0.0);
        let rotate = vec3("rotate", 0.0);
        let scale = vec3("scale", 1.0);
        let rotation = DQuat::from_euler(
            EulerRot::ZYX,
            rotate.z.to_radians(),
            rotate.y.to_radians(),
            rotate.x.to_radians(),
        );
        DMat4::from_scale_rotation_translation(scale, rotation, translate)
    }

    fn deformed_points(&self, node: &HostNode) -> Option<Vec<[f32; 3]>> {
        let keys = &node.point_keys;
        let first = keys.first()?;
        let t = self.current_time;
        if t <= first.time {
            return Some(first.points.clone());
        }
        for pair in keys.windows(2) {
            let (k0, k1) = (&pair[0], &pair[1]);
            if t <= k1.time && k0.points.len() == k1.points.len() {
                let span = k1.time - k0.time;
                let w = if span > 0.0 { ((t - k0.time) / span) as f32 } else { 1.0 };
                return Some(
                    k0.points
                        .iter()
                        .zip(&k1.points)
                        .map(|(a, b)| {
                            [
                                a[0] + (b[0] - a[0]) * w,
                                a[1] + (b[1] - a[1]) * w,
                                a[2] + (b[2] - a[2]) * w,
                            ]
                        })
                        .collect(),
                );
            }
        }
        keys.last().map(|k| k.points.clone())
    }
}

impl SceneGraph for HostDoc {
    fn dag_nodes(&self) -> Vec<String> {
        // Depth-first from the roots, children in document order.
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut roots = Vec::new();
        for n in self.nodes.iter().filter(|n| n.is_dag()) {
            match n.parent.as_deref() {
                Some(p) if self.index.contains_key(p) => children.entry(p).or_default().push(&n.id),
                _ => roots.push(n.id.as_str()),
            }
        }

        let mut out = Vec::new();
        let mut stack: Vec<&str> = roots.into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            out.push(id.to_string());
            if let Some(kids) = children.get(id) {
                stack.extend(kids.iter().rev());
            }
        }
        out
    }

    fn node_type(&self, node: &str) -> Option<String> {
        self.node(node).map(|n| n.node_type.clone())
    }

    fn parent(&self, node: &str) -> Option<String> {
        self.node(node).and_then(|n| n.parent.clone())
    }

    fn attribute(&self, node: &str, attr: &str) -> Option<AttrValue> {
        if let Some(v) = self.animated_value(node, attr) {
            return Some(v);
        }
        self.node(node)
            .and_then(|n| n.params.get(attr))
            .and_then(AttrValue::from_json)
    }

    fn source_of(&self, plug: &Plug) -> Option<Plug> {
        self.connections
            .iter()
            .find(|c| {
                c.to.node == plug.node
                    && c.to.attr == plug.attr
                    && c.to.element == plug.element
                    && c.to.component == plug.component
            })
            .map(|c| c.from.to_plug())
    }

    fn connected_components(&self, plug: &Plug) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .connections
            .iter()
            .filter(|c| {
                c.to.node == plug.node && c.to.attr == plug.attr && c.to.element == plug.element
            })
            .filter_map(|c| c.to.component)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn connected_elements(&self, plug: &Plug) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .connections
            .iter()
            .filter(|c| c.to.node == plug.node && c.to.attr == plug.attr)
            .filter_map(|c| c.to.element)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn world_matrix(&self, node: &str) -> DMat4 {
        let mut m = DMat4::IDENTITY;
        let mut cursor = self.node(node);
        let mut guard = 0usize;
        while let Some(n) = cursor {
            m = self.local_matrix(n) * m;
            cursor = n.parent.as_deref().and_then(|p| self.node(p));
            guard += 1;
            if guard > self.nodes.len() {
                break;
            }
        }
        m
    }

    fn mesh(&self, node: &str, smooth_levels: u32) -> Option<MeshData> {
        let n = self.node(node)?;
        let mut mesh = n.mesh.clone()?;
        if let Some(points) = self.deformed_points(n) {
            if points.len() == mesh.points.len() {
                mesh.points = points;
            }
        }
        for _ in 0..smooth_levels {
            mesh = subdivide_linear(&mesh);
        }
        Some(mesh)
    }

    fn selection(&self) -> Vec<String> {
        self.selection.clone()
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn set_time(&mut self, time: f64) {
        self.current_time = time;
    }
}

/// Splits every n-gon into n quads through its centroid and edge midpoints.
///
/// Normals are dropped; face-varying uvs are split the same way as points.
pub fn subdivide_linear(mesh: &MeshData) -> MeshData {
    fn split<const N: usize>(
        values: &[[f32; N]],
        face_counts: &[u32],
        indices: &[u32],
    ) -> (Vec<[f32; N]>, Vec<u32>) {
        let mut out_values = values.to_vec();
        let mut out_indices = Vec::new();
        let mut edge_mid: HashMap<(u32, u32), u32> = HashMap::new();
        let avg = |ids: &[u32], vals: &[[f32; N]]| {
            let mut acc = [0.0f32; N];
            for &i in ids {
                let v = vals.get(i as usize).copied().unwrap_or([0.0; N]);
                for k in 0..N {
                    acc[k] += v[k];
                }
            }
            for a in &mut acc {
                *a /= ids.len().max(1) as f32;
            }
            acc
        };

        let mut offset = 0usize;
        for &count in face_counts {
            let count = count as usize;
            let Some(face) = indices.get(offset..offset + count) else {
                break;
            };
            offset += count;

            let centroid = out_values.len() as u32;
            out_values.push(avg(face, values));

            let mut mids = Vec::with_capacity(count);
            for i in 0..count {
                let a = face[i];
                let b = face[(i + 1) % count];
                let key = (a.min(b), a.max(b));
                let id = *edge_mid.entry(key).or_insert_with(|| {
                    out_values.push(avg(&[a, b], values));
                    (out_values.len() - 1) as u32
                });
                mids.push(id);
            }

            for i in 0..count {
                let prev = mids[(i + count - 1) % count];
                out_indices.extend_from_slice(&[face[i], mids[i], centroid, prev]);
            }
        }
        (out_values, out_indices)
    }

    let (points, face_indices) = split(&mesh.points, &mesh.face_counts, &mesh.face_indices);

    let (uvs, face_uv_indices) = if !mesh.face_uv_indices.is_empty() {
        split(&mesh.uvs, &mesh.face_counts, &mesh.face_uv_indices)
    } else if mesh.uvs.len() == mesh.points.len() {
        let (uvs, _) = split(&mesh.uvs, &mesh.face_counts, &mesh.face_indices);
        (uvs, Vec::new())
    } else {
        (Vec::new(), Vec::new())
    };

    let mut face_counts = Vec::new();
    let mut face_materials = Vec::new();
    for (face, &count) in mesh.face_counts.iter().enumerate() {
        for _ in 0..count {
            face_counts.push(4);
            if let Some(&m) = mesh.face_materials.get(face) {
                face_materials.push(m);
            }
        }
    }

    MeshData {
        points,
        normals: Vec::new(),
        uvs,
        face_counts,
        face_indices,
        face_normal_indices: Vec::new(),
        face_uv_indices,
        face_materials,
        shading_engines: mesh.shading_engines.clone(),
    }
}
