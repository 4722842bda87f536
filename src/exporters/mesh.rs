//! Polygon mesh export: triangulation, material slots, deformation poses and
//! content-addressed geometry files.

use std::collections::BTreeMap;

use crate::{
    error::ExportResult,
    hash::ContentHash,
    host::{MeshData, SceneGraph},
    session::{ExportServices, SessionMode},
    target::{
        MeshGeometry, MeshObject, MeshPose, NO_INDEX, ObjectInstance, ParamArray, TargetScene,
        Triangle, mesh_file::write_mesh_file_if_missing,
    },
};

use super::{
    Aabb, CreateContext, DagNodeExporter, FlushContext, MotionStep, ShapeBase, ShapeExporter,
    connected_node, hash_bindings, is_renderable,
};

/// Slot used when no shading engine is bound.
pub const DEFAULT_SLOT: &str = "default";

pub struct MeshExporter {
    base: ShapeBase,
    /// Shading engine bound to each material slot; slots are named after their engine.
    slots: Vec<String>,
    alpha_map: Option<String>,
    smooth_levels: u32,
    export_to_file: bool,
    object: Option<MeshObject>,
    hash: Option<ContentHash>,
    bounds: Option<Aabb>,
}

impl MeshExporter {
    pub fn new(host: &dyn SceneGraph, dag_path: &str) -> Self {
        Self {
            base: ShapeBase::new(host, dag_path),
            slots: Vec::new(),
            alpha_map: None,
            smooth_levels: 0,
            export_to_file: false,
            object: None,
            hash: None,
            bounds: None,
        }
    }

    pub fn create(
        node: &str,
        host: &dyn SceneGraph,
        _mode: SessionMode,
    ) -> Option<Box<dyn DagNodeExporter>> {
        if !is_renderable(host, node) {
            log::debug!("[mesh] {node} is not renderable");
            return None;
        }
        Some(Box::new(Self::new(host, node)))
    }

    /// The object as built so far; `None` before `create_entities` and after flush.
    pub fn object(&self) -> Option<&MeshObject> {
        self.object.as_ref()
    }

    fn compute_hash(&self, geometry: &MeshGeometry) -> ContentHash {
        let mut hash = ContentHash::new();
        hash.append_slice(&geometry.triangles);
        hash.append_slice(&geometry.vertices);
        hash.append_slice(&geometry.normals);
        hash.append_slice(&geometry.tangents);
        hash.append_slice(&geometry.tex_coords);
        hash_bindings(&mut hash, &self.slots, self.alpha_map.as_deref());
        // Instances reuse the master's object instance, visibility flags included.
        hash.append_params(&self.base.visibility);
        hash
    }
}

impl DagNodeExporter for MeshExporter {
    fn dag_path(&self) -> &str {
        &self.base.dag_path
    }

    fn create_exporters(&mut self, host: &dyn SceneGraph, services: &mut ExportServices) {
        if let Some(data) = host.mesh(&self.base.dag_path, 0) {
            self.slots = data.shading_engines.clone();
        }
        for engine in &self.slots {
            services.create_shading_engine(host, engine);
        }
        self.alpha_map = connected_node(host, &self.base.dag_path, "alphaMap");
        if let Some(alpha_map) = &self.alpha_map {
            services.create_alpha_map(host, alpha_map);
        }
    }

    fn create_entities(&mut self, host: &dyn SceneGraph, ctx: &CreateContext<'_>) -> ExportResult<()> {
        self.smooth_levels = ctx.options.subdivision_levels;
        self.export_to_file = ctx.options.export_meshes_to_files;

        let Some(data) = host.mesh(&self.base.dag_path, self.smooth_levels) else {
            log::warn!("[mesh] {} has no mesh data, skipping", self.base.dag_path);
            return Ok(());
        };
        let mut geometry = build_geometry(&data);
        if ctx.options.compute_tangents && !geometry.tex_coords.is_empty() {
            geometry.tangents = compute_tangents(&geometry);
        }

        self.bounds = Aabb::from_points(&geometry.vertices);
        self.hash = (ctx.motion.deformation_times.len() <= 1).then(|| self.compute_hash(&geometry));

        let material_slots = if self.slots.is_empty() {
            vec![DEFAULT_SLOT.to_string()]
        } else {
            self.slots.clone()
        };
        log::debug!(
            "[mesh] {}: {} vertices, {} triangles, {} slots",
            self.base.dag_path,
            geometry.vertices.len(),
            geometry.triangles.len(),
            material_slots.len()
        );
        self.object = Some(MeshObject {
            name: self.base.dag_path.clone(),
            params: ParamArray::new(),
            material_slots,
            geometry: Some(geometry),
        });
        Ok(())
    }

    fn export_transform_motion_step(&mut self, host: &dyn SceneGraph, step: MotionStep) {
        self.base.export_transform_step(host, step);
    }

    fn export_shape_motion_step(&mut self, host: &dyn SceneGraph, step: MotionStep) {
        if step.count <= 1 {
            return;
        }
        let Some(geometry) = self.object.as_mut().and_then(|o| o.geometry.as_mut()) else {
            return;
        };
        let Some(data) = host.mesh(&self.base.dag_path, self.smooth_levels) else {
            return;
        };
        if data.points.len() != geometry.vertices.len() {
            log::warn!(
                "[mesh] {}: topology changes at time {}, skipping deformation sample",
                self.base.dag_path,
                step.time
            );
            return;
        }
        let normals = if data.normals.len() == geometry.normals.len() {
            data.normals
        } else {
            geometry.normals.clone()
        };
        if step.index == 0 {
            geometry.vertices = data.points;
            geometry.normals = normals;
        } else {
            geometry.motion_poses.push(MeshPose {
                vertices: data.points,
                normals,
            });
        }
    }

    fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) -> ExportResult<()> {
        let Some(mut object) = self.object.take() else {
            return Ok(());
        };

        if let Some(alpha_map) = &self.alpha_map {
            match ctx.names.alpha_maps.get(alpha_map) {
                Some(instance) => {
                    object.params.insert("alpha_map", instance.as_str());
                }
                None => log::warn!(
                    "[mesh] {}: alpha map {alpha_map} was not exported",
                    self.base.dag_path
                ),
            }
        }

        if self.export_to_file && ctx.mode == SessionMode::Export {
            if let (Some(hash), Some(dir), Some(geometry)) =
                (self.hash, ctx.project_dir, object.geometry.as_ref())
            {
                let (file, written) =
                    write_mesh_file_if_missing(dir, &hash, geometry, &object.material_slots)?;
                log::debug!(
                    "[mesh] {} -> {} ({})",
                    self.base.dag_path,
                    file.display(),
                    if written { "written" } else { "reused" }
                );
                object.params.insert("filename", file.to_string_lossy().into_owned());
                object.geometry = None;
            }
        }

        let mut materials = BTreeMap::new();
        for slot in &self.slots {
            match ctx.names.materials.get(slot) {
                Some(material) => {
                    materials.insert(slot.clone(), material.clone());
                }
                None => log::warn!(
                    "[mesh] {}: shading engine {slot} has no material",
                    self.base.dag_path
                ),
            }
        }
        let instance = ObjectInstance {
            name: format!("{}_instance", self.base.dag_path),
            front_materials: materials.clone(),
            back_materials: materials,
            ..Default::default()
        };
        self.base.flush_object(ctx, object, instance);
        Ok(())
    }

    fn bounding_box(&self) -> Option<Aabb> {
        self.base.world_bounds(self.bounds)
    }

    fn remove_entities(&mut self, scene: &mut TargetScene) {
        self.base.remove_entities(scene);
    }

    fn as_shape(&self) -> Option<&dyn ShapeExporter> {
        Some(self)
    }

    fn as_shape_mut(&mut self) -> Option<&mut dyn ShapeExporter> {
        Some(self)
    }
}

impl ShapeExporter for MeshExporter {
    fn shape_base(&self) -> &ShapeBase {
        &self.base
    }

    fn shape_base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn hash(&self) -> Option<ContentHash> {
        self.hash
    }

    fn local_bounds(&self) -> Option<Aabb> {
        self.bounds
    }
}

/// Fan-triangulates every face. Faces with fewer than three corners or out-of-range
/// indices are dropped.
pub fn build_geometry(data: &MeshData) -> MeshGeometry {
    let corner = |indices: &[u32], fallback: u32, available: bool, i: usize| -> Option<u32> {
        if !available {
            return Some(NO_INDEX);
        }
        if indices.is_empty() {
            return Some(fallback);
        }
        indices.get(i).copied()
    };
    let has_normals = !data.normals.is_empty();
    let has_uvs = !data.uvs.is_empty();

    let mut triangles = Vec::new();
    let mut offset = 0usize;
    let mut dropped = 0usize;
    for (face, &count) in data.face_counts.iter().enumerate() {
        let count = count as usize;
        let material = data.face_materials.get(face).copied().unwrap_or(0);
        let corners: Option<Vec<(u32, u32, u32)>> = (offset..offset + count)
            .map(|i| {
                let v = data.face_indices.get(i).copied()?;
                if v as usize >= data.points.len() {
                    return None;
                }
                let n = corner(&data.face_normal_indices, v, has_normals, i)?;
                let t = corner(&data.face_uv_indices, v, has_uvs, i)?;
                Some((v, n, t))
            })
            .collect();
        offset += count;
        let Some(corners) = corners.filter(|c| c.len() >= 3) else {
            dropped += 1;
            continue;
        };
        let first = corners[0];
        for pair in corners[1..].windows(2) {
            let (b, c) = (pair[0], pair[1]);
            triangles.push(Triangle {
                v0: first.0,
                v1: b.0,
                v2: c.0,
                n0: first.1,
                n1: b.1,
                n2: c.1,
                t0: first.2,
                t1: b.2,
                t2: c.2,
                material,
            });
        }
    }
    if dropped > 0 {
        log::warn!("[mesh] dropped {dropped} degenerate or invalid faces");
    }

    MeshGeometry {
        vertices: data.points.clone(),
        normals: data.normals.clone(),
        tex_coords: data.uvs.clone(),
        tangents: Vec::new(),
        triangles,
        motion_poses: Vec::new(),
    }
}

/// Per-vertex tangents from uv gradients, averaged over adjacent triangles.
pub fn compute_tangents(geometry: &MeshGeometry) -> Vec<[f32; 3]> {
    let mut acc = vec![[0.0f32; 3]; geometry.vertices.len()];
    for tri in &geometry.triangles {
        if tri.t0 == NO_INDEX {
            continue;
        }
        let (Some(p0), Some(p1), Some(p2)) = (
            geometry.vertices.get(tri.v0 as usize),
            geometry.vertices.get(tri.v1 as usize),
            geometry.vertices.get(tri.v2 as usize),
        ) else {
            continue;
        };
        let (Some(uv0), Some(uv1), Some(uv2)) = (
            geometry.tex_coords.get(tri.t0 as usize),
            geometry.tex_coords.get(tri.t1 as usize),
            geometry.tex_coords.get(tri.t2 as usize),
        ) else {
            continue;
        };
        let e1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
        let e2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];
        let (du1, dv1) = (uv1[0] - uv0[0], uv1[1] - uv0[1]);
        let (du2, dv2) = (uv2[0] - uv0[0], uv2[1] - uv0[1]);
        let det = du1 * dv2 - du2 * dv1;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let t = [
            (e1[0] * dv2 - e2[0] * dv1) * r,
            (e1[1] * dv2 - e2[1] * dv1) * r,
            (e1[2] * dv2 - e2[2] * dv1) * r,
        ];
        for v in [tri.v0, tri.v1, tri.v2] {
            let a = &mut acc[v as usize];
            a[0] += t[0];
            a[1] += t[1];
            a[2] += t[2];
        }
    }
    acc.into_iter()
        .map(|t| {
            let len = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
            if len > 0.0 {
                [t[0] / len, t[1] / len, t[2] / len]
            } else {
                [1.0, 0.0, 0.0]
            }
        })
        .collect()
}
