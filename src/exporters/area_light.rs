use std::collections::BTreeMap;

use crate::{
    error::ExportResult,
    host::{MeshData, SceneGraph},
    session::{ExportServices, SessionMode},
    shading::{NetworkContext, NetworkKey},
    target::{
        EntityKind, EntityScope, InsertedEntities, Material, MeshObject, ObjectInstance,
        ParamArray, TargetScene, Transform,
    },
};

use super::{
    CreateContext, DagNodeExporter, FlushContext, is_renderable, mesh::build_geometry,
    visibility_params, world_transform,
};

/// Emitting quad whose radiance comes from a shading network rooted at the light itself.
pub struct AreaLightExporter {
    dag_path: String,
    network: Option<NetworkKey>,
    transform: Transform,
    visibility: ParamArray,
    ready: bool,
    inserted: InsertedEntities,
}

impl AreaLightExporter {
    pub fn new(dag_path: &str) -> Self {
        Self {
            dag_path: dag_path.to_string(),
            network: None,
            transform: Transform::identity(),
            visibility: ParamArray::new(),
            ready: false,
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

    pub fn material_name(&self) -> String {
        format!("{}_area_light_material", self.dag_path)
    }

    /// Two-unit square in the XY plane, one face.
    fn grid() -> MeshData {
        MeshData {
            points: vec![
                [-1.0, -1.0, 0.0],
                [1.0, -1.0, 0.0],
                [1.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            face_counts: vec![4],
            face_indices: vec![0, 1, 2, 3],
            ..Default::default()
        }
    }
}

impl DagNodeExporter for AreaLightExporter {
    fn dag_path(&self) -> &str {
        &self.dag_path
    }

    fn create_exporters(&mut self, host: &dyn SceneGraph, services: &mut ExportServices) {
        self.network = Some(services.create_network(
            host,
            NetworkContext::AreaLight,
            &self.dag_path,
            "outColor",
        ));
    }

    fn create_entities(&mut self, host: &dyn SceneGraph, _ctx: &CreateContext<'_>) -> ExportResult<()> {
        self.transform = world_transform(host, &self.dag_path);
        self.visibility = visibility_params(host, &self.dag_path);
        self.ready = true;
        Ok(())
    }

    fn supports_motion_blur(&self) -> bool {
        false
    }

    fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) -> ExportResult<()> {
        if !std::mem::take(&mut self.ready) {
            return Ok(());
        }
        let mut material_params = ParamArray::new();
        match self.network.as_ref().and_then(|k| ctx.names.shader_groups.get(k)) {
            Some(group) => {
                material_params.insert("osl_surface", group.as_str());
            }
            None => log::warn!("[session] area light {} has no emission network", self.dag_path),
        }

        let main = ctx.scene.main_assembly_mut();
        let material = main.materials.insert_unique(Material {
            name: self.material_name(),
            model: "osl_material".to_string(),
            params: material_params,
        });

        let mut object_params = ParamArray::new();
        object_params
            .insert("primitive", "grid")
            .insert("resolution_u", "1")
            .insert("resolution_v", "1")
            .insert("width", "2")
            .insert("height", "2");
        let object = main.objects.insert_unique(MeshObject {
            name: self.dag_path.clone(),
            params: object_params,
            material_slots: vec!["default".to_string()],
            geometry: Some(build_geometry(&Self::grid())),
        });

        let materials = BTreeMap::from([("default".to_string(), material.clone())]);
        let instance = main.object_instances.insert_unique(ObjectInstance {
            name: format!("{}_instance", self.dag_path),
            params: self.visibility.clone(),
            object: object.clone(),
            transform: self.transform,
            front_materials: materials.clone(),
            back_materials: materials,
        });

        self.inserted
            .record(EntityScope::MainAssembly, EntityKind::Material, &material);
        self.inserted
            .record(EntityScope::MainAssembly, EntityKind::Object, &object);
        self.inserted
            .record(EntityScope::MainAssembly, EntityKind::ObjectInstance, &instance);
        Ok(())
    }

    fn remove_entities(&mut self, scene: &mut TargetScene) {
        self.inserted.remove_from(scene);
    }
}
