use crate::{
    host::{Plug, SceneGraph},
    session::ExportServices,
    shading::{NetworkContext, NetworkKey},
    target::{EntityKind, EntityScope, InsertedEntities, Material, ParamArray, SurfaceShader, TargetScene},
};

use super::FlushContext;

/// Material binding of a shading engine: a physical surface shader plus an OSL material
/// pointing at the compiled surface network.
pub struct ShadingEngineExporter {
    node: String,
    network: Option<NetworkKey>,
    inserted: InsertedEntities,
}

impl ShadingEngineExporter {
    pub fn new(node: &str) -> Self {
        Self {
            node: node.to_string(),
            network: None,
            inserted: InsertedEntities::default(),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn surface_shader_name(&self) -> String {
        format!("{}_surface_shader", self.node)
    }

    pub fn material_name(&self) -> String {
        format!("{}_material", self.node)
    }

    /// Registers the network driving `surfaceShader`.
    pub fn create_exporters(&mut self, host: &dyn SceneGraph, services: &mut ExportServices) {
        match host.source_of(&Plug::new(&self.node, "surfaceShader")) {
            Some(source) => {
                self.network = Some(services.create_network(
                    host,
                    NetworkContext::Surface,
                    &source.node,
                    &source.attr,
                ));
            }
            None => log::warn!("[shading] {} has no surface shader connected", self.node),
        }
    }

    pub fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) {
        let group = self
            .network
            .as_ref()
            .and_then(|k| ctx.names.shader_groups.get(k))
            .cloned();

        let main = ctx.scene.main_assembly_mut();
        let surface_shader = main.surface_shaders.insert_unique(SurfaceShader {
            name: self.surface_shader_name(),
            model: "physical_surface_shader".to_string(),
            params: ParamArray::new(),
        });
        let mut params = ParamArray::new();
        params.insert("surface_shader", surface_shader.as_str());
        if let Some(group) = group {
            params.insert("osl_surface", group);
        }
        let material = main.materials.insert_unique(Material {
            name: self.material_name(),
            model: "osl_material".to_string(),
            params,
        });
        self.inserted
            .record(EntityScope::MainAssembly, EntityKind::SurfaceShader, &surface_shader);
        self.inserted
            .record(EntityScope::MainAssembly, EntityKind::Material, &material);
        ctx.names.materials.insert(self.node.clone(), material);
    }

    pub fn remove_entities(&mut self, scene: &mut TargetScene) {
        self.inserted.remove_from(scene);
    }
}
