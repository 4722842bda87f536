//! Node type name -> exporter constructor tables.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use crate::{
    error::{ExportError, ExportResult},
    exporters::{
        AreaLightExporter, CameraExporter, DagNodeExporter, EnvLightExporter, LightExporter,
        MeshExporter, ProceduralGroupExporter, SkyModel,
    },
    host::SceneGraph,
    session::SessionMode,
    shading::{
        GenericShadingNodeExporter, ShaderInfo, ShadingNodeExporter, ShadingNodeRegistry,
        nodes::{FileExporter, Place3dTextureExporter, RampExporter, RemapExporter},
    },
};

/// Builds the exporter for one DAG node. `None` means the node is known but produces
/// nothing (hidden, not renderable, or a plain transform).
pub type DagExporterCtor =
    fn(&str, &dyn SceneGraph, SessionMode) -> Option<Box<dyn DagNodeExporter>>;

pub type ShadingExporterCtor = fn(&str, ShaderInfo) -> Box<dyn ShadingNodeExporter>;

pub struct ExporterRegistry {
    dag: HashMap<String, DagExporterCtor>,
    shading: HashMap<String, ShadingExporterCtor>,
    shaders: Arc<ShadingNodeRegistry>,
}

impl ExporterRegistry {
    /// Empty tables over the given shader metadata.
    pub fn new(shaders: Arc<ShadingNodeRegistry>) -> Self {
        Self {
            dag: HashMap::new(),
            shading: HashMap::new(),
            shaders,
        }
    }

    pub fn with_default_exporters() -> Self {
        let mut registry = Self::new(ShadingNodeRegistry::shared());

        registry.register_dag("transform", |_, _, _| None);
        registry.register_dag("camera", CameraExporter::create);
        for light in ["pointLight", "spotLight", "directionalLight"] {
            registry.register_dag(light, LightExporter::create);
        }
        registry.register_dag("areaLight", AreaLightExporter::create);
        registry.register_dag("appleseedPhysicalSkyLight", |node, host, _| {
            EnvLightExporter::create(node, host, SkyModel::PhysicalSky)
        });
        registry.register_dag("appleseedSkyDomeLight", |node, host, _| {
            EnvLightExporter::create(node, host, SkyModel::SkyDome)
        });
        registry.register_dag("mesh", MeshExporter::create);
        registry.register_dag("xgmDescription", ProceduralGroupExporter::create);

        registry.register_shading("file", FileExporter::boxed);
        registry.register_shading("ramp", RampExporter::boxed);
        for remap in ["remapValue", "remapColor", "remapHsv"] {
            registry.register_shading(remap, RemapExporter::boxed);
        }
        registry.register_shading("place3dTexture", Place3dTextureExporter::boxed);
        registry
    }

    /// The default registry, built once per process.
    pub fn shared() -> Arc<ExporterRegistry> {
        static SHARED: OnceLock<Arc<ExporterRegistry>> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(Self::with_default_exporters()))
            .clone()
    }

    pub fn register_dag(&mut self, type_name: &str, ctor: DagExporterCtor) {
        self.dag.insert(type_name.to_string(), ctor);
    }

    pub fn register_shading(&mut self, type_name: &str, ctor: ShadingExporterCtor) {
        self.shading.insert(type_name.to_string(), ctor);
    }

    pub fn shading_nodes(&self) -> &ShadingNodeRegistry {
        &self.shaders
    }

    pub fn create_dag(
        &self,
        node: &str,
        host: &dyn SceneGraph,
        mode: SessionMode,
    ) -> ExportResult<Option<Box<dyn DagNodeExporter>>> {
        let type_name = host.node_type(node).unwrap_or_default();
        let ctor = self
            .dag
            .get(&type_name)
            .ok_or_else(|| ExportError::NoExporterForNode {
                node: node.to_string(),
                type_name: type_name.clone(),
            })?;
        Ok(ctor(node, host, mode))
    }

    /// Any node type described by the shader metadata gets an exporter; node types with
    /// custom packing get their specialized one.
    pub fn create_shading(
        &self,
        node: &str,
        host: &dyn SceneGraph,
    ) -> ExportResult<Box<dyn ShadingNodeExporter>> {
        let type_name = host.node_type(node).unwrap_or_default();
        let Some(info) = self.shaders.get(&type_name).cloned() else {
            return Err(ExportError::NoExporterForNode {
                node: node.to_string(),
                type_name,
            });
        };
        Ok(match self.shading.get(&type_name) {
            Some(ctor) => ctor(node, info),
            None => Box::new(GenericShadingNodeExporter::new(node, info)),
        })
    }
}
