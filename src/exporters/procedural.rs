use crate::{
    error::ExportResult,
    host::SceneGraph,
    session::SessionMode,
    target::{Assembly, AssemblyInstance, EntityKind, EntityScope, ParamArray, TargetScene},
};

use super::{
    CreateContext, DagNodeExporter, FlushContext, MotionStep, ShapeBase, ShapeExporter,
    is_renderable,
};

/// Attributes of a procedural description forwarded to the patch assembly.
const PROCEDURAL_ATTRIBUTES: [&str; 3] = ["description", "palette", "patch"];

/// Hair/fur description expanded by the renderer from a procedural assembly.
pub struct ProceduralGroupExporter {
    base: ShapeBase,
    assembly: Option<Assembly>,
}

impl ProceduralGroupExporter {
    pub fn new(host: &dyn SceneGraph, dag_path: &str) -> Self {
        Self {
            base: ShapeBase::new(host, dag_path),
            assembly: None,
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
        Some(Box::new(Self::new(host, node)))
    }
}

impl DagNodeExporter for ProceduralGroupExporter {
    fn dag_path(&self) -> &str {
        &self.base.dag_path
    }

    fn create_entities(&mut self, host: &dyn SceneGraph, _ctx: &CreateContext<'_>) -> ExportResult<()> {
        let mut params = ParamArray::new();
        for attr in PROCEDURAL_ATTRIBUTES {
            match host.attr_string(&self.base.dag_path, attr) {
                Some(value) => {
                    params.insert(attr, value);
                }
                None => log::debug!("[session] {} has no {attr}", self.base.dag_path),
            }
        }
        let mut assembly = Assembly::new(self.base.assembly_name());
        assembly.model = Some("xgen_patch_assembly".to_string());
        assembly.params = params;
        self.assembly = Some(assembly);
        Ok(())
    }

    fn export_transform_motion_step(&mut self, host: &dyn SceneGraph, step: MotionStep) {
        self.base.export_transform_step(host, step);
    }

    fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) -> ExportResult<()> {
        let Some(assembly) = self.assembly.take() else {
            return Ok(());
        };
        self.base.transform_sequence.optimize();
        let main = ctx.scene.main_assembly_mut();
        let assembly_name = main.assemblies.insert_unique(assembly);
        let instance_name = main.assembly_instances.insert_unique(AssemblyInstance {
            name: format!("{}_assembly_instance", self.base.dag_path),
            params: self.base.visibility.clone(),
            assembly: assembly_name.clone(),
            transform_sequence: self.base.transform_sequence.clone(),
        });
        self.base
            .inserted
            .record(EntityScope::MainAssembly, EntityKind::Assembly, &assembly_name);
        self.base
            .inserted
            .record(EntityScope::MainAssembly, EntityKind::AssemblyInstance, &instance_name);
        Ok(())
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

impl ShapeExporter for ProceduralGroupExporter {
    fn shape_base(&self) -> &ShapeBase {
        &self.base
    }

    fn shape_base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }
}
