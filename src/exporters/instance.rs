use crate::{
    error::ExportResult,
    host::SceneGraph,
    target::{AssemblyInstance, EntityKind, EntityScope, TargetScene},
};

use super::{
    Aabb, CreateContext, DagNodeExporter, FlushContext, MotionStep, ShapeBase, ShapeExporter,
};

/// Stands in for a shape whose content matched an earlier one: reuses the master's
/// assembly under this shape's own transform.
pub struct InstanceExporter {
    base: ShapeBase,
    master: String,
    master_bounds: Option<Aabb>,
}

impl InstanceExporter {
    pub fn new(host: &dyn SceneGraph, dag_path: &str, master: &dyn ShapeExporter) -> Self {
        Self {
            base: ShapeBase::new(host, dag_path),
            master: master.shape_base().dag_path.clone(),
            master_bounds: master.local_bounds(),
        }
    }

    pub fn master(&self) -> &str {
        &self.master
    }
}

impl DagNodeExporter for InstanceExporter {
    fn dag_path(&self) -> &str {
        &self.base.dag_path
    }

    fn create_entities(&mut self, _host: &dyn SceneGraph, _ctx: &CreateContext<'_>) -> ExportResult<()> {
        Ok(())
    }

    fn export_transform_motion_step(&mut self, host: &dyn SceneGraph, step: MotionStep) {
        self.base.export_transform_step(host, step);
    }

    fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) -> ExportResult<()> {
        self.base.transform_sequence.optimize();
        let assembly = ctx
            .names
            .assemblies
            .get(&self.master)
            .cloned()
            .unwrap_or_else(|| format!("{}_assembly", self.master));
        let name = ctx
            .scene
            .main_assembly_mut()
            .assembly_instances
            .insert_unique(AssemblyInstance {
                name: self.base.assembly_instance_name(),
                params: self.base.visibility.clone(),
                assembly,
                transform_sequence: self.base.transform_sequence.clone(),
            });
        self.base
            .inserted
            .record(EntityScope::MainAssembly, EntityKind::AssemblyInstance, &name);
        Ok(())
    }

    fn bounding_box(&self) -> Option<Aabb> {
        self.base.world_bounds(self.master_bounds)
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

impl ShapeExporter for InstanceExporter {
    fn shape_base(&self) -> &ShapeBase {
        &self.base
    }

    fn shape_base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn local_bounds(&self) -> Option<Aabb> {
        self.master_bounds
    }
}
