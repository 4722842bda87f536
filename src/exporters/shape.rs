use crate::{
    hash::ContentHash,
    host::SceneGraph,
    target::{
        Assembly, AssemblyInstance, EntityKind, EntityScope, InsertedEntities, MeshObject,
        ObjectInstance, ParamArray, TargetScene, Transform, TransformSequence,
    },
};

use super::{Aabb, FlushContext, MotionStep, visibility_params, world_transform};

/// State every shape exporter shares: transform samples, instancing count and the entities
/// it committed.
#[derive(Debug, Clone, Default)]
pub struct ShapeBase {
    pub dag_path: String,
    pub transform_sequence: TransformSequence,
    /// How many instances reference this shape as their master.
    pub instance_count: usize,
    pub visibility: ParamArray,
    pub inserted: InsertedEntities,
}

impl ShapeBase {
    pub fn new(host: &dyn SceneGraph, dag_path: &str) -> Self {
        Self {
            dag_path: dag_path.to_string(),
            visibility: visibility_params(host, dag_path),
            ..Default::default()
        }
    }

    pub fn export_transform_step(&mut self, host: &dyn SceneGraph, step: MotionStep) {
        self.transform_sequence
            .set_transform(step.shutter_time, world_transform(host, &self.dag_path));
    }

    /// A wrapping assembly is needed for transform motion or when other shapes reuse this
    /// one's geometry.
    pub fn needs_wrapper(&self) -> bool {
        self.transform_sequence.len() > 1 || self.instance_count > 0
    }

    pub fn assembly_name(&self) -> String {
        format!("{}_assembly", self.dag_path)
    }

    pub fn assembly_instance_name(&self) -> String {
        format!("{}_assembly_inst", self.dag_path)
    }

    /// World bounds over every transform sample.
    pub fn world_bounds(&self, local: Option<Aabb>) -> Option<Aabb> {
        let local = local?;
        let keys = self.transform_sequence.keys();
        if keys.is_empty() {
            return Some(local);
        }
        keys.iter()
            .map(|k| local.transformed(&k.transform.matrix))
            .reduce(|a, b| a.union(&b))
    }

    /// Commits the object and its instance, wrapped in their own assembly when
    /// [`needs_wrapper`](Self::needs_wrapper) says so.
    pub fn flush_object(
        &mut self,
        ctx: &mut FlushContext<'_>,
        object: MeshObject,
        mut instance: ObjectInstance,
    ) {
        self.transform_sequence.optimize();
        instance.params.merge(&self.visibility);

        if !self.needs_wrapper() {
            let main = ctx.scene.main_assembly_mut();
            let object_name = main.objects.insert_unique(object);
            instance.object = object_name.clone();
            instance.transform = self.transform_sequence.earliest();
            let instance_name = main.object_instances.insert_unique(instance);
            self.inserted
                .record(EntityScope::MainAssembly, EntityKind::Object, &object_name);
            self.inserted
                .record(EntityScope::MainAssembly, EntityKind::ObjectInstance, &instance_name);
            return;
        }

        let mut assembly = Assembly::new(self.assembly_name());
        instance.object = assembly.objects.insert_unique(object);
        instance.transform = Transform::identity();
        assembly.object_instances.insert_unique(instance);
        self.insert_wrapper(ctx, assembly);
    }

    /// Inserts `assembly` into the main assembly plus an instance of it carrying the
    /// transform sequence.
    pub fn insert_wrapper(&mut self, ctx: &mut FlushContext<'_>, assembly: Assembly) {
        let main = ctx.scene.main_assembly_mut();
        let assembly_name = main.assemblies.insert_unique(assembly);
        let instance_name = main.assembly_instances.insert_unique(AssemblyInstance {
            name: self.assembly_instance_name(),
            params: self.visibility.clone(),
            assembly: assembly_name.clone(),
            transform_sequence: self.transform_sequence.clone(),
        });
        self.inserted
            .record(EntityScope::MainAssembly, EntityKind::Assembly, &assembly_name);
        self.inserted
            .record(EntityScope::MainAssembly, EntityKind::AssemblyInstance, &instance_name);
        ctx.names
            .assemblies
            .insert(self.dag_path.clone(), assembly_name);
    }

    pub fn remove_entities(&mut self, scene: &mut TargetScene) {
        self.inserted.remove_from(scene);
    }
}

/// DAG exporters with geometry that can take part in instancing.
pub trait ShapeExporter {
    fn shape_base(&self) -> &ShapeBase;

    fn shape_base_mut(&mut self) -> &mut ShapeBase;

    /// Content hash of everything that makes two shapes interchangeable; `None` when it
    /// cannot be computed cheaply.
    fn hash(&self) -> Option<ContentHash> {
        None
    }

    /// Another shape now instances this one.
    fn instance_created(&mut self) {
        self.shape_base_mut().instance_count += 1;
    }

    /// Object-space bounds.
    fn local_bounds(&self) -> Option<Aabb> {
        None
    }
}
