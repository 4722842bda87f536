//! Content-hash deduplication of shape exporters.

use std::collections::HashMap;

use crate::{
    exporters::{DagNodeExporter, InstanceExporter},
    hash::ContentHash,
    host::SceneGraph,
};

/// Replaces every shape whose hash matches an earlier shape with an [`InstanceExporter`]
/// of that earlier shape. Masters are the first shape seen with a hash, in `exporters`
/// order. Returns the number of instances created.
pub fn create_instances(host: &dyn SceneGraph, exporters: &mut [Box<dyn DagNodeExporter>]) -> usize {
    let mut masters: HashMap<ContentHash, usize> = HashMap::new();
    let mut created = 0;
    for i in 0..exporters.len() {
        let Some(hash) = exporters[i].as_shape().and_then(|s| s.hash()) else {
            continue;
        };
        let Some(&master) = masters.get(&hash) else {
            masters.insert(hash, i);
            continue;
        };

        let dag_path = exporters[i].dag_path().to_string();
        let Some(master_shape) = exporters[master].as_shape() else {
            continue;
        };
        let instance = InstanceExporter::new(host, &dag_path, master_shape);
        log::debug!(
            "[instancing] {dag_path} becomes an instance of {}",
            instance.master()
        );
        exporters[i] = Box::new(instance);
        if let Some(master_shape) = exporters[master].as_shape_mut() {
            master_shape.instance_created();
        }
        created += 1;
    }
    if created > 0 {
        log::info!(
            "[instancing] {created} instances of {} masters",
            masters.len()
        );
    }
    created
}
