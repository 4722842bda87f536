use std::collections::{HashMap, HashSet};

use crate::{
    error::ExportResult,
    exporters::{AlphaMapExporter, FlushContext, ShadingEngineExporter},
    host::SceneGraph,
    registry::ExporterRegistry,
    shading::{NetworkContext, NetworkKey, ShadingNetworkExporter},
    target::TargetScene,
};

/// Exporters for nodes shared between DAG exporters: shading engines, their shading
/// networks and alpha maps. Each node gets at most one exporter per session.
#[derive(Default)]
pub struct ExportServices {
    networks: Vec<ShadingNetworkExporter>,
    network_keys: HashSet<NetworkKey>,
    engines: Vec<ShadingEngineExporter>,
    engine_index: HashMap<String, usize>,
    alpha_maps: Vec<AlphaMapExporter>,
}

impl ExportServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the engine and, through it, the network it binds.
    pub fn create_shading_engine(&mut self, host: &dyn SceneGraph, engine: &str) {
        if self.engine_index.contains_key(engine) {
            return;
        }
        let mut exporter = ShadingEngineExporter::new(engine);
        exporter.create_exporters(host, self);
        self.engine_index
            .insert(engine.to_string(), self.engines.len());
        self.engines.push(exporter);
    }

    pub fn create_alpha_map(&mut self, _host: &dyn SceneGraph, node: &str) {
        if self.alpha_maps.iter().any(|a| a.node() == node) {
            return;
        }
        self.alpha_maps.push(AlphaMapExporter::new(node));
    }

    /// Registers the network rooted at `root` in `context`; asking twice returns the same
    /// key without compiling again.
    pub fn create_network(
        &mut self,
        _host: &dyn SceneGraph,
        context: NetworkContext,
        root: &str,
        output_attr: &str,
    ) -> NetworkKey {
        let network = ShadingNetworkExporter::new(context, root).with_output_attr(output_attr);
        let key = network.key().clone();
        if self.network_keys.insert(key.clone()) {
            log::debug!("[shading] network {root} ({context:?})");
            self.networks.push(network);
        }
        key
    }

    pub fn shading_engine(&self, node: &str) -> Option<&ShadingEngineExporter> {
        self.engine_index.get(node).map(|&i| &self.engines[i])
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    pub fn shading_engine_count(&self) -> usize {
        self.engines.len()
    }

    pub fn alpha_map_count(&self) -> usize {
        self.alpha_maps.len()
    }

    pub fn create_alpha_map_entities(&mut self, host: &dyn SceneGraph) {
        for alpha_map in &mut self.alpha_maps {
            alpha_map.create_entities(host);
        }
    }

    pub fn create_network_entities(
        &mut self,
        host: &dyn SceneGraph,
        registry: &ExporterRegistry,
    ) -> ExportResult<()> {
        for network in &mut self.networks {
            network.create_entities(host, registry)?;
        }
        Ok(())
    }

    /// Alpha maps, then networks, then engines: each stage refers to names resolved by the
    /// stage before.
    pub fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) {
        for alpha_map in &mut self.alpha_maps {
            alpha_map.flush_entities(ctx);
        }
        for network in &mut self.networks {
            network.flush_entities(ctx);
        }
        for engine in &mut self.engines {
            engine.flush_entities(ctx);
        }
    }

    pub fn remove_entities(&mut self, scene: &mut TargetScene) {
        for engine in self.engines.iter_mut().rev() {
            engine.remove_entities(scene);
        }
        for network in self.networks.iter_mut().rev() {
            network.remove_entities(scene);
        }
        for alpha_map in self.alpha_maps.iter_mut().rev() {
            alpha_map.remove_entities(scene);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostDoc, HostNode, Plug};

    fn doc_with_engine() -> HostDoc {
        let mut doc = HostDoc::new("services");
        doc.add_node(HostNode::new("lambert1", "lambert"));
        doc.add_node(HostNode::new("initialShadingGroup", "shadingEngine"));
        doc.connect(
            Plug::new("lambert1", "outColor"),
            Plug::new("initialShadingGroup", "surfaceShader"),
        );
        doc
    }

    #[test]
    fn shading_engines_and_networks_are_registered_once() {
        let doc = doc_with_engine();
        let mut services = ExportServices::new();
        services.create_shading_engine(&doc, "initialShadingGroup");
        services.create_shading_engine(&doc, "initialShadingGroup");
        let again = services.create_network(&doc, NetworkContext::Surface, "lambert1", "outColor");
        assert_eq!(services.shading_engine_count(), 1);
        assert_eq!(services.network_count(), 1);
        assert_eq!(again.root, "lambert1");
        assert!(services.shading_engine("initialShadingGroup").is_some());
    }

    #[test]
    fn same_root_in_another_context_is_a_separate_network() {
        let doc = doc_with_engine();
        let mut services = ExportServices::new();
        services.create_network(&doc, NetworkContext::Surface, "lambert1", "outColor");
        services.create_network(&doc, NetworkContext::SurfaceSwatch, "lambert1", "outColor");
        assert_eq!(services.network_count(), 2);
    }
}
