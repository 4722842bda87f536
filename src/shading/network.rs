//! Compiles a connected set of shading nodes into one shader group.

use std::collections::{HashMap, HashSet};

use super::{
    metadata::{ParamInfo, ParamType},
    node::{ADAPTOR_COMPOUND_PARAM, AdaptorKind, ShadingNodeExporter},
};
use crate::{
    error::ExportResult,
    exporters::FlushContext,
    host::{Plug, SceneGraph},
    registry::ExporterRegistry,
    target::{EntityKind, EntityScope, InsertedEntities, ParamArray, ShaderGroup, TargetScene},
    utils::{fmt_f64, numbered_string},
};

/// Why a network is compiled; selects the terminal adaptor appended on flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkContext {
    Surface,
    SurfaceSwatch,
    TextureSwatch,
    AreaLight,
}

impl NetworkContext {
    fn terminal(self, source: &ParamInfo) -> (&'static str, &'static str, &'static str) {
        match self {
            NetworkContext::Surface | NetworkContext::SurfaceSwatch => {
                ("as_maya_closure2Surface", "closureToSurface", "in_input")
            }
            NetworkContext::TextureSwatch => {
                let input = if source.param_type == ParamType::Float {
                    "in_scalar"
                } else {
                    "in_color"
                };
                ("as_maya_texture2Surface", "textureToSurface", input)
            }
            NetworkContext::AreaLight => {
                ("as_maya_areaLight2Surface", "areaLightToSurface", "in_input")
            }
        }
    }
}

/// Identity of a compiled network: its root node in one context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkKey {
    pub root: String,
    pub context: NetworkContext,
}

pub struct ShadingNetworkExporter {
    key: NetworkKey,
    output_attr: String,
    group: Option<ShaderGroup>,
    terminal_source: Option<ParamInfo>,
    resolved_name: Option<String>,
    /// Array inputs whose element connections could not be expressed, one per parameter.
    skipped_elements: Vec<Plug>,
    inserted: InsertedEntities,
}

impl ShadingNetworkExporter {
    pub fn new(context: NetworkContext, root: impl Into<String>) -> Self {
        Self {
            key: NetworkKey {
                root: root.into(),
                context,
            },
            output_attr: "outColor".to_string(),
            group: None,
            terminal_source: None,
            resolved_name: None,
            skipped_elements: Vec::new(),
            inserted: InsertedEntities::default(),
        }
    }

    /// Output attribute of the root wired to the terminal adaptor.
    pub fn with_output_attr(mut self, attr: impl Into<String>) -> Self {
        self.output_attr = attr.into();
        self
    }

    pub fn key(&self) -> &NetworkKey {
        &self.key
    }

    pub fn root(&self) -> &str {
        &self.key.root
    }

    pub fn shader_group_base_name(&self) -> String {
        format!("{}_shader_group", self.key.root)
    }

    /// The compiled group before flush.
    pub fn shader_group(&self) -> Option<&ShaderGroup> {
        self.group.as_ref()
    }

    /// Name the group was inserted under.
    pub fn resolved_name(&self) -> Option<&str> {
        self.resolved_name.as_deref()
    }

    pub fn skipped_element_connections(&self) -> &[Plug] {
        &self.skipped_elements
    }

    pub fn create_entities(
        &mut self,
        host: &dyn SceneGraph,
        registry: &ExporterRegistry,
    ) -> ExportResult<()> {
        let mut compiler = NetworkCompiler {
            host,
            exporters: HashMap::new(),
            order: Vec::new(),
        };
        compiler.collect_exporters(registry, &self.key.root);

        let Some(root) = compiler.exporters.get(&self.key.root) else {
            log::warn!(
                "[shading] network root {} is not a supported shading node",
                self.key.root
            );
            return Ok(());
        };
        self.terminal_source = root.output_param_for(&Plug::new(&self.key.root, &self.output_attr));
        if self.terminal_source.is_none() {
            log::warn!(
                "[shading] {} has no output parameter for {}",
                self.key.root,
                self.output_attr
            );
        }

        let mut builder = GroupBuilder {
            group: ShaderGroup::new(self.shader_group_base_name()),
            output_adaptors: HashMap::new(),
            skipped_elements: Vec::new(),
        };
        for node in &compiler.order {
            if let Some(exporter) = compiler.exporters.get(node) {
                builder.export_node(host, &compiler.exporters, exporter.as_ref());
            }
        }
        log::debug!(
            "[shading] compiled {} with {} shaders",
            self.key.root,
            builder.group.shader_count()
        );
        self.group = Some(builder.group);
        self.skipped_elements = builder.skipped_elements;
        Ok(())
    }

    /// Appends the terminal adaptor and inserts the group into the main assembly.
    pub fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) {
        let Some(mut group) = self.group.take() else {
            return;
        };
        if let Some(source) = &self.terminal_source {
            let (shader, layer, input) = self.key.context.terminal(source);
            group.add_shader("surface", shader, layer, ParamArray::new());
            group.add_connection(&self.key.root, &source.name, layer, input);
        }
        let name = ctx.scene.main_assembly_mut().shader_groups.insert_unique(group);
        self.inserted
            .record(EntityScope::MainAssembly, EntityKind::ShaderGroup, &name);
        ctx.names.shader_groups.insert(self.key.clone(), name.clone());
        self.resolved_name = Some(name);
    }

    pub fn remove_entities(&mut self, scene: &mut TargetScene) {
        self.inserted.remove_from(scene);
    }
}

type ExporterMap = HashMap<String, Box<dyn ShadingNodeExporter>>;

struct NetworkCompiler<'a> {
    host: &'a dyn SceneGraph,
    exporters: ExporterMap,
    /// Producers before consumers.
    order: Vec<String>,
}

impl NetworkCompiler<'_> {
    /// Depth-first over upstream connections with an explicit stack; each node is
    /// emitted after everything it reads from.
    fn collect_exporters(&mut self, registry: &ExporterRegistry, root: &str) {
        let mut visited = HashSet::new();
        let mut stack = vec![(root.to_string(), false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                self.order.push(node);
                continue;
            }
            if !visited.insert(node.clone()) {
                continue;
            }
            let exporter = match registry.create_shading(&node, self.host) {
                Ok(exporter) => exporter,
                Err(e) => {
                    log::warn!("[shading] skipping {node}: {e}");
                    continue;
                }
            };
            let upstream = upstream_nodes(self.host, exporter.as_ref());
            self.exporters.insert(node.clone(), exporter);
            stack.push((node, true));
            for src in upstream.into_iter().rev() {
                if !visited.contains(&src) {
                    stack.push((src, false));
                }
            }
        }
    }
}

fn upstream_nodes(host: &dyn SceneGraph, exporter: &dyn ShadingNodeExporter) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |node: String| {
        if !out.contains(&node) {
            out.push(node);
        }
    };
    for param in exporter.shader_info().inputs() {
        let plug = Plug::new(exporter.node(), &param.attribute);
        if let Some(src) = host.source_of(&plug) {
            push(src.node);
        }
        for c in host.connected_components(&plug) {
            if let Some(src) = host.source_of(&plug.clone().with_component(c)) {
                push(src.node);
            }
        }
    }
    out
}

struct GroupBuilder {
    group: ShaderGroup,
    /// Decomposing adaptor layer per compound source plug.
    output_adaptors: HashMap<Plug, String>,
    skipped_elements: Vec<Plug>,
}

impl GroupBuilder {
    fn export_node(
        &mut self,
        host: &dyn SceneGraph,
        exporters: &ExporterMap,
        exporter: &dyn ShadingNodeExporter,
    ) {
        let node = exporter.node();
        let info = exporter.shader_info();

        // Input adaptors go in before the node's own shader.
        for param in info.inputs() {
            let plug = Plug::new(node, &param.attribute);
            if host.is_connected(&plug) {
                continue;
            }
            let components = host.connected_components(&plug);
            if !components.is_empty() {
                match AdaptorKind::input(&param.param_type) {
                    Some(kind) => {
                        self.input_adaptor(host, exporters, &plug, param, kind, &components)
                    }
                    None => log::warn!(
                        "[shading] skipping component connections to {plug} of type {:?}",
                        param.param_type
                    ),
                }
            } else if !host.connected_elements(&plug).is_empty()
                && !self.skipped_elements.contains(&plug)
            {
                log::warn!("[shading] skipping array element connections to {plug}");
                self.skipped_elements.push(plug);
            }
        }

        let params = exporter.export_parameters(host);
        self.group
            .add_shader(&info.shader_type, &info.shader_name, node, params);

        for param in info.inputs() {
            let plug = Plug::new(node, &param.attribute);
            let Some(src) = host.source_of(&plug) else {
                continue;
            };
            if let Some((layer, out)) = self.resolve_source(exporters, &src) {
                self.group.add_connection(&layer, &out, node, &param.name);
            }
        }
    }

    fn input_adaptor(
        &mut self,
        host: &dyn SceneGraph,
        exporters: &ExporterMap,
        plug: &Plug,
        param: &ParamInfo,
        kind: AdaptorKind,
        connected: &[usize],
    ) {
        let mut params = ParamArray::new();
        let mut links = Vec::new();
        for (i, comp) in kind.components.iter().enumerate() {
            let child = plug.clone().with_component(i);
            if connected.contains(&i) {
                let Some(src) = host.source_of(&child) else {
                    continue;
                };
                if let Some(link) = self.resolve_source(exporters, &src) {
                    links.push((link, *comp));
                }
            } else if let Some(v) = host.plug_value(&child).and_then(|v| v.as_f64()) {
                params.insert(*comp, format!("float {}", fmt_f64(v)));
            }
        }

        let layer = numbered_string(kind.layer_pattern, self.group.shader_count());
        self.group.add_shader("shader", kind.shader, &layer, params);
        for ((src_layer, src_param), comp) in links {
            self.group.add_connection(&src_layer, &src_param, &layer, comp);
        }
        self.group
            .add_connection(&layer, ADAPTOR_COMPOUND_PARAM, &plug.node, &param.name);
    }

    /// Layer and parameter a connection from `src` reads; component plugs go through a
    /// decomposing adaptor created on first use.
    fn resolve_source(&mut self, exporters: &ExporterMap, src: &Plug) -> Option<(String, String)> {
        let Some(src_exporter) = exporters.get(&src.node) else {
            log::warn!("[shading] skipping connection from unsupported node {}", src.node);
            return None;
        };

        let Some(component) = src.component else {
            let Some(param) = src_exporter.output_param_for(src) else {
                log::warn!("[shading] no output parameter for {src}");
                return None;
            };
            return Some((src.node.clone(), param.name));
        };

        let parent = src.parent();
        let Some(param) = src_exporter.output_param_for(&parent) else {
            log::warn!("[shading] no output parameter for {parent}");
            return None;
        };
        let Some(kind) = AdaptorKind::output(&param.param_type) else {
            log::warn!(
                "[shading] skipping component connection from {src} of type {:?}",
                param.param_type
            );
            return None;
        };
        let comp = kind.components.get(component)?;

        let layer = match self.output_adaptors.get(&parent) {
            Some(layer) => layer.clone(),
            None => {
                let layer = numbered_string(kind.layer_pattern, self.group.shader_count());
                self.group
                    .add_shader("shader", kind.shader, &layer, ParamArray::new());
                self.group
                    .add_connection(&parent.node, &param.name, &layer, ADAPTOR_COMPOUND_PARAM);
                self.output_adaptors.insert(parent, layer.clone());
                layer
            }
        };
        Some((layer, comp.to_string()))
    }
}
