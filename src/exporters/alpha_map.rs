use crate::{
    host::SceneGraph,
    target::{
        EntityKind, EntityScope, InsertedEntities, ParamArray, TargetScene, Texture,
        TextureInstance,
    },
};

use super::FlushContext;

/// Cutout texture bound to shapes through their `alphaMap` attribute.
pub struct AlphaMapExporter {
    node: String,
    file: Option<String>,
    inserted: InsertedEntities,
}

impl AlphaMapExporter {
    pub fn new(node: &str) -> Self {
        Self {
            node: node.to_string(),
            file: None,
            inserted: InsertedEntities::default(),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn create_entities(&mut self, host: &dyn SceneGraph) {
        self.file = host.attr_string(&self.node, "map").filter(|m| !m.is_empty());
        if self.file.is_none() {
            log::warn!("[session] alpha map {} has no map file, ignoring", self.node);
        }
    }

    pub fn flush_entities(&mut self, ctx: &mut FlushContext<'_>) {
        let Some(file) = self.file.take() else {
            return;
        };
        let main = ctx.scene.main_assembly_mut();
        let texture = main.textures.insert_unique(Texture {
            name: format!("{}_texture", self.node),
            model: "disk_texture_2d".to_string(),
            params: ParamArray::new()
                .with("filename", file)
                .with("color_space", "linear_rgb"),
        });
        let instance = main.texture_instances.insert_unique(TextureInstance {
            name: format!("{}_texture_instance", self.node),
            params: ParamArray::new()
                .with("alpha_mode", "detect")
                .with("addressing_mode", "clamp")
                .with("filtering_mode", "bilinear"),
            texture: texture.clone(),
        });
        self.inserted
            .record(EntityScope::MainAssembly, EntityKind::Texture, &texture);
        self.inserted
            .record(EntityScope::MainAssembly, EntityKind::TextureInstance, &instance);
        ctx.names.alpha_maps.insert(self.node.clone(), instance);
    }

    pub fn remove_entities(&mut self, scene: &mut TargetScene) {
        self.inserted.remove_from(scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exporters::ResolvedNames,
        host::{HostDoc, HostNode},
        session::SessionMode,
    };
    use serde_json::json;

    #[test]
    fn map_becomes_texture_and_clamped_instance() {
        let mut doc = HostDoc::new("alpha");
        doc.add_node(HostNode::new("leafAlpha", "alphaMap").with_param("map", json!("leaf.png")));
        doc.add_node(HostNode::new("emptyAlpha", "alphaMap").with_param("map", json!("")));

        let mut scene = TargetScene::new_project("alpha");
        let mut names = ResolvedNames::default();
        let mut ctx = FlushContext {
            scene: &mut scene,
            names: &mut names,
            project_dir: None,
            mode: SessionMode::Export,
        };
        for node in ["leafAlpha", "emptyAlpha"] {
            let mut exporter = AlphaMapExporter::new(node);
            exporter.create_entities(&doc);
            exporter.flush_entities(&mut ctx);
        }

        assert_eq!(
            names.alpha_maps.get("leafAlpha").map(String::as_str),
            Some("leafAlpha_texture_instance")
        );
        assert!(!names.alpha_maps.contains_key("emptyAlpha"));
        let main = scene.main_assembly().expect("main");
        assert_eq!(main.textures.len(), 1);
        let instance = main
            .texture_instances
            .get("leafAlpha_texture_instance")
            .expect("instance");
        assert_eq!(instance.params.get("addressing_mode"), Some("clamp"));
        assert_eq!(instance.texture, "leafAlpha_texture");
    }
}
