//! Renderer-side entity document produced by the exporters.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::error::{ExportError, ExportResult};

pub mod container;
pub mod entities;
pub mod mesh_file;
pub mod params;
pub mod transform;

pub use container::{Entity, EntityContainer};
pub use entities::*;
pub use params::ParamArray;
pub use transform::{Transform, TransformKey, TransformSequence};

pub const MAIN_ASSEMBLY: &str = "assembly";
pub const MAIN_ASSEMBLY_INSTANCE: &str = "assembly_inst";
pub const BEAUTY_FRAME: &str = "beauty";

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scene {
    pub cameras: EntityContainer<Camera>,
    pub environment_edfs: EntityContainer<EnvironmentEdf>,
    pub environment_shaders: EntityContainer<EnvironmentShader>,
    pub environment: Environment,
    pub textures: EntityContainer<Texture>,
    pub texture_instances: EntityContainer<TextureInstance>,
    pub assemblies: EntityContainer<Assembly>,
    pub assembly_instances: EntityContainer<AssemblyInstance>,
}

/// The project: frame, render configurations and scene.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetScene {
    pub name: String,
    pub frame: Frame,
    pub configurations: EntityContainer<Configuration>,
    pub scene: Scene,
}

impl TargetScene {
    /// A project with the default frame, the `interactive`/`final` configurations and an
    /// empty main assembly plus its instance.
    pub fn new_project(name: impl Into<String>) -> Self {
        let mut project = TargetScene {
            name: name.into(),
            ..Default::default()
        };

        let mut interactive = ParamArray::new();
        interactive
            .insert("sample_renderer", "generic")
            .insert("sample_generator", "generic")
            .insert("tile_renderer", "generic")
            .insert("frame_renderer", "progressive")
            .insert("lighting_engine", "pt")
            .insert("pixel_renderer", "uniform")
            .insert("sampling_mode", "rng")
            .insert_path("progressive_frame_renderer.max_fps", "5");
        project.configurations.insert_unique(Configuration {
            name: "interactive".to_string(),
            params: interactive,
        });

        let mut fin = ParamArray::new();
        fin.insert("sample_renderer", "generic")
            .insert("sample_generator", "generic")
            .insert("tile_renderer", "generic")
            .insert("frame_renderer", "generic")
            .insert("lighting_engine", "pt")
            .insert("pixel_renderer", "uniform")
            .insert("sampling_mode", "rng")
            .insert_path("uniform_pixel_renderer.samples", "64");
        project.configurations.insert_unique(Configuration {
            name: "final".to_string(),
            params: fin,
        });

        project.frame = Frame {
            name: BEAUTY_FRAME.to_string(),
            params: ParamArray::new()
                .with("resolution", "640 480")
                .with("pixel_format", "float"),
            aovs: Vec::new(),
        };

        project.scene.environment.name = "environment".to_string();
        project.scene.assemblies.insert_unique(Assembly::new(MAIN_ASSEMBLY));
        project.scene.assembly_instances.insert_unique(AssemblyInstance {
            name: MAIN_ASSEMBLY_INSTANCE.to_string(),
            assembly: MAIN_ASSEMBLY.to_string(),
            transform_sequence: TransformSequence::from_transform(Transform::identity()),
            ..Default::default()
        });
        project
    }

    pub fn main_assembly(&self) -> Option<&Assembly> {
        self.scene.assemblies.get(MAIN_ASSEMBLY)
    }

    pub fn main_assembly_mut(&mut self) -> &mut Assembly {
        self.scene
            .assemblies
            .get_or_insert_with(MAIN_ASSEMBLY, || Assembly::new(MAIN_ASSEMBLY))
    }

    pub fn configuration_mut(&mut self, name: &str) -> &mut Configuration {
        self.configurations
            .get_or_insert_with(name, Configuration::default)
    }

    /// Removes one previously inserted entity. Missing entities are ignored.
    pub fn remove(&mut self, entity: &EntityRef) {
        let name = entity.name.as_str();
        match entity.scope {
            EntityScope::Scene => {
                let s = &mut self.scene;
                match entity.kind {
                    EntityKind::Camera => drop(s.cameras.remove(name)),
                    EntityKind::EnvironmentEdf => drop(s.environment_edfs.remove(name)),
                    EntityKind::EnvironmentShader => drop(s.environment_shaders.remove(name)),
                    EntityKind::Texture => drop(s.textures.remove(name)),
                    EntityKind::TextureInstance => drop(s.texture_instances.remove(name)),
                    EntityKind::Assembly => drop(s.assemblies.remove(name)),
                    EntityKind::AssemblyInstance => drop(s.assembly_instances.remove(name)),
                    other => log::warn!("[target] {other:?} entities do not live at scene level"),
                }
            }
            EntityScope::MainAssembly => {
                let a = self.main_assembly_mut();
                match entity.kind {
                    EntityKind::Object => drop(a.objects.remove(name)),
                    EntityKind::ObjectInstance => drop(a.object_instances.remove(name)),
                    EntityKind::Material => drop(a.materials.remove(name)),
                    EntityKind::SurfaceShader => drop(a.surface_shaders.remove(name)),
                    EntityKind::ShaderGroup => drop(a.shader_groups.remove(name)),
                    EntityKind::Light => drop(a.lights.remove(name)),
                    EntityKind::Color => drop(a.colors.remove(name)),
                    EntityKind::Texture => drop(a.textures.remove(name)),
                    EntityKind::TextureInstance => drop(a.texture_instances.remove(name)),
                    EntityKind::Assembly => drop(a.assemblies.remove(name)),
                    EntityKind::AssemblyInstance => drop(a.assembly_instances.remove(name)),
                    other => log::warn!("[target] {other:?} entities do not live in assemblies"),
                }
            }
        }
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize project")
    }

    /// Writes the project as JSON through a temporary file, so a failure never leaves a
    /// partial project at `path`.
    pub fn write_project(&self, path: &Path) -> ExportResult<()> {
        let text = self
            .to_json_string()
            .map_err(|e| ExportError::Fatal(format!("{e:#}")))?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        std::fs::write(&tmp, text).map_err(|e| ExportError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| ExportError::io(path, e))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityScope {
    Scene,
    MainAssembly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Camera,
    EnvironmentEdf,
    EnvironmentShader,
    Texture,
    TextureInstance,
    Assembly,
    AssemblyInstance,
    Object,
    ObjectInstance,
    Material,
    SurfaceShader,
    ShaderGroup,
    Light,
    Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub scope: EntityScope,
    pub kind: EntityKind,
    pub name: String,
}

/// What an exporter committed to the document; replayed in reverse on teardown.
#[derive(Debug, Clone, Default)]
pub struct InsertedEntities {
    refs: Vec<EntityRef>,
}

impl InsertedEntities {
    pub fn record(&mut self, scope: EntityScope, kind: EntityKind, name: &str) {
        self.refs.push(EntityRef {
            scope,
            kind,
            name: name.to_string(),
        });
    }

    pub fn remove_from(&mut self, scene: &mut TargetScene) {
        for entity in self.refs.drain(..).rev() {
            scene.remove(&entity);
        }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_has_main_assembly_and_configs() {
        let p = TargetScene::new_project("project");
        assert!(p.main_assembly().is_some());
        assert!(p.scene.assembly_instances.contains(MAIN_ASSEMBLY_INSTANCE));
        assert_eq!(p.frame.params.get("resolution"), Some("640 480"));
        assert_eq!(
            p.configurations
                .get("interactive")
                .and_then(|c| c.params.get("frame_renderer")),
            Some("progressive")
        );
        assert_eq!(
            p.configurations
                .get("final")
                .and_then(|c| c.params.get("uniform_pixel_renderer.samples")),
            Some("64")
        );
    }

    #[test]
    fn inserted_entities_are_removed_on_teardown() {
        let mut p = TargetScene::new_project("project");
        let mut inserted = InsertedEntities::default();
        let name = p.main_assembly_mut().lights.insert_unique(Light {
            name: "|key|keyShape".into(),
            model: "point_light".into(),
            ..Default::default()
        });
        inserted.record(EntityScope::MainAssembly, EntityKind::Light, &name);
        let cam = p.scene.cameras.insert_unique(Camera {
            name: "|persp|perspShape".into(),
            ..Default::default()
        });
        inserted.record(EntityScope::Scene, EntityKind::Camera, &cam);

        inserted.remove_from(&mut p);
        assert!(p.main_assembly().map(|a| a.lights.is_empty()).unwrap_or(false));
        assert!(p.scene.cameras.is_empty());
        assert!(inserted.is_empty());
    }

    #[test]
    fn write_project_leaves_no_temp_file() {
        let dir = std::env::temp_dir().join(format!("scene-translator-target-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("scene.json");
        TargetScene::new_project("p").write_project(&path).expect("write");
        assert!(path.exists());
        assert!(!dir.join("scene.json.tmp").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
