use serde::{Deserialize, Serialize};

use crate::{
    host::{Plug, SceneGraph},
    target::TargetScene,
    utils::fmt_f64,
};

pub const RENDER_GLOBALS_NODE: &str = "appleseedRenderGlobals";
pub const DEFAULT_RESOLUTION_NODE: &str = "defaultResolution";

/// Caller-supplied export options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub camera: Option<String>,
    pub selection_only: bool,
    pub frame: Option<f64>,
    pub sequence: Option<FrameSequence>,
    pub enable_instancing: bool,
    pub subdivision_levels: u32,
    pub compute_tangents: bool,
    pub export_meshes_to_files: bool,
    pub aovs: Vec<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            camera: None,
            selection_only: false,
            frame: None,
            sequence: None,
            enable_instancing: true,
            subdivision_levels: 0,
            compute_tangents: false,
            export_meshes_to_files: true,
            aovs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSequence {
    pub start: f64,
    pub end: f64,
    #[serde(default = "one")]
    pub step: f64,
}

/// Upper bound on the frames a single sequence expands to.
pub const MAX_SEQUENCE_FRAMES: usize = 100_000;

fn one() -> f64 {
    1.0
}

impl FrameSequence {
    /// `start, start + step, ..` up to `end`, each distinct frame once. Non-positive steps
    /// count as 1 and overly long sequences are truncated.
    pub fn frames(&self) -> Vec<f64> {
        if !self.start.is_finite() || !self.end.is_finite() || self.end < self.start {
            log::warn!("[session] empty frame sequence {} .. {}", self.start, self.end);
            return Vec::new();
        }
        let step = if self.step.is_finite() && self.step > 0.0 {
            self.step
        } else {
            1.0
        };
        let span = ((self.end - self.start) / step + 1e-9).floor();
        let count = if span >= MAX_SEQUENCE_FRAMES as f64 {
            log::warn!("[session] frame sequence truncated to {MAX_SEQUENCE_FRAMES} frames");
            MAX_SEQUENCE_FRAMES
        } else {
            span as usize + 1
        };
        let mut out: Vec<f64> = (0..count).map(|i| self.start + i as f64 * step).collect();
        out.dedup();
        out
    }
}

/// Renderer settings read from the host's render globals nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderGlobals {
    pub width: u32,
    pub height: u32,
    pub samples: i64,
    pub passes: i64,
    pub tile_size: i64,
    pub gi: bool,
    pub caustics: bool,
    pub bounces: i64,
    pub background_emits_light: bool,
    pub threads: i64,
    pub motion_blur: bool,
    pub camera_samples: u32,
    pub transform_samples: u32,
    pub deformation_samples: u32,
    pub shutter_open: f64,
    pub shutter_close: f64,
    pub scene_scale: f64,
    /// Environment light connected to the globals' `envLight` plug.
    pub env_light: Option<String>,
}

impl Default for RenderGlobals {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            samples: 16,
            passes: 1,
            tile_size: 64,
            gi: true,
            caustics: false,
            bounces: 8,
            background_emits_light: true,
            threads: 0,
            motion_blur: false,
            camera_samples: 2,
            transform_samples: 2,
            deformation_samples: 2,
            shutter_open: -0.25,
            shutter_close: 0.25,
            scene_scale: 1.0,
            env_light: None,
        }
    }
}

impl RenderGlobals {
    /// Missing nodes or attributes keep their defaults.
    pub fn from_host(host: &dyn SceneGraph, options: &SessionOptions) -> Self {
        let mut g = RenderGlobals::default();

        let res = DEFAULT_RESOLUTION_NODE;
        if let Some(w) = host.attr_i64(res, "width").and_then(|v| u32::try_from(v).ok()) {
            g.width = w;
        }
        if let Some(h) = host.attr_i64(res, "height").and_then(|v| u32::try_from(v).ok()) {
            g.height = h;
        }
        if let Some(w) = options.width {
            g.width = w;
        }
        if let Some(h) = options.height {
            g.height = h;
        }

        let n = RENDER_GLOBALS_NODE;
        let int = |attr: &str, slot: &mut i64| {
            if let Some(v) = host.attr_i64(n, attr) {
                *slot = v;
            }
        };
        int("samples", &mut g.samples);
        int("passes", &mut g.passes);
        int("tileSize", &mut g.tile_size);
        int("bounces", &mut g.bounces);
        int("threads", &mut g.threads);

        let flag = |attr: &str, slot: &mut bool| {
            if let Some(v) = host.attr_bool(n, attr) {
                *slot = v;
            }
        };
        flag("gi", &mut g.gi);
        flag("caustics", &mut g.caustics);
        flag("bgLight", &mut g.background_emits_light);
        flag("motionBlur", &mut g.motion_blur);

        let samples = |attr: &str, slot: &mut u32| {
            if let Some(v) = host.attr_i64(n, attr) {
                *slot = u32::try_from(v.max(1)).unwrap_or(1);
            }
        };
        samples("mbCameraSamples", &mut g.camera_samples);
        samples("mbTransformSamples", &mut g.transform_samples);
        samples("mbDeformSamples", &mut g.deformation_samples);

        if let Some(v) = host.attribute(n, "shutterOpen").and_then(|v| v.as_f64()) {
            g.shutter_open = v;
        }
        if let Some(v) = host.attribute(n, "shutterClose").and_then(|v| v.as_f64()) {
            g.shutter_close = v;
        }
        if let Some(v) = host.attribute(n, "sceneScale").and_then(|v| v.as_f64()) {
            g.scene_scale = v;
        }

        g.env_light = host
            .source_of(&Plug::new(n, "envLight"))
            .map(|p| p.node);
        g
    }

    /// Writes frame and configuration parameters into the project.
    pub fn apply_to(&self, project: &mut TargetScene, camera: Option<&str>, aovs: &[String]) {
        let frame = &mut project.frame.params;
        frame.insert("resolution", format!("{} {}", self.width, self.height));
        frame.insert("tile_size", format!("{} {}", self.tile_size, self.tile_size));
        if let Some(cam) = camera {
            frame.insert("camera", cam);
        }
        project.frame.aovs = aovs.to_vec();

        let max_path_length = if self.gi {
            if self.bounces == 0 { 0 } else { self.bounces + 1 }
        } else {
            1
        };
        let threads = if self.threads <= 0 {
            "auto".to_string()
        } else {
            self.threads.to_string()
        };

        let fin = &mut project.configuration_mut("final").params;
        fin.insert_path("uniform_pixel_renderer.samples", self.samples.to_string());
        if self.samples == 1 {
            fin.insert_path("uniform_pixel_renderer.force_antialiasing", "true");
        }
        fin.insert_path("generic_frame_renderer.passes", self.passes.to_string());
        fin.insert(
            "shading_result_framebuffer",
            if self.passes == 1 { "ephemeral" } else { "permanent" },
        );

        for config in ["final", "interactive"] {
            let params = &mut project.configuration_mut(config).params;
            params.insert_path("pt.max_path_length", max_path_length.to_string());
            params.insert_path("pt.enable_caustics", crate::utils::bool_str(self.caustics));
            params.insert_path("pt.enable_ibl", crate::utils::bool_str(self.background_emits_light));
            params.insert("rendering_threads", threads.clone());
        }

        if self.motion_blur {
            let fin = &mut project.configuration_mut("final").params;
            fin.insert("shutter_open_time", fmt_f64(self.shutter_open));
            fin.insert("shutter_close_time", fmt_f64(self.shutter_close));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostDoc, HostNode};
    use serde_json::json;

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: SessionOptions =
            serde_json::from_str(r#"{"selectionOnly": true, "sequence": {"start": 1, "end": 3}}"#)
                .expect("parse options");
        assert!(opts.selection_only);
        assert!(opts.enable_instancing);
        assert_eq!(opts.sequence.map(|s| s.frames()), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn frame_sequences_terminate_on_degenerate_input() {
        // Adding 1 to 1e17 rounds back to 1e17.
        let huge = FrameSequence {
            start: 1e17,
            end: 1e17 + 64.0,
            step: 1.0,
        };
        let frames = huge.frames();
        assert!(!frames.is_empty());
        assert!(frames.len() <= 65);
        assert!(frames.windows(2).all(|w| w[0] < w[1]));

        let tiny = FrameSequence {
            start: 0.0,
            end: 1.0,
            step: 1e-300,
        };
        assert_eq!(tiny.frames().len(), MAX_SEQUENCE_FRAMES);

        let backwards = FrameSequence {
            start: 5.0,
            end: 1.0,
            step: 1.0,
        };
        assert!(backwards.frames().is_empty());

        let fractional = FrameSequence {
            start: 1.0,
            end: 2.0,
            step: 0.1,
        };
        let frames = fractional.frames();
        assert_eq!(frames.len(), 11);
        assert!((frames[10] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn globals_read_from_host_nodes() {
        let mut doc = HostDoc::new("globals");
        doc.add_node(
            HostNode::new(RENDER_GLOBALS_NODE, "appleseedRenderGlobals")
                .with_param("samples", json!(4))
                .with_param("gi", json!(false))
                .with_param("motionBlur", json!(true))
                .with_param("mbTransformSamples", json!(3)),
        );
        doc.add_node(
            HostNode::new(DEFAULT_RESOLUTION_NODE, "resolution")
                .with_param("width", json!(320))
                .with_param("height", json!(200)),
        );
        doc.add_node(HostNode::new("|sky|skyShape", "appleseedPhysicalSkyLight").with_parent("|sky"));
        doc.connect(
            Plug::new("|sky|skyShape", "globalsMessage"),
            Plug::new(RENDER_GLOBALS_NODE, "envLight"),
        );

        let g = RenderGlobals::from_host(&doc, &SessionOptions::default());
        assert_eq!((g.width, g.height), (320, 200));
        assert_eq!(g.samples, 4);
        assert!(!g.gi);
        assert!(g.motion_blur);
        assert_eq!(g.transform_samples, 3);
        assert_eq!(g.env_light.as_deref(), Some("|sky|skyShape"));

        let mut project = TargetScene::new_project("p");
        g.apply_to(&mut project, Some("|cam|camShape"), &[]);
        assert_eq!(project.frame.params.get("resolution"), Some("320 200"));
        assert_eq!(project.frame.params.get("camera"), Some("|cam|camShape"));
        let fin = &project.configurations.get("final").expect("final").params;
        assert_eq!(fin.get("pt.max_path_length"), Some("1"));
        assert_eq!(fin.get("rendering_threads"), Some("auto"));
    }
}
