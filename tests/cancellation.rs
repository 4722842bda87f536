mod support;

use std::cell::Cell;

use glam::DMat4;
use scene_translator::{
    ExportStatus, SessionManager, SessionOptions,
    host::{AttrValue, HostDoc, MeshData, Plug, SceneGraph},
};
use support::{basic_scene, init_logging, unique_temp_dir};

/// Delegates to a [`HostDoc`] and starts reporting an interrupt after `allowed_polls`
/// checkpoints passed.
struct InterruptingHost {
    doc: HostDoc,
    polls: Cell<usize>,
    allowed_polls: usize,
}

impl InterruptingHost {
    fn new(doc: HostDoc, allowed_polls: usize) -> Self {
        Self {
            doc,
            polls: Cell::new(0),
            allowed_polls,
        }
    }
}

impl SceneGraph for InterruptingHost {
    fn dag_nodes(&self) -> Vec<String> {
        self.doc.dag_nodes()
    }

    fn node_type(&self, node: &str) -> Option<String> {
        self.doc.node_type(node)
    }

    fn parent(&self, node: &str) -> Option<String> {
        self.doc.parent(node)
    }

    fn attribute(&self, node: &str, attr: &str) -> Option<AttrValue> {
        self.doc.attribute(node, attr)
    }

    fn source_of(&self, plug: &Plug) -> Option<Plug> {
        self.doc.source_of(plug)
    }

    fn connected_components(&self, plug: &Plug) -> Vec<usize> {
        self.doc.connected_components(plug)
    }

    fn connected_elements(&self, plug: &Plug) -> Vec<usize> {
        self.doc.connected_elements(plug)
    }

    fn world_matrix(&self, node: &str) -> DMat4 {
        self.doc.world_matrix(node)
    }

    fn mesh(&self, node: &str, smooth_levels: u32) -> Option<MeshData> {
        self.doc.mesh(node, smooth_levels)
    }

    fn selection(&self) -> Vec<String> {
        self.doc.selection()
    }

    fn current_time(&self) -> f64 {
        self.doc.current_time()
    }

    fn set_time(&mut self, time: f64) {
        self.doc.set_time(time);
    }

    fn is_interrupt_requested(&self) -> bool {
        let polls = self.polls.get();
        self.polls.set(polls + 1);
        polls >= self.allowed_polls
    }
}

#[test]
fn abort_at_any_checkpoint_leaves_no_session_and_no_project() {
    init_logging();
    let dir = unique_temp_dir("abort");
    let path = dir.join("scene.json");
    let mut manager = SessionManager::default();

    // The last of these interrupts lands after every entity was flushed.
    for allowed in 0..9 {
        let mut host = InterruptingHost::new(basic_scene(), allowed);
        let status = manager.begin_project_export(&mut host, &path, SessionOptions::default());
        assert_eq!(status, ExportStatus::Aborted, "interrupt after {allowed} checkpoints");
        assert_eq!(manager.session_mode(), None);
        assert!(!path.exists());
        assert_eq!(host.current_time(), 1.0);
    }

    let mut host = InterruptingHost::new(basic_scene(), usize::MAX);
    let status = manager.begin_project_export(&mut host, &path, SessionOptions::default());
    assert_eq!(status, ExportStatus::Success);
    assert!(path.exists());
    let _ = std::fs::remove_dir_all(&dir);
}
