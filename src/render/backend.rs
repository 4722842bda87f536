use std::{
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
};

use crossbeam_channel::Sender;

use super::{Job, RenderController, RenderFeedback, RenderStatus, TileCallback};
use crate::target::TargetScene;

/// The renderer boundary. Implementations poll `controller` and return early once it
/// stops saying `Continue`.
pub trait RenderBackend: Send + Sync {
    fn render(
        &self,
        scene: &TargetScene,
        controller: &RenderController,
        tiles: &mut dyn TileCallback,
    ) -> anyhow::Result<()>;
}

/// The background thread running one render session.
pub struct RenderThread {
    handle: Option<JoinHandle<()>>,
}

impl RenderThread {
    /// Renders `scene` until the backend returns without a pending restart, then queues
    /// the end-of-render notification. With `end_session_when_done` the notification
    /// also asks the session to end.
    pub fn spawn(
        backend: Arc<dyn RenderBackend>,
        scene: Arc<Mutex<TargetScene>>,
        controller: Arc<RenderController>,
        mut tiles: Box<dyn TileCallback>,
        jobs: Sender<Job<RenderFeedback>>,
        end_session_when_done: bool,
    ) -> Self {
        controller.set_rendering(true);
        let handle = thread::spawn(move || {
            loop {
                let result = {
                    let Ok(scene) = scene.lock() else {
                        log::error!("[render] target scene lock poisoned");
                        break;
                    };
                    backend.render(&scene, &controller, tiles.as_mut())
                };
                if let Err(e) = result {
                    log::error!("[render] backend failed: {e:#}");
                    break;
                }
                if controller.status() != RenderStatus::Restart {
                    break;
                }
                log::debug!("[render] restarting");
                controller.acknowledge_restart();
            }
            controller.set_rendering(false);

            let finished: Job<RenderFeedback> = Box::new(move |fb: &mut RenderFeedback| {
                if end_session_when_done {
                    fb.end_session_requested = true;
                }
            });
            let _ = jobs.send(finished);
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Waits for the thread; later calls return immediately.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[render] render thread panicked");
            }
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.join();
    }
}
