use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use super::{ExportSession, SessionMode, SessionOptions};
use crate::{
    error::{ExportError, ExportResult, ExportStatus},
    host::SceneGraph,
    registry::ExporterRegistry,
    render::{
        IdleJobQueue, NullTileCallback, RenderBackend, RenderController, RenderFeedback,
        RenderThread, RenderView, RenderViewTileCallback,
    },
    target::TargetScene,
};

/// Owner of the one active session. Starting a session ends the previous one first.
pub struct SessionManager {
    registry: Arc<ExporterRegistry>,
    active: Option<ActiveSession>,
}

struct ActiveSession {
    mode: SessionMode,
    session: ExportSession,
    render: Option<ActiveRender>,
}

struct ActiveRender {
    scene: Arc<Mutex<TargetScene>>,
    controller: Arc<RenderController>,
    thread: RenderThread,
    jobs: IdleJobQueue<RenderFeedback>,
    feedback: RenderFeedback,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(ExporterRegistry::shared())
    }
}

fn report(what: &str, result: ExportResult<()>) -> ExportStatus {
    match result {
        Ok(()) => ExportStatus::Success,
        Err(ExportError::AbortRequested) => {
            log::info!("[session] {what} aborted");
            ExportStatus::Aborted
        }
        Err(e) => {
            log::error!("[session] {what} failed: {e}");
            e.into()
        }
    }
}

/// One `(frame, options)` pair per frame to export. Without a sequence the options are
/// used as given.
fn frame_options(options: &SessionOptions) -> Vec<(Option<f64>, SessionOptions)> {
    match options.sequence {
        Some(seq) => seq
            .frames()
            .into_iter()
            .map(|f| {
                let mut opts = options.clone();
                opts.frame = Some(f);
                (Some(f), opts)
            })
            .collect(),
        None => vec![(None, options.clone())],
    }
}

/// `dir/stem.0012.json` for sequence frames, `path` itself otherwise.
fn frame_path(path: &Path, frame: Option<f64>) -> PathBuf {
    let Some(frame) = frame else {
        return path.to_path_buf();
    };
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "json".to_string());
    path.with_file_name(format!("{stem}.{:04}.{ext}", frame.round() as i64))
}

fn create_dir(dir: &Path) -> ExportResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        ExportError::Fatal(format!("cannot create directory {}: {e}", dir.display()))
    })
}

impl SessionManager {
    pub fn new(registry: Arc<ExporterRegistry>) -> Self {
        Self {
            registry,
            active: None,
        }
    }

    pub fn session_mode(&self) -> Option<SessionMode> {
        self.active.as_ref().map(|a| a.mode)
    }

    pub fn is_rendering(&self) -> bool {
        self.active
            .as_ref()
            .and_then(|a| a.render.as_ref())
            .is_some_and(|r| r.controller.is_rendering())
    }

    /// Runs `f` against the active session's target document. Blocks while a backend is
    /// rendering it.
    pub fn with_scene<R>(&self, f: impl FnOnce(&TargetScene) -> R) -> Option<R> {
        let active = self.active.as_ref()?;
        match &active.render {
            Some(render) => {
                let scene = render.scene.lock().ok()?;
                Some(f(&scene))
            }
            None => Some(f(active.session.project())),
        }
    }

    /// Exports the current frame, or every frame of `options.sequence`, to project files.
    /// No session stays active afterwards.
    pub fn begin_project_export(
        &mut self,
        host: &mut dyn SceneGraph,
        path: &Path,
        options: SessionOptions,
    ) -> ExportStatus {
        self.end_session();
        let result = self.export_project(host, path, &options);
        report("project export", result)
    }

    fn export_project(
        &mut self,
        host: &mut dyn SceneGraph,
        path: &Path,
        options: &SessionOptions,
    ) -> ExportResult<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        create_dir(&dir)?;
        for (frame, opts) in frame_options(options) {
            let mut session = ExportSession::new(SessionMode::Export, opts, self.registry.clone())
                .with_project_dir(&dir);
            session.export(host)?;
            session.write_project(&frame_path(path, frame))?;
        }
        Ok(())
    }

    /// Exports the scene and starts rendering it in the background. The session ends by
    /// itself once the render finishes and the idle jobs are processed.
    pub fn begin_final_render(
        &mut self,
        host: &mut dyn SceneGraph,
        options: SessionOptions,
        backend: Arc<dyn RenderBackend>,
        view: Box<dyn RenderView>,
    ) -> ExportStatus {
        self.start_render(host, options, backend, view, SessionMode::FinalRender)
    }

    /// Like a final render, but for the current frame only and kept alive until
    /// [`end_session`](Self::end_session).
    pub fn begin_progressive_render(
        &mut self,
        host: &mut dyn SceneGraph,
        options: SessionOptions,
        backend: Arc<dyn RenderBackend>,
        view: Box<dyn RenderView>,
    ) -> ExportStatus {
        self.start_render(host, options, backend, view, SessionMode::ProgressiveRender)
    }

    fn start_render(
        &mut self,
        host: &mut dyn SceneGraph,
        options: SessionOptions,
        backend: Arc<dyn RenderBackend>,
        view: Box<dyn RenderView>,
        mode: SessionMode,
    ) -> ExportStatus {
        self.end_session();
        let mut session = ExportSession::new(mode, options, self.registry.clone());
        if let Err(e) = session.export(host) {
            return report("render export", Err(e));
        }

        let scene = Arc::new(Mutex::new(session.take_project()));
        let controller = Arc::new(RenderController::new());
        let jobs = IdleJobQueue::new();
        jobs.start();
        let tiles = Box::new(RenderViewTileCallback::new(jobs.sender()));
        let thread = RenderThread::spawn(
            backend,
            scene.clone(),
            controller.clone(),
            tiles,
            jobs.sender(),
            mode == SessionMode::FinalRender,
        );
        log::info!("[session] started {mode:?} session");
        self.active = Some(ActiveSession {
            mode,
            session,
            render: Some(ActiveRender {
                scene,
                controller,
                thread,
                jobs,
                feedback: RenderFeedback::new(view),
            }),
        });
        ExportStatus::Success
    }

    /// Exports and renders every frame on the calling thread, writing each frame's project
    /// to `output_dir` first.
    pub fn begin_batch_render(
        &mut self,
        host: &mut dyn SceneGraph,
        options: SessionOptions,
        backend: Arc<dyn RenderBackend>,
        output_dir: &Path,
    ) -> ExportStatus {
        self.end_session();
        let result = self.batch_render(host, &options, backend.as_ref(), output_dir);
        report("batch render", result)
    }

    fn batch_render(
        &mut self,
        host: &mut dyn SceneGraph,
        options: &SessionOptions,
        backend: &dyn RenderBackend,
        output_dir: &Path,
    ) -> ExportResult<()> {
        create_dir(output_dir)?;
        let controller = RenderController::new();
        for (frame, opts) in frame_options(options) {
            let mut session =
                ExportSession::new(SessionMode::BatchRender, opts, self.registry.clone());
            session.export(host)?;
            let frame = frame.unwrap_or(session.motion().frame);
            session.write_project(&frame_path(&output_dir.join("batch.json"), Some(frame)))?;

            controller.set_rendering(true);
            let rendered = backend.render(session.project(), &controller, &mut NullTileCallback);
            controller.set_rendering(false);
            rendered.map_err(|e| ExportError::Fatal(format!("render of frame {frame} failed: {e:#}")))?;
            if host.is_interrupt_requested() {
                return Err(ExportError::AbortRequested);
            }
        }
        Ok(())
    }

    /// Stops any render, tears the session down and forgets it.
    pub fn end_session(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if let Some(mut render) = active.render.take() {
            render.controller.request_abort();
            render.thread.join();
            if active.mode == SessionMode::ProgressiveRender {
                match render.scene.lock() {
                    Ok(mut scene) => active.session.remove_entities(&mut scene),
                    Err(_) => log::error!("[session] target scene lock poisoned during teardown"),
                }
            }
            render.jobs.stop(&mut render.feedback);
        }
        log::info!("[session] ended {:?} session", active.mode);
    }

    /// Runs the jobs queued by the render thread. Returns how many ran.
    pub fn process_idle_jobs(&mut self) -> usize {
        let Some(render) = self.active.as_mut().and_then(|a| a.render.as_mut()) else {
            return 0;
        };
        if !render.jobs.is_started() {
            return 0;
        }
        let ran = render.jobs.run_jobs(&mut render.feedback);
        if render.feedback.end_session_requested {
            self.end_session();
        }
        ran
    }

    pub fn abort_render(&self) {
        if let Some(render) = self.active.as_ref().and_then(|a| a.render.as_ref()) {
            render.controller.request_abort();
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.end_session();
    }
}
