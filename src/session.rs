//! Export sessions: one pass from the host scene graph into a target document, and the
//! manager that keeps at most one of them alive.

pub mod export;
pub mod manager;
pub mod options;
pub mod services;

pub use export::ExportSession;
pub use manager::SessionManager;
pub use options::{FrameSequence, RenderGlobals, SessionOptions};
pub use services::ExportServices;

/// What the session's target document is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// Written to a project file.
    Export,
    /// Rendered in the background into the host's render view.
    FinalRender,
    /// Rendered frame by frame, blocking the caller.
    BatchRender,
    /// Interactive rendering of the current frame only.
    ProgressiveRender,
}

impl SessionMode {
    pub fn is_render(self) -> bool {
        !matches!(self, SessionMode::Export)
    }
}
