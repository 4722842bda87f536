//! Bridge between a background render thread and the thread that owns the host's render
//! view.
//!
//! The render thread never touches the view or the target scene directly: tile callbacks
//! queue jobs, and the owner runs them from its idle callback.

pub mod backend;
pub mod controller;
pub mod job_queue;
pub mod tile;

pub use backend::{RenderBackend, RenderThread};
pub use controller::{RenderController, RenderStatus};
pub use job_queue::{IdleJobQueue, Job};
pub use tile::{NullTileCallback, RenderView, RenderViewTileCallback, Tile, TileCallback};

/// What queued render jobs run against.
pub struct RenderFeedback {
    pub view: Box<dyn RenderView>,
    /// Set by the render thread once a final render is done; the session manager ends the
    /// session after the drain that saw it.
    pub end_session_requested: bool,
}

impl RenderFeedback {
    pub fn new(view: Box<dyn RenderView>) -> Self {
        Self {
            view,
            end_session_requested: false,
        }
    }
}
