use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RenderStatus {
    Continue = 0,
    Abort = 1,
    Restart = 2,
}

/// Status flag shared between the session and a running backend, which polls it.
#[derive(Debug, Default)]
pub struct RenderController {
    status: AtomicU8,
    rendering: AtomicBool,
}

impl RenderController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RenderStatus {
        match self.status.load(Ordering::SeqCst) {
            1 => RenderStatus::Abort,
            2 => RenderStatus::Restart,
            _ => RenderStatus::Continue,
        }
    }

    pub fn should_stop(&self) -> bool {
        self.status() != RenderStatus::Continue
    }

    pub fn request_abort(&self) {
        self.status.store(RenderStatus::Abort as u8, Ordering::SeqCst);
    }

    /// Asks for a fresh render pass. An abort already requested wins.
    pub fn request_restart(&self) {
        let _ = self.status.compare_exchange(
            RenderStatus::Continue as u8,
            RenderStatus::Restart as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Clears a pending restart; aborts stay.
    pub fn acknowledge_restart(&self) {
        let _ = self.status.compare_exchange(
            RenderStatus::Restart as u8,
            RenderStatus::Continue as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn set_rendering(&self, rendering: bool) {
        self.rendering.store(rendering, Ordering::SeqCst);
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering.load(Ordering::SeqCst)
    }
}
