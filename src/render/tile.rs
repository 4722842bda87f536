use crossbeam_channel::Sender;

use super::{Job, RenderFeedback};

/// A rectangle of RGBA pixels, rows stored in order of increasing `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl Tile {
    /// The same tile in a frame of `frame_height` rows with the origin moved from the
    /// bottom-left to the top-left corner.
    pub fn flipped(self, frame_height: u32) -> Tile {
        let width = self.width as usize;
        let mut pixels = Vec::with_capacity(self.pixels.len());
        if width > 0 {
            for row in self.pixels.chunks(width).rev() {
                pixels.extend_from_slice(row);
            }
        }
        Tile {
            x: self.x,
            y: frame_height.saturating_sub(self.y.saturating_add(self.height)),
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

/// Receives frame and tile events from a backend, on the render thread.
pub trait TileCallback: Send {
    fn on_frame_begin(&mut self, _width: u32, _height: u32) {}

    /// `tile` uses a bottom-left origin.
    fn on_tile(&mut self, tile: Tile);

    fn on_frame_end(&mut self) {}
}

/// Discards everything; used for blocking batch renders.
#[derive(Debug, Default)]
pub struct NullTileCallback;

impl TileCallback for NullTileCallback {
    fn on_tile(&mut self, _tile: Tile) {}
}

/// The host's interactive render view. Only touched from the thread that drains the
/// session's job queue; origin at the top-left.
pub trait RenderView {
    fn start_render(&mut self, width: u32, height: u32);

    fn update_tile(&mut self, tile: &Tile);

    fn end_render(&mut self);
}

/// Turns backend tile events into queued render view updates.
pub struct RenderViewTileCallback {
    jobs: Sender<Job<RenderFeedback>>,
    frame_height: u32,
}

impl RenderViewTileCallback {
    pub fn new(jobs: Sender<Job<RenderFeedback>>) -> Self {
        Self {
            jobs,
            frame_height: 0,
        }
    }

    fn push(&self, job: impl FnOnce(&mut RenderFeedback) + Send + 'static) {
        if self.jobs.send(Box::new(job)).is_err() {
            log::debug!("[render] job queue closed, dropping view update");
        }
    }
}

impl TileCallback for RenderViewTileCallback {
    fn on_frame_begin(&mut self, width: u32, height: u32) {
        self.frame_height = height;
        self.push(move |fb| fb.view.start_render(width, height));
    }

    fn on_tile(&mut self, tile: Tile) {
        let tile = tile.flipped(self.frame_height);
        self.push(move |fb| fb.view.update_tile(&tile));
    }

    fn on_frame_end(&mut self) {
        self.push(|fb| fb.view.end_render());
    }
}
