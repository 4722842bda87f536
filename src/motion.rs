//! Per-category motion blur sample times.

use crate::session::RenderGlobals;

#[derive(Debug, Clone, PartialEq)]
pub struct MotionBlurSampleTimes {
    pub frame: f64,
    pub shutter_open: f64,
    pub shutter_close: f64,
    pub camera_times: Vec<f64>,
    pub transform_times: Vec<f64>,
    pub deformation_times: Vec<f64>,
    /// Sorted, deduplicated union of the three categories.
    pub all_times: Vec<f64>,
}

impl MotionBlurSampleTimes {
    /// Only the current frame, in every category.
    pub fn current_frame(frame: f64) -> Self {
        let mut times = Self {
            frame,
            shutter_open: frame,
            shutter_close: frame,
            camera_times: vec![frame],
            transform_times: vec![frame],
            deformation_times: vec![frame],
            all_times: Vec::new(),
        };
        times.merge_times();
        times
    }

    pub fn from_globals(frame: f64, globals: &RenderGlobals) -> Self {
        if !globals.motion_blur {
            return Self::current_frame(frame);
        }
        let open = frame + globals.shutter_open;
        let close = frame + globals.shutter_close.max(globals.shutter_open);
        let mut times = Self {
            frame,
            shutter_open: open,
            shutter_close: close,
            camera_times: distribute(frame, open, close, globals.camera_samples),
            transform_times: distribute(frame, open, close, globals.transform_samples),
            deformation_times: distribute(frame, open, close, globals.deformation_samples),
            all_times: Vec::new(),
        };
        times.merge_times();
        times
    }

    fn merge_times(&mut self) {
        let mut all: Vec<f64> = self
            .camera_times
            .iter()
            .chain(&self.transform_times)
            .chain(&self.deformation_times)
            .copied()
            .collect();
        all.sort_by(f64::total_cmp);
        all.dedup();
        self.all_times = all;
    }

    pub fn is_camera_time(&self, t: f64) -> bool {
        self.camera_times.contains(&t)
    }

    pub fn is_transform_time(&self, t: f64) -> bool {
        self.transform_times.contains(&t)
    }

    pub fn is_deformation_time(&self, t: f64) -> bool {
        self.deformation_times.contains(&t)
    }

    pub fn has_motion(&self) -> bool {
        self.all_times.len() > 1
    }

    /// Maps `t` into `[0, 1]` across the shutter; 0 when the shutter is closed.
    pub fn normalized_time(&self, t: f64) -> f64 {
        let span = self.shutter_close - self.shutter_open;
        if span <= 0.0 {
            return 0.0;
        }
        ((t - self.shutter_open) / span).clamp(0.0, 1.0)
    }
}

/// `samples` evenly spaced times over `[open, close]`; one sample means the frame itself.
fn distribute(frame: f64, open: f64, close: f64, samples: u32) -> Vec<f64> {
    if samples <= 1 {
        return vec![frame];
    }
    let n = samples as usize;
    (0..n)
        .map(|i| open + (close - open) * (i as f64) / ((n - 1) as f64))
        .collect()
}
