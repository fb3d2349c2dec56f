use log::{debug, info};
use std::time::{Duration, Instant};

const SUMMARY_EVERY: usize = 100;

/// Frame-rate bookkeeping for the capture loop. The instantaneous rate is the
/// inverse of the gap between two consecutive frame timestamps, so it stays
/// 0 until the second frame.
pub struct FrameMetrics {
    last_frame_time: Option<Instant>,
    fps: f32,
    frame_count: usize,
    min_fps: f32,
    max_fps: f32,
    start_time: Instant,
}

impl FrameMetrics {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start_time: Instant) -> Self {
        debug!("Initializing frame metrics tracker");
        FrameMetrics {
            last_frame_time: None,
            fps: 0.0,
            frame_count: 0,
            min_fps: f32::MAX,
            max_fps: 0.0,
            start_time,
        }
    }

    /// Records the start of a new frame taken at `now`.
    pub fn tick(&mut self, now: Instant) {
        self.frame_count += 1;

        let Some(previous) = self.last_frame_time.replace(now) else {
            return;
        };

        let elapsed = now.saturating_duration_since(previous);
        if elapsed.is_zero() {
            return;
        }

        let current_fps = 1.0 / elapsed.as_secs_f32();
        self.fps = current_fps;
        self.min_fps = self.min_fps.min(current_fps);
        self.max_fps = self.max_fps.max(current_fps);

        if self.frame_count % SUMMARY_EVERY == 0 {
            info!(
                "Performance stats after {} frames: Current: {:.1} FPS, Avg: {:.1} FPS, Min: {:.1} FPS, Max: {:.1} FPS",
                self.frame_count,
                self.fps,
                self.avg_fps_at(now),
                self.min_fps,
                self.max_fps
            );
        } else {
            debug!(
                "Frame #{}: {:.1} FPS (frame time: {}ms)",
                self.frame_count,
                self.fps,
                elapsed.as_millis()
            );
        }
    }

    pub fn get_fps(&self) -> f32 {
        self.fps
    }

    pub fn get_frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn get_min_fps(&self) -> f32 {
        if self.min_fps == f32::MAX { 0.0 } else { self.min_fps }
    }

    pub fn get_max_fps(&self) -> f32 {
        self.max_fps
    }

    pub fn get_total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn avg_fps_at(&self, now: Instant) -> f32 {
        let runtime = now.saturating_duration_since(self.start_time).as_secs_f32();
        if runtime > 0.0 {
            self.frame_count as f32 / runtime
        } else {
            0.0
        }
    }

    pub fn get_avg_fps(&self) -> f32 {
        self.avg_fps_at(Instant::now())
    }

    pub fn log_summary(&self) {
        info!(
            "Session stats: {} frames in {:.1?}, Avg: {:.1} FPS, Min: {:.1} FPS, Max: {:.1} FPS",
            self.frame_count,
            self.get_total_runtime(),
            self.get_avg_fps(),
            self.get_min_fps(),
            self.max_fps
        );
    }
}

impl Default for FrameMetrics {
    fn default() -> Self {
        Self::new()
    }
}
