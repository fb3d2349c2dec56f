use crate::cv::device::CaptureDevice;
use crate::cv::frame_metrics::FrameMetrics;
use crate::cv::net::InferenceEngine;
use crate::cv::overlay::{OverlayRenderer, StatusInfo};
use crate::cv::pipeline::{ConfidenceMode, FramePipeline, Thresholds};
use crate::interrupt::Interrupt;
use anyhow::{Result, anyhow};
use log::{debug, error, info};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Where annotated frames are shown and keys come from.
pub trait Surface {
    fn show(&mut self, frame: &Mat) -> Result<()>;

    /// Key pressed since the last poll, without blocking.
    fn poll_key(&mut self) -> Result<Option<char>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Screenshot,
    ToggleDebug,
}

impl Command {
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'q' => Some(Command::Quit),
            's' => Some(Command::Screenshot),
            'd' => Some(Command::ToggleDebug),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    Interrupted,
    CaptureFailed,
    PipelineFailed,
    DisplayFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub mode: ConfidenceMode,
    pub threshold: f32,
    pub detected: usize,
    pub drawn: usize,
    pub fps: f32,
    pub screenshot: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Continue(FrameReport),
    Exit(ExitReason),
}

/// Loop-scoped mutable state.
pub struct SessionState {
    pub mode: ConfidenceMode,
    pub metrics: FrameMetrics,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub thresholds: Thresholds,
    pub start_mode: ConfidenceMode,
    pub screenshot_dir: PathBuf,
    pub interrupt: Interrupt,
}

/// One capture, infer, draw, show, poll cycle per [`Session::step`].
pub struct Session<'a, D: ?Sized, E, S: ?Sized> {
    device: &'a mut D,
    surface: &'a mut S,
    pipeline: FramePipeline<E>,
    renderer: OverlayRenderer,
    thresholds: Thresholds,
    screenshot_dir: PathBuf,
    interrupt: Interrupt,
    state: SessionState,
    frame: Mat,
}

impl<'a, D, E, S> Session<'a, D, E, S>
where
    D: CaptureDevice + ?Sized,
    E: InferenceEngine,
    S: Surface + ?Sized,
{
    pub fn new(
        device: &'a mut D,
        surface: &'a mut S,
        pipeline: FramePipeline<E>,
        options: SessionOptions,
    ) -> Self {
        Self {
            device,
            surface,
            pipeline,
            renderer: OverlayRenderer::new(),
            thresholds: options.thresholds,
            screenshot_dir: options.screenshot_dir,
            interrupt: options.interrupt,
            state: SessionState {
                mode: options.start_mode,
                metrics: FrameMetrics::new(),
            },
            frame: Mat::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Runs until a quit key, Ctrl-C, or a capture/pipeline/display failure.
    pub fn run(&mut self) -> Result<ExitReason> {
        info!("Capture loop started");
        loop {
            if let Step::Exit(reason) = self.step()? {
                info!("Capture loop finished: {:?}", reason);
                self.state.metrics.log_summary();
                return Ok(reason);
            }
        }
    }

    pub fn step(&mut self) -> Result<Step> {
        if self.interrupt.is_set() {
            info!("Ctrl-C received, shutting down");
            return Ok(Step::Exit(ExitReason::Interrupted));
        }
        self.state.metrics.tick(Instant::now());

        match self.device.read_frame(&mut self.frame) {
            Ok(true) => {}
            Ok(false) => {
                error!("Could not read a frame from the camera");
                return Ok(Step::Exit(ExitReason::CaptureFailed));
            }
            Err(e) => {
                error!("Camera read failed: {}", e);
                return Ok(Step::Exit(ExitReason::CaptureFailed));
            }
        }

        let mode = self.state.mode;
        let threshold = self.thresholds.for_mode(mode);
        let output = match self.pipeline.process(&self.frame, threshold) {
            Ok(output) => output,
            Err(e) => {
                error!("Frame pipeline failed: {:#}", e);
                return Ok(Step::Exit(ExitReason::PipelineFailed));
            }
        };

        let status = StatusInfo {
            native: self.pipeline.native(),
            model_input: self.pipeline.model_input(),
            fps: self.state.metrics.get_fps(),
            objects: output.detected,
            threshold,
            mode,
        };
        let drawn = self
            .renderer
            .render(&mut self.frame, &output.detections, &status);

        let key = match self
            .surface
            .show(&self.frame)
            .and_then(|()| self.surface.poll_key())
        {
            Ok(key) => key,
            Err(e) => {
                error!("Display failed: {}", e);
                return Ok(Step::Exit(ExitReason::DisplayFailed));
            }
        };

        let mut report = FrameReport {
            mode,
            threshold,
            detected: output.detected,
            drawn,
            fps: status.fps,
            screenshot: None,
        };

        match key.and_then(Command::from_key) {
            Some(Command::Quit) => {
                info!("Key 'q' pressed, shutting down");
                return Ok(Step::Exit(ExitReason::Quit));
            }
            Some(Command::Screenshot) => {
                match save_screenshot(&self.screenshot_dir, &self.frame) {
                    Ok(path) => {
                        info!("Screenshot saved: {}", path.display());
                        report.screenshot = Some(path);
                    }
                    Err(e) => error!("Screenshot failed: {}", e),
                }
            }
            Some(Command::ToggleDebug) => {
                self.state.mode = self.state.mode.toggled();
                info!(
                    "Confidence mode {} ({:.0}%)",
                    self.state.mode.label(),
                    self.thresholds.for_mode(self.state.mode) * 100.0
                );
            }
            None => {}
        }

        debug!("{:?}", report);
        Ok(Step::Continue(report))
    }
}

/// Writes `frame` as `screenshot_<YYYYmmdd_HHMMSS>.jpg` inside `dir`.
pub fn save_screenshot(dir: &Path, frame: &Mat) -> Result<PathBuf> {
    let name = format!(
        "screenshot_{}.jpg",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let path = dir.join(name);
    let target = path
        .to_str()
        .ok_or_else(|| anyhow!("Screenshot path {} is not valid UTF-8", path.display()))?;

    if !imgcodecs::imwrite(target, frame, &Vector::new())? {
        return Err(anyhow!("OpenCV could not write {}", path.display()));
    }
    Ok(path)
}
