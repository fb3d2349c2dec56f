use anyhow::{Context, Result, anyhow};
use log::{debug, info, warning};
use opencv::core::{Mat, MatTraitConst};
use opencv::videoio::{
    self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst,
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Minimal view of a camera: best-effort size negotiation plus blocking reads.
pub trait CaptureDevice {
    /// Size the device currently reports.
    fn resolution(&self) -> Result<Resolution>;

    /// Asks the device for a size. The device may clamp or ignore it; read
    /// back with [`CaptureDevice::resolution`] to learn what was applied.
    fn request_resolution(&mut self, resolution: Resolution) -> Result<()>;

    /// Blocks until the next frame. `Ok(false)` means no frame was delivered.
    fn read_frame(&mut self, frame: &mut Mat) -> Result<bool>;
}

/// Requests `resolution` and returns the size the device actually applied.
pub fn apply_resolution<D: CaptureDevice + ?Sized>(
    device: &mut D,
    resolution: Resolution,
) -> Result<Resolution> {
    device.request_resolution(resolution)?;
    let effective = device.resolution()?;
    if effective != resolution {
        warning!(
            "Requested {} but the camera is delivering {}",
            resolution,
            effective
        );
    } else {
        debug!("Camera accepted resolution {}", effective);
    }
    Ok(effective)
}

/// OpenCV camera handle. The capture is released when this is dropped.
pub struct Camera {
    capture: VideoCapture,
    index: i32,
}

impl Camera {
    pub fn open(index: i32) -> Result<Self> {
        info!("Opening camera stream {}", index);
        let capture = VideoCapture::new(index, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open camera {index}"))?;

        if !capture.is_opened()? {
            return Err(anyhow!("Camera {} could not be opened", index));
        }
        debug!("Camera {} opened successfully with default settings", index);

        Ok(Self { capture, index })
    }
}

impl CaptureDevice for Camera {
    fn resolution(&self) -> Result<Resolution> {
        let width = self.capture.get(videoio::CAP_PROP_FRAME_WIDTH)?;
        let height = self.capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?;
        Ok(Resolution::new(width as u32, height as u32))
    }

    fn request_resolution(&mut self, resolution: Resolution) -> Result<()> {
        self.capture
            .set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(resolution.width))?;
        self.capture
            .set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(resolution.height))?;
        Ok(())
    }

    fn read_frame(&mut self, frame: &mut Mat) -> Result<bool> {
        if !self.capture.is_opened()? {
            return Ok(false);
        }
        let ok = self.capture.read(frame)?;
        Ok(ok && !frame.empty())
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        match self.capture.release() {
            Ok(()) => info!("Camera {} released", self.index),
            Err(e) => warning!("Failed to release camera {}: {}", self.index, e),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeCamera;
    use super::*;

    #[test]
    fn apply_resolution_reports_effective_size() {
        let mut camera = FakeCamera::new(Resolution::new(640, 480))
            .supporting(&[Resolution::new(1280, 720)]);

        let applied = apply_resolution(&mut camera, Resolution::new(1280, 720)).unwrap();
        assert_eq!(applied, Resolution::new(1280, 720));

        let rejected = apply_resolution(&mut camera, Resolution::new(1920, 1080)).unwrap();
        assert_eq!(rejected, Resolution::new(1280, 720));
    }

    #[test]
    fn resolution_display() {
        assert_eq!(Resolution::new(1280, 720).to_string(), "1280x720");
        assert!(!Resolution::new(0, 720).is_valid());
    }
}
