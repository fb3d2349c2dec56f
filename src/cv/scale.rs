//! Mapping between the model's square input space and the camera's native
//! frame. Frames are squashed to the model size without keeping the aspect
//! ratio, so the way back needs separate horizontal and vertical factors.
use crate::cv::device::Resolution;
use anyhow::{Result, anyhow};

/// Native-over-model ratio per axis. Both components are finite and > 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
    x: f64,
    y: f64,
}

impl ScaleFactor {
    /// `native / model` per axis, in floating point.
    pub fn compute(native: Resolution, model_input: Resolution) -> Result<Self> {
        if !native.is_valid() || !model_input.is_valid() {
            return Err(anyhow!(
                "Cannot scale between {} and {}: sizes must be positive",
                native,
                model_input
            ));
        }

        Ok(Self {
            x: f64::from(native.width) / f64::from(model_input.width),
            y: f64::from(native.height) / f64::from(model_input.height),
        })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn apply(&self, rect: BoxF) -> BoxF {
        BoxF {
            xmin: rect.xmin * self.x,
            ymin: rect.ymin * self.y,
            xmax: rect.xmax * self.x,
            ymax: rect.ymax * self.y,
        }
    }
}

/// Axis-aligned box given by its corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxF {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoxF {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Frame-edge check on the mapped box. Edges are inclusive; only a
    /// negative min or a max past the frame size is rejected. Inverted boxes
    /// are not this check's concern.
    pub fn fits_within(&self, frame: Resolution) -> bool {
        self.is_finite()
            && self.xmin >= 0.
            && self.ymin >= 0.
            && self.xmax <= f64::from(frame.width)
            && self.ymax <= f64::from(frame.height)
    }
}
