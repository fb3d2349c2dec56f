use crate::cv::device::Resolution;
use crate::cv::pipeline::{ConfidenceMode, NativeDetection};
use anyhow::Result;
use log::{error, warning};
use opencv::core::{Mat, Point, Scalar};
use opencv::imgproc;

// BGR
const GREEN: [f64; 3] = [0., 255., 0.];
const WHITE: [f64; 3] = [255., 255., 255.];
const YELLOW: [f64; 3] = [0., 255., 255.];
const BLACK: [f64; 3] = [0., 0., 0.];

const FONT_SCALE: f64 = 0.6;
const THICKNESS: i32 = 2;

/// Gap between a box's top edge and its label baseline.
const LABEL_GAP: i32 = 10;
/// Baseline offset used when the label would not fit above the box.
const LABEL_INSET: i32 = 20;

/// Opaque status block, top-left and bottom-right corners.
const STATUS_PANEL: [(i32, i32); 2] = [(0, 0), (450, 110)];

fn color([b, g, r]: [f64; 3]) -> Scalar {
    Scalar::new(b, g, r, 0.)
}

/// What the status block reports for one frame.
#[derive(Debug, Clone, Copy)]
pub struct StatusInfo {
    pub native: Resolution,
    pub model_input: Resolution,
    pub fps: f32,
    pub objects: usize,
    pub threshold: f32,
    pub mode: ConfidenceMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub text: String,
    pub origin: Point,
    pub color: Scalar,
}

/// Text drawn next to a box, e.g. `person: 87.5%`.
pub fn label_text(label: &str, score: f32) -> String {
    format!("{}: {:.1}%", label, score * 100.0)
}

/// Baseline for a box label: just above the box, or just inside it when
/// that would run off the top of the frame.
pub fn label_baseline(box_top: i32) -> i32 {
    let above = box_top - LABEL_GAP;
    if above < LABEL_GAP { box_top + LABEL_INSET } else { above }
}

pub fn status_lines(status: &StatusInfo) -> Vec<StatusLine> {
    let line = |text: String, x: i32, y: i32, bgr: [f64; 3]| StatusLine {
        text,
        origin: Point::new(x, y),
        color: color(bgr),
    };

    vec![
        line(
            format!("Camera (output): {}", status.native),
            10,
            20,
            GREEN,
        ),
        line(
            format!("Model (input): {} (squashed)", status.model_input),
            10,
            45,
            GREEN,
        ),
        line(format!("FPS: {:.1}", status.fps), 10, 70, WHITE),
        line(format!("Objects: {}", status.objects), 150, 70, WHITE),
        line(
            format!(
                "Threshold: {:.0}% ({})",
                status.threshold * 100.0,
                status.mode.label()
            ),
            10,
            95,
            YELLOW,
        ),
    ]
}

/// Draws detections and the status block onto a native frame in place.
#[derive(Debug, Default)]
pub struct OverlayRenderer;

impl OverlayRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Returns how many detections were drawn. Drawing failures are logged;
    /// a detection that fails is skipped and a failed status panel leaves the
    /// count alone.
    pub fn render(
        &self,
        frame: &mut Mat,
        detections: &[NativeDetection],
        status: &StatusInfo,
    ) -> usize {
        let mut drawn = 0;
        for detection in detections {
            match draw_detection(frame, detection) {
                Ok(()) => drawn += 1,
                Err(e) => error!("Failed to draw '{}': {}", detection.label, e),
            }
        }

        if let Err(e) = draw_status(frame, status) {
            warning!("Failed to draw status panel: {}", e);
        }
        drawn
    }
}

fn draw_detection(frame: &mut Mat, detection: &NativeDetection) -> Result<()> {
    let rect = detection.rect;
    let top_left = Point::new(rect.xmin as i32, rect.ymin as i32);
    let bottom_right = Point::new(rect.xmax as i32, rect.ymax as i32);

    imgproc::rectangle_points(
        frame,
        top_left,
        bottom_right,
        color(GREEN),
        THICKNESS,
        imgproc::LINE_8,
        0,
    )?;

    imgproc::put_text(
        frame,
        &label_text(&detection.label, detection.score),
        Point::new(top_left.x, label_baseline(top_left.y)),
        imgproc::FONT_HERSHEY_SIMPLEX,
        FONT_SCALE,
        color(GREEN),
        THICKNESS,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

fn draw_status(frame: &mut Mat, status: &StatusInfo) -> Result<()> {
    let [(x0, y0), (x1, y1)] = STATUS_PANEL;
    imgproc::rectangle_points(
        frame,
        Point::new(x0, y0),
        Point::new(x1, y1),
        color(BLACK),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )?;

    for line in status_lines(status) {
        imgproc::put_text(
            frame,
            &line.text,
            line.origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            FONT_SCALE,
            line.color,
            THICKNESS,
            imgproc::LINE_8,
            false,
        )?;
    }
    Ok(())
}
