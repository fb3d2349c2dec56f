use crate::cv::device::Resolution;
use crate::cv::net::{Detection, InferenceEngine};
use crate::cv::scale::{BoxF, ScaleFactor};
use crate::labels::LabelTable;
use anyhow::{Context, Result, anyhow};
use log::{debug, error, warning};
use opencv::core::{AlgorithmHint, Mat, MatTraitConst, Size};
use opencv::imgproc;
use std::time::Instant;

/// Which confidence threshold is in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfidenceMode {
    #[default]
    Default,
    Debug,
}

impl ConfidenceMode {
    pub fn toggled(self) -> Self {
        match self {
            ConfidenceMode::Default => ConfidenceMode::Debug,
            ConfidenceMode::Debug => ConfidenceMode::Default,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConfidenceMode::Default => "DEFAULT",
            ConfidenceMode::Debug => "DEBUG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub default: f32,
    pub debug: f32,
}

impl Thresholds {
    pub fn for_mode(&self, mode: ConfidenceMode) -> f32 {
        match mode {
            ConfidenceMode::Default => self.default,
            ConfidenceMode::Debug => self.debug,
        }
    }
}

/// A detection mapped onto the camera frame, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeDetection {
    pub rect: BoxF,
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    /// Detections that passed the threshold, including ones later dropped
    /// for falling outside the frame.
    pub detected: usize,
    pub detections: Vec<NativeDetection>,
}

/// Squash, infer, filter, and map back. The scale factors are fixed at
/// construction and only recomputed if the camera starts delivering a
/// different frame size. The native frame is only read.
pub struct FramePipeline<E> {
    engine: E,
    labels: LabelTable,
    native: Resolution,
    model_input: Resolution,
    scale: ScaleFactor,
    rgb: Mat,
    squashed: Mat,
}

impl<E: InferenceEngine> FramePipeline<E> {
    pub fn new(engine: E, labels: LabelTable, native: Resolution) -> Result<Self> {
        let model_input = engine.input_size();
        let scale = ScaleFactor::compute(native, model_input)?;
        debug!(
            "Scale factors {} -> {}: x={:.4}, y={:.4}",
            model_input,
            native,
            scale.x(),
            scale.y()
        );

        Ok(Self {
            engine,
            labels,
            native,
            model_input,
            scale,
            rgb: Mat::default(),
            squashed: Mat::default(),
        })
    }

    pub fn native(&self) -> Resolution {
        self.native
    }

    pub fn model_input(&self) -> Resolution {
        self.model_input
    }

    pub fn scale(&self) -> ScaleFactor {
        self.scale
    }

    /// Image handed to the engine on the last call to [`FramePipeline::process`].
    pub fn model_input_image(&self) -> &Mat {
        &self.squashed
    }

    pub fn process(&mut self, frame: &Mat, threshold: f32) -> Result<FrameOutput> {
        let start = Instant::now();
        self.follow_frame_size(frame)?;

        imgproc::cvt_color(
            frame,
            &mut self.rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .context("Failed to convert frame from BGR to RGB")?;

        let size = Size::new(self.model_input.width as i32, self.model_input.height as i32);
        imgproc::resize(
            &self.rgb,
            &mut self.squashed,
            size,
            0.,
            0.,
            imgproc::INTER_LINEAR,
        )
        .context("Failed to squash frame to model input size")?;

        let raw = self.engine.infer(&self.squashed)?;
        let output = self.map_detections(raw, threshold);
        debug!(
            "Frame processed in {:?}: {} above threshold, {} in frame",
            start.elapsed(),
            output.detected,
            output.detections.len()
        );
        Ok(output)
    }

    /// Threshold filter followed by per-detection remapping. A detection that
    /// cannot be mapped is logged and skipped; the rest still go through.
    pub fn map_detections(&self, raw: Vec<Detection>, threshold: f32) -> FrameOutput {
        let mut output = FrameOutput::default();

        for detection in raw.into_iter().filter(|d| d.score >= threshold) {
            output.detected += 1;
            match self.remap(&detection) {
                Ok(Some(mapped)) => output.detections.push(mapped),
                Ok(None) => debug!(
                    "Dropping '{}' outside the frame: {:?}",
                    self.labels.get(detection.class_id),
                    self.scale.apply(detection.rect)
                ),
                Err(e) => error!("Skipping detection {:?}: {}", detection, e),
            }
        }

        output
    }

    fn remap(&self, detection: &Detection) -> Result<Option<NativeDetection>> {
        let rect = self.scale.apply(detection.rect);
        if !rect.is_finite() {
            return Err(anyhow!("mapped box is not finite: {:?}", rect));
        }
        if !rect.fits_within(self.native) {
            return Ok(None);
        }

        Ok(Some(NativeDetection {
            rect,
            label: self.labels.get(detection.class_id).to_owned(),
            score: detection.score,
        }))
    }

    /// Boxes are mapped and bounds-checked against the frame actually
    /// delivered. An empty frame is an error.
    fn follow_frame_size(&mut self, frame: &Mat) -> Result<()> {
        let size = frame.size()?;
        let actual = Resolution::new(size.width.max(0) as u32, size.height.max(0) as u32);
        if actual == self.native {
            return Ok(());
        }

        let scale = ScaleFactor::compute(actual, self.model_input)
            .with_context(|| format!("Camera delivered an unusable {} frame", actual))?;
        warning!(
            "Camera delivered a {} frame instead of {}, remapping boxes: x={:.4}, y={:.4}",
            actual,
            self.native,
            scale.x(),
            scale.y()
        );
        self.native = actual;
        self.scale = scale;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::net::fake::FakeEngine;
    use opencv::core::{CV_8UC3, Scalar, Vec3b};

    fn det(class_id: usize, score: f32, rect: BoxF) -> Detection {
        Detection {
            class_id,
            score,
            rect,
        }
    }

    fn pipeline(detections: Vec<Detection>) -> FramePipeline<FakeEngine> {
        let engine = FakeEngine::new(Resolution::new(300, 300), detections);
        let labels = LabelTable::parse("person\nbicycle\ncar\n");
        FramePipeline::new(engine, labels, Resolution::new(1280, 720)).unwrap()
    }

    fn frame() -> Mat {
        Mat::new_rows_cols_with_default(720, 1280, CV_8UC3, Scalar::new(40., 80., 120., 0.))
            .unwrap()
    }

    #[test]
    fn scale_is_fixed_at_construction() {
        let p = pipeline(Vec::new());
        assert!((p.scale().x() - 1280. / 300.).abs() < 1e-9);
        assert!((p.scale().y() - 2.4).abs() < 1e-9);
    }

    #[test]
    fn threshold_filters_before_mapping() {
        let p = pipeline(Vec::new());
        let raw = vec![
            det(0, 0.9, BoxF::new(20., 10., 60., 50.)),
            det(1, 0.5, BoxF::new(0., 0., 10., 10.)),
            det(2, 0.7, BoxF::new(0., 0., 300., 300.)),
        ];

        let out = p.map_detections(raw.clone(), 0.7);
        assert_eq!(out.detected, 2);
        assert_eq!(out.detections.len(), 2);
        assert_eq!(out.detections[0].label, "person");
        assert_eq!(out.detections[1].label, "car");

        let out = p.map_detections(raw, 0.1);
        assert_eq!(out.detected, 3);
    }

    #[test]
    fn boxes_use_separate_axis_factors() {
        let p = pipeline(Vec::new());
        let out = p.map_detections(vec![det(0, 0.9, BoxF::new(20., 10., 60., 50.))], 0.5);
        let rect = out.detections[0].rect;

        assert!((rect.xmin - 85.333).abs() < 0.01);
        assert!((rect.ymin - 24.).abs() < 1e-9);
        assert!((rect.xmax - 256.).abs() < 1e-9);
        assert!((rect.ymax - 120.).abs() < 1e-9);
    }

    #[test]
    fn out_of_frame_boxes_are_dropped_without_stopping() {
        let p = pipeline(Vec::new());
        let raw = vec![
            det(0, 0.9, BoxF::new(0., 0., 301., 300.)),
            det(1, 0.9, BoxF::new(-1., 0., 10., 10.)),
            det(2, 0.9, BoxF::new(f64::NAN, 0., 10., 10.)),
            det(0, 0.8, BoxF::new(150., 150., 300., 300.)),
        ];

        let out = p.map_detections(raw, 0.5);
        assert_eq!(out.detected, 4);
        assert_eq!(out.detections.len(), 1);
        assert!((out.detections[0].rect.xmax - 1280.).abs() < 1e-9);
        assert!((out.detections[0].rect.ymax - 720.).abs() < 1e-9);
    }

    #[test]
    fn unmapped_class_gets_fallback_label() {
        let p = pipeline(Vec::new());
        let out = p.map_detections(vec![det(90, 0.9, BoxF::new(1., 1., 2., 2.))], 0.5);
        assert_eq!(out.detections[0].label, crate::labels::UNKNOWN_LABEL);
    }

    #[test]
    fn process_squashes_rgb_to_model_size() {
        let mut p = pipeline(vec![det(0, 0.9, BoxF::new(20., 10., 60., 50.))]);
        let frame = frame();

        let out = p.process(&frame, 0.7).unwrap();
        assert_eq!(out.detections.len(), 1);

        let input = p.model_input_image();
        let size = input.size().unwrap();
        assert_eq!((size.width, size.height), (300, 300));
        let px = *input.at_2d::<Vec3b>(0, 0).unwrap();
        assert_eq!((px[0], px[1], px[2]), (120, 80, 40));

        // The native frame is left untouched.
        let native_px = *frame.at_2d::<Vec3b>(0, 0).unwrap();
        assert_eq!((native_px[0], native_px[1], native_px[2]), (40, 80, 120));
    }

    #[test]
    fn boxes_follow_the_delivered_frame_size() {
        let mut p = pipeline(vec![
            det(0, 0.9, BoxF::new(150., 150., 300., 300.)),
            det(1, 0.9, BoxF::new(0., 0., 150., 150.)),
        ]);
        let small =
            Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(0.)).unwrap();

        let out = p.process(&small, 0.5).unwrap();
        assert_eq!(p.native(), Resolution::new(640, 480));
        assert_eq!(out.detections.len(), 2);
        let rect = out.detections[0].rect;
        assert!((rect.xmax - 640.).abs() < 1e-9);
        assert!((rect.ymax - 480.).abs() < 1e-9);
        assert!((out.detections[1].rect.xmax - 320.).abs() < 1e-9);
    }

    #[test]
    fn empty_frame_is_an_error() {
        let mut p = pipeline(Vec::new());
        assert!(p.process(&Mat::default(), 0.5).is_err());
        assert_eq!(p.native(), Resolution::new(1280, 720));
    }
}
