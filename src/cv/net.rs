use crate::cv::device::Resolution;
use crate::cv::scale::BoxF;
use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warning};
use opencv::core::{CV_32F, Mat, MatTraitConst, MatTraitConstManual, Scalar, Size};
use opencv::dnn;
use opencv::dnn::{NetTrait, NetTraitConst};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// One raw detection in model-input pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub score: f32,
    pub rect: BoxF,
}

/// Black-box detector with a fixed square (or at least fixed) input size.
pub trait InferenceEngine {
    /// Size the engine expects its input image to have.
    fn input_size(&self) -> Resolution;

    /// Runs the model on an RGB image of exactly [`InferenceEngine::input_size`].
    /// Blocks until inference is done and returns every candidate, unfiltered.
    fn infer(&mut self, rgb: &Mat) -> Result<Vec<Detection>>;
}

/// Where OpenCV should run the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeTarget {
    #[default]
    Cpu,
    Opencl,
    Cuda,
}

impl ComputeTarget {
    fn backend_and_target(self) -> (i32, i32) {
        match self {
            ComputeTarget::Cpu => (dnn::DNN_BACKEND_OPENCV, dnn::DNN_TARGET_CPU),
            ComputeTarget::Opencl => (dnn::DNN_BACKEND_OPENCV, dnn::DNN_TARGET_OPENCL),
            ComputeTarget::Cuda => (dnn::DNN_BACKEND_CUDA, dnn::DNN_TARGET_CUDA),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DnnEngineConfig<'a> {
    pub model: &'a Path,
    pub model_config: Option<&'a Path>,
    pub input_size: Resolution,
    pub output_layer: &'a str,
    pub input_scale: f64,
    pub input_mean: f64,
    pub target: ComputeTarget,
}

/// SSD-style detector run through OpenCV's DNN module.
pub struct DnnEngine {
    net: dnn::Net,
    input_size: Resolution,
    output_layer: String,
    input_scale: f64,
    input_mean: f64,
}

impl DnnEngine {
    pub fn new(config: &DnnEngineConfig) -> Result<Self> {
        let model = config
            .model
            .to_str()
            .context("Model path is not valid UTF-8")?;
        let model_config = match config.model_config {
            Some(path) => path.to_str().context("Model config path is not valid UTF-8")?,
            None => "",
        };

        debug!(
            "Loading neural network model from files: model='{}', config='{}'",
            model, model_config
        );
        let start_time = Instant::now();

        let mut net = match dnn::read_net(model, model_config, "") {
            Ok(net) => {
                info!(
                    "Neural network loaded successfully in {:?}",
                    start_time.elapsed()
                );
                net
            }
            Err(e) => {
                error!("Failed to load neural network: {}", e);
                return Err(e).context("Model could not be loaded");
            }
        };

        if net.empty()? {
            return Err(anyhow!("Model '{}' produced an empty network", model));
        }

        let (backend, target) = config.target.backend_and_target();
        net.set_preferable_backend(backend)?;
        net.set_preferable_target(target)?;
        info!("Inference target: {:?}", config.target);

        Ok(Self {
            net,
            input_size: config.input_size,
            output_layer: config.output_layer.to_owned(),
            input_scale: config.input_scale,
            input_mean: config.input_mean,
        })
    }
}

impl InferenceEngine for DnnEngine {
    fn input_size(&self) -> Resolution {
        self.input_size
    }

    fn infer(&mut self, rgb: &Mat) -> Result<Vec<Detection>> {
        let process_start = Instant::now();

        let size = Size::new(self.input_size.width as i32, self.input_size.height as i32);
        let blob = dnn::blob_from_image(
            rgb,
            self.input_scale,
            size,
            Scalar::all(self.input_mean),
            false,
            false,
            CV_32F,
        )
        .context("Failed to create blob from image")?;

        self.net
            .set_input_def(&blob)
            .context("Failed to set network input")?;

        let output = self
            .net
            .forward_single(&self.output_layer)
            .context("Forward pass failed")?;
        debug!("Forward pass completed in {:?}", process_start.elapsed());

        let sizes = output.mat_size();
        if sizes.len() != 4 || sizes[3] != DETECTION_ROW_LEN as i32 {
            return Err(anyhow!(
                "Unexpected detection output shape {:?}, expected [1, 1, N, {}]",
                sizes,
                DETECTION_ROW_LEN
            ));
        }

        let data = output
            .data_typed::<f32>()
            .context("Detection output is not a continuous f32 tensor")?;
        let detections = decode_detection_rows(data, self.input_size);
        debug!("Network proposed {} detections", detections.len());
        Ok(detections)
    }
}

/// `[image_id, class_id, score, xmin, ymin, xmax, ymax]`, coords normalised.
const DETECTION_ROW_LEN: usize = 7;

/// Decodes SSD `DetectionOutput` rows into model-input pixel space.
fn decode_detection_rows(data: &[f32], input: Resolution) -> Vec<Detection> {
    let width = f64::from(input.width);
    let height = f64::from(input.height);

    data.chunks_exact(DETECTION_ROW_LEN)
        .filter_map(|row| {
            if row.iter().any(|v| !v.is_finite()) {
                warning!("Skipping detection row with non-finite values: {:?}", row);
                return None;
            }
            // Padding rows after the last real detection carry a negative class.
            if row[1] < 0. {
                return None;
            }

            Some(Detection {
                class_id: row[1] as usize,
                score: row[2],
                rect: BoxF::new(
                    f64::from(row[3]) * width,
                    f64::from(row[4]) * height,
                    f64::from(row[5]) * width,
                    f64::from(row[6]) * height,
                ),
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    /// Returns the same detections for every frame and checks the input size.
    pub struct FakeEngine {
        pub input: Resolution,
        pub detections: Vec<Detection>,
        pub calls: usize,
        pub fail: bool,
    }

    impl FakeEngine {
        pub fn new(input: Resolution, detections: Vec<Detection>) -> Self {
            Self {
                input,
                detections,
                calls: 0,
                fail: false,
            }
        }
    }

    impl InferenceEngine for FakeEngine {
        fn input_size(&self) -> Resolution {
            self.input
        }

        fn infer(&mut self, rgb: &Mat) -> Result<Vec<Detection>> {
            if self.fail {
                return Err(anyhow!("accelerator unavailable"));
            }
            let size = rgb.size()?;
            if size.width as u32 != self.input.width || size.height as u32 != self.input.height {
                return Err(anyhow!("expected {} input, got {:?}", self.input, size));
            }
            self.calls += 1;
            Ok(self.detections.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_scale_to_input_pixels() {
        let rows = [
            0., 1., 0.9, 0.1, 0.2, 0.5, 0.6, //
            0., 17., 0.3, 0., 0., 1., 1.,
        ];
        let found = decode_detection_rows(&rows, Resolution::new(300, 300));

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].class_id, 1);
        assert!((found[0].score - 0.9).abs() < 1e-6);
        assert!((found[0].rect.xmin - 30.).abs() < 1e-4);
        assert!((found[0].rect.ymin - 60.).abs() < 1e-4);
        assert!((found[0].rect.xmax - 150.).abs() < 1e-4);
        assert!((found[0].rect.ymax - 180.).abs() < 1e-4);
        assert_eq!(found[1].rect, BoxF::new(0., 0., 300., 300.));
    }

    #[test]
    fn padding_and_broken_rows_are_skipped() {
        let rows = [
            0., -1., 0., 0., 0., 0., 0., //
            0., 2., f32::NAN, 0., 0., 1., 1., //
            0., 3., 0.8, 0., 0., 0.5, 0.5,
        ];
        let found = decode_detection_rows(&rows, Resolution::new(320, 240));

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].class_id, 3);
        assert_eq!(found[0].rect, BoxF::new(0., 0., 160., 120.));
    }

    #[test]
    fn trailing_partial_row_is_ignored() {
        let rows = [0., 1., 0.5, 0., 0., 1., 1., 0., 2.];
        assert_eq!(decode_detection_rows(&rows, Resolution::new(300, 300)).len(), 1);
    }

    #[test]
    fn cuda_target_uses_cuda_backend() {
        assert_eq!(ComputeTarget::default(), ComputeTarget::Cpu);
        let (backend, target) = ComputeTarget::Cuda.backend_and_target();
        assert_eq!(backend, dnn::DNN_BACKEND_CUDA);
        assert_eq!(target, dnn::DNN_TARGET_CUDA);
    }
}
