use crate::cli::Args;
use crate::cv::device::Resolution;
use crate::cv::net::ComputeTarget;
use crate::cv::probe::COMMON_RESOLUTIONS;
use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "coralcam";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
	pub version: u8,
	/// Network weights, any format OpenCV's `read_net` understands
	pub model: PathBuf,
	/// Companion file for formats that need one (.pbtxt, .prototxt)
	pub model_config: Option<PathBuf>,
	pub labels: PathBuf,
	pub model_input: Resolution,
	pub output_layer: String,
	pub input_scale: f64,
	pub input_mean: f64,
	pub target: ComputeTarget,
	pub camera: i32,
	pub default_confidence: f32,
	pub debug_confidence: f32,
	pub start_in_debug: bool,
	pub resolutions: Vec<Resolution>,
	pub screenshot_dir: PathBuf,
	pub window_title: String,
}

impl ::std::default::Default for Conf {
	fn default() -> Self {
		Self {
			version: 1,
			model: "models/ssd_mobilenet_v2_coco.pb".into(),
			model_config: Some("models/ssd_mobilenet_v2_coco.pbtxt".into()),
			labels: "models/coco_labels.txt".into(),
			model_input: Resolution::new(300, 300),
			output_layer: "detection_out".into(),
			input_scale: 1.0 / 127.5,
			input_mean: 127.5,
			target: ComputeTarget::Cpu,
			camera: 0,
			default_confidence: 0.7,
			debug_confidence: 0.1,
			start_in_debug: false,
			resolutions: COMMON_RESOLUTIONS.to_vec(),
			screenshot_dir: ".".into(),
			window_title: "coralcam - live detection (q quit, s screenshot, d debug)".into(),
		}
	}
}

impl Conf {
	/// Command line values win over the file.
	pub fn apply_args(&mut self, args: &Args) {
		if let Some(model) = &args.model {
			self.model = model.clone();
		}
		if let Some(model_config) = &args.model_config {
			self.model_config = Some(model_config.clone());
		}
		if let Some(labels) = &args.labels {
			self.labels = labels.clone();
		}
		if let Some(camera) = args.device {
			self.camera = camera;
		}
		if args.debug {
			self.start_in_debug = true;
		}
	}

	pub fn validate(&self) -> Result<()> {
		if !self.model_input.is_valid() {
			return Err(anyhow!("Model input size {} must be positive", self.model_input));
		}
		for (name, value) in [
			("default_confidence", self.default_confidence),
			("debug_confidence", self.debug_confidence),
		] {
			if !(0.0..=1.0).contains(&value) {
				return Err(anyhow!("{} must be within 0..=1, got {}", name, value));
			}
		}
		if self.resolutions.is_empty() {
			return Err(anyhow!("At least one candidate camera resolution is required"));
		}
		if let Some(bad) = self.resolutions.iter().find(|r| !r.is_valid()) {
			return Err(anyhow!("Invalid candidate resolution {}", bad));
		}
		Ok(())
	}

	/// Files that must exist before anything is loaded.
	pub fn required_files(&self) -> Vec<&Path> {
		let mut files = vec![self.model.as_path()];
		if let Some(config) = &self.model_config {
			files.push(config.as_path());
		}
		files.push(self.labels.as_path());
		files
	}
}

/// Reads the YAML config, from `path` if given or from the per-user location
/// otherwise. A missing file is created with the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Conf> {
	let cfg: Conf = match path {
		Some(path) => {
			info!("Loading config from {}", path.display());
			confy::load_path(path)
				.with_context(|| format!("Failed to load config {}", path.display()))?
		}
		None => {
			if let Ok(location) = confy::get_configuration_file_path(APP_NAME, None) {
				info!("Loading config from {}", location.display());
			}
			confy::load(APP_NAME, None).context("Failed to load config")?
		}
	};
	debug!("{:?}", cfg);
	Ok(cfg)
}
