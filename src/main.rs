use anyhow::{Result, anyhow};
use cli::{Args, parse_args};
use conf::{APP_NAME, Conf, load_config};
use cv::Window;
use cv::device::{Camera, apply_resolution};
use cv::net::{DnnEngine, DnnEngineConfig, InferenceEngine};
use cv::pipeline::{ConfidenceMode, FramePipeline, Thresholds};
use cv::probe::probe;
use interrupt::{Interrupt, TerminalInput};
use labels::LabelTable;
use log::logger::AdvancedLogger;
use log::{critical, info};
use select::{Selection, select};
use session::{ExitReason, Session, SessionOptions};
use std::io;
use std::process::ExitCode;

mod cli;
mod conf;
mod cv;
mod interrupt;
mod labels;
mod select;
mod session;

fn main() -> ExitCode {
	let args = parse_args();
	if let Err(e) = AdvancedLogger::init(APP_NAME, args.log_level) {
		eprintln!("Logger setup failed: {e}");
	}

	info!("{} {} - live object detection", APP_NAME, env!("CARGO_PKG_VERSION"));

	match run(&args) {
		Ok(Some(reason)) => {
			info!("Session ended ({:?})", reason);
			ExitCode::SUCCESS
		}
		Ok(None) => {
			info!("No resolution chosen, exiting");
			ExitCode::SUCCESS
		}
		Err(e) => {
			critical!("{:#}", e);
			ExitCode::FAILURE
		}
	}
}

/// Startup failures come back as `Err`; a cancelled resolution prompt is
/// `Ok(None)`. Ctrl-C is caught from here on, so camera and window are
/// released on every path when they drop.
fn run(args: &Args) -> Result<Option<ExitReason>> {
	let mut cfg = load_config(args.config.as_deref())?;
	cfg.apply_args(args);
	cfg.validate()?;
	check_prerequisites(&cfg)?;
	let interrupt = Interrupt::install()?;

	info!("Loading labels from {}", cfg.labels.display());
	let labels = LabelTable::load(&cfg.labels)?;

	info!("Loading model from {}", cfg.model.display());
	let engine = DnnEngine::new(&DnnEngineConfig {
		model: &cfg.model,
		model_config: cfg.model_config.as_deref(),
		input_size: cfg.model_input,
		output_layer: &cfg.output_layer,
		input_scale: cfg.input_scale,
		input_mean: cfg.input_mean,
		target: cfg.target,
	})?;
	info!("Model input size: {}", engine.input_size());

	let mut camera = Camera::open(cfg.camera)?;
	let candidates = probe(&mut camera, &cfg.resolutions)?;

	let mut input = TerminalInput::stdin(interrupt.clone());
	let chosen = match select(&candidates, &mut input, &mut io::stdout(), &interrupt)? {
		Selection::Chosen(resolution) => resolution,
		Selection::Cancelled => return Ok(None),
	};

	let native = apply_resolution(&mut camera, chosen)?;
	info!("Webcam started at {}", native);

	let pipeline = FramePipeline::new(engine, labels, native)?;
	let scale = pipeline.scale();
	info!("Scale factors: x={:.4}, y={:.4}", scale.x(), scale.y());

	info!("Keys (with the video window focused): 'q' quit, 's' screenshot, 'd' toggle debug threshold");

	let mut window = Window::open(&cfg.window_title)?;
	let start_mode = if cfg.start_in_debug {
		ConfidenceMode::Debug
	} else {
		ConfidenceMode::Default
	};
	let mut session = Session::new(
		&mut camera,
		&mut window,
		pipeline,
		SessionOptions {
			thresholds: Thresholds {
				default: cfg.default_confidence,
				debug: cfg.debug_confidence,
			},
			start_mode,
			screenshot_dir: cfg.screenshot_dir.clone(),
			interrupt,
		},
	);

	let reason = session.run()?;
	Ok(Some(reason))
}

fn check_prerequisites(cfg: &Conf) -> Result<()> {
	for file in cfg.required_files() {
		if !file.exists() {
			return Err(anyhow!(
				"Required file not found: {}. Put the model and label files there or point to them with --model, --model-config and --labels",
				file.display()
			));
		}
	}
	Ok(())
}
