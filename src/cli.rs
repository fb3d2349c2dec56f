use clap::Parser;
use log::LogLevel;
use std::path::PathBuf;

/// Live object detection from a webcam, boxes mapped back onto the camera frame
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
	/// YAML config file (defaults to the per-user config location)
	#[arg(short, long)]
	pub config: Option<PathBuf>,

	/// Model weights
	#[arg(short, long)]
	pub model: Option<PathBuf>,

	/// Model description file (.pbtxt, .prototxt) when the format needs one
	#[arg(long)]
	pub model_config: Option<PathBuf>,

	/// Class labels, one per line
	#[arg(short, long)]
	pub labels: Option<PathBuf>,

	/// Camera index
	#[arg(long)]
	pub device: Option<i32>,

	/// Start with the low debug confidence threshold
	#[arg(short, long)]
	pub debug: bool,

	/// debug, info, warning, error, critical
	#[arg(long, default_value = "info")]
	pub log_level: LogLevel,
}

pub fn parse_args() -> Args {
	Args::parse()
}
