pub mod device;
pub mod frame_metrics;
pub mod net;
pub mod overlay;
pub mod pipeline;
pub mod probe;
pub mod scale;

use crate::session::Surface;
use anyhow::{Context, Result};
use log::{debug, info, warning};
use opencv::core::Mat;
use opencv::highgui;

/// HighGUI window. Every OpenCV window is destroyed when this is dropped.
pub struct Window {
    name: String,
}

impl Window {
    pub fn open(name: &str) -> Result<Self> {
        debug!("Initializing display window '{}'", name);
        highgui::named_window(name, highgui::WINDOW_KEEPRATIO | highgui::WINDOW_GUI_NORMAL)
            .with_context(|| format!("Could not create window '{name}'"))?;
        debug!("Window '{}' created successfully", name);

        Ok(Self {
            name: name.to_owned(),
        })
    }
}

impl Surface for Window {
    fn show(&mut self, frame: &Mat) -> Result<()> {
        highgui::imshow(&self.name, frame)?;
        Ok(())
    }

    fn poll_key(&mut self) -> Result<Option<char>> {
        // wait_key also pumps the GUI event loop; 1ms keeps the loop non-blocking.
        let key = highgui::wait_key(1)?;
        if key < 0 {
            return Ok(None);
        }
        Ok(char::from_u32((key & 0xFF) as u32))
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        match highgui::destroy_all_windows() {
            Ok(()) => info!("Display windows closed"),
            Err(e) => warning!("Failed to close display windows: {}", e),
        }
    }
}
