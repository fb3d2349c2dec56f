use crate::cv::device::{CaptureDevice, Resolution};
use anyhow::Result;
use log::{debug, info, warning};

/// Common webcam sizes tried by [`probe`], low to high.
pub const COMMON_RESOLUTIONS: [Resolution; 5] = [
    Resolution::new(640, 480),
    Resolution::new(800, 600),
    Resolution::new(1024, 768),
    Resolution::new(1280, 720),
    Resolution::new(1920, 1080),
];

/// Finds which of `candidates` the device really honors.
///
/// The device's current size always comes first. Every other candidate is
/// requested and kept only if the device echoes it back unchanged. The
/// device is put back on its original size before returning, whatever
/// happened while probing.
pub fn probe<D: CaptureDevice + ?Sized>(
    device: &mut D,
    candidates: &[Resolution],
) -> Result<Vec<Resolution>> {
    info!("Probing supported camera resolutions");
    let default = device.resolution()?;
    debug!("Camera default resolution is {}", default);

    let mut supported = vec![default];
    let outcome = try_candidates(device, candidates, &mut supported);

    // Restore even when probing failed half-way.
    let restored = device.request_resolution(default);

    if let Err(e) = outcome {
        warning!("Resolution probing stopped early: {}", e);
    }
    restored?;

    info!(
        "Supported resolutions: {}",
        supported
            .iter()
            .map(Resolution::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(supported)
}

fn try_candidates<D: CaptureDevice + ?Sized>(
    device: &mut D,
    candidates: &[Resolution],
    supported: &mut Vec<Resolution>,
) -> Result<()> {
    for &candidate in candidates {
        if supported.contains(&candidate) {
            continue;
        }

        device.request_resolution(candidate)?;
        let echoed = device.resolution()?;
        if echoed == candidate {
            debug!("Camera accepts {}", candidate);
            supported.push(candidate);
        } else {
            debug!("Camera answered {} when asked for {}", echoed, candidate);
        }
    }
    Ok(())
}
