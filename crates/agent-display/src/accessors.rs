//! Thin, lazily-initialized translators over platform display services.
//!
//! Each accessor is a trait so the streamer can be driven against a
//! simulated backend in tests without a real compositor. [`SimulatedDisplay`]
//! plays the same role the upstream static fallback display does: it hands
//! back a fixed-size solid-color frame so the rest of the pipeline (codec
//! session, packet framing, socket I/O) can be exercised end to end.

use std::sync::Arc;

use agent_codec::RawFrame;

use crate::error::{DisplayError, Result};
use crate::info::{CodecInfo, DisplayInfo};

/// Rotation, in quadrants counter-clockwise, 0..=3, or one of the two
/// sentinel "follow" values the streamer accepts from its control API.
pub const ORIENTATION_CURRENT_VIDEO: i32 = -1;
pub const ORIENTATION_CURRENT_DISPLAY: i32 = -2;

pub trait DisplayManagerAccessor: Send + Sync {
    fn get_display_info(&self, display_id: i32) -> Result<DisplayInfo>;
    fn get_display_ids(&self) -> Vec<i32>;
}

/// Opaque handle to a registered rotation watcher, returned by
/// [`WindowManagerAccessor::watch_rotation`] and passed back to
/// [`WindowManagerAccessor::remove_rotation_watcher`].
pub type RotationWatcherId = u64;

/// One subscriber of a per-display rotation-change feed. Compared by `id`
/// only so a [`crate::concurrent::ConcurrentList`] can remove a specific
/// registration without requiring the callback itself to be comparable.
#[derive(Clone)]
pub struct RotationWatcher {
    pub id: RotationWatcherId,
    pub callback: Arc<dyn Fn(i32) + Send + Sync>,
}

impl PartialEq for RotationWatcher {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

pub trait WindowManagerAccessor: Send + Sync {
    fn freeze_rotation(&self, display_id: i32, quadrant: i32);
    fn thaw_rotation(&self, display_id: i32);
    fn is_rotation_frozen(&self, display_id: i32) -> bool;

    /// Registers `watcher` for rotation changes on `display_id`. The
    /// accessor multiplexes one underlying platform registration per
    /// display across every subscriber; returns an id for later removal.
    fn watch_rotation(
        &self,
        display_id: i32,
        watcher: Arc<dyn Fn(i32) + Send + Sync>,
    ) -> RotationWatcherId;

    fn remove_rotation_watcher(&self, display_id: i32, watcher_id: RotationWatcherId);
}

/// A platform-allocated surface the codec writes encoded frames from and the
/// streamer reads raw frames into, bound to a virtual display handle.
pub trait VirtualDisplayAccessor: Send {
    /// Creates (or recreates) the virtual display handle sized for
    /// `video_size`, under the given `layer_stack_id`.
    fn acquire(&mut self, video_size: (i32, i32), layer_stack_id: i32) -> Result<()>;

    /// Produces the next raw frame to feed into the codec's input surface.
    /// Blocks until a frame is available or the display is released.
    fn next_frame(&mut self) -> Result<RawFrame>;

    fn release(&mut self);
}

/// Fixed-size, fixed-color virtual display. Cycles through a short palette
/// so successive sessions are visibly distinguishable in manual testing.
pub struct SimulatedDisplay {
    size: (i32, i32),
    color: [u8; 4],
    acquired: bool,
}

const PALETTE: [[u8; 4]; 3] = [
    [0x00, 0x40, 0xC0, 0xFF], // blue
    [0x20, 0xA0, 0x40, 0xFF], // green
    [0xC0, 0x40, 0x00, 0xFF], // orange
];

impl SimulatedDisplay {
    #[must_use]
    pub fn new(palette_index: usize) -> Self {
        Self {
            size: (0, 0),
            color: PALETTE[palette_index % PALETTE.len()],
            acquired: false,
        }
    }
}

impl VirtualDisplayAccessor for SimulatedDisplay {
    fn acquire(&mut self, video_size: (i32, i32), _layer_stack_id: i32) -> Result<()> {
        if video_size.0 <= 0 || video_size.1 <= 0 {
            return Err(DisplayError::VirtualDisplay("zero-sized request".into()));
        }
        self.size = video_size;
        self.acquired = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<RawFrame> {
        if !self.acquired {
            return Err(DisplayError::VirtualDisplay("not acquired".into()));
        }
        let (w, h) = self.size;
        let mut data = vec![0u8; (w as usize) * (h as usize) * 4];
        for pixel in data.chunks_exact_mut(4) {
            pixel.copy_from_slice(&self.color);
        }
        Ok(RawFrame {
            width: w as u32,
            height: h as u32,
            data,
        })
    }

    fn release(&mut self) {
        self.acquired = false;
    }
}

/// A small fixed roster of display ids, grounded in the upstream fallback's
/// single always-on display, extended here to exercise multi-display code
/// paths.
pub struct SimulatedDisplayManager {
    displays: Vec<DisplayInfo>,
}

impl SimulatedDisplayManager {
    #[must_use]
    pub fn new(displays: Vec<DisplayInfo>) -> Self {
        Self { displays }
    }
}

impl DisplayManagerAccessor for SimulatedDisplayManager {
    fn get_display_info(&self, display_id: i32) -> Result<DisplayInfo> {
        self.displays
            .iter()
            .find(|d| d.display_id == display_id)
            .copied()
            .ok_or(DisplayError::NoDisplay)
    }

    fn get_display_ids(&self) -> Vec<i32> {
        self.displays.iter().map(|d| d.display_id).collect()
    }
}

/// Resolves an absolute target orientation from a requested value, the
/// display's own rotation, and "follow" mode.
///
/// Implements the rotation-correction edge case from the outer loop: a
/// physical display sitting at rotation 2 with no explicit correction
/// requested is treated as rotation 0 with a correction of 2, compensating
/// for upside-down/upright portrait ambiguity in some platform versions.
#[must_use]
pub fn resolve_rotation_correction(requested_orientation: i32, display_rotation: i32) -> (i32, i32) {
    if requested_orientation == ORIENTATION_CURRENT_DISPLAY {
        // Follow-display mode still needs the rotation-2 normalization: a
        // physical display sitting upside-down with no explicit correction
        // requested is reported as upright (rotation 0) with a correction
        // of 2, same as the explicit-orientation path below.
        if display_rotation == 2 {
            return (0, 2);
        }
        return (display_rotation, 0);
    }
    let target = if requested_orientation == ORIENTATION_CURRENT_VIDEO {
        display_rotation
    } else {
        requested_orientation.rem_euclid(4)
    };

    if target == display_rotation && display_rotation == 2 {
        return (0, 2);
    }
    let correction = (target - display_rotation).rem_euclid(4);
    (display_rotation, correction)
}

/// Picks the encoder whose MIME type matches, or `None` if absent.
#[must_use]
pub fn find_codec<'a>(available: &'a [CodecInfo], mime_type: &str) -> Option<&'a CodecInfo> {
    available.iter().find(|c| c.mime_type == mime_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::PowerState;

    fn display(id: i32, rotation: i32) -> DisplayInfo {
        DisplayInfo {
            display_id: id,
            logical_size: (1080, 2400),
            density_dpi: 420,
            rotation,
            layer_stack_id: id,
            flags: 0,
            display_type: 0,
            power_state: PowerState::On,
        }
    }

    #[test]
    fn simulated_display_manager_looks_up_by_id() {
        let manager = SimulatedDisplayManager::new(vec![display(0, 0), display(1, 1)]);
        assert_eq!(manager.get_display_ids(), vec![0, 1]);
        assert_eq!(manager.get_display_info(1).unwrap().rotation, 1);
        assert!(manager.get_display_info(42).is_err());
    }

    #[test]
    fn simulated_virtual_display_produces_requested_size() {
        let mut vd = SimulatedDisplay::new(0);
        vd.acquire((720, 1600), 0).unwrap();
        let frame = vd.next_frame().unwrap();
        assert_eq!(frame.width, 720);
        assert_eq!(frame.height, 1600);
        assert_eq!(frame.data.len(), 720 * 1600 * 4);
    }

    #[test]
    fn next_frame_before_acquire_errors() {
        let mut vd = SimulatedDisplay::new(0);
        assert!(vd.next_frame().is_err());
    }

    #[test]
    fn rotation_correction_follows_video_orientation_by_default() {
        let (base, correction) = resolve_rotation_correction(ORIENTATION_CURRENT_VIDEO, 1);
        assert_eq!((base, correction), (1, 0));
    }

    #[test]
    fn rotation_180_without_explicit_correction_normalizes() {
        let (base, correction) = resolve_rotation_correction(ORIENTATION_CURRENT_VIDEO, 2);
        assert_eq!((base, correction), (0, 2));
    }

    #[test]
    fn rotation_180_in_follow_display_mode_also_normalizes() {
        let (base, correction) = resolve_rotation_correction(ORIENTATION_CURRENT_DISPLAY, 2);
        assert_eq!((base, correction), (0, 2));
    }

    #[test]
    fn explicit_orientation_computes_correction_mod_4() {
        let (base, correction) = resolve_rotation_correction(3, 1);
        assert_eq!((base, correction), (1, 2));
    }
}
