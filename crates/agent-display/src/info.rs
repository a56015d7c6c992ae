//! Snapshot types for displays, encoders, and foldable device states.

/// Power state of a display, as reported by the platform's display manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Off,
    DozeSuspend,
    On,
    Doze,
    /// Virtual-reality-only mode: still counts as "on" for streaming.
    Vr,
    Suspend,
}

/// Snapshot of a physical or virtual display.
///
/// A zero-sized `DisplayInfo` (`logical_size == (0, 0)`) means "unknown or
/// invalid" — callers must treat it the same as a missing display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayInfo {
    pub display_id: i32,
    pub logical_size: (i32, i32),
    pub density_dpi: i32,
    /// Rotation in quadrants counter-clockwise, 0..=3.
    pub rotation: i32,
    pub layer_stack_id: i32,
    pub flags: i32,
    pub display_type: i32,
    pub power_state: PowerState,
}

/// Bit 0 of [`DisplayInfo::flags`]: the display has a round shape.
pub const DISPLAY_FLAG_ROUND: i32 = 1 << 0;

impl DisplayInfo {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.logical_size.0 > 0 && self.logical_size.1 > 0
    }

    #[must_use]
    pub fn is_round(&self) -> bool {
        self.flags & DISPLAY_FLAG_ROUND != 0
    }

    /// `true` when the display is actually presenting content.
    #[must_use]
    pub fn is_on(&self) -> bool {
        matches!(self.power_state, PowerState::On | PowerState::Vr)
    }

    /// Display dimensions in the hardware's canonical (rotation = 0)
    /// orientation — i.e. the logical size rotated back by `-rotation`.
    #[must_use]
    pub fn natural_size(&self) -> (i32, i32) {
        let (w, h) = self.logical_size;
        if self.rotation % 2 == 0 {
            (w, h)
        } else {
            (h, w)
        }
    }
}

/// Immutable-per-session encoder descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    pub mime_type: String,
    pub name: String,
    pub max_resolution: (i32, i32),
    pub size_alignment: (i32, i32),
    pub max_frame_rate: i32,
}

impl CodecInfo {
    /// Short wire name used for the video channel's codec header
    /// (`h264`, `vp8`, `vp9`, `av01`, ...).
    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.name
    }
}
