//! Display capture and streaming for screenshare-agent.
//!
//! Owns everything between "a display exists" and "encoded frames are on
//! the wire": display/window accessor facades, the codec lifecycle state
//! machine, video-size and bit-rate-ladder arithmetic, and the per-display
//! streamer that ties them together.

pub mod accessors;
pub mod codec_handle;
pub mod concurrent;
pub mod error;
pub mod info;
pub mod scoped_setting;
pub mod streamer;
pub mod video_size;

pub use accessors::{
    resolve_rotation_correction, DisplayManagerAccessor, RotationWatcher, RotationWatcherId,
    SimulatedDisplay, SimulatedDisplayManager, VirtualDisplayAccessor, WindowManagerAccessor,
};
pub use codec_handle::{CodecHandle, CodecState};
pub use concurrent::ConcurrentList;
pub use error::{DisplayError, Result};
pub use info::{CodecInfo, DisplayInfo, PowerState};
pub use scoped_setting::{ScopedSetting, SettingBackend};
pub use streamer::DisplayStreamer;
