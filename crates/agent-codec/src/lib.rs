// Hardware video encoder abstraction for screenshare-agent.
//
// Maps the codec operations the streamer needs (configure, create an
// input surface, start, dequeue output buffers, stop) onto GStreamer's
// appsrc -> encoder -> appsink pipeline model.

pub mod encoder;
pub mod error;
pub mod gstreamer_enc;

pub use encoder::{EncodedBuffer, EncoderConfig, VideoEncoder};
pub use error::EncoderError;
pub use gstreamer_enc::GStreamerEncoder;
