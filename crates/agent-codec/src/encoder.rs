use crate::error::EncoderError;

/// Opaque raw frame pushed into the encoder's input surface. The encoder
/// itself is agnostic to where frames come from — a display accessor
/// backend produces them (see `agent-display::accessors`).
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGBA, top-to-bottom row order.
    pub data: Vec<u8>,
}

/// Configuration applied once per codec session, mirroring the MediaCodec
/// parameters the streamer's outer loop computes (§4.3 step 5).
#[derive(Debug, Clone, Copy)]
pub struct EncoderConfig {
    pub width: i32,
    pub height: i32,
    pub bit_rate: i64,
    pub frame_rate: i32,
    pub i_frame_interval_secs: u32,
    pub repeat_frame_after_ms: u32,
}

/// One coded output buffer.
#[derive(Debug, Clone)]
pub struct EncodedBuffer {
    pub data: Vec<u8>,
    /// Encoder-reported presentation timestamp, in microseconds, before
    /// the streamer's `pts_offset` normalization is applied.
    pub raw_pts_us: i64,
    pub is_config: bool,
    pub is_end_of_stream: bool,
}

/// Hardware video encoder: configure once, create an input surface, start,
/// then repeatedly dequeue output buffers until stopped or end-of-stream.
pub trait VideoEncoder: Send {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), EncoderError>;
    fn create_input_surface(&mut self) -> Result<(), EncoderError>;
    fn start(&mut self) -> Result<(), EncoderError>;

    /// Pushes a frame into the input surface. No-op for encoders that pull
    /// frames from a platform-managed surface instead.
    fn push_frame(&mut self, frame: &RawFrame) -> Result<(), EncoderError>;

    /// Blocks until the next output buffer is available. The streamer
    /// calls this with no timeout of its own; encoders that can hang
    /// forever rely on `stop` to unblock them (e.g. by pushing an EOS
    /// marker into their queue).
    fn dequeue_output(&mut self) -> Result<EncodedBuffer, EncoderError>;

    /// Requests the next coded frame be a full sync frame (I-frame).
    fn request_sync_frame(&mut self);

    fn stop(&mut self);
    fn release(&mut self);
}

impl VideoEncoder for Box<dyn VideoEncoder> {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), EncoderError> {
        (**self).configure(config)
    }
    fn create_input_surface(&mut self) -> Result<(), EncoderError> {
        (**self).create_input_surface()
    }
    fn start(&mut self) -> Result<(), EncoderError> {
        (**self).start()
    }
    fn push_frame(&mut self, frame: &RawFrame) -> Result<(), EncoderError> {
        (**self).push_frame(frame)
    }
    fn dequeue_output(&mut self) -> Result<EncodedBuffer, EncoderError> {
        (**self).dequeue_output()
    }
    fn request_sync_frame(&mut self) {
        (**self).request_sync_frame();
    }
    fn stop(&mut self) {
        (**self).stop();
    }
    fn release(&mut self) {
        (**self).release();
    }
}
