#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("no display available")]
    NoDisplay,

    #[error("display {0} is not currently on")]
    DisplayOff(i32),

    #[error("no usable encoder for this display")]
    NoCodec,

    #[error(transparent)]
    Codec(#[from] agent_codec::EncoderError),

    #[error("virtual display acquisition failed: {0}")]
    VirtualDisplay(String),

    #[error("accessor unavailable: {0}")]
    Accessor(String),
}

pub type Result<T> = std::result::Result<T, DisplayError>;
