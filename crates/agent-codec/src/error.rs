#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("no encoder available for mime type {0}")]
    NoEncoder(String),

    #[error("encoder initialization failed: {0}")]
    Init(String),

    #[error("encoder configuration failed: {0}")]
    Configure(String),

    #[error("input surface creation failed: {0}")]
    InputSurface(String),

    #[error("dequeue failed: {0}")]
    Dequeue(String),

    #[error("end of stream")]
    EndOfStream,
}
