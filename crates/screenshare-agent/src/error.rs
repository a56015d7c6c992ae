//! Fatal-exit taxonomy: every failure that should terminate the process
//! carries one of these codes, matching the peer-visible exit codes listed
//! in the protocol description so a controller on the other end of the
//! socket can distinguish failure modes without parsing log output.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Generic = 1,
    InvalidCli = 2,
    WeakVideoEncoder = 3,
    RepeatedVideoEncoderErrors = 4,
    NoEncoder = 10,
    EncoderInit = 11,
    EncoderConfig = 12,
    VirtualDisplayCreate = 13,
    InputSurfaceCreate = 14,
    ServiceNotFound = 15,
    SocketConnect = 20,
    SocketIo = 21,
    NullPtr = 30,
    InvalidControlMessage = 40,
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Fatal {
    pub code: ExitCode,
    pub message: String,
}

impl Fatal {
    pub fn new(code: ExitCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Fatal>;
