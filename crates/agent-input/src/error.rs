#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("virtual device setup failed: {0}")]
    Init(String),

    #[error("uinput ioctl {0} failed: {1}")]
    Ioctl(&'static str, std::io::Error),

    #[error("pointer id {0} is out of range (max {1} simultaneous slots)")]
    PointerOutOfRange(i32, usize),

    #[error("no port association for phys {0}")]
    UnknownPort(String),
}

pub type Result<T> = std::result::Result<T, InputError>;
