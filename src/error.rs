#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Frame {id:#05x} too short - required={required} received={received}")]
    FrameTooShort {
        id: u32,
        required: usize,
        received: usize,
    },
    #[error("Cannot publish '{topic}': {reason}")]
    Publish { topic: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
