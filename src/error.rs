use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlbError {
    #[error("Invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("Unknown lifeline strategy: {0}")]
    UnknownStrategy(String),

    #[error("Place {0} is unreachable: mailbox closed")]
    PlaceUnreachable(usize),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GlbError>;
