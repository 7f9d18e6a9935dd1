use thiserror::Error;

/// Crate-wide error type. Each variant corresponds to one failure family
/// named for the component that raises it (see the component design notes).
#[derive(Error, Debug)]
pub enum MxfError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("graph error: {0}")]
    Graph(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("sequence error: {0}")]
    Sequence(String),

    #[error("state error: {0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, MxfError>;

impl MxfError {
    pub fn format(msg: impl Into<String>) -> Self {
        MxfError::Format(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        MxfError::Schema(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        MxfError::Graph(msg.into())
    }

    pub fn index(msg: impl Into<String>) -> Self {
        MxfError::Index(msg.into())
    }

    pub fn sequence(msg: impl Into<String>) -> Self {
        MxfError::Sequence(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        MxfError::State(msg.into())
    }
}
