use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },
    #[error("{0}")]
    Runtime(String),
}

impl ExpressionError {
    pub(crate) fn syntax(message: impl Into<String>, offset: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            offset,
        }
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}
