//! Error types for the CLI

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("policy error: {0}")]
    Policy(#[from] warden_authz::Error),

    #[error("compiler error: {message}")]
    Compiler { message: String },
}

impl Error {
    pub fn compiler(message: impl Into<String>) -> Self {
        Error::Compiler {
            message: message.into(),
        }
    }
}
