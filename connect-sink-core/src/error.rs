use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Config Error - {0}")]
    Config(String),

    #[error("Write Error - {0}")]
    Write(String),

    #[error("Connection Error - {0}")]
    Connection(String),

    #[error("Capability Error - {0}")]
    Capability(CapabilityError),

    #[error("Lifecycle Error - {0}")]
    Lifecycle(String),

    #[error("DeadLetter Error - {0}")]
    DeadLetter(String),

    #[error("Statistics Error - {0}")]
    Statistics(String),
}

/// Failures while probing the host for an optional capability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// The host runtime predates the capability. Callers degrade instead of failing.
    #[error("capability not supported by the host runtime")]
    Unsupported,

    #[error("capability query failed: {0}")]
    Query(String),
}

impl Error {
    /// Short, stable name of the failure class, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Write(_) => "write",
            Error::Connection(_) => "connection",
            Error::Capability(_) => "capability",
            Error::Lifecycle(_) => "lifecycle",
            Error::DeadLetter(_) => "dead_letter",
            Error::Statistics(_) => "statistics",
        }
    }
}

impl From<CapabilityError> for Error {
    fn from(value: CapabilityError) -> Self {
        Error::Capability(value)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(value: std::fmt::Error) -> Self {
        Error::Statistics(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Write("disk full".to_string());
        assert_eq!(err.to_string(), "Write Error - disk full");
        assert_eq!(err.kind(), "write");

        let err: Error = CapabilityError::Unsupported.into();
        assert_eq!(
            err.to_string(),
            "Capability Error - capability not supported by the host runtime"
        );
        assert_eq!(err.kind(), "capability");
    }
}
