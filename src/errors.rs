use std::fmt;

#[derive(Debug)]
pub enum CafeError {
    LockError,
    DuplicateName,
    InvalidName,
    EmptyOrder,
    OrderTooLarge,
    Cancelled,
    BrewFailed,
    LoggerInit,
    Io(std::io::Error),
    Serialization(serde_json::Error),
    InvalidPattern(regex::Error),
}

impl fmt::Display for CafeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CafeError::LockError => write!(f, "a shared lock was poisoned"),
            CafeError::DuplicateName => write!(f, "name already taken"),
            CafeError::InvalidName => write!(f, "bad customer name"),
            CafeError::EmptyOrder => write!(f, "order has no recognised items"),
            CafeError::OrderTooLarge => write!(f, "order exceeds the maximum number of units"),
            CafeError::Cancelled => write!(f, "operation cancelled"),
            CafeError::BrewFailed => write!(f, "brewing station failed"),
            CafeError::LoggerInit => write!(f, "logger was already initialised"),
            CafeError::Io(e) => write!(f, "io error: {}", e),
            CafeError::Serialization(e) => write!(f, "serialization error: {}", e),
            CafeError::InvalidPattern(e) => write!(f, "invalid pattern: {}", e),
        }
    }
}

impl std::error::Error for CafeError {}

impl<T> From<std::sync::PoisonError<T>> for CafeError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        CafeError::LockError
    }
}

impl From<std::io::Error> for CafeError {
    fn from(e: std::io::Error) -> Self {
        CafeError::Io(e)
    }
}

impl From<serde_json::Error> for CafeError {
    fn from(e: serde_json::Error) -> Self {
        CafeError::Serialization(e)
    }
}

impl From<regex::Error> for CafeError {
    fn from(e: regex::Error) -> Self {
        CafeError::InvalidPattern(e)
    }
}

impl From<log::SetLoggerError> for CafeError {
    fn from(_: log::SetLoggerError) -> Self {
        CafeError::LoggerInit
    }
}
