// ABOUTME: Closed error taxonomy for the sandbox engine
// ABOUTME: Maps every lifecycle failure onto a small set of result codes for callers

use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Wrong data: {0}")]
    Wrong(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Duplicate,
    Unknown,
    Wrong,
    Timeout,
}

impl SandboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::Unknown(_) => ErrorKind::Unknown,
            Self::Wrong(_) => ErrorKind::Wrong,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }

    pub fn result_code(&self) -> ResultCode {
        self.kind().into()
    }
}

impl From<StorageError> for SandboxError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::AlreadySet(what) => Self::Duplicate(what),
            StorageError::InvalidData(msg) => Self::Wrong(msg),
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Result code carried in every response body.
///
/// The serialized strings are the ones the browser client already matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "NO SUCH THING...")]
    NoSuch,
    #[serde(rename = "DUPLICATE...")]
    Duplicate,
    #[serde(rename = "UNKNOWN ERROR...")]
    Unknown,
    #[serde(rename = "WRONG DATA...")]
    Wrong,
    #[serde(rename = "TIMEOUT...")]
    Timeout,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::NoSuch => "NO SUCH THING...",
            Self::Duplicate => "DUPLICATE...",
            Self::Unknown => "UNKNOWN ERROR...",
            Self::Wrong => "WRONG DATA...",
            Self::Timeout => "TIMEOUT...",
        }
    }
}

impl From<ErrorKind> for ResultCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => Self::NoSuch,
            ErrorKind::Duplicate => Self::Duplicate,
            ErrorKind::Unknown => Self::Unknown,
            ErrorKind::Wrong => Self::Wrong,
            ErrorKind::Timeout => Self::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_wire_strings() {
        assert_eq!(
            serde_json::to_string(&ResultCode::Success).unwrap(),
            "\"SUCCESS\""
        );
        assert_eq!(
            serde_json::to_string(&ResultCode::NoSuch).unwrap(),
            "\"NO SUCH THING...\""
        );
        assert_eq!(
            serde_json::to_string(&ResultCode::Unknown).unwrap(),
            "\"UNKNOWN ERROR...\""
        );
    }

    #[test]
    fn test_storage_errors_map_to_kinds() {
        let err: SandboxError = StorageError::NotFound("team 7".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: SandboxError = StorageError::AlreadySet("team 7 port".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        let err: SandboxError = StorageError::InvalidData("bad type".to_string()).into();
        assert_eq!(err.result_code(), ResultCode::Wrong);
    }
}
