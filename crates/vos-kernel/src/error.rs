// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use serde::{Deserialize, Serialize};

use crate::permission::Access;

#[derive(thiserror::Error, Debug)]
pub enum KernelError {
    #[error("no such file or directory")]
    PathNotFound,
    #[error("permission denied ({0})")]
    PermissionDenied(Access),
    #[error("file exists")]
    AlreadyExists,
    #[error("is a directory")]
    IsDirectory,
    #[error("not a directory")]
    IsFile,
    #[error("directory not empty")]
    NotEmpty,
    #[error("resource busy")]
    Busy,
    #[error("cross-device link")]
    CrossDevice,
    #[error("missing argument: {0}")]
    MissingArgument(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("authentication failure")]
    AuthenticationFailed,
    #[error("no such process: {0}")]
    NoSuchProcess(u32),
    #[error("interrupted")]
    Interrupted,
    #[error("unsupported snapshot version {0}")]
    UnsupportedSnapshot(u32),
    #[error("snapshot encoding: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Generic(String),
}

pub type KernelResult<T> = std::result::Result<T, KernelError>;

/// Copyable error tag surfaced to commands and user programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PathNotFound,
    PermissionDenied(Access),
    AlreadyExists,
    IsDirectory,
    IsFile,
    MissingArgument,
    InvalidArgument,
    Generic,
}

impl ErrorKind {
    /// User-facing message, in the style of the game's coreutils.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::PathNotFound => "No such file or directory",
            ErrorKind::PermissionDenied(Access::Read) => "Permission denied (read)",
            ErrorKind::PermissionDenied(Access::Write) => "Permission denied (write)",
            ErrorKind::PermissionDenied(Access::Execute) => "Permission denied",
            ErrorKind::AlreadyExists => "File exists",
            ErrorKind::IsDirectory => "Is a directory",
            ErrorKind::IsFile => "Not a directory",
            ErrorKind::MissingArgument => "Missing argument",
            ErrorKind::InvalidArgument => "Invalid argument",
            ErrorKind::Generic => "Operation failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl KernelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::PathNotFound => ErrorKind::PathNotFound,
            KernelError::PermissionDenied(access) => ErrorKind::PermissionDenied(*access),
            KernelError::AlreadyExists => ErrorKind::AlreadyExists,
            KernelError::IsDirectory => ErrorKind::IsDirectory,
            KernelError::IsFile => ErrorKind::IsFile,
            KernelError::MissingArgument(_) => ErrorKind::MissingArgument,
            KernelError::InvalidArgument(_)
            | KernelError::UnknownUser(_)
            | KernelError::UnknownGroup(_) => ErrorKind::InvalidArgument,
            _ => ErrorKind::Generic,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        KernelError::InvalidArgument(msg.into())
    }

    pub fn missing(what: impl Into<String>) -> Self {
        KernelError::MissingArgument(what.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(KernelError::PathNotFound.kind(), ErrorKind::PathNotFound);
        assert_eq!(
            KernelError::PermissionDenied(Access::Write).kind(),
            ErrorKind::PermissionDenied(Access::Write)
        );
        assert_eq!(
            KernelError::UnknownUser("bob".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(KernelError::Busy.kind(), ErrorKind::Generic);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            KernelError::PermissionDenied(Access::Read).to_string(),
            "permission denied (read)"
        );
        assert_eq!(ErrorKind::IsFile.to_string(), "Not a directory");
    }
}
