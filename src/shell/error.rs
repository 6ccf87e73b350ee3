use std::io;

use nix::errno::Errno;
use rustyline::error::ReadlineError;
use thiserror::Error;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_MISUSE: i32 = 2;
pub const EXIT_CANNOT_EXECUTE: i32 = 126;
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedToken(String),
    #[error("syntax error: unexpected end of file while looking for matching `{0}'")]
    UnmatchedQuote(char),
    #[error("syntax error: missing command")]
    MissingCommand,
    #[error("{0}: ambiguous redirect")]
    AmbiguousRedirect(String),
    #[error("{0}: command not found")]
    CommandNotFound(String),
    #[error("{0}: No such file or directory")]
    NoSuchFile(String),
    #[error("{0}: Permission denied")]
    PermissionDenied(String),
    #[error("{0}: Is a directory")]
    IsDirectory(String),
    #[error("{path}: cannot execute: {reason}")]
    CannotExecute { path: String, reason: String },
    #[error("{path}: {reason}")]
    Redirection { path: String, reason: String },
    #[error("{context}: {source}")]
    Sys {
        context: &'static str,
        #[source]
        source: Errno,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Readline(#[from] ReadlineError),
}

impl ShellError {
    pub fn redirection(path: &str, err: &io::Error) -> Self {
        ShellError::Redirection {
            path: path.to_string(),
            reason: describe_io_error(err),
        }
    }

    pub fn sys(context: &'static str, source: Errno) -> Self {
        ShellError::Sys { context, source }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            ShellError::UnexpectedToken(_)
                | ShellError::UnmatchedQuote(_)
                | ShellError::MissingCommand
        )
    }

    /// 错误对应的退出码
    pub fn status(&self) -> i32 {
        match self {
            ShellError::UnexpectedToken(_)
            | ShellError::UnmatchedQuote(_)
            | ShellError::MissingCommand => EXIT_MISUSE,
            ShellError::CommandNotFound(_) | ShellError::NoSuchFile(_) => EXIT_COMMAND_NOT_FOUND,
            ShellError::PermissionDenied(_)
            | ShellError::IsDirectory(_)
            | ShellError::CannotExecute { .. } => EXIT_CANNOT_EXECUTE,
            _ => EXIT_FAILURE,
        }
    }
}

/// 去掉 std 的 "(os error N)" 后缀，只保留系统描述
pub fn describe_io_error(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => Errno::from_raw(code).desc().to_string(),
        None => err.to_string(),
    }
}
