//! Error types for documentation checks.
//!
//! Only fatal conditions live here: a missing root, a missing build tool,
//! a failing change provider or invalid configuration. Malformed markup is
//! recovered inside the scanner and per-book build failures are reported
//! as data, so neither appears in this enum.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The documentation root does not exist or is not a directory.
    #[error("root directory {} does not exist", .0.display())]
    MissingRoot(PathBuf),

    /// No enclosing git repository was found.
    #[error("no git repository found above {}", .0.display())]
    NoRepository(PathBuf),

    /// A required program is not on `PATH`.
    #[error("program '{0}' does not exist, please install it")]
    MissingProgram(String),

    /// A git invocation failed or could not be started.
    #[error("git {args} failed: {message}")]
    Git { args: String, message: String },

    /// Options that cannot be combined or interpreted.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
