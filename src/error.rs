//! A custom verstamp error
//!

use std::fmt;
use std::path::PathBuf;
use std::result;
use std::{error, io};

#[non_exhaustive]
#[derive(Debug)]
/// Everything that can go wrong while stamping a version
pub enum Error {
    /// A version component is empty, not a number, or does not fit 16 bits
    InvalidVersionPart {
        /// The whole version string as given
        version: String,
        /// The offending component
        part: String,
    },
    /// The resource script template is missing a required placeholder
    Template(String),
    /// A compiled resource blob contains no `FileVersion` key to repair
    NoVersionFieldFound,
    /// An external tool exited unsuccessfully
    ExternalToolFailure {
        /// The program that was run
        tool: PathBuf,
        /// The exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Whatever the tool printed on stdout and stderr
        diagnostics: String,
    },
    /// The binary carries no `RT_VERSION` resource
    NoVersionResource,
    /// The binary is not a PE image we can navigate, or is corrupt
    UnsupportedBinaryFormat(String),
    /// The rewritten version resource does not fit anywhere in the image
    InsufficientSpace {
        /// Bytes the serialized resource needs
        needed: usize,
        /// Bytes that are available for it
        available: usize,
    },
    /// The configuration is unusable
    Config(String),
    /// An IO based error
    IO(io::Error),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IO(ref io) => Some(io),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IO(err)
    }
}

impl From<scroll::Error> for Error {
    fn from(err: scroll::Error) -> Error {
        Error::UnsupportedBinaryFormat(format!("{}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Config(format!("{}", err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidVersionPart {
                ref version,
                ref part,
            } => write!(
                fmt,
                "Invalid version part {:?} in {:?}: expected an integer in 0..=65535",
                part, version
            ),
            Error::Template(ref msg) => write!(fmt, "Resource script template error: {}", msg),
            Error::NoVersionFieldFound => write!(
                fmt,
                "No FileVersion key found in compiled resource; the compiler output format changed"
            ),
            Error::ExternalToolFailure {
                ref tool,
                code,
                ref diagnostics,
            } => {
                write!(fmt, "{} failed", tool.display())?;
                match code {
                    Some(code) => write!(fmt, " with exit code {}", code)?,
                    None => write!(fmt, " (terminated by signal)")?,
                }
                if !diagnostics.is_empty() {
                    write!(fmt, ":\n{}", diagnostics.trim_end())?;
                }
                Ok(())
            }
            Error::NoVersionResource => write!(fmt, "Binary has no version resource"),
            Error::UnsupportedBinaryFormat(ref msg) => {
                write!(fmt, "Unsupported binary format: {}", msg)
            }
            Error::InsufficientSpace { needed, available } => write!(
                fmt,
                "Version resource needs {:#x} bytes but only {:#x} are available",
                needed, available
            ),
            Error::Config(ref msg) => write!(fmt, "Configuration error: {}", msg),
            Error::IO(ref err) => write!(fmt, "{}", err),
        }
    }
}

/// A stamping result
pub type Result<T> = result::Result<T, Error>;
