//! # verstamp
//!
//! Stamps a version into the `VS_VERSIONINFO` resource of PE binaries (DLLs and
//! executables), so that Windows Explorer, `FileVersionInfo` and friends report
//! the version you built instead of whatever the toolchain left behind.
//!
//! Two strategies are available:
//!
//! * [`strategy::Structural`] parses the image, rewrites the existing version
//!   resource and writes the file back. No external tools are needed.
//! * [`strategy::CompileInject`] renders a resource script, compiles it with an
//!   external resource compiler, repairs the `FileVersion` length field the
//!   compiler gets wrong and injects the result with an external editor.
//!
//! Every file is replaced atomically: the new image is written next to the
//! target and renamed over it.
//!
//! # Example
//!
//! ```rust,no_run
//! use verstamp::patch;
//! use verstamp::{ParseOptions, Version};
//!
//! let path = std::path::Path::new("build/Managed/Assembly-CSharp.dll");
//! let version: Version = "1.3.0".parse()?;
//! let outcome = patch::patch(path, &version, &ParseOptions::default())?;
//! println!("{:?} -> {}", outcome.old, outcome.new);
//!
//! let info = patch::inspect(path, &ParseOptions::default())?;
//! assert_eq!(info.file_version(), Some("1.3.0.0".to_string()));
//! # Ok::<(), verstamp::error::Error>(())
//! ```
//!
//! Batches are usually driven from a JSON [`config::Config`] through a
//! [`stamper::VersionStamper`].

pub mod error;
pub mod options;
pub mod version;

pub mod atomic;
pub mod config;
pub mod fixup;
pub mod patch;
pub mod pe;
pub mod rc;
pub mod stamper;
pub mod strategy;
pub mod tools;

pub use crate::options::{ParseMode, ParseOptions};
pub use crate::version::{PackedVersion, Version};
