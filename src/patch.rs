//! Rewriting the version resource of a PE image in place, without external tools.
//!
//! ```no_run
//! use std::path::Path;
//! use verstamp::{patch, ParseOptions, Version};
//!
//! let outcome = patch::patch(Path::new("Assembly-CSharp.dll"), &"1.0".parse()?, &ParseOptions::default())?;
//! println!("{:?} -> {}", outcome.old, outcome.new);
//! # Ok::<(), verstamp::error::Error>(())
//! ```

use std::fs;
use std::path::Path;

use log::debug;

use crate::atomic;
use crate::error;
use crate::options::ParseOptions;
use crate::pe::version_info::VersionInfo;
use crate::pe::writer::{self, Placement};
use crate::pe::PE;
use crate::version::Version;

/// What a patch did
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PatchOutcome {
    /// The version the image reported before, if it reported one
    pub old: Option<String>,
    pub new: Version,
    pub placement: Placement,
    /// `false` when the image already carried exactly this resource
    pub changed: bool,
}

/// Stamps `version` into the image held in `bytes`.
///
/// On error `bytes` is unchanged.
pub fn apply(bytes: &mut [u8], version: &Version, opts: &ParseOptions) -> error::Result<PatchOutcome> {
    let pe = PE::parse(bytes)?;
    let mut info = pe.version_info(bytes, opts)?;
    let old = info.display_version();
    info.set_version(version);
    let blob = info.to_bytes()?;

    let current = pe.version_bytes(bytes).unwrap_or_default();
    if current == blob.as_slice() {
        debug!("Version resource already at {}", version);
        return Ok(PatchOutcome {
            old,
            new: *version,
            placement: Placement::InPlace,
            changed: false,
        });
    }
    let placement = writer::write_version_resource(&pe, bytes, &blob)?;
    debug!("Version resource written {:?}", placement);
    Ok(PatchOutcome {
        old,
        new: *version,
        placement,
        changed: true,
    })
}

/// Stamps `version` into the binary at `path`, replacing the file atomically
pub fn patch(path: &Path, version: &Version, opts: &ParseOptions) -> error::Result<PatchOutcome> {
    let mut bytes = fs::read(path)?;
    let outcome = apply(&mut bytes, version, opts)?;
    if outcome.changed {
        atomic::replace(path, &bytes)?;
    }
    Ok(outcome)
}

/// Reads the version resource of the binary at `path`
pub fn inspect(path: &Path, opts: &ParseOptions) -> error::Result<VersionInfo> {
    let bytes = fs::read(path)?;
    let pe = PE::parse(&bytes)?;
    pe.version_info(&bytes, opts)
}
