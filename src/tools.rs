//! External resource tooling.
//!
//! The compile and inject strategy drives a resource compiler to turn a script
//! into a `.res` file, and a resource editor to put that resource into the
//! target. Both are traits; [`ResourceHacker`] implements them on top of the
//! ResourceHacker command line.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, trace};

use crate::error;

/// Compiles a resource script into a binary `.res` file
pub trait ResourceCompiler {
    fn compile(&self, script: &Path, output: &Path) -> error::Result<()>;
}

/// Adds or replaces the resources of `resource` in the binary at `target`
pub trait ResourceEditor {
    fn inject(&self, target: &Path, resource: &Path) -> error::Result<()>;
}

/// Runs `program` to completion, capturing its output.
///
/// Fails with [`error::Error::ExternalToolFailure`] if it cannot be started or
/// exits unsuccessfully.
pub fn run_tool<I, S>(program: &Path, args: I) -> error::Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    debug!("Running {:?}", command);
    let output = command
        .output()
        .map_err(|err| error::Error::ExternalToolFailure {
            tool: program.to_path_buf(),
            code: None,
            diagnostics: format!("cannot start: {}", err),
        })?;
    let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
    diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
    let diagnostics = diagnostics.trim().to_owned();
    if !output.status.success() {
        return Err(error::Error::ExternalToolFailure {
            tool: program.to_path_buf(),
            code: output.status.code(),
            diagnostics,
        });
    }
    trace!("{}", diagnostics);
    Ok(diagnostics)
}

/// The ResourceHacker command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHacker {
    pub program: PathBuf,
}

impl Default for ResourceHacker {
    fn default() -> Self {
        ResourceHacker {
            program: PathBuf::from("ResourceHacker.exe"),
        }
    }
}

impl ResourceHacker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ResourceHacker {
            program: program.into(),
        }
    }

    /// Arguments compiling `script` into `output`
    pub fn compile_args(script: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-open".into(), script.into(), "-save".into()];
        args.push(output.into());
        args.extend(["-action", "compile", "-log", "CON"].map(OsString::from));
        args
    }

    /// Arguments replacing the resources of `target` with those in `resource`.
    ///
    /// `addoverwrite` rather than `addskip`, so an existing version resource
    /// is replaced instead of kept.
    pub fn inject_args(target: &Path, resource: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-open".into(), target.into(), "-save".into()];
        args.push(target.into());
        args.extend(["-action", "addoverwrite", "-res"].map(OsString::from));
        args.push(resource.into());
        args.extend(["-log", "CON"].map(OsString::from));
        args
    }
}

impl ResourceCompiler for ResourceHacker {
    fn compile(&self, script: &Path, output: &Path) -> error::Result<()> {
        run_tool(&self.program, Self::compile_args(script, output))?;
        Ok(())
    }
}

impl ResourceEditor for ResourceHacker {
    fn inject(&self, target: &Path, resource: &Path) -> error::Result<()> {
        run_tool(&self.program, Self::inject_args(target, resource))?;
        Ok(())
    }
}
