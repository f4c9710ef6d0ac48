//! The two ways of getting a version into a binary.
//!
//! [`Structural`] rewrites the existing `RT_VERSION` resource directly.
//! [`CompileInject`] renders a resource script, compiles it with an external
//! compiler, repairs the compiled blob and injects it with an external editor.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::atomic::StagedFile;
use crate::error;
use crate::fixup;
use crate::options::ParseOptions;
use crate::patch;
use crate::rc::ScriptTemplate;
use crate::tools::{ResourceCompiler, ResourceEditor};
use crate::version::Version;

/// Stamps a version into one binary
pub trait VersioningStrategy {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Stamps `version` into the binary at `path`, returning the version it
    /// reported before, when it could be read
    fn stamp(&self, path: &Path, version: &Version) -> error::Result<Option<String>>;
}

/// Render, compile, fix up and inject
pub struct CompileInject {
    pub template: ScriptTemplate,
    pub compiler: Box<dyn ResourceCompiler>,
    pub editor: Box<dyn ResourceEditor>,
    /// Where the intermediate `.rc` and `.res` files are written
    pub work_dir: PathBuf,
    pub opts: ParseOptions,
}

impl CompileInject {
    fn module_name(path: &Path) -> error::Result<String> {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                error::Error::UnsupportedBinaryFormat(format!(
                    "{} has no file name",
                    path.display()
                ))
            })
    }

    fn build_resource(&self, name: &str, version: &Version) -> error::Result<PathBuf> {
        fs::create_dir_all(&self.work_dir)?;
        let script = self.work_dir.join(format!("{}.rc", name));
        let resource = script.with_extension("res");
        fs::write(&script, self.template.render(name, version))?;

        let compiled = self.compiler.compile(&script, &resource);
        let _ = fs::remove_file(&script);
        compiled?;

        let mut blob = fs::read(&resource)?;
        let fixed = fixup::fix_length_fields(&mut blob, version)
            .and_then(|count| {
                fs::write(&resource, &blob)?;
                Ok(count)
            });
        match fixed {
            Ok(count) => {
                debug!("Fixed {} FileVersion length field(s) in {}", count, resource.display());
                Ok(resource)
            }
            Err(err) => {
                let _ = fs::remove_file(&resource);
                Err(err)
            }
        }
    }
}

impl VersioningStrategy for CompileInject {
    fn name(&self) -> &'static str {
        "compile-inject"
    }

    fn stamp(&self, path: &Path, version: &Version) -> error::Result<Option<String>> {
        let old = match patch::inspect(path, &self.opts) {
            Ok(info) => info.display_version(),
            Err(err) => {
                debug!("{}: cannot read current version: {}", path.display(), err);
                None
            }
        };
        let name = Self::module_name(path)?;
        let resource = self.build_resource(&name, version)?;

        let injected = StagedFile::copy_of(path).and_then(|staged| {
            self.editor.inject(staged.path(), &resource)?;
            staged.commit()
        });
        let _ = fs::remove_file(&resource);
        injected?;
        Ok(old)
    }
}

/// In-place rewrite of the version resource
pub struct Structural {
    pub opts: ParseOptions,
    /// Used for binaries that have no version resource to rewrite
    pub fallback: Option<CompileInject>,
}

impl Structural {
    pub fn new(opts: ParseOptions) -> Self {
        Structural {
            opts,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: CompileInject) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl VersioningStrategy for Structural {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn stamp(&self, path: &Path, version: &Version) -> error::Result<Option<String>> {
        match patch::patch(path, version, &self.opts) {
            Ok(outcome) => Ok(outcome.old),
            Err(error::Error::NoVersionResource) => match &self.fallback {
                Some(fallback) => {
                    warn!(
                        "{}: no version resource, falling back to {}",
                        path.display(),
                        fallback.name()
                    );
                    fallback.stamp(path, version)
                }
                None => Err(error::Error::NoVersionResource),
            },
            Err(err) => Err(err),
        }
    }
}
