//! JSON configuration.
//!
//! A run is described by a `config.json`, optionally overridden key by key by a
//! `config.json.user` next to it:
//!
//! ```json
//! {
//!     "version": "1.3.0",
//!     "buildDir": "build/Managed",
//!     "targets": ["Assembly-CSharp.dll", "Plugin.dll"],
//!     "strategy": "structural",
//!     "continueOnError": false
//! }
//! ```
//!
//! Relative paths are relative to the directory holding the configuration.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::error;
use crate::options::{ParseMode, ParseOptions};
use crate::rc::ScriptTemplate;
use crate::stamper::{TargetBinarySet, VersionStamper};
use crate::strategy::{CompileInject, Structural, VersioningStrategy};
use crate::tools::ResourceHacker;
use crate::version::Version;

/// Suffix of the per-user override file
pub const USER_SUFFIX: &str = ".user";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    #[default]
    Structural,
    CompileInject,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    pub build_dir: PathBuf,
    /// File names relative to [`Self::build_dir`], stamped in this order
    pub targets: Vec<String>,
    pub strategy: StrategyKind,
    pub continue_on_error: bool,
    /// Path to `ResourceHacker.exe`
    pub resource_hacker: Option<PathBuf>,
    /// Resource script template, the built-in one when absent
    pub template: Option<PathBuf>,
    /// Scratch directory for `.rc` and `.res` files, the build directory when absent
    pub work_dir: Option<PathBuf>,
    /// Let the structural strategy compile and inject a resource into binaries that have none
    pub fallback_to_inject: bool,
    /// Reject version resources with inconsistent lengths instead of clamping them
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            version: String::new(),
            build_dir: PathBuf::from("."),
            targets: Vec::new(),
            strategy: StrategyKind::default(),
            continue_on_error: false,
            resource_hacker: None,
            template: None,
            work_dir: None,
            fallback_to_inject: false,
            strict: true,
        }
    }
}

/// Overwrites the top level keys of `base` with those of `overrides`
fn merge(base: &mut Value, overrides: Value) -> error::Result<()> {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                debug!("User override for {}", key);
                base.insert(key, value);
            }
            Ok(())
        }
        _ => Err(error::Error::Config(
            "configuration must be a JSON object".into(),
        )),
    }
}

fn read_json(path: &Path) -> error::Result<Value> {
    let text = fs::read_to_string(path)
        .map_err(|err| error::Error::Config(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&text)
        .map_err(|err| error::Error::Config(format!("{}: {}", path.display(), err)))
}

impl Config {
    /// Parses a single JSON document
    pub fn from_json(text: &str) -> error::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads `path` and its `.user` override, resolving relative paths
    pub fn load(path: &Path) -> error::Result<Self> {
        let mut value = read_json(path)?;
        let mut user = path.as_os_str().to_owned();
        user.push(USER_SUFFIX);
        let user = PathBuf::from(user);
        if user.is_file() {
            debug!("Loading {}", user.display());
            merge(&mut value, read_json(&user)?)?;
        }
        let mut config: Config = serde_json::from_value(value)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.build_dir);
        if let Some(template) = self.template.as_mut() {
            resolve(template);
        }
        if let Some(work_dir) = self.work_dir.as_mut() {
            resolve(work_dir);
        }
        // a bare program name is looked up on PATH
        if let Some(program) = self.resource_hacker.as_mut() {
            if program.components().count() > 1 {
                resolve(program);
            }
        }
    }

    /// Checks the configuration before any file is touched, returning the version to stamp
    pub fn validate(&self) -> error::Result<Version> {
        if self.version.is_empty() {
            return Err(error::Error::Config("no version configured".into()));
        }
        let version = Version::parse(&self.version)?;
        if self.targets.is_empty() {
            return Err(error::Error::Config("no targets configured".into()));
        }
        if self.targets.iter().any(|target| target.trim().is_empty()) {
            return Err(error::Error::Config("empty target name".into()));
        }
        Ok(version)
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions::new().with_parse_mode(ParseMode::from_strict(self.strict))
    }

    pub fn target_set(&self) -> TargetBinarySet {
        TargetBinarySet::resolve(&self.build_dir, &self.targets)
    }

    fn compile_inject(&self) -> error::Result<CompileInject> {
        let template = match &self.template {
            Some(path) => ScriptTemplate::from_file(path)?,
            None => ScriptTemplate::default(),
        };
        let tool = match &self.resource_hacker {
            Some(program) => ResourceHacker::new(program),
            None => ResourceHacker::default(),
        };
        Ok(CompileInject {
            template,
            compiler: Box::new(tool.clone()),
            editor: Box::new(tool),
            work_dir: self
                .work_dir
                .clone()
                .unwrap_or_else(|| self.build_dir.clone()),
            opts: self.parse_options(),
        })
    }

    /// The strategy selected by [`Self::strategy`]
    pub fn build_strategy(&self) -> error::Result<Box<dyn VersioningStrategy>> {
        Ok(match self.strategy {
            StrategyKind::CompileInject => Box::new(self.compile_inject()?),
            StrategyKind::Structural => {
                let structural = Structural::new(self.parse_options());
                if self.fallback_to_inject {
                    Box::new(structural.with_fallback(self.compile_inject()?))
                } else {
                    Box::new(structural)
                }
            }
        })
    }

    /// Validates the configuration and assembles the stamper it describes
    pub fn build_stamper(&self) -> error::Result<VersionStamper> {
        let version = self.validate()?;
        Ok(VersionStamper::new(version, self.build_strategy()?)
            .continue_on_error(self.continue_on_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::tempdir;

    #[test]
    fn defaults() {
        let config = Config::from_json(r#"{ "version": "1.0", "targets": ["a.dll"] }"#).unwrap();
        assert_eq!(config.strategy, StrategyKind::Structural);
        assert!(config.strict);
        assert!(!config.continue_on_error);
        assert_eq!(config.build_dir, Path::new("."));
        assert_eq!(config.validate().unwrap(), Version::new(1, 0, 0, 0));
        assert_eq!(config.parse_options(), ParseOptions::strict());
    }

    #[test]
    fn camel_case_keys() {
        let config = Config::from_json(
            r#"{
                "version": "2.3.0.1",
                "buildDir": "out",
                "targets": ["a.dll", "b.dll"],
                "strategy": "compileInject",
                "continueOnError": true,
                "resourceHacker": "tools/ResourceHacker.exe",
                "workDir": "obj",
                "fallbackToInject": true,
                "strict": false
            }"#,
        )
        .unwrap();
        assert_eq!(config.strategy, StrategyKind::CompileInject);
        assert!(config.continue_on_error);
        assert!(config.fallback_to_inject);
        assert_eq!(config.parse_options(), ParseOptions::permissive());
        assert_eq!(config.work_dir.as_deref(), Some(Path::new("obj")));
        let names: Vec<_> = config.target_set().iter().map(|t| t.path.clone()).collect();
        assert_eq!(names, [Path::new("out/a.dll"), Path::new("out/b.dll")]);
        assert_eq!(config.build_strategy().unwrap().name(), "compile-inject");
    }

    #[test]
    fn bad_version_is_rejected_up_front() {
        let config = Config::from_json(r#"{ "version": "1.70000", "targets": ["a.dll"] }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidVersionPart { .. })
        ));
        let config = Config::from_json(r#"{ "targets": ["a.dll"] }"#).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        let config = Config::from_json(r#"{ "version": "1.0" }"#).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_strategy_is_a_config_error() {
        let err = Config::from_json(r#"{ "strategy": "magic" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn user_file_overrides_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "version": "1.0", "buildDir": "build", "targets": ["a.dll"] }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("config.json.user"),
            r#"{ "buildDir": "/opt/game/Managed", "continueOnError": true }"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.build_dir, Path::new("/opt/game/Managed"));
        assert!(config.continue_on_error);
    }

    #[test]
    fn relative_paths_follow_the_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "version": "1.0", "buildDir": "build", "targets": ["a.dll"],
                 "template": "version.rc.in", "resourceHacker": "ResourceHacker.exe" }"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.build_dir, dir.path().join("build"));
        assert_eq!(config.template, Some(dir.path().join("version.rc.in")));
        assert_eq!(
            config.resource_hacker.as_deref(),
            Some(Path::new("ResourceHacker.exe"))
        );
    }

    #[test]
    fn missing_template_fails_strategy_selection() {
        let config = Config {
            version: "1.0".into(),
            targets: vec!["a.dll".into()],
            strategy: StrategyKind::CompileInject,
            template: Some(PathBuf::from("/nonexistent/version.rc.in")),
            ..Default::default()
        };
        assert!(config.build_stamper().is_err());
    }

    #[test]
    fn non_object_config_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "version": "1.0" }"#).unwrap();
        fs::write(dir.path().join("config.json.user"), "[1, 2]").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
