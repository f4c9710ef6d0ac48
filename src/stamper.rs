//! Stamping a version into a set of binaries

use std::fmt;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::strategy::VersioningStrategy;
use crate::version::Version;

/// One binary to stamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The name as configured, relative to the build directory
    pub name: String,
    pub path: PathBuf,
}

/// The ordered binaries of one run, resolved against a build directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetBinarySet {
    targets: Vec<Target>,
}

impl TargetBinarySet {
    pub fn resolve<I, S>(build_dir: &Path, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets = names
            .into_iter()
            .map(|name| Target {
                name: name.as_ref().to_owned(),
                path: build_dir.join(name.as_ref()),
            })
            .collect();
        TargetBinarySet { targets }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// What happened to one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    Repaired {
        old: Option<String>,
        new: Version,
    },
    /// The file does not exist
    Skipped,
    Failed(String),
    /// An earlier failure stopped the batch
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: Target,
    pub status: TargetStatus,
}

/// Overall outcome of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every target was stamped
    Complete,
    /// Some targets were missing, none failed
    Partial,
    Failed,
}

impl BatchStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, BatchStatus::Failed)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = match self {
            BatchStatus::Complete => "complete",
            BatchStatus::Partial => "partial",
            BatchStatus::Failed => "failed",
        };
        f.write_str(status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StampReport {
    pub entries: Vec<TargetReport>,
}

impl StampReport {
    pub fn status(&self) -> BatchStatus {
        let mut skipped = false;
        for entry in &self.entries {
            match entry.status {
                TargetStatus::Repaired { .. } => {}
                TargetStatus::Skipped => skipped = true,
                TargetStatus::Failed(_) | TargetStatus::NotAttempted => {
                    return BatchStatus::Failed;
                }
            }
        }
        if skipped {
            BatchStatus::Partial
        } else {
            BatchStatus::Complete
        }
    }

    /// Number of targets with the given outcome
    pub fn count(&self, pred: impl Fn(&TargetStatus) -> bool) -> usize {
        self.entries.iter().filter(|entry| pred(&entry.status)).count()
    }
}

/// Runs a [`VersioningStrategy`] over a [`TargetBinarySet`]
pub struct VersionStamper {
    pub version: Version,
    pub strategy: Box<dyn VersioningStrategy>,
    /// Keep going after a target fails
    pub continue_on_error: bool,
}

impl VersionStamper {
    pub fn new(version: Version, strategy: Box<dyn VersioningStrategy>) -> Self {
        VersionStamper {
            version,
            strategy,
            continue_on_error: false,
        }
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Stamps one target, logging the outcome
    pub fn stamp_one(&self, target: &Target) -> TargetStatus {
        let path = &target.path;
        if !path.exists() {
            warn!("{}: skipped (not found)", path.display());
            return TargetStatus::Skipped;
        }
        match self.strategy.stamp(path, &self.version) {
            Ok(old) => {
                info!(
                    "{}: version repaired {} -> {}",
                    path.display(),
                    old.as_deref().unwrap_or("<none>"),
                    self.version
                );
                TargetStatus::Repaired {
                    old,
                    new: self.version,
                }
            }
            Err(err) => {
                error!("{}: {}", path.display(), err);
                TargetStatus::Failed(err.to_string())
            }
        }
    }

    /// Stamps every target in order.
    ///
    /// A failure stops the batch unless [`Self::continue_on_error`] is set;
    /// the targets after it are reported as [`TargetStatus::NotAttempted`].
    pub fn run(&self, targets: &TargetBinarySet) -> StampReport {
        info!(
            "Stamping {} target(s) with {} using {}",
            targets.len(),
            self.version,
            self.strategy.name()
        );
        let mut report = StampReport::default();
        let mut aborted = false;
        for target in targets.iter() {
            let status = if aborted {
                TargetStatus::NotAttempted
            } else {
                self.stamp_one(target)
            };
            if matches!(status, TargetStatus::Failed(_)) && !self.continue_on_error {
                warn!("Stopping after failure, continueOnError is off");
                aborted = true;
            }
            report.entries.push(TargetReport {
                target: target.clone(),
                status,
            });
        }
        report
    }
}
