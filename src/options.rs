//! Parsing options for version resources
//!
//! Resource compilers disagree on how strictly they fill in the length fields
//! of a `VS_VERSIONINFO` tree. Strict parsing rejects any length that points
//! past its enclosing structure; permissive parsing clamps it and carries on.

/// How to treat a length field that does not fit its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Reject the resource
    #[default]
    Strict,
    /// Clamp the length and log a warning
    Permissive,
}

impl ParseMode {
    /// [`ParseMode::Strict`] when `strict`, otherwise [`ParseMode::Permissive`]
    pub const fn from_strict(strict: bool) -> Self {
        if strict {
            ParseMode::Strict
        } else {
            ParseMode::Permissive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseOptions {
    pub parse_mode: ParseMode,
}

impl ParseOptions {
    pub const fn new() -> Self {
        ParseOptions {
            parse_mode: ParseMode::Strict,
        }
    }

    pub const fn strict() -> Self {
        Self::new()
    }

    pub const fn permissive() -> Self {
        Self::new().with_parse_mode(ParseMode::Permissive)
    }

    pub const fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub(crate) fn is_permissive(&self) -> bool {
        self.parse_mode == ParseMode::Permissive
    }
}

/// Turns a recoverable read error into a fallback value in permissive mode.
///
/// In strict mode the error is returned unchanged.
pub(crate) trait Permissive<T, E> {
    fn or_permissive_and_value(self, permissive: bool, context: &str, value: T) -> Result<T, E>;
}

impl<T, E: core::fmt::Display> Permissive<T, E> for Result<T, E> {
    fn or_permissive_and_value(self, permissive: bool, context: &str, value: T) -> Result<T, E> {
        match self {
            Err(e) if permissive => {
                log::warn!("{}: {}, continuing with clamped value", context, e);
                Ok(value)
            }
            other => other,
        }
    }
}
