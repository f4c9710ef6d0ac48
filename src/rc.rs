//! Resource script rendering.
//!
//! A template is plain `.rc` text carrying `{name}` and `{version}` placeholders,
//! and optionally `{version_commas}` for the numeric `FILEVERSION` statements.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error;
use crate::version::Version;

/// Placeholder replaced by the module file name
pub const NAME_PLACEHOLDER: &str = "{name}";
/// Placeholder replaced by the dotted version
pub const VERSION_PLACEHOLDER: &str = "{version}";
/// Placeholder replaced by the comma separated version
pub const VERSION_COMMAS_PLACEHOLDER: &str = "{version_commas}";

/// Version resource of a DLL with a US English, Unicode string table.
pub const DEFAULT_TEMPLATE: &str = r#"1 VERSIONINFO
FILEVERSION {version_commas}
PRODUCTVERSION {version_commas}
FILEOS 0x4
FILETYPE 0x2
BEGIN
    BLOCK "StringFileInfo"
    BEGIN
        BLOCK "040904b0"
        BEGIN
            VALUE "FileDescription", "{name}"
            VALUE "FileVersion", "{version}"
            VALUE "InternalName", "{name}"
            VALUE "OriginalFilename", "{name}"
            VALUE "ProductVersion", "{version}"
            VALUE "Assembly Version", "{version}"
        END
    END
    BLOCK "VarFileInfo"
    BEGIN
        VALUE "Translation", 0x409, 1200
    END
END
"#;

/// A validated resource script template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTemplate {
    text: String,
}

impl ScriptTemplate {
    /// Wraps `text`, failing if either required placeholder is absent.
    pub fn new(text: impl Into<String>) -> error::Result<Self> {
        let text = text.into();
        for placeholder in [NAME_PLACEHOLDER, VERSION_PLACEHOLDER] {
            if !text.contains(placeholder) {
                return Err(error::Error::Template(format!(
                    "missing placeholder {}",
                    placeholder
                )));
            }
        }
        Ok(Self { text })
    }

    /// Reads a template from `path`
    pub fn from_file(path: &Path) -> error::Result<Self> {
        debug!("Loading resource script template {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::new(text).map_err(|err| match err {
            error::Error::Template(msg) => {
                error::Error::Template(format!("{}: {}", path.display(), msg))
            }
            err => err,
        })
    }

    /// Renders the script for `module_name` at `version`.
    pub fn render(&self, module_name: &str, version: &Version) -> String {
        // names go last so a module name cannot introduce placeholders
        self.text
            .replace(VERSION_COMMAS_PLACEHOLDER, &version.to_comma_string())
            .replace(VERSION_PLACEHOLDER, &version.to_string())
            .replace(NAME_PLACEHOLDER, module_name)
    }
}

impl Default for ScriptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_owned(),
        }
    }
}

/// Renders `template` for `module_name` at `version`.
pub fn render(template: &str, module_name: &str, version: &Version) -> error::Result<String> {
    Ok(ScriptTemplate::new(template)?.render(module_name, version))
}
