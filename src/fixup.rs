//! Repair of the `FileVersion` value length in ResourceHacker output.
//!
//! ResourceHacker writes a wrong `wValueLength` for the `FileVersion` entry of
//! a compiled version resource. Windows does not care, but the .NET
//! `FileVersionInfo` reader does and reports a truncated or empty version.
//!
//! A `String` structure in a version resource is laid out as
//!
//! ```text
//! wLength: u16 | wValueLength: u16 | wType: u16 | szKey: [u16] | padding | value
//! ```
//!
//! so the low byte of `wValueLength` sits 4 bytes before the key.

use log::debug;

use crate::error;
use crate::version::Version;

/// `"FileVersion"` as UTF-16LE, without terminator
pub const FILE_VERSION_KEY: &[u8; 22] = b"F\0i\0l\0e\0V\0e\0r\0s\0i\0o\0n\0";

/// Distance from the start of the key back to the low byte of `wValueLength`
pub const VALUE_LENGTH_BACK_OFFSET: usize = 4;

/// Offsets of every occurrence of [`FILE_VERSION_KEY`] in `blob`
pub fn find_file_version_keys(blob: &[u8]) -> Vec<usize> {
    blob.windows(FILE_VERSION_KEY.len())
        .enumerate()
        .filter(|(_, window)| *window == FILE_VERSION_KEY)
        .map(|(offset, _)| offset)
        .collect()
}

/// Rewrites the value length of every `FileVersion` entry in `blob` to the
/// length of `version` in UTF-16 units including its terminator.
///
/// Returns the number of entries fixed. The blob is left untouched on error.
pub fn fix_length_fields(blob: &mut [u8], version: &Version) -> error::Result<usize> {
    let text = version.to_string();
    // at most MAX_VERSION_TEXT_LEN + 1 units, which always fits the low byte
    let value_len = (text.len() + 1) as u8;

    let offsets = find_file_version_keys(blob);
    if offsets.is_empty() {
        return Err(error::Error::NoVersionFieldFound);
    }
    if offsets.iter().any(|&offset| offset < VALUE_LENGTH_BACK_OFFSET) {
        // a key this close to the start has no header in front of it
        return Err(error::Error::NoVersionFieldFound);
    }

    for &offset in &offsets {
        let at = offset - VALUE_LENGTH_BACK_OFFSET;
        debug!(
            "FileVersion key at {:#x}: value length {:#04x} -> {:#04x}",
            offset, blob[at], value_len
        );
        blob[at] = value_len;
    }
    Ok(offsets.len())
}
