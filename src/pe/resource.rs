//! Locating the version resource in the `.rsrc` directory tree.
//!
//! The tree is three levels deep: type, name, language. Only the first name and
//! the first language below `RT_VERSION` are followed; an image with several
//! localized version resources is stamped in its first one.

use crate::error;
use log::debug;
use scroll::{Pread, Pwrite, SizeWith};

use crate::pe::data_directories;
use crate::pe::section_table;
use crate::pe::utils;

pub const RT_VERSION: u16 = 16;
pub const RT_MANIFEST: u16 = 24;

/// Type, name and language
pub const MAX_RESOURCE_DEPTH: usize = 3;

/// `IMAGE_RESOURCE_DIRECTORY`, followed in the file by its entries
#[repr(C)]
#[derive(Debug, PartialEq, Copy, Clone, Default, Pread, Pwrite, SizeWith)]
pub struct ImageResourceDirectory {
    pub characteristics: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    /// Entries named by a string, stored first
    pub number_of_named_entries: u16,
    /// Entries named by an integer id, stored after the named ones
    pub number_of_id_entries: u16,
}

pub const SIZEOF_RESOURCE_DIRECTORY: usize = 16;

/// High bit of [`ResourceEntry::name_or_id`]: the name is a string offset
pub const IMAGE_RESOURCE_NAME_IS_STRING: u32 = 0x8000_0000;
/// High bit of [`ResourceEntry::offset_to_data_or_directory`]: the entry is a subdirectory
pub const IMAGE_RESOURCE_DATA_IS_DIRECTORY: u32 = 0x8000_0000;
pub const IMAGE_RESOURCE_MASK: u32 = 0x7FFF_FFFF;

/// `IMAGE_RESOURCE_DIRECTORY_ENTRY`
#[repr(C)]
#[derive(Debug, PartialEq, Copy, Clone, Default, Pread, Pwrite, SizeWith)]
pub struct ResourceEntry {
    pub name_or_id: u32,
    pub offset_to_data_or_directory: u32,
}

pub const RESOURCE_ENTRY_SIZE: usize = 8;

/// `IMAGE_RESOURCE_DATA_ENTRY`
#[repr(C)]
#[derive(Debug, PartialEq, Copy, Clone, Default, Pread, Pwrite, SizeWith)]
pub struct ResourceDataEntry {
    /// An RVA, not an offset into the resource section
    pub offset_to_data: u32,
    pub size: u32,
    pub code_page: u32,
    pub reserved: u32,
}

pub const SIZEOF_RESOURCE_DATA_ENTRY: usize = 16;

impl ResourceEntry {
    pub fn id(&self) -> Option<u16> {
        if self.name_or_id & IMAGE_RESOURCE_NAME_IS_STRING != 0 {
            None
        } else {
            Some(self.name_or_id as u16)
        }
    }

    pub fn is_directory(&self) -> bool {
        self.offset_to_data_or_directory & IMAGE_RESOURCE_DATA_IS_DIRECTORY != 0
    }

    /// Offset of the subdirectory or data entry within the resource section
    pub fn target(&self) -> usize {
        (self.offset_to_data_or_directory & IMAGE_RESOURCE_MASK) as usize
    }
}

/// A directory and the raw bytes of its entries
#[derive(Debug, Copy, Clone)]
struct Directory<'a> {
    entries: &'a [u8],
}

impl<'a> Directory<'a> {
    fn parse(rsrc: &'a [u8], offset: usize) -> error::Result<Self> {
        let header: ImageResourceDirectory = rsrc.pread_with(offset, scroll::LE)?;
        let count = header.number_of_named_entries as usize + header.number_of_id_entries as usize;
        let start = offset + SIZEOF_RESOURCE_DIRECTORY;
        let end = start + count * RESOURCE_ENTRY_SIZE;
        let entries = rsrc.get(start..end).ok_or_else(|| {
            error::Error::UnsupportedBinaryFormat(format!(
                "resource directory at {:#x} lists {} entries past the end of the section",
                offset, count
            ))
        })?;
        Ok(Directory { entries })
    }

    fn entry(&self, index: usize) -> error::Result<Option<ResourceEntry>> {
        let offset = index * RESOURCE_ENTRY_SIZE;
        if offset >= self.entries.len() {
            return Ok(None);
        }
        Ok(Some(self.entries.pread_with(offset, scroll::LE)?))
    }

    fn find_id(&self, id: u16) -> error::Result<Option<ResourceEntry>> {
        let mut index = 0;
        while let Some(entry) = self.entry(index)? {
            if entry.id() == Some(id) {
                return Ok(Some(entry));
            }
            index += 1;
        }
        Ok(None)
    }
}

/// Follows first entries from `entry` down to a data entry.
///
/// A subdirectory that points back up the tree hits [`MAX_RESOURCE_DEPTH`] and fails.
fn first_leaf(rsrc: &[u8], mut entry: ResourceEntry) -> error::Result<Option<ResourceEntry>> {
    for _ in 0..MAX_RESOURCE_DEPTH {
        if !entry.is_directory() {
            return Ok(Some(entry));
        }
        match Directory::parse(rsrc, entry.target())?.entry(0)? {
            Some(next) => entry = next,
            None => return Ok(None),
        }
    }
    if entry.is_directory() {
        return Err(error::Error::UnsupportedBinaryFormat(
            "resource directory nests deeper than type/name/language".into(),
        ));
    }
    Ok(Some(entry))
}

/// Where the version resource of an image lives
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct VersionResource {
    /// File offset of the [`ResourceDataEntry`] describing the resource
    pub data_entry_offset: usize,
    pub data_entry: ResourceDataEntry,
    /// File offset of the `VS_VERSIONINFO` bytes
    pub offset: usize,
    /// Index of the section holding the `VS_VERSIONINFO` bytes
    pub section: usize,
}

impl VersionResource {
    pub fn size(&self) -> usize {
        self.data_entry.size as usize
    }

    /// The resource bytes within `pe`
    pub fn data<'a>(&self, pe: &'a [u8]) -> &'a [u8] {
        &pe[self.offset..self.offset + self.size()]
    }

    /// Locates the first `RT_VERSION` resource through the resource data directory.
    ///
    /// Returns `None` when the image has no version resource.
    pub fn locate(
        pe: &[u8],
        dd: data_directories::DataDirectory,
        sections: &[section_table::SectionTable],
    ) -> error::Result<Option<Self>> {
        let rsrc_offset =
            utils::find_offset_or(dd.virtual_address as usize, sections, "resource directory")?;
        let rsrc = pe
            .get(rsrc_offset..rsrc_offset + dd.size as usize)
            .ok_or_else(|| {
                error::Error::UnsupportedBinaryFormat(format!(
                    "resource directory at {:#x} ({:#x} bytes) runs past the end of the file ({:#x})",
                    rsrc_offset,
                    dd.size,
                    pe.len()
                ))
            })?;

        let Some(version) = Directory::parse(rsrc, 0)?.find_id(RT_VERSION)? else {
            return Ok(None);
        };
        let Some(leaf) = first_leaf(rsrc, version)? else {
            return Ok(None);
        };
        let entry_offset = leaf.target();
        let data_entry: ResourceDataEntry = rsrc.pread_with(entry_offset, scroll::LE)?;
        debug!("RT_VERSION data entry at {:#x}: {:#x?}", entry_offset, data_entry);

        let rva = data_entry.offset_to_data as usize;
        let section = utils::find_section(rva, sections).ok_or_else(|| {
            error::Error::UnsupportedBinaryFormat(format!(
                "version resource rva {:#x} is outside every section",
                rva
            ))
        })?;
        let offset = utils::find_offset_or(rva, sections, "version resource")?;
        if offset + data_entry.size as usize > pe.len() {
            return Err(error::Error::UnsupportedBinaryFormat(format!(
                "version resource at {:#x} ({:#x} bytes) runs past the end of the file ({:#x})",
                offset,
                data_entry.size,
                pe.len()
            )));
        }
        Ok(Some(VersionResource {
            data_entry_offset: rsrc_offset + entry_offset,
            data_entry,
            offset,
            section,
        }))
    }
}
