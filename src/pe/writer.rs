//! Writes a new `VS_VERSIONINFO` blob back into an image.
//!
//! A resource that shrinks or keeps its size is overwritten where it is. A
//! resource that grows is moved to the unused tail of the raw data of the
//! section holding it, and every header field describing that section is
//! updated to cover it. Sections are never added or moved, so nothing else in
//! the image changes offset.

use log::debug;
use scroll::Pwrite;

use crate::error;
use crate::pe::data_directories::RESOURCE_TABLE_INDEX;
use crate::pe::optional_header::SIZE_OF_IMAGE_OFFSET;
use crate::pe::resource::{ResourceDataEntry, VersionResource};
use crate::pe::section_table::{SectionTable, VIRTUAL_SIZE_OFFSET};
use crate::pe::utils::align_up;
use crate::pe::PE;

/// Resource data is 32-bit aligned
const RESOURCE_DATA_ALIGNMENT: usize = 4;

/// Where the new resource ended up
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Placement {
    /// Overwrote the old resource
    InPlace,
    /// Moved past the end of the section contents
    Relocated {
        /// The new RVA of the resource
        rva: u32,
    },
}

pub struct VersionResourceWriter<'a> {
    pe: &'a PE,
    resource: VersionResource,
    section: SectionTable,
}

impl<'a> VersionResourceWriter<'a> {
    /// Fails with [`error::Error::NoVersionResource`] if `pe` has nothing to rewrite
    pub fn new(pe: &'a PE) -> error::Result<Self> {
        let resource = pe.version_resource.ok_or(error::Error::NoVersionResource)?;
        let section = pe.sections[resource.section];
        Ok(VersionResourceWriter {
            pe,
            resource,
            section,
        })
    }

    /// Replaces the version resource in `bytes` with `blob`.
    ///
    /// `bytes` must be the image `pe` was parsed from. Space is checked before
    /// anything is written.
    pub fn write(&self, bytes: &mut [u8], blob: &[u8]) -> error::Result<Placement> {
        if blob.len() <= self.resource.size() {
            self.write_in_place(bytes, blob)?;
            Ok(Placement::InPlace)
        } else {
            self.relocate(bytes, blob)
        }
    }

    fn write_in_place(&self, bytes: &mut [u8], blob: &[u8]) -> error::Result<()> {
        let start = self.resource.offset;
        let old_end = start + self.resource.size();
        debug!(
            "Writing {:#x} bytes in place at {:#x} (was {:#x})",
            blob.len(),
            start,
            self.resource.size()
        );
        bytes[start..start + blob.len()].copy_from_slice(blob);
        bytes[start + blob.len()..old_end].fill(0);
        let entry = ResourceDataEntry {
            size: blob.len() as u32,
            ..self.resource.data_entry
        };
        bytes.pwrite_with(entry, self.resource.data_entry_offset, scroll::LE)?;
        Ok(())
    }

    /// First RVA past this section that another section starts at
    fn next_section_start(&self) -> Option<usize> {
        let start = self.section.virtual_address;
        self.pe
            .sections
            .iter()
            .map(|section| section.virtual_address)
            .filter(|&va| va > start)
            .min()
            .map(|va| va as usize)
    }

    fn relocate(&self, bytes: &mut [u8], blob: &[u8]) -> error::Result<Placement> {
        let section = &self.section;
        let va = section.virtual_address as usize;
        let raw_end = va + section.size_of_raw_data as usize;
        let limit = match self.next_section_start() {
            Some(next) => raw_end.min(next),
            None => raw_end,
        };
        let new_rva = align_up(va + section.mapped_size() as usize, RESOURCE_DATA_ALIGNMENT);
        let new_end = new_rva + blob.len();
        if new_end > limit {
            return Err(error::Error::InsufficientSpace {
                needed: blob.len(),
                available: limit.saturating_sub(new_rva).max(self.resource.size()),
            });
        }
        let file_offset = section.pointer_to_raw_data as usize + (new_rva - va);
        if file_offset + blob.len() > bytes.len() {
            return Err(error::Error::UnsupportedBinaryFormat(format!(
                "section {} raw data ({:#x}..{:#x}) exceeds file size {:#x}",
                section.name(),
                section.pointer_to_raw_data,
                section.pointer_to_raw_data as usize + section.size_of_raw_data as usize,
                bytes.len()
            )));
        }
        debug!(
            "Relocating {:#x} bytes from rva {:#x} to rva {:#x} in section {}",
            blob.len(),
            self.resource.data_entry.offset_to_data,
            new_rva,
            section.name()
        );

        let old_start = self.resource.offset;
        bytes[old_start..old_start + self.resource.size()].fill(0);
        bytes[file_offset..file_offset + blob.len()].copy_from_slice(blob);

        let entry = ResourceDataEntry {
            offset_to_data: new_rva as u32,
            size: blob.len() as u32,
            ..self.resource.data_entry
        };
        bytes.pwrite_with(entry, self.resource.data_entry_offset, scroll::LE)?;

        let virtual_size = (new_end - va) as u32;
        let header_offset = self.pe.section_header_offset(self.resource.section);
        bytes.pwrite_with(virtual_size, header_offset + VIRTUAL_SIZE_OFFSET, scroll::LE)?;

        let optional_header = &self.pe.optional_header;
        if let Some(dd) = optional_header.data_directories.get_resource_table() {
            let dd_start = dd.virtual_address as usize;
            if (va..limit).contains(&dd_start) && new_end > dd_start + dd.size as usize {
                let dd_size_offset = optional_header
                    .data_directories
                    .offset_of(RESOURCE_TABLE_INDEX)
                    + 4;
                bytes.pwrite_with((new_end - dd_start) as u32, dd_size_offset, scroll::LE)?;
            }
        }

        let section_alignment = optional_header.section_alignment.max(1) as usize;
        let mapped_end = align_up(new_end, section_alignment) as u32;
        if mapped_end > optional_header.size_of_image {
            bytes.pwrite_with(
                mapped_end,
                optional_header.offset + SIZE_OF_IMAGE_OFFSET,
                scroll::LE,
            )?;
        }
        Ok(Placement::Relocated {
            rva: new_rva as u32,
        })
    }
}

/// Replaces the version resource of the image in `bytes` with `blob`
pub fn write_version_resource(
    pe: &PE,
    bytes: &mut [u8],
    blob: &[u8],
) -> error::Result<Placement> {
    VersionResourceWriter::new(pe)?.write(bytes, blob)
}
