//! Synthetic PE images with a single `.rsrc` section.
#![allow(dead_code)]

use scroll::Pwrite;

use verstamp::pe::resource::{RT_MANIFEST, RT_VERSION};
use verstamp::pe::version_info::VersionInfo;
use verstamp::Version;

pub const SECTION_RVA: u32 = 0x1000;
pub const SECTION_ALIGNMENT: u32 = 0x1000;
pub const FILE_ALIGNMENT: u32 = 0x200;
pub const HEADERS_SIZE: usize = 0x200;
pub const PE_OFFSET: usize = 0x40;
/// Offset of the `VS_VERSIONINFO` bytes within the resource section
pub const BLOB_OFFSET: usize = 0x58;
/// Offset of the `IMAGE_RESOURCE_DATA_ENTRY` within the resource section
pub const DATA_ENTRY_OFFSET: usize = 0x48;

#[derive(Debug, Clone)]
pub struct Fixture {
    pub blob: Vec<u8>,
    /// Type id of the only resource
    pub resource_type: u16,
    pub raw_size: u32,
    pub pe32_plus: bool,
    /// Leave the resource data directory empty
    pub no_resource_directory: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture {
            blob: version_blob("0.0.0.0"),
            resource_type: RT_VERSION,
            raw_size: 0x600,
            pe32_plus: false,
            no_resource_directory: false,
        }
    }
}

/// A version resource like the ones Unity builds carry
pub fn version_info(version: &str) -> VersionInfo {
    let mut info = VersionInfo::new();
    info.set_string("CompanyName", "KSPBurst");
    info.set_string("InternalName", "engine.dll");
    info.set_version(&version.parse::<Version>().unwrap());
    info
}

pub fn version_blob(version: &str) -> Vec<u8> {
    version_info(version).to_bytes().unwrap()
}

impl Fixture {
    pub fn optional_header_offset(&self) -> usize {
        PE_OFFSET + 4 + 20
    }

    pub fn optional_header_size(&self) -> usize {
        if self.pe32_plus { 240 } else { 224 }
    }

    pub fn section_header_offset(&self) -> usize {
        self.optional_header_offset() + self.optional_header_size()
    }

    pub fn resource_directory_offset(&self) -> usize {
        let directories = if self.pe32_plus { 112 } else { 96 };
        self.optional_header_offset() + directories + 2 * 8
    }

    /// Bytes of the section in use
    pub fn used_size(&self) -> usize {
        BLOB_OFFSET + self.blob.len()
    }

    pub fn build(&self) -> Vec<u8> {
        let le = scroll::LE;
        let mut bytes = vec![0u8; HEADERS_SIZE + self.raw_size as usize];

        bytes.pwrite_with(b'M', 0, le).unwrap();
        bytes.pwrite_with(b'Z', 1, le).unwrap();
        bytes.pwrite_with(PE_OFFSET as u32, 0x3c, le).unwrap();
        bytes.pwrite_with(0x0000_4550u32, PE_OFFSET, le).unwrap();

        let coff = PE_OFFSET + 4;
        let machine: u16 = if self.pe32_plus { 0x8664 } else { 0x14c };
        bytes.pwrite_with(machine, coff, le).unwrap();
        bytes.pwrite_with(1u16, coff + 2, le).unwrap();
        bytes
            .pwrite_with(self.optional_header_size() as u16, coff + 16, le)
            .unwrap();
        bytes.pwrite_with(0x2102u16, coff + 18, le).unwrap();

        let opt = self.optional_header_offset();
        let magic: u16 = if self.pe32_plus { 0x20b } else { 0x10b };
        bytes.pwrite_with(magic, opt, le).unwrap();
        bytes.pwrite_with(SECTION_ALIGNMENT, opt + 32, le).unwrap();
        bytes.pwrite_with(FILE_ALIGNMENT, opt + 36, le).unwrap();
        bytes.pwrite_with(0x2000u32, opt + 56, le).unwrap();
        bytes.pwrite_with(HEADERS_SIZE as u32, opt + 60, le).unwrap();
        let rva_count = if self.pe32_plus { 108 } else { 92 };
        bytes.pwrite_with(16u32, opt + rva_count, le).unwrap();
        if !self.no_resource_directory {
            let dd = self.resource_directory_offset();
            bytes.pwrite_with(SECTION_RVA, dd, le).unwrap();
            bytes.pwrite_with(self.used_size() as u32, dd + 4, le).unwrap();
        }

        let section = self.section_header_offset();
        bytes[section..section + 5].copy_from_slice(b".rsrc");
        bytes.pwrite_with(self.used_size() as u32, section + 8, le).unwrap();
        bytes.pwrite_with(SECTION_RVA, section + 12, le).unwrap();
        bytes.pwrite_with(self.raw_size, section + 16, le).unwrap();
        bytes.pwrite_with(HEADERS_SIZE as u32, section + 20, le).unwrap();
        bytes.pwrite_with(0x4000_0040u32, section + 36, le).unwrap();

        let rsrc = HEADERS_SIZE;
        // type directory -> name directory -> language directory -> data entry
        let levels = [
            (0x00, self.resource_type as u32, 0x8000_0018u32),
            (0x18, 1, 0x8000_0030),
            (0x30, 0x409, DATA_ENTRY_OFFSET as u32),
        ];
        for (offset, id, target) in levels {
            bytes.pwrite_with(1u16, rsrc + offset + 14, le).unwrap();
            bytes.pwrite_with(id, rsrc + offset + 16, le).unwrap();
            bytes.pwrite_with(target, rsrc + offset + 20, le).unwrap();
        }
        let entry = rsrc + DATA_ENTRY_OFFSET;
        bytes
            .pwrite_with(SECTION_RVA + BLOB_OFFSET as u32, entry, le)
            .unwrap();
        bytes.pwrite_with(self.blob.len() as u32, entry + 4, le).unwrap();
        bytes[rsrc + BLOB_OFFSET..rsrc + self.used_size()].copy_from_slice(&self.blob);
        bytes
    }
}

/// A PE32 DLL whose version resource reports `version`
pub fn pe_with_version(version: &str) -> Vec<u8> {
    Fixture {
        blob: version_blob(version),
        ..Default::default()
    }
    .build()
}

/// A PE32 DLL with a manifest but no version resource
pub fn pe_without_version() -> Vec<u8> {
    Fixture {
        resource_type: RT_MANIFEST,
        blob: b"<assembly/>\0".to_vec(),
        ..Default::default()
    }
    .build()
}
