use crate::error;
use crate::pe::data_directories;
use scroll::{Pread, Pwrite, SizeWith};

/// Standard fields magic number for 32-bit binary
pub const MAGIC_32: u16 = 0x10b;
/// Standard fields magic number for 64-bit binary
pub const MAGIC_64: u16 = 0x20b;

/// The part of the standard fields shared by PE32 and PE32+
#[repr(C)]
#[derive(Debug, PartialEq, Copy, Clone, Default, Pread, Pwrite, SizeWith)]
pub struct StandardFields {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
}

// Windows-specific fields, relative to the start of the optional header. They
// line up for PE32 and PE32+ until the stack sizes, which widen to u64.
pub const SECTION_ALIGNMENT_OFFSET: usize = 32;
pub const SIZE_OF_IMAGE_OFFSET: usize = 56;
const NUMBER_OF_RVA_AND_SIZES_OFFSET_32: usize = 92;
const NUMBER_OF_RVA_AND_SIZES_OFFSET_64: usize = 108;

/// The fields of the optional header needed to locate and grow resources
#[derive(Debug, PartialEq, Copy, Clone, Default)]
pub struct OptionalHeader {
    /// File offset of the optional header
    pub offset: usize,
    pub standard_fields: StandardFields,
    pub section_alignment: u32,
    pub size_of_image: u32,
    pub data_directories: data_directories::DataDirectories,
}

impl OptionalHeader {
    pub fn parse(bytes: &[u8], offset: usize, size: usize) -> error::Result<Self> {
        let standard_fields: StandardFields = bytes.pread_with(offset, scroll::LE)?;
        let rva_count_offset = match standard_fields.magic {
            MAGIC_32 => NUMBER_OF_RVA_AND_SIZES_OFFSET_32,
            MAGIC_64 => NUMBER_OF_RVA_AND_SIZES_OFFSET_64,
            magic => {
                return Err(error::Error::UnsupportedBinaryFormat(format!(
                    "unsupported optional header magic {:#x}",
                    magic
                )));
            }
        };
        let mut dd_offset = rva_count_offset + 4;
        let count = bytes.pread_with::<u32>(offset + rva_count_offset, scroll::LE)? as usize;
        if dd_offset + count * data_directories::SIZEOF_DATA_DIRECTORY > size {
            return Err(error::Error::UnsupportedBinaryFormat(format!(
                "{} data directories do not fit an optional header of {:#x} bytes",
                count, size
            )));
        }
        dd_offset += offset;
        let data_directories =
            data_directories::DataDirectories::parse(bytes, count, &mut dd_offset)?;
        Ok(OptionalHeader {
            offset,
            standard_fields,
            section_alignment: bytes.pread_with(offset + SECTION_ALIGNMENT_OFFSET, scroll::LE)?,
            size_of_image: bytes.pread_with(offset + SIZE_OF_IMAGE_OFFSET, scroll::LE)?,
            data_directories,
        })
    }

    pub fn is_64(&self) -> bool {
        self.standard_fields.magic == MAGIC_64
    }
}
