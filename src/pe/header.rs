use crate::error;
use crate::pe::optional_header;
use log::debug;
use scroll::{Pread, Pwrite, SizeWith};

/// DOS header magic, "MZ"
pub const DOS_MAGIC: u16 = 0x5a4d;
/// Offset of `e_lfanew` in the DOS header
pub const PE_POINTER_OFFSET: u32 = 0x3c;
/// PE signature, "PE\0\0"
pub const PE_MAGIC: u32 = 0x0000_4550;
pub const SIZEOF_PE_MAGIC: usize = 4;

/// The two DOS header fields Windows still reads
#[derive(Debug, PartialEq, Copy, Clone, Default)]
#[doc(alias("IMAGE_DOS_HEADER"))]
pub struct DosHeader {
    /// `e_magic`
    pub signature: u16,
    /// `e_lfanew`, file offset of the PE signature
    pub pe_pointer: u32,
}

impl DosHeader {
    pub fn parse(bytes: &[u8]) -> error::Result<Self> {
        let signature = bytes.pread_with::<u16>(0, scroll::LE).map_err(|_| {
            error::Error::UnsupportedBinaryFormat("cannot parse DOS signature".into())
        })?;
        if signature != DOS_MAGIC {
            return Err(error::Error::UnsupportedBinaryFormat(format!(
                "invalid DOS magic {:#x}",
                signature
            )));
        }
        let pe_pointer = bytes
            .pread_with::<u32>(PE_POINTER_OFFSET as usize, scroll::LE)
            .map_err(|_| {
                error::Error::UnsupportedBinaryFormat(format!(
                    "cannot parse PE header pointer (offset {:#x})",
                    PE_POINTER_OFFSET
                ))
            })?;
        Ok(DosHeader {
            signature,
            pe_pointer,
        })
    }
}

/// COFF file header
#[repr(C)]
#[derive(Debug, PartialEq, Copy, Clone, Default, Pread, Pwrite, SizeWith)]
#[doc(alias("IMAGE_FILE_HEADER"))]
pub struct CoffHeader {
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbol_table: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

pub const SIZEOF_COFF_HEADER: usize = 20;

#[derive(Debug, PartialEq, Copy, Clone, Default)]
pub struct Header {
    pub dos_header: DosHeader,
    /// PE Magic: PE\0\0, little endian
    pub signature: u32,
    pub coff_header: CoffHeader,
    pub optional_header: Option<optional_header::OptionalHeader>,
}

impl Header {
    pub fn parse(bytes: &[u8]) -> error::Result<Self> {
        let dos_header = DosHeader::parse(bytes)?;
        let mut offset = dos_header.pe_pointer as usize;
        let signature: u32 = bytes.gread_with(&mut offset, scroll::LE).map_err(|_| {
            error::Error::UnsupportedBinaryFormat(format!(
                "cannot parse PE signature (offset {:#x})",
                dos_header.pe_pointer
            ))
        })?;
        if signature != PE_MAGIC {
            return Err(error::Error::UnsupportedBinaryFormat(format!(
                "invalid PE magic {:#x}",
                signature
            )));
        }
        let coff_header: CoffHeader = bytes.gread_with(&mut offset, scroll::LE)?;
        debug!("{:#?}", coff_header);
        let optional_header = if coff_header.size_of_optional_header > 0 {
            Some(optional_header::OptionalHeader::parse(
                bytes,
                offset,
                coff_header.size_of_optional_header as usize,
            )?)
        } else {
            None
        };
        Ok(Header {
            dos_header,
            signature,
            coff_header,
            optional_header,
        })
    }

    /// File offset of the first section header
    pub fn section_table_offset(&self) -> usize {
        self.dos_header.pe_pointer as usize
            + SIZEOF_PE_MAGIC
            + SIZEOF_COFF_HEADER
            + self.coff_header.size_of_optional_header as usize
    }
}
