//! A PE32 and PE32+ reader, just deep enough to find and rewrite the version resource
//!

pub mod data_directories;
pub mod header;
pub mod optional_header;
pub mod resource;
pub mod section_table;
pub mod utils;
pub mod version_info;
pub mod writer;

use log::debug;

use crate::error;
use crate::options::ParseOptions;

#[derive(Debug, Clone)]
/// An analyzed PE binary
pub struct PE {
    /// The PE header
    pub header: header::Header,
    /// The optional header, which every image carries
    pub optional_header: optional_header::OptionalHeader,
    /// A list of the sections in this PE binary
    pub sections: Vec<section_table::SectionTable>,
    /// The size of the binary
    pub size: usize,
    /// Whether this is a 64-bit image
    pub is_64: bool,
    /// Where the first `RT_VERSION` resource lives, if there is one
    pub version_resource: Option<resource::VersionResource>,
}

impl PE {
    /// Reads a PE binary from the underlying `bytes`
    pub fn parse(bytes: &[u8]) -> error::Result<Self> {
        let header = header::Header::parse(bytes)?;
        let optional_header = header.optional_header.ok_or_else(|| {
            error::Error::UnsupportedBinaryFormat(
                "image has no optional header (object file?)".into(),
            )
        })?;
        let mut offset = header.section_table_offset();
        let nsections = header.coff_header.number_of_sections as usize;
        if offset + nsections * section_table::SIZEOF_SECTION_TABLE > bytes.len() {
            return Err(error::Error::UnsupportedBinaryFormat(format!(
                "{} section headers at {:#x} exceed file size {:#x}",
                nsections,
                offset,
                bytes.len()
            )));
        }
        let mut sections = Vec::with_capacity(nsections);
        for _ in 0..nsections {
            sections.push(section_table::SectionTable::parse(bytes, &mut offset)?);
        }
        debug!("{} sections", sections.len());

        let version_resource = match *optional_header.data_directories.get_resource_table() {
            Some(dd) => resource::VersionResource::locate(bytes, dd, &sections)?,
            None => None,
        };
        debug!("version resource: {:#x?}", version_resource);

        Ok(PE {
            header,
            is_64: optional_header.is_64(),
            optional_header,
            sections,
            size: bytes.len(),
            version_resource,
        })
    }

    /// File offset of the header of section `index`
    pub fn section_header_offset(&self, index: usize) -> usize {
        self.header.section_table_offset() + index * section_table::SIZEOF_SECTION_TABLE
    }

    /// The raw `VS_VERSIONINFO` bytes
    pub fn version_bytes<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        self.version_resource
            .map(|resource| resource.data(bytes))
    }

    /// Parses the version resource, failing with [`error::Error::NoVersionResource`] when absent
    pub fn version_info(
        &self,
        bytes: &[u8],
        opts: &ParseOptions,
    ) -> error::Result<version_info::VersionInfo> {
        let data = self
            .version_bytes(bytes)
            .ok_or(error::Error::NoVersionResource)?;
        version_info::VersionInfo::parse_with_opts(data, opts)
    }
}
