use crate::error;
use scroll::{Pread, Pwrite, SizeWith};

#[repr(C)]
#[derive(Debug, PartialEq, Copy, Clone, Default, Pread, Pwrite, SizeWith)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

pub const SIZEOF_DATA_DIRECTORY: usize = 8;
pub const NUM_DATA_DIRECTORIES: usize = 16;

/// Index of the resource table in the data directories
pub const RESOURCE_TABLE_INDEX: usize = 2;

impl DataDirectory {
    pub fn parse(bytes: &[u8], offset: &mut usize) -> error::Result<Self> {
        let dd = bytes.gread_with(offset, scroll::LE)?;
        Ok(dd)
    }
}

#[derive(Debug, PartialEq, Copy, Clone, Default)]
pub struct DataDirectories {
    /// File offset of the first directory
    pub offset: usize,
    pub data_directories: [Option<DataDirectory>; NUM_DATA_DIRECTORIES],
}

impl DataDirectories {
    pub fn parse(bytes: &[u8], count: usize, offset: &mut usize) -> error::Result<Self> {
        let start = *offset;
        let mut data_directories = [None; NUM_DATA_DIRECTORIES];
        if count > NUM_DATA_DIRECTORIES {
            return Err(error::Error::UnsupportedBinaryFormat(format!(
                "data directory count ({}) is greater than maximum number of data directories ({})",
                count, NUM_DATA_DIRECTORIES
            )));
        }
        for dir in data_directories.iter_mut().take(count) {
            let dd = DataDirectory::parse(bytes, offset)?;
            let dd = if dd.virtual_address == 0 && dd.size == 0 {
                None
            } else {
                Some(dd)
            };
            *dir = dd;
        }
        Ok(DataDirectories {
            offset: start,
            data_directories,
        })
    }

    #[inline]
    pub fn get_resource_table(&self) -> &Option<DataDirectory> {
        &self.data_directories[RESOURCE_TABLE_INDEX]
    }

    /// File offset of the directory at `index`
    pub fn offset_of(&self, index: usize) -> usize {
        self.offset + index * SIZEOF_DATA_DIRECTORY
    }
}
