use crate::error;

use super::section_table;

/// Size of `wchar_t` in C (aka [`u16`] in Rust)
pub const SIZE_OF_WCHAR: usize = core::mem::size_of::<u16>();

pub fn is_in_range(rva: usize, r1: usize, r2: usize) -> bool {
    r1 <= rva && rva < r2
}

/// Performs arbitrary alignment of values based on homogeneous numerical types.
#[inline]
pub fn align_up<N>(value: N, align: N) -> N
where
    N: core::ops::Add<Output = N>
        + core::ops::Not<Output = N>
        + core::ops::BitAnd<Output = N>
        + core::ops::Sub<Output = N>
        + core::cmp::PartialEq
        + core::marker::Copy,
    u8: Into<N>,
{
    debug_assert!(align != 0u8.into(), "Align must be non-zero");
    (value + align - 1u8.into()) & !(align - 1u8.into())
}

fn rva2offset(rva: usize, section: &section_table::SectionTable) -> usize {
    (rva - section.virtual_address as usize) + section.pointer_to_raw_data as usize
}

fn is_in_section(rva: usize, section: &section_table::SectionTable) -> bool {
    let start = section.virtual_address as usize;
    is_in_range(rva, start, start + section.mapped_size() as usize)
}

/// Index of the section mapping `rva`
pub fn find_section(rva: usize, sections: &[section_table::SectionTable]) -> Option<usize> {
    sections
        .iter()
        .position(|section| is_in_section(rva, section))
}

/// Maps `rva` to a file offset through the section table
pub fn find_offset(rva: usize, sections: &[section_table::SectionTable]) -> Option<usize> {
    find_section(rva, sections).map(|index| rva2offset(rva, &sections[index]))
}

pub fn find_offset_or(
    rva: usize,
    sections: &[section_table::SectionTable],
    what: &str,
) -> error::Result<usize> {
    find_offset(rva, sections).ok_or_else(|| {
        error::Error::UnsupportedBinaryFormat(format!(
            "Cannot map {} rva {:#x} into offset",
            what, rva
        ))
    })
}

/// Converts UTF-16LE bytes into a [`String`], stopping at the first null.
///
/// A trailing odd byte is ignored.
pub fn to_utf16_string(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(SIZE_OF_WCHAR)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .take_while(|&wchar| wchar != 0)
        .collect::<Vec<_>>();
    String::from_utf16_lossy(&units)
}

/// Encodes `s` as null terminated UTF-16LE
pub fn to_utf16_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(core::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns() {
        assert_eq!(align_up(0usize, 4), 0);
        assert_eq!(align_up(5usize, 4), 8);
        assert_eq!(align_up(0x1001u32, 0x1000), 0x2000);
    }

    #[test]
    fn utf16_round_trip() {
        let bytes = to_utf16_bytes("Assembly Version");
        assert_eq!(bytes.len(), 34);
        assert_eq!(&bytes[32..], &[0, 0]);
        assert_eq!(to_utf16_string(&bytes), "Assembly Version");
        assert_eq!(to_utf16_string(&[0x41, 0x00, 0x42]), "A");
    }

    #[test]
    fn maps_rva_through_sections() {
        let section = section_table::SectionTable {
            virtual_address: 0x2000,
            virtual_size: 0x180,
            size_of_raw_data: 0x200,
            pointer_to_raw_data: 0x400,
            ..Default::default()
        };
        let sections = [section];
        assert_eq!(find_offset(0x2010, &sections), Some(0x410));
        assert_eq!(find_offset(0x2180, &sections), None);
        assert_eq!(find_offset(0x1fff, &sections), None);
    }
}
