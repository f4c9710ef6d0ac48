//! The `VS_VERSIONINFO` tree of an `RT_VERSION` resource.
//!
//! Every node of the tree shares one header:
//!
//! ```text
//! wLength: u16 | wValueLength: u16 | wType: u16 | szKey: [u16] | pad to 4 | value | pad to 4 | children
//! ```
//!
//! The root `VS_VERSION_INFO` node holds a [`VsFixedFileInfo`] as its value and
//! has a `StringFileInfo` and a `VarFileInfo` child. `StringFileInfo` holds one
//! `StringTable` per language and code page, whose children are the `String`
//! key/value pairs. `VarFileInfo` holds `Var` leaves such as `Translation`.
//!
//! Compilers are sloppy with `wValueLength` of `String` leaves (some count
//! bytes, some count characters, ResourceHacker sometimes writes garbage), so
//! leaf values are read up to the end of the node and the length is recomputed
//! when the tree is serialized again. Serializing a parsed tree is canonical:
//! parsing and serializing its output yields the same bytes.

use core::fmt;

use log::debug;
use scroll::{Pread, Pwrite, SizeWith};

use crate::error;
use crate::options::{ParseOptions, Permissive};
use crate::pe::utils::{align_up, to_utf16_bytes, to_utf16_string, SIZE_OF_WCHAR};
use crate::version::{PackedVersion, Version};

/// [`VsFixedFileInfo::signature`]: The signature for the fixed file information structure in the version resource.
pub const VS_FFI_SIGNATURE: u32 = 0xFEEF04BD;
/// [`VsFixedFileInfo::struct_version`]: The structure version for the fixed file information.
///
/// NOTE: Typo is inherited from Windows SDK.
pub const VS_FFI_STRUCVERSION: u32 = 0x00010000;
/// [`VsFixedFileInfo::file_flags_mask`]: A mask to extract the file flags from the fixed file information.
pub const VS_FFI_FILEFLAGSMASK: u32 = 0x0000003F;
/// [`VsFixedFileInfo::file_os`]: The file was designed for 32-bit Windows on Windows NT.
pub const VOS_NT_WINDOWS32: u32 = 0x00040004;
/// [`VsFixedFileInfo::file_type`]: The file contains a DLL.
pub const VFT_DLL: u32 = 0x00000002;

/// Key of the root node
pub const VS_VERSION_INFO_KEY: &str = "VS_VERSION_INFO";
/// Key of the block holding the string tables
pub const STRING_FILE_INFO_KEY: &str = "StringFileInfo";
/// Key of the block holding the `Var` leaves
pub const VAR_FILE_INFO_KEY: &str = "VarFileInfo";
/// Key of the `Var` leaf listing language and code page pairs
pub const TRANSLATION_KEY: &str = "Translation";
/// Language neutral, Unicode
pub const DEFAULT_STRING_TABLE_KEY: &str = "000004b0";
/// US English, Unicode
pub const US_ENGLISH_UNICODE_KEY: &str = "040904b0";

pub const FILE_VERSION_KEY: &str = "FileVersion";
pub const PRODUCT_VERSION_KEY: &str = "ProductVersion";
pub const ASSEMBLY_VERSION_KEY: &str = "Assembly Version";

/// The string table entries that carry the dotted version
pub const VERSION_STRING_KEYS: [&str; 3] =
    [FILE_VERSION_KEY, PRODUCT_VERSION_KEY, ASSEMBLY_VERSION_KEY];

/// `wType` of nodes holding binary data
pub const VALUE_TYPE_BINARY: u16 = 0;
/// `wType` of nodes holding UTF-16 text
pub const VALUE_TYPE_TEXT: u16 = 1;

/// Size of the `wLength`, `wValueLength` and `wType` header
pub const SIZEOF_NODE_HEADER: usize = 6;
/// Nodes, keys and values are aligned to 32-bit boundaries
pub const NODE_ALIGNMENT: usize = core::mem::size_of::<u32>();

/// Fixed, numeric part of a version resource.
#[repr(C)]
#[derive(PartialEq, Copy, Clone, Default, Pread, Pwrite, SizeWith)]
#[doc(alias("VS_FIXEDFILEINFO"))]
pub struct VsFixedFileInfo {
    /// The signature of the fixed file information structure. Must be equals to [`VS_FFI_SIGNATURE`].
    pub signature: u32,
    /// The version of the structure.
    pub struct_version: u32,
    /// The file version (most significant part).
    pub file_version_ms: u32,
    /// The file version (least significant part).
    pub file_version_ls: u32,
    /// The product version (most significant part).
    pub product_version_ms: u32,
    /// The product version (least significant part).
    pub product_version_ls: u32,
    /// The mask for the file flags.
    pub file_flags_mask: u32,
    /// The file flags that specify characteristics of the file.
    pub file_flags: u32,
    /// The operating system that the file is designed for.
    pub file_os: u32,
    /// The type of the file (e.g., executable, DLL).
    pub file_type: u32,
    /// The subtype of the file (specific to the file type).
    pub file_subtype: u32,
    /// The file date (most significant part).
    pub file_date_ms: u32,
    /// The file date (least significant part).
    pub file_date_ls: u32,
}

pub const SIZEOF_VS_FIXED_FILE_INFO: usize = 13 * 4;

impl fmt::Debug for VsFixedFileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VsFixedFileInfo")
            .field(
                "signature",
                &format_args!(
                    "{:#x} ({})",
                    &self.signature,
                    if self.is_valid() { "Valid" } else { "Invalid" }
                ),
            )
            .field("file_version", &format_args!("{}", self.file_version()))
            .field(
                "product_version",
                &format_args!("{}", self.product_version()),
            )
            .field("file_flags", &format_args!("{:#x}", &self.file_flags))
            .field("file_os", &format_args!("{:#x}", &self.file_os))
            .field("file_type", &format_args!("{:#x}", &self.file_type))
            .finish()
    }
}

impl VsFixedFileInfo {
    /// A fixed info block for a Windows NT DLL at version `0.0.0.0`
    pub fn new() -> Self {
        VsFixedFileInfo {
            signature: VS_FFI_SIGNATURE,
            struct_version: VS_FFI_STRUCVERSION,
            file_flags_mask: VS_FFI_FILEFLAGSMASK,
            file_os: VOS_NT_WINDOWS32,
            file_type: VFT_DLL,
            ..Default::default()
        }
    }

    /// Returns `true` if [`Self::signature`] equals to [`VS_FFI_SIGNATURE`], otherwise `false`.
    pub fn is_valid(&self) -> bool {
        self.signature == VS_FFI_SIGNATURE
    }

    /// The packed file version
    pub fn packed_file_version(&self) -> PackedVersion {
        PackedVersion::from_ms_ls(self.file_version_ms, self.file_version_ls)
    }

    /// The packed product version
    pub fn packed_product_version(&self) -> PackedVersion {
        PackedVersion::from_ms_ls(self.product_version_ms, self.product_version_ls)
    }

    /// Reinterprets [`Self::file_version_ms`] and [`Self::file_version_ls`] as a [`Version`].
    pub fn file_version(&self) -> Version {
        Version::decode(self.packed_file_version())
    }

    /// Reinterprets [`Self::product_version_ms`] and [`Self::product_version_ls`] as a [`Version`].
    pub fn product_version(&self) -> Version {
        Version::decode(self.packed_product_version())
    }

    /// Overwrites both the file and the product version
    pub fn set_version(&mut self, packed: PackedVersion) {
        self.file_version_ms = packed.ms;
        self.file_version_ls = packed.ls;
        self.product_version_ms = packed.ms;
        self.product_version_ls = packed.ls;
    }
}

/// Where a node sits in the tree, which decides how its value is read
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
enum NodeKind {
    Root,
    StringFileInfo,
    StringTable,
    String,
    /// `VarFileInfo` or any unknown block under the root
    VarFileInfo,
    Var,
}

impl NodeKind {
    /// The kind of a child named `key` below a node of this kind
    fn child(self, key: &str) -> Self {
        match self {
            NodeKind::Root if key == STRING_FILE_INFO_KEY => NodeKind::StringFileInfo,
            NodeKind::Root => NodeKind::VarFileInfo,
            NodeKind::StringFileInfo => NodeKind::StringTable,
            NodeKind::StringTable => NodeKind::String,
            NodeKind::VarFileInfo | NodeKind::String | NodeKind::Var => NodeKind::Var,
        }
    }

    fn is_leaf(self) -> bool {
        matches!(self, NodeKind::String | NodeKind::Var)
    }
}

/// One node of a `VS_VERSIONINFO` tree
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct VersionNode {
    /// The node key, e.g. `StringFileInfo` or `FileVersion`
    pub key: String,
    /// [`VALUE_TYPE_TEXT`] or [`VALUE_TYPE_BINARY`]
    pub value_type: u16,
    /// Raw value bytes; null terminated UTF-16LE for text values
    pub value: Vec<u8>,
    pub children: Vec<VersionNode>,
}

impl VersionNode {
    /// A node without value
    pub fn block(key: &str, value_type: u16) -> Self {
        VersionNode {
            key: key.to_owned(),
            value_type,
            value: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A text leaf
    pub fn text(key: &str, value: &str) -> Self {
        VersionNode {
            key: key.to_owned(),
            value_type: VALUE_TYPE_TEXT,
            value: to_utf16_bytes(value),
            children: Vec::new(),
        }
    }

    /// The value decoded as UTF-16, up to the terminator
    pub fn value_string(&self) -> String {
        to_utf16_string(&self.value)
    }

    /// `wValueLength` as it will be serialized: characters for text, bytes otherwise
    pub fn value_len(&self) -> usize {
        if self.value_type == VALUE_TYPE_TEXT {
            self.value.len() / SIZE_OF_WCHAR
        } else {
            self.value.len()
        }
    }

    pub fn child(&self, key: &str) -> Option<&VersionNode> {
        self.children.iter().find(|child| child.key == key)
    }

    pub fn child_mut(&mut self, key: &str) -> Option<&mut VersionNode> {
        self.children.iter_mut().find(|child| child.key == key)
    }

    fn parse(
        bytes: &[u8],
        start: usize,
        limit: usize,
        parent: Option<NodeKind>,
        opts: &ParseOptions,
    ) -> error::Result<(Self, usize)> {
        let permissive = opts.is_permissive();
        let len = bytes.pread_with::<u16>(start, scroll::LE)? as usize;
        let value_len = bytes.pread_with::<u16>(start + 2, scroll::LE)? as usize;
        let value_type = bytes.pread_with::<u16>(start + 4, scroll::LE)?;
        if len < SIZEOF_NODE_HEADER {
            return Err(error::Error::UnsupportedBinaryFormat(format!(
                "version node at {:#x} has length {:#x}",
                start, len
            )));
        }
        let end = if start + len > limit {
            Err(error::Error::UnsupportedBinaryFormat(format!(
                "version node at {:#x} ({:#x} bytes) exceeds its parent ending at {:#x}",
                start, len, limit
            )))
        } else {
            Ok(start + len)
        }
        .or_permissive_and_value(permissive, "VS_VERSIONINFO node", limit)?;

        let mut cursor = start + SIZEOF_NODE_HEADER;
        let mut units = Vec::new();
        loop {
            if cursor + SIZE_OF_WCHAR > end {
                return Err(error::Error::UnsupportedBinaryFormat(format!(
                    "unterminated key in version node at {:#x}",
                    start
                )));
            }
            let unit = bytes.pread_with::<u16>(cursor, scroll::LE)?;
            cursor += SIZE_OF_WCHAR;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        let key = String::from_utf16_lossy(&units);
        let kind = parent.map_or(NodeKind::Root, |parent| parent.child(&key));
        cursor = align_up(cursor, NODE_ALIGNMENT).min(end);

        if kind.is_leaf() {
            let rest = &bytes[cursor..end];
            let node = if kind == NodeKind::String {
                // the value runs to the end of the node, whatever wValueLength says
                let text = to_utf16_string(rest);
                VersionNode::text(&key, &text)
            } else {
                let declared = declared_value_size(value_type, value_len);
                let count = fit_value(value_type, declared, rest.len());
                VersionNode {
                    key,
                    value_type,
                    value: rest[..count].to_vec(),
                    children: Vec::new(),
                }
            };
            return Ok((node, end));
        }

        let count = declared_value_size(value_type, value_len);
        let count = if cursor + count > end {
            Err(error::Error::UnsupportedBinaryFormat(format!(
                "value of {:?} ({:#x} bytes) exceeds its node ending at {:#x}",
                key, count, end
            )))
        } else {
            Ok(count)
        }
        .or_permissive_and_value(permissive, "VS_VERSIONINFO value", end - cursor)?;
        let count = fit_value(value_type, count, end - cursor);
        let value = bytes[cursor..cursor + count].to_vec();
        cursor = align_up(cursor + count, NODE_ALIGNMENT);

        let mut children = Vec::new();
        while cursor + SIZEOF_NODE_HEADER <= end {
            if bytes.pread_with::<u16>(cursor, scroll::LE)? == 0 {
                // trailing padding
                break;
            }
            let (child, child_end) = VersionNode::parse(bytes, cursor, end, Some(kind), opts)?;
            debug!("{:?} child {:?} at {:#x}..{:#x}", kind, child.key, cursor, child_end);
            children.push(child);
            cursor = align_up(child_end, NODE_ALIGNMENT);
        }

        Ok((
            VersionNode {
                key,
                value_type,
                value,
                children,
            },
            end,
        ))
    }

    /// Appends this node to `out`, which must be 32-bit aligned relative to the resource start
    fn write(&self, out: &mut Vec<u8>) -> error::Result<()> {
        let start = out.len();
        out.extend_from_slice(&[0u8; SIZEOF_NODE_HEADER]);
        out.extend(to_utf16_bytes(&self.key));
        pad(out);
        out.extend_from_slice(&self.value);
        for child in &self.children {
            pad(out);
            child.write(out)?;
        }
        let len = out.len() - start;
        let too_large = |what: &str, size: usize| {
            error::Error::UnsupportedBinaryFormat(format!(
                "{} of version node {:?} ({:#x}) does not fit 16 bits",
                what, self.key, size
            ))
        };
        let len = u16::try_from(len).map_err(|_| too_large("length", len))?;
        let value_len = self.value_len();
        let value_len = u16::try_from(value_len).map_err(|_| too_large("value", value_len))?;
        out.pwrite_with(len, start, scroll::LE)?;
        out.pwrite_with(value_len, start + 2, scroll::LE)?;
        out.pwrite_with(self.value_type, start + 4, scroll::LE)?;
        Ok(())
    }
}

/// `wValueLength` in bytes
fn declared_value_size(value_type: u16, value_len: usize) -> usize {
    if value_type == VALUE_TYPE_TEXT {
        value_len * SIZE_OF_WCHAR
    } else {
        value_len
    }
}

/// Clamps a value to `available` bytes, in whole characters for text
fn fit_value(value_type: u16, size: usize, available: usize) -> usize {
    let size = size.min(available);
    if value_type == VALUE_TYPE_TEXT {
        size & !1
    } else {
        size
    }
}

fn pad(out: &mut Vec<u8>) {
    let aligned = align_up(out.len(), NODE_ALIGNMENT);
    out.resize(aligned, 0);
}

/// A parsed, editable version resource
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VersionInfo {
    pub root: VersionNode,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionInfo {
    /// An empty version resource: fixed info at `0.0.0.0`, an empty US English
    /// string table and the matching translation
    pub fn new() -> Self {
        let mut root = VersionNode::block(VS_VERSION_INFO_KEY, VALUE_TYPE_BINARY);
        let mut fixed = vec![0u8; SIZEOF_VS_FIXED_FILE_INFO];
        // cannot fail, the buffer is exactly one VsFixedFileInfo
        let _ = fixed.pwrite_with(VsFixedFileInfo::new(), 0, scroll::LE);
        root.value = fixed;

        let mut string_file_info = VersionNode::block(STRING_FILE_INFO_KEY, VALUE_TYPE_TEXT);
        string_file_info
            .children
            .push(VersionNode::block(US_ENGLISH_UNICODE_KEY, VALUE_TYPE_TEXT));
        let mut var_file_info = VersionNode::block(VAR_FILE_INFO_KEY, VALUE_TYPE_TEXT);
        var_file_info.children.push(VersionNode {
            key: TRANSLATION_KEY.to_owned(),
            value_type: VALUE_TYPE_BINARY,
            value: vec![0x09, 0x04, 0xb0, 0x04],
            children: Vec::new(),
        });
        root.children.push(string_file_info);
        root.children.push(var_file_info);
        VersionInfo { root }
    }

    pub fn parse(bytes: &[u8]) -> error::Result<Self> {
        Self::parse_with_opts(bytes, &ParseOptions::default())
    }

    /// Parses the `VS_VERSIONINFO` bytes of an `RT_VERSION` resource
    pub fn parse_with_opts(bytes: &[u8], opts: &ParseOptions) -> error::Result<Self> {
        let (root, _) = VersionNode::parse(bytes, 0, bytes.len(), None, opts)?;
        if root.key != VS_VERSION_INFO_KEY {
            return Err(error::Error::UnsupportedBinaryFormat(format!(
                "version resource root is {:?}, expected {:?}",
                root.key, VS_VERSION_INFO_KEY
            )));
        }
        Ok(VersionInfo { root })
    }

    /// Serializes the tree, recomputing every length field
    pub fn to_bytes(&self) -> error::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.root.write(&mut out)?;
        Ok(out)
    }

    /// The fixed file info, if present and carrying a valid signature
    pub fn fixed_info(&self) -> Option<VsFixedFileInfo> {
        if self.root.value.len() < SIZEOF_VS_FIXED_FILE_INFO {
            return None;
        }
        self.root
            .value
            .pread_with::<VsFixedFileInfo>(0, scroll::LE)
            .ok()
            .filter(VsFixedFileInfo::is_valid)
    }

    pub fn set_fixed_info(&mut self, fixed: VsFixedFileInfo) {
        let mut value = vec![0u8; SIZEOF_VS_FIXED_FILE_INFO];
        let _ = value.pwrite_with(fixed, 0, scroll::LE);
        self.root.value = value;
        self.root.value_type = VALUE_TYPE_BINARY;
    }

    /// The first language/code page pair of `VarFileInfo\Translation`
    pub fn translation(&self) -> Option<(u16, u16)> {
        let translation = self
            .root
            .child(VAR_FILE_INFO_KEY)?
            .child(TRANSLATION_KEY)?;
        let language = translation.value.pread_with::<u16>(0, scroll::LE).ok()?;
        let code_page = translation.value.pread_with::<u16>(2, scroll::LE).ok()?;
        Some((language, code_page))
    }

    /// The first string table, whatever its language
    pub fn string_table(&self) -> Option<&VersionNode> {
        self.root.child(STRING_FILE_INFO_KEY)?.children.first()
    }

    /// The first string table, created when the resource has none
    pub fn string_table_mut(&mut self) -> &mut VersionNode {
        let table_key = match self.translation() {
            Some((language, code_page)) => format!("{:04x}{:04x}", language, code_page),
            None => DEFAULT_STRING_TABLE_KEY.to_owned(),
        };
        let position = self
            .root
            .children
            .iter()
            .position(|child| child.key == STRING_FILE_INFO_KEY);
        let position = match position {
            Some(position) => position,
            None => {
                debug!("Adding missing {}", STRING_FILE_INFO_KEY);
                self.root
                    .children
                    .insert(0, VersionNode::block(STRING_FILE_INFO_KEY, VALUE_TYPE_TEXT));
                0
            }
        };
        let string_file_info = &mut self.root.children[position];
        if string_file_info.children.is_empty() {
            debug!("Adding missing string table {}", table_key);
            string_file_info
                .children
                .push(VersionNode::block(&table_key, VALUE_TYPE_TEXT));
        }
        &mut string_file_info.children[0]
    }

    /// Looks up `key` in the first string table
    pub fn string(&self, key: &str) -> Option<String> {
        self.string_table()?
            .child(key)
            .map(VersionNode::value_string)
    }

    /// All entries of the first string table, in order
    pub fn strings(&self) -> Vec<(String, String)> {
        self.string_table()
            .map(|table| {
                table
                    .children
                    .iter()
                    .map(|entry| (entry.key.clone(), entry.value_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Overwrites `key` in the first string table, appending it if absent
    pub fn set_string(&mut self, key: &str, value: &str) {
        let table = self.string_table_mut();
        match table.child_mut(key) {
            Some(entry) => *entry = VersionNode::text(key, value),
            None => table.children.push(VersionNode::text(key, value)),
        }
    }

    /// The `FileVersion` string
    pub fn file_version(&self) -> Option<String> {
        self.string(FILE_VERSION_KEY)
    }

    /// The `ProductVersion` string
    pub fn product_version(&self) -> Option<String> {
        self.string(PRODUCT_VERSION_KEY)
    }

    /// Stamps `version` into every version string and into the fixed info.
    ///
    /// A missing or invalid fixed info block is replaced by [`VsFixedFileInfo::new`].
    pub fn set_version(&mut self, version: &Version) {
        let text = version.to_string();
        for key in VERSION_STRING_KEYS {
            self.set_string(key, &text);
        }
        let mut fixed = self.fixed_info().unwrap_or_default();
        if !fixed.is_valid() {
            debug!("Replacing missing or invalid VS_FIXEDFILEINFO");
            fixed = VsFixedFileInfo::new();
        }
        fixed.set_version(version.encode());
        self.set_fixed_info(fixed);
    }

    /// The version to report for this resource: the `FileVersion` string, or the
    /// fixed file version when there is none
    pub fn display_version(&self) -> Option<String> {
        self.file_version()
            .or_else(|| self.fixed_info().map(|fixed| fixed.file_version().to_string()))
    }
}
