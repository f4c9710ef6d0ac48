//! Dotted four part versions and their packed `VS_FIXEDFILEINFO` form.
//!
//! A version such as `1.2.3.4` is stored in a version resource as two 32-bit
//! words, the most significant one holding `major` and `minor`, the least
//! significant one holding `build` and `revision`. Every part therefore has to
//! fit in 16 bits; parts beyond that are rejected when parsing rather than being
//! silently truncated while packing.

use core::fmt;
use core::str::FromStr;

use crate::error;

/// Maximum number of dot separated parts in a version string
pub const MAX_VERSION_PARTS: usize = 4;

/// Length of the longest dotted version, `65535.65535.65535.65535`
pub const MAX_VERSION_TEXT_LEN: usize = 23;

/// A normalized `major.minor.build.revision` version.
///
/// Missing trailing parts of the source string are zero.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Default)]
pub struct Version {
    /// The major version
    pub major: u16,
    /// The minor version
    pub minor: u16,
    /// The build number
    pub build: u16,
    /// The revision number
    pub revision: u16,
}

/// The on-disk numeric representation of a [`Version`].
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct PackedVersion {
    /// `major << 16 | minor`
    pub ms: u32,
    /// `build << 16 | revision`
    pub ls: u32,
}

impl Version {
    /// Creates a version from its four parts
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parses a dotted version string of 1 to 4 parts, each in `0..=65535`.
    pub fn parse(version: &str) -> error::Result<Self> {
        let invalid = |part: &str| error::Error::InvalidVersionPart {
            version: version.to_owned(),
            part: part.to_owned(),
        };
        let mut parts = [0u16; MAX_VERSION_PARTS];
        for (i, part) in version.split('.').enumerate() {
            if i >= MAX_VERSION_PARTS {
                return Err(invalid(part));
            }
            // u16::from_str accepts a leading '+', a version part does not
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(part));
            }
            parts[i] = part.parse::<u16>().map_err(|_| invalid(part))?;
        }
        let [major, minor, build, revision] = parts;
        Ok(Self::new(major, minor, build, revision))
    }

    /// Packs this version into its most and least significant words.
    pub fn encode(&self) -> PackedVersion {
        PackedVersion {
            ms: (self.major as u32) << 16 | self.minor as u32,
            ls: (self.build as u32) << 16 | self.revision as u32,
        }
    }

    /// Reconstructs a version from its packed words.
    pub fn decode(packed: PackedVersion) -> Self {
        Self::new(
            (packed.ms >> 16) as u16,
            (packed.ms & 0xFFFF) as u16,
            (packed.ls >> 16) as u16,
            (packed.ls & 0xFFFF) as u16,
        )
    }

    /// The comma separated form used by `FILEVERSION` statements in resource scripts
    pub fn to_comma_string(&self) -> String {
        format!(
            "{},{},{},{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl PackedVersion {
    /// Creates a packed version from raw words
    pub const fn from_ms_ls(ms: u32, ls: u32) -> Self {
        Self { ms, ls }
    }
}

impl From<PackedVersion> for Version {
    fn from(packed: PackedVersion) -> Self {
        Version::decode(packed)
    }
}

impl From<Version> for PackedVersion {
    fn from(version: Version) -> Self {
        version.encode()
    }
}

impl FromStr for Version {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Parses `version` and packs it, see [`Version::encode`].
pub fn encode(version: &str) -> error::Result<PackedVersion> {
    Ok(Version::parse(version)?.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn pads_missing_parts() {
        assert_eq!(Version::parse("1").unwrap(), Version::new(1, 0, 0, 0));
        assert_eq!(Version::parse("1.2").unwrap(), Version::new(1, 2, 0, 0));
        assert_eq!(Version::parse("1.2.3").unwrap(), Version::new(1, 2, 3, 0));
        assert_eq!(Version::parse("1.2.3.4").unwrap(), Version::new(1, 2, 3, 4));
    }

    #[test]
    fn packs_words() {
        let packed = encode("2.3.0.1").unwrap();
        assert_eq!(packed.ms, 0x0002_0003);
        assert_eq!(packed.ls, 0x0000_0001);
        let packed = encode("65535.65535.65535.65535").unwrap();
        assert_eq!(packed, PackedVersion::from_ms_ls(0xFFFF_FFFF, 0xFFFF_FFFF));
    }

    #[test]
    fn decode_inverts_encode() {
        for s in ["0", "1.0", "10.0.19041", "3.11.3150.0", "65535.0.65535.1", "7.7.7.7"] {
            let version = Version::parse(s).unwrap();
            assert_eq!(Version::decode(version.encode()), version);
        }
        // the display form is the zero padded four part string
        let version = Version::parse("1.2").unwrap();
        assert_eq!(Version::decode(version.encode()).to_string(), "1.2.0.0");
    }

    #[test]
    fn rejects_bad_parts() {
        for s in [
            "", "1.", ".1", "1..2", "a.b", "1.2.3.4.5", "65536", "1.-1", "+1", "1.2.3.99999", "1 .2",
        ] {
            match Version::parse(s) {
                Err(Error::InvalidVersionPart { version, .. }) => assert_eq!(version, s),
                other => panic!("{:?} parsed as {:?}", s, other),
            }
        }
    }

    #[test]
    fn reports_offending_part() {
        match "1.70000.2".parse::<Version>() {
            Err(Error::InvalidVersionPart { part, .. }) => assert_eq!(part, "70000"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn comma_form() {
        assert_eq!(Version::new(1, 2, 0, 0).to_comma_string(), "1,2,0,0");
    }

    #[test]
    fn ordering_follows_parts() {
        assert!(Version::parse("1.10").unwrap() > Version::parse("1.9.9.9").unwrap());
        assert_eq!(Version::parse("2").unwrap(), Version::parse("2.0.0.0").unwrap());
    }
}
