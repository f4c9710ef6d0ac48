mod common;

use std::fs;

use scroll::Pread;
use tempfile::tempdir;

use common::{Fixture, BLOB_OFFSET, HEADERS_SIZE, SECTION_RVA};
use verstamp::error::Error;
use verstamp::fixup::find_file_version_keys;
use verstamp::patch;
use verstamp::pe::version_info::{VersionInfo, ASSEMBLY_VERSION_KEY, VERSION_STRING_KEYS};
use verstamp::pe::writer::Placement;
use verstamp::pe::PE;
use verstamp::{ParseOptions, Version};

fn opts() -> ParseOptions {
    ParseOptions::default()
}

#[test]
fn parses_fixture() {
    let bytes = common::pe_with_version("1.2.3.4");
    let pe = PE::parse(&bytes).unwrap();
    assert!(!pe.is_64);
    assert_eq!(pe.sections.len(), 1);
    assert_eq!(pe.sections[0].name(), ".rsrc");
    let resource = pe.version_resource.unwrap();
    assert_eq!(resource.offset, HEADERS_SIZE + BLOB_OFFSET);
    assert_eq!(resource.section, 0);
    assert_eq!(resource.size(), common::version_blob("1.2.3.4").len());

    let info = pe.version_info(&bytes, &opts()).unwrap();
    assert_eq!(info.file_version().as_deref(), Some("1.2.3.4"));
    assert_eq!(
        info.fixed_info().unwrap().file_version(),
        Version::new(1, 2, 3, 4)
    );
}

#[test]
fn patch_reads_back() {
    let mut bytes = common::pe_with_version("0.0.0.0");
    let version = Version::new(2, 3, 0, 1);
    let outcome = patch::apply(&mut bytes, &version, &opts()).unwrap();
    assert_eq!(outcome.old.as_deref(), Some("0.0.0.0"));
    assert_eq!(outcome.placement, Placement::InPlace);
    assert!(outcome.changed);

    let pe = PE::parse(&bytes).unwrap();
    let info = pe.version_info(&bytes, &opts()).unwrap();
    assert_eq!(info.file_version().as_deref(), Some("2.3.0.1"));
    assert_eq!(info.product_version().as_deref(), Some("2.3.0.1"));
    assert_eq!(info.string(ASSEMBLY_VERSION_KEY).as_deref(), Some("2.3.0.1"));
    assert_eq!(info.string("CompanyName").as_deref(), Some("KSPBurst"));
    let fixed = info.fixed_info().unwrap();
    assert_eq!(fixed.file_version_ms, 0x0002_0003);
    assert_eq!(fixed.file_version_ls, 0x0000_0001);
    assert_eq!(fixed.product_version_ms, 0x0002_0003);
    assert_eq!(fixed.product_version_ls, 0x0000_0001);
}

#[test]
fn patch_is_idempotent() {
    let version = Version::new(1, 4, 2, 0);
    let mut once = common::pe_with_version("0.0.0.0");
    patch::apply(&mut once, &version, &opts()).unwrap();
    let mut twice = once.clone();
    let outcome = patch::apply(&mut twice, &version, &opts()).unwrap();
    assert!(!outcome.changed);
    assert_eq!(outcome.old.as_deref(), Some("1.4.2.0"));
    assert_eq!(once, twice);

    let pe = PE::parse(&twice).unwrap();
    let info = pe.version_info(&twice, &opts()).unwrap();
    assert_eq!(info.file_version().as_deref(), Some("1.4.2.0"));
    assert_eq!(info.string("CompanyName").as_deref(), Some("KSPBurst"));
}

#[test]
fn patch_keeps_non_version_strings() {
    let mut fixture = Fixture::default();
    let mut info = common::version_info("0.0.0.0");
    info.set_string("LegalCopyright", "Copyright (C) 2024");
    info.set_string("OriginalFilename", "engine.dll");
    fixture.blob = info.to_bytes().unwrap();
    let mut bytes = fixture.build();

    let others = |bytes: &[u8]| -> Vec<(String, String)> {
        let pe = PE::parse(bytes).unwrap();
        pe.version_info(bytes, &opts())
            .unwrap()
            .strings()
            .into_iter()
            .filter(|(key, _)| !VERSION_STRING_KEYS.contains(&key.as_str()))
            .collect()
    };
    let before = others(&bytes);
    assert_eq!(before.len(), 4);

    patch::apply(&mut bytes, &Version::new(5, 1, 0, 0), &opts()).unwrap();
    assert_eq!(others(&bytes), before);
    let pe = PE::parse(&bytes).unwrap();
    let info = pe.version_info(&bytes, &opts()).unwrap();
    for key in VERSION_STRING_KEYS {
        assert_eq!(info.string(key).as_deref(), Some("5.1.0.0"), "{}", key);
    }
}

#[test]
fn shrinking_resource_zeroes_the_tail() {
    let mut bytes = common::pe_with_version("10.20.300.4000");
    let old_size = common::version_blob("10.20.300.4000").len();
    patch::apply(&mut bytes, &Version::new(1, 0, 0, 0), &opts()).unwrap();
    let pe = PE::parse(&bytes).unwrap();
    let resource = pe.version_resource.unwrap();
    assert!(resource.size() < old_size);
    let start = HEADERS_SIZE + BLOB_OFFSET;
    assert!(bytes[start + resource.size()..start + old_size]
        .iter()
        .all(|&b| b == 0));
    let info = pe.version_info(&bytes, &opts()).unwrap();
    assert_eq!(info.file_version().as_deref(), Some("1.0.0.0"));
}

#[test]
fn growing_resource_moves_into_section_slack() {
    let fixture = Fixture::default();
    let mut bytes = fixture.build();
    let version = Version::new(10, 20, 300, 4000);
    let outcome = patch::apply(&mut bytes, &version, &opts()).unwrap();
    let rva = SECTION_RVA + fixture.used_size() as u32;
    assert_eq!(outcome.placement, Placement::Relocated { rva });

    let pe = PE::parse(&bytes).unwrap();
    let resource = pe.version_resource.unwrap();
    assert_eq!(resource.data_entry.offset_to_data, rva);
    let new_size = resource.size();
    assert!(new_size > fixture.blob.len());
    let end = fixture.used_size() + new_size;
    assert_eq!(pe.sections[0].virtual_size as usize, end);
    let dd = pe.optional_header.data_directories.get_resource_table().unwrap();
    assert_eq!(dd.size as usize, end);
    assert_eq!(pe.optional_header.size_of_image, 0x2000);

    let info = pe.version_info(&bytes, &opts()).unwrap();
    assert_eq!(info.file_version().as_deref(), Some("10.20.300.4000"));

    // the old copy is gone
    let old = HEADERS_SIZE + BLOB_OFFSET;
    assert!(bytes[old..old + fixture.blob.len()].iter().all(|&b| b == 0));

    // and a second run rewrites it where it now lives
    let mut again = bytes.clone();
    let outcome = patch::apply(&mut again, &version, &opts()).unwrap();
    assert!(!outcome.changed);
    assert_eq!(again, bytes);
}

#[test]
fn no_room_to_grow() {
    let fixture = Fixture {
        raw_size: 0x400,
        ..Default::default()
    };
    let mut bytes = fixture.build();
    let original = bytes.clone();
    let err = patch::apply(&mut bytes, &Version::new(10, 20, 300, 4000), &opts()).unwrap_err();
    assert!(matches!(err, Error::InsufficientSpace { .. }));
    assert_eq!(bytes, original);
}

#[test]
fn pe32_plus() {
    let mut bytes = Fixture {
        pe32_plus: true,
        ..Default::default()
    }
    .build();
    let pe = PE::parse(&bytes).unwrap();
    assert!(pe.is_64);
    patch::apply(&mut bytes, &Version::new(3, 1, 0, 0), &opts()).unwrap();
    let pe = PE::parse(&bytes).unwrap();
    let info = pe.version_info(&bytes, &opts()).unwrap();
    assert_eq!(info.file_version().as_deref(), Some("3.1.0.0"));
}

#[test]
fn missing_version_resource() {
    let mut bytes = common::pe_without_version();
    let pe = PE::parse(&bytes).unwrap();
    assert!(pe.version_resource.is_none());
    let err = patch::apply(&mut bytes, &Version::new(1, 0, 0, 0), &opts()).unwrap_err();
    assert!(matches!(err, Error::NoVersionResource));

    let mut bytes = Fixture {
        no_resource_directory: true,
        ..Default::default()
    }
    .build();
    let err = patch::apply(&mut bytes, &Version::new(1, 0, 0, 0), &opts()).unwrap_err();
    assert!(matches!(err, Error::NoVersionResource));
}

#[test]
fn garbage_is_unsupported() {
    for bytes in [
        b"not a portable executable".to_vec(),
        Vec::new(),
        common::pe_with_version("1.0.0.0")[..0x100].to_vec(),
    ] {
        let err = PE::parse(&bytes).unwrap_err();
        assert!(
            matches!(err, Error::UnsupportedBinaryFormat(_)),
            "unexpected {:?}",
            err
        );
    }

    // an ELF header where the DOS header should be
    let mut bytes = common::pe_with_version("1.0.0.0");
    bytes[..4].copy_from_slice(b"\x7fELF");
    assert!(matches!(
        PE::parse(&bytes),
        Err(Error::UnsupportedBinaryFormat(_))
    ));
}

#[test]
fn corrupt_version_lengths_need_permissive_mode() {
    let mut fixture = Fixture::default();
    // root wLength claims more than the resource holds
    let claimed = fixture.blob.len() as u16 + 0x40;
    fixture.blob[..2].copy_from_slice(&claimed.to_le_bytes());
    let mut bytes = fixture.build();

    let err = patch::apply(&mut bytes, &Version::new(1, 0, 0, 0), &opts()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedBinaryFormat(_)));

    patch::apply(&mut bytes, &Version::new(1, 0, 0, 0), &ParseOptions::permissive()).unwrap();
    let pe = PE::parse(&bytes).unwrap();
    let info = pe.version_info(&bytes, &opts()).unwrap();
    assert_eq!(info.file_version().as_deref(), Some("1.0.0.0"));
}

#[test]
fn string_value_lengths_are_rewritten() {
    let mut fixture = Fixture::default();
    let key = find_file_version_keys(&fixture.blob)[0];
    // what ResourceHacker leaves behind
    fixture.blob[key - 4] = 0x02;
    let mut bytes = fixture.build();
    patch::apply(&mut bytes, &Version::new(2, 0, 0, 0), &opts()).unwrap();

    let pe = PE::parse(&bytes).unwrap();
    let blob = pe.version_bytes(&bytes).unwrap();
    let key = find_file_version_keys(blob)[0];
    let value_len: u16 = blob.pread_with(key - 4, scroll::LE).unwrap();
    assert_eq!(value_len as usize, "2.0.0.0".len() + 1);
}

#[test]
fn patch_file_in_place() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.dll");
    fs::write(&path, common::pe_with_version("0.0.0.0")).unwrap();

    let outcome = patch::patch(&path, &"2.3.0.1".parse().unwrap(), &opts()).unwrap();
    assert_eq!(outcome.old.as_deref(), Some("0.0.0.0"));
    let info = patch::inspect(&path, &opts()).unwrap();
    assert_eq!(info.file_version().as_deref(), Some("2.3.0.1"));

    // only the target remains in the directory
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn failed_patch_leaves_file_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.dll");
    let original = Fixture {
        raw_size: 0x400,
        ..Default::default()
    }
    .build();
    fs::write(&path, &original).unwrap();

    let err = patch::patch(&path, &Version::new(10, 20, 300, 4000), &opts()).unwrap_err();
    assert!(matches!(err, Error::InsufficientSpace { .. }));
    assert_eq!(fs::read(&path).unwrap(), original);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn inspect_reports_current_resource() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.dll");
    fs::write(&path, common::pe_with_version("4.0.1.0")).unwrap();
    let info: VersionInfo = patch::inspect(&path, &opts()).unwrap();
    assert_eq!(info.string("InternalName").as_deref(), Some("engine.dll"));
    assert_eq!(info.display_version().as_deref(), Some("4.0.1.0"));
    assert_eq!(info.translation(), Some((0x0409, 0x04b0)));

    let missing = dir.path().join("missing.dll");
    assert!(matches!(
        patch::inspect(&missing, &opts()),
        Err(Error::IO(_))
    ));
}
