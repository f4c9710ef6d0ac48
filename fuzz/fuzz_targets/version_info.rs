#![no_main]
use libfuzzer_sys::fuzz_target;

use verstamp::pe::version_info::VersionInfo;
use verstamp::{fixup, ParseOptions, Version};

fuzz_target!(|data: &[u8]| {
    for opts in [ParseOptions::strict(), ParseOptions::permissive()] {
        if let Ok(info) = VersionInfo::parse_with_opts(data, &opts) {
            // serializing a parsed tree is a fixed point
            if let Ok(bytes) = info.to_bytes() {
                let reparsed = VersionInfo::parse(&bytes).unwrap();
                assert_eq!(reparsed.to_bytes().unwrap(), bytes);
            }
        }
    }
    let mut blob = data.to_vec();
    let _ = fixup::fix_length_fields(&mut blob, &Version::new(1, 0, 0, 0));
});
