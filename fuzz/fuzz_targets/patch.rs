#![no_main]
use libfuzzer_sys::fuzz_target;

use verstamp::{patch, ParseOptions, Version};

fuzz_target!(|data: &[u8]| {
    let mut bytes = data.to_vec();
    let _ = patch::apply(&mut bytes, &Version::new(1, 2, 3, 4), &ParseOptions::permissive());
});
