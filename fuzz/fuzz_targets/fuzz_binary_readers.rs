#![no_main]
use libfuzzer_sys::fuzz_target;
use sbom_binscan::binary::{dependencies_from_bytes, inspect_bytes, sections_from_bytes};

/// Fuzz the symbol, section and dependency readers.
fuzz_target!(|data: &[u8]| {
    let _ = inspect_bytes(data);
    let _ = sections_from_bytes(data);
    let _ = dependencies_from_bytes(data);
});
