#![no_main]
use libfuzzer_sys::fuzz_target;
use sbom_binscan::LightweightExtractor;

/// Fuzz the hand-written ELF section table and DWARF decoders.
///
/// Inputs without the ELF magic are given a 64-bit little-endian header
/// prefix so the section table reader is reached.
fuzz_target!(|data: &[u8]| {
    let extractor = LightweightExtractor::new();
    let _ = extractor.debug_info_from_bytes(data);

    if !data.starts_with(b"\x7fELF") && data.len() < 100_000 {
        let mut prefixed = b"\x7fELF\x02\x01\x01\x00".to_vec();
        prefixed.extend_from_slice(data);
        let _ = extractor.debug_info_from_bytes(&prefixed);
    }
});
