#![no_main]
use libfuzzer_sys::fuzz_target;

/// Fuzz both sniffers: binary magic numbers over raw bytes and document
/// family detection over UTF-8 text.
fuzz_target!(|data: &[u8]| {
    let _ = sbom_binscan::detect_format(data);
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = sbom_binscan::FormatFactory::detect(s);
    }
});
