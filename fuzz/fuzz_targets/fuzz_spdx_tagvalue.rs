#![no_main]
use libfuzzer_sys::fuzz_target;
use sbom_binscan::{FormatFactory, FormatHandler};

/// Fuzz the SPDX tag-value validator and parser.
///
/// Prefixes input with the SPDX tag-value header to exercise the
/// line-by-line tag-value parsing logic.
fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let Some(handler) = FormatFactory::create("spdx", "2.3") else {
            return;
        };

        let _ = handler.validate(s);
        let _ = handler.parse_components(s);

        if s.len() < 10_000 {
            let wrapped = format!(
                "SPDXVersion: SPDX-2.3\nDataLicense: CC0-1.0\nSPDXID: SPDXRef-DOCUMENT\nDocumentName: fuzz\nDocumentNamespace: https://example.com/fuzz\n{s}",
            );
            let _ = handler.validate(&wrapped);
            let _ = handler.parse_components(&wrapped);
        }
    }
});
